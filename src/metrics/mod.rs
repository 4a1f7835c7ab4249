//! Metrics registry
//!
//! Process-wide request counters and the latency histogram, rendered in the
//! Prometheus text exposition format. The registry is an owned value shared
//! through `Arc`; every update is a relaxed atomic add, and `export` only
//! performs atomic loads.

mod histogram;

pub use histogram::{Histogram, HistogramSnapshot, DEFAULT_LATENCY_BUCKETS};

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Prefix for every exported series
pub const METRIC_PREFIX: &str = "housing";

/// Counters and histograms for the inference service
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    requests: AtomicU64,
    rejected: AtomicU64,
    prediction_failures: AtomicU64,
    audit_failures: AtomicU64,
    reloads_ok: AtomicU64,
    reloads_failed: AtomicU64,
    latency: Histogram,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with custom latency bucket bounds (seconds)
    pub fn with_buckets(bounds: &[f64]) -> Self {
        Self {
            latency: Histogram::new(bounds),
            ..Self::default()
        }
    }

    /// Count an accepted (validated) request
    pub fn increment_request_count(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a request rejected by validation
    pub fn increment_rejected_count(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_prediction_failures(&self) {
        self.prediction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_audit_failures(&self) {
        self.audit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a reload attempt by outcome
    pub fn record_reload(&self, success: bool) {
        let counter = if success {
            &self.reloads_ok
        } else {
            &self.reloads_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful prediction's latency
    pub fn observe_latency(&self, duration: Duration) {
        self.latency.observe(duration);
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn audit_failure_count(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    /// Number of latency observations
    pub fn latency_count(&self) -> u64 {
        self.latency.count()
    }

    /// Render all series in Prometheus text format
    pub fn export(&self) -> String {
        let mut out = String::with_capacity(2048);

        write_counter(
            &mut out,
            "requests_total",
            "Prediction requests that passed validation",
            self.request_count(),
        );
        write_counter(
            &mut out,
            "requests_rejected_total",
            "Prediction requests rejected by feature validation",
            self.rejected_count(),
        );
        write_counter(
            &mut out,
            "prediction_failures_total",
            "Validated requests for which the model produced no usable value",
            self.prediction_failures.load(Ordering::Relaxed),
        );
        write_counter(
            &mut out,
            "audit_failures_total",
            "Audit entries that failed to reach at least one sink",
            self.audit_failure_count(),
        );

        let name = format!("{METRIC_PREFIX}_model_reloads_total");
        let _ = writeln!(out, "# HELP {name} Model reload attempts by outcome");
        let _ = writeln!(out, "# TYPE {name} counter");
        let _ = writeln!(
            out,
            "{name}{{outcome=\"success\"}} {}",
            self.reloads_ok.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "{name}{{outcome=\"failure\"}} {}",
            self.reloads_failed.load(Ordering::Relaxed)
        );

        let snapshot = self.latency.snapshot();
        let name = format!("{METRIC_PREFIX}_request_latency_seconds");
        let _ = writeln!(
            out,
            "# HELP {name} Time from request receipt to completed prediction"
        );
        let _ = writeln!(out, "# TYPE {name} histogram");
        for (bound, count) in &snapshot.buckets {
            let le = if bound.is_infinite() {
                "+Inf".to_string()
            } else {
                bound.to_string()
            };
            let _ = writeln!(out, "{name}_bucket{{le=\"{le}\"}} {count}");
        }
        let _ = writeln!(out, "{name}_sum {}", snapshot.sum_seconds);
        let _ = writeln!(out, "{name}_count {}", snapshot.count);

        out
    }
}

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {METRIC_PREFIX}_{name} {help}");
    let _ = writeln!(out, "# TYPE {METRIC_PREFIX}_{name} counter");
    let _ = writeln!(out, "{METRIC_PREFIX}_{name} {value}");
}

/// Read a single unlabelled sample from exported text
pub fn parse_sample(exported: &str, series: &str) -> Option<f64> {
    exported
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (name, value) = line.rsplit_once(' ')?;
            (name == series).then(|| value.parse().ok()).flatten()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_export_format() {
        let registry = MetricsRegistry::with_buckets(&[0.01, 0.1]);
        registry.increment_request_count();
        registry.observe_latency(Duration::from_millis(2));

        let text = registry.export();
        assert!(text.contains("# HELP housing_requests_total"));
        assert!(text.contains("# TYPE housing_requests_total counter"));
        assert!(text.contains("housing_requests_total 1\n"));
        assert!(text.contains("# TYPE housing_request_latency_seconds histogram"));
        assert!(text.contains("housing_request_latency_seconds_bucket{le=\"0.01\"} 1"));
        assert!(text.contains("housing_request_latency_seconds_bucket{le=\"+Inf\"} 1"));
        assert!(text.contains("housing_model_reloads_total{outcome=\"failure\"} 0"));
        assert_eq!(
            parse_sample(&text, "housing_request_latency_seconds_count"),
            Some(1.0)
        );
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        registry.increment_request_count();
                        registry.observe_latency(Duration::from_micros(100));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.request_count(), 8000);
        assert_eq!(registry.latency_count(), 8000);
        assert_eq!(
            parse_sample(&registry.export(), "housing_requests_total"),
            Some(8000.0)
        );
    }

    #[test]
    fn test_parse_sample_ignores_comments_and_labels() {
        let text = "# HELP x_total help\nx_total 3\nx_total{a=\"b\"} 9\n";
        assert_eq!(parse_sample(text, "x_total"), Some(3.0));
        assert_eq!(parse_sample(text, "missing"), None);
    }
}
