//! Request routing
//!
//! - `GET  /`        - Welcome message
//! - `GET  /health`  - Liveness plus active model provenance
//! - `POST /predict` - Predict the median house value for one block group
//! - `GET  /metrics` - Prometheus text exposition
//! - `POST /reload`  - Swap in a new model artifact

use super::http::{HttpRequest, HttpResponse};
use crate::model::ModelInfo;
use crate::service::{InferenceService, ServiceError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, warn};

/// Exposition content type understood by Prometheus scrapers
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const WELCOME: &str = "Welcome to California Housing Prediction API";

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    model: ModelInfo,
}

/// Successful prediction body
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: f64,
}

/// Optional reload body
#[derive(Debug, Default, Deserialize)]
struct ReloadRequest {
    path: Option<PathBuf>,
}

/// Route request to the appropriate handler
pub fn route_request(service: &InferenceService, request: &HttpRequest) -> HttpResponse {
    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/") => HttpResponse::ok(&json!({ "message": WELCOME })),
        ("GET", "/health") => handle_health(service),
        ("POST", "/predict") => handle_predict(service, &request.body),
        ("GET", "/metrics") => {
            HttpResponse::text(METRICS_CONTENT_TYPE, service.export_metrics())
        }
        ("POST", "/reload") => handle_reload(service, &request.body),

        (_, "/" | "/health" | "/predict" | "/metrics" | "/reload") => {
            HttpResponse::method_not_allowed()
        }

        _ => HttpResponse::not_found(),
    }
}

fn handle_health(service: &InferenceService) -> HttpResponse {
    HttpResponse::ok(&HealthResponse {
        status: "healthy",
        service: "housing-inference",
        version: env!("CARGO_PKG_VERSION"),
        model: service.model_info(),
    })
}

fn handle_predict(service: &InferenceService, body: &[u8]) -> HttpResponse {
    let payload: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return HttpResponse::bad_request(&json!({
                "error": "invalid_json",
                "message": e.to_string(),
            }));
        }
    };

    match service.predict(&payload) {
        Ok(result) => HttpResponse::ok(&PredictResponse {
            prediction: result.value,
        }),
        Err(ServiceError::Validation(e)) => HttpResponse::bad_request(&json!({
            "error": "validation_failed",
            "message": e.to_string(),
            "violations": e.violations,
        })),
        Err(ServiceError::Prediction(e)) => {
            error!(error = %e, "Prediction request failed");
            HttpResponse::internal_error(&e.to_string())
        }
    }
}

fn handle_reload(service: &InferenceService, body: &[u8]) -> HttpResponse {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ReloadRequest::default()
    } else {
        match serde_json::from_slice::<ReloadRequest>(body) {
            Ok(r) => r,
            Err(e) => {
                return HttpResponse::bad_request(&json!({
                    "error": "invalid_json",
                    "message": e.to_string(),
                }));
            }
        }
    };

    match service.reload(request.path.as_deref()) {
        Ok(info) => HttpResponse::ok(&json!({ "reloaded": true, "model": info })),
        Err(e) => {
            warn!(error = %e, "Reload request failed");
            HttpResponse::unprocessable(&json!({
                "error": "reload_failed",
                "message": e.to_string(),
                "model": service.model_info(),
            }))
        }
    }
}
