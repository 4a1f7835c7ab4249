//! Request payload validation
//!
//! Every field is checked and all violations are reported together, in
//! model order, so a client can fix a payload in one round trip.

use super::{FeatureField, FeatureRecord, FEATURE_COUNT};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Rule name for a missing field
pub const RULE_REQUIRED: &str = "required";

/// Rule name for a value that does not coerce to a finite number
pub const RULE_TYPE: &str = "type";

/// A single violated constraint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    /// Field name as sent on the wire
    pub field: String,
    /// Offending value (`null` when missing)
    pub value: Value,
    /// Violated rule
    pub rule: String,
}

impl FieldViolation {
    fn new(field: impl Into<String>, value: Value, rule: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value,
            rule: rule.into(),
        }
    }
}

/// Feature payload rejected by validation
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("invalid feature record: {}", describe(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    /// Whether a given field is among the violations
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} ({}: {})", v.field, v.rule, v.value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coerce a JSON value to a finite float.
///
/// Numbers and numeric strings are accepted.
fn coerce(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    x.is_finite().then_some(x)
}

/// Parse and range-check a raw feature payload
pub fn validate(raw: &Value) -> Result<FeatureRecord, ValidationError> {
    let object = match raw.as_object() {
        Some(object) => object,
        None => {
            return Err(ValidationError {
                violations: vec![FieldViolation::new("body", raw.clone(), "object")],
            });
        }
    };

    let mut values = [0.0; FEATURE_COUNT];
    let mut violations = Vec::new();

    for field in FeatureField::ALL {
        let Some(value) = object.get(field.name()) else {
            violations.push(FieldViolation::new(field.name(), Value::Null, RULE_REQUIRED));
            continue;
        };

        let Some(x) = coerce(value) else {
            violations.push(FieldViolation::new(field.name(), value.clone(), RULE_TYPE));
            continue;
        };

        let constraint = field.constraint();
        if !constraint.accepts(x) {
            violations.push(FieldViolation::new(
                field.name(),
                value.clone(),
                constraint.to_string(),
            ));
            continue;
        }

        values[field.index()] = x;
    }

    if violations.is_empty() {
        Ok(FeatureRecord::from_validated(values))
    } else {
        debug!(violations = violations.len(), "Feature record rejected");
        Err(ValidationError { violations })
    }
}
