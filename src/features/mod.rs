//! Feature schema for the housing model
//!
//! A [`FeatureRecord`] holds the eight block-group features in the fixed
//! order the regressor was trained on. Records can only be built by
//! [`validate`], so holding one means every range constraint passed.

mod validator;

pub use validator::{validate, FieldViolation, ValidationError};

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Number of features consumed by the model
pub const FEATURE_COUNT: usize = 8;

/// Named input features, in model order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureField {
    MedInc,
    HouseAge,
    AveRooms,
    AveBedrms,
    Population,
    AveOccup,
    Latitude,
    Longitude,
}

impl FeatureField {
    /// All fields in model order
    pub const ALL: [FeatureField; FEATURE_COUNT] = [
        FeatureField::MedInc,
        FeatureField::HouseAge,
        FeatureField::AveRooms,
        FeatureField::AveBedrms,
        FeatureField::Population,
        FeatureField::AveOccup,
        FeatureField::Latitude,
        FeatureField::Longitude,
    ];

    /// Wire name of the field
    pub fn name(&self) -> &'static str {
        match self {
            FeatureField::MedInc => "MedInc",
            FeatureField::HouseAge => "HouseAge",
            FeatureField::AveRooms => "AveRooms",
            FeatureField::AveBedrms => "AveBedrms",
            FeatureField::Population => "Population",
            FeatureField::AveOccup => "AveOccup",
            FeatureField::Latitude => "Latitude",
            FeatureField::Longitude => "Longitude",
        }
    }

    /// Position of the field in the model input vector
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Domain constraint for the field
    pub fn constraint(&self) -> Constraint {
        match self {
            FeatureField::MedInc
            | FeatureField::AveRooms
            | FeatureField::AveBedrms
            | FeatureField::AveOccup => Constraint::above(Bound::Exclusive(0.0)),
            FeatureField::HouseAge => {
                Constraint::between(Bound::Inclusive(1.0), Bound::Inclusive(100.0))
            }
            FeatureField::Population => Constraint::above(Bound::Inclusive(1.0)),
            FeatureField::Latitude => {
                Constraint::between(Bound::Inclusive(32.0), Bound::Inclusive(42.0))
            }
            FeatureField::Longitude => {
                Constraint::between(Bound::Inclusive(-125.0), Bound::Inclusive(-113.0))
            }
        }
    }
}

impl fmt::Display for FeatureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One side of a range constraint
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Inclusive(f64),
    Exclusive(f64),
}

impl Bound {
    fn value(&self) -> f64 {
        match self {
            Bound::Inclusive(v) | Bound::Exclusive(v) => *v,
        }
    }
}

/// Range constraint on a single feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl Constraint {
    fn above(lower: Bound) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
        }
    }

    fn between(lower: Bound, upper: Bound) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Check whether a value satisfies the constraint
    pub fn accepts(&self, x: f64) -> bool {
        let lower_ok = match self.lower {
            Some(Bound::Inclusive(b)) => x >= b,
            Some(Bound::Exclusive(b)) => x > b,
            None => true,
        };
        let upper_ok = match self.upper {
            Some(Bound::Inclusive(b)) => x <= b,
            Some(Bound::Exclusive(b)) => x < b,
            None => true,
        };
        lower_ok && upper_ok
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = |b: &Bound| match b {
            Bound::Inclusive(_) => "<=",
            Bound::Exclusive(_) => "<",
        };
        match (&self.lower, &self.upper) {
            (Some(lo), Some(hi)) => {
                write!(f, "{} {} x {} {}", lo.value(), op(lo), op(hi), hi.value())
            }
            (Some(lo), None) => {
                let op = match lo {
                    Bound::Inclusive(_) => ">=",
                    Bound::Exclusive(_) => ">",
                };
                write!(f, "x {} {}", op, lo.value())
            }
            (None, Some(hi)) => write!(f, "x {} {}", op(hi), hi.value()),
            (None, None) => f.write_str("any"),
        }
    }
}

/// Validated feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRecord {
    values: [f64; FEATURE_COUNT],
}

impl FeatureRecord {
    pub(crate) fn from_validated(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Value of a single field
    pub fn get(&self, field: FeatureField) -> f64 {
        self.values[field.index()]
    }

    /// Ordered input vector for the model
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        self.values
    }

    /// Compact JSON form used in audit sinks
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Serialize for FeatureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for field in FeatureField::ALL {
            map.serialize_entry(field.name(), &self.get(field))?;
        }
        map.end()
    }
}
