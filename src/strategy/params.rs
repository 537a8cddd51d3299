//! Strategy parameters
//!
//! Every parameter kind is a variant of one closed enum, so value checks are
//! exhaustive matches rather than runtime type tests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Parameter validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("Unknown parameter id {0}")]
    UnknownParameter(u32),
    #[error("Expected {expected} values, got {actual}")]
    WrongCount { expected: usize, actual: usize },
    #[error("Parameter '{name}' expects a {expected} value")]
    KindMismatch { name: String, expected: &'static str },
    #[error("Parameter '{name}' value {value} outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: String,
        min: String,
        max: String,
    },
    #[error("Parameter '{name}' does not allow '{value}'")]
    NotAllowed { name: String, value: String },
}

/// Kind and current value of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    Int { value: i64, min: i64, max: i64 },
    Double { value: f64, min: f64, max: f64 },
    Choice { value: String, allowed: Vec<String> },
    Color { value: String },
    Series { color: String, thickness: u32 },
}

impl ParameterKind {
    fn label(&self) -> &'static str {
        match self {
            ParameterKind::Int { .. } => "int",
            ParameterKind::Double { .. } => "double",
            ParameterKind::Choice { .. } => "text",
            ParameterKind::Color { .. } => "color",
            ParameterKind::Series { .. } => "series",
        }
    }
}

/// A value supplied for a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Int(i64),
    Double(f64),
    Text(String),
    Color(String),
    Series { color: String, thickness: u32 },
}

impl ParameterValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

/// Describes one strategy parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
}

impl ParameterDescriptor {
    pub fn int(id: u32, name: &str, description: &str, value: i64, min: i64, max: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            kind: ParameterKind::Int { value, min, max },
        }
    }

    pub fn choice(id: u32, name: &str, description: &str, value: &str, allowed: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            kind: ParameterKind::Choice {
                value: value.to_string(),
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    /// Current value
    pub fn value(&self) -> ParameterValue {
        match &self.kind {
            ParameterKind::Int { value, .. } => ParameterValue::Int(*value),
            ParameterKind::Double { value, .. } => ParameterValue::Double(*value),
            ParameterKind::Choice { value, .. } => ParameterValue::Text(value.clone()),
            ParameterKind::Color { value } => ParameterValue::Color(value.clone()),
            ParameterKind::Series { color, thickness } => ParameterValue::Series {
                color: color.clone(),
                thickness: *thickness,
            },
        }
    }

    /// Validate and store a new value
    pub fn accept(&mut self, value: &ParameterValue) -> Result<(), ParameterError> {
        let name = self.name.trim().trim_end_matches(':').trim().to_string();
        let expected = self.kind.label();

        match (&mut self.kind, value) {
            (ParameterKind::Int { value, min, max }, ParameterValue::Int(v)) => {
                if *v < *min || *v > *max {
                    return Err(ParameterError::OutOfRange {
                        name,
                        value: v.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                *value = *v;
            }
            (ParameterKind::Double { value, min, max }, ParameterValue::Double(v)) => {
                if !v.is_finite() || *v < *min || *v > *max {
                    return Err(ParameterError::OutOfRange {
                        name,
                        value: v.to_string(),
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                *value = *v;
            }
            (ParameterKind::Choice { value, allowed }, ParameterValue::Text(v)) => {
                if !allowed.iter().any(|a| a == v) {
                    return Err(ParameterError::NotAllowed {
                        name,
                        value: v.clone(),
                    });
                }
                *value = v.clone();
            }
            (ParameterKind::Color { value }, ParameterValue::Color(v)) => {
                *value = v.clone();
            }
            (
                ParameterKind::Series { color, thickness },
                ParameterValue::Series {
                    color: c,
                    thickness: t,
                },
            ) => {
                *color = c.clone();
                *thickness = *t;
            }
            _ => return Err(ParameterError::KindMismatch { name, expected }),
        }
        Ok(())
    }
}

/// Apply positional values to a parameter list.
///
/// Either every value is accepted or the list is left unchanged.
pub fn apply_values(
    descriptors: &mut [ParameterDescriptor],
    values: &[ParameterValue],
) -> Result<(), ParameterError> {
    if values.len() != descriptors.len() {
        return Err(ParameterError::WrongCount {
            expected: descriptors.len(),
            actual: values.len(),
        });
    }

    let mut staged = descriptors.to_vec();
    for (descriptor, value) in staged.iter_mut().zip(values) {
        descriptor.accept(value)?;
    }
    descriptors.clone_from_slice(&staged);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_range() {
        let mut p = ParameterDescriptor::int(1, "Quantity: ", "", 1, 0, 100);
        p.accept(&ParameterValue::Int(50)).unwrap();
        assert_eq!(p.value(), ParameterValue::Int(50));

        let err = p.accept(&ParameterValue::Int(101)).unwrap_err();
        assert_eq!(err.to_string(), "Parameter 'Quantity' value 101 outside [0, 100]");
        assert_eq!(p.value(), ParameterValue::Int(50));
    }

    #[test]
    fn test_choice_allowed_values() {
        let mut p = ParameterDescriptor::choice(3, "Order Type: ", "", "Market", &["Market", "Limit"]);
        p.accept(&ParameterValue::Text("Limit".into())).unwrap();
        assert_eq!(p.value().as_text(), Some("Limit"));

        assert!(matches!(
            p.accept(&ParameterValue::Text("Iceberg".into())),
            Err(ParameterError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let mut p = ParameterDescriptor::int(1, "Batch", "", 1, 0, 10);
        assert_eq!(
            p.accept(&ParameterValue::Text("5".into())),
            Err(ParameterError::KindMismatch {
                name: "Batch".into(),
                expected: "int"
            })
        );
    }

    #[test]
    fn test_double_color_series() {
        let mut d = ParameterDescriptor {
            id: 0,
            name: "Deviation".into(),
            description: String::new(),
            kind: ParameterKind::Double {
                value: 2.0,
                min: 0.5,
                max: 4.0,
            },
        };
        d.accept(&ParameterValue::Double(1.6)).unwrap();
        assert!(d.accept(&ParameterValue::Double(f64::NAN)).is_err());

        let mut c = ParameterDescriptor {
            id: 1,
            name: "Color".into(),
            description: String::new(),
            kind: ParameterKind::Color {
                value: "#ff0000".into(),
            },
        };
        c.accept(&ParameterValue::Color("#00ff00".into())).unwrap();
        assert_eq!(c.value(), ParameterValue::Color("#00ff00".into()));

        let mut s = ParameterDescriptor {
            id: 2,
            name: "Band".into(),
            description: String::new(),
            kind: ParameterKind::Series {
                color: "blue".into(),
                thickness: 1,
            },
        };
        s.accept(&ParameterValue::Series {
            color: "red".into(),
            thickness: 3,
        })
        .unwrap();
        assert_eq!(
            s.value(),
            ParameterValue::Series {
                color: "red".into(),
                thickness: 3
            }
        );
    }

    #[test]
    fn test_apply_values_is_all_or_nothing() {
        let mut params = vec![
            ParameterDescriptor::int(0, "A", "", 1, 0, 10),
            ParameterDescriptor::int(1, "B", "", 1, 0, 10),
        ];

        let err = apply_values(&mut params, &[ParameterValue::Int(5), ParameterValue::Int(50)]);
        assert!(err.is_err());
        assert_eq!(params[0].value(), ParameterValue::Int(1));

        assert!(matches!(
            apply_values(&mut params, &[ParameterValue::Int(5)]),
            Err(ParameterError::WrongCount { expected: 2, actual: 1 })
        ));

        apply_values(&mut params, &[ParameterValue::Int(5), ParameterValue::Int(6)]).unwrap();
        assert_eq!(params[1].value(), ParameterValue::Int(6));
    }
}
