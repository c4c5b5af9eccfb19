//! Validation error types

use std::fmt;

use serde::Serialize;

/// Validation error for request input and domain values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// String doesn't match required format
    InvalidFormat { field: &'static str, reason: &'static str },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Number outside the accepted range
    OutOfRange { field: &'static str, min: u64, max: u64 },

    /// Body or query string could not be parsed at all
    Malformed { reason: String },

    /// Several fields failed at once
    Multiple(Vec<ValidationError>),
}

/// One entry of the `fields` list in the error envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    /// Combine errors; a single error is returned as-is.
    pub fn combine(mut errors: Vec<ValidationError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Empty { field }
            | Self::TooLong { field, .. }
            | Self::InvalidFormat { field, .. }
            | Self::InvalidVariant { field, .. }
            | Self::OutOfRange { field, .. } => Some(field),
            Self::Malformed { .. } | Self::Multiple(_) => None,
        }
    }

    /// Per-field details, flattened.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match self {
            Self::Multiple(errors) => errors.iter().flat_map(Self::field_errors).collect(),
            other => other
                .field()
                .map(|field| FieldError {
                    field: field.to_string(),
                    message: other.to_string(),
                })
                .into_iter()
                .collect(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::InvalidFormat { field, reason } => write!(f, "{}: {}", field, reason),
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::OutOfRange { field, min, max } => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
            Self::Malformed { reason } => write!(f, "malformed request: {}", reason),
            Self::Multiple(errors) => {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                write!(f, "{}", messages.join("; "))
            }
        }
    }
}

impl std::error::Error for ValidationError {}
