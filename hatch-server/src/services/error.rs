use crate::db::StoreError;
use crate::models::ValidationError;

/// Domain error kinds produced by services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{resource} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("{message}")]
    Conflict { message: String },

    /// Store unreachable
    #[error("service unavailable: {message}")]
    Unavailable { message: String },

    #[error("store error: {0}")]
    Store(StoreError),
}

pub const EMAIL_CONFLICT: &str = "User with this email already exists";

impl ServiceError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            // The only unique index is on email
            StoreError::UniqueViolation { .. } => Self::conflict(EMAIL_CONFLICT),
            StoreError::Unavailable(message) => Self::Unavailable { message },
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_kinds() {
        let conflict = ServiceError::from(StoreError::UniqueViolation {
            constraint: "ix_users_email".into(),
        });
        assert_eq!(conflict.to_string(), EMAIL_CONFLICT);

        let down = ServiceError::from(StoreError::Unavailable("refused".into()));
        assert!(matches!(down, ServiceError::Unavailable { .. }));
    }

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(ServiceError::not_found("User", 7).to_string(), "User not found");
    }
}
