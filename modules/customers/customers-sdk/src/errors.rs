use thiserror::Error;

/// Errors surfaced by the customers service to its callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustomersError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{field} '{value}' already exists")]
    Duplicate { field: &'static str, value: String },

    #[error("tenant context is required")]
    MissingTenant,

    #[error("internal error: {0}")]
    Internal(String),
}

impl CustomersError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn duplicate(field: &'static str, value: impl Into<String>) -> Self {
        Self::Duplicate {
            field,
            value: value.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
