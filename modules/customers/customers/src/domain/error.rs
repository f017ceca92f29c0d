use crm_security::MissingTenant;
use customers_sdk::CustomersError;

use super::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error on field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("{field} '{value}' already exists")]
    Duplicate { field: &'static str, value: String },

    #[error("tenant context is required")]
    MissingTenant,

    #[error("Database error: {0:#}")]
    Database(#[from] anyhow::Error),
}

impl DomainError {
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

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<MissingTenant> for DomainError {
    fn from(_: MissingTenant) -> Self {
        Self::MissingTenant
    }
}

impl From<ValidationError> for DomainError {
    fn from(e: ValidationError) -> Self {
        Self::Validation {
            field: e.field.to_owned(),
            message: e.message,
        }
    }
}

impl From<DomainError> for CustomersError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound { entity, id } => Self::NotFound { entity, id },
            DomainError::Validation { field, message } => Self::Validation { field, message },
            DomainError::Duplicate { field, value } => Self::Duplicate { field, value },
            DomainError::MissingTenant => Self::MissingTenant,
            DomainError::Database(err) => Self::Internal(format!("{err:#}")),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn database_errors_become_internal_with_context_chain() {
        let err = DomainError::Database(
            anyhow::anyhow!("connection reset").context("failed to create customer"),
        );
        assert_eq!(
            CustomersError::from(err),
            CustomersError::Internal("failed to create customer: connection reset".to_owned())
        );
    }

    #[test]
    fn validation_error_keeps_field() {
        let err: DomainError = ValidationError::new("vin", "must be 17 characters").into();
        assert!(matches!(
            CustomersError::from(err),
            CustomersError::Validation { ref field, .. } if field == "vin"
        ));
    }
}
