use tonic::Status;

use crate::domain::error::DomainError;

const NOT_FOUND: &str = "not found";
const TENANT_REQUIRED: &str = "tenant_id is required";
const INTERNAL: &str = "internal server error";

/// Map a domain error to the gRPC status returned to the caller.
///
/// Not-found replies never say which entity or tenant was involved, so a caller
/// cannot probe for rows owned by another tenant. Storage failures are logged
/// here and replaced by a generic message.
pub fn domain_error_to_status(e: &DomainError) -> Status {
    match e {
        DomainError::NotFound { .. } => Status::not_found(NOT_FOUND),
        DomainError::Validation { field, message } => {
            Status::invalid_argument(format!("{field}: {message}"))
        }
        DomainError::Duplicate { field, value } => {
            Status::already_exists(format!("{field} '{value}' already exists"))
        }
        DomainError::MissingTenant => Status::invalid_argument(TENANT_REQUIRED),
        DomainError::Database(err) => {
            tracing::error!(error = %format!("{err:#}"), "Database error occurred");
            Status::internal(INTERNAL)
        }
    }
}

/// Lets handlers use `?` on service calls.
impl From<DomainError> for Status {
    fn from(e: DomainError) -> Self {
        domain_error_to_status(&e)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use tonic::Code;
    use tracing_test::traced_test;

    #[test]
    fn not_found_hides_entity_and_id() {
        let status = Status::from(DomainError::not_found("customer", 42));
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "not found");
    }

    #[test]
    fn validation_names_the_field() {
        let status = Status::from(DomainError::validation("email", "invalid email format"));
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "email: invalid email format");
    }

    #[test]
    fn duplicate_carries_field_and_value() {
        let status = Status::from(DomainError::duplicate("vin", "1HGCM82633A004352"));
        assert_eq!(status.code(), Code::AlreadyExists);
        assert_eq!(status.message(), "vin '1HGCM82633A004352' already exists");
    }

    #[test]
    fn missing_tenant_is_invalid_argument() {
        let status = Status::from(DomainError::MissingTenant);
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "tenant_id is required");
    }

    #[test]
    #[traced_test]
    fn storage_failure_is_logged_not_leaked() {
        let err = DomainError::Database(anyhow::anyhow!("connection refused on 10.0.0.7"));
        let status = Status::from(err);
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "internal server error");
        assert!(logs_contain("connection refused on 10.0.0.7"));
    }
}
