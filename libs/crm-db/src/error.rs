use std::time::Duration;

use crm_security::MissingTenant;
use thiserror::Error;

/// Errors of the pool handle and administrative helpers.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Unknown DSN: {0}")]
    UnknownDsn(String),

    #[error("healthcheck timed out after {0:?}")]
    HealthcheckTimeout(Duration),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Sea(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Migration(#[from] crate::migration_runner::MigrationError),
}

/// Errors of tenant-scoped statement execution.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The call context carries no tenant; nothing was sent to the database.
    #[error(transparent)]
    MissingTenant(#[from] MissingTenant),

    #[error("failed to acquire connection: {0}")]
    Acquire(#[source] sqlx::Error),

    /// The session directive failed; the statement was not attempted.
    #[error("failed to bind tenant to session: {0}")]
    TenantBinding(#[source] sqlx::Error),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("transaction failed: {0}")]
    Tx(#[source] sqlx::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_missing_tenant(&self) -> bool {
        matches!(self, Self::MissingTenant(_))
    }

    /// Name of the violated unique constraint, if this is a unique violation.
    #[must_use]
    pub fn unique_violation(&self) -> Option<&str> {
        match self {
            Self::Query(e) | Self::Tx(e) => crate::violated_unique_constraint(e),
            _ => None,
        }
    }
}
