//! Postgres storage for customers, vehicles and notes.
//!
//! Every statement goes through [`TenantScopedStore`], so the caller's tenant is
//! bound to the connection before the SQL runs and row-level security does the
//! filtering. Queries therefore never add a `tenant_id` predicate themselves.

use crm_db::StoreError;

use crate::domain::error::DomainError;

pub mod customers_repo;
pub mod migrations;
pub mod notes_repo;
pub mod rows;
pub mod vehicles_repo;


pub use customers_repo::PgCustomerRepository;
pub use notes_repo::PgNoteRepository;
pub use vehicles_repo::PgVehicleRepository;

pub const CUSTOMERS_EMAIL_KEY: &str = "customers_tenant_email_key";
pub const CUSTOMERS_TAX_ID_KEY: &str = "customers_tenant_tax_id_key";
pub const VEHICLES_VIN_KEY: &str = "vehicles_vin_key";
pub const VEHICLES_LICENSE_PLATE_KEY: &str = "vehicles_license_plate_key";

/// Wrap a storage failure with the operation that hit it.
#[must_use]
pub fn storage_error(op: &'static str, err: StoreError) -> DomainError {
    if err.is_missing_tenant() {
        return DomainError::MissingTenant;
    }
    DomainError::Database(anyhow::Error::new(err).context(op))
}

/// `COUNT(*)` comes back as `BIGINT`; it is never negative.
fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or_default()
}

/// `%input%` with `LIKE` metacharacters escaped.
fn contains_pattern(input: &str) -> String {
    format!("%{}%", crm_db::escape_like(input))
}
