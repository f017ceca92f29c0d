//! Storage ports. Every call is scoped to the tenant carried by the context;
//! implementations must fail with `DomainError::MissingTenant` before touching
//! storage when there is none.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_security::CallContext;
use customers_sdk::{
    Customer, CustomerFilter, CustomerNote, CustomerSearch, CustomerType, NoteFilter, NoteType,
    Page, Vehicle, VehicleFilter,
};

use super::error::DomainError;

pub type RepoResult<T> = Result<T, DomainError>;

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Insert and return the stored row (id and timestamps assigned).
    async fn create(&self, ctx: &CallContext, customer: &Customer) -> RepoResult<Customer>;

    async fn get(&self, ctx: &CallContext, id: i64) -> RepoResult<Customer>;

    async fn update(&self, ctx: &CallContext, customer: &Customer) -> RepoResult<Customer>;

    async fn delete(&self, ctx: &CallContext, id: i64) -> RepoResult<()>;

    async fn list(&self, ctx: &CallContext, filter: &CustomerFilter) -> RepoResult<Page<Customer>>;

    /// Active customers only, best matches first.
    async fn search(&self, ctx: &CallContext, search: &CustomerSearch)
    -> RepoResult<Vec<Customer>>;

    async fn get_by_email(&self, ctx: &CallContext, email: &str) -> RepoResult<Customer>;

    async fn get_by_tax_id(&self, ctx: &CallContext, tax_id: &str) -> RepoResult<Customer>;

    async fn list_by_type(
        &self,
        ctx: &CallContext,
        customer_type: CustomerType,
        page: u32,
        limit: u32,
    ) -> RepoResult<Page<Customer>>;

    async fn list_inactive(
        &self,
        ctx: &CallContext,
        page: u32,
        limit: u32,
    ) -> RepoResult<Page<Customer>>;

    async fn count(&self, ctx: &CallContext) -> RepoResult<u64>;

    async fn count_active(&self, ctx: &CallContext) -> RepoResult<u64>;

    async fn count_by_type(&self, ctx: &CallContext, customer_type: CustomerType)
    -> RepoResult<u64>;

    async fn exists_by_email(
        &self,
        ctx: &CallContext,
        email: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool>;

    async fn exists_by_tax_id(
        &self,
        ctx: &CallContext,
        tax_id: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool>;
}

#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn create(&self, ctx: &CallContext, vehicle: &Vehicle) -> RepoResult<Vehicle>;

    /// All or nothing: one tenant-bound transaction.
    async fn create_batch(&self, ctx: &CallContext, vehicles: &[Vehicle])
    -> RepoResult<Vec<Vehicle>>;

    async fn get(&self, ctx: &CallContext, id: i64) -> RepoResult<Vehicle>;

    async fn update(&self, ctx: &CallContext, vehicle: &Vehicle) -> RepoResult<Vehicle>;

    async fn delete(&self, ctx: &CallContext, id: i64) -> RepoResult<()>;

    async fn list(&self, ctx: &CallContext, filter: &VehicleFilter) -> RepoResult<Page<Vehicle>>;

    /// Up to 100 vehicles of one customer.
    async fn list_by_customer(&self, ctx: &CallContext, customer_id: i64)
    -> RepoResult<Vec<Vehicle>>;

    async fn list_active_by_customer(
        &self,
        ctx: &CallContext,
        customer_id: i64,
    ) -> RepoResult<Vec<Vehicle>>;

    async fn get_by_vin(&self, ctx: &CallContext, vin: &str) -> RepoResult<Vehicle>;

    async fn get_by_license_plate(&self, ctx: &CallContext, plate: &str) -> RepoResult<Vehicle>;

    async fn search_by_make_model(
        &self,
        ctx: &CallContext,
        make: &str,
        model: &str,
        year: Option<i32>,
    ) -> RepoResult<Vec<Vehicle>>;

    async fn find_compatible(
        &self,
        ctx: &CallContext,
        make: &str,
        model: &str,
        year_from: i32,
        year_to: i32,
    ) -> RepoResult<Vec<Vehicle>>;

    async fn list_by_make_model_year(
        &self,
        ctx: &CallContext,
        make: &str,
        model: &str,
        year: i32,
    ) -> RepoResult<Vec<Vehicle>>;

    async fn count(&self, ctx: &CallContext) -> RepoResult<u64>;

    async fn count_by_customer(&self, ctx: &CallContext, customer_id: i64) -> RepoResult<u64>;

    async fn count_active(&self, ctx: &CallContext) -> RepoResult<u64>;

    async fn exists_by_vin(
        &self,
        ctx: &CallContext,
        vin: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool>;

    async fn exists_by_license_plate(
        &self,
        ctx: &CallContext,
        plate: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool>;
}

/// Notes are append-only: there is no update.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn create(&self, ctx: &CallContext, note: &CustomerNote) -> RepoResult<CustomerNote>;

    async fn get(&self, ctx: &CallContext, id: i64) -> RepoResult<CustomerNote>;

    async fn delete(&self, ctx: &CallContext, id: i64) -> RepoResult<()>;

    async fn list(&self, ctx: &CallContext, filter: &NoteFilter) -> RepoResult<Page<CustomerNote>>;

    async fn list_by_customer(
        &self,
        ctx: &CallContext,
        customer_id: i64,
    ) -> RepoResult<Vec<CustomerNote>>;

    async fn list_by_customer_and_type(
        &self,
        ctx: &CallContext,
        customer_id: i64,
        note_type: NoteType,
    ) -> RepoResult<Vec<CustomerNote>>;

    async fn list_by_staff(
        &self,
        ctx: &CallContext,
        staff_id: &str,
        page: u32,
        limit: u32,
    ) -> RepoResult<Page<CustomerNote>>;

    async fn list_recent(&self, ctx: &CallContext, limit: u32) -> RepoResult<Vec<CustomerNote>>;

    async fn list_by_date_range(
        &self,
        ctx: &CallContext,
        customer_id: Option<i64>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> RepoResult<Vec<CustomerNote>>;

    async fn list_recent_by_customer(
        &self,
        ctx: &CallContext,
        customer_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<CustomerNote>>;

    async fn count(&self, ctx: &CallContext) -> RepoResult<u64>;

    async fn count_by_customer(&self, ctx: &CallContext, customer_id: i64) -> RepoResult<u64>;
}
