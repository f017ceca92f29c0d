mod customers;
mod vehicles;

pub use customers::CustomerService;
pub use vehicles::VehicleService;

use std::sync::Arc;

use crm_security::CallContext;

use super::error::DomainError;
use super::repo::CustomerRepository;

/// Load a customer that another record is about to reference.
async fn referenced_customer(
    customers: &Arc<dyn CustomerRepository>,
    ctx: &CallContext,
    customer_id: i64,
) -> Result<customers_sdk::Customer, DomainError> {
    customers.get(ctx, customer_id).await.map_err(|e| {
        if e.is_not_found() {
            DomainError::not_found("customer", customer_id)
        } else {
            e
        }
    })
}
