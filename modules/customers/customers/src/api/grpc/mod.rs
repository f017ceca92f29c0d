//! gRPC adapter for package `crm.v1`.
//!
//! Handlers read the [`crm_security::CallContext`] installed by the tenant
//! interceptor, decode the request, call a domain service and encode the
//! result. Domain errors become gRPC statuses in [`error`] and nowhere else.

mod customer_server;
mod error;
mod mapping;
mod pagination;
mod vehicle_server;

pub use customer_server::CustomerGrpcService;
pub use error::domain_error_to_status;
pub use vehicle_server::VehicleGrpcService;
