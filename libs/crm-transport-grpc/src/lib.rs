#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
//! gRPC plumbing shared by the CRM services.
//!
//! The server stack is composed outermost to innermost as
//! tenant extraction -> request logging -> panic containment -> handler,
//! see [`layers::server_stack`].

pub mod client;
pub mod layers;
pub mod tenant;

pub use crm_security::constants::{
    REQUEST_ID_METADATA_KEY, STAFF_ID_METADATA_KEY, STAFF_NAME_METADATA_KEY, TENANT_METADATA_KEY,
};
pub use tenant::{
    TenantInterceptor, attach_tenant, call_context, context_from_metadata, extract_tenant,
};
