#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Tenant identity and the per-call context that carries it.
//!
//! A [`CallContext`] is created once per inbound call by the transport layer and
//! handed down by reference. It is immutable: attaching a tenant produces a new
//! value and leaves the original untouched, so no call can observe another
//! call's tenant.

pub mod constants;
pub mod context;
pub mod tenant;

pub use context::{CallContext, CallContextBuilder, MissingTenant, StaffRef};
pub use tenant::{TenantId, TenantIdError};
