//! Customers module implementation.
//!
//! The public contract is defined in `customers-sdk` and re-exported here.
//! [`CustomersModule`] wires repositories, services and the gRPC servers on top
//! of a tenant-scoped Postgres store.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub use customers_sdk::{
    CompatibilityInfo, Customer, CustomerFilter, CustomerNote, CustomerSearch, CustomerType,
    CustomerUpdate, CustomersError, NewCustomer, NewCustomerNote, NewVehicle, NoteFilter,
    NoteType, Page, Vehicle, VehicleFilter, VehicleUpdate,
};

pub mod config;
pub mod module;
pub use config::CustomersConfig;
pub use module::CustomersModule;

#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
