//! Customers SDK
//!
//! Public contract of the customers module:
//! - Models for customers, vehicles and notes ([`Customer`], [`Vehicle`], [`CustomerNote`])
//! - Filters and pagination ([`CustomerFilter`], [`VehicleFilter`], [`NoteFilter`], [`Page`])
//! - The typed property bag used for preferences and metadata ([`PropertyValue`])
//! - The public error type ([`CustomersError`])
//! - gRPC messages and service stubs for package `crm.v1` ([`proto`])

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod errors;
pub mod filters;
pub mod limits;
pub mod models;
pub mod property;
pub mod proto;

pub use errors::CustomersError;
pub use filters::{
    CustomerFilter, CustomerSearch, DEFAULT_PAGE_LIMIT, NoteFilter, Page, SearchField, SortField,
    SortOrder, VehicleFilter, page_window,
};
pub use models::{
    CompatibilityInfo, Customer, CustomerNote, CustomerType, CustomerUpdate, NewCustomer,
    NewCustomerNote, NewVehicle, NoteType, ParseEnumError, Vehicle, VehicleUpdate,
};
pub use property::{PropertyBag, PropertyValue};

/// Fully qualified gRPC service names.
pub const CUSTOMER_SERVICE_NAME: &str = "crm.v1.CustomerService";
pub const VEHICLE_SERVICE_NAME: &str = "crm.v1.VehicleService";
