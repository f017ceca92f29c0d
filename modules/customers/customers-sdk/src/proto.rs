//! Wire messages and service stubs for package `crm.v1`, generated from
//! `proto/crm/v1/crm.proto`.
//!
//! Empty strings on the wire stand for absent optional values.

#[allow(clippy::all, clippy::pedantic, rust_2018_idioms)]
mod crm_v1 {
    tonic::include_proto!("crm.v1");
}

pub use crm_v1::customer_service_client::CustomerServiceClient;
pub use crm_v1::customer_service_server::{CustomerService, CustomerServiceServer};
pub use crm_v1::vehicle_service_client::VehicleServiceClient;
pub use crm_v1::vehicle_service_server::{VehicleService, VehicleServiceServer};
pub use crm_v1::{
    AddCustomerNoteRequest, AddCustomerNoteResponse, CreateCustomerRequest,
    CreateCustomerResponse, CreateVehicleRequest, CreateVehicleResponse, Customer,
    CustomerHistoryItem, CustomerNote, DeleteCustomerRequest, DeleteCustomerResponse,
    DeleteVehicleRequest, DeleteVehicleResponse, GetCustomerHistoryRequest,
    GetCustomerHistoryResponse, GetCustomerRequest, GetCustomerResponse, GetVehicleRequest,
    GetVehicleResponse, ListCustomersRequest, ListCustomersResponse, ListVehiclesRequest,
    ListVehiclesResponse, SearchCustomersRequest, SearchCustomersResponse, UpdateCustomerRequest,
    UpdateCustomerResponse, UpdateVehicleRequest, UpdateVehicleResponse, Vehicle,
};
