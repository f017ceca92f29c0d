//! `crm.v1.CustomerService` handlers.

use std::sync::Arc;

use crm_security::CallContext;
use crm_security::constants::{SYSTEM_STAFF_ID, SYSTEM_STAFF_NAME};
use crm_transport_grpc::call_context;
use customers_sdk::NewCustomerNote;
use customers_sdk::proto::{
    AddCustomerNoteRequest, AddCustomerNoteResponse, CreateCustomerRequest,
    CreateCustomerResponse, CustomerService, DeleteCustomerRequest, DeleteCustomerResponse,
    GetCustomerHistoryRequest, GetCustomerHistoryResponse, GetCustomerRequest,
    GetCustomerResponse, ListCustomersRequest, ListCustomersResponse, SearchCustomersRequest,
    SearchCustomersResponse, UpdateCustomerRequest, UpdateCustomerResponse,
};
use tonic::{Request, Response, Status};

use super::mapping::{
    customer_filter, customer_search, customer_to_proto, customer_update, datetime, new_customer,
    new_vehicle, note_to_proto, note_type, require_id,
};
use super::pagination::WirePage;
use crate::config::CustomersConfig;
use crate::domain::error::DomainError;
use crate::domain::service::{CustomerService as Customers, VehicleService as Vehicles};

/// gRPC service implementation that wraps the customer and vehicle services.
#[derive(Clone)]
pub struct CustomerGrpcService {
    customers: Arc<Customers>,
    vehicles: Arc<Vehicles>,
    limits: CustomersConfig,
}

impl CustomerGrpcService {
    #[must_use]
    pub fn new(customers: Arc<Customers>, vehicles: Arc<Vehicles>, limits: CustomersConfig) -> Self {
        Self {
            customers,
            vehicles,
            limits,
        }
    }
}

/// Note author from call metadata, or the system user when the caller sent none.
fn note_author(ctx: &CallContext) -> (String, String) {
    ctx.staff().map_or_else(
        || (SYSTEM_STAFF_ID.to_owned(), SYSTEM_STAFF_NAME.to_owned()),
        |staff| (staff.id.clone(), staff.name.clone()),
    )
}

#[tonic::async_trait]
impl CustomerService for CustomerGrpcService {
    async fn list_customers(
        &self,
        request: Request<ListCustomersRequest>,
    ) -> Result<Response<ListCustomersResponse>, Status> {
        let ctx = call_context(&request)?;
        let filter = customer_filter(request.into_inner(), &self.limits)?;

        let page = self.customers.list_customers(&ctx, &filter).await?;
        let wire = WirePage::from(&page);

        Ok(Response::new(ListCustomersResponse {
            customers: page.items.into_iter().map(customer_to_proto).collect(),
            total: wire.total,
            page: wire.page,
            limit: wire.limit,
            total_pages: wire.total_pages,
        }))
    }

    async fn get_customer(
        &self,
        request: Request<GetCustomerRequest>,
    ) -> Result<Response<GetCustomerResponse>, Status> {
        let ctx = call_context(&request)?;
        let req = request.into_inner();
        let id = require_id("id", req.id)?;

        let customer = self
            .customers
            .get_customer(&ctx, id, req.include_vehicles, req.include_notes)
            .await?;

        Ok(Response::new(GetCustomerResponse {
            customer: Some(customer_to_proto(customer)),
        }))
    }

    async fn create_customer(
        &self,
        request: Request<CreateCustomerRequest>,
    ) -> Result<Response<CreateCustomerResponse>, Status> {
        let ctx = call_context(&request)?;
        let mut req = request.into_inner();

        let nested = std::mem::take(&mut req.vehicles)
            .into_iter()
            .map(|v| new_vehicle(v, true))
            .collect::<Result<Vec<_>, DomainError>>()?;
        let new = new_customer(req)?;

        let mut customer = self.customers.create_customer(&ctx, new).await?;
        if !nested.is_empty() {
            let vehicles = self
                .vehicles
                .create_vehicles_for_customer(&ctx, customer.id, nested)
                .await?;
            customer.vehicles = Some(vehicles);
        }

        Ok(Response::new(CreateCustomerResponse {
            customer: Some(customer_to_proto(customer)),
        }))
    }

    async fn update_customer(
        &self,
        request: Request<UpdateCustomerRequest>,
    ) -> Result<Response<UpdateCustomerResponse>, Status> {
        let ctx = call_context(&request)?;
        let req = request.into_inner();
        let id = require_id("id", req.id)?;
        let update = customer_update(req)?;

        let customer = self.customers.update_customer(&ctx, id, update).await?;

        Ok(Response::new(UpdateCustomerResponse {
            customer: Some(customer_to_proto(customer)),
        }))
    }

    async fn delete_customer(
        &self,
        request: Request<DeleteCustomerRequest>,
    ) -> Result<Response<DeleteCustomerResponse>, Status> {
        let ctx = call_context(&request)?;
        let id = require_id("id", request.get_ref().id)?;

        self.customers.delete_customer(&ctx, id).await?;

        Ok(Response::new(DeleteCustomerResponse { success: true }))
    }

    async fn search_customers(
        &self,
        request: Request<SearchCustomersRequest>,
    ) -> Result<Response<SearchCustomersResponse>, Status> {
        let ctx = call_context(&request)?;
        let search = customer_search(request.into_inner(), &self.limits);

        let found = self.customers.search_customers(&ctx, &search).await?;

        Ok(Response::new(SearchCustomersResponse {
            total: i32::try_from(found.len()).unwrap_or(i32::MAX),
            customers: found.into_iter().map(customer_to_proto).collect(),
        }))
    }

    async fn add_customer_note(
        &self,
        request: Request<AddCustomerNoteRequest>,
    ) -> Result<Response<AddCustomerNoteResponse>, Status> {
        let ctx = call_context(&request)?;
        let req = request.into_inner();
        let customer_id = require_id("customer_id", req.customer_id)?;
        if req.note.trim().is_empty() {
            return Err(DomainError::validation("note", "is required").into());
        }
        let (staff_id, staff_name) = note_author(&ctx);

        let note = self
            .customers
            .add_customer_note(
                &ctx,
                NewCustomerNote {
                    customer_id,
                    staff_id,
                    staff_name,
                    note_type: note_type(&req.r#type)?,
                    note: req.note,
                },
            )
            .await?;

        Ok(Response::new(AddCustomerNoteResponse {
            note: Some(note_to_proto(note)),
        }))
    }

    /// No sales or appointment source is connected yet, so the history is
    /// always empty once the request itself is well formed.
    async fn get_customer_history(
        &self,
        request: Request<GetCustomerHistoryRequest>,
    ) -> Result<Response<GetCustomerHistoryResponse>, Status> {
        call_context(&request)?;
        let req = request.into_inner();
        require_id("customer_id", req.customer_id)?;
        if let Some(ts) = &req.date_from {
            datetime("date_from", ts)?;
        }
        if let Some(ts) = &req.date_to {
            datetime("date_to", ts)?;
        }

        Ok(Response::new(GetCustomerHistoryResponse {
            items: Vec::new(),
            total: 0,
        }))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crm_security::TenantId;

    #[test]
    fn author_falls_back_to_system_user() {
        let ctx = CallContext::anonymous();
        assert_eq!(
            note_author(&ctx),
            ("system".to_owned(), "System User".to_owned())
        );

        let tenant = TenantId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let ctx = CallContext::builder()
            .tenant(tenant)
            .staff("s-17", "Dana")
            .build();
        assert_eq!(note_author(&ctx), ("s-17".to_owned(), "Dana".to_owned()));
    }
}
