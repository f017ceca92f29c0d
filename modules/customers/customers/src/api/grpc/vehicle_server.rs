//! `crm.v1.VehicleService` handlers.

use std::sync::Arc;

use crm_transport_grpc::call_context;
use customers_sdk::proto::{
    CreateVehicleRequest, CreateVehicleResponse, DeleteVehicleRequest, DeleteVehicleResponse,
    GetVehicleRequest, GetVehicleResponse, ListVehiclesRequest, ListVehiclesResponse,
    UpdateVehicleRequest, UpdateVehicleResponse, VehicleService,
};
use tonic::{Request, Response, Status};

use super::mapping::{new_vehicle, require_id, vehicle_filter, vehicle_to_proto, vehicle_update};
use super::pagination::WirePage;
use crate::config::CustomersConfig;
use crate::domain::service::VehicleService as Vehicles;

#[derive(Clone)]
pub struct VehicleGrpcService {
    vehicles: Arc<Vehicles>,
    limits: CustomersConfig,
}

impl VehicleGrpcService {
    #[must_use]
    pub fn new(vehicles: Arc<Vehicles>, limits: CustomersConfig) -> Self {
        Self { vehicles, limits }
    }
}

#[tonic::async_trait]
impl VehicleService for VehicleGrpcService {
    async fn list_vehicles(
        &self,
        request: Request<ListVehiclesRequest>,
    ) -> Result<Response<ListVehiclesResponse>, Status> {
        let ctx = call_context(&request)?;
        let filter = vehicle_filter(request.into_inner(), &self.limits)?;

        let page = self.vehicles.list_vehicles(&ctx, &filter).await?;
        let wire = WirePage::from(&page);

        Ok(Response::new(ListVehiclesResponse {
            vehicles: page.items.into_iter().map(vehicle_to_proto).collect(),
            total: wire.total,
            page: wire.page,
            limit: wire.limit,
            total_pages: wire.total_pages,
        }))
    }

    async fn get_vehicle(
        &self,
        request: Request<GetVehicleRequest>,
    ) -> Result<Response<GetVehicleResponse>, Status> {
        let ctx = call_context(&request)?;
        let id = require_id("id", request.get_ref().id)?;

        let vehicle = self.vehicles.get_vehicle(&ctx, id).await?;

        Ok(Response::new(GetVehicleResponse {
            vehicle: Some(vehicle_to_proto(vehicle)),
        }))
    }

    async fn create_vehicle(
        &self,
        request: Request<CreateVehicleRequest>,
    ) -> Result<Response<CreateVehicleResponse>, Status> {
        let ctx = call_context(&request)?;
        let new = new_vehicle(request.into_inner(), false)?;

        let vehicle = self.vehicles.create_vehicle(&ctx, new).await?;

        Ok(Response::new(CreateVehicleResponse {
            vehicle: Some(vehicle_to_proto(vehicle)),
        }))
    }

    async fn update_vehicle(
        &self,
        request: Request<UpdateVehicleRequest>,
    ) -> Result<Response<UpdateVehicleResponse>, Status> {
        let ctx = call_context(&request)?;
        let req = request.into_inner();
        let id = require_id("id", req.id)?;
        let update = vehicle_update(req)?;

        let vehicle = self.vehicles.update_vehicle(&ctx, id, update).await?;

        Ok(Response::new(UpdateVehicleResponse {
            vehicle: Some(vehicle_to_proto(vehicle)),
        }))
    }

    async fn delete_vehicle(
        &self,
        request: Request<DeleteVehicleRequest>,
    ) -> Result<Response<DeleteVehicleResponse>, Status> {
        let ctx = call_context(&request)?;
        let id = require_id("id", request.get_ref().id)?;

        self.vehicles.delete_vehicle(&ctx, id).await?;

        Ok(Response::new(DeleteVehicleResponse { success: true }))
    }
}
