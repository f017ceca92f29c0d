use std::collections::HashSet;
use std::sync::Arc;

use crm_security::CallContext;
use customers_sdk::limits::COMPATIBLE_YEAR_RANGE;
use customers_sdk::{CompatibilityInfo, NewVehicle, Page, Vehicle, VehicleFilter, VehicleUpdate};
use tracing::{info, instrument};

use super::referenced_customer;
use crate::domain::error::DomainError;
use crate::domain::repo::{CustomerRepository, VehicleRepository};
use crate::domain::validation::{validate_vehicle, validate_vin};

pub struct VehicleService {
    vehicles: Arc<dyn VehicleRepository>,
    customers: Arc<dyn CustomerRepository>,
}

/// General field rules, then the VIN format when a VIN is present.
fn check_vehicle(vehicle: &Vehicle) -> Result<(), DomainError> {
    validate_vehicle(vehicle)?;
    if let Some(vin) = vehicle.vin.as_deref() {
        validate_vin(vin)?;
    }
    Ok(())
}

impl VehicleService {
    pub fn new(
        vehicles: Arc<dyn VehicleRepository>,
        customers: Arc<dyn CustomerRepository>,
    ) -> Self {
        Self {
            vehicles,
            customers,
        }
    }

    async fn ensure_vin_free(
        &self,
        ctx: &CallContext,
        vin: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), DomainError> {
        if self.vehicles.exists_by_vin(ctx, vin, exclude_id).await? {
            return Err(DomainError::duplicate("vin", vin));
        }
        Ok(())
    }

    async fn ensure_plate_free(
        &self,
        ctx: &CallContext,
        plate: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), DomainError> {
        if self
            .vehicles
            .exists_by_license_plate(ctx, plate, exclude_id)
            .await?
        {
            return Err(DomainError::duplicate("license_plate", plate));
        }
        Ok(())
    }

    /// The owning customer must exist; then field rules, VIN format and
    /// VIN/plate uniqueness, in that order.
    #[instrument(skip_all, fields(customer_id = new.customer_id))]
    pub async fn create_vehicle(
        &self,
        ctx: &CallContext,
        new: NewVehicle,
    ) -> Result<Vehicle, DomainError> {
        referenced_customer(&self.customers, ctx, new.customer_id).await?;

        let vehicle = Vehicle::from_new(ctx.require_tenant()?, new);
        check_vehicle(&vehicle)?;

        if let Some(vin) = vehicle.vin.as_deref() {
            self.ensure_vin_free(ctx, vin, None).await?;
        }
        if let Some(plate) = vehicle.license_plate.as_deref() {
            self.ensure_plate_free(ctx, plate, None).await?;
        }

        let created = self.vehicles.create(ctx, &vehicle).await?;
        info!(vehicle_id = created.id, "vehicle created");
        Ok(created)
    }

    pub async fn get_vehicle(&self, ctx: &CallContext, id: i64) -> Result<Vehicle, DomainError> {
        self.vehicles.get(ctx, id).await
    }

    #[instrument(skip(self, ctx, update))]
    pub async fn update_vehicle(
        &self,
        ctx: &CallContext,
        id: i64,
        update: VehicleUpdate,
    ) -> Result<Vehicle, DomainError> {
        let mut vehicle = self.vehicles.get(ctx, id).await?;

        if let Some(vin) = update.vin.as_deref()
            && vehicle.vin.as_deref() != Some(vin)
        {
            self.ensure_vin_free(ctx, vin, Some(id)).await?;
        }
        if let Some(plate) = update.license_plate.as_deref()
            && vehicle.license_plate.as_deref() != Some(plate)
        {
            self.ensure_plate_free(ctx, plate, Some(id)).await?;
        }

        vehicle.apply_update(&update);
        check_vehicle(&vehicle)?;

        self.vehicles.update(ctx, &vehicle).await
    }

    #[instrument(skip(self, ctx))]
    pub async fn delete_vehicle(&self, ctx: &CallContext, id: i64) -> Result<(), DomainError> {
        self.vehicles.get(ctx, id).await?;
        self.vehicles.delete(ctx, id).await?;
        info!("vehicle deleted");
        Ok(())
    }

    pub async fn list_vehicles(
        &self,
        ctx: &CallContext,
        filter: &VehicleFilter,
    ) -> Result<Page<Vehicle>, DomainError> {
        self.vehicles.list(ctx, filter).await
    }

    pub async fn list_vehicles_by_customer(
        &self,
        ctx: &CallContext,
        customer_id: i64,
    ) -> Result<Vec<Vehicle>, DomainError> {
        referenced_customer(&self.customers, ctx, customer_id).await?;
        self.vehicles.list_by_customer(ctx, customer_id).await
    }

    pub async fn get_vehicle_by_vin(
        &self,
        ctx: &CallContext,
        vin: &str,
    ) -> Result<Vehicle, DomainError> {
        self.vehicles.get_by_vin(ctx, vin).await
    }

    pub async fn get_vehicle_by_license_plate(
        &self,
        ctx: &CallContext,
        plate: &str,
    ) -> Result<Vehicle, DomainError> {
        self.vehicles.get_by_license_plate(ctx, plate).await
    }

    pub async fn search_vehicles(
        &self,
        ctx: &CallContext,
        make: &str,
        model: &str,
        year: Option<i32>,
    ) -> Result<Vec<Vehicle>, DomainError> {
        self.vehicles
            .search_by_make_model(ctx, make, model, year)
            .await
    }

    /// Active vehicles of the same make and model within `year ± range`.
    pub async fn find_compatible_vehicles(
        &self,
        ctx: &CallContext,
        make: &str,
        model: &str,
        year: i32,
        range: i32,
    ) -> Result<Vec<Vehicle>, DomainError> {
        let range = range.abs();
        self.vehicles
            .find_compatible(
                ctx,
                make,
                model,
                year.saturating_sub(range),
                year.saturating_add(range),
            )
            .await
    }

    pub async fn get_vehicle_compatibility_info(
        &self,
        ctx: &CallContext,
        id: i64,
    ) -> Result<CompatibilityInfo, DomainError> {
        let vehicle = self.vehicles.get(ctx, id).await?;
        let compatible = self
            .find_compatible_vehicles(
                ctx,
                &vehicle.make,
                &vehicle.model,
                vehicle.year,
                COMPATIBLE_YEAR_RANGE,
            )
            .await?;
        let exact_matches = self
            .vehicles
            .list_by_make_model_year(ctx, &vehicle.make, &vehicle.model, vehicle.year)
            .await?
            .into_iter()
            .filter(|v| v.id != vehicle.id)
            .count();

        Ok(CompatibilityInfo {
            compatibility_string: vehicle.compatibility_string(),
            compatible_vehicles: compatible.len(),
            exact_matches,
            year_from: vehicle.year - COMPATIBLE_YEAR_RANGE,
            year_to: vehicle.year + COMPATIBLE_YEAR_RANGE,
            vehicle,
        })
    }

    pub async fn activate_vehicle(&self, ctx: &CallContext, id: i64) -> Result<Vehicle, DomainError> {
        let mut vehicle = self.vehicles.get(ctx, id).await?;
        vehicle.activate();
        self.vehicles.update(ctx, &vehicle).await
    }

    pub async fn deactivate_vehicle(
        &self,
        ctx: &CallContext,
        id: i64,
    ) -> Result<Vehicle, DomainError> {
        let mut vehicle = self.vehicles.get(ctx, id).await?;
        vehicle.deactivate();
        self.vehicles.update(ctx, &vehicle).await
    }

    /// Create several vehicles for one customer in a single transaction.
    ///
    /// Every item is validated before any uniqueness lookup, and nothing is
    /// written unless all of them pass.
    #[instrument(skip(self, ctx, items), fields(count = items.len()))]
    pub async fn create_vehicles_for_customer(
        &self,
        ctx: &CallContext,
        customer_id: i64,
        items: Vec<NewVehicle>,
    ) -> Result<Vec<Vehicle>, DomainError> {
        referenced_customer(&self.customers, ctx, customer_id).await?;
        let tenant = ctx.require_tenant()?;

        let vehicles = items
            .into_iter()
            .map(|new| {
                let vehicle = Vehicle::from_new(tenant, NewVehicle { customer_id, ..new });
                check_vehicle(&vehicle).map(|()| vehicle)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen_vins = HashSet::new();
        let mut seen_plates = HashSet::new();
        for vehicle in &vehicles {
            if let Some(vin) = vehicle.vin.as_deref() {
                if !seen_vins.insert(vin) {
                    return Err(DomainError::duplicate("vin", vin));
                }
                self.ensure_vin_free(ctx, vin, None).await?;
            }
            if let Some(plate) = vehicle.license_plate.as_deref() {
                if !seen_plates.insert(plate) {
                    return Err(DomainError::duplicate("license_plate", plate));
                }
                self.ensure_plate_free(ctx, plate, None).await?;
            }
        }

        if vehicles.is_empty() {
            return Ok(Vec::new());
        }
        let created = self.vehicles.create_batch(ctx, &vehicles).await?;
        info!(created = created.len(), "vehicles created for customer");
        Ok(created)
    }
}
