//! Customers module definition.
//!
//! Builds the Postgres repositories on a tenant-scoped store, the domain
//! services on top of them, and the two `crm.v1` gRPC servers.

use std::sync::Arc;

use crm_db::DbHandle;
use crm_db::migration_runner::{MigrationError, MigrationResult, run_migrations_for_module};
use customers_sdk::proto::{CustomerServiceServer, VehicleServiceServer};
use sea_orm_migration::MigrationTrait;

use crate::api::grpc::{CustomerGrpcService, VehicleGrpcService};
use crate::config::CustomersConfig;
use crate::domain::repo::{CustomerRepository, NoteRepository, VehicleRepository};
use crate::domain::service::{CustomerService, VehicleService};
use crate::infra::storage::{PgCustomerRepository, PgNoteRepository, PgVehicleRepository, migrations};

/// Customers module.
///
/// Cheap to clone; clones share the same services.
#[derive(Clone)]
pub struct CustomersModule {
    customers: Arc<CustomerService>,
    vehicles: Arc<VehicleService>,
    config: CustomersConfig,
}

impl CustomersModule {
    pub const MODULE_NAME: &'static str = "customers";

    #[must_use]
    pub fn new(db: &DbHandle, config: CustomersConfig) -> Self {
        tracing::info!("Initializing customers module");

        let customer_repo: Arc<dyn CustomerRepository> =
            Arc::new(PgCustomerRepository::new(db.scoped()));
        let vehicle_repo: Arc<dyn VehicleRepository> =
            Arc::new(PgVehicleRepository::new(db.scoped()));
        let note_repo: Arc<dyn NoteRepository> = Arc::new(PgNoteRepository::new(db.scoped()));

        let customers = Arc::new(CustomerService::new(
            Arc::clone(&customer_repo),
            Arc::clone(&vehicle_repo),
            note_repo,
        ));
        let vehicles = Arc::new(VehicleService::new(vehicle_repo, customer_repo));

        tracing::info!("customers module initialized");
        Self {
            customers,
            vehicles,
            config,
        }
    }

    /// Schema migrations owned by this module.
    #[must_use]
    pub fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        migrations::migrations()
    }

    /// Apply pending migrations. Run with a role allowed to create tables and policies.
    ///
    /// # Errors
    /// Propagates the first failing migration; it is rolled back.
    pub async fn migrate(db: &DbHandle) -> Result<MigrationResult, MigrationError> {
        let result = run_migrations_for_module(db, Self::MODULE_NAME, Self::migrations()).await?;
        tracing::info!(
            applied = result.applied,
            skipped = result.skipped,
            "customers migrations complete"
        );
        Ok(result)
    }

    #[must_use]
    pub fn customer_service(&self) -> Arc<CustomerService> {
        Arc::clone(&self.customers)
    }

    #[must_use]
    pub fn vehicle_service(&self) -> Arc<VehicleService> {
        Arc::clone(&self.vehicles)
    }

    /// `crm.v1.CustomerService`, ready to add to a tonic router.
    #[must_use]
    pub fn customer_server(&self) -> CustomerServiceServer<CustomerGrpcService> {
        CustomerServiceServer::new(CustomerGrpcService::new(
            self.customer_service(),
            self.vehicle_service(),
            self.config,
        ))
    }

    /// `crm.v1.VehicleService`, ready to add to a tonic router.
    #[must_use]
    pub fn vehicle_server(&self) -> VehicleServiceServer<VehicleGrpcService> {
        VehicleServiceServer::new(VehicleGrpcService::new(
            self.vehicle_service(),
            self.config,
        ))
    }
}
