use sea_orm_migration::MigrationTrait;

mod initial_001;
mod tenant_isolation_002;

/// Schema migrations of the customers module, in application order.
#[must_use]
pub fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
        Box::new(initial_001::Migration),
        Box::new(tenant_isolation_002::Migration),
    ]
}
