use async_trait::async_trait;
use crm_db::{StoreError, TenantScopedStore, TxError};
use crm_security::CallContext;
use customers_sdk::{Page, Vehicle, VehicleFilter, page_window};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use super::rows::{VEHICLE_COLUMNS, VehicleRow};
use super::{
    VEHICLES_LICENSE_PLATE_KEY, VEHICLES_VIN_KEY, contains_pattern, storage_error, to_count,
};
use crate::domain::error::DomainError;
use crate::domain::repo::{RepoResult, VehicleRepository};

/// Upper bound for the per-customer and compatibility listings.
const CUSTOMER_VEHICLES_LIMIT: u32 = 100;
const MAKE_MODEL_SEARCH_LIMIT: i64 = 50;
const COMPATIBLE_LIMIT: i64 = 100;

const INSERT_SQL: &str = "INSERT INTO vehicles (tenant_id, customer_id, make, model, year, vin, \
     license_plate, color, engine, notes, is_active, metadata, created_at, updated_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)";

pub struct PgVehicleRepository {
    store: TenantScopedStore,
}

impl PgVehicleRepository {
    #[must_use]
    pub fn new(store: TenantScopedStore) -> Self {
        Self { store }
    }
}

fn write_error(op: &'static str, err: StoreError, vehicle: &Vehicle) -> DomainError {
    let constraint = err.unique_violation().map(str::to_owned);
    match constraint.as_deref() {
        Some(VEHICLES_VIN_KEY) => {
            DomainError::duplicate("vin", vehicle.vin.clone().unwrap_or_default())
        }
        Some(VEHICLES_LICENSE_PLATE_KEY) => DomainError::duplicate(
            "license_plate",
            vehicle.license_plate.clone().unwrap_or_default(),
        ),
        _ => storage_error(op, err),
    }
}

fn insert_query<'q>(
    sql: &'q str,
    vehicle: &'q Vehicle,
) -> QueryAs<'q, Postgres, VehicleRow, PgArguments> {
    sqlx::query_as::<_, VehicleRow>(sql)
        .bind(*vehicle.tenant_id.as_uuid())
        .bind(vehicle.customer_id)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(vehicle.vin.as_deref())
        .bind(vehicle.license_plate.as_deref())
        .bind(vehicle.color.as_deref())
        .bind(vehicle.engine.as_deref())
        .bind(vehicle.notes.as_deref())
        .bind(vehicle.is_active)
        .bind(Json(&vehicle.metadata))
        .bind(vehicle.created_at)
        .bind(vehicle.updated_at)
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &VehicleFilter) {
    qb.push(" WHERE TRUE");
    if let Some(customer_id) = filter.customer_id {
        qb.push(" AND customer_id = ").push_bind(customer_id);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = contains_pattern(search.trim());
        qb.push(" AND (make ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR model ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR vin ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR license_plate ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if filter.active_only {
        qb.push(" AND is_active = TRUE");
    }
}

impl PgVehicleRepository {
    /// One page of `filter`, without the total.
    async fn select(
        &self,
        ctx: &CallContext,
        op: &'static str,
        filter: &VehicleFilter,
    ) -> RepoResult<Vec<Vehicle>> {
        let (limit, offset) = page_window(filter.page, filter.limit);
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {VEHICLE_COLUMNS} FROM vehicles"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY year DESC, make, model LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = self
            .store
            .query_with_tenant(ctx, qb.build_query_as::<VehicleRow>())
            .await
            .map_err(|e| storage_error(op, e))?;
        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    async fn fetch_one(
        &self,
        ctx: &CallContext,
        op: &'static str,
        column: &'static str,
        value: &str,
    ) -> RepoResult<Option<Vehicle>> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE {column} = $1");
        let row = self
            .store
            .query_row_with_tenant(ctx, sqlx::query_as::<_, VehicleRow>(&sql).bind(value))
            .await
            .map_err(|e| storage_error(op, e))?;
        Ok(row.map(Vehicle::from))
    }

    async fn fetch_all(
        &self,
        ctx: &CallContext,
        op: &'static str,
        qb: &mut QueryBuilder<'_, Postgres>,
    ) -> RepoResult<Vec<Vehicle>> {
        let rows = self
            .store
            .query_with_tenant(ctx, qb.build_query_as::<VehicleRow>())
            .await
            .map_err(|e| storage_error(op, e))?;
        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    async fn count_where(
        &self,
        ctx: &CallContext,
        op: &'static str,
        qb: &mut QueryBuilder<'_, Postgres>,
    ) -> RepoResult<u64> {
        let n = self
            .store
            .scalar_with_tenant(ctx, qb.build_query_scalar::<i64>())
            .await
            .map_err(|e| storage_error(op, e))?;
        Ok(to_count(n))
    }

    async fn exists_where(
        &self,
        ctx: &CallContext,
        op: &'static str,
        column: &'static str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM vehicles WHERE ");
        qb.push(column).push(" = ").push_bind(value);
        if let Some(id) = exclude_id {
            qb.push(" AND id <> ").push_bind(id);
        }
        Ok(self.count_where(ctx, op, &mut qb).await? > 0)
    }
}

#[async_trait]
impl VehicleRepository for PgVehicleRepository {
    async fn create(&self, ctx: &CallContext, vehicle: &Vehicle) -> RepoResult<Vehicle> {
        let sql = format!("{INSERT_SQL} RETURNING {VEHICLE_COLUMNS}");
        let row = self
            .store
            .query_row_with_tenant(ctx, insert_query(&sql, vehicle))
            .await
            .map_err(|e| write_error("create vehicle", e, vehicle))?
            .ok_or_else(|| {
                DomainError::Database(anyhow::anyhow!("create vehicle: insert returned no row"))
            })?;
        Ok(row.into())
    }

    async fn create_batch(
        &self,
        ctx: &CallContext,
        vehicles: &[Vehicle],
    ) -> RepoResult<Vec<Vehicle>> {
        let owned = vehicles.to_vec();
        let sql = format!("{INSERT_SQL} RETURNING {VEHICLE_COLUMNS}");

        // The closure reports the index of the vehicle whose insert failed.
        let result = self
            .store
            .transaction_with_tenant(ctx, move |conn| {
                Box::pin(async move {
                    let mut created = Vec::with_capacity(owned.len());
                    for (idx, vehicle) in owned.iter().enumerate() {
                        let row = insert_query(&sql, vehicle)
                            .fetch_one(&mut *conn)
                            .await
                            .map_err(|e| (idx, e))?;
                        created.push(Vehicle::from(row));
                    }
                    Ok(created)
                })
            })
            .await;

        match result {
            Ok(created) => {
                debug!(count = created.len(), "vehicle batch inserted");
                Ok(created)
            }
            Err(TxError::Domain((idx, e))) => Err(write_error(
                "create vehicle batch",
                StoreError::Query(e),
                &vehicles[idx],
            )),
            Err(TxError::Infra(e)) => Err(storage_error("create vehicle batch", e)),
        }
    }

    async fn get(&self, ctx: &CallContext, id: i64) -> RepoResult<Vehicle> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1");
        let row = self
            .store
            .query_row_with_tenant(ctx, sqlx::query_as::<_, VehicleRow>(&sql).bind(id))
            .await
            .map_err(|e| storage_error("get vehicle", e))?
            .ok_or_else(|| DomainError::not_found("vehicle", id))?;
        Ok(row.into())
    }

    async fn update(&self, ctx: &CallContext, vehicle: &Vehicle) -> RepoResult<Vehicle> {
        let sql = format!(
            "UPDATE vehicles SET make = $2, model = $3, year = $4, vin = $5, \
             license_plate = $6, color = $7, engine = $8, notes = $9, is_active = $10, \
             metadata = $11, updated_at = $12 WHERE id = $1 RETURNING {VEHICLE_COLUMNS}"
        );
        let query = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(vehicle.id)
            .bind(&vehicle.make)
            .bind(&vehicle.model)
            .bind(vehicle.year)
            .bind(vehicle.vin.as_deref())
            .bind(vehicle.license_plate.as_deref())
            .bind(vehicle.color.as_deref())
            .bind(vehicle.engine.as_deref())
            .bind(vehicle.notes.as_deref())
            .bind(vehicle.is_active)
            .bind(Json(&vehicle.metadata))
            .bind(vehicle.updated_at);
        let row = self
            .store
            .query_row_with_tenant(ctx, query)
            .await
            .map_err(|e| write_error("update vehicle", e, vehicle))?
            .ok_or_else(|| DomainError::not_found("vehicle", vehicle.id))?;
        Ok(row.into())
    }

    async fn delete(&self, ctx: &CallContext, id: i64) -> RepoResult<()> {
        let result = self
            .store
            .execute_with_tenant(ctx, sqlx::query("DELETE FROM vehicles WHERE id = $1").bind(id))
            .await
            .map_err(|e| storage_error("delete vehicle", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("vehicle", id));
        }
        Ok(())
    }

    async fn list(&self, ctx: &CallContext, filter: &VehicleFilter) -> RepoResult<Page<Vehicle>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM vehicles");
        push_filter(&mut count, filter);
        let total = self.count_where(ctx, "count vehicles", &mut count).await?;
        let items = self.select(ctx, "list vehicles", filter).await?;
        let (limit, _) = page_window(filter.page, filter.limit);

        Ok(Page {
            items,
            total,
            page: filter.page,
            limit: u32::try_from(limit).unwrap_or(filter.limit),
        })
    }

    async fn list_by_customer(
        &self,
        ctx: &CallContext,
        customer_id: i64,
    ) -> RepoResult<Vec<Vehicle>> {
        let filter = VehicleFilter {
            customer_id: Some(customer_id),
            limit: CUSTOMER_VEHICLES_LIMIT,
            ..VehicleFilter::default()
        };
        self.select(ctx, "list customer vehicles", &filter).await
    }

    async fn list_active_by_customer(
        &self,
        ctx: &CallContext,
        customer_id: i64,
    ) -> RepoResult<Vec<Vehicle>> {
        let filter = VehicleFilter {
            customer_id: Some(customer_id),
            active_only: true,
            limit: CUSTOMER_VEHICLES_LIMIT,
            ..VehicleFilter::default()
        };
        self.select(ctx, "list active customer vehicles", &filter)
            .await
    }

    async fn get_by_vin(&self, ctx: &CallContext, vin: &str) -> RepoResult<Vehicle> {
        self.fetch_one(ctx, "get vehicle by vin", "vin", vin)
            .await?
            .ok_or_else(|| DomainError::not_found("vehicle", vin))
    }

    async fn get_by_license_plate(&self, ctx: &CallContext, plate: &str) -> RepoResult<Vehicle> {
        self.fetch_one(ctx, "get vehicle by license plate", "license_plate", plate)
            .await?
            .ok_or_else(|| DomainError::not_found("vehicle", plate))
    }

    async fn search_by_make_model(
        &self,
        ctx: &CallContext,
        make: &str,
        model: &str,
        year: Option<i32>,
    ) -> RepoResult<Vec<Vehicle>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE TRUE"));
        if !make.trim().is_empty() {
            qb.push(" AND make ILIKE ")
                .push_bind(contains_pattern(make.trim()));
        }
        if !model.trim().is_empty() {
            qb.push(" AND model ILIKE ")
                .push_bind(contains_pattern(model.trim()));
        }
        if let Some(year) = year {
            qb.push(" AND year = ").push_bind(year);
        }
        qb.push(" ORDER BY year DESC, make, model LIMIT ")
            .push_bind(MAKE_MODEL_SEARCH_LIMIT);
        self.fetch_all(ctx, "search vehicles by make and model", &mut qb)
            .await
    }

    async fn find_compatible(
        &self,
        ctx: &CallContext,
        make: &str,
        model: &str,
        year_from: i32,
        year_to: i32,
    ) -> RepoResult<Vec<Vehicle>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE make ILIKE "
        ));
        qb.push_bind(crm_db::escape_like(make))
            .push(" AND model ILIKE ")
            .push_bind(crm_db::escape_like(model))
            .push(" AND year BETWEEN ")
            .push_bind(year_from)
            .push(" AND ")
            .push_bind(year_to)
            .push(" AND is_active = TRUE ORDER BY year DESC LIMIT ")
            .push_bind(COMPATIBLE_LIMIT);
        self.fetch_all(ctx, "find compatible vehicles", &mut qb)
            .await
    }

    async fn list_by_make_model_year(
        &self,
        ctx: &CallContext,
        make: &str,
        model: &str,
        year: i32,
    ) -> RepoResult<Vec<Vehicle>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE make = "
        ));
        qb.push_bind(make)
            .push(" AND model = ")
            .push_bind(model)
            .push(" AND year = ")
            .push_bind(year)
            .push(" ORDER BY created_at DESC");
        self.fetch_all(ctx, "list vehicles by make, model and year", &mut qb)
            .await
    }

    async fn count(&self, ctx: &CallContext) -> RepoResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM vehicles");
        self.count_where(ctx, "count vehicles", &mut qb).await
    }

    async fn count_by_customer(&self, ctx: &CallContext, customer_id: i64) -> RepoResult<u64> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM vehicles WHERE customer_id = ");
        qb.push_bind(customer_id);
        self.count_where(ctx, "count customer vehicles", &mut qb)
            .await
    }

    async fn count_active(&self, ctx: &CallContext) -> RepoResult<u64> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM vehicles WHERE is_active = TRUE");
        self.count_where(ctx, "count active vehicles", &mut qb)
            .await
    }

    async fn exists_by_vin(
        &self,
        ctx: &CallContext,
        vin: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        self.exists_where(ctx, "check vehicle vin", "vin", vin, exclude_id)
            .await
    }

    async fn exists_by_license_plate(
        &self,
        ctx: &CallContext,
        plate: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        self.exists_where(
            ctx,
            "check vehicle license plate",
            "license_plate",
            plate,
            exclude_id,
        )
        .await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn filter_scopes_by_customer_and_escapes_search() {
        let filter = VehicleFilter {
            customer_id: Some(7),
            search: Some("100%".to_owned()),
            active_only: true,
            ..VehicleFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM vehicles");
        push_filter(&mut qb, &filter);
        let sql = qb.sql();
        assert!(sql.contains("customer_id = $1"));
        assert!(sql.contains("license_plate ILIKE $5"));
        assert!(sql.ends_with("AND is_active = TRUE"));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM vehicles");
        push_filter(&mut qb, &VehicleFilter::default());
        assert_eq!(qb.sql(), "SELECT 1 FROM vehicles WHERE TRUE");
    }
}
