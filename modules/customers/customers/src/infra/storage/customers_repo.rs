use async_trait::async_trait;
use crm_db::{StoreError, TenantScopedStore};
use crm_security::CallContext;
use customers_sdk::{
    Customer, CustomerFilter, CustomerSearch, CustomerType, Page, SearchField, SortField,
    page_window,
};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use super::rows::{CUSTOMER_COLUMNS, CustomerRow, into_models};
use super::{
    CUSTOMERS_EMAIL_KEY, CUSTOMERS_TAX_ID_KEY, contains_pattern, storage_error, to_count,
};
use crate::domain::error::DomainError;
use crate::domain::repo::{CustomerRepository, RepoResult};

/// Search results when the request does not say how many.
const DEFAULT_SEARCH_LIMIT: u32 = 20;

pub struct PgCustomerRepository {
    store: TenantScopedStore,
}

impl PgCustomerRepository {
    #[must_use]
    pub fn new(store: TenantScopedStore) -> Self {
        Self { store }
    }
}

/// Unique index hits become `Duplicate` with the offending value.
fn write_error(op: &'static str, err: StoreError, customer: &Customer) -> DomainError {
    let constraint = err.unique_violation().map(str::to_owned);
    match constraint.as_deref() {
        Some(CUSTOMERS_EMAIL_KEY) => {
            DomainError::duplicate("email", customer.email.clone().unwrap_or_default())
        }
        Some(CUSTOMERS_TAX_ID_KEY) => {
            DomainError::duplicate("tax_id", customer.tax_id.clone().unwrap_or_default())
        }
        _ => storage_error(op, err),
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &CustomerFilter) {
    qb.push(" WHERE TRUE");
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = contains_pattern(search.trim());
        qb.push(" AND (first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR company_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(customer_type) = filter.customer_type {
        qb.push(" AND customer_type = ")
            .push_bind(customer_type.as_str());
    }
    if filter.active_only {
        qb.push(" AND is_active = TRUE");
    }
}

fn order_by(filter: &CustomerFilter) -> String {
    let dir = filter.sort_order.as_sql();
    match filter.sort_by {
        Some(SortField::Name) => format!(" ORDER BY first_name {dir}, last_name {dir}"),
        Some(SortField::CreatedAt) => format!(" ORDER BY created_at {dir}"),
        Some(SortField::CompanyName) => format!(" ORDER BY company_name {dir}"),
        None => " ORDER BY created_at DESC".to_owned(),
    }
}

/// Fixed listings that page without a caller-supplied filter.
#[derive(Clone, Copy)]
enum Scope {
    OfType(CustomerType),
    Inactive,
}

impl Scope {
    fn push_condition(self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::OfType(t) => {
                qb.push(" WHERE customer_type = ").push_bind(t.as_str());
            }
            Self::Inactive => {
                qb.push(" WHERE is_active = FALSE");
            }
        }
    }

    fn order(self) -> &'static str {
        match self {
            Self::OfType(_) => " ORDER BY created_at DESC",
            Self::Inactive => " ORDER BY updated_at DESC",
        }
    }
}

fn search_condition(field: SearchField) -> &'static str {
    match field {
        SearchField::Name => {
            "(first_name ILIKE $1 OR last_name ILIKE $1 OR (first_name || ' ' || last_name) ILIKE $1)"
        }
        SearchField::Email => "email ILIKE $1",
        SearchField::Phone => "phone ILIKE $1",
        SearchField::TaxId => "tax_id ILIKE $1",
        SearchField::CompanyName => "company_name ILIKE $1",
    }
}

impl PgCustomerRepository {
    async fn fetch_one(
        &self,
        ctx: &CallContext,
        op: &'static str,
        column: &'static str,
        value: &str,
    ) -> RepoResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE {column} = $1");
        let row = self
            .store
            .query_row_with_tenant(ctx, sqlx::query_as::<_, CustomerRow>(&sql).bind(value))
            .await
            .map_err(|e| storage_error(op, e))?;
        row.map(Customer::try_from).transpose()
    }

    async fn exists_where(
        &self,
        ctx: &CallContext,
        op: &'static str,
        column: &'static str,
        value: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customers WHERE ");
        qb.push(column).push(" = ").push_bind(value);
        if let Some(id) = exclude_id {
            qb.push(" AND id <> ").push_bind(id);
        }
        let n = self
            .store
            .scalar_with_tenant(ctx, qb.build_query_scalar::<i64>())
            .await
            .map_err(|e| storage_error(op, e))?;
        Ok(n > 0)
    }

    async fn page(
        &self,
        ctx: &CallContext,
        op: &'static str,
        scope: Scope,
        page: u32,
        limit: u32,
    ) -> RepoResult<Page<Customer>> {
        let (lim, offset) = page_window(page, limit);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customers");
        scope.push_condition(&mut count);
        let total = self
            .store
            .scalar_with_tenant(ctx, count.build_query_scalar::<i64>())
            .await
            .map_err(|e| storage_error(op, e))?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {CUSTOMER_COLUMNS} FROM customers"));
        scope.push_condition(&mut qb);
        qb.push(scope.order())
            .push(" LIMIT ")
            .push_bind(lim)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = self
            .store
            .query_with_tenant(ctx, qb.build_query_as::<CustomerRow>())
            .await
            .map_err(|e| storage_error(op, e))?;

        Ok(Page {
            items: into_models(rows)?,
            total: to_count(total),
            page,
            limit: u32::try_from(lim).unwrap_or(limit),
        })
    }

    async fn count_where(
        &self,
        ctx: &CallContext,
        op: &'static str,
        condition: &'static str,
        customer_type: Option<CustomerType>,
    ) -> RepoResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM customers WHERE {condition}");
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(t) = customer_type {
            query = query.bind(t.as_str());
        }
        let n = self
            .store
            .scalar_with_tenant(ctx, query)
            .await
            .map_err(|e| storage_error(op, e))?;
        Ok(to_count(n))
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn create(&self, ctx: &CallContext, customer: &Customer) -> RepoResult<Customer> {
        let tenant = ctx.require_tenant()?;
        let sql = format!(
            "INSERT INTO customers (tenant_id, first_name, last_name, email, phone, \
             customer_type, company_name, tax_id, address, birthday, notes, preferences, \
             is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {CUSTOMER_COLUMNS}"
        );
        let query = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(*tenant.as_uuid())
            .bind(&customer.first_name)
            .bind(&customer.last_name)
            .bind(customer.email.as_deref())
            .bind(customer.phone.as_deref())
            .bind(customer.customer_type.as_str())
            .bind(customer.company_name.as_deref())
            .bind(customer.tax_id.as_deref())
            .bind(customer.address.as_deref())
            .bind(customer.birthday)
            .bind(customer.notes.as_deref())
            .bind(Json(&customer.preferences))
            .bind(customer.is_active)
            .bind(customer.created_at)
            .bind(customer.updated_at);

        let row = self
            .store
            .query_row_with_tenant(ctx, query)
            .await
            .map_err(|e| write_error("create customer", e, customer))?
            .ok_or_else(|| {
                DomainError::Database(anyhow::anyhow!("create customer: insert returned no row"))
            })?;
        Customer::try_from(row)
    }

    async fn get(&self, ctx: &CallContext, id: i64) -> RepoResult<Customer> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1");
        let row = self
            .store
            .query_row_with_tenant(ctx, sqlx::query_as::<_, CustomerRow>(&sql).bind(id))
            .await
            .map_err(|e| storage_error("get customer", e))?
            .ok_or_else(|| DomainError::not_found("customer", id))?;
        Customer::try_from(row)
    }

    async fn update(&self, ctx: &CallContext, customer: &Customer) -> RepoResult<Customer> {
        let sql = format!(
            "UPDATE customers SET first_name = $2, last_name = $3, email = $4, phone = $5, \
             customer_type = $6, company_name = $7, tax_id = $8, address = $9, birthday = $10, \
             notes = $11, preferences = $12, is_active = $13, updated_at = $14 \
             WHERE id = $1 RETURNING {CUSTOMER_COLUMNS}"
        );
        let query = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(customer.id)
            .bind(&customer.first_name)
            .bind(&customer.last_name)
            .bind(customer.email.as_deref())
            .bind(customer.phone.as_deref())
            .bind(customer.customer_type.as_str())
            .bind(customer.company_name.as_deref())
            .bind(customer.tax_id.as_deref())
            .bind(customer.address.as_deref())
            .bind(customer.birthday)
            .bind(customer.notes.as_deref())
            .bind(Json(&customer.preferences))
            .bind(customer.is_active)
            .bind(customer.updated_at);

        let row = self
            .store
            .query_row_with_tenant(ctx, query)
            .await
            .map_err(|e| write_error("update customer", e, customer))?
            .ok_or_else(|| DomainError::not_found("customer", customer.id))?;
        Customer::try_from(row)
    }

    async fn delete(&self, ctx: &CallContext, id: i64) -> RepoResult<()> {
        let result = self
            .store
            .execute_with_tenant(ctx, sqlx::query("DELETE FROM customers WHERE id = $1").bind(id))
            .await
            .map_err(|e| storage_error("delete customer", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("customer", id));
        }
        Ok(())
    }

    async fn list(&self, ctx: &CallContext, filter: &CustomerFilter) -> RepoResult<Page<Customer>> {
        let (limit, offset) = page_window(filter.page, filter.limit);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customers");
        push_filter(&mut count, filter);
        let total = self
            .store
            .scalar_with_tenant(ctx, count.build_query_scalar::<i64>())
            .await
            .map_err(|e| storage_error("count customers", e))?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {CUSTOMER_COLUMNS} FROM customers"));
        push_filter(&mut qb, filter);
        qb.push(order_by(filter))
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = self
            .store
            .query_with_tenant(ctx, qb.build_query_as::<CustomerRow>())
            .await
            .map_err(|e| storage_error("list customers", e))?;

        Ok(Page {
            items: into_models(rows)?,
            total: to_count(total),
            page: filter.page,
            limit: u32::try_from(limit).unwrap_or(filter.limit),
        })
    }

    async fn search(
        &self,
        ctx: &CallContext,
        search: &CustomerSearch,
    ) -> RepoResult<Vec<Customer>> {
        let query_text = search.query.trim();
        if query_text.is_empty() {
            return Ok(Vec::new());
        }
        let fields: &[SearchField] = if search.fields.is_empty() {
            &SearchField::DEFAULTS
        } else {
            &search.fields
        };
        let conditions = fields
            .iter()
            .map(|f| search_condition(*f))
            .collect::<Vec<_>>()
            .join(" OR ");
        let limit = if search.limit == 0 {
            DEFAULT_SEARCH_LIMIT
        } else {
            search.limit
        };

        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers \
             WHERE ({conditions}) AND is_active = TRUE \
             ORDER BY CASE \
                 WHEN first_name ILIKE $1 OR last_name ILIKE $1 \
                      OR (first_name || ' ' || last_name) ILIKE $1 THEN 1 \
                 WHEN email = $2 THEN 2 \
                 WHEN phone = $2 THEN 3 \
                 ELSE 4 \
             END, last_name, first_name \
             LIMIT $3"
        );
        let query = sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(contains_pattern(query_text))
            .bind(query_text)
            .bind(i64::from(limit));
        let rows = self
            .store
            .query_with_tenant(ctx, query)
            .await
            .map_err(|e| storage_error("search customers", e))?;
        into_models(rows)
    }

    async fn get_by_email(&self, ctx: &CallContext, email: &str) -> RepoResult<Customer> {
        self.fetch_one(ctx, "get customer by email", "email", email)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", email))
    }

    async fn get_by_tax_id(&self, ctx: &CallContext, tax_id: &str) -> RepoResult<Customer> {
        self.fetch_one(ctx, "get customer by tax id", "tax_id", tax_id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", tax_id))
    }

    async fn list_by_type(
        &self,
        ctx: &CallContext,
        customer_type: CustomerType,
        page: u32,
        limit: u32,
    ) -> RepoResult<Page<Customer>> {
        self.page(
            ctx,
            "list customers by type",
            Scope::OfType(customer_type),
            page,
            limit,
        )
        .await
    }

    async fn list_inactive(
        &self,
        ctx: &CallContext,
        page: u32,
        limit: u32,
    ) -> RepoResult<Page<Customer>> {
        self.page(ctx, "list inactive customers", Scope::Inactive, page, limit)
            .await
    }

    async fn count(&self, ctx: &CallContext) -> RepoResult<u64> {
        self.count_where(ctx, "count customers", "TRUE", None).await
    }

    async fn count_active(&self, ctx: &CallContext) -> RepoResult<u64> {
        self.count_where(ctx, "count active customers", "is_active = TRUE", None)
            .await
    }

    async fn count_by_type(
        &self,
        ctx: &CallContext,
        customer_type: CustomerType,
    ) -> RepoResult<u64> {
        self.count_where(
            ctx,
            "count customers by type",
            "customer_type = $1",
            Some(customer_type),
        )
        .await
    }

    async fn exists_by_email(
        &self,
        ctx: &CallContext,
        email: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        self.exists_where(ctx, "check customer email", "email", email, exclude_id)
            .await
    }

    async fn exists_by_tax_id(
        &self,
        ctx: &CallContext,
        tax_id: &str,
        exclude_id: Option<i64>,
    ) -> RepoResult<bool> {
        self.exists_where(ctx, "check customer tax id", "tax_id", tax_id, exclude_id)
            .await
    }
}
