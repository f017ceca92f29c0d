use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crm_db::TenantScopedStore;
use crm_security::CallContext;
use customers_sdk::{CustomerNote, NoteFilter, NoteType, Page, page_window};
use sqlx::{Postgres, QueryBuilder};

use super::rows::{NOTE_COLUMNS, NoteRow, into_models};
use super::{storage_error, to_count};
use crate::domain::error::DomainError;
use crate::domain::repo::{NoteRepository, RepoResult};

const CUSTOMER_NOTES_LIMIT: u32 = 100;
const DATE_RANGE_LIMIT: u32 = 1000;

pub struct PgNoteRepository {
    store: TenantScopedStore,
}

impl PgNoteRepository {
    #[must_use]
    pub fn new(store: TenantScopedStore) -> Self {
        Self { store }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &NoteFilter) {
    qb.push(" WHERE TRUE");
    if let Some(customer_id) = filter.customer_id {
        qb.push(" AND customer_id = ").push_bind(customer_id);
    }
    if let Some(note_type) = filter.note_type {
        qb.push(" AND note_type = ").push_bind(note_type.as_str());
    }
    if let Some(from) = filter.date_from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.date_to {
        qb.push(" AND created_at <= ").push_bind(to);
    }
}

impl PgNoteRepository {
    async fn select(
        &self,
        ctx: &CallContext,
        op: &'static str,
        filter: &NoteFilter,
    ) -> RepoResult<Vec<CustomerNote>> {
        let (limit, offset) = page_window(filter.page, filter.limit);
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {NOTE_COLUMNS} FROM customer_notes"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = self
            .store
            .query_with_tenant(ctx, qb.build_query_as::<NoteRow>())
            .await
            .map_err(|e| storage_error(op, e))?;
        into_models(rows)
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
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn create(&self, ctx: &CallContext, note: &CustomerNote) -> RepoResult<CustomerNote> {
        let sql = format!(
            "INSERT INTO customer_notes (tenant_id, customer_id, staff_id, staff_name, note, \
             note_type, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {NOTE_COLUMNS}"
        );
        let query = sqlx::query_as::<_, NoteRow>(&sql)
            .bind(*note.tenant_id.as_uuid())
            .bind(note.customer_id)
            .bind(&note.staff_id)
            .bind(&note.staff_name)
            .bind(&note.note)
            .bind(note.note_type.as_str())
            .bind(note.created_at);
        let row = self
            .store
            .query_row_with_tenant(ctx, query)
            .await
            .map_err(|e| storage_error("create customer note", e))?
            .ok_or_else(|| {
                DomainError::Database(anyhow::anyhow!(
                    "create customer note: insert returned no row"
                ))
            })?;
        CustomerNote::try_from(row)
    }

    async fn get(&self, ctx: &CallContext, id: i64) -> RepoResult<CustomerNote> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM customer_notes WHERE id = $1");
        let row = self
            .store
            .query_row_with_tenant(ctx, sqlx::query_as::<_, NoteRow>(&sql).bind(id))
            .await
            .map_err(|e| storage_error("get customer note", e))?
            .ok_or_else(|| DomainError::not_found("note", id))?;
        CustomerNote::try_from(row)
    }

    async fn delete(&self, ctx: &CallContext, id: i64) -> RepoResult<()> {
        let result = self
            .store
            .execute_with_tenant(
                ctx,
                sqlx::query("DELETE FROM customer_notes WHERE id = $1").bind(id),
            )
            .await
            .map_err(|e| storage_error("delete customer note", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("note", id));
        }
        Ok(())
    }

    async fn list(&self, ctx: &CallContext, filter: &NoteFilter) -> RepoResult<Page<CustomerNote>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customer_notes");
        push_filter(&mut count, filter);
        let total = self
            .count_where(ctx, "count customer notes", &mut count)
            .await?;
        let items = self.select(ctx, "list customer notes", filter).await?;
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
    ) -> RepoResult<Vec<CustomerNote>> {
        let filter = NoteFilter {
            customer_id: Some(customer_id),
            limit: CUSTOMER_NOTES_LIMIT,
            ..NoteFilter::default()
        };
        self.select(ctx, "list customer notes", &filter).await
    }

    async fn list_by_customer_and_type(
        &self,
        ctx: &CallContext,
        customer_id: i64,
        note_type: NoteType,
    ) -> RepoResult<Vec<CustomerNote>> {
        let filter = NoteFilter {
            customer_id: Some(customer_id),
            note_type: Some(note_type),
            limit: CUSTOMER_NOTES_LIMIT,
            ..NoteFilter::default()
        };
        self.select(ctx, "list customer notes by type", &filter)
            .await
    }

    async fn list_by_staff(
        &self,
        ctx: &CallContext,
        staff_id: &str,
        page: u32,
        limit: u32,
    ) -> RepoResult<Page<CustomerNote>> {
        let (lim, offset) = page_window(page, limit);

        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customer_notes WHERE staff_id = ");
        count.push_bind(staff_id);
        let total = self
            .count_where(ctx, "count staff notes", &mut count)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {NOTE_COLUMNS} FROM customer_notes WHERE staff_id = "
        ));
        qb.push_bind(staff_id)
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(lim)
            .push(" OFFSET ")
            .push_bind(offset);
        let rows = self
            .store
            .query_with_tenant(ctx, qb.build_query_as::<NoteRow>())
            .await
            .map_err(|e| storage_error("list staff notes", e))?;

        Ok(Page {
            items: into_models(rows)?,
            total,
            page,
            limit: u32::try_from(lim).unwrap_or(limit),
        })
    }

    async fn list_recent(&self, ctx: &CallContext, limit: u32) -> RepoResult<Vec<CustomerNote>> {
        let filter = NoteFilter {
            limit,
            ..NoteFilter::default()
        };
        self.select(ctx, "list recent notes", &filter).await
    }

    async fn list_by_date_range(
        &self,
        ctx: &CallContext,
        customer_id: Option<i64>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> RepoResult<Vec<CustomerNote>> {
        let filter = NoteFilter {
            customer_id,
            date_from: from,
            date_to: to,
            limit: DATE_RANGE_LIMIT,
            ..NoteFilter::default()
        };
        self.select(ctx, "list notes by date range", &filter).await
    }

    async fn list_recent_by_customer(
        &self,
        ctx: &CallContext,
        customer_id: i64,
        limit: u32,
    ) -> RepoResult<Vec<CustomerNote>> {
        let filter = NoteFilter {
            customer_id: Some(customer_id),
            limit,
            ..NoteFilter::default()
        };
        self.select(ctx, "list recent customer notes", &filter)
            .await
    }

    async fn count(&self, ctx: &CallContext) -> RepoResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customer_notes");
        self.count_where(ctx, "count notes", &mut qb).await
    }

    async fn count_by_customer(&self, ctx: &CallContext, customer_id: i64) -> RepoResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM customer_notes WHERE customer_id = ",
        );
        qb.push_bind(customer_id);
        self.count_where(ctx, "count customer notes", &mut qb)
            .await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filter_binds_every_present_bound() {
        let filter = NoteFilter {
            customer_id: Some(3),
            note_type: Some(NoteType::Reminder),
            date_from: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            date_to: Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()),
            ..NoteFilter::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM customer_notes");
        push_filter(&mut qb, &filter);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM customer_notes WHERE TRUE AND customer_id = $1 \
             AND note_type = $2 AND created_at >= $3 AND created_at <= $4"
        );
    }
}
