use std::sync::Arc;

use crm_security::CallContext;
use customers_sdk::{
    Customer, CustomerFilter, CustomerNote, CustomerSearch, CustomerUpdate, NewCustomer,
    NewCustomerNote, NoteType, Page, PropertyValue,
};
use tracing::{debug, info, instrument};

use super::referenced_customer;
use crate::domain::error::DomainError;
use crate::domain::repo::{CustomerRepository, NoteRepository, VehicleRepository};
use crate::domain::validation::{validate_customer, validate_note};

/// Notes attached to a customer fetched with `include_notes`.
const RECENT_NOTES_ON_GET: u32 = 10;

pub struct CustomerService {
    customers: Arc<dyn CustomerRepository>,
    vehicles: Arc<dyn VehicleRepository>,
    notes: Arc<dyn NoteRepository>,
}

impl CustomerService {
    pub fn new(
        customers: Arc<dyn CustomerRepository>,
        vehicles: Arc<dyn VehicleRepository>,
        notes: Arc<dyn NoteRepository>,
    ) -> Self {
        Self {
            customers,
            vehicles,
            notes,
        }
    }

    async fn ensure_email_free(
        &self,
        ctx: &CallContext,
        email: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), DomainError> {
        if self.customers.exists_by_email(ctx, email, exclude_id).await? {
            return Err(DomainError::duplicate("email", email));
        }
        Ok(())
    }

    async fn ensure_tax_id_free(
        &self,
        ctx: &CallContext,
        tax_id: &str,
        exclude_id: Option<i64>,
    ) -> Result<(), DomainError> {
        if self.customers.exists_by_tax_id(ctx, tax_id, exclude_id).await? {
            return Err(DomainError::duplicate("tax_id", tax_id));
        }
        Ok(())
    }

    /// Validate, pre-check email/tax id uniqueness, insert.
    ///
    /// The pre-checks only produce a friendlier error; the unique indexes
    /// decide concurrent races and surface as the same `Duplicate`.
    #[instrument(skip_all, fields(customer_type = %new.customer_type))]
    pub async fn create_customer(
        &self,
        ctx: &CallContext,
        new: NewCustomer,
    ) -> Result<Customer, DomainError> {
        let tenant = ctx.require_tenant()?;
        let customer = Customer::from_new(tenant, new);
        validate_customer(&customer)?;

        if let Some(email) = customer.email.as_deref() {
            self.ensure_email_free(ctx, email, None).await?;
        }
        if let Some(tax_id) = customer.tax_id.as_deref() {
            self.ensure_tax_id_free(ctx, tax_id, None).await?;
        }

        let created = self.customers.create(ctx, &customer).await?;
        info!(customer_id = created.id, "customer created");
        Ok(created)
    }

    #[instrument(skip(self, ctx))]
    pub async fn get_customer(
        &self,
        ctx: &CallContext,
        id: i64,
        include_vehicles: bool,
        include_notes: bool,
    ) -> Result<Customer, DomainError> {
        let mut customer = self.customers.get(ctx, id).await?;

        if include_vehicles {
            customer.vehicles = Some(self.vehicles.list_by_customer(ctx, id).await?);
        }
        if include_notes {
            customer.customer_notes = Some(
                self.notes
                    .list_recent_by_customer(ctx, id, RECENT_NOTES_ON_GET)
                    .await?,
            );
        }
        Ok(customer)
    }

    /// Apply the non-empty fields of `update`. Email and tax id uniqueness is
    /// re-checked only when the value actually changes.
    #[instrument(skip(self, ctx, update))]
    pub async fn update_customer(
        &self,
        ctx: &CallContext,
        id: i64,
        update: CustomerUpdate,
    ) -> Result<Customer, DomainError> {
        let mut customer = self.customers.get(ctx, id).await?;

        if let Some(email) = update.email.as_deref()
            && customer.email.as_deref() != Some(email)
        {
            self.ensure_email_free(ctx, email, Some(id)).await?;
        }
        if let Some(tax_id) = update.tax_id.as_deref()
            && customer.tax_id.as_deref() != Some(tax_id)
        {
            self.ensure_tax_id_free(ctx, tax_id, Some(id)).await?;
        }

        customer.apply_update(&update);
        validate_customer(&customer)?;

        let updated = self.customers.update(ctx, &customer).await?;
        debug!("customer updated");
        Ok(updated)
    }

    /// Deactivates a customer that still owns active vehicles, deletes it otherwise.
    #[instrument(skip(self, ctx))]
    pub async fn delete_customer(&self, ctx: &CallContext, id: i64) -> Result<(), DomainError> {
        let mut customer = self.customers.get(ctx, id).await?;
        let active_vehicles = self.vehicles.list_active_by_customer(ctx, id).await?;

        if active_vehicles.is_empty() {
            self.customers.delete(ctx, id).await?;
            info!("customer deleted");
        } else {
            customer.deactivate();
            self.customers.update(ctx, &customer).await?;
            info!(
                active_vehicles = active_vehicles.len(),
                "customer has active vehicles, deactivated instead of deleted"
            );
        }
        Ok(())
    }

    pub async fn list_customers(
        &self,
        ctx: &CallContext,
        filter: &CustomerFilter,
    ) -> Result<Page<Customer>, DomainError> {
        self.customers.list(ctx, filter).await
    }

    /// A blank query matches nothing and never reaches storage.
    pub async fn search_customers(
        &self,
        ctx: &CallContext,
        search: &CustomerSearch,
    ) -> Result<Vec<Customer>, DomainError> {
        if search.query.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.customers.search(ctx, search).await
    }

    pub async fn get_customer_by_email(
        &self,
        ctx: &CallContext,
        email: &str,
    ) -> Result<Customer, DomainError> {
        self.customers.get_by_email(ctx, email).await
    }

    pub async fn get_customer_by_tax_id(
        &self,
        ctx: &CallContext,
        tax_id: &str,
    ) -> Result<Customer, DomainError> {
        self.customers.get_by_tax_id(ctx, tax_id).await
    }

    pub async fn activate_customer(
        &self,
        ctx: &CallContext,
        id: i64,
    ) -> Result<Customer, DomainError> {
        let mut customer = self.customers.get(ctx, id).await?;
        customer.activate();
        self.customers.update(ctx, &customer).await
    }

    pub async fn deactivate_customer(
        &self,
        ctx: &CallContext,
        id: i64,
    ) -> Result<Customer, DomainError> {
        let mut customer = self.customers.get(ctx, id).await?;
        customer.deactivate();
        self.customers.update(ctx, &customer).await
    }

    #[instrument(skip(self, ctx, new), fields(customer_id = new.customer_id, note_type = %new.note_type))]
    pub async fn add_customer_note(
        &self,
        ctx: &CallContext,
        new: NewCustomerNote,
    ) -> Result<CustomerNote, DomainError> {
        referenced_customer(&self.customers, ctx, new.customer_id).await?;

        let tenant = ctx.require_tenant()?;
        let note = CustomerNote::from_new(tenant, new);
        validate_note(&note)?;

        let created = self.notes.create(ctx, &note).await?;
        info!(note_id = created.id, "customer note added");
        Ok(created)
    }

    /// By type when given; otherwise the `limit` most recent, or all when `limit` is zero.
    pub async fn get_customer_notes(
        &self,
        ctx: &CallContext,
        customer_id: i64,
        note_type: Option<NoteType>,
        limit: u32,
    ) -> Result<Vec<CustomerNote>, DomainError> {
        referenced_customer(&self.customers, ctx, customer_id).await?;

        match note_type {
            Some(t) => {
                self.notes
                    .list_by_customer_and_type(ctx, customer_id, t)
                    .await
            }
            None if limit > 0 => {
                self.notes
                    .list_recent_by_customer(ctx, customer_id, limit)
                    .await
            }
            None => self.notes.list_by_customer(ctx, customer_id).await,
        }
    }

    pub async fn set_customer_preference(
        &self,
        ctx: &CallContext,
        customer_id: i64,
        key: &str,
        value: PropertyValue,
    ) -> Result<Customer, DomainError> {
        let mut customer = self.customers.get(ctx, customer_id).await?;
        customer.set_preference(key, value);
        self.customers.update(ctx, &customer).await
    }

    pub async fn get_customer_preference(
        &self,
        ctx: &CallContext,
        customer_id: i64,
        key: &str,
    ) -> Result<PropertyValue, DomainError> {
        let customer = self.customers.get(ctx, customer_id).await?;
        customer
            .preference(key)
            .cloned()
            .ok_or_else(|| DomainError::not_found("preference", key))
    }
}
