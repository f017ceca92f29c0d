//! Row structs decoded by sqlx and their conversion into SDK models.

use chrono::{DateTime, NaiveDate, Utc};
use crm_security::TenantId;
use customers_sdk::{Customer, CustomerNote, PropertyBag, Vehicle};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::error::DomainError;

pub const CUSTOMER_COLUMNS: &str = "id, tenant_id, first_name, last_name, email, phone, \
     customer_type, company_name, tax_id, address, birthday, notes, preferences, is_active, \
     created_at, updated_at";

pub const VEHICLE_COLUMNS: &str = "id, tenant_id, customer_id, make, model, year, vin, \
     license_plate, color, engine, notes, is_active, metadata, created_at, updated_at";

pub const NOTE_COLUMNS: &str =
    "id, tenant_id, customer_id, staff_id, staff_name, note, note_type, created_at";

#[derive(Debug, FromRow)]
pub struct CustomerRow {
    pub id: i64,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_type: String,
    pub company_name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub notes: Option<String>,
    pub preferences: Json<PropertyBag>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = DomainError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let customer_type = row
            .customer_type
            .parse()
            .map_err(|e| DomainError::Database(anyhow::Error::new(e)))?;
        Ok(Self {
            id: row.id,
            tenant_id: TenantId::from_uuid(row.tenant_id),
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            customer_type,
            company_name: row.company_name,
            tax_id: row.tax_id,
            address: row.address,
            birthday: row.birthday,
            notes: row.notes,
            preferences: row.preferences.0,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            vehicles: None,
            customer_notes: None,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct VehicleRow {
    pub id: i64,
    pub tenant_id: Uuid,
    pub customer_id: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub vin: Option<String>,
    pub license_plate: Option<String>,
    pub color: Option<String>,
    pub engine: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub metadata: Json<PropertyBag>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Self {
            id: row.id,
            tenant_id: TenantId::from_uuid(row.tenant_id),
            customer_id: row.customer_id,
            make: row.make,
            model: row.model,
            year: row.year,
            vin: row.vin,
            license_plate: row.license_plate,
            color: row.color,
            engine: row.engine,
            notes: row.notes,
            is_active: row.is_active,
            metadata: row.metadata.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct NoteRow {
    pub id: i64,
    pub tenant_id: Uuid,
    pub customer_id: i64,
    pub staff_id: String,
    pub staff_name: String,
    pub note: String,
    pub note_type: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NoteRow> for CustomerNote {
    type Error = DomainError;

    fn try_from(row: NoteRow) -> Result<Self, Self::Error> {
        let note_type = row
            .note_type
            .parse()
            .map_err(|e| DomainError::Database(anyhow::Error::new(e)))?;
        Ok(Self {
            id: row.id,
            tenant_id: TenantId::from_uuid(row.tenant_id),
            customer_id: row.customer_id,
            staff_id: row.staff_id,
            staff_name: row.staff_name,
            note: row.note,
            note_type,
            created_at: row.created_at,
        })
    }
}

/// Convert every row, failing on the first that does not decode.
pub fn into_models<R, M>(rows: Vec<R>) -> Result<Vec<M>, DomainError>
where
    M: TryFrom<R, Error = DomainError>,
{
    rows.into_iter().map(M::try_from).collect()
}
