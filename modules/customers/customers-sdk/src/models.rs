//! Public models for the customers module.
//!
//! Transport-agnostic data structures shared by the domain, the storage layer and
//! the gRPC adapter.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use crm_security::TenantId;
use thiserror::Error;

use crate::limits::COMPATIBLE_YEAR_RANGE;
use crate::property::{PropertyBag, PropertyValue};

/// Returned when a textual enum value is not one of the known variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CustomerType {
    #[default]
    Individual,
    Business,
}

impl CustomerType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Business => "business",
        }
    }
}

impl FromStr for CustomerType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" => Ok(Self::Individual),
            "business" => Ok(Self::Business),
            _ => Err(ParseEnumError {
                kind: "customer_type",
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NoteType {
    #[default]
    General,
    Service,
    Complaint,
    Compliment,
    Reminder,
    Warning,
}

impl NoteType {
    pub const ALL: [Self; 6] = [
        Self::General,
        Self::Service,
        Self::Complaint,
        Self::Compliment,
        Self::Reminder,
        Self::Warning,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Service => "service",
            Self::Complaint => "complaint",
            Self::Compliment => "compliment",
            Self::Reminder => "reminder",
            Self::Warning => "warning",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Service => "Service",
            Self::Complaint => "Complaint",
            Self::Compliment => "Compliment",
            Self::Reminder => "Reminder",
            Self::Warning => "Warning",
        }
    }
}

impl FromStr for NoteType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| ParseEnumError {
                kind: "note type",
                value: s.to_owned(),
            })
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer of a tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub tenant_id: TenantId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_type: CustomerType,
    pub company_name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub notes: Option<String>,
    pub preferences: PropertyBag,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Loaded only when a caller asks for them; never persisted.
    pub vehicles: Option<Vec<Vehicle>>,
    /// Most recent journal entries, loaded only on request; never persisted.
    pub customer_notes: Option<Vec<CustomerNote>>,
}

/// Data for creating a customer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_type: CustomerType,
    pub company_name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub notes: Option<String>,
    pub preferences: PropertyBag,
}

/// Partial update: `None` leaves the stored value untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomerUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub customer_type: Option<CustomerType>,
    pub company_name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub notes: Option<String>,
    pub preferences: Option<PropertyBag>,
    pub is_active: Option<bool>,
}

impl Customer {
    /// A fresh, active customer owned by `tenant_id`. The id is assigned on insert.
    #[must_use]
    pub fn from_new(tenant_id: TenantId, new: NewCustomer) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            tenant_id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone: new.phone,
            customer_type: new.customer_type,
            company_name: new.company_name,
            tax_id: new.tax_id,
            address: new.address,
            birthday: new.birthday,
            notes: new.notes,
            preferences: new.preferences,
            is_active: true,
            created_at: now,
            updated_at: now,
            vehicles: None,
            customer_notes: None,
        }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Company name for business customers that have one, full name otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (self.customer_type, self.company_name.as_deref()) {
            (CustomerType::Business, Some(company)) if !company.is_empty() => company.to_owned(),
            _ => self.full_name(),
        }
    }

    #[must_use]
    pub fn is_business(&self) -> bool {
        self.customer_type == CustomerType::Business
    }

    #[must_use]
    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.is_empty())
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    /// Overwrite the fields present in `update` and stamp `updated_at`.
    pub fn apply_update(&mut self, update: &CustomerUpdate) {
        if let Some(v) = &update.first_name {
            v.clone_into(&mut self.first_name);
        }
        if let Some(v) = &update.last_name {
            v.clone_into(&mut self.last_name);
        }
        if update.email.is_some() {
            self.email.clone_from(&update.email);
        }
        if update.phone.is_some() {
            self.phone.clone_from(&update.phone);
        }
        if let Some(t) = update.customer_type {
            self.customer_type = t;
        }
        if update.company_name.is_some() {
            self.company_name.clone_from(&update.company_name);
        }
        if update.tax_id.is_some() {
            self.tax_id.clone_from(&update.tax_id);
        }
        if update.address.is_some() {
            self.address.clone_from(&update.address);
        }
        if update.birthday.is_some() {
            self.birthday = update.birthday;
        }
        if update.notes.is_some() {
            self.notes.clone_from(&update.notes);
        }
        if let Some(prefs) = &update.preferences {
            self.preferences.clone_from(prefs);
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        self.updated_at = Utc::now();
    }

    pub fn set_preference(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.preferences.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn preference(&self, key: &str) -> Option<&PropertyValue> {
        self.preferences.get(key)
    }
}

/// A vehicle owned by a customer.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: i64,
    pub tenant_id: TenantId,
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
    pub metadata: PropertyBag,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewVehicle {
    pub customer_id: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub vin: Option<String>,
    pub license_plate: Option<String>,
    pub color: Option<String>,
    pub engine: Option<String>,
    pub notes: Option<String>,
    pub metadata: PropertyBag,
}

/// Partial update: `None` leaves the stored value untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VehicleUpdate {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub vin: Option<String>,
    pub license_plate: Option<String>,
    pub color: Option<String>,
    pub engine: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
    pub metadata: Option<PropertyBag>,
}

impl Vehicle {
    #[must_use]
    pub fn from_new(tenant_id: TenantId, new: NewVehicle) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            tenant_id,
            customer_id: new.customer_id,
            make: new.make,
            model: new.model,
            year: new.year,
            vin: new.vin,
            license_plate: new.license_plate,
            color: new.color,
            engine: new.engine,
            notes: new.notes,
            is_active: true,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// "2019 Toyota Corolla"
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.year, self.make, self.model)
    }

    /// "Toyota Corolla 2019", the key used when looking up parts.
    #[must_use]
    pub fn compatibility_string(&self) -> String {
        format!("{} {} {}", self.make, self.model, self.year)
    }

    /// Same make and model, model years at most three apart.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Vehicle) -> bool {
        self.make == other.make
            && self.model == other.model
            && (self.year - other.year).abs() <= COMPATIBLE_YEAR_RANGE
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    pub fn apply_update(&mut self, update: &VehicleUpdate) {
        if let Some(v) = &update.make {
            v.clone_into(&mut self.make);
        }
        if let Some(v) = &update.model {
            v.clone_into(&mut self.model);
        }
        if let Some(y) = update.year {
            self.year = y;
        }
        if update.vin.is_some() {
            self.vin.clone_from(&update.vin);
        }
        if update.license_plate.is_some() {
            self.license_plate.clone_from(&update.license_plate);
        }
        if update.color.is_some() {
            self.color.clone_from(&update.color);
        }
        if update.engine.is_some() {
            self.engine.clone_from(&update.engine);
        }
        if update.notes.is_some() {
            self.notes.clone_from(&update.notes);
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        if let Some(meta) = &update.metadata {
            self.metadata.clone_from(meta);
        }
        self.updated_at = Utc::now();
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.metadata.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&PropertyValue> {
        self.metadata.get(key)
    }
}

/// Compatibility overview for one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityInfo {
    pub vehicle: Vehicle,
    pub compatibility_string: String,
    /// Active vehicles of the same make and model within the year range.
    pub compatible_vehicles: usize,
    /// Vehicles with identical make, model and year, the vehicle itself excluded.
    pub exact_matches: usize,
    pub year_from: i32,
    pub year_to: i32,
}

/// Append-only journal entry about a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerNote {
    pub id: i64,
    pub tenant_id: TenantId,
    pub customer_id: i64,
    pub staff_id: String,
    pub staff_name: String,
    pub note: String,
    pub note_type: NoteType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewCustomerNote {
    pub customer_id: i64,
    pub staff_id: String,
    pub staff_name: String,
    pub note: String,
    pub note_type: NoteType,
}

impl CustomerNote {
    #[must_use]
    pub fn from_new(tenant_id: TenantId, new: NewCustomerNote) -> Self {
        Self {
            id: 0,
            tenant_id,
            customer_id: new.customer_id,
            staff_id: new.staff_id,
            staff_name: new.staff_name,
            note: new.note,
            note_type: new.note_type,
            created_at: Utc::now(),
        }
    }

    /// The body cut to at most `max` characters, ending in "..." when cut.
    #[must_use]
    pub fn short_note(&self, max: usize) -> String {
        if self.note.chars().count() <= max {
            return self.note.clone();
        }
        let keep = max.saturating_sub(3);
        let mut out: String = self.note.chars().take(keep).collect();
        out.push_str("...");
        out
    }

    /// "[Complaint] Ana Ruiz - 02/01/2025 15:04"
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} - {}",
            self.note_type.display_name(),
            self.staff_name,
            self.created_at.format("%d/%m/%Y %H:%M")
        )
    }
}
