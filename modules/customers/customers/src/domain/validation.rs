//! Field-level rules for customers, vehicles and notes.
//!
//! Each check returns the first violation it finds.

use customers_sdk::limits::{
    ADDRESS_MAX, COLOR_MAX, COMPANY_NAME_MAX, CUSTOMER_NOTES_MAX, EMAIL_MAX, ENGINE_MAX,
    LICENSE_PLATE_MAX, MAKE_MAX, MODEL_MAX, NAME_MAX, NOTE_BODY_MAX, PHONE_MAX, STAFF_NAME_MAX,
    TAX_ID_MAX, VEHICLE_NOTES_MAX, VIN_LEN, YEAR_MAX, YEAR_MIN,
};
use customers_sdk::{Customer, CustomerNote, CustomerType, Vehicle};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("validation error on field '{field}': {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

type Check = Result<(), ValidationError>;

fn required(field: &'static str, value: &str, max: usize) -> Check {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    max_len(field, value, max)
}

fn max_len(field: &'static str, value: &str, max: usize) -> Check {
    if value.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

fn optional(field: &'static str, value: Option<&String>, max: usize) -> Check {
    value.map_or(Ok(()), |v| max_len(field, v, max))
}

fn is_valid_email(email: &str) -> bool {
    email.len() > 3 && email.len() <= EMAIL_MAX && email.contains('@') && email.contains('.')
}

pub fn validate_customer(c: &Customer) -> Check {
    required("first_name", &c.first_name, NAME_MAX)?;
    required("last_name", &c.last_name, NAME_MAX)?;

    if c.customer_type == CustomerType::Business
        && c.company_name.as_deref().is_none_or(|n| n.trim().is_empty())
    {
        return Err(ValidationError::new(
            "company_name",
            "is required for business customers",
        ));
    }

    if let Some(email) = c.email.as_deref()
        && !is_valid_email(email)
    {
        return Err(ValidationError::new("email", "invalid email format"));
    }

    optional("phone", c.phone.as_ref(), PHONE_MAX)?;
    optional("company_name", c.company_name.as_ref(), COMPANY_NAME_MAX)?;
    optional("tax_id", c.tax_id.as_ref(), TAX_ID_MAX)?;
    optional("address", c.address.as_ref(), ADDRESS_MAX)?;
    optional("notes", c.notes.as_ref(), CUSTOMER_NOTES_MAX)
}

pub fn validate_vehicle(v: &Vehicle) -> Check {
    if v.customer_id <= 0 {
        return Err(ValidationError::new("customer_id", "is required"));
    }
    required("make", &v.make, MAKE_MAX)?;
    required("model", &v.model, MODEL_MAX)?;
    if !(YEAR_MIN..=YEAR_MAX).contains(&v.year) {
        return Err(ValidationError::new(
            "year",
            format!("must be between {YEAR_MIN} and {YEAR_MAX}"),
        ));
    }
    optional("license_plate", v.license_plate.as_ref(), LICENSE_PLATE_MAX)?;
    optional("color", v.color.as_ref(), COLOR_MAX)?;
    optional("engine", v.engine.as_ref(), ENGINE_MAX)?;
    optional("notes", v.notes.as_ref(), VEHICLE_NOTES_MAX)
}

/// Exactly 17 alphanumeric characters, none of `I`, `O`, `Q` in either case.
pub fn validate_vin(vin: &str) -> Check {
    if vin.chars().count() != VIN_LEN {
        return Err(ValidationError::new(
            "vin",
            format!("must be exactly {VIN_LEN} characters"),
        ));
    }
    if vin
        .chars()
        .any(|c| matches!(c.to_ascii_uppercase(), 'I' | 'O' | 'Q'))
    {
        return Err(ValidationError::new(
            "vin",
            "must not contain the letters I, O or Q",
        ));
    }
    if !vin.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("vin", "must be alphanumeric"));
    }
    Ok(())
}

pub fn validate_note(n: &CustomerNote) -> Check {
    if n.customer_id <= 0 {
        return Err(ValidationError::new("customer_id", "is required"));
    }
    required("staff_id", &n.staff_id, STAFF_NAME_MAX)?;
    required("staff_name", &n.staff_name, STAFF_NAME_MAX)?;
    required("note", &n.note, NOTE_BODY_MAX)
}
