//! Conversions between `crm.v1` wire messages and SDK models.
//!
//! Empty strings on the wire mean "absent". Shape checks that only look at a
//! single request (ids, required text, year range) live here too; everything
//! that needs stored state is left to the services.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use customers_sdk::limits::{YEAR_MAX, YEAR_MIN};
use customers_sdk::proto;
use customers_sdk::{
    Customer, CustomerFilter, CustomerNote, CustomerSearch, CustomerType, CustomerUpdate,
    NewCustomer, NewVehicle, NoteType, PropertyBag, PropertyValue, SearchField, SortField,
    SortOrder, Vehicle, VehicleFilter, VehicleUpdate,
};
use prost_types::value::Kind;
use prost_types::{ListValue, NullValue, Struct, Timestamp, Value};

use super::pagination::{clamp_limit, page_number};
use crate::config::CustomersConfig;
use crate::domain::error::DomainError;

// ---- shape checks ----

pub fn require_id(field: &'static str, id: i64) -> Result<i64, DomainError> {
    if id <= 0 {
        return Err(DomainError::validation(field, "must be a positive integer"));
    }
    Ok(id)
}

fn require_text(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "is required"));
    }
    Ok(())
}

fn require_year(year: i32) -> Result<i32, DomainError> {
    if !(YEAR_MIN..=YEAR_MAX).contains(&year) {
        return Err(DomainError::validation(
            "year",
            format!("must be between {YEAR_MIN} and {YEAR_MAX}"),
        ));
    }
    Ok(year)
}

/// `None` for an empty or blank wire string.
fn opt(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_customer_type(raw: &str) -> Result<CustomerType, DomainError> {
    raw.parse()
        .map_err(|e: customers_sdk::ParseEnumError| {
            DomainError::validation("customer_type", e.to_string())
        })
}

fn opt_customer_type(raw: &str) -> Result<Option<CustomerType>, DomainError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_customer_type(raw).map(Some)
}

/// Empty means `general`.
pub fn note_type(raw: &str) -> Result<NoteType, DomainError> {
    if raw.trim().is_empty() {
        return Ok(NoteType::General);
    }
    raw.parse()
        .map_err(|e: customers_sdk::ParseEnumError| DomainError::validation("type", e.to_string()))
}

// ---- timestamps ----

pub fn timestamp(at: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: at.timestamp(),
        nanos: i32::try_from(at.timestamp_subsec_nanos()).unwrap_or_default(),
    }
}

fn date_timestamp(date: NaiveDate) -> Timestamp {
    timestamp(date.and_time(NaiveTime::MIN).and_utc())
}

pub fn datetime(field: &'static str, ts: &Timestamp) -> Result<DateTime<Utc>, DomainError> {
    u32::try_from(ts.nanos)
        .ok()
        .and_then(|nanos| DateTime::from_timestamp(ts.seconds, nanos))
        .ok_or_else(|| DomainError::validation(field, "invalid timestamp"))
}

fn birthday(ts: Option<&Timestamp>) -> Result<Option<NaiveDate>, DomainError> {
    ts.map(|ts| datetime("birthday", ts).map(|at| at.date_naive()))
        .transpose()
}

// ---- property bags ----

fn value_to_property(field: &'static str, value: Value) -> Result<PropertyValue, DomainError> {
    Ok(match value.kind {
        None | Some(Kind::NullValue(_)) => PropertyValue::Null,
        Some(Kind::BoolValue(b)) => PropertyValue::Bool(b),
        Some(Kind::NumberValue(n)) if n.is_finite() => PropertyValue::Number(n),
        Some(Kind::NumberValue(_)) => {
            return Err(DomainError::validation(field, "numbers must be finite"));
        }
        Some(Kind::StringValue(s)) => PropertyValue::String(s),
        Some(Kind::ListValue(list)) => PropertyValue::List(
            list.values
                .into_iter()
                .map(|v| value_to_property(field, v))
                .collect::<Result<_, _>>()?,
        ),
        Some(Kind::StructValue(s)) => PropertyValue::Map(struct_to_bag(field, s)?),
    })
}

/// JSON has no NaN or infinity, so non-finite numbers are rejected under `field`.
pub fn struct_to_bag(field: &'static str, s: Struct) -> Result<PropertyBag, DomainError> {
    s.fields
        .into_iter()
        .map(|(k, v)| value_to_property(field, v).map(|v| (k, v)))
        .collect()
}

fn opt_bag(field: &'static str, s: Option<Struct>) -> Result<Option<PropertyBag>, DomainError> {
    s.map(|s| struct_to_bag(field, s)).transpose()
}

fn property_to_value(value: &PropertyValue) -> Value {
    let kind = match value {
        PropertyValue::Null => Kind::NullValue(NullValue::NullValue.into()),
        PropertyValue::Bool(b) => Kind::BoolValue(*b),
        PropertyValue::Number(n) => Kind::NumberValue(*n),
        PropertyValue::String(s) => Kind::StringValue(s.clone()),
        PropertyValue::List(items) => Kind::ListValue(ListValue {
            values: items.iter().map(property_to_value).collect(),
        }),
        PropertyValue::Map(bag) => Kind::StructValue(bag_to_struct(bag)),
    };
    Value { kind: Some(kind) }
}

pub fn bag_to_struct(bag: &PropertyBag) -> Struct {
    Struct {
        fields: bag
            .iter()
            .map(|(k, v)| (k.clone(), property_to_value(v)))
            .collect(),
    }
}

// ---- models -> wire ----

pub fn customer_to_proto(customer: Customer) -> proto::Customer {
    proto::Customer {
        id: customer.id,
        tenant_id: customer.tenant_id.to_string(),
        first_name: customer.first_name,
        last_name: customer.last_name,
        email: customer.email.unwrap_or_default(),
        phone: customer.phone.unwrap_or_default(),
        customer_type: customer.customer_type.as_str().to_owned(),
        company_name: customer.company_name.unwrap_or_default(),
        tax_id: customer.tax_id.unwrap_or_default(),
        address: customer.address.unwrap_or_default(),
        birthday: customer.birthday.map(date_timestamp),
        notes: customer.notes.unwrap_or_default(),
        preferences: Some(bag_to_struct(&customer.preferences)),
        is_active: customer.is_active,
        created_at: Some(timestamp(customer.created_at)),
        updated_at: Some(timestamp(customer.updated_at)),
        vehicles: customer
            .vehicles
            .unwrap_or_default()
            .into_iter()
            .map(vehicle_to_proto)
            .collect(),
        customer_notes: customer
            .customer_notes
            .unwrap_or_default()
            .into_iter()
            .map(note_to_proto)
            .collect(),
    }
}

pub fn vehicle_to_proto(vehicle: Vehicle) -> proto::Vehicle {
    proto::Vehicle {
        id: vehicle.id,
        customer_id: vehicle.customer_id,
        make: vehicle.make,
        model: vehicle.model,
        year: vehicle.year,
        vin: vehicle.vin.unwrap_or_default(),
        license_plate: vehicle.license_plate.unwrap_or_default(),
        color: vehicle.color.unwrap_or_default(),
        engine: vehicle.engine.unwrap_or_default(),
        notes: vehicle.notes.unwrap_or_default(),
        is_active: vehicle.is_active,
        metadata: Some(bag_to_struct(&vehicle.metadata)),
        created_at: Some(timestamp(vehicle.created_at)),
        updated_at: Some(timestamp(vehicle.updated_at)),
    }
}

pub fn note_to_proto(note: CustomerNote) -> proto::CustomerNote {
    proto::CustomerNote {
        id: note.id,
        customer_id: note.customer_id,
        staff_id: note.staff_id,
        staff_name: note.staff_name,
        note: note.note,
        r#type: note.note_type.as_str().to_owned(),
        created_at: Some(timestamp(note.created_at)),
    }
}

// ---- wire -> models ----

pub fn customer_filter(
    req: proto::ListCustomersRequest,
    limits: &CustomersConfig,
) -> Result<CustomerFilter, DomainError> {
    Ok(CustomerFilter {
        customer_type: opt_customer_type(&req.customer_type)?,
        page: page_number(req.page)?,
        limit: clamp_limit(req.limit, limits.default_limit, limits.max_list_limit),
        sort_by: SortField::parse(&req.sort_by),
        sort_order: SortOrder::parse(&req.sort_order),
        active_only: req.active_only,
        search: opt(req.search),
    })
}

pub fn customer_search(
    req: proto::SearchCustomersRequest,
    limits: &CustomersConfig,
) -> CustomerSearch {
    CustomerSearch {
        fields: SearchField::parse_list(&req.search_fields),
        limit: clamp_limit(req.limit, limits.default_limit, limits.max_search_limit),
        query: req.query,
    }
}

/// The customer part of a create request; nested vehicles are split off by the caller.
pub fn new_customer(req: proto::CreateCustomerRequest) -> Result<NewCustomer, DomainError> {
    require_text("first_name", &req.first_name)?;
    require_text("last_name", &req.last_name)?;
    require_text("customer_type", &req.customer_type)?;

    Ok(NewCustomer {
        customer_type: parse_customer_type(&req.customer_type)?,
        birthday: birthday(req.birthday.as_ref())?,
        first_name: req.first_name,
        last_name: req.last_name,
        email: opt(req.email),
        phone: opt(req.phone),
        company_name: opt(req.company_name),
        tax_id: opt(req.tax_id),
        address: opt(req.address),
        notes: opt(req.notes),
        preferences: opt_bag("preferences", req.preferences)?.unwrap_or_default(),
    })
}

pub fn customer_update(req: proto::UpdateCustomerRequest) -> Result<CustomerUpdate, DomainError> {
    Ok(CustomerUpdate {
        customer_type: opt_customer_type(&req.customer_type)?,
        birthday: birthday(req.birthday.as_ref())?,
        first_name: opt(req.first_name),
        last_name: opt(req.last_name),
        email: opt(req.email),
        phone: opt(req.phone),
        company_name: opt(req.company_name),
        tax_id: opt(req.tax_id),
        address: opt(req.address),
        notes: opt(req.notes),
        preferences: opt_bag("preferences", req.preferences)?,
        is_active: req.is_active,
    })
}

pub fn vehicle_filter(
    req: proto::ListVehiclesRequest,
    limits: &CustomersConfig,
) -> Result<VehicleFilter, DomainError> {
    let customer_id = match req.customer_id {
        0 => None,
        id => Some(require_id("customer_id", id)?),
    };
    Ok(VehicleFilter {
        customer_id,
        search: opt(req.search),
        active_only: req.active_only,
        page: page_number(req.page)?,
        limit: clamp_limit(req.limit, limits.default_limit, limits.max_list_limit),
    })
}

/// Shape of a vehicle to create. `customer_id` is only checked when `owned` is
/// false; nested vehicles take the id of the customer created with them.
pub fn new_vehicle(req: proto::CreateVehicleRequest, owned: bool) -> Result<NewVehicle, DomainError> {
    if !owned {
        require_id("customer_id", req.customer_id)?;
    }
    require_text("make", &req.make)?;
    require_text("model", &req.model)?;

    Ok(NewVehicle {
        customer_id: req.customer_id,
        year: require_year(req.year)?,
        make: req.make,
        model: req.model,
        vin: opt(req.vin),
        license_plate: opt(req.license_plate),
        color: opt(req.color),
        engine: opt(req.engine),
        notes: opt(req.notes),
        metadata: opt_bag("metadata", req.metadata)?.unwrap_or_default(),
    })
}

pub fn vehicle_update(req: proto::UpdateVehicleRequest) -> Result<VehicleUpdate, DomainError> {
    let year = match req.year {
        0 => None,
        year => Some(require_year(year)?),
    };
    Ok(VehicleUpdate {
        year,
        make: opt(req.make),
        model: opt(req.model),
        vin: opt(req.vin),
        license_plate: opt(req.license_plate),
        color: opt(req.color),
        engine: opt(req.engine),
        notes: opt(req.notes),
        is_active: req.is_active,
        metadata: opt_bag("metadata", req.metadata)?,
    })
}
