//! Maximum lengths, in characters, of stored text fields.

pub const NAME_MAX: usize = 100;
pub const EMAIL_MAX: usize = 255;
pub const PHONE_MAX: usize = 20;
pub const COMPANY_NAME_MAX: usize = 255;
pub const TAX_ID_MAX: usize = 50;
pub const ADDRESS_MAX: usize = 500;
pub const CUSTOMER_NOTES_MAX: usize = 1000;

pub const NOTE_BODY_MAX: usize = 2000;
pub const STAFF_NAME_MAX: usize = 200;

pub const MAKE_MAX: usize = 50;
pub const MODEL_MAX: usize = 50;
pub const VIN_LEN: usize = 17;
pub const LICENSE_PLATE_MAX: usize = 20;
pub const COLOR_MAX: usize = 30;
pub const ENGINE_MAX: usize = 100;
pub const VEHICLE_NOTES_MAX: usize = 1000;

pub const YEAR_MIN: i32 = 1900;
pub const YEAR_MAX: i32 = 2100;

/// Two vehicles of the same make and model fit each other within this many model years.
pub const COMPATIBLE_YEAR_RANGE: i32 = 3;
