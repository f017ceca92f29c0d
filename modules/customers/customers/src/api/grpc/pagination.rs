//! Page and limit handling for list and search calls.

use customers_sdk::Page;

use crate::domain::error::DomainError;

/// `limit <= 0` becomes `default`, anything above `max` is cut to `max`.
pub fn clamp_limit(requested: i32, default: u32, max: u32) -> u32 {
    match u32::try_from(requested) {
        Ok(0) | Err(_) => default.min(max),
        Ok(n) => n.min(max),
    }
}

/// Pages are 1-based; `0` is read as the first page.
///
/// # Errors
/// Validation error on `page` when it is negative.
pub fn page_number(requested: i32) -> Result<u32, DomainError> {
    let page = u32::try_from(requested)
        .map_err(|_| DomainError::validation("page", "must not be negative"))?;
    Ok(page.max(1))
}

/// Counters of a page as they travel on the wire.
pub struct WirePage {
    pub total: i32,
    pub page: i32,
    pub limit: i32,
    pub total_pages: i32,
}

fn saturate(n: u64) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

impl<T> From<&Page<T>> for WirePage {
    fn from(page: &Page<T>) -> Self {
        Self {
            total: saturate(page.total),
            page: saturate(u64::from(page.page)),
            limit: saturate(u64::from(page.limit)),
            total_pages: saturate(page.total_pages()),
        }
    }
}
