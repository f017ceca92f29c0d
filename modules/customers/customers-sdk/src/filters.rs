//! List filters, search requests and pagination.

use chrono::{DateTime, Utc};

use crate::models::{CustomerType, NoteType};

/// Page size used by repositories when a filter carries none.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// `(limit, offset)` for a 1-based page. `limit == 0` means [`DEFAULT_PAGE_LIMIT`];
/// pages 0 and 1 both start at the first row.
#[must_use]
pub fn page_window(page: u32, limit: u32) -> (i64, i64) {
    let limit = if limit == 0 { DEFAULT_PAGE_LIMIT } else { limit };
    let offset = u64::from(page.saturating_sub(1)) * u64::from(limit);
    (
        i64::from(limit),
        i64::try_from(offset).unwrap_or(i64::MAX),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    CreatedAt,
    CompanyName,
}

impl SortField {
    /// Recognised sort keys; anything else means "default order".
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" => Some(Self::Name),
            "created_at" => Some(Self::CreatedAt),
            "company_name" => Some(Self::CompanyName),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// `"desc"` in any case is descending, everything else ascending.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }

    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Customer listing. Without `sort_by` rows come newest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomerFilter {
    /// Case-insensitive substring over first/last name, email and company name.
    pub search: Option<String>,
    pub customer_type: Option<CustomerType>,
    pub active_only: bool,
    pub page: u32,
    pub limit: u32,
    pub sort_by: Option<SortField>,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VehicleFilter {
    pub customer_id: Option<i64>,
    /// Case-insensitive substring over make, model, VIN and license plate.
    pub search: Option<String>,
    pub active_only: bool,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteFilter {
    pub customer_id: Option<i64>,
    pub note_type: Option<NoteType>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub page: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Name,
    Email,
    Phone,
    TaxId,
    CompanyName,
}

impl SearchField {
    pub const DEFAULTS: [Self; 4] = [Self::Name, Self::Email, Self::Phone, Self::TaxId];

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" => Some(Self::Name),
            "email" => Some(Self::Email),
            "phone" => Some(Self::Phone),
            "tax_id" => Some(Self::TaxId),
            "company_name" => Some(Self::CompanyName),
            _ => None,
        }
    }

    /// Comma separated list; unknown entries are skipped, an empty result means the defaults.
    #[must_use]
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut fields: Vec<Self> = Vec::new();
        for field in raw.split(',').filter_map(Self::parse) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        if fields.is_empty() {
            fields.extend(Self::DEFAULTS);
        }
        fields
    }
}

/// Free-text customer search, active customers only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSearch {
    pub query: String,
    pub fields: Vec<SearchField>,
    pub limit: u32,
}

impl CustomerSearch {
    #[must_use]
    pub fn new(query: impl Into<String>, limit: u32) -> Self {
        Self {
            query: query.into(),
            fields: SearchField::DEFAULTS.to_vec(),
            limit,
        }
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// `ceil(total / limit)`; zero when `limit` is zero.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
        }
    }
}
