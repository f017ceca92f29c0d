use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

/// Identifier of the organization that owns a row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct TenantId(Uuid);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantIdError {
    #[error("tenant_id is required")]
    Empty,

    #[error("tenant_id is invalid: {0}")]
    Malformed(String),
}

impl TenantId {
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse a tenant identifier received from call metadata.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    /// Returns [`TenantIdError::Empty`] for blank input and
    /// [`TenantIdError::Malformed`] when the value is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, TenantIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TenantIdError::Empty);
        }
        Uuid::parse_str(trimmed)
            .map(Self)
            .map_err(|_| TenantIdError::Malformed(trimmed.to_owned()))
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for TenantId {
    type Err = TenantIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<TenantId> for Uuid {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}
