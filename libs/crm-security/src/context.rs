use thiserror::Error;

use crate::TenantId;

/// Returned when an operation needs a tenant and the context never had one attached.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no tenant bound to the call context")]
pub struct MissingTenant;

/// Staff member acting on behalf of a call (used as note author).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffRef {
    pub id: String,
    pub name: String,
}

/// `CallContext` carries the caller identity through one call.
///
/// Immutable once built; every `with_*` method returns a new context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    tenant: Option<TenantId>,
    staff: Option<StaffRef>,
    request_id: Option<String>,
}

impl CallContext {
    #[must_use]
    pub fn builder() -> CallContextBuilder {
        CallContextBuilder::default()
    }

    /// Context with no tenant, staff or request id.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Derive a child context bound to `tenant`.
    #[must_use]
    pub fn with_tenant(&self, tenant: TenantId) -> Self {
        Self {
            tenant: Some(tenant),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_staff(&self, staff: StaffRef) -> Self {
        Self {
            staff: Some(staff),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            ..self.clone()
        }
    }

    /// Tenant bound to this context, if any. Never falls back to a default.
    #[must_use]
    pub fn tenant(&self) -> Option<TenantId> {
        self.tenant
    }

    /// Tenant bound to this context.
    ///
    /// # Errors
    /// Returns [`MissingTenant`] if no tenant was attached.
    pub fn require_tenant(&self) -> Result<TenantId, MissingTenant> {
        self.tenant.ok_or(MissingTenant)
    }

    #[must_use]
    pub fn staff(&self) -> Option<&StaffRef> {
        self.staff.as_ref()
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

#[derive(Default)]
pub struct CallContextBuilder {
    tenant: Option<TenantId>,
    staff: Option<StaffRef>,
    request_id: Option<String>,
}

impl CallContextBuilder {
    #[must_use]
    pub fn tenant(mut self, tenant: TenantId) -> Self {
        self.tenant = Some(tenant);
        self
    }

    #[must_use]
    pub fn staff(mut self, id: &str, name: &str) -> Self {
        self.staff = Some(StaffRef {
            id: id.to_owned(),
            name: name.to_owned(),
        });
        self
    }

    #[must_use]
    pub fn request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_owned());
        self
    }

    #[must_use]
    pub fn build(self) -> CallContext {
        CallContext {
            tenant: self.tenant,
            staff: self.staff,
            request_id: self.request_id,
        }
    }
}
