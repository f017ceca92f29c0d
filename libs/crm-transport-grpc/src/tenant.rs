//! Tenant extraction from call metadata.

use crm_security::{
    CallContext, StaffRef, TenantId, TenantIdError,
    constants::{
        REQUEST_ID_METADATA_KEY, STAFF_ID_METADATA_KEY, STAFF_NAME_METADATA_KEY,
        TENANT_METADATA_KEY,
    },
};
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};

const TENANT_REQUIRED: &str = "tenant_id is required";
const TENANT_INVALID: &str = "tenant_id is invalid";

fn ascii_value<'a>(meta: &'a MetadataMap, key: &str) -> Option<&'a str> {
    meta.get(key)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Read and parse the tenant identifier from call metadata.
///
/// # Errors
/// `INVALID_ARGUMENT` when the key is absent, blank, not ASCII, or not a UUID.
pub fn extract_tenant(meta: &MetadataMap) -> Result<TenantId, Status> {
    let raw = ascii_value(meta, TENANT_METADATA_KEY)
        .ok_or_else(|| Status::invalid_argument(TENANT_REQUIRED))?;

    TenantId::parse(raw).map_err(|e| match e {
        TenantIdError::Empty => Status::invalid_argument(TENANT_REQUIRED),
        TenantIdError::Malformed(_) => Status::invalid_argument(TENANT_INVALID),
    })
}

/// Write the tenant identifier into outbound call metadata.
///
/// # Errors
/// Never fails for a well-formed `TenantId`; kept fallible to match the
/// metadata API.
pub fn attach_tenant(meta: &mut MetadataMap, tenant: &TenantId) -> Result<(), Status> {
    let value = MetadataValue::try_from(tenant.to_string())
        .map_err(|e| Status::internal(format!("tenant metadata encode: {e}")))?;
    meta.insert(TENANT_METADATA_KEY, value);
    Ok(())
}

/// Build the call context from metadata: tenant (required), staff and request id (optional).
///
/// # Errors
/// See [`extract_tenant`].
pub fn context_from_metadata(meta: &MetadataMap) -> Result<CallContext, Status> {
    let tenant = extract_tenant(meta)?;
    let mut ctx = CallContext::anonymous().with_tenant(tenant);

    if let Some(id) = ascii_value(meta, STAFF_ID_METADATA_KEY) {
        let name = ascii_value(meta, STAFF_NAME_METADATA_KEY).unwrap_or(id);
        ctx = ctx.with_staff(StaffRef {
            id: id.to_owned(),
            name: name.to_owned(),
        });
    }
    if let Some(rid) = ascii_value(meta, REQUEST_ID_METADATA_KEY) {
        ctx = ctx.with_request_id(rid);
    }
    Ok(ctx)
}

/// Call context installed by [`TenantInterceptor`].
///
/// Falls back to parsing the metadata when the interceptor did not run, so a
/// handler can never proceed without a tenant.
///
/// # Errors
/// See [`extract_tenant`].
pub fn call_context<T>(request: &Request<T>) -> Result<CallContext, Status> {
    match request.extensions().get::<CallContext>() {
        Some(ctx) => Ok(ctx.clone()),
        None => context_from_metadata(request.metadata()),
    }
}

/// Rejects calls without a valid tenant and installs the [`CallContext`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TenantInterceptor;

impl Interceptor for TenantInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let ctx = context_from_metadata(request.metadata()).inspect_err(|status| {
            tracing::warn!(reason = status.message(), "rejecting call without tenant");
        })?;
        request.extensions_mut().insert(ctx);
        Ok(request)
    }
}
