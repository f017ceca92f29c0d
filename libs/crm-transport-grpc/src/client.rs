//! Outbound side: channel construction and tenant propagation for callers.

use std::time::Duration;

use crm_security::{
    CallContext, TenantId,
    constants::{STAFF_ID_METADATA_KEY, STAFF_NAME_METADATA_KEY},
};
use tonic::metadata::MetadataValue;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tracing::Instrument;

use crate::attach_tenant;

/// Transport settings for a client channel.
#[derive(Debug, Clone)]
pub struct GrpcClientConfig {
    /// Timeout for establishing the initial connection.
    pub connect_timeout: Duration,
    /// Timeout applied to each call.
    pub rpc_timeout: Duration,
    /// Name used in logs.
    pub service_name: &'static str,
}

impl Default for GrpcClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            rpc_timeout: Duration::from_secs(30),
            service_name: "grpc_client",
        }
    }
}

impl GrpcClientConfig {
    #[must_use]
    pub fn new(service_name: &'static str) -> Self {
        Self {
            service_name,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }
}

/// Open a channel with timeouts and HTTP/2 keepalive.
///
/// # Errors
/// Returns an error if the URI is invalid or the connection cannot be established.
pub async fn connect_channel(
    uri: impl Into<String>,
    cfg: &GrpcClientConfig,
) -> anyhow::Result<Channel> {
    let uri = uri.into();
    let span = tracing::debug_span!("grpc_connect", service = cfg.service_name, uri = %uri);

    async move {
        let channel = Endpoint::from_shared(uri)?
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.rpc_timeout)
            .tcp_keepalive(Some(Duration::from_secs(30)))
            .http2_keep_alive_interval(Duration::from_secs(30))
            .keep_alive_timeout(Duration::from_secs(10))
            .keep_alive_while_idle(true)
            .connect()
            .await?;
        tracing::info!(service_name = cfg.service_name, "gRPC client connected");
        Ok(channel)
    }
    .instrument(span)
    .await
}

/// Stamps every outbound call with the tenant (and staff, when known) of a context.
#[derive(Clone, Debug)]
pub struct TenantClientInterceptor {
    tenant: TenantId,
    staff: Option<(String, String)>,
}

impl TenantClientInterceptor {
    #[must_use]
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            staff: None,
        }
    }

    /// Propagate tenant and staff of an inbound call.
    ///
    /// # Errors
    /// Returns `INVALID_ARGUMENT` when the context has no tenant.
    pub fn from_context(ctx: &CallContext) -> Result<Self, Status> {
        let tenant = ctx
            .require_tenant()
            .map_err(|_| Status::invalid_argument("tenant_id is required"))?;
        Ok(Self {
            tenant,
            staff: ctx.staff().map(|s| (s.id.clone(), s.name.clone())),
        })
    }
}

impl Interceptor for TenantClientInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        attach_tenant(request.metadata_mut(), &self.tenant)?;
        if let Some((id, name)) = &self.staff {
            let encode = |v: &str| {
                MetadataValue::try_from(v)
                    .map_err(|e| Status::internal(format!("staff metadata encode: {e}")))
            };
            request
                .metadata_mut()
                .insert(STAFF_ID_METADATA_KEY, encode(id)?);
            request
                .metadata_mut()
                .insert(STAFF_NAME_METADATA_KEY, encode(name)?);
        }
        Ok(request)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::context_from_metadata;

    #[test]
    fn client_interceptor_round_trips_through_server_extraction() {
        let ctx = CallContext::builder()
            .tenant(TenantId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap())
            .staff("7", "Sam")
            .build();
        let mut interceptor = TenantClientInterceptor::from_context(&ctx).unwrap();

        let req = interceptor.call(Request::new(())).unwrap();
        let server_side = context_from_metadata(req.metadata()).unwrap();

        assert_eq!(server_side.tenant(), ctx.tenant());
        assert_eq!(server_side.staff(), ctx.staff());
    }

    #[test]
    fn from_context_requires_tenant() {
        let err = TenantClientInterceptor::from_context(&CallContext::anonymous()).unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
