//! Tower layers wrapped around the tonic router.

use std::any::Any;
use std::time::Duration;

use tonic::Status;
use tonic::service::interceptor::InterceptorLayer;
use tower::ServiceBuilder;
use tower::layer::util::{Identity, Stack};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};
use tower_http::classify::{GrpcErrorsAsFailures, SharedClassifier};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnEos, MakeSpan, OnRequest, OnResponse, TraceLayer,
};
use tracing::Span;
use tracing::field::Empty;

use crate::{REQUEST_ID_METADATA_KEY, TENANT_METADATA_KEY, TenantInterceptor};

/// Message returned to callers when a handler panics. Details stay in the log.
pub const PANIC_MESSAGE: &str = "internal server error";

/// Opens the `grpc_request` span.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrpcMakeSpan;

impl<B> MakeSpan<B> for GrpcMakeSpan {
    fn make_span(&mut self, request: &http::Request<B>) -> Span {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("n/a")
                .to_owned()
        };
        tracing::info_span!(
            "grpc_request",
            method = %request.uri().path(),
            tenant_id = %header(TENANT_METADATA_KEY),
            request_id = %header(REQUEST_ID_METADATA_KEY),
            grpc_code = Empty,
            latency_ms = Empty,
        )
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct GrpcOnRequest;

impl<B> OnRequest<B> for GrpcOnRequest {
    fn on_request(&mut self, _request: &http::Request<B>, _span: &Span) {
        tracing::info!(kind = "unary", "gRPC request started");
    }
}

/// Logs completion, reading the status tonic puts in the headers of
/// trailers-only (error) responses.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrpcOnResponse;

impl<B> OnResponse<B> for GrpcOnResponse {
    fn on_response(self, response: &http::Response<B>, latency: Duration, span: &Span) {
        let code = grpc_code(response.headers());
        let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        span.record("grpc_code", tracing::field::display(code));
        span.record("latency_ms", latency_ms);

        if code == tonic::Code::Ok {
            tracing::info!(latency_ms, "gRPC request completed");
        } else {
            let message = response
                .headers()
                .get("grpc-message")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::warn!(latency_ms, code = %code, grpc_message = message, "gRPC request failed");
        }
    }
}

fn grpc_code(headers: &http::HeaderMap) -> tonic::Code {
    headers
        .get("grpc-status")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i32>().ok())
        .map_or(tonic::Code::Ok, tonic::Code::from_i32)
}

/// Request logging layer.
pub type GrpcTraceLayer = TraceLayer<
    SharedClassifier<GrpcErrorsAsFailures>,
    GrpcMakeSpan,
    GrpcOnRequest,
    GrpcOnResponse,
    DefaultOnBodyChunk,
    DefaultOnEos,
    (),
>;

#[must_use]
pub fn trace_layer() -> GrpcTraceLayer {
    TraceLayer::new_for_grpc()
        .make_span_with(GrpcMakeSpan)
        .on_request(GrpcOnRequest)
        .on_response(GrpcOnResponse)
        .on_failure(())
}

/// Turns a handler panic into `INTERNAL` for this call only.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrpcPanicResponder;

impl ResponseForPanic for GrpcPanicResponder {
    type ResponseBody = tonic::body::Body;

    fn response_for_panic(
        &mut self,
        err: Box<dyn Any + Send + 'static>,
    ) -> http::Response<Self::ResponseBody> {
        tracing::error!(panic = %panic_message(err.as_ref()), "panic recovered in gRPC handler");
        Status::internal(PANIC_MESSAGE).into_http()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[must_use]
pub fn panic_layer() -> CatchPanicLayer<GrpcPanicResponder> {
    CatchPanicLayer::custom(GrpcPanicResponder)
}

/// Full server-side chain.
pub type ServerStack = Stack<
    CatchPanicLayer<GrpcPanicResponder>,
    Stack<GrpcTraceLayer, Stack<InterceptorLayer<TenantInterceptor>, Identity>>,
>;

/// Tenant extraction, then logging, then panic containment, then the handler.
///
/// Tenant rejections never reach the trace layer; [`TenantInterceptor`] logs
/// them at `warn` itself.
#[must_use]
pub fn server_stack() -> ServiceBuilder<ServerStack> {
    ServiceBuilder::new()
        .layer(InterceptorLayer::new(TenantInterceptor))
        .layer(trace_layer())
        .layer(panic_layer())
}
