//! API middleware
//!
//! Request tracing and request ID layers applied around the router.

use axum::http::{HeaderValue, Request};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    request_id::{MakeRequestId, RequestId},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::Level;
use uuid::Uuid;

/// Name of the request ID header
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID generator using UUIDs
#[derive(Clone, Default)]
pub struct UuidRequestIdGenerator;

impl MakeRequestId for UuidRequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Build trace layer
///
/// Headers are left out of the spans: the webhook signature and
/// downstream credentials must not reach the log.
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(
            DefaultMakeSpan::new()
                .include_headers(false)
                .level(Level::INFO),
        )
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .latency_unit(LatencyUnit::Millis)
                .level(Level::INFO),
        )
}
