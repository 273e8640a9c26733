//! Route handlers for both services.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use tracing::Instrument;

use crate::http::request::request_id_of;
use crate::observability::propagation::TraceContext;
use crate::pipeline::{GreetingReply, Pipeline, PipelineError};
use crate::remote::RemoteEndpoint;

#[derive(Debug, Deserialize)]
pub struct GreetingParams {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BackendParams {
    pub id: i64,
}

/// `GET /greeting?name=<string>`
pub async fn greeting(
    State(pipeline): State<Arc<Pipeline>>,
    headers: HeaderMap,
    Query(params): Query<GreetingParams>,
) -> Result<GreetingReply, PipelineError> {
    let request_id = request_id_of(&headers);
    pipeline
        .greet_for(params.name.as_deref(), &request_id)
        .instrument(tracing::info_span!("greeting_request", request_id = %request_id))
        .await
}

/// `GET /backend?id=<integer>`; continues the caller's trace when the
/// request carries `x-parent-span-id`.
pub async fn backend(
    State(endpoint): State<Arc<RemoteEndpoint>>,
    headers: HeaderMap,
    Query(params): Query<BackendParams>,
) -> (StatusCode, &'static str) {
    let request_id = request_id_of(&headers);
    let trace = TraceContext::extract(&headers);
    let body = endpoint
        .handle_traced(params.id, &trace)
        .instrument(tracing::info_span!("backend_request", request_id = %request_id))
        .await;
    (StatusCode::OK, body)
}

/// `GET /health`
pub async fn health() -> &'static str {
    "OK"
}
