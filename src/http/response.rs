//! Mapping pipeline results to HTTP responses.
//!
//! - `GreetingReply` → its status with the greeting as JSON
//! - `PipelineError` → plain `500 Internal Server Error`, the same answer
//!   any unhandled handler failure gets; never the sentinel greeting

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::pipeline::{GreetingReply, PipelineError};

impl IntoResponse for GreetingReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.greeting)).into_response()
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Unhandled pipeline error");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}
