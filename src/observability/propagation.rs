//! Trace context carried on the remote call.
//!
//! # Data Flow
//! ```text
//! get-backend span (front) ──inject──▶ x-parent-span-id, x-request-id
//!                                            │
//!                                   /backend handler ──extract──▶ backend span
//!                                                                 (remote child)
//! ```
//!
//! Missing or malformed headers yield an empty context; the backend then
//! starts a root span of its own.

use axum::http::{HeaderMap, HeaderValue};

use crate::http::request::X_REQUEST_ID;
use crate::observability::tracing::SpanId;

pub const X_PARENT_SPAN_ID: &str = "x-parent-span-id";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    pub parent: Option<SpanId>,
    pub request_id: Option<String>,
}

impl TraceContext {
    pub fn new(parent: SpanId) -> Self {
        Self {
            parent: Some(parent),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<&str>) -> Self {
        self.request_id = request_id.map(str::to_string);
        self
    }

    /// Write the context as request headers.
    pub fn inject(&self, headers: &mut HeaderMap) {
        if let Some(parent) = self.parent {
            if let Ok(value) = HeaderValue::from_str(&parent.to_string()) {
                headers.insert(X_PARENT_SPAN_ID, value);
            }
        }
        if let Some(id) = &self.request_id {
            if let Ok(value) = HeaderValue::from_str(id) {
                headers.insert(X_REQUEST_ID, value);
            }
        }
    }

    /// Read the context from request headers.
    pub fn extract(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            parent: text(X_PARENT_SPAN_ID).and_then(|v| v.parse().ok()),
            request_id: text(X_REQUEST_ID).map(str::to_string),
        }
    }
}
