//! Request identity.
//!
//! # Responsibilities
//! - Generate a UUID v4 `x-request-id` for requests that arrive without one
//! - Echo the id on the response
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A caller-supplied id is kept, not replaced

use axum::http::{HeaderMap, HeaderValue, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// `MakeRequestId` producing random UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// The request's `x-request-id` as a string, or `"unknown"`.
pub fn request_id_of(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_uuids() {
        let request = Request::builder().body(()).unwrap();
        let mut make = MakeRequestUuid;
        let first = make.make_request_id(&request).unwrap();
        let second = make.make_request_id(&request).unwrap();

        let text = first.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
        assert_ne!(first.header_value(), second.header_value());
    }

    #[test]
    fn test_request_id_of() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id_of(&headers), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        assert_eq!(request_id_of(&headers), "abc-123");
    }
}
