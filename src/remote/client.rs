//! Calling the backend service.
//!
//! # Error Classification
//! - connect, I/O and timeout failures → `Fault::ResourceAccess`
//! - non-2xx status → `Fault::UpstreamStatus`
//! - malformed request (bad endpoint URL) or undecodable body → `Fault::Internal`
//!
//! The body is returned as-is; interpreting `Failed` is the caller's job.
//! The caller's trace context travels as request headers.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::header::HeaderMap;

use crate::config::BackendSettings;
use crate::observability::propagation::TraceContext;
use crate::pipeline::greeting::RequestId;
use crate::pipeline::outcome::Fault;
use crate::remote::endpoint::RemoteEndpoint;

/// One remote call per request, returning the response body.
pub trait BackendCall: Send + Sync {
    fn call<'a>(
        &'a self,
        settings: &'a BackendSettings,
        id: RequestId,
        trace: &'a TraceContext,
    ) -> BoxFuture<'a, Result<String, Fault>>;
}

/// Calls `<endpoint>/backend?id=<id>` over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpBackendClient {
    client: reqwest::Client,
}

impl HttpBackendClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend_url(endpoint: &str, id: RequestId) -> String {
        format!("{}/backend?id={}", endpoint.trim_end_matches('/'), id)
    }
}

impl BackendCall for HttpBackendClient {
    fn call<'a>(
        &'a self,
        settings: &'a BackendSettings,
        id: RequestId,
        trace: &'a TraceContext,
    ) -> BoxFuture<'a, Result<String, Fault>> {
        Box::pin(async move {
            let url = Self::backend_url(&settings.endpoint, id);
            let mut headers = HeaderMap::new();
            trace.inject(&mut headers);
            let mut request = self.client.get(&url).headers(headers);
            if let Some(ms) = settings.timeout_ms {
                request = request.timeout(Duration::from_millis(ms));
            }

            tracing::debug!(url = %url, "Calling backend");
            let response = request.send().await.map_err(classify)?;

            let status = response.status();
            if !status.is_success() {
                return Err(Fault::UpstreamStatus(status.as_u16()));
            }
            response.text().await.map_err(classify)
        })
    }
}

fn classify(e: reqwest::Error) -> Fault {
    if e.is_builder() || e.is_decode() {
        Fault::Internal(e.to_string())
    } else {
        Fault::ResourceAccess(e.to_string())
    }
}

/// Calls a [`RemoteEndpoint`] in-process, skipping the network.
pub struct LocalBackend {
    endpoint: Arc<RemoteEndpoint>,
}

impl LocalBackend {
    pub fn new(endpoint: Arc<RemoteEndpoint>) -> Self {
        Self { endpoint }
    }
}

impl BackendCall for LocalBackend {
    fn call<'a>(
        &'a self,
        _settings: &'a BackendSettings,
        id: RequestId,
        trace: &'a TraceContext,
    ) -> BoxFuture<'a, Result<String, Fault>> {
        Box::pin(async move {
            let id = i64::try_from(id.0)
                .map_err(|_| Fault::Internal(format!("request id {} out of range", id)))?;
            Ok(self.endpoint.handle_traced(id, trace).await.to_string())
        })
    }
}
