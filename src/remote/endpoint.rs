//! Backend greeting handler.
//!
//! # Responsibilities
//! - Count every request and every rejection
//! - Trace each request, continuing the caller's span tree when the
//!   request carries a parent span id
//! - Reject ids ending in 1 (`id % 10 == 1`) with the body `Failed`
//!
//! The rejection travels in the body; the transport status is always 200.

use std::sync::Arc;

use tracing::Instrument;

use crate::context::{ContextScope, CorrelationContext, GREETINGS_ID};
use crate::log_with_context;
use crate::observability::metrics::{MetricsSink, BACKEND_ERROR, BACKEND_TOTAL};
use crate::observability::propagation::TraceContext;
use crate::observability::tracing::{Span, SpanExporter, SpanStatus};
use crate::pipeline::latency::Latency;

pub const BODY_SUCCESS: &str = "Success";
pub const BODY_FAILED: &str = "Failed";

/// Whether the backend refuses `id`.
pub fn is_rejected(id: i64) -> bool {
    id % 10 == 1
}

pub struct RemoteEndpoint {
    metrics: Arc<MetricsSink>,
    exporter: Arc<dyn SpanExporter>,
    latency: Latency,
}

impl RemoteEndpoint {
    pub fn new(metrics: Arc<MetricsSink>, exporter: Arc<dyn SpanExporter>, latency: Latency) -> Self {
        Self {
            metrics,
            exporter,
            latency,
        }
    }

    pub fn metrics(&self) -> &MetricsSink {
        &self.metrics
    }

    /// Handle one untraced request; returns the response body.
    pub async fn handle(&self, id: i64) -> &'static str {
        self.handle_traced(id, &TraceContext::default()).await
    }

    /// Handle one request as part of the caller's trace.
    pub async fn handle_traced(&self, id: i64, trace: &TraceContext) -> &'static str {
        let mut ctx = CorrelationContext::new();
        self.handle_in(id, trace, &mut ctx).await
    }

    /// Handle one request using a caller-provided context, which is empty
    /// again when this returns.
    pub async fn handle_in(
        &self,
        id: i64,
        trace: &TraceContext,
        ctx: &mut CorrelationContext,
    ) -> &'static str {
        self.metrics.counter(BACKEND_TOTAL, &[]).increment();

        let mut ctx = ContextScope::new(ctx);
        ctx.set(GREETINGS_ID, id.to_string());

        let mut span = match trace.parent {
            Some(parent) => Span::remote_child("backend", parent, self.exporter.clone()),
            None => Span::root("backend", self.exporter.clone()),
        };
        span.set_attribute("greetingId", id.to_string());
        if let Some(request_id) = &trace.request_id {
            span.set_attribute("requestId", request_id.as_str());
        }
        tracing::debug!(id, parent = ?span.parent(), "Backend request");

        self.latency.wait().instrument(span.mirror().clone()).await;

        let body = if is_rejected(id) {
            log_with_context!(tracing::Level::WARN, ctx, "Bad request");
            self.metrics.counter(BACKEND_ERROR, &[]).increment();
            let _ = span.set_status(SpanStatus::error("Failed to process"));
            BODY_FAILED
        } else {
            log_with_context!(tracing::Level::INFO, ctx, "Backend success");
            let _ = span.set_status(SpanStatus::Ok);
            BODY_SUCCESS
        };

        if let Err(e) = span.end() {
            tracing::warn!(error = %e, "Backend span ended out of order");
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{GREETINGS_LANGUAGE, GREETINGS_NAME, GREETING_STATUS};
    use crate::observability::capture::capture;
    use crate::observability::tracing::{InMemoryExporter, SpanId};

    fn endpoint() -> (RemoteEndpoint, Arc<MetricsSink>, Arc<InMemoryExporter>) {
        let metrics = Arc::new(MetricsSink::new());
        let exporter = Arc::new(InMemoryExporter::new());
        (
            RemoteEndpoint::new(metrics.clone(), exporter.clone(), Latency::none()),
            metrics,
            exporter,
        )
    }

    #[tokio::test]
    async fn test_rejection_rule() {
        let (endpoint, metrics, _) = endpoint();
        for id in [1, 11, 21, 101] {
            assert_eq!(endpoint.handle(id).await, BODY_FAILED, "id {}", id);
        }
        for id in [0, 2, 10, 12, 20, 99] {
            assert_eq!(endpoint.handle(id).await, BODY_SUCCESS, "id {}", id);
        }
        assert_eq!(metrics.value(BACKEND_TOTAL, &[]), 10);
        assert_eq!(metrics.value(BACKEND_ERROR, &[]), 4);
    }

    #[tokio::test]
    async fn test_same_id_same_body() {
        let (endpoint, _, _) = endpoint();
        for id in [1, 7, 31, 42] {
            assert_eq!(endpoint.handle(id).await, endpoint.handle(id).await);
        }
    }

    #[tokio::test]
    async fn test_negative_ids_are_not_rejected() {
        // -9 % 10 == -9
        let (endpoint, _, _) = endpoint();
        assert_eq!(endpoint.handle(-9).await, BODY_SUCCESS);
    }

    #[tokio::test]
    async fn test_span_and_context() {
        let (endpoint, _, exporter) = endpoint();
        let mut ctx = CorrelationContext::new();

        let untraced = TraceContext::default();
        endpoint.handle_in(21, &untraced, &mut ctx).await;
        assert!(ctx.is_empty());
        endpoint.handle_in(22, &untraced, &mut ctx).await;
        assert!(ctx.is_empty());

        let spans = exporter.named("backend");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].attribute("greetingId"), Some("21"));
        assert_eq!(spans[0].status, Some(SpanStatus::error("Failed to process")));
        assert_eq!(spans[1].status, Some(SpanStatus::Ok));
    }

    #[tokio::test]
    async fn test_span_continues_caller_trace() {
        let (endpoint, _, exporter) = endpoint();
        let trace = TraceContext::new(SpanId(4242)).with_request_id(Some("req-7"));
        endpoint.handle_traced(22, &trace).await;

        let span = &exporter.named("backend")[0];
        assert_eq!(span.parent, Some(SpanId(4242)));
        assert_eq!(span.attribute("requestId"), Some("req-7"));
        assert!(exporter.roots().is_empty());
    }

    #[tokio::test]
    async fn test_log_lines_carry_correlation_fields() {
        let (_guard, logs) = capture();
        let (endpoint, _, _) = endpoint();
        endpoint.handle(21).await;
        endpoint.handle(22).await;

        let rejected = logs.with_message("Bad request");
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].level, tracing::Level::WARN);
        assert_eq!(rejected[0].field(GREETINGS_ID), Some("21"));

        let ok = logs.with_message("Backend success");
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].level, tracing::Level::INFO);
        assert_eq!(ok[0].field(GREETINGS_ID), Some("22"));
        // the backend only knows the id; the other fields are present but empty
        for field in [GREETINGS_NAME, GREETING_STATUS, GREETINGS_LANGUAGE] {
            assert_eq!(ok[0].field(field), Some(""));
        }
    }
}
