//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline and backend produce:
//!     → logging.rs (structured log events with correlation fields)
//!     → metrics.rs (counters keyed by name + labels)
//!     → tracing.rs (span tree per request)
//!     → propagation.rs (span tree continued across the remote call)
//!
//! Consumers:
//!     → Log output (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Span exporter (log events, or in-memory for inspection)
//! ```

#[cfg(test)]
pub(crate) mod capture;
pub mod logging;
pub mod metrics;
pub mod propagation;
pub mod tracing;

pub use self::metrics::MetricsSink;
pub use self::propagation::TraceContext;
pub use self::tracing::{InMemoryExporter, LogExporter, Span, SpanExporter, SpanStatus};
