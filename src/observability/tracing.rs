//! Span tree for per-request tracing.
//!
//! # Responsibilities
//! - Create a root span per inbound request and child spans per stage
//! - Hold span attributes and the terminal status
//! - Enforce the span protocol: status set once, ending is final,
//!   children end before their parent
//! - Hand finished spans to an exporter
//!
//! # Design Decisions
//! - Parents are referenced by id only; a child never owns its parent
//! - Each span is mirrored into a `tracing` span so subscriber output
//!   shows the same tree
//! - A span that is dropped without an explicit `end()` is ended by `Drop`

use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

static NEXT_SPAN_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique span identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(pub u64);

impl SpanId {
    fn next() -> Self {
        Self(NEXT_SPAN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = ParseIntError;

    /// Parses the 16-digit hex form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s.trim(), 16).map(SpanId)
    }
}

/// Terminal status of a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStatus {
    Ok,
    Error(String),
}

impl SpanStatus {
    pub fn error(message: impl Into<String>) -> Self {
        SpanStatus::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error(_))
    }
}

/// Span protocol violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpanError {
    #[error("span status already set")]
    StatusAlreadySet,

    #[error("span already ended")]
    Ended,

    #[error("span still has {0} open child span(s)")]
    ChildrenOpen(usize),
}

/// Immutable snapshot of a finished span.
#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub id: SpanId,
    pub parent: Option<SpanId>,
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub status: Option<SpanStatus>,
    pub duration: Duration,
}

impl SpanRecord {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Destination for finished spans.
pub trait SpanExporter: Send + Sync {
    fn export(&self, record: SpanRecord);
}

/// Writes every finished span as a debug log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogExporter;

impl SpanExporter for LogExporter {
    fn export(&self, record: SpanRecord) {
        let status = match &record.status {
            Some(SpanStatus::Ok) => "OK",
            Some(SpanStatus::Error(_)) => "ERROR",
            None => "UNSET",
        };
        let message = match &record.status {
            Some(SpanStatus::Error(m)) => m.as_str(),
            _ => "",
        };
        tracing::debug!(
            span_id = %record.id,
            parent_id = ?record.parent.map(|p| p.to_string()),
            name = %record.name,
            status,
            status_message = message,
            attributes = ?record.attributes,
            duration_ms = record.duration.as_millis() as u64,
            "Span finished"
        );
    }
}

/// Keeps finished spans in memory.
#[derive(Debug, Default)]
pub struct InMemoryExporter {
    records: Mutex<Vec<SpanRecord>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All spans finished so far, in end order.
    pub fn records(&self) -> Vec<SpanRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Finished spans with the given name.
    pub fn named(&self, name: &str) -> Vec<SpanRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.name == name)
            .collect()
    }

    /// Spans without a parent.
    pub fn roots(&self) -> Vec<SpanRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.parent.is_none())
            .collect()
    }

}

impl SpanExporter for InMemoryExporter {
    fn export(&self, record: SpanRecord) {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }
}

/// A named, time-bounded unit of traced work.
pub struct Span {
    id: SpanId,
    parent: Option<SpanId>,
    name: String,
    attributes: BTreeMap<String, String>,
    status: Option<SpanStatus>,
    started: Instant,
    ended: bool,
    open_children: Arc<AtomicUsize>,
    parent_open_children: Option<Arc<AtomicUsize>>,
    exporter: Arc<dyn SpanExporter>,
    mirror: tracing::Span,
}

impl Span {
    /// Start a root span.
    pub fn root(name: impl Into<String>, exporter: Arc<dyn SpanExporter>) -> Self {
        let name = name.into();
        let mirror = tracing::info_span!(
            "span",
            name = %name,
            status = tracing::field::Empty,
        );
        Self::build(name, None, None, exporter, mirror)
    }

    /// Start a span whose parent lives in another process. The parent's
    /// open-children count is not tracked across the call.
    pub fn remote_child(
        name: impl Into<String>,
        parent: SpanId,
        exporter: Arc<dyn SpanExporter>,
    ) -> Self {
        let name = name.into();
        let mirror = tracing::info_span!(
            "span",
            name = %name,
            remote_parent = %parent,
            status = tracing::field::Empty,
        );
        Self::build(name, Some(parent), None, exporter, mirror)
    }

    /// Start a child of this span.
    pub fn start_child(&self, name: impl Into<String>) -> Span {
        let name = name.into();
        let mirror = tracing::info_span!(
            parent: &self.mirror,
            "span",
            name = %name,
            status = tracing::field::Empty,
        );
        self.open_children.fetch_add(1, Ordering::AcqRel);
        Self::build(
            name,
            Some(self.id),
            Some(self.open_children.clone()),
            self.exporter.clone(),
            mirror,
        )
    }

    fn build(
        name: String,
        parent: Option<SpanId>,
        parent_open_children: Option<Arc<AtomicUsize>>,
        exporter: Arc<dyn SpanExporter>,
        mirror: tracing::Span,
    ) -> Self {
        Self {
            id: SpanId::next(),
            parent,
            name,
            attributes: BTreeMap::new(),
            status: None,
            started: Instant::now(),
            ended: false,
            open_children: Arc::new(AtomicUsize::new(0)),
            parent_open_children,
            exporter,
            mirror,
        }
    }

    pub fn id(&self) -> SpanId {
        self.id
    }

    pub fn parent(&self) -> Option<SpanId> {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Option<&SpanStatus> {
        self.status.as_ref()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// The mirrored `tracing` span, for instrumenting futures.
    pub fn mirror(&self) -> &tracing::Span {
        &self.mirror
    }

    /// Set an attribute. Ignored once the span has ended.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if self.ended {
            return;
        }
        self.attributes.insert(key.into(), value.into());
    }

    /// Set the terminal status. The first status wins; later calls are rejected.
    pub fn set_status(&mut self, status: SpanStatus) -> Result<(), SpanError> {
        if self.ended {
            return Err(SpanError::Ended);
        }
        if self.status.is_some() {
            return Err(SpanError::StatusAlreadySet);
        }
        match &status {
            SpanStatus::Ok => self.mirror.record("status", "ok"),
            SpanStatus::Error(_) => self.mirror.record("status", "error"),
        };
        self.status = Some(status);
        Ok(())
    }

    /// End the span. Ending twice is a no-op.
    pub fn end(&mut self) -> Result<(), SpanError> {
        if self.ended {
            return Ok(());
        }
        let open = self.open_children.load(Ordering::Acquire);
        if open > 0 {
            return Err(SpanError::ChildrenOpen(open));
        }
        self.finish();
        Ok(())
    }

    fn finish(&mut self) {
        self.ended = true;
        if let Some(parent) = &self.parent_open_children {
            parent.fetch_sub(1, Ordering::AcqRel);
        }
        self.exporter.export(SpanRecord {
            id: self.id,
            parent: self.parent,
            name: self.name.clone(),
            attributes: std::mem::take(&mut self.attributes),
            status: self.status.clone(),
            duration: self.started.elapsed(),
        });
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("ended", &self.ended)
            .finish()
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if !self.ended {
            self.finish();
        }
    }
}
