//! Stage execution.
//!
//! # State Transitions
//! ```text
//! PENDING → RUNNING      begin(): child span opened, stage fields recorded
//! RUNNING → SUCCEEDED    finish(Success): span OK
//! RUNNING → FAILED       finish(Rejected | Fault): error counter, failure
//!                        field, span ERROR with the fault's message
//! ```
//!
//! Whatever the outcome, `finish` runs the stage's exit step, offers the
//! span an OK status (kept only if no status was set before) and ends the
//! span. A stage dropped while RUNNING is marked FAILED and its span ends
//! with an error status.

use crate::context::CorrelationContext;
use crate::observability::metrics::{CounterKey, MetricsSink};
use crate::observability::tracing::{Span, SpanStatus};
use crate::pipeline::outcome::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Static description of a stage's bookkeeping.
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub name: &'static str,
    /// Counter incremented once when the stage fails.
    pub error_counter: Option<CounterKey>,
    /// Correlation field recorded when the stage fails.
    pub failure_field: Option<(&'static str, &'static str)>,
    /// Correlation field recorded on every exit path.
    pub exit_field: Option<(&'static str, &'static str)>,
}

impl StageSpec {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            error_counter: None,
            failure_field: None,
            exit_field: None,
        }
    }

    pub fn count_errors(mut self, key: CounterKey) -> Self {
        self.error_counter = Some(key);
        self
    }

    pub fn on_failure(mut self, field: &'static str, value: &'static str) -> Self {
        self.failure_field = Some((field, value));
        self
    }

    pub fn on_exit(mut self, field: &'static str, value: &'static str) -> Self {
        self.exit_field = Some((field, value));
        self
    }
}

/// Runs the bookkeeping around one named unit of work.
pub struct StageExecutor<'m> {
    spec: StageSpec,
    state: StageState,
    span: Option<Span>,
    metrics: &'m MetricsSink,
}

impl<'m> StageExecutor<'m> {
    pub fn new(spec: StageSpec, metrics: &'m MetricsSink) -> Self {
        Self {
            spec,
            state: StageState::Pending,
            span: None,
            metrics,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    /// The stage's span while it is running.
    pub fn span_mut(&mut self) -> Option<&mut Span> {
        self.span.as_mut()
    }

    /// Open the stage span under `parent` and record `fields` on both the
    /// context and the span. Only valid from PENDING.
    pub fn begin(
        &mut self,
        parent: &Span,
        ctx: &mut CorrelationContext,
        fields: &[(&str, &str)],
    ) -> Option<&mut Span> {
        if self.state != StageState::Pending {
            tracing::warn!(stage = self.spec.name, state = ?self.state, "Stage already started");
            return None;
        }
        let mut span = parent.start_child(self.spec.name);
        for (field, value) in fields {
            ctx.set(field, *value);
            span.set_attribute(*field, *value);
        }
        self.state = StageState::Running;
        tracing::debug!(stage = self.spec.name, span_id = %span.id(), "Stage started");
        self.span = Some(span);
        self.span.as_mut()
    }

    /// Classify the outcome, run the exit step and end the span.
    pub fn finish<T>(mut self, ctx: &mut CorrelationContext, outcome: Outcome<T>) -> Outcome<T> {
        let Some(mut span) = self.span.take() else {
            tracing::warn!(stage = self.spec.name, "Stage finished without being started");
            return outcome;
        };

        match outcome.failure_message() {
            None => {
                self.state = StageState::Succeeded;
                let _ = span.set_status(SpanStatus::Ok);
            }
            Some(message) => {
                self.state = StageState::Failed;
                if let Some(key) = &self.spec.error_counter {
                    self.metrics.increment(key);
                }
                if let Some((field, value)) = self.spec.failure_field {
                    ctx.set(field, value);
                    span.set_attribute(field, value);
                }
                let _ = span.set_status(SpanStatus::Error(message));
            }
        }

        if let Some((field, value)) = self.spec.exit_field {
            ctx.set(field, value);
            span.set_attribute(field, value);
        }
        // First status wins; on the failure path this is rejected.
        let _ = span.set_status(SpanStatus::Ok);
        if let Err(e) = span.end() {
            tracing::warn!(stage = self.spec.name, error = %e, "Stage span ended out of order");
        }

        tracing::debug!(stage = self.spec.name, state = ?self.state, "Stage finished");
        outcome
    }
}

impl Drop for StageExecutor<'_> {
    fn drop(&mut self) {
        if let Some(mut span) = self.span.take() {
            self.state = StageState::Failed;
            let _ = span.set_status(SpanStatus::error("stage abandoned"));
            tracing::warn!(stage = self.spec.name, "Stage dropped while running");
        }
    }
}
