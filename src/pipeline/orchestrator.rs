//! Front-service request pipeline.
//!
//! # Responsibilities
//! - Assign request identity and count the request
//! - Run the three stages strictly in sequence under one root span
//! - Bound the remote call so a slow backend becomes a recognized
//!   resource fault instead of an unanswered request
//! - Recover the four recognized faults into the degraded response
//! - Let every other fault escape as a [`PipelineError`]
//! - Leave the correlation context empty on every exit path

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::StatusCode;
use thiserror::Error;
use tracing::Instrument;

use crate::config::BackendSettings;
use crate::context::{
    ContextScope, CorrelationContext, GREETINGS_ID, GREETINGS_LANGUAGE, GREETINGS_NAME,
    GREETING_STATUS,
};
use crate::log_with_context;
use crate::observability::metrics::{CounterKey, MetricsSink, GREETINGS_ERROR, GREETINGS_TOTAL};
use crate::observability::propagation::TraceContext;
use crate::observability::tracing::{LogExporter, Span, SpanExporter, SpanStatus};
use crate::pipeline::fault::{Dice, RandomDice};
use crate::pipeline::greeting::{Greeting, Language, RequestId, DEFAULT_NAME};
use crate::pipeline::latency::LatencyProfile;
use crate::pipeline::outcome::{Fault, Outcome};
use crate::pipeline::stage::{StageExecutor, StageSpec};
use crate::remote::client::BackendCall;
use crate::remote::endpoint::BODY_FAILED;

/// Stage 1 failure marker.
pub const OUT_OF_GREETINGS: &str = "OUT_OF_GREETINGS";
/// Stage 1 exit marker, recorded on every path.
pub const STATUS_SUCCESS: &str = "SUCCESS";

/// Probability threshold above which stage 1 fails.
const LOCAL_FAILURE_THRESHOLD: f64 = 0.94;
/// Among stage 1 failures, draws above this are access faults.
const ACCESS_FAULT_THRESHOLD: f64 = 0.30;
/// Remote-call bound when `timeout_ms` is not configured.
pub const DEFAULT_BACKEND_DEADLINE: Duration = Duration::from_secs(30);

/// Response of the pipeline: a greeting and the status to send it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingReply {
    pub greeting: Greeting,
    pub status: StatusCode,
}

impl GreetingReply {
    fn degraded() -> Self {
        Self {
            greeting: Greeting::sentinel(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A fault the pipeline does not recover.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unrecovered fault: {0}")]
    Unrecovered(Fault),
}

impl PipelineError {
    pub fn fault(&self) -> &Fault {
        match self {
            PipelineError::Unrecovered(fault) => fault,
        }
    }
}

pub struct Pipeline {
    next_id: AtomicU64,
    settings: ArcSwap<BackendSettings>,
    backend: Arc<dyn BackendCall>,
    metrics: Arc<MetricsSink>,
    exporter: Arc<dyn SpanExporter>,
    dice: Arc<dyn Dice>,
    latency: LatencyProfile,
    backend_deadline: Duration,
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    settings: BackendSettings,
    backend: Arc<dyn BackendCall>,
    metrics: Option<Arc<MetricsSink>>,
    exporter: Option<Arc<dyn SpanExporter>>,
    dice: Option<Arc<dyn Dice>>,
    latency: LatencyProfile,
    backend_deadline: Duration,
}

impl PipelineBuilder {
    pub fn metrics(mut self, metrics: Arc<MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn exporter(mut self, exporter: Arc<dyn SpanExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn dice(mut self, dice: Arc<dyn Dice>) -> Self {
        self.dice = Some(dice);
        self
    }

    pub fn latency(mut self, latency: LatencyProfile) -> Self {
        self.latency = latency;
        self
    }

    /// Upper bound of the remote call when the settings carry no
    /// `timeout_ms`.
    pub fn backend_deadline(mut self, deadline: Duration) -> Self {
        self.backend_deadline = deadline;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            next_id: AtomicU64::new(0),
            settings: ArcSwap::from_pointee(self.settings),
            backend: self.backend,
            metrics: self.metrics.unwrap_or_default(),
            exporter: self.exporter.unwrap_or_else(|| Arc::new(LogExporter)),
            dice: self.dice.unwrap_or_else(|| Arc::new(RandomDice)),
            latency: self.latency,
            backend_deadline: self.backend_deadline,
        }
    }
}

impl Pipeline {
    pub fn builder(settings: BackendSettings, backend: Arc<dyn BackendCall>) -> PipelineBuilder {
        PipelineBuilder {
            settings,
            backend,
            metrics: None,
            exporter: None,
            dice: None,
            latency: LatencyProfile::standard(),
            backend_deadline: DEFAULT_BACKEND_DEADLINE,
        }
    }

    pub fn metrics(&self) -> &MetricsSink {
        &self.metrics
    }

    /// Number of request identities handed out so far.
    pub fn requests_started(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn backend_settings(&self) -> Arc<BackendSettings> {
        self.settings.load_full()
    }

    /// Replace the remote-call settings; later requests see the new values.
    pub fn apply_backend_settings(&self, settings: BackendSettings) {
        tracing::info!(
            enable = settings.enable,
            endpoint = %settings.endpoint,
            timeout_ms = ?settings.timeout_ms,
            "Backend settings applied"
        );
        self.settings.store(Arc::new(settings));
    }

    /// Serve one greeting request with a fresh correlation context.
    pub async fn greet(&self, name: Option<&str>) -> Result<GreetingReply, PipelineError> {
        let mut ctx = CorrelationContext::new();
        self.greet_in(name, &mut ctx).await
    }

    /// Serve one greeting request tagged with the inbound request id, which
    /// is forwarded on the remote call.
    pub async fn greet_for(
        &self,
        name: Option<&str>,
        request_id: &str,
    ) -> Result<GreetingReply, PipelineError> {
        let mut ctx = CorrelationContext::new();
        self.run(name, Some(request_id), &mut ctx).await
    }

    /// Serve one greeting request. `ctx` is empty again when this returns.
    pub async fn greet_in(
        &self,
        name: Option<&str>,
        ctx: &mut CorrelationContext,
    ) -> Result<GreetingReply, PipelineError> {
        self.run(name, None, ctx).await
    }

    async fn run(
        &self,
        name: Option<&str>,
        request_id: Option<&str>,
        ctx: &mut CorrelationContext,
    ) -> Result<GreetingReply, PipelineError> {
        let name = name.filter(|n| !n.is_empty()).unwrap_or(DEFAULT_NAME);
        let mut ctx = ContextScope::new(ctx);
        tracing::trace!(name, "Greeting requested");

        self.metrics
            .counter(GREETINGS_TOTAL, &[("name", name)])
            .increment();
        let id = RequestId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        ctx.set(GREETINGS_ID, id.to_string());
        ctx.set(GREETINGS_NAME, name);

        let mut root = Span::root("greeting", self.exporter.clone());
        root.set_attribute("greetingId", id.to_string());
        if let Some(request_id) = request_id {
            root.set_attribute("requestId", request_id);
        }

        let result = self.run_stages(id, name, request_id, &root, &mut ctx).await;

        let reply = match result {
            Ok(greeting) => {
                log_with_context!(tracing::Level::INFO, ctx, "Greetings success");
                let _ = root.set_status(SpanStatus::Ok);
                Ok(GreetingReply {
                    greeting,
                    status: StatusCode::OK,
                })
            }
            Err(fault) if fault.is_recognized() => {
                log_with_context!(
                    tracing::Level::ERROR,
                    ctx,
                    error = %fault,
                    fault = ?fault.kind(),
                    "Greetings failed"
                );
                let _ = root.set_status(SpanStatus::Error(fault.to_string()));
                Ok(GreetingReply::degraded())
            }
            Err(fault) => {
                log_with_context!(
                    tracing::Level::ERROR,
                    ctx,
                    error = %fault,
                    fault = ?fault.kind(),
                    "Greetings aborted"
                );
                let _ = root.set_status(SpanStatus::Error(fault.to_string()));
                Err(PipelineError::Unrecovered(fault))
            }
        };

        if let Err(e) = root.end() {
            tracing::warn!(error = %e, "Root span ended out of order");
        }
        reply
    }

    async fn run_stages(
        &self,
        id: RequestId,
        name: &str,
        request_id: Option<&str>,
        root: &Span,
        ctx: &mut CorrelationContext,
    ) -> Result<Greeting, Fault> {
        if let Outcome::Fault(fault) = self.do_greetings(name, root, ctx).await {
            return Err(fault);
        }

        match self.call_backend(id, request_id, root, ctx).await {
            Outcome::Success(()) => {}
            Outcome::Rejected(_) => {
                return Err(Fault::AccessDenied("Backend request failed".to_string()))
            }
            Outcome::Fault(fault) => return Err(fault),
        }

        match self.hello_greetings(id, name, root, ctx).await {
            Outcome::Success(greeting) => Ok(greeting),
            Outcome::Rejected(reason) => Err(Fault::Internal(reason)),
            Outcome::Fault(fault) => Err(fault),
        }
    }

    /// Stage 1: local work that occasionally runs out of greetings.
    async fn do_greetings(
        &self,
        name: &str,
        root: &Span,
        ctx: &mut CorrelationContext,
    ) -> Outcome<()> {
        let spec = StageSpec::new("do-greetings")
            .count_errors(CounterKey::new(GREETINGS_ERROR, &[("name", name)]))
            .on_failure(GREETING_STATUS, OUT_OF_GREETINGS)
            .on_exit(GREETING_STATUS, STATUS_SUCCESS);
        let mut stage = StageExecutor::new(spec, &self.metrics);
        let mirror = mirror_of(stage.begin(root, ctx, &[(GREETINGS_NAME, name)]));

        self.latency.local_work.wait().instrument(mirror).await;

        let outcome = if self.dice.draw() > LOCAL_FAILURE_THRESHOLD {
            if self.dice.draw() > ACCESS_FAULT_THRESHOLD {
                Outcome::Fault(Fault::AccessDenied("No greetings available".to_string()))
            } else {
                Outcome::Fault(Fault::Arithmetic("No greetings calculated".to_string()))
            }
        } else {
            Outcome::Success(())
        };
        stage.finish(ctx, outcome)
    }

    /// Stage 2: ask the backend, when enabled.
    async fn call_backend(
        &self,
        id: RequestId,
        request_id: Option<&str>,
        root: &Span,
        ctx: &mut CorrelationContext,
    ) -> Outcome<()> {
        let settings = self.settings.load_full();
        if !settings.enable {
            return Outcome::Success(());
        }

        let mut stage = StageExecutor::new(StageSpec::new("get-backend"), &self.metrics);
        let mut mirror = tracing::Span::none();
        let mut trace = TraceContext::default();
        if let Some(span) = stage.begin(root, ctx, &[]) {
            span.set_attribute("backend.endpoint", settings.endpoint.as_str());
            mirror = span.mirror().clone();
            trace = TraceContext::new(span.id()).with_request_id(request_id);
        }

        let deadline = settings
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.backend_deadline);
        let call = self.backend.call(&settings, id, &trace);
        let outcome = match tokio::time::timeout(deadline, call).instrument(mirror).await {
            Ok(Ok(body)) if body == BODY_FAILED => Outcome::Rejected(body),
            Ok(Ok(_)) => Outcome::Success(()),
            Ok(Err(fault)) => Outcome::Fault(fault),
            Err(_) => Outcome::Fault(Fault::ResourceAccess(format!(
                "backend call exceeded {}ms",
                deadline.as_millis()
            ))),
        };
        stage.finish(ctx, outcome)
    }

    /// Stage 3: pick a language and build the greeting.
    async fn hello_greetings(
        &self,
        id: RequestId,
        name: &str,
        root: &Span,
        ctx: &mut CorrelationContext,
    ) -> Outcome<Greeting> {
        let mut stage = StageExecutor::new(StageSpec::new("hello-greetings"), &self.metrics);
        let mirror = mirror_of(stage.begin(root, ctx, &[]));

        self.latency.localization.wait().instrument(mirror).await;

        let language = Language::resolve(self.dice.draw());
        ctx.set(GREETINGS_LANGUAGE, language.as_str());
        if let Some(span) = stage.span_mut() {
            span.set_attribute(GREETINGS_LANGUAGE, language.as_str());
        }

        let outcome = match language.greet(name) {
            Some(message) => Outcome::Success(Greeting::new(id, message)),
            None => Outcome::Fault(Fault::UnsupportedLanguage(
                "Language not supported".to_string(),
            )),
        };
        stage.finish(ctx, outcome)
    }
}

fn mirror_of(span: Option<&mut Span>) -> tracing::Span {
    span.map(|s| s.mirror().clone())
        .unwrap_or_else(tracing::Span::none)
}
