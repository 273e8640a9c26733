//! Greeting request pipeline.
//!
//! # Data Flow
//! ```text
//! GET /greeting?name=
//!     → orchestrator.rs (request id, counters, root span, context scope)
//!     → stage 1 "do-greetings"    (latency, fault draw)
//!     → stage 2 "get-backend"     (remote call, when enabled)
//!     → stage 3 "hello-greetings" (language draw, message)
//!     → GreetingReply (200 greeting | 500 sentinel) or PipelineError
//! ```
//!
//! # Design Decisions
//! - Each stage returns an `Outcome`; the orchestrator matches on it
//!   instead of unwinding
//! - Stage bookkeeping (span, counter, correlation fields) lives in
//!   stage.rs so every stage gets the same guarantees
//! - Randomness is injected (`Dice`) so fault paths can be forced in tests

pub mod fault;
pub mod greeting;
pub mod latency;
pub mod orchestrator;
pub mod outcome;
pub mod stage;

pub use greeting::{Greeting, RequestId};
pub use orchestrator::{GreetingReply, Pipeline, PipelineBuilder, PipelineError};
pub use outcome::{Fault, FaultKind, Outcome};
