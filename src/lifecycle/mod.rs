//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal returns
//!
//! Shutdown (shutdown.rs):
//!     trigger() latches → every server stops accepting → in-flight requests drain → exit
//! ```
//!
//! # Design Decisions
//! - One latched watch channel; each server holds its own `ShutdownSignal`
//! - Config reload is file-driven (config::watcher), not signal-driven

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::wait_for_signal;
