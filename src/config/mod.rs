//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change, keeps only [demo.backend]
//!     → loader.rs loads and validates the new revision
//!     → front service swaps its BackendSettings atomically
//! ```
//!
//! # Design Decisions
//! - Only `[demo.backend]` is applied live; listeners need a restart
//! - All fields have defaults to allow minimal configs

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendSettings, ListenerConfig, ObservabilityConfig, ServiceConfig, SimulationConfig,
    TimeoutConfig,
};
