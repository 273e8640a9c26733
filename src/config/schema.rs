//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! every section has defaults, so an empty file is a complete config.

use serde::{Deserialize, Serialize};

/// Root configuration for both services.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Front (greeting) service listener.
    pub frontend: ListenerConfig,

    /// Backend service listener.
    pub backend_service: ListenerConfig,

    /// Settings consumed by the front service's pipeline.
    pub demo: DemoConfig,

    /// Simulated processing cost.
    pub simulation: SimulationConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            frontend: ListenerConfig::default(),
            backend_service: ListenerConfig::backend_default(),
            demo: DemoConfig::default(),
            simulation: SimulationConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ListenerConfig {
    pub fn backend_default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DemoConfig {
    pub backend: BackendSettings,
}

/// Remote call settings (`[demo.backend]`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendSettings {
    /// Whether stage 2 calls the backend at all.
    pub enable: bool,

    /// Base URL of the backend service.
    pub endpoint: String,

    /// Optional deadline for the remote call in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            enable: false,
            endpoint: "http://localhost:8081".to_string(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Sleep for a random, bounded time in each stage.
    pub latency_enabled: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latency_enabled: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline in seconds: bounds `/backend` and `/health` at the HTTP
    /// layer, and the front service's remote call when `timeout_ms` is unset.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
