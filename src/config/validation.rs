//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, the backend endpoint URL and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;
use crate::observability::logging::LogFormat;

/// A single semantic problem in a config.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("demo.backend.endpoint: '{0}' is not an absolute http(s) URL")]
    InvalidEndpoint(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("observability.log_format: unknown format '{0}'")]
    UnknownLogFormat(String),
}

/// Check a parsed config, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "frontend.bind_address", &config.frontend.bind_address);
    check_address(
        &mut errors,
        "backend_service.bind_address",
        &config.backend_service.bind_address,
    );
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let endpoint = &config.demo.backend.endpoint;
    match Url::parse(endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.push(ValidationError::InvalidEndpoint(endpoint.clone())),
    }

    if config.demo.backend.timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroDuration("demo.backend.timeout_ms"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.request_secs"));
    }

    if LogFormat::parse(&config.observability.log_format).is_none() {
        errors.push(ValidationError::UnknownLogFormat(
            config.observability.log_format.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
