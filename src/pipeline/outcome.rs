//! Stage outcomes and the fault taxonomy.

use thiserror::Error;

/// Classified failure cause.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Fault {
    /// Local exhaustion, or business rejection reported by the backend.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Local computation fault.
    #[error("arithmetic fault: {0}")]
    Arithmetic(String),

    /// Localization fault.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Remote transport fault (connect, I/O, timeout).
    #[error("resource access failed: {0}")]
    ResourceAccess(String),

    /// The backend answered with a non-success HTTP status.
    #[error("backend responded with status {0}")]
    UpstreamStatus(u16),

    /// Anything else: unusable request, unreadable response, broken invariant.
    #[error("internal fault: {0}")]
    Internal(String),
}

/// Tag of a [`Fault`], without its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    AccessDenied,
    Arithmetic,
    UnsupportedLanguage,
    ResourceAccess,
    UpstreamStatus,
    Internal,
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::AccessDenied(_) => FaultKind::AccessDenied,
            Fault::Arithmetic(_) => FaultKind::Arithmetic,
            Fault::UnsupportedLanguage(_) => FaultKind::UnsupportedLanguage,
            Fault::ResourceAccess(_) => FaultKind::ResourceAccess,
            Fault::UpstreamStatus(_) => FaultKind::UpstreamStatus,
            Fault::Internal(_) => FaultKind::Internal,
        }
    }

    /// Whether the pipeline recovers this fault into the degraded response.
    pub fn is_recognized(&self) -> bool {
        self.kind().is_recognized()
    }
}

impl FaultKind {
    pub fn is_recognized(self) -> bool {
        matches!(
            self,
            FaultKind::AccessDenied
                | FaultKind::Arithmetic
                | FaultKind::UnsupportedLanguage
                | FaultKind::ResourceAccess
        )
    }
}

/// Result of running one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Success(T),
    /// The unit of work completed but its answer was a refusal.
    Rejected(String),
    Fault(Fault),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Message describing a non-success outcome.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Rejected(reason) => Some(format!("rejected: {}", reason)),
            Outcome::Fault(fault) => Some(fault.to_string()),
        }
    }
}

impl<T> From<Result<T, Fault>> for Outcome<T> {
    fn from(result: Result<T, Fault>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(fault) => Outcome::Fault(fault),
        }
    }
}
