//! Greeting payload and language resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name used when the caller gives none.
pub const DEFAULT_NAME: &str = "World";
/// Message of the degraded response.
pub const SENTINEL_MESSAGE: &str = "No more greetings!";

/// Identity of one front-service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl RequestId {
    /// Identity carried by the degraded response.
    pub const SENTINEL: RequestId = RequestId(0);
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    pub id: RequestId,
    pub message: String,
}

impl Greeting {
    pub fn new(id: RequestId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }

    /// `{id: 0, message: "No more greetings!"}`
    pub fn sentinel() -> Self {
        Self::new(RequestId::SENTINEL, SENTINEL_MESSAGE)
    }

    pub fn is_sentinel(&self) -> bool {
        self.id == RequestId::SENTINEL && self.message == SENTINEL_MESSAGE
    }
}

/// Outcome of the language draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    French,
    Unsupported,
}

impl Language {
    /// Map a uniform draw in `[0, 1)` to a language:
    /// below 0.01 unsupported, above 0.30 English, French otherwise.
    pub fn resolve(draw: f64) -> Self {
        if draw < 0.01 {
            Language::Unsupported
        } else if draw > 0.30 {
            Language::English
        } else {
            Language::French
        }
    }

    /// Value recorded in the `greetingsLanguage` correlation field.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::French => "france",
            Language::Unsupported => "chines",
        }
    }

    /// Localized message, or `None` when the language has no template.
    pub fn greet(self, name: &str) -> Option<String> {
        match self {
            Language::English => Some(format!("Hello, {}!", name)),
            // "Bonjure" is the established wire text; clients match on it.
            Language::French => Some(format!("Bonjure, {}!", name)),
            Language::Unsupported => None,
        }
    }
}
