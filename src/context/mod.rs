//! Request-scoped correlation context.
//!
//! # Data Flow
//! ```text
//! Request entry
//!     → CorrelationContext created (or borrowed empty)
//!     → ContextScope wraps it (clears on every exit path)
//!     → stages set fields through &mut access
//!     → log_with_context! copies fields onto each log event
//! Request exit
//!     → ContextScope dropped → context cleared
//! ```
//!
//! # Design Decisions
//! - The context is passed explicitly down the call chain; there is no
//!   thread-local or task-local "current context" lookup
//! - Isolation between concurrent requests follows from ownership: one
//!   request, one `&mut CorrelationContext`

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Identity of the greeting being served.
pub const GREETINGS_ID: &str = "greetingsId";
/// Name the caller asked to be greeted.
pub const GREETINGS_NAME: &str = "greetingsName";
/// Stage 1 outcome marker.
pub const GREETING_STATUS: &str = "greetingStatus";
/// Language resolved by the localization stage.
pub const GREETINGS_LANGUAGE: &str = "greetingsLanguage";

/// Mutable key/value bag attached to one logical request.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CorrelationContext {
    fields: BTreeMap<String, String>,
}

impl CorrelationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, overwriting any previous value.
    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Last value set for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Remove every field.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for CorrelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

/// Guard that clears the wrapped context when dropped.
///
/// Holding the scope for the lifetime of a request handler guarantees the
/// context is empty again once the handler returns, whichever path it took.
pub struct ContextScope<'a> {
    ctx: &'a mut CorrelationContext,
}

impl<'a> ContextScope<'a> {
    pub fn new(ctx: &'a mut CorrelationContext) -> Self {
        Self { ctx }
    }
}

impl Deref for ContextScope<'_> {
    type Target = CorrelationContext;
    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for ContextScope<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        self.ctx.clear();
    }
}

/// Emit a `tracing` event carrying the well-known correlation fields.
///
/// ```ignore
/// log_with_context!(tracing::Level::INFO, ctx, "Greetings success");
/// log_with_context!(tracing::Level::ERROR, ctx, error = %fault, "Greetings failed");
/// ```
#[macro_export]
macro_rules! log_with_context {
    ($lvl:expr, $ctx:expr, $($arg:tt)+) => {
        ::tracing::event!(
            $lvl,
            greetingsId = $ctx.get($crate::context::GREETINGS_ID).unwrap_or_default(),
            greetingsName = $ctx.get($crate::context::GREETINGS_NAME).unwrap_or_default(),
            greetingStatus = $ctx.get($crate::context::GREETING_STATUS).unwrap_or_default(),
            greetingsLanguage = $ctx.get($crate::context::GREETINGS_LANGUAGE).unwrap_or_default(),
            $($arg)+
        )
    };
}
