//! Remote call subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stage 2
//!     → client.rs (BackendCall: HTTP via reqwest, or in-process)
//!     → GET /backend?id=<id>
//!     → endpoint.rs (RemoteEndpoint: count, trace, decide)
//!     → body "Success" | "Failed", status 200
//! ```

pub mod client;
pub mod endpoint;

pub use client::{BackendCall, HttpBackendClient, LocalBackend};
pub use endpoint::RemoteEndpoint;
