//! HTTP surface of both services.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (add or keep x-request-id)
//!     → handlers.rs (extract query, call pipeline or endpoint)
//!     → response.rs (reply → status + JSON, error → plain 500)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id_of, X_REQUEST_ID};
pub use server::HttpServer;
