//! Observable greeting services library

pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod remote;

pub use config::ServiceConfig;
pub use context::CorrelationContext;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Greeting, GreetingReply, Pipeline, PipelineError};
pub use remote::RemoteEndpoint;
