//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router for the front or the backend service
//! - Wire up middleware (request ID, tracing, request timeout)
//! - Serve on a listener until the shutdown signal fires
//!
//! # Design Decisions
//! - `/greeting` has no HTTP-level timeout: the pipeline bounds its own
//!   remote call, so a slow backend still ends in a recovered reply with
//!   a terminal span status instead of a dropped request
//! - `/backend` and `/health` are bounded by `timeouts.request_secs`

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServiceConfig;
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::ShutdownSignal;
use crate::pipeline::Pipeline;
use crate::remote::RemoteEndpoint;

/// HTTP server for one of the two services.
pub struct HttpServer {
    name: &'static str,
    router: Router,
}

impl HttpServer {
    /// Front service: `GET /greeting`.
    pub fn frontend(pipeline: Arc<Pipeline>, config: &ServiceConfig) -> Self {
        let routes = Router::new()
            .route("/greeting", get(handlers::greeting))
            .with_state(pipeline);
        Self {
            name: "frontend",
            router: Self::with_layers(routes, config),
        }
    }

    /// Backend service: `GET /backend`.
    pub fn backend(endpoint: Arc<RemoteEndpoint>, config: &ServiceConfig) -> Self {
        let routes = Router::new()
            .route(
                "/backend",
                get(handlers::backend).layer(request_timeout(config)),
            )
            .with_state(endpoint);
        Self {
            name: "backend",
            router: Self::with_layers(routes, config),
        }
    }

    /// Add the shared routes and middleware stack.
    fn with_layers(routes: Router, config: &ServiceConfig) -> Router {
        routes
            .route(
                "/health",
                get(handlers::health).layer(request_timeout(config)),
            )
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(service = self.name, address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!(service = self.name, "HTTP server stopped");
        Ok(())
    }
}

#[allow(deprecated)]
fn request_timeout(config: &ServiceConfig) -> TimeoutLayer {
    TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))
}
