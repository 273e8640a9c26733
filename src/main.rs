//! Greeting services launcher.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client                 ┌──────────── frontend ────────────┐
//!     GET /greeting ────────▶│ http → pipeline                  │
//!                            │   do-greetings                   │
//!                            │   get-backend ───────────────────┼──▶ GET /backend?id=
//!                            │   hello-greetings                │        │
//!     200 greeting ◀─────────│ 500 sentinel                     │        ▼
//!                            └──────────────────────────────────┘   ┌── backend ──┐
//!                                                                    │ RemoteEndpoint│
//!                            Cross-cutting: config (+ watcher),      └──────────────┘
//!                            context, observability, lifecycle
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use greetings::config::watcher::BackendSettingsWatcher;
use greetings::config::{load_config, ServiceConfig};
use greetings::http::HttpServer;
use greetings::lifecycle::{wait_for_signal, Shutdown};
use greetings::observability::logging::init_logging;
use greetings::observability::metrics::{init_metrics, MetricsSink};
use greetings::observability::tracing::{LogExporter, SpanExporter};
use greetings::pipeline::latency::{Latency, LatencyProfile, BACKEND_WORK_MAX};
use greetings::pipeline::Pipeline;
use greetings::remote::{HttpBackendClient, RemoteEndpoint};

#[derive(Parser)]
#[command(name = "greetings")]
#[command(about = "Observable greeting front service and its backend", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Run the greeting front service
    Frontend,
    /// Run the backend service
    Backend,
    /// Run both services in one process
    All,
}

impl Commands {
    fn runs_frontend(self) -> bool {
        matches!(self, Commands::Frontend | Commands::All)
    }

    fn runs_backend(self) -> bool {
        matches!(self, Commands::Backend | Commands::All)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!("greetings v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        frontend = %config.frontend.bind_address,
        backend = %config.backend_service.bind_address,
        backend_enabled = config.demo.backend.enable,
        latency_enabled = config.simulation.latency_enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let metrics = Arc::new(MetricsSink::new());
    let exporter: Arc<dyn SpanExporter> = Arc::new(LogExporter);
    let shutdown = Shutdown::new();
    let mut servers = JoinSet::new();
    // Keeps the file watcher alive until exit.
    let mut _watcher = None;

    if cli.command.runs_backend() {
        let latency = if config.simulation.latency_enabled {
            Latency::up_to(BACKEND_WORK_MAX)
        } else {
            Latency::none()
        };
        let endpoint = Arc::new(RemoteEndpoint::new(metrics.clone(), exporter.clone(), latency));
        let listener = TcpListener::bind(&config.backend_service.bind_address).await?;
        let server = HttpServer::backend(endpoint, &config);
        servers.spawn(server.run(listener, shutdown.subscribe()));
    }

    if cli.command.runs_frontend() {
        let pipeline = Arc::new(
            Pipeline::builder(config.demo.backend.clone(), Arc::new(HttpBackendClient::new()))
                .metrics(metrics.clone())
                .exporter(exporter.clone())
                .latency(LatencyProfile::from_enabled(config.simulation.latency_enabled))
                .backend_deadline(Duration::from_secs(config.timeouts.request_secs))
                .build(),
        );

        if let Some(path) = &cli.config {
            let (watcher, mut updates) =
                BackendSettingsWatcher::new(path, config.demo.backend.clone());
            match watcher.run() {
                Ok(handle) => {
                    _watcher = Some(handle);
                    let pipeline = pipeline.clone();
                    tokio::spawn(async move {
                        while let Some(next) = updates.recv().await {
                            pipeline.apply_backend_settings(next);
                        }
                    });
                }
                Err(e) => tracing::warn!(error = %e, "Config watcher unavailable, reload disabled"),
            }
        }

        let listener = TcpListener::bind(&config.frontend.bind_address).await?;
        let server = HttpServer::frontend(pipeline, &config);
        servers.spawn(server.run(listener, shutdown.subscribe()));
    }

    tokio::select! {
        _ = wait_for_signal() => {}
        Some(result) = servers.join_next() => {
            tracing::error!(result = ?result, "Server exited unexpectedly");
        }
    }

    shutdown.trigger();
    while let Some(result) = servers.join_next().await {
        match result {
            Ok(Err(e)) => tracing::error!(error = %e, "Server error during shutdown"),
            Err(e) => tracing::error!(error = %e, "Server task failed"),
            Ok(Ok(())) => {}
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
