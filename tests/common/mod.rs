//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use greetings::config::{BackendSettings, ServiceConfig};
use greetings::http::HttpServer;
use greetings::lifecycle::Shutdown;
use greetings::observability::metrics::MetricsSink;
use greetings::observability::tracing::InMemoryExporter;
use greetings::pipeline::fault::ScriptedDice;
use greetings::pipeline::latency::{Latency, LatencyProfile};
use greetings::pipeline::Pipeline;
use greetings::remote::{HttpBackendClient, RemoteEndpoint};

/// Bind an ephemeral port on localhost.
pub async fn ephemeral_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// An address nothing listens on.
#[allow(dead_code)]
pub async fn closed_addr() -> SocketAddr {
    let (listener, addr) = ephemeral_listener().await;
    drop(listener);
    addr
}

/// Start a raw-TCP backend whose reply (status, body) is computed per request.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let (listener, addr) = ephemeral_listener().await;
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A running backend service.
#[allow(dead_code)]
pub struct BackendHandle {
    pub addr: SocketAddr,
    pub metrics: Arc<MetricsSink>,
    pub exporter: Arc<InMemoryExporter>,
    pub shutdown: Shutdown,
}

/// Start the backend service with no simulated latency.
#[allow(dead_code)]
pub async fn start_backend() -> BackendHandle {
    let metrics = Arc::new(MetricsSink::new());
    let exporter = Arc::new(InMemoryExporter::new());
    let endpoint = Arc::new(RemoteEndpoint::new(
        metrics.clone(),
        exporter.clone(),
        Latency::none(),
    ));
    let (listener, addr) = ephemeral_listener().await;
    let shutdown = Shutdown::new();
    let server = HttpServer::backend(endpoint, &ServiceConfig::default());
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    BackendHandle {
        addr,
        metrics,
        exporter,
        shutdown,
    }
}

/// A running front service.
#[allow(dead_code)]
pub struct FrontendHandle {
    pub addr: SocketAddr,
    pub pipeline: Arc<Pipeline>,
    pub dice: Arc<ScriptedDice>,
    pub exporter: Arc<InMemoryExporter>,
    pub shutdown: Shutdown,
}

impl FrontendHandle {
    #[allow(dead_code)]
    pub fn url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.addr, path_and_query)
    }
}

/// Start the front service with scripted draws (0.5 when the script runs
/// out, which always succeeds in English) and no simulated latency.
#[allow(dead_code)]
pub async fn start_frontend(settings: BackendSettings) -> FrontendHandle {
    start_frontend_with(settings, &ServiceConfig::default()).await
}

/// Like [`start_frontend`], with the remote-call deadline and HTTP layers
/// taken from `config`.
#[allow(dead_code)]
pub async fn start_frontend_with(settings: BackendSettings, config: &ServiceConfig) -> FrontendHandle {
    let dice = Arc::new(ScriptedDice::new([]));
    let exporter = Arc::new(InMemoryExporter::new());
    let pipeline = Arc::new(
        Pipeline::builder(settings, Arc::new(HttpBackendClient::new()))
            .dice(dice.clone())
            .exporter(exporter.clone())
            .latency(LatencyProfile::none())
            .backend_deadline(Duration::from_secs(config.timeouts.request_secs))
            .build(),
    );
    let (listener, addr) = ephemeral_listener().await;
    let shutdown = Shutdown::new();
    let server = HttpServer::frontend(pipeline.clone(), config);
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    FrontendHandle {
        addr,
        pipeline,
        dice,
        exporter,
        shutdown,
    }
}

/// Backend settings pointing at `addr`.
#[allow(dead_code)]
pub fn backend_at(addr: SocketAddr) -> BackendSettings {
    BackendSettings {
        enable: true,
        endpoint: format!("http://{}", addr),
        timeout_ms: Some(1000),
    }
}

/// HTTP client without connection pooling.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
