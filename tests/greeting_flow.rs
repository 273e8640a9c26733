//! End-to-end tests for the front service and the backend over real sockets.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use greetings::config::{BackendSettings, ServiceConfig};
use greetings::observability::tracing::SpanStatus;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_local_greeting_over_http() {
    let front = common::start_frontend(BackendSettings::default()).await;
    let client = common::client();

    let res = client
        .get(front.url("/greeting?name=World"))
        .send()
        .await
        .expect("frontend unreachable");
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"id": 1, "message": "Hello, World!"}));

    front.shutdown.trigger();
}

#[tokio::test]
async fn test_backend_rejects_the_21st_request() {
    let backend = common::start_backend().await;
    let front = common::start_frontend(common::backend_at(backend.addr)).await;
    let client = common::client();

    let mut statuses = Vec::new();
    let mut last: Value = Value::Null;
    for _ in 0..21 {
        let res = client.get(front.url("/greeting")).send().await.unwrap();
        statuses.push(res.status());
        last = res.json().await.unwrap();
    }

    // ids 1, 11 and 21 end in 1
    for (i, status) in statuses.iter().enumerate() {
        let id = i + 1;
        let expected = if id % 10 == 1 {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };
        assert_eq!(*status, expected, "request {}", id);
    }
    assert_eq!(last, json!({"id": 0, "message": "No more greetings!"}));
    assert_eq!(backend.metrics.value("greetingsbackend.total", &[]), 21);
    assert_eq!(backend.metrics.value("greetingsbackend.error", &[]), 3);

    let root = front.exporter.roots().pop().unwrap();
    assert_eq!(root.attribute("greetingId"), Some("21"));
    assert!(root.status.as_ref().is_some_and(SpanStatus::is_error));

    front.shutdown.trigger();
    backend.shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_backend_degrades() {
    let addr = common::closed_addr().await;
    let front = common::start_frontend(common::backend_at(addr)).await;

    let res = common::client().get(front.url("/greeting")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"id": 0, "message": "No more greetings!"}));
}

#[tokio::test]
async fn test_slow_backend_times_out_and_degrades() {
    let addr = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, "Success".to_string())
    })
    .await;
    let front = common::start_frontend(BackendSettings {
        timeout_ms: Some(50),
        ..common::backend_at(addr)
    })
    .await;

    let res = common::client().get(front.url("/greeting")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"], 0);
}

#[tokio::test]
async fn test_backend_error_status_is_not_recovered() {
    let addr = common::start_programmable_backend(|| async {
        (500, "boom".to_string())
    })
    .await;
    let front = common::start_frontend(common::backend_at(addr)).await;

    let res = common::client().get(front.url("/greeting")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // plain framework error, not the sentinel greeting
    let text = res.text().await.unwrap();
    assert_eq!(text, "Internal Server Error");
    assert!(serde_json::from_str::<Value>(&text).is_err());
}

#[tokio::test]
async fn test_failed_body_with_200_degrades() {
    let calls = Arc::new(AtomicU32::new(0));
    let seen = calls.clone();
    let addr = common::start_programmable_backend(move || {
        let seen = seen.clone();
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            (200, "Failed".to_string())
        }
    })
    .await;
    let front = common::start_frontend(common::backend_at(addr)).await;

    let res = common::client().get(front.url("/greeting")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(front.exporter.named("get-backend")[0]
        .status
        .as_ref()
        .is_some_and(SpanStatus::is_error));
}

#[tokio::test]
async fn test_toggle_backend_at_runtime() {
    let addr = common::start_programmable_backend(|| async {
        (200, "Failed".to_string())
    })
    .await;
    let front = common::start_frontend(BackendSettings::default()).await;
    let client = common::client();

    let res = client.get(front.url("/greeting")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    front.pipeline.apply_backend_settings(common::backend_at(addr));
    let res = client.get(front.url("/greeting")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_backend_service_contract() {
    let backend = common::start_backend().await;
    let client = common::client();
    let base = format!("http://{}", backend.addr);

    for (id, expected) in [(21, "Failed"), (22, "Success"), (1, "Failed"), (-1, "Success")] {
        let res = client
            .get(format!("{}/backend?id={}", base, id))
            .send()
            .await
            .unwrap();
        // rejection travels in the body only
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.text().await.unwrap(), expected, "id {}", id);
    }

    let res = client.get(format!("{}/backend", base)).send().await.unwrap();
    assert!(res.status().is_client_error());
    let res = client
        .get(format!("{}/backend?id=abc", base))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_client_error());

    assert_eq!(backend.metrics.value("greetingsbackend.total", &[]), 4);
    assert_eq!(backend.metrics.value("greetingsbackend.error", &[]), 2);
}

#[tokio::test]
async fn test_health_and_request_id_propagation() {
    let front = common::start_frontend(BackendSettings::default()).await;
    let res = common::client()
        .get(front.url("/health"))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "req-42");
    assert_eq!(res.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let front = common::start_frontend(BackendSettings::default()).await;
    let client = common::client();
    assert_eq!(
        client.get(front.url("/health")).send().await.unwrap().status(),
        StatusCode::OK
    );

    front.shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(client.get(front.url("/health")).send().await.is_err());
}

#[tokio::test]
async fn test_slow_backend_without_timeout_still_gets_sentinel() {
    let addr = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, "Success".to_string())
    })
    .await;
    let mut config = ServiceConfig::default();
    config.timeouts.request_secs = 1;
    let front = common::start_frontend_with(
        BackendSettings {
            timeout_ms: None,
            ..common::backend_at(addr)
        },
        &config,
    )
    .await;

    let res = common::client().get(front.url("/greeting")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"id": 0, "message": "No more greetings!"}));

    // every span reached a terminal status; nothing was abandoned
    let root = front.exporter.roots().pop().unwrap();
    assert!(root.status.as_ref().is_some_and(SpanStatus::is_error));
    assert_eq!(
        front.exporter.named("get-backend")[0].status,
        Some(SpanStatus::error("resource access failed: backend call exceeded 1000ms"))
    );
    assert_eq!(
        front.exporter.named("do-greetings")[0].status,
        Some(SpanStatus::Ok)
    );
}

#[tokio::test]
async fn test_backend_span_joins_frontend_trace() {
    let backend = common::start_backend().await;
    let front = common::start_frontend(common::backend_at(backend.addr)).await;

    let res = common::client()
        .get(front.url("/greeting?name=Trace"))
        .header("x-request-id", "req-trace-1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let get_backend = front.exporter.named("get-backend").pop().unwrap();
    let remote = backend.exporter.named("backend").pop().unwrap();
    assert_eq!(remote.parent, Some(get_backend.id));
    assert_eq!(remote.attribute("requestId"), Some("req-trace-1"));
    assert_eq!(remote.attribute("greetingId"), Some("1"));
    assert!(backend.exporter.roots().is_empty());
}
