//! HTTP probes and streams against a mock server

use std::time::Duration;

use libtether_core::{HealthMonitor, HealthState, Probe, TetherError};
use libtether_http::{HeartbeatClient, HttpProbe, HttpStreamSource, StreamStatus};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn health_server(route: &str, template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_probe_healthy_reads_uptime() {
    let server = health_server(
        "/health",
        ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "uptime": 12.5})),
    )
    .await;
    let probe = HttpProbe::new("supervisor", format!("{}/health", server.uri())).unwrap();

    let report = probe.check(Duration::from_secs(2)).await.unwrap();
    assert_eq!(report.uptime_secs, Some(12.5));
    assert_eq!(probe.name(), "supervisor");
}

#[tokio::test]
async fn test_probe_accepts_healthy_status() {
    let server = health_server(
        "/api/health",
        ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})),
    )
    .await;
    let probe = HttpProbe::new("dashboard", format!("{}/api/health", server.uri())).unwrap();

    let report = probe.check(Duration::from_secs(2)).await.unwrap();
    assert_eq!(report.uptime_secs, None);
}

#[tokio::test]
async fn test_probe_non_200_is_unreachable() {
    let server = health_server("/health", ResponseTemplate::new(503)).await;
    let probe = HttpProbe::new("supervisor", format!("{}/health", server.uri())).unwrap();

    let err = probe.check(Duration::from_secs(2)).await.unwrap_err();
    assert!(matches!(err, TetherError::Unreachable(_)));
}

#[tokio::test]
async fn test_probe_unhealthy_status_fails() {
    let server = health_server(
        "/health",
        ResponseTemplate::new(200).set_body_json(json!({"status": "starting"})),
    )
    .await;
    let probe = HttpProbe::new("supervisor", format!("{}/health", server.uri())).unwrap();

    assert!(probe.check(Duration::from_secs(2)).await.is_err());
}

#[tokio::test]
async fn test_probe_non_json_is_malformed() {
    let server = health_server("/health", ResponseTemplate::new(200).set_body_string("OK")).await;
    let probe = HttpProbe::new("supervisor", format!("{}/health", server.uri())).unwrap();

    let err = probe.check(Duration::from_secs(2)).await.unwrap_err();
    assert!(matches!(err, TetherError::MalformedPayload(_)));
}

#[tokio::test]
async fn test_probe_slow_endpoint_times_out() {
    let server = health_server(
        "/health",
        ResponseTemplate::new(200)
            .set_body_json(json!({"status": "ok"}))
            .set_delay(Duration::from_secs(5)),
    )
    .await;
    let probe = HttpProbe::new("supervisor", format!("{}/health", server.uri())).unwrap();

    let err = probe.check(Duration::from_millis(200)).await.unwrap_err();
    assert!(matches!(err, TetherError::Timeout(200)));
}

#[tokio::test]
async fn test_probe_connection_refused() {
    let server = MockServer::start().await;
    let url = format!("{}/health", server.uri());
    drop(server);

    let probe = HttpProbe::new("supervisor", url).unwrap();
    let err = probe.check(Duration::from_secs(2)).await.unwrap_err();
    assert!(matches!(err, TetherError::Unreachable(_) | TetherError::Timeout(_)));
}

#[tokio::test]
async fn test_monitor_with_http_probes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "uptime": 3.0})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let monitor = HealthMonitor::new(
        HttpProbe::new("supervisor", format!("{}/health", server.uri())).unwrap(),
        HttpProbe::new("dashboard", format!("{}/api/health", server.uri())).unwrap(),
        Duration::from_secs(2),
    );

    let snapshot = monitor.poll().await;
    assert_eq!(snapshot.state, HealthState::Degraded);
    assert!(snapshot.supervisor_healthy);
    assert!(!snapshot.dashboard_healthy);
    assert_eq!(snapshot.uptime_secs, Some(3.0));
}

#[tokio::test]
async fn test_heartbeat_over_http() {
    let server = MockServer::start().await;
    let body = "data: ping\n\ndata: {\"timestamp_ms\":1,\"pool_instances\":3,\"mcp_healthy\":true}\n\n";
    Mock::given(method("GET"))
        .and(path("/supervisor/heartbeat"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let source = HttpStreamSource::new(format!("{}/supervisor/heartbeat", server.uri())).unwrap();
    let client = HeartbeatClient::new(source);
    let mut beats = client.subscribe_beats();
    let mut status = client.subscribe_status();
    client.start();

    assert_eq!(status.recv().await.unwrap(), StreamStatus::Connected);
    let beat = beats.recv().await.unwrap();
    assert_eq!(beat.pool_instances, 3);
    assert_eq!(status.recv().await.unwrap(), StreamStatus::Lost);
    assert_eq!(
        status.recv().await.unwrap(),
        StreamStatus::ReconnectScheduled(Duration::from_millis(2000))
    );
    assert!(beats.try_recv().is_err());

    client.dispose();
}

#[tokio::test]
async fn test_stream_error_status_schedules_reconnect() {
    let server = health_server("/api/events/stream", ResponseTemplate::new(500)).await;

    let source = HttpStreamSource::new(format!("{}/api/events/stream", server.uri())).unwrap();
    let client = HeartbeatClient::new(source);
    let mut status = client.subscribe_status();
    client.start();

    assert_eq!(
        status.recv().await.unwrap(),
        StreamStatus::ReconnectScheduled(Duration::from_millis(2000))
    );
    client.dispose();
}
