use axum::http::StatusCode;
use axum_test::TestServer;
use crawler::interfaces::{
    ChannelBroadcaster, InMemorySessionStore, LoggingLeadSink, StaticSectorRegistry,
};
use crawler::validator::EmailValidator;
use crawler::{build_app, config::Config, jobs::JobManager, AppState};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

fn test_config() -> Config {
    Config {
        port: 0,
        max_concurrent_jobs: 10,
        max_search_pages: 1,
        mx_lookup_timeout_ms: 100,
        smtp_timeout_ms: 100,
        cache_sweep_interval_secs: 300,
        shared_secret: "test_secret".to_string(),
    }
}

fn test_state(config: Arc<Config>) -> AppState {
    let validator = Arc::new(
        EmailValidator::new(Duration::from_millis(100), Duration::from_millis(100))
            .unwrap(),
    );
    let job_manager = Arc::new(JobManager::new(
        config.clone(),
        Arc::new(StaticSectorRegistry::new()),
        None,
        Arc::new(ChannelBroadcaster::new()),
        Arc::new(LoggingLeadSink),
        Arc::new(InMemorySessionStore::new()),
        validator,
    ));
    AppState {
        config,
        job_manager,
    }
}

fn compute_signature(body: &str, timestamp: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn signed_timestamp_and_sig(body: &str, secret: &str) -> (String, String) {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        .to_string();
    let signature = compute_signature(body, &timestamp, secret);
    (timestamp, signature)
}

#[tokio::test]
async fn test_health_requires_no_auth() {
    let config = Arc::new(test_config());
    let app = build_app(test_state(config));
    let server = TestServer::new(app).unwrap();

    let response = server.get("/api/v1/health").await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_start_status_stop_roundtrip() {
    let config = Arc::new(test_config());
    let app = build_app(test_state(config.clone()));
    let server = TestServer::new(app).unwrap();

    let payload = json!({
        "list_id": "list-1",
        "use_case": "erp",
        "config": { "target_leads": 5, "use_puppeteer": false }
    });
    let body_str = serde_json::to_string(&payload).unwrap();
    let (timestamp, signature) = signed_timestamp_and_sig(&body_str, &config.shared_secret);

    let response = server
        .post("/api/v1/jobs/tenant-a")
        .add_header("X-Timestamp", timestamp)
        .add_header("X-Signature", signature)
        .json(&payload)
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "running");
    assert!(json["session_id"].is_string());

    let (timestamp_status, signature_status) = signed_timestamp_and_sig("", &config.shared_secret);
    let status_response = server
        .get("/api/v1/jobs/tenant-a/status")
        .add_header("X-Timestamp", timestamp_status)
        .add_header("X-Signature", signature_status)
        .await;
    status_response.assert_status(StatusCode::OK);

    let (timestamp_stop, signature_stop) = signed_timestamp_and_sig("", &config.shared_secret);
    let stop_response = server
        .post("/api/v1/jobs/tenant-a/stop")
        .add_header("X-Timestamp", timestamp_stop)
        .add_header("X-Signature", signature_stop)
        .await;
    stop_response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_unsigned_request_rejected() {
    let config = Arc::new(test_config());
    let app = build_app(test_state(config));
    let server = TestServer::new(app).unwrap();

    let response = server.get("/api/v1/jobs/tenant-a/status").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_use_case_returns_400() {
    let config = Arc::new(test_config());
    let app = build_app(test_state(config.clone()));
    let server = TestServer::new(app).unwrap();

    let payload = json!({ "list_id": "list-1", "use_case": "not-a-use-case" });
    let body_str = serde_json::to_string(&payload).unwrap();
    let (timestamp, signature) = signed_timestamp_and_sig(&body_str, &config.shared_secret);

    let response = server
        .post("/api/v1/jobs/tenant-b")
        .add_header("X-Timestamp", timestamp)
        .add_header("X-Signature", signature)
        .json(&payload)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}
