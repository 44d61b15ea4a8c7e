use std::sync::Arc;

use rig_switch::health::HealthChecker;
use rig_switch::metrics::MetricsCollector;
use rig_switch::server::RigServer;
use rig_switch::signing::{canonical_message, hmac_sha256_hex};
use rig_switch::config::Config;
use rig_switch::{ActionTaken, ApiClient, ApiClientError, Credentials, RigStateReconciler};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const STATUS_PATH: &str = "/main/api/v2/mining/rig2/rig1";
const ACTION_PATH: &str = "/main/api/v2/mining/rigs/status2";

fn creds() -> Credentials {
    Credentials::new("k", "s", "o")
}

/// Answers like the real service: 401 unless `X-Auth` verifies.
struct VerifyingResponder {
    body: Value,
}

impl Respond for VerifyingResponder {
    fn respond(&self, req: &Request) -> ResponseTemplate {
        let header = |name: &str| req.headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
        let (Some(time), Some(nonce), Some(auth)) = (header("X-Time"), header("X-Nonce"), header("X-Auth")) else {
            return ResponseTemplate::new(401).set_body_string(r#"{"error":"missing auth"}"#);
        };
        let (Ok(time), Ok(nonce)) = (time.parse::<i64>(), Uuid::parse_str(&nonce)) else {
            return ResponseTemplate::new(401).set_body_string(r#"{"error":"bad auth"}"#);
        };

        let body = if req.body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&req.body).into_owned())
        };
        let message = canonical_message(
            &creds(),
            time,
            &nonce,
            req.method.as_str(),
            req.url.path(),
            req.url.query().unwrap_or(""),
            body.as_deref(),
        );
        if auth != format!("k:{}", hmac_sha256_hex("s", &message)) {
            return ResponseTemplate::new(401).set_body_string(r#"{"error":"bad key"}"#);
        }
        ResponseTemplate::new(200).set_body_json(self.body.clone())
    }
}

async fn stub(status: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(VerifyingResponder { body: status })
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ACTION_PATH))
        .respond_with(VerifyingResponder { body: json!({"success": true}) })
        .mount(&server)
        .await;
    server
}

async fn posts(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn activate_on_mining_rig_records_no_post() {
    let server = stub(json!({"minerStatus": "MINING"})).await;
    let reconciler = RigStateReconciler::new(ApiClient::new(server.uri(), creds()));

    let result = reconciler.activate("rig1").await.unwrap();
    assert_eq!(result.action_taken, ActionTaken::None);
    assert!(result.response_body.is_none());
    assert!(posts(&server).await.is_empty());
}

#[tokio::test]
async fn activate_on_stopped_rig_posts_one_verified_start() {
    let server = stub(json!({"minerStatus": "STOPPED"})).await;
    let reconciler = RigStateReconciler::new(ApiClient::new(server.uri(), creds()).verbose(true));

    let result = reconciler.activate("rig1").await.unwrap();
    assert_eq!(result.action_taken, ActionTaken::Start);
    assert_eq!(result.response_body, Some(json!({"success": true})));
    assert_eq!(posts(&server).await, vec![json!({"rigId": "rig1", "action": "START"})]);
}

#[tokio::test]
async fn deactivate_unknown_status_posts_stop() {
    let server = stub(json!({"minerStatus": "ERROR"})).await;
    let reconciler = RigStateReconciler::new(ApiClient::new(server.uri(), creds()));

    let result = reconciler.deactivate("rig1").await.unwrap();
    assert_eq!(result.action_taken, ActionTaken::Stop);
    assert_eq!(posts(&server).await, vec![json!({"rigId": "rig1", "action": "STOP"})]);
}

#[tokio::test]
async fn wrong_secret_surfaces_remote_401() {
    let server = stub(json!({"minerStatus": "MINING"})).await;
    let client = ApiClient::new(server.uri(), Credentials::new("k", "wrong", "o"));
    let reconciler = RigStateReconciler::new(client);

    match reconciler.deactivate("rig1").await.unwrap_err() {
        ApiClientError::Api { status, body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body.as_deref(), Some(r#"{"error":"bad key"}"#));
        }
        other => panic!("expected ApiError, got {:?}", other),
    }
    assert!(posts(&server).await.is_empty());
}

#[tokio::test]
async fn listener_serves_reconciliation_over_tcp() {
    let api = stub(json!({"minerStatus": "MINING"})).await;
    let reconciler = Arc::new(RigStateReconciler::new(ApiClient::new(api.uri(), creds())));
    let metrics = Arc::new(MetricsCollector::new());
    let health = Arc::new(HealthChecker::new(metrics.clone(), Config::default()));
    let server = Arc::new(RigServer::new(reconciler, health, metrics));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));

    let http = reqwest::Client::new();
    let resp = http.put(format!("http://{}/deactivate/rig1", addr)).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["actionTaken"], "STOP");
    assert_eq!(body["responseBody"], json!({"success": true}));

    let resp = http.put(format!("http://{}/activate/rig1", addr)).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["actionTaken"], "NONE");

    let resp = http.get(format!("http://{}/metrics", addr)).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["metrics"]["stops_issued"], 1);
    assert_eq!(body["metrics"]["noops"], 1);

    assert_eq!(posts(&api).await.len(), 1);
}

#[tokio::test]
async fn listener_reports_upstream_failure_as_502() {
    // Nothing listens on this port
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = probe.local_addr().unwrap();
    drop(probe);

    let client = ApiClient::new(format!("http://{}", dead), creds());
    let reconciler = Arc::new(RigStateReconciler::new(client));
    let metrics = Arc::new(MetricsCollector::new());
    let health = Arc::new(HealthChecker::new(metrics.clone(), Config::default()));
    let server = Arc::new(RigServer::new(reconciler, health, metrics.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));

    let resp = reqwest::Client::new()
        .put(format!("http://{}/activate/rig1", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 502);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("transport error"));
    assert!(body.get("status").is_none());
    assert_eq!(metrics.get_metrics().transport_errors, 1);
}
