use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::client::RigApi;
use crate::error::ApiClientError;
use crate::health::HealthChecker;
use crate::metrics::MetricsCollector;
use crate::prometheus_metrics::PrometheusMetrics;
use crate::reconciler::RigStateReconciler;
use crate::types::ActionResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn json(status: u16, body: String) -> Self {
        Self { status, content_type: "application/json", body }
    }

    fn text(status: u16, body: String) -> Self {
        Self { status, content_type: "text/plain; version=0.0.4", body }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }).to_string())
    }

    pub fn to_wire(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "",
    }
}

enum Target {
    Activate,
    Deactivate,
}

/// Listener exposing `PUT /activate/{rigId}` and `PUT /deactivate/{rigId}`,
/// plus health and metrics endpoints.
pub struct RigServer<A> {
    reconciler: Arc<RigStateReconciler<A>>,
    health_checker: Arc<HealthChecker>,
    metrics: Arc<MetricsCollector>,
    prometheus: Arc<PrometheusMetrics>,
    legacy_empty_error_body: bool,
}

impl<A> RigServer<A>
where
    A: RigApi + Send + Sync + 'static,
{
    pub fn new(
        reconciler: Arc<RigStateReconciler<A>>,
        health_checker: Arc<HealthChecker>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            reconciler,
            health_checker,
            metrics,
            prometheus: Arc::new(PrometheusMetrics::new()),
            legacy_empty_error_body: false,
        }
    }

    /// Answer reconciliation errors with `200 {}` like the older wrapper did.
    pub fn legacy_empty_error_body(mut self, enabled: bool) -> Self {
        self.legacy_empty_error_body = enabled;
        self
    }

    pub async fn start(self: Arc<Self>, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        info!("Rig server listening on {}", listener.local_addr()?);

        loop {
            let (mut socket, peer) = listener.accept().await?;
            let server = Arc::clone(&self);

            tokio::spawn(async move {
                let mut buffer = [0; 4096];
                let n = match socket.read(&mut buffer).await {
                    Ok(0) => return,
                    Ok(n) => n,
                    Err(e) => {
                        warn!(%peer, "read failed: {}", e);
                        return;
                    }
                };

                let request = String::from_utf8_lossy(&buffer[..n]);
                let response = server.handle_request(&request).await;

                if let Err(e) = socket.write_all(response.to_wire().as_bytes()).await {
                    warn!(%peer, "write failed: {}", e);
                }
            });
        }
    }

    pub async fn handle_request(&self, request: &str) -> HttpResponse {
        let Some(request_line) = request.lines().next() else {
            return HttpResponse::error(400, "Bad Request");
        };

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() < 2 {
            return HttpResponse::error(400, "Bad Request");
        }

        let method = parts[0];
        let path = parts[1].split('?').next().unwrap_or_default();

        if let Some((target, rig_id)) = parse_rig_path(path) {
            if method != "PUT" {
                return HttpResponse::error(405, "Method Not Allowed");
            }
            if rig_id.is_empty() || rig_id.contains('/') {
                return HttpResponse::error(404, "Not Found");
            }
            return self.reconcile(target, rig_id).await;
        }

        match (method, path) {
            ("GET", "/health") => to_json_response(&self.health_checker.get_health()),
            ("GET", "/status") => to_json_response(&self.health_checker.get_detailed_status()),
            ("GET", "/metrics") => to_json_response(&self.health_checker.get_metrics()),
            ("GET", "/metrics/prometheus") => {
                self.prometheus.update_from_metrics(&self.metrics.get_metrics());
                match self.prometheus.export_metrics() {
                    Ok(text) => HttpResponse::text(200, text),
                    Err(_) => HttpResponse::error(500, "Internal Server Error"),
                }
            }
            (_, "/health" | "/status" | "/metrics" | "/metrics/prometheus") => {
                HttpResponse::error(405, "Method Not Allowed")
            }
            _ => HttpResponse::error(404, "Not Found"),
        }
    }

    async fn reconcile(&self, target: Target, rig_id: &str) -> HttpResponse {
        let started = Instant::now();
        let result = match target {
            Target::Activate => self.reconciler.activate(rig_id).await,
            Target::Deactivate => self.reconciler.deactivate(rig_id).await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                self.metrics.record_success(elapsed_ms, outcome.action_taken);
                self.prometheus.record_success(elapsed_ms, outcome.action_taken);
                to_json_response::<ActionResult>(&outcome)
            }
            Err(e) => {
                error!(rig_id, "Reconciliation failed: {}", e);
                self.metrics.record_failure(elapsed_ms, e.kind());
                self.prometheus.record_failure(elapsed_ms, e.kind());
                if self.legacy_empty_error_body {
                    HttpResponse::json(200, "{}".to_string())
                } else {
                    error_response(&e)
                }
            }
        }
    }
}

fn parse_rig_path(path: &str) -> Option<(Target, &str)> {
    if let Some(rig_id) = path.strip_prefix("/activate/") {
        Some((Target::Activate, rig_id))
    } else if let Some(rig_id) = path.strip_prefix("/deactivate/") {
        Some((Target::Deactivate, rig_id))
    } else {
        None
    }
}

fn error_response(e: &ApiClientError) -> HttpResponse {
    let status = match e {
        ApiClientError::Encoding(_) | ApiClientError::InvalidRequest(_) => 500,
        _ => 502,
    };
    let mut body = json!({ "error": e.to_string() });
    if let Some(remote) = e.status() {
        body["status"] = json!(remote);
    }
    HttpResponse::json(status, body.to_string())
}

fn to_json_response<T: serde::Serialize>(value: &T) -> HttpResponse {
    match serde_json::to_string(value) {
        Ok(json) => HttpResponse::json(200, json),
        Err(_) => HttpResponse::error(500, "Internal Server Error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{RigAction, RigStatus};
    use serde_json::Value;
    use std::sync::Mutex;

    struct FakeApi {
        status: Result<Value, u16>,
        updates: Mutex<Vec<RigAction>>,
    }

    impl RigApi for FakeApi {
        async fn get_rig_status(&self, rig_id: &str) -> Result<Option<RigStatus>, ApiClientError> {
            match &self.status {
                Ok(v) => Ok(RigStatus::from_json(rig_id, v.clone())),
                Err(code) => Err(ApiClientError::Api {
                    status: *code,
                    reason: "Unauthorized".into(),
                    body: Some(r#"{"error":"bad key"}"#.into()),
                }),
            }
        }

        async fn update_rig_status(&self, _rig_id: &str, action: RigAction) -> Result<Value, ApiClientError> {
            self.updates.lock().unwrap().push(action);
            Ok(json!({"ok": true}))
        }
    }

    fn server(status: Result<Value, u16>) -> RigServer<FakeApi> {
        let api = FakeApi { status, updates: Mutex::new(Vec::new()) };
        let metrics = Arc::new(MetricsCollector::new());
        let health = Arc::new(HealthChecker::new(metrics.clone(), Config::default()));
        RigServer::new(Arc::new(RigStateReconciler::new(api)), health, metrics)
    }

    fn body(resp: &HttpResponse) -> Value {
        serde_json::from_str(&resp.body).unwrap()
    }

    #[tokio::test]
    async fn activate_route_returns_action_result() {
        let s = server(Ok(json!({"minerStatus": "STOPPED"})));
        let resp = s.handle_request("PUT /activate/rig1 HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert_eq!(resp.status, 200);
        assert_eq!(body(&resp)["actionTaken"], "START");
        assert_eq!(body(&resp)["rigId"], "rig1");
        assert_eq!(s.reconciler.api().updates.lock().unwrap().as_slice(), &[RigAction::Start]);
        assert_eq!(s.metrics.get_metrics().starts_issued, 1);
    }

    #[tokio::test]
    async fn deactivate_route_skips_stopped_rig() {
        let s = server(Ok(json!({"minerStatus": "STOPPED"})));
        let resp = s.handle_request("PUT /deactivate/rig1 HTTP/1.1\r\n\r\n").await;
        assert_eq!(resp.status, 200);
        assert_eq!(body(&resp)["actionTaken"], "NONE");
        assert!(s.reconciler.api().updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn errors_surface_as_bad_gateway() {
        let s = server(Err(401));
        let resp = s.handle_request("PUT /activate/rig1 HTTP/1.1\r\n\r\n").await;
        assert_eq!(resp.status, 502);
        let b = body(&resp);
        assert_eq!(b["status"], 401);
        assert!(b["error"].as_str().unwrap().contains("bad key"));
        assert_eq!(s.metrics.get_metrics().api_errors, 1);
    }

    #[tokio::test]
    async fn legacy_mode_swallows_errors() {
        let s = server(Err(401)).legacy_empty_error_body(true);
        let resp = s.handle_request("PUT /deactivate/rig1 HTTP/1.1\r\n\r\n").await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "{}");
        assert_eq!(s.metrics.get_metrics().failed_reconciliations, 1);
    }

    #[tokio::test]
    async fn routing_edge_cases() {
        let s = server(Ok(json!({"minerStatus": "MINING"})));
        assert_eq!(s.handle_request("GET /activate/rig1 HTTP/1.1\r\n\r\n").await.status, 405);
        assert_eq!(s.handle_request("PUT /activate/ HTTP/1.1\r\n\r\n").await.status, 404);
        assert_eq!(s.handle_request("PUT /activate/a/b HTTP/1.1\r\n\r\n").await.status, 404);
        assert_eq!(s.handle_request("GET /nope HTTP/1.1\r\n\r\n").await.status, 404);
        assert_eq!(s.handle_request("POST /health HTTP/1.1\r\n\r\n").await.status, 405);
        assert_eq!(s.handle_request("garbage").await.status, 400);
        assert_eq!(s.handle_request("").await.status, 400);
        assert!(s.reconciler.api().updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn health_and_metrics_endpoints() {
        let s = server(Ok(json!({"minerStatus": "MINING"})));
        s.handle_request("PUT /activate/rig1?trace=1 HTTP/1.1\r\n\r\n").await;

        let health = s.handle_request("GET /health HTTP/1.1\r\n\r\n").await;
        assert_eq!(body(&health)["status"], "healthy");

        let metrics = s.handle_request("GET /metrics HTTP/1.1\r\n\r\n").await;
        assert_eq!(body(&metrics)["metrics"]["noops"], 1);

        let prom = s.handle_request("GET /metrics/prometheus HTTP/1.1\r\n\r\n").await;
        assert_eq!(prom.status, 200);
        assert!(prom.body.contains("rig_switch_noops_total 1"));

        let status = s.handle_request("GET /status HTTP/1.1\r\n\r\n").await;
        assert_eq!(body(&status)["total_reconciliations"], 1);
    }

    #[test]
    fn wire_format() {
        let wire = HttpResponse::json(502, "{}".into()).to_wire();
        assert!(wire.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
        assert!(wire.contains("Content-Length: 2\r\n"));
        assert!(wire.ends_with("\r\n\r\n{}"));
    }
}
