use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::metrics::{HealthStatus, MetricsCollector};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub metrics: crate::metrics::Metrics,
    pub health_status: String,
}

pub struct HealthChecker {
    metrics: Arc<MetricsCollector>,
    config: Config,
    start_time: std::time::Instant,
}

impl HealthChecker {
    pub fn new(metrics: Arc<MetricsCollector>, config: Config) -> Self {
        Self {
            metrics,
            config,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn get_health(&self) -> HealthResponse {
        HealthResponse {
            status: self.metrics.get_health_status().to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn get_metrics(&self) -> MetricsResponse {
        MetricsResponse {
            metrics: self.metrics.get_metrics(),
            health_status: self.metrics.get_health_status().to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.metrics.get_health_status(), HealthStatus::Healthy)
    }

    pub fn get_detailed_status(&self) -> DetailedStatus {
        let metrics = self.metrics.get_metrics();

        DetailedStatus {
            health: self.metrics.get_health_status().to_string(),
            uptime_seconds: metrics.uptime_seconds,
            total_reconciliations: metrics.total_reconciliations,
            failed_reconciliations: metrics.failed_reconciliations,
            success_rate: if metrics.total_reconciliations > 0 {
                metrics.successful_reconciliations as f64 / metrics.total_reconciliations as f64
            } else {
                0.0
            },
            average_time_ms: metrics.average_time_ms,
            consecutive_failures: metrics.consecutive_failures,
            error_counts: ErrorCounts {
                transport_errors: metrics.transport_errors,
                api_errors: metrics.api_errors,
                decoding_errors: metrics.decoding_errors,
                request_errors: metrics.request_errors,
            },
            // Only non-secret settings belong here
            config_summary: ConfigSummary {
                base_url: self.config.base_url.clone(),
                organization_id: self.config.organization_id.clone(),
                verbose: self.config.verbose,
                secret_project_id: self.config.secret_project_id.clone(),
                legacy_empty_error_body: self.config.legacy_empty_error_body,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetailedStatus {
    pub health: String,
    pub uptime_seconds: u64,
    pub total_reconciliations: u64,
    pub failed_reconciliations: u64,
    pub success_rate: f64,
    pub average_time_ms: f64,
    pub consecutive_failures: u32,
    pub error_counts: ErrorCounts,
    pub config_summary: ConfigSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub transport_errors: u64,
    pub api_errors: u64,
    pub decoding_errors: u64,
    pub request_errors: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub base_url: String,
    pub organization_id: Option<String>,
    pub verbose: bool,
    pub secret_project_id: Option<String>,
    pub legacy_empty_error_body: bool,
}
