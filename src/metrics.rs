use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::types::ActionTaken;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    // Reconciliation outcomes
    pub total_reconciliations: u64,
    pub successful_reconciliations: u64,
    pub failed_reconciliations: u64,
    pub starts_issued: u64,
    pub stops_issued: u64,
    pub noops: u64,

    // Timing
    pub average_time_ms: f64,
    pub min_time_ms: u64,
    pub max_time_ms: u64,

    // Error metrics
    pub transport_errors: u64,
    pub api_errors: u64,
    pub decoding_errors: u64,
    pub request_errors: u64,

    // Health metrics
    pub uptime_seconds: u64,
    pub last_successful_reconciliation: Option<u64>,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
pub struct MetricsCollector {
    total_reconciliations: AtomicU64,
    successful_reconciliations: AtomicU64,
    failed_reconciliations: AtomicU64,
    starts_issued: AtomicU64,
    stops_issued: AtomicU64,
    noops: AtomicU64,
    transport_errors: AtomicU64,
    api_errors: AtomicU64,
    decoding_errors: AtomicU64,
    request_errors: AtomicU64,
    consecutive_failures: AtomicU32,

    start_time: Instant,
    last_success_time: Arc<Mutex<Option<Instant>>>,

    total_time_ms: AtomicU64,
    min_time_ms: AtomicU64,
    max_time_ms: AtomicU64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            total_reconciliations: AtomicU64::new(0),
            successful_reconciliations: AtomicU64::new(0),
            failed_reconciliations: AtomicU64::new(0),
            starts_issued: AtomicU64::new(0),
            stops_issued: AtomicU64::new(0),
            noops: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            api_errors: AtomicU64::new(0),
            decoding_errors: AtomicU64::new(0),
            request_errors: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
            start_time: Instant::now(),
            last_success_time: Arc::new(Mutex::new(None)),
            total_time_ms: AtomicU64::new(0),
            min_time_ms: AtomicU64::new(u64::MAX),
            max_time_ms: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self, time_ms: u64, action: ActionTaken) {
        self.total_reconciliations.fetch_add(1, Ordering::Relaxed);
        self.successful_reconciliations.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);

        match action {
            ActionTaken::None => self.noops.fetch_add(1, Ordering::Relaxed),
            ActionTaken::Start => self.starts_issued.fetch_add(1, Ordering::Relaxed),
            ActionTaken::Stop => self.stops_issued.fetch_add(1, Ordering::Relaxed),
        };

        if let Ok(mut last_success) = self.last_success_time.lock() {
            *last_success = Some(Instant::now());
        }

        self.record_time(time_ms);
    }

    pub fn record_failure(&self, time_ms: u64, error_type: ErrorType) {
        self.total_reconciliations.fetch_add(1, Ordering::Relaxed);
        self.failed_reconciliations.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        self.record_error(error_type);
        self.record_time(time_ms);
    }

    pub fn record_error(&self, error_type: ErrorType) {
        match error_type {
            ErrorType::Transport => self.transport_errors.fetch_add(1, Ordering::Relaxed),
            ErrorType::Api => self.api_errors.fetch_add(1, Ordering::Relaxed),
            ErrorType::Decoding => self.decoding_errors.fetch_add(1, Ordering::Relaxed),
            ErrorType::Request => self.request_errors.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn record_time(&self, time_ms: u64) {
        self.total_time_ms.fetch_add(time_ms, Ordering::Relaxed);

        let mut current_min = self.min_time_ms.load(Ordering::Relaxed);
        while time_ms < current_min {
            match self.min_time_ms.compare_exchange_weak(
                current_min, time_ms, Ordering::Relaxed, Ordering::Relaxed
            ) {
                Ok(_) => break,
                Err(new_min) => current_min = new_min,
            }
        }

        let mut current_max = self.max_time_ms.load(Ordering::Relaxed);
        while time_ms > current_max {
            match self.max_time_ms.compare_exchange_weak(
                current_max, time_ms, Ordering::Relaxed, Ordering::Relaxed
            ) {
                Ok(_) => break,
                Err(new_max) => current_max = new_max,
            }
        }
    }

    pub fn get_metrics(&self) -> Metrics {
        let total_reconciliations = self.total_reconciliations.load(Ordering::Relaxed);
        let total_time_ms = self.total_time_ms.load(Ordering::Relaxed);
        let min_time_ms = self.min_time_ms.load(Ordering::Relaxed);

        let average_time_ms = if total_reconciliations > 0 {
            total_time_ms as f64 / total_reconciliations as f64
        } else {
            0.0
        };

        let last_successful_reconciliation = if let Ok(last_success) = self.last_success_time.lock() {
            last_success.map(|time| time.duration_since(self.start_time).as_secs())
        } else {
            None
        };

        Metrics {
            total_reconciliations,
            successful_reconciliations: self.successful_reconciliations.load(Ordering::Relaxed),
            failed_reconciliations: self.failed_reconciliations.load(Ordering::Relaxed),
            starts_issued: self.starts_issued.load(Ordering::Relaxed),
            stops_issued: self.stops_issued.load(Ordering::Relaxed),
            noops: self.noops.load(Ordering::Relaxed),
            average_time_ms,
            min_time_ms: if min_time_ms == u64::MAX { 0 } else { min_time_ms },
            max_time_ms: self.max_time_ms.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            api_errors: self.api_errors.load(Ordering::Relaxed),
            decoding_errors: self.decoding_errors.load(Ordering::Relaxed),
            request_errors: self.request_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            last_successful_reconciliation,
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
        }
    }

    pub fn get_health_status(&self) -> HealthStatus {
        let consecutive_failures = self.consecutive_failures.load(Ordering::Relaxed);
        let total = self.total_reconciliations.load(Ordering::Relaxed);
        let failed = self.failed_reconciliations.load(Ordering::Relaxed);

        let failure_rate = if total > 0 {
            failed as f64 / total as f64
        } else {
            0.0
        };

        if consecutive_failures >= 10 {
            HealthStatus::Critical
        } else if consecutive_failures >= 5 || failure_rate > 0.5 {
            HealthStatus::Unhealthy
        } else if consecutive_failures >= 2 || failure_rate > 0.2 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Transport,
    Api,
    Decoding,
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
            HealthStatus::Critical => write!(f, "critical"),
        }
    }
}
