use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, gauge::Gauge, histogram::Histogram},
    registry::Registry,
};

use crate::metrics::{ErrorType, Metrics};
use crate::types::ActionTaken;

pub struct PrometheusMetrics {
    registry: Registry,

    // Counters
    reconciliations: Counter,
    failed_reconciliations: Counter,
    starts_issued: Counter,
    stops_issued: Counter,
    noops: Counter,
    transport_errors: Counter,
    api_errors: Counter,
    decoding_errors: Counter,
    request_errors: Counter,

    // Gauges
    uptime_seconds: Gauge<i64>,
    consecutive_failures: Gauge<i64>,

    reconcile_duration_ms: Histogram,
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reconciliations = Counter::default();
        let failed_reconciliations = Counter::default();
        let starts_issued = Counter::default();
        let stops_issued = Counter::default();
        let noops = Counter::default();
        let transport_errors = Counter::default();
        let api_errors = Counter::default();
        let decoding_errors = Counter::default();
        let request_errors = Counter::default();

        let uptime_seconds = Gauge::default();
        let consecutive_failures = Gauge::default();

        // One read plus at most one write against a remote API
        let reconcile_duration_ms = Histogram::new(
            [25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0].into_iter()
        );

        registry.register(
            "rig_switch_reconciliations",
            "Total number of reconciliations attempted",
            reconciliations.clone(),
        );
        registry.register(
            "rig_switch_failed_reconciliations",
            "Reconciliations that ended in an error",
            failed_reconciliations.clone(),
        );
        registry.register(
            "rig_switch_starts_issued",
            "START actions sent to the remote API",
            starts_issued.clone(),
        );
        registry.register(
            "rig_switch_stops_issued",
            "STOP actions sent to the remote API",
            stops_issued.clone(),
        );
        registry.register(
            "rig_switch_noops",
            "Reconciliations where the rig was already in the target state",
            noops.clone(),
        );
        registry.register(
            "rig_switch_transport_errors",
            "Requests that got no HTTP response",
            transport_errors.clone(),
        );
        registry.register(
            "rig_switch_api_errors",
            "Non-200 responses from the remote API",
            api_errors.clone(),
        );
        registry.register(
            "rig_switch_decoding_errors",
            "200 responses whose body was not JSON",
            decoding_errors.clone(),
        );
        registry.register(
            "rig_switch_request_errors",
            "Requests that could not be built",
            request_errors.clone(),
        );
        registry.register(
            "rig_switch_uptime_seconds",
            "Service uptime in seconds",
            uptime_seconds.clone(),
        );
        registry.register(
            "rig_switch_consecutive_failures",
            "Number of consecutive failed reconciliations",
            consecutive_failures.clone(),
        );
        registry.register(
            "rig_switch_reconcile_duration_ms",
            "Duration of reconciliations in milliseconds",
            reconcile_duration_ms.clone(),
        );

        Self {
            registry,
            reconciliations,
            failed_reconciliations,
            starts_issued,
            stops_issued,
            noops,
            transport_errors,
            api_errors,
            decoding_errors,
            request_errors,
            uptime_seconds,
            consecutive_failures,
            reconcile_duration_ms,
        }
    }

    pub fn update_from_metrics(&self, metrics: &Metrics) {
        self.uptime_seconds.set(metrics.uptime_seconds as i64);
        self.consecutive_failures.set(metrics.consecutive_failures as i64);
    }

    pub fn record_success(&self, duration_ms: u64, action: ActionTaken) {
        self.reconciliations.inc();
        match action {
            ActionTaken::None => self.noops.inc(),
            ActionTaken::Start => self.starts_issued.inc(),
            ActionTaken::Stop => self.stops_issued.inc(),
        };
        self.reconcile_duration_ms.observe(duration_ms as f64);
    }

    pub fn record_failure(&self, duration_ms: u64, error_type: ErrorType) {
        self.reconciliations.inc();
        self.failed_reconciliations.inc();
        match error_type {
            ErrorType::Transport => self.transport_errors.inc(),
            ErrorType::Api => self.api_errors.inc(),
            ErrorType::Decoding => self.decoding_errors.inc(),
            ErrorType::Request => self.request_errors.inc(),
        };
        self.reconcile_duration_ms.observe(duration_ms as f64);
    }

    pub fn export_metrics(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}
