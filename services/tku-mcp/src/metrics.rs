//! Prometheus metrics
//!
//! - `tku_tool_calls_total` (counter): labels `tool`, `outcome`
//! - `tku_tool_call_duration_seconds` (histogram): label `tool`
//! - `tku_auth_attempts_total` (counter): label `outcome`
//!
//! Without an installed recorder every call here is a no-op, so the stdio
//! server records unconditionally and only the status listener installs one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Seconds. A call includes the full login sequence.
const DURATION_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("tku_tool_call_duration_seconds".to_string()),
        DURATION_BUCKETS,
    )
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Process-local counters surfaced on `/health`.
#[derive(Clone)]
pub struct ServiceMetrics {
    pub calls_total: Arc<AtomicU64>,
    pub failures_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            calls_total: Arc::new(AtomicU64::new(0)),
            failures_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls_total.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures_total.load(Ordering::Relaxed)
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Record a finished tool call. `outcome` is `ok` or the failure kind.
pub fn record_tool_call(metrics: &ServiceMetrics, tool: &str, outcome: &str, duration_secs: f64) {
    metrics.calls_total.fetch_add(1, Ordering::Relaxed);
    if outcome != "ok" {
        metrics.failures_total.fetch_add(1, Ordering::Relaxed);
    }
    metrics::counter!("tku_tool_calls_total", "tool" => tool.to_string(), "outcome" => outcome.to_string())
        .increment(1);
    metrics::histogram!("tku_tool_call_duration_seconds", "tool" => tool.to_string())
        .record(duration_secs);
}

pub fn record_auth_attempt(outcome: &str) {
    metrics::counter!("tku_auth_attempts_total", "outcome" => outcome.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        let metrics = ServiceMetrics::new();
        record_tool_call(&metrics, "getToDo", "ok", 0.5);
        record_auth_attempt("established");
        assert_eq!(metrics.calls(), 1);
    }

    /// Isolated recorder; only one global recorder may exist per process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn tool_calls_render_with_labels_and_buckets() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);
        let metrics = ServiceMetrics::new();

        record_tool_call(&metrics, "getToDo", "ok", 1.2);
        record_tool_call(&metrics, "uploadFile", "http", 3.0);

        let output = handle.render();
        assert!(output.contains("tku_tool_calls_total"));
        assert!(output.contains("tool=\"getToDo\""));
        assert!(output.contains("outcome=\"http\""));
        assert!(output.contains("tku_tool_call_duration_seconds_bucket"));
        assert!(output.contains("le=\"15\""));
        assert_eq!(metrics.calls(), 2);
        assert_eq!(metrics.failures(), 1);
    }

    #[test]
    fn auth_attempts_carry_outcome() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_auth_attempt("established");
        record_auth_attempt("network");

        let output = handle.render();
        assert!(output.contains("tku_auth_attempts_total"));
        assert!(output.contains("outcome=\"established\""));
        assert!(output.contains("outcome=\"network\""));
    }
}
