//! Prometheus metrics for tenantfs.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, and records one counter and one histogram
//! sample per filesystem operation. Without an installed recorder the
//! `metrics` macros are no-ops, so library users pay nothing by default.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total filesystem operations (counter). Labels: operation, status.
pub const STORAGE_OPERATIONS_TOTAL: &str = "tenantfs_storage_operations_total";

/// Filesystem operation duration in seconds (histogram). Labels: operation.
pub const STORAGE_OPERATION_DURATION_SECONDS: &str = "tenantfs_storage_operation_duration_seconds";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent.
///
/// Fails if another global recorder is already installed.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(
        STORAGE_OPERATIONS_TOTAL,
        "Total filesystem operations by type and outcome"
    );
    describe_histogram!(
        STORAGE_OPERATION_DURATION_SECONDS,
        "Filesystem operation duration in seconds"
    );
}

/// Record one finished operation that started at `start`.
pub fn record_operation(operation: &'static str, start: Instant, success: bool) {
    let status = if success { "ok" } else { "error" };
    counter!(STORAGE_OPERATIONS_TOTAL, "operation" => operation, "status" => status).increment(1);
    histogram!(STORAGE_OPERATION_DURATION_SECONDS, "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}

/// Render the Prometheus exposition text, if the recorder is installed.
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [STORAGE_OPERATIONS_TOTAL, STORAGE_OPERATION_DURATION_SECONDS] {
            assert!(name.starts_with("tenantfs_"), "{name}");
        }
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        // No recorder may be installed in this test binary; must not panic.
        record_operation("get", Instant::now(), true);
        record_operation("get", Instant::now(), false);
    }

    #[test]
    fn test_render_after_init() {
        let handle = init_metrics().unwrap();
        describe_metrics();
        record_operation("put", Instant::now(), true);

        let text = handle.render();
        assert!(text.contains(STORAGE_OPERATIONS_TOTAL));
        assert!(text.contains("operation=\"put\""));
        assert!(render().is_some());
        // Second call returns the same handle instead of failing.
        assert!(init_metrics().is_ok());
    }
}
