//! Prometheus metrics for intraop.
//!
//! Metrics are recorded through the `metrics` facade and rendered in
//! Prometheus text format, e.g. for `intraop topup run --metrics-out`.
//!
//! ## Metrics
//!
//! ### Counters
//! - `intraop_workflows_executed_total` - Workflow runs by status and plugin
//! - `intraop_nodes_executed_total` - Node executions by node_type and status
//!
//! ### Histograms
//! - `intraop_workflow_duration_seconds` - Workflow run duration
//! - `intraop_node_duration_seconds` - Node execution duration by node_type
//! - `intraop_tool_duration_seconds` - External tool wall time by tool
//!
//! ### Gauges
//! - `intraop_active_runs` - Currently running workflows

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::{Error, Result};

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Safe to call more than once; later calls return the installed handle.
pub fn init_metrics() -> Result<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Internal(format!("Failed to install Prometheus recorder: {}", e)))?;
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns None if metrics have not been initialized.
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Render current metrics in Prometheus text format.
pub fn render_metrics() -> String {
    match get_prometheus_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

// =============================================================================
// Workflow Metrics
// =============================================================================

/// Record a finished workflow run.
pub fn record_workflow_execution(status: &str, plugin: &str) {
    counter!(
        "intraop_workflows_executed_total",
        "status" => status.to_string(),
        "plugin" => plugin.to_string()
    )
    .increment(1);
}

/// Record workflow run duration.
pub fn record_workflow_duration(duration: Duration, workflow_name: &str) {
    histogram!(
        "intraop_workflow_duration_seconds",
        "workflow" => workflow_name.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Increment active runs gauge.
pub fn inc_active_runs() {
    gauge!("intraop_active_runs").increment(1.0);
}

/// Decrement active runs gauge.
pub fn dec_active_runs() {
    gauge!("intraop_active_runs").decrement(1.0);
}

// =============================================================================
// Node Metrics
// =============================================================================

/// Record a node execution.
pub fn record_node_execution(node_type: &str, status: &str) {
    counter!(
        "intraop_nodes_executed_total",
        "node_type" => node_type.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record node execution duration.
pub fn record_node_duration(duration: Duration, node_type: &str) {
    histogram!(
        "intraop_node_duration_seconds",
        "node_type" => node_type.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record how long an external tool process ran.
pub fn record_tool_duration(duration: Duration, tool: &str) {
    histogram!(
        "intraop_tool_duration_seconds",
        "tool" => tool.to_string()
    )
    .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render() {
        // Other tests may already have installed the recorder
        let result = render_metrics();
        assert!(!result.is_empty());
    }

    #[test]
    fn test_init_metrics_is_idempotent() {
        let first = init_metrics();
        let second = init_metrics();
        assert!(first.is_ok());
        assert!(second.is_ok());

        record_node_execution("fsl.topup", "completed");
        assert!(render_metrics().contains("intraop_nodes_executed_total"));
    }
}
