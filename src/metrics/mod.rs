//! Prometheus metrics for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Gateway metrics collector.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    /// Tool calls dispatched, including unknown tools
    pub tool_calls: AtomicU64,
    /// Calls that produced a success envelope
    pub tool_success: AtomicU64,
    /// Handler failures
    pub tool_failed: AtomicU64,
    /// Calls naming a tool that does not exist
    pub unknown_tool_calls: AtomicU64,
    /// Open SSE sessions
    pub active_sessions: AtomicU64,
}

impl GatewayMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_tool_calls(&self) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_success(&self) {
        self.tool_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.tool_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unknown_tool(&self) {
        self.unknown_tool_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_opened(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        // Saturate at zero
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Get all metrics as a snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_success: self.tool_success.load(Ordering::Relaxed),
            tool_failed: self.tool_failed.load(Ordering::Relaxed),
            unknown_tool_calls: self.unknown_tool_calls.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"# HELP twilio_mcp_tool_calls_total Tool calls dispatched
# TYPE twilio_mcp_tool_calls_total counter
twilio_mcp_tool_calls_total {}

# HELP twilio_mcp_tool_success_total Tool calls that succeeded
# TYPE twilio_mcp_tool_success_total counter
twilio_mcp_tool_success_total {}

# HELP twilio_mcp_tool_failed_total Tool calls whose handler failed
# TYPE twilio_mcp_tool_failed_total counter
twilio_mcp_tool_failed_total {}

# HELP twilio_mcp_unknown_tool_total Calls naming an unknown tool
# TYPE twilio_mcp_unknown_tool_total counter
twilio_mcp_unknown_tool_total {}

# HELP twilio_mcp_active_sessions Open SSE sessions
# TYPE twilio_mcp_active_sessions gauge
twilio_mcp_active_sessions {}
"#,
            s.tool_calls, s.tool_success, s.tool_failed, s.unknown_tool_calls, s.active_sessions
        )
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub tool_calls: u64,
    pub tool_success: u64,
    pub tool_failed: u64,
    pub unknown_tool_calls: u64,
    pub active_sessions: u64,
}

/// Timer for measuring durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
