//! Events fed into the recorder and the snapshot it serves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Events ────────────────────────────────────────────────────────────────

/// One completed (or failed) chat request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRunEvent {
    pub provider: String,
    pub model: String,
    /// Whether the caller asked for tools.
    pub tools_enabled: bool,
    /// Tool calls executed during the run.
    pub tool_calls: usize,
    /// How many of those calls failed.
    pub tool_errors: usize,
    /// Tools were requested but none succeeded.
    pub fallback_without_tools: bool,
}

/// One dispatched tool call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInvocationEvent {
    pub provider: String,
    pub model: String,
    pub tool_name: String,
    pub success: bool,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ── Snapshot ──────────────────────────────────────────────────────────────

/// Monotonic counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub chat_runs: u64,
    pub chat_runs_tools_enabled: u64,
    pub chat_runs_with_tool_calls: u64,
    pub chat_runs_with_tool_errors: u64,
    pub chat_runs_fallback_without_tools: u64,
    pub tool_invocations: u64,
    pub tool_invocations_success: u64,
    pub tool_invocations_error: u64,
    /// Only populated in snapshots.
    #[serde(default)]
    pub tool_success_rate: f64,
}

/// Per-tool counters. Averages are derived at snapshot time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolStats {
    pub calls: u64,
    pub success: u64,
    pub error: u64,
    pub total_latency_ms: u64,
    #[serde(default)]
    pub avg_latency_ms: f64,
    #[serde(default)]
    pub error_rate: f64,
}

/// A recent tool failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentError {
    pub at: DateTime<Utc>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub tool_name: Option<String>,
    pub error: String,
}

/// Point-in-time view served by the metrics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub totals: Totals,
    pub by_provider: BTreeMap<String, u64>,
    pub by_model: BTreeMap<String, u64>,
    pub by_tool: BTreeMap<String, ToolStats>,
    pub recent_errors: Vec<RecentError>,
}

impl TelemetrySnapshot {
    /// Invocations that were neither a success nor an error. Always zero.
    pub fn unaccounted_invocations(&self) -> i64 {
        self.totals.tool_invocations as i64
            - self.totals.tool_invocations_success as i64
            - self.totals.tool_invocations_error as i64
    }
}
