//! Thread-safe tool telemetry recorder.

use crate::model::*;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// How many tool failures the recorder remembers by default.
pub const DEFAULT_RECENT_ERRORS: usize = 25;

const MAX_ERROR_CHARS: usize = 500;

/// Process-wide recorder for chat runs and tool invocations.
///
/// One mutex guards all counters; each record call holds it only for a few
/// map updates, and [`ToolTelemetry::snapshot`] copies state out before
/// computing rates.
pub struct ToolTelemetry {
    started_at: DateTime<Utc>,
    recent_capacity: usize,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    totals: Totals,
    by_provider: BTreeMap<String, u64>,
    by_model: BTreeMap<String, u64>,
    by_tool: BTreeMap<String, ToolStats>,
    recent_errors: VecDeque<RecentError>,
}

impl ToolTelemetry {
    pub fn new() -> Self {
        Self::with_recent_capacity(DEFAULT_RECENT_ERRORS)
    }

    /// Recorder that keeps the last `capacity` tool failures.
    pub fn with_recent_capacity(capacity: usize) -> Self {
        Self {
            started_at: Utc::now(),
            recent_capacity: capacity.max(1),
            state: Mutex::new(State::default()),
        }
    }

    // ── Recording ─────────────────────────────────────────────────────

    pub fn record_chat_run(&self, event: ChatRunEvent) {
        let mut state = self.state.lock().unwrap();
        state.totals.chat_runs += 1;
        if event.tools_enabled {
            state.totals.chat_runs_tools_enabled += 1;
        }
        if event.tool_calls > 0 {
            state.totals.chat_runs_with_tool_calls += 1;
        }
        if event.tool_errors > 0 {
            state.totals.chat_runs_with_tool_errors += 1;
        }
        if event.fallback_without_tools {
            state.totals.chat_runs_fallback_without_tools += 1;
        }
        if !event.provider.is_empty() {
            *state.by_provider.entry(event.provider).or_insert(0) += 1;
        }
        if !event.model.is_empty() {
            *state.by_model.entry(event.model).or_insert(0) += 1;
        }
    }

    pub fn record_tool_invocation(&self, event: ToolInvocationEvent) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;

        state.totals.tool_invocations += 1;
        if event.success {
            state.totals.tool_invocations_success += 1;
        } else {
            state.totals.tool_invocations_error += 1;
        }

        if !event.tool_name.is_empty() {
            let stats = state.by_tool.entry(event.tool_name.clone()).or_default();
            stats.calls += 1;
            if event.success {
                stats.success += 1;
            } else {
                stats.error += 1;
            }
            stats.total_latency_ms += event.latency_ms;
        }

        if !event.success {
            if let Some(error) = event.error {
                state.recent_errors.push_back(RecentError {
                    at: Utc::now(),
                    provider: non_empty(event.provider),
                    model: non_empty(event.model),
                    tool_name: non_empty(event.tool_name),
                    error: error.chars().take(MAX_ERROR_CHARS).collect(),
                });
                while state.recent_errors.len() > self.recent_capacity {
                    state.recent_errors.pop_front();
                }
            }
        }
    }

    // ── Reporting ─────────────────────────────────────────────────────

    /// Current counters with derived rates. Does not mutate state.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let (mut totals, by_provider, by_model, mut by_tool, recent_errors) = {
            let state = self.state.lock().unwrap();
            (
                state.totals.clone(),
                state.by_provider.clone(),
                state.by_model.clone(),
                state.by_tool.clone(),
                state.recent_errors.iter().cloned().collect::<Vec<_>>(),
            )
        };

        totals.tool_success_rate = ratio(totals.tool_invocations_success, totals.tool_invocations, 4);
        for stats in by_tool.values_mut() {
            stats.avg_latency_ms = ratio(stats.total_latency_ms, stats.calls, 1);
            stats.error_rate = ratio(stats.error, stats.calls, 4);
        }

        TelemetrySnapshot {
            started_at: self.started_at,
            generated_at: Utc::now(),
            totals,
            by_provider,
            by_model,
            by_tool,
            recent_errors,
        }
    }
}

impl Default for ToolTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn ratio(numerator: u64, denominator: u64, decimals: i32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let scale = 10f64.powi(decimals);
    ((numerator as f64 / denominator as f64) * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn invocation(tool: &str, success: bool, latency_ms: u64) -> ToolInvocationEvent {
        ToolInvocationEvent {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            tool_name: tool.into(),
            success,
            latency_ms,
            error: (!success).then(|| format!("{tool} failed")),
        }
    }

    #[test]
    fn empty_snapshot_has_zero_rates() {
        let telemetry = ToolTelemetry::new();
        let snap = telemetry.snapshot();
        assert_eq!(snap.totals.chat_runs, 0);
        assert_eq!(snap.totals.tool_success_rate, 0.0);
        assert!(snap.by_tool.is_empty());
        assert!(snap.recent_errors.is_empty());
    }

    #[test]
    fn chat_runs_bump_flags_and_breakdowns() {
        let telemetry = ToolTelemetry::new();
        telemetry.record_chat_run(ChatRunEvent {
            provider: "anthropic".into(),
            model: "claude-sonnet-4-6".into(),
            tools_enabled: true,
            tool_calls: 2,
            tool_errors: 1,
            fallback_without_tools: false,
        });
        telemetry.record_chat_run(ChatRunEvent {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            tools_enabled: true,
            fallback_without_tools: true,
            ..Default::default()
        });

        let snap = telemetry.snapshot();
        assert_eq!(snap.totals.chat_runs, 2);
        assert_eq!(snap.totals.chat_runs_tools_enabled, 2);
        assert_eq!(snap.totals.chat_runs_with_tool_calls, 1);
        assert_eq!(snap.totals.chat_runs_with_tool_errors, 1);
        assert_eq!(snap.totals.chat_runs_fallback_without_tools, 1);
        assert_eq!(snap.by_provider["anthropic"], 1);
        assert_eq!(snap.by_model["gpt-4o-mini"], 1);
    }

    #[test]
    fn tool_rates_are_rounded() {
        let telemetry = ToolTelemetry::new();
        telemetry.record_tool_invocation(invocation("build_schedule", true, 10));
        telemetry.record_tool_invocation(invocation("build_schedule", true, 11));
        telemetry.record_tool_invocation(invocation("build_schedule", false, 12));

        let snap = telemetry.snapshot();
        let stats = &snap.by_tool["build_schedule"];
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.total_latency_ms, 33);
        assert_eq!(stats.avg_latency_ms, 11.0);
        assert_eq!(stats.error_rate, 0.3333);
        assert_eq!(snap.totals.tool_success_rate, 0.6667);
    }

    #[test]
    fn invocations_always_split_into_success_and_error() {
        let telemetry = ToolTelemetry::new();
        for i in 0..8 {
            telemetry.record_tool_invocation(invocation("estimate_project_cost", i % 3 != 0, 5));
        }
        let snap = telemetry.snapshot();
        assert_eq!(snap.totals.tool_invocations, 8);
        assert_eq!(snap.totals.tool_invocations_error, 3);
        assert_eq!(snap.unaccounted_invocations(), 0);
    }

    #[test]
    fn recent_errors_are_bounded_and_truncated() {
        let telemetry = ToolTelemetry::with_recent_capacity(3);
        for i in 0..5 {
            telemetry.record_tool_invocation(ToolInvocationEvent {
                tool_name: format!("tool_{i}"),
                error: Some("x".repeat(900)),
                ..Default::default()
            });
        }
        let snap = telemetry.snapshot();
        assert_eq!(snap.recent_errors.len(), 3);
        assert_eq!(snap.recent_errors[0].tool_name.as_deref(), Some("tool_2"));
        assert_eq!(snap.recent_errors[2].error.len(), 500);
        assert!(snap.recent_errors[0].provider.is_none());
    }

    #[test]
    fn snapshot_is_read_only() {
        let telemetry = ToolTelemetry::new();
        telemetry.record_tool_invocation(invocation("build_schedule", true, 4));
        let first = telemetry.snapshot();
        let second = telemetry.snapshot();
        assert_eq!(first.totals, second.totals);
        assert_eq!(first.by_tool, second.by_tool);
    }

    #[test]
    fn concurrent_recording_keeps_counts() {
        let telemetry = Arc::new(ToolTelemetry::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let telemetry = Arc::clone(&telemetry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        telemetry.record_tool_invocation(invocation("build_schedule", (t + i) % 2 == 0, 1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = telemetry.snapshot();
        assert_eq!(snap.totals.tool_invocations, 200);
        assert_eq!(snap.by_tool["build_schedule"].calls, 200);
        assert_eq!(snap.unaccounted_invocations(), 0);
    }
}
