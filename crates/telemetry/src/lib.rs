//! Tool-usage telemetry for openmud.
//!
//! Counts chat runs and tool invocations, keeps per-provider, per-model and
//! per-tool breakdowns, and remembers the most recent tool failures. Everything
//! lives in process memory and resets on restart.

pub mod engine;
pub mod model;

pub use engine::{DEFAULT_RECENT_ERRORS, ToolTelemetry};
pub use model::{
    ChatRunEvent, RecentError, TelemetrySnapshot, ToolInvocationEvent, ToolStats, Totals,
};
