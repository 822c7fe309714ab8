//! Deterministic schedule builder.
//!
//! Splits a duration evenly across phases (the last phase absorbs the
//! remainder) and lays them end to end from a start date.

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate};
use openmud_core::error::ToolError;
use openmud_core::tool::ToolHandler;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::names::BUILD_SCHEDULE;

pub const DEFAULT_PHASES: [&str; 5] = ["Mobilization", "Trenching", "Pipe install", "Backfill", "Restoration"];
const DEFAULT_DURATION_DAYS: i64 = 30;
/// Longest schedule the builder lays out (ten years).
pub const MAX_DURATION_DAYS: i64 = 3650;
const START_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;
const DEFAULT_PROJECT: &str = "Project";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRow {
    pub phase: String,
    /// `MM/DD/YYYY`
    pub start: String,
    /// `MM/DD/YYYY`, inclusive
    pub end: String,
    pub days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub project_name: String,
    /// Sum of phase days. Exceeds the request when there are more phases than days.
    pub duration: i64,
    /// `YYYY-MM-DD`
    pub start_date: String,
    pub phases: Vec<PhaseRow>,
    pub table_html: String,
}

/// Parse a comma-separated phase list. Blank input yields the default phases.
pub fn parse_phases(raw: &str) -> Vec<String> {
    let phases: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if phases.is_empty() { default_phases() } else { phases }
}

pub fn default_phases() -> Vec<String> {
    DEFAULT_PHASES.iter().map(|p| p.to_string()).collect()
}

/// Lay out `phases` over `duration_days` starting at `start`.
///
/// Every phase gets at least one day. The duration is clamped to
/// `1..=MAX_DURATION_DAYS`.
pub fn build_schedule(project_name: &str, duration_days: i64, start: NaiveDate, phases: &[String]) -> Schedule {
    let phases: Vec<String> = if phases.is_empty() { default_phases() } else { phases.to_vec() };
    let count = phases.len() as i64;
    let duration = duration_days.clamp(1, MAX_DURATION_DAYS);
    let per_phase = (duration / count).max(1);

    let mut rows = Vec::with_capacity(phases.len());
    let mut cursor = start;
    for (i, phase) in phases.iter().enumerate() {
        let days = if i as i64 == count - 1 {
            (duration - (count - 1) * per_phase).max(1)
        } else {
            per_phase
        };
        let end = cursor + Duration::days(days - 1);
        rows.push(PhaseRow {
            phase: phase.clone(),
            start: cursor.format("%m/%d/%Y").to_string(),
            end: end.format("%m/%d/%Y").to_string(),
            days,
        });
        cursor = end + Duration::days(1);
    }

    Schedule {
        project_name: project_name.to_string(),
        duration: rows.iter().map(|r| r.days).sum(),
        start_date: start.format("%Y-%m-%d").to_string(),
        table_html: render_table(&rows),
        phases: rows,
    }
}

fn render_table(rows: &[PhaseRow]) -> String {
    const CELL: &str = r#"style="padding:10px;border-bottom:1px solid #ddd;""#;
    let mut html = String::from(
        r#"<table style="width:100%;border-collapse:collapse;"><tr style="background:#f0f0f0;"><th style="padding:10px;text-align:left;">Phase</th><th>Start</th><th>End</th><th>Days</th></tr>"#,
    );
    for r in rows {
        html.push_str(&format!(
            "<tr><td {CELL}>{}</td><td {CELL}>{}</td><td {CELL}>{}</td><td {CELL}>{}</td></tr>",
            crate::html::escape(&r.phase),
            r.start,
            r.end,
            r.days
        ));
    }
    html.push_str("</table>");
    html
}

/// Read a day count given as a number or a numeric string.
///
/// Counts above `MAX_DURATION_DAYS` are rejected; counts below one are
/// raised to one by the builder.
pub(crate) fn read_days(value: Option<&Value>) -> Result<Option<i64>, ToolError> {
    let days = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ToolError::InvalidArguments("duration_days must be a number".into()))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ToolError::InvalidArguments(format!("duration_days '{s}' is not a number")))?,
        Some(other) => {
            return Err(ToolError::InvalidArguments(format!("duration_days has unexpected type: {other}")));
        }
    };
    if !days.is_finite() || days.round() > MAX_DURATION_DAYS as f64 {
        return Err(ToolError::InvalidArguments(format!(
            "duration_days must be at most {MAX_DURATION_DAYS}"
        )));
    }
    Ok(Some(days.round().max(1.0) as i64))
}

/// The `build_schedule` tool.
pub struct ScheduleTool {
    today: fn() -> NaiveDate,
}

impl ScheduleTool {
    pub fn new() -> Self {
        Self {
            today: || Local::now().date_naive(),
        }
    }

    /// Fix "today" (for tests and replays).
    pub fn with_today(today: fn() -> NaiveDate) -> Self {
        Self { today }
    }
}

impl Default for ScheduleTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolHandler for ScheduleTool {
    fn name(&self) -> &str {
        BUILD_SCHEDULE
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let project = args
            .get("project_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_PROJECT);

        let duration = read_days(args.get("duration_days"))?.unwrap_or(DEFAULT_DURATION_DAYS);

        let start = match args.get("start_date").and_then(Value::as_str).map(str::trim) {
            Some(s) if !s.is_empty() => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .filter(|d| START_YEARS.contains(&d.year()))
                .ok_or_else(|| ToolError::InvalidArguments(format!("start_date '{s}' is not a YYYY-MM-DD date")))?,
            _ => (self.today)(),
        };

        let phases = match args.get("phases") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => parse_phases(s),
            _ => Vec::new(),
        };

        let schedule = build_schedule(project, duration, start, &phases);
        serde_json::to_value(schedule).map_err(|e| ToolError::ExecutionFailed {
            tool_name: BUILD_SCHEDULE.into(),
            reason: e.to_string(),
        })
    }
}
