//! Structured-block injectors.
//!
//! The front end renders schedules, proposals and workflows from
//! marker-delimited JSON blocks in the assistant's reply, e.g.
//! `[ROCKMUD_SCHEDULE]{...}[/ROCKMUD_SCHEDULE]`. Models forget to emit them.
//! After the loop finishes, each injector checks whether the user asked for its
//! block and, if the reply lacks it, appends one built deterministically from
//! the conversation.
//!
//! An injector only fires when:
//! 1. tools were enabled for the request,
//! 2. its [`IntentMatcher`] matches the last user message,
//! 3. the reply does not already contain its marker.

pub mod intent;
pub mod proposal;
pub mod schedule;
pub mod workflow;

pub use intent::{IntentMatcher, KeywordIntent};
pub use proposal::ProposalInjector;
pub use schedule::ScheduleInjector;
pub use workflow::WorkflowInjector;

use chrono::NaiveDate;
use openmud_core::message::{Message, last_assistant_text};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Inputs and results of the last quick estimate the client ran, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateContext {
    pub project_name: Option<String>,
    /// `waterline`, `sewer`, `storm_drain`, `gas`, `electrical`
    pub project_type: Option<String>,
    pub linear_feet: Option<f64>,
    /// Inches
    pub pipe_diameter: Option<f64>,
    pub soil_type: Option<String>,
    /// Feet
    pub trench_depth: Option<f64>,
    pub predicted_cost: Option<f64>,
    pub duration_days: Option<i64>,
}

impl EstimateContext {
    /// `"<lf> LF of <dia>\" <type>, <soil> soil, <depth> ft depth"`, when the
    /// footage is known.
    pub fn scope_line(&self) -> Option<String> {
        let lf = self.linear_feet?;
        let kind = match self.project_type.as_deref() {
            Some("storm_drain") => "storm drain".to_string(),
            Some(other) if !other.is_empty() => other.to_string(),
            _ => "pipe".to_string(),
        };
        let diameter = self.pipe_diameter.map(format_number).unwrap_or_else(|| "?".into());
        let soil = self.soil_type.as_deref().unwrap_or("unknown");
        let depth = self.trench_depth.map(format_number).unwrap_or_else(|| "?".into());
        Some(format!(
            "{} LF of {diameter}\" {kind}, {soil} soil, {depth} ft depth",
            format_number(lf)
        ))
    }
}

/// Everything an injector may look at.
#[derive(Debug, Clone)]
pub struct InjectionContext {
    pub last_user_message: String,
    pub tools_enabled: bool,
    /// The conversation as the client sent it
    pub history: Vec<Message>,
    pub estimate: Option<EstimateContext>,
    /// Tools that succeeded during this request
    pub tools_used: BTreeSet<String>,
    /// Start date for synthesized schedules
    pub today: NaiveDate,
}

impl InjectionContext {
    pub fn new(last_user_message: impl Into<String>, tools_enabled: bool, today: NaiveDate) -> Self {
        Self {
            last_user_message: last_user_message.into(),
            tools_enabled,
            history: Vec::new(),
            estimate: None,
            tools_used: BTreeSet::new(),
            today,
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn with_estimate(mut self, estimate: Option<EstimateContext>) -> Self {
        self.estimate = estimate;
        self
    }

    pub fn with_tools_used(mut self, tools_used: BTreeSet<String>) -> Self {
        self.tools_used = tools_used;
        self
    }

    /// Text of the latest assistant turn in the client history.
    pub fn last_assistant(&self) -> Option<&str> {
        last_assistant_text(&self.history)
    }
}

/// A post-processor that guarantees one structured block is present.
pub trait BlockInjector: Send + Sync {
    /// Marker name without brackets, e.g. `ROCKMUD_SCHEDULE`.
    fn marker(&self) -> &'static str;

    /// Whether the request asked for this block.
    fn wants_block(&self, ctx: &InjectionContext) -> bool;

    /// Build the JSON payload for the block.
    fn payload(&self, text: &str, ctx: &InjectionContext) -> Value;

    /// Return `text`, with the block appended if it was wanted and missing.
    fn apply(&self, text: &str, ctx: &InjectionContext) -> String {
        if !ctx.tools_enabled || has_block(text, self.marker()) || !self.wants_block(ctx) {
            return text.to_string();
        }
        tracing::debug!(marker = self.marker(), "Injecting missing block");
        let block = render_block(self.marker(), &self.payload(text, ctx));
        let body = text.trim_end();
        if body.is_empty() {
            block
        } else {
            format!("{body}\n\n{block}")
        }
    }
}

/// The injectors in the order they run.
pub fn default_injectors() -> Vec<Box<dyn BlockInjector>> {
    vec![
        Box::new(ScheduleInjector::new()),
        Box::new(ProposalInjector::new()),
        Box::new(WorkflowInjector::new()),
    ]
}

/// Run every injector over `text` in order.
pub fn apply_all(injectors: &[Box<dyn BlockInjector>], text: &str, ctx: &InjectionContext) -> String {
    injectors
        .iter()
        .fold(text.to_string(), |acc, injector| injector.apply(&acc, ctx))
}

/// Whether `text` already opens a `[marker]` block.
pub fn has_block(text: &str, marker: &str) -> bool {
    text.contains(&format!("[{marker}]"))
}

pub fn render_block(marker: &str, payload: &Value) -> String {
    format!("[{marker}]{payload}[/{marker}]")
}

/// The JSON payload of the first `[marker]` block in `text`.
pub fn extract_block(text: &str, marker: &str) -> Option<Value> {
    let open = format!("[{marker}]");
    let close = format!("[/{marker}]");
    let start = text.find(&open)? + open.len();
    let end = start + text[start..].find(&close)?;
    serde_json::from_str(text[start..end].trim()).ok()
}

// ── Scrapers ──────────────────────────────────────────────────────────────

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,4})\s*-?\s*(days?|weeks?|wks?)\b").expect("invalid duration regex")
});

static PROJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfor\s+(?:the\s+|a\s+|an\s+)?([^,.;:!?\n]+)").expect("invalid project regex")
});

static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d{1,2}[.)]|[-*•])\s+(.+?)\s*$").expect("invalid list item regex")
});

static DOLLAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?(\d[\d,]*(?:\.\d+)?)\s*([kKmM])?\b").expect("invalid dollar regex")
});

/// First "N days" / "N weeks" mention, in days.
pub fn scrape_duration_days(text: &str) -> Option<i64> {
    let caps = DURATION_RE.captures(text)?;
    let n: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let days = if unit.starts_with('w') { n.checked_mul(7)? } else { n };
    (days > 0).then_some(days)
}

/// The name after "for", e.g. "schedule for Main St waterline, 21 days".
pub fn scrape_project_name(text: &str) -> Option<String> {
    let caps = PROJECT_RE.captures(text)?;
    let name = caps.get(1)?.as_str().trim();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) || name.len() > 80 {
        return None;
    }
    let lowered = name.to_ascii_lowercase();
    if ["me", "us", "this", "that", "it"].contains(&lowered.as_str()) {
        return None;
    }
    Some(name.to_string())
}

/// Numbered or bulleted lines, cut at the first dash, colon or parenthesis.
pub fn scrape_list_items(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| LIST_ITEM_RE.captures(line))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .map(|item| {
            let item = item.replace("**", "");
            let cut = item
                .find([':', '('])
                .into_iter()
                .chain(item.find(" - "))
                .chain(item.find(" – "))
                .min()
                .unwrap_or(item.len());
            item[..cut].trim().to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

/// Every `$` amount in `text`, with `k`/`M` suffixes expanded.
pub fn scrape_dollar_amounts(text: &str) -> Vec<f64> {
    DOLLAR_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let base: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
            let scale = match caps.get(2).map(|m| m.as_str()) {
                Some("k" | "K") => 1_000.0,
                Some("m" | "M") => 1_000_000.0,
                _ => 1.0,
            };
            Some(base * scale)
        })
        .collect()
}

/// `500.0` → `"500"`, `8.5` → `"8.5"`.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
