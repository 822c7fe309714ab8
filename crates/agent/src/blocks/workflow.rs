//! `[ROCKMUD_WORKFLOW]` injector: the estimate → proposal → schedule checklist.

use openmud_tools::names::{BUILD_SCHEDULE, ESTIMATE_PROJECT, RENDER_PROPOSAL};
use regex_lite::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

use super::intent::IntentMatcher;
use super::{BlockInjector, InjectionContext, scrape_project_name};

pub const WORKFLOW_MARKER: &str = "ROCKMUD_WORKFLOW";

/// (key, tool, label)
const STEPS: [(&str, &str, &str); 3] = [
    ("estimate", ESTIMATE_PROJECT, "Estimate project cost"),
    ("proposal", RENDER_PROPOSAL, "Generate proposal"),
    ("schedule", BUILD_SCHEDULE, "Build schedule"),
];

static EXPLICIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:workflow|bid package|full package|end[- ]to[- ]end)\b").expect("invalid workflow regex")
});

static TOPICS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        r"(?i)\b(?:estimate|cost|price|pricing)\b",
        r"(?i)\b(?:proposals?|quote)\b",
        r"(?i)\b(?:schedule|timeline)\b",
    ]
    .map(|p| Regex::new(p).expect("invalid workflow topic regex"))
});

/// Explicit workflow phrasing, or a request naming at least two of
/// estimate / proposal / schedule.
pub struct WorkflowIntent;

impl IntentMatcher for WorkflowIntent {
    fn matches(&self, message: &str) -> bool {
        EXPLICIT.is_match(message) || TOPICS.iter().filter(|re| re.is_match(message)).count() >= 2
    }
}

pub struct WorkflowInjector {
    intent: Box<dyn IntentMatcher>,
}

impl WorkflowInjector {
    pub fn new() -> Self {
        Self::with_intent(Box::new(WorkflowIntent))
    }

    pub fn with_intent(intent: Box<dyn IntentMatcher>) -> Self {
        Self { intent }
    }
}

impl Default for WorkflowInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockInjector for WorkflowInjector {
    fn marker(&self) -> &'static str {
        WORKFLOW_MARKER
    }

    fn wants_block(&self, ctx: &InjectionContext) -> bool {
        self.intent.matches(&ctx.last_user_message)
    }

    fn payload(&self, _text: &str, ctx: &InjectionContext) -> Value {
        let project = scrape_project_name(&ctx.last_user_message)
            .or_else(|| ctx.estimate.as_ref().and_then(|e| e.project_name.clone()))
            .unwrap_or_else(|| "Project".to_string());

        let steps: Vec<Value> = STEPS
            .iter()
            .enumerate()
            .map(|(i, (key, tool, label))| {
                let status = if ctx.tools_used.contains(*tool) { "done" } else { "pending" };
                json!({
                    "step": i + 1,
                    "key": key,
                    "tool": tool,
                    "label": label,
                    "status": status,
                })
            })
            .collect();

        json!({ "project": project, "steps": steps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{apply_all, default_injectors, extract_block, has_block};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn ctx(user: &str) -> InjectionContext {
        InjectionContext::new(user, true, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap())
    }

    #[test]
    fn intent_needs_two_topics_or_explicit_phrasing() {
        assert!(WorkflowIntent.matches("estimate it and then write a proposal"));
        assert!(WorkflowIntent.matches("put together a bid package"));
        assert!(!WorkflowIntent.matches("just the schedule please"));
    }

    #[test]
    fn step_status_follows_tools_used() {
        let c = ctx("estimate and schedule for Pine Rd gas line")
            .with_tools_used(BTreeSet::from([BUILD_SCHEDULE.to_string()]));
        let block = WorkflowInjector::new().payload("", &c);
        assert_eq!(block["project"], "Pine Rd gas line");
        let statuses: Vec<&str> = block["steps"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["status"].as_str().unwrap())
            .collect();
        assert_eq!(statuses, vec!["pending", "pending", "done"]);
        assert_eq!(block["steps"][1]["tool"], "render_proposal_html");
    }

    #[test]
    fn all_injectors_in_order_and_idempotent() {
        let c = ctx("estimate, proposal and schedule for Main St waterline, 21 days");
        let injectors = default_injectors();
        let once = apply_all(&injectors, "Here is the plan.", &c);

        assert!(has_block(&once, "ROCKMUD_SCHEDULE"));
        assert!(has_block(&once, "ROCKMUD_PROPOSAL"));
        assert!(has_block(&once, "ROCKMUD_WORKFLOW"));
        let schedule_at = once.find("[ROCKMUD_SCHEDULE]").unwrap();
        let proposal_at = once.find("[ROCKMUD_PROPOSAL]").unwrap();
        let workflow_at = once.find("[ROCKMUD_WORKFLOW]").unwrap();
        assert!(schedule_at < proposal_at && proposal_at < workflow_at);
        assert!(extract_block(&once, WORKFLOW_MARKER).is_some());

        assert_eq!(apply_all(&injectors, &once, &c), once);
    }
}
