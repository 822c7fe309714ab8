//! `[ROCKMUD_SCHEDULE]` injector.

use openmud_tools::schedule::{MAX_DURATION_DAYS, build_schedule, default_phases};
use regex_lite::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

use super::intent::{IntentMatcher, KeywordIntent};
use super::{BlockInjector, InjectionContext, scrape_duration_days, scrape_list_items, scrape_project_name};

pub const SCHEDULE_MARKER: &str = "ROCKMUD_SCHEDULE";
const DEFAULT_DURATION_DAYS: i64 = 14;
const DEFAULT_PROJECT: &str = "Project";

static SCHEDULE_INTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:schedule|timeline|gantt|look-?ahead|phasing)\b").expect("invalid schedule intent regex")
});

pub struct ScheduleInjector {
    intent: Box<dyn IntentMatcher>,
}

impl ScheduleInjector {
    pub fn new() -> Self {
        Self::with_intent(Box::new(KeywordIntent::from_regex(SCHEDULE_INTENT.clone())))
    }

    pub fn with_intent(intent: Box<dyn IntentMatcher>) -> Self {
        Self { intent }
    }
}

impl Default for ScheduleInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockInjector for ScheduleInjector {
    fn marker(&self) -> &'static str {
        SCHEDULE_MARKER
    }

    fn wants_block(&self, ctx: &InjectionContext) -> bool {
        self.intent.matches(&ctx.last_user_message)
    }

    fn payload(&self, text: &str, ctx: &InjectionContext) -> Value {
        let estimate = ctx.estimate.as_ref();
        let previous = ctx.last_assistant().unwrap_or_default();

        let project = scrape_project_name(&ctx.last_user_message)
            .or_else(|| estimate.and_then(|e| e.project_name.clone()))
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string());

        let duration = scrape_duration_days(&ctx.last_user_message)
            .or_else(|| scrape_duration_days(text))
            .or_else(|| scrape_duration_days(previous))
            .or_else(|| estimate.and_then(|e| e.duration_days))
            .unwrap_or(DEFAULT_DURATION_DAYS)
            .clamp(1, MAX_DURATION_DAYS);

        let phases = [text, previous]
            .into_iter()
            .map(scrape_list_items)
            .find(|items| items.len() >= 2)
            .unwrap_or_else(default_phases);

        let schedule = build_schedule(&project, duration, ctx.today, &phases);
        json!({
            "project": schedule.project_name,
            "duration": schedule.duration,
            "start_date": schedule.start_date,
            "phases": schedule.phases.iter().map(|r| r.phase.clone()).collect::<Vec<_>>(),
            "rows": schedule.phases,
        })
    }
}
