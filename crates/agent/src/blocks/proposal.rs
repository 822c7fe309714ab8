//! `[ROCKMUD_PROPOSAL]` injector.

use regex_lite::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

use super::intent::{IntentMatcher, KeywordIntent};
use super::{
    BlockInjector, InjectionContext, scrape_dollar_amounts, scrape_duration_days, scrape_project_name,
};

pub const PROPOSAL_MARKER: &str = "ROCKMUD_PROPOSAL";
const DEFAULT_CLIENT: &str = "Client";

static PROPOSAL_INTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:proposals?|quote|scope of work|bid (?:letter|document|sheet))\b")
        .expect("invalid proposal intent regex")
});

pub struct ProposalInjector {
    intent: Box<dyn IntentMatcher>,
}

impl ProposalInjector {
    pub fn new() -> Self {
        Self::with_intent(Box::new(KeywordIntent::from_regex(PROPOSAL_INTENT.clone())))
    }

    pub fn with_intent(intent: Box<dyn IntentMatcher>) -> Self {
        Self { intent }
    }
}

impl Default for ProposalInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockInjector for ProposalInjector {
    fn marker(&self) -> &'static str {
        PROPOSAL_MARKER
    }

    fn wants_block(&self, ctx: &InjectionContext) -> bool {
        self.intent.matches(&ctx.last_user_message)
    }

    fn payload(&self, text: &str, ctx: &InjectionContext) -> Value {
        let user = ctx.last_user_message.as_str();
        let estimate = ctx.estimate.as_ref();

        let client = scrape_project_name(user).unwrap_or_else(|| DEFAULT_CLIENT.to_string());
        let scope = estimate
            .and_then(|e| e.scope_line())
            .unwrap_or_else(|| user.trim().to_string());

        // The largest figure quoted by the assistant is usually the total.
        let largest_quoted = |t: &str| scrape_dollar_amounts(t).into_iter().reduce(f64::max);
        let total = scrape_dollar_amounts(user)
            .first()
            .copied()
            .or_else(|| estimate.and_then(|e| e.predicted_cost))
            .or_else(|| largest_quoted(text))
            .or_else(|| ctx.last_assistant().and_then(largest_quoted));

        let duration = scrape_duration_days(user).or_else(|| estimate.and_then(|e| e.duration_days));

        json!({
            "client": client,
            "scope": scope,
            "total": total,
            "duration": duration,
        })
    }
}
