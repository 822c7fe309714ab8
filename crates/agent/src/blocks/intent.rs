//! Intent detection for the injectors.

use regex_lite::Regex;

/// Decides whether a user message asks for something.
///
/// The keyword implementation is a heuristic; a classifier can take its place
/// without touching the injectors.
pub trait IntentMatcher: Send + Sync {
    fn matches(&self, message: &str) -> bool;
}

/// Case-insensitive regex match.
#[derive(Debug, Clone)]
pub struct KeywordIntent {
    pattern: Regex,
}

impl KeywordIntent {
    pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("(?i){pattern}"))?,
        })
    }

    pub(crate) fn from_regex(pattern: Regex) -> Self {
        Self { pattern }
    }
}

impl IntentMatcher for KeywordIntent {
    fn matches(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }
}

/// Closures work as matchers too.
impl<F> IntentMatcher for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, message: &str) -> bool {
        self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_intent_ignores_case() {
        let intent = KeywordIntent::new(r"\bschedule\b").unwrap();
        assert!(intent.matches("Build a SCHEDULE please"));
        assert!(!intent.matches("rescheduled"));
    }

    #[test]
    fn bad_pattern_is_an_error() {
        assert!(KeywordIntent::new("(unclosed").is_err());
    }

    #[test]
    fn closure_matcher() {
        let intent = |m: &str| m.len() > 3;
        assert!(intent.matches("long"));
        assert!(!IntentMatcher::matches(&intent, "no"));
    }
}
