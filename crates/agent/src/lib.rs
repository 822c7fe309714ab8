//! The chat orchestration layer.
//!
//! A request flows through four steps:
//!
//! 1. **Prepare**: validate the messages, pick the provider, build the system prompt
//! 2. **Loop**: send the conversation; when the model asks for tools, run them
//!    all and send the results back, for at most `max_steps` rounds
//! 3. **Finish**: after the last round, one more call without tools
//! 4. **Inject**: append any structured block the user asked for and the
//!    model left out
//!
//! Telemetry is recorded for every tool call and every chat run.

pub mod blocks;
pub mod loop_runner;
pub mod prompts;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use blocks::{BlockInjector, EstimateContext, InjectionContext, IntentMatcher, KeywordIntent};
pub use loop_runner::{AgentLoop, LoopOutcome};
pub use service::{ChatError, ChatRequest, ChatResponse, ChatService, ChatSettings};
