//! Scripted provider for unit tests.

use async_trait::async_trait;
use openmud_core::error::ProviderError;
use openmud_core::message::ToolCallRequest;
use openmud_core::provider::{Provider, TurnReply, TurnRequest};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned replies in order and records every request it sees.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Result<TurnReply, ProviderError>>>,
    requests: Mutex<Vec<TurnRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<TurnReply>) -> Self {
        Self::from_results(replies.into_iter().map(Ok).collect())
    }

    pub fn from_results(results: Vec<Result<TurnReply, ProviderError>>) -> Self {
        Self {
            name: "scripted".into(),
            script: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<TurnRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_turn(&self, request: TurnRequest) -> Result<TurnReply, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".into())))
    }
}

pub fn text_reply(text: &str) -> TurnReply {
    TurnReply {
        text: text.into(),
        ..Default::default()
    }
}

pub fn tool_reply(calls: Vec<ToolCallRequest>) -> TurnReply {
    TurnReply {
        tool_calls: calls,
        ..Default::default()
    }
}

pub fn call(id: &str, name: &str, args: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, args.as_object().cloned().unwrap_or_default())
}
