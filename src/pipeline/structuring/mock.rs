use std::collections::VecDeque;
use std::sync::Mutex;

use super::types::{Conversation, LlmClient};
use super::StructuringError;

/// Marker present only in the participant-identification prompt.
const PARTICIPANTS_MARKER: &str = "Identify the main participants";
/// Marker present only in the message-flow prompt.
const MESSAGE_FLOWS_MARKER: &str = "identify all the message flows";

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// Fails with `StructuringError::Connection`.
    ConnectionError,
    /// Fails with `StructuringError::Api` carrying the status.
    ApiError(u16),
}

impl ScriptedReply {
    fn produce(&self) -> Result<String, StructuringError> {
        match self {
            ScriptedReply::Text(text) => Ok(text.trim().to_string()),
            ScriptedReply::ConnectionError => {
                Err(StructuringError::Connection("scripted://mock".into()))
            }
            ScriptedReply::ApiError(status) => Err(StructuringError::Api {
                status: *status,
                body: "scripted failure".into(),
            }),
        }
    }
}

impl From<&str> for ScriptedReply {
    fn from(text: &str) -> Self {
        ScriptedReply::Text(text.to_string())
    }
}

impl From<String> for ScriptedReply {
    fn from(text: String) -> Self {
        ScriptedReply::Text(text)
    }
}

struct Rule {
    needle: String,
    replies: VecDeque<ScriptedReply>,
}

/// Mock LLM client for testing. Answers by matching the conversation.
///
/// Each rule owns a queue of replies: they are consumed in order and the
/// last one repeats. Rules are tried in registration order; a conversation
/// matching none gets the fallback (an empty completion error by default).
/// Every conversation received is recorded.
pub struct ScriptedLlmClient {
    rules: Mutex<Vec<Rule>>,
    fallback: ScriptedReply,
    calls: Mutex<Vec<Conversation>>,
}

impl Default for ScriptedLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            fallback: ScriptedReply::Text(String::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer any conversation containing `needle` with `replies` in turn.
    pub fn on<R: Into<ScriptedReply>>(self, needle: &str, replies: Vec<R>) -> Self {
        let rule = Rule {
            needle: needle.to_string(),
            replies: replies.into_iter().map(Into::into).collect(),
        };
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(rule);
        }
        self
    }

    pub fn on_participants(self, reply: impl Into<ScriptedReply>) -> Self {
        self.on::<ScriptedReply>(PARTICIPANTS_MARKER, vec![reply.into()])
    }

    /// Process-table stage for one participant (matched on `**name**`).
    pub fn on_participant(self, name: &str, reply: impl Into<ScriptedReply>) -> Self {
        self.on::<ScriptedReply>(&format!("**{name}**"), vec![reply.into()])
    }

    pub fn on_message_flows(self, reply: impl Into<ScriptedReply>) -> Self {
        self.on::<ScriptedReply>(MESSAGE_FLOWS_MARKER, vec![reply.into()])
    }

    pub fn with_fallback(mut self, reply: impl Into<ScriptedReply>) -> Self {
        self.fallback = reply.into();
        self
    }

    /// Conversations received so far, in call order.
    pub fn calls(&self) -> Vec<Conversation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of received conversations containing `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|conv| mentions(conv, needle))
            .count()
    }
}

fn mentions(conversation: &Conversation, needle: &str) -> bool {
    conversation
        .messages
        .iter()
        .any(|m| m.content.contains(needle))
}

impl LlmClient for ScriptedLlmClient {
    fn complete(&self, conversation: &Conversation) -> Result<String, StructuringError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(conversation.clone());
        }

        let reply = {
            let mut rules = self
                .rules
                .lock()
                .map_err(|_| StructuringError::HttpClient("mock state poisoned".into()))?;
            rules
                .iter_mut()
                .find(|rule| mentions(conversation, &rule.needle))
                .and_then(|rule| {
                    if rule.replies.len() > 1 {
                        rule.replies.pop_front()
                    } else {
                        rule.replies.front().cloned()
                    }
                })
        };

        let reply = reply.unwrap_or_else(|| self.fallback.clone());
        match reply.produce()? {
            text if text.is_empty() => Err(StructuringError::EmptyCompletion),
            text => Ok(text),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
