use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::StructuringError;

/// Columns of a per-participant process table, in output order.
pub const PROCESS_COLUMNS: [&str; 7] = [
    "Object Type",
    "Object Name",
    "Predecessor",
    "Successor",
    "Input Data",
    "Output Data",
    "Additional Information",
];

/// Columns of the cross-participant message-flow table, in output order.
pub const MESSAGE_FLOW_COLUMNS: [&str; 5] = [
    "Message Sent",
    "Sending Task",
    "Sending Participant",
    "Receiving Task",
    "Receiving Participant",
];

/// One parsed table row: column name → cell text.
///
/// Keyed by name, so a header that repeats a column keeps the last cell.
pub type Record = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Ordered, role-tagged messages sent as one model request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the last user message, if any.
    pub fn user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Chat model abstraction (allows mocking).
///
/// Implementations return the completion trimmed of surrounding whitespace.
pub trait LlmClient: Send + Sync {
    fn complete(&self, conversation: &Conversation) -> Result<String, StructuringError>;

    /// Name of the model requests are sent to, for logs and reports.
    fn model_name(&self) -> &str;
}

impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    fn complete(&self, conversation: &Conversation) -> Result<String, StructuringError> {
        (**self).complete(conversation)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    fn complete(&self, conversation: &Conversation) -> Result<String, StructuringError> {
        (**self).complete(conversation)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::system("hi")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"hi"}"#);
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn conversation_accessors() {
        let conv = Conversation::new(vec![
            ChatMessage::system("be precise"),
            ChatMessage::user("first"),
            ChatMessage::user("second"),
        ]);
        assert_eq!(conv.system_prompt(), Some("be precise"));
        assert_eq!(conv.user_prompt(), Some("second"));
        assert_eq!(Conversation::default().system_prompt(), None);
    }

    #[test]
    fn schemas_have_expected_width() {
        assert_eq!(PROCESS_COLUMNS.len(), 7);
        assert_eq!(MESSAGE_FLOW_COLUMNS.len(), 5);
        assert_eq!(PROCESS_COLUMNS[0], "Object Type");
        assert_eq!(MESSAGE_FLOW_COLUMNS[4], "Receiving Participant");
    }

    #[test]
    fn trait_is_object_safe() {
        fn _assert_client(_: &dyn LlmClient) {}
    }
}
