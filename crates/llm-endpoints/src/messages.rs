//! Message types shared by requests and canonical results
//!
//! A [`ChatMessage`] is a role plus ordered content parts, optionally carrying
//! tool calls requested by the model. Streaming deltas and committed
//! assistant messages use the same type.

use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
    /// Tool invocation requests and tool results
    Tool,
}

/// One ordered part of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text content
    Text {
        /// Text content
        text: String,
    },

    /// Image referenced by URL (or a data URL)
    ImageUrl {
        /// Image URL
        url: String,
    },
}

/// Function invoked by a tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name
    pub name: String,

    /// Arguments as a canonical JSON string
    pub arguments: String,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id, unique within the result that carries it
    pub id: String,

    /// Tool type, always "function" today
    #[serde(rename = "type")]
    pub kind: String,

    /// The function to call
    pub function: FunctionCall,
}

impl ToolCall {
    /// Create a function tool call
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Parse the arguments string as JSON
    pub fn arguments_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.function.arguments)
    }
}

/// A message in the conversation, or a delta of one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: Role,

    /// Ordered content parts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ContentPart>,

    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Id of the tool call a tool-role message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Create a message with a single text part
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ContentPart::Text { text: text.into() }],
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a message with no parts
    pub fn empty(role: Role) -> Self {
        Self {
            role,
            parts: Vec::new(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a user message with text
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant message with text
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Create a system message with text
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Create a tool-role message carrying a tool's output
    pub fn tool_result(tool_call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, result)
        }
    }

    /// Create a tool-role message carrying tool calls
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::empty(Role::Tool)
        }
    }

    /// Concatenation of all text parts, if there are any
    pub fn text(&self) -> Option<String> {
        let mut texts = self.parts.iter().filter_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            ContentPart::ImageUrl { .. } => None,
        });
        let first = texts.next()?;
        Some(texts.fold(first.to_string(), |mut acc, t| {
            acc.push_str(t);
            acc
        }))
    }

    /// Check if this message contains any tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        let msg = ChatMessage::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text().as_deref(), Some("Hello"));
    }

    #[test]
    fn test_text_joins_parts_and_skips_images() {
        let msg = ChatMessage {
            role: Role::User,
            parts: vec![
                ContentPart::Text {
                    text: "What's ".to_string(),
                },
                ContentPart::ImageUrl {
                    url: "https://example.com/a.png".to_string(),
                },
                ContentPart::Text {
                    text: "this?".to_string(),
                },
            ],
            tool_calls: None,
            tool_call_id: None,
        };
        assert_eq!(msg.text().as_deref(), Some("What's this?"));
        assert_eq!(ChatMessage::empty(Role::Assistant).text(), None);
    }

    #[test]
    fn test_tool_calls_message() {
        let msg = ChatMessage::tool_calls(vec![ToolCall::function(
            "search_1",
            "search",
            r#"{"query":"rust"}"#,
        )]);
        assert_eq!(msg.role, Role::Tool);
        assert!(msg.has_tool_calls());
        let calls = msg.tool_calls.unwrap();
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].arguments_json().unwrap()["query"], "rust");
    }

    #[test]
    fn test_tool_result() {
        let msg = ChatMessage::tool_result("call_123", "result");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_message_serialization() {
        let msg = ChatMessage::user("Test");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","parts":[{"type":"text","text":"Test"}]}"#);
        let deserialized: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, msg);
    }
}
