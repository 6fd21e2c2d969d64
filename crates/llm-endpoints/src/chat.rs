//! Chat request and canonical result types
//!
//! [`ChatResult`] is the vendor-neutral increment every decoder produces.
//! A streamed completion is a sequence of them: plain deltas first, then an
//! optional [`StreamKind::AppendAssistantMessage`] commit, then exactly one
//! [`StreamKind::FinishData`] marker.

use crate::{ChatMessage, Role, ToolCall, ToolDefinition, Vendor};
use serde::{Deserialize, Serialize};

/// Request for a chat completion with full conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model identifier (vendor-specific)
    pub model: String,

    /// Conversation history
    pub messages: Vec<ChatMessage>,

    /// Optional system prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Tools available for the model to call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    /// Stop sequences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl ChatRequest {
    /// Create a builder for chat requests
    pub fn builder(model: impl Into<String>) -> ChatRequestBuilder {
        ChatRequestBuilder::new(model)
    }
}

/// Builder for ChatRequest
pub struct ChatRequestBuilder {
    model: String,
    messages: Vec<ChatMessage>,
    system: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    tools: Option<Vec<ToolDefinition>>,
    stop_sequences: Option<Vec<String>>,
}

impl ChatRequestBuilder {
    /// Create a new builder
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            system: None,
            max_tokens: None,
            temperature: None,
            tools: None,
            stop_sequences: None,
        }
    }

    /// Set the conversation messages
    pub fn messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Add a single message
    pub fn add_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the maximum tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the available tools
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set stop sequences
    pub fn stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(sequences);
        self
    }

    /// Build the chat request
    pub fn build(self) -> ChatRequest {
        ChatRequest {
            model: self.model,
            messages: self.messages,
            system: self.system,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tools: self.tools,
            stop_sequences: self.stop_sequences,
        }
    }
}

/// Request for text embeddings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Embedding model identifier
    pub model: String,

    /// Texts to embed
    pub texts: Vec<String>,

    /// Vendor hint describing what the texts are used for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
}

impl EmbeddingRequest {
    /// Create an embedding request
    pub fn new(model: impl Into<String>, texts: Vec<String>) -> Self {
        Self {
            model: model.into(),
            texts,
            input_type: None,
        }
    }

    /// Set the vendor input type hint
    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The vendor never reported a reason
    #[default]
    Unknown,

    /// Natural completion or stop sequence
    Stop,

    /// Hit the token limit
    Length,

    /// The model requested tool calls
    ToolCalls,

    /// Output was withheld by a safety filter
    ContentFilter,

    /// The vendor reported a generation error
    Error,
}

/// Stream-control marker on a [`ChatResult`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// A regular increment
    #[default]
    None,

    /// Commit the accumulated plaintext as the assistant's message
    AppendAssistantMessage,

    /// The turn is over; carries the finish reason and usage
    FinishData,
}

/// Token accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens generated
    pub completion_tokens: u32,

    /// Prompt plus completion
    pub total_tokens: u32,
}

impl ChatUsage {
    /// Create usage from prompt and completion counts
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// One candidate slice of a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Choice index
    #[serde(default)]
    pub index: u32,

    /// Incremental message content (streaming)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<ChatMessage>,

    /// Complete message (non-streaming)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,

    /// Why generation stopped, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl ChatChoice {
    /// A choice carrying a delta
    pub fn delta(message: ChatMessage) -> Self {
        Self {
            delta: Some(message),
            ..Self::default()
        }
    }

    /// A choice carrying only a finish reason
    pub fn finished(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Self::default()
        }
    }
}

/// Vendor data with no canonical home, surfaced on request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vendor", rename_all = "snake_case")]
pub enum VendorExtensions {
    /// Cohere retrieval-augmented generation metadata
    #[cfg(feature = "cohere")]
    Cohere(crate::providers::cohere::CohereExtensions),
}

/// One increment of an in-progress or completed chat completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    /// Vendor correlation id, once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Ordered choices
    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    /// Token usage, only on terminal increments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,

    /// Stream-control marker
    #[serde(default)]
    pub stream_kind: StreamKind,

    /// Vendor-specific extra data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_extensions: Option<VendorExtensions>,

    /// Vendor that produced this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<Vendor>,
}

impl ChatResult {
    /// An assistant text delta
    pub fn text_delta(text: impl Into<String>) -> Self {
        Self {
            choices: vec![ChatChoice::delta(ChatMessage::assistant(text))],
            ..Self::default()
        }
    }

    /// A single tool-role choice holding all calls
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            choices: vec![ChatChoice::delta(ChatMessage::tool_calls(calls))],
            ..Self::default()
        }
    }

    /// Commit of the accumulated assistant text
    pub fn append_assistant_message(text: impl Into<String>, usage: Option<ChatUsage>) -> Self {
        Self {
            choices: vec![ChatChoice::delta(ChatMessage::assistant(text))],
            usage,
            stream_kind: StreamKind::AppendAssistantMessage,
            ..Self::default()
        }
    }

    /// The terminal marker
    pub fn finish_data(reason: FinishReason, usage: Option<ChatUsage>) -> Self {
        Self {
            choices: vec![ChatChoice::finished(reason)],
            usage,
            stream_kind: StreamKind::FinishData,
            ..Self::default()
        }
    }

    /// Set the correlation id
    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    /// Set the producing vendor
    pub fn with_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = Some(vendor);
        self
    }

    /// Text of the first choice (delta or full message)
    pub fn text(&self) -> Option<String> {
        let choice = self.choices.first()?;
        choice
            .delta
            .as_ref()
            .or(choice.message.as_ref())
            .and_then(ChatMessage::text)
    }

    /// All tool calls across choices
    pub fn all_tool_calls(&self) -> Vec<&ToolCall> {
        self.choices
            .iter()
            .flat_map(|c| c.delta.iter().chain(c.message.iter()))
            .filter_map(|m| m.tool_calls.as_ref())
            .flatten()
            .collect()
    }

    /// Finish reason of the first choice
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().and_then(|c| c.finish_reason)
    }

    /// Whether this is the terminal marker
    pub fn is_finish(&self) -> bool {
        self.stream_kind == StreamKind::FinishData
    }

    /// Role of the first choice's delta
    pub fn delta_role(&self) -> Option<Role> {
        self.choices
            .first()
            .and_then(|c| c.delta.as_ref())
            .map(|m| m.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let request = ChatRequest::builder("command-r-plus")
            .add_message(ChatMessage::user("Hello"))
            .system("You are a helpful assistant")
            .max_tokens(2048)
            .temperature(0.7)
            .build();

        assert_eq!(request.model, "command-r-plus");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, Some(2048));
        assert_eq!(request.temperature, Some(0.7));
    }

    #[test]
    fn test_usage_totals() {
        let usage = ChatUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_finish_data_marker() {
        let result = ChatResult::finish_data(FinishReason::Unknown, None);
        assert!(result.is_finish());
        assert_eq!(result.finish_reason(), Some(FinishReason::Unknown));
        assert_eq!(result.text(), None);
    }

    #[test]
    fn test_append_assistant_message_carries_text_and_usage() {
        let usage = ChatUsage::new(3, 4);
        let result = ChatResult::append_assistant_message("Hello", Some(usage));
        assert_eq!(result.stream_kind, StreamKind::AppendAssistantMessage);
        assert_eq!(result.text().as_deref(), Some("Hello"));
        assert_eq!(result.usage, Some(usage));
        assert_eq!(result.delta_role(), Some(Role::Assistant));
    }

    #[test]
    fn test_result_serializes_snake_case_marker() {
        let result = ChatResult::text_delta("hi").with_id(Some("g1".to_string()));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["id"], "g1");
        assert_eq!(json["stream_kind"], "none");
        assert!(json.get("usage").is_none());
    }
}
