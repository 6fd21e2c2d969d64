//! Cohere wire types and conversions
//!
//! Streamed chat uses newline-delimited JSON records discriminated by
//! `event_type`. Non-streaming responses follow the v2 envelopes, with the
//! v1 `text`/`meta` fields accepted as fallbacks.

use crate::stream::ToolCallIds;
use crate::{
    ChatChoice, ChatMessage, ChatRequest, ChatResult, ChatUsage, ContentPart, EmbeddingRequest,
    EmbeddingResult, FinishReason, LLMError, Result, Role, ToolCall, ToolDefinition, Vendor,
    VendorExtensions,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Stream records
// ============================================================================

/// Minimal envelope shared by every stream record
#[derive(Debug, Deserialize)]
pub(crate) struct StreamEnvelope {
    pub event_type: String,
    #[serde(default)]
    pub is_finished: bool,
}

/// Known stream event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StreamEventType {
    StreamStart,
    StreamEnd,
    TextGeneration,
    SearchQueriesGeneration,
    SearchResults,
    CitationGeneration,
    ToolCallsGeneration,
}

impl StreamEventType {
    pub fn parse(discriminator: &str) -> Option<Self> {
        Some(match discriminator {
            "stream-start" => Self::StreamStart,
            "stream-end" => Self::StreamEnd,
            "text-generation" => Self::TextGeneration,
            "search-queries-generation" => Self::SearchQueriesGeneration,
            "search-results" => Self::SearchResults,
            "citation-generation" => Self::CitationGeneration,
            "tool-calls-generation" => Self::ToolCallsGeneration,
            _ => return None,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextGeneration {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamStart {
    pub generation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallsGeneration {
    #[serde(default)]
    pub tool_calls: Vec<StreamToolCall>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchQueriesGeneration {
    #[serde(default)]
    pub search_queries: Vec<CohereSearchQuery>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResultsEvent {
    #[serde(default)]
    pub search_results: Vec<CohereSearchResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CitationGeneration {
    #[serde(default)]
    pub citations: Vec<CohereCitation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamEnd {
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub response: Option<StreamEndResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamEndResponse {
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default, alias = "meta")]
    pub usage: Option<CohereUsage>,
}

// ============================================================================
// Retrieval metadata (surfaced as vendor extensions)
// ============================================================================

/// Search query the model generated for retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohereSearchQuery {
    /// Query text
    pub text: String,
    /// Generation the query belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
}

/// Documents a connector returned for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohereSearchResult {
    /// Query that produced the documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<CohereSearchQuery>,
    /// Ids of returned documents
    #[serde(default)]
    pub document_ids: Vec<String>,
    /// Connector description, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<Value>,
}

/// Span of generated text backed by documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohereCitation {
    /// Start offset in the generated text
    pub start: usize,
    /// End offset in the generated text
    pub end: usize,
    /// Cited text
    pub text: String,
    /// Backing documents (v1)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_ids: Vec<String>,
    /// Backing sources (v2), passed through untouched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Value>,
}

/// Cohere data with no canonical counterpart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohereExtensions {
    /// Generated search queries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_queries: Vec<CohereSearchQuery>,
    /// Retrieved documents
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_results: Vec<CohereSearchResult>,
    /// Citations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<CohereCitation>,
}

impl CohereExtensions {
    /// Whether nothing is carried
    pub fn is_empty(&self) -> bool {
        self.search_queries.is_empty() && self.search_results.is_empty() && self.citations.is_empty()
    }

    /// Wrap in an increment with no choices
    pub(crate) fn into_result(self) -> ChatResult {
        ChatResult {
            vendor_extensions: Some(VendorExtensions::Cohere(self)),
            ..ChatResult::default()
        }
    }
}

// ============================================================================
// Usage & finish reasons
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CohereUsage {
    #[serde(default)]
    pub billed_units: Option<CohereTokens>,
    #[serde(default)]
    pub tokens: Option<CohereTokens>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CohereTokens {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

impl CohereUsage {
    /// Billed units when reported, raw token counts otherwise
    pub fn to_usage(&self) -> Option<ChatUsage> {
        self.billed_units
            .as_ref()
            .or(self.tokens.as_ref())
            .map(|t| ChatUsage::new(t.input_tokens, t.output_tokens))
    }
}

/// Map a Cohere finish reason to the canonical one
pub(crate) fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "COMPLETE" | "STOP_SEQUENCE" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "TOOL_CALL" => FinishReason::ToolCalls,
        "ERROR_TOXIC" => FinishReason::ContentFilter,
        "ERROR" | "ERROR_LIMIT" | "USER_CANCEL" => FinishReason::Error,
        other => {
            tracing::debug!("Unknown Cohere finish reason: {other}");
            FinishReason::Unknown
        }
    }
}

/// Canonical argument string for tool parameters
///
/// Objects are serialized compactly; a string is assumed to already hold
/// JSON; a missing value becomes `{}`.
pub(crate) fn canonical_arguments(parameters: Value) -> String {
    match parameters {
        Value::Null => "{}".to_string(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Deserialize a record, reporting failures as malformed records
pub(crate) fn parse_record<T: DeserializeOwned>(line: &str) -> Result<T> {
    serde_json::from_str(line).map_err(|e| LLMError::MalformedRecord(e.to_string()))
}

// ============================================================================
// Outbound payloads
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct CohereChatRequest {
    pub model: String,
    pub messages: Vec<CohereMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<CohereTool>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CohereMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CohereTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: CohereToolFunction,
}

#[derive(Debug, Serialize)]
pub(crate) struct CohereToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct CohereEmbedRequest<'a> {
    pub model: &'a str,
    pub texts: &'a [String],
    pub input_type: &'a str,
    pub embedding_types: [&'static str; 1],
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn convert_message(message: &ChatMessage) -> CohereMessage {
    // Tool-call requests are replayed as assistant turns
    let role = if message.role == Role::Tool && message.has_tool_calls() {
        "assistant"
    } else {
        role_str(message.role)
    };

    CohereMessage {
        role,
        content: message.text(),
        tool_calls: message.tool_calls.clone(),
        tool_call_id: message.tool_call_id.clone(),
    }
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<CohereTool> {
    tools
        .iter()
        .map(|tool| CohereTool {
            kind: "function",
            function: CohereToolFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        })
        .collect()
}

/// Build the chat payload; the system prompt leads the message list
pub(crate) fn chat_payload(request: &ChatRequest, streaming: bool) -> CohereChatRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(system) = &request.system {
        messages.push(CohereMessage {
            role: "system",
            content: Some(system.clone()),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages.extend(request.messages.iter().map(convert_message));

    CohereChatRequest {
        model: request.model.clone(),
        messages,
        stream: streaming,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        stop_sequences: request.stop_sequences.clone(),
        tools: request.tools.as_deref().map(convert_tools),
    }
}

/// Build the embed payload
pub(crate) fn embed_payload(request: &EmbeddingRequest) -> CohereEmbedRequest<'_> {
    CohereEmbedRequest {
        model: &request.model,
        texts: &request.texts,
        input_type: request.input_type.as_deref().unwrap_or("search_document"),
        embedding_types: ["float"],
    }
}

// ============================================================================
// Non-streaming responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct CohereChatResponse {
    #[serde(default, alias = "generation_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub message: Option<CohereResponseMessage>,
    #[serde(default, alias = "meta")]
    pub usage: Option<CohereUsage>,
    /// v1 responses carry the text at the top level
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CohereResponseMessage {
    #[serde(default)]
    pub content: Vec<CohereContentBlock>,
    #[serde(default)]
    pub tool_calls: Vec<CohereResponseToolCall>,
    #[serde(default)]
    pub citations: Vec<CohereCitation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CohereContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CohereResponseToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub function: CohereResponseFunction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CohereResponseFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl CohereChatResponse {
    pub fn into_result(self) -> ChatResult {
        let mut ids = ToolCallIds::default();
        let mut message = ChatMessage::empty(Role::Assistant);
        let mut extensions = CohereExtensions::default();

        if let Some(body) = self.message {
            message.parts = body
                .content
                .into_iter()
                .filter(|block| block.kind == "text")
                .filter_map(|block| block.text)
                .map(|text| ContentPart::Text { text })
                .collect();

            if !body.tool_calls.is_empty() {
                let calls = body
                    .tool_calls
                    .into_iter()
                    .map(|call| {
                        let id = match call.id {
                            Some(id) if !id.is_empty() => id,
                            _ => ids.mint(&call.function.name),
                        };
                        ToolCall::function(
                            id,
                            call.function.name,
                            canonical_arguments(call.function.arguments),
                        )
                    })
                    .collect();
                message.tool_calls = Some(calls);
            }
            extensions.citations = body.citations;
        } else if let Some(text) = self.text {
            message.parts.push(ContentPart::Text { text });
        }

        ChatResult {
            id: self.id,
            choices: vec![ChatChoice {
                message: Some(message),
                finish_reason: Some(
                    self.finish_reason
                        .as_deref()
                        .map_or(FinishReason::Unknown, map_finish_reason),
                ),
                ..ChatChoice::default()
            }],
            usage: self.usage.as_ref().and_then(CohereUsage::to_usage),
            vendor_extensions: (!extensions.is_empty()).then(|| VendorExtensions::Cohere(extensions)),
            vendor: Some(Vendor::Cohere),
            ..ChatResult::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CohereEmbedResponse {
    #[serde(default)]
    pub id: Option<String>,
    pub embeddings: CohereEmbeddings,
    #[serde(default)]
    pub meta: Option<CohereUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CohereEmbeddings {
    /// v1: a plain list of float vectors
    Plain(Vec<Vec<f32>>),
    /// v2: vectors keyed by embedding type
    Typed {
        #[serde(default)]
        float: Vec<Vec<f32>>,
    },
}

impl CohereEmbedResponse {
    pub fn into_result(self) -> EmbeddingResult {
        let embeddings = match self.embeddings {
            CohereEmbeddings::Plain(v) | CohereEmbeddings::Typed { float: v } => v,
        };
        EmbeddingResult {
            id: self.id,
            embeddings,
            usage: self.meta.as_ref().and_then(CohereUsage::to_usage),
        }
    }
}
