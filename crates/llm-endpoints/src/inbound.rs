//! Non-streaming response dispatch
//!
//! Each provider maps a [`ResultKind`] to a deserializer that knows its
//! vendor envelope. Asking for a kind the vendor does not serve yields
//! `Ok(None)` rather than an error, so callers can probe cheaply.

use crate::{ChatResult, ChatUsage, EndpointProvider, Result};
use serde::{Deserialize, Serialize};

/// Result shapes a non-streaming response can be decoded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    /// Chat completion
    Chat,
    /// Embeddings
    Embeddings,
    /// Model listing
    Models,
    /// Legacy text completion
    Completions,
    /// Generated images
    Images,
}

/// A decoded non-streaming response
#[derive(Debug, Clone, PartialEq)]
pub enum InboundResult {
    /// Chat completion
    Chat(ChatResult),
    /// Embeddings
    Embeddings(EmbeddingResult),
    /// Model listing
    Models(ModelList),
}

impl InboundResult {
    /// Kind of this result
    pub fn kind(&self) -> ResultKind {
        match self {
            InboundResult::Chat(_) => ResultKind::Chat,
            InboundResult::Embeddings(_) => ResultKind::Embeddings,
            InboundResult::Models(_) => ResultKind::Models,
        }
    }
}

/// Embedding vectors, one per input text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    /// Vendor request id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Vectors in input order
    pub embeddings: Vec<Vec<f32>>,

    /// Token usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChatUsage>,
}

/// A model advertised by a vendor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name used in requests
    pub name: String,

    /// Endpoints the model can be used with
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Context window, when advertised
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u32>,
}

/// A page of models
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    /// Models on this page
    pub models: Vec<ModelInfo>,

    /// Token for the next page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Typed access to [`InboundResult`] variants
pub trait InboundPayload: Sized {
    /// Kind requested from the provider
    const KIND: ResultKind;

    /// Extract this type from a decoded result
    fn from_inbound(result: InboundResult) -> Option<Self>;
}

impl InboundPayload for ChatResult {
    const KIND: ResultKind = ResultKind::Chat;

    fn from_inbound(result: InboundResult) -> Option<Self> {
        match result {
            InboundResult::Chat(r) => Some(r),
            _ => None,
        }
    }
}

impl InboundPayload for EmbeddingResult {
    const KIND: ResultKind = ResultKind::Embeddings;

    fn from_inbound(result: InboundResult) -> Option<Self> {
        match result {
            InboundResult::Embeddings(r) => Some(r),
            _ => None,
        }
    }
}

impl InboundPayload for ModelList {
    const KIND: ResultKind = ResultKind::Models;

    fn from_inbound(result: InboundResult) -> Option<Self> {
        match result {
            InboundResult::Models(r) => Some(r),
            _ => None,
        }
    }
}

/// Decode a non-streaming body straight into `T`
///
/// # Example
///
/// ```
/// use llm_endpoints::providers::CohereProvider;
/// use llm_endpoints::{deserialize_as, ModelList};
///
/// let provider = CohereProvider::new("key").unwrap();
/// let models: Option<ModelList> =
///     deserialize_as(&provider, r#"{"models":[{"name":"command-r"}]}"#, None).unwrap();
/// assert_eq!(models.unwrap().models[0].name, "command-r");
/// ```
pub fn deserialize_as<T: InboundPayload>(
    provider: &dyn EndpointProvider,
    raw_json: &str,
    raw_request: Option<&str>,
) -> Result<Option<T>> {
    Ok(provider
        .deserialize(T::KIND, raw_json, raw_request)?
        .and_then(T::from_inbound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_result() {
        let r = InboundResult::Models(ModelList::default());
        assert_eq!(r.kind(), ResultKind::Models);
    }

    #[test]
    fn test_from_inbound_rejects_other_variants() {
        let r = InboundResult::Models(ModelList::default());
        assert!(EmbeddingResult::from_inbound(r.clone()).is_none());
        assert!(ModelList::from_inbound(r).is_some());
    }

    #[test]
    fn test_model_info_defaults() {
        let info: ModelInfo = serde_json::from_str(r#"{"name":"embed-v4"}"#).unwrap();
        assert!(info.endpoints.is_empty());
        assert_eq!(info.context_length, None);
    }
}
