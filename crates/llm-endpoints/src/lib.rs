//! Vendor endpoint layer for chat-completion APIs
//!
//! This crate sits between application code and vendor REST surfaces. It
//! includes:
//!
//! - Capability routing with optional caller-supplied URL templates
//! - Outbound request shaping (headers, bearer auth, protocol version)
//! - Non-streaming response dispatch by result kind
//! - Streaming normalization into canonical [`ChatResult`] increments
//! - A thin [`ChatClient`] that drives all of the above over `reqwest`
//! - Concrete vendor implementations (behind feature flags)
//!
//! # Example
//!
//! ```
//! use futures::StreamExt;
//! use llm_endpoints::providers::CohereProvider;
//! use llm_endpoints::{EndpointProvider, StreamContext, StreamKind, lines_from_iter};
//!
//! # tokio_test::block_on(async {
//! let provider = CohereProvider::new("co-...").unwrap();
//! let lines = lines_from_iter(vec![
//!     Ok(r#"{"event_type":"text-generation","text":"Hi","is_finished":false}"#.to_string()),
//!     Ok(r#"{"event_type":"stream-end","is_finished":true,"finish_reason":"COMPLETE"}"#.to_string()),
//! ]);
//!
//! let results: Vec<_> = provider.decode_stream(lines, StreamContext::new()).collect().await;
//! let last = results.last().unwrap().as_ref().unwrap();
//! assert_eq!(last.stream_kind, StreamKind::FinishData);
//! # });
//! ```

pub mod chat;
pub mod client;
pub mod endpoint;
pub mod error;
pub mod inbound;
pub mod messages;
pub mod provider;
pub mod request;
pub mod stream;
pub mod tools;

// Re-export main types
pub use chat::{
    ChatChoice, ChatRequest, ChatRequestBuilder, ChatResult, ChatUsage, EmbeddingRequest,
    FinishReason, StreamKind, VendorExtensions,
};
pub use client::{ChatClient, ClientConfig};
pub use endpoint::{Capability, UrlContext, UrlResolver, format_url_template};
pub use error::{LLMError, Result};
pub use inbound::{
    EmbeddingResult, InboundPayload, InboundResult, ModelInfo, ModelList, ResultKind,
    deserialize_as,
};
pub use messages::{ChatMessage, ContentPart, FunctionCall, Role, ToolCall};
pub use provider::{EndpointProvider, Vendor, VendorRegistry};
pub use request::{
    CredentialSource, EnvCredential, HttpMethod, OutboundRequest, ProtocolVersion,
    SharedCredentials, StaticCredential, USER_AGENT, build_outbound,
};
pub use stream::{
    ChatStream, LineDecoder, LineStream, Step, StreamAccumulator, StreamContext,
    MAX_LINE_BYTES, StreamEventHandler, ToolCallIds, drive, lines_from_iter, lines_from_reader,
    lines_from_reader_with_limit, lines_from_response,
};
pub use tools::ToolDefinition;

// Re-exported so callers can build a `StreamContext` without a direct dependency
pub use tokio_util::sync::CancellationToken;

// Provider implementations (feature-gated)
#[cfg(feature = "cohere")]
pub mod providers;
