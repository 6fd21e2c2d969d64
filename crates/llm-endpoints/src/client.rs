//! HTTP client driving an [`EndpointProvider`]
//!
//! Each call asks the provider for the vendor body, the URL and the request
//! headers, sends it with `reqwest`, maps error statuses and hands the body
//! back to the provider for decoding. There are no retries.

use crate::{
    Capability, ChatRequest, ChatResult, ChatStream, EmbeddingRequest, EmbeddingResult,
    EndpointProvider, HttpMethod, InboundPayload, LLMError, ModelList, OutboundRequest, Result,
    StreamContext, deserialize_as, lines_from_response,
};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Transport settings for [`ChatClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Whole-request timeout in seconds, including streamed bodies (default: 120)
    pub timeout_secs: u64,

    /// Connection timeout in seconds (default: 10)
    pub connect_timeout_secs: u64,
}

impl ClientConfig {
    /// Set the request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the connection timeout in seconds
    pub fn with_connect_timeout(mut self, connect_timeout_secs: u64) -> Self {
        self.connect_timeout_secs = connect_timeout_secs;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Chat client bound to one vendor adapter
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use llm_endpoints::providers::CohereProvider;
/// use llm_endpoints::{ChatClient, ChatMessage, ChatRequest, ClientConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = CohereProvider::from_env()?;
///     let client = ChatClient::new(Arc::new(provider), ClientConfig::default())?;
///
///     let request = ChatRequest::builder("command-r-plus")
///         .add_message(ChatMessage::user("Hello!"))
///         .max_tokens(100)
///         .build();
///
///     let result = client.chat(request).await?;
///     println!("{}", result.text().unwrap_or_default());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    provider: Arc<dyn EndpointProvider>,
}

impl ChatClient {
    /// Create a client with its own connection pool
    pub fn new(provider: Arc<dyn EndpointProvider>, config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self::with_http_client(provider, http))
    }

    /// Create a client sharing an existing `reqwest` client
    pub fn with_http_client(provider: Arc<dyn EndpointProvider>, http: Client) -> Self {
        Self { http, provider }
    }

    /// Create a Cohere client using the provider's own timeout
    #[cfg(feature = "cohere")]
    pub fn cohere(provider: crate::providers::CohereProvider) -> Result<Self> {
        let config = ClientConfig::default().with_timeout(provider.config().timeout_secs);
        Self::new(Arc::new(provider), config)
    }

    /// Adapter this client drives
    pub fn provider(&self) -> &Arc<dyn EndpointProvider> {
        &self.provider
    }

    /// Send a chat request and decode the complete response
    #[instrument(skip(self, request), fields(vendor = %self.provider.vendor(), model = %request.model))]
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResult> {
        let body = self.provider.chat_payload(&request, false)?;
        let url = self
            .provider
            .resolve_url(Capability::Chat, None, Some(&request.model))?;
        let outbound = self.provider.build_request(url, HttpMethod::Post, Some(body), false);

        let result: ChatResult = self.send_and_decode(outbound, &request.model).await?;
        debug!(
            finish_reason = ?result.finish_reason(),
            usage = ?result.usage,
            "Received chat response"
        );
        Ok(result)
    }

    /// Send a streaming chat request
    ///
    /// Status errors are reported here; everything after the headers arrive
    /// is reported through the returned stream.
    #[instrument(skip(self, request, ctx), fields(vendor = %self.provider.vendor(), model = %request.model))]
    pub async fn stream_chat(&self, request: ChatRequest, ctx: StreamContext) -> Result<ChatStream> {
        let body = self.provider.chat_payload(&request, true)?;
        let url = self
            .provider
            .resolve_url(Capability::Chat, None, Some(&request.model))?;
        let outbound = self.provider.build_request(url, HttpMethod::Post, Some(body), true);

        let response = self.send(outbound, &request.model).await?;
        debug!(status = %response.status(), "Chat stream opened");
        Ok(self
            .provider
            .decode_stream(lines_from_response(response), ctx))
    }

    /// Embed a batch of texts
    #[instrument(skip(self, request), fields(vendor = %self.provider.vendor(), model = %request.model, texts = request.texts.len()))]
    pub async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResult> {
        let body = self.provider.embedding_payload(&request)?;
        let url = self
            .provider
            .resolve_url(Capability::Embeddings, None, Some(&request.model))?;
        let outbound = self.provider.build_request(url, HttpMethod::Post, Some(body), false);

        self.send_and_decode(outbound, &request.model).await
    }

    /// List models the vendor advertises
    #[instrument(skip(self), fields(vendor = %self.provider.vendor()))]
    pub async fn list_models(&self) -> Result<ModelList> {
        let url = self.provider.resolve_url(Capability::Models, None, None)?;
        let outbound = self.provider.build_request(url, HttpMethod::Get, None, false);

        self.send_and_decode(outbound, "").await
    }

    async fn send_and_decode<T: InboundPayload>(
        &self,
        outbound: OutboundRequest,
        model: &str,
    ) -> Result<T> {
        let raw_request = outbound.body_string();
        let response = self.send(outbound, model).await?;
        let raw = response.text().await?;

        deserialize_as::<T>(self.provider.as_ref(), &raw, raw_request.as_deref())?.ok_or_else(|| {
            LLMError::UnexpectedResponse(format!(
                "{} does not produce {:?} results",
                self.provider.name(),
                T::KIND
            ))
        })
    }

    async fn send(&self, outbound: OutboundRequest, model: &str) -> Result<reqwest::Response> {
        debug!("Sending {} request to {}", outbound.method, outbound.url);
        let response = outbound.into_reqwest(&self.http).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        warn!(%status, "Vendor returned an error status");

        Err(match status.as_u16() {
            401 => LLMError::AuthenticationFailed,
            429 => LLMError::RateLimitExceeded(error_text),
            400 => LLMError::InvalidRequest(error_text),
            404 => LLMError::ModelNotFound(model.to_string()),
            _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
        })
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("vendor", &self.provider.vendor())
            .finish_non_exhaustive()
    }
}
