//! Cohere provider implementation
//!
//! Implements [`EndpointProvider`] for Cohere's v2 REST surface: chat
//! (streamed as newline-delimited JSON), embeddings and model listing.
//! See: https://docs.cohere.com/reference/chat-stream
//!
//! # Examples
//!
//! ## Routing and request shaping
//!
//! ```
//! use llm_endpoints::providers::CohereProvider;
//! use llm_endpoints::{Capability, EndpointProvider, HttpMethod};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = CohereProvider::new("co-...")?;
//!
//! let url = provider.resolve_url(Capability::Chat, None, None)?;
//! assert_eq!(url.as_str(), "https://api.cohere.ai/v2/chat");
//!
//! let request = provider.build_request(url, HttpMethod::Post, None, true);
//! assert_eq!(request.header("Authorization"), Some("Bearer co-..."));
//! # Ok(())
//! # }
//! ```
//!
//! ## Behind a proxy
//!
//! ```
//! use std::sync::Arc;
//! use llm_endpoints::providers::{CohereConfig, CohereProvider};
//! use llm_endpoints::{Capability, EndpointProvider, UrlContext};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CohereConfig::new()
//!     .with_url_resolver(Arc::new(|_: &UrlContext<'_>| "https://gateway.local/cohere/{0}{1}".to_string()));
//! let provider = CohereProvider::with_config(config, "co-...")?;
//!
//! let url = provider.resolve_url(Capability::Embeddings, None, None)?;
//! assert_eq!(url.as_str(), "https://gateway.local/cohere/embed");
//! # Ok(())
//! # }
//! ```

mod stream;
mod wire;

pub use stream::CohereStreamDecoder;
pub use wire::{CohereCitation, CohereExtensions, CohereSearchQuery, CohereSearchResult};

use crate::endpoint::route;
use crate::stream::drive;
use crate::{
    Capability, ChatRequest, ChatStream, EmbeddingRequest, EndpointProvider, EnvCredential,
    HttpMethod, InboundResult, LLMError, LineStream, ModelList, OutboundRequest, ProtocolVersion,
    Result, ResultKind, SharedCredentials, StaticCredential, StreamContext, UrlContext,
    UrlResolver, Vendor, build_outbound,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;
use wire::{CohereChatResponse, CohereEmbedResponse};

const DEFAULT_COHERE_API_BASE: &str = "https://api.cohere.ai/v2";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Environment variable holding the API key
pub const COHERE_API_KEY_ENV: &str = "COHERE_API_KEY";

/// Environment variable overriding the API base
pub const COHERE_API_BASE_ENV: &str = "COHERE_API_BASE";

/// Configuration for the Cohere provider
#[derive(Clone)]
pub struct CohereConfig {
    /// Base URL (default: "https://api.cohere.ai/v2")
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,

    /// HTTP protocol version (default: HTTP/1.1)
    pub protocol_version: ProtocolVersion,

    /// Yield search queries, search results and citations from streams
    pub surface_vendor_extensions: bool,

    /// Custom URL template resolver, consulted before the default layout
    pub url_resolver: Option<UrlResolver>,
}

impl CohereConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self {
            api_base: DEFAULT_COHERE_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            protocol_version: ProtocolVersion::default(),
            surface_vendor_extensions: false,
            url_resolver: None,
        }
    }

    /// Create config from environment
    ///
    /// Reads the base URL from `COHERE_API_BASE` if set. The API key is not
    /// part of the config; see [`CohereProvider::from_env`].
    pub fn from_env() -> Self {
        let config = Self::new();
        match std::env::var(COHERE_API_BASE_ENV) {
            Ok(api_base) if !api_base.trim().is_empty() => config.with_api_base(api_base),
            _ => config,
        }
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the HTTP protocol version
    pub fn with_protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Install a custom URL resolver
    pub fn with_url_resolver(mut self, resolver: UrlResolver) -> Self {
        self.url_resolver = Some(resolver);
        self
    }

    /// Surface retrieval metadata as vendor extension increments
    pub fn with_vendor_extensions(mut self, enabled: bool) -> Self {
        self.surface_vendor_extensions = enabled;
        self
    }
}

impl Default for CohereConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CohereConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohereConfig")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("protocol_version", &self.protocol_version)
            .field("surface_vendor_extensions", &self.surface_vendor_extensions)
            .field("url_resolver", &self.url_resolver.is_some())
            .finish()
    }
}

/// Cohere provider
///
/// Supports Command models for chat and Embed models for embeddings.
/// Credentials are read on every [`EndpointProvider::build_request`] call,
/// so rotating the key does not require rebuilding the provider.
#[derive(Clone)]
pub struct CohereProvider {
    config: CohereConfig,
    credentials: SharedCredentials,
}

impl CohereProvider {
    /// Create a provider with a fixed API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(CohereConfig::new(), api_key)
    }

    /// Create a provider with custom configuration and a fixed API key
    pub fn with_config(config: CohereConfig, api_key: impl Into<String>) -> Result<Self> {
        Self::with_credentials(config, Arc::new(StaticCredential::new(api_key)))
    }

    /// Create a provider reading its key from a credential source
    ///
    /// Fails if the configured API base is not an absolute URL.
    pub fn with_credentials(config: CohereConfig, credentials: SharedCredentials) -> Result<Self> {
        Url::parse(&config.api_base).map_err(|e| {
            LLMError::ConfigurationError(format!("Invalid Cohere API base '{}': {e}", config.api_base))
        })?;
        Ok(Self {
            config,
            credentials,
        })
    }

    /// Create a provider from environment variables
    ///
    /// The key is read from `COHERE_API_KEY` on every request; an unset key
    /// sends unauthenticated requests rather than failing here.
    pub fn from_env() -> Result<Self> {
        Self::with_credentials(
            CohereConfig::from_env(),
            Arc::new(EnvCredential::new(COHERE_API_KEY_ENV)),
        )
    }

    /// Get the current configuration
    pub fn config(&self) -> &CohereConfig {
        &self.config
    }

    /// Path fragment serving `capability`
    fn fragment(capability: Capability) -> Result<&'static str> {
        match capability {
            Capability::Chat => Ok("chat"),
            Capability::Embeddings => Ok("embed"),
            Capability::Models => Ok("models"),
            other => Err(LLMError::ConfigurationError(format!(
                "Cohere does not support the {other} capability"
            ))),
        }
    }

    /// Decode a body, reporting failures as unexpected responses
    fn parse_body<T: DeserializeOwned>(kind: ResultKind, raw_json: &str) -> Result<T> {
        serde_json::from_str(raw_json).map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse Cohere {kind:?} response: {e}"))
        })
    }
}

impl fmt::Debug for CohereProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohereProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EndpointProvider for CohereProvider {
    fn vendor(&self) -> Vendor {
        Vendor::Cohere
    }

    fn resolve_url(
        &self,
        capability: Capability,
        suffix: Option<&str>,
        model: Option<&str>,
    ) -> Result<Url> {
        let ctx = UrlContext {
            capability,
            fragment: Self::fragment(capability)?,
            suffix,
            model,
        };

        route(self.config.url_resolver.as_ref(), &ctx, |ctx| {
            format!(
                "{}/{}{}",
                self.config.api_base.trim_end_matches('/'),
                ctx.fragment,
                ctx.suffix.unwrap_or("")
            )
        })
    }

    fn build_request(
        &self,
        url: Url,
        method: HttpMethod,
        body: Option<Value>,
        streaming: bool,
    ) -> OutboundRequest {
        build_outbound(
            url,
            method,
            body,
            streaming,
            self.config.protocol_version,
            self.credentials.as_ref(),
        )
    }

    fn chat_payload(&self, request: &ChatRequest, streaming: bool) -> Result<Value> {
        Ok(serde_json::to_value(wire::chat_payload(request, streaming))?)
    }

    fn embedding_payload(&self, request: &EmbeddingRequest) -> Result<Value> {
        Ok(serde_json::to_value(wire::embed_payload(request))?)
    }

    fn deserialize(
        &self,
        kind: ResultKind,
        raw_json: &str,
        _raw_request: Option<&str>,
    ) -> Result<Option<InboundResult>> {
        let result = match kind {
            ResultKind::Chat => InboundResult::Chat(
                Self::parse_body::<CohereChatResponse>(kind, raw_json)?.into_result(),
            ),
            ResultKind::Embeddings => InboundResult::Embeddings(
                Self::parse_body::<CohereEmbedResponse>(kind, raw_json)?.into_result(),
            ),
            ResultKind::Models => {
                InboundResult::Models(Self::parse_body::<ModelList>(kind, raw_json)?)
            }
            ResultKind::Completions | ResultKind::Images => {
                debug!(?kind, "Cohere does not produce this result type");
                return Ok(None);
            }
        };
        Ok(Some(result))
    }

    fn decode_stream(&self, lines: LineStream, ctx: StreamContext) -> ChatStream {
        let surface = ctx.surfaces_vendor_extensions() || self.config.surface_vendor_extensions;
        drive(lines, ctx, Vendor::Cohere, CohereStreamDecoder::new(surface))
    }
}
