//! Endpoint provider trait and vendor registry

use crate::{
    Capability, ChatRequest, ChatStream, EmbeddingRequest, HttpMethod, InboundResult, LLMError,
    LineStream, OutboundRequest, Result, ResultKind, StreamContext,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Vendor identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Cohere
    Cohere,
    /// OpenAI
    OpenAi,
    /// Anthropic
    Anthropic,
    /// A caller-supplied adapter
    Custom,
}

impl Vendor {
    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Vendor::Cohere => "cohere",
            Vendor::OpenAi => "openai",
            Vendor::Anthropic => "anthropic",
            Vendor::Custom => "custom",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Vendor {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cohere" => Ok(Vendor::Cohere),
            "openai" => Ok(Vendor::OpenAi),
            "anthropic" => Ok(Vendor::Anthropic),
            "custom" => Ok(Vendor::Custom),
            other => Err(LLMError::ConfigurationError(format!("Unknown vendor: {other}"))),
        }
    }
}

/// Per-vendor adapter
///
/// One instance exists per vendor per client configuration and is shared
/// read-only between concurrent calls. Every method is synchronous; the
/// only suspension points live inside the stream returned by
/// [`EndpointProvider::decode_stream`].
pub trait EndpointProvider: Send + Sync {
    /// Vendor this adapter speaks for
    fn vendor(&self) -> Vendor;

    /// Get the provider name (e.g., "cohere")
    fn name(&self) -> &str {
        self.vendor().as_str()
    }

    /// Resolve the URL serving `capability`
    ///
    /// Fails with [`LLMError::ConfigurationError`] when the vendor does not
    /// support the capability.
    fn resolve_url(
        &self,
        capability: Capability,
        suffix: Option<&str>,
        model: Option<&str>,
    ) -> Result<Url>;

    /// Build an outbound request with standard headers and auth
    fn build_request(
        &self,
        url: Url,
        method: HttpMethod,
        body: Option<Value>,
        streaming: bool,
    ) -> OutboundRequest;

    /// Serialize a chat request into the vendor body
    fn chat_payload(&self, request: &ChatRequest, streaming: bool) -> Result<Value>;

    /// Serialize an embedding request into the vendor body
    fn embedding_payload(&self, request: &EmbeddingRequest) -> Result<Value>;

    /// Decode a complete (non-streaming) response body
    ///
    /// Returns `Ok(None)` for result kinds this vendor does not produce.
    fn deserialize(
        &self,
        kind: ResultKind,
        raw_json: &str,
        raw_request: Option<&str>,
    ) -> Result<Option<InboundResult>>;

    /// Turn a streaming response body into canonical increments
    fn decode_stream(&self, lines: LineStream, ctx: StreamContext) -> ChatStream;

    /// Whether `capability` is served at all
    fn supports(&self, capability: Capability) -> bool {
        self.resolve_url(capability, None, None).is_ok()
    }
}

/// Registry mapping vendors to their adapters
///
/// Built once at configuration time, then shared read-only.
#[derive(Default, Clone)]
pub struct VendorRegistry {
    providers: HashMap<Vendor, Arc<dyn EndpointProvider>>,
}

impl VendorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in vendor, all sharing `credentials`
    #[cfg(feature = "cohere")]
    pub fn with_defaults(credentials: crate::SharedCredentials) -> Result<Self> {
        let mut registry = Self::new();
        let provider = crate::providers::CohereProvider::with_credentials(
            crate::providers::CohereConfig::default(),
            credentials,
        )?;
        registry.register(Arc::new(provider));
        Ok(registry)
    }

    /// Register an adapter, replacing any previous one for the same vendor
    pub fn register(&mut self, provider: Arc<dyn EndpointProvider>) {
        self.providers.insert(provider.vendor(), provider);
    }

    /// Get the adapter for a vendor
    pub fn get(&self, vendor: Vendor) -> Option<Arc<dyn EndpointProvider>> {
        self.providers.get(&vendor).cloned()
    }

    /// Get the adapter for a vendor or fail with a configuration error
    pub fn require(&self, vendor: Vendor) -> Result<Arc<dyn EndpointProvider>> {
        self.get(vendor).ok_or_else(|| {
            LLMError::ConfigurationError(format!("No provider registered for vendor '{vendor}'"))
        })
    }

    /// Registered vendors
    pub fn vendors(&self) -> Vec<Vendor> {
        self.providers.keys().copied().collect()
    }

    /// Get the number of registered adapters
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for VendorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorRegistry")
            .field("vendors", &self.vendors())
            .finish()
    }
}
