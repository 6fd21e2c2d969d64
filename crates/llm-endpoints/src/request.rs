//! Outbound request shaping
//!
//! Providers produce a transport-agnostic [`OutboundRequest`]; the client
//! turns it into a reqwest request. Credentials are read from a
//! [`CredentialSource`] every time a request is built so rotated keys are
//! picked up without rebuilding the provider.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// User agent sent on every request
pub const USER_AGENT: &str = concat!("llm-endpoints/", env!("CARGO_PKG_VERSION"));

/// HTTP verb
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
}

impl HttpMethod {
    /// Canonical upper-case verb
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP protocol version requested for outbound calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// HTTP/1.1
    #[default]
    #[serde(rename = "http1.1", alias = "http1")]
    Http11,
    /// HTTP/2
    #[serde(rename = "http2")]
    Http2,
}

impl std::str::FromStr for ProtocolVersion {
    type Err = crate::LLMError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http1" | "http1.1" | "http/1.1" => Ok(ProtocolVersion::Http11),
            "http2" | "http/2" | "h2" => Ok(ProtocolVersion::Http2),
            other => Err(crate::LLMError::ConfigurationError(format!(
                "Unknown protocol version: {other}"
            ))),
        }
    }
}

impl ProtocolVersion {
    pub(crate) fn to_reqwest(self) -> reqwest::Version {
        match self {
            ProtocolVersion::Http11 => reqwest::Version::HTTP_11,
            ProtocolVersion::Http2 => reqwest::Version::HTTP_2,
        }
    }
}

/// Source of the API key injected into requests
#[cfg_attr(test, mockall::automock)]
pub trait CredentialSource: Send + Sync {
    /// Current API key, if any. Called once per built request.
    fn api_key(&self) -> Option<String>;
}

/// A fixed key (or none, for anonymous endpoints)
#[derive(Clone, Default)]
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    /// A fixed key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self(Some(api_key.into()))
    }

    /// No credential at all
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.0.is_some() { "<redacted>" } else { "<none>" };
        f.debug_tuple("StaticCredential").field(&state).finish()
    }
}

impl CredentialSource for StaticCredential {
    fn api_key(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Reads the key from an environment variable on every call
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    /// Read from the named variable
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Variable name
    pub fn var(&self) -> &str {
        &self.var
    }
}

impl CredentialSource for EnvCredential {
    fn api_key(&self) -> Option<String> {
        std::env::var(&self.var).ok()
    }
}

/// Shared credential handle
pub type SharedCredentials = Arc<dyn CredentialSource>;

/// A request ready to hand to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// HTTP verb
    pub method: HttpMethod,
    /// Absolute URL
    pub url: Url,
    /// Protocol version
    pub version: ProtocolVersion,
    /// Headers in insertion order
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
    /// Whether the response body will be read as a stream
    pub streaming: bool,
}

impl OutboundRequest {
    /// Look up a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialized body, if any
    pub fn body_string(&self) -> Option<String> {
        self.body.as_ref().map(Value::to_string)
    }

    /// Convert into a reqwest request builder on the given client
    pub fn into_reqwest(self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let method = match self.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = client
            .request(method, self.url)
            .version(self.version.to_reqwest());
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = self.body {
            builder = builder.body(body.to_string());
        }
        builder
    }
}

/// Assemble the standard headers and optional bearer auth
pub fn build_outbound(
    url: Url,
    method: HttpMethod,
    body: Option<Value>,
    streaming: bool,
    version: ProtocolVersion,
    credentials: &dyn CredentialSource,
) -> OutboundRequest {
    let mut headers = vec![("User-Agent".to_string(), USER_AGENT.to_string())];

    if body.is_some() {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }
    if streaming {
        headers.push(("Accept".to_string(), "application/x-ndjson".to_string()));
    }

    match credentials.api_key() {
        Some(key) if !key.trim().is_empty() => {
            headers.push(("Authorization".to_string(), format!("Bearer {}", key.trim())));
        }
        _ => tracing::trace!(%url, "No credential configured, sending request without auth"),
    }

    OutboundRequest {
        method,
        url,
        version,
        headers,
        body,
        streaming,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url() -> Url {
        Url::parse("https://api.example.com/v2/chat").unwrap()
    }

    #[test]
    fn test_bearer_injected_and_trimmed() {
        let creds = StaticCredential::new("  secret-key \n");
        let req = build_outbound(
            url(),
            HttpMethod::Post,
            Some(json!({"a": 1})),
            false,
            ProtocolVersion::Http2,
            &creds,
        );

        assert_eq!(req.header("authorization"), Some("Bearer secret-key"));
        assert_eq!(req.header("user-agent"), Some(USER_AGENT));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("accept"), None);
        assert_eq!(req.version, ProtocolVersion::Http2);
    }

    #[test]
    fn test_anonymous_request_omits_auth() {
        let req = build_outbound(
            url(),
            HttpMethod::Get,
            None,
            false,
            ProtocolVersion::default(),
            &StaticCredential::anonymous(),
        );
        assert_eq!(req.header("Authorization"), None);
        assert_eq!(req.header("Content-Type"), None);
        assert!(req.header("User-Agent").unwrap().starts_with("llm-endpoints/"));
    }

    #[test]
    fn test_blank_key_treated_as_missing() {
        let req = build_outbound(
            url(),
            HttpMethod::Get,
            None,
            false,
            ProtocolVersion::default(),
            &StaticCredential::new("   "),
        );
        assert_eq!(req.header("Authorization"), None);
    }

    #[test]
    fn test_credential_read_on_every_build() {
        let mut creds = MockCredentialSource::new();
        let mut seq = mockall::Sequence::new();
        creds
            .expect_api_key()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Some("old".to_string()));
        creds
            .expect_api_key()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Some("rotated".to_string()));

        let first = build_outbound(url(), HttpMethod::Post, None, true, ProtocolVersion::Http11, &creds);
        let second = build_outbound(url(), HttpMethod::Post, None, true, ProtocolVersion::Http11, &creds);

        assert_eq!(first.header("Authorization"), Some("Bearer old"));
        assert_eq!(second.header("Authorization"), Some("Bearer rotated"));
        assert_eq!(second.header("Accept"), Some("application/x-ndjson"));
        assert!(second.streaming);
    }

    #[test]
    fn test_protocol_version_parsing() {
        assert_eq!("HTTP2".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Http2);
        assert_eq!("http1.1".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::Http11);
        assert!("spdy".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn test_static_credential_debug_redacts() {
        let dbg = format!("{:?}", StaticCredential::new("sk-123"));
        assert!(!dbg.contains("sk-123"));
    }

    #[test]
    fn test_into_reqwest_carries_headers() {
        let client = reqwest::Client::new();
        let req = build_outbound(
            url(),
            HttpMethod::Post,
            Some(json!({"model": "m"})),
            false,
            ProtocolVersion::Http11,
            &StaticCredential::new("k"),
        )
        .into_reqwest(&client)
        .build()
        .unwrap();

        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.headers()["authorization"], "Bearer k");
        assert_eq!(req.url().as_str(), "https://api.example.com/v2/chat");
    }
}
