//! Capability routing
//!
//! Maps an abstract [`Capability`] to the concrete URL a vendor serves it on.
//! Vendors supply the endpoint fragment and a default template; callers may
//! install a [`UrlResolver`] that returns their own template instead.

use crate::{LLMError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Abstract REST surface a vendor may or may not support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Chat completions
    Chat,
    /// Text embeddings
    Embeddings,
    /// Model listing
    Models,
    /// Legacy text completions
    Completions,
    /// Image generation
    ImageGeneration,
    /// Speech and transcription
    Audio,
    /// File storage
    Files,
    /// Document reranking
    Rerank,
}

impl Capability {
    /// All capabilities, in declaration order
    pub const ALL: [Capability; 8] = [
        Capability::Chat,
        Capability::Embeddings,
        Capability::Models,
        Capability::Completions,
        Capability::ImageGeneration,
        Capability::Audio,
        Capability::Files,
        Capability::Rerank,
    ];

    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Chat => "chat",
            Capability::Embeddings => "embeddings",
            Capability::Models => "models",
            Capability::Completions => "completions",
            Capability::ImageGeneration => "image_generation",
            Capability::Audio => "audio",
            Capability::Files => "files",
            Capability::Rerank => "rerank",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LLMError::ConfigurationError(format!("Unknown capability: {s}")))
    }
}

/// Everything a custom resolver gets to see
#[derive(Debug, Clone, Copy)]
pub struct UrlContext<'a> {
    /// Capability being routed
    pub capability: Capability,
    /// Vendor path fragment for the capability (e.g. "chat")
    pub fragment: &'a str,
    /// Extra path appended after the fragment
    pub suffix: Option<&'a str>,
    /// Model the request targets
    pub model: Option<&'a str>,
}

/// Custom URL resolver.
///
/// Returns a template; `{0}` is replaced by the endpoint fragment, `{1}` by
/// the suffix and `{2}` by the model name (absent values become empty).
/// `{{` and `}}` produce literal braces.
pub type UrlResolver = Arc<dyn Fn(&UrlContext<'_>) -> String + Send + Sync>;

/// Fill a resolver template with positional arguments
pub fn format_url_template(template: &str, ctx: &UrlContext<'_>) -> Result<String> {
    let args = [ctx.fragment, ctx.suffix.unwrap_or(""), ctx.model.unwrap_or("")];
    let mut out = String::with_capacity(template.len() + 32);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut index = String::new();
                for d in chars.by_ref() {
                    if d == '}' {
                        break;
                    }
                    index.push(d);
                }
                let arg = index
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| args.get(i))
                    .ok_or_else(|| {
                        LLMError::ConfigurationError(format!(
                            "Invalid placeholder {{{index}}} in URL template '{template}'"
                        ))
                    })?;
                out.push_str(arg);
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Resolve a URL, preferring the custom resolver over the vendor default
pub fn route(
    resolver: Option<&UrlResolver>,
    ctx: &UrlContext<'_>,
    default: impl FnOnce(&UrlContext<'_>) -> String,
) -> Result<Url> {
    let raw = match resolver {
        Some(resolve) => format_url_template(&resolve(ctx), ctx)?,
        None => default(ctx),
    };

    Url::parse(&raw).map_err(|e| {
        LLMError::ConfigurationError(format!("Invalid {} URL '{raw}': {e}", ctx.capability))
    })
}
