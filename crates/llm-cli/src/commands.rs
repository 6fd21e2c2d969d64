//! Subcommand implementations

use crate::output::Printer;
use anyhow::{Context as _, bail};
use futures::StreamExt;
use llm_endpoints::providers::{CohereConfig, CohereProvider};
use llm_endpoints::{
    CancellationToken, Capability, ChatClient, ChatMessage, ChatRequest, ClientConfig,
    EmbeddingRequest, EndpointProvider, EnvCredential, ProtocolVersion, StreamContext, Vendor,
    VendorRegistry, lines_from_reader,
};
use llm_utils::Settings;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a subcommand needs
pub struct Context {
    settings: Settings,
    provider: Arc<dyn EndpointProvider>,
    json: bool,
}

impl Context {
    /// Build the vendor adapter described by `settings`
    pub fn new(settings: Settings, json: bool) -> anyhow::Result<Self> {
        let vendor: Vendor = settings.vendor.parse()?;
        let protocol: ProtocolVersion = settings.protocol.parse()?;

        let mut config = CohereConfig::from_env()
            .with_timeout(settings.timeout_secs)
            .with_protocol_version(protocol)
            .with_vendor_extensions(settings.surface_vendor_extensions);
        if let Some(api_base) = &settings.api_base {
            config = config.with_api_base(api_base.clone());
        }

        let credentials = Arc::new(EnvCredential::new(settings.api_key_env.clone()));
        let mut registry = VendorRegistry::new();
        registry.register(Arc::new(CohereProvider::with_credentials(config, credentials)?));

        let provider = registry
            .require(vendor)
            .with_context(|| format!("vendor '{vendor}' is not available in this build"))?;
        debug!(?registry, %vendor, "Provider ready");

        Ok(Self {
            settings,
            provider,
            json,
        })
    }

    fn client(&self) -> anyhow::Result<ChatClient> {
        let config = ClientConfig::default().with_timeout(self.settings.timeout_secs);
        Ok(ChatClient::new(self.provider.clone(), config)?)
    }

    fn printer(&self) -> Printer {
        Printer::new(self.json)
    }

    fn stream_context(&self) -> StreamContext {
        StreamContext::new().with_vendor_extensions(self.settings.surface_vendor_extensions)
    }
}

/// Arguments of the chat subcommand
pub struct ChatArgs {
    pub model: Option<String>,
    pub prompt: String,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatArgs {
    fn into_request(self, settings: &Settings) -> anyhow::Result<ChatRequest> {
        let Some(model) = self.model.or_else(|| settings.model.clone()) else {
            bail!("no model given; pass --model or set \"model\" in the settings file");
        };

        let mut builder = ChatRequest::builder(model).add_message(ChatMessage::user(self.prompt));
        if let Some(system) = self.system {
            builder = builder.system(system);
        }
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        Ok(builder.build())
    }
}

pub async fn chat(ctx: &Context, args: ChatArgs) -> anyhow::Result<()> {
    let request = args.into_request(&ctx.settings)?;
    let result = ctx.client()?.chat(request).await.context("chat request failed")?;
    ctx.printer().result(&result)
}

pub async fn stream_chat(ctx: &Context, args: ChatArgs) -> anyhow::Result<()> {
    let request = args.into_request(&ctx.settings)?;

    let token = CancellationToken::new();
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping stream");
            on_interrupt.cancel();
        }
    });

    let mut stream = ctx
        .client()?
        .stream_chat(request, ctx.stream_context().with_cancellation(token))
        .await
        .context("failed to open chat stream")?;

    let mut printer = ctx.printer();
    while let Some(item) = stream.next().await {
        printer.increment(&item.context("chat stream ended abnormally")?)?;
    }
    Ok(())
}

pub async fn models(ctx: &Context) -> anyhow::Result<()> {
    let models = ctx.client()?.list_models().await.context("failed to list models")?;
    ctx.printer().models(&models)
}

pub async fn embed(
    ctx: &Context,
    model: String,
    input_type: Option<String>,
    texts: Vec<String>,
) -> anyhow::Result<()> {
    let mut request = EmbeddingRequest::new(model, texts);
    if let Some(input_type) = input_type {
        request = request.with_input_type(input_type);
    }
    let result = ctx.client()?.embed(request).await.context("embedding request failed")?;
    ctx.printer().embeddings(&result)
}

pub fn url(
    ctx: &Context,
    capability: &str,
    suffix: Option<&str>,
    model: Option<&str>,
) -> anyhow::Result<()> {
    let capability: Capability = capability.parse()?;
    let url = ctx.provider.resolve_url(capability, suffix, model)?;
    println!("{url}");
    Ok(())
}

pub async fn replay(ctx: &Context, file: &Path) -> anyhow::Result<()> {
    let reader = tokio::fs::File::open(file)
        .await
        .with_context(|| format!("failed to open {}", file.display()))?;

    let mut stream = ctx
        .provider
        .decode_stream(lines_from_reader(reader), ctx.stream_context());

    let mut printer = ctx.printer();
    while let Some(item) = stream.next().await {
        printer.increment(&item.context("replay ended abnormally")?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(model: Option<&str>) -> ChatArgs {
        ChatArgs {
            model: model.map(str::to_string),
            prompt: "hi".to_string(),
            system: Some("terse".to_string()),
            max_tokens: Some(16),
            temperature: None,
        }
    }

    #[test]
    fn test_chat_args_fall_back_to_settings_model() {
        let settings = Settings {
            model: Some("command-r".to_string()),
            ..Settings::default()
        };
        let request = args(None).into_request(&settings).unwrap();
        assert_eq!(request.model, "command-r");
        assert_eq!(request.system.as_deref(), Some("terse"));
        assert_eq!(request.max_tokens, Some(16));

        let request = args(Some("command-a")).into_request(&settings).unwrap();
        assert_eq!(request.model, "command-a");
    }

    #[test]
    fn test_chat_args_without_any_model() {
        assert!(args(None).into_request(&Settings::default()).is_err());
    }

    #[test]
    fn test_context_rejects_unregistered_vendor() {
        let settings = Settings {
            vendor: "anthropic".to_string(),
            ..Settings::default()
        };
        assert!(Context::new(settings, false).is_err());
    }

    #[test]
    fn test_url_for_settings_api_base() {
        let settings = Settings {
            api_base: Some("https://cohere.proxy.local/v2".to_string()),
            ..Settings::default()
        };
        let ctx = Context::new(settings, false).unwrap();
        let url = ctx.provider.resolve_url(Capability::Embeddings, None, None).unwrap();
        assert_eq!(url.as_str(), "https://cohere.proxy.local/v2/embed");
        assert!(super::url(&ctx, "rerank", None, None).is_err());
    }

    #[tokio::test]
    async fn test_replay_recorded_stream() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("stream.ndjson");
        std::fs::write(
            &file,
            concat!(
                r#"{"event_type":"text-generation","text":"Hi","is_finished":false}"#,
                "\n",
                r#"{"event_type":"stream-end","is_finished":true,"finish_reason":"COMPLETE"}"#,
                "\n"
            ),
        )
        .unwrap();

        let ctx = Context::new(Settings::default(), true).unwrap();
        replay(&ctx, &file).await.unwrap();
        assert!(replay(&ctx, &dir.path().join("missing.ndjson")).await.is_err());
    }
}
