//! Command-line interface for llm-endpoints

mod commands;
mod output;

use clap::{Parser, Subcommand};
use llm_utils::Settings;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "llm")]
#[command(about = "Talk to chat-completion vendors through llm-endpoints", long_about = None)]
struct Cli {
    /// Settings file (default: ./llm.json if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print canonical results as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a chat request
    Chat {
        /// Model to use (default: from settings)
        #[arg(short, long)]
        model: Option<String>,

        /// User prompt
        #[arg(short, long)]
        prompt: String,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Stream the response
        #[arg(long)]
        stream: bool,

        /// Maximum tokens to generate
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
    },
    /// List available models
    Models,
    /// Embed texts
    Embed {
        /// Embedding model
        #[arg(short, long)]
        model: String,

        /// Vendor input type (e.g. search_query)
        #[arg(long)]
        input_type: Option<String>,

        /// Texts to embed
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Print the URL a capability resolves to
    Url {
        /// Capability name (chat, embeddings, models, ...)
        capability: String,

        /// Path suffix appended after the endpoint fragment
        #[arg(long)]
        suffix: Option<String>,

        /// Model name passed to custom resolvers
        #[arg(long)]
        model: Option<String>,
    },
    /// Decode a recorded NDJSON stream offline
    Replay {
        /// Recorded response body, one record per line
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    let filter = if cli.verbose { "debug" } else { "warn" };
    llm_utils::init_tracing_with(settings.log_format, filter);
    debug!(?settings, "Loaded settings");

    let ctx = commands::Context::new(settings, cli.json)?;

    match cli.command {
        Commands::Chat {
            model,
            prompt,
            system,
            stream,
            max_tokens,
            temperature,
        } => {
            let args = commands::ChatArgs {
                model,
                prompt,
                system,
                max_tokens,
                temperature,
            };
            if stream {
                commands::stream_chat(&ctx, args).await
            } else {
                commands::chat(&ctx, args).await
            }
        }
        Commands::Models => commands::models(&ctx).await,
        Commands::Embed {
            model,
            input_type,
            texts,
        } => commands::embed(&ctx, model, input_type, texts).await,
        Commands::Url {
            capability,
            suffix,
            model,
        } => commands::url(&ctx, &capability, suffix.as_deref(), model.as_deref()),
        Commands::Replay { file } => commands::replay(&ctx, &file).await,
    }
}
