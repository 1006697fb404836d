//! Runs one `message-llm` turn against `OpenAI` with the built-in tools.

use std::path::PathBuf;
use std::sync::Arc;

use alira::adapters::{OpenAiAdapter, OpenAiConfig};
use alira::config::AliraConfig;
use alira::kernel::{MessageRequest, Orchestrator};
use alira::tools::builtin::general_tools;
use alira::tools::{ToolRegistry, ToolSource, discover};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

/// Send one message through the tool-orchestration turn.
#[derive(Parser, Debug)]
#[command(name = "message-llm", version)]
#[command(about = "Ask a question; the model may call the built-in weather and horoscope tools")]
struct Cli {
    /// The user message (1 to 1000 characters).
    message: String,

    /// Caller identity: a UUID or a 24 character hex object id.
    #[arg(short, long, value_name = "ID")]
    user_id: String,

    /// Model to use instead of the configured default.
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// JSON configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Register no tools, forcing the single-call path.
    #[arg(long)]
    no_tools: bool,

    /// Print the registered tools' operator guidance before the turn.
    #[arg(long)]
    guide: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AliraConfig::from_json_file(path)?,
        None => AliraConfig::default(),
    }
    .with_env_overrides()?;
    alira::telemetry::init(&config.log_filter)?;

    let body = json!({
        "message": cli.message,
        "userId": cli.user_id,
        "model": cli.model,
    });
    let request = match MessageRequest::from_json(body.to_string().as_bytes()) {
        Ok(request) => request,
        Err(err) => {
            print_response(err.status().as_u16(), &err.to_body())?;
            return Err(anyhow!(err));
        }
    };

    let mut registry = ToolRegistry::new();
    if cli.no_tools {
        info!("tools disabled");
    } else {
        let source = general_tools();
        let report = discover(&mut registry, [&source as &dyn ToolSource]);
        for rejected in report.rejected() {
            warn!(error = %rejected, "tool rejected");
        }
    }

    let adapter_config =
        OpenAiConfig::from_env_var(&config.turn.default_model, &config.openai.api_key_env)
            .with_base_url(&config.openai.base_url)?
            .with_timeout(config.openai.timeout());
    let adapter = OpenAiAdapter::new(adapter_config).with_context(|| {
        format!(
            "set {} to call the OpenAI API",
            config.openai.api_key_env
        )
    })?;

    let orchestrator = Orchestrator::new(Arc::new(adapter), Arc::new(registry), config.turn)?;
    if cli.guide {
        eprintln!("{}\n", orchestrator.tool_guide().render());
    }
    let outcome = orchestrator.handle(&request).await;
    print_response(outcome.status().as_u16(), &serde_json::to_value(&outcome)?)?;

    if outcome.is_success() {
        Ok(())
    } else {
        Err(anyhow!("turn failed"))
    }
}

fn print_response(status: u16, body: &serde_json::Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&json!({ "status": status, "body": body }))?;
    println!("{rendered}");
    Ok(())
}
