//! palette-mcp - MCP stdio server for Stable Diffusion WebUI

use anyhow::Context;
use clap::Parser;
use mcp::{Gateway, ServerInfo};
use palette::config::executable_dir;
use palette::{Config, ToolContext, ToolRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use webui::WebUiClient;

const DEFAULT_FILTER: &str = "palette=info,webui=info,mcp=info,imagent=info";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (JSON, or TOML with a .toml extension)
    #[arg(short, long, env = "PALETTE_CONFIG")]
    config: Option<PathBuf>,

    /// WebUI base URL (overrides config)
    #[arg(long)]
    base_url: Option<String>,

    /// Base directory for relative output paths (overrides config)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    // stdout carries the protocol stream
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    let config_path = args
        .config
        .unwrap_or_else(|| executable_dir().join("config.json"));
    let mut config = Config::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    // Apply CLI overrides
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = Some(output_dir);
    }
    config.validate().context("Invalid configuration")?;

    tracing::info!("Backend: {}", config.base_url);
    tracing::info!("Default model: {}", config.default_model);
    tracing::info!("Output directory: {}", config.output_base_dir().display());

    let client = WebUiClient::new(&config.base_url)
        .with_txt2img_endpoint(&config.endpoint)
        .with_timeouts(config.generation_timeout(), config.options_timeout());

    match client.probe().await {
        Ok(()) => tracing::info!("Connected to WebUI at {}", client.base_url()),
        Err(e) => tracing::warn!("WebUI at {} is not reachable yet: {}", client.base_url(), e),
    }

    let config = Arc::new(config);
    let ctx = Arc::new(ToolContext::new(config, Arc::new(client)));
    let registry = ToolRegistry::new(ctx);

    let gateway = Gateway::new(
        registry,
        ServerInfo {
            name: "palette".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    );
    gateway.start().await?;

    tracing::info!("Client closed the connection, shutting down");
    Ok(())
}
