mod config;
mod embedding;
mod handlers;
mod mcp;
mod parser;
mod retrieval;
mod snapshot;
mod source;
mod vector_db;

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use mcp::server::McpServer;

/// Load the first `.env` found: the working directory, then
/// `$XDG_CONFIG_HOME/code-ask-mcp/.env` (default `~/.config`). Variables already
/// set in the environment win over both.
fn load_env_files() -> Option<PathBuf> {
    let candidates = [
        std::env::current_dir().ok().map(|dir| dir.join(".env")),
        xdg_config_dir().map(|dir| dir.join("code-ask-mcp").join(".env")),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|path| path.exists() && dotenv::from_path(path).is_ok())
}

fn xdg_config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before logging init so RUST_LOG can come from .env
    let env_file = load_env_files();

    // stdout carries the protocol, so logs go to stderr; quiet unless RUST_LOG says otherwise
    let env_filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("error"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    match env_file {
        Some(path) => tracing::debug!("Loaded .env from: {}", path.display()),
        None => tracing::debug!("No .env file found, using environment variables only"),
    }
    tracing::info!("Starting Code Ask MCP server...");

    let config = Config::from_env()?;
    let server = McpServer::new(config);
    server.start().await?;

    Ok(())
}
