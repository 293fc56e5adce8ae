//! Resumable uploader entry point.
//!
//! Usage: `resumable-upload [--config PATH] [--endpoint URL] [--chunk-size BYTES] FILE`

mod app;
mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, PartialEq, Parser)]
#[command(name = "resumable-upload")]
#[command(about = "Upload a file to a tus server, resuming earlier attempts", long_about = None)]
struct Args {
    /// File to upload
    file: PathBuf,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Creation endpoint, overrides the config file
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Chunk size in bytes, overrides the config file
    #[arg(long)]
    chunk_size: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    tracing::info!(endpoint = %config.endpoint, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, args.file))
}
