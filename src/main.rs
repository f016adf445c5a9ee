//! Text Cleaner - Main Entry Point
//!
//! Cleans a text file, or every text file in a directory, chunk by chunk.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use text_cleaner::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "text_cleaner=info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Text Cleaner v{}", env!("CARGO_PKG_VERSION"));

    let summary = cli::run(cli).await?;
    if !summary.all_succeeded() {
        std::process::exit(1);
    }

    Ok(())
}
