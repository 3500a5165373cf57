//! Chunker - deterministic manual chunking for frontend builds
//!
//! Walks a project's module graph and decides, for every module, which
//! output chunk it belongs to:
//! - per-package vendor chunks, with merge groups for packages that always
//!   load together
//! - per-feature chunks for first-party route directories
//! - longest-prefix rules for everything else

use anyhow::Result;
use chunker_lib::Cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("chunker=debug,chunker_lib=debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("chunker=info,chunker_lib=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    cli.execute().await
}
