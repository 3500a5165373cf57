//! Command-line interface for Chunker
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `plan`: Build the module graph and write the chunk plan
//! - `explain`: Show the chunk decision for individual module ids

mod explain;
mod plan;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use crate::config::{Config, FlagOverrides, RouterMode};

pub use explain::ExplainCommand;
pub use plan::PlanCommand;

/// Chunker - deterministic manual chunking for frontend builds
#[derive(Parser, Debug)]
#[command(name = "chunker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to chunker.toml config file
    #[arg(short, long, global = true, default_value = "chunker.toml")]
    pub config: String,

    /// Override the PWA feature flag
    #[arg(long, global = true, env = "CHUNKER_PWA", value_parser = BoolishValueParser::new())]
    pub pwa: Option<bool>,

    /// Override the search feature flag
    #[arg(long, global = true, env = "CHUNKER_SEARCH", value_parser = BoolishValueParser::new())]
    pub search: Option<bool>,

    /// Override the router mode (hash or history)
    #[arg(long, global = true, env = "CHUNKER_ROUTER_MODE")]
    pub router_mode: Option<RouterMode>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the module graph and write the chunk plan
    Plan(PlanCommand),

    /// Explain which chunk module ids are assigned to
    Explain(ExplainCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        let config = self.load_config()?;

        match &self.command {
            Commands::Plan(cmd) => cmd.execute(config).await,
            Commands::Explain(cmd) => cmd.execute(&config),
        }
    }

    /// Load the config file and apply flag overrides, once per run
    fn load_config(&self) -> Result<Config> {
        info!("Loading configuration from {}", self.config);
        let mut config = Config::load(&self.config)?;
        config.apply_overrides(&self.flag_overrides());
        info!(
            "Flags: pwa={} search={} router={}",
            config.features.pwa, config.features.search, config.features.router_mode
        );
        Ok(config)
    }

    fn flag_overrides(&self) -> FlagOverrides {
        FlagOverrides {
            pwa: self.pwa,
            search: self.search,
            router_mode: self.router_mode,
        }
    }
}

/// Print the Chunker banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "Chunker".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
