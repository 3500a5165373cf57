//! Explain command implementation

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::config::Config;
use crate::policy::{ChunkPolicy, Decision, NoGraph};

/// Explain which chunk module ids are assigned to
#[derive(Args, Debug)]
pub struct ExplainCommand {
    /// Module ids (absolute, or relative to the project root)
    #[arg(required = true)]
    pub ids: Vec<String>,
}

impl ExplainCommand {
    pub fn execute(&self, config: &Config) -> Result<()> {
        let policy = ChunkPolicy::from_config(config)?;

        for id in &self.ids {
            match policy.decide(id, &NoGraph) {
                Decision::Chunk { name, reason } => {
                    println!("{} -> {} ({})", id, name.green(), reason);
                }
                Decision::NoDecision(skip) => {
                    println!("{} -> {} ({})", id, "default".yellow(), skip);
                }
            }
        }

        Ok(())
    }
}
