//! Plan command implementation

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::config::Config;
use crate::planner::{ChunkKind, PlanOptions, Planner};
use crate::utils::{format_duration, format_size};

/// Build the module graph and write the chunk plan
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Number of assignment workers
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the plan JSON to stdout instead of writing it
    #[arg(long)]
    pub stdout: bool,
}

impl PlanCommand {
    pub async fn execute(&self, config: Config) -> Result<()> {
        let start = Instant::now();

        eprintln!("{} Planning chunks...", "→".blue());

        let planner = Planner::new(config, self.into())?;
        let plan = planner.plan().await?;

        eprintln!(
            "\n{} Planned {} chunk(s) for {} module(s) in {}\n",
            "✓".green().bold(),
            plan.chunks.len(),
            plan.modules.len(),
            format_duration(start.elapsed())
        );

        for chunk in &plan.chunks {
            let kind = match chunk.kind {
                ChunkKind::Entry => "entry".bold(),
                ChunkKind::Vendor => "vendor".magenta(),
                ChunkKind::Feature => "feature".green(),
                ChunkKind::Manual => "manual".yellow(),
                ChunkKind::Shared => "shared".blue(),
                ChunkKind::Async => "async".cyan(),
            };

            eprintln!(
                "  {} {} {} {} {}",
                "•".dimmed(),
                chunk.name.cyan(),
                kind,
                format!("{} module(s)", chunk.modules.len()).dimmed(),
                format_size(chunk.size).dimmed()
            );
        }

        eprintln!();

        if self.stdout {
            println!("{}", planner.render(&plan)?);
        } else {
            let path = planner.write_plan(&plan)?;
            eprintln!("  {} Wrote {}\n", "✓".green(), path.display().to_string().cyan());
        }

        Ok(())
    }
}

impl From<&PlanCommand> for PlanOptions {
    fn from(cmd: &PlanCommand) -> Self {
        Self {
            outdir: cmd.outdir.clone(),
            jobs: cmd.jobs,
        }
    }
}
