//! CLI argument definitions using clap derive

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{self, BatchConfig, Settings, DEFAULT_MODEL};
use crate::pipeline::inference::OPENROUTER_BASE_URL;
use crate::pipeline::replenishment::RunOptions;

#[derive(Parser, Debug)]
#[command(name = "replenish")]
#[command(version, about = "Substrate-family replenishment decisions")]
#[command(long_about = "Groups stock records into substrate families, decides YES/NO/SLIT per material \
    (local rules first, AI arbitration otherwise) and writes the decisions back to the stock documents. \
    Progress is checkpointed so an interrupted run can be resumed.")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Stock document database
    #[arg(long, global = true, env = "REPLENISH_DATABASE")]
    pub database: Option<PathBuf>,

    /// Debug logging for this crate
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List discovered families with their material counts
    Families,

    /// Verify configuration without calling the inference service
    Check(CheckArgs),
}

#[derive(Args, Clone, Debug)]
pub struct CheckArgs {
    /// System prompt file (default: built-in prompt)
    #[arg(long)]
    pub system_prompt: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Process only this family key
    pub family: Option<String>,

    /// Decide but never write to the document store
    #[arg(long)]
    pub dry_run: bool,

    /// Continue from the checkpoint, skipping processed families
    #[arg(long)]
    pub resume: bool,

    /// Checkpoint file
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Model identifier sent to the inference service
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// System prompt file (default: built-in prompt)
    #[arg(long)]
    pub system_prompt: Option<PathBuf>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = OPENROUTER_BASE_URL)]
    pub endpoint: String,

    /// Families decided concurrently per batch
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub concurrency: u64,

    /// Save the checkpoint every N batches
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub save_every: u64,

    /// Pause between batches, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub batch_delay_ms: u64,

    /// Directory for undecodable model responses
    #[arg(long)]
    pub debug_dir: Option<PathBuf>,
}

impl RunArgs {
    pub fn options(&self) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            resume: self.resume,
            family_filter: self.family.clone(),
        }
    }

    /// Resolve flags over defaults. The API key is left for the caller.
    pub fn settings(&self, global: &GlobalOpts) -> Settings {
        let defaults = BatchConfig::default();
        Settings {
            database_path: database_path(global),
            checkpoint_path: self
                .checkpoint
                .clone()
                .unwrap_or_else(config::default_checkpoint_path),
            debug_dir: self.debug_dir.clone().unwrap_or_else(config::default_debug_dir),
            system_prompt_path: self.system_prompt.clone(),
            model: self.model.trim().to_string(),
            endpoint: self.endpoint.clone(),
            api_key: None,
            batch: BatchConfig {
                concurrency: self.concurrency as usize,
                save_every_batches: self.save_every as usize,
                batch_delay: Duration::from_millis(self.batch_delay_ms),
                ..defaults
            },
        }
    }
}

pub fn database_path(global: &GlobalOpts) -> PathBuf {
    global
        .database
        .clone()
        .unwrap_or_else(config::default_database_path)
}
