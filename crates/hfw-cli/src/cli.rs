use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hfw")]
#[command(
    author,
    version,
    about = "Hello Future World logger tooling: funnel stats and telemetry setup"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Stats store file
    #[arg(long, global = true, env = "HFW_LOGGER_FILE")]
    pub store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the funnel summary over all scripts, then offer to share it
    Stats {
        /// Share without asking
        #[arg(long, conflicts_with = "no_share")]
        share: bool,

        /// Do not share and do not ask
        #[arg(long)]
        no_share: bool,
    },

    /// Create the telemetry topic and write logger.json.sample
    InitTopic {
        /// Memo the topic is created with; sessions check it before publishing
        #[arg(default_value = "HFW-METRICS")]
        memo: String,
    },
}

impl Commands {
    /// `Some` when the sharing decision was made on the command line
    pub fn share_decision(&self) -> Option<bool> {
        match self {
            Commands::Stats { share: true, .. } => Some(true),
            Commands::Stats { no_share: true, .. } => Some(false),
            _ => None,
        }
    }
}
