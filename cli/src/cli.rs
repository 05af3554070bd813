use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[clap(name = "watchlist", version)]
pub struct Cli {
    /// Seconds between quote refreshes (overrides REFRESH_INTERVAL_SECS)
    #[clap(long)]
    pub refresh_interval_secs: Option<u64>,

    /// JSON instrument catalog (overrides CATALOG_PATH)
    #[clap(long)]
    pub catalog: Option<PathBuf>,

    /// Ignore REMOTE_DATABASE_URL and keep everything on this machine
    #[clap(long)]
    pub local_only: bool,
}

impl Cli {
    pub fn apply(&self, cfg: &mut AppConfig) {
        if let Some(secs) = self.refresh_interval_secs {
            cfg.refresh_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(path) = &self.catalog {
            cfg.catalog_path = Some(path.clone());
        }
        if self.local_only {
            cfg.remote_database_url = None;
        }
    }
}

/// One line typed at the prompt.
#[derive(Debug, Parser)]
#[command(no_binary_name = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Track an instrument
    Add { symbol: String },
    /// Stop tracking an instrument by id
    Remove { id: String },
    /// Regenerate quotes now
    Refresh,
    /// Show the watchlist
    List,
    /// Show top gainer and loser
    Movers,
    SignIn,
    SignOut,
    /// Answer the pending local-data migration
    Migrate { decision: Decision },
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Decision {
    Accept,
    Decline,
}

pub fn parse_line(line: &str) -> Result<Command, clap::Error> {
    Line::try_parse_from(line.split_whitespace()).map(|l| l.command)
}
