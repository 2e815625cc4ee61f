use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Default, Parser)]
#[command(
    name = "chronicle",
    version,
    about = "Watch Tautulli activity and monitor upcoming episodes in Sonarr"
)]
pub struct Cli {
    /// Path to the TOML config file (defaults to the user config directory).
    #[arg(long, global = true, env = "CHRONICLE_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, env = "CHRONICLE_TAUTULLI_URL")]
    pub tautulli_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "CHRONICLE_TAUTULLI_API_KEY",
        hide_env_values = true
    )]
    pub tautulli_api_key: Option<String>,

    #[arg(long, global = true, env = "CHRONICLE_SONARR_URL")]
    pub sonarr_url: Option<String>,

    #[arg(
        long,
        global = true,
        env = "CHRONICLE_SONARR_API_KEY",
        hide_env_values = true
    )]
    pub sonarr_api_key: Option<String>,

    /// Seconds to wait between polls.
    #[arg(long, global = true, env = "CHRONICLE_INTERVAL_SECS")]
    pub interval_secs: Option<u64>,

    /// Minimum watched percentage before a session triggers monitoring.
    #[arg(long, global = true, env = "CHRONICLE_WATCHED_PERCENTAGE")]
    pub watched_percentage: Option<u8>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll until terminated (the default).
    Run {
        /// Run a single poll cycle and exit.
        #[arg(long)]
        once: bool,
    },
}

impl Cli {
    pub fn run_once(&self) -> bool {
        matches!(self.command, Some(Command::Run { once: true }))
    }
}
