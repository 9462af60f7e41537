mod commands;
mod config;

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use poller_core::ResetAspect;
use poller_logging::{poller_info, LogDestination};

use crate::config::{PollerConfig, DEFAULT_CONFIG_PATH};

#[derive(Debug, Parser)]
#[command(name = "tweet_poller", about = "Poll a timeline and archive new tweets")]
struct Cli {
    /// Path to the RON config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Also print notifications to the terminal.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one fetch cycle.
    Fetch,
    /// Clear the watermark, counter, stored records and tweet files.
    Reset {
        /// Aspects to keep (since_id, count, db, files). Replaces the configured set.
        #[arg(long, value_delimiter = ',')]
        preserve: Option<Vec<ResetAspect>>,
    },
    /// Show the watermark, counter and stored totals.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, origin) = PollerConfig::load(&cli.config)?;

    let destination = if cli.verbose {
        LogDestination::Both
    } else {
        LogDestination::File
    };
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    poller_logging::initialize(destination, level, &config.log_file);
    poller_info!("{origin}");

    match cli.command {
        Command::Fetch => commands::fetch(&config),
        Command::Reset { preserve } => {
            let preserve: BTreeSet<ResetAspect> = match preserve {
                Some(aspects) => aspects.into_iter().collect(),
                None => config.preserve_on_reset.clone(),
            };
            commands::reset(&config, &preserve)
        }
        Command::Status => commands::status(&config),
    }
}
