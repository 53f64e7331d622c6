use anyhow::anyhow;
use clap::Parser;

use filemonitor::Settings;
use filemonitor::cli::commands::{init, watch};
use filemonitor::cli::{Cli, Commands};
use filemonitor::logging;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Init must work even when an existing settings file is broken
    let settings = match &cli.command {
        Commands::Init { .. } => Settings::default(),
        _ => match &cli.config {
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        }
        .map_err(|e| anyhow!("Configuration error: {e}"))?,
    };

    logging::init_with_config(&settings.logging);

    match &cli.command {
        Commands::Init { force } => init::run_init(*force),
        Commands::Watch(args) => watch::run_watch(args, &settings),
        Commands::Config => init::run_config(&settings),
    }
}
