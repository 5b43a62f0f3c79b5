//! ## winpan-cli
//! **Command-line front end**
//!
//! Inspects the live process tree and replays scenarios through the panning
//! controller.

use clap::Parser;
use winpan_config::WinpanConfig;
use winpan_telemetry::logging::EventLogger;

mod commands;

use commands::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => WinpanConfig::load_from_path(path)?,
        None => WinpanConfig::load()?,
    };
    EventLogger::init(&config.telemetry.log_level);

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Tree(args) => commands::print_tree(&config, args, &mut stdout),
        Commands::Descendants(args) => commands::print_descendants(&config, args, &mut stdout),
        Commands::Simulate(args) => commands::simulate(&config, args, &mut stdout),
        Commands::Generate(args) => commands::generate(args),
    }
}
