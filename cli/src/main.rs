mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{grid, site};

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Site(args) => site::run(&cli, args),
        Commands::Grid(args) => grid::run(&cli, args),
        #[cfg(feature = "geocode")]
        Commands::Geocode(args) => commands::geocode::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
