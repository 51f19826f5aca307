mod cli;
mod commands;
mod input;
mod session;
mod shutdown;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "strikesync=debug"
    } else {
        "strikesync=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    match cli.command {
        Command::Run(args) => commands::run::run(&args),
        Command::Replay(args) => {
            commands::replay::run(&args.file, args.config.as_deref(), args.tick_hz)
        }
        Command::Config { output } => commands::config::run(output.as_deref()),
    }
}
