use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "strikesync")]
#[command(version, about = "Pose-driven two-player fighting game core")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Listen for pose packets and run matches
    Run(RunArgs),
    /// Feed a JSON-lines capture through the pipeline offline
    Replay(ReplayArgs),
    /// Write the default configuration as TOML
    Config {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Configuration file
    #[arg(short, long, default_value = "strikesync.toml")]
    pub config: PathBuf,

    /// UDP port for pose packets (overrides the config file)
    #[arg(short, long, env = "STRIKESYNC_PORT")]
    pub port: Option<u16>,

    /// Directory for session event logs
    #[arg(long, default_value = "sessions")]
    pub session_dir: PathBuf,

    /// Do not write a session event log
    #[arg(long)]
    pub no_session: bool,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Capture file, one pose packet per line
    pub file: PathBuf,

    /// Configuration file (defaults if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ticks per second; one packet is fed per tick
    #[arg(long)]
    pub tick_hz: Option<u32>,
}
