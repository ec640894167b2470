use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pgcharm")]
#[command(about = "Reconcile PostgreSQL databases and credentials with related applications")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to ./pgcharm.toml)
    #[arg(short, long, global = true, env = "PGCHARM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level, overriding the settings file
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deliver a notification read from a JSON file ("-" for stdin)
    Dispatch(DispatchArgs),
    /// Replay deferred notifications
    Redeliver,
    /// Show provisioned databases and port state
    Status,
}

#[derive(clap::Args)]
pub struct DispatchArgs {
    /// Path to the notification JSON
    pub notification: PathBuf,
}
