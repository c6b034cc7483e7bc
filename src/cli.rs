// src/cli.rs

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    pub log_level: String,

    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the monitoring backend (ingestion API, SSE hub, schedulers)
    Serve(ServeArgs),
    /// Print version information
    Version,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (overrides the config file)
    #[arg(long)]
    pub listen: Option<String>,
}
