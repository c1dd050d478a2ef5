//! Motorcrew - automobile research crew

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{init_command, run_command, status_command, RunOptions};

/// Motorcrew - research a vehicle and write a report
#[derive(Parser)]
#[command(name = "motorcrew")]
#[command(about = "◆ An automobile research crew")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Vehicle to research, e.g. Tesla Model 3
    subject: Vec<String>,

    /// Config file (default: ~/.motorcrew/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the report file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,
    /// Show configuration and credential status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the result
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Some(Commands::Init) => init_command().await,
        Some(Commands::Status) => status_command(cli.config.as_deref()).await,
        None => {
            let subject = if cli.subject.is_empty() {
                None
            } else {
                Some(cli.subject.join(" "))
            };
            run_command(RunOptions {
                subject,
                config: cli.config,
                output_dir: cli.output_dir,
            })
            .await
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
