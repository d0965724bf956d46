//! stylesheet-studio: run XSLT transforms from the command line

mod args;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::filter::EnvFilter;

use crate::args::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Transform(args) => commands::transform(args).await,
        Command::Engines(args) => commands::engines(args),
        Command::XrustWorker => commands::xrust_worker(),
    }
}

/// Operator logs go to stderr; stdout carries results only.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
