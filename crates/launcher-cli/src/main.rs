//! Feature launcher CLI
//!
//! Merges feature descriptors into a single application descriptor and
//! launches it on the built-in sandbox runtime.

mod cli;
mod config;
mod error;
mod runner;
mod sandbox;
mod supply;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    match runner::run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            std::process::exit(e.exit_code());
        }
    }
}
