//! Credstash CLI - credential management with AWS KMS and DynamoDB
//!
//! This is the main entry point for the credstash command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use credstash_core::Error as StoreError;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

/// Exit codes by failure class
const EXIT_FAILURE: u8 = 1;
const EXIT_NOT_FOUND: u8 = 2;
const EXIT_INTEGRITY: u8 = 3;
const EXIT_KEY_SERVICE: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&format!("{:#}", err));
            let (code, hint) = classify(&err);
            if let Some(hint) = hint {
                output::hint(hint);
            }
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config.as_deref();
    let store = &cli.store;

    match cli.command {
        Commands::Put(args) => commands::put::run(args, store, config).await,
        Commands::Get(args) => commands::get::run(args, store, config).await,
        Commands::Delete(args) => commands::delete::run(args, store, config).await,
        Commands::List(args) => commands::list::run(args, store, config).await,
        Commands::Setup => commands::setup::run(store, config).await,
    }
}

/// Map a failure to its exit code and remediation hint
fn classify(err: &anyhow::Error) -> (u8, Option<&'static str>) {
    match err.downcast_ref::<StoreError>() {
        Some(e) if e.is_not_found() => (EXIT_NOT_FOUND, None),
        Some(e) if e.is_integrity_failure() => (
            EXIT_INTEGRITY,
            Some("The stored record is corrupt or was written under a different encryption context"),
        ),
        Some(e) if e.is_key_service_failure() => (
            EXIT_KEY_SERVICE,
            Some("Check KMS permissions, the key id and the --context value"),
        ),
        _ => (EXIT_FAILURE, None),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
