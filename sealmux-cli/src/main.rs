//! Command-line front-end for sealing and unsealing sealmux packages.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::extract::{self, ExtractArgs};
use commands::list::{self, ListArgs};
use commands::pack::{self, PackArgs};

#[derive(Parser)]
#[command(name = "sealmux", version, about = "Pack, list, and extract sealed packages")]
struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bundle a directory into a sealed package.
    Pack(PackArgs),
    /// Print a package's item table without decrypting its payload.
    List(ListArgs),
    /// Recover every item from a sealed package.
    Extract(ExtractArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .compact()
        .init();

    let result = match cli.command {
        Command::Pack(args) => pack::run(args),
        Command::List(args) => list::run(args),
        Command::Extract(args) => extract::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            commands::exit_code_for(&err)
        }
    }
}
