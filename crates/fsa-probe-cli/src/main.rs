//! FSA probe CLI - discover FSA devices and measure per-device packet loss.
//!
//! Discovery broadcasts a challenge on the local subnet; `monitor` then keeps
//! one loss probe running per device until interrupted.

mod cli;
mod commands;
mod device;
mod error;
mod logging;
mod output;

use clap::Parser;

use cli::{Cli, Commands};
use error::{exit_codes, CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Discover(args) => commands::run_discover(args, cli.json).await,
        Commands::Monitor(args) => commands::run_monitor(args, cli.json).await,
    }
}
