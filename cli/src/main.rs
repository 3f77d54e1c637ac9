//! cxk - contextkit CLI
//!
//! Inspect and manage the OAuth credentials contextkit keeps for protocol
//! servers, stored in the OS keyring or a locked fallback file.

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cxk::config::{load_config, settings::env};
use cxk::{CxkError, Result};

use crate::cli::{AuthCommands, Cli, Commands};

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging on stderr so stdout stays scriptable
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(env::LOG_LEVEL)
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Run the command
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(exit_code(&e));
    }
}

/// Process exit status for a failed command.
///
/// `2` for bad input, `75` (`EX_TEMPFAIL`) when storage may answer on a retry,
/// `1` for everything else.
fn exit_code(err: &CxkError) -> i32 {
    if err.is_caller_error() {
        2
    } else if err.is_retriable() {
        75
    } else {
        1
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config()?;
    if cli.no_keychain {
        config.storage.keychain_enabled = false;
    }

    match cli.command {
        Commands::Auth { command } => match command {
            AuthCommands::List => cli::commands::handle_list(&config.storage),
            AuthCommands::Show { identity } => {
                cli::commands::handle_show(&config.storage, &identity)
            }
            AuthCommands::Import(args) => cli::commands::handle_import(&config.storage, args),
            AuthCommands::Logout { identity, all } => {
                cli::commands::handle_logout(&config.storage, identity.as_deref(), all)
            }
        },
        Commands::Completions { shell } => cli::commands::handle_completions(shell),
        Commands::Doctor => cli::commands::handle_doctor(&config.storage),
    }
}
