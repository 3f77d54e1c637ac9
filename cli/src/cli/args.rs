//! Command-line argument parsing.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// contextkit credential manager.
///
/// Lists, inspects, imports and removes the OAuth tokens contextkit stores
/// for protocol servers.
#[derive(Parser, Debug)]
#[command(name = "cxk")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Never touch the OS keyring; use the fallback file only.
    #[arg(long, global = true)]
    pub no_keychain: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage stored server credentials.
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Generate shell completion scripts.
    ///
    /// Outputs completion script for the specified shell.
    /// Follow shell-specific instructions to install.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: ShellType,
    },

    /// Check credential storage and diagnose issues.
    ///
    /// Verifies configuration, the fallback file, and keyring access.
    Doctor,
}

/// Supported shell types for completions.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
}

/// Authentication subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// List servers with stored credentials.
    List,

    /// Show stored credentials for a server (tokens are masked).
    Show {
        /// Server identity, e.g. the configured MCP server name.
        identity: String,
    },

    /// Store a token obtained elsewhere.
    Import(ImportArgs),

    /// Remove stored credentials.
    Logout {
        /// Server identity to log out of.
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        identity: Option<String>,

        /// Remove credentials for every server.
        #[arg(long)]
        all: bool,
    },
}

/// Arguments for `cxk auth import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Server identity to store the token under.
    pub identity: String,

    /// OAuth access token.
    #[arg(long, env = "CXK_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// OAuth refresh token.
    #[arg(long, env = "CXK_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Token type.
    #[arg(long, default_value = "Bearer")]
    pub token_type: String,

    /// Seconds until the access token expires.
    #[arg(long)]
    pub expires_in: Option<i64>,

    /// Granted scopes, space-delimited.
    #[arg(long)]
    pub scope: Option<String>,

    /// OAuth client id the token was issued to.
    #[arg(long)]
    pub client_id: Option<String>,
}
