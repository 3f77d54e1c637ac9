//! CLI module for cxk.

pub mod args;
pub mod commands;

pub use args::{AuthCommands, Cli, Commands};
