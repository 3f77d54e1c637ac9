//! Command implementations.

pub mod auth;
pub mod doctor;

pub use auth::{handle_import, handle_list, handle_logout, handle_show};
pub use doctor::{handle_completions, handle_doctor};
