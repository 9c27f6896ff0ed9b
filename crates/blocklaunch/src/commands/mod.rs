//! Command implementations
//!
//! This module contains implementations for all CLI subcommands.

pub mod auth;
pub mod play;
pub mod settings;
pub mod setup;
pub mod shared;
pub mod status;
pub mod verify;

pub use shared::CommandContext;

/// Exit status when the interactive login was cancelled
pub const EXIT_LOGIN_CANCELLED: i32 = 3;

/// Exit status of a setup run that finished without a compatible Java runtime
pub const EXIT_RUNTIME_MISSING: i32 = 4;

/// Error used to exit with a specific status after a command finished
#[derive(Debug)]
pub struct CommandExitCode(pub i32);

impl std::fmt::Display for CommandExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Exit with code {}", self.0)
    }
}

impl std::error::Error for CommandExitCode {}
