//! Core library for the Blocks & Blades launcher
//!
//! This crate contains the launcher's setup pipeline (integrity check, base
//! package repair, Java runtime detection, install-only launch), the
//! authentication session lifecycle, game launch supervision, configuration,
//! logging, and error handling.

pub mod config;
pub mod credentials;
pub mod errors;
pub mod http;
pub mod integrity;
pub mod launch;
pub mod logging;
pub mod manifest;
pub mod notify;
pub mod orchestrator;
pub mod package;
pub mod paths;
pub mod platform;
pub mod progress;
pub mod runtime;
pub mod server_status;
pub mod session;
pub mod settings;
pub mod setup;

// Re-export IndexMap for use by dependent crates (manifest maps keep document order)
pub use indexmap::IndexMap;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
        assert!(version.contains('.'));
    }
}
