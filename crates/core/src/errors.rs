//! Error types and handling
//!
//! The error taxonomy is structured with specific error enums for each domain
//! (network, extraction, authentication, launch, ...) that are then wrapped in
//! the main `LauncherError` enum for unified error handling.
//!
//! Integrity mismatches are not errors: they are a verdict that drives the
//! repair path (see [`crate::integrity::IntegrityVerdict`]).

use thiserror::Error;

/// Failures fetching remote resources (manifest, base package, installer)
#[derive(Error, Debug)]
pub enum NetworkError {
    /// The server answered with a non-success status
    #[error("HTTP {status} for URL: {url}")]
    Status { url: String, status: u16 },

    /// The request never produced a response (DNS, connect, TLS, body read)
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Writing the downloaded body to disk failed
    #[error("Failed to write download from {url}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Archive extraction errors
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The archive could not be opened or an entry could not be decoded
    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// An entry would be written outside the installation root
    #[error("Archive entry escapes the installation root: {entry}")]
    UnsafePath { entry: String },

    /// Filesystem error while writing an entry
    #[error("Failed to write archive entry")]
    Io(#[from] std::io::Error),

    /// The blocking extraction worker did not complete
    #[error("Extraction worker failed: {0}")]
    Join(String),
}

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// The user cancelled the interactive login
    #[error("Login was cancelled")]
    Cancelled,

    /// The identity provider answered with a shape we cannot turn into a credential
    #[error("Identity provider returned an invalid response: {message}")]
    InvalidResponse { message: String },

    /// The identity provider reported a failure
    #[error("Identity provider error: {reason}")]
    Provider { reason: String },

    /// The identity helper process could not be run
    #[error("Identity helper failed: {message}")]
    Helper { message: String },
}

/// Game launch errors
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The external launcher could not be spawned
    #[error("Failed to start external launcher {program}: {message}")]
    Spawn { program: String, message: String },

    /// The external launcher exited before reporting that the game started
    #[error("External launcher exited before the game started (exit code {code:?})")]
    ExitedBeforeStart { code: Option<i32> },

    /// The external launcher printed something that is not a known event
    #[error("Unexpected output from external launcher: {message}")]
    Protocol { message: String },

    /// No external launcher is configured
    #[error("No external launcher configured")]
    NotConfigured,

    /// Filesystem or process I/O error
    #[error("Launch I/O error")]
    Io(#[from] std::io::Error),
}

/// Setup orchestration errors
#[derive(Error, Debug)]
pub enum SetupError {
    /// A step was registered with a zero weight
    #[error("Setup step '{step}' must have a positive weight")]
    InvalidWeight { step: String },

    /// A step failed and aborted the run
    #[error("Setup step '{step}' failed")]
    StepFailed {
        step: String,
        #[source]
        source: Box<LauncherError>,
    },
}

/// Launcher configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file parsing error
    #[error("Failed to parse configuration file {path}: {message}")]
    Parsing { path: String, message: String },

    /// Configuration file I/O error
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),

    /// The installation root could not be determined
    #[error("Could not determine the user's home directory")]
    NoHomeDirectory,
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum LauncherError {
    /// Remote fetch failures
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// The remote manifest is not valid JSON for the manifest schema
    #[error("Invalid manifest: {message}")]
    Manifest { message: String },

    /// Extraction failures
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Authentication failures
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Launch failures
    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    /// Orchestration failures
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    /// Configuration failures
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Persisting settings or credentials failed
    #[error("Failed to persist {what}")]
    Persist {
        what: String,
        #[source]
        source: std::io::Error,
    },

    /// A downloaded artifact does not match its expected digest
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    Integrity {
        path: String,
        expected: String,
        actual: String,
    },

    /// Generic filesystem error
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl LauncherError {
    /// Returns true when the error is a user-cancelled login
    pub fn is_cancelled_login(&self) -> bool {
        match self {
            LauncherError::Auth(AuthError::Cancelled) => true,
            LauncherError::Setup(SetupError::StepFailed { source, .. }) => {
                source.is_cancelled_login()
            }
            _ => false,
        }
    }
}

/// Convenience type alias for Results with LauncherError
pub type Result<T> = std::result::Result<T, LauncherError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_network_error_display() {
        let error = NetworkError::Status {
            url: "https://example.com/manifest.json".to_string(),
            status: 404,
        };
        assert_eq!(
            format!("{}", error),
            "HTTP 404 for URL: https://example.com/manifest.json"
        );
    }

    #[test]
    fn test_auth_error_display() {
        assert_eq!(format!("{}", AuthError::Cancelled), "Login was cancelled");
        let error = AuthError::Provider {
            reason: "account locked".to_string(),
        };
        assert_eq!(format!("{}", error), "Identity provider error: account locked");
    }

    #[test]
    fn test_launcher_error_from_domain_errors() {
        let err: LauncherError = AuthError::Cancelled.into();
        assert!(matches!(err, LauncherError::Auth(_)));
        assert!(err.is_cancelled_login());

        let err: LauncherError = ExtractionError::UnsafePath {
            entry: "../evil".to_string(),
        }
        .into();
        assert!(matches!(err, LauncherError::Extraction(_)));
        assert!(!err.is_cancelled_login());
    }

    #[test]
    fn test_step_failure_keeps_source_chain() {
        let inner: LauncherError = NetworkError::Transport {
            url: "https://example.com".to_string(),
            message: "connection refused".to_string(),
        }
        .into();
        let err: LauncherError = SetupError::StepFailed {
            step: "Preparing game".to_string(),
            source: Box::new(inner),
        }
        .into();

        assert!(err.to_string().contains("Preparing game"));
        let source = err.source().expect("setup error source");
        assert!(source.source().is_some());
    }

    #[test]
    fn test_cancelled_login_seen_through_step_failure() {
        let err: LauncherError = SetupError::StepFailed {
            step: "Installing game".to_string(),
            source: Box::new(AuthError::Cancelled.into()),
        }
        .into();
        assert!(err.is_cancelled_login());
    }

    #[test]
    fn test_anyhow_conversions() {
        let err = LauncherError::Manifest {
            message: "expected object".to_string(),
        };
        let anyhow_error = anyhow::Error::from(err);
        assert!(anyhow_error.to_string().contains("Invalid manifest"));
    }
}
