//! Host platform detection
//!
//! The launcher only distinguishes the three desktop families it ships for;
//! the distinction drives where the installation root lives and which
//! directories are scanned for a Java runtime.

use std::fmt;
use tracing::instrument;

/// Desktop platform families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux and other Unix-like systems
    Linux,
    /// macOS
    MacOS,
    /// Windows
    Windows,
}

impl Platform {
    /// Detect the platform the launcher was compiled for
    #[instrument]
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    /// File name of the Java launcher binary on this platform
    pub fn java_executable(self) -> &'static str {
        match self {
            Platform::Windows => "java.exe",
            Platform::Linux | Platform::MacOS => "java",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Linux => write!(f, "linux"),
            Platform::MacOS => write!(f, "macos"),
            Platform::Windows => write!(f, "windows"),
        }
    }
}
