//! Static launcher configuration
//!
//! Every value the launcher needs that is not user-editable lives here: remote
//! URLs, pinned game and loader versions, the server to probe and auto-connect
//! to, timing constants and the default user settings. The compiled-in
//! defaults can be overlaid with a TOML file whose sections all default, so an
//! override file only has to name the keys it changes.
//!
//! ```toml
//! [game]
//! loader_version = "21.1.220"
//!
//! [external]
//! process_launcher = "/opt/blocklaunch/mclc-bridge"
//! ```

use crate::errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Environment variable naming a TOML override file
pub const CONFIG_ENV_VAR: &str = "BLOCKLAUNCH_CONFIG";

/// Placeholder substituted into the loader installer URL template
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Complete launcher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LauncherConfig {
    pub launcher: LauncherSection,
    pub remote: RemoteSection,
    pub game: GameSection,
    pub server: ServerSection,
    pub runtime: RuntimeSection,
    pub timing: TimingSection,
    pub defaults: DefaultSettings,
    pub remediation: RemediationSection,
    pub external: ExternalSection,
}

/// Identity of the launcher itself
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LauncherSection {
    pub version: String,
    /// Folder name of the installation root
    pub game_folder: String,
}

impl Default for LauncherSection {
    fn default() -> Self {
        Self {
            version: "1.0.1".to_string(),
            game_folder: crate::paths::DEFAULT_GAME_FOLDER.to_string(),
        }
    }
}

/// Remote locations of the manifest and base package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteSection {
    pub manifest_url: String,
    pub base_package_url: String,
    /// Top-level directory inside the base package archive that maps to the root
    pub archive_root: String,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            manifest_url: "https://pub-8cc4941d55dd48c48872461fb8913431.r2.dev/manifest.json"
                .to_string(),
            base_package_url:
                "https://pub-8cc4941d55dd48c48872461fb8913431.r2.dev/blocks-and-blades-1.0.0.zip"
                    .to_string(),
            archive_root: crate::paths::DEFAULT_GAME_FOLDER.to_string(),
        }
    }
}

/// Pinned game and mod loader versions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameSection {
    pub version: String,
    pub loader_version: String,
    /// URL template containing `{version}`
    pub loader_installer_url: String,
    /// File name template containing `{version}`
    pub loader_installer_file: String,
    /// Expected SHA-256 (hex) of the loader installer, when known
    pub loader_installer_sha256: Option<String>,
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            version: "1.21.1".to_string(),
            loader_version: "21.1.219".to_string(),
            loader_installer_url: "https://maven.neoforged.net/releases/net/neoforged/neoforge/{version}/neoforge-{version}-installer.jar".to_string(),
            loader_installer_file: "neoforge-{version}-installer.jar".to_string(),
            loader_installer_sha256: None,
        }
    }
}

impl GameSection {
    /// Download URL of the loader installer for `version`
    pub fn installer_url(&self, version: &str) -> String {
        self.loader_installer_url
            .replace(VERSION_PLACEHOLDER, version)
    }

    /// Cached file name of the loader installer for `version`
    pub fn installer_file_name(&self, version: &str) -> String {
        self.loader_installer_file
            .replace(VERSION_PLACEHOLDER, version)
    }
}

/// Multiplayer server used for quick play and the status probe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Connect to the server directly when the game starts
    pub auto_connect: bool,
    /// How often a UI should refresh the status, in seconds
    pub status_refresh_interval_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "blocks-and-blades.nitro.games".to_string(),
            port: 26365,
            auto_connect: true,
            status_refresh_interval_secs: 300,
        }
    }
}

impl ServerSection {
    /// `host:port` identifier handed to the game for quick play
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn status_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.status_refresh_interval_secs)
    }
}

/// Java runtime requirements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeSection {
    pub required_major: u32,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self { required_major: 21 }
    }
}

/// Timing constants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingSection {
    /// A non-zero exit within this window counts as an early crash
    pub crash_grace_secs: u64,
    pub probe_timeout_ms: u64,
    /// Pause between the final 100% and the finished event
    pub completion_delay_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            crash_grace_secs: 10,
            probe_timeout_ms: 5_000,
            completion_delay_ms: 500,
        }
    }
}

impl TimingSection {
    pub fn crash_grace(&self) -> Duration {
        Duration::from_secs(self.crash_grace_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }
}

/// Defaults for the user-editable settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DefaultSettings {
    pub min_memory: String,
    pub max_memory: String,
    pub minimize_on_launch: bool,
    pub language: String,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            min_memory: "2G".to_string(),
            max_memory: "4G".to_string(),
            minimize_on_launch: true,
            language: "fr".to_string(),
        }
    }
}

/// Where users are sent to install or repair a runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemediationSection {
    pub runtime_download_mac: String,
    pub runtime_download_windows: String,
    pub runtime_download_other: String,
}

impl Default for RemediationSection {
    fn default() -> Self {
        Self {
            runtime_download_mac: "https://adoptium.net/temurin/releases/?os=mac".to_string(),
            runtime_download_windows: "https://adoptium.net/temurin/releases/?os=windows"
                .to_string(),
            runtime_download_other: "https://adoptium.net/temurin/releases/?os=linux".to_string(),
        }
    }
}

/// External executables implementing the identity and launch capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExternalSection {
    pub identity_helper: Option<PathBuf>,
    pub process_launcher: Option<PathBuf>,
}

impl LauncherConfig {
    /// Load a TOML override file on top of the compiled-in defaults
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading launcher configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            crate::errors::LauncherError::Config(ConfigError::Parsing { message, .. }) => {
                ConfigError::Parsing {
                    path: path.display().to_string(),
                    message,
                }
                .into()
            }
            other => other,
        })
    }

    /// Parse a TOML document on top of the compiled-in defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ConfigError::Parsing {
                path: "<inline>".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Resolve the configuration for a run.
    ///
    /// An explicit path must exist. Otherwise `BLOCKLAUNCH_CONFIG` is consulted,
    /// then `<root>/launcher.toml` if present; without any of them the
    /// compiled-in defaults apply.
    pub fn discover(explicit: Option<&Path>, root: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Self::load(Path::new(&path));
            }
        }
        if let Some(root) = root {
            let candidate = root.join(crate::paths::CONFIG_FILE);
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }
        Ok(Self::default())
    }

    /// Remediation URL for the given platform
    pub fn runtime_download_url(&self, platform: crate::platform::Platform) -> &str {
        use crate::platform::Platform;
        match platform {
            Platform::MacOS => &self.remediation.runtime_download_mac,
            Platform::Windows => &self.remediation.runtime_download_windows,
            Platform::Linux => &self.remediation.runtime_download_other,
        }
    }
}
