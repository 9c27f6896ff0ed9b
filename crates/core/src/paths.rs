//! Installation root resolution
//!
//! All persisted launcher state (game files, settings, credentials, the log
//! file and the loader installer cache) lives below one per-user directory.

use crate::errors::{ConfigError, LauncherError, Result};
use crate::platform::Platform;
use directories_next::BaseDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the installation root
pub const ROOT_ENV_VAR: &str = "BLOCKLAUNCH_ROOT";

/// Default name of the game folder
pub const DEFAULT_GAME_FOLDER: &str = ".blocks-and-blades";

/// Settings file name inside the root
pub const SETTINGS_FILE: &str = "settings.json";

/// Credential file name inside the root
pub const CREDENTIALS_FILE: &str = "auth_tokens.json";

/// Optional launcher configuration override inside the root
pub const CONFIG_FILE: &str = "launcher.toml";

/// Resolve the installation root for the given folder name.
///
/// `BLOCKLAUNCH_ROOT` wins when set. Otherwise macOS and Windows use the
/// per-user application data directory and every other platform uses the home
/// directory directly.
pub fn game_root(folder: &str) -> Result<PathBuf> {
    if let Ok(overridden) = std::env::var(ROOT_ENV_VAR) {
        if !overridden.is_empty() {
            debug!("Using installation root from {}: {}", ROOT_ENV_VAR, overridden);
            return Ok(PathBuf::from(overridden));
        }
    }

    let platform = Platform::detect();
    let base = base_directory(platform).ok_or(ConfigError::NoHomeDirectory)?;
    Ok(base.join(folder))
}

fn base_directory(platform: Platform) -> Option<PathBuf> {
    let dirs = BaseDirs::new();
    match platform {
        Platform::MacOS | Platform::Windows => dirs
            .map(|d| d.data_dir().to_path_buf())
            .or_else(|| std::env::var_os("APPDATA").map(PathBuf::from)),
        Platform::Linux => dirs
            .map(|d| d.home_dir().to_path_buf())
            .or_else(|| std::env::var_os("HOME").map(PathBuf::from)),
    }
}

/// Location of the settings file
pub fn settings_file(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}

/// Location of the persisted credential
pub fn credentials_file(root: &Path) -> PathBuf {
    root.join(CREDENTIALS_FILE)
}

/// Directory caching the loader installer artifact
pub fn temp_dir(root: &Path) -> PathBuf {
    root.join("temp")
}

/// Write `bytes` to `path` through a sibling temporary file and a rename, so
/// readers observe either the previous content or the complete new content.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8], what: &str) -> Result<()> {
    let persist_err = |source: std::io::Error| LauncherError::Persist {
        what: what.to_string(),
        source,
    };

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(persist_err)?;

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("state");
    let temp_path = parent.join(format!(".{}.tmp", file_name));

    std::fs::write(&temp_path, bytes).map_err(persist_err)?;

    // On Windows, remove destination file if it exists before rename
    #[cfg(windows)]
    if path.exists() {
        std::fs::remove_file(path).map_err(persist_err)?;
    }

    std::fs::rename(&temp_path, path).map_err(persist_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("state.json");
        write_atomic(&target, b"first", "state").unwrap();
        write_atomic(&target, b"second", "state").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
        assert!(!dir.path().join("nested").join(".state.json.tmp").exists());
    }

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_root_override_from_env() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::set_var(ROOT_ENV_VAR, "/tmp/blocklaunch-root");
        let root = game_root(DEFAULT_GAME_FOLDER).unwrap();
        std::env::remove_var(ROOT_ENV_VAR);
        assert_eq!(root, PathBuf::from("/tmp/blocklaunch-root"));
    }

    #[test]
    fn test_default_root_ends_with_folder() {
        let _guard = ENV_MUTEX.lock().unwrap();
        std::env::remove_var(ROOT_ENV_VAR);
        if let Ok(root) = game_root(DEFAULT_GAME_FOLDER) {
            assert!(root.ends_with(DEFAULT_GAME_FOLDER));
        }
    }

    #[test]
    fn test_file_locations() {
        let root = Path::new("/games/bb");
        assert_eq!(settings_file(root), root.join("settings.json"));
        assert_eq!(credentials_file(root), root.join("auth_tokens.json"));
        assert_eq!(temp_dir(root), root.join("temp"));
    }
}
