//! Persisted credential storage
//!
//! A credential is remembered only when the user asked for it at login. The
//! store holds at most one credential in `auth_tokens.json`; anything that
//! does not parse as a complete credential is treated as no credential.

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A game session credential issued by the identity provider
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub client_token: String,
    #[serde(rename = "uuid")]
    pub user_id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    /// Opaque provider data. A JSON `null` is stored as absent.
    #[serde(
        rename = "user_properties",
        default,
        skip_serializing_if = "metadata_is_absent"
    )]
    pub session_metadata: Option<serde_json::Value>,
}

fn metadata_is_absent(metadata: &Option<serde_json::Value>) -> bool {
    matches!(metadata, None | Some(serde_json::Value::Null))
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("client_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Single-slot credential file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(root: &Path) -> Self {
        Self {
            path: crate::paths::credentials_file(root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted credential; absent, partial or corrupt files yield `None`
    pub fn load(&self) -> Option<Credential> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read stored credential: {}", e);
                }
                return None;
            }
        };

        match serde_json::from_str::<Credential>(&content) {
            Ok(credential) => {
                debug!(user = %credential.display_name, "Loaded stored credential");
                Some(credential)
            }
            Err(e) => {
                warn!("Ignoring unreadable credential file: {}", e);
                None
            }
        }
    }

    /// Persist a credential, replacing any previous one
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_vec(credential).map_err(|e| {
            crate::errors::LauncherError::Persist {
                what: "credential".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            }
        })?;
        crate::paths::write_atomic(&self.path, &json, "credential")?;
        debug!(user = %credential.display_name, "Stored credential");
        Ok(())
    }

    /// Remove the persisted credential; missing files are not an error
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Cleared stored credential");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(crate::errors::LauncherError::Persist {
                what: "credential".to_string(),
                source,
            }),
        }
    }

    /// Whether a credential file is present on disk
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

#[cfg(test)]
pub(crate) fn sample_credential(name: &str) -> Credential {
    Credential {
        access_token: format!("access-{name}"),
        client_token: String::new(),
        user_id: format!("uuid-{name}"),
        display_name: name.to_string(),
        session_metadata: Some(serde_json::json!({})),
    }
}
