//! Remote installation manifest
//!
//! The manifest describes what a healthy installation looks like. It is
//! fetched fresh on every setup run and never cached.

use crate::errors::{LauncherError, Result};
use crate::http::HttpClient;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Expected state of the installation root
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub version: String,
    /// Paths that must exist; informational
    #[serde(default)]
    pub required: Vec<String>,
    /// Glob patterns of critical files; informational
    #[serde(default)]
    pub critical_globs: Vec<String>,
    /// Minimum number of direct entries per directory
    #[serde(default)]
    pub min_counts: IndexMap<String, u64>,
    /// `relative path -> "algorithm:hexdigest"`, checked in document order
    #[serde(default)]
    pub hashes: IndexMap<String, String>,
}

impl Manifest {
    /// Parse a manifest document
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| LauncherError::Manifest {
            message: e.to_string(),
        })
    }
}

/// Fetch and parse the manifest at `url`
#[instrument(skip(client))]
pub async fn fetch_manifest<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Manifest> {
    let body = client.get_bytes(url).await?;
    let manifest = Manifest::from_slice(&body)?;
    debug!(
        version = %manifest.version,
        hashes = manifest.hashes.len(),
        min_counts = manifest.min_counts.len(),
        "Fetched manifest"
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NetworkError;
    use crate::http::MockHttpClient;

    const MANIFEST: &str = r#"{
        "version": "1.0.0",
        "required": ["mods"],
        "criticalGlobs": ["mods/*.jar"],
        "minCounts": {"mods": 3},
        "hashes": {
            "options.txt": "sha256:aa",
            "mods/a.jar": "sha256:bb"
        }
    }"#;

    #[test]
    fn test_parse_preserves_order() {
        let manifest = Manifest::from_slice(MANIFEST.as_bytes()).unwrap();
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.critical_globs, vec!["mods/*.jar"]);
        let keys: Vec<_> = manifest.hashes.keys().cloned().collect();
        assert_eq!(keys, vec!["options.txt", "mods/a.jar"]);
        assert_eq!(manifest.min_counts["mods"], 3);
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let manifest = Manifest::from_slice(br#"{"version": "2"}"#).unwrap();
        assert!(manifest.hashes.is_empty());
        assert!(manifest.min_counts.is_empty());
    }

    #[test]
    fn test_invalid_manifest() {
        let err = Manifest::from_slice(b"[1, 2]").unwrap_err();
        assert!(matches!(err, LauncherError::Manifest { .. }));
    }

    #[tokio::test]
    async fn test_fetch_manifest() {
        let client = MockHttpClient::new();
        client
            .add_response("https://cdn.example/manifest.json", MANIFEST)
            .await;
        let manifest = fetch_manifest(&client, "https://cdn.example/manifest.json")
            .await
            .unwrap();
        assert_eq!(manifest.hashes.len(), 2);

        client.add_status("https://cdn.example/gone.json", 503).await;
        let err = fetch_manifest(&client, "https://cdn.example/gone.json")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LauncherError::Network(NetworkError::Status { status: 503, .. })
        ));
    }
}
