//! Installation integrity verification
//!
//! Compares the installation root against a [`Manifest`]. Verification is
//! read-only and never fails: every problem it finds, including files it
//! cannot read, is reported as a corruption verdict so that the caller
//! repairs the installation.

use crate::manifest::Manifest;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument};

const CHUNK_SIZE: usize = 64 * 1024;

/// Why an installation was judged corrupted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptionReason {
    MissingFile {
        path: String,
    },
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    UnsupportedDigest {
        path: String,
        expected: String,
    },
    Unreadable {
        path: String,
        message: String,
    },
    UnsafePath {
        path: String,
    },
    MissingDirectory {
        dir: String,
    },
    TooFewEntries {
        dir: String,
        expected: u64,
        actual: u64,
    },
}

impl fmt::Display for CorruptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorruptionReason::MissingFile { path } => write!(f, "missing file {}", path),
            CorruptionReason::HashMismatch {
                path,
                expected,
                actual,
            } => write!(
                f,
                "hash mismatch for {}: expected {}, got {}",
                path, expected, actual
            ),
            CorruptionReason::UnsupportedDigest { path, expected } => {
                write!(f, "unsupported digest '{}' for {}", expected, path)
            }
            CorruptionReason::Unreadable { path, message } => {
                write!(f, "cannot read {}: {}", path, message)
            }
            CorruptionReason::UnsafePath { path } => {
                write!(f, "manifest path escapes the installation root: {}", path)
            }
            CorruptionReason::MissingDirectory { dir } => write!(f, "missing directory {}", dir),
            CorruptionReason::TooFewEntries {
                dir,
                expected,
                actual,
            } => write!(
                f,
                "directory {} has only {} entries, expected at least {}",
                dir, actual, expected
            ),
        }
    }
}

/// Outcome of an integrity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityVerdict {
    Intact,
    Corrupted(CorruptionReason),
}

impl IntegrityVerdict {
    pub fn is_corrupted(&self) -> bool {
        matches!(self, IntegrityVerdict::Corrupted(_))
    }
}

/// Compute the `sha256:<lowercase hex>` digest of a file, streaming it in chunks
pub async fn file_digest(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("sha256:{:x}", hasher.finalize()))
}

/// Join a manifest-relative path onto the root, rejecting escapes
pub(crate) fn resolve_relative(root: &Path, relative: &str) -> Option<PathBuf> {
    let relative_path = Path::new(relative);
    let safe = relative_path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !safe || relative.starts_with('/') || relative.starts_with('\\') {
        return None;
    }
    Some(root.join(relative_path))
}

/// Verify the installation under `root` against `manifest`.
///
/// Hash entries are checked first in document order, then directory counts.
/// The first failure short-circuits the check.
#[instrument(skip_all, fields(root = %root.display(), files = manifest.hashes.len()))]
pub async fn verify_installation(root: &Path, manifest: &Manifest) -> IntegrityVerdict {
    let verdict = check(root, manifest).await;
    match &verdict {
        IntegrityVerdict::Intact => debug!("Installation is intact"),
        IntegrityVerdict::Corrupted(reason) => info!("Installation needs repair: {}", reason),
    }
    verdict
}

async fn check(root: &Path, manifest: &Manifest) -> IntegrityVerdict {
    use IntegrityVerdict::Corrupted;

    for (relative, expected) in &manifest.hashes {
        let Some(full_path) = resolve_relative(root, relative) else {
            return Corrupted(CorruptionReason::UnsafePath {
                path: relative.clone(),
            });
        };

        if !full_path.is_file() {
            return Corrupted(CorruptionReason::MissingFile {
                path: relative.clone(),
            });
        }

        let supported = expected
            .split_once(':')
            .map(|(algorithm, _)| algorithm.eq_ignore_ascii_case("sha256"))
            .unwrap_or(false);
        if !supported {
            return Corrupted(CorruptionReason::UnsupportedDigest {
                path: relative.clone(),
                expected: expected.clone(),
            });
        }

        let actual = match file_digest(&full_path).await {
            Ok(actual) => actual,
            Err(e) => {
                return Corrupted(CorruptionReason::Unreadable {
                    path: relative.clone(),
                    message: e.to_string(),
                })
            }
        };

        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Corrupted(CorruptionReason::HashMismatch {
                path: relative.clone(),
                expected: expected.clone(),
                actual,
            });
        }
    }

    for (dir, min_count) in &manifest.min_counts {
        let Some(dir_path) = resolve_relative(root, dir) else {
            return Corrupted(CorruptionReason::UnsafePath { path: dir.clone() });
        };

        let mut entries = match tokio::fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(_) => return Corrupted(CorruptionReason::MissingDirectory { dir: dir.clone() }),
        };

        let mut count = 0u64;
        loop {
            match entries.next_entry().await {
                Ok(Some(_)) => count += 1,
                Ok(None) => break,
                Err(e) => {
                    return Corrupted(CorruptionReason::Unreadable {
                        path: dir.clone(),
                        message: e.to_string(),
                    })
                }
            }
        }

        if count < *min_count {
            return Corrupted(CorruptionReason::TooFewEntries {
                dir: dir.clone(),
                expected: *min_count,
                actual: count,
            });
        }
    }

    IntegrityVerdict::Intact
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256_of(bytes: &[u8]) -> String {
        format!("sha256:{:x}", Sha256::digest(bytes))
    }

    #[tokio::test]
    async fn test_file_digest_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert_eq!(
            file_digest(&path).await.unwrap(),
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_file_digest_spans_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();
        assert_eq!(file_digest(&path).await.unwrap(), sha256_of(&content));
    }

    #[tokio::test]
    async fn test_intact_installation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mods")).unwrap();
        std::fs::write(dir.path().join("mods/a.jar"), b"a").unwrap();
        std::fs::write(dir.path().join("mods/b.jar"), b"b").unwrap();

        let mut manifest = Manifest::default();
        let upper = format!("SHA256:{:X}", Sha256::digest(b"a"));
        manifest.hashes.insert("mods/a.jar".to_string(), upper);
        manifest.min_counts.insert("mods".to_string(), 2);

        assert_eq!(
            verify_installation(dir.path(), &manifest).await,
            IntegrityVerdict::Intact
        );
    }

    #[tokio::test]
    async fn test_missing_and_mismatched_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("options.txt"), b"changed").unwrap();

        let mut manifest = Manifest::default();
        manifest
            .hashes
            .insert("options.txt".to_string(), sha256_of(b"original"));
        let verdict = verify_installation(dir.path(), &manifest).await;
        assert!(matches!(
            verdict,
            IntegrityVerdict::Corrupted(CorruptionReason::HashMismatch { .. })
        ));

        manifest.hashes.clear();
        manifest
            .hashes
            .insert("config/missing.toml".to_string(), sha256_of(b""));
        let verdict = verify_installation(dir.path(), &manifest).await;
        assert!(matches!(
            verdict,
            IntegrityVerdict::Corrupted(CorruptionReason::MissingFile { .. })
        ));
    }

    #[tokio::test]
    async fn test_min_counts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("mods")).unwrap();
        std::fs::write(dir.path().join("mods/a.jar"), b"a").unwrap();

        let mut manifest = Manifest::default();
        manifest.min_counts.insert("mods".to_string(), 2);
        assert!(verify_installation(dir.path(), &manifest)
            .await
            .is_corrupted());

        manifest.min_counts.clear();
        manifest.min_counts.insert("shaderpacks".to_string(), 0);
        assert!(matches!(
            verify_installation(dir.path(), &manifest).await,
            IntegrityVerdict::Corrupted(CorruptionReason::MissingDirectory { .. })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_digest_and_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let mut manifest = Manifest::default();
        manifest
            .hashes
            .insert("a.txt".to_string(), "md5:0cc175b9c0f1b6a831c399e269772661".to_string());
        assert!(matches!(
            verify_installation(dir.path(), &manifest).await,
            IntegrityVerdict::Corrupted(CorruptionReason::UnsupportedDigest { .. })
        ));

        manifest.hashes.clear();
        manifest
            .hashes
            .insert("../outside.txt".to_string(), sha256_of(b"a"));
        assert!(matches!(
            verify_installation(dir.path(), &manifest).await,
            IntegrityVerdict::Corrupted(CorruptionReason::UnsafePath { .. })
        ));
    }

    #[test]
    fn test_resolve_relative() {
        let root = Path::new("/games/bb");
        assert_eq!(
            resolve_relative(root, "mods/a.jar"),
            Some(root.join("mods/a.jar"))
        );
        assert!(resolve_relative(root, "/etc/passwd").is_none());
        assert!(resolve_relative(root, "mods/../../x").is_none());
    }
}
