//! Base package and loader installer management
//!
//! The base package is a zip archive holding a complete installation. It is
//! only downloaded when the installation fails verification against the
//! remote manifest. The archive may wrap everything in a top-level directory
//! named after the game folder; that prefix is stripped on extraction.

use crate::config::LauncherConfig;
use crate::errors::{ExtractionError, LauncherError, Result};
use crate::http::{DownloadProgress, HttpClient};
use crate::integrity::{self, IntegrityVerdict};
use crate::manifest;
use crate::progress::ReportFn;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const TEMP_PREFIX: &str = "blocks-and-blades-setup";
const ARCHIVE_NAME: &str = "base-package.zip";

pub const MSG_CHECKING: &str = "Checking game integrity";
pub const MSG_ANALYZING: &str = "Analyzing files";
pub const MSG_DOWNLOADING: &str = "Downloading base package";
pub const MSG_EXTRACTING: &str = "Extracting base package";
pub const MSG_UP_TO_DATE: &str = "Game is up to date";

/// What extraction wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub files: usize,
    pub directories: usize,
    pub skipped: usize,
    pub bytes: u64,
}

/// Result of ensuring the base package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOutcome {
    UpToDate,
    Repaired(ExtractionSummary),
}

/// Downloads and installs remote artifacts into the installation root
#[derive(Debug)]
pub struct PackageInstaller<C: HttpClient> {
    client: C,
    config: LauncherConfig,
    temp_root: Option<PathBuf>,
}

impl<C: HttpClient> PackageInstaller<C> {
    pub fn new(client: C, config: LauncherConfig) -> Self {
        Self {
            client,
            config,
            temp_root: None,
        }
    }

    /// Create scratch download directories under `dir` instead of the
    /// system temp directory
    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch the manifest and verify the installation without repairing it
    pub async fn check_installation(&self, root: &Path) -> Result<IntegrityVerdict> {
        let manifest = manifest::fetch_manifest(&self.client, &self.config.remote.manifest_url).await?;
        Ok(integrity::verify_installation(root, &manifest).await)
    }

    /// Make sure the installation matches the remote manifest, repairing it
    /// from the base package when it does not.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub async fn ensure_base_package(
        &self,
        root: &Path,
        progress: ReportFn<'_>,
    ) -> Result<PackageOutcome> {
        tokio::fs::create_dir_all(root).await?;
        progress(0.0, MSG_CHECKING);

        let manifest =
            manifest::fetch_manifest(&self.client, &self.config.remote.manifest_url).await?;
        progress(10.0, MSG_ANALYZING);

        let verdict = integrity::verify_installation(root, &manifest).await;
        if !verdict.is_corrupted() {
            progress(100.0, MSG_UP_TO_DATE);
            return Ok(PackageOutcome::UpToDate);
        }

        info!(
            "Downloading base package from {}",
            self.config.remote.base_package_url
        );
        progress(20.0, MSG_DOWNLOADING);

        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        let temp = match &self.temp_root {
            Some(dir) => builder.tempdir_in(dir)?,
            None => builder.tempdir()?,
        };
        let archive_path = temp.path().join(ARCHIVE_NAME);

        let on_download = |p: DownloadProgress| match p.percent() {
            Some(percent) => progress(
                20.0 + percent * 0.6,
                &format!("{} {}%", MSG_DOWNLOADING, percent.round() as u64),
            ),
            None => progress(
                20.0,
                &format!("{} ({} KiB)", MSG_DOWNLOADING, p.downloaded / 1024),
            ),
        };
        let written = self
            .client
            .download(&self.config.remote.base_package_url, &archive_path, &on_download)
            .await?;
        debug!("Base package downloaded ({} bytes)", written);

        progress(85.0, MSG_EXTRACTING);
        let target = root.to_path_buf();
        let marker = self.config.remote.archive_root.clone();
        let summary = tokio::task::spawn_blocking(move || {
            extract_archive(&archive_path, &target, &marker)
        })
        .await
        .map_err(|e| ExtractionError::Join(e.to_string()))??;

        discard_scratch(temp);

        info!(
            files = summary.files,
            directories = summary.directories,
            "Base package extracted"
        );
        progress(100.0, MSG_UP_TO_DATE);
        Ok(PackageOutcome::Repaired(summary))
    }

    /// Make sure the mod loader installer for `version` is cached under
    /// `<root>/temp`, downloading it when absent.
    #[instrument(skip_all, fields(root = %root.display(), version = %version))]
    pub async fn ensure_loader_installer(&self, root: &Path, version: &str) -> Result<PathBuf> {
        let dir = crate::paths::temp_dir(root);
        let file_name = self.config.game.installer_file_name(version);
        let path = dir.join(&file_name);

        if path.is_file() {
            debug!("Reusing loader installer at {}", path.display());
            self.check_installer_digest(&path).await?;
            return Ok(path);
        }

        tokio::fs::create_dir_all(&dir).await?;
        let url = self.config.game.installer_url(version);
        let partial = dir.join(format!("{}.part", file_name));
        info!("Downloading loader installer from {}", url);

        self.client
            .download(&url, &partial, &|_: DownloadProgress| {})
            .await?;
        tokio::fs::rename(&partial, &path).await?;
        self.check_installer_digest(&path).await?;
        Ok(path)
    }

    async fn check_installer_digest(&self, path: &Path) -> Result<()> {
        let Some(expected) = &self.config.game.loader_installer_sha256 else {
            return Ok(());
        };
        let expected = normalize_sha256(expected);
        let actual = integrity::file_digest(path).await?;
        if actual != expected {
            warn!("Discarding loader installer with unexpected checksum");
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
            return Err(LauncherError::Integrity {
                path: path.display().to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// Remove a scratch directory. The installation is already in place, so a
/// failure here is only logged.
fn discard_scratch(temp: tempfile::TempDir) {
    let path = temp.path().to_path_buf();
    if let Err(e) = temp.close() {
        warn!("Failed to remove scratch directory {}: {}", path.display(), e);
    }
}

fn normalize_sha256(value: &str) -> String {
    let value = value.trim();
    let hex = match value.split_once(':') {
        Some((algorithm, hex)) if algorithm.eq_ignore_ascii_case("sha256") => hex,
        _ => value,
    };
    format!("sha256:{}", hex.to_ascii_lowercase())
}

/// Extract `archive` into `root`, stripping a leading `<root_marker>/`.
///
/// Entries that would land outside `root` abort the extraction. Files already
/// extracted stay in place.
#[instrument(skip_all, fields(archive = %archive.display(), root = %root.display()))]
pub fn extract_archive(
    archive: &Path,
    root: &Path,
    root_marker: &str,
) -> std::result::Result<ExtractionSummary, ExtractionError> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(io::BufReader::new(file))?;
    debug!("Archive contains {} entries", zip.len());

    fs::create_dir_all(root)?;
    let prefix = format!("{}/", root_marker);
    let mut summary = ExtractionSummary::default();

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let name = entry.name().to_string();

        if !root_marker.is_empty() && (name == root_marker || name == prefix) {
            summary.skipped += 1;
            continue;
        }
        let relative = if root_marker.is_empty() {
            name.as_str()
        } else {
            name.strip_prefix(&prefix).unwrap_or(&name)
        };
        if relative.is_empty() {
            summary.skipped += 1;
            continue;
        }

        let target = integrity::resolve_relative(root, relative)
            .ok_or_else(|| ExtractionError::UnsafePath {
                entry: name.clone(),
            })?;

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            summary.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if target.is_file() {
            fs::remove_file(&target)?;
        }
        let mut out = fs::File::create(&target)?;
        summary.bytes += io::copy(&mut entry, &mut out)?;
        summary.files += 1;

        // Owner read/write is always kept
        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let mode = (mode & 0o777) | 0o600;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(summary)
}
