//! Java runtime detection
//!
//! The game needs a Java runtime of at least a given major version. Detection
//! tries the configured executable, then `java` from the search path, then a
//! scan of well-known installation directories. A runtime found by the scan
//! is remembered in the settings so the next launch skips the scan.
//!
//! The launcher never installs a runtime itself.

use crate::errors::Result;
use crate::platform::Platform;
use crate::settings::SettingsStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Vendor directories below `Program Files` that hold JDK installations
pub const WINDOWS_VENDORS: [&str; 6] = [
    "Java",
    "Eclipse Foundation",
    "Adoptium",
    "BellSoft",
    "Microsoft",
    "Semeru",
];

static JAVA_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:java|openjdk) version "([^"]+)""#).expect("valid java version regex")
});

static ANY_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)version "([^"]+)""#).expect("valid version regex"));

/// Major version of a Java version string.
///
/// Legacy `1.X` strings map to `X`; otherwise the leading integer of the
/// first dot-separated component is used. Unparsable input yields 0.
pub fn parse_major_version(version: &str) -> u32 {
    let component = match version.strip_prefix("1.") {
        Some(rest) => rest.split('.').next().unwrap_or(""),
        None => version.split('.').next().unwrap_or(""),
    };
    let digits: String = component
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Major version reported in `java -version` output, or 0
pub fn parse_version_output(output: &str) -> u32 {
    JAVA_VERSION_RE
        .captures(output)
        .or_else(|| ANY_VERSION_RE.captures(output))
        .and_then(|caps| caps.get(1))
        .map(|m| parse_major_version(m.as_str()))
        .unwrap_or(0)
}

/// Reports the major version of a Java executable
#[async_trait::async_trait]
pub trait RuntimeProbe: Send + Sync {
    /// Major version of `executable`, or 0 when it cannot be determined
    async fn major_version(&self, executable: &Path) -> u32;
}

/// Probe running `<executable> -version`
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandProbe;

#[async_trait::async_trait]
impl RuntimeProbe for CommandProbe {
    async fn major_version(&self, executable: &Path) -> u32 {
        let output = tokio::process::Command::new(executable)
            .arg("-version")
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let text = if stderr.trim().is_empty() {
                    String::from_utf8_lossy(&output.stdout).into_owned()
                } else {
                    stderr.into_owned()
                };
                let major = parse_version_output(&text);
                debug!("{} reports Java major version {}", executable.display(), major);
                major
            }
            Ok(output) => {
                debug!(
                    "{} -version exited with {:?}",
                    executable.display(),
                    output.status.code()
                );
                0
            }
            Err(e) => {
                debug!("Failed to run {}: {}", executable.display(), e);
                0
            }
        }
    }
}

/// Probe answering from a fixed table, for tests
#[derive(Debug, Clone, Default)]
pub struct MockRuntimeProbe {
    versions: Arc<Mutex<HashMap<PathBuf, u32>>>,
    probed: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockRuntimeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_version(&self, executable: impl Into<PathBuf>, major: u32) {
        self.versions.lock().await.insert(executable.into(), major);
    }

    /// Executables probed so far, in order
    pub async fn probed(&self) -> Vec<PathBuf> {
        self.probed.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl RuntimeProbe for MockRuntimeProbe {
    async fn major_version(&self, executable: &Path) -> u32 {
        self.probed.lock().await.push(executable.to_path_buf());
        self.versions
            .lock()
            .await
            .get(executable)
            .copied()
            .unwrap_or(0)
    }
}

/// Where a compatible runtime was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    /// The path stored in the settings qualifies
    Configured(PathBuf),
    /// `java` on the search path qualifies
    SearchPath,
    /// The directory scan found a runtime; it was saved to the settings
    Discovered(PathBuf),
    Missing,
}

impl RuntimeStatus {
    pub fn is_compatible(&self) -> bool {
        !matches!(self, RuntimeStatus::Missing)
    }
}

/// Directories consulted by the installation scan
#[derive(Debug, Clone, Default)]
pub struct ScanLocations {
    /// `%ProgramFiles%` and `%ProgramFiles(x86)%`
    pub program_files: Vec<PathBuf>,
    pub java_home: Option<PathBuf>,
    /// `/Library/Java/JavaVirtualMachines`
    pub mac_jvm_dir: PathBuf,
    /// `/usr/lib/jvm`
    pub linux_jvm_dir: PathBuf,
    /// `/usr/bin/java`
    pub mac_system_java: PathBuf,
}

impl ScanLocations {
    /// Locations derived from the process environment
    pub fn from_env() -> Self {
        let program_files = ["ProgramFiles", "ProgramFiles(x86)"]
            .iter()
            .filter_map(std::env::var_os)
            .map(PathBuf::from)
            .collect();
        Self {
            program_files,
            java_home: std::env::var_os("JAVA_HOME").map(PathBuf::from),
            mac_jvm_dir: PathBuf::from("/Library/Java/JavaVirtualMachines"),
            linux_jvm_dir: PathBuf::from("/usr/lib/jvm"),
            mac_system_java: PathBuf::from("/usr/bin/java"),
        }
    }

    /// Existing candidate executables for `platform`, in probe order
    pub fn candidates(&self, platform: Platform) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        match platform {
            Platform::Windows => {
                for program_files in &self.program_files {
                    for vendor in WINDOWS_VENDORS {
                        for jvm in child_dirs(&program_files.join(vendor)) {
                            candidates.push(jvm.join("bin").join("java.exe"));
                        }
                    }
                }
                if let Some(home) = &self.java_home {
                    candidates.push(home.join("bin").join("java.exe"));
                }
            }
            Platform::MacOS => {
                candidates.push(self.mac_system_java.clone());
                for jvm in child_dirs(&self.mac_jvm_dir) {
                    candidates.push(jvm.join("Contents/Home/bin/java"));
                }
            }
            Platform::Linux => {
                for jvm in child_dirs(&self.linux_jvm_dir) {
                    candidates.push(jvm.join("bin").join("java"));
                }
                if let Some(home) = &self.java_home {
                    candidates.push(home.join("bin").join("java"));
                }
            }
        }
        candidates.retain(|path| path.is_file());
        candidates
    }
}

/// Child directories of `dir`, sorted by name; unreadable directories yield nothing
fn child_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Finds a Java runtime satisfying the required major version
#[derive(Debug)]
pub struct RuntimeVerifier<P: RuntimeProbe> {
    probe: P,
    settings: SettingsStore,
    required_major: u32,
    platform: Platform,
    locations: ScanLocations,
}

impl<P: RuntimeProbe> RuntimeVerifier<P> {
    pub fn new(probe: P, settings: SettingsStore, required_major: u32) -> Self {
        Self {
            probe,
            settings,
            required_major,
            platform: Platform::detect(),
            locations: ScanLocations::from_env(),
        }
    }

    /// Override the platform and scan locations
    pub fn with_scan(mut self, platform: Platform, locations: ScanLocations) -> Self {
        self.platform = platform;
        self.locations = locations;
        self
    }

    pub fn required_major(&self) -> u32 {
        self.required_major
    }

    async fn qualifies(&self, executable: &Path) -> bool {
        let major = self.probe.major_version(executable).await;
        major >= self.required_major
    }

    /// Locate a compatible runtime
    #[instrument(skip(self), fields(required = self.required_major, platform = %self.platform))]
    pub async fn detect(&self) -> Result<RuntimeStatus> {
        let settings = self.settings.load();

        if let Some(configured) = &settings.runtime.runtime_path {
            if self.qualifies(configured).await {
                info!("Configured Java path is valid: {}", configured.display());
                return Ok(RuntimeStatus::Configured(configured.clone()));
            }
            warn!(
                "Configured Java path is invalid or too old: {}",
                configured.display()
            );
        }

        let search_path_java = Path::new(self.platform.java_executable());
        if self.qualifies(search_path_java).await {
            info!("Java on the search path is compatible");
            return Ok(RuntimeStatus::SearchPath);
        }

        info!(
            "Searching for Java {}+ in well-known locations",
            self.required_major
        );
        for candidate in self.locations.candidates(self.platform) {
            if self.qualifies(&candidate).await {
                info!("Found compatible Java at {}", candidate.display());
                self.settings.save_runtime_path(&candidate)?;
                return Ok(RuntimeStatus::Discovered(candidate));
            }
        }

        warn!("No Java {}+ runtime found", self.required_major);
        Ok(RuntimeStatus::Missing)
    }

    /// Whether a compatible runtime is available
    pub async fn detect_compatible_runtime(&self) -> Result<bool> {
        Ok(self.detect().await?.is_compatible())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DefaultSettings;

    #[test]
    fn test_parse_major_version() {
        assert_eq!(parse_major_version("1.8.0_351"), 8);
        assert_eq!(parse_major_version("21.0.1"), 21);
        assert_eq!(parse_major_version("17-ea"), 17);
        assert_eq!(parse_major_version("17"), 17);
        assert_eq!(parse_major_version("abc"), 0);
        assert_eq!(parse_major_version(""), 0);
    }

    #[test]
    fn test_parse_version_output() {
        let openjdk = "openjdk version \"21.0.2\" 2024-01-16 LTS\nOpenJDK Runtime Environment Temurin-21.0.2+13 (build 21.0.2+13-LTS)";
        assert_eq!(parse_version_output(openjdk), 21);

        let oracle = "java version \"1.8.0_351\"\nJava(TM) SE Runtime Environment";
        assert_eq!(parse_version_output(oracle), 8);

        let other = "IBM Semeru runtime version \"17.0.9\"";
        assert_eq!(parse_version_output(other), 17);

        assert_eq!(parse_version_output("command not found"), 0);
    }

    #[tokio::test]
    async fn test_command_probe_missing_executable_is_zero() {
        let probe = CommandProbe;
        assert_eq!(
            probe
                .major_version(Path::new("/nonexistent/blocklaunch/java"))
                .await,
            0
        );
    }

    fn make_java(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    fn verifier(
        root: &Path,
        probe: MockRuntimeProbe,
        platform: Platform,
        locations: ScanLocations,
    ) -> RuntimeVerifier<MockRuntimeProbe> {
        let settings = SettingsStore::new(root, &DefaultSettings::default());
        RuntimeVerifier::new(probe, settings, 21).with_scan(platform, locations)
    }

    #[tokio::test]
    async fn test_configured_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let configured = dir.path().join("jdk/bin/java");
        let store = SettingsStore::new(dir.path(), &DefaultSettings::default());
        store.save_runtime_path(&configured).unwrap();

        let probe = MockRuntimeProbe::new();
        probe.set_version(&configured, 21).await;
        let verifier = verifier(dir.path(), probe.clone(), Platform::Linux, ScanLocations::default());

        assert_eq!(
            verifier.detect().await.unwrap(),
            RuntimeStatus::Configured(configured.clone())
        );
        assert_eq!(probe.probed().await, vec![configured]);
    }

    #[tokio::test]
    async fn test_search_path_java() {
        let dir = tempfile::tempdir().unwrap();
        let probe = MockRuntimeProbe::new();
        probe.set_version("java", 22).await;
        let verifier = verifier(dir.path(), probe, Platform::Linux, ScanLocations::default());
        assert_eq!(verifier.detect().await.unwrap(), RuntimeStatus::SearchPath);
    }

    #[tokio::test]
    async fn test_scan_discovers_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let jvm_dir = dir.path().join("jvm");
        let old = jvm_dir.join("java-17-openjdk/bin/java");
        let new = jvm_dir.join("temurin-21-jdk/bin/java");
        make_java(&old);
        make_java(&new);

        let probe = MockRuntimeProbe::new();
        probe.set_version("java", 17).await;
        probe.set_version(&old, 17).await;
        probe.set_version(&new, 21).await;

        let locations = ScanLocations {
            linux_jvm_dir: jvm_dir,
            ..ScanLocations::default()
        };
        let root = dir.path().join("root");
        let verifier = verifier(&root, probe, Platform::Linux, locations);

        assert_eq!(
            verifier.detect().await.unwrap(),
            RuntimeStatus::Discovered(new.clone())
        );
        let saved = SettingsStore::new(&root, &DefaultSettings::default()).load();
        assert_eq!(saved.runtime.runtime_path, Some(new));
    }

    #[tokio::test]
    async fn test_missing_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = verifier(
            dir.path(),
            MockRuntimeProbe::new(),
            Platform::MacOS,
            ScanLocations::default(),
        );
        assert_eq!(verifier.detect().await.unwrap(), RuntimeStatus::Missing);
        assert!(!verifier.detect_compatible_runtime().await.unwrap());
    }

    #[test]
    fn test_windows_candidates_follow_vendor_order() {
        let dir = tempfile::tempdir().unwrap();
        let program_files = dir.path().join("Program Files");
        let adoptium = program_files.join("Adoptium/jdk-21.0.2/bin/java.exe");
        let java = program_files.join("Java/jdk-17/bin/java.exe");
        let home = dir.path().join("home-jdk/bin/java.exe");
        make_java(&adoptium);
        make_java(&java);
        make_java(&home);
        std::fs::create_dir_all(program_files.join("Microsoft/empty-jdk")).unwrap();

        let locations = ScanLocations {
            program_files: vec![program_files],
            java_home: Some(dir.path().join("home-jdk")),
            ..ScanLocations::default()
        };
        assert_eq!(
            locations.candidates(Platform::Windows),
            vec![java, adoptium, home]
        );
    }
}
