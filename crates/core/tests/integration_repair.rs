//! Integration tests for the integrity check and base package repair

mod common;

use blocklaunch_core::http::MockHttpClient;
use blocklaunch_core::integrity::{CorruptionReason, IntegrityVerdict};
use blocklaunch_core::package::{PackageInstaller, PackageOutcome};
use common::{build_zip, sha256, test_config, MANIFEST_URL, PACKAGE_URL};
use serde_json::json;
use std::sync::Mutex;

const OPTIONS: &str = "lang:fr_fr\n";
const MOD_JAR: &str = "mod bytes";

fn manifest() -> Vec<u8> {
    json!({
        "version": "1.0.0",
        "required": ["options.txt"],
        "criticalGlobs": ["mods/*.jar"],
        "minCounts": { "mods": 1 },
        "hashes": {
            "options.txt": sha256(OPTIONS.as_bytes()),
            "mods/blades.jar": sha256(MOD_JAR.as_bytes()),
        }
    })
    .to_string()
    .into_bytes()
}

fn package() -> Vec<u8> {
    build_zip(&[
        (".blocks-and-blades/", None),
        (".blocks-and-blades/mods/", None),
        (".blocks-and-blades/options.txt", Some(OPTIONS)),
        (".blocks-and-blades/mods/blades.jar", Some(MOD_JAR)),
    ])
}

async fn installer() -> PackageInstaller<MockHttpClient> {
    let client = MockHttpClient::new();
    client.add_response(MANIFEST_URL, manifest()).await;
    client.add_response(PACKAGE_URL, package()).await;
    PackageInstaller::new(client, test_config())
}

#[tokio::test]
async fn test_corrupted_installation_is_repaired() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("mods")).unwrap();
    std::fs::write(root.path().join("options.txt"), "tampered").unwrap();
    std::fs::write(root.path().join("mods/blades.jar"), MOD_JAR).unwrap();

    let installer = installer().await;
    let verdict = installer.check_installation(root.path()).await.unwrap();
    assert!(matches!(
        verdict,
        IntegrityVerdict::Corrupted(CorruptionReason::HashMismatch { ref path, .. }) if path == "options.txt"
    ));

    let reports = Mutex::new(Vec::new());
    let outcome = installer
        .ensure_base_package(root.path(), &|p: f64, _: &str| reports.lock().unwrap().push(p))
        .await
        .unwrap();
    assert!(matches!(outcome, PackageOutcome::Repaired(ref s) if s.files == 2));

    let reports = reports.into_inner().unwrap();
    assert!(reports.windows(2).all(|w| w[0] <= w[1]), "{:?}", reports);
    assert_eq!(reports.last(), Some(&100.0));

    // the archive's top-level folder is stripped
    assert!(!root.path().join(".blocks-and-blades").exists());
    assert_eq!(
        std::fs::read_to_string(root.path().join("options.txt")).unwrap(),
        OPTIONS
    );

    assert_eq!(
        installer.check_installation(root.path()).await.unwrap(),
        IntegrityVerdict::Intact
    );
    let second = installer
        .ensure_base_package(root.path(), &|_: f64, _: &str| {})
        .await
        .unwrap();
    assert_eq!(second, PackageOutcome::UpToDate);
    assert_eq!(installer.client().request_count(PACKAGE_URL).await, 1);
}

#[tokio::test]
async fn test_empty_root_is_installed_from_scratch() {
    let root = tempfile::tempdir().unwrap();
    let target = root.path().join("game");

    let installer = installer().await;
    let outcome = installer
        .ensure_base_package(&target, &|_: f64, _: &str| {})
        .await
        .unwrap();
    assert!(matches!(outcome, PackageOutcome::Repaired(_)));
    assert!(target.join("mods/blades.jar").is_file());
}

#[tokio::test]
async fn test_package_download_failure_aborts() {
    let root = tempfile::tempdir().unwrap();
    let client = MockHttpClient::new();
    client.add_response(MANIFEST_URL, manifest()).await;
    client.add_status(PACKAGE_URL, 404).await;
    let installer = PackageInstaller::new(client, test_config());

    let err = installer
        .ensure_base_package(root.path(), &|_: f64, _: &str| {})
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Network error"), "{}", err);
    assert!(!root.path().join("options.txt").exists());
}
