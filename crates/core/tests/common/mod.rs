//! Shared test helpers for core integration tests.
#![allow(dead_code)]

use blocklaunch_core::config::LauncherConfig;
use sha2::{Digest, Sha256};
use std::io::Write;

pub const MANIFEST_URL: &str = "https://cdn.example/manifest.json";
pub const PACKAGE_URL: &str = "https://cdn.example/blocks-and-blades-1.0.0.zip";
pub const INSTALLER_URL: &str = "https://maven.example/loader-21.1.219-installer.jar";

/// Configuration pointing at the fixture URLs above
pub fn test_config() -> LauncherConfig {
    let mut config = LauncherConfig::default();
    config.remote.manifest_url = MANIFEST_URL.to_string();
    config.remote.base_package_url = PACKAGE_URL.to_string();
    config.game.loader_installer_url =
        "https://maven.example/loader-{version}-installer.jar".to_string();
    config.timing.completion_delay_ms = 0;
    config
}

/// `sha256:<hex>` digest of `bytes`
pub fn sha256(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// Zip archive with the given entries; `None` content marks a directory
pub fn build_zip(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            match content {
                Some(content) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(content.as_bytes()).unwrap();
                }
                None => writer.add_directory(*name, options).unwrap(),
            }
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}
