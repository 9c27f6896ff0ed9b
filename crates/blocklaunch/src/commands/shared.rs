//! State and collaborators shared by the subcommands

use crate::cli::ProgressFormat;
use crate::ui::progress_bar::BarEmitter;
use anyhow::{Context, Result};
use blocklaunch_core::config::LauncherConfig;
use blocklaunch_core::credentials::CredentialStore;
use blocklaunch_core::errors::LaunchError;
use blocklaunch_core::http::ReqwestClient;
use blocklaunch_core::launch::CommandProcessLauncher;
use blocklaunch_core::package::PackageInstaller;
use blocklaunch_core::progress::{ProgressEmitter, SilentEmitter, StdoutEmitter, TracingEmitter};
use blocklaunch_core::session::{CommandIdentityProvider, Session};
use blocklaunch_core::settings::SettingsStore;
use std::path::PathBuf;

/// Resolved configuration and output preferences for one invocation
#[derive(Debug)]
pub struct CommandContext {
    pub config: LauncherConfig,
    pub root: PathBuf,
    pub progress: ProgressFormat,
    /// Whether an interactive progress bar can be drawn
    pub bar_eligible: bool,
}

impl CommandContext {
    /// Progress sink matching `--progress`
    pub fn emitter(&self) -> Box<dyn ProgressEmitter> {
        match self.progress {
            ProgressFormat::None => Box::new(SilentEmitter),
            ProgressFormat::Json => Box::new(StdoutEmitter),
            ProgressFormat::Auto if self.bar_eligible => Box::new(BarEmitter::new()),
            ProgressFormat::Auto => Box::new(TracingEmitter),
        }
    }

    pub fn settings_store(&self) -> SettingsStore {
        SettingsStore::new(&self.root, &self.config.defaults)
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(&self.root)
    }

    pub fn packages(&self) -> Result<PackageInstaller<ReqwestClient>> {
        let client = ReqwestClient::new().context("Failed to create HTTP client")?;
        Ok(PackageInstaller::new(client, self.config.clone()))
    }

    /// Session backed by the configured identity helper
    pub fn session(&self) -> Result<Session<CommandIdentityProvider>> {
        let helper = self.config.external.identity_helper.as_ref().context(
            "No identity helper configured; set `external.identity_helper` in launcher.toml",
        )?;
        Ok(Session::new(
            CommandIdentityProvider::new(helper),
            self.credential_store(),
        ))
    }

    pub fn process_launcher(&self) -> Result<CommandProcessLauncher> {
        match &self.config.external.process_launcher {
            Some(program) => Ok(CommandProcessLauncher::new(program)),
            None => Err(LaunchError::NotConfigured.into()),
        }
    }
}
