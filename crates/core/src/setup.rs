//! Standard setup pipeline
//!
//! Checking Java (1) -> Preparing game (5) -> Installing game (10).

use crate::config::LauncherConfig;
use crate::errors::Result;
use crate::http::HttpClient;
use crate::launch::{LaunchCoordinator, ProcessLauncher};
use crate::notify::Notifier;
use crate::orchestrator::{Orchestrator, StepAction, StepProgress};
use crate::package::{PackageInstaller, PackageOutcome};
use crate::platform::Platform;
use crate::progress::ProgressEmitter;
use crate::runtime::{RuntimeProbe, RuntimeVerifier};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const STEP_CHECK_RUNTIME: &str = "Checking Java";
pub const STEP_PREPARE_GAME: &str = "Preparing game";
pub const STEP_INSTALL_GAME: &str = "Installing game";

const WEIGHT_CHECK_RUNTIME: u32 = 1;
const WEIGHT_PREPARE_GAME: u32 = 5;
const WEIGHT_INSTALL_GAME: u32 = 10;

/// Collaborators of a setup run
pub struct SetupContext<'a, C: HttpClient, P: RuntimeProbe> {
    pub config: &'a LauncherConfig,
    pub root: &'a Path,
    pub packages: &'a PackageInstaller<C>,
    pub runtime: &'a RuntimeVerifier<P>,
    pub launcher: &'a dyn ProcessLauncher,
    pub notifier: &'a dyn Notifier,
}

struct CheckRuntime<'a, P: RuntimeProbe> {
    verifier: &'a RuntimeVerifier<P>,
    notifier: &'a dyn Notifier,
    download_url: String,
}

#[async_trait::async_trait]
impl<P: RuntimeProbe> StepAction for CheckRuntime<'_, P> {
    async fn run(&self, progress: &StepProgress<'_>) -> Result<()> {
        if self.verifier.detect_compatible_runtime().await? {
            progress.report(100.0, "Java is ready");
            return Ok(());
        }
        // Setup continues: the game files can be prepared without Java
        warn!("No compatible Java found, continuing setup");
        self.notifier
            .runtime_missing(self.verifier.required_major(), &self.download_url)
            .await;
        Ok(())
    }
}

struct PrepareGame<'a, C: HttpClient> {
    packages: &'a PackageInstaller<C>,
    root: PathBuf,
}

#[async_trait::async_trait]
impl<C: HttpClient> StepAction for PrepareGame<'_, C> {
    async fn run(&self, progress: &StepProgress<'_>) -> Result<()> {
        let outcome = self
            .packages
            .ensure_base_package(&self.root, &|p: f64, m: &str| progress.report(p, m))
            .await?;
        if let PackageOutcome::Repaired(summary) = outcome {
            info!(
                files = summary.files,
                bytes = summary.bytes,
                "Base package installed"
            );
        }
        Ok(())
    }
}

struct InstallGame<'a, C: HttpClient> {
    coordinator: LaunchCoordinator<'a, C>,
}

#[async_trait::async_trait]
impl<C: HttpClient> StepAction for InstallGame<'_, C> {
    async fn run(&self, progress: &StepProgress<'_>) -> Result<()> {
        self.coordinator
            .install(&|p: f64, m: &str| progress.report(p, m))
            .await
    }
}

/// Build the standard three-step setup orchestrator
pub fn standard_setup<'a, C: HttpClient, P: RuntimeProbe>(
    ctx: SetupContext<'a, C, P>,
    emitter: &'a dyn ProgressEmitter,
) -> Result<Orchestrator<'a>> {
    let mut orchestrator =
        Orchestrator::new(emitter).with_completion_delay(ctx.config.timing.completion_delay());

    orchestrator.add_step(
        STEP_CHECK_RUNTIME,
        WEIGHT_CHECK_RUNTIME,
        CheckRuntime {
            verifier: ctx.runtime,
            notifier: ctx.notifier,
            download_url: ctx
                .config
                .runtime_download_url(Platform::detect())
                .to_string(),
        },
    )?;
    orchestrator.add_step(
        STEP_PREPARE_GAME,
        WEIGHT_PREPARE_GAME,
        PrepareGame {
            packages: ctx.packages,
            root: ctx.root.to_path_buf(),
        },
    )?;
    orchestrator.add_step(
        STEP_INSTALL_GAME,
        WEIGHT_INSTALL_GAME,
        InstallGame {
            coordinator: LaunchCoordinator::new(
                ctx.config,
                ctx.root,
                ctx.packages,
                ctx.launcher,
                ctx.notifier,
            ),
        },
    )?;
    Ok(orchestrator)
}
