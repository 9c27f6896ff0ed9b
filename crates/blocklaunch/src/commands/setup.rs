//! Setup command implementation
//!
//! Implements `blocklaunch setup`: the standard setup pipeline, with the saved
//! session validated alongside it.

use super::{CommandContext, CommandExitCode, EXIT_RUNTIME_MISSING};
use crate::ui::notifier::ConsoleNotifier;
use anyhow::Result;
use blocklaunch_core::runtime::{CommandProbe, RuntimeVerifier};
use blocklaunch_core::setup::{standard_setup, SetupContext};
use tracing::{debug, info, instrument, warn};

/// Execute the setup command
#[instrument(skip_all, fields(root = %ctx.root.display()))]
pub async fn execute_setup(ctx: &CommandContext) -> Result<()> {
    let emitter = ctx.emitter();
    let emitter = emitter.as_ref();

    // Provisional auth from disk; validated concurrently with setup
    let mut session = match ctx.session() {
        Ok(mut session) => {
            session.restore(emitter);
            Some(session)
        }
        Err(e) => {
            debug!("Skipping session validation: {}", e);
            None
        }
    };

    let packages = ctx.packages()?;
    let launcher = ctx.process_launcher()?;
    let runtime = RuntimeVerifier::new(
        CommandProbe,
        ctx.settings_store(),
        ctx.config.runtime.required_major,
    );
    let notifier = ConsoleNotifier::new();

    let orchestrator = standard_setup(
        SetupContext {
            config: &ctx.config,
            root: &ctx.root,
            packages: &packages,
            runtime: &runtime,
            launcher: &launcher,
            notifier: &notifier,
        },
        emitter,
    )?;

    let validation = async {
        match session.as_mut() {
            Some(session) if session.credential().is_some() => {
                session.validate(emitter).await.map(Some)
            }
            _ => Ok(None),
        }
    };

    let (setup, validation) = tokio::join!(orchestrator.run(), validation);
    match validation {
        Ok(Some(true)) => info!("Saved session is valid"),
        Ok(Some(false)) => warn!("Saved session expired; log in again before playing"),
        Ok(None) => {}
        Err(e) => warn!("Session validation failed: {}", e),
    }
    setup?;

    if notifier.runtime_missing_reported() {
        return Err(CommandExitCode(EXIT_RUNTIME_MISSING).into());
    }
    Ok(())
}
