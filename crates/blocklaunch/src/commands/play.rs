//! Play command implementation
//!
//! Implements `blocklaunch play`: launch-time authentication, game start and
//! supervision until the game exits.

use super::{CommandContext, CommandExitCode};
use crate::ui::notifier::ConsoleNotifier;
use anyhow::Result;
use blocklaunch_core::launch::{ExitClassification, LaunchCoordinator};
use tracing::{info, instrument};

/// Execute the play command
#[instrument(skip_all, fields(remember_me = remember_me))]
pub async fn execute_play(ctx: &CommandContext, remember_me: bool) -> Result<()> {
    let emitter = ctx.emitter();
    let mut session = ctx.session()?;
    session.restore(emitter.as_ref());

    let packages = ctx.packages()?;
    let launcher = ctx.process_launcher()?;
    let notifier = ConsoleNotifier::new();
    let coordinator = LaunchCoordinator::new(&ctx.config, &ctx.root, &packages, &launcher, &notifier);

    let outcome = coordinator
        .play(&mut session, remember_me, emitter.as_ref())
        .await?;
    info!(
        classification = ?outcome.classification,
        exit_code = ?outcome.exit_code,
        elapsed_secs = outcome.elapsed.as_secs(),
        "Game session ended"
    );

    match outcome.classification {
        ExitClassification::Clean => Ok(()),
        ExitClassification::EarlyCrash | ExitClassification::Crashed => {
            Err(CommandExitCode(outcome.exit_code.unwrap_or(1)).into())
        }
    }
}
