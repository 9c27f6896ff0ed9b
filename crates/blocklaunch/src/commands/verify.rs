//! Verify command implementation

use super::{CommandContext, CommandExitCode};
use crate::cli::ProgressFormat;
use anyhow::Result;
use blocklaunch_core::integrity::IntegrityVerdict;
use console::style;

/// Check the installation without repairing it; exits with 1 when corrupted
pub async fn execute_verify(ctx: &CommandContext) -> Result<()> {
    let packages = ctx.packages()?;
    let verdict = packages.check_installation(&ctx.root).await?;

    if ctx.progress == ProgressFormat::Json {
        let json = match &verdict {
            IntegrityVerdict::Intact => serde_json::json!({ "intact": true }),
            IntegrityVerdict::Corrupted(reason) => {
                serde_json::json!({ "intact": false, "reason": reason.to_string() })
            }
        };
        println!("{}", json);
    } else {
        match &verdict {
            IntegrityVerdict::Intact => {
                println!("{} Installation is intact", style("✔").green())
            }
            IntegrityVerdict::Corrupted(reason) => println!(
                "{} Installation needs repair: {}",
                style("✘").red(),
                reason
            ),
        }
    }

    if verdict.is_corrupted() {
        return Err(CommandExitCode(1).into());
    }
    Ok(())
}
