//! Status command implementation

use super::{CommandContext, CommandExitCode};
use crate::cli::ProgressFormat;
use anyhow::Result;
use blocklaunch_core::server_status::{
    HickorySrvResolver, ServerProbe, SrvResolver, StaticSrvResolver,
};
use console::style;
use tracing::debug;

/// Probe the configured server; exits with 1 when it is unreachable
pub async fn execute_status(ctx: &CommandContext) -> Result<()> {
    let resolver: Box<dyn SrvResolver> = match HickorySrvResolver::from_system_conf() {
        Ok(resolver) => Box::new(resolver),
        Err(e) => {
            debug!("System resolver unavailable, skipping SRV lookup: {}", e);
            Box::new(StaticSrvResolver::new())
        }
    };

    let server = &ctx.config.server;
    let probe = ServerProbe::new(server, resolver.as_ref(), ctx.config.timing.probe_timeout());
    let online = probe.is_reachable().await;

    if ctx.progress == ProgressFormat::Json {
        println!(
            "{}",
            serde_json::json!({ "server": server.identifier(), "online": online })
        );
    } else if online {
        println!("{} {} is online", style("●").green(), server.identifier());
    } else {
        println!("{} {} is offline", style("●").red(), server.identifier());
    }

    if !online {
        return Err(CommandExitCode(1).into());
    }
    Ok(())
}
