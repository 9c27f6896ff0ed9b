//! Login and logout commands

use super::CommandContext;
use anyhow::Result;
use console::style;
use tracing::instrument;

/// Execute the login command
#[instrument(skip_all, fields(remember_me = remember_me))]
pub async fn execute_login(ctx: &CommandContext, remember_me: bool) -> Result<()> {
    let emitter = ctx.emitter();
    let mut session = ctx.session()?;
    let credential = session.login(remember_me, emitter.as_ref()).await?;

    eprintln!(
        "{} Logged in as {}",
        style("✔").green(),
        style(&credential.display_name).bold()
    );
    if !remember_me {
        eprintln!("The session will not be kept after this run (use --remember-me to keep it)");
    }
    Ok(())
}

/// Execute the logout command; succeeds when no session is saved
pub fn execute_logout(ctx: &CommandContext) -> Result<()> {
    let store = ctx.credential_store();
    let existed = store.exists();
    store.clear()?;
    if existed {
        eprintln!("Logged out");
    } else {
        eprintln!("No saved session");
    }
    Ok(())
}
