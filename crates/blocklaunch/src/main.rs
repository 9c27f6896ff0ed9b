use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod ui;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let parsed = cli::Cli::parse();

    match parsed.dispatch().await {
        Ok(()) => Ok(()),
        Err(err) => {
            // Commands that finished but want a specific exit status
            if let Some(exit) = err.downcast_ref::<commands::CommandExitCode>() {
                std::process::exit(exit.0);
            }

            if let Some(launcher_error) =
                err.downcast_ref::<blocklaunch_core::errors::LauncherError>()
            {
                if launcher_error.is_cancelled_login() {
                    eprintln!("Login cancelled");
                    std::process::exit(commands::EXIT_LOGIN_CANCELLED);
                }
            }

            Err(err)
        }
    }
}
