use crate::commands::{self, CommandContext};
use anyhow::Result;
use blocklaunch_core::config::LauncherConfig;
use blocklaunch_core::paths;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

/// Progress format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ProgressFormat {
    /// No progress output
    None,
    /// JSON progress events on stdout, one per line
    Json,
    /// Progress bar on an interactive terminal, log lines otherwise
    Auto,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check Java, repair the game files and pre-install the game
    #[command(long_about = "Check Java, repair the game files and pre-install the game\n\n\
        A saved session is restored first and validated while setup runs. When no \
        compatible Java runtime is found, setup still completes and exits with status 4.")]
    Setup,

    /// Log in if needed, start the game and wait for it to exit
    Play {
        /// Keep the session on disk for the next start
        #[arg(long)]
        remember_me: bool,
    },

    /// Log in interactively through the identity helper
    Login {
        /// Keep the session on disk for the next start
        #[arg(long)]
        remember_me: bool,
    },

    /// Forget the saved session
    Logout,

    /// Check the installed game files against the remote manifest
    Verify,

    /// Check whether the game server accepts connections
    Status,

    /// Show or change launcher settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print the current settings as JSON
    Show,

    /// Change one or more settings
    Set {
        /// Minimum game memory (e.g. 2G)
        #[arg(long, value_name = "SIZE")]
        min_ram: Option<String>,
        /// Maximum game memory (e.g. 4G)
        #[arg(long, value_name = "SIZE")]
        max_ram: Option<String>,
        /// Java executable used to run the game
        #[arg(long, value_name = "PATH")]
        java_path: Option<PathBuf>,
        /// Minimize the launcher once the game starts
        #[arg(long, value_name = "BOOL")]
        minimize_on_launch: Option<bool>,
        /// Launcher language
        #[arg(long, value_name = "CODE")]
        language: Option<String>,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Blocks & Blades launcher",
    long_about = "Blocks & Blades launcher\n\n\
        Installs, repairs and starts the Blocks & Blades modded game."
)]
pub struct Cli {
    /// Log format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Progress format (json|none|auto)
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub progress: ProgressFormat,

    /// Installation root (defaults to the per-user game folder)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Launcher configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Resolve the installation root and configuration.
    ///
    /// The root decides where `launcher.toml` is looked up, and the
    /// configuration may rename the game folder, so the root is resolved again
    /// once the configuration is known.
    fn resolve(&self) -> Result<(LauncherConfig, PathBuf)> {
        if let Some(root) = &self.root {
            let config = LauncherConfig::discover(self.config.as_deref(), Some(root))?;
            return Ok((config, root.clone()));
        }

        let default_root = paths::game_root(paths::DEFAULT_GAME_FOLDER)?;
        let config = LauncherConfig::discover(self.config.as_deref(), Some(&default_root))?;
        let root = if config.launcher.game_folder == paths::DEFAULT_GAME_FOLDER {
            default_root
        } else {
            paths::game_root(&config.launcher.game_folder)?
        };
        Ok((config, root))
    }

    pub async fn dispatch(self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None, // Let logging module check environment variable
        };

        let mut log_level = match self.log_level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        // Progress bar sessions: auto progress, stderr is a TTY, text logs
        let stderr_is_tty = std::io::stderr().is_terminal();
        let json_format = matches!(log_format, Some("json"));
        let bar_eligible = self.progress == ProgressFormat::Auto && stderr_is_tty && !json_format;

        if std::env::var_os("BLOCKLAUNCH_LOG").is_none() && std::env::var_os("RUST_LOG").is_none()
        {
            // Keep the bar readable unless the user asked for more
            if bar_eligible && matches!(self.log_level, LogLevel::Info) {
                log_level = "warn";
            }
            std::env::set_var(
                "RUST_LOG",
                format!("blocklaunch={},blocklaunch_core={}", log_level, log_level),
            );
        }

        let (config, root) = self.resolve()?;
        let log_file = root.join(blocklaunch_core::logging::LOG_FILE_NAME);
        blocklaunch_core::logging::init_with_file(log_format, Some(&log_file))?;
        tracing::debug!(
            root = %root.display(),
            launcher_version = %config.launcher.version,
            "CLI initialized with log level: {}",
            log_level
        );

        let ctx = CommandContext {
            config,
            root,
            progress: self.progress,
            bar_eligible,
        };

        match self.command {
            Some(Commands::Setup) => commands::setup::execute_setup(&ctx).await,
            Some(Commands::Play { remember_me }) => {
                commands::play::execute_play(&ctx, remember_me).await
            }
            Some(Commands::Login { remember_me }) => {
                commands::auth::execute_login(&ctx, remember_me).await
            }
            Some(Commands::Logout) => commands::auth::execute_logout(&ctx),
            Some(Commands::Verify) => commands::verify::execute_verify(&ctx).await,
            Some(Commands::Status) => commands::status::execute_status(&ctx).await,
            Some(Commands::Settings { command }) => match command {
                SettingsCommands::Show => commands::settings::execute_show(&ctx),
                SettingsCommands::Set {
                    min_ram,
                    max_ram,
                    java_path,
                    minimize_on_launch,
                    language,
                } => commands::settings::execute_set(
                    &ctx,
                    commands::settings::SettingsUpdate {
                        min_ram,
                        max_ram,
                        java_path,
                        minimize_on_launch,
                        language,
                    },
                ),
            },
            None => {
                println!("Blocks & Blades launcher - run with --help for usage");
                Ok(())
            }
        }
    }
}
