//! Game launch and supervision
//!
//! Launching is delegated to an external process launcher that downloads the
//! game's own files and starts the game. The coordinator computes the launch
//! options, translates the launcher's events into progress, and watches the
//! game process: a failure shortly after start almost always means an
//! incompatible runtime, so the user is pointed at a runtime download.

use crate::config::LauncherConfig;
use crate::credentials::Credential;
use crate::errors::{LaunchError, Result};
use crate::http::HttpClient;
use crate::notify::Notifier;
use crate::package::PackageInstaller;
use crate::platform::Platform;
use crate::progress::{emit_or_warn, ProgressEmitter, ProgressEvent, ReportFn};
use crate::session::{IdentityProvider, Session};
use crate::settings::{Settings, SettingsStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

pub const MSG_PREPARING_LOADER: &str = "Preparing mod loader";

/// Authorization block handed to the game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Authorization {
    pub access_token: String,
    pub client_token: String,
    pub uuid: String,
    pub name: String,
    pub user_properties: serde_json::Value,
}

impl Authorization {
    /// Placeholder used when installing without a logged-in user
    pub fn offline() -> Self {
        Self {
            access_token: String::new(),
            client_token: String::new(),
            uuid: String::new(),
            name: "Player".to_string(),
            user_properties: serde_json::json!({}),
        }
    }
}

impl From<&Credential> for Authorization {
    fn from(credential: &Credential) -> Self {
        Self {
            access_token: credential.access_token.clone(),
            client_token: credential.client_token.clone(),
            uuid: credential.user_id.clone(),
            name: credential.display_name.clone(),
            user_properties: credential
                .session_metadata
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameVersion {
    pub number: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub min: String,
    pub max: String,
}

/// Server the game connects to on start
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuickPlay {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

/// Options handed to the external process launcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchConfig {
    pub authorization: Authorization,
    pub root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_path: Option<PathBuf>,
    pub version: GameVersion,
    /// Mod loader installer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forge: Option<PathBuf>,
    pub memory: Memory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_play: Option<QuickPlay>,
}

impl LaunchConfig {
    pub fn build(
        config: &LauncherConfig,
        settings: &Settings,
        root: &Path,
        credential: Option<&Credential>,
        loader_installer: Option<PathBuf>,
    ) -> Self {
        Self {
            authorization: credential
                .map(Authorization::from)
                .unwrap_or_else(Authorization::offline),
            root: root.to_path_buf(),
            java_path: settings.runtime.runtime_path.clone(),
            version: GameVersion {
                number: config.game.version.clone(),
                kind: "release".to_string(),
            },
            forge: loader_installer,
            memory: Memory {
                min: settings.runtime.min_memory.clone(),
                max: settings.runtime.max_memory.clone(),
            },
            quick_play: config.server.auto_connect.then(|| QuickPlay {
                kind: "multiplayer".to_string(),
                identifier: config.server.identifier(),
            }),
        }
    }
}

/// Events reported by the external launcher while preparing the game
#[derive(Debug, Clone, PartialEq)]
pub enum LauncherEvent {
    /// `task` of `total` units of `kind` (assets, natives, ...) are done
    Progress { task: u64, total: u64, kind: String },
    Debug(String),
    Data(String),
}

impl LauncherEvent {
    fn log(&self) {
        match self {
            LauncherEvent::Progress { task, total, kind } => {
                debug!("[launcher] {} {}/{}", kind, task, total)
            }
            LauncherEvent::Debug(message) => debug!("[launcher] {}", message),
            LauncherEvent::Data(message) => debug!("[game] {}", message),
        }
    }
}

/// Percentage and message for a launcher progress event
pub fn progress_of(task: u64, total: u64, kind: &str) -> (f64, String) {
    let percent = if total == 0 {
        0.0
    } else {
        (task as f64 / total as f64 * 100.0).min(100.0)
    };
    (percent, format!("Downloading {}", kind))
}

/// Callback receiving launcher events
pub type EventFn<'a> = &'a (dyn Fn(LauncherEvent) + Send + Sync);

/// A running game process
#[async_trait::async_trait]
pub trait GameProcess: Send {
    /// Wait for the process to exit; `None` when no exit code is available
    async fn wait(&mut self) -> Option<i32>;

    async fn kill(&mut self) -> Result<()>;
}

/// External capability that prepares and starts the game
#[async_trait::async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Prepare the game and start it; returns once the process is running
    async fn launch(
        &self,
        config: &LaunchConfig,
        on_event: EventFn<'_>,
    ) -> Result<Box<dyn GameProcess>>;
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WireEvent {
    Progress {
        task: u64,
        total: u64,
        #[serde(rename = "type")]
        kind: String,
    },
    Debug {
        message: String,
    },
    Data {
        message: String,
    },
    Started,
}

/// Process launcher backed by an external executable.
///
/// The executable receives the path of a JSON [`LaunchConfig`] as its only
/// argument and prints one JSON event per line on stdout:
/// `{"event": "progress", "task": 3, "total": 10, "type": "assets"}`,
/// `{"event": "debug", "message": "..."}`, `{"event": "data", "message": "..."}`
/// and finally `{"event": "started"}` once the game runs. It keeps running
/// for as long as the game does and exits with the game's exit code.
#[derive(Debug, Clone)]
pub struct CommandProcessLauncher {
    program: PathBuf,
}

impl CommandProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

fn parse_wire_line(line: &str) -> Option<WireEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<WireEvent>(trimmed) {
        Ok(event) => Some(event),
        Err(e) => {
            if trimmed.starts_with('{') {
                warn!("Unrecognized launcher event: {}", e);
            }
            Some(WireEvent::Data {
                message: trimmed.to_string(),
            })
        }
    }
}

#[async_trait::async_trait]
impl ProcessLauncher for CommandProcessLauncher {
    #[instrument(skip_all, fields(program = %self.program.display()))]
    async fn launch(
        &self,
        config: &LaunchConfig,
        on_event: EventFn<'_>,
    ) -> Result<Box<dyn GameProcess>> {
        let spawn_err = |message: String| LaunchError::Spawn {
            program: self.program.display().to_string(),
            message,
        };

        let mut config_file = tempfile::Builder::new()
            .prefix("blocklaunch-launch")
            .suffix(".json")
            .tempfile()
            .map_err(LaunchError::Io)?;
        serde_json::to_writer_pretty(config_file.as_file_mut(), config)
            .map_err(|e| spawn_err(e.to_string()))?;

        let mut child = tokio::process::Command::new(&self.program)
            .arg(config_file.path())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_err(e.to_string()))?;

        let stdout = child.stdout.take().ok_or_else(|| LaunchError::Protocol {
            message: "launcher stdout was not captured".to_string(),
        })?;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            let Some(line) = lines.next_line().await.map_err(LaunchError::Io)? else {
                let status = child.wait().await.map_err(LaunchError::Io)?;
                return Err(LaunchError::ExitedBeforeStart {
                    code: status.code(),
                }
                .into());
            };
            let event = match parse_wire_line(&line) {
                Some(WireEvent::Started) => break,
                Some(WireEvent::Progress { task, total, kind }) => {
                    LauncherEvent::Progress { task, total, kind }
                }
                Some(WireEvent::Debug { message }) => LauncherEvent::Debug(message),
                Some(WireEvent::Data { message }) => LauncherEvent::Data(message),
                None => continue,
            };
            on_event(event);
        }

        info!("Game process started");
        let drain = tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(WireEvent::Data { message } | WireEvent::Debug { message }) =
                    parse_wire_line(&line)
                {
                    debug!("[game] {}", message);
                }
            }
        });

        Ok(Box::new(CommandGameProcess {
            child,
            drain: Some(drain),
            _config_file: config_file,
        }))
    }
}

struct CommandGameProcess {
    child: tokio::process::Child,
    drain: Option<tokio::task::JoinHandle<()>>,
    _config_file: tempfile::NamedTempFile,
}

#[async_trait::async_trait]
impl GameProcess for CommandGameProcess {
    async fn wait(&mut self) -> Option<i32> {
        let status = match self.child.wait().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to wait for the game process: {}", e);
                return None;
            }
        };
        if let Some(drain) = self.drain.take() {
            let _ = drain.await;
        }
        status.code()
    }

    async fn kill(&mut self) -> Result<()> {
        self.child.kill().await.map_err(LaunchError::Io)?;
        if let Some(drain) = self.drain.take() {
            drain.abort();
        }
        Ok(())
    }
}

/// How the game process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    Clean,
    /// Non-zero exit within the grace window after start
    EarlyCrash,
    Crashed,
}

/// Classify a game exit
pub fn classify_exit(code: Option<i32>, elapsed: Duration, grace: Duration) -> ExitClassification {
    match code {
        None | Some(0) => ExitClassification::Clean,
        Some(_) if elapsed < grace => ExitClassification::EarlyCrash,
        Some(_) => ExitClassification::Crashed,
    }
}

/// Summary of a supervised game session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub classification: ExitClassification,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

/// Drives the external launcher in install-only and play modes
pub struct LaunchCoordinator<'a, C: HttpClient> {
    config: &'a LauncherConfig,
    root: PathBuf,
    settings: SettingsStore,
    packages: &'a PackageInstaller<C>,
    launcher: &'a dyn ProcessLauncher,
    notifier: &'a dyn Notifier,
}

impl<'a, C: HttpClient> LaunchCoordinator<'a, C> {
    pub fn new(
        config: &'a LauncherConfig,
        root: &Path,
        packages: &'a PackageInstaller<C>,
        launcher: &'a dyn ProcessLauncher,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            root: root.to_path_buf(),
            settings: SettingsStore::new(root, &config.defaults),
            packages,
            launcher,
            notifier,
        }
    }

    async fn prepare(&self, credential: Option<&Credential>) -> Result<(LaunchConfig, Settings)> {
        let installer = self
            .packages
            .ensure_loader_installer(&self.root, &self.config.game.loader_version)
            .await?;
        let settings = self.settings.load();
        let launch_config =
            LaunchConfig::build(self.config, &settings, &self.root, credential, Some(installer));
        Ok((launch_config, settings))
    }

    /// Let the external launcher download everything, then stop the game
    /// as soon as it starts.
    #[instrument(skip_all)]
    pub async fn install(&self, progress: ReportFn<'_>) -> Result<()> {
        progress(0.0, MSG_PREPARING_LOADER);
        let (launch_config, _) = self.prepare(None).await?;

        let on_event = |event: LauncherEvent| {
            event.log();
            if let LauncherEvent::Progress { task, total, kind } = &event {
                let (percent, message) = progress_of(*task, *total, kind);
                progress(percent, &message);
            }
        };

        let mut process = self.launcher.launch(&launch_config, &on_event).await?;
        info!("Game process started during setup, stopping it");
        process.kill().await?;
        Ok(())
    }

    /// Authenticate, start the game and supervise it until it exits
    #[instrument(skip_all, fields(remember = remember))]
    pub async fn play<P: IdentityProvider>(
        &self,
        session: &mut Session<P>,
        remember: bool,
        emitter: &dyn ProgressEmitter,
    ) -> Result<LaunchOutcome> {
        let result = self.play_inner(session, remember, emitter).await;
        if result.is_err() {
            session.reset();
        }
        result
    }

    async fn play_inner<P: IdentityProvider>(
        &self,
        session: &mut Session<P>,
        remember: bool,
        emitter: &dyn ProgressEmitter,
    ) -> Result<LaunchOutcome> {
        let credential = session.ensure_authenticated(remember, emitter).await?;
        let (launch_config, settings) = self.prepare(Some(&credential)).await?;

        let on_event = |event: LauncherEvent| {
            event.log();
            if let LauncherEvent::Progress { task, total, kind } = &event {
                let (_, message) = progress_of(*task, *total, kind);
                emit_or_warn(emitter, ProgressEvent::progress(100.0, message));
            }
        };

        let process = self.launcher.launch(&launch_config, &on_event).await?;
        emit_or_warn(
            emitter,
            ProgressEvent::GameStarted {
                minimize: settings.launcher.minimize_on_launch,
            },
        );
        Ok(self.supervise(process).await)
    }

    /// Wait for the game to exit and react to early crashes
    pub async fn supervise(&self, mut process: Box<dyn GameProcess>) -> LaunchOutcome {
        let started = Instant::now();
        let exit_code = process.wait().await;
        let elapsed = started.elapsed();
        let classification = classify_exit(exit_code, elapsed, self.config.timing.crash_grace());

        match classification {
            ExitClassification::Clean => info!(?exit_code, "Game exited"),
            ExitClassification::EarlyCrash => {
                warn!(?exit_code, ?elapsed, "Game crashed right after start");
                let url = self.config.runtime_download_url(Platform::detect());
                self.notifier
                    .runtime_crash(exit_code.unwrap_or(-1), url)
                    .await;
            }
            ExitClassification::Crashed => warn!(?exit_code, ?elapsed, "Game crashed"),
        }

        LaunchOutcome {
            classification,
            exit_code,
            elapsed,
        }
    }
}

/// Scripted game process for tests
#[derive(Debug, Clone)]
pub struct MockGameProcess {
    exit_code: Option<i32>,
    runtime: Duration,
    killed: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl MockGameProcess {
    pub fn new(exit_code: Option<i32>, runtime: Duration) -> Self {
        Self {
            exit_code,
            runtime,
            killed: Default::default(),
        }
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GameProcess for MockGameProcess {
    async fn wait(&mut self) -> Option<i32> {
        tokio::time::sleep(self.runtime).await;
        self.exit_code
    }

    async fn kill(&mut self) -> Result<()> {
        self.killed.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted process launcher for tests
#[derive(Debug, Default)]
pub struct MockProcessLauncher {
    events: Vec<LauncherEvent>,
    process: Option<MockGameProcess>,
    launched: std::sync::Mutex<Vec<LaunchConfig>>,
}

impl MockProcessLauncher {
    /// Launcher that reports `events` and then starts `process`; without a
    /// process, launching fails as if the launcher exited early
    pub fn new(events: Vec<LauncherEvent>, process: Option<MockGameProcess>) -> Self {
        Self {
            events,
            process,
            launched: Default::default(),
        }
    }

    /// Launch configurations received so far
    pub fn launched(&self) -> Vec<LaunchConfig> {
        match self.launched.lock() {
            Ok(launched) => launched.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait::async_trait]
impl ProcessLauncher for MockProcessLauncher {
    async fn launch(
        &self,
        config: &LaunchConfig,
        on_event: EventFn<'_>,
    ) -> Result<Box<dyn GameProcess>> {
        match self.launched.lock() {
            Ok(mut launched) => launched.push(config.clone()),
            Err(poisoned) => poisoned.into_inner().push(config.clone()),
        }
        for event in &self.events {
            on_event(event.clone());
        }
        match &self.process {
            Some(process) => Ok(Box::new(process.clone())),
            None => Err(LaunchError::ExitedBeforeStart { code: Some(1) }.into()),
        }
    }
}
