//! Logging and observability
//!
//! Structured logging via `tracing`. Console output goes to stderr (stdout is
//! reserved for JSON progress events) in either text or JSON form, controlled
//! at runtime via environment variables and CLI flags. When a log file path is
//! supplied, a second plain-text layer appends to it so that a session can be
//! inspected after the launcher has exited.

use anyhow::Result;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use std::{io, sync::Once};
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: Once = Once::new();

/// Name of the log file kept in the installation root.
pub const LOG_FILE_NAME: &str = "launcher.log";

/// Initialize the logging system.
///
/// Subsequent calls are no-ops.
///
/// ## Arguments
///
/// * `format` - `None`/`"text"` for human-readable text, `"json"` for JSON lines.
/// * `log_file` - optional file that receives an ANSI-free copy of every event.
///
/// ## Environment Variables
///
/// * `BLOCKLAUNCH_LOG_FORMAT` - "json" for JSON, any other value for text
/// * `BLOCKLAUNCH_LOG` - logging filter
/// * `RUST_LOG` - fallback filter
pub fn init_with_file(format: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    INIT.call_once(|| {
        let env_format = std::env::var("BLOCKLAUNCH_LOG_FORMAT").ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");

        let console = match effective_format {
            "json" => fmt::layer()
                .json()
                .with_target(true)
                .with_writer(io::stderr)
                .boxed(),
            _ => fmt::layer()
                .with_target(true)
                .with_writer(io::stderr)
                .boxed(),
        };

        let log_layer = log_file.and_then(|path| match open_log_file(path) {
            Ok(file) => Some(file_layer(file).boxed()),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path.display(), e);
                None
            }
        });

        tracing_subscriber::registry()
            .with(console)
            .with(log_layer)
            .with(create_env_filter())
            .init();

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

/// Open `path` for appending, creating missing parent directories
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Plain-text layer writing every event to `file`
fn file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
}

/// Initialize console logging only.
pub fn init(format: Option<&str>) -> Result<()> {
    init_with_file(format, None)
}

/// Create an EnvFilter based on environment variables
fn create_env_filter() -> EnvFilter {
    if let Ok(spec) = std::env::var("BLOCKLAUNCH_LOG") {
        EnvFilter::try_new(&spec).unwrap_or_else(|_| {
            eprintln!(
                "Invalid BLOCKLAUNCH_LOG specification '{}', using default 'info'",
                spec
            );
            EnvFilter::new("info")
        })
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
