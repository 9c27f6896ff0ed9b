use blocklaunch_core::notify::Notifier;
use console::style;
use std::sync::atomic::{AtomicBool, Ordering};

/// Prints remediation notices on stderr
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    runtime_missing: AtomicBool,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a missing runtime was reported during this run
    pub fn runtime_missing_reported(&self) -> bool {
        self.runtime_missing.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    async fn runtime_missing(&self, required_major: u32, download_url: &str) {
        self.runtime_missing.store(true, Ordering::SeqCst);
        eprintln!(
            "{} Java {} or newer is required to play.",
            style("!").yellow().bold(),
            required_major
        );
        eprintln!("  Download it from {}", style(download_url).underlined());
    }

    async fn runtime_crash(&self, exit_code: i32, download_url: &str) {
        eprintln!(
            "{} The game stopped right after starting (exit code {}).",
            style("✘").red().bold(),
            exit_code
        );
        eprintln!("  This usually means the installed Java version is not compatible.");
        eprintln!(
            "  Install a current Java from {}",
            style(download_url).underlined()
        );
    }
}
