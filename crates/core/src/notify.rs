//! Remediation notices
//!
//! When the runtime is missing, or the game dies right after starting, the
//! user is pointed at a runtime download page. How that happens (dialog,
//! terminal message) is up to the front end; the core only decides when.

use std::sync::Mutex;

/// A remediation notice shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No compatible runtime was found during setup
    RuntimeMissing {
        required_major: u32,
        download_url: String,
    },
    /// The game exited with an error shortly after starting
    RuntimeCrash {
        exit_code: i32,
        download_url: String,
    },
}

impl Notice {
    pub fn download_url(&self) -> &str {
        match self {
            Notice::RuntimeMissing { download_url, .. } => download_url,
            Notice::RuntimeCrash { download_url, .. } => download_url,
        }
    }
}

/// Delivers remediation notices to the user
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn runtime_missing(&self, required_major: u32, download_url: &str);

    async fn runtime_crash(&self, exit_code: i32, download_url: &str);
}

/// Notifier keeping notices in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(notices) => notices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, notice: Notice) {
        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice),
            Err(poisoned) => poisoned.into_inner().push(notice),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn runtime_missing(&self, required_major: u32, download_url: &str) {
        self.push(Notice::RuntimeMissing {
            required_major,
            download_url: download_url.to_string(),
        });
    }

    async fn runtime_crash(&self, exit_code: i32, download_url: &str) {
        self.push(Notice::RuntimeCrash {
            exit_code,
            download_url: download_url.to_string(),
        });
    }
}
