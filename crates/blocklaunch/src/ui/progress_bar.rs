use anyhow::Result;
use blocklaunch_core::progress::{ProgressEmitter, ProgressEvent};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn default_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
        .progress_chars("=> ")
}

fn finished_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// A progress bar on stderr driven by the launcher's progress events.
#[derive(Debug)]
pub struct BarEmitter {
    pb: ProgressBar,
}

impl BarEmitter {
    pub fn new() -> Self {
        let pb = ProgressBar::new(100);
        pb.enable_steady_tick(Duration::from_millis(80));
        pb.set_style(default_style());
        Self { pb }
    }

    fn finish_with(&self, msg: impl Into<String>) {
        self.pb.set_style(finished_style());
        self.pb.finish_with_message(msg.into());
    }
}

impl Drop for BarEmitter {
    fn drop(&mut self) {
        if !self.pb.is_finished() {
            self.pb.finish_and_clear();
        }
    }
}

impl ProgressEmitter for BarEmitter {
    fn emit(&self, event: &ProgressEvent) -> Result<()> {
        match event {
            ProgressEvent::Progress { percent, message } => {
                self.pb.set_position(percent.clamp(0.0, 100.0).round() as u64);
                self.pb.set_message(style(message).yellow().to_string());
            }
            ProgressEvent::Finished => {
                self.finish_with(style("Game is ready").green().to_string());
            }
            ProgressEvent::AuthSuccess { name, .. } => {
                self.pb
                    .println(format!("{} Logged in as {}", style("✔").green(), name));
            }
            ProgressEvent::AuthFailed => {
                self.pb.println(
                    style("Saved session expired; you will be asked to log in")
                        .red()
                        .to_string(),
                );
            }
            ProgressEvent::GameStarted { minimize } => {
                let msg = if *minimize {
                    "Game started"
                } else {
                    "Game started (launcher stays open)"
                };
                self.finish_with(style(msg).green().to_string());
            }
        }
        Ok(())
    }
}

impl Default for BarEmitter {
    fn default() -> Self {
        Self::new()
    }
}
