//! Progress and session event streaming
//!
//! Every long-running operation reports through a [`ProgressEmitter`]. The
//! event vocabulary is deliberately small; it is what a presentation layer
//! consumes: fractional progress with a status message, a terminal
//! "finished" signal, and authentication state changes.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events published to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Overall setup progress in percent (0..=100) with a status message
    Progress { percent: f64, message: String },
    /// The setup run completed; emitted once, after the final 100%
    Finished,
    /// A credential is available (provisional or validated)
    AuthSuccess { name: String, id: String },
    /// The stored credential could not be validated or refreshed
    AuthFailed,
    /// The game process has started; `minimize` mirrors the user setting
    GameStarted { minimize: bool },
}

impl ProgressEvent {
    /// Convenience constructor for a progress event
    pub fn progress(percent: f64, message: impl Into<String>) -> Self {
        ProgressEvent::Progress {
            percent,
            message: message.into(),
        }
    }
}

/// Trait for progress event emission
pub trait ProgressEmitter: Send + Sync + std::fmt::Debug {
    /// Emit a progress event
    fn emit(&self, event: &ProgressEvent) -> Result<()>;
}

/// Callback receiving step-local progress (0..=100) and a status message
pub type ReportFn<'a> = &'a (dyn Fn(f64, &str) + Send + Sync);

/// Emit an event, logging instead of failing when the emitter rejects it.
///
/// Progress reporting never aborts the work it reports on.
pub fn emit_or_warn(emitter: &dyn ProgressEmitter, event: ProgressEvent) {
    if let Err(e) = emitter.emit(&event) {
        warn!("Failed to emit progress event: {}", e);
    }
}

/// Standard output emitter writing one JSON document per line
#[derive(Debug)]
pub struct StdoutEmitter;

impl ProgressEmitter for StdoutEmitter {
    fn emit(&self, event: &ProgressEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        println!("{}", line);
        Ok(())
    }
}

/// Emitter that forwards events to the tracing subscriber
#[derive(Debug)]
pub struct TracingEmitter;

impl ProgressEmitter for TracingEmitter {
    fn emit(&self, event: &ProgressEvent) -> Result<()> {
        match event {
            ProgressEvent::Progress { percent, message } => {
                info!("[{:>5.1}%] {}", percent, message)
            }
            ProgressEvent::Finished => info!("Setup finished"),
            ProgressEvent::AuthSuccess { name, id } => info!(%name, %id, "Authenticated"),
            ProgressEvent::AuthFailed => warn!("Authentication is no longer valid"),
            ProgressEvent::GameStarted { minimize } => info!(minimize, "Game started"),
        }
        Ok(())
    }
}

/// Silent emitter that discards all events
#[derive(Debug)]
pub struct SilentEmitter;

impl ProgressEmitter for SilentEmitter {
    fn emit(&self, _event: &ProgressEvent) -> Result<()> {
        Ok(())
    }
}

/// Emitter that forwards events over an unbounded channel.
///
/// This is the hook for an embedding UI: the receiving half lives on the UI
/// side and renders events as they arrive.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelEmitter {
    /// Create an emitter and the receiver that observes it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressEmitter for ChannelEmitter {
    fn emit(&self, event: &ProgressEvent) -> Result<()> {
        self.sender
            .send(event.clone())
            .map_err(|_| anyhow::anyhow!("progress receiver dropped"))
    }
}

/// Emitter that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events emitted so far
    pub fn events(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Percent values of all `Progress` events, in emission order
    pub fn percents(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect()
    }
}

impl ProgressEmitter for RecordingEmitter {
    fn emit(&self, event: &ProgressEvent) -> Result<()> {
        debug!(?event, "Recording progress event");
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shape() {
        let event = ProgressEvent::progress(42.5, "Downloading base package");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["percent"], 42.5);
        assert_eq!(json["message"], "Downloading base package");

        let json = serde_json::to_value(ProgressEvent::AuthSuccess {
            name: "Steve".to_string(),
            id: "1234".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "auth_success");
        assert_eq!(json["name"], "Steve");

        let json = serde_json::to_value(ProgressEvent::Finished).unwrap();
        assert_eq!(json, serde_json::json!({"type": "finished"}));
    }

    #[test]
    fn test_recording_emitter_collects_in_order() {
        let emitter = RecordingEmitter::new();
        emitter.emit(&ProgressEvent::progress(0.0, "a")).unwrap();
        emitter.emit(&ProgressEvent::AuthFailed).unwrap();
        emitter.emit(&ProgressEvent::progress(50.0, "b")).unwrap();

        assert_eq!(emitter.events().len(), 3);
        assert_eq!(emitter.percents(), vec![0.0, 50.0]);
    }

    #[tokio::test]
    async fn test_channel_emitter_delivers_events() {
        let (emitter, mut receiver) = ChannelEmitter::new();
        emitter.emit(&ProgressEvent::Finished).unwrap();
        assert_eq!(receiver.recv().await, Some(ProgressEvent::Finished));

        drop(receiver);
        assert!(emitter.emit(&ProgressEvent::Finished).is_err());
    }

    #[test]
    fn test_emit_or_warn_swallows_errors() {
        let (emitter, receiver) = ChannelEmitter::new();
        drop(receiver);
        emit_or_warn(&emitter, ProgressEvent::AuthFailed);
    }

    #[test]
    fn test_silent_emitter() {
        assert!(SilentEmitter.emit(&ProgressEvent::Finished).is_ok());
    }
}
