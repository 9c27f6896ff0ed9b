//! Weighted step orchestration
//!
//! Setup is a fixed sequence of steps, each with a positive weight. The
//! orchestrator runs them in order and turns per-step progress into a single
//! global percentage: step `i` spans the range
//! `[sum(w_0..w_i), sum(w_0..=w_i)] / total * 100`.

use crate::errors::{LauncherError, Result, SetupError};
use crate::progress::{emit_or_warn, ProgressEmitter, ProgressEvent};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Message of the final 100% progress event
pub const FINISHED_MESSAGE: &str = "Setup finished";

/// Work performed by one setup step
#[async_trait::async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, progress: &StepProgress<'_>) -> Result<()>;
}

/// Progress handle given to a running step.
///
/// Values are step-local percentages; they are mapped into the step's share
/// of the global range and never move the global value backwards.
#[derive(Debug)]
pub struct StepProgress<'a> {
    emitter: &'a dyn ProgressEmitter,
    current_weight: u32,
    weight: u32,
    total_weight: u32,
    last: Mutex<f64>,
}

impl<'a> StepProgress<'a> {
    fn new(
        emitter: &'a dyn ProgressEmitter,
        current_weight: u32,
        weight: u32,
        total_weight: u32,
    ) -> Self {
        Self {
            emitter,
            current_weight,
            weight,
            total_weight,
            last: Mutex::new(percent_of(current_weight, total_weight)),
        }
    }

    /// Report step-local progress (0..=100) with a status message
    pub fn report(&self, local_percent: f64, message: impl Into<String>) {
        let local = if local_percent.is_finite() {
            local_percent.clamp(0.0, 100.0)
        } else {
            0.0
        };
        let global = (self.current_weight as f64 + local / 100.0 * self.weight as f64)
            / self.total_weight as f64
            * 100.0;

        let percent = {
            let mut last = match self.last.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if global > *last {
                *last = global;
            }
            *last
        };

        emit_or_warn(self.emitter, ProgressEvent::progress(percent, message));
    }

    /// The emitter, for events that are not progress (authentication, game start)
    pub fn emitter(&self) -> &'a dyn ProgressEmitter {
        self.emitter
    }
}

fn percent_of(weight: u32, total: u32) -> f64 {
    if total == 0 {
        return 100.0;
    }
    weight as f64 / total as f64 * 100.0
}

struct SetupStep<'a> {
    name: String,
    weight: u32,
    action: Box<dyn StepAction + 'a>,
}

/// Runs registered steps in order and aggregates their progress
pub struct Orchestrator<'a> {
    emitter: &'a dyn ProgressEmitter,
    steps: Vec<SetupStep<'a>>,
    total_weight: u32,
    completion_delay: Duration,
}

impl<'a> Orchestrator<'a> {
    pub fn new(emitter: &'a dyn ProgressEmitter) -> Self {
        Self {
            emitter,
            steps: Vec::new(),
            total_weight: 0,
            completion_delay: Duration::from_millis(500),
        }
    }

    /// Pause between the final 100% and the finished event
    pub fn with_completion_delay(mut self, delay: Duration) -> Self {
        self.completion_delay = delay;
        self
    }

    /// Register a step; zero weights are rejected
    pub fn add_step(
        &mut self,
        name: impl Into<String>,
        weight: u32,
        action: impl StepAction + 'a,
    ) -> Result<()> {
        let name = name.into();
        if weight == 0 {
            return Err(SetupError::InvalidWeight { step: name }.into());
        }
        self.total_weight += weight;
        self.steps.push(SetupStep {
            name,
            weight,
            action: Box::new(action),
        });
        Ok(())
    }

    pub fn total_weight(&self) -> u32 {
        self.total_weight
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every step in registration order.
    ///
    /// A failing step stops the run; `Finished` is only emitted after all
    /// steps succeeded.
    #[instrument(skip(self), fields(steps = self.steps.len(), total_weight = self.total_weight))]
    pub async fn run(self) -> Result<()> {
        let mut current_weight = 0u32;

        for step in &self.steps {
            let percent = percent_of(current_weight, self.total_weight);
            debug!(step = %step.name, percent, "Starting setup step");
            emit_or_warn(
                self.emitter,
                ProgressEvent::progress(percent, step.name.clone()),
            );

            let progress =
                StepProgress::new(self.emitter, current_weight, step.weight, self.total_weight);
            step.action.run(&progress).await.map_err(|source| {
                LauncherError::from(SetupError::StepFailed {
                    step: step.name.clone(),
                    source: Box::new(source),
                })
            })?;

            current_weight += step.weight;
        }

        emit_or_warn(
            self.emitter,
            ProgressEvent::progress(100.0, FINISHED_MESSAGE),
        );
        if !self.steps.is_empty() && !self.completion_delay.is_zero() {
            tokio::time::sleep(self.completion_delay).await;
        }
        emit_or_warn(self.emitter, ProgressEvent::Finished);
        info!("Setup finished");
        Ok(())
    }
}
