//! Integration tests for weighted progress across randomized step layouts

use blocklaunch_core::errors::Result;
use blocklaunch_core::orchestrator::{Orchestrator, StepAction, StepProgress, FINISHED_MESSAGE};
use blocklaunch_core::progress::{ProgressEvent, RecordingEmitter};

/// Reports random step-local values, including out-of-range ones
struct Noisy(Vec<f64>);

#[async_trait::async_trait]
impl StepAction for Noisy {
    async fn run(&self, progress: &StepProgress<'_>) -> Result<()> {
        for value in &self.0 {
            progress.report(*value, "working");
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_100() {
    for seed in [3u64, 17, 256, 4096] {
        let mut rng = fastrand::Rng::with_seed(seed);
        let emitter = RecordingEmitter::new();
        let mut orchestrator = Orchestrator::new(&emitter).with_completion_delay(Default::default());

        let mut bounds = Vec::new();
        let mut before = 0u32;
        let step_count = rng.usize(1..6);
        let weights: Vec<u32> = (0..step_count).map(|_| rng.u32(1..20)).collect();
        let total: u32 = weights.iter().sum();

        for (i, weight) in weights.iter().enumerate() {
            let values = (0..rng.usize(0..8))
                .map(|_| rng.f64() * 140.0 - 20.0)
                .collect();
            orchestrator
                .add_step(format!("step {}", i), *weight, Noisy(values))
                .unwrap();
            before += weight;
            bounds.push(before as f64 / total as f64 * 100.0);
        }
        assert_eq!(orchestrator.total_weight(), total);

        orchestrator.run().await.unwrap();

        let percents = emitter.percents();
        assert!(
            percents.windows(2).all(|w| w[0] <= w[1]),
            "seed {}: {:?}",
            seed,
            percents
        );
        assert!(percents.iter().all(|p| *p <= 100.0 + 1e-9));
        assert_eq!(percents.last(), Some(&100.0));

        let events = emitter.events();
        assert_eq!(events.last(), Some(&ProgressEvent::Finished));
        assert_eq!(
            events[events.len() - 2],
            ProgressEvent::progress(100.0, FINISHED_MESSAGE)
        );

        // each step's reports stay below the end of its weight span
        let mut step = 0usize;
        for event in &events {
            if let ProgressEvent::Progress { percent, message } = event {
                if message.starts_with("step ") {
                    step = message[5..].parse().unwrap();
                } else if message == "working" {
                    assert!(*percent <= bounds[step] + 1e-9, "seed {}", seed);
                }
            }
        }
    }
}
