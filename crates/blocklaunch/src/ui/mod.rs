pub mod notifier;
pub mod progress_bar;
