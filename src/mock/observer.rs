//! Observer that records what the poller reported

use crate::poll::{PollObserver, ProgressSnapshot, StepProgress};

#[derive(Debug, Default)]
pub struct RecordingObserver {
    /// Every tick, in order
    pub ticks: Vec<ProgressSnapshot>,
    /// Names of failed steps, once per tick they were seen failed
    pub failures: Vec<String>,
    /// Number of `on_finished` calls
    pub finished: usize,
}

impl PollObserver for RecordingObserver {
    fn on_tick(&mut self, snapshot: &ProgressSnapshot) {
        self.ticks.push(snapshot.clone());
    }

    fn on_step_failed(&mut self, _snapshot: &ProgressSnapshot, step: &StepProgress) {
        self.failures.push(step.name.clone());
    }

    fn on_finished(&mut self, _snapshot: &ProgressSnapshot) {
        self.finished += 1;
    }
}
