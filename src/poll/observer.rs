//! Progress observers

use std::io::{self, Write};

use tracing::{error, info, warn};

use super::{ProgressSnapshot, StepProgress};

/// Marker printed for each failed step on each tick.
pub const STEP_FAILED_MARKER: &str = "!!! STEP FAILED !!!";

/// Receives progress from [`super::StatusPoller`].
///
/// Per tick, `on_step_failed` is called once for every failed step, then
/// `on_tick`. `on_finished` follows the final tick.
pub trait PollObserver {
    fn on_tick(&mut self, snapshot: &ProgressSnapshot);

    fn on_step_failed(&mut self, _snapshot: &ProgressSnapshot, _step: &StepProgress) {}

    fn on_finished(&mut self, _snapshot: &ProgressSnapshot) {}
}

/// Plain terminal output: one tab-separated line per tick.
pub struct ConsoleObserver<W: Write> {
    out: W,
}

impl ConsoleObserver<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            warn!(error = %e, "failed to write progress");
        }
    }
}

impl<W: Write> PollObserver for ConsoleObserver<W> {
    fn on_tick(&mut self, snapshot: &ProgressSnapshot) {
        let line = snapshot.summary_line();
        self.line(&line);
    }

    fn on_step_failed(&mut self, _snapshot: &ProgressSnapshot, _step: &StepProgress) {
        self.line(STEP_FAILED_MARKER);
    }

    fn on_finished(&mut self, _snapshot: &ProgressSnapshot) {
        self.line("All done");
    }
}

/// Structured log events instead of terminal lines.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PollObserver for TracingObserver {
    fn on_tick(&mut self, snapshot: &ProgressSnapshot) {
        for step in &snapshot.steps {
            info!(
                cluster_id = %snapshot.cluster_id,
                tick = snapshot.tick,
                step_id = %step.id,
                step_name = %step.name,
                state = %step.state,
                "step status"
            );
        }
        info!(
            cluster_id = %snapshot.cluster_id,
            tick = snapshot.tick,
            cluster_state = %snapshot.cluster_state,
            "cluster status"
        );
    }

    fn on_step_failed(&mut self, snapshot: &ProgressSnapshot, step: &StepProgress) {
        error!(
            cluster_id = %snapshot.cluster_id,
            step_id = %step.id,
            step_name = %step.name,
            "step failed"
        );
    }

    fn on_finished(&mut self, snapshot: &ProgressSnapshot) {
        let failed = snapshot.failed_steps().count();
        info!(cluster_id = %snapshot.cluster_id, ticks = snapshot.tick, failed, "all steps finished");
    }
}
