//! Status polling
//!
//! Watches a submission until every step has finished. Each tick sleeps for
//! the poll interval, then describes the cluster and every step ID that was
//! returned at submission time. The loop ends once every step is COMPLETED
//! or FAILED; failed steps are reported but never stop the loop early.
//!
//! There is no upper bound on the number of ticks. The process is expected
//! to be attended, and killing it is the only way to stop waiting.
//!
//! Progress is delivered to a [`PollObserver`]; what ends up on the terminal
//! is decided by the observer, not by the loop.

mod observer;

pub use observer::{ConsoleObserver, PollObserver, TracingObserver};

use std::sync::Arc;
use std::time::Duration;

use emr_protocol::{ClusterState, StepState};
use serde::Serialize;
use tracing::debug;

use crate::cluster::{ClusterResult, ClusterService};

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// One step as seen on a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    pub id: String,
    pub name: String,
    pub state: StepState,
}

impl StepProgress {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_failed(&self) -> bool {
        self.state.is_failed()
    }
}

/// Everything observed on one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// 1-based tick number
    pub tick: u64,
    pub cluster_id: String,
    pub cluster_state: ClusterState,
    pub steps: Vec<StepProgress>,
}

impl ProgressSnapshot {
    /// True once every step is COMPLETED or FAILED.
    pub fn all_terminal(&self) -> bool {
        self.steps.iter().all(StepProgress::is_terminal)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepProgress> {
        self.steps.iter().filter(|s| s.is_failed())
    }

    /// Single-line, tab separated summary of the tick.
    pub fn summary_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.steps.len() + 1);
        parts.push(format!("Cluster: {}", self.cluster_state));
        for step in &self.steps {
            parts.push(format!("{} ({}) - {}", step.name, step.id, step.state));
        }
        parts.join("\t")
    }
}

/// Result of a finished poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    /// Number of ticks taken
    pub ticks: u64,
    /// The tick on which every step was terminal
    pub last: ProgressSnapshot,
}

impl PollOutcome {
    pub fn failed_steps(&self) -> Vec<&StepProgress> {
        self.last.failed_steps().collect()
    }

    /// True if no step failed.
    pub fn all_completed(&self) -> bool {
        self.last.failed_steps().next().is_none()
    }
}

/// Polls a cluster until all watched steps are terminal.
pub struct StatusPoller {
    service: Arc<dyn ClusterService>,
    interval: Duration,
}

impl StatusPoller {
    pub fn with_interval(service: Arc<dyn ClusterService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Take one snapshot of the cluster and the given steps.
    pub fn snapshot(&self, tick: u64, cluster_id: &str, step_ids: &[String]) -> ClusterResult<ProgressSnapshot> {
        let cluster = self.service.describe_cluster(cluster_id)?;

        let mut steps = Vec::with_capacity(step_ids.len());
        for step_id in step_ids {
            let step = self.service.describe_step(cluster_id, step_id)?;
            steps.push(StepProgress {
                id: step.id,
                name: step.name,
                state: step.state,
            });
        }

        Ok(ProgressSnapshot {
            tick,
            cluster_id: cluster_id.to_string(),
            cluster_state: cluster.state,
            steps,
        })
    }

    /// Poll until every step in `step_ids` is terminal.
    ///
    /// API errors end the poll immediately; failed steps do not.
    pub fn poll(
        &self,
        cluster_id: &str,
        step_ids: &[String],
        observer: &mut dyn PollObserver,
    ) -> ClusterResult<PollOutcome> {
        let mut tick = 0;
        loop {
            std::thread::sleep(self.interval);
            tick += 1;

            let snapshot = self.snapshot(tick, cluster_id, step_ids)?;
            debug!(cluster_id, tick, "polled");

            for step in snapshot.failed_steps() {
                observer.on_step_failed(&snapshot, step);
            }
            observer.on_tick(&snapshot);

            if snapshot.all_terminal() {
                observer.on_finished(&snapshot);
                return Ok(PollOutcome { ticks: tick, last: snapshot });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ApiOperation, MockClusterService, RecordingObserver};
    use emr_protocol::{ActionOnFailure, AddStepsRequest, StepConfig};

    fn submit(service: &MockClusterService, names: &[&str]) -> Vec<String> {
        service.add_cluster("j-123");
        let steps = names
            .iter()
            .map(|n| StepConfig::command(*n, ActionOnFailure::CancelAndWait, ["true"]))
            .collect();
        service
            .add_steps(&AddStepsRequest {
                job_flow_id: "j-123".to_string(),
                steps,
            })
            .unwrap()
            .step_ids
    }

    fn poller(service: &Arc<MockClusterService>) -> StatusPoller {
        StatusPoller::with_interval(service.clone(), Duration::ZERO)
    }

    #[test]
    fn test_polls_until_all_complete() {
        let service = Arc::new(MockClusterService::new());
        service.script_step("copy", vec![StepState::Pending, StepState::Running, StepState::Completed]);
        service.script_step("run", vec![StepState::Pending, StepState::Pending, StepState::Running, StepState::Completed]);
        let ids = submit(&service, &["copy", "run"]);
        let mut observer = RecordingObserver::default();

        let outcome = poller(&service).poll("j-123", &ids, &mut observer).unwrap();

        assert_eq!(outcome.ticks, 4);
        assert!(outcome.all_completed());
        assert_eq!(observer.ticks.len(), 4);
        assert_eq!(observer.finished, 1);
        assert!(!observer.ticks[2].all_terminal());
    }

    #[test]
    fn test_failed_step_does_not_stop_polling() {
        let service = Arc::new(MockClusterService::new());
        service.script_step("bad", vec![StepState::Running, StepState::Failed]);
        service.script_step(
            "slow",
            vec![StepState::Pending, StepState::Running, StepState::Running, StepState::Completed],
        );
        let ids = submit(&service, &["bad", "slow"]);
        let mut observer = RecordingObserver::default();

        let outcome = poller(&service).poll("j-123", &ids, &mut observer).unwrap();

        assert_eq!(outcome.ticks, 4);
        assert!(!outcome.all_completed());
        assert_eq!(outcome.failed_steps().len(), 1);
        assert_eq!(outcome.failed_steps()[0].name, "bad");
        // reported on every tick from the failure onward
        assert_eq!(observer.failures, vec!["bad", "bad", "bad"]);
    }

    #[test]
    fn test_cancelled_step_keeps_poll_alive() {
        let service = Arc::new(MockClusterService::new());
        service.script_step("a", vec![StepState::Cancelled, StepState::Cancelled, StepState::Completed]);
        let ids = submit(&service, &["a"]);
        let mut observer = RecordingObserver::default();

        let outcome = poller(&service).poll("j-123", &ids, &mut observer).unwrap();
        assert_eq!(outcome.ticks, 3);
    }

    #[test]
    fn test_every_step_id_is_described_each_tick() {
        let service = Arc::new(MockClusterService::new());
        let ids = submit(&service, &["a", "b", "c"]);
        let mut observer = RecordingObserver::default();

        let outcome = poller(&service).poll("j-123", &ids, &mut observer).unwrap();

        for id in &ids {
            assert_eq!(service.describe_step_calls(id), outcome.ticks as usize);
        }
        let seen: Vec<&str> = outcome.last.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(seen, ids.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_no_steps_finishes_after_one_tick() {
        let service = Arc::new(MockClusterService::new());
        service.add_cluster("j-123");
        let mut observer = RecordingObserver::default();

        let outcome = poller(&service).poll("j-123", &[], &mut observer).unwrap();
        assert_eq!(outcome.ticks, 1);
        assert_eq!(observer.finished, 1);
    }

    #[test]
    fn test_api_error_ends_poll() {
        let service = Arc::new(MockClusterService::new());
        let ids = submit(&service, &["a"]);
        service.fail_next(ApiOperation::DescribeStep, "throttled");
        let mut observer = RecordingObserver::default();

        assert!(poller(&service).poll("j-123", &ids, &mut observer).is_err());
        assert!(observer.ticks.is_empty());
    }

    #[test]
    fn test_summary_line_format() {
        let snapshot = ProgressSnapshot {
            tick: 1,
            cluster_id: "j-123".to_string(),
            cluster_state: ClusterState::Running,
            steps: vec![
                StepProgress {
                    id: "s-1".to_string(),
                    name: "setup - copy files".to_string(),
                    state: StepState::Completed,
                },
                StepProgress {
                    id: "s-2".to_string(),
                    name: "run spark main.py".to_string(),
                    state: StepState::Running,
                },
            ],
        };

        assert_eq!(
            snapshot.summary_line(),
            "Cluster: RUNNING\tsetup - copy files (s-1) - COMPLETED\trun spark main.py (s-2) - RUNNING"
        );
    }
}
