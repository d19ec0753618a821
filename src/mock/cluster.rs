//! In-process mock of the cluster-management service
//!
//! Steps advance through a scripted sequence of states, one state per
//! DescribeStep call, and then stay in the last state. Unscripted steps go
//! PENDING → RUNNING → COMPLETED. Scripts are keyed by step name so they can
//! be set up before the steps exist.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use emr_protocol::{
    AddStepsRequest, AddStepsResponse, ClusterDescription, ClusterState, RunJobFlowRequest,
    RunJobFlowResponse, StepConfig, StepDescription, StepState,
};

use super::failure::{ApiOperation, FailureConfig, FailureInjector};
use crate::cluster::{ClusterError, ClusterResult, ClusterService};

#[derive(Debug)]
struct MockStep {
    id: String,
    config: StepConfig,
    current: StepState,
    upcoming: VecDeque<StepState>,
    describe_calls: usize,
}

impl MockStep {
    fn advance(&mut self) -> StepState {
        if let Some(next) = self.upcoming.pop_front() {
            self.current = next;
        }
        self.describe_calls += 1;
        self.current.clone()
    }
}

#[derive(Debug)]
struct MockCluster {
    current: ClusterState,
    upcoming: VecDeque<ClusterState>,
    steps: Vec<MockStep>,
}

impl MockCluster {
    fn new(states: Vec<ClusterState>) -> Self {
        let mut upcoming: VecDeque<ClusterState> = states.into();
        let current = upcoming.pop_front().unwrap_or(ClusterState::Waiting);
        Self {
            current,
            upcoming,
            steps: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    clusters: HashMap<String, MockCluster>,
    step_scripts: HashMap<String, Vec<StepState>>,
    next_cluster: u32,
    next_step: u32,
    add_steps_requests: Vec<AddStepsRequest>,
    run_job_flow_requests: Vec<RunJobFlowRequest>,
    list_steps_calls: usize,
}

impl MockState {
    fn cluster_mut(&mut self, cluster_id: &str) -> ClusterResult<&mut MockCluster> {
        self.clusters
            .get_mut(cluster_id)
            .ok_or_else(|| ClusterError::ClusterNotFound(cluster_id.to_string()))
    }

    fn new_step(&mut self, config: StepConfig) -> MockStep {
        self.next_step += 1;
        let mut upcoming: VecDeque<StepState> = self
            .step_scripts
            .get(&config.name)
            .cloned()
            .unwrap_or_else(|| vec![StepState::Pending, StepState::Running, StepState::Completed])
            .into();
        // state before the first describe
        let current = if upcoming.len() > 1 {
            StepState::Pending
        } else {
            upcoming.front().cloned().unwrap_or(StepState::Pending)
        };
        if upcoming.is_empty() {
            upcoming.push_back(StepState::Pending);
        }
        MockStep {
            id: format!("s-MOCK{:04}", self.next_step),
            config,
            current,
            upcoming,
            describe_calls: 0,
        }
    }
}

/// Configurable mock cluster service for tests
pub struct MockClusterService {
    state: Mutex<MockState>,
    failures: Mutex<FailureInjector>,
}

impl Default for MockClusterService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClusterService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            failures: Mutex::new(FailureInjector::new()),
        }
    }

    // === Test configuration ===

    /// Register an already-running cluster.
    pub fn add_cluster(&self, cluster_id: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .clusters
            .entry(cluster_id.to_string())
            .or_insert_with(|| MockCluster::new(vec![ClusterState::Waiting]));
    }

    /// Script the states reported for every step named `name`.
    pub fn script_step(&self, name: &str, states: Vec<StepState>) {
        let mut state = self.state.lock().unwrap();
        state.step_scripts.insert(name.to_string(), states);
    }

    /// Fail the next call of `op`.
    pub fn fail_next(&self, op: ApiOperation, message: &str) {
        self.failures.lock().unwrap().set(op, FailureConfig::times(message, 1));
    }

    // === Inspection ===

    pub fn add_steps_requests(&self) -> Vec<AddStepsRequest> {
        self.state.lock().unwrap().add_steps_requests.clone()
    }

    pub fn run_job_flow_requests(&self) -> Vec<RunJobFlowRequest> {
        self.state.lock().unwrap().run_job_flow_requests.clone()
    }

    pub fn list_steps_calls(&self) -> usize {
        self.state.lock().unwrap().list_steps_calls
    }

    /// Number of DescribeStep calls made for `step_id`.
    pub fn describe_step_calls(&self, step_id: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .clusters
            .values()
            .flat_map(|c| c.steps.iter())
            .find(|s| s.id == step_id)
            .map(|s| s.describe_calls)
            .unwrap_or(0)
    }

    fn check_failure(&self, op: ApiOperation) -> ClusterResult<()> {
        match self.failures.lock().unwrap().check(op) {
            Some(message) => Err(ClusterError::Service(format!("{}: {}", op, message))),
            None => Ok(()),
        }
    }
}

impl ClusterService for MockClusterService {
    fn add_steps(&self, request: &AddStepsRequest) -> ClusterResult<AddStepsResponse> {
        self.check_failure(ApiOperation::AddJobFlowSteps)?;
        let mut state = self.state.lock().unwrap();
        state.add_steps_requests.push(request.clone());

        state.cluster_mut(&request.job_flow_id)?;
        let steps: Vec<MockStep> = request.steps.iter().cloned().map(|c| state.new_step(c)).collect();
        let step_ids = steps.iter().map(|s| s.id.clone()).collect();
        state.cluster_mut(&request.job_flow_id)?.steps.extend(steps);

        Ok(AddStepsResponse { step_ids })
    }

    fn run_job_flow(&self, request: &RunJobFlowRequest) -> ClusterResult<RunJobFlowResponse> {
        self.check_failure(ApiOperation::RunJobFlow)?;
        let mut state = self.state.lock().unwrap();
        state.run_job_flow_requests.push(request.clone());

        state.next_cluster += 1;
        let cluster_id = format!("j-MOCK{:04}", state.next_cluster);
        let mut cluster = MockCluster::new(vec![
            ClusterState::Starting,
            ClusterState::Bootstrapping,
            ClusterState::Running,
        ]);
        cluster.steps = request.steps.iter().cloned().map(|c| state.new_step(c)).collect();
        state.clusters.insert(cluster_id.clone(), cluster);

        Ok(RunJobFlowResponse { job_flow_id: cluster_id })
    }

    fn list_steps(&self, cluster_id: &str) -> ClusterResult<Vec<StepDescription>> {
        self.check_failure(ApiOperation::ListSteps)?;
        let mut state = self.state.lock().unwrap();
        state.list_steps_calls += 1;

        let cluster = state.cluster_mut(cluster_id)?;
        Ok(cluster
            .steps
            .iter()
            .rev()
            .map(|s| StepDescription {
                id: s.id.clone(),
                name: s.config.name.clone(),
                state: s.current.clone(),
            })
            .collect())
    }

    fn describe_cluster(&self, cluster_id: &str) -> ClusterResult<ClusterDescription> {
        self.check_failure(ApiOperation::DescribeCluster)?;
        let mut state = self.state.lock().unwrap();
        let cluster = state.cluster_mut(cluster_id)?;

        let described = ClusterDescription {
            id: cluster_id.to_string(),
            state: cluster.current.clone(),
        };
        if let Some(next) = cluster.upcoming.pop_front() {
            cluster.current = next;
        }
        Ok(described)
    }

    fn describe_step(&self, cluster_id: &str, step_id: &str) -> ClusterResult<StepDescription> {
        self.check_failure(ApiOperation::DescribeStep)?;
        let mut state = self.state.lock().unwrap();
        let cluster = state.cluster_mut(cluster_id)?;

        let step = cluster
            .steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or_else(|| ClusterError::StepNotFound {
                cluster_id: cluster_id.to_string(),
                step_id: step_id.to_string(),
            })?;

        let current = step.advance();
        Ok(StepDescription {
            id: step.id.clone(),
            name: step.config.name.clone(),
            state: current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emr_protocol::ActionOnFailure;

    fn step(name: &str) -> StepConfig {
        StepConfig::command(name, ActionOnFailure::CancelAndWait, ["true"])
    }

    #[test]
    fn test_default_progression() {
        let service = MockClusterService::new();
        service.add_cluster("j-1");
        let ids = service
            .add_steps(&AddStepsRequest {
                job_flow_id: "j-1".to_string(),
                steps: vec![step("a")],
            })
            .unwrap()
            .step_ids;

        let states: Vec<StepState> = (0..4)
            .map(|_| service.describe_step("j-1", &ids[0]).unwrap().state)
            .collect();
        assert_eq!(
            states,
            vec![StepState::Pending, StepState::Running, StepState::Completed, StepState::Completed]
        );
    }

    #[test]
    fn test_created_cluster_lists_newest_step_first() {
        let service = MockClusterService::new();
        let request_steps = vec![step("boot"), step("copy"), step("run")];
        let mut request = crate::cluster::ClusterTemplate::default()
            .run_job_flow_request("n", "l", &Default::default(), vec![], "m")
            .unwrap();
        request.steps = request_steps;

        let id = service.run_job_flow(&request).unwrap().job_flow_id;
        let listed = service.list_steps(&id).unwrap();

        let names: Vec<&str> = listed.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["run", "copy", "boot"]);
        assert_eq!(service.describe_cluster(&id).unwrap().state, ClusterState::Starting);
        assert_eq!(service.describe_cluster(&id).unwrap().state, ClusterState::Bootstrapping);
    }

    #[test]
    fn test_unknown_step() {
        let service = MockClusterService::new();
        service.add_cluster("j-1");
        assert!(matches!(
            service.describe_step("j-1", "s-nope"),
            Err(ClusterError::StepNotFound { .. })
        ));
    }

    #[test]
    fn test_injected_failure() {
        let service = MockClusterService::new();
        service.add_cluster("j-1");
        service.fail_next(ApiOperation::DescribeCluster, "throttled");

        assert!(matches!(service.describe_cluster("j-1"), Err(ClusterError::Service(_))));
        assert!(service.describe_cluster("j-1").is_ok());
    }
}
