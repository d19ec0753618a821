//! Step submission
//!
//! Two mutually exclusive paths:
//!
//! - **attach**: append the job steps to a cluster that is already running.
//!   The AddJobFlowSteps response carries the new step IDs.
//! - **create**: request a new cluster whose step list is the bootstrap step
//!   followed by the job steps. RunJobFlow only confirms the cluster exists,
//!   so the step IDs are recovered with a second call, ListSteps, on the new
//!   cluster. Both calls are always made.

use std::collections::BTreeMap;
use std::sync::Arc;

use emr_protocol::{
    AddStepsRequest, Application, Configuration, InstancesConfig, RunJobFlowRequest, StepConfig, Tag,
    DEFAULT_JOB_FLOW_ROLE, DEFAULT_RELEASE_LABEL, DEFAULT_SERVICE_ROLE,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ClusterError, ClusterResult, ClusterService};
use crate::steps::bootstrap_step;

/// Default instance type for new clusters.
pub const DEFAULT_INSTANCE_TYPE: &str = "m3.xlarge";

/// Hosts requested for a new cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Instance type for both master and core nodes
    pub instance_type: String,
    /// Total number of hosts
    pub instance_count: u32,
    /// EC2 key pair for SSH access
    pub key_name: Option<String>,
    /// Subnet to launch into
    pub subnet_id: Option<String>,
}

impl Default for HardwareProfile {
    fn default() -> Self {
        Self {
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            instance_count: 1,
            key_name: None,
            subnet_id: None,
        }
    }
}

impl HardwareProfile {
    pub fn validate(&self) -> ClusterResult<()> {
        if self.instance_type.trim().is_empty() {
            return Err(ClusterError::InvalidProfile("instance type is empty".to_string()));
        }
        if self.instance_count == 0 || i32::try_from(self.instance_count).is_err() {
            return Err(ClusterError::InvalidProfile(format!(
                "instance count {} is out of range",
                self.instance_count
            )));
        }
        Ok(())
    }
}

/// Platform settings applied to every created cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTemplate {
    pub release_label: String,
    pub applications: Vec<String>,
    pub job_flow_role: String,
    pub service_role: String,
    pub visible_to_all_users: bool,
    /// Let Spark size executors to the whole cluster
    pub maximize_resource_allocation: bool,
}

impl Default for ClusterTemplate {
    fn default() -> Self {
        Self {
            release_label: DEFAULT_RELEASE_LABEL.to_string(),
            applications: vec!["Ganglia".to_string(), "Spark".to_string()],
            job_flow_role: DEFAULT_JOB_FLOW_ROLE.to_string(),
            service_role: DEFAULT_SERVICE_ROLE.to_string(),
            visible_to_all_users: true,
            maximize_resource_allocation: true,
        }
    }
}

impl ClusterTemplate {
    /// Build the RunJobFlow request. The bootstrap step is placed ahead of
    /// `job_steps`.
    pub fn run_job_flow_request(
        &self,
        name: &str,
        log_uri: &str,
        profile: &HardwareProfile,
        job_steps: Vec<StepConfig>,
        name_tag: &str,
    ) -> ClusterResult<RunJobFlowRequest> {
        profile.validate()?;
        let instance_count = i32::try_from(profile.instance_count)
            .map_err(|e| ClusterError::InvalidProfile(e.to_string()))?;

        let mut steps = Vec::with_capacity(job_steps.len() + 1);
        steps.push(bootstrap_step());
        steps.extend(job_steps);

        let mut spark_properties = BTreeMap::new();
        spark_properties.insert(
            "maximizeResourceAllocation".to_string(),
            self.maximize_resource_allocation.to_string(),
        );

        Ok(RunJobFlowRequest {
            name: name.to_string(),
            log_uri: log_uri.to_string(),
            release_label: self.release_label.clone(),
            instances: InstancesConfig {
                master_instance_type: profile.instance_type.clone(),
                slave_instance_type: profile.instance_type.clone(),
                instance_count,
                ec2_key_name: profile.key_name.clone(),
                keep_job_flow_alive_when_no_steps: false,
                termination_protected: false,
                ec2_subnet_id: profile.subnet_id.clone(),
            },
            steps,
            applications: self.applications.iter().map(Application::new).collect(),
            configurations: vec![Configuration {
                classification: "spark".to_string(),
                properties: spark_properties,
            }],
            visible_to_all_users: self.visible_to_all_users,
            job_flow_role: self.job_flow_role.clone(),
            service_role: self.service_role.clone(),
            tags: vec![Tag::new("Name", name_tag)],
        })
    }
}

/// Where a created cluster writes its logs.
pub fn log_uri(bucket: &str, user: &str) -> String {
    format!("s3n://{}/logs/{}/", bucket, user)
}

/// Console page for a cluster.
pub fn console_url(region: &str, cluster_id: &str) -> String {
    format!(
        "https://{0}.console.aws.amazon.com/elasticmapreduce/home?region={0}#cluster-details:{1}",
        region, cluster_id
    )
}

/// Which submission path was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    Attach,
    Create,
}

/// Identifiers returned by a submission, consumed by the poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub mode: SubmitMode,
    pub cluster_id: String,
    /// Every step to watch, in submission order
    pub step_ids: Vec<String>,
}

/// Submits step lists to the cluster service.
pub struct ClusterSubmitter {
    service: Arc<dyn ClusterService>,
}

impl ClusterSubmitter {
    pub fn new(service: Arc<dyn ClusterService>) -> Self {
        Self { service }
    }

    /// Append `steps` to the running cluster `cluster_id`.
    pub fn attach(&self, cluster_id: &str, steps: Vec<StepConfig>) -> ClusterResult<Submission> {
        if cluster_id.trim().is_empty() {
            return Err(ClusterError::InvalidRequest("cluster ID is empty".to_string()));
        }

        let request = AddStepsRequest {
            job_flow_id: cluster_id.to_string(),
            steps,
        };
        let response = self.service.add_steps(&request)?;
        info!(cluster_id, step_ids = ?response.step_ids, "created steps");

        Ok(Submission {
            mode: SubmitMode::Attach,
            cluster_id: cluster_id.to_string(),
            step_ids: response.step_ids,
        })
    }

    /// Create a cluster from `request`, then list its steps to learn their IDs.
    pub fn create(&self, request: &RunJobFlowRequest) -> ClusterResult<Submission> {
        let response = self.service.run_job_flow(request)?;
        let cluster_id = response.job_flow_id;
        info!(cluster_id = %cluster_id, name = %request.name, "created job flow");

        // listing is newest first; the poller wants submission order
        let step_ids: Vec<String> = self
            .service
            .list_steps(&cluster_id)?
            .into_iter()
            .rev()
            .map(|s| s.id)
            .collect();
        info!(cluster_id = %cluster_id, step_ids = ?step_ids, "created job steps");

        Ok(Submission {
            mode: SubmitMode::Create,
            cluster_id,
            step_ids,
        })
    }
}
