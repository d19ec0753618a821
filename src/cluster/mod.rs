//! Cluster-management service
//!
//! The EMR API is an external collaborator. This module defines the subset
//! of it the tool uses as the `ClusterService` trait, so submission and
//! polling can run against the real service or the in-process mock:
//!
//! - `add_steps`: append steps to a running cluster (AddJobFlowSteps)
//! - `run_job_flow`: create a cluster with steps (RunJobFlow)
//! - `list_steps`: list a cluster's steps (ListSteps)
//! - `describe_cluster`: cluster state (DescribeCluster)
//! - `describe_step`: step state (DescribeStep)
//!
//! Nothing here retries. Errors are handed to the caller as they arrive.

mod emr;
pub mod submit;

pub use emr::EmrClusterService;
pub use submit::{
    console_url, log_uri, ClusterSubmitter, ClusterTemplate, HardwareProfile, Submission, SubmitMode,
    DEFAULT_INSTANCE_TYPE,
};

use emr_protocol::{
    AddStepsRequest, AddStepsResponse, ClusterDescription, RunJobFlowRequest, RunJobFlowResponse,
    StepDescription,
};

/// Cluster service errors
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("EMR error: {0}")]
    Emr(#[from] aws_sdk_emr::Error),

    #[error("{operation} response missing {field}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid hardware profile: {0}")]
    InvalidProfile(String),

    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Step {step_id} not found on cluster {cluster_id}")]
    StepNotFound { cluster_id: String, step_id: String },

    #[error("Service error: {0}")]
    Service(String),
}

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// The cluster-management API subset used by the tool.
pub trait ClusterService: Send + Sync {
    /// Append steps to an existing cluster. Returns the new step IDs in
    /// submission order.
    fn add_steps(&self, request: &AddStepsRequest) -> ClusterResult<AddStepsResponse>;

    /// Create a cluster. The response carries only the cluster ID.
    fn run_job_flow(&self, request: &RunJobFlowRequest) -> ClusterResult<RunJobFlowResponse>;

    /// All steps of a cluster, most recent first as ListSteps reports them.
    fn list_steps(&self, cluster_id: &str) -> ClusterResult<Vec<StepDescription>>;

    fn describe_cluster(&self, cluster_id: &str) -> ClusterResult<ClusterDescription>;

    fn describe_step(&self, cluster_id: &str, step_id: &str) -> ClusterResult<StepDescription>;
}
