//! EMR Protocol Types
//!
//! Request/response shapes for the subset of the EMR cluster-management API
//! used by the submit tool. Field names serialize in the API's PascalCase so a
//! planned request can be printed exactly as it would be sent.

pub mod cluster;
pub mod request;
pub mod response;
pub mod step;

pub use cluster::ClusterState;
pub use request::{
    AddStepsRequest, Application, Configuration, InstancesConfig, RunJobFlowRequest, Tag,
};
pub use response::{AddStepsResponse, ClusterDescription, RunJobFlowResponse, StepDescription};
pub use step::{ActionOnFailure, HadoopJarStep, StepConfig, StepState};

/// Jar that runs an arbitrary command on the master node.
pub const COMMAND_RUNNER_JAR: &str = "command-runner.jar";

/// Release label requested for newly created clusters.
pub const DEFAULT_RELEASE_LABEL: &str = "emr-4.2.0";

/// Instance profile role for cluster hosts.
pub const DEFAULT_JOB_FLOW_ROLE: &str = "EMR_EC2_DefaultRole";

/// Service role assumed by EMR itself.
pub const DEFAULT_SERVICE_ROLE: &str = "EMR_DefaultRole";
