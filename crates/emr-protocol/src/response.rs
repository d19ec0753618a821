//! Response types.

use serde::{Deserialize, Serialize};

use super::cluster::ClusterState;
use super::step::StepState;

/// Result of AddJobFlowSteps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddStepsResponse {
    /// IDs of the new steps, in submission order.
    pub step_ids: Vec<String>,
}

/// Result of RunJobFlow.
///
/// Carries only the cluster ID; step IDs must be listed separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunJobFlowResponse {
    pub job_flow_id: String,
}

/// Cluster status from DescribeCluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClusterDescription {
    pub id: String,
    pub state: ClusterState,
}

/// Step status from DescribeStep or ListSteps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StepDescription {
    pub id: String,
    pub name: String,
    pub state: StepState,
}
