//! Request types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::step::StepConfig;

/// Append steps to a running cluster (AddJobFlowSteps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddStepsRequest {
    pub job_flow_id: String,
    pub steps: Vec<StepConfig>,
}

/// Create a cluster and run steps on it (RunJobFlow).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RunJobFlowRequest {
    /// Cluster name.
    pub name: String,
    /// Where the service writes cluster logs.
    pub log_uri: String,
    /// Platform release, e.g. `emr-4.2.0`.
    pub release_label: String,
    /// Hardware profile.
    pub instances: InstancesConfig,
    /// Ordered steps, bootstrap first.
    pub steps: Vec<StepConfig>,
    /// Applications installed on the cluster.
    pub applications: Vec<Application>,
    /// Application configuration classifications.
    pub configurations: Vec<Configuration>,
    pub visible_to_all_users: bool,
    pub job_flow_role: String,
    pub service_role: String,
    pub tags: Vec<Tag>,
}

/// Instance group settings for a new cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstancesConfig {
    pub master_instance_type: String,
    pub slave_instance_type: String,
    pub instance_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ec2_key_name: Option<String>,
    /// Shut the cluster down once the last step finishes.
    pub keep_job_flow_alive_when_no_steps: bool,
    pub termination_protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ec2_subnet_id: Option<String>,
}

/// An application to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Application {
    pub name: String,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A configuration classification with its properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Configuration {
    pub classification: String,
    pub properties: BTreeMap<String, String>,
}

/// Resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
