//! EMR-backed cluster service

use std::collections::HashMap;
use std::sync::Arc;

use aws_sdk_emr::types as sdk;
use emr_protocol::{
    AddStepsRequest, AddStepsResponse, ClusterDescription, ClusterState, RunJobFlowRequest,
    RunJobFlowResponse, StepConfig, StepDescription, StepState,
};
use tracing::debug;

use super::{ClusterError, ClusterResult, ClusterService};
use crate::aws::AwsSession;

pub struct EmrClusterService {
    session: Arc<AwsSession>,
    client: aws_sdk_emr::Client,
}

impl EmrClusterService {
    pub fn new(session: Arc<AwsSession>) -> Self {
        let client = aws_sdk_emr::Client::new(session.sdk_config());
        Self { session, client }
    }
}

fn to_sdk_step(step: &StepConfig) -> sdk::StepConfig {
    let jar = sdk::HadoopJarStepConfig::builder()
        .jar(&step.hadoop_jar_step.jar)
        .set_args(Some(step.hadoop_jar_step.args.clone()))
        .build();

    sdk::StepConfig::builder()
        .name(&step.name)
        .action_on_failure(sdk::ActionOnFailure::from(step.action_on_failure.as_str()))
        .hadoop_jar_step(jar)
        .build()
}

fn to_sdk_steps(steps: &[StepConfig]) -> Vec<sdk::StepConfig> {
    steps.iter().map(to_sdk_step).collect()
}

/// One ListSteps page and the marker of the next one.
type StepPage = (Vec<StepDescription>, Option<String>);

/// Follow ListSteps markers until the last page, keeping the service order.
fn collect_pages<F>(mut fetch: F) -> ClusterResult<Vec<StepDescription>>
where
    F: FnMut(Option<String>) -> ClusterResult<StepPage>,
{
    let mut steps = Vec::new();
    let mut marker = None;

    loop {
        let (page, next) = fetch(marker.take())?;
        steps.extend(page);

        match next {
            Some(next) if !next.is_empty() => marker = Some(next),
            _ => return Ok(steps),
        }
    }
}

fn step_state(status: Option<&sdk::StepStatus>) -> StepState {
    status
        .and_then(|s| s.state())
        .map(|s| StepState::parse(s.as_str()))
        .unwrap_or_else(|| StepState::Other("UNKNOWN".to_string()))
}

impl ClusterService for EmrClusterService {
    fn add_steps(&self, request: &AddStepsRequest) -> ClusterResult<AddStepsResponse> {
        let steps = to_sdk_steps(&request.steps);
        debug!(cluster_id = %request.job_flow_id, steps = steps.len(), "AddJobFlowSteps");

        let output = self
            .session
            .block_on(
                self.client
                    .add_job_flow_steps()
                    .job_flow_id(&request.job_flow_id)
                    .set_steps(Some(steps))
                    .send(),
            )
            .map_err(|e| ClusterError::Emr(e.into()))?;

        Ok(AddStepsResponse {
            step_ids: output.step_ids().to_vec(),
        })
    }

    fn run_job_flow(&self, request: &RunJobFlowRequest) -> ClusterResult<RunJobFlowResponse> {
        let instances = sdk::JobFlowInstancesConfig::builder()
            .master_instance_type(&request.instances.master_instance_type)
            .slave_instance_type(&request.instances.slave_instance_type)
            .instance_count(request.instances.instance_count)
            .set_ec2_key_name(request.instances.ec2_key_name.clone())
            .keep_job_flow_alive_when_no_steps(request.instances.keep_job_flow_alive_when_no_steps)
            .termination_protected(request.instances.termination_protected)
            .set_ec2_subnet_id(request.instances.ec2_subnet_id.clone())
            .build();

        let applications = request
            .applications
            .iter()
            .map(|a| sdk::Application::builder().name(&a.name).build())
            .collect();

        let configurations = request
            .configurations
            .iter()
            .map(|c| {
                let properties: HashMap<String, String> = c
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                sdk::Configuration::builder()
                    .classification(&c.classification)
                    .set_properties(Some(properties))
                    .build()
            })
            .collect();

        let tags = request
            .tags
            .iter()
            .map(|t| sdk::Tag::builder().key(&t.key).value(&t.value).build())
            .collect();

        debug!(name = %request.name, release = %request.release_label, "RunJobFlow");

        let output = self
            .session
            .block_on(
                self.client
                    .run_job_flow()
                    .name(&request.name)
                    .log_uri(&request.log_uri)
                    .release_label(&request.release_label)
                    .instances(instances)
                    .set_steps(Some(to_sdk_steps(&request.steps)))
                    .set_applications(Some(applications))
                    .set_configurations(Some(configurations))
                    .visible_to_all_users(request.visible_to_all_users)
                    .job_flow_role(&request.job_flow_role)
                    .service_role(&request.service_role)
                    .set_tags(Some(tags))
                    .send(),
            )
            .map_err(|e| ClusterError::Emr(e.into()))?;

        let job_flow_id = output.job_flow_id().ok_or(ClusterError::MissingField {
            operation: "RunJobFlow",
            field: "JobFlowId",
        })?;

        Ok(RunJobFlowResponse {
            job_flow_id: job_flow_id.to_string(),
        })
    }

    fn list_steps(&self, cluster_id: &str) -> ClusterResult<Vec<StepDescription>> {
        collect_pages(|marker| {
            debug!(cluster_id, ?marker, "ListSteps");
            let output = self
                .session
                .block_on(
                    self.client
                        .list_steps()
                        .cluster_id(cluster_id)
                        .set_marker(marker)
                        .send(),
                )
                .map_err(|e| ClusterError::Emr(e.into()))?;

            let page = output
                .steps()
                .iter()
                .map(|summary| {
                    let id = summary.id().ok_or(ClusterError::MissingField {
                        operation: "ListSteps",
                        field: "Id",
                    })?;
                    Ok(StepDescription {
                        id: id.to_string(),
                        name: summary.name().unwrap_or_default().to_string(),
                        state: step_state(summary.status()),
                    })
                })
                .collect::<ClusterResult<Vec<_>>>()?;

            Ok((page, output.marker().map(str::to_string)))
        })
    }

    fn describe_cluster(&self, cluster_id: &str) -> ClusterResult<ClusterDescription> {
        let output = self
            .session
            .block_on(self.client.describe_cluster().cluster_id(cluster_id).send())
            .map_err(|e| ClusterError::Emr(e.into()))?;

        let cluster = output.cluster().ok_or(ClusterError::MissingField {
            operation: "DescribeCluster",
            field: "Cluster",
        })?;
        let state = cluster
            .status()
            .and_then(|s| s.state())
            .map(|s| ClusterState::parse(s.as_str()))
            .ok_or(ClusterError::MissingField {
                operation: "DescribeCluster",
                field: "Status.State",
            })?;

        Ok(ClusterDescription {
            id: cluster.id().unwrap_or(cluster_id).to_string(),
            state,
        })
    }

    fn describe_step(&self, cluster_id: &str, step_id: &str) -> ClusterResult<StepDescription> {
        let output = self
            .session
            .block_on(
                self.client
                    .describe_step()
                    .cluster_id(cluster_id)
                    .step_id(step_id)
                    .send(),
            )
            .map_err(|e| ClusterError::Emr(e.into()))?;

        let step = output.step().ok_or(ClusterError::MissingField {
            operation: "DescribeStep",
            field: "Step",
        })?;

        Ok(StepDescription {
            id: step.id().unwrap_or(step_id).to_string(),
            name: step.name().unwrap_or_default().to_string(),
            state: step_state(step.status()),
        })
    }
}
