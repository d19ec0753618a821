//! Pipeline orchestration
//!
//! One submission runs, strictly in order:
//! - Check local preconditions (no remote call happens before these pass)
//! - Archive the Python sources
//! - Build the job steps
//! - Upload the archive
//! - Submit the steps (attach to a cluster or create one)
//! - Poll until every step is COMPLETED or FAILED
//!
//! `plan` stops after the step list is built and returns the request that
//! would be sent, for `--dry-run`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use emr_protocol::{AddStepsRequest, RunJobFlowRequest, StepConfig};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::bundle::{ArchiveArtifact, ArchiveError, Archiver};
use crate::cluster::{console_url, log_uri, ClusterError, ClusterService, ClusterSubmitter, HardwareProfile, Submission};
use crate::config::{ConfigError, Settings};
use crate::job::{current_user, JobFlowName};
use crate::poll::{PollObserver, PollOutcome, StatusPoller};
use crate::stage::{plan_staging, ObjectStore, RemoteStager, StageError, StagedArchive};
use crate::steps::{StepBuildError, StepBuilder};

/// Submission errors
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Precondition(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid step: {0}")]
    Steps(#[from] StepBuildError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("upload error: {0}")]
    Stage(#[from] StageError),

    #[error("AWS session error: {0}")]
    Session(#[from] std::io::Error),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("steps failed on {cluster_id}: {}", failed.join(", "))]
    StepsFailed { cluster_id: String, failed: Vec<String> },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SubmitError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SubmitError::Precondition(_) => 2,
            SubmitError::Config(_) => 2,
            SubmitError::Steps(_) => 2,
            SubmitError::Archive(_) => 92,
            SubmitError::Stage(_) => 93,
            SubmitError::Session(_) => 20,
            SubmitError::Cluster(_) => 20,
            SubmitError::StepsFailed { .. } => 50,
            SubmitError::Serialization(_) => 1,
        }
    }
}

/// Result type for pipeline operations
pub type SubmitResult<T> = Result<T, SubmitError>;

/// Where the steps go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Append to a running cluster
    Attach { cluster_id: String },
    /// Create a cluster that runs the steps
    Create { profile: HardwareProfile },
}

/// One submission as requested on the command line.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub region: String,
    /// Local directory holding the Python sources
    pub python_path: PathBuf,
    /// Entry point, relative to `python_path`
    pub spark_main: String,
    pub spark_main_args: Option<String>,
    /// Work bucket for sources and logs
    pub bucket: String,
    pub target: Target,
    pub submitted_at: DateTime<Utc>,
}

/// Remote collaborators.
#[derive(Clone)]
pub struct Services {
    pub cluster: Arc<dyn ClusterService>,
    pub store: Arc<dyn ObjectStore>,
}

/// Archive details reported by a plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedArchive {
    pub local_path: PathBuf,
    pub entries: Vec<String>,
    pub size: u64,
    pub sha256: String,
    pub uri: String,
}

/// The cluster API call a submission would make.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "Operation")]
pub enum PlannedRequest {
    AddJobFlowSteps(AddStepsRequest),
    RunJobFlow(RunJobFlowRequest),
}

/// Output of `--dry-run`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPlan {
    pub job_flow_name: String,
    pub archive: PlannedArchive,
    pub request: PlannedRequest,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub job_flow_name: String,
    pub archive_uri: String,
    pub submission: Submission,
    pub outcome: PollOutcome,
}

impl RunReport {
    /// Error if any watched step failed.
    pub fn ensure_all_completed(&self) -> SubmitResult<()> {
        let failed: Vec<String> = self.outcome.failed_steps().iter().map(|s| s.name.clone()).collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(SubmitError::StepsFailed {
                cluster_id: self.submission.cluster_id.clone(),
                failed,
            })
        }
    }
}

/// Everything computed locally before the first remote call.
struct Prepared {
    name: JobFlowName,
    artifact: ArchiveArtifact,
    staged: StagedArchive,
    request: PlannedRequest,
}

/// Pipeline execution context
pub struct Pipeline {
    settings: Settings,
    user: String,
    archive_dir: PathBuf,
}

impl Pipeline {
    /// Create a new pipeline with the given settings
    pub fn new(settings: Settings) -> Self {
        let user = settings.user.clone().unwrap_or_else(current_user);
        Self {
            settings,
            user,
            archive_dir: std::env::temp_dir(),
        }
    }

    /// Write the archive into `dir` instead of the system temp directory.
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = dir.into();
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Build the archive and the request without contacting AWS.
    pub fn plan(&self, request: &SubmitRequest) -> SubmitResult<SubmissionPlan> {
        let prepared = self.prepare(request)?;
        Ok(SubmissionPlan {
            job_flow_name: prepared.name.to_string(),
            archive: PlannedArchive {
                local_path: prepared.artifact.path.clone(),
                entries: prepared.artifact.entries.clone(),
                size: prepared.artifact.size,
                sha256: prepared.artifact.sha256.clone(),
                uri: prepared.staged.archive_uri.to_string(),
            },
            request: prepared.request,
        })
    }

    /// Upload, submit and stop once the steps are on the cluster.
    pub fn submit(&self, request: &SubmitRequest, services: &Services) -> SubmitResult<(StagedArchive, Submission)> {
        let prepared = self.prepare(request)?;

        let stager = RemoteStager::new(services.store.clone(), request.bucket.clone());
        let staged = stager.stage(&prepared.artifact, &prepared.name)?;

        let submitter = ClusterSubmitter::new(services.cluster.clone());
        let submission = match &prepared.request {
            PlannedRequest::AddJobFlowSteps(add) => submitter.attach(&add.job_flow_id, add.steps.clone())?,
            PlannedRequest::RunJobFlow(run) => submitter.create(run)?,
        };

        info!(
            cluster_id = %submission.cluster_id,
            url = %console_url(&request.region, &submission.cluster_id),
            "submitted"
        );
        Ok((staged, submission))
    }

    /// Full run: submit, then poll until every step is terminal.
    pub fn run(
        &self,
        request: &SubmitRequest,
        services: &Services,
        observer: &mut dyn PollObserver,
    ) -> SubmitResult<RunReport> {
        let (staged, submission) = self.submit(request, services)?;

        let poller = StatusPoller::with_interval(services.cluster.clone(), self.settings.poll_interval());
        let outcome = poller.poll(&submission.cluster_id, &submission.step_ids, observer)?;

        let failed = outcome.failed_steps().len();
        if failed > 0 {
            warn!(cluster_id = %submission.cluster_id, failed, "finished with failed steps");
        } else {
            info!(cluster_id = %submission.cluster_id, ticks = outcome.ticks, "all steps completed");
        }

        Ok(RunReport {
            job_flow_name: staged.job_flow_name.clone(),
            archive_uri: staged.archive_uri.to_string(),
            submission,
            outcome,
        })
    }

    fn prepare(&self, request: &SubmitRequest) -> SubmitResult<Prepared> {
        self.check_preconditions(request)?;
        let spark_main = normalize_entry_point(&request.spark_main);

        let name = JobFlowName::new(&self.user, spark_main, request.submitted_at);

        let artifact = Archiver::new(&request.python_path)
            .with_include(self.settings.include.iter().cloned())
            .create_archive(&self.archive_dir.join(&self.settings.archive_name))?;
        if !artifact.contains(spark_main) {
            return Err(ArchiveError::EntryPointMissing(spark_main.to_string()).into());
        }

        let staged = plan_staging(&request.bucket, &name, &self.settings.archive_name);
        let steps = StepBuilder::new(self.settings.host_work_dir.clone()).job_steps(
            &staged,
            spark_main,
            request.spark_main_args.as_deref(),
        )?;

        let planned = self.planned_request(request, &name, spark_main, steps)?;
        Ok(Prepared {
            name,
            artifact,
            staged,
            request: planned,
        })
    }

    fn planned_request(
        &self,
        request: &SubmitRequest,
        name: &JobFlowName,
        spark_main: &str,
        steps: Vec<StepConfig>,
    ) -> SubmitResult<PlannedRequest> {
        match &request.target {
            Target::Attach { cluster_id } => Ok(PlannedRequest::AddJobFlowSteps(AddStepsRequest {
                job_flow_id: cluster_id.clone(),
                steps,
            })),
            Target::Create { profile } => {
                let run = self.settings.cluster.template().run_job_flow_request(
                    &name.to_string(),
                    &log_uri(&request.bucket, &self.user),
                    profile,
                    steps,
                    spark_main,
                )?;
                Ok(PlannedRequest::RunJobFlow(run))
            }
        }
    }

    fn check_preconditions(&self, request: &SubmitRequest) -> SubmitResult<()> {
        if request.region.trim().is_empty() {
            return Err(SubmitError::Precondition("--aws-region is empty".to_string()));
        }
        if request.bucket.trim().is_empty() || request.bucket.contains('/') {
            return Err(SubmitError::Precondition(format!(
                "--s3-work-bucket must be a bucket name: '{}'",
                request.bucket
            )));
        }
        if !request.python_path.is_dir() {
            return Err(SubmitError::Precondition(format!(
                "--python-path is not a directory: {}",
                request.python_path.display()
            )));
        }

        let spark_main = normalize_entry_point(&request.spark_main);
        if spark_main.is_empty() {
            return Err(SubmitError::Precondition("--spark-main is empty".to_string()));
        }
        if Path::new(spark_main).is_absolute() {
            return Err(SubmitError::Precondition(format!(
                "--spark-main must be relative to --python-path: {}",
                spark_main
            )));
        }
        if !request.python_path.join(spark_main).is_file() {
            return Err(SubmitError::Precondition(format!(
                "--spark-main not found under {}: {}",
                request.python_path.display(),
                spark_main
            )));
        }

        match &request.target {
            Target::Attach { cluster_id } if cluster_id.trim().is_empty() => {
                Err(SubmitError::Precondition("--job-flow-id is empty".to_string()))
            }
            Target::Attach { .. } => Ok(()),
            Target::Create { profile } => profile
                .validate()
                .map_err(|e| SubmitError::Precondition(e.to_string())),
        }
    }
}

/// Entry point as it appears inside the archive.
fn normalize_entry_point(spark_main: &str) -> &str {
    spark_main.trim().trim_start_matches("./")
}
