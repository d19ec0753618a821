//! Step construction
//!
//! Every submission runs the same three steps on the master node:
//!
//! 1. copy the archive from object storage into the host working directory
//! 2. unzip it in place
//! 3. `spark-submit` the entry point with the archive on the Python path
//!
//! A newly created cluster additionally runs a bootstrap step first that
//! terminates the cluster if it fails.

use emr_protocol::{ActionOnFailure, StepConfig};

use crate::stage::StagedArchive;

/// Default working directory on cluster hosts.
pub const DEFAULT_HOST_WORK_DIR: &str = "/home/hadoop";

pub const COPY_STEP_NAME: &str = "setup - copy files";
pub const EXTRACT_STEP_NAME: &str = "setup - extract files";
pub const BOOTSTRAP_STEP_NAME: &str = "Setup Debugging";

/// Step construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepBuildError {
    #[error("entry point is empty")]
    EmptyEntryPoint,

    #[error("entry point must be relative to the source directory: {0}")]
    AbsoluteEntryPoint(String),

    #[error("host working directory must be absolute: {0}")]
    RelativeWorkDir(String),
}

/// Paths of the staged sources on a cluster host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    /// Directory the archive is copied into and extracted in
    pub sources_dir: String,
    /// The archive after copying
    pub archive_path: String,
    /// The entry point after extraction
    pub entry_point_path: String,
}

impl HostLayout {
    pub fn new(work_dir: &str, staged: &StagedArchive, entry_point: &str) -> Self {
        let sources_dir = format!("{}/{}", work_dir.trim_end_matches('/'), staged.job_flow_name);
        Self {
            archive_path: format!("{}/{}", sources_dir, staged.archive_file),
            entry_point_path: format!("{}/{}", sources_dir, entry_point),
            sources_dir,
        }
    }
}

/// Split the user's argument string.
///
/// No argument string at all (or an empty one) yields a single empty
/// argument, which older job scripts rely on. Anything else is split on
/// whitespace.
pub fn split_args(args: Option<&str>) -> Vec<String> {
    match args {
        Some(s) if !s.is_empty() => s.split_whitespace().map(String::from).collect(),
        _ => vec![String::new()],
    }
}

/// Builds the step list for a staged archive.
#[derive(Debug, Clone)]
pub struct StepBuilder {
    host_work_dir: String,
}

impl Default for StepBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_WORK_DIR)
    }
}

impl StepBuilder {
    pub fn new(host_work_dir: impl Into<String>) -> Self {
        Self {
            host_work_dir: host_work_dir.into(),
        }
    }

    /// Build the copy, extract and run steps, in that order.
    pub fn job_steps(
        &self,
        staged: &StagedArchive,
        entry_point: &str,
        args: Option<&str>,
    ) -> Result<Vec<StepConfig>, StepBuildError> {
        if entry_point.trim().is_empty() {
            return Err(StepBuildError::EmptyEntryPoint);
        }
        if entry_point.starts_with('/') {
            return Err(StepBuildError::AbsoluteEntryPoint(entry_point.to_string()));
        }
        if !self.host_work_dir.starts_with('/') {
            return Err(StepBuildError::RelativeWorkDir(self.host_work_dir.clone()));
        }

        let layout = HostLayout::new(&self.host_work_dir, staged, entry_point);

        let copy = StepConfig::command(
            COPY_STEP_NAME,
            ActionOnFailure::CancelAndWait,
            [
                "aws".to_string(),
                "s3".to_string(),
                "cp".to_string(),
                staged.archive_uri.to_string(),
                format!("{}/", layout.sources_dir),
            ],
        );

        let extract = StepConfig::command(
            EXTRACT_STEP_NAME,
            ActionOnFailure::CancelAndWait,
            [
                "unzip".to_string(),
                layout.archive_path.clone(),
                "-d".to_string(),
                layout.sources_dir.clone(),
            ],
        );

        let mut run_args = vec![
            "spark-submit".to_string(),
            "--py-files".to_string(),
            layout.archive_path.clone(),
            layout.entry_point_path.clone(),
        ];
        run_args.extend(split_args(args));
        let run = StepConfig::command(run_step_name(entry_point), ActionOnFailure::CancelAndWait, run_args);

        Ok(vec![copy, extract, run])
    }
}

/// Name of the step that runs the entry point.
pub fn run_step_name(entry_point: &str) -> String {
    format!("run spark {}", entry_point)
}

/// Bootstrap step for newly created clusters.
pub fn bootstrap_step() -> StepConfig {
    StepConfig::command(
        BOOTSTRAP_STEP_NAME,
        ActionOnFailure::TerminateCluster,
        ["state-pusher-script"],
    )
}
