//! emr-spark-submit - run PySpark jobs on Amazon EMR
//!
//! Packages a directory of Python sources into a zip archive, stages it in
//! S3, and runs it on an EMR cluster as three steps (copy, extract,
//! `spark-submit`). The steps are either added to a running cluster or used
//! to create a new one, after which the tool polls until every step has
//! finished.

pub mod aws;
pub mod bundle;
pub mod cluster;
pub mod config;
pub mod job;
pub mod mock;
pub mod pipeline;
pub mod poll;
pub mod stage;
pub mod steps;

pub use bundle::{ArchiveArtifact, ArchiveError, Archiver};
pub use cluster::{ClusterError, ClusterService, ClusterSubmitter, HardwareProfile, Submission};
pub use config::{ConfigError, EffectiveConfig, Settings};
pub use job::JobFlowName;
pub use pipeline::{
    Pipeline, PlannedRequest, RunReport, Services, SubmissionPlan, SubmitError, SubmitRequest, Target,
};
pub use poll::{PollObserver, PollOutcome, StatusPoller};
pub use stage::{ObjectStore, RemoteStager, S3Uri, StagedArchive};
pub use steps::StepBuilder;
