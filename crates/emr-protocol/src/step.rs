//! Step types.
//!
//! A step is one command run on the master node. Steps are executed by the
//! service in the order they were submitted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::COMMAND_RUNNER_JAR;

/// What the cluster does when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionOnFailure {
    /// Shut down the whole cluster.
    TerminateCluster,
    /// Cancel the remaining steps and keep the cluster waiting.
    CancelAndWait,
    /// Ignore the failure and run the next step.
    Continue,
    /// Legacy alias of `TerminateCluster`.
    TerminateJobFlow,
}

impl ActionOnFailure {
    /// Wire name of this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TerminateCluster => "TERMINATE_CLUSTER",
            Self::CancelAndWait => "CANCEL_AND_WAIT",
            Self::Continue => "CONTINUE",
            Self::TerminateJobFlow => "TERMINATE_JOB_FLOW",
        }
    }
}

impl fmt::Display for ActionOnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised failure-action name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action on failure: {0}")]
pub struct UnknownActionOnFailure(pub String);

impl FromStr for ActionOnFailure {
    type Err = UnknownActionOnFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TERMINATE_CLUSTER" => Ok(Self::TerminateCluster),
            "CANCEL_AND_WAIT" => Ok(Self::CancelAndWait),
            "CONTINUE" => Ok(Self::Continue),
            "TERMINATE_JOB_FLOW" => Ok(Self::TerminateJobFlow),
            other => Err(UnknownActionOnFailure(other.to_string())),
        }
    }
}

/// Jar invocation for a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HadoopJarStep {
    /// Jar to run (`command-runner.jar` for shell commands).
    pub jar: String,
    /// Arguments passed to the jar.
    pub args: Vec<String>,
}

impl HadoopJarStep {
    /// Run an arbitrary command through `command-runner.jar`.
    pub fn command<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            jar: COMMAND_RUNNER_JAR.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// A step as submitted to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StepConfig {
    /// Display name.
    pub name: String,
    /// Failure policy.
    pub action_on_failure: ActionOnFailure,
    /// Jar and arguments to run.
    pub hadoop_jar_step: HadoopJarStep,
}

impl StepConfig {
    /// Create a step running `args` through `command-runner.jar`.
    pub fn command<I, S>(name: impl Into<String>, action_on_failure: ActionOnFailure, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            action_on_failure,
            hadoop_jar_step: HadoopJarStep::command(args),
        }
    }

    /// Arguments of the underlying command.
    pub fn args(&self) -> &[String] {
        &self.hadoop_jar_step.args
    }
}

/// Step state as reported by the service.
///
/// Values outside the known vocabulary are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepState {
    Pending,
    CancelPending,
    Running,
    Completed,
    Cancelled,
    Failed,
    Interrupted,
    Other(String),
}

impl StepState {
    /// Parse a wire value.
    pub fn parse(s: &str) -> Self {
        match s {
            "PENDING" => Self::Pending,
            "CANCEL_PENDING" => Self::CancelPending,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "CANCELLED" => Self::Cancelled,
            "FAILED" => Self::Failed,
            "INTERRUPTED" => Self::Interrupted,
            other => Self::Other(other.to_string()),
        }
    }

    /// Wire value.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::CancelPending => "CANCEL_PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::Interrupted => "INTERRUPTED",
            Self::Other(s) => s,
        }
    }

    /// Whether polling may stop watching this step.
    ///
    /// Only COMPLETED and FAILED count; a CANCELLED step is still watched.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl From<String> for StepState {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<StepState> for String {
    fn from(state: StepState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_config_serializes_pascal_case() {
        let step = StepConfig::command(
            "setup - copy files",
            ActionOnFailure::CancelAndWait,
            ["aws", "s3", "cp"],
        );
        let json = serde_json::to_value(&step).unwrap();

        assert_eq!(json["Name"], "setup - copy files");
        assert_eq!(json["ActionOnFailure"], "CANCEL_AND_WAIT");
        assert_eq!(json["HadoopJarStep"]["Jar"], "command-runner.jar");
        assert_eq!(json["HadoopJarStep"]["Args"][2], "cp");
    }

    #[test]
    fn test_action_on_failure_from_str() {
        assert_eq!(
            "TERMINATE_CLUSTER".parse::<ActionOnFailure>().unwrap(),
            ActionOnFailure::TerminateCluster
        );
        assert!("EXPLODE".parse::<ActionOnFailure>().is_err());
    }

    #[test]
    fn test_only_completed_and_failed_are_terminal() {
        assert!(StepState::Completed.is_terminal());
        assert!(StepState::Failed.is_terminal());
        assert!(!StepState::Pending.is_terminal());
        assert!(!StepState::Running.is_terminal());
        assert!(!StepState::Cancelled.is_terminal());
        assert!(!StepState::Interrupted.is_terminal());
    }

    #[test]
    fn test_unknown_step_state_is_preserved() {
        let state: StepState = serde_json::from_str("\"WARMING_UP\"").unwrap();
        assert_eq!(state, StepState::Other("WARMING_UP".to_string()));
        assert_eq!(serde_json::to_string(&state).unwrap(), "\"WARMING_UP\"");
    }
}
