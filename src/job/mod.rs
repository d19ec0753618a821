//! Job flow naming
//!
//! Every submission gets a name `{user}.{entry_point}.{unix_seconds}`. The
//! name is used as the cluster name, as the remote sources prefix in object
//! storage and as the working directory on the cluster hosts, so one name
//! traces a submission end to end.

use chrono::{DateTime, Utc};
use std::fmt;

/// Environment variables consulted for the submitting user, in order.
const USER_ENV_VARS: &[&str] = &["USER", "USERNAME", "LOGNAME"];

/// Fallback when no user can be determined.
pub const UNKNOWN_USER: &str = "unknown";

/// Name identifying one submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobFlowName {
    user: String,
    entry_point: String,
    timestamp: i64,
}

impl JobFlowName {
    /// Build a name from its parts.
    pub fn new(user: impl Into<String>, entry_point: impl Into<String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            entry_point: entry_point.into(),
            timestamp: submitted_at.timestamp(),
        }
    }
}

impl fmt::Display for JobFlowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.user, self.entry_point, self.timestamp)
    }
}

/// Determine the submitting user from the environment.
pub fn current_user() -> String {
    USER_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}
