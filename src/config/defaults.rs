//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use emr_protocol::{DEFAULT_JOB_FLOW_ROLE, DEFAULT_RELEASE_LABEL, DEFAULT_SERVICE_ROLE};
use serde::{Deserialize, Serialize};

use crate::bundle::{ARCHIVE_NAME, DEFAULT_INCLUDE};
use crate::cluster::DEFAULT_INSTANCE_TYPE;
use crate::poll::DEFAULT_POLL_INTERVAL;
use crate::steps::DEFAULT_HOST_WORK_DIR;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Seconds between status polls (default: 5)
    pub poll_interval_secs: u64,

    /// Archive file name (default: "spark_zip.zip")
    pub archive_name: String,

    /// Include patterns for the archive (default: ["*.py"])
    pub include: Vec<String>,

    /// Working directory on cluster hosts (default: "/home/hadoop")
    pub host_work_dir: String,

    /// EMR release label (default: "emr-4.2.0")
    pub release_label: String,

    /// Applications installed on new clusters (default: Ganglia, Spark)
    pub applications: Vec<String>,

    /// Instance profile role (default: "EMR_EC2_DefaultRole")
    pub job_flow_role: String,

    /// Service role (default: "EMR_DefaultRole")
    pub service_role: String,

    /// Visible to all users of the account (default: true)
    pub visible_to_all_users: bool,

    /// Spark `maximizeResourceAllocation` (default: true)
    pub maximize_resource_allocation: bool,

    /// Instance type for new clusters (default: "m3.xlarge")
    pub hosts_type: String,

    /// Host count for new clusters (default: 1)
    pub num_hosts: u32,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            archive_name: ARCHIVE_NAME.to_string(),
            include: vec![DEFAULT_INCLUDE.to_string()],
            host_work_dir: DEFAULT_HOST_WORK_DIR.to_string(),
            release_label: DEFAULT_RELEASE_LABEL.to_string(),
            applications: vec!["Ganglia".to_string(), "Spark".to_string()],
            job_flow_role: DEFAULT_JOB_FLOW_ROLE.to_string(),
            service_role: DEFAULT_SERVICE_ROLE.to_string(),
            visible_to_all_users: true,
            maximize_resource_allocation: true,
            hosts_type: DEFAULT_INSTANCE_TYPE.to_string(),
            num_hosts: 1,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "poll_interval_secs": self.poll_interval_secs,
            "archive_name": self.archive_name,
            "include": self.include,
            "host_work_dir": self.host_work_dir,
            "cluster": {
                "release_label": self.release_label,
                "applications": self.applications,
                "job_flow_role": self.job_flow_role,
                "service_role": self.service_role,
                "visible_to_all_users": self.visible_to_all_users,
                "maximize_resource_allocation": self.maximize_resource_allocation,
                "hosts_type": self.hosts_type,
                "num_hosts": self.num_hosts
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.poll_interval_secs, 5);
        assert_eq!(defaults.archive_name, "spark_zip.zip");
        assert_eq!(defaults.include, vec!["*.py"]);
        assert_eq!(defaults.release_label, "emr-4.2.0");
        assert_eq!(defaults.hosts_type, "m3.xlarge");
        assert_eq!(defaults.num_hosts, 1);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["poll_interval_secs"], 5);
        assert_eq!(value["host_work_dir"], "/home/hadoop");
        assert_eq!(value["cluster"]["applications"][1], "Spark");
        assert_eq!(value["cluster"]["service_role"], "EMR_DefaultRole");
    }
}
