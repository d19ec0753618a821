//! Effective configuration with provenance
//!
//! The merged configuration plus information about which layers
//! contributed to it, and the typed [`Settings`] view used by the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::cluster::{ClusterTemplate, HardwareProfile};

/// Upper bound for `poll_interval_secs`
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;

/// Origin of a configuration source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    File,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this source
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Cluster creation settings (`[cluster]` table)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterSettings {
    pub release_label: String,
    pub applications: Vec<String>,
    pub job_flow_role: String,
    pub service_role: String,
    pub visible_to_all_users: bool,
    pub maximize_resource_allocation: bool,
    pub hosts_type: String,
    pub num_hosts: u32,
}

impl ClusterSettings {
    pub fn template(&self) -> ClusterTemplate {
        ClusterTemplate {
            release_label: self.release_label.clone(),
            applications: self.applications.clone(),
            job_flow_role: self.job_flow_role.clone(),
            service_role: self.service_role.clone(),
            visible_to_all_users: self.visible_to_all_users,
            maximize_resource_allocation: self.maximize_resource_allocation,
        }
    }

    /// Hardware for a new cluster; key pair and subnet come from the command line.
    pub fn profile(&self, key_name: Option<String>, subnet_id: Option<String>) -> HardwareProfile {
        HardwareProfile {
            instance_type: self.hosts_type.clone(),
            instance_count: self.num_hosts,
            key_name,
            subnet_id,
        }
    }
}

/// Typed view of the merged configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub poll_interval_secs: u64,
    pub archive_name: String,
    pub include: Vec<String>,
    pub host_work_dir: String,
    /// Overrides the user taken from the environment
    #[serde(default)]
    pub user: Option<String>,
    pub cluster: ClusterSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let d = BuiltinDefaults::default();
        Self {
            poll_interval_secs: d.poll_interval_secs,
            archive_name: d.archive_name,
            include: d.include,
            host_work_dir: d.host_work_dir,
            user: None,
            cluster: ClusterSettings {
                release_label: d.release_label,
                applications: d.applications,
                job_flow_role: d.job_flow_role,
                service_role: d.service_role,
                visible_to_all_users: d.visible_to_all_users,
                maximize_resource_allocation: d.maximize_resource_allocation,
                hosts_type: d.hosts_type,
                num_hosts: d.num_hosts,
            },
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(ConfigError::ValidationError(format!(
                "poll_interval_secs must be in (0, {}]",
                MAX_POLL_INTERVAL_SECS
            )));
        }
        if self.cluster.num_hosts == 0 {
            return Err(ConfigError::ValidationError(
                "cluster.num_hosts must be at least 1".to_string(),
            ));
        }
        if self.include.is_empty() {
            return Err(ConfigError::ValidationError(
                "include must list at least one pattern".to_string(),
            ));
        }
        if self.archive_name.is_empty() || self.archive_name.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "archive_name must be a plain file name: '{}'",
                self.archive_name
            )));
        }
        Ok(())
    }
}

/// Merged configuration with provenance
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    #[serde(skip)]
    settings: Settings,
}

impl EffectiveConfig {
    /// Build effective config from layers.
    ///
    /// A missing user config is skipped; a missing `--config` file is an error.
    pub fn build(
        user_config_path: Option<&Path>,
        config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        // Layer 2: User config
        if let Some(path) = user_config_path {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::User,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        // Layer 3: Explicit config file
        if let Some(path) = config_path {
            let (value, digest) = Self::load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        // Layer 4: CLI overrides
        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let settings: Settings = serde_json::from_value(merged.clone())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        settings.validate()?;

        for source in &sources {
            debug!(
                origin = ?source.origin,
                path = source.path.as_deref().unwrap_or("-"),
                digest = source.digest.as_deref().unwrap_or("-"),
                "config layer"
            );
        }

        Ok(Self {
            config: merged,
            sources,
            settings,
        })
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => Value::Array(arr.into_iter().map(Self::toml_to_json).collect()),
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    /// Get a config value by path (dot-separated)
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.config;
        for part in path.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }
}

/// `~/.config/emr-spark-submit/config.toml`, if a home directory is known.
pub fn default_user_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").filter(|h| !h.is_empty())?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("emr-spark-submit")
            .join("config.toml"),
    )
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_deserialize() {
        let config = EffectiveConfig::build(None, None, None).unwrap();
        let settings = config.settings();

        assert_eq!(settings, &Settings::default());
        assert_eq!(settings.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.cluster.template(), ClusterTemplate::default());
        assert_eq!(settings.user, None);
    }

    #[test]
    fn test_build_with_cli_override() {
        let cli = serde_json::json!({
            "poll_interval_secs": 30,
            "cluster": {"num_hosts": 3}
        });

        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();

        assert_eq!(config.settings().poll_interval_secs, 30);
        assert_eq!(config.settings().cluster.num_hosts, 3);
        assert_eq!(config.settings().cluster.hosts_type, "m3.xlarge");
    }

    #[test]
    fn test_validation_poll_interval() {
        for bad in [0, 3601] {
            let cli = serde_json::json!({ "poll_interval_secs": bad });
            let result = EffectiveConfig::build(None, None, Some(cli));
            assert!(result.unwrap_err().to_string().contains("poll_interval_secs"));
        }
    }

    #[test]
    fn test_validation_num_hosts_and_include() {
        let cli = serde_json::json!({ "cluster": {"num_hosts": 0} });
        assert!(EffectiveConfig::build(None, None, Some(cli)).is_err());

        let cli = serde_json::json!({ "include": [] });
        assert!(EffectiveConfig::build(None, None, Some(cli)).is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let cli = serde_json::json!({ "poll_intervl_secs": 3 });
        assert!(matches!(
            EffectiveConfig::build(None, None, Some(cli)),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_file_layers_and_precedence() {
        let mut user = NamedTempFile::new().unwrap();
        writeln!(user, "poll_interval_secs = 20").unwrap();
        writeln!(user, "user = \"etl\"").unwrap();
        writeln!(user, "[cluster]").unwrap();
        writeln!(user, "release_label = \"emr-5.36.0\"").unwrap();

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_secs = 10").unwrap();
        writeln!(file, "include = [\"*.py\", \"*.sql\"]").unwrap();

        let cli = serde_json::json!({ "poll_interval_secs": 2 });
        let config = EffectiveConfig::build(Some(user.path()), Some(file.path()), Some(cli)).unwrap();
        let settings = config.settings();

        assert_eq!(settings.poll_interval_secs, 2);
        assert_eq!(settings.user.as_deref(), Some("etl"));
        assert_eq!(settings.include, vec!["*.py", "*.sql"]);
        assert_eq!(settings.cluster.release_label, "emr-5.36.0");
        assert_eq!(settings.cluster.applications, vec!["Ganglia", "Spark"]);
        assert_eq!(config.get("cluster.release_label").and_then(Value::as_str), Some("emr-5.36.0"));

        let origins: Vec<ConfigOrigin> = config.sources.iter().map(|s| s.origin).collect();
        assert_eq!(
            origins,
            vec![ConfigOrigin::Builtin, ConfigOrigin::User, ConfigOrigin::File, ConfigOrigin::Cli]
        );
        assert_eq!(config.sources[1].digest.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn test_missing_user_config_is_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = EffectiveConfig::build(Some(&dir.path().join("absent.toml")), None, None).unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = EffectiveConfig::build(None, Some(&dir.path().join("absent.toml")), None);
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_secs = = 3").unwrap();
        let result = EffectiveConfig::build(None, Some(file.path()), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_profile_from_settings() {
        let settings = Settings::default();
        let profile = settings.cluster.profile(Some("ops".to_string()), None);

        assert_eq!(profile.instance_type, "m3.xlarge");
        assert_eq!(profile.instance_count, 1);
        assert_eq!(profile.key_name.as_deref(), Some("ops"));
    }
}
