//! Configuration Layering Tests
//!
//! Builtin defaults, user file, explicit file and CLI overrides feeding the
//! settings the pipeline runs with.

use std::fs;

use emr_spark_submit::config::{ConfigOrigin, EffectiveConfig};
use emr_spark_submit::Pipeline;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_cluster_table_reaches_created_cluster_template() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("team.toml");
    fs::write(
        &file,
        r#"
host_work_dir = "/mnt/jobs"

[cluster]
release_label = "emr-5.36.0"
applications = ["Spark"]
maximize_resource_allocation = false
"#,
    )
    .unwrap();

    let config = EffectiveConfig::build(None, Some(&file), Some(json!({"cluster": {"num_hosts": 5}}))).unwrap();
    let settings = config.settings();
    let template = settings.cluster.template();

    assert_eq!(template.release_label, "emr-5.36.0");
    assert_eq!(template.applications, vec!["Spark"]);
    assert!(!template.maximize_resource_allocation);
    assert_eq!(template.job_flow_role, "EMR_EC2_DefaultRole");
    assert_eq!(settings.cluster.profile(None, None).instance_count, 5);
    assert_eq!(settings.host_work_dir, "/mnt/jobs");
}

#[test]
fn test_user_from_config_names_the_job_flow() {
    let dir = TempDir::new().unwrap();
    let user_file = dir.path().join("config.toml");
    fs::write(&user_file, "user = \"etl-bot\"\n").unwrap();

    let config = EffectiveConfig::build(Some(&user_file), None, None).unwrap();
    assert_eq!(config.sources.last().map(|s| s.origin), Some(ConfigOrigin::User));

    let pipeline = Pipeline::new(config.into_settings());
    assert_eq!(pipeline.user(), "etl-bot");
}

#[test]
fn test_cli_beats_files() {
    let dir = TempDir::new().unwrap();
    let user_file = dir.path().join("user.toml");
    let team_file = dir.path().join("team.toml");
    fs::write(&user_file, "poll_interval_secs = 60\n").unwrap();
    fs::write(&team_file, "poll_interval_secs = 30\n").unwrap();

    let files_only = EffectiveConfig::build(Some(&user_file), Some(&team_file), None).unwrap();
    assert_eq!(files_only.settings().poll_interval_secs, 30);

    let with_cli =
        EffectiveConfig::build(Some(&user_file), Some(&team_file), Some(json!({"poll_interval_secs": 2}))).unwrap();
    assert_eq!(with_cli.settings().poll_interval_secs, 2);
}

#[test]
fn test_invalid_layer_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("bad.toml");
    fs::write(&file, "[cluster]\nnum_hosts = 0\n").unwrap();

    let err = EffectiveConfig::build(None, Some(&file), None).unwrap_err();
    assert!(err.to_string().contains("num_hosts"));
}
