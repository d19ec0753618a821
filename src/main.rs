//! emr-spark-submit CLI
//!
//! Entry point for the `emr-spark-submit` command-line tool.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use chrono::Utc;
use clap::{CommandFactory, Parser, ValueEnum};
use emr_spark_submit::aws::AwsSession;
use emr_spark_submit::cluster::EmrClusterService;
use emr_spark_submit::config::{default_user_config_path, EffectiveConfig, Settings};
use emr_spark_submit::poll::{ConsoleObserver, PollObserver, TracingObserver};
use emr_spark_submit::stage::S3ObjectStore;
use emr_spark_submit::{Pipeline, Services, SubmitError, SubmitRequest, Target};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emr-spark-submit")]
#[command(about = "Package a PySpark job and run it on Amazon EMR", version)]
struct Cli {
    /// AWS region of the cluster and bucket
    #[arg(long, alias = "aws_region")]
    aws_region: String,

    /// Directory holding the Python sources
    #[arg(long, alias = "python_path")]
    python_path: PathBuf,

    /// Entry point, relative to --python-path
    #[arg(long, alias = "spark_main")]
    spark_main: String,

    /// Arguments passed to the entry point, whitespace separated
    #[arg(long, alias = "spark_main_args", allow_hyphen_values = true)]
    spark_main_args: Option<String>,

    /// Bucket for sources and cluster logs
    #[arg(long, alias = "s3_work_bucket")]
    s3_work_bucket: String,

    /// Add the steps to this running cluster
    #[arg(long, alias = "job_flow_id")]
    job_flow_id: Option<String>,

    /// Create a new cluster to run the steps
    #[arg(long, alias = "create_cluster")]
    create_cluster: bool,

    /// Instance type of a new cluster [default: m3.xlarge]
    #[arg(long, alias = "create_cluster_hosts_type")]
    create_cluster_hosts_type: Option<String>,

    /// Number of hosts of a new cluster [default: 1]
    #[arg(long, alias = "create_cluster_num_hosts")]
    create_cluster_num_hosts: Option<u32>,

    /// EC2 key pair for a new cluster
    #[arg(long, alias = "create_cluster_ec2_key_name")]
    create_cluster_ec2_key_name: Option<String>,

    /// Subnet for a new cluster
    #[arg(long, alias = "create_cluster_ec2_subnet_id")]
    create_cluster_ec2_subnet_id: Option<String>,

    /// Extra config file, applied over ~/.config/emr-spark-submit/config.toml
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Seconds between status polls [default: 5]
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// How progress is reported while polling
    #[arg(long, value_enum, default_value_t = Progress::Console)]
    progress: Progress,

    /// Build the archive and print the planned request as JSON without calling AWS
    #[arg(long)]
    dry_run: bool,

    /// Exit non-zero if any step failed
    #[arg(long)]
    fail_on_step_failure: bool,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Progress {
    /// Tab-separated status line per poll
    Console,
    /// Structured log events
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Attach(String),
    Create,
}

impl Cli {
    /// `--job-flow-id` wins when both selectors are given.
    fn selector(&self) -> Option<Selector> {
        match (&self.job_flow_id, self.create_cluster) {
            (Some(id), _) => Some(Selector::Attach(id.clone())),
            (None, true) => Some(Selector::Create),
            (None, false) => None,
        }
    }

    /// Flags that override configuration values.
    fn config_overrides(&self) -> serde_json::Value {
        let mut overrides = serde_json::Map::new();
        if let Some(secs) = self.poll_interval_secs {
            overrides.insert("poll_interval_secs".to_string(), secs.into());
        }

        let mut cluster = serde_json::Map::new();
        if let Some(hosts_type) = &self.create_cluster_hosts_type {
            cluster.insert("hosts_type".to_string(), hosts_type.clone().into());
        }
        if let Some(num_hosts) = self.create_cluster_num_hosts {
            cluster.insert("num_hosts".to_string(), num_hosts.into());
        }
        if !cluster.is_empty() {
            overrides.insert("cluster".to_string(), cluster.into());
        }

        serde_json::Value::Object(overrides)
    }

    fn submit_request(&self, selector: Selector, settings: &Settings) -> SubmitRequest {
        let target = match selector {
            Selector::Attach(cluster_id) => Target::Attach { cluster_id },
            Selector::Create => Target::Create {
                profile: settings.cluster.profile(
                    self.create_cluster_ec2_key_name.clone(),
                    self.create_cluster_ec2_subnet_id.clone(),
                ),
            },
        };

        SubmitRequest {
            region: self.aws_region.clone(),
            python_path: self.python_path.clone(),
            spark_main: self.spark_main.clone(),
            spark_main_args: self.spark_main_args.clone(),
            bucket: self.s3_work_bucket.clone(),
            target,
            submitted_at: Utc::now(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(selector) = cli.selector() else {
        println!("Nothing to do");
        if let Err(e) = Cli::command().print_help() {
            eprintln!("Error: {}", e);
        }
        process::exit(0);
    };

    match run(&cli, selector) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, selector: Selector) -> Result<(), SubmitError> {
    let user_config = default_user_config_path();
    let config = EffectiveConfig::build(
        user_config.as_deref(),
        cli.config.as_deref(),
        Some(cli.config_overrides()),
    )?;
    let settings = config.into_settings();

    let request = cli.submit_request(selector, &settings);
    let pipeline = Pipeline::new(settings);

    if cli.dry_run {
        let plan = pipeline.plan(&request)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let session = Arc::new(AwsSession::connect(&request.region)?);
    let services = Services {
        cluster: Arc::new(EmrClusterService::new(session.clone())),
        store: Arc::new(S3ObjectStore::new(session)),
    };

    let mut console;
    let mut log;
    let observer: &mut dyn PollObserver = match cli.progress {
        Progress::Console => {
            console = ConsoleObserver::stdout();
            &mut console
        }
        Progress::Log => {
            log = TracingObserver;
            &mut log
        }
    };

    let report = pipeline.run(&request, &services, observer)?;
    if cli.fail_on_step_failure {
        report.ensure_all_completed()?;
    }
    Ok(())
}
