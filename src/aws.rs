//! AWS session
//!
//! The SDK clients are async. The tool itself is strictly sequential, so one
//! current-thread runtime is shared by the EMR and S3 services and every call
//! blocks until the SDK future resolves. No two remote calls ever overlap.

use std::future::Future;
use std::io;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_emr::config::Region;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Loaded SDK configuration plus the runtime used to drive it.
pub struct AwsSession {
    runtime: Runtime,
    sdk_config: SdkConfig,
}

impl AwsSession {
    /// Resolve credentials and settings for `region` via the default provider chain.
    pub fn connect(region: &str) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let sdk_config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load(),
        );
        debug!(region, "loaded AWS configuration");
        Ok(Self { runtime, sdk_config })
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.sdk_config
    }

    /// Run one SDK call to completion.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
