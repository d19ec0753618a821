//! S3-backed object store

use std::fs;
use std::path::Path;
use std::sync::Arc;

use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use super::{ObjectStore, S3Uri, StageError};
use crate::aws::AwsSession;

/// Metadata key carrying the archive digest.
const SHA256_METADATA_KEY: &str = "sha256";

pub struct S3ObjectStore {
    session: Arc<AwsSession>,
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(session: Arc<AwsSession>) -> Self {
        let client = aws_sdk_s3::Client::new(session.sdk_config());
        Self { session, client }
    }
}

impl ObjectStore for S3ObjectStore {
    fn put_file(&self, target: &S3Uri, local: &Path, sha256: &str) -> Result<(), StageError> {
        let body = fs::read(local)?;
        debug!(target = %target, bytes = body.len(), "PutObject");

        self.session
            .block_on(
                self.client
                    .put_object()
                    .bucket(&target.bucket)
                    .key(&target.key)
                    .metadata(SHA256_METADATA_KEY, sha256)
                    .body(ByteStream::from(body))
                    .send(),
            )
            .map_err(|e| StageError::S3(e.into()))?;

        Ok(())
    }
}
