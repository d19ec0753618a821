//! Remote staging
//!
//! Uploads the source archive to object storage under a path derived from the
//! job flow name:
//!
//! ```text
//! s3://{bucket}/sources/{user}.{entry_point}.{timestamp}/spark_zip.zip
//! ```
//!
//! The upload must finish before any step that references the archive is
//! submitted; staging returns only after the store has accepted the object.

mod s3;

pub use s3::S3ObjectStore;

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::bundle::{ArchiveArtifact, ARCHIVE_NAME};
use crate::job::JobFlowName;

/// Prefix under which sources are staged.
pub const SOURCES_PREFIX: &str = "sources";

/// Object storage errors
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] aws_sdk_s3::Error),

    #[error("Upload rejected: {0}")]
    Rejected(String),

    #[error("Invalid bucket name: '{0}'")]
    InvalidBucket(String),
}

/// Location of an object in S3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
}

impl S3Uri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for S3Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Object storage seam
pub trait ObjectStore: Send + Sync {
    /// Upload the local file at `local` to `target`, tagging it with its digest.
    fn put_file(&self, target: &S3Uri, local: &Path, sha256: &str) -> Result<(), StageError>;
}

/// An archive that is available in object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArchive {
    /// Name of the submission the archive belongs to
    pub job_flow_name: String,
    /// Prefix holding the sources (`sources/{job_flow_name}`)
    pub sources_uri: S3Uri,
    /// The archive object itself
    pub archive_uri: S3Uri,
    /// File name of the archive
    pub archive_file: String,
}

/// Compute the remote location of an archive without uploading it.
pub fn plan_staging(bucket: &str, name: &JobFlowName, archive_file: &str) -> StagedArchive {
    let sources_key = format!("{}/{}", SOURCES_PREFIX, name);
    StagedArchive {
        job_flow_name: name.to_string(),
        archive_uri: S3Uri::new(bucket, format!("{}/{}", sources_key, archive_file)),
        sources_uri: S3Uri::new(bucket, sources_key),
        archive_file: archive_file.to_string(),
    }
}

/// Uploads archives to a bucket.
pub struct RemoteStager {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl RemoteStager {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload `artifact` for the submission `name`.
    pub fn stage(&self, artifact: &ArchiveArtifact, name: &JobFlowName) -> Result<StagedArchive, StageError> {
        if self.bucket.is_empty() || self.bucket.contains('/') {
            return Err(StageError::InvalidBucket(self.bucket.clone()));
        }

        let archive_file = artifact
            .path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| ARCHIVE_NAME.to_string());
        let staged = plan_staging(&self.bucket, name, &archive_file);

        info!(sources = %staged.sources_uri, "storing python sources");
        self.store
            .put_file(&staged.archive_uri, &artifact.path, &artifact.sha256)?;
        info!(
            archive = %staged.archive_uri,
            sha256 = %artifact.sha256,
            bytes = artifact.size,
            "uploaded archive"
        );

        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemoryObjectStore;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn name() -> JobFlowName {
        JobFlowName::new("alice", "main.py", Utc.timestamp_opt(1_450_000_000, 0).unwrap())
    }

    fn artifact(dir: &Path) -> ArchiveArtifact {
        let path = dir.join(ARCHIVE_NAME);
        std::fs::write(&path, b"zip bytes").unwrap();
        ArchiveArtifact {
            path,
            entries: vec!["main.py".to_string()],
            size: 9,
            sha256: "ab".repeat(32),
        }
    }

    #[test]
    fn test_plan_staging_layout() {
        let staged = plan_staging("work", &name(), ARCHIVE_NAME);

        assert_eq!(staged.sources_uri.to_string(), "s3://work/sources/alice.main.py.1450000000");
        assert_eq!(
            staged.archive_uri.to_string(),
            "s3://work/sources/alice.main.py.1450000000/spark_zip.zip"
        );
        assert_eq!(staged.job_flow_name, "alice.main.py.1450000000");
    }

    #[test]
    fn test_stage_uploads_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let stager = RemoteStager::new(store.clone(), "work");

        let staged = stager.stage(&artifact(dir.path()), &name()).unwrap();

        let object = store.get(&staged.archive_uri).unwrap();
        assert_eq!(object.body, b"zip bytes");
        assert_eq!(object.sha256, "ab".repeat(32));
    }

    #[test]
    fn test_stage_surfaces_store_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        store.fail_uploads("access denied");
        let stager = RemoteStager::new(store.clone(), "work");

        let result = stager.stage(&artifact(dir.path()), &name());
        assert!(matches!(result, Err(StageError::Rejected(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_stage_rejects_bad_bucket() {
        let stager = RemoteStager::new(Arc::new(MemoryObjectStore::new()), "a/b");
        let artifact = ArchiveArtifact {
            path: PathBuf::from("/nonexistent/spark_zip.zip"),
            entries: vec![],
            size: 0,
            sha256: String::new(),
        };
        assert!(matches!(
            stager.stage(&artifact, &name()),
            Err(StageError::InvalidBucket(_))
        ));
    }
}
