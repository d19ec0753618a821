//! In-memory object store

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use crate::stage::{ObjectStore, S3Uri, StageError};

/// An object held by [`MemoryObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    /// Digest supplied by the uploader
    pub sha256: String,
}

#[derive(Debug, Default)]
struct StoreState {
    objects: HashMap<S3Uri, StoredObject>,
    uploads: Vec<S3Uri>,
    reject: Option<String>,
}

/// Object store keeping uploads in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<StoreState>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent upload with `message`.
    pub fn fail_uploads(&self, message: &str) {
        self.state.lock().unwrap().reject = Some(message.to_string());
    }

    pub fn get(&self, uri: &S3Uri) -> Option<StoredObject> {
        self.state.lock().unwrap().objects.get(uri).cloned()
    }

    /// Every accepted upload, in order.
    pub fn uploads(&self) -> Vec<S3Uri> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_file(&self, target: &S3Uri, local: &Path, sha256: &str) -> Result<(), StageError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.reject {
            return Err(StageError::Rejected(message.clone()));
        }

        let body = fs::read(local)?;
        state.objects.insert(
            target.clone(),
            StoredObject {
                body,
                sha256: sha256.to_string(),
            },
        );
        state.uploads.push(target.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_overwrites_same_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        let store = MemoryObjectStore::new();
        let uri = S3Uri::new("work", "sources/a.zip");

        fs::write(&path, b"one").unwrap();
        store.put_file(&uri, &path, "d1").unwrap();
        fs::write(&path, b"two").unwrap();
        store.put_file(&uri, &path, "d2").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.uploads().len(), 2);
        assert_eq!(store.get(&uri).unwrap().body, b"two");
    }

    #[test]
    fn test_missing_local_file() {
        let store = MemoryObjectStore::new();
        let result = store.put_file(&S3Uri::new("work", "k"), Path::new("/nonexistent/a.zip"), "");
        assert!(matches!(result, Err(StageError::Io(_))));
    }
}
