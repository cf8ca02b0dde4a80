//! # In-Memory File Store
//!
//! Reference implementation of [`FileStore`]: a path-keyed byte map with
//! chunked progress callbacks and deterministic URLs.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{ProviderError, ProviderResult};
use crate::path::TreePath;

use super::{FileStore, ProgressFn, StoredFile, UploadProgress};

/// Progress granularity for uploads
const CHUNK_SIZE: usize = 64 * 1024;

/// In-memory file storage
#[derive(Debug)]
pub struct MemoryFiles {
    bucket: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFiles {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Test hook: stored bytes for `path/filename`
    pub fn object(&self, path: &TreePath, filename: &str) -> Option<Vec<u8>> {
        let key = object_key(path, filename);
        self.objects.read().ok()?.get(&key).cloned()
    }

    fn url_for(&self, key: &str) -> String {
        format!("memory://{}/{}", self.bucket, key)
    }
}

fn object_key(path: &TreePath, filename: &str) -> String {
    if path.is_root() {
        filename.to_string()
    } else {
        format!("{}/{}", path.to_native(), filename)
    }
}

#[async_trait]
impl FileStore for MemoryFiles {
    async fn put(
        &self,
        path: &TreePath,
        filename: &str,
        data: Vec<u8>,
        progress: Option<ProgressFn>,
    ) -> ProviderResult<StoredFile> {
        let total = data.len() as u64;
        if let Some(progress) = &progress {
            let mut transferred = 0usize;
            loop {
                transferred = (transferred + CHUNK_SIZE).min(data.len());
                progress(UploadProgress {
                    bytes_transferred: transferred as u64,
                    total_bytes: total,
                });
                if transferred == data.len() {
                    break;
                }
            }
        }

        let key = object_key(path, filename);
        debug!(key = %key, bytes = total, "stored object");
        self.objects
            .write()
            .map_err(|_| ProviderError::Storage("object lock poisoned".to_string()))?
            .insert(key.clone(), data);

        Ok(StoredFile {
            url: self.url_for(&key),
            filename: filename.to_string(),
        })
    }

    async fn delete(&self, path: &TreePath, filename: &str) -> ProviderResult<()> {
        let key = object_key(path, filename);
        let removed = self
            .objects
            .write()
            .map_err(|_| ProviderError::Storage("object lock poisoned".to_string()))?
            .remove(&key);
        match removed {
            Some(_) => Ok(()),
            None => Err(ProviderError::Storage(format!("no object at \"{key}\""))),
        }
    }

    async fn download_url(&self, path: &TreePath, filename: &str) -> ProviderResult<String> {
        let key = object_key(path, filename);
        let exists = self
            .objects
            .read()
            .map_err(|_| ProviderError::Storage("object lock poisoned".to_string()))?
            .contains_key(&key);
        if exists {
            Ok(self.url_for(&key))
        } else {
            Err(ProviderError::Storage(format!("no object at \"{key}\"")))
        }
    }
}
