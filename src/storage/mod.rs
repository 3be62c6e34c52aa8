// Storage layer (S3-compatible)

pub mod adapter;
pub mod memory;
pub mod s3_client;

pub use adapter::StorageAdapter;
pub use memory::MemoryAdapter;
pub use s3_client::*;

use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::types::{
    ChecksumAlgorithm, DeleteOutcome, Operation, StorageError, StorageProvider, StorageResult,
};

/// Bucket and object operations over an injected backend.
///
/// Every call is a single backend round trip with no retries. Cloning is
/// cheap and clones share the same backend handle.
#[derive(Clone)]
pub struct StorageClient {
    adapter: Arc<dyn StorageAdapter>,
}

impl StorageClient {
    pub fn new(adapter: impl StorageAdapter + 'static) -> Self {
        Self {
            adapter: Arc::new(adapter),
        }
    }

    pub fn from_adapter(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }

    /// Build the backend named by the configuration
    pub async fn connect(config: &StorageConfig) -> Self {
        match config.provider {
            StorageProvider::S3 => Self::new(S3Adapter::from_config(config).await),
            StorageProvider::Memory => Self::new(MemoryAdapter::new()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.adapter.name()
    }

    pub async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        let buckets = self
            .adapter
            .list_buckets()
            .await
            .map_err(|e| StorageError::backend(Operation::ListBuckets, "account", e))?;

        info!("Listed {} buckets", buckets.len());
        Ok(buckets)
    }

    pub async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.adapter
            .create_bucket(bucket)
            .await
            .map_err(|e| StorageError::backend(Operation::CreateBucket, bucket, e))?;

        info!("Created bucket {}", bucket);
        Ok(())
    }

    /// Fails while the bucket still holds objects
    pub async fn delete_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.adapter
            .delete_bucket(bucket)
            .await
            .map_err(|e| StorageError::backend(Operation::DeleteBucket, bucket, e))?;

        info!("Deleted bucket {}", bucket);
        Ok(())
    }

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        payload: impl Into<Bytes>,
        checksum: Option<ChecksumAlgorithm>,
    ) -> StorageResult<()> {
        let payload = payload.into();
        let size = payload.len();
        debug!(
            "Uploading {}/{} ({} bytes, checksum={:?})",
            bucket, key, size, checksum
        );

        self.adapter
            .put_object(bucket, key, payload, checksum)
            .await
            .map_err(|e| {
                StorageError::backend(Operation::PutObject, format!("{}/{}", bucket, key), e)
            })?;

        info!("Uploaded {}/{} ({} bytes)", bucket, key, size);
        Ok(())
    }

    /// Keys from the first response page only
    pub async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let page = self
            .adapter
            .list_objects(bucket)
            .await
            .map_err(|e| StorageError::backend(Operation::ListObjects, bucket, e))?;

        if page.is_truncated {
            warn!(
                "Listing of bucket {} is truncated after {} keys; remaining keys are not returned",
                bucket,
                page.keys.len()
            );
        }
        info!("Listed {} objects in bucket {}", page.keys.len(), bucket);
        Ok(page.keys)
    }

    /// Delete all `keys` with one quiet-mode batch request.
    ///
    /// The request is not chunked, so the caller must stay within the
    /// backend's per-request limit. Any key the backend reports as failed
    /// turns the call into `StorageError::PartialDelete`; keys it does not
    /// report are treated as deleted. Repeated keys are sent once.
    pub async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StorageResult<DeleteOutcome> {
        if keys.is_empty() {
            debug!("No keys to delete from bucket {}", bucket);
            return Ok(DeleteOutcome::default());
        }

        let mut seen = HashSet::new();
        let keys: Vec<String> = keys
            .iter()
            .filter(|key| seen.insert(key.as_str()))
            .cloned()
            .collect();

        let reported = self
            .adapter
            .delete_objects(bucket, &keys)
            .await
            .map_err(|e| StorageError::backend(Operation::DeleteObjects, bucket, e))?;

        let requested: HashSet<&str> = keys.iter().map(String::as_str).collect();
        let (failures, unexpected): (Vec<_>, Vec<_>) = reported
            .into_iter()
            .partition(|f| requested.contains(f.key.as_str()));
        for failure in &unexpected {
            warn!(
                "Ignoring delete failure for unrequested key {:?} in bucket {}: {}",
                failure.key, bucket, failure.message
            );
        }

        let outcome = DeleteOutcome::new(keys.clone(), failures);
        if outcome.is_complete() {
            info!("Deleted {} objects from bucket {}", keys.len(), bucket);
            return Ok(outcome);
        }

        for failure in &outcome.failures {
            warn!("Failed to delete {}/{}: {} ({})", bucket, failure.key, failure.message, failure.code);
        }
        Err(StorageError::PartialDelete {
            bucket: bucket.to_string(),
            outcome,
        })
    }
}
