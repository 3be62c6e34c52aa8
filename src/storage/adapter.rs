use async_trait::async_trait;
use bytes::Bytes;

use crate::types::{BackendError, ChecksumAlgorithm, DeleteFailure, ObjectPage};

/// One round trip against an object-storage backend.
///
/// Adapters report failures verbatim and never retry; context (which
/// operation, which bucket or key) is added by `StorageClient`.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_buckets(&self) -> Result<Vec<String>, BackendError>;

    async fn create_bucket(&self, bucket: &str) -> Result<(), BackendError>;

    async fn delete_bucket(&self, bucket: &str) -> Result<(), BackendError>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        payload: Bytes,
        checksum: Option<ChecksumAlgorithm>,
    ) -> Result<(), BackendError>;

    /// First page only
    async fn list_objects(&self, bucket: &str) -> Result<ObjectPage, BackendError>;

    /// Quiet-mode batch delete; returns only the keys that failed
    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<DeleteFailure>, BackendError>;
}
