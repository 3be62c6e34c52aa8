//! In-process backend
//!
//! Keeps buckets and objects in memory and answers with the same error
//! codes S3 uses, so the facade and workflows can be exercised without a
//! network. Batch deletes report a missing key as a `NoSuchKey` failure.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::adapter::StorageAdapter;
use crate::types::{BackendError, ChecksumAlgorithm, DeleteFailure, ObjectPage};

/// S3 caps both listings and batch deletes at 1000 entries per request
pub const DEFAULT_MAX_KEYS: usize = 1000;
pub const MAX_DELETE_KEYS: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    payload: Bytes,
    checksum: Option<(ChecksumAlgorithm, String)>,
}

#[derive(Debug, Default)]
struct MemoryState {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
}

pub struct MemoryAdapter {
    state: RwLock<MemoryState>,
    max_keys: usize,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::with_max_keys(DEFAULT_MAX_KEYS)
    }

    /// Page size for `list_objects`
    pub fn with_max_keys(max_keys: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_keys: max_keys.max(1),
        }
    }

    pub async fn object_payload(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let state = self.state.read().await;
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| o.payload.clone())
    }

    /// Checksum recorded at upload time, base64 encoded as S3 reports it
    pub async fn object_checksum(&self, bucket: &str, key: &str) -> Option<(ChecksumAlgorithm, String)> {
        let state = self.state.read().await;
        state
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .and_then(|o| o.checksum.clone())
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn compute_checksum(algorithm: ChecksumAlgorithm, payload: &[u8]) -> String {
    match algorithm {
        ChecksumAlgorithm::Crc32 => BASE64.encode(crc32fast::hash(payload).to_be_bytes()),
        ChecksumAlgorithm::Sha256 => BASE64.encode(Sha256::digest(payload)),
    }
}

/// Bucket naming rules: 3-63 chars of lowercase letters, digits, dots and
/// hyphens, beginning and ending with a letter or digit.
pub fn validate_bucket_name(name: &str) -> Result<(), BackendError> {
    let invalid = |reason: &str| {
        Err(BackendError::new(
            "InvalidBucketName",
            format!("The specified bucket is not valid: {} ({})", name, reason),
        ))
    };

    if name.len() < 3 || name.len() > 63 {
        return invalid("must be between 3 and 63 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return invalid("only lowercase letters, numbers, dots and hyphens are allowed");
    }
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(alnum) || !name.ends_with(alnum) {
        return invalid("must begin and end with a letter or number");
    }
    if name.contains("..") {
        return invalid("must not contain adjacent dots");
    }
    Ok(())
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_buckets(&self) -> Result<Vec<String>, BackendError> {
        let state = self.state.read().await;
        Ok(state.buckets.keys().cloned().collect())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        validate_bucket_name(bucket)?;

        let mut state = self.state.write().await;
        if state.buckets.contains_key(bucket) {
            return Err(BackendError::new(
                "BucketAlreadyExists",
                format!("The requested bucket name is not available: {}", bucket),
            ));
        }
        state.buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        match state.buckets.get(bucket) {
            None => Err(BackendError::no_such_bucket(bucket)),
            Some(objects) if !objects.is_empty() => Err(BackendError::new(
                "BucketNotEmpty",
                "The bucket you tried to delete is not empty",
            )),
            Some(_) => {
                state.buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        payload: Bytes,
        checksum: Option<ChecksumAlgorithm>,
    ) -> Result<(), BackendError> {
        if key.is_empty() {
            return Err(BackendError::new("InvalidArgument", "Object key must not be empty"));
        }

        let mut state = self.state.write().await;
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| BackendError::no_such_bucket(bucket))?;

        let checksum = checksum.map(|algorithm| (algorithm, compute_checksum(algorithm, &payload)));
        objects.insert(key.to_string(), StoredObject { payload, checksum });
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<ObjectPage, BackendError> {
        let state = self.state.read().await;
        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| BackendError::no_such_bucket(bucket))?;

        Ok(ObjectPage {
            keys: objects.keys().take(self.max_keys).cloned().collect(),
            is_truncated: objects.len() > self.max_keys,
        })
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<DeleteFailure>, BackendError> {
        if keys.is_empty() || keys.len() > MAX_DELETE_KEYS {
            return Err(BackendError::new(
                "MalformedXML",
                format!(
                    "A batch delete must name between 1 and {} keys, got {}",
                    MAX_DELETE_KEYS,
                    keys.len()
                ),
            ));
        }

        let mut state = self.state.write().await;
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| BackendError::no_such_bucket(bucket))?;

        let mut failures = Vec::new();
        for key in keys {
            if objects.remove(key).is_none() {
                failures.push(DeleteFailure {
                    key: key.clone(),
                    code: "NoSuchKey".to_string(),
                    message: "The specified key does not exist.".to_string(),
                });
            }
        }
        Ok(failures)
    }
}
