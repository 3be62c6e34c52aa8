//! Bucket lifecycle workflow
//!
//! The full sequence the `demo` command runs: list, create, fill, list,
//! batch delete, drop the bucket, list again. Each step goes through
//! `StorageClient`, and the first failure stops the run.

use tracing::info;
use uuid::Uuid;

use crate::storage::StorageClient;
use crate::types::{ChecksumAlgorithm, StorageResult};

/// What the lifecycle saw along the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    pub bucket: String,
    pub buckets_before: Vec<String>,
    pub buckets_after_create: Vec<String>,
    pub uploaded: Vec<String>,
    pub listed: Vec<String>,
    pub remaining_after_delete: Vec<String>,
    pub buckets_after: Vec<String>,
}

pub fn generated_key(index: usize) -> String {
    format!("file_{}.txt", index)
}

/// Upload `count` objects whose content is a random UUID, checksummed with SHA-256
pub async fn upload_generated_objects(
    client: &StorageClient,
    bucket: &str,
    count: usize,
) -> StorageResult<Vec<String>> {
    let mut uploaded = Vec::with_capacity(count);
    for index in 0..count {
        let key = generated_key(index);
        let content = Uuid::new_v4().to_string();
        client
            .put_object(bucket, &key, content.into_bytes(), Some(ChecksumAlgorithm::Sha256))
            .await?;
        uploaded.push(key);
    }
    Ok(uploaded)
}

pub async fn run_lifecycle(
    client: &StorageClient,
    bucket: &str,
    object_count: usize,
) -> StorageResult<LifecycleReport> {
    info!(
        "Starting lifecycle for bucket {} with {} objects on {}",
        bucket,
        object_count,
        client.backend_name()
    );

    let mut report = LifecycleReport {
        bucket: bucket.to_string(),
        buckets_before: client.list_buckets().await?,
        ..LifecycleReport::default()
    };

    client.create_bucket(bucket).await?;
    report.buckets_after_create = client.list_buckets().await?;

    report.uploaded = upload_generated_objects(client, bucket, object_count).await?;
    report.listed = client.list_objects(bucket).await?;

    client.delete_objects(bucket, &report.listed).await?;
    report.remaining_after_delete = client.list_objects(bucket).await?;

    client.delete_bucket(bucket).await?;
    report.buckets_after = client.list_buckets().await?;

    info!("Lifecycle for bucket {} finished", bucket);
    Ok(report)
}
