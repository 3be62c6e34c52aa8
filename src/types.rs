// Type definitions and error taxonomy

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Storage backends the client can be wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    Memory,
}

impl std::fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageProvider::S3 => write!(f, "s3"),
            StorageProvider::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StorageProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(StorageProvider::S3),
            "memory" | "mem" => Ok(StorageProvider::Memory),
            other => Err(format!("unknown storage provider: {}", other)),
        }
    }
}

/// Integrity check the backend applies to an uploaded payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Crc32,
    Sha256,
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumAlgorithm::Crc32 => write!(f, "crc32"),
            ChecksumAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

impl std::str::FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crc32" => Ok(ChecksumAlgorithm::Crc32),
            "sha256" => Ok(ChecksumAlgorithm::Sha256),
            other => Err(format!("unsupported checksum algorithm: {}", other)),
        }
    }
}

/// Backend operations, used to label errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListBuckets,
    CreateBucket,
    DeleteBucket,
    PutObject,
    ListObjects,
    DeleteObjects,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::ListBuckets => "ListBuckets",
            Operation::CreateBucket => "CreateBucket",
            Operation::DeleteBucket => "DeleteBucket",
            Operation::PutObject => "PutObject",
            Operation::ListObjects => "ListObjects",
            Operation::DeleteObjects => "DeleteObjects",
        };
        f.write_str(name)
    }
}

/// A single page of object keys as returned by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    /// Set when the backend holds more keys than one page returns
    pub is_truncated: bool,
}

/// A key the backend refused to delete during a batch delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFailure {
    pub key: String,
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for DeleteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.key, self.message, self.code)
    }
}

/// Result of one quiet-mode batch delete.
///
/// Quiet mode only reports failures, so every requested key that is not
/// listed in `failures` is taken as deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub requested: Vec<String>,
    pub failures: Vec<DeleteFailure>,
}

impl DeleteOutcome {
    pub fn new(requested: Vec<String>, failures: Vec<DeleteFailure>) -> Self {
        Self { requested, failures }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Requested keys not reported as failed
    pub fn deleted(&self) -> Vec<&str> {
        let failed: HashSet<&str> = self.failures.iter().map(|f| f.key.as_str()).collect();
        self.requested
            .iter()
            .map(String::as_str)
            .filter(|key| !failed.contains(key))
            .collect()
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.key.as_str()).collect()
    }
}

/// Failure reported by a backend for a single call, code and message verbatim
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn no_such_bucket(bucket: &str) -> Self {
        Self::new(
            "NoSuchBucket",
            format!("The specified bucket does not exist: {}", bucket),
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{operation} failed for {resource}: {source}")]
    Backend {
        operation: Operation,
        resource: String,
        #[source]
        source: BackendError,
    },

    #[error(
        "{} of {} objects could not be deleted from bucket {}",
        .outcome.failures.len(),
        .outcome.requested.len(),
        .bucket
    )]
    PartialDelete {
        bucket: String,
        outcome: DeleteOutcome,
    },
}

impl StorageError {
    pub fn backend(operation: Operation, resource: impl Into<String>, source: BackendError) -> Self {
        StorageError::Backend {
            operation,
            resource: resource.into(),
            source,
        }
    }

    /// Service error code when the failure came from a single backend call
    pub fn code(&self) -> Option<&str> {
        match self {
            StorageError::Backend { source, .. } => Some(source.code.as_str()),
            StorageError::PartialDelete { .. } => None,
        }
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(key: &str) -> DeleteFailure {
        DeleteFailure {
            key: key.to_string(),
            code: "NoSuchKey".to_string(),
            message: "The specified key does not exist.".to_string(),
        }
    }

    #[test]
    fn test_outcome_deleted_excludes_failures() {
        let outcome = DeleteOutcome::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![failure("b")],
        );

        assert!(!outcome.is_complete());
        assert_eq!(outcome.deleted(), vec!["a", "c"]);
        assert_eq!(outcome.failed_keys(), vec!["b"]);
    }

    #[test]
    fn test_partial_delete_message() {
        let err = StorageError::PartialDelete {
            bucket: "b1".to_string(),
            outcome: DeleteOutcome::new(
                vec!["a".to_string(), "b".to_string()],
                vec![failure("a")],
            ),
        };

        assert_eq!(err.to_string(), "1 of 2 objects could not be deleted from bucket b1");
        assert!(err.code().is_none());
    }

    #[test]
    fn test_backend_error_context() {
        let err = StorageError::backend(
            Operation::DeleteBucket,
            "b1",
            BackendError::new("BucketNotEmpty", "The bucket you tried to delete is not empty"),
        );

        assert_eq!(
            err.to_string(),
            "DeleteBucket failed for b1: BucketNotEmpty: The bucket you tried to delete is not empty"
        );
        assert_eq!(err.code(), Some("BucketNotEmpty"));
    }

    #[test]
    fn test_parse_provider_and_checksum() {
        assert_eq!("S3".parse::<StorageProvider>().unwrap(), StorageProvider::S3);
        assert_eq!("memory".parse::<StorageProvider>().unwrap(), StorageProvider::Memory);
        assert!("gcs".parse::<StorageProvider>().is_err());

        assert_eq!("sha256".parse::<ChecksumAlgorithm>().unwrap(), ChecksumAlgorithm::Sha256);
        assert_eq!("CRC32".parse::<ChecksumAlgorithm>().unwrap(), ChecksumAlgorithm::Crc32);
        assert!("md5".parse::<ChecksumAlgorithm>().is_err());
    }
}
