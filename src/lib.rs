// bucketctl - bucket lifecycle and batch object management for S3-compatible storage

pub mod cli;
pub mod config;
pub mod storage;
pub mod types;
pub mod utils;
pub mod workflow;

// Re-exports for convenience
pub use config::Config;
pub use storage::StorageClient;
pub use types::{DeleteOutcome, StorageError, StorageResult};
