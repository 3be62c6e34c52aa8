use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::types::StorageProvider;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_DEMO_BUCKET: &str = "hello-world-789";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub demo: DemoConfig,
}

#[derive(Clone, Deserialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub region: String,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

// Hand-written so the secret key never reaches the logs
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("provider", &self.provider)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl StorageConfig {
    /// Static credentials, only when both halves are present
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::S3,
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    pub bucket: String,
    pub object_count: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the process env in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup("S3_ENDPOINT").filter(|s| !s.trim().is_empty());
        // Custom endpoints (MinIO and friends) rarely support virtual-hosted buckets
        let force_path_style = match lookup("S3_FORCE_PATH_STYLE") {
            Some(raw) => parse_var("S3_FORCE_PATH_STYLE", &raw)?,
            None => endpoint.is_some(),
        };

        Ok(Self {
            storage: StorageConfig {
                provider: parse_var(
                    "STORAGE_PROVIDER",
                    &lookup("STORAGE_PROVIDER").unwrap_or_else(|| "s3".to_string()),
                )?,
                region: lookup("S3_REGION")
                    .or_else(|| lookup("AWS_REGION"))
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
                endpoint,
                force_path_style,
                access_key_id: lookup("AWS_ACCESS_KEY_ID"),
                secret_access_key: lookup("AWS_SECRET_ACCESS_KEY"),
            },
            logging: LoggingConfig {
                filter: lookup("LOG_FILTER")
                    .or_else(|| lookup("RUST_LOG"))
                    .unwrap_or_else(|| "bucketctl=info".to_string()),
                log_dir: lookup("LOG_DIR").map(PathBuf::from),
            },
            demo: DemoConfig {
                bucket: lookup("DEMO_BUCKET").unwrap_or_else(|| DEFAULT_DEMO_BUCKET.to_string()),
                object_count: parse_var(
                    "DEMO_OBJECT_COUNT",
                    &lookup("DEMO_OBJECT_COUNT").unwrap_or_else(|| "5".to_string()),
                )?,
            },
        })
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("invalid value for {}: {:?}", name, raw))
}
