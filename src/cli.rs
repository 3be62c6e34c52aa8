//! Command-line interface
//!
//! Each subcommand issues a short sequence of calls against one
//! `StorageClient`; `demo` runs the whole bucket lifecycle.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::storage::StorageClient;
use crate::types::{ChecksumAlgorithm, StorageError, StorageProvider};
use crate::workflow;

#[derive(Debug, Parser)]
#[command(name = "bucketctl", version, about = "Manage buckets and objects in S3-compatible storage")]
pub struct Cli {
    /// Storage backend (overrides STORAGE_PROVIDER)
    #[arg(long, global = true)]
    pub provider: Option<StorageProvider>,

    /// Region (overrides S3_REGION)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Custom endpoint URL, implies path-style addressing (overrides S3_ENDPOINT)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all buckets
    Buckets,
    /// Create a bucket
    CreateBucket { name: String },
    /// Delete an empty bucket
    DeleteBucket { name: String },
    /// Upload an object
    Put(PutArgs),
    /// List the keys in a bucket (first page only)
    Ls { bucket: String },
    /// Delete objects with one batch request
    Rm {
        bucket: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Run the full lifecycle: create, fill, empty and drop a bucket
    Demo {
        /// Bucket to create (overrides DEMO_BUCKET)
        #[arg(long)]
        bucket: Option<String>,
        /// Objects to upload (overrides DEMO_OBJECT_COUNT)
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Debug, Args)]
pub struct PutArgs {
    pub bucket: String,
    pub key: String,
    /// Read the payload from a file
    #[arg(long, conflicts_with = "content", required_unless_present = "content")]
    pub file: Option<PathBuf>,
    /// Use this text as the payload
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long)]
    pub checksum: Option<ChecksumAlgorithm>,
}

impl Cli {
    /// Fold command-line overrides into the env-derived configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(provider) = self.provider {
            config.storage.provider = provider;
        }
        if let Some(region) = &self.region {
            config.storage.region = region.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.storage.endpoint = Some(endpoint.clone());
            config.storage.force_path_style = true;
        }
    }
}

pub async fn run(cli: Cli, config: &Config) -> Result<()> {
    let client = StorageClient::connect(&config.storage).await;

    match cli.command {
        Command::Buckets => {
            let buckets = client.list_buckets().await?;
            print_buckets(&buckets);
        }
        Command::CreateBucket { name } => {
            client.create_bucket(&name).await?;
            println!("created bucket {}", name);
        }
        Command::DeleteBucket { name } => {
            client.delete_bucket(&name).await?;
            println!("deleted bucket {}", name);
        }
        Command::Put(args) => {
            let payload = match (&args.file, args.content) {
                (Some(path), _) => Bytes::from(
                    tokio::fs::read(path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                (None, Some(content)) => Bytes::from(content),
                (None, None) => anyhow::bail!("either --file or --content is required"),
            };
            client
                .put_object(&args.bucket, &args.key, payload, args.checksum)
                .await?;
            println!("uploaded {}/{}", args.bucket, args.key);
        }
        Command::Ls { bucket } => {
            let keys = client.list_objects(&bucket).await?;
            if keys.is_empty() {
                println!("no objects found");
            }
            for key in keys {
                println!("{}", key);
            }
        }
        Command::Rm { bucket, keys } => match client.delete_objects(&bucket, &keys).await {
            Ok(outcome) => println!("deleted {} objects", outcome.requested.len()),
            Err(StorageError::PartialDelete { bucket, outcome }) => {
                for failure in &outcome.failures {
                    println!("Failed to delete {}: {}", failure.key, failure.message);
                }
                return Err(StorageError::PartialDelete { bucket, outcome }.into());
            }
            Err(e) => return Err(e.into()),
        },
        Command::Demo { bucket, count } => {
            let bucket = bucket.unwrap_or_else(|| config.demo.bucket.clone());
            let count = count.unwrap_or(config.demo.object_count);
            let report = workflow::run_lifecycle(&client, &bucket, count).await?;

            print_buckets(&report.buckets_before);
            print_buckets(&report.buckets_after_create);
            for key in &report.listed {
                println!("object: [{}]", key);
            }
            print_buckets(&report.buckets_after);
        }
    }

    Ok(())
}

fn print_buckets(buckets: &[String]) {
    if buckets.is_empty() {
        println!("no buckets found");
        return;
    }
    println!("Buckets:");
    for bucket in buckets {
        println!("{}", bucket);
    }
}
