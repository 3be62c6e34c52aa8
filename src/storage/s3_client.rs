//! S3 backend
//!
//! Wraps an `aws_sdk_s3::Client`. Each adapter call maps to exactly one
//! S3 request; SDK errors are flattened into `BackendError` keeping the
//! service error code and message.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::debug;

use super::adapter::StorageAdapter;
use crate::config::{StorageConfig, DEFAULT_REGION};
use crate::types::{BackendError, ChecksumAlgorithm, DeleteFailure, ObjectPage};

pub struct S3Adapter {
    client: S3Client,
    region: String,
}

impl S3Adapter {
    pub fn new(client: S3Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Resolve credentials and region, then build the client
    pub async fn from_config(config: &StorageConfig) -> Self {
        let client = build_s3_client(config).await;
        Self::new(client, config.region.clone())
    }
}

/// Build an authenticated S3 client from the storage configuration.
///
/// Static credentials win when both halves are configured; otherwise the
/// SDK default chain (env, profile, IMDS) resolves them.
pub async fn build_s3_client(config: &StorageConfig) -> S3Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()));

    if let Some((access_key_id, secret_access_key)) = config.static_credentials() {
        loader = loader.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "bucketctl-static",
        ));
    }

    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.force_path_style)
        .build();

    debug!(
        "Built S3 client: region={}, endpoint={:?}, path_style={}",
        config.region, config.endpoint, config.force_path_style
    );
    S3Client::from_conf(s3_config)
}

fn backend_error<E, R>(err: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    if let Some(service_err) = err.as_service_error() {
        let code = service_err.code().unwrap_or("Unknown").to_string();
        let message = service_err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| service_err.to_string());
        return BackendError::new(code, message);
    }

    let code = match &err {
        SdkError::TimeoutError(_) => "Timeout",
        SdkError::DispatchFailure(_) => "DispatchFailure",
        SdkError::ResponseError(_) => "ResponseError",
        SdkError::ConstructionFailure(_) => "ConstructionFailure",
        _ => "Unknown",
    };
    BackendError::new(code, DisplayErrorContext(err).to_string())
}

fn sdk_checksum(algorithm: ChecksumAlgorithm) -> aws_sdk_s3::types::ChecksumAlgorithm {
    match algorithm {
        ChecksumAlgorithm::Crc32 => aws_sdk_s3::types::ChecksumAlgorithm::Crc32,
        ChecksumAlgorithm::Sha256 => aws_sdk_s3::types::ChecksumAlgorithm::Sha256,
    }
}

#[async_trait]
impl StorageAdapter for S3Adapter {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn list_buckets(&self) -> Result<Vec<String>, BackendError> {
        let response = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(backend_error)?;

        Ok(response
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        let mut request = self.client.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if self.region != DEFAULT_REGION {
            let configuration = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build();
            request = request.create_bucket_configuration(configuration);
        }

        request.send().await.map_err(backend_error)?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        payload: Bytes,
        checksum: Option<ChecksumAlgorithm>,
    ) -> Result<(), BackendError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(payload))
            .set_checksum_algorithm(checksum.map(sdk_checksum))
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> Result<ObjectPage, BackendError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .send()
            .await
            .map_err(backend_error)?;

        Ok(ObjectPage {
            keys: response
                .contents()
                .iter()
                .filter_map(|o| o.key().map(str::to_string))
                .collect(),
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<DeleteFailure>, BackendError> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::new("InvalidRequest", e.to_string()))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| BackendError::new("InvalidRequest", e.to_string()))?;

        let response = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(backend_error)?;

        response
            .errors()
            .iter()
            .map(|e| -> Result<DeleteFailure, BackendError> {
                // An entry without a key cannot be matched to the request
                let key = e.key().filter(|k| !k.is_empty()).ok_or_else(|| {
                    BackendError::new(
                        "MalformedResponse",
                        format!(
                            "DeleteObjects returned an error without a key: {} ({})",
                            e.message().unwrap_or("no message returned"),
                            e.code().unwrap_or("Unknown")
                        ),
                    )
                })?;
                Ok(DeleteFailure {
                    key: key.to_string(),
                    code: e.code().unwrap_or("Unknown").to_string(),
                    message: e.message().unwrap_or("no message returned").to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn test_config(endpoint: &str) -> StorageConfig {
        StorageConfig {
            endpoint: Some(endpoint.to_string()),
            force_path_style: true,
            access_key_id: Some("test-access-key".to_string()),
            secret_access_key: Some("test-secret-key".to_string()),
            ..StorageConfig::default()
        }
    }

    async fn adapter_for(server: &ServerGuard) -> S3Adapter {
        S3Adapter::from_config(&test_config(&server.url())).await
    }

    #[tokio::test]
    async fn test_list_buckets_parses_names() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Owner><ID>owner</ID><DisplayName>owner</DisplayName></Owner>
  <Buckets>
    <Bucket><Name>alpha</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate></Bucket>
    <Bucket><Name>beta</Name><CreationDate>2024-01-02T00:00:00.000Z</CreationDate></Bucket>
  </Buckets>
</ListAllMyBucketsResult>"#,
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server).await;
        let buckets = adapter.list_buckets().await.unwrap();

        assert_eq!(buckets, vec!["alpha".to_string(), "beta".to_string()]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_bucket_surfaces_service_error() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", Matcher::Any)
            .with_status(409)
            .with_header("content-type", "application/xml")
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>BucketNotEmpty</Code>
  <Message>The bucket you tried to delete is not empty</Message>
  <BucketName>b1</BucketName>
  <RequestId>req-1</RequestId>
</Error>"#,
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server).await;
        let err = adapter.delete_bucket("b1").await.unwrap_err();

        assert_eq!(err.code, "BucketNotEmpty");
        assert_eq!(err.message, "The bucket you tried to delete is not empty");
    }

    #[tokio::test]
    async fn test_list_objects_reports_truncation() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>b1</Name>
  <Prefix></Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <Contents><Key>file_0.txt</Key><Size>36</Size></Contents>
  <Contents><Key>file_1.txt</Key><Size>36</Size></Contents>
</ListBucketResult>"#,
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server).await;
        let page = adapter.list_objects("b1").await.unwrap();

        assert_eq!(page.keys, vec!["file_0.txt".to_string(), "file_1.txt".to_string()]);
        assert!(page.is_truncated);
    }

    #[tokio::test]
    async fn test_delete_objects_returns_per_key_errors() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .match_body(Matcher::Regex("<Quiet>true</Quiet>".to_string()))
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Error>
    <Key>file_1.txt</Key>
    <Code>AccessDenied</Code>
    <Message>Access Denied</Message>
  </Error>
</DeleteResult>"#,
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server).await;
        let keys = vec!["file_0.txt".to_string(), "file_1.txt".to_string()];
        let failures = adapter.delete_objects("b1", &keys).await.unwrap();

        assert_eq!(
            failures,
            vec![DeleteFailure {
                key: "file_1.txt".to_string(),
                code: "AccessDenied".to_string(),
                message: "Access Denied".to_string(),
            }]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_objects_error_without_key_is_rejected() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(
                r#"<?xml version="1.0" encoding="UTF-8"?>
<DeleteResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Error>
    <Code>InternalError</Code>
    <Message>We encountered an internal error</Message>
  </Error>
</DeleteResult>"#,
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server).await;
        let err = adapter
            .delete_objects("b1", &["file_0.txt".to_string()])
            .await
            .unwrap_err();

        assert_eq!(err.code, "MalformedResponse");
        assert!(err.message.contains("internal error"));
    }

    #[tokio::test]
    async fn test_put_object_sends_checksum_algorithm() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Regex("^/b1/file_0\\.txt".to_string()))
            .match_header("x-amz-sdk-checksum-algorithm", Matcher::Regex("(?i)^sha256$".to_string()))
            .with_status(200)
            .create_async()
            .await;

        let adapter = adapter_for(&server).await;
        adapter
            .put_object(
                "b1",
                "file_0.txt",
                Bytes::from_static(b"hello"),
                Some(ChecksumAlgorithm::Sha256),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_bucket_sends_location_constraint_outside_us_east_1() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Any)
            .match_body(Matcher::Regex(
                "<LocationConstraint>eu-west-1</LocationConstraint>".to_string(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let config = StorageConfig {
            region: "eu-west-1".to_string(),
            ..test_config(&server.url())
        };
        let adapter = S3Adapter::from_config(&config).await;
        adapter.create_bucket("eu-bucket").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_bucket_in_us_east_1_has_no_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", Matcher::Any)
            .match_body(Matcher::Exact(String::new()))
            .with_status(200)
            .create_async()
            .await;

        let adapter = adapter_for(&server).await;
        adapter.create_bucket("us-bucket").await.unwrap();

        mock.assert_async().await;
    }
}
