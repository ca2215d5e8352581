//! S3-compatible storage client
//!
//! Wraps the AWS SDK for S3-compatible storage access.

use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use crate::config::S3Config;
use crate::error::{StorageError, StorageResult};

use super::types::{parse_expires_at, ObjectMetadata, StorageObject, EXPIRES_AT_METADATA_KEY};

/// S3-compatible storage client
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
}

impl S3Client {
    /// Create a new S3 client from configuration
    pub async fn new(config: &S3Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "edgeshare",
        );

        let region = config
            .region
            .clone()
            .unwrap_or_else(|| "us-east-1".to_string());

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(region))
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO and other S3-compatible services
            .build();

        let client = Client::from_conf(s3_config);

        // Test connection by checking if bucket exists
        let bucket = config.bucket.clone();
        match client.head_bucket().bucket(&bucket).send().await {
            Ok(_) => {
                tracing::info!("Connected to S3 bucket: {}", bucket);
            }
            Err(e) => {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt operations anyway.",
                    bucket,
                    DisplayErrorContext(&e)
                );
            }
        }

        Ok(Self { client, bucket })
    }

    /// Upload an object, recording its deadline as user metadata
    pub async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        expires_at_millis: i64,
    ) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .metadata(EXPIRES_AT_METADATA_KEY, expires_at_millis.to_string())
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!(
                    "Failed to put object {}: {}",
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }

    /// Get object metadata (HEAD request), `None` if the key does not exist
    pub async fn head_object(&self, key: &str) -> StorageResult<Option<ObjectMetadata>> {
        let response = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => return Ok(None),
            Err(e) => {
                return Err(StorageError::Backend(format!(
                    "Failed to head object {}: {}",
                    key,
                    DisplayErrorContext(&e)
                )))
            }
        };

        Ok(Some(ObjectMetadata {
            expires_at: parse_expires_at(
                response
                    .metadata()
                    .and_then(|m| m.get(EXPIRES_AT_METADATA_KEY))
                    .map(String::as_str),
            ),
        }))
    }

    /// Get object as a byte stream, `None` if the key does not exist
    pub async fn get_object_stream(&self, key: &str) -> StorageResult<Option<StorageObject>> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None)
            }
            Err(e) => {
                return Err(StorageError::Backend(format!(
                    "Failed to get object stream {}: {}",
                    key,
                    DisplayErrorContext(&e)
                )))
            }
        };

        let metadata = ObjectMetadata {
            expires_at: parse_expires_at(
                response
                    .metadata()
                    .and_then(|m| m.get(EXPIRES_AT_METADATA_KEY))
                    .map(String::as_str),
            ),
        };

        // Convert AWS ByteStream to AsyncRead, then wrap with ReaderStream for true streaming
        let reader_stream = ReaderStream::new(response.body.into_async_read());

        Ok(Some(StorageObject {
            metadata,
            body: reader_stream.boxed(),
        }))
    }

    /// Delete an object; deleting a missing key succeeds
    pub async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!(
                    "Failed to delete object {}: {}",
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }
}
