//! S3 blob storage
//!
//! Object stores have no native per-key TTL, so each chunk carries its
//! deadline as user metadata and readers treat past-deadline objects as
//! evicted. A bucket lifecycle rule on the prefix reclaims whatever is
//! never read again.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::clock::SharedClock;
use crate::error::StorageResult;

use super::s3_client::S3Client;
use super::traits::{BlobRead, BlobStore};

/// S3-based blob storage
pub struct S3BlobStore {
    client: S3Client,
    prefix: String,
    clock: SharedClock,
}

impl S3BlobStore {
    pub fn new(client: S3Client, prefix: impl Into<String>, clock: SharedClock) -> Self {
        Self {
            client,
            prefix: prefix.into().trim_end_matches('/').to_string(),
            clock,
        }
    }

    fn object_key(&self, key: &str) -> String {
        object_key(&self.prefix, key)
    }
}

fn object_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, data: Bytes, expires_at: DateTime<Utc>) -> StorageResult<()> {
        self.client
            .put_object(
                &self.object_key(key),
                data,
                "application/octet-stream",
                expires_at.timestamp_millis(),
            )
            .await
    }

    async fn open(&self, key: &str) -> StorageResult<BlobRead> {
        let object_key = self.object_key(key);
        let Some(object) = self.client.get_object_stream(&object_key).await? else {
            return Ok(BlobRead::Absent);
        };

        if object.metadata.is_expired(self.clock.now()) {
            if let Err(e) = self.client.delete_object(&object_key).await {
                tracing::debug!(key = %object_key, error = %e, "Failed to drop expired blob");
            }
            return Ok(BlobRead::Absent);
        }

        Ok(BlobRead::Present(object.body))
    }

    async fn contains(&self, key: &str) -> StorageResult<bool> {
        let now = self.clock.now();
        Ok(self
            .client
            .head_object(&self.object_key(key))
            .await?
            .is_some_and(|meta| !meta.is_expired(now)))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client.delete_object(&self.object_key(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_prefixing() {
        assert_eq!(object_key("edgeshare", "chunks/a/b/00000001"), "edgeshare/chunks/a/b/00000001");
        assert_eq!(object_key("", "chunks/a"), "chunks/a");
    }
}
