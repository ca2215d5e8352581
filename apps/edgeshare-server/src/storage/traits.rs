//! Storage trait definitions.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;

use crate::error::StorageResult;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Key-value namespace with absolute per-record expiration.
///
/// Records at or past their deadline are never returned.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn put(&self, key: &str, value: String, expires_at: DateTime<Utc>) -> StorageResult<()>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Outcome of opening a blob.
///
/// Absence is an ordinary result: the blob tier may evict any entry
/// before its deadline.
pub enum BlobRead {
    Present(ByteStream),
    Absent,
}

impl std::fmt::Debug for BlobRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Present(_) => f.write_str("Present(<stream>)"),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

/// Best-effort blob cache for chunk bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, expires_at: DateTime<Utc>) -> StorageResult<()>;

    /// Open a lazy reader over the blob.
    async fn open(&self, key: &str) -> StorageResult<BlobRead>;

    /// Cheap presence probe; does not read the body.
    async fn contains(&self, key: &str) -> StorageResult<bool>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
