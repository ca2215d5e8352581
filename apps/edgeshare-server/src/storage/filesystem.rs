//! Local filesystem blob storage
//!
//! Blobs live under a content-addressed path derived from the SHA-256 of
//! their key. Each file starts with an 8-byte big-endian expiry (unix
//! milliseconds) followed by the payload.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::clock::SharedClock;
use crate::error::StorageResult;
use crate::share::keys::compute_hash;

use super::traits::{BlobRead, BlobStore};

const HEADER_LEN: usize = 8;

/// Filesystem-backed blob store
pub struct FsBlobStore {
    base_path: PathBuf,
    clock: SharedClock,
}

impl FsBlobStore {
    pub fn new(base_path: PathBuf, clock: SharedClock) -> Self {
        Self { base_path, clock }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let hash = compute_hash(key.as_bytes());
        let (prefix, rest) = hash.split_at(2);
        self.base_path.join(prefix).join(format!("{}.blob", rest))
    }

    /// Open the file and consume its header, `None` if missing or expired
    async fn open_live(&self, key: &str) -> StorageResult<Option<tokio::fs::File>> {
        let path = self.blob_path(key);
        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let expires_at = match file.read_i64().await {
            Ok(millis) => millis,
            // Truncated write from a crash; treat like an eviction
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                let _ = tokio::fs::remove_file(&path).await;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if expires_at <= self.clock.now().timestamp_millis() {
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(file))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, data: Bytes, expires_at: DateTime<Utc>) -> StorageResult<()> {
        let path = self.blob_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never observe a partial blob
        let tmp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&expires_at.timestamp_millis().to_be_bytes());
        file.write_all(&header).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn open(&self, key: &str) -> StorageResult<BlobRead> {
        Ok(match self.open_live(key).await? {
            Some(file) => BlobRead::Present(Box::pin(ReaderStream::new(file))),
            None => BlobRead::Absent,
        })
    }

    async fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.open_live(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match tokio::fs::remove_file(self.blob_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
