//! Retrieval Service
//!
//! Turns a (file id, token) pair into a streamed download, or a precise
//! reason why the file cannot be served. A partial chunk set is never served.

use std::sync::Arc;

use futures::future::join_all;

use crate::clock::SharedClock;
use crate::error::{GoneReason, Result, ShareError};
use crate::storage::{BlobStore, ByteStream, Stores};

use super::assembly;
use super::cleanup::Cleanup;
use super::records::{MetadataStore, TokenStore};
use super::types::{FileSession, SessionStatus};

/// A download ready to be written to the client
pub struct Download {
    pub session: FileSession,
    /// Seconds until the absolute deadline
    pub remaining_ttl: i64,
    pub body: ByteStream,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("file_id", &self.session.id)
            .field("size", &self.session.size)
            .field("remaining_ttl", &self.remaining_ttl)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct RetrievalService {
    metadata: MetadataStore,
    tokens: TokenStore,
    blobs: Arc<dyn BlobStore>,
    cleanup: Cleanup,
    clock: SharedClock,
}

impl RetrievalService {
    pub fn new(stores: &Stores, clock: SharedClock) -> Self {
        let metadata = MetadataStore::new(stores.metadata.clone());
        let tokens = TokenStore::new(stores.tokens.clone());
        let cleanup = Cleanup::new(metadata.clone(), tokens.clone(), stores.blobs.clone());

        Self {
            metadata,
            tokens,
            blobs: stores.blobs.clone(),
            cleanup,
            clock,
        }
    }

    /// Validate access and open the assembled file
    pub async fn fetch(&self, file_id: &str, token: &str) -> Result<Download> {
        let owner = self.tokens.resolve(token).await?;
        if owner.as_deref() != Some(file_id) {
            tracing::warn!(file_id = %file_id, "Download token does not match file");
            return Err(ShareError::Forbidden(
                "Access denied: Invalid or expired token".to_string(),
            ));
        }

        let Some(session) = self.metadata.load(file_id).await? else {
            return Err(ShareError::gone(
                GoneReason::Deleted,
                "File not found or has expired",
            ));
        };

        let now = self.clock.now();
        if session.is_expired(now) {
            self.cleanup.purge(&session, GoneReason::Expired).await;
            return Err(ShareError::gone(GoneReason::Expired, "File has expired"));
        }

        if session.status != SessionStatus::Uploaded {
            return Err(ShareError::NotFinalized);
        }

        if session.chunk_keys.is_empty() {
            tracing::warn!(file_id = %file_id, "Finalized file has no chunks");
            return Err(Self::unavailable(GoneReason::ChunkMissing));
        }

        self.ensure_chunks_present(&session).await?;

        tracing::info!(
            file_id = %file_id,
            size = session.size,
            chunks = session.chunk_keys.len(),
            "Serving download"
        );

        let remaining_ttl = session.remaining_ttl(now);
        let body = assembly::assemble(self.blobs.clone(), self.cleanup.clone(), session.clone());

        Ok(Download {
            session,
            remaining_ttl,
            body,
        })
    }

    /// Probe every chunk before any byte is sent
    ///
    /// Losing every chunk is a cache miss; losing some is a missing chunk.
    async fn ensure_chunks_present(&self, session: &FileSession) -> Result<()> {
        let probes = join_all(
            session
                .chunk_keys
                .iter()
                .map(|key| self.blobs.contains(key)),
        )
        .await;

        let mut missing = Vec::new();
        for (index, probe) in probes.into_iter().enumerate() {
            if !probe? {
                missing.push(index);
            }
        }

        if missing.is_empty() {
            return Ok(());
        }

        let reason = if missing.len() == session.chunk_keys.len() {
            GoneReason::CacheMiss
        } else {
            GoneReason::ChunkMissing
        };
        tracing::warn!(
            file_id = %session.id,
            missing = ?missing,
            reason = reason.as_str(),
            "Chunks evicted from blob store"
        );
        self.cleanup.purge(session, reason).await;
        Err(Self::unavailable(reason))
    }

    fn unavailable(reason: GoneReason) -> ShareError {
        ShareError::gone(reason, "File is no longer available on edge storage")
    }
}
