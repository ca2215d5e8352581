//! Cascading cleanup
//!
//! Removes a session's chunk blobs, token and metadata. Every step is
//! best-effort: failures are logged and never reach the caller.

use std::sync::Arc;

use futures::future::join_all;

use crate::error::GoneReason;
use crate::storage::BlobStore;

use super::records::{MetadataStore, TokenStore};
use super::types::FileSession;

#[derive(Clone)]
pub struct Cleanup {
    metadata: MetadataStore,
    tokens: TokenStore,
    blobs: Arc<dyn BlobStore>,
}

impl Cleanup {
    pub fn new(metadata: MetadataStore, tokens: TokenStore, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            metadata,
            tokens,
            blobs,
        }
    }

    /// Delete everything a session owns. Safe to call repeatedly or concurrently.
    pub async fn purge(&self, session: &FileSession, reason: GoneReason) {
        let results = join_all(
            session
                .chunk_keys
                .iter()
                .map(|key| async move { (key, self.blobs.delete(key).await) }),
        )
        .await;

        let failed = results
            .into_iter()
            .filter_map(|(key, result)| result.err().map(|e| (key, e)))
            .inspect(|(key, e)| {
                tracing::warn!(file_id = %session.id, key = %key, error = %e, "Failed to delete chunk blob");
            })
            .count();

        let (token_result, metadata_result) = tokio::join!(
            self.tokens.revoke(&session.token),
            self.metadata.delete(&session.id),
        );
        if let Err(e) = token_result {
            tracing::warn!(file_id = %session.id, error = %e, "Failed to delete token record");
        }
        if let Err(e) = metadata_result {
            tracing::warn!(file_id = %session.id, error = %e, "Failed to delete session metadata");
        }

        tracing::info!(
            file_id = %session.id,
            reason = reason.as_str(),
            chunks = session.chunk_keys.len(),
            failed_chunk_deletes = failed,
            "Purged file session"
        );
    }
}
