//! Upload Session Manager
//!
//! Owns the upload state machine:
//! - `initialize` opens a pending session and mints its id and token
//! - `append` accepts chunk `chunkCount` and nothing else
//! - `complete` seals the session once every chunk is in
//!
//! Append and Complete run under the session's lock so the read-modify-write
//! on the metadata record cannot interleave.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::clock::SharedClock;
use crate::config::UploadConfig;
use crate::error::{GoneReason, Result, ShareError};
use crate::storage::{BlobStore, Stores};

use super::cleanup::Cleanup;
use super::keys;
use super::locks::SessionLocks;
use super::records::{MetadataStore, TokenStore};
use super::types::{
    AppendResponse, CompleteResponse, FileSession, InitializeRequest, InitializeResponse,
    SessionStatus,
};
use super::validate;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

// ============================================================================
// Session Manager
// ============================================================================

#[derive(Clone)]
pub struct UploadSessionManager {
    inner: Arc<UploadSessionManagerInner>,
}

struct UploadSessionManagerInner {
    metadata: MetadataStore,
    tokens: TokenStore,
    blobs: Arc<dyn BlobStore>,
    cleanup: Cleanup,
    locks: SessionLocks,
    clock: SharedClock,
    limits: UploadConfig,
}

impl UploadSessionManager {
    pub fn new(stores: &Stores, clock: SharedClock, limits: UploadConfig) -> Self {
        let metadata = MetadataStore::new(stores.metadata.clone());
        let tokens = TokenStore::new(stores.tokens.clone());
        let cleanup = Cleanup::new(metadata.clone(), tokens.clone(), stores.blobs.clone());

        Self {
            inner: Arc::new(UploadSessionManagerInner {
                metadata,
                tokens,
                blobs: stores.blobs.clone(),
                cleanup,
                locks: SessionLocks::new(),
                clock,
                limits,
            }),
        }
    }

    pub fn limits(&self) -> &UploadConfig {
        &self.inner.limits
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Open a new pending session
    pub async fn initialize(
        &self,
        request: &InitializeRequest,
        base_url: &str,
    ) -> Result<InitializeResponse> {
        let limits = &self.inner.limits;

        let name = validate::file_name(request.file_name.as_deref())?;
        let total_chunks = validate::total_chunks(request.total_chunks.as_ref())?;
        let expected_size = validate::expected_size(request.file_size.as_ref())?;
        let ttl = validate::ttl(request.ttl.as_ref(), limits)?;

        let mime_type = request
            .file_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .or_else(|| mime_guess::from_path(&name).first_raw().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        let now = self.inner.clock.now();
        let session = FileSession {
            id: keys::generate_file_id(),
            name,
            mime_type,
            token: keys::generate_token(),
            status: SessionStatus::Pending,
            expected_size,
            size: 0,
            total_chunks,
            chunk_count: 0,
            total_size: 0,
            chunk_keys: Vec::new(),
            chunk_digests: Vec::new(),
            created_at: now,
            expires_at: now + Duration::seconds(ttl),
            pending_expires_at: Some(now + Duration::seconds(limits.inactivity_window)),
            last_activity: now,
            completed_at: None,
        };

        self.inner.metadata.save(&session).await?;
        self.inner
            .tokens
            .bind(&session.token, &session.id, session.expires_at)
            .await?;

        tracing::info!(
            file_id = %session.id,
            file_name = %session.name,
            file_type = %session.mime_type,
            expected_size = ?session.expected_size,
            total_chunks = session.total_chunks,
            ttl = ttl,
            "Initialized upload session"
        );

        Ok(InitializeResponse {
            success: true,
            download_url: keys::share_link(base_url, &session.id, &session.token),
            expires_at: session.expires_at.timestamp(),
            ttl,
            status: session.status,
            file_id: session.id,
            token: session.token,
        })
    }

    /// Append chunk `chunk_index`, which must equal the current chunk count
    pub async fn append(
        &self,
        file_id: &str,
        token: &str,
        chunk_index: u32,
        total_chunks: u32,
        payload: Bytes,
    ) -> Result<AppendResponse> {
        let _guard = self.inner.locks.acquire(file_id).await;
        let now = self.inner.clock.now();
        let mut session = self.writable_session(file_id, token, now).await?;

        if total_chunks != session.total_chunks {
            return Err(ShareError::invalid(format!(
                "totalChunks mismatch: session expects {}, got {}",
                session.total_chunks, total_chunks
            )));
        }

        if chunk_index != session.chunk_count {
            tracing::debug!(
                file_id = %file_id,
                expected_index = session.chunk_count,
                received_index = chunk_index,
                "Rejected out-of-order chunk"
            );
            return Err(ShareError::OutOfOrder {
                expected_index: session.chunk_count,
                received_index: chunk_index,
            });
        }

        if chunk_index >= session.total_chunks {
            return Err(ShareError::invalid(format!(
                "chunkIndex {} is out of range for {} chunks",
                chunk_index, session.total_chunks
            )));
        }

        if payload.is_empty() {
            return Err(ShareError::invalid("Chunk payload is empty"));
        }

        if payload.len() > self.inner.limits.max_chunk_size {
            return Err(ShareError::invalid(format!(
                "Chunk exceeds maximum size of {} bytes",
                self.inner.limits.max_chunk_size
            )));
        }

        let projected = session.total_size + payload.len() as u64;
        if let Some(expected) = session.expected_size {
            if projected as f64 > expected {
                return Err(ShareError::SizeExceeded {
                    expected,
                    projected,
                });
            }
        }

        let key = keys::chunk_key(&session.id, &session.token, chunk_index);
        let digest = keys::compute_hash(&payload);
        let chunk_len = payload.len();
        self.inner
            .blobs
            .put(&key, payload, session.expires_at)
            .await?;

        session.chunk_keys.push(key);
        session.chunk_digests.push(digest);
        session.chunk_count += 1;
        session.total_size = projected;
        session.last_activity = now;
        session.pending_expires_at =
            Some(now + Duration::seconds(self.inner.limits.inactivity_window));

        self.inner.metadata.save(&session).await?;

        tracing::debug!(
            file_id = %file_id,
            chunk_index = chunk_index,
            chunk_bytes = chunk_len,
            total_size = session.total_size,
            "Stored chunk"
        );

        Ok(AppendResponse {
            success: true,
            chunk_index,
            chunk_count: session.chunk_count,
            remaining_chunks: session.remaining_chunks(),
        })
    }

    /// Seal the session once every chunk has been appended
    pub async fn complete(
        &self,
        file_id: &str,
        token: &str,
        reported_size: Option<&Value>,
        base_url: &str,
    ) -> Result<CompleteResponse> {
        let reported = validate::reported_size(reported_size)?;

        let _guard = self.inner.locks.acquire(file_id).await;
        let now = self.inner.clock.now();
        let mut session = self.writable_session(file_id, token, now).await?;

        if session.chunk_count != session.total_chunks {
            return Err(ShareError::IncompleteUpload {
                expected: session.total_chunks,
                received: session.chunk_count,
            });
        }

        if let Some(expected) = session.expected_size {
            if session.total_size as f64 != expected {
                return Err(ShareError::SizeMismatch {
                    expected,
                    actual: session.total_size,
                });
            }
        }

        if let Some(reported) = reported {
            if reported != session.total_size {
                return Err(ShareError::ReportedSizeMismatch {
                    reported,
                    actual: session.total_size,
                });
            }
        }

        session.status = SessionStatus::Uploaded;
        session.size = session.total_size;
        session.completed_at = Some(now);
        session.last_activity = now;
        session.pending_expires_at = None;

        self.inner.metadata.save(&session).await?;

        tracing::info!(
            file_id = %file_id,
            total_size = session.total_size,
            chunks = session.chunk_count,
            "Upload completed"
        );

        Ok(CompleteResponse {
            success: true,
            download_url: keys::share_link(base_url, &session.id, &session.token),
            file_id: session.id,
            total_size: session.total_size,
            status: session.status,
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Load a session the caller may mutate, purging it if a deadline passed
    async fn writable_session(
        &self,
        file_id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<FileSession> {
        let session = self
            .inner
            .metadata
            .load(file_id)
            .await?
            .ok_or_else(|| ShareError::NotFound("Upload session not found".to_string()))?;

        if session.token != token {
            tracing::warn!(file_id = %file_id, "Upload token mismatch");
            return Err(ShareError::Forbidden("Invalid token for this upload".to_string()));
        }

        if session.is_expired(now) {
            self.inner.cleanup.purge(&session, GoneReason::Expired).await;
            return Err(ShareError::gone(
                GoneReason::Expired,
                "Upload session has expired",
            ));
        }

        if session.status == SessionStatus::Pending && session.is_inactive(now) {
            self.inner
                .cleanup
                .purge(&session, GoneReason::Inactive)
                .await;
            return Err(ShareError::gone(
                GoneReason::Inactive,
                "Upload session timed out due to inactivity",
            ));
        }

        if session.status != SessionStatus::Pending {
            return Err(ShareError::AlreadyFinalized);
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::storage::{KvStore, MemoryBlobStore, MemoryKvStore};
    use serde_json::json;

    const BASE: &str = "http://share.test";

    struct Harness {
        manager: UploadSessionManager,
        clock: ManualClock,
        metadata: Arc<MemoryKvStore>,
        tokens: Arc<MemoryKvStore>,
        blobs: Arc<MemoryBlobStore>,
    }

    fn harness() -> Harness {
        let clock = ManualClock::starting_now();
        let shared: SharedClock = Arc::new(clock.clone());
        let metadata = Arc::new(MemoryKvStore::new(shared.clone()));
        let tokens = Arc::new(MemoryKvStore::new(shared.clone()));
        let blobs = Arc::new(MemoryBlobStore::new(1 << 20, shared.clone()));
        let stores = Stores {
            metadata: metadata.clone(),
            tokens: tokens.clone(),
            blobs: blobs.clone(),
        };

        Harness {
            manager: UploadSessionManager::new(&stores, shared, UploadConfig::default()),
            clock,
            metadata,
            tokens,
            blobs,
        }
    }

    fn request(total_chunks: u32, file_size: Option<u64>) -> InitializeRequest {
        InitializeRequest {
            file_name: Some("a.txt".to_string()),
            file_size: file_size.map(|s| json!(s)),
            file_type: None,
            ttl: Some(json!(300)),
            total_chunks: Some(json!(total_chunks)),
        }
    }

    async fn stored(h: &Harness, file_id: &str) -> Option<FileSession> {
        h.metadata
            .get(file_id)
            .await
            .unwrap()
            .map(|json| serde_json::from_str(&json).unwrap())
    }

    #[tokio::test]
    async fn test_initialize_creates_pending_session() {
        let h = harness();
        let resp = h.manager.initialize(&request(2, Some(11)), BASE).await.unwrap();

        assert_eq!(resp.status, SessionStatus::Pending);
        assert_eq!(resp.ttl, 300);
        assert_eq!(
            resp.download_url,
            format!("{}/s/{}/{}", BASE, resp.file_id, resp.token)
        );

        let session = stored(&h, &resp.file_id).await.unwrap();
        assert_eq!(session.mime_type, "text/plain");
        assert_eq!(session.chunk_count, 0);
        assert_eq!(session.expected_size, Some(11.0));
        assert_eq!(session.expires_at, h.clock.now() + Duration::seconds(300));
        assert_eq!(
            session.pending_expires_at,
            Some(h.clock.now() + Duration::seconds(900))
        );
        assert_eq!(
            h.tokens.get(&resp.token).await.unwrap().as_deref(),
            Some(resp.file_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_input() {
        let h = harness();

        let mut req = request(2, None);
        req.file_name = None;
        assert!(matches!(
            h.manager.initialize(&req, BASE).await,
            Err(ShareError::InvalidArgument(_))
        ));

        let mut req = request(2, None);
        req.total_chunks = Some(json!(0));
        assert!(h.manager.initialize(&req, BASE).await.is_err());

        let mut req = request(2, None);
        req.file_size = Some(json!(-5));
        assert!(h.manager.initialize(&req, BASE).await.is_err());

        let mut req = request(2, None);
        req.ttl = Some(json!(10));
        let err = h.manager.initialize(&req, BASE).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "TTL must be between 300 seconds and 604800 seconds"
        );
    }

    #[tokio::test]
    async fn test_explicit_file_type_wins() {
        let h = harness();
        let mut req = request(1, None);
        req.file_type = Some("application/x-custom".to_string());
        let resp = h.manager.initialize(&req, BASE).await.unwrap();
        let session = stored(&h, &resp.file_id).await.unwrap();
        assert_eq!(session.mime_type, "application/x-custom");
    }

    #[tokio::test]
    async fn test_append_and_complete_keep_invariants() {
        let h = harness();
        let init = h.manager.initialize(&request(2, Some(11)), BASE).await.unwrap();

        let first = h
            .manager
            .append(&init.file_id, &init.token, 0, 2, Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(first.chunk_count, 1);
        assert_eq!(first.remaining_chunks, 1);

        h.clock.advance(Duration::seconds(30));
        let second = h
            .manager
            .append(&init.file_id, &init.token, 1, 2, Bytes::from_static(b" world"))
            .await
            .unwrap();
        assert_eq!(second.remaining_chunks, 0);

        let session = stored(&h, &init.file_id).await.unwrap();
        assert_eq!(session.chunk_keys.len() as u32, session.chunk_count);
        assert_eq!(session.chunk_digests.len(), session.chunk_keys.len());
        assert_eq!(session.total_size, 11);
        assert_eq!(session.last_activity, h.clock.now());
        assert_eq!(
            session.pending_expires_at,
            Some(h.clock.now() + Duration::seconds(900))
        );

        let done = h
            .manager
            .complete(&init.file_id, &init.token, Some(&json!(11)), BASE)
            .await
            .unwrap();
        assert_eq!(done.total_size, 11);
        assert_eq!(done.status, SessionStatus::Uploaded);

        let session = stored(&h, &init.file_id).await.unwrap();
        assert_eq!(session.size, 11);
        assert_eq!(session.pending_expires_at, None);
        assert_eq!(session.completed_at, Some(h.clock.now()));
    }

    #[tokio::test]
    async fn test_out_of_order_append_is_rejected_without_mutation() {
        let h = harness();
        let init = h.manager.initialize(&request(2, None), BASE).await.unwrap();
        let before = stored(&h, &init.file_id).await.unwrap();

        let err = h
            .manager
            .append(&init.file_id, &init.token, 1, 2, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShareError::OutOfOrder {
                expected_index: 0,
                received_index: 1
            }
        ));
        assert_eq!(stored(&h, &init.file_id).await.unwrap(), before);
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_chunk_reports_next_index() {
        let h = harness();
        let init = h.manager.initialize(&request(3, None), BASE).await.unwrap();
        h.manager
            .append(&init.file_id, &init.token, 0, 3, Bytes::from_static(b"a"))
            .await
            .unwrap();

        let err = h
            .manager
            .append(&init.file_id, &init.token, 0, 3, Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::OutOfOrder { expected_index: 1, .. }));
    }

    #[tokio::test]
    async fn test_append_validation() {
        let h = harness();
        let init = h.manager.initialize(&request(2, None), BASE).await.unwrap();

        let err = h
            .manager
            .append("missing", &init.token, 0, 2, Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::NotFound(_)));

        let err = h
            .manager
            .append(&init.file_id, "wrong", 0, 2, Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::Forbidden(_)));

        let err = h
            .manager
            .append(&init.file_id, &init.token, 0, 3, Bytes::from_static(b"a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::InvalidArgument(_)));

        let err = h
            .manager
            .append(&init.file_id, &init.token, 0, 2, Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_oversized_chunk_is_rejected() {
        let clock = ManualClock::starting_now();
        let shared: SharedClock = Arc::new(clock.clone());
        let stores = Stores::in_memory(1 << 20, shared.clone());
        let limits = UploadConfig {
            max_chunk_size: 4,
            ..UploadConfig::default()
        };
        let manager = UploadSessionManager::new(&stores, shared, limits);
        let init = manager.initialize(&request(1, None), BASE).await.unwrap();

        let err = manager
            .append(&init.file_id, &init.token, 0, 1, Bytes::from_static(b"12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_append_past_declared_size_conflicts_without_mutation() {
        let h = harness();
        let init = h.manager.initialize(&request(2, Some(6)), BASE).await.unwrap();
        h.manager
            .append(&init.file_id, &init.token, 0, 2, Bytes::from_static(b"hello"))
            .await
            .unwrap();
        let before = stored(&h, &init.file_id).await.unwrap();

        let err = h
            .manager
            .append(&init.file_id, &init.token, 1, 2, Bytes::from_static(b" world"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShareError::SizeExceeded {
                expected,
                projected: 11
            } if expected == 6.0
        ));
        assert_eq!(stored(&h, &init.file_id).await.unwrap(), before);
        assert_eq!(h.blobs.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_conflicts() {
        let h = harness();
        let init = h.manager.initialize(&request(2, None), BASE).await.unwrap();
        h.manager
            .append(&init.file_id, &init.token, 0, 2, Bytes::from_static(b"ab"))
            .await
            .unwrap();

        let err = h
            .manager
            .complete(&init.file_id, &init.token, None, BASE)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShareError::IncompleteUpload {
                expected: 2,
                received: 1
            }
        ));

        h.manager
            .append(&init.file_id, &init.token, 1, 2, Bytes::from_static(b"cd"))
            .await
            .unwrap();

        let err = h
            .manager
            .complete(&init.file_id, &init.token, Some(&json!(5)), BASE)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShareError::ReportedSizeMismatch {
                reported: 5,
                actual: 4
            }
        ));

        h.manager
            .complete(&init.file_id, &init.token, None, BASE)
            .await
            .unwrap();
        let err = h
            .manager
            .complete(&init.file_id, &init.token, None, BASE)
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::AlreadyFinalized));

        let err = h
            .manager
            .append(&init.file_id, &init.token, 2, 2, Bytes::from_static(b"e"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::AlreadyFinalized));
    }

    #[tokio::test]
    async fn test_fractional_declared_size_never_completes() {
        let h = harness();
        let mut req = request(1, None);
        req.file_size = Some(json!(10.5));
        let init = h.manager.initialize(&req, BASE).await.unwrap();
        h.manager
            .append(&init.file_id, &init.token, 0, 1, Bytes::from_static(b"0123456789"))
            .await
            .unwrap();

        let err = h
            .manager
            .complete(&init.file_id, &init.token, None, BASE)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShareError::SizeMismatch {
                expected,
                actual: 10
            } if expected == 10.5
        ));
    }

    #[tokio::test]
    async fn test_complete_requires_declared_size() {
        let h = harness();
        let init = h.manager.initialize(&request(1, Some(10)), BASE).await.unwrap();
        h.manager
            .append(&init.file_id, &init.token, 0, 1, Bytes::from_static(b"short"))
            .await
            .unwrap();

        let err = h
            .manager
            .complete(&init.file_id, &init.token, None, BASE)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ShareError::SizeMismatch {
                expected,
                actual: 5
            } if expected == 10.0
        ));
    }

    #[tokio::test]
    async fn test_late_append_after_ttl_is_gone_and_purges() {
        let h = harness();
        let init = h.manager.initialize(&request(2, None), BASE).await.unwrap();
        h.manager
            .append(&init.file_id, &init.token, 0, 2, Bytes::from_static(b"ab"))
            .await
            .unwrap();

        h.clock.advance(Duration::seconds(300));

        let err = h
            .manager
            .append(&init.file_id, &init.token, 1, 2, Bytes::from_static(b"cd"))
            .await
            .unwrap_err();
        assert_eq!(err.gone_reason(), Some(GoneReason::Expired));
        assert!(h.metadata.get(&init.file_id).await.unwrap().is_none());
        assert!(h.tokens.get(&init.token).await.unwrap().is_none());
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_store_expiry_backstops_untouched_sessions() {
        let h = harness();
        let init = h.manager.initialize(&request(2, None), BASE).await.unwrap();

        h.clock.advance(Duration::seconds(
            300 + crate::share::records::STORE_EXPIRY_GRACE_SECS,
        ));

        let err = h
            .manager
            .append(&init.file_id, &init.token, 0, 2, Bytes::from_static(b"ab"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_inactive_session_is_purged() {
        let h = harness();
        let init = h.manager.initialize(&request(2, None), BASE).await.unwrap();
        h.manager
            .append(&init.file_id, &init.token, 0, 2, Bytes::from_static(b"ab"))
            .await
            .unwrap();

        // TTL is 300s, so shrink the window to land inside it
        let mut session = stored(&h, &init.file_id).await.unwrap();
        session.pending_expires_at = Some(h.clock.now() + Duration::seconds(30));
        h.metadata
            .put(
                &init.file_id,
                serde_json::to_string(&session).unwrap(),
                session.expires_at,
            )
            .await
            .unwrap();
        h.clock.advance(Duration::seconds(31));

        let err = h
            .manager
            .append(&init.file_id, &init.token, 1, 2, Bytes::from_static(b"cd"))
            .await
            .unwrap_err();
        assert_eq!(err.gone_reason(), Some(GoneReason::Inactive));
        assert!(h.metadata.get(&init.file_id).await.unwrap().is_none());
        assert!(h.tokens.get(&init.token).await.unwrap().is_none());
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_absolute_expiry_reports_gone_and_purges() {
        let h = harness();
        let mut req = request(1, None);
        req.ttl = Some(json!(300));
        let init = h.manager.initialize(&req, BASE).await.unwrap();

        // Pin the record past the TTL so the lazy check, not store expiry, decides
        let mut session = stored(&h, &init.file_id).await.unwrap();
        session.expires_at = h.clock.now() + Duration::seconds(10);
        h.metadata
            .put(
                &init.file_id,
                serde_json::to_string(&session).unwrap(),
                h.clock.now() + Duration::hours(1),
            )
            .await
            .unwrap();
        h.clock.advance(Duration::seconds(10));

        let err = h
            .manager
            .complete(&init.file_id, &init.token, None, BASE)
            .await
            .unwrap_err();
        assert_eq!(err.gone_reason(), Some(GoneReason::Expired));
        assert!(h.metadata.get(&init.file_id).await.unwrap().is_none());
        assert!(h.tokens.get(&init.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_appends_admit_exactly_one() {
        let h = harness();
        let init = h.manager.initialize(&request(2, None), BASE).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = h.manager.clone();
                let file_id = init.file_id.clone();
                let token = init.token.clone();
                tokio::spawn(async move {
                    manager
                        .append(&file_id, &token, 0, 2, Bytes::from_static(b"abc"))
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(ShareError::OutOfOrder { expected_index, .. }) => {
                    assert_eq!(expected_index, 1)
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(accepted, 1);

        let session = stored(&h, &init.file_id).await.unwrap();
        assert_eq!(session.chunk_count, 1);
        assert_eq!(session.total_size, 3);
    }
}
