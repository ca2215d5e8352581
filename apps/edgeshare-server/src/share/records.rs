//! Typed views over the metadata and token namespaces

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::error::StorageResult;
use crate::storage::KvStore;

use super::types::FileSession;

/// Seconds records outlive their logical deadline in the store.
///
/// Deadlines are enforced by the lazy checks; store expiry is only the
/// backstop for sessions nobody touches again. The margin lets a late
/// request still find the record, report `Gone` and cascade the cleanup.
pub const STORE_EXPIRY_GRACE_SECS: i64 = 60;

fn backstop(deadline: DateTime<Utc>) -> DateTime<Utc> {
    deadline + Duration::seconds(STORE_EXPIRY_GRACE_SECS)
}

/// File id -> session record
#[derive(Clone)]
pub struct MetadataStore {
    kv: Arc<dyn KvStore>,
}

impl MetadataStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Load a session; an unreadable record counts as missing
    pub async fn load(&self, file_id: &str) -> StorageResult<Option<FileSession>> {
        let Some(json) = self.kv.get(file_id).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::error!(file_id = %file_id, error = %e, "Failed to parse session metadata");
                Ok(None)
            }
        }
    }

    /// Persist until the session's current retention deadline
    pub async fn save(&self, session: &FileSession) -> StorageResult<()> {
        let json = serde_json::to_string(session)?;
        self.kv
            .put(&session.id, json, backstop(session.retention_deadline()))
            .await
    }

    pub async fn delete(&self, file_id: &str) -> StorageResult<()> {
        self.kv.delete(file_id).await
    }
}

/// Token -> file id
#[derive(Clone)]
pub struct TokenStore {
    kv: Arc<dyn KvStore>,
}

impl TokenStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn resolve(&self, token: &str) -> StorageResult<Option<String>> {
        self.kv.get(token).await
    }

    pub async fn bind(
        &self,
        token: &str,
        file_id: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.kv
            .put(token, file_id.to_string(), backstop(expires_at))
            .await
    }

    pub async fn revoke(&self, token: &str) -> StorageResult<()> {
        self.kv.delete(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::share::types::SessionStatus;
    use crate::storage::MemoryKvStore;
    use chrono::Duration;

    fn pending_session(now: DateTime<Utc>) -> FileSession {
        FileSession {
            id: "f1".to_string(),
            name: "a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            token: "t1".to_string(),
            status: SessionStatus::Pending,
            expected_size: None,
            size: 0,
            total_chunks: 1,
            chunk_count: 0,
            total_size: 0,
            chunk_keys: vec![],
            chunk_digests: vec![],
            created_at: now,
            expires_at: now + Duration::seconds(3600),
            pending_expires_at: Some(now + Duration::seconds(60)),
            last_activity: now,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_pending_record_follows_inactivity_deadline() {
        let clock = ManualClock::starting_now();
        let kv = Arc::new(MemoryKvStore::new(Arc::new(clock.clone())));
        let store = MetadataStore::new(kv);
        let session = pending_session(clock.now());

        store.save(&session).await.unwrap();
        assert_eq!(store.load("f1").await.unwrap(), Some(session));

        clock.advance(Duration::seconds(61));
        assert!(store.load("f1").await.unwrap().is_some());

        clock.advance(Duration::seconds(STORE_EXPIRY_GRACE_SECS));
        assert_eq!(store.load("f1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_garbage_record_reads_as_missing() {
        let clock = ManualClock::starting_now();
        let kv = Arc::new(MemoryKvStore::new(Arc::new(clock.clone())));
        kv.put("f1", "{not json".to_string(), clock.now() + Duration::hours(1))
            .await
            .unwrap();

        let store = MetadataStore::new(kv);
        assert_eq!(store.load("f1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_token_bind_resolve_revoke() {
        let clock = ManualClock::starting_now();
        let tokens = TokenStore::new(Arc::new(MemoryKvStore::new(Arc::new(clock.clone()))));

        tokens
            .bind("t1", "f1", clock.now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(tokens.resolve("t1").await.unwrap().as_deref(), Some("f1"));

        tokens.revoke("t1").await.unwrap();
        assert_eq!(tokens.resolve("t1").await.unwrap(), None);
    }
}
