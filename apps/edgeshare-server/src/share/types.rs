//! Share types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Session Types
// ============================================================================

/// Upload session state.
///
/// A missing record means the session was deleted or expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Accepting chunks
    Pending,
    /// Finalized and readable; terminal
    Uploaded,
}

/// One upload, keyed by file id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSession {
    pub id: String,

    /// Display name
    pub name: String,

    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,

    /// Bearer credential for reads
    pub token: String,

    pub status: SessionStatus,

    /// Declared size, if the client sent one
    pub expected_size: Option<f64>,

    /// Final size, set on completion
    #[serde(default)]
    pub size: u64,

    pub total_chunks: u32,

    pub chunk_count: u32,

    /// Sum of appended chunk lengths
    pub total_size: u64,

    /// Blob keys, index i holds chunk i
    pub chunk_keys: Vec<String>,

    /// SHA-256 of each chunk, parallel to `chunk_keys`
    #[serde(default)]
    pub chunk_digests: Vec<String>,

    pub created_at: DateTime<Utc>,

    /// Absolute deadline, never extended
    pub expires_at: DateTime<Utc>,

    /// Sliding inactivity deadline, only while pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_expires_at: Option<DateTime<Utc>>,

    pub last_activity: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl FileSession {
    /// Deadline the stores should enforce for this record
    pub fn retention_deadline(&self) -> DateTime<Utc> {
        match (self.status, self.pending_expires_at) {
            (SessionStatus::Pending, Some(pending)) => self.expires_at.min(pending),
            _ => self.expires_at,
        }
    }

    /// Absolute TTL elapsed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Inactivity window elapsed
    pub fn is_inactive(&self, now: DateTime<Utc>) -> bool {
        self.pending_expires_at
            .is_some_and(|deadline| now > deadline)
    }

    /// Whole seconds left before the absolute deadline, never negative
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    pub fn remaining_chunks(&self) -> u32 {
        self.total_chunks.saturating_sub(self.chunk_count)
    }

    /// Digest recorded for chunk `index`, if any
    pub fn chunk_digest(&self, index: usize) -> Option<&str> {
        if self.chunk_digests.len() != self.chunk_keys.len() {
            return None;
        }
        self.chunk_digests.get(index).map(String::as_str)
    }
}

// ============================================================================
// Initialize Types
// ============================================================================

/// Request to open an upload session.
///
/// Numeric fields stay loosely typed so validation can report precise errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub file_name: Option<String>,

    #[serde(default)]
    pub file_size: Option<serde_json::Value>,

    pub file_type: Option<String>,

    /// Seconds; number or numeric string
    #[serde(default)]
    pub ttl: Option<serde_json::Value>,

    #[serde(default)]
    pub total_chunks: Option<serde_json::Value>,
}

/// Result of opening a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub success: bool,
    pub file_id: String,
    pub token: String,
    pub download_url: String,
    /// Unix seconds
    pub expires_at: i64,
    pub ttl: i64,
    pub status: SessionStatus,
}

// ============================================================================
// Append Types
// ============================================================================

/// Response after appending a chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResponse {
    pub success: bool,
    pub chunk_index: u32,
    pub chunk_count: u32,
    pub remaining_chunks: u32,
}

// ============================================================================
// Complete Types
// ============================================================================

/// Response after finalizing an upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub success: bool,
    pub file_id: String,
    pub download_url: String,
    pub total_size: u64,
    pub status: SessionStatus,
}
