//! Storage types

use chrono::{DateTime, Utc};

use super::traits::ByteStream;

/// User metadata key carrying a blob's deadline on object stores
pub const EXPIRES_AT_METADATA_KEY: &str = "expires-at";

/// Metadata about a storage object
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    /// Deadline recorded at write time, if any
    pub expires_at: Option<DateTime<Utc>>,
}

impl ObjectMetadata {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// A storage object with a lazily-read body
pub struct StorageObject {
    pub metadata: ObjectMetadata,
    pub body: ByteStream,
}

/// Parse the deadline stored in object user metadata
pub fn parse_expires_at(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}
