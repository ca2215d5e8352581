//! Error types for the Edgeshare server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type for share operations
pub type Result<T> = std::result::Result<T, ShareError>;

/// Result type for storage backends
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Why a file is no longer available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoneReason {
    /// The absolute TTL elapsed
    Expired,
    /// The upload stalled past the inactivity window
    Inactive,
    /// The metadata record is gone (expired or purged)
    Deleted,
    /// A chunk blob was evicted from the cache tier
    ChunkMissing,
    /// The cache tier returned nothing at all
    CacheMiss,
}

impl GoneReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Inactive => "inactive",
            Self::Deleted => "deleted",
            Self::ChunkMissing => "chunk_missing",
            Self::CacheMiss => "cache_miss",
        }
    }

    /// Storage-tier loss, as opposed to ordinary expiry
    pub fn is_data_loss(&self) -> bool {
        matches!(self, Self::ChunkMissing | Self::CacheMiss)
    }
}

/// Share service error type
#[derive(Error, Debug)]
pub enum ShareError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Gone { reason: GoneReason, message: String },

    #[error("Chunks must be uploaded sequentially: expected index {expected_index}, got {received_index}")]
    OutOfOrder {
        expected_index: u32,
        received_index: u32,
    },

    #[error("Upload session already finalized")]
    AlreadyFinalized,

    #[error("File upload has not been finalized")]
    NotFinalized,

    #[error("Uploaded chunk count does not match totalChunks: expected {expected}, received {received}")]
    IncompleteUpload { expected: u32, received: u32 },

    #[error("Chunk exceeds expected file size: expected {expected}, projected {projected}")]
    SizeExceeded { expected: f64, projected: u64 },

    #[error("Uploaded file size does not match expected size: expected {expected}, actual {actual}")]
    SizeMismatch { expected: f64, actual: u64 },

    #[error("Reported totalSize does not match accumulated size: reported {reported}, actual {actual}")]
    ReportedSizeMismatch { reported: u64, actual: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShareError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn gone(reason: GoneReason, msg: impl Into<String>) -> Self {
        Self::Gone {
            reason,
            message: msg.into(),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone { .. } => StatusCode::GONE,
            Self::OutOfOrder { .. }
            | Self::AlreadyFinalized
            | Self::NotFinalized
            | Self::IncompleteUpload { .. }
            | Self::SizeExceeded { .. }
            | Self::SizeMismatch { .. }
            | Self::ReportedSizeMismatch { .. } => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Gone { .. } => "gone",
            Self::OutOfOrder { .. } => "out_of_order",
            Self::AlreadyFinalized => "already_finalized",
            Self::NotFinalized => "not_finalized",
            Self::IncompleteUpload { .. } => "incomplete_upload",
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::ReportedSizeMismatch { .. } => "reported_size_mismatch",
            Self::Storage(_) => "storage_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// The gone reason, if this is a `Gone` error
    pub fn gone_reason(&self) -> Option<GoneReason> {
        match self {
            Self::Gone { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Message safe to show the caller
    pub fn public_message(&self) -> String {
        match self {
            Self::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                "Internal Server Error".to_string()
            }
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Storage backend errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error response body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: String,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<GoneReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected: Option<serde_json::Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    received: Option<u64>,
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (expected_index, expected, received) = match &self {
            Self::OutOfOrder { expected_index, .. } => (Some(*expected_index), None, None),
            Self::IncompleteUpload { expected, received } => {
                (None, Some((*expected).into()), Some(*received as u64))
            }
            Self::SizeExceeded { expected, projected } => {
                (None, size_number(*expected), Some(*projected))
            }
            Self::SizeMismatch { expected, actual } => (None, size_number(*expected), Some(*actual)),
            Self::ReportedSizeMismatch { reported, actual } => {
                (None, Some((*actual).into()), Some(*reported))
            }
            _ => (None, None, None),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: self.public_message(),
            code: self.code(),
            reason: self.gone_reason(),
            expected_index,
            expected,
            received,
        });

        (status, body).into_response()
    }
}

/// Declared sizes render as integers when whole
fn size_number(size: f64) -> Option<serde_json::Number> {
    if size.fract() == 0.0 && size >= 0.0 && size <= u64::MAX as f64 {
        Some((size as u64).into())
    } else {
        serde_json::Number::from_f64(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ShareError::invalid("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ShareError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ShareError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ShareError::gone(GoneReason::ChunkMissing, "x").status_code(),
            StatusCode::GONE
        );
        assert_eq!(
            ShareError::OutOfOrder { expected_index: 0, received_index: 1 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ShareError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ShareError::Storage(StorageError::Backend("secret detail".into()));
        assert_eq!(err.public_message(), "Internal Server Error");
    }

    #[test]
    fn test_gone_reason_wire_names() {
        assert_eq!(GoneReason::ChunkMissing.as_str(), "chunk_missing");
        assert_eq!(
            serde_json::to_value(GoneReason::CacheMiss).unwrap(),
            serde_json::json!("cache_miss")
        );
        assert!(GoneReason::ChunkMissing.is_data_loss());
        assert!(!GoneReason::Expired.is_data_loss());
    }
}
