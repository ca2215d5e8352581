//! Input validation shared by the upload operations

use serde_json::Value;

use crate::config::UploadConfig;
use crate::error::{Result, ShareError};

/// Integer view of a JSON number; `2.0` counts, `2.5` does not
pub fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// `fileName`: required, non-blank
pub fn file_name(raw: Option<&str>) -> Result<String> {
    match raw {
        Some(name) if !name.trim().is_empty() => Ok(name.to_string()),
        _ => Err(ShareError::invalid("fileName is required")),
    }
}

/// `totalChunks`: positive integer that fits the chunk counter
pub fn total_chunks(raw: Option<&Value>) -> Result<u32> {
    raw.and_then(integer_value)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ShareError::invalid("totalChunks must be a positive integer"))
}

/// `fileSize`: optional non-negative finite number of bytes
///
/// Fractions are kept as declared. No upload can match one, so Complete
/// reports the mismatch.
pub fn expected_size(raw: Option<&Value>) -> Result<Option<f64>> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|size| size.is_finite() && *size >= 0.0)
            .map(Some)
            .ok_or_else(|| ShareError::invalid("fileSize must be a non-negative number")),
        Some(_) => Err(ShareError::invalid("fileSize must be a non-negative number")),
    }
}

/// `totalSize` on completion: optional non-negative whole number
pub fn reported_size(raw: Option<&Value>) -> Result<Option<u64>> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ShareError::invalid("totalSize must be a non-negative number")),
        Some(value) => integer_value(value)
            .and_then(|n| u64::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| ShareError::invalid("totalSize must be a non-negative number")),
    }
}

/// `ttl`: seconds, number or numeric string; default when omitted
pub fn ttl(raw: Option<&Value>, limits: &UploadConfig) -> Result<i64> {
    let requested = match raw {
        None | Some(Value::Null) => return Ok(limits.default_ttl),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(value) => integer_value(value),
    };

    match requested {
        Some(ttl) if (limits.min_ttl..=limits.max_ttl).contains(&ttl) => Ok(ttl),
        _ => Err(ShareError::invalid(format!(
            "TTL must be between {} seconds and {} seconds",
            limits.min_ttl, limits.max_ttl
        ))),
    }
}

/// Query parameter that must be present and non-empty
pub fn required_param<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ShareError::invalid(message))
}

/// Query parameter parsed as a non-negative integer
pub fn chunk_index(raw: Option<&str>) -> Result<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or_else(|| ShareError::invalid("chunkIndex must be a non-negative integer"))
}

/// Query parameter parsed as a positive integer
pub fn total_chunks_param(raw: Option<&str>) -> Result<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| ShareError::invalid("totalChunks must be a positive integer"))
}
