//! Download routes
//!
//! Two front doors onto the Retrieval Service:
//! - GET /api/files/:file_id/download?token=... answers errors in JSON
//! - GET /s/:file_id/:token (the share link) answers errors in plain text

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{GoneReason, Result, ShareError};
use crate::share::keys::{ascii_fallback, encode_rfc5987};
use crate::share::Download;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub token: Option<String>,
    /// `1` or `true` serves the file as an attachment
    pub download: Option<String>,
}

impl DownloadQuery {
    fn as_attachment(&self) -> bool {
        matches!(self.download.as_deref(), Some("1") | Some("true"))
    }
}

/// Body for a file lost from the blob tier
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UnavailableResponse {
    success: bool,
    error: &'static str,
    message: String,
    file_id: String,
    reason: GoneReason,
}

fn unavailable_message(file_id: &str) -> String {
    format!(
        "File with ID {} is no longer available on edge storage.",
        file_id
    )
}

/// GET /api/files/:file_id/download
pub async fn api_download(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let Some(token) = query.token.as_deref().filter(|t| !t.is_empty()) else {
        return ShareError::invalid("token is required").into_response();
    };

    match state.retrieval().fetch(&file_id, token).await {
        Ok(download) => file_response(download, query.as_attachment()).into_response(),
        Err(err) => match err.gone_reason() {
            Some(reason) if reason.is_data_loss() => (
                StatusCode::GONE,
                Json(UnavailableResponse {
                    success: false,
                    error: "File not available",
                    message: unavailable_message(&file_id),
                    file_id,
                    reason,
                }),
            )
                .into_response(),
            _ => err.into_response(),
        },
    }
}

/// GET /s/:file_id/:token
pub async fn share_link_download(
    State(state): State<AppState>,
    Path((file_id, token)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    match state.retrieval().fetch(&file_id, &token).await {
        Ok(download) => match file_response(download, query.as_attachment()) {
            Ok(response) => response,
            Err(err) => plain_error(&file_id, err),
        },
        Err(err) => plain_error(&file_id, err),
    }
}

fn plain_error(file_id: &str, err: ShareError) -> Response {
    let message = match err.gone_reason() {
        Some(reason) if reason.is_data_loss() => unavailable_message(file_id),
        _ => err.public_message(),
    };
    (err.status_code(), message).into_response()
}

/// Stream the assembled file with its descriptive headers
fn file_response(download: Download, attachment: bool) -> Result<Response> {
    let session = &download.session;
    let disposition = format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        if attachment { "attachment" } else { "inline" },
        ascii_fallback(&session.name),
        encode_rfc5987(&session.name)
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &session.mime_type)
        .header(header::CONTENT_LENGTH, session.size)
        .header(
            header::CACHE_CONTROL,
            format!("public, max-age={}", download.remaining_ttl),
        )
        .header(header::CONTENT_DISPOSITION, disposition)
        .header("X-File-ID", &session.id)
        .header("X-File-Name", encode_rfc5987(&session.name))
        .header("X-Expiration", session.expires_at.timestamp())
        .body(Body::from_stream(download.body))
        .map_err(|e| ShareError::Internal(format!("Failed to build download response: {}", e)))
}
