//! Upload Routes
//!
//! One endpoint, three actions selected by `?action=`:
//! - `initialize` (default): JSON body, opens a session
//! - `append`: raw chunk body, `fileId`/`token`/`chunkIndex`/`totalChunks` in the query
//! - `complete`: `fileId`/`token`/`totalSize?` in the JSON body or the query

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ShareError};
use crate::share::{validate, InitializeRequest};
use crate::state::AppState;

use super::base_url;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub action: Option<String>,
    pub file_id: Option<String>,
    pub token: Option<String>,
    pub chunk_index: Option<String>,
    pub total_chunks: Option<String>,
    pub total_size: Option<String>,
}

/// POST /api/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Response> {
    match query.action.as_deref().unwrap_or("initialize") {
        "initialize" => initialize(&state, &headers, &body).await,
        "append" => append(&state, &query, body).await,
        "complete" => complete(&state, &headers, &query, &body).await,
        other => Err(ShareError::invalid(format!("Unknown action: {}", other))),
    }
}

async fn initialize(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<Response> {
    let request: InitializeRequest = serde_json::from_slice(body)
        .map_err(|e| ShareError::invalid(format!("Invalid JSON body: {}", e)))?;

    let response = state
        .uploads()
        .initialize(&request, &base_url(state, headers))
        .await?;

    Ok(Json(response).into_response())
}

async fn append(state: &AppState, query: &UploadQuery, body: Bytes) -> Result<Response> {
    let missing = "fileId and token are required";
    let file_id = validate::required_param(query.file_id.as_deref(), missing)?;
    let token = validate::required_param(query.token.as_deref(), missing)?;
    let chunk_index = validate::chunk_index(query.chunk_index.as_deref())?;
    let total_chunks = validate::total_chunks_param(query.total_chunks.as_deref())?;

    let response = state
        .uploads()
        .append(file_id, token, chunk_index, total_chunks, body)
        .await?;

    Ok(Json(response).into_response())
}

async fn complete(
    state: &AppState,
    headers: &HeaderMap,
    query: &UploadQuery,
    body: &[u8],
) -> Result<Response> {
    // An unreadable body counts as empty; the query string still applies
    let fields = serde_json::from_slice::<Value>(body)
        .ok()
        .filter(Value::is_object)
        .unwrap_or(Value::Null);

    let text_field = |name: &str, fallback: &Option<String>| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| fallback.clone())
    };

    let file_id = text_field("fileId", &query.file_id);
    let token = text_field("token", &query.token);
    let total_size = fields
        .get("totalSize")
        .filter(|v| !v.is_null())
        .cloned()
        .or_else(|| query.total_size.clone().map(Value::String));

    let missing = "fileId and token are required";
    let file_id = validate::required_param(file_id.as_deref(), missing)?;
    let token = validate::required_param(token.as_deref(), missing)?;

    let response = state
        .uploads()
        .complete(file_id, token, total_size.as_ref(), &base_url(state, headers))
        .await?;

    Ok(Json(response).into_response())
}
