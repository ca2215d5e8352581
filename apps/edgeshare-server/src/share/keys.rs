//! Identifiers, storage keys and header encodings

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const ID_ALPHABET: &[u8; 64] = b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

/// Length of a file id
pub const FILE_ID_LEN: usize = 16;

/// 32 bytes whitened from two v4 UUIDs (their fixed version/variant bits are hashed away)
fn random_bytes() -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.finalize().into()
}

/// New URL-safe file id
pub fn generate_file_id() -> String {
    random_bytes()[..FILE_ID_LEN]
        .iter()
        .map(|b| ID_ALPHABET[(*b & 63) as usize] as char)
        .collect()
}

/// New bearer token (256 bits, URL-safe base64)
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes())
}

/// Blob key for chunk `index` of a session.
///
/// Bound to the token through its digest so the raw token never reaches
/// the blob tier.
pub fn chunk_key(file_id: &str, token: &str, index: u32) -> String {
    let token_digest = compute_hash(token.as_bytes());
    format!("chunks/{}/{}/{:08}", file_id, &token_digest[..16], index)
}

/// Public share link
pub fn share_link(base_url: &str, file_id: &str, token: &str) -> String {
    format!("{}/s/{}/{}", base_url.trim_end_matches('/'), file_id, token)
}

/// Compute SHA-256 hash of data
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Percent-encode a filename for `filename*=UTF-8''...` (RFC 5987)
pub fn encode_rfc5987(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

/// ASCII stand-in for the legacy `filename="..."` parameter
pub fn ascii_fallback(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if cleaned.trim().is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
