//! Share service
//!
//! Chunked uploads into a best-effort blob tier, token-gated streaming
//! downloads, and cascading cleanup when a file expires or loses a chunk.

mod assembly;
mod cleanup;
pub mod keys;
mod locks;
mod records;
mod retrieval;
mod session;
pub mod types;
pub mod validate;

pub use cleanup::Cleanup;
pub use locks::SessionLocks;
pub use records::{MetadataStore, TokenStore, STORE_EXPIRY_GRACE_SECS};
pub use retrieval::{Download, RetrievalService};
pub use session::UploadSessionManager;
pub use types::*;
