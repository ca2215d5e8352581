//! Edgeshare Server Library
//!
//! Time-bounded, token-gated file sharing over a best-effort edge cache.
//! Clients upload a file in sequential chunks and get back a share link;
//! recipients stream the reassembled file until it expires.
//!
//! # Modules
//!
//! - `share`: upload session state machine, retrieval and cleanup
//! - `storage`: metadata/token key-value stores and the chunk blob tier
//! - `routes`: HTTP surface
//! - `clock`: injectable time source for every deadline check

pub mod clock;
pub mod config;
pub mod error;
pub mod routes;
pub mod share;
pub mod state;
pub mod storage;

pub use config::Config;
pub use error::{GoneReason, ShareError, StorageError};
pub use state::AppState;
