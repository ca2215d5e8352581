//! Storage module
//!
//! Key-value namespaces for metadata and tokens, plus the best-effort
//! blob tier for chunk bytes. Backends are chosen from configuration.

mod filesystem;
mod memory;
mod s3;
mod s3_client;
mod sqlite;
mod traits;
mod types;

use std::sync::Arc;

pub use filesystem::FsBlobStore;
pub use memory::{MemoryBlobStore, MemoryKvStore};
pub use s3::S3BlobStore;
pub use s3_client::S3Client;
pub use sqlite::{create_pool, SqliteKvStore};
pub use traits::{BlobRead, BlobStore, ByteStream, KvStore};
pub use types::*;

use crate::clock::SharedClock;
use crate::config::{BlobBackend, MetadataBackend, StorageConfig};
use crate::error::StorageResult;

/// Minimum spacing between sweeps of expired key-value records
pub(crate) const EXPIRED_SWEEP_INTERVAL_SECS: i64 = 60;

/// Namespace names for the shared key-value table
pub const METADATA_NAMESPACE: &str = "metadata";
pub const TOKEN_NAMESPACE: &str = "tokens";

/// The three stores the share service runs on
#[derive(Clone)]
pub struct Stores {
    pub metadata: Arc<dyn KvStore>,
    pub tokens: Arc<dyn KvStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Stores {
    /// All-in-memory stores
    pub fn in_memory(blob_capacity_bytes: usize, clock: SharedClock) -> Self {
        Self {
            metadata: Arc::new(MemoryKvStore::new(clock.clone())),
            tokens: Arc::new(MemoryKvStore::new(clock.clone())),
            blobs: Arc::new(MemoryBlobStore::new(blob_capacity_bytes, clock)),
        }
    }

    /// Build the configured backends
    pub async fn from_config(config: &StorageConfig, clock: SharedClock) -> StorageResult<Self> {
        let (metadata, tokens): (Arc<dyn KvStore>, Arc<dyn KvStore>) = match &config.metadata {
            MetadataBackend::Memory => (
                Arc::new(MemoryKvStore::new(clock.clone())),
                Arc::new(MemoryKvStore::new(clock.clone())),
            ),
            MetadataBackend::Sqlite { url } => {
                let pool = create_pool(url).await?;
                tracing::info!("Metadata database initialized at {}", url);
                (
                    Arc::new(SqliteKvStore::new(pool.clone(), METADATA_NAMESPACE, clock.clone())),
                    Arc::new(SqliteKvStore::new(pool, TOKEN_NAMESPACE, clock.clone())),
                )
            }
        };

        let blobs: Arc<dyn BlobStore> = match &config.blobs {
            BlobBackend::Memory { capacity_bytes } => {
                tracing::info!(capacity_bytes = *capacity_bytes, "Using in-memory blob cache");
                Arc::new(MemoryBlobStore::new(*capacity_bytes, clock))
            }
            BlobBackend::Filesystem { path } => {
                tokio::fs::create_dir_all(path).await?;
                tracing::info!("Using filesystem blob store at {}", path.display());
                Arc::new(FsBlobStore::new(path.clone(), clock))
            }
            BlobBackend::S3(s3) => {
                tracing::info!("S3 endpoint: {}", s3.endpoint);
                tracing::info!("S3 bucket: {}", s3.bucket);
                let client = S3Client::new(s3).await?;
                Arc::new(S3BlobStore::new(client, s3.prefix.clone(), clock))
            }
        };

        Ok(Self {
            metadata,
            tokens,
            blobs,
        })
    }
}
