//! Configuration management for Edgeshare Server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Default chunk limit: 99MB
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 99 * 1024 * 1024;

/// Default in-memory blob cache budget: 512MB
pub const DEFAULT_BLOB_CACHE_CAPACITY: usize = 512 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("Inconsistent TTL bounds: min {min}, default {default}, max {max}")]
    TtlBounds { min: i64, default: i64, max: i64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base for share links; derived from the request Host when unset
    pub public_base_url: Option<String>,
}

/// Upload session limits, all durations in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub min_ttl: i64,
    pub max_ttl: i64,
    pub default_ttl: i64,
    pub inactivity_window: i64,
    pub max_chunk_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            min_ttl: 300,
            max_ttl: 604_800,
            default_ttl: 86_400,
            inactivity_window: 900,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub metadata: MetadataBackend,
    pub blobs: BlobBackend,
}

/// Backend for the metadata and token namespaces
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    Memory,
    Sqlite { url: String },
}

/// Backend for chunk blobs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    Memory { capacity_bytes: usize },
    Filesystem { path: PathBuf },
    S3(S3Config),
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
    pub prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                public_base_url: None,
            },
            upload: UploadConfig::default(),
            storage: StorageConfig {
                metadata: MetadataBackend::Memory,
                blobs: BlobBackend::Memory {
                    capacity_bytes: DEFAULT_BLOB_CACHE_CAPACITY,
                },
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = UploadConfig::default();

        let upload = UploadConfig {
            min_ttl: parse_var("UPLOAD_MIN_TTL", defaults.min_ttl)?,
            max_ttl: parse_var("UPLOAD_MAX_TTL", defaults.max_ttl)?,
            default_ttl: parse_var("UPLOAD_DEFAULT_TTL", defaults.default_ttl)?,
            inactivity_window: parse_var("UPLOAD_INACTIVITY_WINDOW", defaults.inactivity_window)?,
            max_chunk_size: parse_var("UPLOAD_MAX_CHUNK_SIZE", defaults.max_chunk_size)?,
        };
        upload.validate()?;

        let metadata = match env::var("METADATA_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .as_str()
        {
            "memory" => MetadataBackend::Memory,
            "sqlite" => MetadataBackend::Sqlite {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./edgeshare.db".to_string()),
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "METADATA_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let blobs = match env::var("BLOB_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .as_str()
        {
            "memory" => BlobBackend::Memory {
                capacity_bytes: parse_var("BLOB_CACHE_CAPACITY", DEFAULT_BLOB_CACHE_CAPACITY)?,
            },
            "filesystem" => BlobBackend::Filesystem {
                path: env::var("BLOB_PATH")
                    .unwrap_or_else(|_| "./data/chunks".to_string())
                    .into(),
            },
            "s3" => BlobBackend::S3(S3Config {
                endpoint: required_var("S3_ENDPOINT")?,
                bucket: required_var("S3_BUCKET")?,
                access_key: required_var("S3_ACCESS_KEY")?,
                secret_key: required_var("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
                prefix: env::var("S3_PREFIX").unwrap_or_else(|_| "edgeshare".to_string()),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    var: "BLOB_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 3000)?,
                public_base_url: env::var("PUBLIC_BASE_URL")
                    .ok()
                    .map(|url| url.trim_end_matches('/').to_string())
                    .filter(|url| !url.is_empty()),
            },
            upload,
            storage: StorageConfig { metadata, blobs },
        })
    }
}

impl UploadConfig {
    /// Reject bounds that cannot admit the default TTL
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_ttl <= 0 || self.min_ttl > self.default_ttl || self.default_ttl > self.max_ttl {
            return Err(ConfigError::TtlBounds {
                min: self.min_ttl,
                default: self.default_ttl,
                max: self.max_ttl,
            });
        }
        if self.inactivity_window <= 0 {
            return Err(ConfigError::Invalid {
                var: "UPLOAD_INACTIVITY_WINDOW",
                value: self.inactivity_window.to_string(),
            });
        }
        if self.max_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                var: "UPLOAD_MAX_CHUNK_SIZE",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn required_var(var: &'static str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::Missing(var))
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
