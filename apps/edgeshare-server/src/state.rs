//! Application state management

use std::sync::Arc;

use crate::clock::SharedClock;
use crate::config::Config;
use crate::share::{RetrievalService, UploadSessionManager};
use crate::storage::Stores;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    uploads: UploadSessionManager,
    retrieval: RetrievalService,
}

impl AppState {
    /// Wire the share services onto a set of stores
    pub fn new(config: Config, stores: Stores, clock: SharedClock) -> Self {
        let uploads = UploadSessionManager::new(&stores, clock.clone(), config.upload.clone());
        let retrieval = RetrievalService::new(&stores, clock);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                uploads,
                retrieval,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the upload session manager
    pub fn uploads(&self) -> &UploadSessionManager {
        &self.inner.uploads
    }

    /// Get the retrieval service
    pub fn retrieval(&self) -> &RetrievalService {
        &self.inner.retrieval
    }
}
