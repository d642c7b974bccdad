//! Application state.

use std::sync::Arc;

use unrg_storage::{LocalStore, StorageResult};

use crate::auth::TokenVerifier;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub storage: Arc<LocalStore>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Create new application state, opening the store under the data root.
    pub async fn new(config: ApiConfig) -> StorageResult<Self> {
        let storage = LocalStore::open(&config.data_path).await?;
        Ok(Self::with_storage(config, storage))
    }

    /// Build state around an already opened store.
    pub fn with_storage(config: ApiConfig, storage: LocalStore) -> Self {
        let verifier = TokenVerifier::new(&config.token);
        Self {
            config: Arc::new(config),
            storage: Arc::new(storage),
            verifier: Arc::new(verifier),
        }
    }
}
