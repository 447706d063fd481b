//! Shared application state.

use crate::config::SisConfig;
use crate::db::LocalDbManager;
use crate::sis::{RetryPolicy, SisClient, SyncError};

/// State shared by the HTTP server and the reconciliation engine.
///
/// Everything here is explicitly constructed at startup and injected; there
/// are no ambient global clients.
pub struct AppState {
    pub client: SisClient,
    pub db: LocalDbManager,
    pub retry_policy: RetryPolicy,
}

impl AppState {
    pub fn new(config: &SisConfig) -> Result<Self, SyncError> {
        Ok(Self {
            client: SisClient::new(config)?,
            db: LocalDbManager::new(&config.db_path),
            retry_policy: RetryPolicy::default(),
        })
    }
}
