//! Environment-driven configuration.
//!
//! The shared HMAC secret, API key and remote base URL are required; their
//! absence is a fatal configuration error, never retried.

use crate::sis::error::SyncError;
use std::env;
use url::Url;

/// Runtime configuration for the sync service.
#[derive(Debug, Clone)]
pub struct SisConfig {
    /// Base URL of the remote SIS API.
    pub base_url: Url,
    /// Bearer API key sent on every request.
    pub api_key: String,
    /// Shared secret for the HMAC-SHA256 request signature.
    pub hmac_secret: String,
    /// Path to the local sqlite database.
    pub db_path: String,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
}

fn required_var(name: &str) -> Result<String, SyncError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SyncError::config(format!("missing required environment variable {name}")))
}

impl SisConfig {
    /// Loads configuration from the environment.
    pub fn from_env() -> Result<Self, SyncError> {
        let base_url_raw = required_var("SIS_BASE_URL")?;
        let base_url = Url::parse(&base_url_raw)
            .map_err(|e| SyncError::config(format!("invalid SIS_BASE_URL: {e}")))?;

        Ok(Self {
            base_url,
            api_key: required_var("SIS_API_KEY")?,
            hmac_secret: required_var("SIS_HMAC_SECRET")?,
            db_path: env::var("SIS_DB_PATH").unwrap_or_else(|_| "sis_sync.db".to_string()),
            bind_addr: env::var("SIS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string()),
        })
    }

    #[cfg(test)]
    pub fn for_tests(base_url: &str) -> Self {
        Self {
            base_url: Url::parse(base_url).unwrap(),
            api_key: "test-key".to_string(),
            hmac_secret: "test-secret".to_string(),
            db_path: ":memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }
}
