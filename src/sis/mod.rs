//! Remote SIS integration: signed RPC client, retry policy, payload
//! normalization, and the error taxonomy shared across the engine.

pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::SisClient;
pub use error::SyncError;
pub use retry::RetryPolicy;
