//! Error types for the reconciliation and write-back subsystem.

use thiserror::Error;

/// Errors that can occur while reconciling against the remote SIS or
/// mutating local schedule state.
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    /// Required configuration (shared secret, API key, base URL) is missing
    /// or invalid. Fatal: aborts before any network call.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The remote system could not be reached or timed out.
    #[error("Remote system unavailable: {message}")]
    RemoteUnavailable { message: String },

    /// The remote system answered with a non-2xx status.
    #[error("Remote system rejected request ({status}): {body}")]
    RemoteRejected { status: u16, body: String },

    /// A proposed assignment collides with an existing slot.
    #[error("Schedule conflict: {reason}")]
    ScheduleConflict { conflicting_slot_id: i64, reason: String },

    /// A remote record matched more than one local entity and needs
    /// manual disambiguation. Reported per-record, never aborts a pass.
    #[error("Ambiguous {entity} match for '{name}': candidates {candidates:?}")]
    ResolutionAmbiguous {
        entity: &'static str,
        name: String,
        candidates: Vec<String>,
    },

    /// A remote record could not be normalized into a typed record.
    #[error("Malformed remote record: {message}")]
    MalformedRecord { message: String },

    /// Local storage failure.
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// Request body failed validation before any storage access.
    #[error("Invalid request: {message}")]
    Validation { message: String },
}

impl SyncError {
    /// Returns true if this error is potentially transient and retryable.
    ///
    /// Conflicts, validation and configuration errors are never retryable;
    /// retrying them reproduces the same outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::RemoteUnavailable { .. } => true,
            SyncError::RemoteRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        SyncError::Configuration {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            SyncError::RemoteUnavailable {
                message: err.to_string(),
            }
        } else {
            SyncError::RemoteUnavailable {
                message: format!("transport error: {err}"),
            }
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Storage {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(SyncError::RemoteUnavailable {
            message: "timeout".into()
        }
        .is_retryable());
        assert!(SyncError::RemoteRejected {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!SyncError::RemoteRejected {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!SyncError::ScheduleConflict {
            conflicting_slot_id: 1,
            reason: "overlap".into()
        }
        .is_retryable());
        assert!(!SyncError::config("missing secret").is_retryable());
    }
}
