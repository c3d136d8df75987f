//! # Inventory Error Types
//!
//! Unified error handling for inventory and reconciliation-ledger operations.
//!
//! Callers branch on error kinds rather than message contents: `NotFound`
//! distinguishes "first submission" from "update", `PersistenceUnavailable`
//! and `TransactionAborted` are retryable by the caller, `Internal` is not.
//! The inventory itself never retries.

use thiserror::Error;

/// Inventory operation result type
pub type Result<T> = std::result::Result<T, InventoryError>;

/// Error kinds surfaced by the inventory core.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The requested cluster, configuration or status does not exist.
    #[error("no entry found for runtime '{runtime_id}'{}", configuration_version.map(|v| format!(" with configuration version {v}")).unwrap_or_default())]
    NotFound {
        runtime_id: String,
        configuration_version: Option<i64>,
    },

    /// Malformed caller input (empty runtime ID, empty status list, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The surrounding transaction was rolled back, either explicitly by the
    /// caller or by a serialization conflict.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// Connection-level failure; the operation may be retried by the caller.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(#[source] sqlx::Error),

    /// Non-retryable persistence failure.
    #[error("internal persistence failure: {0}")]
    Internal(#[source] sqlx::Error),

    /// Stored payload could not be decoded into its wire form.
    #[error("stored payload is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InventoryError {
    /// True when the error is a missing-entity sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::NotFound { .. })
    }

    /// True when the caller may retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InventoryError::PersistenceUnavailable(_) | InventoryError::TransactionAborted(_)
        )
    }

    pub(crate) fn not_found(runtime_id: &str) -> Self {
        InventoryError::NotFound {
            runtime_id: runtime_id.to_string(),
            configuration_version: None,
        }
    }

    pub(crate) fn not_found_config(runtime_id: &str, configuration_version: i64) -> Self {
        InventoryError::NotFound {
            runtime_id: runtime_id.to_string(),
            configuration_version: Some(configuration_version),
        }
    }
}

impl From<sqlx::Error> for InventoryError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                InventoryError::PersistenceUnavailable(error)
            }
            sqlx::Error::Database(db) => {
                // 40001 = serialization_failure, 40P01 = deadlock_detected,
                // 23505 = unique_violation raced by a concurrent writer
                match db.code().as_deref() {
                    Some("40001") | Some("40P01") | Some("23505") => {
                        InventoryError::TransactionAborted(db.to_string())
                    }
                    _ => InventoryError::Internal(error),
                }
            }
            _ => InventoryError::Internal(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_predicate() {
        let err = InventoryError::not_found("runtime-a");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());

        let err = InventoryError::InvalidArgument("empty runtime ID".into());
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_message_carries_configuration_version() {
        let err = InventoryError::not_found_config("runtime-a", 7);
        let msg = err.to_string();
        assert!(msg.contains("runtime-a"));
        assert!(msg.contains("configuration version 7"));
    }

    #[test]
    fn transaction_aborted_is_retryable() {
        let err = InventoryError::TransactionAborted("rolled back".into());
        assert!(err.is_retryable());
    }
}
