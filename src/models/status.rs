//! # Cluster Status Model
//!
//! Lifecycle status enumeration and the append-only status timeline entity.
//!
//! Status rows are never mutated: every lifecycle change appends a new row,
//! and the globally monotonic `id` sequence is the canonical ordering for
//! all timeline queries (history, retry counting).

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::InventoryError;

/// Lifecycle status of a cluster configuration.
///
/// The snake_case labels are the exact strings used in persistence and over
/// the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "cluster_status", rename_all = "snake_case")]
pub enum ClusterStatus {
    /// Initial status of every fresh configuration
    ReconcilePending,
    /// A reconciliation run is in progress
    Reconciling,
    /// Desired state applied
    Ready,
    /// Reconciliation failed, not retryable
    ReconcileError,
    /// Reconciliation failed, eligible for retry
    ReconcileErrorRetryable,
    /// Logical deletion requested
    DeletePending,
    /// Deletion in progress
    Deleting,
    /// Deletion failed
    DeleteError,
    /// Deletion finished
    Deleted,
}

/// Statuses that put a cluster on the reconcile work-list unconditionally.
pub const RECONCILE_CANDIDATE_STATUSES: [ClusterStatus; 2] =
    [ClusterStatus::ReconcilePending, ClusterStatus::DeletePending];

/// Statuses re-offered for reconciliation once their last transition is
/// older than the reconcile interval.
pub const AGE_TRIGGERED_STATUSES: [ClusterStatus; 2] =
    [ClusterStatus::Ready, ClusterStatus::Deleted];

/// Statuses that mark a cluster as currently unhealthy.
pub const NOT_READY_STATUSES: [ClusterStatus; 4] = [
    ClusterStatus::Reconciling,
    ClusterStatus::ReconcileError,
    ClusterStatus::Deleting,
    ClusterStatus::DeleteError,
];

impl ClusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::ReconcilePending => "reconcile_pending",
            ClusterStatus::Reconciling => "reconciling",
            ClusterStatus::Ready => "ready",
            ClusterStatus::ReconcileError => "reconcile_error",
            ClusterStatus::ReconcileErrorRetryable => "reconcile_error_retryable",
            ClusterStatus::DeletePending => "delete_pending",
            ClusterStatus::Deleting => "deleting",
            ClusterStatus::DeleteError => "delete_error",
            ClusterStatus::Deleted => "deleted",
        }
    }

    /// True for statuses that belong to the deletion flow.
    pub fn is_deletion(&self) -> bool {
        matches!(
            self,
            ClusterStatus::DeletePending
                | ClusterStatus::Deleting
                | ClusterStatus::DeleteError
                | ClusterStatus::Deleted
        )
    }

    /// True when no further reconciliation work is expected until the
    /// desired state changes or the reconcile interval expires.
    pub fn is_final(&self) -> bool {
        matches!(self, ClusterStatus::Ready | ClusterStatus::Deleted)
    }
}

impl fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClusterStatus {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reconcile_pending" => Ok(ClusterStatus::ReconcilePending),
            "reconciling" => Ok(ClusterStatus::Reconciling),
            "ready" => Ok(ClusterStatus::Ready),
            "reconcile_error" => Ok(ClusterStatus::ReconcileError),
            "reconcile_error_retryable" => Ok(ClusterStatus::ReconcileErrorRetryable),
            "delete_pending" => Ok(ClusterStatus::DeletePending),
            "deleting" => Ok(ClusterStatus::Deleting),
            "delete_error" => Ok(ClusterStatus::DeleteError),
            "deleted" => Ok(ClusterStatus::Deleted),
            other => Err(InventoryError::InvalidArgument(format!(
                "unknown cluster status '{other}'"
            ))),
        }
    }
}

/// One row of a configuration's status timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClusterStatusEntity {
    /// Globally monotonic across all clusters
    pub id: i64,
    pub runtime_id: String,
    pub config_version: i64,
    pub status: ClusterStatus,
    pub created: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_statuses() {
        let all = [
            ClusterStatus::ReconcilePending,
            ClusterStatus::Reconciling,
            ClusterStatus::Ready,
            ClusterStatus::ReconcileError,
            ClusterStatus::ReconcileErrorRetryable,
            ClusterStatus::DeletePending,
            ClusterStatus::Deleting,
            ClusterStatus::DeleteError,
            ClusterStatus::Deleted,
        ];
        for status in all {
            assert_eq!(status.as_str().parse::<ClusterStatus>().unwrap(), status);
        }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!("rebooting".parse::<ClusterStatus>().is_err());
    }

    #[test]
    fn serde_uses_snake_case_labels() {
        let json = serde_json::to_string(&ClusterStatus::ReconcileErrorRetryable).unwrap();
        assert_eq!(json, "\"reconcile_error_retryable\"");
    }

    #[test]
    fn status_groups_are_disjoint() {
        for status in RECONCILE_CANDIDATE_STATUSES {
            assert!(!NOT_READY_STATUSES.contains(&status));
            assert!(!AGE_TRIGGERED_STATUSES.contains(&status));
        }
        for status in AGE_TRIGGERED_STATUSES {
            assert!(status.is_final());
        }
    }
}
