//! # Cluster State Snapshot
//!
//! The read-only triple returned from every inventory operation: latest
//! cluster version, the configuration derived from it, and that
//! configuration's latest status. States carry copies by value; there are
//! no back-pointers into shared stores.

use serde::{Deserialize, Serialize};

use crate::models::cluster::ClusterEntity;
use crate::models::configuration::ClusterConfigurationEntity;
use crate::models::status::ClusterStatusEntity;

/// Immutable snapshot of one cluster's live triple. Mutating inventory
/// operations return the new state; the caller's copy never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    pub cluster: ClusterEntity,
    pub configuration: ClusterConfigurationEntity,
    pub status: ClusterStatusEntity,
}

impl ClusterState {
    pub fn runtime_id(&self) -> &str {
        &self.cluster.runtime_id
    }
}

/// One entry of a runtime's status history, as returned by
/// `Inventory::status_changes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ClusterStatusEntity,
}
