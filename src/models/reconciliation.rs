//! # Reconciliation Ledger Model
//!
//! One row per scheduled reconciliation run. The filter algebra in
//! [`crate::reconciliation`] selects over these rows, both as persistent
//! queries and over already-materialized instances.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::status::ClusterStatus;

/// A scheduled reconciliation run for one cluster configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReconciliationEntity {
    /// `"<runtime_id>--<uuid>"`, minted at scheduling time
    pub scheduling_id: String,
    pub runtime_id: String,
    /// Configuration version this run applies
    pub cluster_config: i64,
    /// Status row that triggered the run
    pub cluster_config_status: i64,
    /// Cluster status snapshot at scheduling time
    pub status: ClusterStatus,
    pub finished: bool,
    pub created: NaiveDateTime,
}
