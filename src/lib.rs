//! # cluster-inventory
//!
//! Cluster inventory and reconciliation-filter core of a control-plane that
//! drives managed clusters toward a declared desired state.
//!
//! The crate ingests desired-state submissions, stores them with full
//! version history (cluster / configuration / status), tracks lifecycle
//! status on an append-only timeline, and derives the work-lists consumed
//! by downstream reconciliation workers. Selection over the reconciliation
//! ledger goes through a dual-mode filter algebra whose persistent-query
//! and in-memory evaluations agree.

pub mod config;
pub mod database;
pub mod error;
pub mod inventory;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod reconciliation;

pub use config::DatabaseConfig;
pub use database::{transaction, DatabaseConnection, SharedTransaction};
pub use error::{InventoryError, Result};
pub use inventory::{ClusterInventory, Inventory, RETRY_COUNT_SENTINEL};
pub use metrics::{MetricsSink, NoopMetrics, StatusMetrics};
pub use models::{
    Cluster, ClusterConfigurationEntity, ClusterEntity, ClusterState, ClusterStatus,
    ClusterStatusEntity, Component, ComponentConfiguration, KymaConfig, ReconciliationEntity,
    StatusChange,
};
