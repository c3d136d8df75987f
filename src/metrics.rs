//! # Inventory Metrics
//!
//! Passive counters updated from inventory state transitions. The sink is a
//! contract-inert collaborator: it must never fail a transition, so every
//! implementation swallows and logs its own failures.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use tracing::debug;

use crate::models::state::ClusterState;
use crate::models::status::ClusterStatus;

/// Observer of inventory state transitions.
///
/// `old` is `None` for the initial status of a fresh configuration.
pub trait MetricsSink: Send + Sync {
    fn on_state_change(&self, old: Option<&ClusterState>, new: &ClusterState);
}

/// Sink that ignores every event.
#[derive(Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn on_state_change(&self, _old: Option<&ClusterState>, _new: &ClusterState) {}
}

/// Point-in-time view of the collected counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Clusters currently in each status, by last observed transition
    pub current: HashMap<ClusterStatus, i64>,
    /// Transitions observed into each status since startup
    pub transitions: HashMap<ClusterStatus, u64>,
    pub total_transitions: u64,
}

/// In-process status counters.
#[derive(Debug, Default)]
pub struct StatusMetrics {
    inner: RwLock<MetricsSnapshot>,
}

impl StatusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl MetricsSink for StatusMetrics {
    fn on_state_change(&self, old: Option<&ClusterState>, new: &ClusterState) {
        let mut counts = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(old) = old {
            let gauge = counts.current.entry(old.status.status).or_insert(0);
            *gauge -= 1;
        }
        *counts.current.entry(new.status.status).or_insert(0) += 1;
        *counts.transitions.entry(new.status.status).or_insert(0) += 1;
        counts.total_transitions += 1;

        debug!(
            runtime_id = %new.cluster.runtime_id,
            old_status = old.map(|s| s.status.status.as_str()).unwrap_or("none"),
            new_status = %new.status.status,
            "cluster status transition"
        );
    }
}
