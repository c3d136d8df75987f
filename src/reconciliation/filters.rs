//! # Reconciliation Filters
//!
//! Composable predicates over reconciliation runs, each evaluating in two
//! coherent modes:
//!
//! - `filter_by_query` renders the predicate into the persistent query
//!   builder so the selection returns exactly the matching rows.
//! - `filter_by_instance` decides for one materialized entity.
//!
//! For any finite row set both modes produce the same multiset, with one
//! documented exception: [`Limit`] imposes a deterministic newest-first
//! ordering in query mode that the instance mode cannot reconstruct
//! without prior sorting. Instance-side state ([`Limit`]'s arrival counter)
//! is per filter value, so filters are single-use per query; build a fresh
//! one each time.

use chrono::{NaiveDateTime, Timelike};

use crate::error::{InventoryError, Result};
use crate::models::reconciliation::ReconciliationEntity;
use crate::models::status::ClusterStatus;
use crate::reconciliation::scope::ReconciliationScope;

/// Dual-mode predicate over reconciliation runs.
pub trait Filter: Send {
    /// Render the predicate into the persistent query.
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()>;

    /// Keep or drop one materialized entity.
    fn filter_by_instance(&mut self, entity: ReconciliationEntity)
        -> Option<ReconciliationEntity>;
}

/// Short-circuiting conjunction of filters. Query fragments are emitted in
/// declaration order; instance evaluation returns the first drop or the
/// entity emitted by the last filter, so [`Limit`] composes correctly as
/// the terminal predicate.
#[derive(Default)]
pub struct FilterMixer {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl Filter for FilterMixer {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        for filter in &self.filters {
            filter.filter_by_query(scope)?;
        }
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        let mut current = entity;
        for filter in &mut self.filters {
            current = filter.filter_by_instance(current)?;
        }
        Some(current)
    }
}

/// Keep the `count` most recently created entities. Query mode orders by
/// `created` descending before limiting; instance mode counts arrivals.
pub struct Limit {
    count: i64,
    seen: i64,
}

impl Limit {
    pub fn new(count: i64) -> Result<Self> {
        if count < 1 {
            return Err(InventoryError::InvalidArgument(format!(
                "limit must be positive, got {count}"
            )));
        }
        Ok(Self { count, seen: 0 })
    }
}

impl Filter for Limit {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        scope.order_by_created_desc();
        scope.limit(self.count);
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        if self.seen < self.count {
            self.seen += 1;
            Some(entity)
        } else {
            None
        }
    }
}

/// Keep entities whose status is in the given list. An empty list is
/// rejected at construction so both evaluation modes agree.
#[derive(Debug)]
pub struct WithStatuses {
    statuses: Vec<ClusterStatus>,
}

impl WithStatuses {
    pub fn new(statuses: Vec<ClusterStatus>) -> Result<Self> {
        if statuses.is_empty() {
            return Err(InventoryError::InvalidArgument(
                "status filter requires at least one status".to_string(),
            ));
        }
        Ok(Self { statuses })
    }
}

impl Filter for WithStatuses {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        scope.add_condition("(");
        for (idx, status) in self.statuses.iter().enumerate() {
            if idx > 0 {
                scope.push(" OR ");
            }
            scope.push("status = ");
            scope.push_bind(*status);
        }
        scope.push(")");
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        self.statuses.contains(&entity.status).then_some(entity)
    }
}

/// Strictly-after comparison on creation time, at millisecond precision.
pub struct WithCreationDateAfter {
    time: NaiveDateTime,
}

impl WithCreationDateAfter {
    pub fn new(time: NaiveDateTime) -> Self {
        Self {
            time: truncate_to_millis(time),
        }
    }
}

impl Filter for WithCreationDateAfter {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        scope.add_condition("created > ");
        scope.push_bind(self.time);
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        (entity.created > self.time).then_some(entity)
    }
}

/// Strictly-before comparison on creation time, at millisecond precision.
pub struct WithCreationDateBefore {
    time: NaiveDateTime,
}

impl WithCreationDateBefore {
    pub fn new(time: NaiveDateTime) -> Self {
        Self {
            time: truncate_to_millis(time),
        }
    }
}

impl Filter for WithCreationDateBefore {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        scope.add_condition("created < ");
        scope.push_bind(self.time);
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        (entity.created < self.time).then_some(entity)
    }
}

/// Exact match on the scheduling ID.
pub struct WithSchedulingId {
    scheduling_id: String,
}

impl WithSchedulingId {
    pub fn new(scheduling_id: impl Into<String>) -> Self {
        Self {
            scheduling_id: scheduling_id.into(),
        }
    }
}

impl Filter for WithSchedulingId {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        scope.add_condition("scheduling_id = ");
        scope.push_bind(self.scheduling_id.clone());
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        (entity.scheduling_id == self.scheduling_id).then_some(entity)
    }
}

/// Set membership on runtime IDs. An empty list is a no-op in both modes.
pub struct WithRuntimeIds {
    runtime_ids: Vec<String>,
}

impl WithRuntimeIds {
    pub fn new(runtime_ids: Vec<String>) -> Self {
        Self { runtime_ids }
    }
}

impl Filter for WithRuntimeIds {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        if self.runtime_ids.is_empty() {
            return Ok(());
        }
        scope.add_condition("runtime_id = ANY(");
        scope.push_bind(self.runtime_ids.clone());
        scope.push(")");
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        if self.runtime_ids.is_empty() {
            return Some(entity);
        }
        self.runtime_ids
            .contains(&entity.runtime_id)
            .then_some(entity)
    }
}

/// Exact match on one runtime ID.
pub struct WithRuntimeId {
    runtime_id: String,
}

impl WithRuntimeId {
    pub fn new(runtime_id: impl Into<String>) -> Self {
        Self {
            runtime_id: runtime_id.into(),
        }
    }
}

impl Filter for WithRuntimeId {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        scope.add_condition("runtime_id = ");
        scope.push_bind(self.runtime_id.clone());
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        (entity.runtime_id == self.runtime_id).then_some(entity)
    }
}

/// Keep unfinished runs.
#[derive(Default)]
pub struct CurrentlyReconciling;

impl Filter for CurrentlyReconciling {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        scope.add_condition("finished = FALSE");
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        (!entity.finished).then_some(entity)
    }
}

/// Keep the unfinished run of one runtime.
pub struct CurrentlyReconcilingWithRuntimeId {
    runtime_id: String,
}

impl CurrentlyReconcilingWithRuntimeId {
    pub fn new(runtime_id: impl Into<String>) -> Self {
        Self {
            runtime_id: runtime_id.into(),
        }
    }
}

impl Filter for CurrentlyReconcilingWithRuntimeId {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        scope.add_condition("finished = FALSE");
        scope.add_condition("runtime_id = ");
        scope.push_bind(self.runtime_id.clone());
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        (!entity.finished && entity.runtime_id == self.runtime_id).then_some(entity)
    }
}

/// Exact match on the status row that triggered the run.
pub struct WithClusterConfigStatus {
    cluster_config_status: i64,
}

impl WithClusterConfigStatus {
    pub fn new(cluster_config_status: i64) -> Self {
        Self {
            cluster_config_status,
        }
    }
}

impl Filter for WithClusterConfigStatus {
    fn filter_by_query(&self, scope: &mut ReconciliationScope) -> Result<()> {
        scope.add_condition("cluster_config_status = ");
        scope.push_bind(self.cluster_config_status);
        Ok(())
    }

    fn filter_by_instance(
        &mut self,
        entity: ReconciliationEntity,
    ) -> Option<ReconciliationEntity> {
        (entity.cluster_config_status == self.cluster_config_status).then_some(entity)
    }
}

fn truncate_to_millis(time: NaiveDateTime) -> NaiveDateTime {
    let millis = time.nanosecond() / 1_000_000;
    time.with_nanosecond(millis * 1_000_000).unwrap_or(time)
}
