//! # Cluster Inventory
//!
//! Versioned, durable store of cluster desired state, derived configuration
//! and status history, plus the query surface deriving "which clusters must
//! be reconciled now" and "which clusters are currently unhealthy".
//!
//! ## Versioning model
//!
//! Three entity families are versioned independently:
//! - **Cluster**: new version minted only when the metadata/runtime content
//!   changes, decided by content hash against the latest stored version.
//! - **Configuration**: new version minted when the cluster version changes
//!   or the configuration content changes while the cluster version is
//!   stable. Every fresh configuration starts with `ReconcilePending`.
//! - **Status**: append-only timeline; a row is appended only when the
//!   status actually changes. IDs are globally monotonic.
//!
//! ## Atomicity
//!
//! Every mutating operation runs inside one transaction: partial effects
//! (cluster written but configuration missing) are never observable.
//! `with_tx` returns a view whose statements all run on a caller-supplied
//! transaction; the view is a shallow wrapper substituting only the
//! persistence handle, all business logic is shared.

pub(crate) mod retries;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::debug;

use crate::database::{DatabaseConnection, SharedTransaction};
use crate::error::{InventoryError, Result};
use crate::metrics::MetricsSink;
use crate::models::cluster::{Cluster, ClusterEntity};
use crate::models::configuration::ClusterConfigurationEntity;
use crate::models::state::{ClusterState, StatusChange};
use crate::models::status::{
    ClusterStatus, ClusterStatusEntity, NOT_READY_STATUSES, RECONCILE_CANDIDATE_STATUSES,
};

/// Wire-level sentinel callers map an `InvalidArgument` retry-count error
/// to; kept because downstream consumers treat `-1` as "invalid input".
pub const RETRY_COUNT_SENTINEL: i64 = -1;

/// Query surface of the cluster inventory.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Ingest a desired-state submission, minting new cluster/configuration
    /// versions only when content changed. Byte-equal submissions return
    /// the unchanged state.
    async fn create_or_update(&self, contract: i64, cluster: &Cluster) -> Result<ClusterState>;

    /// Append a status row iff `status` differs from the state's current
    /// status; otherwise the unchanged state is returned. The caller's
    /// snapshot decides which configuration receives the status, even when
    /// that configuration has since been superseded.
    async fn update_status(
        &self,
        state: &ClusterState,
        status: ClusterStatus,
    ) -> Result<ClusterState>;

    /// Fetch the state of one specific configuration version.
    async fn get(&self, runtime_id: &str, configuration_version: i64) -> Result<ClusterState>;

    /// Fetch the latest state for a runtime.
    async fn get_latest(&self, runtime_id: &str) -> Result<ClusterState>;

    /// Hard-delete all three entity families for the runtime.
    async fn delete(&self, runtime_id: &str) -> Result<()>;

    /// Logical deletion: append a `DeletePending` status to the current
    /// configuration.
    async fn mark_for_deletion(&self, runtime_id: &str) -> Result<ClusterState>;

    /// Latest state of every runtime whose current status demands
    /// reconciliation: `ReconcilePending`/`DeletePending` always, plus
    /// `Ready`/`Deleted` whose last transition is older than
    /// `reconcile_interval`. A zero interval omits the age clause.
    async fn clusters_to_reconcile(&self, reconcile_interval: Duration)
        -> Result<Vec<ClusterState>>;

    /// Latest state of every runtime currently in an unhealthy status
    /// (`Reconciling`, `ReconcileError`, `Deleting`, `DeleteError`).
    async fn clusters_not_ready(&self) -> Result<Vec<ClusterState>>;

    /// Count retry attempts after the most recent `Ready`, inspecting at
    /// most `max_depth` timeline rows (the window bounds rows, not time).
    async fn count_retries(
        &self,
        runtime_id: &str,
        configuration_version: i64,
        max_depth: i64,
        retryable: &[ClusterStatus],
    ) -> Result<i64>;

    /// Every status row for the runtime within the trailing `window`,
    /// oldest first, including the initial `ReconcilePending`.
    async fn status_changes(&self, runtime_id: &str, window: Duration)
        -> Result<Vec<StatusChange>>;
}

enum InventoryExecutor {
    Pool(PgPool),
    Tx(SharedTransaction),
}

/// Default [`Inventory`] implementation on PostgreSQL.
pub struct ClusterInventory {
    executor: InventoryExecutor,
    metrics: Arc<dyn MetricsSink>,
}

impl ClusterInventory {
    pub fn new(conn: &DatabaseConnection, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            executor: InventoryExecutor::Pool(conn.pool().clone()),
            metrics,
        }
    }

    /// View whose every statement runs on the supplied transaction. The
    /// caller owns commit/rollback.
    pub fn with_tx(&self, tx: &SharedTransaction) -> Self {
        Self {
            executor: InventoryExecutor::Tx(tx.clone()),
            metrics: Arc::clone(&self.metrics),
        }
    }

    fn validate_runtime_id(runtime_id: &str) -> Result<()> {
        if runtime_id.is_empty() {
            return Err(InventoryError::InvalidArgument(
                "runtime ID must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// Entity-level statements. All take an explicit connection so the same
// logic serves pooled and transactional execution.
impl ClusterInventory {
    async fn latest_cluster(
        conn: &mut PgConnection,
        runtime_id: &str,
    ) -> Result<Option<ClusterEntity>> {
        let cluster = sqlx::query_as::<_, ClusterEntity>(
            r#"
            SELECT runtime_id, version, contract, metadata, runtime, created
            FROM inventory_clusters
            WHERE runtime_id = $1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(runtime_id)
        .fetch_optional(conn)
        .await?;
        Ok(cluster)
    }

    async fn cluster_by_version(
        conn: &mut PgConnection,
        runtime_id: &str,
        version: i64,
    ) -> Result<Option<ClusterEntity>> {
        let cluster = sqlx::query_as::<_, ClusterEntity>(
            r#"
            SELECT runtime_id, version, contract, metadata, runtime, created
            FROM inventory_clusters
            WHERE runtime_id = $1 AND version = $2
            "#,
        )
        .bind(runtime_id)
        .bind(version)
        .fetch_optional(conn)
        .await?;
        Ok(cluster)
    }

    async fn insert_cluster(
        conn: &mut PgConnection,
        contract: i64,
        cluster: &Cluster,
    ) -> Result<ClusterEntity> {
        let next_version = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(MAX(version), 0) + 1
            FROM inventory_clusters
            WHERE runtime_id = $1
            "#,
        )
        .bind(&cluster.runtime_id)
        .fetch_one(&mut *conn)
        .await?;

        let entity = sqlx::query_as::<_, ClusterEntity>(
            r#"
            INSERT INTO inventory_clusters (runtime_id, version, contract, metadata, runtime)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING runtime_id, version, contract, metadata, runtime, created
            "#,
        )
        .bind(&cluster.runtime_id)
        .bind(next_version)
        .bind(contract)
        .bind(&cluster.metadata)
        .bind(&cluster.runtime_input)
        .fetch_one(conn)
        .await?;

        debug!(
            runtime_id = %entity.runtime_id,
            version = entity.version,
            "minted new cluster version"
        );
        Ok(entity)
    }

    async fn latest_configuration(
        conn: &mut PgConnection,
        runtime_id: &str,
        cluster_version: i64,
    ) -> Result<Option<ClusterConfigurationEntity>> {
        let configuration = sqlx::query_as::<_, ClusterConfigurationEntity>(
            r#"
            SELECT runtime_id, version, cluster_version, contract, kyma_version,
                   kyma_profile, components, administrators, created
            FROM inventory_cluster_configurations
            WHERE runtime_id = $1 AND cluster_version = $2
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(runtime_id)
        .bind(cluster_version)
        .fetch_optional(conn)
        .await?;
        Ok(configuration)
    }

    async fn configuration_by_version(
        conn: &mut PgConnection,
        runtime_id: &str,
        version: i64,
    ) -> Result<Option<ClusterConfigurationEntity>> {
        let configuration = sqlx::query_as::<_, ClusterConfigurationEntity>(
            r#"
            SELECT runtime_id, version, cluster_version, contract, kyma_version,
                   kyma_profile, components, administrators, created
            FROM inventory_cluster_configurations
            WHERE runtime_id = $1 AND version = $2
            "#,
        )
        .bind(runtime_id)
        .bind(version)
        .fetch_optional(conn)
        .await?;
        Ok(configuration)
    }

    async fn insert_configuration(
        conn: &mut PgConnection,
        contract: i64,
        cluster_entity: &ClusterEntity,
        cluster: &Cluster,
    ) -> Result<ClusterConfigurationEntity> {
        let next_version = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(MAX(version), 0) + 1
            FROM inventory_cluster_configurations
            WHERE runtime_id = $1
            "#,
        )
        .bind(&cluster.runtime_id)
        .fetch_one(&mut *conn)
        .await?;

        let entity = sqlx::query_as::<_, ClusterConfigurationEntity>(
            r#"
            INSERT INTO inventory_cluster_configurations
                (runtime_id, version, cluster_version, contract, kyma_version,
                 kyma_profile, components, administrators)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING runtime_id, version, cluster_version, contract, kyma_version,
                      kyma_profile, components, administrators, created
            "#,
        )
        .bind(&cluster.runtime_id)
        .bind(next_version)
        .bind(cluster_entity.version)
        .bind(contract)
        .bind(&cluster.kyma_config.version)
        .bind(&cluster.kyma_config.profile)
        .bind(Json(&cluster.kyma_config.components))
        .bind(Json(&cluster.kyma_config.administrators))
        .fetch_one(conn)
        .await?;

        debug!(
            runtime_id = %entity.runtime_id,
            version = entity.version,
            cluster_version = entity.cluster_version,
            "minted new configuration version"
        );
        Ok(entity)
    }

    async fn latest_status(
        conn: &mut PgConnection,
        runtime_id: &str,
        config_version: i64,
    ) -> Result<Option<ClusterStatusEntity>> {
        let status = sqlx::query_as::<_, ClusterStatusEntity>(
            r#"
            SELECT id, runtime_id, config_version, status, created
            FROM inventory_cluster_statuses
            WHERE runtime_id = $1 AND config_version = $2
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(runtime_id)
        .bind(config_version)
        .fetch_optional(conn)
        .await?;
        Ok(status)
    }

    async fn insert_status(
        conn: &mut PgConnection,
        runtime_id: &str,
        config_version: i64,
        status: ClusterStatus,
    ) -> Result<ClusterStatusEntity> {
        let entity = sqlx::query_as::<_, ClusterStatusEntity>(
            r#"
            INSERT INTO inventory_cluster_statuses (runtime_id, config_version, status)
            VALUES ($1, $2, $3)
            RETURNING id, runtime_id, config_version, status, created
            "#,
        )
        .bind(runtime_id)
        .bind(config_version)
        .bind(status)
        .fetch_one(conn)
        .await?;
        Ok(entity)
    }
}

// State assembly and the transactional bodies of the mutating operations.
impl ClusterInventory {
    async fn state_for_configuration(
        conn: &mut PgConnection,
        configuration: ClusterConfigurationEntity,
    ) -> Result<ClusterState> {
        let runtime_id = configuration.runtime_id.clone();

        let cluster =
            Self::cluster_by_version(&mut *conn, &runtime_id, configuration.cluster_version)
                .await?
                .ok_or_else(|| InventoryError::not_found(&runtime_id))?;

        let status = Self::latest_status(&mut *conn, &runtime_id, configuration.version)
            .await?
            .ok_or_else(|| {
                InventoryError::not_found_config(&runtime_id, configuration.version)
            })?;

        Ok(ClusterState {
            cluster,
            configuration,
            status,
        })
    }

    async fn get_state(
        conn: &mut PgConnection,
        runtime_id: &str,
        configuration_version: i64,
    ) -> Result<ClusterState> {
        let configuration =
            Self::configuration_by_version(&mut *conn, runtime_id, configuration_version)
                .await?
                .ok_or_else(|| {
                    InventoryError::not_found_config(runtime_id, configuration_version)
                })?;
        Self::state_for_configuration(conn, configuration).await
    }

    async fn latest_state(conn: &mut PgConnection, runtime_id: &str) -> Result<ClusterState> {
        let cluster = Self::latest_cluster(&mut *conn, runtime_id)
            .await?
            .ok_or_else(|| InventoryError::not_found(runtime_id))?;

        let configuration = Self::latest_configuration(&mut *conn, runtime_id, cluster.version)
            .await?
            .ok_or_else(|| InventoryError::not_found(runtime_id))?;

        let status = Self::latest_status(&mut *conn, runtime_id, configuration.version)
            .await?
            .ok_or_else(|| {
                InventoryError::not_found_config(runtime_id, configuration.version)
            })?;

        Ok(ClusterState {
            cluster,
            configuration,
            status,
        })
    }

    /// Serialize concurrent writers for one runtime within the current
    /// transaction. A fresh runtime has no row to `FOR UPDATE`, so the
    /// read-then-write version minting is guarded by a transaction-scoped
    /// advisory lock keyed on the runtime ID; it is released at
    /// commit/rollback.
    async fn lock_runtime(conn: &mut PgConnection, runtime_id: &str) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
            .bind(runtime_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Transactional body of `create_or_update`. The boolean reports
    /// whether a fresh status row was appended.
    async fn create_or_update_body(
        conn: &mut PgConnection,
        contract: i64,
        cluster: &Cluster,
    ) -> Result<(ClusterState, bool)> {
        Self::lock_runtime(&mut *conn, &cluster.runtime_id).await?;

        let latest = Self::latest_cluster(&mut *conn, &cluster.runtime_id).await?;

        let cluster_entity = match latest {
            Some(existing) if existing.content_hash() == cluster.content_hash() => existing,
            _ => Self::insert_cluster(&mut *conn, contract, cluster).await?,
        };

        let existing_configuration =
            Self::latest_configuration(&mut *conn, &cluster.runtime_id, cluster_entity.version)
                .await?;

        let (configuration, fresh_configuration) = match existing_configuration {
            Some(existing)
                if existing.content_hash() == cluster.kyma_config.content_hash() =>
            {
                (existing, false)
            }
            _ => (
                Self::insert_configuration(&mut *conn, contract, &cluster_entity, cluster)
                    .await?,
                true,
            ),
        };

        let status = if fresh_configuration {
            Self::insert_status(
                &mut *conn,
                &cluster.runtime_id,
                configuration.version,
                ClusterStatus::ReconcilePending,
            )
            .await?
        } else {
            Self::latest_status(&mut *conn, &cluster.runtime_id, configuration.version)
                .await?
                .ok_or_else(|| {
                    InventoryError::not_found_config(&cluster.runtime_id, configuration.version)
                })?
        };

        Ok((
            ClusterState {
                cluster: cluster_entity,
                configuration,
                status,
            },
            fresh_configuration,
        ))
    }

    async fn update_status_body(
        conn: &mut PgConnection,
        state: &ClusterState,
        status: ClusterStatus,
    ) -> Result<ClusterState> {
        let appended = Self::insert_status(
            &mut *conn,
            &state.configuration.runtime_id,
            state.configuration.version,
            status,
        )
        .await?;

        Ok(ClusterState {
            cluster: state.cluster.clone(),
            configuration: state.configuration.clone(),
            status: appended,
        })
    }

    async fn latest_statuses_where(
        conn: &mut PgConnection,
        predicate: &str,
        threshold: Option<chrono::NaiveDateTime>,
    ) -> Result<Vec<ClusterStatusEntity>> {
        let sql = format!(
            r#"
            SELECT id, runtime_id, config_version, status, created
            FROM (
                SELECT DISTINCT ON (runtime_id)
                       id, runtime_id, config_version, status, created
                FROM inventory_cluster_statuses
                ORDER BY runtime_id, id DESC
            ) latest
            WHERE {predicate}
            ORDER BY id
            "#
        );

        let mut query = sqlx::query_as::<_, ClusterStatusEntity>(&sql);
        if let Some(threshold) = threshold {
            query = query.bind(threshold);
        }
        Ok(query.fetch_all(conn).await?)
    }

    async fn states_for_statuses(
        conn: &mut PgConnection,
        statuses: Vec<ClusterStatusEntity>,
    ) -> Result<Vec<ClusterState>> {
        let mut states = Vec::with_capacity(statuses.len());
        for status in statuses {
            states.push(
                Self::get_state(&mut *conn, &status.runtime_id, status.config_version).await?,
            );
        }
        Ok(states)
    }
}

fn quoted_status_list(statuses: &[ClusterStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl Inventory for ClusterInventory {
    async fn create_or_update(&self, contract: i64, cluster: &Cluster) -> Result<ClusterState> {
        Self::validate_runtime_id(&cluster.runtime_id)?;

        let (state, fresh_status) = match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut tx = pool.begin().await?;
                let result = Self::create_or_update_body(&mut tx, contract, cluster).await?;
                tx.commit().await?;
                result
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                Self::create_or_update_body(guard.connection()?, contract, cluster).await?
            }
        };

        if fresh_status {
            self.metrics.on_state_change(None, &state);
        }
        Ok(state)
    }

    async fn update_status(
        &self,
        state: &ClusterState,
        status: ClusterStatus,
    ) -> Result<ClusterState> {
        if state.status.status == status {
            return Ok(state.clone());
        }

        let new_state = match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut tx = pool.begin().await?;
                let new_state = Self::update_status_body(&mut tx, state, status).await?;
                tx.commit().await?;
                new_state
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                Self::update_status_body(guard.connection()?, state, status).await?
            }
        };

        self.metrics.on_state_change(Some(state), &new_state);
        Ok(new_state)
    }

    async fn get(&self, runtime_id: &str, configuration_version: i64) -> Result<ClusterState> {
        Self::validate_runtime_id(runtime_id)?;
        match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                Self::get_state(&mut conn, runtime_id, configuration_version).await
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                Self::get_state(guard.connection()?, runtime_id, configuration_version).await
            }
        }
    }

    async fn get_latest(&self, runtime_id: &str) -> Result<ClusterState> {
        Self::validate_runtime_id(runtime_id)?;
        match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                Self::latest_state(&mut conn, runtime_id).await
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                Self::latest_state(guard.connection()?, runtime_id).await
            }
        }
    }

    async fn delete(&self, runtime_id: &str) -> Result<()> {
        Self::validate_runtime_id(runtime_id)?;

        // Configurations and statuses cascade from the cluster rows.
        let delete = sqlx::query("DELETE FROM inventory_clusters WHERE runtime_id = $1");

        let deleted = match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut tx = pool.begin().await?;
                let result = delete.bind(runtime_id).execute(&mut *tx).await?;
                tx.commit().await?;
                result.rows_affected()
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                delete
                    .bind(runtime_id)
                    .execute(guard.connection()?)
                    .await?
                    .rows_affected()
            }
        };

        if deleted == 0 {
            return Err(InventoryError::not_found(runtime_id));
        }
        debug!(runtime_id, rows = deleted, "deleted cluster");
        Ok(())
    }

    async fn mark_for_deletion(&self, runtime_id: &str) -> Result<ClusterState> {
        Self::validate_runtime_id(runtime_id)?;

        let (old_state, new_state) = match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut tx = pool.begin().await?;
                let old_state = Self::latest_state(&mut tx, runtime_id).await?;
                let new_state = if old_state.status.status == ClusterStatus::DeletePending {
                    old_state.clone()
                } else {
                    Self::update_status_body(&mut tx, &old_state, ClusterStatus::DeletePending)
                        .await?
                };
                tx.commit().await?;
                (old_state, new_state)
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.connection()?;
                let old_state = Self::latest_state(&mut *conn, runtime_id).await?;
                let new_state = if old_state.status.status == ClusterStatus::DeletePending {
                    old_state.clone()
                } else {
                    Self::update_status_body(&mut *conn, &old_state, ClusterStatus::DeletePending)
                        .await?
                };
                (old_state, new_state)
            }
        };

        if old_state.status.id != new_state.status.id {
            self.metrics.on_state_change(Some(&old_state), &new_state);
        }
        Ok(new_state)
    }

    async fn clusters_to_reconcile(
        &self,
        reconcile_interval: Duration,
    ) -> Result<Vec<ClusterState>> {
        let mut predicate = format!(
            "latest.status IN ({})",
            quoted_status_list(&RECONCILE_CANDIDATE_STATUSES)
        );
        let mut threshold = None;
        if reconcile_interval > Duration::zero() {
            predicate.push_str(&format!(
                " OR (latest.status IN ({}) AND latest.created < $1)",
                quoted_status_list(&crate::models::status::AGE_TRIGGERED_STATUSES)
            ));
            threshold = Some(Utc::now().naive_utc() - reconcile_interval);
        }

        match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                let statuses =
                    Self::latest_statuses_where(&mut conn, &predicate, threshold).await?;
                Self::states_for_statuses(&mut conn, statuses).await
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.connection()?;
                let statuses =
                    Self::latest_statuses_where(&mut *conn, &predicate, threshold).await?;
                Self::states_for_statuses(&mut *conn, statuses).await
            }
        }
    }

    async fn clusters_not_ready(&self) -> Result<Vec<ClusterState>> {
        let predicate = format!(
            "latest.status IN ({})",
            quoted_status_list(&NOT_READY_STATUSES)
        );

        match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                let statuses = Self::latest_statuses_where(&mut conn, &predicate, None).await?;
                Self::states_for_statuses(&mut conn, statuses).await
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard.connection()?;
                let statuses = Self::latest_statuses_where(&mut *conn, &predicate, None).await?;
                Self::states_for_statuses(&mut *conn, statuses).await
            }
        }
    }

    async fn count_retries(
        &self,
        runtime_id: &str,
        configuration_version: i64,
        max_depth: i64,
        retryable: &[ClusterStatus],
    ) -> Result<i64> {
        Self::validate_runtime_id(runtime_id)?;
        if retryable.is_empty() {
            return Err(InventoryError::InvalidArgument(
                "at least one retryable status is required".to_string(),
            ));
        }

        let query = sqlx::query_as::<_, ClusterStatusEntity>(
            r#"
            SELECT id, runtime_id, config_version, status, created
            FROM inventory_cluster_statuses
            WHERE runtime_id = $1 AND config_version = $2
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(runtime_id)
        .bind(configuration_version)
        .bind(max_depth);

        let timeline = match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                query.fetch_all(&mut *conn).await?
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(guard.connection()?).await?
            }
        };

        Ok(retries::count_retries(&timeline, retryable))
    }

    async fn status_changes(
        &self,
        runtime_id: &str,
        window: Duration,
    ) -> Result<Vec<StatusChange>> {
        Self::validate_runtime_id(runtime_id)?;
        let threshold = Utc::now().naive_utc() - window;

        let query = sqlx::query_as::<_, ClusterStatusEntity>(
            r#"
            SELECT id, runtime_id, config_version, status, created
            FROM inventory_cluster_statuses
            WHERE runtime_id = $1 AND created >= $2
            ORDER BY id
            "#,
        )
        .bind(runtime_id)
        .bind(threshold);

        let statuses = match &self.executor {
            InventoryExecutor::Pool(pool) => {
                let mut conn = pool.acquire().await?;
                query.fetch_all(&mut *conn).await?
            }
            InventoryExecutor::Tx(tx) => {
                let mut guard = tx.lock().await;
                query.fetch_all(guard.connection()?).await?
            }
        };

        Ok(statuses
            .into_iter()
            .map(|status| StatusChange { status })
            .collect())
    }
}
