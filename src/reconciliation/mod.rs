//! # Reconciliation Ledger
//!
//! Persistence surface for scheduled reconciliation runs and the composable
//! filter algebra selecting over them. Filters evaluate in two coherent
//! modes: against the persistent query builder and against materialized
//! instances; see [`filters`].

pub mod filters;
pub mod scope;

use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::database::DatabaseConnection;
use crate::error::{InventoryError, Result};
use crate::models::reconciliation::ReconciliationEntity;
use crate::models::state::ClusterState;

use self::filters::Filter;
use self::scope::ReconciliationScope;

/// Store of reconciliation runs; one unfinished run per runtime at a time.
pub struct ReconciliationRepository {
    pool: PgPool,
}

impl ReconciliationRepository {
    pub fn new(conn: &DatabaseConnection) -> Self {
        Self {
            pool: conn.pool().clone(),
        }
    }

    /// Schedule a reconciliation run for the given cluster state. Fails
    /// with `TransactionAborted` when an unfinished run already exists for
    /// the runtime.
    pub async fn create_reconciliation(
        &self,
        state: &ClusterState,
    ) -> Result<ReconciliationEntity> {
        let scheduling_id = format!("{}--{}", state.cluster.runtime_id, Uuid::new_v4());

        let result = sqlx::query_as::<_, ReconciliationEntity>(
            r#"
            INSERT INTO scheduler_reconciliations
                (scheduling_id, runtime_id, cluster_config, cluster_config_status, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING scheduling_id, runtime_id, cluster_config, cluster_config_status,
                      status, finished, created
            "#,
        )
        .bind(&scheduling_id)
        .bind(&state.cluster.runtime_id)
        .bind(state.configuration.version)
        .bind(state.status.id)
        .bind(state.status.status)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(entity) => {
                debug!(
                    scheduling_id = %entity.scheduling_id,
                    runtime_id = %entity.runtime_id,
                    "scheduled reconciliation"
                );
                Ok(entity)
            }
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
                Err(InventoryError::TransactionAborted(format!(
                    "unfinished reconciliation already exists for runtime '{}'",
                    state.cluster.runtime_id
                )))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch reconciliations matching the filter; `None` returns the whole
    /// ledger.
    pub async fn get_reconciliations(
        &self,
        filter: Option<&dyn Filter>,
    ) -> Result<Vec<ReconciliationEntity>> {
        let mut scope = ReconciliationScope::new();
        if let Some(filter) = filter {
            filter.filter_by_query(&mut scope)?;
        }
        scope.fetch_all(&self.pool).await
    }

    /// Mark a run as finished. Fails with `NotFound` when no unfinished run
    /// with this scheduling ID exists.
    pub async fn finish_reconciliation(&self, scheduling_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE scheduler_reconciliations
            SET finished = TRUE
            WHERE scheduling_id = $1 AND NOT finished
            "#,
        )
        .bind(scheduling_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InventoryError::NotFound {
                runtime_id: scheduling_id.to_string(),
                configuration_version: None,
            });
        }
        Ok(())
    }

    /// Drop every ledger row of a runtime (used after hard deletion).
    pub async fn remove_reconciliations(&self, runtime_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM scheduler_reconciliations WHERE runtime_id = $1")
            .bind(runtime_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
