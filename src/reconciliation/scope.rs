//! Scoped query builder over the reconciliation ledger.
//!
//! Filters push their fragments here in declaration order; the scope takes
//! care of `WHERE`/`AND` glue and parameter binding.

use sqlx::postgres::Postgres;
use sqlx::{PgPool, QueryBuilder};

use crate::error::Result;
use crate::models::reconciliation::ReconciliationEntity;

const BASE_SELECT: &str = "SELECT scheduling_id, runtime_id, cluster_config, \
     cluster_config_status, status, finished, created FROM scheduler_reconciliations";

/// Builder for persistent selections over `scheduler_reconciliations`.
pub struct ReconciliationScope {
    query: QueryBuilder<'static, Postgres>,
    has_conditions: bool,
}

impl ReconciliationScope {
    pub fn new() -> Self {
        Self {
            query: QueryBuilder::new(BASE_SELECT),
            has_conditions: false,
        }
    }

    /// Open a new condition, prefixing `WHERE`/`AND` as needed, and push
    /// the given SQL fragment.
    pub fn add_condition(&mut self, condition: &str) {
        if self.has_conditions {
            self.query.push(" AND ");
        } else {
            self.query.push(" WHERE ");
            self.has_conditions = true;
        }
        self.query.push(condition);
    }

    /// Continue the current fragment with raw SQL.
    pub fn push(&mut self, sql: &str) {
        self.query.push(sql);
    }

    /// Bind a parameter at the current position.
    pub fn push_bind<T>(&mut self, value: T)
    where
        T: 'static + Send + sqlx::Encode<'static, Postgres> + sqlx::Type<Postgres>,
    {
        self.query.push_bind(value);
    }

    /// Deterministic ordering by creation time, newest first.
    pub fn order_by_created_desc(&mut self) {
        self.query.push(" ORDER BY created DESC");
    }

    pub fn limit(&mut self, count: i64) {
        self.query.push(" LIMIT ");
        self.query.push_bind(count);
    }

    pub async fn fetch_all(mut self, pool: &PgPool) -> Result<Vec<ReconciliationEntity>> {
        let rows = self
            .query
            .build_query_as::<ReconciliationEntity>()
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    #[cfg(test)]
    pub(crate) fn sql(&self) -> &str {
        self.query.sql()
    }
}

impl Default for ReconciliationScope {
    fn default() -> Self {
        Self::new()
    }
}
