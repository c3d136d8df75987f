//! Scoped transactions with rollback-on-error semantics.
//!
//! All multi-entity writes go through [`transaction`]: the body runs inside
//! a fresh transaction, a successful return commits, any error rolls back.
//! A body that explicitly rolled back (via [`SharedTransaction::rollback`])
//! still surfaces a [`TransactionAborted`](crate::InventoryError::TransactionAborted)
//! error to the outer caller.

use std::future::Future;
use std::sync::Arc;

use sqlx::{PgConnection, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::database::DatabaseConnection;
use crate::error::{InventoryError, Result};

/// A transaction handle that can be shared with inventory views
/// (`Inventory::with_tx`) and with the transaction body itself.
///
/// The inner transaction lives behind a mutex so that one connection is
/// used for all statements issued through the handle. Once committed or
/// rolled back the slot is empty and every further use fails with
/// `TransactionAborted`.
#[derive(Clone)]
pub struct SharedTransaction {
    inner: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl SharedTransaction {
    pub(crate) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Begin a transaction on the given handle without the scoped
    /// combinator. The caller owns commit/rollback.
    pub async fn begin(conn: &DatabaseConnection) -> Result<Self> {
        Ok(Self::new(conn.pool().begin().await?))
    }

    pub(crate) async fn lock(&self) -> TransactionGuard<'_> {
        TransactionGuard {
            guard: self.inner.lock().await,
        }
    }

    /// Explicitly roll back. Subsequent statements through this handle and
    /// the outer [`transaction`] commit both fail with `TransactionAborted`.
    pub async fn rollback(&self) -> Result<()> {
        let tx = self.take("rollback").await?;
        tx.rollback().await?;
        debug!("transaction explicitly rolled back");
        Ok(())
    }

    /// Commit the transaction. Fails with `TransactionAborted` when the
    /// body already rolled back; rollback-already-done is a reportable
    /// condition, not a silent success.
    pub async fn commit(&self) -> Result<()> {
        let tx = self.take("commit").await?;
        tx.commit().await?;
        Ok(())
    }

    async fn take(&self, op: &str) -> Result<Transaction<'static, Postgres>> {
        self.inner.lock().await.take().ok_or_else(|| {
            InventoryError::TransactionAborted(format!(
                "cannot {op}: transaction was already completed or rolled back"
            ))
        })
    }

    async fn rollback_if_open(&self) {
        if let Some(tx) = self.inner.lock().await.take() {
            if let Err(err) = tx.rollback().await {
                warn!(error = %err, "rollback after failed transaction body failed");
            }
        }
    }
}

/// Mutex guard over the shared transaction, yielding the underlying
/// connection for statement execution.
pub(crate) struct TransactionGuard<'a> {
    guard: MutexGuard<'a, Option<Transaction<'static, Postgres>>>,
}

impl TransactionGuard<'_> {
    pub(crate) fn connection(&mut self) -> Result<&mut PgConnection> {
        self.guard
            .as_deref_mut()
            .ok_or_else(|| {
                InventoryError::TransactionAborted(
                    "transaction was already completed or rolled back".to_string(),
                )
            })
    }
}

/// Run `body` inside a fresh transaction on `conn`.
///
/// Commits on `Ok`, rolls back on `Err`. The body receives a
/// [`SharedTransaction`] it can hand to `Inventory::with_tx` so that all
/// inventory writes run on the same transaction.
pub async fn transaction<T, F, Fut>(conn: &DatabaseConnection, body: F) -> Result<T>
where
    F: FnOnce(SharedTransaction) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let shared = SharedTransaction::new(conn.pool().begin().await?);

    match body(shared.clone()).await {
        Ok(value) => {
            shared.commit().await?;
            Ok(value)
        }
        Err(err) => {
            shared.rollback_if_open().await;
            Err(err)
        }
    }
}
