//! Persistence handle: pooled connections and scoped transactions.

pub mod connection;
pub mod transaction;

pub use connection::DatabaseConnection;
pub use transaction::{transaction, SharedTransaction};
