//! Query executor seam: `(statement, positional params) -> rows`.
//!
//! The repository layer only ever talks to a `QueryExecutor`, so the same generated
//! stack runs against PostgreSQL in production and an in-memory double in tests.

mod postgres;

pub use postgres::PgExecutor;

use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;

/// One row, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run one statement. Errors propagate unchanged to the caller.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Record>, StorageError>;
}
