//! The statement execution boundary.
//!
//! Drivers implement [`StatementExecutor`]: they receive a dialect-neutral
//! [`SelectStatement`] (usually rendered with [`SelectStatement::to_sql`]) and
//! return [`Row`]s keyed by alias and column. Executor errors are propagated
//! unchanged; the planner never retries.

mod memory;

pub use memory::MemoryExecutor;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::compiler::SelectStatement;
use crate::error::{QueryError, QueryResult};
use crate::row::Row;

/// Executes compiled statements.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute a statement and return every row it produces.
    ///
    /// Each row must carry every selected column, with NULLs for unmatched
    /// LEFT joins.
    async fn execute(&self, statement: &SelectStatement) -> QueryResult<Vec<Row>>;
}

#[async_trait]
impl<T: StatementExecutor + ?Sized> StatementExecutor for Arc<T> {
    async fn execute(&self, statement: &SelectStatement) -> QueryResult<Vec<Row>> {
        (**self).execute(statement).await
    }
}

#[async_trait]
impl<T: StatementExecutor + ?Sized> StatementExecutor for &T {
    async fn execute(&self, statement: &SelectStatement) -> QueryResult<Vec<Row>> {
        (**self).execute(statement).await
    }
}

/// Execute a statement, racing it against a cancellation token.
///
/// Cancellation wins when both are ready.
pub async fn execute_cancellable<E>(
    executor: &E,
    statement: &SelectStatement,
    cancellation: &CancellationToken,
) -> QueryResult<Vec<Row>>
where
    E: StatementExecutor + ?Sized,
{
    if cancellation.is_cancelled() {
        return Err(QueryError::cancelled());
    }

    debug!(
        table = %statement.from.table,
        joins = statement.joins.len(),
        keys = statement.bound_keys().len(),
        "Executing statement"
    );

    tokio::select! {
        biased;
        _ = cancellation.cancelled() => Err(QueryError::cancelled()),
        rows = executor.execute(statement) => rows,
    }
}
