//! Fetch entry points.
//!
//! A [`Fetcher`] pairs a [`Planner`] with a [`StatementExecutor`]. Every
//! statement of a fetch is compiled before the primary statement runs, so
//! planning errors never cause partial execution.
//!
//! ```rust,ignore
//! let user = fetcher
//!     .fetch_one("User")
//!     .r#where(Filter::equals("id", 1))
//!     .populate("lastDocument")
//!     .exec()
//!     .await?;
//! ```

mod fetch_many;
mod fetch_one;

pub use fetch_many::FetchManyOperation;
pub use fetch_one::FetchOneOperation;

use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use crate::assembler::RowAssembler;
use crate::compiler::QueryScope;
use crate::dispatch::FollowUpDispatcher;
use crate::error::QueryResult;
use crate::executor::{StatementExecutor, execute_cancellable};
use crate::filter::Filter;
use crate::filter_registry::{FilterArgs, FilterOverrides};
use crate::planner::Planner;
use crate::record::Record;
use crate::relations::PopulatePath;
use crate::types::OrderByField;

/// Per-call options of a fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Dotted relation paths to populate.
    pub populate: Vec<String>,
    /// Filter overrides for every alias.
    pub filters: FilterOverrides,
    /// Filter overrides for one relation path.
    pub populate_filters: IndexMap<String, FilterOverrides>,
    /// Ordering on root columns.
    pub order_by: Vec<OrderByField>,
    /// Maximum number of roots.
    pub take: Option<u64>,
    /// Roots to skip.
    pub skip: Option<u64>,
    /// Token that aborts the whole fetch.
    pub cancellation: Option<CancellationToken>,
}

impl FetchOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate a relation path.
    pub fn populate(mut self, path: impl Into<String>) -> Self {
        self.populate.push(path.into());
        self
    }

    /// Enable a filter.
    pub fn enable_filter(mut self, name: impl Into<String>) -> Self {
        self.filters = self.filters.enable(name);
        self
    }

    /// Disable a filter.
    pub fn disable_filter(mut self, name: impl Into<String>) -> Self {
        self.filters = self.filters.disable(name);
        self
    }

    /// Enable a parameterized filter with arguments.
    pub fn filter_args(mut self, name: impl Into<String>, args: FilterArgs) -> Self {
        self.filters = self.filters.with_args(name, args);
        self
    }

    /// Overrides for one relation path, layered over the call-wide ones.
    pub fn populate_filter(mut self, path: impl Into<String>, overrides: FilterOverrides) -> Self {
        self.populate_filters.insert(path.into(), overrides);
        self
    }

    /// Order roots by a column.
    pub fn order_by(mut self, field: OrderByField) -> Self {
        self.order_by.push(field);
        self
    }

    /// Limit the number of roots.
    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    /// Skip roots.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Abort the fetch when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn scope(&self, criteria: Filter) -> QueryScope {
        QueryScope {
            criteria,
            filters: self.filters.clone(),
            populate_filters: self.populate_filters.clone(),
            order_by: self.order_by.clone(),
            take: self.take,
            skip: self.skip,
        }
    }
}

/// Runs fetches against an executor.
#[derive(Debug, Clone)]
pub struct Fetcher<E> {
    planner: Planner,
    executor: E,
}

impl<E: StatementExecutor> Fetcher<E> {
    /// Create a fetcher.
    pub fn new(planner: Planner, executor: E) -> Self {
        Self { planner, executor }
    }

    /// The planner.
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// The executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Start a single-root fetch.
    pub fn fetch_one(&self, root: impl Into<String>) -> FetchOneOperation<'_, E> {
        FetchOneOperation::new(self, root.into())
    }

    /// Start a multi-root fetch.
    pub fn fetch_many(&self, root: impl Into<String>) -> FetchManyOperation<'_, E> {
        FetchManyOperation::new(self, root.into())
    }

    /// Fetch the first root matching `criteria` with its populated relations.
    ///
    /// `None` only when the criteria match no row; filtered-out or missing
    /// relations never hide the root.
    pub async fn fetch_one_with(&self, root: &str, criteria: Filter, options: FetchOptions) -> QueryResult<Option<Record>> {
        let options = FetchOptions {
            take: Some(1),
            ..options
        };
        let mut records = self.fetch_many_with(root, criteria, options).await?;
        Ok(if records.is_empty() { None } else { Some(records.swap_remove(0)) })
    }

    /// Fetch every root matching `criteria` with its populated relations.
    pub async fn fetch_many_with(&self, root: &str, criteria: Filter, options: FetchOptions) -> QueryResult<Vec<Record>> {
        let span = info_span!("fetch", root = %root, populate = options.populate.len());
        self.run(root, criteria, options).instrument(span).await
    }

    async fn run(&self, root: &str, criteria: Filter, options: FetchOptions) -> QueryResult<Vec<Record>> {
        let populate = options
            .populate
            .iter()
            .map(|path| PopulatePath::parse(path))
            .collect::<QueryResult<Vec<_>>>()?;
        let compiled = self.planner.compile(root, &populate, &options.scope(criteria))?;
        let cancellation = options.cancellation.unwrap_or_default();

        let primary = compiled.primary();
        self.planner.log_statement(&primary.statement);
        let rows = execute_cancellable(&self.executor, &primary.statement, &cancellation).await?;
        let mut records = RowAssembler::new(primary).assemble(&rows)?;

        FollowUpDispatcher::new(&self.executor, &self.planner.config().loading, &cancellation)
            .with_planner(&self.planner)
            .dispatch(&compiled, &mut records)
            .await?;

        debug!(
            records = records.len(),
            statements = compiled.statements.len(),
            "Fetch complete"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::error::ErrorCode;
    use crate::executor::MemoryExecutor;
    use crate::fixtures;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fetcher(executor: MemoryExecutor) -> Fetcher<MemoryExecutor> {
        let planner = Planner::new(fixtures::metadata(), fixtures::filters(), PlannerConfig::default()).unwrap();
        Fetcher::new(planner, executor)
    }

    fn data() -> MemoryExecutor {
        MemoryExecutor::new()
            .with_json(
                "users",
                json!({"id": 1, "name": "Ada", "account_id": 1, "last_document_id": 1, "manager_id": null}),
            )
            .with_json("accounts", json!({"id": 1, "name": "Acme", "owner_id": null}))
            .with_json("documents", json!({"id": 1, "title": "Draft", "deleted": true, "author_id": 1}))
    }

    #[tokio::test]
    async fn test_fetch_one_with_filtered_relation() {
        let fetcher = fetcher(data());
        let user = fetcher
            .fetch_one_with("User", Filter::equals("id", 1i64), FetchOptions::new().populate("lastDocument"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            user.to_json(),
            json!({
                "id": 1, "name": "Ada", "account_id": 1, "last_document_id": 1, "manager_id": null,
                "account": {"id": 1, "name": "Acme", "owner_id": null},
                "lastDocument": null
            })
        );
    }

    #[tokio::test]
    async fn test_fetch_one_no_match() {
        let fetcher = fetcher(data());
        let user = fetcher
            .fetch_one_with("User", Filter::equals("id", 2i64), FetchOptions::new())
            .await
            .unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_invalid_populate_fails_before_execution() {
        let executor = data();
        let fetcher = fetcher(executor.clone());
        let err = fetcher
            .fetch_one_with("User", Filter::None, FetchOptions::new().populate("lastDocument..author"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPopulate);
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_one_takes_single_row() {
        let fetcher = fetcher(data());
        fetcher.fetch_one_with("User", Filter::None, FetchOptions::new()).await.unwrap();
        assert_eq!(fetcher.executor().executed()[0].limit, Some(1));
        assert!(fetcher.executor().executed()[0].where_clause.is_empty());
    }
}
