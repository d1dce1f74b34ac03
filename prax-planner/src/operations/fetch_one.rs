//! Single-root fetch operation.

use tokio_util::sync::CancellationToken;

use crate::error::QueryResult;
use crate::executor::StatementExecutor;
use crate::filter::Filter;
use crate::filter_registry::{FilterArgs, FilterOverrides};
use crate::record::Record;
use crate::types::OrderByField;

use super::{FetchOptions, Fetcher};

/// Fetches the first root matching the criteria.
///
/// # Example
///
/// ```rust,ignore
/// let user = fetcher
///     .fetch_one("User")
///     .r#where(Filter::equals("id", 1))
///     .populate("lastDocument")
///     .disable_filter("notDeleted")
///     .exec()
///     .await?;
/// ```
pub struct FetchOneOperation<'f, E> {
    fetcher: &'f Fetcher<E>,
    root: String,
    criteria: Filter,
    options: FetchOptions,
}

impl<'f, E: StatementExecutor> FetchOneOperation<'f, E> {
    pub(crate) fn new(fetcher: &'f Fetcher<E>, root: String) -> Self {
        Self {
            fetcher,
            root,
            criteria: Filter::None,
            options: FetchOptions::default(),
        }
    }

    /// Add a condition on root columns.
    pub fn r#where(mut self, filter: impl Into<Filter>) -> Self {
        self.criteria = std::mem::take(&mut self.criteria).and_then(filter.into());
        self
    }

    /// Populate a relation path.
    pub fn populate(mut self, path: impl Into<String>) -> Self {
        self.options = self.options.populate(path);
        self
    }

    /// Enable a filter for this fetch.
    pub fn enable_filter(mut self, name: impl Into<String>) -> Self {
        self.options = self.options.enable_filter(name);
        self
    }

    /// Disable a filter for this fetch.
    pub fn disable_filter(mut self, name: impl Into<String>) -> Self {
        self.options = self.options.disable_filter(name);
        self
    }

    /// Enable a parameterized filter with arguments.
    pub fn filter_args(mut self, name: impl Into<String>, args: FilterArgs) -> Self {
        self.options = self.options.filter_args(name, args);
        self
    }

    /// Filter overrides for one populated path.
    pub fn populate_filter(mut self, path: impl Into<String>, overrides: FilterOverrides) -> Self {
        self.options = self.options.populate_filter(path, overrides);
        self
    }

    /// Order candidate roots; the first one wins.
    pub fn order_by(mut self, field: OrderByField) -> Self {
        self.options = self.options.order_by(field);
        self
    }

    /// Skip candidate roots.
    pub fn skip(mut self, skip: u64) -> Self {
        self.options = self.options.skip(skip);
        self
    }

    /// Abort when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.options = self.options.cancel_on(token);
        self
    }

    /// Execute and return the root, or `None` when nothing matches.
    pub async fn exec(self) -> QueryResult<Option<Record>> {
        self.fetcher
            .fetch_one_with(&self.root, self.criteria, self.options)
            .await
    }
}
