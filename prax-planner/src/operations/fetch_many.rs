//! Multi-root fetch operation.

use tokio_util::sync::CancellationToken;

use crate::error::QueryResult;
use crate::executor::StatementExecutor;
use crate::filter::Filter;
use crate::filter_registry::{FilterArgs, FilterOverrides};
use crate::record::Record;
use crate::types::OrderByField;

use super::{FetchOptions, Fetcher};

/// Fetches every root matching the criteria.
pub struct FetchManyOperation<'f, E> {
    fetcher: &'f Fetcher<E>,
    root: String,
    criteria: Filter,
    options: FetchOptions,
}

impl<'f, E: StatementExecutor> FetchManyOperation<'f, E> {
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

    /// Order roots.
    pub fn order_by(mut self, field: OrderByField) -> Self {
        self.options = self.options.order_by(field);
        self
    }

    /// Limit the number of roots.
    pub fn take(mut self, take: u64) -> Self {
        self.options = self.options.take(take);
        self
    }

    /// Skip roots.
    pub fn skip(mut self, skip: u64) -> Self {
        self.options = self.options.skip(skip);
        self
    }

    /// Abort when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.options = self.options.cancel_on(token);
        self
    }

    /// Execute and return the matching roots.
    pub async fn exec(self) -> QueryResult<Vec<Record>> {
        self.fetcher
            .fetch_many_with(&self.root, self.criteria, self.options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::executor::MemoryExecutor;
    use crate::filter::FilterValue;
    use crate::fixtures;
    use crate::planner::Planner;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fetcher() -> Fetcher<MemoryExecutor> {
        let planner = Planner::new(fixtures::metadata(), fixtures::filters(), PlannerConfig::default()).unwrap();
        let executor = MemoryExecutor::new()
            .with_json(
                "users",
                json!([
                    {"id": 1, "name": "Ada", "account_id": 1, "last_document_id": 2, "manager_id": null},
                    {"id": 2, "name": "Brendan", "account_id": 1, "last_document_id": 1, "manager_id": 1},
                    {"id": 3, "name": "Cleo", "account_id": 1, "last_document_id": null, "manager_id": 1}
                ]),
            )
            .with_json("accounts", json!({"id": 1, "name": "Acme", "owner_id": 1}))
            .with_json(
                "documents",
                json!([
                    {"id": 1, "title": "Draft", "deleted": false, "author_id": 2},
                    {"id": 2, "title": "Trash", "deleted": true, "author_id": 1}
                ]),
            );
        Fetcher::new(planner, executor)
    }

    fn names(records: &[Record]) -> Vec<FilterValue> {
        records.iter().filter_map(|r| r.get("name").cloned()).collect()
    }

    #[tokio::test]
    async fn test_builder_order_and_paging() {
        let fetcher = fetcher();
        let users = fetcher
            .fetch_many("User")
            .order_by(OrderByField::desc("id"))
            .skip(1)
            .take(1)
            .exec()
            .await
            .unwrap();
        assert_eq!(names(&users), vec![FilterValue::from("Brendan")]);
    }

    #[tokio::test]
    async fn test_filtered_relation_never_drops_roots() {
        let fetcher = fetcher();
        let users = fetcher
            .fetch_many("User")
            .r#where(Filter::equals("account_id", 1i64))
            .populate("lastDocument")
            .exec()
            .await
            .unwrap();

        assert_eq!(users.len(), 3);
        assert!(users[0].one("lastDocument").is_none());
        assert!(users[1].one("lastDocument").is_some());
        assert!(users[2].one("lastDocument").is_none());
    }

    #[tokio::test]
    async fn test_populate_filter_override() {
        let fetcher = fetcher();
        let users = fetcher
            .fetch_many("User")
            .populate("lastDocument")
            .populate_filter("lastDocument", FilterOverrides::new().disable("notDeleted"))
            .exec()
            .await
            .unwrap();
        let title = users[0].one("lastDocument").and_then(|d| d.get("title")).cloned();
        assert_eq!(title, Some(FilterValue::from("Trash")));
    }
}
