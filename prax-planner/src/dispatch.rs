//! SELECT-IN follow-up loading.
//!
//! Follow-up groups run in waves: a SELECT-IN relation whose owner is loaded
//! by another follow-up runs one wave later. Within a wave, key chunks of
//! every group execute concurrently. Results only ever attach to owners;
//! the root set is never re-filtered.

use futures::stream::{self, StreamExt, TryStreamExt};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::assembler::RowAssembler;
use crate::compiler::{CompiledPlan, SelectStatement};
use crate::config::LoadingConfig;
use crate::error::QueryResult;
use crate::executor::{StatementExecutor, execute_cancellable};
use crate::filter::FilterValue;
use crate::metadata::Cardinality;
use crate::planner::Planner;
use crate::record::{Record, Related, for_each_at_path, for_each_at_path_mut};
use crate::row::{KeyValue, Row};

/// Loads the SELECT-IN relations of a compiled plan onto assembled roots.
pub struct FollowUpDispatcher<'a, E: ?Sized> {
    executor: &'a E,
    planner: Option<&'a Planner>,
    batch_size: usize,
    max_concurrency: usize,
    cancellation: &'a CancellationToken,
}

impl<'a, E: StatementExecutor + ?Sized> FollowUpDispatcher<'a, E> {
    /// Create a dispatcher with the `[loading]` limits.
    pub fn new(executor: &'a E, loading: &LoadingConfig, cancellation: &'a CancellationToken) -> Self {
        Self {
            executor,
            planner: None,
            batch_size: loading.batch_size.max(1),
            max_concurrency: loading.max_concurrency.max(1),
            cancellation,
        }
    }

    /// Log rendered statements through the planner's debug settings.
    pub fn with_planner(mut self, planner: &'a Planner) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Run every follow-up wave and attach the results to `roots`.
    pub async fn dispatch(&self, compiled: &CompiledPlan, roots: &mut [Record]) -> QueryResult<()> {
        for (wave, groups) in compiled.plan.waves().into_iter().enumerate() {
            let mut batches: Vec<(usize, SelectStatement)> = Vec::new();
            for &group in &groups {
                let keys = self.collect_keys(compiled, group, roots);
                let template = &compiled.statement(group).statement;
                for chunk in keys.chunks(self.batch_size) {
                    let mut statement = template.clone();
                    statement.bind_keys(chunk.to_vec());
                    batches.push((group, statement));
                }
            }

            debug!(
                wave = wave + 1,
                groups = groups.len(),
                statements = batches.len(),
                "Dispatching follow-up wave"
            );

            let results = self.execute_all(batches).await?;

            let mut rows_by_group: IndexMap<usize, Vec<Row>> = groups.iter().map(|&g| (g, Vec::new())).collect();
            for (group, rows) in results {
                rows_by_group.entry(group).or_default().extend(rows);
            }
            for (group, rows) in rows_by_group {
                self.attach(compiled, group, &rows, roots)?;
            }
        }
        Ok(())
    }

    async fn execute_all(&self, batches: Vec<(usize, SelectStatement)>) -> QueryResult<Vec<(usize, Vec<Row>)>> {
        let executor = self.executor;
        let cancellation = self.cancellation;
        let planner = self.planner;

        stream::iter(batches)
            .map(|(group, statement)| async move {
                if let Some(planner) = planner {
                    planner.log_statement(&statement);
                }
                execute_cancellable(executor, &statement, cancellation)
                    .await
                    .map(|rows| (group, rows))
            })
            .buffered(self.max_concurrency)
            .try_collect()
            .await
    }

    /// Distinct non-NULL owner keys, in first-seen order.
    fn collect_keys(&self, compiled: &CompiledPlan, group: usize, roots: &[Record]) -> Vec<FilterValue> {
        let Some(root) = compiled.plan.groups[group].root else {
            return Vec::new();
        };
        let relation = &compiled.plan.relation(root).node.relation;
        let path = owner_path(compiled, root);

        let mut keys: IndexMap<KeyValue, FilterValue> = IndexMap::new();
        for_each_at_path(roots, &path, &mut |owner: &Record| {
            if let Some(value) = owner.get(relation.local()) {
                if let Some(key) = KeyValue::from_value(value) {
                    keys.entry(key).or_insert_with(|| value.clone());
                }
            }
        });
        keys.into_values().collect()
    }

    fn attach(&self, compiled: &CompiledPlan, group: usize, rows: &[Row], roots: &mut [Record]) -> QueryResult<()> {
        let Some(root) = compiled.plan.groups[group].root else {
            return Ok(());
        };
        let planned = compiled.plan.relation(root);
        let relation = &planned.node.relation;

        let mut by_key: IndexMap<KeyValue, Vec<Record>> = IndexMap::new();
        for record in RowAssembler::new(compiled.statement(group)).assemble(rows)? {
            if let Some(key) = record.key(relation.remote()) {
                by_key.entry(key).or_default().push(record);
            }
        }

        let path = owner_path(compiled, root);
        let mut owners = 0usize;
        for_each_at_path_mut(roots, &path, &mut |owner: &mut Record| {
            owners += 1;
            let matches = owner
                .key(relation.local())
                .and_then(|key| by_key.get(&key))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let related = match relation.cardinality {
                Cardinality::ToOne => Related::One(matches.first().cloned().map(Box::new)),
                Cardinality::ToMany => Related::Many(matches.to_vec()),
            };
            owner.set_relation(relation.name.clone(), related);
        });

        debug!(
            path = %planned.path(),
            owners,
            matched = by_key.len(),
            "Attached follow-up relation"
        );
        Ok(())
    }
}

/// Relation names from the fetch root to the owners of relation `id`.
fn owner_path(compiled: &CompiledPlan, id: usize) -> Vec<&str> {
    match compiled.plan.relation(id).node.parent {
        Some(parent) => compiled.plan.relation(parent).path().split('.').collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::QueryScope;
    use crate::config::PlannerConfig;
    use crate::executor::MemoryExecutor;
    use crate::filter::Filter;
    use crate::fixtures;
    use crate::relations::PopulatePath;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn planner(config: PlannerConfig) -> Planner {
        Planner::new(fixtures::metadata(), fixtures::filters(), config).unwrap()
    }

    fn executor() -> MemoryExecutor {
        MemoryExecutor::new()
            .with_json(
                "users",
                json!([
                    {"id": 1, "name": "Ada", "account_id": 1, "last_document_id": null, "manager_id": null},
                    {"id": 2, "name": "Brendan", "account_id": 1, "last_document_id": null, "manager_id": 1}
                ]),
            )
            .with_json("accounts", json!({"id": 1, "name": "Acme", "owner_id": null}))
            .with_json(
                "documents",
                json!([
                    {"id": 1, "title": "Draft", "deleted": false, "author_id": 1},
                    {"id": 2, "title": "Trash", "deleted": true, "author_id": 1},
                    {"id": 3, "title": "Notes", "deleted": false, "author_id": 1},
                    {"id": 4, "title": "Memo", "deleted": false, "author_id": 2}
                ]),
            )
    }

    async fn load(planner: &Planner, executor: &MemoryExecutor, populate: &[&str]) -> Vec<Record> {
        load_with(planner, executor, populate, &QueryScope::default()).await
    }

    async fn load_with(
        planner: &Planner,
        executor: &MemoryExecutor,
        populate: &[&str],
        scope: &QueryScope,
    ) -> Vec<Record> {
        let paths: Vec<_> = populate.iter().map(|p| PopulatePath::parse(p).unwrap()).collect();
        let compiled = planner.compile("User", &paths, scope).unwrap();
        let token = CancellationToken::new();
        let rows = execute_cancellable(executor, &compiled.primary().statement, &token)
            .await
            .unwrap();
        let mut roots = RowAssembler::new(compiled.primary()).assemble(&rows).unwrap();
        FollowUpDispatcher::new(executor, &planner.config().loading, &token)
            .dispatch(&compiled, &mut roots)
            .await
            .unwrap();
        roots
    }

    fn titles(record: &Record, relation: &str) -> Vec<String> {
        record
            .many(relation)
            .iter()
            .filter_map(|d| match d.get("title") {
                Some(FilterValue::String(s)) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_to_many_respects_target_filters() {
        let users = load(&planner(PlannerConfig::default()), &executor(), &["documents"]).await;

        assert_eq!(users.len(), 2);
        assert_eq!(titles(&users[0], "documents"), vec!["Draft", "Notes"]);
        assert_eq!(titles(&users[1], "documents"), vec!["Memo"]);
    }

    #[tokio::test]
    async fn test_key_chunks_respect_batch_size() {
        let mut config = PlannerConfig::default();
        config.loading.batch_size = 1;
        let executor = executor();
        let users = load(&planner(config), &executor, &["documents"]).await;

        assert_eq!(titles(&users[0], "documents"), vec!["Draft", "Notes"]);
        let follow_ups: Vec<_> = executor.executed().into_iter().skip(1).collect();
        assert_eq!(follow_ups.len(), 2);
        assert!(follow_ups.iter().all(|s| s.bound_keys().len() == 1));
    }

    #[tokio::test]
    async fn test_follow_up_under_joined_relation() {
        let executor = executor();
        let users = load(&planner(PlannerConfig::default()), &executor, &["manager.documents"]).await;

        // Only Brendan has a manager; Ada's manager relation is absent.
        assert_eq!(users[0].relation("manager"), Some(&Related::One(None)));
        let manager = users[1].one("manager").unwrap();
        assert_eq!(titles(manager, "documents"), vec!["Draft", "Notes"]);
        assert_eq!(executor.executed()[1].bound_keys(), &[FilterValue::Int(1)]);
    }

    #[tokio::test]
    async fn test_no_keys_means_no_statement() {
        let executor = executor();
        let scope = QueryScope {
            criteria: Filter::equals("id", 1i64),
            ..Default::default()
        };
        let users = load_with(&planner(PlannerConfig::default()), &executor, &["manager.documents"], &scope).await;

        assert_eq!(users.len(), 1);
        assert!(users[0].one("manager").is_none());
        assert_eq!(executor.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_owner_set_skips_execution() {
        let planner = planner(PlannerConfig::default());
        let executor = MemoryExecutor::new();
        let paths = vec![PopulatePath::parse("documents").unwrap()];
        let compiled = planner
            .compile(
                "User",
                &paths,
                &QueryScope {
                    criteria: Filter::equals("id", 99i64),
                    ..Default::default()
                },
            )
            .unwrap();
        let token = CancellationToken::new();

        let mut roots = Vec::new();
        FollowUpDispatcher::new(&executor, &planner.config().loading, &token)
            .dispatch(&compiled, &mut roots)
            .await
            .unwrap();
        assert!(executor.executed().is_empty());
    }

    #[tokio::test]
    async fn test_nested_follow_up_runs_in_next_wave() {
        let executor = executor();
        let users = load(&planner(PlannerConfig::default()), &executor, &["documents.author"]).await;

        let author = users[1].many("documents")[0].one("author").unwrap();
        assert_eq!(author.get("name"), Some(&FilterValue::from("Brendan")));
        // Primary, documents, then documents.author.
        assert_eq!(executor.executed().len(), 3);
    }
}
