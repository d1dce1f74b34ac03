//! In-process reference executor.
//!
//! Evaluates [`SelectStatement`]s over in-memory tables with SQL semantics:
//! NULL never equals anything, LEFT joins pad with NULLs, INNER joins drop
//! unmatched rows and ON-condition filters only decide whether a joined row
//! matches.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::compiler::{JoinClause, JoinKind, SelectStatement};
use crate::error::{QueryError, QueryResult};
use crate::filter::{Filter, FilterValue};
use crate::row::Row;
use crate::types::SortOrder;

use super::StatementExecutor;

type TableRow = IndexMap<String, FilterValue>;

/// Executes statements against in-memory tables.
///
/// Cloning shares the tables and the execution log.
#[derive(Debug, Clone, Default)]
pub struct MemoryExecutor {
    tables: Arc<RwLock<IndexMap<String, Vec<TableRow>>>>,
    executed: Arc<Mutex<Vec<SelectStatement>>>,
    fail_on: Option<String>,
    delay: Option<Duration>,
}

impl MemoryExecutor {
    /// Create an executor with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row, builder style.
    pub fn with_row<I, K, V>(self, table: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FilterValue>,
    {
        self.insert(table, values);
        self
    }

    /// Add rows from a JSON object or an array of objects.
    ///
    /// Scalars map to the matching [`FilterValue`]; nested arrays and objects
    /// are kept as JSON. Non-object entries are ignored.
    pub fn with_json(self, table: &str, rows: serde_json::Value) -> Self {
        let rows = match rows {
            serde_json::Value::Array(rows) => rows,
            other => vec![other],
        };
        for row in rows {
            if let serde_json::Value::Object(fields) = row {
                self.insert(table, fields.into_iter().map(|(k, v)| (k, json_value(v))));
            }
        }
        self
    }

    /// Add a row.
    pub fn insert<I, K, V>(&self, table: &str, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FilterValue>,
    {
        let row = values.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.tables.write().entry(table.to_string()).or_default().push(row);
    }

    /// Fail every statement that reads `table` with an execution error.
    pub fn fail_on_table(mut self, table: impl Into<String>) -> Self {
        self.fail_on = Some(table.into());
        self
    }

    /// Sleep before answering each statement.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Statements executed so far, in order.
    pub fn executed(&self) -> Vec<SelectStatement> {
        self.executed.lock().clone()
    }

    /// Forget the execution log.
    pub fn clear_executed(&self) {
        self.executed.lock().clear();
    }

    fn reads_failing_table(&self, statement: &SelectStatement) -> bool {
        let Some(failing) = &self.fail_on else {
            return false;
        };
        statement.from.table == *failing || statement.joins.iter().any(|j| j.table.table == *failing)
    }

    fn evaluate(&self, statement: &SelectStatement) -> Vec<Row> {
        let tables = self.tables.read();
        let empty = Vec::new();
        let rows_of = |table: &str| tables.get(table).unwrap_or(&empty);

        let root = &statement.from.alias;
        let mut rows: Vec<Row> = rows_of(&statement.from.table)
            .iter()
            .filter(|source| {
                statement
                    .where_clause
                    .predicates
                    .iter()
                    .all(|p| holds(&p.filter, source))
            })
            .map(|source| qualify(root, statement.columns_of(root), source))
            .collect();

        for join in &statement.joins {
            rows = rows
                .into_iter()
                .flat_map(|row| join_row(row, join, statement, rows_of(&join.table.table)))
                .collect();
        }

        sort_rows(&mut rows, root, statement);
        apply_pagination(&mut rows, statement.offset, statement.limit);
        rows
    }
}

#[async_trait]
impl StatementExecutor for MemoryExecutor {
    async fn execute(&self, statement: &SelectStatement) -> QueryResult<Vec<Row>> {
        self.executed.lock().push(statement.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.reads_failing_table(statement) {
            return Err(QueryError::execution(format!(
                "simulated failure reading '{}'",
                self.fail_on.as_deref().unwrap_or_default()
            ))
            .with_sql(statement.to_string()));
        }

        let rows = self.evaluate(statement);
        trace!(table = %statement.from.table, rows = rows.len(), "Memory statement evaluated");
        Ok(rows)
    }
}

fn json_value(value: serde_json::Value) -> FilterValue {
    match value {
        serde_json::Value::Null => FilterValue::Null,
        serde_json::Value::Bool(b) => FilterValue::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => FilterValue::Int(i),
            None => n.as_f64().map_or(FilterValue::Null, FilterValue::Float),
        },
        serde_json::Value::String(s) => FilterValue::String(s),
        other => FilterValue::Json(other),
    }
}

/// Only a TRUE predicate keeps a row; UNKNOWN behaves like FALSE.
fn holds(filter: &Filter, source: &TableRow) -> bool {
    filter.evaluate(&|column: &str| source.get(column)) == Some(true)
}

fn qualify<'c>(alias: &str, columns: impl Iterator<Item = &'c str>, source: &TableRow) -> Row {
    let mut row = Row::new();
    for column in columns {
        row.insert(alias, column, source.get(column).cloned().unwrap_or(FilterValue::Null));
    }
    row
}

fn join_row(row: Row, join: &JoinClause, statement: &SelectStatement, table: &[TableRow]) -> Vec<Row> {
    let alias = join.alias();
    let parent_value = row
        .get(&join.parent_alias, &join.parent_column)
        .cloned()
        .unwrap_or(FilterValue::Null);

    let matches: Vec<Row> = table
        .iter()
        .filter(|candidate| {
            let key = candidate.get(&join.column).unwrap_or(&FilterValue::Null);
            parent_value.sql_eq(key) == Some(true)
                && join.filters.iter().all(|active| holds(&active.filter, candidate))
        })
        .map(|candidate| {
            let mut joined = row.clone();
            for column in statement.columns_of(alias) {
                joined.insert(alias, column, candidate.get(column).cloned().unwrap_or(FilterValue::Null));
            }
            joined
        })
        .collect();

    if !matches.is_empty() {
        return matches;
    }
    match join.kind {
        JoinKind::Inner => Vec::new(),
        JoinKind::Left => {
            let mut padded = row;
            for column in statement.columns_of(alias) {
                padded.insert(alias, column, FilterValue::Null);
            }
            vec![padded]
        }
    }
}

fn sort_rows(rows: &mut [Row], root: &str, statement: &SelectStatement) {
    if statement.order_by.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for field in &statement.order_by {
            let cmp = compare_values(a.get(root, &field.column), b.get(root, &field.column));
            let cmp = match field.order {
                SortOrder::Asc => cmp,
                SortOrder::Desc => cmp.reverse(),
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
}

/// NULLs sort first; incomparable values compare equal.
fn compare_values(a: Option<&FilterValue>, b: Option<&FilterValue>) -> Ordering {
    let a = a.unwrap_or(&FilterValue::Null);
    let b = b.unwrap_or(&FilterValue::Null);
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.sql_cmp(b).unwrap_or(Ordering::Equal),
    }
}

fn apply_pagination(rows: &mut Vec<Row>, offset: Option<u64>, limit: Option<u64>) {
    if let Some(offset) = offset {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        if offset >= rows.len() {
            rows.clear();
        } else {
            rows.drain(..offset);
        }
    }
    if let Some(limit) = limit {
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{QueryCompiler, QueryScope};
    use crate::config::SqlConfig;
    use crate::filter_registry::FilterOverrides;
    use crate::fixtures;
    use crate::relations::{PopulatePath, RelationGraphResolver, StrategySelector};
    use crate::types::OrderByField;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn primary(populate: &[&str], scope: &QueryScope) -> SelectStatement {
        let metadata = fixtures::metadata();
        let filters = fixtures::filters();
        let paths: Vec<_> = populate.iter().map(|p| PopulatePath::parse(p).unwrap()).collect();
        let graph = RelationGraphResolver::new(&metadata, 8).resolve("User", &paths).unwrap();
        let plan = StrategySelector::default().select(graph);
        let sql = SqlConfig::default();
        QueryCompiler::new(&metadata, &filters, &sql)
            .compile(plan, scope)
            .unwrap()
            .statements
            .swap_remove(0)
            .statement
    }

    fn executor() -> MemoryExecutor {
        MemoryExecutor::new()
            .with_json(
                "users",
                json!([
                    {"id": 1, "name": "Ada", "account_id": 1, "last_document_id": 1, "manager_id": null},
                    {"id": 2, "name": "Brendan", "account_id": 1, "last_document_id": null, "manager_id": 1},
                    {"id": 3, "name": "Orphan", "account_id": 9, "last_document_id": null, "manager_id": null}
                ]),
            )
            .with_json("accounts", json!({"id": 1, "name": "Acme", "owner_id": 1}))
            .with_json("documents", json!({"id": 1, "title": "Draft", "deleted": true, "author_id": 1}))
    }

    #[tokio::test]
    async fn test_filtered_left_join_pads_nulls() {
        let scope = QueryScope {
            criteria: Filter::equals("id", 1i64),
            ..Default::default()
        };
        let rows = executor().execute(&primary(&["lastDocument"], &scope)).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("user", "name"), Some(&FilterValue::from("Ada")));
        assert!(rows[0].is_alias_null("last_document"));
        assert_eq!(rows[0].get("account", "name"), Some(&FilterValue::from("Acme")));
    }

    #[tokio::test]
    async fn test_unfiltered_join_matches() {
        let scope = QueryScope {
            criteria: Filter::equals("id", 1i64),
            filters: FilterOverrides::new().disable("notDeleted"),
            ..Default::default()
        };
        let rows = executor().execute(&primary(&["lastDocument"], &scope)).await.unwrap();
        assert_eq!(rows[0].get("last_document", "deleted"), Some(&FilterValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_inner_join_drops_unmatched_rows() {
        // User 3 points at a missing account; the account join is INNER.
        let rows = executor().execute(&primary(&[], &QueryScope::default())).await.unwrap();
        let ids: Vec<_> = rows.iter().filter_map(|r| r.get("user", "id").cloned()).collect();
        assert_eq!(ids, vec![FilterValue::Int(1), FilterValue::Int(2)]);
    }

    #[tokio::test]
    async fn test_empty_not_in_keeps_null_rows() {
        // Renders as `WHERE TRUE`, so user 2 with a NULL last document stays.
        let scope = QueryScope {
            criteria: Filter::and([
                Filter::equals("id", 2i64),
                Filter::NotIn("last_document_id".into(), vec![]),
            ]),
            ..Default::default()
        };
        let statement = primary(&[], &scope);
        let (sql, _) = statement.to_sql(crate::sql::DatabaseType::PostgreSQL);
        assert!(sql.contains("TRUE"), "{sql}");

        let rows = executor().execute(&statement).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("user", "name"), Some(&FilterValue::from("Brendan")));
    }

    #[tokio::test]
    async fn test_order_and_pagination() {
        let scope = QueryScope {
            order_by: vec![OrderByField::desc("id")],
            take: Some(1),
            skip: Some(1),
            ..Default::default()
        };
        let rows = executor().execute(&primary(&[], &scope)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("user", "id"), Some(&FilterValue::Int(1)));
    }

    #[tokio::test]
    async fn test_failing_table() {
        let executor = executor().fail_on_table("documents");
        let err = executor
            .execute(&primary(&["lastDocument"], &QueryScope::default()))
            .await
            .unwrap_err();
        assert!(err.is_execution());
        assert_eq!(executor.executed().len(), 1);
    }

    #[test]
    fn test_compare_values_nulls_first() {
        assert_eq!(compare_values(None, Some(&FilterValue::Int(1))), Ordering::Less);
        assert_eq!(
            compare_values(Some(&FilterValue::Int(2)), Some(&FilterValue::Int(1))),
            Ordering::Greater
        );
    }
}
