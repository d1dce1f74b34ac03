//! Dialect-neutral SELECT statements.
//!
//! A [`SelectStatement`] is what crosses the execution boundary. Predicates
//! stay as [`Filter`] fragments bound to an alias, so a driver can render them
//! with [`SelectStatement::to_sql`] or evaluate them directly.

use std::fmt;

use crate::filter::{Filter, FilterValue};
use crate::filter_registry::ActiveFilter;
use crate::sql::{DatabaseType, SqlBuilder, escape_identifier};
use crate::types::OrderByField;

/// A table with its alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Table name.
    pub table: String,
    /// Alias used in the statement.
    pub alias: String,
}

/// A selected column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Alias the column belongs to.
    pub alias: String,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    /// Result label: `alias.column`.
    pub fn label(&self) -> String {
        format!("{}.{}", self.alias, self.column)
    }
}

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// The owner row is required to have a match.
    Inner,
    /// The owner row is kept with NULLs when nothing matches.
    Left,
}

impl JoinKind {
    /// Get the SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
        }
    }
}

/// A JOIN of one relation target.
///
/// The ON-condition is `parent_alias.parent_column = alias.column` and every
/// active filter of the target, each bound to `alias`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    /// Join kind.
    pub kind: JoinKind,
    /// Joined table and alias.
    pub table: TableRef,
    /// Alias of the owning side.
    pub parent_alias: String,
    /// Join column on the owning side.
    pub parent_column: String,
    /// Join column on the joined table.
    pub column: String,
    /// Active filters of the target, folded into the ON-condition.
    pub filters: Vec<ActiveFilter>,
    /// No active filters on the target: a visible joined row is exactly a
    /// present relation.
    pub filter_safe: bool,
    /// Relation path this join loads.
    pub relation_path: String,
}

impl JoinClause {
    /// The joined alias.
    pub fn alias(&self) -> &str {
        &self.table.alias
    }

    fn write_sql(&self, sql: &mut SqlBuilder) {
        sql.push(" ")
            .push(self.kind.as_sql())
            .push(" ")
            .push_identifier(&self.table.table)
            .push(" AS ")
            .push_identifier(&self.table.alias)
            .push(" ON ")
            .push_column(&self.parent_alias, &self.parent_column)
            .push(" = ")
            .push_column(&self.table.alias, &self.column);
        for active in &self.filters {
            sql.push(" AND ");
            active.filter.write_sql(&self.table.alias, sql);
        }
    }
}

/// Where a WHERE predicate comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateSource {
    /// Caller-supplied criteria.
    Criteria,
    /// Keys collected from owner rows (follow-up statements).
    KeyLookup,
    /// A named global filter of the statement root.
    Filter(String),
}

/// A predicate bound to an alias.
#[derive(Debug, Clone, PartialEq)]
pub struct WherePredicate {
    /// Alias the predicate's columns belong to.
    pub alias: String,
    /// The predicate.
    pub filter: Filter,
    /// Origin of the predicate.
    pub source: PredicateSource,
}

/// Conjunction of predicates on the statement root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    /// Predicates, all of which must hold.
    pub predicates: Vec<WherePredicate>,
}

impl WhereClause {
    /// Check if there is nothing to filter on.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Every alias referenced by a predicate.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.predicates.iter().map(|p| p.alias.as_str())
    }

    /// The key lookup predicate, if any.
    pub fn key_lookup(&self) -> Option<&WherePredicate> {
        self.predicates
            .iter()
            .find(|p| p.source == PredicateSource::KeyLookup)
    }
}

/// A complete SELECT for one statement group.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Statement root.
    pub from: TableRef,
    /// Selected columns of every alias.
    pub columns: Vec<ColumnRef>,
    /// Joins in parent-before-child order.
    pub joins: Vec<JoinClause>,
    /// Predicates on the statement root only.
    pub where_clause: WhereClause,
    /// Ordering on statement root columns.
    pub order_by: Vec<OrderByField>,
    /// Row limit.
    pub limit: Option<u64>,
    /// Rows to skip.
    pub offset: Option<u64>,
}

impl SelectStatement {
    /// Every alias in the statement, root first.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.from.alias.as_str()).chain(self.joins.iter().map(JoinClause::alias))
    }

    /// Get a join by alias.
    pub fn join(&self, alias: &str) -> Option<&JoinClause> {
        self.joins.iter().find(|j| j.alias() == alias)
    }

    /// Selected columns of one alias.
    pub fn columns_of<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.columns
            .iter()
            .filter(move |c| c.alias == alias)
            .map(|c| c.column.as_str())
    }

    /// Replace the key list of the key lookup predicate.
    pub fn bind_keys(&mut self, keys: Vec<FilterValue>) {
        for predicate in &mut self.where_clause.predicates {
            if predicate.source == PredicateSource::KeyLookup {
                if let Filter::In(column, _) = &predicate.filter {
                    predicate.filter = Filter::In(column.clone(), keys);
                    return;
                }
            }
        }
    }

    /// Keys currently bound to the key lookup predicate.
    pub fn bound_keys(&self) -> &[FilterValue] {
        match self.where_clause.key_lookup().map(|p| &p.filter) {
            Some(Filter::In(_, keys)) => keys,
            _ => &[],
        }
    }

    /// Render to parameterized SQL.
    ///
    /// Result columns are labelled `"alias.column"`.
    pub fn to_sql(&self, db_type: DatabaseType) -> (String, Vec<FilterValue>) {
        let mut sql = SqlBuilder::new(db_type);
        sql.push("SELECT ");
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.push_column(&column.alias, &column.column)
                .push(" AS ")
                .push(escape_identifier(&column.label()));
        }

        sql.push(" FROM ")
            .push_identifier(&self.from.table)
            .push(" AS ")
            .push_identifier(&self.from.alias);

        for join in &self.joins {
            join.write_sql(&mut sql);
        }

        if !self.where_clause.is_empty() {
            sql.push(" WHERE ");
            for (i, predicate) in self.where_clause.predicates.iter().enumerate() {
                if i > 0 {
                    sql.push(" AND ");
                }
                predicate.filter.write_sql(&predicate.alias, &mut sql);
            }
        }

        if !self.order_by.is_empty() {
            sql.push(" ORDER BY ");
            for (i, field) in self.order_by.iter().enumerate() {
                if i > 0 {
                    sql.push(", ");
                }
                field.write_sql(&self.from.alias, &mut sql);
            }
        }

        if let Some(limit) = self.limit {
            sql.push(format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push(format!(" OFFSET {}", offset));
        }

        sql.build()
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql(DatabaseType::PostgreSQL).0)
    }
}
