//! Predicate fragments for criteria and global filters.
//!
//! A [`Filter`] is written against the unqualified columns of one entity.
//! The compiler attaches it to a table alias when it places the fragment in a
//! JOIN's ON-condition or in the WHERE clause, so the same fragment can be
//! reused at any alias the entity appears under.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::sql::SqlBuilder;

static NULL: FilterValue = FilterValue::Null;

/// A value used in predicates and returned in result rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// JSON value.
    Json(serde_json::Value),
    /// List of values.
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Compare two values the way SQL does, `None` when either side is NULL
    /// or the types are not comparable.
    pub fn sql_cmp(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Json(a), Self::Json(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// SQL equality: `None` when either side is NULL.
    pub fn sql_eq(&self, other: &FilterValue) -> Option<bool> {
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self, other) {
            (Self::Json(a), Self::Json(b)) => Some(a == b),
            _ => Some(self.sql_cmp(other) == Some(Ordering::Equal)),
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Json(v) => v.clone(),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl From<&FilterValue> for serde_json::Value {
    fn from(value: &FilterValue) -> Self {
        value.to_json()
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<serde_json::Value> for FilterValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// A boolean predicate over the columns of a single entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,

    /// Equals comparison.
    Equals(String, FilterValue),
    /// Not equals comparison.
    NotEquals(String, FilterValue),

    /// Less than comparison.
    Lt(String, FilterValue),
    /// Less than or equal comparison.
    Lte(String, FilterValue),
    /// Greater than comparison.
    Gt(String, FilterValue),
    /// Greater than or equal comparison.
    Gte(String, FilterValue),

    /// In a list of values.
    In(String, Vec<FilterValue>),
    /// Not in a list of values.
    NotIn(String, Vec<FilterValue>),

    /// Contains (LIKE %value%).
    Contains(String, FilterValue),
    /// Starts with (LIKE value%).
    StartsWith(String, FilterValue),
    /// Ends with (LIKE %value).
    EndsWith(String, FilterValue),

    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),

    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn none() -> Self {
        Self::None
    }

    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Shorthand for an equality predicate.
    pub fn equals(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Equals(column.into(), value.into())
    }

    /// Create an AND filter.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.pop().unwrap_or_default(),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.pop().unwrap_or_default(),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Combine with another filter using AND.
    pub fn and_then(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    /// Every column the predicate references, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        let column = match self {
            Self::None => None,
            Self::Equals(c, _)
            | Self::NotEquals(c, _)
            | Self::Lt(c, _)
            | Self::Lte(c, _)
            | Self::Gt(c, _)
            | Self::Gte(c, _)
            | Self::In(c, _)
            | Self::NotIn(c, _)
            | Self::Contains(c, _)
            | Self::StartsWith(c, _)
            | Self::EndsWith(c, _)
            | Self::IsNull(c)
            | Self::IsNotNull(c) => Some(c.as_str()),
            Self::And(filters) | Self::Or(filters) => {
                for f in filters {
                    f.collect_columns(out);
                }
                None
            }
            Self::Not(inner) => {
                inner.collect_columns(out);
                None
            }
        };
        if let Some(c) = column {
            if !out.contains(&c) {
                out.push(c);
            }
        }
    }

    /// Render the predicate with every column qualified by `alias`.
    pub fn write_sql(&self, alias: &str, sql: &mut SqlBuilder) {
        match self {
            Self::None => {
                sql.push("TRUE");
            }
            Self::Equals(col, val) if val.is_null() => {
                sql.push_column(alias, col).push(" IS NULL");
            }
            Self::NotEquals(col, val) if val.is_null() => {
                sql.push_column(alias, col).push(" IS NOT NULL");
            }
            Self::Equals(col, val) => compare(sql, alias, col, "=", val),
            Self::NotEquals(col, val) => compare(sql, alias, col, "<>", val),
            Self::Lt(col, val) => compare(sql, alias, col, "<", val),
            Self::Lte(col, val) => compare(sql, alias, col, "<=", val),
            Self::Gt(col, val) => compare(sql, alias, col, ">", val),
            Self::Gte(col, val) => compare(sql, alias, col, ">=", val),
            Self::In(col, values) | Self::NotIn(col, values) => {
                let negated = matches!(self, Self::NotIn(..));
                if values.is_empty() {
                    sql.push(if negated { "TRUE" } else { "FALSE" });
                    return;
                }
                sql.push_column(alias, col)
                    .push(if negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        sql.push(", ");
                    }
                    sql.push_param(value.clone());
                }
                sql.push(")");
            }
            Self::Contains(col, val) => like(sql, alias, col, val, "%", "%"),
            Self::StartsWith(col, val) => like(sql, alias, col, val, "", "%"),
            Self::EndsWith(col, val) => like(sql, alias, col, val, "%", ""),
            Self::IsNull(col) => {
                sql.push_column(alias, col).push(" IS NULL");
            }
            Self::IsNotNull(col) => {
                sql.push_column(alias, col).push(" IS NOT NULL");
            }
            Self::And(filters) | Self::Or(filters) => {
                let (joiner, empty) = if matches!(self, Self::And(_)) {
                    (" AND ", "TRUE")
                } else {
                    (" OR ", "FALSE")
                };
                if filters.is_empty() {
                    sql.push(empty);
                    return;
                }
                sql.push("(");
                for (i, f) in filters.iter().enumerate() {
                    if i > 0 {
                        sql.push(joiner);
                    }
                    f.write_sql(alias, sql);
                }
                sql.push(")");
            }
            Self::Not(inner) => {
                sql.push("NOT (");
                inner.write_sql(alias, sql);
                sql.push(")");
            }
        }
    }

    /// Evaluate with SQL three-valued logic; `None` is UNKNOWN.
    ///
    /// `lookup` resolves an unqualified column to its value.
    pub fn evaluate<'v, F>(&self, lookup: &F) -> Option<bool>
    where
        F: Fn(&str) -> Option<&'v FilterValue>,
    {
        let value = |col: &str| lookup(col).unwrap_or(&NULL);
        match self {
            Self::None => Some(true),
            Self::Equals(col, val) if val.is_null() => Some(value(col).is_null()),
            Self::NotEquals(col, val) if val.is_null() => Some(!value(col).is_null()),
            Self::Equals(col, val) => value(col).sql_eq(val),
            Self::NotEquals(col, val) => value(col).sql_eq(val).map(|eq| !eq),
            Self::Lt(col, val) => value(col).sql_cmp(val).map(Ordering::is_lt),
            Self::Lte(col, val) => value(col).sql_cmp(val).map(Ordering::is_le),
            Self::Gt(col, val) => value(col).sql_cmp(val).map(Ordering::is_gt),
            Self::Gte(col, val) => value(col).sql_cmp(val).map(Ordering::is_ge),
            Self::In(col, values) => in_list(value(col), values),
            Self::NotIn(col, values) => in_list(value(col), values).map(|found| !found),
            Self::Contains(col, val) => matches_str(value(col), val, |s, p| s.contains(p)),
            Self::StartsWith(col, val) => matches_str(value(col), val, |s, p| s.starts_with(p)),
            Self::EndsWith(col, val) => matches_str(value(col), val, |s, p| s.ends_with(p)),
            Self::IsNull(col) => Some(value(col).is_null()),
            Self::IsNotNull(col) => Some(!value(col).is_null()),
            Self::And(filters) => {
                let mut unknown = false;
                for f in filters {
                    match f.evaluate(lookup) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown { None } else { Some(true) }
            }
            Self::Or(filters) => {
                let mut unknown = false;
                for f in filters {
                    match f.evaluate(lookup) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Self::Not(inner) => inner.evaluate(lookup).map(|b| !b),
        }
    }
}

fn compare(sql: &mut SqlBuilder, alias: &str, col: &str, op: &str, val: &FilterValue) {
    sql.push_column(alias, col)
        .push(" ")
        .push(op)
        .push(" ")
        .push_param(val.clone());
}

fn like(sql: &mut SqlBuilder, alias: &str, col: &str, val: &FilterValue, prefix: &str, suffix: &str) {
    let pattern = match val {
        FilterValue::String(s) => FilterValue::String(format!("{}{}{}", prefix, s, suffix)),
        other => other.clone(),
    };
    sql.push_column(alias, col).push(" LIKE ").push_param(pattern);
}

/// `value IN (values)`; an empty list is FALSE even for a NULL value.
fn in_list(value: &FilterValue, values: &[FilterValue]) -> Option<bool> {
    if values.is_empty() {
        return Some(false);
    }
    if value.is_null() {
        return None;
    }
    if values.iter().any(|v| value.sql_eq(v) == Some(true)) {
        Some(true)
    } else if values.iter().any(FilterValue::is_null) {
        None
    } else {
        Some(false)
    }
}

fn matches_str(value: &FilterValue, pattern: &FilterValue, f: impl Fn(&str, &str) -> bool) -> Option<bool> {
    match (value.as_str(), pattern.as_str()) {
        (Some(s), Some(p)) => Some(f(s, p)),
        _ if value.is_null() => None,
        _ => Some(false),
    }
}
