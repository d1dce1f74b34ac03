//! Result rows returned by executors.

use indexmap::IndexMap;

use crate::filter::FilterValue;

/// One result row: alias -> column -> value.
///
/// Every selected column must be present; unmatched LEFT joins carry
/// [`FilterValue::Null`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: IndexMap<String, IndexMap<String, FilterValue>>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from `"alias.column"` labelled values.
    ///
    /// Labels without a dot are ignored.
    pub fn from_labelled<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = (S, FilterValue)>,
        S: AsRef<str>,
    {
        let mut row = Self::new();
        for (label, value) in values {
            if let Some((alias, column)) = label.as_ref().split_once('.') {
                row.insert(alias, column, value);
            }
        }
        row
    }

    /// Add a value, builder style.
    pub fn with(mut self, alias: &str, column: &str, value: impl Into<FilterValue>) -> Self {
        self.insert(alias, column, value);
        self
    }

    /// Add a value.
    pub fn insert(&mut self, alias: &str, column: &str, value: impl Into<FilterValue>) {
        self.values
            .entry(alias.to_string())
            .or_default()
            .insert(column.to_string(), value.into());
    }

    /// Get a value.
    pub fn get(&self, alias: &str, column: &str) -> Option<&FilterValue> {
        self.values.get(alias).and_then(|cols| cols.get(column))
    }

    /// All values of one alias.
    pub fn alias(&self, alias: &str) -> Option<&IndexMap<String, FilterValue>> {
        self.values.get(alias)
    }

    /// Check if every value of an alias is NULL (or the alias is missing).
    pub fn is_alias_null(&self, alias: &str) -> bool {
        self.values
            .get(alias)
            .is_none_or(|cols| cols.values().all(FilterValue::is_null))
    }
}

/// Hashable form of a key value, for matching owners and related rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    /// Boolean key.
    Bool(bool),
    /// Integer key (also integral floats).
    Int(i64),
    /// String key.
    String(String),
    /// Any other value, by its JSON text.
    Other(String),
}

impl KeyValue {
    /// Convert a value; NULL has no key.
    pub fn from_value(value: &FilterValue) -> Option<Self> {
        match value {
            FilterValue::Null => None,
            FilterValue::Bool(b) => Some(Self::Bool(*b)),
            FilterValue::Int(i) => Some(Self::Int(*i)),
            FilterValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(Self::Int(*f as i64)),
            FilterValue::String(s) => Some(Self::String(s.clone())),
            other => Some(Self::Other(serde_json::Value::from(other).to_string())),
        }
    }
}
