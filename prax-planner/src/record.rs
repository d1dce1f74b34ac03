//! Assembled entity graphs.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::filter::FilterValue;
use crate::row::KeyValue;

/// A loaded relation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// To-one relation; `None` when absent or filtered out.
    One(Option<Box<Record>>),
    /// To-many relation.
    Many(Vec<Record>),
}

impl Related {
    /// Check if the relation holds no record.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(one) => one.is_none(),
            Self::Many(many) => many.is_empty(),
        }
    }
}

impl Serialize for Related {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::One(Some(record)) => record.serialize(serializer),
            Self::One(None) => serializer.serialize_none(),
            Self::Many(records) => records.serialize(serializer),
        }
    }
}

/// An entity with its column values and loaded relations.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Entity name.
    pub entity: String,
    /// Column values in declaration order.
    pub fields: IndexMap<String, FilterValue>,
    /// Loaded relations by name.
    pub relations: IndexMap<String, Related>,
}

impl Record {
    /// Create a record with no fields.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    /// Get a column value.
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.fields.get(field)
    }

    /// Hashable key of a column.
    pub fn key(&self, field: &str) -> Option<KeyValue> {
        self.fields.get(field).and_then(KeyValue::from_value)
    }

    /// Get a loaded relation.
    pub fn relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    /// The record of a loaded to-one relation.
    pub fn one(&self, name: &str) -> Option<&Record> {
        match self.relations.get(name) {
            Some(Related::One(Some(record))) => Some(record),
            _ => None,
        }
    }

    /// The records of a loaded to-many relation.
    pub fn many(&self, name: &str) -> &[Record] {
        match self.relations.get(name) {
            Some(Related::Many(records)) => records,
            _ => &[],
        }
    }

    /// Set a relation.
    pub fn set_relation(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }

    /// Render as JSON: fields first, then relations.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + self.relations.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        for (name, related) in &self.relations {
            map.serialize_entry(name, related)?;
        }
        map.end()
    }
}

/// Call `f` on every record reached by following `path` from `records`.
///
/// An empty path visits `records` themselves. Absent to-one relations end
/// the walk for that branch.
pub fn for_each_at_path_mut<F>(records: &mut [Record], path: &[&str], f: &mut F)
where
    F: FnMut(&mut Record),
{
    let Some((head, rest)) = path.split_first() else {
        records.iter_mut().for_each(|r| f(r));
        return;
    };
    for record in records.iter_mut() {
        match record.relations.get_mut(*head) {
            Some(Related::One(Some(child))) => {
                for_each_at_path_mut(std::slice::from_mut(child.as_mut()), rest, f)
            }
            Some(Related::Many(children)) => for_each_at_path_mut(children, rest, f),
            _ => {}
        }
    }
}

/// Read-only variant of [`for_each_at_path_mut`].
pub fn for_each_at_path<'a, F>(records: &'a [Record], path: &[&str], f: &mut F)
where
    F: FnMut(&'a Record),
{
    let Some((head, rest)) = path.split_first() else {
        records.iter().for_each(|r| f(r));
        return;
    };
    for record in records {
        match record.relations.get(*head) {
            Some(Related::One(Some(child))) => for_each_at_path(std::slice::from_ref(child.as_ref()), rest, f),
            Some(Related::Many(children)) => for_each_at_path(children, rest, f),
            _ => {}
        }
    }
}
