//! Turning flat joined rows into record graphs.
//!
//! A joined relation is absent when every selected column of its alias is
//! NULL. That covers a NULL foreign key, a dangling foreign key and a target
//! row excluded by a filter in the ON-condition alike. The statement root is
//! materialized for every row; relation absence never removes it.

use indexmap::IndexSet;
use tracing::trace;

use crate::compiler::{AliasSlot, CompiledStatement};
use crate::error::{QueryError, QueryResult};
use crate::record::{Record, Related};
use crate::row::{KeyValue, Row};

/// Assembles rows of one compiled statement.
#[derive(Debug, Clone, Copy)]
pub struct RowAssembler<'a> {
    compiled: &'a CompiledStatement,
}

impl<'a> RowAssembler<'a> {
    /// Create an assembler for a statement.
    pub fn new(compiled: &'a CompiledStatement) -> Self {
        Self { compiled }
    }

    /// Assemble rows into statement-root records, deduplicated by primary key.
    pub fn assemble(&self, rows: &[Row]) -> QueryResult<Vec<Record>> {
        let root = &self.compiled.slots[0];
        let mut seen: IndexSet<KeyValue> = IndexSet::with_capacity(rows.len());
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let record = self.assemble_row(row)?;
            if let Some(key) = record.key(&root.primary_key) {
                if !seen.insert(key) {
                    continue;
                }
            }
            records.push(record);
        }

        trace!(
            group = self.compiled.group,
            rows = rows.len(),
            records = records.len(),
            "Assembled rows"
        );
        Ok(records)
    }

    /// Assemble a single row.
    pub fn assemble_row(&self, row: &Row) -> QueryResult<Record> {
        let slots = &self.compiled.slots;
        let mut records: Vec<Option<Record>> = Vec::with_capacity(slots.len());

        for (i, slot) in slots.iter().enumerate() {
            let record = read_slot(row, slot)?;
            let present = match slot.parent {
                None => true,
                Some(parent) => records[parent].is_some() && !all_null(&record),
            };
            if i > 0 && !present {
                trace!(alias = %slot.alias, "Joined relation absent");
            }
            records.push(present.then_some(record));
        }

        // Placeholders in statement order keep relations in join order.
        for slot in slots.iter().skip(1) {
            if let (Some(parent), Some(name)) = (slot.parent, &slot.relation) {
                if let Some(owner) = records[parent].as_mut() {
                    owner.set_relation(name.clone(), Related::One(None));
                }
            }
        }
        for i in (1..slots.len()).rev() {
            let slot = &slots[i];
            let (Some(parent), Some(name)) = (slot.parent, &slot.relation) else {
                continue;
            };
            let child = records[i].take();
            if let Some(owner) = records[parent].as_mut() {
                owner.set_relation(name.clone(), Related::One(child.map(Box::new)));
            }
        }

        records
            .swap_remove(0)
            .ok_or_else(|| QueryError::internal("statement root was not materialized"))
    }
}

fn read_slot(row: &Row, slot: &AliasSlot) -> QueryResult<Record> {
    let mut record = Record::new(&slot.entity);
    for column in &slot.columns {
        let value = row
            .get(&slot.alias, column)
            .ok_or_else(|| QueryError::missing_column(&slot.alias, column))?;
        record.fields.insert(column.clone(), value.clone());
    }
    Ok(record)
}

fn all_null(record: &Record) -> bool {
    record.fields.values().all(|v| v.is_null())
}
