//! Load plan compilation.
//!
//! Each group of a [`LoadPlan`] becomes one [`SelectStatement`]:
//!
//! - FROM the group root (the fetch root, or the target of a SELECT-IN
//!   relation), selecting every column of every alias.
//! - One JOIN per joined relation. The target's active global filters go into
//!   the JOIN's ON-condition, so a filtered-out row reads as a NULL relation
//!   and never removes the owner row.
//! - WHERE only ever holds predicates on the group root: caller criteria or
//!   the key lookup, plus the root's own global filters.
//!
//! A join is INNER only for a non-nullable eager relation whose target has no
//! active filters and whose owner is the group root or itself INNER-joined.
//! Everything else is a LEFT join.

mod alias;
mod statement;

pub use alias::{AliasAllocator, path_alias, snake_case};
pub use statement::{
    ColumnRef, JoinClause, JoinKind, PredicateSource, SelectStatement, TableRef, WhereClause,
    WherePredicate,
};

use std::borrow::Cow;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::SqlConfig;
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::filter_registry::{ActiveFilter, FilterOverrides, FilterRegistry};
use crate::metadata::{EntityType, MetadataRegistry};
use crate::relations::{LoadGroup, LoadPlan};
use crate::types::OrderByField;

/// Per-fetch inputs to compilation.
#[derive(Debug, Clone, Default)]
pub struct QueryScope {
    /// Criteria on the fetch root.
    pub criteria: Filter,
    /// Filter overrides for every alias (configuration defaults already layered in).
    pub filters: FilterOverrides,
    /// Filter overrides for one relation path, layered over [`Self::filters`].
    pub populate_filters: IndexMap<String, FilterOverrides>,
    /// Ordering on root columns.
    pub order_by: Vec<OrderByField>,
    /// Maximum number of roots.
    pub take: Option<u64>,
    /// Roots to skip.
    pub skip: Option<u64>,
}

impl QueryScope {
    /// Overrides in effect at a relation path (`""` is the fetch root).
    pub fn overrides_for(&self, path: &str) -> Cow<'_, FilterOverrides> {
        match self.populate_filters.get(path) {
            Some(specific) => Cow::Owned(self.filters.merged(specific)),
            None => Cow::Borrowed(&self.filters),
        }
    }
}

/// One alias of a compiled statement and what it loads.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasSlot {
    /// Table alias.
    pub alias: String,
    /// Entity loaded at this alias.
    pub entity: String,
    /// Primary key column of the entity.
    pub primary_key: String,
    /// Selected columns.
    pub columns: Vec<String>,
    /// Relation node loaded here, or the group root relation for slot 0.
    pub node: Option<usize>,
    /// Relation name on the owning record (joined slots only).
    pub relation: Option<String>,
    /// Slot of the owning alias (joined slots only).
    pub parent: Option<usize>,
    /// Join kind (joined slots only).
    pub join_kind: Option<JoinKind>,
}

/// A compiled group.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    /// Index of the group in the plan.
    pub group: usize,
    /// The statement.
    pub statement: SelectStatement,
    /// Aliases in statement order, root first.
    pub slots: Vec<AliasSlot>,
}

/// A plan together with every statement it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    /// The load plan.
    pub plan: LoadPlan,
    /// Statements indexed like [`LoadPlan::groups`].
    pub statements: Vec<CompiledStatement>,
}

impl CompiledPlan {
    /// The primary statement.
    pub fn primary(&self) -> &CompiledStatement {
        &self.statements[0]
    }

    /// Statement of a group.
    pub fn statement(&self, group: usize) -> &CompiledStatement {
        &self.statements[group]
    }
}

/// Compiles load plans into statements.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    metadata: &'a MetadataRegistry,
    filters: &'a FilterRegistry,
    sql: &'a SqlConfig,
}

impl<'a> QueryCompiler<'a> {
    /// Create a compiler.
    pub fn new(metadata: &'a MetadataRegistry, filters: &'a FilterRegistry, sql: &'a SqlConfig) -> Self {
        Self { metadata, filters, sql }
    }

    /// Compile every group of the plan. Follow-up statements are compiled
    /// with an empty key list; keys are bound at dispatch time.
    pub fn compile(&self, plan: LoadPlan, scope: &QueryScope) -> QueryResult<CompiledPlan> {
        let statements = plan
            .groups
            .iter()
            .map(|group| self.compile_group(&plan, group, scope))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(CompiledPlan { plan, statements })
    }

    /// Compile one group.
    pub fn compile_group(&self, plan: &LoadPlan, group: &LoadGroup, scope: &QueryScope) -> QueryResult<CompiledStatement> {
        let mut aliases = AliasAllocator::new(self.sql.max_identifier_length, self.sql.max_alias_suffix);

        let (entity, root_path, alias_base) = match group.root {
            None => (self.metadata.get(&plan.root)?, "", snake_case(&plan.root)),
            Some(id) => {
                let planned = plan.relation(id);
                (
                    self.metadata.get(&planned.node.relation.target)?,
                    planned.path(),
                    path_alias(planned.path()),
                )
            }
        };
        let root_alias = aliases.allocate(&alias_base)?;

        let mut columns = select_all(&root_alias, entity);
        let mut slots = vec![AliasSlot {
            alias: root_alias.clone(),
            entity: entity.name.clone(),
            primary_key: entity.primary_key.clone(),
            columns: entity.columns.clone(),
            node: group.root,
            relation: None,
            parent: None,
            join_kind: None,
        }];

        let mut where_clause = WhereClause::default();
        let (order_by, limit, offset) = match group.root {
            None => {
                if !scope.criteria.is_none() {
                    check_columns(entity, &scope.criteria, "criteria")?;
                    where_clause.predicates.push(WherePredicate {
                        alias: root_alias.clone(),
                        filter: scope.criteria.clone(),
                        source: PredicateSource::Criteria,
                    });
                }
                if let Some(field) = scope.order_by.iter().find(|f| !entity.has_column(&f.column)) {
                    return Err(QueryError::unknown_column(&entity.name, field.column.to_string())
                        .with_context("Ordering fetch results"));
                }
                (scope.order_by.clone(), scope.take, scope.skip)
            }
            Some(id) => {
                let relation = &plan.relation(id).node.relation;
                where_clause.predicates.push(WherePredicate {
                    alias: root_alias.clone(),
                    filter: Filter::In(relation.remote().to_string(), Vec::new()),
                    source: PredicateSource::KeyLookup,
                });
                (vec![OrderByField::asc(entity.primary_key.clone())], None, None)
            }
        };

        for active in self.active_filters(entity, &scope.overrides_for(root_path))? {
            where_clause.predicates.push(WherePredicate {
                alias: root_alias.clone(),
                filter: active.filter,
                source: PredicateSource::Filter(active.name),
            });
        }

        let mut joins = Vec::with_capacity(group.joined.len());
        for &id in &group.joined {
            let planned = plan.relation(id);
            let relation = &planned.node.relation;
            let target = self.metadata.get(&relation.target)?;

            let parent_slot = if planned.node.parent == group.root {
                0
            } else {
                slots
                    .iter()
                    .position(|s| s.node.is_some() && s.node == planned.node.parent)
                    .ok_or_else(|| {
                        QueryError::plan_compilation(format!(
                            "owner of joined relation '{}' is not in the same statement",
                            planned.path()
                        ))
                    })?
            };
            let parent_inner = parent_slot == 0 || slots[parent_slot].join_kind == Some(JoinKind::Inner);

            let filters = self.active_filters(target, &scope.overrides_for(planned.path()))?;
            let filter_safe = filters.is_empty();
            let kind = if !relation.nullable && relation.eager && !planned.upgraded && filter_safe && parent_inner {
                JoinKind::Inner
            } else {
                JoinKind::Left
            };

            let alias = aliases.allocate(&path_alias(planned.path()))?;
            let parent_alias = slots[parent_slot].alias.clone();
            crate::planner_trace!(
                path = %planned.path(),
                alias = %alias,
                kind = ?kind,
                filter_safe,
                "Compiled join"
            );

            columns.extend(select_all(&alias, target));
            joins.push(JoinClause {
                kind,
                table: TableRef {
                    table: target.table.clone(),
                    alias: alias.clone(),
                },
                parent_alias,
                parent_column: relation.local().to_string(),
                column: relation.remote().to_string(),
                filters,
                filter_safe,
                relation_path: planned.path().to_string(),
            });
            slots.push(AliasSlot {
                alias,
                entity: target.name.clone(),
                primary_key: target.primary_key.clone(),
                columns: target.columns.clone(),
                node: Some(id),
                relation: Some(relation.name.clone()),
                parent: Some(parent_slot),
                join_kind: Some(kind),
            });
        }

        let statement = SelectStatement {
            from: TableRef {
                table: entity.table.clone(),
                alias: root_alias,
            },
            columns,
            joins,
            where_clause,
            order_by,
            limit,
            offset,
        };
        verify_scoping(&statement)?;

        debug!(
            group = group.index,
            root = %statement.from.table,
            joins = statement.joins.len(),
            "Compiled statement"
        );

        Ok(CompiledStatement {
            group: group.index,
            statement,
            slots,
        })
    }

    fn active_filters(&self, entity: &EntityType, overrides: &FilterOverrides) -> QueryResult<Vec<ActiveFilter>> {
        let active = self.filters.active_filters(&entity.name, overrides)?;
        for filter in &active {
            check_columns(entity, &filter.filter, &format!("filter '{}'", filter.name))?;
        }
        Ok(active)
    }
}

fn select_all(alias: &str, entity: &EntityType) -> Vec<ColumnRef> {
    entity
        .columns
        .iter()
        .map(|column| ColumnRef {
            alias: alias.to_string(),
            column: column.clone(),
        })
        .collect()
}

fn check_columns(entity: &EntityType, filter: &Filter, what: &str) -> QueryResult<()> {
    match filter.columns().into_iter().find(|c| !entity.has_column(c)) {
        Some(column) => Err(QueryError::invalid_filter(
            &entity.name,
            format!("{} references unknown column '{}'", what, column),
        )),
        None => Ok(()),
    }
}

/// WHERE may only reference the statement root.
fn verify_scoping(statement: &SelectStatement) -> QueryResult<()> {
    match statement.where_clause.aliases().find(|a| *a != statement.from.alias) {
        Some(alias) => Err(QueryError::plan_compilation(format!(
            "WHERE clause references joined alias '{}'",
            alias
        ))
        .with_sql(statement.to_string())),
        None => Ok(()),
    }
}
