//! The planning facade.
//!
//! A [`Planner`] owns the read-only registries and configuration shared by
//! every fetch. Planning is synchronous and never touches the executor.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, info};

use crate::compiler::{CompiledPlan, QueryCompiler, QueryScope, SelectStatement};
use crate::config::PlannerConfig;
use crate::error::QueryResult;
use crate::filter_registry::FilterRegistry;
use crate::metadata::MetadataRegistry;
use crate::relations::{LoadPlan, PopulatePath, RelationGraphResolver, StrategySelector};

/// Plans and compiles fetches.
///
/// # Example
///
/// ```rust
/// use prax_planner::prelude::*;
///
/// let metadata = MetadataRegistry::builder()
///     .entity(EntityType::new("Document", "documents").columns(["id", "title", "deleted"]))
///     .entity(
///         EntityType::new("User", "users")
///             .columns(["id", "last_document_id"])
///             .relation(
///                 RelationDescriptor::many_to_one("lastDocument", "Document", "last_document_id")
///                     .nullable(true),
///             ),
///     )
///     .build()?;
/// let filters = FilterRegistry::new()
///     .with(FilterDescriptor::new("notDeleted", "Document", Filter::equals("deleted", false)))?;
///
/// let planner = Planner::new(metadata, filters, PlannerConfig::default())?;
/// let plan = planner.plan("User", &[PopulatePath::parse("lastDocument")?])?;
/// // Nothing else joins at the root, so the relation loads with a follow-up.
/// assert_eq!(plan.groups.len(), 2);
/// # Ok::<(), prax_planner::QueryError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Planner {
    metadata: Arc<MetadataRegistry>,
    filters: Arc<FilterRegistry>,
    config: Arc<PlannerConfig>,
}

impl Planner {
    /// Create a planner, validating the configuration and every registered
    /// filter against the metadata.
    pub fn new(
        metadata: impl Into<Arc<MetadataRegistry>>,
        filters: impl Into<Arc<FilterRegistry>>,
        config: impl Into<Arc<PlannerConfig>>,
    ) -> QueryResult<Self> {
        let metadata = metadata.into();
        let filters = filters.into();
        let config = config.into();

        config.validate()?;
        filters.validate(&metadata)?;

        info!(
            entities = metadata.len(),
            filters = filters.len(),
            database = ?config.sql.database,
            "Planner ready"
        );

        Ok(Self {
            metadata,
            filters,
            config,
        })
    }

    /// Entity metadata.
    pub fn metadata(&self) -> &MetadataRegistry {
        &self.metadata
    }

    /// Registered global filters.
    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Planner configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Resolve the relation graph and select a strategy for every relation.
    pub fn plan(&self, root: &str, populate: &[PopulatePath]) -> QueryResult<LoadPlan> {
        let graph = RelationGraphResolver::new(&self.metadata, self.config.loading.max_depth)
            .resolve(root, populate)?;
        let plan = StrategySelector::from_config(&self.config.loading).select(graph);

        if self.config.debug.log_plans {
            debug!(plan = %plan, "Load plan");
        } else {
            crate::planner_debug!(plan = %plan, "Load plan");
        }
        Ok(plan)
    }

    /// Plan and compile every statement of a fetch.
    ///
    /// The configured `[filters]` defaults sit beneath `scope.filters`.
    pub fn compile(&self, root: &str, populate: &[PopulatePath], scope: &QueryScope) -> QueryResult<CompiledPlan> {
        let plan = self.plan(root, populate)?;
        let scope = QueryScope {
            filters: self.config.filter_defaults().merged(&scope.filters),
            ..scope.clone()
        };
        QueryCompiler::new(&self.metadata, &self.filters, &self.config.sql).compile(plan, &scope)
    }

    /// Render a compiled fetch: the plan tree followed by each statement's SQL.
    pub fn explain(&self, root: &str, populate: &[PopulatePath], scope: &QueryScope) -> QueryResult<String> {
        let compiled = self.compile(root, populate, scope)?;
        let mut out = compiled.plan.to_string();
        for statement in &compiled.statements {
            let (sql, params) = statement.statement.to_sql(self.config.sql.database);
            let _ = writeln!(out, "[{}] {}", statement.group, sql);
            if !params.is_empty() {
                let params: Vec<_> = params.iter().map(serde_json::Value::from).collect();
                let _ = writeln!(out, "    params: {}", serde_json::Value::Array(params));
            }
        }
        Ok(out)
    }

    pub(crate) fn log_statement(&self, statement: &SelectStatement) {
        if self.config.debug.log_statements {
            let (sql, _) = statement.to_sql(self.config.sql.database);
            debug!(sql = %sql, "Statement");
        }
    }
}
