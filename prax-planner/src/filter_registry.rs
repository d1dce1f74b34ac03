//! Named global filters.
//!
//! A global filter is a predicate fragment attached to an entity (soft
//! deletes, tenancy) that applies wherever that entity is loaded: the WHERE
//! clause when it is a statement root, the JOIN's ON-condition when it is a
//! joined relation, and the key lookup of a follow-up statement.
//!
//! ```rust
//! use prax_planner::filter::Filter;
//! use prax_planner::filter_registry::{FilterDescriptor, FilterOverrides, FilterRegistry};
//!
//! let mut filters = FilterRegistry::new();
//! filters
//!     .register(FilterDescriptor::new("notDeleted", "Document", Filter::equals("deleted", false)))
//!     .unwrap();
//!
//! let active = filters.active_filters("Document", &FilterOverrides::new()).unwrap();
//! assert_eq!(active.len(), 1);
//!
//! let off = FilterOverrides::new().disable("notDeleted");
//! assert!(filters.active_filters("Document", &off).unwrap().is_empty());
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{QueryError, QueryResult};
use crate::filter::{Filter, FilterValue};
use crate::metadata::MetadataRegistry;

/// Arguments passed to a parameterized filter.
pub type FilterArgs = IndexMap<String, FilterValue>;

/// Builds a predicate from arguments.
pub type FilterBuilderFn = Arc<dyn Fn(&FilterArgs) -> QueryResult<Filter> + Send + Sync>;

/// Predicate fragment of a filter.
#[derive(Clone)]
pub enum FilterPredicate {
    /// The same predicate on every call.
    Fixed(Filter),
    /// A predicate built from per-call arguments.
    Parameterized(FilterBuilderFn),
}

impl fmt::Debug for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(filter) => f.debug_tuple("Fixed").field(filter).finish(),
            Self::Parameterized(_) => f.write_str("Parameterized(..)"),
        }
    }
}

/// A named predicate fragment owned by one entity.
#[derive(Debug, Clone)]
pub struct FilterDescriptor {
    /// Filter name, unique per entity.
    pub name: String,
    /// Owning entity name.
    pub entity: String,
    /// Predicate fragment over the entity's columns.
    pub predicate: FilterPredicate,
    /// Whether the filter applies when nothing overrides it.
    pub default_enabled: bool,
    /// Arguments used when the caller supplies none.
    pub default_args: FilterArgs,
}

impl FilterDescriptor {
    /// A default-enabled filter with a fixed predicate.
    pub fn new(name: impl Into<String>, entity: impl Into<String>, filter: Filter) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            predicate: FilterPredicate::Fixed(filter),
            default_enabled: true,
            default_args: FilterArgs::new(),
        }
    }

    /// A default-enabled filter built from arguments.
    pub fn parameterized<F>(name: impl Into<String>, entity: impl Into<String>, build: F) -> Self
    where
        F: Fn(&FilterArgs) -> QueryResult<Filter> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            entity: entity.into(),
            predicate: FilterPredicate::Parameterized(Arc::new(build)),
            default_enabled: true,
            default_args: FilterArgs::new(),
        }
    }

    /// Set whether the filter is enabled by default.
    pub fn default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = enabled;
        self
    }

    /// Set a default argument.
    pub fn default_arg(mut self, name: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.default_args.insert(name.into(), value.into());
        self
    }

    /// Build the predicate with the given arguments layered over the defaults.
    pub fn resolve(&self, args: &FilterArgs) -> QueryResult<Filter> {
        match &self.predicate {
            FilterPredicate::Fixed(filter) => Ok(filter.clone()),
            FilterPredicate::Parameterized(build) => {
                let mut merged = self.default_args.clone();
                merged.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
                build(&merged).map_err(|e| e.with_entity(&self.entity))
            }
        }
    }
}

/// Per-filter override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSetting {
    /// Whether the filter applies.
    pub enabled: bool,
    /// Arguments for parameterized filters.
    pub args: FilterArgs,
}

/// Filter overrides by name.
///
/// Layers combine with [`FilterOverrides::merged`], the argument winning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOverrides {
    settings: IndexMap<String, FilterSetting>,
}

impl FilterOverrides {
    /// Create an empty set of overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable a filter.
    pub fn enable(self, name: impl Into<String>) -> Self {
        self.set(name, true)
    }

    /// Disable a filter.
    pub fn disable(self, name: impl Into<String>) -> Self {
        self.set(name, false)
    }

    /// Set whether a filter applies, keeping any arguments.
    pub fn set(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.settings.entry(name.into()).or_default().enabled = enabled;
        self
    }

    /// Enable a filter with arguments.
    pub fn with_args(mut self, name: impl Into<String>, args: FilterArgs) -> Self {
        let setting = self.settings.entry(name.into()).or_default();
        setting.enabled = true;
        setting.args.extend(args);
        self
    }

    /// Get the setting for a filter.
    pub fn get(&self, name: &str) -> Option<&FilterSetting> {
        self.settings.get(name)
    }

    /// Whether the filter is explicitly enabled or disabled.
    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.settings.get(name).map(|s| s.enabled)
    }

    /// Check if no filter is overridden.
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Layer `higher` on top of `self`.
    ///
    /// A filter named in `higher` takes its enabled flag from `higher`;
    /// arguments merge key by key with `higher` winning.
    pub fn merged(&self, higher: &FilterOverrides) -> FilterOverrides {
        let mut out = self.clone();
        for (name, setting) in &higher.settings {
            let entry = out.settings.entry(name.clone()).or_default();
            entry.enabled = setting.enabled;
            entry
                .args
                .extend(setting.args.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        out
    }
}

/// A filter resolved for one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveFilter {
    /// Filter name.
    pub name: String,
    /// Resolved predicate.
    pub filter: Filter,
}

/// Filters registered per entity, in registration order.
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    filters: IndexMap<String, Vec<FilterDescriptor>>,
}

impl FilterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter; names are unique per entity.
    pub fn register(&mut self, descriptor: FilterDescriptor) -> QueryResult<()> {
        let list = self.filters.entry(descriptor.entity.clone()).or_default();
        if list.iter().any(|f| f.name == descriptor.name) {
            return Err(QueryError::duplicate(
                "Filter",
                format!("{}.{}", descriptor.entity, descriptor.name),
            ));
        }
        list.push(descriptor);
        Ok(())
    }

    /// Chainable [`Self::register`].
    pub fn with(mut self, descriptor: FilterDescriptor) -> QueryResult<Self> {
        self.register(descriptor)?;
        Ok(self)
    }

    /// Check owning entities and the columns of fixed predicates.
    ///
    /// Parameterized predicates are checked when compiled.
    pub fn validate(&self, metadata: &MetadataRegistry) -> QueryResult<()> {
        for (entity_name, descriptors) in &self.filters {
            let entity = metadata.get(entity_name)?;
            for descriptor in descriptors {
                if let FilterPredicate::Fixed(filter) = &descriptor.predicate {
                    if let Some(column) = filter.columns().into_iter().find(|c| !entity.has_column(c)) {
                        return Err(QueryError::invalid_filter(
                            entity_name,
                            format!("filter '{}' references unknown column '{}'", descriptor.name, column),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Filters registered for an entity.
    pub fn filters_for(&self, entity: &str) -> &[FilterDescriptor] {
        self.filters.get(entity).map(Vec::as_slice).unwrap_or_default()
    }

    /// Resolve the filters that apply to `entity` under `overrides`.
    ///
    /// Filters without an override fall back to their default-enabled flag.
    /// The result keeps registration order.
    pub fn active_filters(&self, entity: &str, overrides: &FilterOverrides) -> QueryResult<Vec<ActiveFilter>> {
        let empty = FilterArgs::new();
        let mut active = Vec::new();
        for descriptor in self.filters_for(entity) {
            let setting = overrides.get(&descriptor.name);
            let enabled = setting.map_or(descriptor.default_enabled, |s| s.enabled);
            if !enabled {
                continue;
            }
            let args = setting.map_or(&empty, |s| &s.args);
            active.push(ActiveFilter {
                name: descriptor.name.clone(),
                filter: descriptor.resolve(args)?,
            });
        }
        Ok(active)
    }

    /// Number of registered filters across all entities.
    pub fn len(&self) -> usize {
        self.filters.values().map(Vec::len).sum()
    }

    /// Check if no filter is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::metadata::EntityType;
    use pretty_assertions::assert_eq;

    fn tenant_filter() -> FilterDescriptor {
        FilterDescriptor::parameterized("tenant", "Document", |args| {
            let tenant = args
                .get("tenantId")
                .cloned()
                .ok_or_else(|| QueryError::invalid_filter("Document", "tenant filter needs 'tenantId'"))?;
            Ok(Filter::equals("tenant_id", tenant))
        })
    }

    fn registry() -> FilterRegistry {
        FilterRegistry::new()
            .with(FilterDescriptor::new("notDeleted", "Document", Filter::equals("deleted", false)))
            .unwrap()
            .with(FilterDescriptor::new("published", "Document", Filter::IsNotNull("published_at".into())).default_enabled(false))
            .unwrap()
    }

    #[test]
    fn test_defaults_apply() {
        let active = registry().active_filters("Document", &FilterOverrides::new()).unwrap();
        let names: Vec<_> = active.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["notDeleted"]);
        assert!(registry().active_filters("User", &FilterOverrides::new()).unwrap().is_empty());
    }

    #[test]
    fn test_overrides_keep_registration_order() {
        let overrides = FilterOverrides::new().enable("published");
        let active = registry().active_filters("Document", &overrides).unwrap();
        let names: Vec<_> = active.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["notDeleted", "published"]);
    }

    #[test]
    fn test_duplicate_registration() {
        let err = registry()
            .with(FilterDescriptor::new("notDeleted", "Document", Filter::none()))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateDefinition);
    }

    #[test]
    fn test_parameterized_filter() {
        let mut filters = FilterRegistry::new();
        filters.register(tenant_filter()).unwrap();

        let err = filters.active_filters("Document", &FilterOverrides::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFilter);

        let mut args = FilterArgs::new();
        args.insert("tenantId".into(), FilterValue::Int(7));
        let overrides = FilterOverrides::new().with_args("tenant", args);
        let active = filters.active_filters("Document", &overrides).unwrap();
        assert_eq!(active[0].filter, Filter::equals("tenant_id", 7i64));
    }

    #[test]
    fn test_parameterized_default_args() {
        let mut filters = FilterRegistry::new();
        filters.register(tenant_filter().default_arg("tenantId", 1i64)).unwrap();
        let active = filters.active_filters("Document", &FilterOverrides::new()).unwrap();
        assert_eq!(active[0].filter, Filter::equals("tenant_id", 1i64));
    }

    #[test]
    fn test_merged_precedence() {
        let config = FilterOverrides::new().disable("notDeleted").enable("published");
        let call = FilterOverrides::new().enable("notDeleted");
        let merged = config.merged(&call);
        assert_eq!(merged.is_enabled("notDeleted"), Some(true));
        assert_eq!(merged.is_enabled("published"), Some(true));
    }

    #[test]
    fn test_validate_columns() {
        let metadata = MetadataRegistry::builder()
            .entity(EntityType::new("Document", "documents").columns(["id", "deleted"]))
            .build()
            .unwrap();

        assert!(
            FilterRegistry::new()
                .with(FilterDescriptor::new("notDeleted", "Document", Filter::equals("deleted", false)))
                .unwrap()
                .validate(&metadata)
                .is_ok()
        );

        let err = registry().validate(&metadata).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFilter);

        let err = FilterRegistry::new()
            .with(FilterDescriptor::new("x", "Ghost", Filter::none()))
            .unwrap()
            .validate(&metadata)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownEntity);
    }
}
