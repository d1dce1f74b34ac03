//! Planner configuration (`prax.toml` sections).
//!
//! ```toml
//! [loading]
//! eager_strategy = "joined"
//! populate_strategy = "select_in"
//! max_depth = 8
//! batch_size = 1000
//! max_concurrency = 4
//!
//! [sql]
//! database = "postgresql"
//! max_identifier_length = 63
//! max_alias_suffix = 99
//!
//! [filters]
//! notDeleted = true
//!
//! [debug]
//! log_plans = false
//! log_statements = false
//! ```
//!
//! Values of the form `${VAR}` are replaced with the environment variable
//! before parsing.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::filter_registry::FilterOverrides;
use crate::metadata::Strategy;
use crate::sql::DatabaseType;

/// Complete planner configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerConfig {
    /// Relation loading defaults and limits.
    #[serde(default)]
    pub loading: LoadingConfig,

    /// SQL rendering settings.
    #[serde(default)]
    pub sql: SqlConfig,

    /// Process-wide filter defaults, by filter name.
    #[serde(default)]
    pub filters: IndexMap<String, bool>,

    /// Debug output settings.
    #[serde(default)]
    pub debug: DebugConfig,
}

impl PlannerConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| QueryError::configuration_io(path.display().to_string(), e))?;

        Self::from_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> QueryResult<Self> {
        let expanded = expand_env_vars(content);
        let config: Self = toml::from_str(&expanded)
            .map_err(|e| QueryError::invalid_configuration(e.message()).with_source(e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> QueryResult<()> {
        let loading = &self.loading;
        if loading.max_depth == 0 {
            return Err(QueryError::invalid_configuration("loading.max_depth must be at least 1"));
        }
        if loading.batch_size == 0 {
            return Err(QueryError::invalid_configuration("loading.batch_size must be at least 1"));
        }
        if loading.max_concurrency == 0 {
            return Err(QueryError::invalid_configuration(
                "loading.max_concurrency must be at least 1",
            ));
        }
        if self.sql.max_identifier_length < MIN_IDENTIFIER_LENGTH {
            return Err(QueryError::invalid_configuration(format!(
                "sql.max_identifier_length must be at least {}",
                MIN_IDENTIFIER_LENGTH
            )));
        }
        Ok(())
    }

    /// The `[filters]` table as the lowest override layer.
    pub fn filter_defaults(&self) -> FilterOverrides {
        let mut overrides = FilterOverrides::new();
        for (name, enabled) in &self.filters {
            overrides = overrides.set(name.as_str(), *enabled);
        }
        overrides
    }
}

/// Shortest identifier limit that still leaves room for `_NN` suffixes.
pub const MIN_IDENTIFIER_LENGTH: usize = 8;

/// `[loading]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoadingConfig {
    /// Strategy for eager relations that declare none.
    #[serde(default = "default_eager_strategy")]
    pub eager_strategy: Strategy,

    /// Strategy for requested relations that declare none.
    #[serde(default = "default_populate_strategy")]
    pub populate_strategy: Strategy,

    /// Maximum relation nesting depth.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum keys per follow-up statement.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum concurrently running follow-up statements.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            eager_strategy: default_eager_strategy(),
            populate_strategy: default_populate_strategy(),
            max_depth: default_max_depth(),
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_eager_strategy() -> Strategy { Strategy::Joined }
fn default_populate_strategy() -> Strategy { Strategy::SelectIn }
fn default_max_depth() -> usize { 8 }
fn default_batch_size() -> usize { 1000 }
fn default_max_concurrency() -> usize { 4 }

/// `[sql]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SqlConfig {
    /// Target database for rendered statements.
    #[serde(default)]
    pub database: DatabaseType,

    /// Longest alias the compiler may produce.
    #[serde(default = "default_max_identifier_length")]
    pub max_identifier_length: usize,

    /// Highest numeric suffix tried when aliases collide.
    #[serde(default = "default_max_alias_suffix")]
    pub max_alias_suffix: u32,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            database: DatabaseType::default(),
            max_identifier_length: default_max_identifier_length(),
            max_alias_suffix: default_max_alias_suffix(),
        }
    }
}

fn default_max_identifier_length() -> usize { 63 }
fn default_max_alias_suffix() -> u32 { 99 }

/// `[debug]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log every load plan at debug level.
    #[serde(default)]
    pub log_plans: bool,

    /// Log every rendered statement at debug level.
    #[serde(default)]
    pub log_statements: bool,
}

/// Expand environment variables in the format `${VAR_NAME}`.
fn expand_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([^}]+)\}") else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &regex_lite::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
