//! # prax-planner
//!
//! Relation loading for the Prax ORM: plans, compiles and assembles fetches
//! of a root entity together with a chosen subset of its relations.
//!
//! A fetch runs through these stages:
//! - [`relations::RelationGraphResolver`] expands populate paths and eager
//!   relations into a flat relation graph
//! - [`relations::StrategySelector`] loads each relation JOINED or SELECT-IN
//! - [`compiler::QueryCompiler`] builds one [`SelectStatement`] per group,
//!   folding global filters of joined targets into the JOIN's ON-condition
//! - [`assembler::RowAssembler`] turns rows into [`Record`] graphs
//! - [`dispatch::FollowUpDispatcher`] runs keyed SELECT-IN statements
//!
//! A relation whose target is filtered out or missing is absent on its owner.
//! It never removes the owner, so `fetch_one` returns `None` only when the
//! criteria match nothing.
//!
//! ## Filters
//!
//! ```rust
//! use prax_planner::{Filter, FilterValue};
//!
//! let not_deleted = Filter::equals("deleted", false);
//! let published = Filter::and([
//!     Filter::IsNotNull("published_at".into()),
//!     Filter::Gt("views".into(), FilterValue::Int(10)),
//! ]);
//! assert_eq!(published.columns(), vec!["published_at", "views"]);
//! # let _ = not_deleted;
//! ```
//!
//! ## Fetching
//!
//! ```rust,ignore
//! use prax_planner::prelude::*;
//!
//! let fetcher = Fetcher::new(planner, executor);
//! let user = fetcher
//!     .fetch_one("User")
//!     .r#where(Filter::equals("id", 1))
//!     .populate("lastDocument")
//!     .exec()
//!     .await?;
//! ```

pub mod assembler;
pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod filter;
pub mod filter_registry;
pub mod logging;
pub mod metadata;
pub mod operations;
pub mod planner;
pub mod record;
pub mod relations;
pub mod row;
pub mod sql;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use assembler::RowAssembler;
pub use compiler::{CompiledPlan, CompiledStatement, JoinKind, QueryCompiler, QueryScope, SelectStatement};
pub use config::PlannerConfig;
pub use dispatch::FollowUpDispatcher;
pub use error::{ErrorCode, QueryError, QueryResult};
pub use executor::{MemoryExecutor, StatementExecutor, execute_cancellable};
pub use filter::{Filter, FilterValue};
pub use filter_registry::{FilterDescriptor, FilterOverrides, FilterRegistry};
pub use metadata::{Cardinality, EntityType, MetadataRegistry, RelationDescriptor, Strategy};
pub use operations::{FetchManyOperation, FetchOneOperation, FetchOptions, Fetcher};
pub use planner::Planner;
pub use record::{Record, Related};
pub use relations::{LoadPlan, PopulatePath};
pub use row::Row;
pub use sql::DatabaseType;
pub use types::{OrderByField, SortOrder};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::PlannerConfig;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::executor::{MemoryExecutor, StatementExecutor};
    pub use crate::filter::{Filter, FilterValue};
    pub use crate::filter_registry::{FilterDescriptor, FilterOverrides, FilterRegistry};
    pub use crate::metadata::{DeclaredStrategy, EntityType, MetadataRegistry, RelationDescriptor, Strategy};
    pub use crate::operations::*;
    pub use crate::planner::Planner;
    pub use crate::record::{Record, Related};
    pub use crate::relations::PopulatePath;
    pub use crate::types::{OrderByField, SortOrder};
    pub use tokio_util::sync::CancellationToken;
}
