//! # Prax Fetch
//!
//! Relation-aware fetching for the Prax ORM.
//!
//! Prax Fetch provides:
//! - Populate paths over a declared entity graph, plus transitive eager relations
//! - JOINED or SELECT-IN loading per relation, consolidated per statement
//! - Named global filters that scope relations without ever hiding the root
//! - Async execution through a pluggable statement executor, with cancellation
//!
//! ## Quick Start
//!
//! ```rust
//! use prax_fetch::prelude::*;
//!
//! # tokio_test_block(async {
//! let metadata = MetadataRegistry::builder()
//!     .entity(EntityType::new("Document", "documents").columns(["id", "title", "deleted"]))
//!     .entity(
//!         EntityType::new("User", "users")
//!             .columns(["id", "last_document_id"])
//!             .relation(
//!                 RelationDescriptor::many_to_one("lastDocument", "Document", "last_document_id")
//!                     .nullable(true),
//!             ),
//!     )
//!     .build()?;
//! let filters = FilterRegistry::new()
//!     .with(FilterDescriptor::new("notDeleted", "Document", Filter::equals("deleted", false)))?;
//! let planner = Planner::new(metadata, filters, PlannerConfig::default())?;
//!
//! let executor = MemoryExecutor::new()
//!     .with_row("users", [("id", 1), ("last_document_id", 1)])
//!     .with_row("documents", [("id", FilterValue::Int(1)), ("title", "Draft".into()), ("deleted", true.into())]);
//!
//! let fetcher = Fetcher::new(planner, executor);
//! let user = fetcher
//!     .fetch_one("User")
//!     .r#where(Filter::equals("id", 1))
//!     .populate("lastDocument")
//!     .exec()
//!     .await?
//!     .expect("user exists");
//!
//! // The document is soft-deleted: the relation is absent, the user is not.
//! assert!(user.one("lastDocument").is_none());
//! # Ok::<(), QueryError>(())
//! # }).unwrap();
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// The planner, compiler, assembler and dispatcher.
pub mod planner {
    pub use prax_planner::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use prax_planner::prelude::*;
}

// Re-export key types at the crate root
pub use prax_planner::{
    Fetcher, Filter, FilterValue, MetadataRegistry, Planner, PlannerConfig, QueryError, QueryResult, Record,
};
