//! Relation resolution and strategy selection.
//!
//! Planning runs in two pure steps per fetch:
//!
//! - [`RelationGraphResolver`] expands populate paths and eager relations into
//!   a flat, parent-before-child list of relation nodes.
//! - [`StrategySelector`] decides JOINED or SELECT-IN for each node and groups
//!   the nodes into statements, producing a [`LoadPlan`].

mod populate;
mod resolver;
mod strategy;

pub use populate::PopulatePath;
pub use resolver::{RelationGraphResolver, RelationNode, ResolvedGraph};
pub use strategy::{LoadGroup, LoadPlan, PlannedRelation, StrategySelector};
