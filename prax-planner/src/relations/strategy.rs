//! Strategy selection and load plans.
//!
//! Each resolved relation is loaded either JOINED into its owner's statement
//! or SELECT-IN through a separate keyed statement. A statement is a *group*:
//! the fetch root or a SELECT-IN relation, plus every joined relation beneath
//! it.
//!
//! Selection rules:
//!
//! 1. To-one relations declared `Joined`, or eager with no declared strategy
//!    while the eager default is `Joined`, are joined.
//! 2. Requested relations declared `SelectIn` or with no declared strategy
//!    are joined (and flagged `upgraded`) when their group already has a
//!    relation from rule 1. Otherwise they fall back to the populate default.
//! 3. To-many relations are always SELECT-IN.

use std::fmt;

use tracing::debug;

use crate::config::LoadingConfig;
use crate::metadata::{DeclaredStrategy, Strategy};

use super::resolver::{RelationNode, ResolvedGraph};

/// A relation with its chosen strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRelation {
    /// The resolved relation.
    pub node: RelationNode,
    /// Strategy used to load it.
    pub strategy: Strategy,
    /// Joined only because its group already joins (rule 2).
    pub upgraded: bool,
    /// Index of the group whose statement loads this relation.
    pub group: usize,
}

impl PlannedRelation {
    /// Dotted path from the root.
    pub fn path(&self) -> &str {
        &self.node.path
    }

    /// Whether this relation is loaded through a JOIN.
    pub fn is_joined(&self) -> bool {
        self.strategy.is_joined()
    }
}

/// One statement of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadGroup {
    /// Index in [`LoadPlan::groups`]; 0 is the primary group.
    pub index: usize,
    /// The SELECT-IN relation rooting this group, `None` for the primary.
    pub root: Option<usize>,
    /// Group that loads the owners of [`Self::root`].
    pub parent_group: Option<usize>,
    /// Execution wave: 0 for the primary, then one more per SELECT-IN level.
    pub wave: usize,
    /// Joined relations in parent-before-child order.
    pub joined: Vec<usize>,
}

impl LoadGroup {
    /// Check if this is the primary group.
    pub fn is_primary(&self) -> bool {
        self.root.is_none()
    }
}

/// The full loading plan for one fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadPlan {
    /// Root entity name.
    pub root: String,
    /// Requested populate paths.
    pub requested: Vec<String>,
    /// Relations indexed by node id.
    pub relations: Vec<PlannedRelation>,
    /// Statements, primary first.
    pub groups: Vec<LoadGroup>,
}

impl LoadPlan {
    /// Get a relation by node id.
    pub fn relation(&self, id: usize) -> &PlannedRelation {
        &self.relations[id]
    }

    /// Get a relation by path.
    pub fn by_path(&self, path: &str) -> Option<&PlannedRelation> {
        self.relations.iter().find(|r| r.node.path == path)
    }

    /// The primary group.
    pub fn primary(&self) -> &LoadGroup {
        &self.groups[0]
    }

    /// SELECT-IN groups in creation order.
    pub fn follow_ups(&self) -> &[LoadGroup] {
        &self.groups[1..]
    }

    /// Follow-up group indexes per wave, starting at wave 1.
    pub fn waves(&self) -> Vec<Vec<usize>> {
        let max_wave = self.groups.iter().map(|g| g.wave).max().unwrap_or(0);
        (1..=max_wave)
            .map(|wave| {
                self.groups
                    .iter()
                    .filter(|g| g.wave == wave)
                    .map(|g| g.index)
                    .collect()
            })
            .collect()
    }

    /// Joined relations directly under `parent` within `group`.
    pub fn joined_children(&self, group: usize, parent: Option<usize>) -> impl Iterator<Item = &PlannedRelation> {
        self.groups[group]
            .joined
            .iter()
            .map(|&id| &self.relations[id])
            .filter(move |r| r.node.parent == parent)
    }

    /// Check if the whole plan runs as one statement.
    pub fn is_single_statement(&self) -> bool {
        self.groups.len() == 1
    }
}

impl fmt::Display for LoadPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LoadPlan {} ({} statements)", self.root, self.groups.len())?;
        for relation in &self.relations {
            writeln!(
                f,
                "{}{} [{}{}] group={}",
                "  ".repeat(relation.node.depth),
                relation.node.path,
                relation.strategy,
                if relation.upgraded { ", upgraded" } else { "" },
                relation.group
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intrinsic {
    Joined,
    SelectIn,
    Pending { requested: bool },
}

/// Chooses a strategy for every resolved relation.
#[derive(Debug, Clone, Copy)]
pub struct StrategySelector {
    eager_default: Strategy,
    populate_default: Strategy,
}

impl StrategySelector {
    /// Create a selector with explicit defaults.
    pub fn new(eager_default: Strategy, populate_default: Strategy) -> Self {
        Self {
            eager_default,
            populate_default,
        }
    }

    /// Create a selector from the `[loading]` configuration.
    pub fn from_config(config: &LoadingConfig) -> Self {
        Self::new(config.eager_strategy, config.populate_strategy)
    }

    /// Build the load plan. Deterministic for a given graph.
    pub fn select(&self, graph: ResolvedGraph) -> LoadPlan {
        let intrinsic: Vec<Intrinsic> = graph.nodes.iter().map(|n| self.intrinsic(n)).collect();

        // Groups that already join: the nearest non-rule-1 ancestor of every
        // rule-1 relation (`None` is the root).
        let mut anchors: Vec<Option<usize>> = Vec::new();
        for node in &graph.nodes {
            if intrinsic[node.id] != Intrinsic::Joined {
                continue;
            }
            let mut anchor = node.parent;
            while let Some(id) = anchor {
                if intrinsic[id] != Intrinsic::Joined {
                    break;
                }
                anchor = graph.nodes[id].parent;
            }
            if !anchors.contains(&anchor) {
                anchors.push(anchor);
            }
        }

        let mut groups = vec![LoadGroup {
            index: 0,
            root: None,
            parent_group: None,
            wave: 0,
            joined: Vec::new(),
        }];
        // Statement root (None = fetch root) of each relation's group.
        let mut group_roots: Vec<Option<usize>> = Vec::with_capacity(graph.nodes.len());
        let mut relations: Vec<PlannedRelation> = Vec::with_capacity(graph.nodes.len());

        for node in graph.nodes {
            let (owner_group, group_root) = match node.parent {
                None => (0, None),
                Some(parent) => (relations[parent].group, group_roots[parent]),
            };

            let (strategy, upgraded) = match intrinsic[node.id] {
                Intrinsic::Joined => (Strategy::Joined, false),
                Intrinsic::SelectIn => (Strategy::SelectIn, false),
                Intrinsic::Pending { requested: true } => {
                    if anchors.contains(&group_root) {
                        debug!(path = %node.path, "Upgrading requested relation to joined");
                        (Strategy::Joined, true)
                    } else {
                        (self.populate_default, false)
                    }
                }
                Intrinsic::Pending { requested: false } => (Strategy::SelectIn, false),
            };

            let group = if strategy.is_joined() {
                groups[owner_group].joined.push(node.id);
                group_roots.push(group_root);
                owner_group
            } else {
                let index = groups.len();
                groups.push(LoadGroup {
                    index,
                    root: Some(node.id),
                    parent_group: Some(owner_group),
                    wave: groups[owner_group].wave + 1,
                    joined: Vec::new(),
                });
                group_roots.push(Some(node.id));
                index
            };

            relations.push(PlannedRelation {
                node,
                strategy,
                upgraded,
                group,
            });
        }

        let plan = LoadPlan {
            root: graph.root,
            requested: graph.requested,
            relations,
            groups,
        };
        debug!(
            root = %plan.root,
            relations = plan.relations.len(),
            statements = plan.groups.len(),
            "Selected load strategies"
        );
        plan
    }

    fn intrinsic(&self, node: &RelationNode) -> Intrinsic {
        let relation = &node.relation;
        if relation.cardinality.is_many() {
            if relation.strategy == DeclaredStrategy::Joined {
                debug!(path = %node.path, "To-many relation declared joined; loading with select-in");
            }
            return Intrinsic::SelectIn;
        }
        match relation.strategy {
            DeclaredStrategy::Joined => Intrinsic::Joined,
            DeclaredStrategy::Unset if relation.eager && self.eager_default.is_joined() => Intrinsic::Joined,
            _ => Intrinsic::Pending {
                requested: node.requested,
            },
        }
    }
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::from_config(&LoadingConfig::default())
    }
}
