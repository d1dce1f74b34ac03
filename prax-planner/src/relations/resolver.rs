//! Relation graph resolution.
//!
//! Turns populate paths plus declared eager relations into a flat list of
//! relation nodes. Parents always precede their children, and every prefix of
//! a requested path is itself a requested node.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{QueryError, QueryResult};
use crate::metadata::{EntityType, MetadataRegistry, RelationDescriptor};

use super::populate::PopulatePath;

/// A relation to load, positioned in the relation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationNode {
    /// Index in [`ResolvedGraph::nodes`].
    pub id: usize,
    /// Parent node, `None` for relations of the root entity.
    pub parent: Option<usize>,
    /// Dotted path from the root.
    pub path: String,
    /// Nesting depth, 1 for relations of the root.
    pub depth: usize,
    /// The relation being loaded.
    pub relation: RelationDescriptor,
    /// Named by a populate path (directly or as a prefix).
    pub requested: bool,
}

impl RelationNode {
    /// Whether this relation is loaded by default.
    pub fn is_eager(&self) -> bool {
        self.relation.eager
    }
}

/// Output of [`RelationGraphResolver::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGraph {
    /// Root entity name.
    pub root: String,
    /// Requested paths, as given.
    pub requested: Vec<String>,
    /// Nodes in parent-before-child order.
    pub nodes: Vec<RelationNode>,
}

impl ResolvedGraph {
    /// Get a node by path.
    pub fn by_path(&self, path: &str) -> Option<&RelationNode> {
        self.nodes.iter().find(|n| n.path == path)
    }

    /// Direct children of a node (`None` for the root).
    pub fn children(&self, parent: Option<usize>) -> impl Iterator<Item = &RelationNode> {
        self.nodes.iter().filter(move |n| n.parent == parent)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if nothing is loaded beyond the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Resolves populate paths against metadata.
#[derive(Debug, Clone, Copy)]
pub struct RelationGraphResolver<'a> {
    metadata: &'a MetadataRegistry,
    max_depth: usize,
}

impl<'a> RelationGraphResolver<'a> {
    /// Create a resolver.
    pub fn new(metadata: &'a MetadataRegistry, max_depth: usize) -> Self {
        Self { metadata, max_depth }
    }

    /// Resolve requested paths and eager relations for `root`.
    ///
    /// Requested paths deeper than `max_depth` fail. Eager expansion stops
    /// silently at `max_depth` and never follows a relation already on the
    /// node's ancestor chain.
    pub fn resolve(&self, root: &str, populate: &[PopulatePath]) -> QueryResult<ResolvedGraph> {
        let root_entity = self.metadata.get(root)?;
        let mut nodes: Vec<RelationNode> = Vec::new();
        let mut by_path: IndexMap<String, usize> = IndexMap::new();

        for path in populate {
            if path.depth() > self.max_depth {
                return Err(QueryError::nesting_too_deep(path.to_string(), self.max_depth)
                    .with_entity(root));
            }

            let mut entity = root_entity;
            let mut parent = None;
            for (i, segment) in path.segments().iter().enumerate() {
                let relation = entity.get_relation(segment.as_str()).ok_or_else(|| {
                    QueryError::unknown_relation(&entity.name, segment.as_str(), entity.relations.keys())
                        .with_context(format!("Resolving populate path '{}'", path))
                })?;
                let node_path = path.prefix(i + 1);
                let id = match by_path.get(&node_path) {
                    Some(&id) => {
                        nodes[id].requested = true;
                        id
                    }
                    None => push_node(&mut nodes, &mut by_path, parent, node_path, relation, true),
                };
                parent = Some(id);
                entity = self.metadata.get(&relation.target)?;
            }
        }

        // Eager expansion: the root first, then every node, including nodes
        // appended by this loop.
        self.expand_eager(root_entity, None, 0, &mut nodes, &mut by_path)?;
        let mut cursor = 0;
        while cursor < nodes.len() {
            let (depth, target) = (nodes[cursor].depth, nodes[cursor].relation.target.clone());
            let entity = self.metadata.get(&target)?;
            self.expand_eager(entity, Some(cursor), depth, &mut nodes, &mut by_path)?;
            cursor += 1;
        }

        debug!(
            root = %root,
            requested = populate.len(),
            nodes = nodes.len(),
            "Resolved relation graph"
        );

        Ok(ResolvedGraph {
            root: root.to_string(),
            requested: populate.iter().map(ToString::to_string).collect(),
            nodes,
        })
    }

    fn expand_eager(
        &self,
        entity: &EntityType,
        parent: Option<usize>,
        depth: usize,
        nodes: &mut Vec<RelationNode>,
        by_path: &mut IndexMap<String, usize>,
    ) -> QueryResult<()> {
        if depth >= self.max_depth {
            return Ok(());
        }
        for relation in entity.eager_relations() {
            let path = match parent {
                Some(id) => format!("{}.{}", nodes[id].path, relation.name),
                None => relation.name.clone(),
            };
            if by_path.contains_key(&path) {
                continue;
            }
            if on_ancestor_chain(nodes, parent, relation) {
                trace!(path = %path, "Skipping eager relation already on the ancestor chain");
                continue;
            }
            push_node(nodes, by_path, parent, path, relation, false);
        }
        Ok(())
    }
}

fn push_node(
    nodes: &mut Vec<RelationNode>,
    by_path: &mut IndexMap<String, usize>,
    parent: Option<usize>,
    path: String,
    relation: &RelationDescriptor,
    requested: bool,
) -> usize {
    let id = nodes.len();
    let depth = parent.map_or(1, |p| nodes[p].depth + 1);
    by_path.insert(path.clone(), id);
    nodes.push(RelationNode {
        id,
        parent,
        path,
        depth,
        relation: relation.clone(),
        requested,
    });
    id
}

fn on_ancestor_chain(nodes: &[RelationNode], mut current: Option<usize>, relation: &RelationDescriptor) -> bool {
    while let Some(id) = current {
        let node = &nodes[id];
        if node.relation.owner == relation.owner && node.relation.name == relation.name {
            return true;
        }
        current = node.parent;
    }
    false
}
