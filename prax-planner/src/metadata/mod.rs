//! Entity and relation metadata.
//!
//! The registry is assembled once with [`MetadataRegistryBuilder`], validated,
//! and then shared read-only (typically behind an `Arc`) by every fetch.
//!
//! ```rust
//! use prax_planner::metadata::{EntityType, MetadataRegistry, RelationDescriptor};
//!
//! let registry = MetadataRegistry::builder()
//!     .entity(EntityType::new("Account", "accounts").columns(["id", "name"]))
//!     .entity(
//!         EntityType::new("User", "users")
//!             .columns(["id", "account_id"])
//!             .relation(RelationDescriptor::many_to_one("account", "Account", "account_id")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let account = registry.relation("User", "account").unwrap();
//! assert_eq!(account.remote(), "id");
//! ```

pub mod entity;
pub mod relation;

pub use entity::EntityType;
pub use relation::{Cardinality, DeclaredStrategy, RelationDescriptor, Strategy};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{QueryError, QueryResult};

/// Immutable lookup of registered entity types.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: IndexMap<String, EntityType>,
}

impl MetadataRegistry {
    /// Start building a registry.
    pub fn builder() -> MetadataRegistryBuilder {
        MetadataRegistryBuilder::default()
    }

    /// Get an entity by name.
    pub fn get(&self, name: &str) -> QueryResult<&EntityType> {
        self.entities
            .get(name)
            .ok_or_else(|| QueryError::unknown_entity(name))
    }

    /// Get a relation declared on `entity`.
    pub fn relation(&self, entity: &str, relation: &str) -> QueryResult<&RelationDescriptor> {
        let owner = self.get(entity)?;
        owner.get_relation(relation).ok_or_else(|| {
            QueryError::unknown_relation(entity, relation, owner.relations.keys())
        })
    }

    /// Check if an entity is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Iterate over all entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityType> {
        self.entities.values()
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Builder collecting entity types before validation.
#[derive(Debug, Default)]
pub struct MetadataRegistryBuilder {
    entities: Vec<EntityType>,
}

impl MetadataRegistryBuilder {
    /// Add an entity type.
    pub fn entity(mut self, entity: EntityType) -> Self {
        self.entities.push(entity);
        self
    }

    /// Validate every entity and relation and freeze the registry.
    ///
    /// Fails on duplicate entity names, relations targeting unregistered
    /// entities and join columns that are not declared on their table.
    pub fn build(self) -> QueryResult<MetadataRegistry> {
        let mut entities: IndexMap<String, EntityType> = IndexMap::with_capacity(self.entities.len());
        for mut entity in self.entities {
            if entities.contains_key(&entity.name) {
                return Err(QueryError::duplicate("Entity", &entity.name));
            }
            entity.ensure_primary_key_column();
            entities.insert(entity.name.clone(), entity);
        }

        let primary_keys: IndexMap<String, String> = entities
            .values()
            .map(|e| (e.name.clone(), e.primary_key.clone()))
            .collect();

        for entity in entities.values_mut() {
            let owner_pk = entity.primary_key.clone();
            for relation in entity.relations.values_mut() {
                let target_pk = primary_keys.get(&relation.target).ok_or_else(|| {
                    QueryError::unknown_entity(&relation.target)
                        .with_relation(format!("{}.{}", relation.owner, relation.name))
                })?;
                if relation.local_column.is_none() {
                    relation.local_column = Some(if relation.owning {
                        format!("{}_id", relation.name)
                    } else {
                        owner_pk.clone()
                    });
                }
                if relation.remote_column.is_none() {
                    relation.remote_column = Some(target_pk.clone());
                }
            }
        }

        for entity in entities.values() {
            for relation in entity.relations.values() {
                if !entity.has_column(relation.local()) {
                    return Err(QueryError::unknown_column(&entity.name, relation.local())
                        .with_relation(&relation.name));
                }
                let target = &entities[&relation.target];
                if !target.has_column(relation.remote()) {
                    return Err(QueryError::unknown_column(&target.name, relation.remote())
                        .with_relation(format!("{}.{}", entity.name, relation.name)));
                }
            }
        }

        debug!(entities = entities.len(), "Metadata registry built");
        Ok(MetadataRegistry { entities })
    }
}
