//! Relation descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How many target rows a relation resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// At most one related row (many-to-one, one-to-one).
    ToOne,
    /// Any number of related rows (one-to-many).
    ToMany,
}

impl Cardinality {
    /// Check if this relation returns a single record.
    pub fn is_one(&self) -> bool {
        matches!(self, Self::ToOne)
    }

    /// Check if this relation returns multiple records.
    pub fn is_many(&self) -> bool {
        matches!(self, Self::ToMany)
    }
}

/// Loading strategy declared on the relation metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeclaredStrategy {
    /// Always load through a JOIN in the owner's statement.
    Joined,
    /// Always load through a separate keyed statement.
    SelectIn,
    /// No preference; configuration defaults apply.
    #[default]
    Unset,
}

/// Strategy a relation is actually loaded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// JOIN inside the owner's statement.
    Joined,
    /// Separate statement keyed by collected owner values.
    SelectIn,
}

impl Strategy {
    /// Check if this is the join strategy.
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Joined => "joined",
            Self::SelectIn => "select_in",
        })
    }
}

/// Specification of a relation between two entity types.
///
/// The join is always expressed as `owner.local = target.remote`. For an
/// owning to-one relation `local` is the foreign key and `remote` the
/// target's primary key; for inverse to-one and to-many relations `local` is
/// the owner's primary key and `remote` the foreign key on the target. Unset
/// key columns default to the relevant primary key when the registry is built.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDescriptor {
    /// Name of the relation (field name on the owner).
    pub name: String,
    /// Owning entity name, filled in when attached to an entity.
    pub owner: String,
    /// Target entity name.
    pub target: String,
    /// Cardinality of the relation.
    pub cardinality: Cardinality,
    /// Whether the relation may be absent.
    pub nullable: bool,
    /// Whether the relation loads without being requested.
    pub eager: bool,
    /// Declared loading strategy.
    pub strategy: DeclaredStrategy,
    /// Whether the foreign key lives on the owner.
    pub owning: bool,
    /// Join column on the owner.
    pub local_column: Option<String>,
    /// Join column on the target.
    pub remote_column: Option<String>,
}

impl RelationDescriptor {
    fn base(name: impl Into<String>, target: impl Into<String>, cardinality: Cardinality, owning: bool) -> Self {
        Self {
            name: name.into(),
            owner: String::new(),
            target: target.into(),
            cardinality,
            nullable: false,
            eager: false,
            strategy: DeclaredStrategy::Unset,
            owning,
            local_column: None,
            remote_column: None,
        }
    }

    /// Owning to-one relation: `foreign_key` on the owner references the target.
    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        let mut relation = Self::base(name, target, Cardinality::ToOne, true);
        relation.local_column = Some(foreign_key.into());
        relation
    }

    /// Owning one-to-one relation; loads exactly like [`Self::many_to_one`].
    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::many_to_one(name, target, foreign_key)
    }

    /// Inverse to-one relation: `foreign_key` on the target references the owner.
    ///
    /// The inverse side can always be missing, so it is nullable.
    pub fn has_one(name: impl Into<String>, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        let mut relation = Self::base(name, target, Cardinality::ToOne, false);
        relation.remote_column = Some(foreign_key.into());
        relation.nullable = true;
        relation
    }

    /// One-to-many relation: `foreign_key` on the target references the owner.
    pub fn has_many(name: impl Into<String>, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        let mut relation = Self::base(name, target, Cardinality::ToMany, false);
        relation.remote_column = Some(foreign_key.into());
        relation.nullable = true;
        relation
    }

    /// Set nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark the relation eager (loaded without an explicit populate).
    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    /// Set the declared strategy.
    pub fn strategy(mut self, strategy: DeclaredStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Override the owner-side join column.
    pub fn local_column(mut self, column: impl Into<String>) -> Self {
        self.local_column = Some(column.into());
        self
    }

    /// Override the target-side join column.
    pub fn remote_column(mut self, column: impl Into<String>) -> Self {
        self.remote_column = Some(column.into());
        self
    }

    /// Owner-side join column. Always set once the registry is built.
    pub fn local(&self) -> &str {
        self.local_column.as_deref().unwrap_or_default()
    }

    /// Target-side join column. Always set once the registry is built.
    pub fn remote(&self) -> &str {
        self.remote_column.as_deref().unwrap_or_default()
    }

    /// Whether a JOIN may ever be used for this relation.
    pub fn joinable(&self) -> bool {
        self.cardinality.is_one()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality() {
        assert!(Cardinality::ToOne.is_one());
        assert!(Cardinality::ToMany.is_many());
        assert!(!Cardinality::ToMany.is_one());
    }

    #[test]
    fn test_many_to_one_defaults() {
        let relation = RelationDescriptor::many_to_one("account", "Account", "account_id");
        assert!(relation.owning);
        assert!(!relation.nullable);
        assert_eq!(relation.local(), "account_id");
        assert_eq!(relation.remote_column, None);
        assert_eq!(relation.strategy, DeclaredStrategy::Unset);
    }

    #[test]
    fn test_inverse_relations_are_nullable() {
        let profile = RelationDescriptor::has_one("profile", "Profile", "user_id");
        assert!(!profile.owning);
        assert!(profile.nullable);
        assert_eq!(profile.remote(), "user_id");

        let posts = RelationDescriptor::has_many("posts", "Post", "author_id");
        assert!(posts.cardinality.is_many());
        assert!(!posts.joinable());
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::Joined.to_string(), "joined");
        assert_eq!(Strategy::SelectIn.to_string(), "select_in");
    }
}
