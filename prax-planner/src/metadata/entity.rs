//! Entity types.

use indexmap::IndexMap;

use super::relation::RelationDescriptor;

/// A registered entity: its table, columns and declared relations.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityType {
    /// Entity name used in populate paths and errors.
    pub name: String,
    /// Backing table.
    pub table: String,
    /// Primary key column.
    pub primary_key: String,
    /// Columns in declaration order.
    pub columns: Vec<String>,
    /// Relations in declaration order.
    pub relations: IndexMap<String, RelationDescriptor>,
}

impl EntityType {
    /// Create an entity with an `id` primary key.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: "id".to_string(),
            columns: Vec::new(),
            relations: IndexMap::new(),
        }
    }

    /// Set the primary key column.
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Declare columns; the primary key is added first if missing.
    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for column in columns {
            let column = column.into();
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        self
    }

    /// Declare a relation owned by this entity.
    pub fn relation(mut self, mut relation: RelationDescriptor) -> Self {
        relation.owner = self.name.clone();
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    /// Look up a relation by name.
    pub fn get_relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.get(name)
    }

    /// Check whether a column is declared.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Relations loaded without being requested.
    pub fn eager_relations(&self) -> impl Iterator<Item = &RelationDescriptor> {
        self.relations.values().filter(|r| r.eager)
    }

    pub(crate) fn ensure_primary_key_column(&mut self) {
        if !self.has_column(&self.primary_key) {
            self.columns.insert(0, self.primary_key.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_gets_owner() {
        let user = EntityType::new("User", "users")
            .columns(["id", "account_id"])
            .relation(RelationDescriptor::many_to_one("account", "Account", "account_id"));

        let account = user.get_relation("account").unwrap();
        assert_eq!(account.owner, "User");
        assert!(user.get_relation("posts").is_none());
    }

    #[test]
    fn test_columns_deduplicate() {
        let doc = EntityType::new("Document", "documents").columns(["id", "title", "id"]);
        assert_eq!(doc.columns, vec!["id", "title"]);
    }

    #[test]
    fn test_primary_key_column_is_ensured() {
        let mut tag = EntityType::new("Tag", "tags").primary_key("slug").columns(["label"]);
        tag.ensure_primary_key_column();
        assert_eq!(tag.columns, vec!["slug", "label"]);
    }

    #[test]
    fn test_eager_relations() {
        let user = EntityType::new("User", "users")
            .relation(RelationDescriptor::many_to_one("account", "Account", "account_id").eager(true))
            .relation(RelationDescriptor::many_to_one("lastDocument", "Document", "last_document_id"));

        let eager: Vec<_> = user.eager_relations().map(|r| r.name.as_str()).collect();
        assert_eq!(eager, vec!["account"]);
    }
}
