//! Shared unit test model: users with an account, documents and a manager.

use crate::filter::Filter;
use crate::filter_registry::{FilterDescriptor, FilterRegistry};
use crate::metadata::{EntityType, MetadataRegistry, RelationDescriptor};

pub(crate) fn metadata() -> MetadataRegistry {
    MetadataRegistry::builder()
        .entity(
            EntityType::new("Account", "accounts")
                .columns(["id", "name", "owner_id"])
                .relation(RelationDescriptor::many_to_one("owner", "User", "owner_id").nullable(true))
                .relation(RelationDescriptor::has_many("users", "User", "account_id")),
        )
        .entity(
            EntityType::new("User", "users")
                .columns(["id", "name", "account_id", "last_document_id", "manager_id"])
                .relation(RelationDescriptor::many_to_one("account", "Account", "account_id").eager(true))
                .relation(
                    RelationDescriptor::many_to_one("lastDocument", "Document", "last_document_id")
                        .nullable(true),
                )
                .relation(RelationDescriptor::many_to_one("manager", "User", "manager_id").nullable(true))
                .relation(RelationDescriptor::has_many("documents", "Document", "author_id")),
        )
        .entity(
            EntityType::new("Document", "documents")
                .columns(["id", "title", "deleted", "author_id"])
                .relation(RelationDescriptor::many_to_one("author", "User", "author_id").nullable(true)),
        )
        .build()
        .expect("fixture metadata is valid")
}

pub(crate) fn filters() -> FilterRegistry {
    let mut filters = FilterRegistry::new();
    filters
        .register(FilterDescriptor::new(
            "notDeleted",
            "Document",
            Filter::equals("deleted", false),
        ))
        .expect("fixture filter registers");
    filters
}
