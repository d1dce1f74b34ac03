//! Integration tests for planning and statement compilation.

use pretty_assertions::assert_eq;
use prax_fetch::planner::compiler::{JoinKind, PredicateSource, QueryScope};
use prax_fetch::planner::{DatabaseType, ErrorCode, LoadPlan};
use prax_fetch::prelude::*;

/// Blog model: posts with an author, an optional editor, a category tree and
/// comments. `Comment` and `Post` carry soft-delete filters.
fn planner(config: PlannerConfig) -> Planner {
    let metadata = MetadataRegistry::builder()
        .entity(
            EntityType::new("Author", "authors")
                .columns(["id", "name", "banned"])
                .relation(RelationDescriptor::has_many("posts", "Post", "author_id")),
        )
        .entity(
            EntityType::new("Category", "categories")
                .columns(["id", "label", "parent_id"])
                .relation(RelationDescriptor::many_to_one("parent", "Category", "parent_id").nullable(true)),
        )
        .entity(
            EntityType::new("Post", "posts")
                .columns(["id", "title", "deleted_at", "author_id", "editor_id", "category_id"])
                .relation(RelationDescriptor::many_to_one("author", "Author", "author_id").eager(true))
                .relation(RelationDescriptor::many_to_one("editor", "Author", "editor_id").nullable(true))
                .relation(
                    RelationDescriptor::many_to_one("category", "Category", "category_id")
                        .nullable(true)
                        .strategy(DeclaredStrategy::SelectIn),
                )
                .relation(RelationDescriptor::has_many("comments", "Comment", "post_id")),
        )
        .entity(
            EntityType::new("Comment", "comments")
                .columns(["id", "body", "hidden", "post_id", "author_id"])
                .relation(RelationDescriptor::many_to_one("author", "Author", "author_id").nullable(true)),
        )
        .build()
        .expect("valid metadata");

    let filters = FilterRegistry::new()
        .with(FilterDescriptor::new("visible", "Comment", Filter::equals("hidden", false)))
        .and_then(|f| f.with(FilterDescriptor::new("live", "Post", Filter::IsNull("deleted_at".into()))))
        .and_then(|f| {
            f.with(FilterDescriptor::new("notBanned", "Author", Filter::equals("banned", false)).default_enabled(false))
        })
        .expect("valid filters");

    Planner::new(metadata, filters, config).expect("valid planner")
}

fn paths(populate: &[&str]) -> Vec<PopulatePath> {
    populate.iter().map(|p| PopulatePath::parse(p).unwrap()).collect()
}

fn plan(populate: &[&str]) -> LoadPlan {
    planner(PlannerConfig::default()).plan("Post", &paths(populate)).unwrap()
}

#[test]
fn test_where_only_references_group_roots() {
    let planner = planner(PlannerConfig::default());
    let cases: &[&[&str]] = &[
        &[],
        &["editor"],
        &["category.parent"],
        &["comments.author.posts"],
        &["editor.posts.comments", "category"],
    ];
    let scope = QueryScope {
        criteria: Filter::equals("id", 1),
        filters: FilterOverrides::new().enable("notBanned"),
        ..Default::default()
    };

    for populate in cases {
        let compiled = planner.compile("Post", &paths(populate), &scope).unwrap();
        for statement in &compiled.statements {
            let root = &statement.statement.from.alias;
            for predicate in &statement.statement.where_clause.predicates {
                assert_eq!(&predicate.alias, root, "{:?}", populate);
            }
        }
    }
}

#[test]
fn test_requested_to_one_joins_next_to_eager_relation() {
    let plan = plan(&["editor"]);
    let editor = plan.by_path("editor").unwrap();
    assert!(editor.is_joined());
    assert!(editor.upgraded);
    assert!(plan.is_single_statement());
}

#[test]
fn test_declared_select_in_is_upgraded_when_requested() {
    // `category` is declared select-in but its group already joins `author`.
    let plan = plan(&["category"]);
    assert!(plan.by_path("category").unwrap().upgraded);
}

#[test]
fn test_to_many_is_always_select_in() {
    let plan = plan(&["comments.author"]);
    let comments = plan.by_path("comments").unwrap();
    assert!(!comments.is_joined());
    assert_eq!(plan.groups[comments.group].wave, 1);

    // Nothing joins inside the comments group, so the default applies.
    let author = plan.by_path("comments.author").unwrap();
    assert!(!author.is_joined());
    assert_eq!(plan.groups[author.group].wave, 2);
    assert_eq!(plan.waves(), vec![vec![comments.group], vec![author.group]]);
}

#[test]
fn test_join_kinds() {
    let compiled = planner(PlannerConfig::default())
        .compile("Post", &paths(&["editor"]), &QueryScope::default())
        .unwrap();
    let statement = &compiled.primary().statement;
    assert_eq!(statement.join("author").unwrap().kind, JoinKind::Inner);
    assert_eq!(statement.join("editor").unwrap().kind, JoinKind::Left);

    // A filtered target is never INNER, even when eager and required.
    let scope = QueryScope {
        filters: FilterOverrides::new().enable("notBanned"),
        ..Default::default()
    };
    let compiled = planner(PlannerConfig::default())
        .compile("Post", &paths(&[]), &scope)
        .unwrap();
    let author = compiled.primary().statement.join("author").unwrap();
    assert_eq!(author.kind, JoinKind::Left);
    assert!(!author.filter_safe);
}

#[test]
fn test_follow_up_statements_are_keyed_and_filtered() {
    let compiled = planner(PlannerConfig::default())
        .compile("Post", &paths(&["comments"]), &QueryScope::default())
        .unwrap();
    let comments = &compiled.statements[1].statement;
    let sources: Vec<_> = comments
        .where_clause
        .predicates
        .iter()
        .map(|p| p.source.clone())
        .collect();
    assert_eq!(
        sources,
        vec![PredicateSource::KeyLookup, PredicateSource::Filter("visible".into())]
    );

    // The primary statement's root filter stays in WHERE.
    let primary = &compiled.primary().statement;
    assert_eq!(
        primary.where_clause.predicates[0].source,
        PredicateSource::Filter("live".into())
    );
}

#[test]
fn test_mysql_rendering() {
    let config = PlannerConfig::from_str("[sql]\ndatabase = \"mysql\"").unwrap();
    let planner = planner(config);
    let scope = QueryScope {
        criteria: Filter::equals("id", 7),
        ..Default::default()
    };
    let compiled = planner.compile("Post", &paths(&["editor"]), &scope).unwrap();
    let (sql, params) = compiled
        .primary()
        .statement
        .to_sql(planner.config().sql.database);
    assert_eq!(planner.config().sql.database, DatabaseType::MySQL);

    assert!(sql.ends_with("WHERE post.id = ? AND post.deleted_at IS NULL"), "{sql}");
    assert!(!sql.contains('$'));
    assert_eq!(params, vec![FilterValue::Int(7)]);
}

#[test]
fn test_nesting_too_deep() {
    let mut config = PlannerConfig::default();
    config.loading.max_depth = 2;
    let err = planner(config)
        .plan("Post", &paths(&["category.parent.parent"]))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NestingTooDeep);
}

#[test]
fn test_requested_paths_may_revisit_entities() {
    let plan = plan(&["author.posts.author.posts"]);
    assert_eq!(plan.by_path("author.posts.author.posts").map(|r| r.node.depth), Some(4));
}

#[test]
fn test_explain_lists_every_statement() {
    let explain = planner(PlannerConfig::default())
        .explain("Post", &paths(&["comments", "editor"]), &QueryScope::default())
        .unwrap();
    assert!(explain.contains("editor [joined, upgraded] group=0"));
    assert!(explain.contains("comments [select_in] group=1"));
    assert!(explain.contains("[1] SELECT"));
}
