//! Integration tests for the query engine.

use std::sync::Arc;

use graphplan::core::{ErrorKind, JoinOverride, LinkTable, MemberDef, ScalarType, TypeDescriptor};
use graphplan::proto::{ExpandSpec, FilterExpr, OrderSpec, QueryRequest, Value};
use graphplan::{EngineConfig, MemoryExecutor, QueryEngine, SplitMode, TypeMetadata};
use pretty_assertions::assert_eq;
use serde::Deserialize;

fn blog_metadata() -> TypeMetadata {
    TypeMetadata::init(vec![
        TypeDescriptor::new("User")
            .with_table("Users")
            .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
            .with_member(MemberDef::scalar("Name", ScalarType::String))
            .with_member(MemberDef::collection("Posts", "Post"))
            .with_member(MemberDef::collection("Comments", "Comment")),
        TypeDescriptor::new("Post")
            .with_table("Posts")
            .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
            .with_member(MemberDef::scalar("AuthorId", ScalarType::Int32).with_foreign_key("User"))
            .with_member(MemberDef::scalar("Title", ScalarType::String))
            .with_member(MemberDef::scalar("Views", ScalarType::Int64))
            .with_member(MemberDef::navigation("Author", "User"))
            .with_member(MemberDef::collection("Tags", "Tag")),
        TypeDescriptor::new("Comment")
            .with_table("Comments")
            .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
            .with_member(MemberDef::scalar("UserId", ScalarType::Int32).with_foreign_key("User"))
            .with_member(MemberDef::scalar("Body", ScalarType::String)),
        TypeDescriptor::new("Tag")
            .with_table("Tags")
            .with_member(MemberDef::scalar("Id", ScalarType::Int32).with_key())
            .with_member(MemberDef::scalar("Label", ScalarType::String)),
    ])
    .unwrap()
}

fn blog_executor() -> MemoryExecutor {
    let executor = MemoryExecutor::new();
    for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
        executor.insert("Users", [("Id", Value::from(id)), ("Name", Value::from(name))]);
    }
    for (id, author, title, views) in [
        (10, 1, "First Post", 100i64),
        (11, 1, "Second Post", 50),
        (12, 2, "Bob's Post", 75),
    ] {
        executor.insert(
            "Posts",
            [
                ("Id", Value::from(id)),
                ("AuthorId", Value::from(author)),
                ("Title", Value::from(title)),
                ("Views", Value::from(views)),
            ],
        );
    }
    for (id, user, body) in [(20, 1, "nice"), (21, 3, "first!"), (22, 3, "again")] {
        executor.insert(
            "Comments",
            [("Id", Value::from(id)), ("UserId", Value::from(user)), ("Body", Value::from(body))],
        );
    }
    for (id, label) in [(30, "rust"), (31, "db")] {
        executor.insert("Tags", [("Id", Value::from(id)), ("Label", Value::from(label))]);
    }
    for (post, tag) in [(10, 30), (10, 31), (12, 31)] {
        executor.insert("PostTags", [("PostId", Value::from(post)), ("TagId", Value::from(tag))]);
    }
    executor
}

fn engine(config: EngineConfig) -> QueryEngine<MemoryExecutor> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    QueryEngine::new(Arc::new(blog_metadata()), blog_executor(), config)
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct User {
    id: i32,
    name: String,
    #[serde(default)]
    posts: Vec<Post>,
    #[serde(default)]
    comments: Vec<Comment>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct Post {
    title: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct Comment {
    body: String,
}

#[test]
fn test_split_query_with_count() {
    let engine = engine(EngineConfig::default());
    let request = QueryRequest::new("User")
        .expand(ExpandSpec::new("Posts").with_order(OrderSpec::desc("Views")))
        .expand(ExpandSpec::new("Comments").with_order(OrderSpec::asc("Id")))
        .with_order(OrderSpec::asc("Name"))
        .with_top(2)
        .with_count();

    assert!(engine.plan(&request).unwrap().is_split());
    let output = engine.query(&request).unwrap();

    assert_eq!(output.count, Some(3));
    let names: Vec<_> = output.records.iter().map(|r| r.get("Name").cloned()).collect();
    assert_eq!(names, vec![Some(Value::from("alice")), Some(Value::from("bob"))]);

    let titles: Vec<_> = output.records[0]
        .many("Posts")
        .iter()
        .map(|p| p.get("Title").cloned())
        .collect();
    assert_eq!(
        titles,
        vec![Some(Value::from("First Post")), Some(Value::from("Second Post"))]
    );
    assert_eq!(output.records[0].many("Comments").len(), 1);
    assert_eq!(output.records[1].many("Posts").len(), 1);
    assert!(output.records[1].many("Comments").is_empty());
}

#[test]
fn test_query_as_typed() {
    let engine = engine(EngineConfig::default());
    let request = QueryRequest::new("User")
        .expand(ExpandSpec::new("Posts").with_order(OrderSpec::asc("Id")))
        .expand(ExpandSpec::new("Comments").with_order(OrderSpec::asc("Id")))
        .with_filter(FilterExpr::eq("Name", "carol"));

    let users: Vec<User> = engine.query_as(&request).unwrap();
    assert_eq!(
        users,
        vec![User {
            id: 3,
            name: "carol".to_string(),
            posts: vec![],
            comments: vec![
                Comment {
                    body: "first!".to_string()
                },
                Comment {
                    body: "again".to_string()
                },
            ],
        }]
    );
}

#[test]
fn test_link_table_override_invalidates_cached_plans() {
    let engine = engine(EngineConfig::default());
    let request = QueryRequest::new("Post").expand(ExpandSpec::new("Tags"));

    let err = engine.query(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let plain = QueryRequest::new("Post");
    engine.plan(&plain).unwrap();
    assert_eq!(engine.cache().len(), 1);

    engine
        .metadata()
        .register_override(JoinOverride::linked(
            "Post",
            "Tags",
            LinkTable::new("PostTags", "Id", "PostId", "TagId", "Id"),
        ))
        .unwrap();

    let output = engine
        .query(&request.with_order(OrderSpec::asc("Id")))
        .unwrap();
    let labels: Vec<usize> = output.records.iter().map(|r| r.many("Tags").len()).collect();
    assert_eq!(labels, vec![2, 0, 1]);

    // The plain plan was built against the old generation.
    let misses = engine.cache().stats().misses();
    engine.plan(&plain).unwrap();
    assert_eq!(engine.cache().stats().misses(), misses + 1);
}

#[test]
fn test_split_modes_agree() {
    let request = QueryRequest::new("User")
        .expand(ExpandSpec::new("Posts").with_order(OrderSpec::asc("Id")))
        .expand(ExpandSpec::new("Comments").with_order(OrderSpec::asc("Id")))
        .with_order(OrderSpec::asc("Id"));

    let split = engine(EngineConfig::default()).query(&request).unwrap();
    let mut planner = EngineConfig::default().planner;
    planner.split_mode = SplitMode::Never;
    let flat = engine(EngineConfig::default().with_planner(planner))
        .query(&request)
        .unwrap();

    assert_eq!(split, flat);
}

#[test]
fn test_explain() {
    let engine = engine(EngineConfig::default());
    let request = QueryRequest::new("User")
        .expand(ExpandSpec::new("Posts"))
        .expand(ExpandSpec::new("Comments"))
        .with_count();

    let text = engine.explain(&request).unwrap();
    assert!(text.starts_with("-- seed\nSELECT "));
    assert!(text.contains("-- path\nSELECT DISTINCT "));
    assert!(text.contains("-- secondary 2"));
    assert!(text.contains("-- count"));
    assert!(text.contains("COUNT(*) AS \"$count\""));
}

#[test]
fn test_configuration_errors() {
    let engine = engine(EngineConfig::default());

    let err = engine.query(&QueryRequest::new("Invoice")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(err.to_string(), "unknown type 'Invoice'");

    let err = engine
        .query(&QueryRequest::new("Post").with_order(OrderSpec::asc("Body")))
        .unwrap_err();
    assert_eq!(err.to_string(), "illegal column 'Body' on type 'Post'");
}
