//! End-to-end tests for jobs: statement iteration, failure handling, JSON
//! jobs and schema-driven cleanup.

use std::sync::Arc;

use cartography::execution::MemoryMetrics;
use cartography::{
    property_map, CleanupOptions, Error, GraphJob, GraphStatement, LinkDirection, MemoryStore, NodeSchema,
    PropertyMap, PropertyRef, QueryCounters, QueryResult, RelSchema, RunStatus, Session, SessionConfig, StoreError,
    UpdateTag, Value,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

fn widget() -> NodeSchema {
    let owner = RelSchema::builder("Owner", "RESOURCE", LinkDirection::Inward)
        .target_matcher("id", PropertyRef::kwarg("OwnerId"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .build()
        .unwrap();
    NodeSchema::builder("Widget")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .sub_resource(owner)
        .build()
        .unwrap()
}

fn can_read() -> RelSchema {
    RelSchema::builder("Bucket", "CAN_READ", LinkDirection::Outward)
        .source("Principal")
        .source_matcher("id", PropertyRef::record("PrincipalId"))
        .target_matcher("id", PropertyRef::record("BucketId"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .property("_sub_resource_label", PropertyRef::kwarg("_sub_resource_label"))
        .property("_sub_resource_id", PropertyRef::kwarg("_sub_resource_id"))
        .build()
        .unwrap()
}

fn deleted(n: u64) -> QueryResult {
    QueryResult::with_counters(QueryCounters { nodes_deleted: n, ..Default::default() })
}

fn statement(query: &str) -> GraphStatement {
    GraphStatement::new(query, PropertyMap::new(), false, 100)
}

const JOB_JSON: &str = r#"{
    "name": "Remove stale widgets",
    "statements": [
        {
            "query": "MATCH (n:Widget) WHERE n.lastupdated <> $UPDATE_TAG WITH n LIMIT $LIMIT_SIZE DETACH DELETE n",
            "iterative": true,
            "iterationsize": 50
        },
        {
            "query": "MATCH (n:Widget) SET n.checked = $UPDATE_TAG",
            "parameters": {"UPDATE_TAG": 0}
        }
    ]
}"#;

// ============================================================================
// 1. Statements
// ============================================================================

#[tokio::test]
async fn test_iterative_statement_runs_until_no_updates() {
    let store = MemoryStore::new();
    store.push_result(deleted(100));
    store.push_result(deleted(100));
    store.push_result(deleted(40));
    let session = Session::with_store(store.clone());

    let mut s = GraphStatement::new("MATCH (n:Widget) WITH n LIMIT $LIMIT_SIZE DETACH DELETE n", PropertyMap::new(), true, 100);
    s.run(&session, "widgets").await.unwrap();

    // Three rounds with deletions, one final round that found nothing.
    let recorded = store.committed_queries();
    assert_eq!(recorded.len(), 4);
    assert!(recorded.iter().all(|q| q.params["LIMIT_SIZE"] == Value::Int(100)));
    assert_eq!(s.status(), RunStatus::Succeeded);
}

#[tokio::test]
async fn test_non_iterative_statement_runs_once() {
    let store = MemoryStore::new();
    store.push_result(deleted(5));
    let session = Session::with_store(store.clone());

    let mut s = statement("MATCH (n:Widget) DETACH DELETE n");
    s.run(&session, "widgets").await.unwrap();

    assert_eq!(store.run_count(), 1);
    assert!(!store.recorded()[0].params.contains_key("LIMIT_SIZE"));
}

#[tokio::test]
async fn test_counters_are_reported_under_the_prefix() {
    let store = MemoryStore::new();
    store.push_result(QueryResult::with_counters(QueryCounters {
        nodes_deleted: 3,
        relationships_deleted: 7,
        ..Default::default()
    }));
    let metrics = Arc::new(MemoryMetrics::new());
    let session = Session::with_store(store).with_metrics(metrics.clone());

    let mut job = GraphJob::from_json(r#"{"name": "Remove widgets", "statements": [{"query": "MATCH (n) DETACH DELETE n"}]}"#, Some("remove_widgets")).unwrap();
    job.run(&session).await.unwrap();

    assert_eq!(metrics.counter("remove_widgets.nodes_deleted"), 3);
    assert_eq!(metrics.counter("remove_widgets.relationships_deleted"), 7);
    assert_eq!(metrics.counter("remove_widgets.nodes_created"), 0);
}

// ============================================================================
// 2. Jobs
// ============================================================================

#[tokio::test]
async fn test_job_stops_at_first_failure() {
    let store = MemoryStore::new();
    store.push_result(QueryResult::default());
    store.push_error(StoreError::client("Neo.ClientError.Statement.SyntaxError", "bad"));
    let session = Session::with_store(store.clone());

    let mut job = GraphJob::new(
        "three steps",
        vec![statement("RETURN 1"), statement("RETRUN 2"), statement("RETURN 3")],
        None,
    );
    let err = job.run(&session).await.unwrap_err();

    assert!(matches!(err, Error::Store(_)));
    assert_eq!(job.status(), RunStatus::Failed);
    assert_eq!(store.run_count(), 2);
    let statuses: Vec<RunStatus> = job.statements.iter().map(|s| s.status()).collect();
    assert_eq!(statuses, vec![RunStatus::Succeeded, RunStatus::Failed, RunStatus::Pending]);
}

#[tokio::test]
async fn test_job_runs_statements_in_order() {
    let store = MemoryStore::new();
    let session = Session::with_store(store.clone());

    let mut job = GraphJob::new("ordered", vec![statement("RETURN 1"), statement("RETURN 2")], None);
    job.run(&session).await.unwrap();

    let queries: Vec<String> = store.recorded().into_iter().map(|q| q.query).collect();
    assert_eq!(queries, vec!["RETURN 1", "RETURN 2"]);
    assert_eq!(job.status(), RunStatus::Succeeded);
    assert_eq!(job.statements[1].parent(), Some(("ordered", 2)));
}

#[tokio::test]
async fn test_run_from_json_merges_parameters() {
    let store = MemoryStore::new();
    let session = Session::with_store(store.clone());

    GraphJob::run_from_json(&session, JOB_JSON, &property_map([("UPDATE_TAG", 8)]), None).await.unwrap();

    let recorded = store.recorded();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].params["UPDATE_TAG"], Value::Int(8));
    assert_eq!(recorded[0].params["LIMIT_SIZE"], Value::Int(50));
    // Caller parameters win over the statement's own.
    assert_eq!(recorded[1].params["UPDATE_TAG"], Value::Int(8));
}

#[test]
fn test_json_file_short_name_is_the_stem() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("widget_cleanup.json");
    std::fs::write(&path, JOB_JSON).unwrap();

    let job = GraphJob::from_json_file(&path).unwrap();
    assert_eq!(job.name, "Remove stale widgets");
    assert_eq!(job.display_name(), "widget_cleanup");
    assert_eq!(job.statements.len(), 2);
    assert!(job.statements[0].iterative);
    assert!(!job.statements[1].iterative);
}

#[test]
fn test_missing_json_file_is_io_error() {
    let err = GraphJob::from_json_file("/nonexistent/cartography/job.json").unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn test_job_json_round_trip() {
    let job = GraphJob::from_json(JOB_JSON, Some("widgets")).unwrap();
    let back = GraphJob::from_json(&job.to_json().unwrap(), None).unwrap();
    assert_eq!(back, job);
}

// ============================================================================
// 3. Cleanup jobs from schemas
// ============================================================================

#[test]
fn test_from_node_schema() {
    let params = property_map([("UPDATE_TAG", Value::from(UpdateTag(3))), ("OwnerId", "acct-1".into())]);
    let job = GraphJob::from_node_schema(&widget(), &params, CleanupOptions::default()).unwrap();

    assert_eq!(job.name, "Cleanup Widget");
    assert_eq!(job.display_name(), "Widget");
    assert_eq!(job.statements.len(), 2);
    for s in &job.statements {
        assert!(s.iterative);
        assert_eq!(s.iterationsize, 100);
        assert_eq!(s.parameters, params);
    }
}

#[test]
fn test_from_node_schema_names_missing_parameters() {
    let err = GraphJob::from_node_schema(&widget(), &property_map([("UPDATE_TAG", 3)]), CleanupOptions::default())
        .unwrap_err();
    match err {
        Error::MissingParameters { job, missing } => {
            assert_eq!(job, "Cleanup Widget");
            assert_eq!(missing, vec!["OwnerId"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_from_node_schema_rejects_invalid_cascade() {
    let person = NodeSchema::builder("Person")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .scoped_cleanup(false)
        .build()
        .unwrap();
    let options = CleanupOptions { cascade_delete: true, ..CleanupOptions::default() };
    let err = GraphJob::from_node_schema(&person, &property_map([("UPDATE_TAG", 3)]), options).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn test_from_matchlink() {
    let job = GraphJob::from_matchlink(&can_read(), "AWSAccount", "123", UpdateTag(4), 25).unwrap();

    assert_eq!(job.name, "Cleanup CAN_READ between Principal and Bucket");
    assert_eq!(job.display_name(), "CAN_READ");
    assert_eq!(job.statements.len(), 1);
    assert_eq!(
        job.statements[0].parameters,
        property_map([
            ("UPDATE_TAG", Value::Int(4)),
            ("_sub_resource_label", "AWSAccount".into()),
            ("_sub_resource_id", "123".into()),
        ])
    );
    assert_eq!(job.statements[0].iterationsize, 25);
}

#[tokio::test]
async fn test_session_cleanup() {
    let store = MemoryStore::new();
    store.push_result(deleted(2));
    let session = Session::with_store(store.clone());
    let params = property_map([("UPDATE_TAG", Value::from(5)), ("OwnerId", "acct-1".into())]);

    session.cleanup(&widget(), &params, false).await.unwrap();

    // Node query runs twice (deletion, then convergence), relationship query once.
    let recorded = store.committed_queries();
    assert_eq!(recorded.len(), 3);
    assert!(recorded[0].query.ends_with("DETACH DELETE n"));
    assert!(recorded[2].query.ends_with("DELETE s"));
    assert!(recorded.iter().all(|q| q.params["LIMIT_SIZE"] == Value::Int(100) && q.params["OwnerId"] == Value::from("acct-1")));
}

#[tokio::test]
async fn test_session_cleanup_matchlinks() {
    let store = MemoryStore::new();
    let session = Session::with_store(store.clone());

    session.cleanup_matchlinks(&can_read(), "AWSAccount", "123", UpdateTag(4)).await.unwrap();

    let recorded = store.committed_queries();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].query.starts_with("MATCH (from:Principal)-[r:CAN_READ]->(to:Bucket)"));
    assert_eq!(recorded[0].params["_sub_resource_id"], Value::from("123"));
}

// ============================================================================
// 4. Row limit validation
// ============================================================================

#[test]
fn test_cleanup_jobs_reject_zero_iterationsize() {
    let params = property_map([("UPDATE_TAG", Value::from(3)), ("OwnerId", "acct-1".into())]);
    let options = CleanupOptions { iterationsize: 0, ..CleanupOptions::default() };
    assert!(matches!(GraphJob::from_node_schema(&widget(), &params, options), Err(Error::Validation(_))));
    assert!(matches!(
        GraphJob::from_matchlink(&can_read(), "AWSAccount", "123", UpdateTag(4), 0),
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn test_iterative_statement_with_zero_iterationsize_fails_before_io() {
    let store = MemoryStore::new();
    let session = Session::with_store(store.clone());

    let mut job = GraphJob::from_json(
        r#"{"name": "Zero limit", "statements": [{"query": "MATCH (n) WITH n LIMIT $LIMIT_SIZE DETACH DELETE n", "iterative": true, "iterationsize": 0}]}"#,
        None,
    )
    .unwrap();
    let err = job.run(&session).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(job.status(), RunStatus::Failed);
    assert_eq!(store.run_count(), 0);
}

#[tokio::test]
async fn test_session_cleanup_rejects_zero_iteration_size() {
    let store = MemoryStore::new();
    let config = SessionConfig { cleanup_iteration_size: 0, ..SessionConfig::default() };
    let session = Session::with_config(store.clone(), config);
    let params = property_map([("UPDATE_TAG", Value::from(5)), ("OwnerId", "acct-1".into())]);

    let err = session.cleanup(&widget(), &params, false).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(store.run_count(), 0);
}
