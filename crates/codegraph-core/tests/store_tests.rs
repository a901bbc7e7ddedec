use codegraph_core::config::StorageConfig;
use codegraph_core::knowledge::ontology::CallsEdge;
use codegraph_core::knowledge::{
    CodeGraph, EntityKind, FactBatch, GraphBuilder, GraphDb, GraphEdge, KnowledgeError,
};
use serde_json::json;

fn sample_graph() -> CodeGraph {
    let batch = FactBatch::from_value(json!({
        "module_name": "m",
        "functions": [
            {"name": "f", "functions_called": [{"module_name": "m", "name": "g"}]},
            {"name": "g"},
            {"name": "h", "where_functions": {"go": {}}}
        ]
    }));
    GraphBuilder::default().build(&batch).unwrap().graph
}

async fn create_test_db() -> GraphDb {
    let storage = StorageConfig {
        bulk_batch_size: 2,
        ..StorageConfig::default()
    };
    let db = GraphDb::open_in_memory(&storage).await.unwrap();
    db.initialize_schema().await.unwrap();
    db
}

#[tokio::test]
async fn test_schema_initialization_is_repeatable() {
    let db = create_test_db().await;
    assert!(db.is_initialized().await.unwrap());
    db.initialize_schema().await.unwrap();
    assert!(db.is_initialized().await.unwrap());
}

#[tokio::test]
async fn test_persist_is_idempotent() {
    let db = create_test_db().await;
    let graph = sample_graph();

    let first = db.persist(&graph).await.unwrap();
    assert_eq!(first.nodes, graph.node_count());
    assert_eq!(first.edges, graph.edge_count());
    assert!(first.batches >= 3);
    assert!(!db.in_bulk_load());

    db.persist(&graph).await.unwrap();
    assert_eq!(db.count("function").await.unwrap(), 3);
    assert_eq!(db.count_kind(EntityKind::WhereFunction).await.unwrap(), 1);
    assert_eq!(db.count("calls").await.unwrap(), 1);
    assert_eq!(db.count("module").await.unwrap(), 1);
}

#[tokio::test]
async fn test_records_keep_canonical_id() {
    let db = create_test_db().await;
    db.persist(&sample_graph()).await.unwrap();

    let record = db.get_record(EntityKind::Function, "m:g:").await.unwrap().unwrap();
    assert_eq!(record["key"], "m:g:");
    assert_eq!(record["name"], "g");
    assert!(db.get_record(EntityKind::Function, "m:zzz:").await.unwrap().is_none());
}

#[tokio::test]
async fn test_edge_endpoints_checked_outside_bulk_mode() {
    let db = create_test_db().await;
    db.persist(&sample_graph()).await.unwrap();

    let dangling = GraphEdge::Calls(CallsEdge::new("m:f:", "m:absent:"));
    let err = db.upsert_edge(&dangling).await.unwrap_err();
    assert!(matches!(err, KnowledgeError::EntityNotFound(_)));

    db.begin_bulk_load();
    db.upsert_edge(&dangling).await.unwrap();
    db.end_bulk_load();
    assert_eq!(db.count("calls").await.unwrap(), 2);

    let valid = GraphEdge::Calls(CallsEdge::new("m:h:", "m:g:"));
    db.upsert_edge(&valid).await.unwrap();
    db.upsert_edge(&valid).await.unwrap();
    assert_eq!(db.count("calls").await.unwrap(), 3);
}

#[tokio::test]
async fn test_replace_clears_previous_snapshot() {
    let db = create_test_db().await;
    db.persist(&sample_graph()).await.unwrap();

    let smaller = GraphBuilder::default()
        .build(&FactBatch::from_value(json!({"module_name": "n", "functions": [{"name": "only"}]})))
        .unwrap()
        .graph;
    db.replace(&smaller).await.unwrap();

    assert_eq!(db.count("function").await.unwrap(), 1);
    assert_eq!(db.count("calls").await.unwrap(), 0);
    assert!(db.get_record(EntityKind::Function, "n:only:").await.unwrap().is_some());
}

#[tokio::test]
async fn test_count_rejects_unknown_table() {
    let db = create_test_db().await;
    let err = db.count("metadata; DELETE function").await.unwrap_err();
    assert!(matches!(err, KnowledgeError::QueryCompile(_)));
}
