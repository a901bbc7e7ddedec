use codegraph_core::config::Config;
use codegraph_core::knowledge::{
    CallMode, FactBatch, KnowledgeError, KnowledgeGraph, KnowledgeStore, PatternRequest, QueryNode,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

fn facts() -> FactBatch {
    FactBatch::from_value(json!([
        {"module_name": "m", "functions": [
            {"name": "f", "functions_called": [
                {"module_name": "m", "name": "g"},
                {"module_name": "m", "name": "g"}
            ]},
            {"name": "g"}
        ]}
    ]))
}

fn callers_of(name: &str) -> QueryNode {
    QueryNode::new("function")
        .with_condition("name", "eq", json!(name))
        .join(QueryNode::new("calling_function"))
}

#[tokio::test]
async fn test_callers_query_through_facade() {
    let kg = KnowledgeGraph::in_memory(Config::default());
    assert!(kg.is_initialized().await.unwrap());

    let report = kg.ingest(facts()).await.unwrap();
    assert_eq!(report.stats.call_edges, 1);
    assert!(report.persisted.is_none());

    assert!(kg.query(&callers_of("f")).await.unwrap().is_empty());

    let rows = kg.query(&callers_of("g")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "f");
}

#[tokio::test]
async fn test_unknown_kind_is_rejected() {
    let kg = KnowledgeGraph::in_memory(Config::default());
    kg.ingest(facts()).await.unwrap();

    let err = kg.query(&QueryNode::new("widget")).await.unwrap_err();
    assert!(matches!(err, KnowledgeError::QueryCompile(_)));

    let bad_operator = QueryNode::new("function").with_condition("name", "resembles", json!("f"));
    assert!(matches!(
        kg.query(&bad_operator).await.unwrap_err(),
        KnowledgeError::QueryCompile(_)
    ));
}

#[tokio::test]
async fn test_pattern_and_call_graph() {
    let kg = KnowledgeGraph::in_memory(Config::default());
    kg.ingest(facts()).await.unwrap();

    let request = PatternRequest::FunctionCall {
        caller: Some("f".to_string()),
        callee: None,
        mode: CallMode::Calls,
    };
    let matches = kg.pattern(&request).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["callee"]["name"], "g");

    let tree = kg.call_graph("m:f:", 2).await.unwrap().unwrap();
    assert_eq!(tree.name, "f");
    assert_eq!(tree.calls.len(), 1);
    assert_eq!(tree.calls[0].name, "g");

    assert!(kg.call_graph("m:f:", 0).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ingest_replaces_snapshot() {
    let kg = KnowledgeGraph::in_memory(Config::default());
    let first = kg.ingest(facts()).await.unwrap();
    let stats = kg.get_stats().await.unwrap();
    assert_eq!(stats.call_edges, 1);
    assert_eq!(stats.last_run, Some(first.stats.run_id));

    kg.ingest(FactBatch::from_value(json!({"module_name": "other", "functions": [{"name": "x"}]})))
        .await
        .unwrap();
    let stats = kg.get_stats().await.unwrap();
    assert_eq!(stats.call_edges, 0);
    assert!(kg.query(&callers_of("g")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ingest_path_loads_fact_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{"module_name": "m", "functions": [{{"name": "f"}}, {{"name": "g", "functions_called": [{{"module_name": "m", "name": "f"}}]}}]}}"#
    )
    .unwrap();

    let kg = KnowledgeGraph::in_memory(Config::default());
    let report = kg.ingest_path(file.path()).await.unwrap();
    assert_eq!(report.stats.modules, 1);

    let rows = kg.query(&callers_of("f")).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "g");
}

#[tokio::test]
async fn test_persistent_graph_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = dir.path().to_string_lossy().to_string();

    let kg = KnowledgeGraph::open(config).await.unwrap();
    assert!(!kg.is_initialized().await.unwrap());
    kg.initialize().await.unwrap();
    assert!(kg.is_initialized().await.unwrap());

    let report = kg.ingest(facts()).await.unwrap();
    let persisted = report.persisted.unwrap();
    let stats = kg.get_stats().await.unwrap();
    assert_eq!(persisted.nodes, 3);
    assert_eq!(persisted.edges, stats.edges);

    let db = kg.db().unwrap();
    assert_eq!(db.count("function").await.unwrap(), 2);
    assert_eq!(db.count("calls").await.unwrap(), 1);
    assert_eq!(db.count("ingest_run").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_ingest_and_reads() {
    let kg = Arc::new(KnowledgeGraph::in_memory(Config::default()));

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let kg = Arc::clone(&kg);
        tasks.push(tokio::spawn(async move { kg.ingest(facts()).await.map(|r| r.stats.call_edges) }));
    }
    let reader = {
        let kg = Arc::clone(&kg);
        tokio::spawn(async move { kg.get_stats().await.map(|s| s.call_edges) })
    };

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 1);
    }
    assert!(reader.await.unwrap().unwrap() <= 1);

    let stats = kg.get_stats().await.unwrap();
    assert_eq!(stats.call_edges, 1);
    assert!(stats.last_run.is_some());
}
