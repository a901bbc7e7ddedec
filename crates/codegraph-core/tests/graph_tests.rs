use codegraph_core::knowledge::{Analytics, EntityKind, FactBatch, GraphBuilder, KnowledgeError};
use serde_json::json;

fn build(facts: serde_json::Value) -> codegraph_core::knowledge::BuildOutput {
    GraphBuilder::default()
        .with_worker_threads(2)
        .build(&FactBatch::from_value(facts))
        .unwrap()
}

#[test]
fn test_repeated_call_yields_one_edge() {
    let output = build(json!({
        "module_name": "m",
        "functions": [
            {"name": "f", "functions_called": [
                {"module_name": "m", "name": "g"},
                {"module_name": "m", "name": "g"}
            ]},
            {"name": "g"}
        ]
    }));
    let graph = &output.graph;

    let edges: Vec<_> = graph.call_edges().collect();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].from, "m:f:");
    assert_eq!(edges[0].to, "m:g:");
    assert_eq!(output.stats.call_edges, 1);
    assert!(output.stats.skipped_duplicates >= 1);
}

#[test]
fn test_resolution_outcomes() {
    let output = build(json!([
        {"module_name": "a", "functions": [
            {"name": "caller", "functions_called": [
                {"module_name": "b", "name": "dup"},
                {"module_name": "b", "name": "missing"},
                {"module_name": "b", "name": "single"}
            ]}
        ]},
        {"module_name": "b", "functions": [
            {"name": "dup", "src_loc": "B.hs:1:1", "line_number_start": 1},
            {"name": "dup", "src_loc": "B.hs:9:1", "line_number_start": 9},
            {"name": "single"}
        ]}
    ]));
    let graph = &output.graph;

    // Ambiguous callee fans out to every candidate
    let mut callees: Vec<&str> = graph.callees_of("a:caller:").collect();
    callees.sort();
    assert_eq!(callees, vec!["b:dup::B.hs:1:1:1", "b:dup::B.hs:9:1:9", "b:single:"]);

    assert_eq!(graph.unresolved_calls().len(), 1);
    assert_eq!(output.stats.unresolved_calls, 1);
    assert_eq!(output.stats.ambiguous_calls, 1);
    assert!(output.diagnostics.iter().any(|d| d.kind == "unresolved_reference"));
}

#[test]
fn test_malformed_fact_is_skipped() {
    let output = build(json!({
        "module_name": "m",
        "functions": [
            {"name": "ok"},
            {"name": 42},
            {"line_number_start": 3}
        ]
    }));
    assert_eq!(output.graph.functions().count(), 1);
    assert!(output.stats.skipped_facts >= 1);
    assert!(!output.diagnostics.is_empty());
}

#[test]
fn test_remove_function_cascades_to_nested() {
    let output = build(json!({
        "module_name": "m",
        "functions": [
            {"name": "f",
             "functions_called": [{"module_name": "m", "name": "g"}],
             "where_functions": {
                 "outer": {"functions_called": [{"module_name": "m", "name": "g"}],
                           "where_functions": {"inner": {}}}
             }},
            {"name": "g"}
        ]
    }));
    let mut graph = output.graph;
    assert_eq!(graph.nested_functions().count(), 2);
    assert!(graph.has_call("m:f:", "m:g:"));

    let removed = graph.remove_function("m:f:").unwrap();
    assert_eq!(removed.name, "f");
    assert_eq!(graph.nested_functions().count(), 0);
    assert!(!graph.has_call("m:f:", "m:g:"));
    assert_eq!(graph.callers_of("m:g:").count(), 0);
    assert!(graph.function("m:g:").is_some());

    let err = graph.remove_function("m:f:").unwrap_err();
    assert!(matches!(err, KnowledgeError::EntityNotFound(_)));
}

#[test]
fn test_remove_impl_block_orphans_methods() {
    let output = build(json!({
        "module_name": "shapes",
        "traits": [{"name": "Area", "methods": [{"name": "area"}]}],
        "impl_blocks": [
            {"struct_name": "Circle", "trait_name": "Area", "line_number_start": 1, "line_number_end": 9, "methods": ["area"]}
        ],
        "functions": [{"name": "area", "line_number_start": 2}]
    }));
    let mut graph = output.graph;
    let block_id = graph.impl_blocks().next().map(|b| b.id.clone()).unwrap();
    assert_eq!(graph.impl_methods(&block_id).count(), 1);

    graph.remove_impl_block(&block_id).unwrap();
    assert_eq!(graph.impl_blocks().count(), 0);
    let method = graph.functions().find(|f| f.name == "area").unwrap();
    assert!(method.impl_block_id.is_none());
}

#[test]
fn test_type_dependencies_are_deduplicated() {
    let atomic = |name: &str| json!({"tag": "AtomicType", "contents": {"module_name": "m", "type_name": name}});
    let output = build(json!({
        "module_name": "m",
        "types": [
            {"type_name": "Pair", "raw_code": "data Pair", "data_constructors_list": [
                {"fields": {
                    "left": {"raw_code": "Item", "structure": atomic("Item")},
                    "right": {"raw_code": "Item", "structure": atomic("Item")}
                }}
            ]},
            {"type_name": "Item", "raw_code": "data Item"}
        ]
    }));
    let graph = &output.graph;
    let deps: Vec<&str> = graph.type_dependencies_of("m:Pair").collect();
    assert_eq!(deps, vec!["m:Item"]);
    assert_eq!(graph.entity_counts()[&EntityKind::Field], 2);
}

#[test]
fn test_same_name_nested_siblings_stay_distinct() {
    let output = build(json!({
        "module_name": "m",
        "functions": [
            {"name": "f", "where_functions": {
                "go**m.hs:3:1": {"functions_called": [{"module_name": "m", "name": "a"}]},
                "go**m.hs:9:1": {"functions_called": [{"module_name": "m", "name": "b"}]}
            }},
            {"name": "a"},
            {"name": "b"}
        ]
    }));
    let graph = &output.graph;

    let mut ids: Vec<&str> = graph.nested_functions().map(|n| n.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["m:f:.go@m.hs:3:1", "m:f:.go@m.hs:9:1"]);

    let first: Vec<&str> = graph.callees_of("m:f:.go@m.hs:3:1").collect();
    let second: Vec<&str> = graph.callees_of("m:f:.go@m.hs:9:1").collect();
    assert_eq!(first, vec!["m:a:"]);
    assert_eq!(second, vec!["m:b:"]);
    assert_eq!(graph.nested_function("m:f:.go@m.hs:9:1").unwrap().src_loc.as_deref(), Some("m.hs:9:1"));
}

#[test]
fn test_nested_types_for_caller_owned_names() {
    let atomic = |name: &str| json!({"tag": "AtomicType", "contents": {"module_name": "app", "type_name": name}});
    let output = build(json!({
        "module_name": "app",
        "types": [
            {"type_name": "Order", "raw_code": "data Order", "data_constructors_list": [
                {"fields": {"line": {"raw_code": "Line", "structure": atomic("Line")}}}
            ]},
            {"type_name": "Line", "raw_code": "data Line"}
        ]
    }));
    let analytics = Analytics::with_defaults(&output.graph);

    let bundle = {
        let names = vec!["Order".to_string(), "Missing".to_string()];
        analytics.get_all_nested_types(&names, "app", None)
    };
    assert_eq!(bundle, vec!["data Order", "data Line"]);
}

#[test]
fn test_instance_usage_on_top_level_functions_only() {
    let output = build(json!([
        {"module_name": "Lib",
         "instances": [{"instanceDefinition": "instance Show T", "instanceType": "Show Lib.T", "line_number_start": 10, "line_number_end": 20}],
         "functions": [
             {"name": "showT", "line_number_start": 11, "line_number_end": 12,
              "functions_called": [{"module_name": "Lib", "name": "render"}]},
             {"name": "render", "line_number_start": 30}
         ]},
        {"module_name": "App",
         "functions": [
             {"name": "main", "instances_used": ["Show Lib.T"],
              "where_functions": {"helper": {"instances_used": ["Show Lib.T"]}}},
             {"name": "other", "instances_used": ["GHC.Show.Show Lib.T"]}
         ]}
    ]));
    let graph = &output.graph;

    let mut users: Vec<&str> = graph.uses_instance_edges().map(|e| e.from.as_str()).collect();
    users.sort();
    assert_eq!(users, vec!["App:main:", "App:other:"]);

    // Instance methods are resolved once, whether or not the instance is used
    assert!(graph.has_call("Lib:showT:", "Lib:render:"));
    assert_eq!(output.stats.call_edges, 1);
    assert_eq!(output.stats.uses_instance_edges, 2);
}
