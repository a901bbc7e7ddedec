//! Declarative query trees over a frozen [`CodeGraph`].
//!
//! A query names an entity kind, filters it by a conjunction of conditions
//! and applies joins in order. Structural joins keep parent rows that have
//! matching children; the call-inverse and module-to-function joins re-root
//! the result onto the child rows. Joins with no relationship are skipped.

mod ast;
mod exec;
mod operator;

pub use ast::{Condition, QueryNode};
pub use exec::CompiledQuery;
pub use operator::{Operator, Predicate};

use serde_json::Value;
use tracing::debug;

use super::error::KnowledgeError;
use super::graph::CodeGraph;
use exec::Executor;

/// Read-only query engine borrowing a graph snapshot.
pub struct QueryEngine<'g> {
    graph: &'g CodeGraph,
}

impl<'g> QueryEngine<'g> {
    pub fn new(graph: &'g CodeGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &'g CodeGraph {
        self.graph
    }

    /// Compile and run a query tree.
    pub fn execute(&self, query: &QueryNode) -> Result<Vec<Value>, KnowledgeError> {
        let compiled = CompiledQuery::compile(query)?;
        Ok(self.run(&compiled))
    }

    /// Decode a query document, then run it.
    pub fn execute_value(&self, document: &Value) -> Result<Vec<Value>, KnowledgeError> {
        let query: QueryNode = serde_json::from_value(document.clone())
            .map_err(|e| KnowledgeError::query(format!("invalid query document: {}", e)))?;
        self.execute(&query)
    }

    pub fn run(&self, query: &CompiledQuery) -> Vec<Value> {
        let rows = Executor::new(self.graph).run(query);
        debug!(kind = %query.kind, rows = rows.len(), "query executed");
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::builder::GraphBuilder;
    use crate::knowledge::facts::FactBatch;
    use serde_json::json;

    fn graph() -> CodeGraph {
        let batch = FactBatch::from_value(json!([
            {
                "module_name": "m",
                "functions": [
                    {"name": "f", "line_number_start": 1, "line_number_end": 3,
                     "functions_called": [{"module_name": "m", "name": "g"}, {"module_name": "m", "name": "g"}],
                     "where_functions": {"helper": {"raw_string": "helper = 1"}}},
                    {"name": "g", "line_number_start": 5, "line_number_end": 6}
                ],
                "types": [{
                    "type_name": "T", "raw_code": "data T = T Int", "src_loc": "m.hs:8:1",
                    "data_constructors_list": [{"dataConNames": "T", "fields": {
                        "value": {"raw_code": "Int", "structure": {"tag": "AtomicType", "contents": {"module_name": "GHC.Types", "type_name": "Int"}}}
                    }}]
                }]
            },
            {
                "module_name": "n",
                "functions": [{"name": "h", "functions_called": [{"module_name": "m", "name": "g"}]}]
            }
        ]));
        GraphBuilder::default().build(&batch).unwrap().graph
    }

    fn names(rows: &[Value]) -> Vec<&str> {
        let mut names: Vec<&str> = rows.iter().filter_map(|r| r["name"].as_str()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_calling_function_join_returns_callers() {
        let graph = graph();
        let engine = QueryEngine::new(&graph);

        let callers_of_g = engine
            .execute_value(&json!({
                "type": "function",
                "conditions": [{"field": "name", "operator": "eq", "value": "g"}],
                "joins": [{"type": "calling_function"}]
            }))
            .unwrap();
        assert_eq!(names(&callers_of_g), vec!["f", "h"]);

        let callers_of_f = engine
            .execute_value(&json!({
                "type": "function",
                "conditions": [{"field": "name", "operator": "eq", "value": "f"}],
                "joins": [{"type": "calling_function"}]
            }))
            .unwrap();
        assert!(callers_of_f.is_empty());
    }

    #[test]
    fn test_called_by_alias_with_conditions() {
        let graph = graph();
        let rows = QueryEngine::new(&graph)
            .execute(
                &QueryNode::new("function")
                    .with_condition("name", "eq", json!("g"))
                    .join(QueryNode::new("called_by").with_condition("module_name", "eq", json!("n"))),
            )
            .unwrap();
        assert_eq!(names(&rows), vec!["h"]);
    }

    #[test]
    fn test_module_function_join_reroots() {
        let graph = graph();
        let rows = QueryEngine::new(&graph)
            .execute(
                &QueryNode::new("module")
                    .with_condition("name", "eq", json!("m"))
                    .join(QueryNode::new("function").with_condition("name", "like", json!("%"))),
            )
            .unwrap();
        assert_eq!(names(&rows), vec!["f", "g"]);
    }

    #[test]
    fn test_structural_join_filters_and_attaches() {
        let graph = graph();
        let rows = QueryEngine::new(&graph)
            .execute(&QueryNode::new("function").join(QueryNode::new("where_function")))
            .unwrap();
        assert_eq!(names(&rows), vec!["f"]);
        assert_eq!(rows[0]["where_function"][0]["name"], "helper");

        let types = QueryEngine::new(&graph)
            .execute(&QueryNode::new("type").join(QueryNode::new("constructor").join(QueryNode::new("field"))))
            .unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0]["constructor"][0]["field"][0]["name"], "value");
    }

    #[test]
    fn test_called_function_join() {
        let graph = graph();
        let rows = QueryEngine::new(&graph)
            .execute(
                &QueryNode::new("function")
                    .join(QueryNode::new("called_function").with_condition("name", "eq", json!("g"))),
            )
            .unwrap();
        assert_eq!(names(&rows), vec!["f", "h"]);
    }

    #[test]
    fn test_missing_relationship_is_skipped() {
        let graph = graph();
        let rows = QueryEngine::new(&graph)
            .execute(&QueryNode::new("constant").join(QueryNode::new("field")))
            .unwrap();
        assert!(rows.is_empty());

        let rows = QueryEngine::new(&graph)
            .execute(
                &QueryNode::new("function")
                    .with_condition("name", "eq", json!("g"))
                    .join(QueryNode::new("field")),
            )
            .unwrap();
        assert_eq!(names(&rows), vec!["g"]);
    }

    #[test]
    fn test_unknown_field_is_ignored() {
        let graph = graph();
        let rows = QueryEngine::new(&graph)
            .execute(&QueryNode::new("function").with_condition("colour", "eq", json!("red")))
            .unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_compile_errors() {
        let graph = graph();
        let engine = QueryEngine::new(&graph);
        assert!(matches!(
            engine.execute(&QueryNode::new("widget")),
            Err(KnowledgeError::QueryCompile(_))
        ));
        assert!(matches!(
            engine.execute(&QueryNode::new("function").with_condition("name", "approx", json!("f"))),
            Err(KnowledgeError::QueryCompile(_))
        ));
        assert!(matches!(
            engine.execute(&QueryNode::new("function").with_condition("name", "in", json!("f"))),
            Err(KnowledgeError::QueryCompile(_))
        ));
    }

    #[test]
    fn test_range_on_line_numbers() {
        let graph = graph();
        let rows = QueryEngine::new(&graph)
            .execute(&QueryNode::new("function").with_condition("line_number_start", "between", json!([4, 10])))
            .unwrap();
        assert_eq!(names(&rows), vec!["g"]);
    }
}
