//! Call-graph expansion, call statistics and module coupling.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Analytics;
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::ontology::FunctionEntity;

/// Call-site kinds and pseudo modules that never name a function.
const NON_FUNCTION_KINDS: &[&str] = &["TyConApp", "FunTy", "ForAllTy", "OverLit"];
const NON_FUNCTION_MODULES: &[&str] = &["_in", "_type"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub id: String,
    pub name: String,
    pub module: String,
}

impl From<&FunctionEntity> for FunctionSummary {
    fn from(f: &FunctionEntity) -> Self {
        Self {
            id: f.id.clone(),
            name: f.name.clone(),
            module: f.module_name.clone(),
        }
    }
}

/// One node of a bounded call tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphNode {
    pub id: String,
    pub name: String,
    pub module: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<CallGraphNode>,
}

impl CallGraphNode {
    fn leaf(f: &FunctionEntity) -> Self {
        Self {
            id: f.id.clone(),
            name: f.name.clone(),
            module: f.module_name.clone(),
            calls: Vec::new(),
        }
    }

    /// Nodes in this tree, root included.
    pub fn size(&self) -> usize {
        1 + self.calls.iter().map(CallGraphNode::size).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalledFunction {
    pub id: String,
    pub name: String,
    pub module: String,
    pub calls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDependency {
    pub caller_module: String,
    pub callee_module: String,
    pub call_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetrics {
    pub name: String,
    pub incoming: usize,
    pub outgoing: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCoupling {
    pub module_metrics: Vec<ModuleMetrics>,
    pub total_cross_module_calls: usize,
    pub module_count: usize,
    pub dependency_count: usize,
}

/// A call that did not resolve to a function in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCall {
    pub module_name: String,
    pub function_name: String,
    pub type_signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionsUsed {
    pub local: Vec<FunctionSummary>,
    pub other: Vec<ExternalCall>,
}

impl<'g> Analytics<'g> {
    /// Expand the callees of `function_id` up to `depth` levels.
    ///
    /// Returns `None` for `depth < 1`. There is no visited set: a function
    /// reachable along two paths is expanded on both, up to the depth and
    /// the configured node budget. Self-calls are skipped.
    pub fn get_function_call_graph(
        &self,
        function_id: &str,
        depth: usize,
    ) -> Result<Option<CallGraphNode>, KnowledgeError> {
        if depth < 1 {
            return Ok(None);
        }
        let root = self
            .graph
            .function(function_id)
            .ok_or_else(|| KnowledgeError::EntityNotFound(format!("function {}", function_id)))?;

        let mut budget = self.config.max_call_graph_nodes;
        let tree = self.expand(root, depth, &mut budget);
        if budget == 0 {
            debug!(function = %function_id, "call graph truncated at node bound");
        }
        Ok(Some(tree))
    }

    fn expand(&self, function: &FunctionEntity, depth: usize, budget: &mut usize) -> CallGraphNode {
        let mut node = CallGraphNode::leaf(function);
        for callee_id in self.graph.callees_of(&function.id) {
            if callee_id == function.id {
                continue;
            }
            let Some(callee) = self.graph.function(callee_id) else {
                continue;
            };
            if *budget == 0 {
                break;
            }
            *budget -= 1;
            let child = if depth > 1 {
                self.expand(callee, depth - 1, budget)
            } else {
                CallGraphNode::leaf(callee)
            };
            node.calls.push(child);
        }
        node
    }

    /// Functions ranked by the number of distinct callers.
    pub fn get_most_called_functions(&self, limit: usize) -> Vec<CalledFunction> {
        let mut ranked: Vec<CalledFunction> = self
            .graph
            .functions()
            .filter_map(|f| {
                let calls = self.graph.callers_of(&f.id).count();
                (calls > 0).then(|| CalledFunction {
                    id: f.id.clone(),
                    name: f.name.clone(),
                    module: f.module_name.clone(),
                    calls,
                })
            })
            .collect();
        ranked.sort_by(|a, b| b.calls.cmp(&a.calls).then_with(|| a.id.cmp(&b.id)));
        ranked.truncate(limit);
        ranked
    }

    /// Call counts between distinct modules, highest first.
    pub fn find_cross_module_dependencies(&self) -> Vec<ModuleDependency> {
        let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
        for edge in self.graph.call_edges() {
            let (Some(caller), Some(callee)) = (self.caller_module(&edge.from), self.graph.function(&edge.to)) else {
                continue;
            };
            if caller == callee.module_name {
                continue;
            }
            *counts
                .entry((caller.to_string(), callee.module_name.clone()))
                .or_default() += 1;
        }

        let mut deps: Vec<ModuleDependency> = counts
            .into_iter()
            .map(|((caller_module, callee_module), call_count)| ModuleDependency {
                caller_module,
                callee_module,
                call_count,
            })
            .collect();
        deps.sort_by(|a, b| b.call_count.cmp(&a.call_count));
        deps
    }

    /// Incoming and outgoing cross-module calls per module.
    pub fn analyze_module_coupling(&self) -> ModuleCoupling {
        let deps = self.find_cross_module_dependencies();
        let mut metrics: BTreeMap<&str, ModuleMetrics> = self
            .graph
            .modules()
            .map(|m| {
                (
                    m.name.as_str(),
                    ModuleMetrics {
                        name: m.name.clone(),
                        incoming: 0,
                        outgoing: 0,
                        total: 0,
                    },
                )
            })
            .collect();

        for dep in &deps {
            if let Some(m) = metrics.get_mut(dep.caller_module.as_str()) {
                m.outgoing += dep.call_count;
                m.total += dep.call_count;
            }
            if let Some(m) = metrics.get_mut(dep.callee_module.as_str()) {
                m.incoming += dep.call_count;
                m.total += dep.call_count;
            }
        }

        let module_count = metrics.len();
        let mut module_metrics: Vec<ModuleMetrics> = metrics.into_values().collect();
        module_metrics.sort_by(|a, b| b.total.cmp(&a.total));

        ModuleCoupling {
            module_metrics,
            total_cross_module_calls: deps.iter().map(|d| d.call_count).sum(),
            module_count,
            dependency_count: deps.len(),
        }
    }

    /// Callees of a function and of all its nested functions, split into
    /// graph functions and unresolved calls.
    pub fn get_functions_used(&self, function_id: &str) -> Result<FunctionsUsed, KnowledgeError> {
        if self.graph.function(function_id).is_none() {
            return Err(KnowledgeError::EntityNotFound(format!("function {}", function_id)));
        }
        let mut scope: BTreeSet<&str> = self.graph.nested_under(function_id).map(|n| n.id.as_str()).collect();
        scope.insert(function_id);

        let mut seen = BTreeSet::new();
        let mut used = FunctionsUsed::default();
        for caller in &scope {
            for callee_id in self.graph.callees_of(caller) {
                if let Some(callee) = self.graph.function(callee_id) {
                    if seen.insert(callee_id) {
                        used.local.push(FunctionSummary::from(callee));
                    }
                }
            }
        }

        for site in self.graph.unresolved_calls() {
            if !scope.contains(site.caller_id.as_str())
                || NON_FUNCTION_MODULES.contains(&site.callee_module.as_str())
                || NON_FUNCTION_KINDS.contains(&site.kind.as_str())
            {
                continue;
            }
            used.other.push(ExternalCall {
                module_name: site.callee_module.clone(),
                function_name: site.callee_name.clone(),
                type_signature: site.kind.clone(),
            });
        }
        Ok(used)
    }

    /// Module of a call-edge source, which may be a nested function.
    fn caller_module(&self, id: &str) -> Option<&'g str> {
        self.graph
            .function(id)
            .map(|f| f.module_name.as_str())
            .or_else(|| self.graph.nested_function(id).map(|n| n.module_name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::knowledge::builder::GraphBuilder;
    use crate::knowledge::facts::FactBatch;
    use crate::knowledge::graph::CodeGraph;
    use serde_json::json;

    fn graph() -> CodeGraph {
        let call = |m: &str, n: &str| json!({"module_name": m, "name": n});
        let batch = FactBatch::from_value(json!([
            {
                "module_name": "a",
                "functions": [
                    {"name": "main", "functions_called": [call("a", "main"), call("a", "step"), call("b", "util"), call("Prelude", "print")]},
                    {"name": "step", "functions_called": [call("b", "util")],
                     "where_functions": {"go": {"functions_called": [call("b", "other"), call("Data.Map", "insert")]}}}
                ]
            },
            {
                "module_name": "b",
                "functions": [
                    {"name": "util", "functions_called": [call("b", "other")]},
                    {"name": "other"}
                ]
            }
        ]));
        GraphBuilder::default().build(&batch).unwrap().graph
    }

    #[test]
    fn test_call_graph_depth_and_self_calls() {
        let graph = graph();
        let analytics = Analytics::with_defaults(&graph);
        assert_eq!(analytics.get_function_call_graph("a:main:", 0).unwrap(), None);

        let tree = analytics.get_function_call_graph("a:main:", 1).unwrap().unwrap();
        let names: Vec<&str> = tree.calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["step", "util"]);
        assert!(tree.calls.iter().all(|c| c.calls.is_empty()));

        let deep = analytics.get_function_call_graph("a:main:", 3).unwrap().unwrap();
        // step -> util -> other and util -> other: expanded on both paths
        assert_eq!(deep.size(), 6);

        assert!(matches!(
            analytics.get_function_call_graph("a:missing:", 2),
            Err(KnowledgeError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_call_graph_node_budget() {
        let graph = graph();
        let config = GraphConfig {
            max_call_graph_nodes: 2,
            ..GraphConfig::default()
        };
        let tree = Analytics::new(&graph, &config)
            .get_function_call_graph("a:main:", 5)
            .unwrap()
            .unwrap();
        assert_eq!(tree.size(), 3);
    }

    #[test]
    fn test_most_called() {
        let graph = graph();
        let ranked = Analytics::with_defaults(&graph).get_most_called_functions(2);
        assert_eq!(ranked[0].name, "other");
        assert_eq!(ranked[0].calls, 2);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_module_coupling() {
        let graph = graph();
        let analytics = Analytics::with_defaults(&graph);
        let deps = analytics.find_cross_module_dependencies();
        assert_eq!(
            deps,
            vec![ModuleDependency {
                caller_module: "a".into(),
                callee_module: "b".into(),
                call_count: 3
            }]
        );

        let coupling = analytics.analyze_module_coupling();
        assert_eq!(coupling.total_cross_module_calls, 3);
        assert_eq!(coupling.module_count, 2);
        assert_eq!(coupling.dependency_count, 1);
        assert_eq!(coupling.module_metrics[0].total, 3);
    }

    #[test]
    fn test_functions_used_includes_nested() {
        let graph = graph();
        let used = Analytics::with_defaults(&graph).get_functions_used("a:step:").unwrap();
        let local: Vec<&str> = used.local.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(local, vec!["util", "other"]);
        assert_eq!(used.other.len(), 1);
        assert_eq!(used.other[0].function_name, "insert");
    }
}
