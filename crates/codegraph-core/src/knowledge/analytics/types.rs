//! Reachability and statistics over the type-dependency graph.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Analytics;
use crate::knowledge::ontology::TypeEntity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTypeDependency {
    pub from_module: String,
    pub to_module: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeComplexity {
    /// type -> constructor relations
    pub declares: usize,
    /// constructor -> field relations
    pub has_field: usize,
    /// field -> type relations
    pub uses_type: usize,
    /// Most referenced type ids with their reference counts
    pub most_referenced: Vec<(String, usize)>,
    /// Longest dependency chain length -> number of types
    pub nesting_distribution: BTreeMap<usize, usize>,
    pub max_nesting_depth: usize,
    pub module_dependencies: Vec<ModuleTypeDependency>,
}

const MOST_REFERENCED_LIMIT: usize = 10;

impl<'g> Analytics<'g> {
    /// Type ids reachable from `type_name` in `module` over type dependencies.
    ///
    /// Only types defined in the graph are followed. The result is bounded by
    /// `max_reachable_nodes`; `module_pattern` filters the reached set by
    /// module-name substring.
    pub fn get_subgraph_by_type(&self, type_name: &str, module: &str, module_pattern: Option<&str>) -> Vec<String> {
        let starts: Vec<&str> = self
            .graph
            .types_named(type_name)
            .filter(|t| t.module_name == module)
            .map(|t| t.id.as_str())
            .collect();
        if starts.is_empty() {
            return Vec::new();
        }

        let limit = self.config.max_reachable_nodes;
        let mut visited: HashSet<&str> = starts.iter().copied().collect();
        let mut queue: VecDeque<&str> = starts.into_iter().collect();
        let mut reached: BTreeSet<&str> = BTreeSet::new();

        while let Some(current) = queue.pop_front() {
            if reached.len() >= limit {
                debug!(type_name, limit, "type reachability truncated");
                break;
            }
            reached.insert(current);
            for next in self.graph.type_dependencies_of(current) {
                if self.graph.type_def(next).is_some() && visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        reached
            .into_iter()
            .filter(|id| match module_pattern {
                Some(pattern) => self
                    .graph
                    .type_def(id)
                    .map_or(false, |t| t.module_name.contains(pattern)),
                None => true,
            })
            .map(str::to_string)
            .collect()
    }

    /// Raw definitions of the named types and everything they reach inside
    /// modules matching `gateway`, without duplicates.
    pub fn get_all_nested_types(
        &self,
        type_names: &[String],
        gateway: &str,
        should_not_match: Option<&str>,
    ) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut definitions: Vec<String> = Vec::new();
        let mut push = |raw: &'g str, definitions: &mut Vec<String>| {
            if seen.insert(raw) {
                definitions.push(raw.to_string());
            }
        };

        for name in type_names {
            let candidates: Vec<&'g TypeEntity> = self.graph.types_named(name).collect();
            let Some(root) = candidates
                .iter()
                .find(|t| t.module_name.contains(gateway))
                .or_else(|| candidates.first())
                .copied()
            else {
                debug!(type_name = %name, "no type with this name");
                continue;
            };
            push(root.raw_code.as_str(), &mut definitions);

            for id in self.get_subgraph_by_type(&root.type_name, &root.module_name, Some(gateway)) {
                if id == root.id {
                    continue;
                }
                let Some(sub) = self.graph.type_def(&id) else {
                    continue;
                };
                if should_not_match.map_or(false, |p| !p.is_empty() && sub.module_name.contains(p)) {
                    continue;
                }
                push(sub.raw_code.as_str(), &mut definitions);
            }
        }
        definitions
    }

    /// Relation counts, most referenced types, nesting depth and
    /// module-to-module type dependencies.
    pub fn analyze_type_complexity(&self) -> TypeComplexity {
        let mut references: HashMap<&str, usize> = HashMap::new();
        let mut module_pairs: BTreeMap<(String, String), usize> = BTreeMap::new();
        let mut uses_type = 0;

        for edge in self.graph.type_dependency_edges() {
            uses_type += 1;
            *references.entry(edge.to.as_str()).or_default() += 1;

            let from_module = self.graph.type_def(&edge.owner_type).map(|t| t.module_name.clone());
            let to_module = self
                .graph
                .type_def(&edge.to)
                .map(|t| t.module_name.clone())
                .or_else(|| edge.to.rsplit_once(':').map(|(m, _)| m.to_string()));
            if let (Some(from), Some(to)) = (from_module, to_module) {
                if from != to {
                    *module_pairs.entry((from, to)).or_default() += 1;
                }
            }
        }

        let mut most_referenced: Vec<(String, usize)> = references
            .into_iter()
            .map(|(id, count)| (id.to_string(), count))
            .collect();
        most_referenced.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        most_referenced.truncate(MOST_REFERENCED_LIMIT);

        let depths = self.nesting_depths();
        let mut nesting_distribution = BTreeMap::new();
        for depth in depths.values() {
            *nesting_distribution.entry(*depth).or_default() += 1;
        }

        TypeComplexity {
            declares: self.graph.constructors().count(),
            has_field: self.graph.fields().count(),
            uses_type,
            most_referenced,
            max_nesting_depth: depths.values().copied().max().unwrap_or(0),
            nesting_distribution,
            module_dependencies: module_pairs
                .into_iter()
                .map(|((from_module, to_module), count)| ModuleTypeDependency {
                    from_module,
                    to_module,
                    count,
                })
                .collect(),
        }
    }

    /// Longest dependency chain from each type. Edges closing a cycle
    /// contribute nothing.
    fn nesting_depths(&self) -> BTreeMap<&'g str, usize> {
        let mut memo: BTreeMap<&'g str, usize> = BTreeMap::new();
        for t in self.graph.types() {
            let mut on_path = HashSet::new();
            self.depth_of(t.id.as_str(), &mut memo, &mut on_path);
        }
        memo
    }

    fn depth_of(&self, id: &'g str, memo: &mut BTreeMap<&'g str, usize>, on_path: &mut HashSet<&'g str>) -> usize {
        if let Some(depth) = memo.get(id) {
            return *depth;
        }
        if !on_path.insert(id) {
            return 0;
        }
        let graph = self.graph;
        let mut depth = 0;
        for next in graph.type_dependencies_of(id) {
            if graph.type_def(next).is_none() || on_path.contains(next) {
                continue;
            }
            depth = depth.max(1 + self.depth_of(next, memo, on_path));
        }
        on_path.remove(id);
        memo.insert(id, depth);
        depth
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

    fn atomic(module: &str, name: &str) -> serde_json::Value {
        json!({"tag": "AtomicType", "contents": {"module_name": module, "type_name": name}})
    }

    fn record(name: &str, fields: &[(&str, &str, &str)]) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (field, module, target) in fields {
            map.insert(field.to_string(), json!({"raw_code": target, "structure": atomic(module, target)}));
        }
        json!({"type_name": name, "raw_code": format!("data {}", name), "data_constructors_list": [{"fields": map}]})
    }

    fn graph() -> CodeGraph {
        let batch = FactBatch::from_value(json!([
            {"module_name": "pkg.core", "types": [
                record("Order", &[("customer", "pkg.core", "Customer"), ("meta", "ext.meta", "Meta")]),
                record("Customer", &[("address", "pkg.core", "Address"), ("order", "pkg.core", "Order")]),
                record("Address", &[("text", "GHC.Base", "String")])
            ]},
            {"module_name": "ext.meta", "types": [
                record("Meta", &[("tag", "pkg.core", "Address")])
            ]}
        ]));
        GraphBuilder::default().build(&batch).unwrap().graph
    }

    #[test]
    fn test_subgraph_module_filter() {
        let graph = graph();
        let analytics = Analytics::with_defaults(&graph);
        let all = analytics.get_subgraph_by_type("Order", "pkg.core", None);
        assert_eq!(
            all,
            vec!["ext.meta:Meta", "pkg.core:Address", "pkg.core:Customer", "pkg.core:Order"]
        );

        let filtered = analytics.get_subgraph_by_type("Order", "pkg.core", Some("pkg"));
        assert!(filtered.iter().all(|id| id.starts_with("pkg.core:")));
        assert_eq!(filtered.len(), 3);

        assert!(analytics.get_subgraph_by_type("Order", "elsewhere", None).is_empty());
    }

    #[test]
    fn test_subgraph_is_bounded() {
        let graph = graph();
        let config = GraphConfig {
            max_reachable_nodes: 2,
            ..GraphConfig::default()
        };
        let reached = Analytics::new(&graph, &config).get_subgraph_by_type("Order", "pkg.core", None);
        assert_eq!(reached.len(), 2);
    }

    #[test]
    fn test_nested_types_bundle() {
        let graph = graph();
        let bundle = Analytics::with_defaults(&graph).get_all_nested_types(
            &["Order".to_string(), "Customer".to_string()],
            "pkg",
            Some("ext"),
        );
        assert_eq!(bundle, vec!["data Order", "data Address", "data Customer"]);
    }

    #[test]
    fn test_type_complexity() {
        let graph = graph();
        let stats = Analytics::with_defaults(&graph).analyze_type_complexity();
        assert_eq!(stats.declares, 4);
        assert_eq!(stats.has_field, 6);
        assert_eq!(stats.uses_type, 6);
        assert_eq!(stats.most_referenced[0], ("pkg.core:Address".to_string(), 2));
        assert!(stats.max_nesting_depth >= 2);
        assert_eq!(stats.nesting_distribution.values().sum::<usize>(), 4);
        assert!(stats
            .module_dependencies
            .iter()
            .any(|d| d.from_module == "pkg.core" && d.to_module == "ext.meta"));
    }
}
