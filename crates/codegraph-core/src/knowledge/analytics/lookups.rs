//! Direct entity lookups.

use super::Analytics;
use crate::knowledge::ontology::{FunctionEntity, GraphNode, ImplBlockEntity, ModuleEntity};

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl<'g> Analytics<'g> {
    /// Functions whose source text contains `needle`, ignoring case.
    pub fn search_function_by_content(&self, needle: &str) -> Vec<&'g FunctionEntity> {
        self.graph
            .functions()
            .filter(|f| f.raw_string.as_deref().map_or(false, |s| contains_ci(s, needle)))
            .collect()
    }

    pub fn find_function_by_src_loc(&self, src_loc: &str) -> Option<&'g FunctionEntity> {
        self.graph
            .functions()
            .find(|f| f.src_loc.as_deref() == Some(src_loc))
    }

    /// Modules whose name contains `name`, ignoring case.
    pub fn find_module(&self, name: &str) -> Vec<&'g ModuleEntity> {
        self.graph.modules().filter(|m| contains_ci(&m.name, name)).collect()
    }

    pub fn get_implementations_for_trait(&self, trait_name: &str) -> Vec<&'g ImplBlockEntity> {
        self.graph
            .impl_blocks()
            .filter(|b| b.trait_name.as_deref() == Some(trait_name))
            .collect()
    }

    /// Methods of every impl block for `struct_name`, inherent and trait.
    pub fn get_methods_for_struct(&self, struct_name: &str) -> Vec<&'g FunctionEntity> {
        let graph = self.graph;
        graph
            .impl_blocks()
            .filter(|b| b.struct_name == struct_name)
            .flat_map(|b| graph.impl_methods(&b.id))
            .collect()
    }

    /// First function, trait, trait method or constant with this path.
    pub fn find_by_fully_qualified_path(&self, fqp: &str) -> Option<GraphNode> {
        let graph = self.graph;
        let wanted = Some(fqp);
        if let Some(f) = graph.functions().find(|f| f.fully_qualified_path.as_deref() == wanted) {
            return Some(GraphNode::Function(f.clone()));
        }
        if let Some(t) = graph.traits().find(|t| t.fully_qualified_path.as_deref() == wanted) {
            return Some(GraphNode::Trait(t.clone()));
        }
        if let Some(m) = graph
            .trait_methods()
            .find(|m| m.fully_qualified_path.as_deref() == wanted)
        {
            return Some(GraphNode::TraitMethod(m.clone()));
        }
        graph
            .constants()
            .find(|c| c.fully_qualified_path.as_deref() == wanted)
            .map(|c| GraphNode::Constant(c.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::builder::GraphBuilder;
    use crate::knowledge::facts::FactBatch;
    use crate::knowledge::graph::CodeGraph;
    use serde_json::json;

    fn graph() -> CodeGraph {
        let batch = FactBatch::from_value(json!([
            {
                "module_name": "geo::shapes",
                "traits": [{"name": "Area", "fully_qualified_path": "geo::shapes::Area",
                            "methods": [{"name": "area", "fully_qualified_path": "geo::shapes::Area::area"}]}],
                "impl_blocks": [
                    {"struct_name": "Circle", "trait_name": "Area", "line_number_start": 10, "line_number_end": 20, "methods": ["area"]},
                    {"struct_name": "Circle", "line_number_start": 30, "line_number_end": 40, "methods": ["new"]}
                ],
                "constants": [{"name": "PI", "fully_qualified_path": "geo::shapes::PI"}],
                "functions": [
                    {"name": "area", "src_loc": "shapes.rs:12:5", "line_number_start": 12,
                     "raw_string": "fn area(&self) -> f64 { PI * self.r * self.r }"},
                    {"name": "new", "line_number_start": 32, "fully_qualified_path": "geo::shapes::Circle::new"}
                ]
            },
            {"module_name": "geo::lines"}
        ]));
        GraphBuilder::default().build(&batch).unwrap().graph
    }

    #[test]
    fn test_content_and_location_search() {
        let graph = graph();
        let analytics = Analytics::with_defaults(&graph);
        let hits = analytics.search_function_by_content("SELF.R");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "area");
        assert_eq!(analytics.find_function_by_src_loc("shapes.rs:12:5").map(|f| f.name.as_str()), Some("area"));
        assert!(analytics.find_function_by_src_loc("nowhere.rs:1:1").is_none());
    }

    #[test]
    fn test_module_and_trait_lookups() {
        let graph = graph();
        let analytics = Analytics::with_defaults(&graph);
        assert_eq!(analytics.find_module("GEO").len(), 2);
        assert_eq!(analytics.get_implementations_for_trait("Area").len(), 1);

        let mut methods: Vec<&str> = analytics
            .get_methods_for_struct("Circle")
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        methods.sort();
        assert_eq!(methods, vec!["area", "new"]);
    }

    #[test]
    fn test_fully_qualified_path_lookup() {
        let graph = graph();
        let analytics = Analytics::with_defaults(&graph);
        assert!(matches!(
            analytics.find_by_fully_qualified_path("geo::shapes::Circle::new"),
            Some(GraphNode::Function(_))
        ));
        assert!(matches!(
            analytics.find_by_fully_qualified_path("geo::shapes::Area::area"),
            Some(GraphNode::TraitMethod(_))
        ));
        assert!(matches!(
            analytics.find_by_fully_qualified_path("geo::shapes::PI"),
            Some(GraphNode::Constant(_))
        ));
        assert!(analytics.find_by_fully_qualified_path("geo::nothing").is_none());
    }
}
