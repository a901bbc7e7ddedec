//! Graph construction from fact batches.
//!
//! Construction runs in three phases:
//!
//! 1. **Entities** - each module's facts are decoded into entities on a
//!    bounded rayon pool. Modules share nothing in this phase.
//! 2. **Merge** - on the calling thread, module results are merged into one
//!    [`CodeGraph`], the simple-key symbol index is filled and frozen, trait
//!    references are resolved and impl-block methods are attached.
//! 3. **Edges** - containment, call and type-dependency edges are built
//!    against the merged graph and the frozen index.

mod calls;
mod entities;
mod report;
mod type_deps;

pub use report::{BuildOutput, BuildStats, Diagnostic, Severity};

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use self::entities::{build_module, ModuleBuild};
use super::error::KnowledgeError;
use super::facts::FactBatch;
use super::graph::CodeGraph;
use super::identity::{SimpleKey, SymbolIndexBuilder};
use super::ontology::*;
use crate::config::IngestConfig;

/// Builds a [`CodeGraph`] from a [`FactBatch`].
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    worker_threads: usize,
    skip_literal_calls: bool,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}

impl GraphBuilder {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            worker_threads: config.effective_threads(),
            skip_literal_calls: config.skip_literal_calls,
        }
    }

    /// Override the worker pool size (0 keeps the configured value).
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        if threads > 0 {
            self.worker_threads = threads;
        }
        self
    }

    pub fn with_skip_literal_calls(mut self, skip: bool) -> Self {
        self.skip_literal_calls = skip;
        self
    }

    /// Build a graph. Malformed facts become diagnostics; the only error is a
    /// worker pool that cannot be started.
    pub fn build(&self, batch: &FactBatch) -> Result<BuildOutput, KnowledgeError> {
        let mut stats = BuildStats::new();
        let mut diagnostics = Vec::new();

        for rejected in &batch.rejected {
            stats.skipped_facts += 1;
            diagnostics.push(Diagnostic::warning("parse_fact", rejected.clone()));
        }
        if batch.is_empty() {
            warn!("fact batch contains no modules");
        }

        // Phase 1: per-module entities
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads)
            .build()
            .map_err(|e| KnowledgeError::Config(format!("worker pool: {}", e)))?;
        let skip_literal_calls = self.skip_literal_calls;
        let modules: Vec<ModuleBuild> = pool.install(|| {
            batch
                .modules
                .par_iter()
                .map(|facts| build_module(facts, skip_literal_calls))
                .collect()
        });
        debug!(modules = modules.len(), threads = self.worker_threads, "module entities decoded");

        // Phase 2: merge and freeze
        let mut graph = CodeGraph::new();
        let mut index = SymbolIndexBuilder::new();
        for module in modules {
            merge_module(&mut graph, &mut index, module, &mut stats, &mut diagnostics);
        }
        let index = index.freeze();
        debug!(simple_keys = index.len(), overloaded = index.overloaded().len(), "symbol index frozen");

        resolve_trait_references(&mut graph);
        attach_impl_methods(&mut graph, &mut diagnostics);

        // Phase 3: edges
        build_containment(&mut graph, &mut stats);
        calls::resolve_calls(&mut graph, &index, &mut stats, &mut diagnostics);
        type_deps::resolve_type_dependencies(&mut graph, &mut stats);

        stats.finish(&graph);
        info!(run_id = %stats.run_id, elapsed_ms = stats.elapsed_ms(), "{}", stats);

        Ok(BuildOutput {
            graph,
            stats,
            diagnostics,
        })
    }
}

// =============================================================================
// MERGE
// =============================================================================

fn merge_module(
    graph: &mut CodeGraph,
    index: &mut SymbolIndexBuilder,
    module: ModuleBuild,
    stats: &mut BuildStats,
    diagnostics: &mut Vec<Diagnostic>,
) {
    stats.skipped_facts += module.skipped_facts;
    stats.incomplete_calls += module.incomplete_calls;
    stats.literal_calls += module.literal_calls;
    diagnostics.extend(module.diagnostics);

    let mut duplicates = 0usize;

    if let Some(entity) = module.module {
        graph.modules.entry(entity.id.clone()).or_insert(entity);
    }

    for function in module.functions {
        let key = SimpleKey::new(&function.module_name, &function.name);
        let id = function.id.clone();
        if insert_unique(&mut graph.functions, id.clone(), function, &mut duplicates) {
            index.insert(key, id);
        }
    }
    for nested in module.nested_functions {
        insert_unique(&mut graph.nested_functions, nested.id.clone(), nested, &mut duplicates);
    }
    graph.call_sites.extend(module.call_sites);

    for entity in module.types {
        insert_unique(&mut graph.types, entity.id.clone(), entity, &mut duplicates);
    }
    for entity in module.constructors {
        insert_unique(&mut graph.constructors, entity.id.clone(), entity, &mut duplicates);
    }
    for entity in module.fields {
        insert_unique(&mut graph.fields, entity.id.clone(), entity, &mut duplicates);
    }
    for entity in module.classes {
        insert_unique(&mut graph.classes, entity.id.clone(), entity, &mut duplicates);
    }
    for entity in module.instances {
        insert_unique(&mut graph.instances, entity.id.clone(), entity, &mut duplicates);
    }
    for entity in module.imports {
        insert_unique(&mut graph.imports, entity.id.clone(), entity, &mut duplicates);
    }
    for entity in module.traits {
        insert_unique(&mut graph.traits, entity.id.clone(), entity, &mut duplicates);
    }
    for entity in module.trait_methods {
        insert_unique(&mut graph.trait_methods, entity.id.clone(), entity, &mut duplicates);
    }
    for entity in module.impl_blocks {
        insert_unique(&mut graph.impl_blocks, entity.id.clone(), entity, &mut duplicates);
    }
    for entity in module.constants {
        insert_unique(&mut graph.constants, entity.id.clone(), entity, &mut duplicates);
    }

    stats.duplicate_entities += duplicates;
}

/// First definition wins.
fn insert_unique<T>(map: &mut BTreeMap<String, T>, id: String, entity: T, duplicates: &mut usize) -> bool {
    if map.contains_key(&id) {
        debug!(id = %id, "duplicate entity id");
        *duplicates += 1;
        return false;
    }
    map.insert(id, entity);
    true
}

/// Point each trait impl at its trait: by fully qualified path, then by name
/// in the same module, then by name anywhere.
fn resolve_trait_references(graph: &mut CodeGraph) {
    for block in graph.impl_blocks.values_mut() {
        let Some(trait_name) = block.trait_name.as_deref() else {
            continue;
        };
        let by_fqp = block.trait_fqp.as_deref().and_then(|fqp| {
            graph
                .traits
                .values()
                .find(|t| t.id == fqp || t.fully_qualified_path.as_deref() == Some(fqp))
        });
        let found = by_fqp
            .or_else(|| {
                graph
                    .traits
                    .values()
                    .find(|t| t.name == trait_name && t.module_name == block.module_name)
            })
            .or_else(|| graph.traits.values().find(|t| t.name == trait_name));
        block.trait_id = found.map(|t| t.id.clone());
    }
}

/// Attach each impl block's listed methods to functions of the same module.
///
/// Functions inside the block's line range are preferred. Ownership is
/// exclusive: a function already owned by another block is left alone.
fn attach_impl_methods(graph: &mut CodeGraph, diagnostics: &mut Vec<Diagnostic>) {
    let blocks: Vec<(String, String, u32, u32, Vec<String>)> = graph
        .impl_blocks
        .values()
        .map(|b| {
            (
                b.id.clone(),
                b.module_name.clone(),
                b.line_number_start,
                b.line_number_end,
                b.method_names.clone(),
            )
        })
        .collect();

    for (impl_id, module, start, end, methods) in blocks {
        for method in methods {
            let candidates: Vec<(String, Option<String>, u32)> = graph
                .functions
                .values()
                .filter(|f| f.module_name == module && f.name == method)
                .map(|f| (f.id.clone(), f.impl_block_id.clone(), f.line_number_start))
                .collect();
            if candidates.is_empty() {
                debug!(impl_block = %impl_id, method = %method, "impl method has no function");
                continue;
            }
            if candidates.iter().any(|(_, owner, _)| owner.as_deref() == Some(impl_id.as_str())) {
                continue;
            }

            let in_range: Vec<&(String, Option<String>, u32)> = candidates
                .iter()
                .filter(|(_, _, line)| start > 0 && *line >= start && *line <= end)
                .collect();
            let pool: Vec<&(String, Option<String>, u32)> = if in_range.is_empty() {
                candidates.iter().collect()
            } else {
                in_range
            };

            match pool.iter().find(|(_, owner, _)| owner.is_none()) {
                Some((function_id, _, _)) => {
                    if let Some(function) = graph.functions.get_mut(function_id) {
                        function.impl_block_id = Some(impl_id.clone());
                    }
                }
                None => {
                    warn!(impl_block = %impl_id, method = %method, "method already owned by another impl block");
                    diagnostics.push(Diagnostic::warning(
                        "ownership_conflict",
                        format!("{} in {} is already owned by another impl block", method, impl_id),
                    ));
                }
            }
        }
    }
}

// =============================================================================
// CONTAINMENT
// =============================================================================

fn build_containment(graph: &mut CodeGraph, stats: &mut BuildStats) {
    let mut edges: Vec<ContainsEdge> = Vec::new();
    let mut imports: Vec<ImportsEdge> = Vec::new();
    let mut implements: Vec<ImplementsEdge> = Vec::new();

    for f in graph.functions.values() {
        edges.push(ContainsEdge::new(&f.module_name, &f.id, ContainmentKind::ModuleFunction));
        if let Some(impl_id) = &f.impl_block_id {
            edges.push(ContainsEdge::new(impl_id, &f.id, ContainmentKind::ImplMethod));
        }
        if let Some(instance_id) = &f.instance_id {
            edges.push(ContainsEdge::new(instance_id, &f.id, ContainmentKind::InstanceMethod));
        }
    }
    for n in graph.nested_functions.values() {
        edges.push(ContainsEdge::new(&n.parent_id, &n.id, ContainmentKind::FunctionNested));
    }
    for t in graph.types.values() {
        edges.push(ContainsEdge::new(&t.module_name, &t.id, ContainmentKind::ModuleType));
    }
    for (order, c) in graph.constructors.values().enumerate() {
        edges.push(
            ContainsEdge::new(&c.type_id, &c.id, ContainmentKind::TypeConstructor).with_order(order as u32),
        );
    }
    for field in graph.fields.values() {
        edges.push(ContainsEdge::new(&field.constructor_id, &field.id, ContainmentKind::ConstructorField));
    }
    for c in graph.classes.values() {
        edges.push(ContainsEdge::new(&c.module_name, &c.id, ContainmentKind::ModuleClass));
    }
    for i in graph.instances.values() {
        edges.push(ContainsEdge::new(&i.module_name, &i.id, ContainmentKind::ModuleInstance));
    }
    for t in graph.traits.values() {
        edges.push(ContainsEdge::new(&t.module_name, &t.id, ContainmentKind::ModuleTrait));
    }
    for m in graph.trait_methods.values() {
        edges.push(ContainsEdge::new(&m.trait_id, &m.id, ContainmentKind::TraitMethod));
    }
    for b in graph.impl_blocks.values() {
        edges.push(ContainsEdge::new(&b.module_name, &b.id, ContainmentKind::ModuleImplBlock));
        if let Some(trait_id) = &b.trait_id {
            implements.push(ImplementsEdge::new(&b.id, trait_id, &b.struct_name));
        }
    }
    for c in graph.constants.values() {
        edges.push(ContainsEdge::new(&c.module_name, &c.id, ContainmentKind::ModuleConstant));
    }
    for i in graph.imports.values() {
        edges.push(ContainsEdge::new(&i.module_name, &i.id, ContainmentKind::ModuleImport));
        let mut edge = ImportsEdge::new(&i.module_name, &i.target_module);
        if let Some(alias) = &i.as_module_name {
            edge = edge.with_alias(alias);
        }
        if i.is_qualified() {
            edge = edge.qualified();
        }
        if i.is_hiding {
            edge = edge.hiding();
        }
        imports.push(edge);
    }

    for edge in edges {
        if !graph.insert_contains(edge) {
            stats.skipped_duplicates += 1;
        }
    }
    for edge in imports {
        graph.insert_import_edge(edge);
    }
    for edge in implements {
        graph.insert_implements(edge);
    }

    debug!(
        contains = graph.contains.len(),
        imports = graph.import_edges.len(),
        implements = graph.implements.len(),
        "containment edges built"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(value: serde_json::Value) -> BuildOutput {
        let batch = FactBatch::from_value(value);
        GraphBuilder::default().with_worker_threads(2).build(&batch).unwrap()
    }

    #[test]
    fn test_duplicate_calls_collapse_to_one_edge() {
        let out = build(json!([{
            "module_name": "m",
            "functions": [
                {"name": "f", "functions_called": [
                    {"module_name": "m", "name": "g"},
                    {"module_name": "m", "name": "g"}
                ]},
                {"name": "g"}
            ]
        }]));
        assert_eq!(out.stats.call_edges, 1);
        assert!(out.graph.has_call("m:f:", "m:g:"));
        assert_eq!(out.stats.skipped_duplicates, 1);
    }

    #[test]
    fn test_ambiguous_call_fans_out() {
        let out = build(json!({
            "module_name": "m",
            "functions": [
                {"name": "g", "src_loc": "m.hs:1:1", "line_number_start": 1},
                {"name": "g", "src_loc": "m.hs:5:1", "line_number_start": 5},
                {"name": "f", "functions_called": [{"module_name": "m", "name": "g"}]}
            ]
        }));
        assert_eq!(out.stats.call_edges, 2);
        assert_eq!(out.stats.ambiguous_calls, 1);
        assert!(out.diagnostics.iter().any(|d| d.kind == "ambiguous_reference"));
    }

    #[test]
    fn test_unresolved_call_is_recorded() {
        let out = build(json!({
            "module_name": "m",
            "functions": [{"name": "f", "functions_called": [{"module_name": "Prelude", "name": "map"}]}]
        }));
        assert_eq!(out.stats.call_edges, 0);
        assert_eq!(out.graph.unresolved_calls().len(), 1);
        assert_eq!(out.stats.unresolved_calls, 1);
    }

    #[test]
    fn test_nested_function_calls() {
        let out = build(json!({
            "module_name": "m",
            "functions": [
                {"name": "f", "where_functions": {"go": {"functions_called": [{"module_name": "m", "name": "g"}]}}},
                {"name": "g"}
            ]
        }));
        assert!(out.graph.has_call("m:f:.go", "m:g:"));
        assert!(out
            .graph
            .contains_edges()
            .any(|e| e.from == "m:f:" && e.to == "m:f:.go" && e.kind == ContainmentKind::FunctionNested));
    }

    #[test]
    fn test_instance_usage_adds_edge() {
        let out = build(json!([
            {
                "module_name": "Lib",
                "instances": [{"instanceDefinition": "instance Show T", "instanceType": "Show Lib.T", "line_number_start": 10, "line_number_end": 20}],
                "functions": [
                    {"name": "showT", "line_number_start": 11, "line_number_end": 12,
                     "functions_called": [{"module_name": "Lib", "name": "render"}]},
                    {"name": "render", "line_number_start": 30}
                ]
            },
            {
                "module_name": "App",
                "functions": [{"name": "main", "instances_used": ["GHC.Show.Show Lib.T"]}]
            }
        ]));
        assert_eq!(out.stats.uses_instance_edges, 1);
        let edge = out.graph.uses_instance_edges().next().unwrap();
        assert_eq!(edge.from, "App:main:");
        assert_eq!(edge.to, "Lib:instance Show T");
        let show = out.graph.function("Lib:showT:").unwrap();
        assert_eq!(show.instance_id.as_deref(), Some("Lib:instance Show T"));
        assert!(out.graph.has_call("Lib:showT:", "Lib:render:"));
    }

    #[test]
    fn test_impl_methods_are_exclusive() {
        let out = build(json!({
            "module_name": "shapes",
            "traits": [{"name": "Area", "fully_qualified_path": "crate::Area"}],
            "impl_blocks": [
                {"struct_name": "Circle", "trait_name": "Area", "trait_fqp": "crate::Area", "line_number_start": 1, "line_number_end": 5, "methods": ["area"]},
                {"struct_name": "Square", "trait_name": "Area", "line_number_start": 10, "line_number_end": 15, "methods": ["area"]}
            ],
            "functions": [
                {"name": "area", "src_loc": "s.rs:2", "line_number_start": 2},
                {"name": "area", "src_loc": "s.rs:11", "line_number_start": 11}
            ]
        }));
        let circle = out.graph.impl_block("shapes::impl::Circle::Area@1").unwrap();
        assert_eq!(circle.trait_id.as_deref(), Some("crate::Area"));
        assert_eq!(out.graph.impl_methods(&circle.id).count(), 1);
        let square_methods: Vec<u32> = out
            .graph
            .impl_methods("shapes::impl::Square::Area@10")
            .map(|f| f.line_number_start)
            .collect();
        assert_eq!(square_methods, vec![11]);
        assert_eq!(out.graph.implements.len(), 2);
    }

    #[test]
    fn test_type_dependencies_skip_owner() {
        let atomic = |module: &str, name: &str| json!({"tag": "AtomicType", "contents": {"module_name": module, "type_name": name}});
        let out = build(json!({
            "module_name": "m",
            "types": [
                {"type_name": "Tree", "data_constructors_list": [{"dataConNames": "Node", "fields": {
                    "left": {"raw_code": "Tree", "structure": atomic("m", "Tree")},
                    "label": {"raw_code": "Label", "structure": atomic("m", "Label")},
                    "other": {"raw_code": "Label", "structure": atomic("m", "Label")}
                }}]},
                {"type_name": "Label"}
            ]
        }));
        let deps: Vec<&str> = out.graph.type_dependencies_of("m:Tree").collect();
        assert_eq!(deps, vec!["m:Label"]);
        assert_eq!(out.stats.type_dependency_edges, 2);
    }

    #[test]
    fn test_rejected_modules_are_diagnostics() {
        let out = build(json!([{"module_name": "m"}, "garbage"]));
        assert_eq!(out.stats.modules, 1);
        assert_eq!(out.stats.skipped_facts, 1);
    }
}
