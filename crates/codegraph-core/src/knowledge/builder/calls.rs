//! Call-edge resolution.
//!
//! Runs after the symbol index is frozen. Every function and, through its
//! nesting tree, every nested function has its call sites resolved against
//! the index. Instance methods are ordinary functions and are already
//! seeded. Instance usages add uses-instance edges from top-level functions
//! only; `instances_used` on a nested fact is not read.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info};

use super::report::{BuildStats, Diagnostic};
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::graph::CodeGraph;
use crate::knowledge::identity::{normalize_instance_signature, Resolution, SymbolIndex};
use crate::knowledge::ontology::{CallSite, CallType, CallsEdge, UsesInstanceEdge};

enum Work {
    Function(String),
    Nested(String),
}

pub(crate) fn resolve_calls(
    graph: &mut CodeGraph,
    index: &SymbolIndex,
    stats: &mut BuildStats,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut sites_by_caller: BTreeMap<String, Vec<CallSite>> = BTreeMap::new();
    for site in &graph.call_sites {
        sites_by_caller
            .entry(site.caller_id.clone())
            .or_default()
            .push(site.clone());
    }

    let mut instances_by_signature: HashMap<String, Vec<String>> = HashMap::new();
    for instance in graph.instances.values() {
        instances_by_signature
            .entry(instance.normalized_signature.clone())
            .or_default()
            .push(instance.id.clone());
    }

    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    for nested in graph.nested_functions.values() {
        children
            .entry(nested.parent_id.clone())
            .or_default()
            .push(nested.id.clone());
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<Work> = graph
        .functions
        .keys()
        .rev()
        .map(|id| Work::Function(id.clone()))
        .collect();

    while let Some(work) = stack.pop() {
        let (id, is_function) = match work {
            Work::Function(id) => (id, true),
            Work::Nested(id) => (id, false),
        };
        if !visited.insert(id.clone()) {
            continue;
        }

        if let Some(sites) = sites_by_caller.get(&id) {
            for site in sites {
                resolve_site(graph, index, site, stats, diagnostics);
            }
        }

        if let Some(nested) = children.get(&id) {
            stack.extend(nested.iter().rev().cloned().map(Work::Nested));
        }

        if is_function {
            let used = graph
                .functions
                .get(&id)
                .map(|f| f.instances_used.clone())
                .unwrap_or_default();
            for signature in used {
                let normalized = normalize_instance_signature(&signature);
                let Some(instance_ids) = instances_by_signature.get(&normalized) else {
                    debug!(function = %id, signature = %signature, "no instance for signature");
                    continue;
                };
                for instance_id in instance_ids {
                    if !graph.insert_uses_instance(UsesInstanceEdge::new(&id, instance_id, &signature)) {
                        stats.skipped_duplicates += 1;
                    }
                }
            }
        }
    }

    info!(
        call_edges = graph.calls.len(),
        unresolved = graph.unresolved_calls.len(),
        ambiguous = stats.ambiguous_calls,
        uses_instance = graph.uses_instance.len(),
        "call graph resolved"
    );
}

fn resolve_site(
    graph: &mut CodeGraph,
    index: &SymbolIndex,
    site: &CallSite,
    stats: &mut BuildStats,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let resolution = index.resolve(&site.callee_module, &site.callee_name);
    let candidates = resolution.candidates();

    match &resolution {
        Resolution::Unresolved => {
            debug!(caller = %site.caller_id, callee = %site.target(), "unresolved call");
            diagnostics.push(Diagnostic::from_error(&KnowledgeError::UnresolvedReference {
                caller: site.caller_id.clone(),
                callee: site.target(),
            }));
            graph.unresolved_calls.push(site.clone());
            return;
        }
        Resolution::Ambiguous(ids) => {
            debug!(caller = %site.caller_id, callee = %site.target(), candidates = ids.len(), "ambiguous call");
            stats.ambiguous_calls += 1;
            diagnostics.push(Diagnostic::from_error(&KnowledgeError::AmbiguousReference {
                caller: site.caller_id.clone(),
                callee: site.target(),
                candidates: ids.len(),
            }));
        }
        Resolution::Resolved(_) => {}
    }

    let call_type = CallType::from_hint(site.call_type.as_deref(), site.is_method);
    for callee in candidates {
        let mut edge = CallsEdge::new(&site.caller_id, callee).with_call_type(call_type);
        if let Some(line) = site.line {
            edge = edge.at_line(line);
        }
        if let Some(column) = site.column {
            edge = edge.at_column(column);
        }
        if resolution.is_ambiguous() {
            edge = edge.ambiguous();
        }
        if !graph.insert_call(edge) {
            stats.skipped_duplicates += 1;
        }
    }
}
