//! Type-dependency edges derived from field type expressions.

use std::collections::BTreeSet;

use tracing::info;

use super::report::BuildStats;
use crate::knowledge::graph::CodeGraph;
use crate::knowledge::ontology::UsesTypeEdge;

/// Add a field -> type edge for every type a field's expression references,
/// except the field's own owning type.
pub(crate) fn resolve_type_dependencies(graph: &mut CodeGraph, stats: &mut BuildStats) {
    let pending: Vec<(String, String, BTreeSet<String>)> = graph
        .fields
        .values()
        .map(|field| {
            (
                field.id.clone(),
                field.type_id.clone(),
                field.structure.dependencies(),
            )
        })
        .collect();

    for (field_id, owner, deps) in pending {
        for dep in deps {
            if dep == owner {
                continue;
            }
            if !graph.types.contains_key(&dep) {
                stats.external_type_refs += 1;
            }
            if !graph.insert_type_dependency(UsesTypeEdge::new(&field_id, dep, &owner)) {
                stats.skipped_duplicates += 1;
            }
        }
    }

    info!(edges = graph.uses_type.len(), external = stats.external_type_refs, "type dependencies resolved");
}
