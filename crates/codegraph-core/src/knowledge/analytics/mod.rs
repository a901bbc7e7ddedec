//! Graph algorithms and lookups over a frozen [`CodeGraph`].
//!
//! Every traversal is bounded by [`GraphConfig`]: call-graph expansion by
//! depth and a total node budget, type reachability by a node budget.

mod calls;
mod complexity;
mod lookups;
mod types;

pub use calls::{
    CallGraphNode, CalledFunction, ExternalCall, FunctionSummary, FunctionsUsed, ModuleCoupling,
    ModuleDependency, ModuleMetrics,
};
pub use complexity::{ComplexFunction, ComplexityMetrics};
pub use types::{ModuleTypeDependency, TypeComplexity};

use crate::config::GraphConfig;

use super::graph::CodeGraph;

/// Read-only analytics borrowing a graph snapshot.
pub struct Analytics<'g> {
    graph: &'g CodeGraph,
    config: GraphConfig,
}

impl<'g> Analytics<'g> {
    pub fn new(graph: &'g CodeGraph, config: &GraphConfig) -> Self {
        Self {
            graph,
            config: config.clone(),
        }
    }

    pub fn with_defaults(graph: &'g CodeGraph) -> Self {
        Self::new(graph, &GraphConfig::default())
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }
}
