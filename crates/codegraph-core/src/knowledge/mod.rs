//! Code knowledge graph built from parser facts.
//!
//! This module turns per-module facts into a typed graph and answers
//! questions about it:
//! - **Construction** with identity resolution and deduplicated edges
//! - **Declarative queries** over entity kinds with nested joins
//! - **Structural patterns** and bounded graph algorithms
//!
//! # Components
//!
//! - [`KnowledgeGraph`] - Main facade implementing [`KnowledgeStore`]
//! - [`GraphBuilder`] - Fact batch to [`CodeGraph`] snapshot
//! - [`QueryEngine`] / [`PatternMatcher`] / [`Analytics`] - Read-only views of a snapshot
//! - [`GraphDb`] - SurrealDB embedded store
//!
//! # Storage
//!
//! Snapshots live in memory behind an `Arc`. When a [`GraphDb`] is attached,
//! every ingestion replaces the stored entity set with the new snapshot.
//!
//! # Example
//!
//! ```ignore
//! use codegraph_core::knowledge::{KnowledgeGraph, KnowledgeStore, QueryNode};
//!
//! let kg = KnowledgeGraph::open(config).await?;
//! kg.initialize().await?;
//! kg.ingest_path(Path::new("facts/")).await?;
//!
//! let callers = kg
//!     .query(&QueryNode::new("function").with_condition("name", "eq", "g".into())
//!         .join(QueryNode::new("calling_function")))
//!     .await?;
//! ```

pub mod analytics;
pub mod builder;
mod db;
mod error;
pub mod facts;
mod graph;
pub mod identity;
pub mod ontology;
pub mod patterns;
pub mod query;

pub use analytics::{Analytics, CallGraphNode};
pub use builder::{BuildOutput, BuildStats, Diagnostic, GraphBuilder};
pub use db::{edge_key, GraphDb, PersistStats, EDGE_TABLES, NODE_TABLES};
pub use error::KnowledgeError;
pub use facts::FactBatch;
pub use graph::CodeGraph;
pub use ontology::{EntityKind, GraphEdge, GraphNode, TypeExpr};
pub use patterns::{CallMode, PatternMatcher, PatternRequest};
pub use query::{QueryEngine, QueryNode};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;

/// Result of one ingestion through the facade.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub stats: BuildStats,
    pub diagnostics: Vec<Diagnostic>,
    /// Present when a store is attached
    pub persisted: Option<PersistStats>,
}

/// Size of the current snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub entities: BTreeMap<EntityKind, usize>,
    pub call_edges: usize,
    pub unresolved_calls: usize,
    /// Run that produced the snapshot, if any
    pub last_run: Option<Uuid>,
}

/// Main interface for the code knowledge graph.
///
/// Ingestion swaps in a new snapshot; every read runs against the snapshot
/// current when it starts.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Initialize the backing store (create tables, indexes).
    async fn initialize(&self) -> Result<(), KnowledgeError>;

    /// Check if the store has been initialized.
    async fn is_initialized(&self) -> Result<bool, KnowledgeError>;

    /// Build a snapshot from a fact batch and make it current.
    async fn ingest(&self, batch: FactBatch) -> Result<IngestReport, KnowledgeError>;

    /// Load a fact file or directory and ingest it.
    async fn ingest_path(&self, path: &Path) -> Result<IngestReport, KnowledgeError>;

    /// Run a declarative query tree.
    async fn query(&self, query: &QueryNode) -> Result<Vec<Value>, KnowledgeError>;

    /// Run a structural pattern request.
    async fn pattern(&self, request: &PatternRequest) -> Result<Vec<Value>, KnowledgeError>;

    /// Expand the call graph below a function.
    async fn call_graph(&self, function_id: &str, depth: usize) -> Result<Option<CallGraphNode>, KnowledgeError>;

    /// Type ids reachable from a type.
    async fn reachable_types(
        &self,
        type_name: &str,
        module: &str,
        module_pattern: Option<&str>,
    ) -> Result<Vec<String>, KnowledgeError>;

    /// Get statistics about the current snapshot.
    async fn get_stats(&self) -> Result<GraphStats, KnowledgeError>;
}

/// The main knowledge graph implementation.
pub struct KnowledgeGraph {
    snapshot: RwLock<Arc<CodeGraph>>,
    last_run: RwLock<Option<Uuid>>,
    db: Option<Arc<GraphDb>>,
    config: Config,
}

impl KnowledgeGraph {
    /// Create a knowledge graph with no backing store.
    pub fn in_memory(config: Config) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(CodeGraph::new())),
            last_run: RwLock::new(None),
            db: None,
            config,
        }
    }

    /// Create a knowledge graph persisting to the configured database path.
    pub async fn open(config: Config) -> Result<Self, KnowledgeError> {
        let path = config.storage.db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KnowledgeError::io(parent, e))?;
        }
        let db = GraphDb::open(&path, &config.storage).await?;
        Ok(Self::with_db(db, config))
    }

    /// Create a knowledge graph over an already opened store.
    pub fn with_db(db: GraphDb, config: Config) -> Self {
        Self {
            db: Some(Arc::new(db)),
            ..Self::in_memory(config)
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> Option<&GraphDb> {
        self.db.as_deref()
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Arc<CodeGraph> {
        Arc::clone(&*self.snapshot.read().await)
    }

    fn builder(&self) -> GraphBuilder {
        GraphBuilder::new(&self.config.ingest)
    }
}

#[async_trait]
impl KnowledgeStore for KnowledgeGraph {
    async fn initialize(&self) -> Result<(), KnowledgeError> {
        match &self.db {
            Some(db) => db.initialize_schema().await,
            None => Ok(()),
        }
    }

    async fn is_initialized(&self) -> Result<bool, KnowledgeError> {
        match &self.db {
            Some(db) => db.is_initialized().await,
            None => Ok(true),
        }
    }

    async fn ingest(&self, batch: FactBatch) -> Result<IngestReport, KnowledgeError> {
        // The build fans out on its own rayon pool; keep it off the executor
        let builder = self.builder();
        let BuildOutput {
            graph,
            stats,
            diagnostics,
        } = tokio::task::spawn_blocking(move || builder.build(&batch)).await??;

        let persisted = match &self.db {
            Some(db) => {
                let written = db.replace(&graph).await?;
                db.record_run(&stats).await?;
                Some(written)
            }
            None => None,
        };

        *self.snapshot.write().await = Arc::new(graph);
        *self.last_run.write().await = Some(stats.run_id);
        info!(run_id = %stats.run_id, diagnostics = diagnostics.len(), "snapshot replaced");

        Ok(IngestReport {
            stats,
            diagnostics,
            persisted,
        })
    }

    async fn ingest_path(&self, path: &Path) -> Result<IngestReport, KnowledgeError> {
        let batch = FactBatch::load(path)?;
        self.ingest(batch).await
    }

    async fn query(&self, query: &QueryNode) -> Result<Vec<Value>, KnowledgeError> {
        let graph = self.snapshot().await;
        QueryEngine::new(&graph).execute(query)
    }

    async fn pattern(&self, request: &PatternRequest) -> Result<Vec<Value>, KnowledgeError> {
        let graph = self.snapshot().await;
        PatternMatcher::new(&graph).run(request)
    }

    async fn call_graph(&self, function_id: &str, depth: usize) -> Result<Option<CallGraphNode>, KnowledgeError> {
        let graph = self.snapshot().await;
        Analytics::new(&graph, &self.config.graph).get_function_call_graph(function_id, depth)
    }

    async fn reachable_types(
        &self,
        type_name: &str,
        module: &str,
        module_pattern: Option<&str>,
    ) -> Result<Vec<String>, KnowledgeError> {
        let graph = self.snapshot().await;
        Ok(Analytics::new(&graph, &self.config.graph).get_subgraph_by_type(type_name, module, module_pattern))
    }

    async fn get_stats(&self) -> Result<GraphStats, KnowledgeError> {
        let graph = self.snapshot().await;
        Ok(GraphStats {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            entities: graph.entity_counts(),
            call_edges: graph.call_edges().count(),
            unresolved_calls: graph.unresolved_calls().len(),
            last_run: *self.last_run.read().await,
        })
    }
}
