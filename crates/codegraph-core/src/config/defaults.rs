//! Default values for codegraph configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Ingestion Defaults
// ============================================================================

/// Worker threads for per-module entity building (0 = one per core).
pub const DEFAULT_WORKER_THREADS: usize = 0;

/// Drop overloaded-literal pseudo calls before resolution.
pub const DEFAULT_SKIP_LITERAL_CALLS: bool = true;

/// Module name assigned to overloaded-literal call sites.
pub const LITERAL_MODULE: &str = "_lit";

// ============================================================================
// Graph Algorithm Defaults
// ============================================================================

/// Default depth for call-graph expansion.
pub const DEFAULT_CALL_DEPTH: usize = 2;

/// Upper bound on nodes visited by a type reachability query.
pub const DEFAULT_MAX_REACHABLE_NODES: usize = 10_000;

/// Upper bound on nodes emitted by a call-graph expansion.
pub const DEFAULT_MAX_CALL_GRAPH_NODES: usize = 10_000;

/// Minimum total complexity reported by `find_complex_functions`.
pub const DEFAULT_COMPLEXITY_THRESHOLD: usize = 10;

/// Decision keywords counted by the complexity estimate.
pub const DEFAULT_COMPLEXITY_KEYWORDS: &[&str] =
    &["if", "case", "of", "where", "let", "do", "->", "| "];

// ============================================================================
// Storage Defaults
// ============================================================================

/// Base directory for codegraph data.
pub const DEFAULT_DATA_DIR: &str = ".codegraph";

/// Database directory name inside the data dir.
pub const DEFAULT_DB_FILE: &str = "graph.db";

/// SurrealDB namespace.
pub const DEFAULT_NAMESPACE: &str = "codegraph";

/// SurrealDB database.
pub const DEFAULT_DATABASE: &str = "graph";

/// Records written per statement batch during persistence.
pub const DEFAULT_BULK_BATCH_SIZE: usize = 500;

// ============================================================================
// Logging Defaults
// ============================================================================

/// Default tracing filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";
