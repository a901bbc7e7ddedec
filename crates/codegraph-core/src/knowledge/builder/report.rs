//! Build results: diagnostics and statistics.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::knowledge::error::KnowledgeError;
use crate::knowledge::graph::CodeGraph;
use crate::knowledge::ontology::EntityKind;

/// How much a diagnostic matters to a reader of the build report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected noise such as library calls
    #[default]
    Info,
    /// A fact or reference was dropped or approximated
    Warning,
}

/// A non-fatal problem observed during construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Error category (`parse_fact`, `unresolved_reference`, ...)
    pub kind: String,
    pub message: String,
}

impl Diagnostic {
    pub fn from_error(err: &KnowledgeError) -> Self {
        let (kind, severity) = match err {
            KnowledgeError::ParseFact { .. } => ("parse_fact", Severity::Warning),
            KnowledgeError::UnresolvedReference { .. } => ("unresolved_reference", Severity::Info),
            KnowledgeError::AmbiguousReference { .. } => ("ambiguous_reference", Severity::Warning),
            KnowledgeError::UnknownVariant(_) => ("unknown_variant", Severity::Info),
            _ => ("other", Severity::Warning),
        };
        Self {
            severity,
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }

    pub fn warning(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStats {
    /// Identifier of this ingestion run
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    pub modules: usize,
    /// Records per entity kind
    pub entities: BTreeMap<EntityKind, usize>,

    pub call_edges: usize,
    pub type_dependency_edges: usize,
    pub uses_instance_edges: usize,
    pub containment_edges: usize,

    /// Facts skipped because they could not be decoded
    pub skipped_facts: usize,
    /// Entities dropped because their id was already taken
    pub duplicate_entities: usize,
    /// Edge insertions that hit an existing pair
    pub skipped_duplicates: usize,
    /// Call sites with no module or name
    pub incomplete_calls: usize,
    /// Literal pseudo-calls dropped before resolution
    pub literal_calls: usize,
    pub unresolved_calls: usize,
    pub ambiguous_calls: usize,
    /// Type dependencies on types not defined in the batch
    pub external_type_refs: usize,
}

impl BuildStats {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            modules: 0,
            entities: BTreeMap::new(),
            call_edges: 0,
            type_dependency_edges: 0,
            uses_instance_edges: 0,
            containment_edges: 0,
            skipped_facts: 0,
            duplicate_entities: 0,
            skipped_duplicates: 0,
            incomplete_calls: 0,
            literal_calls: 0,
            unresolved_calls: 0,
            ambiguous_calls: 0,
            external_type_refs: 0,
        }
    }

    /// Fill the entity and edge counters from the finished graph.
    pub(crate) fn finish(&mut self, graph: &CodeGraph) {
        self.entities = graph.entity_counts();
        self.modules = self.entities.get(&EntityKind::Module).copied().unwrap_or(0);
        self.call_edges = graph.calls.len();
        self.type_dependency_edges = graph.uses_type.len();
        self.uses_instance_edges = graph.uses_instance.len();
        self.containment_edges = graph.contains.len();
        self.unresolved_calls = graph.unresolved_calls.len();
        self.finished_at = Some(Utc::now());
    }

    pub fn entity_count(&self, kind: EntityKind) -> usize {
        self.entities.get(&kind).copied().unwrap_or(0)
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
            .unwrap_or(0)
    }
}

impl Default for BuildStats {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} modules, {} functions, {} nested functions, {} types, {} call edges, \
             {} type dependencies, {} skipped duplicates, {} unresolved calls, {} ambiguous calls",
            self.modules,
            self.entity_count(EntityKind::Function),
            self.entity_count(EntityKind::WhereFunction),
            self.entity_count(EntityKind::Type),
            self.call_edges,
            self.type_dependency_edges,
            self.skipped_duplicates,
            self.unresolved_calls,
            self.ambiguous_calls,
        )
    }
}

/// Everything one build produces.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub graph: CodeGraph,
    pub stats: BuildStats,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildOutput {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Diagnostics grouped by kind.
    pub fn diagnostic_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for diagnostic in &self.diagnostics {
            *counts.entry(diagnostic.kind.clone()).or_insert(0) += 1;
        }
        counts
    }
}
