//! Knowledge graph error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or querying the knowledge graph.
///
/// `ParseFact`, `UnresolvedReference`, `AmbiguousReference` and
/// `UnknownVariant` are data problems: construction records them as
/// [`Diagnostic`](super::builder::Diagnostic)s and keeps going. The remaining
/// variants are returned to the caller.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// A single fact is malformed.
    #[error("Malformed {entity} fact in module {module}: {message}")]
    ParseFact {
        module: String,
        entity: String,
        message: String,
    },

    /// A call or type reference names an entity that does not exist.
    #[error("Unresolved reference from {caller} to {callee}")]
    UnresolvedReference { caller: String, callee: String },

    /// A name resolved to more than one canonical candidate.
    #[error("Ambiguous reference from {caller} to {callee} ({candidates} candidates)")]
    AmbiguousReference {
        caller: String,
        callee: String,
        candidates: usize,
    },

    /// A type-expression tag is not recognized.
    #[error("Unknown type-expression variant: {0}")]
    UnknownVariant(String),

    /// A query names an unknown entity kind, operator or pattern.
    #[error("Query rejected: {0}")]
    QueryCompile(String),

    /// The backing store cannot be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Database query error.
    #[error("Database error: {0}")]
    Database(String),

    /// IO error.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decoding error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A background build task panicked or was cancelled.
    #[error("Ingestion worker failed: {0}")]
    Worker(String),
}

impl KnowledgeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        KnowledgeError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        KnowledgeError::QueryCompile(message.into())
    }

    /// Whether this error is a recoverable data problem rather than a caller error.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::ParseFact { .. }
                | Self::UnresolvedReference { .. }
                | Self::AmbiguousReference { .. }
                | Self::UnknownVariant(_)
        )
    }
}

impl From<std::io::Error> for KnowledgeError {
    fn from(err: std::io::Error) -> Self {
        KnowledgeError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<surrealdb::Error> for KnowledgeError {
    fn from(err: surrealdb::Error) -> Self {
        KnowledgeError::Database(err.to_string())
    }
}

impl From<crate::config::ConfigError> for KnowledgeError {
    fn from(err: crate::config::ConfigError) -> Self {
        KnowledgeError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for KnowledgeError {
    fn from(err: tokio::task::JoinError) -> Self {
        KnowledgeError::Worker(err.to_string())
    }
}
