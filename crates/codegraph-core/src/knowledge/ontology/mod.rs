//! Knowledge Graph Ontology
//!
//! Defines the canonical entities of the code knowledge graph and the
//! relationships between them.
//!
//! ## Modules
//!
//! - `nodes/` - Entity types: Code (Function, NestedFunction), Types (Type,
//!   Constructor, Field, Class), Contracts (Trait, ImplBlock, Instance),
//!   Structure (Module, Import, Constant)
//! - `edges/` - Relationship types: Structural (CONTAINS, IMPORTS), Behavioral
//!   (CALLS, USES_INSTANCE), TypeSystem (USES_TYPE, IMPLEMENTS)
//! - `type_expr` - Recursive type expressions carried by fields

pub mod edges;
pub mod nodes;
pub mod type_expr;

pub use edges::*;
pub use nodes::*;
pub use type_expr::{RecordField, TypeExpr, TypeRef, TypeVariant};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::KnowledgeError;

/// Marker trait for all entity types in the knowledge graph.
pub trait Node: Send + Sync {
    /// The entity kind this node belongs to.
    const KIND: EntityKind;

    /// The table name in SurrealDB for this node type.
    fn table_name() -> &'static str {
        Self::KIND.table_name()
    }

    /// Canonical identity of this entity.
    fn node_id(&self) -> &str;

    /// Owning module.
    fn module(&self) -> &str;
}

/// Marker trait for all edge types in the knowledge graph.
pub trait Edge: Send + Sync {
    /// The table name in SurrealDB for this edge type.
    fn table_name() -> &'static str;

    /// Human-readable relationship name for display.
    fn relation_name(&self) -> &'static str;
}

/// Categories of nodes for filtering and organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Executable code (functions, nested functions)
    Code,
    /// Type definitions (types, constructors, fields, classes)
    Type,
    /// Capability contracts (traits, impl blocks, instances)
    Contract,
    /// Organizational entities (modules, imports, constants)
    Structure,
}

// =============================================================================
// ENTITY KINDS
// =============================================================================

/// Every kind a query node may name.
///
/// `CallingFunction` and `CalledFunction` are the two directions of the call
/// relation; their rows are functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Module,
    Function,
    WhereFunction,
    Import,
    Type,
    Constructor,
    Field,
    Class,
    Instance,
    Trait,
    TraitMethodSignature,
    ImplBlock,
    Constant,
    CallingFunction,
    CalledFunction,
}

impl EntityKind {
    pub const ALL: [EntityKind; 15] = [
        Self::Module,
        Self::Function,
        Self::WhereFunction,
        Self::Import,
        Self::Type,
        Self::Constructor,
        Self::Field,
        Self::Class,
        Self::Instance,
        Self::Trait,
        Self::TraitMethodSignature,
        Self::ImplBlock,
        Self::Constant,
        Self::CallingFunction,
        Self::CalledFunction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Function => "function",
            Self::WhereFunction => "where_function",
            Self::Import => "import",
            Self::Type => "type",
            Self::Constructor => "constructor",
            Self::Field => "field",
            Self::Class => "class",
            Self::Instance => "instance",
            Self::Trait => "trait",
            Self::TraitMethodSignature => "trait_method_signature",
            Self::ImplBlock => "impl_block",
            Self::Constant => "constant",
            Self::CallingFunction => "calling_function",
            Self::CalledFunction => "called_function",
        }
    }

    /// The kind whose records this kind returns.
    pub fn record_kind(&self) -> EntityKind {
        match self {
            Self::CallingFunction | Self::CalledFunction => Self::Function,
            other => *other,
        }
    }

    /// SurrealDB table holding records of this kind.
    pub fn table_name(&self) -> &'static str {
        match self.record_kind() {
            Self::Module => "module",
            Self::Function => "function",
            Self::WhereFunction => "nested_function",
            Self::Import => "import",
            Self::Type => "type_def",
            Self::Constructor => "constructor",
            Self::Field => "field",
            Self::Class => "class",
            Self::Instance => "instance",
            Self::Trait => "trait_def",
            Self::TraitMethodSignature => "trait_method",
            Self::ImplBlock => "impl_block",
            Self::Constant => "constant",
            Self::CallingFunction | Self::CalledFunction => "function",
        }
    }

    pub fn category(&self) -> NodeCategory {
        match self.record_kind() {
            Self::Function | Self::WhereFunction => NodeCategory::Code,
            Self::Type | Self::Constructor | Self::Field | Self::Class => NodeCategory::Type,
            Self::Trait | Self::TraitMethodSignature | Self::ImplBlock | Self::Instance => {
                NodeCategory::Contract
            }
            _ => NodeCategory::Structure,
        }
    }
}

impl FromStr for EntityKind {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized == "called_by" {
            return Ok(Self::CallingFunction);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| KnowledgeError::query(format!("unknown entity kind '{}'", s)))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_parsing() {
        assert_eq!("function".parse::<EntityKind>().unwrap(), EntityKind::Function);
        assert_eq!("called_by".parse::<EntityKind>().unwrap(), EntityKind::CallingFunction);
        assert_eq!(" Impl_Block ".parse::<EntityKind>().unwrap(), EntityKind::ImplBlock);
        assert!("widget".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_call_relations_return_functions() {
        assert_eq!(EntityKind::CallingFunction.record_kind(), EntityKind::Function);
        assert_eq!(EntityKind::CalledFunction.table_name(), "function");
        assert_eq!(EntityKind::WhereFunction.category(), NodeCategory::Code);
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
    }
}
