//! Edge types (relationships) for the knowledge graph.
//!
//! Edges represent relationships between nodes. They are organized by semantic meaning:
//!
//! - **Structural**: CONTAINS, IMPORTS
//! - **Behavioral**: CALLS, USES_INSTANCE
//! - **Type System**: USES_TYPE, IMPLEMENTS

mod behavioral;
mod structural;
mod type_system;

pub use behavioral::*;
pub use structural::*;
pub use type_system::*;

use serde::{Deserialize, Serialize};

use super::Edge;

/// A unified edge type that can represent any relationship in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "edge_type")]
pub enum GraphEdge {
    // === Structural Edges ===
    /// A contains B (module contains function, type declares constructor)
    Contains(ContainsEdge),
    /// A imports B (module imports module)
    Imports(ImportsEdge),

    // === Behavioral Edges ===
    /// A calls B (function calls function)
    Calls(CallsEdge),
    /// A uses instance B (function uses typeclass instance)
    UsesInstance(UsesInstanceEdge),

    // === Type System Edges ===
    /// A uses type B (field type references type)
    UsesType(UsesTypeEdge),
    /// A implements B (impl block implements trait)
    Implements(ImplementsEdge),
}

impl GraphEdge {
    /// Get the category of this edge.
    pub fn category(&self) -> EdgeCategory {
        match self {
            Self::Contains(_) | Self::Imports(_) => EdgeCategory::Structural,
            Self::Calls(_) | Self::UsesInstance(_) => EdgeCategory::Behavioral,
            Self::UsesType(_) | Self::Implements(_) => EdgeCategory::TypeSystem,
        }
    }

    /// Get the relationship name for display.
    pub fn relation_name(&self) -> &'static str {
        match self {
            Self::Contains(e) => e.relation_name(),
            Self::Imports(e) => e.relation_name(),
            Self::Calls(e) => e.relation_name(),
            Self::UsesInstance(e) => e.relation_name(),
            Self::UsesType(e) => e.relation_name(),
            Self::Implements(e) => e.relation_name(),
        }
    }

    /// Table the edge is persisted in.
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Contains(_) => ContainsEdge::table_name(),
            Self::Imports(_) => ImportsEdge::table_name(),
            Self::Calls(_) => CallsEdge::table_name(),
            Self::UsesInstance(_) => UsesInstanceEdge::table_name(),
            Self::UsesType(_) => UsesTypeEdge::table_name(),
            Self::Implements(_) => ImplementsEdge::table_name(),
        }
    }

    /// Get the source node ID.
    pub fn from_id(&self) -> &str {
        match self {
            Self::Contains(e) => &e.from,
            Self::Imports(e) => &e.from,
            Self::Calls(e) => &e.from,
            Self::UsesInstance(e) => &e.from,
            Self::UsesType(e) => &e.from,
            Self::Implements(e) => &e.from,
        }
    }

    /// Get the target node ID.
    pub fn to_id(&self) -> &str {
        match self {
            Self::Contains(e) => &e.to,
            Self::Imports(e) => &e.to,
            Self::Calls(e) => &e.to,
            Self::UsesInstance(e) => &e.to,
            Self::UsesType(e) => &e.to,
            Self::Implements(e) => &e.to,
        }
    }
}

macro_rules! edge_table {
    ($edge:ty, $table:literal, $relation:literal) => {
        impl Edge for $edge {
            fn table_name() -> &'static str {
                $table
            }

            fn relation_name(&self) -> &'static str {
                $relation
            }
        }
    };
}

edge_table!(ContainsEdge, "contains", "CONTAINS");
edge_table!(ImportsEdge, "imports", "IMPORTS");
edge_table!(CallsEdge, "calls", "CALLS");
edge_table!(UsesInstanceEdge, "uses_instance", "USES_INSTANCE");
edge_table!(UsesTypeEdge, "uses_type", "USES_TYPE");
edge_table!(ImplementsEdge, "implements", "IMPLEMENTS");

/// Categories of edges for filtering and organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeCategory {
    /// Structural relationships (contains, imports)
    Structural,
    /// Behavioral relationships (calls, uses_instance)
    Behavioral,
    /// Type system relationships (uses_type, implements)
    TypeSystem,
}
