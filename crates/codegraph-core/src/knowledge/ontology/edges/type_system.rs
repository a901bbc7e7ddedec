//! Type system edges: relationships between types and contracts.
//!
//! - USES_TYPE: field A's declared type references type B
//! - IMPLEMENTS: impl block A implements trait B

use serde::{Deserialize, Serialize};

// =============================================================================
// USES_TYPE EDGE
// =============================================================================

/// A USES_TYPE B: a field's type expression references type B.
///
/// Derived only from `TypeExpr::dependencies`; never a self-reference to the
/// field's owning type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsesTypeEdge {
    /// Source node ID (field)
    pub from: String,
    /// Target type ID (`module:name`)
    pub to: String,
    /// Type owning the field
    pub owner_type: String,
}

impl UsesTypeEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, owner_type: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            owner_type: owner_type.into(),
        }
    }
}

// =============================================================================
// IMPLEMENTS EDGE
// =============================================================================

/// A IMPLEMENTS B: impl block A implements trait B.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementsEdge {
    /// Source node ID (impl block)
    pub from: String,
    /// Target node ID (trait)
    pub to: String,
    /// Implementing struct name
    pub struct_name: String,
}

impl ImplementsEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, struct_name: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            struct_name: struct_name.into(),
        }
    }
}
