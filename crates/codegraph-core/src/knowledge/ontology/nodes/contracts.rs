//! Contract entity nodes: Traits, Trait Method Signatures, Impl Blocks,
//! Typeclass Instances.
//!
//! An impl block (systems language) or an instance (functional language) states
//! that a concrete type satisfies a contract, and owns the functions that do so.

use serde::{Deserialize, Serialize};

use super::super::{EntityKind, Node};

// =============================================================================
// TRAIT ENTITY
// =============================================================================

/// A trait or typeclass-like capability contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitEntity {
    /// Fully qualified path, else `module::name`
    pub id: String,
    pub name: String,
    pub module_name: String,
    pub fully_qualified_path: Option<String>,
    pub src_location: Option<String>,
    pub line_number_start: u32,
    pub line_number_end: u32,
}

impl Node for TraitEntity {
    const KIND: EntityKind = EntityKind::Trait;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}

/// An un-bodied method declared by a trait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitMethodSignatureEntity {
    pub id: String,
    pub name: String,
    pub trait_id: String,
    pub module_name: String,
    pub fully_qualified_path: Option<String>,
    pub src_code: Option<String>,
    pub line_number_start: u32,
    pub line_number_end: u32,
    pub is_async: bool,
    pub is_unsafe: bool,
}

impl Node for TraitMethodSignatureEntity {
    const KIND: EntityKind = EntityKind::TraitMethodSignature;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}

// =============================================================================
// IMPL BLOCK ENTITY
// =============================================================================

/// `impl [Trait for] Struct { .. }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplBlockEntity {
    /// `module_path::impl::struct[::trait]@line`
    pub id: String,
    pub module_name: String,
    pub struct_name: String,
    pub struct_fqp: Option<String>,
    /// `None` for an inherent impl
    pub trait_name: Option<String>,
    pub trait_fqp: Option<String>,
    /// Resolved trait entity, when the trait is known to the graph
    pub trait_id: Option<String>,
    pub src_location: Option<String>,
    pub line_number_start: u32,
    pub line_number_end: u32,
    pub crate_name: Option<String>,
    pub module_path: Option<String>,
    /// Method names as declared by the producer
    pub method_names: Vec<String>,
}

impl ImplBlockEntity {
    pub fn is_inherent(&self) -> bool {
        self.trait_name.is_none()
    }
}

impl Node for ImplBlockEntity {
    const KIND: EntityKind = EntityKind::ImplBlock;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}

// =============================================================================
// INSTANCE ENTITY
// =============================================================================

/// A typeclass instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceEntity {
    /// `module:instance_definition`
    pub id: String,
    pub module_name: String,
    pub instance_definition: String,
    /// Signature as emitted (`instanceType`)
    pub instance_signature: String,
    /// Signature with qualification prefixes stripped
    pub normalized_signature: String,
    pub src_loc: Option<String>,
    pub line_number_start: u32,
    pub line_number_end: u32,
}

impl InstanceEntity {
    /// Whether a definition starting at `line` belongs to this instance.
    pub fn encloses(&self, line: u32) -> bool {
        self.line_number_start <= line && line <= self.line_number_end
    }
}

impl Node for InstanceEntity {
    const KIND: EntityKind = EntityKind::Instance;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}
