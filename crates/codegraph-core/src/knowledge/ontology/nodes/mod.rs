//! Node types for the knowledge graph.
//!
//! Nodes represent entities in the codebase. They are organized by domain:
//!
//! - **Code**: Functions, Nested Functions (plus Call Sites, which are not nodes)
//! - **Types**: Types, Constructors, Fields, Classes
//! - **Contracts**: Traits, Trait Method Signatures, Impl Blocks, Instances
//! - **Structure**: Modules, Imports, Constants

mod code;
mod contracts;
mod structure;
mod types;

pub use code::*;
pub use contracts::*;
pub use structure::*;
pub use types::*;

use super::{EntityKind, Node, NodeCategory};
use serde::{Deserialize, Serialize};

/// A unified node type that can hold any entity in the knowledge graph.
///
/// This enum allows for type-safe handling of different node types
/// while maintaining a unified interface for graph operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum GraphNode {
    // === Code Nodes ===
    Function(FunctionEntity),
    NestedFunction(NestedFunctionEntity),

    // === Type Nodes ===
    Type(TypeEntity),
    Constructor(ConstructorEntity),
    Field(FieldEntity),
    Class(ClassEntity),

    // === Contract Nodes ===
    Trait(TraitEntity),
    TraitMethod(TraitMethodSignatureEntity),
    ImplBlock(ImplBlockEntity),
    Instance(InstanceEntity),

    // === Structure Nodes ===
    Module(ModuleEntity),
    Import(ImportEntity),
    Constant(ConstantEntity),
}

impl GraphNode {
    /// Get the entity kind of this node.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Function(_) => FunctionEntity::KIND,
            Self::NestedFunction(_) => NestedFunctionEntity::KIND,
            Self::Type(_) => TypeEntity::KIND,
            Self::Constructor(_) => ConstructorEntity::KIND,
            Self::Field(_) => FieldEntity::KIND,
            Self::Class(_) => ClassEntity::KIND,
            Self::Trait(_) => TraitEntity::KIND,
            Self::TraitMethod(_) => TraitMethodSignatureEntity::KIND,
            Self::ImplBlock(_) => ImplBlockEntity::KIND,
            Self::Instance(_) => InstanceEntity::KIND,
            Self::Module(_) => ModuleEntity::KIND,
            Self::Import(_) => ImportEntity::KIND,
            Self::Constant(_) => ConstantEntity::KIND,
        }
    }

    /// Get the category of this node.
    pub fn category(&self) -> NodeCategory {
        self.kind().category()
    }

    /// Get the canonical id of this node.
    pub fn id(&self) -> &str {
        match self {
            Self::Function(n) => n.node_id(),
            Self::NestedFunction(n) => n.node_id(),
            Self::Type(n) => n.node_id(),
            Self::Constructor(n) => n.node_id(),
            Self::Field(n) => n.node_id(),
            Self::Class(n) => n.node_id(),
            Self::Trait(n) => n.node_id(),
            Self::TraitMethod(n) => n.node_id(),
            Self::ImplBlock(n) => n.node_id(),
            Self::Instance(n) => n.node_id(),
            Self::Module(n) => n.node_id(),
            Self::Import(n) => n.node_id(),
            Self::Constant(n) => n.node_id(),
        }
    }

    /// Get the module this node belongs to.
    pub fn module(&self) -> &str {
        match self {
            Self::Function(n) => n.module(),
            Self::NestedFunction(n) => n.module(),
            Self::Type(n) => n.module(),
            Self::Constructor(n) => n.module(),
            Self::Field(n) => n.module(),
            Self::Class(n) => n.module(),
            Self::Trait(n) => n.module(),
            Self::TraitMethod(n) => n.module(),
            Self::ImplBlock(n) => n.module(),
            Self::Instance(n) => n.module(),
            Self::Module(n) => n.module(),
            Self::Import(n) => n.module(),
            Self::Constant(n) => n.module(),
        }
    }

    /// Serialize the entity's own fields (without the node tag).
    pub fn to_record(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Function(n) => serde_json::to_value(n),
            Self::NestedFunction(n) => serde_json::to_value(n),
            Self::Type(n) => serde_json::to_value(n),
            Self::Constructor(n) => serde_json::to_value(n),
            Self::Field(n) => serde_json::to_value(n),
            Self::Class(n) => serde_json::to_value(n),
            Self::Trait(n) => serde_json::to_value(n),
            Self::TraitMethod(n) => serde_json::to_value(n),
            Self::ImplBlock(n) => serde_json::to_value(n),
            Self::Instance(n) => serde_json::to_value(n),
            Self::Module(n) => serde_json::to_value(n),
            Self::Import(n) => serde_json::to_value(n),
            Self::Constant(n) => serde_json::to_value(n),
        }
    }
}
