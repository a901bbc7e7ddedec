//! Type entity nodes: Types, Constructors, Fields, Classes.
//!
//! A type owns constructors, a constructor owns fields, and each field carries
//! the [`TypeExpr`] its type-dependency edges are derived from.

use serde::{Deserialize, Serialize};

use super::super::{EntityKind, Node, TypeExpr};

// =============================================================================
// TYPE ENTITY
// =============================================================================

/// What sort of definition a type is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Product type or struct
    #[default]
    Data,
    /// Sum type / enum with several constructors
    #[serde(rename = "sumtype")]
    SumType,
    /// Type alias
    #[serde(rename = "type")]
    Alias,
    /// Newtype wrapper
    #[serde(rename = "newtype")]
    NewType,
    /// Typeclass declaration
    Class,
    /// Typeclass instance
    Instance,
}

impl TypeKind {
    /// Resolve a producer kind string. Unknown strings are `Data`.
    pub fn resolve(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "type" | "alias" => Self::Alias,
            "newtype" => Self::NewType,
            "class" => Self::Class,
            "instance" => Self::Instance,
            "sumtype" | "enum" => Self::SumType,
            _ => Self::Data,
        }
    }

    /// Whether constructors are materialized for this kind.
    pub fn has_constructors(&self) -> bool {
        matches!(self, Self::Data | Self::SumType | Self::Alias)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::SumType => "sumtype",
            Self::Alias => "type",
            Self::NewType => "newtype",
            Self::Class => "class",
            Self::Instance => "instance",
        }
    }
}

/// A named type definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEntity {
    /// `module:type_name`
    pub id: String,

    /// Type name
    pub type_name: String,

    /// Defining module
    pub module_name: String,

    /// Kind tag
    pub kind: TypeKind,

    /// Full source text
    pub raw_code: String,

    /// Source location
    pub src_loc: String,

    pub line_number_start: u32,
    pub line_number_end: u32,
}

impl Node for TypeEntity {
    const KIND: EntityKind = EntityKind::Type;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}

// =============================================================================
// CONSTRUCTOR / FIELD
// =============================================================================

/// A data constructor (or the single shape of a struct).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorEntity {
    /// `type_id.name`
    pub id: String,
    pub name: String,
    pub type_id: String,
    pub module_name: String,
}

impl Node for ConstructorEntity {
    const KIND: EntityKind = EntityKind::Constructor;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}

/// A constructor field and its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntity {
    /// `constructor_id.name`
    pub id: String,
    pub name: String,
    pub constructor_id: String,
    /// Owning type
    pub type_id: String,
    pub module_name: String,
    /// Declared type as written in source
    pub raw_code: String,
    /// Human-readable rendering of `structure`
    pub rendered: String,
    /// Structured type expression
    pub structure: TypeExpr,
}

impl Node for FieldEntity {
    const KIND: EntityKind = EntityKind::Field;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}

// =============================================================================
// CLASS ENTITY
// =============================================================================

/// A typeclass declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntity {
    /// `module:class_name`
    pub id: String,
    pub class_name: String,
    pub module_name: String,
    pub class_definition: String,
    pub src_location: String,
    pub line_number_start: u32,
    pub line_number_end: u32,
}

impl Node for ClassEntity {
    const KIND: EntityKind = EntityKind::Class;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}
