//! Structural edges: relationships that define code organization.
//!
//! These edges represent how code is organized and structured:
//! - CONTAINS: Parent owns child (module contains function, type contains constructor)
//! - IMPORTS: Module A imports module B

use serde::{Deserialize, Serialize};

// =============================================================================
// CONTAINS EDGE
// =============================================================================

/// A CONTAINS B: Parent entity owns child entity.
///
/// Containment edges are pure tree edges and need no resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainsEdge {
    /// Source node ID (parent)
    pub from: String,
    /// Target node ID (child)
    pub to: String,
    /// Which ownership relation this is
    pub kind: ContainmentKind,
    /// Order within parent (for maintaining source order)
    pub order: Option<u32>,
}

/// The ownership relation a CONTAINS edge encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContainmentKind {
    /// Module owns a function
    #[default]
    ModuleFunction,
    ModuleType,
    ModuleClass,
    ModuleInstance,
    ModuleTrait,
    ModuleImplBlock,
    ModuleConstant,
    ModuleImport,
    /// Function (or nested function) owns a nested function
    FunctionNested,
    /// Type declares a constructor
    TypeConstructor,
    /// Constructor has a field
    ConstructorField,
    /// Trait declares a method signature
    TraitMethod,
    /// Impl block owns a method
    ImplMethod,
    /// Instance defines a method
    InstanceMethod,
}

impl ContainmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleFunction => "module_function",
            Self::ModuleType => "module_type",
            Self::ModuleClass => "module_class",
            Self::ModuleInstance => "module_instance",
            Self::ModuleTrait => "module_trait",
            Self::ModuleImplBlock => "module_impl_block",
            Self::ModuleConstant => "module_constant",
            Self::ModuleImport => "module_import",
            Self::FunctionNested => "function_nested",
            Self::TypeConstructor => "declares",
            Self::ConstructorField => "has_field",
            Self::TraitMethod => "trait_method",
            Self::ImplMethod => "impl_method",
            Self::InstanceMethod => "instance_defines",
        }
    }
}

impl ContainsEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: ContainmentKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            order: None,
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }
}

// =============================================================================
// IMPORTS EDGE
// =============================================================================

/// A IMPORTS B: Module imports another module or package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportsEdge {
    /// Importing module
    pub from: String,
    /// Imported module
    pub to: String,
    /// Alias (`import X as Y`)
    pub alias: Option<String>,
    /// Whether the import is qualified
    pub is_qualified: bool,
    /// Whether the import hides names
    pub is_hiding: bool,
}

impl ImportsEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            alias: None,
            is_qualified: false,
            is_hiding: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn qualified(mut self) -> Self {
        self.is_qualified = true;
        self
    }

    pub fn hiding(mut self) -> Self {
        self.is_hiding = true;
        self
    }
}
