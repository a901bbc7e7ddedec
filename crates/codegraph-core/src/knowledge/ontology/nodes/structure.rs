//! Structure entity nodes: Modules, Imports, Constants.
//!
//! These represent the organizational structure of a codebase.

use serde::{Deserialize, Serialize};

use super::super::{EntityKind, Node};

// =============================================================================
// MODULE ENTITY
// =============================================================================

/// A compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntity {
    /// Fully qualified module name
    pub id: String,
    pub name: String,
    /// Source path
    pub path: Option<String>,
    pub package_name: Option<String>,
}

impl ModuleEntity {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            path: None,
            package_name: None,
        }
    }
}

impl Node for ModuleEntity {
    const KIND: EntityKind = EntityKind::Module;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// IMPORT ENTITY
// =============================================================================

/// A directed reference from one module to another module or package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEntity {
    /// `module->target@line`
    pub id: String,
    /// Importing module
    pub module_name: String,
    /// Imported module
    pub target_module: String,
    pub package_name: Option<String>,
    pub src_loc: Option<String>,
    pub is_boot_source: bool,
    pub is_safe: bool,
    pub is_implicit: bool,
    /// `import X as Y`
    pub as_module_name: Option<String>,
    pub qualified_style: Option<String>,
    pub is_hiding: bool,
    pub hiding_specs: Vec<String>,
    pub line_number_start: u32,
    pub line_number_end: u32,
    pub path: Option<String>,
    pub visibility: Option<String>,
}

impl ImportEntity {
    pub fn is_qualified(&self) -> bool {
        self.qualified_style
            .as_deref()
            .map(|s| !s.is_empty() && !s.eq_ignore_ascii_case("NotQualified"))
            .unwrap_or(false)
    }
}

impl Node for ImportEntity {
    const KIND: EntityKind = EntityKind::Import;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}

// =============================================================================
// CONSTANT ENTITY
// =============================================================================

/// A constant or static item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantEntity {
    /// Fully qualified path, else `module::name`
    pub id: String,
    pub name: String,
    pub module_name: String,
    pub fully_qualified_path: Option<String>,
    pub src_code: Option<String>,
    pub const_type: Option<String>,
    pub is_static: bool,
    pub src_location: Option<String>,
    pub line_number_start: u32,
    pub line_number_end: u32,
}

impl Node for ConstantEntity {
    const KIND: EntityKind = EntityKind::Constant;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}
