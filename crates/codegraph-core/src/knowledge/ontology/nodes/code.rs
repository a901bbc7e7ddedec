//! Code entity nodes: Functions, Nested Functions, Call Sites.
//!
//! These are the executable constructs of a codebase. A nested function is a
//! function defined lexically inside another; nested functions form a tree
//! under their top-level function and are removed with it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::super::{EntityKind, Node};

// =============================================================================
// FUNCTION ENTITY
// =============================================================================

/// A top-level function or method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionEntity {
    /// Canonical key (see `identity::CanonicalKey`)
    pub id: String,

    /// Function name
    pub name: String,

    /// Module defining this function
    pub module_name: String,

    /// Signature text, if the producer emitted one
    pub signature: Option<String>,

    /// Source location (`file:line:col` style, producer-defined)
    pub src_loc: Option<String>,

    /// Full source text
    pub raw_string: Option<String>,

    /// Producer-specific kind tag
    pub type_enum: String,

    /// First line of the definition
    pub line_number_start: u32,

    /// Last line of the definition
    pub line_number_end: u32,

    /// Typeclass instance signatures used by the body
    pub instances_used: Vec<String>,

    /// Declared input types, as emitted
    pub function_input: Option<Value>,

    /// Declared output types, as emitted
    pub function_output: Option<Value>,

    /// Owning impl block (exclusive)
    pub impl_block_id: Option<String>,

    /// Owning typeclass instance
    pub instance_id: Option<String>,

    /// Fully qualified path (systems language)
    pub fully_qualified_path: Option<String>,

    /// Whether this is a method with a receiver
    pub is_method: bool,

    /// Visibility (pub, pub(crate), private)
    pub visibility: Option<String>,

    /// Documentation comment
    pub doc_comments: Option<String>,

    /// Crate the function was compiled in
    pub crate_name: Option<String>,

    /// Module path inside the crate
    pub module_path: Option<String>,
}

impl FunctionEntity {
    pub fn new(id: impl Into<String>, module_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            module_name: module_name.into(),
            signature: None,
            src_loc: None,
            raw_string: None,
            type_enum: String::new(),
            line_number_start: 0,
            line_number_end: 0,
            instances_used: Vec::new(),
            function_input: None,
            function_output: None,
            impl_block_id: None,
            instance_id: None,
            fully_qualified_path: None,
            is_method: false,
            visibility: None,
            doc_comments: None,
            crate_name: None,
            module_path: None,
        }
    }

    /// Whether `line` falls inside this function's span.
    pub fn spans_line(&self, line: u32) -> bool {
        self.line_number_start <= line && line <= self.line_number_end
    }
}

impl Node for FunctionEntity {
    const KIND: EntityKind = EntityKind::Function;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}

// =============================================================================
// NESTED FUNCTION ENTITY
// =============================================================================

/// A function defined inside another function (a `where` binding, a local
/// closure item).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedFunctionEntity {
    /// `parent_id.name`
    pub id: String,

    /// Local name
    pub name: String,

    /// Module of the enclosing top-level function
    pub module_name: String,

    /// Immediate parent (a function or another nested function)
    pub parent_id: String,

    /// Top-level function at the root of the nesting tree
    pub function_id: String,

    /// Nesting depth (1 = directly under a top-level function)
    pub depth: u32,

    /// Signature text
    pub signature: Option<String>,

    /// Source location
    pub src_loc: Option<String>,

    /// Full source text
    pub raw_string: Option<String>,

    /// Producer-specific kind tag
    pub type_enum: String,

    /// Fully qualified path (systems language)
    pub fully_qualified_path: Option<String>,

    /// Visibility
    pub visibility: Option<String>,
}

impl Node for NestedFunctionEntity {
    const KIND: EntityKind = EntityKind::WhereFunction;

    fn node_id(&self) -> &str {
        &self.id
    }

    fn module(&self) -> &str {
        &self.module_name
    }
}

// =============================================================================
// CALL SITE
// =============================================================================

/// A recorded attempt to call something. May or may not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Calling function or nested function id
    pub caller_id: String,

    /// Textual callee name
    pub callee_name: String,

    /// Callee module hint
    pub callee_module: String,

    /// Callee package hint
    pub package_name: Option<String>,

    /// Producer kind tag (e.g. `Var`, `OverLit`)
    pub kind: String,

    /// Source location of the call
    pub src_loc: Option<String>,

    /// Line of the call
    pub line: Option<u32>,

    /// Column of the call
    pub column: Option<u32>,

    /// Fully qualified callee path (systems language)
    pub fully_qualified_path: Option<String>,

    /// Whether the callee is invoked as a method
    pub is_method: bool,

    /// `function`, `method` or `macro`
    pub call_type: Option<String>,

    /// Crate the callee originates from
    pub origin_crate: Option<String>,

    /// Module the callee originates from
    pub origin_module: Option<String>,
}

impl CallSite {
    pub fn new(
        caller_id: impl Into<String>,
        callee_module: impl Into<String>,
        callee_name: impl Into<String>,
    ) -> Self {
        Self {
            caller_id: caller_id.into(),
            callee_name: callee_name.into(),
            callee_module: callee_module.into(),
            package_name: None,
            kind: String::new(),
            src_loc: None,
            line: None,
            column: None,
            fully_qualified_path: None,
            is_method: false,
            call_type: None,
            origin_crate: None,
            origin_module: None,
        }
    }

    /// `module:name` of the callee.
    pub fn target(&self) -> String {
        format!("{}:{}", self.callee_module, self.callee_name)
    }
}
