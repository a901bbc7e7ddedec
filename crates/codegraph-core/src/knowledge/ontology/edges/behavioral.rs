//! Behavioral edges: relationships that define code execution flow.
//!
//! - CALLS: A calls B (resolved function invocation)
//! - USES_INSTANCE: A uses typeclass instance B

use serde::{Deserialize, Serialize};

// =============================================================================
// CALLS EDGE
// =============================================================================

/// A CALLS B: Function A invokes function B.
///
/// Call edges are a set: at most one edge exists per (from, to) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallsEdge {
    /// Source node ID (caller)
    pub from: String,
    /// Target node ID (callee)
    pub to: String,
    /// Line number of the first observed call site
    pub line: Option<u32>,
    /// Column number of the first observed call site
    pub column: Option<u32>,
    /// Call type
    pub call_type: CallType,
    /// How the callee was identified
    pub resolution: CallResolution,
}

/// Type of function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    /// Direct function call
    #[default]
    Direct,
    /// Method call
    Method,
    /// Macro invocation
    Macro,
}

impl CallType {
    /// Read a producer `call_type` string.
    pub fn from_hint(hint: Option<&str>, is_method: bool) -> Self {
        match hint.map(|h| h.to_ascii_lowercase()) {
            Some(h) if h == "macro" => Self::Macro,
            Some(h) if h == "method" => Self::Method,
            _ if is_method => Self::Method,
            _ => Self::Direct,
        }
    }
}

/// How a call edge's callee was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallResolution {
    /// Exactly one candidate matched
    #[default]
    Exact,
    /// One of several candidates (fan-out)
    Ambiguous,
}

impl CallsEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            line: None,
            column: None,
            call_type: CallType::Direct,
            resolution: CallResolution::Exact,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn at_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }

    pub fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }

    pub fn ambiguous(mut self) -> Self {
        self.resolution = CallResolution::Ambiguous;
        self
    }
}

// =============================================================================
// USES_INSTANCE EDGE
// =============================================================================

/// A USES_INSTANCE B: function A relies on typeclass instance B.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsesInstanceEdge {
    /// Source node ID (function)
    pub from: String,
    /// Target node ID (instance)
    pub to: String,
    /// Signature as recorded on the function
    pub signature: String,
}

impl UsesInstanceEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            signature: signature.into(),
        }
    }
}
