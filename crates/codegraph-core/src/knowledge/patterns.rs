//! Structural pattern matchers.
//!
//! A pattern request is a JSON document tagged by `pattern_type` (the older
//! `type` key is accepted as well). Each matcher returns a list of small
//! JSON objects describing the matched entities.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::error::KnowledgeError;
use super::graph::CodeGraph;

/// Direction in which a call pattern reports its pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMode {
    #[default]
    Calls,
    CalledBy,
}

fn default_usage() -> String {
    "function".to_string()
}

fn default_structure() -> String {
    "nested_function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern_type", rename_all = "snake_case")]
pub enum PatternRequest {
    FunctionCall {
        #[serde(default)]
        caller: Option<String>,
        #[serde(default)]
        callee: Option<String>,
        #[serde(default)]
        mode: CallMode,
    },
    TypeUsage {
        type_name: String,
        #[serde(default = "default_usage")]
        usage_in: String,
    },
    CodeStructure {
        #[serde(default = "default_structure")]
        structure_type: String,
    },
    StructImplTrait {
        #[serde(default)]
        struct_name: Option<String>,
        #[serde(default)]
        trait_name: Option<String>,
    },
    FunctionCallsMethodOnTraitImpl {
        #[serde(default)]
        caller_name: Option<String>,
        #[serde(default)]
        trait_name: Option<String>,
    },
}

impl PatternRequest {
    /// Decode a request document. Unknown pattern types are rejected.
    pub fn from_value(document: &Value) -> Result<Self, KnowledgeError> {
        let mut document = document.clone();
        if let Value::Object(obj) = &mut document {
            if !obj.contains_key("pattern_type") {
                if let Some(tag) = obj.remove("type") {
                    obj.insert("pattern_type".to_string(), tag);
                }
            }
        }
        serde_json::from_value(document).map_err(|e| KnowledgeError::query(format!("invalid pattern: {}", e)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FunctionCall { .. } => "function_call",
            Self::TypeUsage { .. } => "type_usage",
            Self::CodeStructure { .. } => "code_structure",
            Self::StructImplTrait { .. } => "struct_impl_trait",
            Self::FunctionCallsMethodOnTraitImpl { .. } => "function_calls_method_on_trait_impl",
        }
    }
}

/// Runs pattern requests against a graph snapshot.
pub struct PatternMatcher<'g> {
    graph: &'g CodeGraph,
}

impl<'g> PatternMatcher<'g> {
    pub fn new(graph: &'g CodeGraph) -> Self {
        Self { graph }
    }

    pub fn run(&self, request: &PatternRequest) -> Result<Vec<Value>, KnowledgeError> {
        let results = match request {
            PatternRequest::FunctionCall { caller, callee, mode } => {
                self.function_calls(caller.as_deref(), callee.as_deref(), *mode)
            }
            PatternRequest::TypeUsage { type_name, usage_in } => {
                if usage_in != "function" {
                    return Err(KnowledgeError::query(format!("unsupported usage_in '{}'", usage_in)));
                }
                self.type_usage_in_functions(type_name)
            }
            PatternRequest::CodeStructure { structure_type } => {
                if structure_type != "nested_function" {
                    return Err(KnowledgeError::query(format!(
                        "unsupported structure_type '{}'",
                        structure_type
                    )));
                }
                self.nested_function_structures()
            }
            PatternRequest::StructImplTrait { struct_name, trait_name } => {
                self.struct_impl_trait(struct_name.as_deref(), trait_name.as_deref())
            }
            PatternRequest::FunctionCallsMethodOnTraitImpl { caller_name, trait_name } => {
                self.trait_impl_methods(caller_name.as_deref(), trait_name.as_deref())
            }
        };
        debug!(pattern = request.name(), matches = results.len(), "pattern matched");
        Ok(results)
    }

    pub fn run_value(&self, document: &Value) -> Result<Vec<Value>, KnowledgeError> {
        self.run(&PatternRequest::from_value(document)?)
    }

    // ===== CALL PATTERN =====

    fn function_calls(&self, caller: Option<&str>, callee: Option<&str>, mode: CallMode) -> Vec<Value> {
        let mut results = Vec::new();
        for edge in self.graph.call_edges() {
            let (Some(from), Some(to)) = (self.graph.function(&edge.from), self.graph.function(&edge.to)) else {
                continue;
            };
            if !contains_ci(&from.name, caller) || !contains_ci(&to.name, callee) {
                continue;
            }
            let caller_summary = json!({"id": from.id, "name": from.name, "module": from.module_name});
            let callee_summary = json!({"id": to.id, "name": to.name, "module": to.module_name});

            let mut row = Map::new();
            match mode {
                CallMode::Calls => {
                    row.insert("caller".into(), caller_summary);
                    row.insert("callee".into(), callee_summary);
                }
                CallMode::CalledBy => {
                    row.insert("callee".into(), callee_summary);
                    row.insert("caller".into(), caller_summary);
                }
            }
            results.push(Value::Object(row));
        }
        results
    }

    // ===== TYPE USAGE =====

    /// Signature or source text mentioning the type name. Textual only.
    fn type_usage_in_functions(&self, type_name: &str) -> Vec<Value> {
        self.graph
            .functions()
            .filter(|f| {
                contains_ci_opt(f.signature.as_deref(), type_name) || contains_ci_opt(f.raw_string.as_deref(), type_name)
            })
            .map(|f| {
                json!({
                    "function": {"id": f.id, "name": f.name, "module": f.module_name},
                    "type": type_name,
                })
            })
            .collect()
    }

    // ===== NESTING =====

    fn nested_function_structures(&self) -> Vec<Value> {
        self.graph
            .functions()
            .filter_map(|f| {
                let nested: Vec<Value> = self
                    .graph
                    .nested_under(&f.id)
                    .map(|n| json!({"id": n.id, "name": n.name}))
                    .collect();
                if nested.is_empty() {
                    return None;
                }
                Some(json!({
                    "parent_function": {"id": f.id, "name": f.name, "module": f.module_name},
                    "nested_functions": nested,
                }))
            })
            .collect()
    }

    // ===== TRAITS =====

    fn struct_impl_trait(&self, struct_name: Option<&str>, trait_name: Option<&str>) -> Vec<Value> {
        self.graph
            .impl_blocks()
            .filter(|b| struct_name.map_or(true, |s| b.struct_name == s))
            .filter(|b| trait_name.map_or(true, |t| b.trait_name.as_deref() == Some(t)))
            .map(|b| {
                json!({
                    "struct": {"name": b.struct_name},
                    "trait": {"name": b.trait_name},
                })
            })
            .collect()
    }

    /// function -> owning impl block -> implemented trait.
    fn trait_impl_methods(&self, caller_name: Option<&str>, trait_name: Option<&str>) -> Vec<Value> {
        let mut results = Vec::new();
        for function in self.graph.functions() {
            if caller_name.map_or(false, |name| function.name != name) {
                continue;
            }
            let Some(block) = function
                .impl_block_id
                .as_deref()
                .and_then(|id| self.graph.impl_block(id))
            else {
                continue;
            };
            let Some(trait_def) = block.trait_id.as_deref().and_then(|id| self.graph.trait_def(id)) else {
                continue;
            };
            if trait_name.map_or(false, |name| trait_def.name != name) {
                continue;
            }
            results.push(json!({
                "function": {"name": function.name},
                "struct": {"name": block.struct_name},
                "trait": {"name": trait_def.name},
            }));
        }
        results
    }
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    match needle {
        None | Some("") => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

fn contains_ci_opt(haystack: Option<&str>, needle: &str) -> bool {
    haystack.map_or(false, |h| contains_ci(h, Some(needle)))
}
