//! Raw facts emitted by external compiler front ends.
//!
//! Facts are loosely typed: producers for different ecosystems disagree on
//! field names, omit fields, and emit nulls. A module's fact lists are kept as
//! raw JSON values and decoded one element at a time, so a single malformed
//! element costs only that element.

mod loader;

pub use loader::FactBatch;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::KnowledgeError;

/// Decode one fact element, attributing failures to its module and kind.
pub fn decode<T: DeserializeOwned>(module: &str, entity: &str, value: &Value) -> Result<T, KnowledgeError> {
    T::deserialize(value).map_err(|err| KnowledgeError::ParseFact {
        module: module.to_string(),
        entity: entity.to_string(),
        message: err.to_string(),
    })
}

// =============================================================================
// MODULE FACTS
// =============================================================================

/// Everything one producer emitted for one module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleFacts {
    #[serde(alias = "module", alias = "name")]
    pub module_name: String,
    pub path: Option<String>,
    pub package_name: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub functions: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub types: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub classes: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub instances: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub imports: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub traits: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub impl_blocks: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub constants: Vec<Value>,
}

impl ModuleFacts {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            ..Default::default()
        }
    }

    /// Total number of fact elements in this module.
    pub fn fact_count(&self) -> usize {
        self.functions.len()
            + self.types.len()
            + self.classes.len()
            + self.instances.len()
            + self.imports.len()
            + self.traits.len()
            + self.impl_blocks.len()
            + self.constants.len()
    }
}

// =============================================================================
// FUNCTION FACTS
// =============================================================================

/// A function, or a nested function inside `where_functions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionFact {
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub function_signature: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub src_loc: Option<String>,
    #[serde(default)]
    pub raw_string: Option<String>,
    #[serde(default)]
    pub type_enum: Option<String>,
    #[serde(default, rename = "_type")]
    pub kind_tag: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_start: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_end: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub instances_used: Vec<Value>,
    #[serde(default)]
    pub function_input: Option<Value>,
    #[serde(default)]
    pub function_output: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub functions_called: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub where_functions: BTreeMap<String, Value>,

    // Systems-language extras
    #[serde(default)]
    pub fully_qualified_path: Option<String>,
    #[serde(default)]
    pub is_method: Option<bool>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub doc_comments: Option<String>,
    #[serde(default)]
    pub crate_name: Option<String>,
    #[serde(default)]
    pub module_path: Option<String>,
}

impl FunctionFact {
    /// Declared name; `function_name` wins over `name`.
    pub fn name(&self) -> Option<&str> {
        self.function_name
            .as_deref()
            .or(self.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    pub fn signature(&self) -> Option<&str> {
        self.function_signature
            .as_deref()
            .or(self.signature.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn type_enum(&self) -> &str {
        self.type_enum
            .as_deref()
            .or(self.kind_tag.as_deref())
            .unwrap_or_default()
    }

    /// Instance signatures used, rendered to strings, first occurrence wins.
    pub fn instance_signatures(&self) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        self.instances_used
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect()
    }
}

/// Split a `where_functions` key into the local name and an embedded source
/// location (`name**src_loc`).
pub fn split_nested_key(key: &str) -> (&str, Option<&str>) {
    match key.split_once("**") {
        Some((name, loc)) if !loc.is_empty() => (name, Some(loc)),
        Some((name, _)) => (name, None),
        None => (key, None),
    }
}

/// A call site inside a function body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallSiteFact {
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub function_name: Option<String>,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub src_loc: Option<String>,
    #[serde(default)]
    pub type_enum: Option<String>,
    #[serde(default, rename = "_type")]
    pub kind_tag: Option<String>,
    #[serde(default)]
    pub fully_qualified_path: Option<String>,
    #[serde(default)]
    pub is_method: Option<bool>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    pub line_number: Option<u32>,
    #[serde(default, deserialize_with = "lenient_opt_u32")]
    pub column_number: Option<u32>,
    #[serde(default)]
    pub origin_crate: Option<String>,
    #[serde(default)]
    pub origin_module: Option<String>,
    #[serde(default)]
    pub call_type: Option<String>,
}

impl CallSiteFact {
    pub fn callee_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.function_name.as_deref())
            .filter(|n| !n.is_empty())
    }

    pub fn kind(&self) -> &str {
        self.type_enum
            .as_deref()
            .or(self.kind_tag.as_deref())
            .unwrap_or_default()
    }

    /// Overloaded literals are not calls to a named function.
    pub fn is_literal(&self) -> bool {
        self.kind() == "OverLit"
    }
}

// =============================================================================
// TYPE FACTS
// =============================================================================

/// A type definition with its constructors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeFact {
    pub type_name: String,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub raw_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub src_loc: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_start: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_end: u32,
    #[serde(default, rename = "typeKind", alias = "type_kind")]
    pub type_kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data_constructors_list: Vec<ConstructorFact>,
}

/// One data constructor and its fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstructorFact {
    #[serde(default, rename = "dataConNames", alias = "name")]
    pub data_con_names: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Map<String, Value>,
}

impl ConstructorFact {
    /// Constructor name; a list of names yields its first entry.
    pub fn name(&self) -> Option<String> {
        match self.data_con_names.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => items.iter().find_map(|v| v.as_str()).map(str::to_string),
            _ => None,
        }
    }
}

/// Split a field payload into its raw source and structured type fact.
///
/// A payload without a `structure` key is the structure itself.
pub fn field_parts(value: &Value) -> (String, &Value) {
    let raw_code = value
        .get("raw_code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let structure = value.get("structure").unwrap_or(value);
    (raw_code, structure)
}

/// A typeclass declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassFact {
    pub class_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub class_definition: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub src_location: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_start: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_end: u32,
}

/// A typeclass instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceFact {
    #[serde(rename = "instanceDefinition", alias = "instance_definition")]
    pub instance_definition: String,
    #[serde(default, rename = "instanceType", alias = "instance_type")]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub src_loc: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_start: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_end: u32,
}

// =============================================================================
// STRUCTURE FACTS
// =============================================================================

/// An import declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportFact {
    /// Imported module
    pub module_name: String,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(default)]
    pub src_loc: Option<String>,
    #[serde(default)]
    pub is_boot_source: Option<bool>,
    #[serde(default)]
    pub is_safe: Option<bool>,
    #[serde(default)]
    pub is_implicit: Option<bool>,
    #[serde(default)]
    pub as_module_name: Option<String>,
    #[serde(default)]
    pub qualified_style: Option<String>,
    #[serde(default)]
    pub is_hiding: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hiding_specs: Vec<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_start: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_end: u32,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
}

/// A constant or static item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantFact {
    pub name: String,
    #[serde(default)]
    pub fully_qualified_path: Option<String>,
    #[serde(default)]
    pub src_code: Option<String>,
    #[serde(default)]
    pub const_type: Option<String>,
    #[serde(default)]
    pub is_static: Option<bool>,
    #[serde(default)]
    pub src_location: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_start: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_end: u32,
}

// =============================================================================
// CONTRACT FACTS
// =============================================================================

/// A trait with its method signatures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraitFact {
    pub name: String,
    #[serde(default)]
    pub fully_qualified_path: Option<String>,
    #[serde(default)]
    pub src_location: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_start: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_end: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: Vec<Value>,
}

/// A method signature declared by a trait.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraitMethodFact {
    pub name: String,
    #[serde(default)]
    pub fully_qualified_path: Option<String>,
    #[serde(default)]
    pub src_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_start: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_end: u32,
    #[serde(default)]
    pub is_async: Option<bool>,
    #[serde(default)]
    pub is_unsafe: Option<bool>,
}

/// An impl block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImplBlockFact {
    pub struct_name: String,
    #[serde(default)]
    pub struct_fqp: Option<String>,
    #[serde(default)]
    pub trait_name: Option<String>,
    #[serde(default)]
    pub trait_fqp: Option<String>,
    #[serde(default)]
    pub src_location: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_start: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub line_number_end: u32,
    #[serde(default)]
    pub crate_name: Option<String>,
    #[serde(default)]
    pub module_path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: Vec<String>,
}

// =============================================================================
// LENIENT DECODING
// =============================================================================

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(lenient_opt_u32(deserializer)?.unwrap_or(0))
}

/// Accept numbers, numeric strings and null.
fn lenient_opt_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_fact_name_preference() {
        let fact: FunctionFact = decode("M", "function", &json!({
            "function_name": "f",
            "name": "g",
            "_type": "FunBind",
            "line_number_start": "12",
            "line_number_end": null
        }))
        .unwrap();
        assert_eq!(fact.name(), Some("f"));
        assert_eq!(fact.type_enum(), "FunBind");
        assert_eq!(fact.line_number_start, 12);
        assert_eq!(fact.line_number_end, 0);
    }

    #[test]
    fn test_malformed_fact_is_parse_error() {
        let err = decode::<TypeFact>("M", "type", &json!({"raw_code": "data T"})).unwrap_err();
        match err {
            KnowledgeError::ParseFact { module, entity, .. } => {
                assert_eq!(module, "M");
                assert_eq!(entity, "type");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_instance_signatures_are_deduplicated() {
        let fact: FunctionFact = decode("M", "function", &json!({
            "name": "f",
            "instances_used": ["Show Int", "Show Int", {"k": 1}, ""]
        }))
        .unwrap();
        assert_eq!(fact.instance_signatures(), vec!["Show Int".to_string(), "{\"k\":1}".to_string()]);
    }

    #[test]
    fn test_split_nested_key() {
        assert_eq!(split_nested_key("go**src/A.hs:10:3"), ("go", Some("src/A.hs:10:3")));
        assert_eq!(split_nested_key("go**"), ("go", None));
        assert_eq!(split_nested_key("go"), ("go", None));
    }

    #[test]
    fn test_constructor_name_forms() {
        let single: ConstructorFact = decode("M", "constructor", &json!({"dataConNames": "Just"})).unwrap();
        assert_eq!(single.name(), Some("Just".to_string()));
        let listed: ConstructorFact = decode("M", "constructor", &json!({"dataConNames": ["Left", "Right"]})).unwrap();
        assert_eq!(listed.name(), Some("Left".to_string()));
        let missing: ConstructorFact = decode("M", "constructor", &json!({"fields": null})).unwrap();
        assert_eq!(missing.name(), None);
    }

    #[test]
    fn test_field_parts() {
        let wrapped = json!({"raw_code": "Int", "structure": {"tag": "StarType"}});
        let (raw, structure) = field_parts(&wrapped);
        assert_eq!(raw, "Int");
        assert_eq!(structure, &json!({"tag": "StarType"}));

        let bare = json!({"tag": "StarType"});
        let (raw, structure) = field_parts(&bare);
        assert!(raw.is_empty());
        assert_eq!(structure, &bare);
    }

    #[test]
    fn test_literal_call_detection() {
        let call: CallSiteFact = decode("M", "call", &json!({"name": "fromInteger", "_type": "OverLit"})).unwrap();
        assert!(call.is_literal());
        assert_eq!(call.callee_name(), Some("fromInteger"));
    }
}
