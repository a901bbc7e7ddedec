//! Recursive type expressions.
//!
//! A [`TypeExpr`] is built from a tagged fact (`{"tag": ..., "contents": ...}`)
//! emitted by an external compiler front end. Producers are inconsistent about
//! shapes: a two-part variant may arrive as a flat `[a, b]` list or as a named
//! map, a tag may or may not carry the `Type` suffix, and the whole fact may be
//! a JSON string. Construction never fails: anything it cannot read becomes
//! [`TypeExpr::Unknown`] carrying the raw payload.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::knowledge::error::KnowledgeError;

// =============================================================================
// TYPE REFERENCE
// =============================================================================

/// A by-name reference to a type defined in some module/package.
///
/// References are never inlined, which keeps expression trees acyclic even for
/// recursive nominal types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TypeRef {
    pub module_name: String,
    pub type_name: String,
    pub package_name: String,
}

impl TypeRef {
    pub fn new(module_name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            type_name: type_name.into(),
            package_name: String::new(),
        }
    }

    pub fn in_package(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = package_name.into();
        self
    }

    /// Type identity in the graph (`module:name`).
    pub fn id(&self) -> String {
        format!("{}:{}", self.module_name, self.type_name)
    }

    fn from_fact(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            module_name: str_key(obj, &["moduleName'", "moduleName", "module_name"]),
            type_name: str_key(obj, &["typeName'", "typeName", "type_name"]),
            package_name: str_key(obj, &["packageName", "package_name"]),
        })
    }

    fn to_fact(&self) -> Value {
        json!({
            "moduleName'": self.module_name,
            "typeName'": self.type_name,
            "packageName": self.package_name,
        })
    }
}

static NULL: Value = Value::Null;

fn str_key(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// A named field of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordField {
    pub name: String,
    pub ty: TypeExpr,
}

// =============================================================================
// TYPE EXPRESSION
// =============================================================================

/// A declared type from either source ecosystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", content = "value", rename_all = "snake_case")]
pub enum TypeExpr {
    /// Reference to a named type.
    Atomic(TypeRef),
    /// `[a]`
    List(Box<TypeExpr>),
    /// `(a, b)`
    Tuple(Vec<TypeExpr>),
    /// Type application `f a b`.
    App {
        func: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    /// Function arrow `a -> b`.
    Func {
        arg: Box<TypeExpr>,
        result: Box<TypeExpr>,
    },
    /// `forall a b. body`
    Forall {
        binders: Vec<TypeRef>,
        body: Box<TypeExpr>,
    },
    /// Context-constrained type `(C a) => body`.
    Qual {
        context: Vec<TypeExpr>,
        body: Box<TypeExpr>,
    },
    /// Kind annotation `(t :: k)`.
    KindSig {
        ty: Box<TypeExpr>,
        kind: Box<TypeExpr>,
    },
    /// Strictness wrapper `!t`.
    Bang(Box<TypeExpr>),
    /// Record with named fields.
    Record(Vec<RecordField>),
    /// Type-level list literal.
    PromotedList(Vec<TypeExpr>),
    /// Type-level tuple literal.
    PromotedTuple(Vec<TypeExpr>),
    /// Type-level literal (symbol or number).
    Literal(String),
    /// `_`
    Wildcard,
    /// The kind `*`.
    Star,
    /// Implicit parameter `?name :: t`.
    IParam {
        name: String,
        ty: Box<TypeExpr>,
    },
    /// A type carrying a doc comment.
    Doc {
        ty: Box<TypeExpr>,
        doc: String,
    },
    /// Anything that could not be read. Holds the raw payload.
    Unknown(String),
}

/// Discriminant of [`TypeExpr`], named after the fact tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeVariant {
    Atomic,
    List,
    Tuple,
    App,
    Func,
    Forall,
    Qual,
    KindSig,
    Bang,
    Record,
    PromotedList,
    PromotedTuple,
    Literal,
    Wildcard,
    Star,
    IParam,
    Doc,
    Unknown,
}

impl TypeVariant {
    /// Resolve a fact tag. The `Type` suffix is optional.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let name = tag.strip_suffix("Type").unwrap_or(tag);
        let variant = match name {
            "Atomic" => Self::Atomic,
            "List" => Self::List,
            "Tuple" => Self::Tuple,
            "App" => Self::App,
            "Func" => Self::Func,
            "Forall" => Self::Forall,
            "Qual" => Self::Qual,
            "KindSig" => Self::KindSig,
            "Bang" => Self::Bang,
            "Record" => Self::Record,
            "PromotedList" => Self::PromotedList,
            "PromotedTuple" => Self::PromotedTuple,
            "Literal" => Self::Literal,
            "WildCard" | "Wildcard" => Self::Wildcard,
            "Star" => Self::Star,
            "IParam" => Self::IParam,
            "Doc" => Self::Doc,
            "Unknown" => Self::Unknown,
            _ => return None,
        };
        Some(variant)
    }

    /// The canonical fact tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Atomic => "AtomicType",
            Self::List => "ListType",
            Self::Tuple => "TupleType",
            Self::App => "AppType",
            Self::Func => "FuncType",
            Self::Forall => "ForallType",
            Self::Qual => "QualType",
            Self::KindSig => "KindSigType",
            Self::Bang => "BangType",
            Self::Record => "RecordType",
            Self::PromotedList => "PromotedListType",
            Self::PromotedTuple => "PromotedTupleType",
            Self::Literal => "LiteralType",
            Self::Wildcard => "WildCardType",
            Self::Star => "StarType",
            Self::IParam => "IParamType",
            Self::Doc => "DocType",
            Self::Unknown => "UnknownType",
        }
    }
}

impl TypeExpr {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Build a type expression from a fact. Never fails.
    pub fn from_fact(data: &Value) -> Self {
        match Self::try_from_fact(data) {
            Ok(expr) => expr,
            Err(err) => {
                debug!(error = %err, "type expression fell back to unknown");
                Self::Unknown(raw_payload(data))
            }
        }
    }

    /// Strict variant of [`from_fact`](Self::from_fact) that reports why a
    /// fact could not be read. Sub-expressions still fall back individually.
    pub fn try_from_fact(data: &Value) -> Result<Self, KnowledgeError> {
        let obj = match data {
            Value::Object(obj) => obj,
            Value::String(s) => {
                let parsed: Value = serde_json::from_str(s)?;
                if parsed.is_string() {
                    return Err(KnowledgeError::UnknownVariant(s.clone()));
                }
                return Self::try_from_fact(&parsed);
            }
            other => return Err(KnowledgeError::UnknownVariant(other.to_string())),
        };

        let (tag, contents) = match (obj.get("tag").and_then(Value::as_str), obj.get("contents")) {
            (Some(tag), Some(contents)) => (tag, contents),
            (Some(tag), None) => (tag, &NULL),
            _ => return Err(KnowledgeError::UnknownVariant(data.to_string())),
        };

        let variant = TypeVariant::from_tag(tag)
            .ok_or_else(|| KnowledgeError::UnknownVariant(tag.to_string()))?;

        Self::from_contents(variant, contents).ok_or_else(|| KnowledgeError::ParseFact {
            module: String::new(),
            entity: variant.tag().to_string(),
            message: format!("unexpected contents shape: {}", contents),
        })
    }

    fn from_contents(variant: TypeVariant, contents: &Value) -> Option<Self> {
        let expr = match variant {
            TypeVariant::Atomic => Self::Atomic(TypeRef::from_fact(contents)?),
            TypeVariant::List => Self::List(boxed(contents)),
            TypeVariant::Bang => Self::Bang(boxed(contents)),
            TypeVariant::Tuple => Self::Tuple(elements(contents)),
            TypeVariant::PromotedList => Self::PromotedList(elements(contents)),
            TypeVariant::PromotedTuple => Self::PromotedTuple(elements(contents)),
            TypeVariant::App => app_from(contents),
            TypeVariant::Func => {
                let (arg, result) = pair(contents, "arg", "result")?;
                Self::Func {
                    arg: boxed(arg),
                    result: boxed(result),
                }
            }
            TypeVariant::Forall => {
                let (binders, body) = pair(contents, "binders", "body")?;
                Self::Forall {
                    binders: binders
                        .as_array()
                        .map(|items| items.iter().filter_map(TypeRef::from_fact).collect())
                        .unwrap_or_default(),
                    body: boxed(body),
                }
            }
            TypeVariant::Qual => {
                let (context, body) = pair(contents, "context", "body")?;
                Self::Qual {
                    context: context
                        .as_array()
                        .map(|items| items.iter().map(Self::from_fact).collect())
                        .unwrap_or_default(),
                    body: boxed(body),
                }
            }
            TypeVariant::KindSig => {
                let (ty, kind) = pair(contents, "type", "kind")?;
                Self::KindSig {
                    ty: boxed(ty),
                    kind: boxed(kind),
                }
            }
            TypeVariant::Record => {
                let fields = contents.as_object()?;
                Self::Record(
                    fields
                        .iter()
                        .map(|(name, ty)| RecordField {
                            name: name.clone(),
                            ty: Self::from_fact(ty),
                        })
                        .collect(),
                )
            }
            TypeVariant::Literal => Self::Literal(raw_payload(contents)),
            TypeVariant::Wildcard => Self::Wildcard,
            TypeVariant::Star => Self::Star,
            TypeVariant::IParam => {
                let (name, ty) = pair(contents, "name", "type")?;
                Self::IParam {
                    name: raw_payload(name),
                    ty: boxed(ty),
                }
            }
            TypeVariant::Doc => {
                let (ty, doc) = pair(contents, "type", "doc")?;
                Self::Doc {
                    ty: boxed(ty),
                    doc: raw_payload(doc),
                }
            }
            TypeVariant::Unknown => Self::Unknown(raw_payload(contents)),
        };
        Some(expr)
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn variant(&self) -> TypeVariant {
        match self {
            Self::Atomic(_) => TypeVariant::Atomic,
            Self::List(_) => TypeVariant::List,
            Self::Tuple(_) => TypeVariant::Tuple,
            Self::App { .. } => TypeVariant::App,
            Self::Func { .. } => TypeVariant::Func,
            Self::Forall { .. } => TypeVariant::Forall,
            Self::Qual { .. } => TypeVariant::Qual,
            Self::KindSig { .. } => TypeVariant::KindSig,
            Self::Bang(_) => TypeVariant::Bang,
            Self::Record(_) => TypeVariant::Record,
            Self::PromotedList(_) => TypeVariant::PromotedList,
            Self::PromotedTuple(_) => TypeVariant::PromotedTuple,
            Self::Literal(_) => TypeVariant::Literal,
            Self::Wildcard => TypeVariant::Wildcard,
            Self::Star => TypeVariant::Star,
            Self::IParam { .. } => TypeVariant::IParam,
            Self::Doc { .. } => TypeVariant::Doc,
            Self::Unknown(_) => TypeVariant::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// Direct sub-expressions, in declaration order.
    pub fn children(&self) -> Vec<&TypeExpr> {
        match self {
            Self::List(inner) | Self::Bang(inner) => vec![inner.as_ref()],
            Self::Doc { ty, .. } | Self::IParam { ty, .. } => vec![ty.as_ref()],
            Self::KindSig { ty, kind } => vec![ty.as_ref(), kind.as_ref()],
            Self::Tuple(items) | Self::PromotedList(items) | Self::PromotedTuple(items) => {
                items.iter().collect()
            }
            Self::App { func, args } => {
                let mut out = vec![func.as_ref()];
                out.extend(args.iter());
                out
            }
            Self::Func { arg, result } => vec![arg.as_ref(), result.as_ref()],
            Self::Forall { body, .. } => vec![body.as_ref()],
            Self::Qual { context, body } => {
                let mut out: Vec<&TypeExpr> = context.iter().collect();
                out.push(body.as_ref());
                out
            }
            Self::Record(fields) => fields.iter().map(|f| &f.ty).collect(),
            Self::Atomic(_)
            | Self::Literal(_)
            | Self::Wildcard
            | Self::Star
            | Self::Unknown(_) => Vec::new(),
        }
    }

    /// Whether two trees have the same variants in the same arrangement,
    /// ignoring names and literal payloads.
    pub fn same_shape(&self, other: &TypeExpr) -> bool {
        if self.variant() != other.variant() {
            return false;
        }
        let (left, right) = (self.children(), other.children());
        left.len() == right.len() && left.iter().zip(right.iter()).all(|(a, b)| a.same_shape(b))
    }

    /// Maximum nesting depth (a leaf has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    // -------------------------------------------------------------------------
    // Dependencies
    // -------------------------------------------------------------------------

    /// Every type identity (`module:name`) this expression references.
    ///
    /// Only names are collected; a reference's definition is never followed.
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        self.collect_dependencies(&mut deps);
        deps
    }

    fn collect_dependencies(&self, deps: &mut BTreeSet<String>) {
        match self {
            Self::Atomic(r) => {
                if !r.type_name.is_empty() {
                    deps.insert(r.id());
                }
            }
            Self::List(inner) | Self::Bang(inner) => inner.collect_dependencies(deps),
            Self::Doc { ty, .. } | Self::IParam { ty, .. } => ty.collect_dependencies(deps),
            Self::KindSig { ty, kind } => {
                ty.collect_dependencies(deps);
                kind.collect_dependencies(deps);
            }
            Self::App { func, args } => {
                func.collect_dependencies(deps);
                for arg in args {
                    arg.collect_dependencies(deps);
                }
            }
            Self::Func { arg, result } => {
                arg.collect_dependencies(deps);
                result.collect_dependencies(deps);
            }
            Self::Forall { body, .. } => body.collect_dependencies(deps),
            Self::Qual { context, body } => {
                for c in context {
                    c.collect_dependencies(deps);
                }
                body.collect_dependencies(deps);
            }
            Self::Record(fields) => {
                for field in fields {
                    field.ty.collect_dependencies(deps);
                }
            }
            Self::Tuple(items) | Self::PromotedList(items) | Self::PromotedTuple(items) => {
                for item in items {
                    item.collect_dependencies(deps);
                }
            }
            Self::Literal(_) | Self::Wildcard | Self::Star | Self::Unknown(_) => {}
        }
    }

    // -------------------------------------------------------------------------
    // Fact encoding
    // -------------------------------------------------------------------------

    /// Encode back into the `{tag, contents}` fact shape.
    pub fn to_fact(&self) -> Value {
        let contents = match self {
            Self::Atomic(r) => r.to_fact(),
            Self::List(inner) | Self::Bang(inner) => inner.to_fact(),
            Self::Tuple(items) | Self::PromotedList(items) | Self::PromotedTuple(items) => {
                Value::Array(items.iter().map(Self::to_fact).collect())
            }
            Self::App { func, args } => json!({
                "func": func.to_fact(),
                "args": args.iter().map(Self::to_fact).collect::<Vec<_>>(),
            }),
            Self::Func { arg, result } => json!([arg.to_fact(), result.to_fact()]),
            Self::Forall { binders, body } => json!({
                "binders": binders.iter().map(TypeRef::to_fact).collect::<Vec<_>>(),
                "body": body.to_fact(),
            }),
            Self::Qual { context, body } => json!({
                "context": context.iter().map(Self::to_fact).collect::<Vec<_>>(),
                "body": body.to_fact(),
            }),
            Self::KindSig { ty, kind } => json!({ "type": ty.to_fact(), "kind": kind.to_fact() }),
            Self::Record(fields) => Value::Object(
                fields
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.to_fact()))
                    .collect(),
            ),
            Self::Literal(lit) => Value::String(lit.clone()),
            Self::Wildcard | Self::Star => Value::Null,
            Self::IParam { name, ty } => json!({ "name": name, "type": ty.to_fact() }),
            Self::Doc { ty, doc } => json!({ "type": ty.to_fact(), "doc": doc }),
            Self::Unknown(raw) => Value::String(raw.clone()),
        };
        json!({ "tag": self.variant().tag(), "contents": contents })
    }
}

impl Default for TypeExpr {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

// =============================================================================
// RENDERING
// =============================================================================

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atomic(r) => write!(f, "{}", r.type_name),
            Self::List(inner) => write!(f, "[{}]", inner),
            Self::Tuple(items) => write!(f, "({})", join(items, ", ")),
            Self::App { func, args } if args.is_empty() => write!(f, "{}", func),
            Self::App { func, args } => write!(f, "({} {})", func, join(args, " ")),
            Self::Func { arg, result } => write!(f, "({} -> {})", arg, result),
            Self::Forall { binders, body } => {
                let names: Vec<&str> = binders.iter().map(|b| b.type_name.as_str()).collect();
                write!(f, "forall {}. {}", names.join(" "), body)
            }
            Self::Qual { context, body } => write!(f, "({}) => {}", join(context, ", "), body),
            Self::KindSig { ty, kind } => write!(f, "({} :: {})", ty, kind),
            Self::Bang(inner) => write!(f, "!{}", inner),
            Self::Record(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|field| format!("{} :: {}", field.name, field.ty))
                    .collect();
                write!(f, "{{ {} }}", parts.join(", "))
            }
            Self::PromotedList(items) => write!(f, "'[{}]", join(items, ", ")),
            Self::PromotedTuple(items) => write!(f, "'({})", join(items, ", ")),
            Self::Literal(lit) => write!(f, "{}", lit),
            Self::Wildcard => write!(f, "_"),
            Self::Star => write!(f, "*"),
            Self::IParam { name, ty } => write!(f, "?{} :: {}", name, ty),
            Self::Doc { ty, .. } => write!(f, "{}", ty),
            Self::Unknown(raw) if raw.is_empty() => write!(f, "unknown"),
            Self::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

fn join(items: &[TypeExpr], sep: &str) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

// =============================================================================
// SHAPE HELPERS
// =============================================================================

fn boxed(value: &Value) -> Box<TypeExpr> {
    Box::new(TypeExpr::from_fact(value))
}

/// Elements of a list-shaped variant; a lone item becomes a one-element list.
fn elements(contents: &Value) -> Vec<TypeExpr> {
    match contents {
        Value::Array(items) => items.iter().map(TypeExpr::from_fact).collect(),
        single => vec![TypeExpr::from_fact(single)],
    }
}

/// Destructure a two-part variant given as `[a, b]` or `{first: a, second: b}`.
fn pair<'a>(contents: &'a Value, first: &str, second: &str) -> Option<(&'a Value, &'a Value)> {
    match contents {
        Value::Array(items) if items.len() >= 2 => Some((&items[0], &items[1])),
        Value::Object(obj) => Some((
            obj.get(first).unwrap_or(&NULL),
            obj.get(second).unwrap_or(&NULL),
        )),
        _ => None,
    }
}

fn app_from(contents: &Value) -> TypeExpr {
    match contents {
        Value::Array(items) if !items.is_empty() => {
            let args = match items.get(1) {
                Some(Value::Array(args)) => args.iter().map(|a| TypeExpr::from_fact(unwrap_single(a))).collect(),
                Some(single) => vec![TypeExpr::from_fact(single)],
                None => Vec::new(),
            };
            TypeExpr::App {
                func: boxed(&items[0]),
                args,
            }
        }
        Value::Object(obj) if obj.contains_key("func") || obj.contains_key("args") => {
            TypeExpr::App {
                func: boxed(obj.get("func").unwrap_or(&NULL)),
                args: obj
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|args| args.iter().map(TypeExpr::from_fact).collect())
                    .unwrap_or_default(),
            }
        }
        other => TypeExpr::App {
            func: boxed(other),
            args: Vec::new(),
        },
    }
}

/// A one-element list wrapping a map is the map itself.
fn unwrap_single(arg: &Value) -> &Value {
    match arg {
        Value::Array(items) if items.len() == 1 && items[0].is_object() => &items[0],
        other => other,
    }
}

fn raw_payload(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atomic(module: &str, name: &str) -> Value {
        json!({
            "tag": "AtomicType",
            "contents": {"moduleName'": module, "typeName'": name, "packageName": "main"}
        })
    }

    #[test]
    fn test_atomic_reference() {
        let expr = TypeExpr::from_fact(&atomic("Data.Map", "Map"));
        assert_eq!(expr.variant(), TypeVariant::Atomic);
        assert_eq!(expr.to_string(), "Map");
        assert_eq!(
            expr.dependencies().into_iter().collect::<Vec<_>>(),
            vec!["Data.Map:Map".to_string()]
        );
    }

    #[test]
    fn test_tag_without_suffix() {
        let fact = json!({"tag": "List", "contents": atomic("M", "Int")});
        let expr = TypeExpr::from_fact(&fact);
        assert_eq!(expr.variant(), TypeVariant::List);
        assert_eq!(expr.to_string(), "[Int]");
    }

    #[test]
    fn test_func_accepts_list_and_map_shapes() {
        let as_list = json!({"tag": "FuncType", "contents": [atomic("M", "A"), atomic("M", "B")]});
        let as_map = json!({"tag": "FuncType", "contents": {"arg": atomic("M", "A"), "result": atomic("M", "B")}});
        let a = TypeExpr::from_fact(&as_list);
        let b = TypeExpr::from_fact(&as_map);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "(A -> B)");
    }

    #[test]
    fn test_app_unwraps_single_element_args() {
        let fact = json!({
            "tag": "AppType",
            "contents": [atomic("M", "Maybe"), [[atomic("M", "Int")]]]
        });
        let expr = TypeExpr::from_fact(&fact);
        assert_eq!(expr.to_string(), "(Maybe Int)");
        assert!(expr.dependencies().contains("M:Int"));
        assert!(expr.dependencies().contains("M:Maybe"));
    }

    #[test]
    fn test_app_with_single_argument() {
        let fact = json!({"tag": "AppType", "contents": [atomic("M", "IO"), atomic("M", "Unit")]});
        assert_eq!(TypeExpr::from_fact(&fact).to_string(), "(IO Unit)");
    }

    #[test]
    fn test_unknown_tag_falls_back() {
        let fact = json!({"tag": "MysteryType", "contents": 3});
        let expr = TypeExpr::from_fact(&fact);
        assert!(expr.is_unknown());
        assert!(expr.to_string().contains("MysteryType"));
        assert!(expr.dependencies().is_empty());
    }

    #[test]
    fn test_bad_shape_falls_back() {
        let fact = json!({"tag": "FuncType", "contents": 42});
        assert!(TypeExpr::from_fact(&fact).is_unknown());
        let err = TypeExpr::try_from_fact(&fact).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_non_object_input_falls_back() {
        assert!(TypeExpr::from_fact(&json!(17)).is_unknown());
        assert!(TypeExpr::from_fact(&json!("not json at all")).is_unknown());
    }

    #[test]
    fn test_string_payload_is_parsed() {
        let encoded = atomic("M", "T").to_string();
        let expr = TypeExpr::from_fact(&Value::String(encoded));
        assert_eq!(expr.to_string(), "T");
    }

    #[test]
    fn test_forall_and_qual_rendering() {
        let forall = json!({
            "tag": "ForallType",
            "contents": [[{"moduleName'": "", "typeName'": "a", "packageName": ""}], atomic("M", "T")]
        });
        assert_eq!(TypeExpr::from_fact(&forall).to_string(), "forall a. T");

        let qual = json!({
            "tag": "QualType",
            "contents": {"context": [atomic("M", "Show")], "body": atomic("M", "T")}
        });
        let expr = TypeExpr::from_fact(&qual);
        assert_eq!(expr.to_string(), "(Show) => T");
        assert_eq!(expr.dependencies().len(), 2);
    }

    #[test]
    fn test_forall_binders_are_not_dependencies() {
        let forall = json!({
            "tag": "ForallType",
            "contents": {"binders": [{"moduleName'": "M", "typeName'": "a"}], "body": atomic("M", "T")}
        });
        let deps = TypeExpr::from_fact(&forall).dependencies();
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec!["M:T".to_string()]);
    }

    #[test]
    fn test_record_and_leaf_variants() {
        let record = json!({
            "tag": "RecordType",
            "contents": {"name": atomic("M", "Text"), "age": atomic("M", "Int")}
        });
        let expr = TypeExpr::from_fact(&record);
        assert_eq!(expr.dependencies().len(), 2);

        let record_list = json!({"tag": "RecordType", "contents": [1, 2]});
        assert!(TypeExpr::from_fact(&record_list).is_unknown());

        for tag in ["WildCardType", "StarType"] {
            let expr = TypeExpr::from_fact(&json!({"tag": tag, "contents": []}));
            assert!(expr.dependencies().is_empty());
        }
        let lit = TypeExpr::from_fact(&json!({"tag": "LiteralType", "contents": 5}));
        assert_eq!(lit, TypeExpr::Literal("5".to_string()));
    }

    #[test]
    fn test_tuple_single_item_is_wrapped() {
        let fact = json!({"tag": "TupleType", "contents": atomic("M", "A")});
        match TypeExpr::from_fact(&fact) {
            TypeExpr::Tuple(items) => assert_eq!(items.len(), 1),
            other => panic!("expected tuple, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_dependencies_through_every_wrapper() {
        let fact = json!({
            "tag": "BangType",
            "contents": {
                "tag": "DocType",
                "contents": [{
                    "tag": "KindSigType",
                    "contents": [{
                        "tag": "IParamType",
                        "contents": ["x", {"tag": "PromotedTupleType", "contents": [atomic("A", "X"), atomic("B", "Y")]}]
                    }, {"tag": "StarType"}]
                }, "docs"]
            }
        });
        let deps = TypeExpr::from_fact(&fact).dependencies();
        assert!(deps.contains("A:X"));
        assert!(deps.contains("B:Y"));
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn test_fact_round_trip_keeps_shape() {
        let fact = json!({
            "tag": "FuncType",
            "contents": [
                {"tag": "ListType", "contents": atomic("M", "A")},
                {"tag": "AppType", "contents": {"func": atomic("M", "Either"), "args": [atomic("M", "E"), atomic("M", "B")]}}
            ]
        });
        let expr = TypeExpr::from_fact(&fact);
        let reparsed = TypeExpr::from_fact(&expr.to_fact());
        assert_eq!(expr, reparsed);
        assert!(expr.same_shape(&reparsed));
        assert_eq!(expr.depth(), 3);
    }
}
