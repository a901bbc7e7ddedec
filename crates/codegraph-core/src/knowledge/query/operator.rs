//! Condition operators and their evaluation over JSON records.
//!
//! Comparisons follow SQL null semantics: a null field value fails every
//! operator except `is_null`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::knowledge::error::KnowledgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Like,
    ILike,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Between,
    IsNull,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Le => "le",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Between => "between",
            Self::IsNull => "is_null",
        }
    }
}

impl FromStr for Operator {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "=" | "==" => Self::Eq,
            "ne" | "!=" => Self::Ne,
            "gt" | ">" => Self::Gt,
            "lt" | "<" => Self::Lt,
            "ge" | ">=" => Self::Ge,
            "le" | "<=" => Self::Le,
            "like" => Self::Like,
            "ilike" => Self::ILike,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "contains" => Self::Contains,
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "between" => Self::Between,
            "is_null" => Self::IsNull,
            _ => return Err(KnowledgeError::query(format!("unknown operator '{}'", s))),
        };
        Ok(op)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated condition ready to run against records.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    operand: Operand,
}

#[derive(Debug, Clone)]
enum Operand {
    Value(Value),
    List(Vec<Value>),
    Range(Value, Value),
    Pattern(Regex),
    Null(bool),
}

impl Predicate {
    /// Check the operand shape for `operator` and precompile patterns.
    pub fn compile(field: &str, operator: Operator, value: &Value) -> Result<Self, KnowledgeError> {
        let operand = match operator {
            Operator::In | Operator::NotIn => match value {
                Value::Array(items) => Operand::List(items.clone()),
                _ => {
                    return Err(KnowledgeError::query(format!(
                        "operator '{}' on '{}' needs a list value",
                        operator, field
                    )))
                }
            },
            Operator::Between => match value.as_array().map(Vec::as_slice) {
                Some([lo, hi]) => Operand::Range(lo.clone(), hi.clone()),
                _ => {
                    return Err(KnowledgeError::query(format!(
                        "operator 'between' on '{}' needs [low, high]",
                        field
                    )))
                }
            },
            Operator::Like | Operator::ILike => {
                let pattern = value.as_str().ok_or_else(|| {
                    KnowledgeError::query(format!("operator '{}' on '{}' needs a string", operator, field))
                })?;
                Operand::Pattern(like_regex(pattern, operator == Operator::ILike)?)
            }
            Operator::IsNull => Operand::Null(truthy(value)),
            _ => Operand::Value(value.clone()),
        };
        Ok(Self {
            field: field.to_string(),
            operator,
            operand,
        })
    }

    /// Evaluate against the field value of one record.
    pub fn matches(&self, actual: &Value) -> bool {
        if let Operand::Null(want_null) = &self.operand {
            return actual.is_null() == *want_null;
        }
        if actual.is_null() {
            return false;
        }
        match (&self.operator, &self.operand) {
            (Operator::Eq, Operand::Value(v)) => loose_eq(actual, v),
            (Operator::Ne, Operand::Value(v)) => !loose_eq(actual, v),
            (Operator::Gt, Operand::Value(v)) => compare(actual, v) == Some(Ordering::Greater),
            (Operator::Lt, Operand::Value(v)) => compare(actual, v) == Some(Ordering::Less),
            (Operator::Ge, Operand::Value(v)) => {
                matches!(compare(actual, v), Some(Ordering::Greater | Ordering::Equal))
            }
            (Operator::Le, Operand::Value(v)) => {
                matches!(compare(actual, v), Some(Ordering::Less | Ordering::Equal))
            }
            (Operator::In, Operand::List(items)) => items.iter().any(|v| loose_eq(actual, v)),
            (Operator::NotIn, Operand::List(items)) => !items.iter().any(|v| loose_eq(actual, v)),
            (Operator::Between, Operand::Range(lo, hi)) => {
                matches!(compare(actual, lo), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(actual, hi), Some(Ordering::Less | Ordering::Equal))
            }
            (Operator::Like | Operator::ILike, Operand::Pattern(re)) => re.is_match(&text(actual)),
            (Operator::Contains, Operand::Value(v)) => match actual {
                Value::Array(items) => items.iter().any(|item| loose_eq(item, v)),
                _ => text(actual).contains(&text(v)),
            },
            (Operator::StartsWith, Operand::Value(v)) => text(actual).starts_with(&text(v)),
            (Operator::EndsWith, Operand::Value(v)) => text(actual).ends_with(&text(v)),
            _ => false,
        }
    }
}

/// Translate a SQL `LIKE` pattern: `%` is any run, `_` is one character.
fn like_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, KnowledgeError> {
    let mut source = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    RegexBuilder::new(&source)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| KnowledgeError::query(format!("bad pattern '{}': {}", pattern, e)))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pred(op: &str, value: Value) -> Predicate {
        Predicate::compile("f", op.parse().unwrap(), &value).unwrap()
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = "approx".parse::<Operator>().unwrap_err();
        assert!(matches!(err, KnowledgeError::QueryCompile(_)));
    }

    #[test]
    fn test_like_and_ilike() {
        assert!(pred("like", json!("get%")).matches(&json!("getUser")));
        assert!(!pred("like", json!("get%")).matches(&json!("GetUser")));
        assert!(pred("ilike", json!("%user%")).matches(&json!("GetUser")));
        assert!(pred("like", json!("a_c")).matches(&json!("abc")));
        assert!(pred("like", json!("a.c")).matches(&json!("a.c")));
        assert!(!pred("like", json!("a.c")).matches(&json!("abc")));
    }

    #[test]
    fn test_between_is_inclusive() {
        let p = pred("between", json!([10, 20]));
        assert!(p.matches(&json!(10)));
        assert!(p.matches(&json!(20)));
        assert!(!p.matches(&json!(21)));
        assert!(Predicate::compile("f", Operator::Between, &json!(10)).is_err());
    }

    #[test]
    fn test_membership_requires_list() {
        assert!(pred("in", json!(["a", "b"])).matches(&json!("a")));
        assert!(pred("not_in", json!(["a", "b"])).matches(&json!("c")));
        assert!(Predicate::compile("f", Operator::In, &json!("a")).is_err());
    }

    #[test]
    fn test_null_semantics() {
        assert!(pred("is_null", json!(true)).matches(&Value::Null));
        assert!(pred("is_null", json!(false)).matches(&json!("x")));
        assert!(!pred("ne", json!("x")).matches(&Value::Null));
        assert!(!pred("eq", json!("x")).matches(&Value::Null));
    }

    #[test]
    fn test_string_operators() {
        assert!(pred("contains", json!("ser")).matches(&json!("parser")));
        assert!(pred("contains", json!("Show")).matches(&json!(["Eq", "Show"])));
        assert!(pred("startswith", json!("par")).matches(&json!("parser")));
        assert!(pred("endswith", json!("ser")).matches(&json!("parser")));
        assert!(pred("gt", json!(3)).matches(&json!(4)));
        assert!(pred("le", json!("b")).matches(&json!("a")));
        assert!(pred("eq", json!(4.0)).matches(&json!(4)));
    }
}
