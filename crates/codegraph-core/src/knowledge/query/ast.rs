//! Query documents as accepted from callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_kind() -> String {
    "function".to_string()
}

fn default_operator() -> String {
    "eq".to_string()
}

/// One level of a query tree: an entity kind, a conjunction of conditions
/// and a list of joins applied in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    #[serde(rename = "type", alias = "kind", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub joins: Vec<QueryNode>,
}

impl QueryNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            conditions: Vec::new(),
            joins: Vec::new(),
        }
    }

    pub fn with_condition(mut self, field: impl Into<String>, operator: impl Into<String>, value: Value) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            operator: operator.into(),
            value,
        });
        self
    }

    pub fn join(mut self, child: QueryNode) -> Self {
        self.joins.push(child);
        self
    }
}

impl Default for QueryNode {
    fn default() -> Self {
        Self::new(default_kind())
    }
}

/// A single `field operator value` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    #[serde(alias = "op", default = "default_operator")]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}
