//! Identity resolution for functions.
//!
//! Distinct overloads and shadowed definitions can share a simple
//! `(module, name)` key, so every function gets a canonical key and the
//! [`SymbolIndex`] maps each simple key to one or more canonical keys.
//!
//! The index is filled while entities are merged and frozen before any call is
//! resolved. A frozen index is read-only and can be shared across threads.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical identity of a function.
///
/// With a source location and a known start line the key is
/// `module:name:signature:src_loc:line`; otherwise it degrades to
/// `module:name:signature`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn new(
        module: &str,
        name: &str,
        signature: Option<&str>,
        src_loc: Option<&str>,
        line_number_start: u32,
    ) -> Self {
        let signature = signature.unwrap_or_default();
        match src_loc.filter(|loc| !loc.is_empty()) {
            Some(loc) if line_number_start > 0 => Self(format!(
                "{}:{}:{}:{}:{}",
                module, name, signature, loc, line_number_start
            )),
            _ => Self(format!("{}:{}:{}", module, name, signature)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `(module, name)` key call sites are resolved by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimpleKey {
    pub module: String,
    pub name: String,
}

impl SimpleKey {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

/// Outcome of resolving one simple key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Exactly one candidate
    Resolved(&'a str),
    /// Several candidates; callers fan out to all of them
    Ambiguous(&'a [String]),
    /// No candidate; an external or library reference
    Unresolved,
}

impl Resolution<'_> {
    /// Every candidate id, in index order.
    pub fn candidates(&self) -> Vec<&str> {
        match self {
            Resolution::Resolved(id) => vec![*id],
            Resolution::Ambiguous(ids) => ids.iter().map(String::as_str).collect(),
            Resolution::Unresolved => Vec::new(),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Resolution::Ambiguous(_))
    }
}

// =============================================================================
// SYMBOL INDEX
// =============================================================================

/// Mutable index filled during the merge phase.
#[derive(Debug, Default)]
pub struct SymbolIndexBuilder {
    by_simple_key: HashMap<SimpleKey, Vec<String>>,
}

impl SymbolIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canonical id under its simple key. Registering the same id
    /// twice is a no-op.
    pub fn insert(&mut self, key: SimpleKey, canonical_id: impl Into<String>) {
        let canonical_id = canonical_id.into();
        let ids = self.by_simple_key.entry(key).or_default();
        if !ids.contains(&canonical_id) {
            ids.push(canonical_id);
        }
    }

    pub fn freeze(self) -> SymbolIndex {
        SymbolIndex {
            by_simple_key: self.by_simple_key,
        }
    }
}

/// Frozen simple-key index.
#[derive(Debug, Default, Clone)]
pub struct SymbolIndex {
    by_simple_key: HashMap<SimpleKey, Vec<String>>,
}

impl SymbolIndex {
    pub fn resolve(&self, module: &str, name: &str) -> Resolution<'_> {
        let key = SimpleKey::new(module, name);
        match self.by_simple_key.get(&key).map(Vec::as_slice) {
            None | Some([]) => Resolution::Unresolved,
            Some([single]) => Resolution::Resolved(single),
            Some(many) => Resolution::Ambiguous(many),
        }
    }

    pub fn len(&self) -> usize {
        self.by_simple_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_simple_key.is_empty()
    }

    /// Simple keys with more than one canonical id, for reporting.
    pub fn overloaded(&self) -> BTreeMap<String, usize> {
        self.by_simple_key
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(key, ids)| (format!("{}:{}", key.module, key.name), ids.len()))
            .collect()
    }
}

// =============================================================================
// INSTANCE SIGNATURES
// =============================================================================

/// Strip module qualification from every token of an instance signature.
///
/// `GHC.Show.Show Data.Map.Map` becomes `Show Map`. Whitespace is collapsed.
pub fn normalize_instance_signature(signature: &str) -> String {
    signature
        .split_whitespace()
        .map(strip_qualifier)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_qualifier(token: &str) -> String {
    let body_start = token
        .find(|c: char| c.is_alphanumeric() || c == '_')
        .unwrap_or(token.len());
    let (prefix, body) = token.split_at(body_start);
    match body.rfind('.') {
        Some(pos) if pos + 1 < body.len() => format!("{}{}", prefix, &body[pos + 1..]),
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key_with_location() {
        let key = CanonicalKey::new("M", "f", Some("Int -> Int"), Some("src/M.hs:3:1"), 3);
        assert_eq!(key.as_str(), "M:f:Int -> Int:src/M.hs:3:1:3");
    }

    #[test]
    fn test_canonical_key_degrades_without_location() {
        assert_eq!(CanonicalKey::new("M", "f", None, None, 3).as_str(), "M:f:");
        assert_eq!(CanonicalKey::new("M", "f", Some("a"), Some("loc"), 0).as_str(), "M:f:a");
        assert_eq!(CanonicalKey::new("M", "f", Some("a"), Some(""), 7).as_str(), "M:f:a");
    }

    #[test]
    fn test_resolution_counts() {
        let mut builder = SymbolIndexBuilder::new();
        builder.insert(SimpleKey::new("M", "f"), "M:f:1");
        builder.insert(SimpleKey::new("M", "g"), "M:g:1");
        builder.insert(SimpleKey::new("M", "g"), "M:g:2");
        builder.insert(SimpleKey::new("M", "g"), "M:g:2");
        let index = builder.freeze();

        assert_eq!(index.resolve("M", "f"), Resolution::Resolved("M:f:1"));
        assert_eq!(index.resolve("M", "g").candidates(), vec!["M:g:1", "M:g:2"]);
        assert!(index.resolve("M", "g").is_ambiguous());
        assert_eq!(index.resolve("N", "f"), Resolution::Unresolved);
        assert_eq!(index.overloaded().get("M:g"), Some(&2));
    }

    #[test]
    fn test_normalize_instance_signature() {
        assert_eq!(normalize_instance_signature("GHC.Show.Show  Data.Map.Map"), "Show Map");
        assert_eq!(normalize_instance_signature("Show Int"), "Show Int");
        assert_eq!(normalize_instance_signature("Eq (Data.Maybe.T a)"), "Eq (T a)");
        assert_eq!(normalize_instance_signature("Cat ."), "Cat .");
    }
}
