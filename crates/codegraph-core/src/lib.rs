//! Code knowledge graph core.
//!
//! Builds a typed graph of modules, functions, types, traits and their
//! relationships from per-module parser facts, then answers declarative
//! queries, structural pattern requests and bounded graph algorithms over it.

pub mod config;
pub mod knowledge;

pub use config::{Config, ConfigError};
pub use knowledge::{
    CodeGraph, FactBatch, GraphBuilder, KnowledgeError, KnowledgeGraph, KnowledgeStore, PatternRequest, QueryNode,
};
