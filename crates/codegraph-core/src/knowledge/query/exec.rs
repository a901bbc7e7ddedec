//! Query compilation and execution against a [`CodeGraph`].

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;

use super::ast::QueryNode;
use super::operator::{Operator, Predicate};
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::graph::CodeGraph;
use crate::knowledge::ontology::EntityKind;

/// A query node whose kinds and operators have been validated.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub kind: EntityKind,
    pub predicates: Vec<Predicate>,
    pub joins: Vec<CompiledQuery>,
}

impl CompiledQuery {
    pub fn compile(node: &QueryNode) -> Result<Self, KnowledgeError> {
        let kind: EntityKind = node.kind.parse()?;
        let predicates = node
            .conditions
            .iter()
            .map(|c| {
                let operator: Operator = c.operator.parse()?;
                Predicate::compile(&c.field, operator, &c.value)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let joins = node
            .joins
            .iter()
            .map(CompiledQuery::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            kind,
            predicates,
            joins,
        })
    }
}

/// How a child kind relates to its parent kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
    /// Keep parents with matching children and attach the children.
    Children,
    /// Replace the row set with the callers of the current rows.
    Callers,
    /// Replace the row set with the functions of the current modules.
    ModuleFunctions,
}

pub(crate) fn relation(parent: EntityKind, child: EntityKind) -> Option<Relation> {
    use EntityKind::*;
    match (parent.record_kind(), child) {
        (Module, Function) => Some(Relation::ModuleFunctions),
        (
            Module,
            Import | Type | Class | Instance | Trait | TraitMethodSignature | ImplBlock | Constant,
        ) => Some(Relation::Children),
        (Function, CallingFunction) => Some(Relation::Callers),
        (Function, Module | WhereFunction | CalledFunction | Instance) => Some(Relation::Children),
        (WhereFunction, WhereFunction | CalledFunction) => Some(Relation::Children),
        (Type, Constructor) | (Constructor, Field) => Some(Relation::Children),
        (Trait, TraitMethodSignature | ImplBlock) => Some(Relation::Children),
        (ImplBlock, Function | Trait) => Some(Relation::Children),
        (Instance, Function) => Some(Relation::Children),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct Row {
    id: String,
    record: Map<String, Value>,
}

pub(crate) struct Executor<'g> {
    graph: &'g CodeGraph,
}

impl<'g> Executor<'g> {
    pub(crate) fn new(graph: &'g CodeGraph) -> Self {
        Self { graph }
    }

    pub(crate) fn run(&self, query: &CompiledQuery) -> Vec<Value> {
        self.select(query, None)
            .into_iter()
            .map(|row| Value::Object(row.record))
            .collect()
    }

    /// Rows of `query.kind` (restricted to `scope` when given) that satisfy
    /// the predicates, after every join has been applied.
    fn select(&self, query: &CompiledQuery, scope: Option<&[String]>) -> Vec<Row> {
        let ids: Vec<String> = match scope {
            Some(ids) => ids.to_vec(),
            None => self
                .graph
                .ids(query.kind)
                .into_iter()
                .map(str::to_string)
                .collect(),
        };

        let mut rows: Vec<Row> = ids
            .into_iter()
            .filter_map(|id| match self.graph.record(query.kind, &id) {
                Some(Value::Object(record)) => Some(Row { id, record }),
                _ => None,
            })
            .collect();

        let active = self.active_predicates(query, rows.first());
        rows.retain(|row| {
            active
                .iter()
                .all(|p| p.matches(row.record.get(&p.field).unwrap_or(&Value::Null)))
        });

        let mut current = query.kind;
        for join in &query.joins {
            let Some(rel) = relation(current, join.kind) else {
                debug!(parent = %current, child = %join.kind, "no relationship, join skipped");
                continue;
            };
            match rel {
                Relation::Callers => {
                    let mut callers = BTreeSet::new();
                    for row in &rows {
                        callers.extend(
                            self.graph
                                .callers_of(&row.id)
                                .filter(|id| self.graph.function(id).is_some())
                                .map(str::to_string),
                        );
                    }
                    let scope: Vec<String> = callers.into_iter().collect();
                    rows = self.select(join, Some(&scope));
                    current = join.kind;
                }
                Relation::ModuleFunctions => {
                    let modules: BTreeSet<&str> = rows.iter().map(|r| r.id.as_str()).collect();
                    let scope: Vec<String> = self
                        .graph
                        .functions()
                        .filter(|f| modules.contains(f.module_name.as_str()))
                        .map(|f| f.id.clone())
                        .collect();
                    rows = self.select(join, Some(&scope));
                    current = join.kind;
                }
                Relation::Children => {
                    let parent_kind = current;
                    rows = rows
                        .into_iter()
                        .filter_map(|mut row| {
                            let scope = self.child_ids(parent_kind, join.kind, &row.id);
                            if scope.is_empty() {
                                return None;
                            }
                            let children = self.select(join, Some(&scope));
                            if children.is_empty() {
                                return None;
                            }
                            let attached = children.into_iter().map(|c| Value::Object(c.record)).collect();
                            row.record
                                .insert(join.kind.as_str().to_string(), Value::Array(attached));
                            Some(row)
                        })
                        .collect();
                }
            }
        }

        rows
    }

    /// Predicates whose field exists on records of this kind.
    fn active_predicates<'q>(&self, query: &'q CompiledQuery, sample: Option<&Row>) -> Vec<&'q Predicate> {
        let Some(sample) = sample else {
            return query.predicates.iter().collect();
        };
        query
            .predicates
            .iter()
            .filter(|p| {
                let known = sample.record.contains_key(&p.field);
                if !known {
                    debug!(kind = %query.kind, field = %p.field, "unknown field, condition skipped");
                }
                known
            })
            .collect()
    }

    fn child_ids(&self, parent: EntityKind, child: EntityKind, id: &str) -> Vec<String> {
        use EntityKind::*;
        let graph = self.graph;

        match (parent.record_kind(), child) {
            (Module, Import) => graph.imports().filter(|e| e.module_name == id).map(|e| e.id.clone()).collect(),
            (Module, Type) => graph.types().filter(|e| e.module_name == id).map(|e| e.id.clone()).collect(),
            (Module, Class) => graph.classes().filter(|e| e.module_name == id).map(|e| e.id.clone()).collect(),
            (Module, Instance) => graph.instances().filter(|e| e.module_name == id).map(|e| e.id.clone()).collect(),
            (Module, Trait) => graph.traits().filter(|e| e.module_name == id).map(|e| e.id.clone()).collect(),
            (Module, TraitMethodSignature) => graph
                .trait_methods()
                .filter(|e| e.module_name == id)
                .map(|e| e.id.clone())
                .collect(),
            (Module, ImplBlock) => graph.impl_blocks().filter(|e| e.module_name == id).map(|e| e.id.clone()).collect(),
            (Module, Constant) => graph.constants().filter(|e| e.module_name == id).map(|e| e.id.clone()).collect(),
            (Function, Module) => graph
                .function(id)
                .map(|f| vec![f.module_name.clone()])
                .unwrap_or_default(),
            (Function, WhereFunction) => graph.nested_under(id).map(|n| n.id.clone()).collect(),
            (Function | WhereFunction, CalledFunction) => graph
                .callees_of(id)
                .filter(|callee| graph.function(callee).is_some())
                .map(str::to_string)
                .collect(),
            (Function, Instance) => {
                let mut ids: BTreeSet<String> = graph
                    .uses_instance_edges()
                    .filter(|e| e.from == id)
                    .map(|e| e.to.clone())
                    .collect();
                if let Some(owner) = graph.function(id).and_then(|f| f.instance_id.clone()) {
                    ids.insert(owner);
                }
                ids.into_iter().collect()
            }
            (WhereFunction, WhereFunction) => graph.nested_children(id).map(|n| n.id.clone()).collect(),
            (Type, Constructor) => graph.constructors().filter(|c| c.type_id == id).map(|c| c.id.clone()).collect(),
            (Constructor, Field) => graph.fields().filter(|f| f.constructor_id == id).map(|f| f.id.clone()).collect(),
            (Trait, TraitMethodSignature) => graph
                .trait_methods()
                .filter(|m| m.trait_id == id)
                .map(|m| m.id.clone())
                .collect(),
            (Trait, ImplBlock) => graph
                .impl_blocks()
                .filter(|b| b.trait_id.as_deref() == Some(id))
                .map(|b| b.id.clone())
                .collect(),
            (ImplBlock, Function) => graph.impl_methods(id).map(|f| f.id.clone()).collect(),
            (ImplBlock, Trait) => graph
                .impl_block(id)
                .and_then(|b| b.trait_id.clone())
                .into_iter()
                .collect(),
            (Instance, Function) => graph.instance_methods(id).map(|f| f.id.clone()).collect(),
            _ => Vec::new(),
        }
    }
}
