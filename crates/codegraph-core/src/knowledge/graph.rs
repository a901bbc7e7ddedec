//! The in-memory code graph produced by one ingestion run.
//!
//! Entities are stored per kind, keyed by canonical id. Call, uses-instance and
//! type-dependency edges are sets keyed by `(from, to)`; inserting a pair that
//! is already present is a no-op that reports `false`.
//!
//! A `CodeGraph` is mutable only while it is owned by the builder (or by a
//! caller before it is shared). Once wrapped in `Arc` it is a read-only
//! snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use super::error::KnowledgeError;
use super::ontology::*;

type Pair = (String, String);

/// Frozen graph snapshot.
#[derive(Debug, Clone, Default)]
pub struct CodeGraph {
    pub(crate) modules: BTreeMap<String, ModuleEntity>,
    pub(crate) functions: BTreeMap<String, FunctionEntity>,
    pub(crate) nested_functions: BTreeMap<String, NestedFunctionEntity>,
    pub(crate) types: BTreeMap<String, TypeEntity>,
    pub(crate) constructors: BTreeMap<String, ConstructorEntity>,
    pub(crate) fields: BTreeMap<String, FieldEntity>,
    pub(crate) classes: BTreeMap<String, ClassEntity>,
    pub(crate) instances: BTreeMap<String, InstanceEntity>,
    pub(crate) traits: BTreeMap<String, TraitEntity>,
    pub(crate) trait_methods: BTreeMap<String, TraitMethodSignatureEntity>,
    pub(crate) impl_blocks: BTreeMap<String, ImplBlockEntity>,
    pub(crate) imports: BTreeMap<String, ImportEntity>,
    pub(crate) constants: BTreeMap<String, ConstantEntity>,

    /// Every call site recorded on a function or nested function
    pub(crate) call_sites: Vec<CallSite>,
    /// Call sites that matched no known function
    pub(crate) unresolved_calls: Vec<CallSite>,

    pub(crate) contains: BTreeMap<(String, String, ContainmentKind), ContainsEdge>,
    pub(crate) import_edges: BTreeMap<Pair, ImportsEdge>,
    pub(crate) calls: BTreeMap<Pair, CallsEdge>,
    pub(crate) uses_instance: BTreeMap<Pair, UsesInstanceEdge>,
    pub(crate) uses_type: BTreeMap<Pair, UsesTypeEdge>,
    pub(crate) implements: BTreeMap<Pair, ImplementsEdge>,

    /// caller -> callees
    callees: BTreeMap<String, BTreeSet<String>>,
    /// callee -> callers
    callers: BTreeMap<String, BTreeSet<String>>,
    /// owning type -> referenced types
    type_deps: BTreeMap<String, BTreeSet<String>>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Edge insertion
    // =========================================================================

    /// Insert a call edge. Returns `false` if the pair already exists.
    pub fn insert_call(&mut self, edge: CallsEdge) -> bool {
        let key = (edge.from.clone(), edge.to.clone());
        if self.calls.contains_key(&key) {
            return false;
        }
        self.callees
            .entry(edge.from.clone())
            .or_default()
            .insert(edge.to.clone());
        self.callers
            .entry(edge.to.clone())
            .or_default()
            .insert(edge.from.clone());
        self.calls.insert(key, edge);
        true
    }

    /// Insert a field -> type dependency. Returns `false` if the pair exists.
    pub fn insert_type_dependency(&mut self, edge: UsesTypeEdge) -> bool {
        let key = (edge.from.clone(), edge.to.clone());
        if self.uses_type.contains_key(&key) {
            return false;
        }
        self.type_deps
            .entry(edge.owner_type.clone())
            .or_default()
            .insert(edge.to.clone());
        self.uses_type.insert(key, edge);
        true
    }

    pub fn insert_uses_instance(&mut self, edge: UsesInstanceEdge) -> bool {
        let key = (edge.from.clone(), edge.to.clone());
        if self.uses_instance.contains_key(&key) {
            return false;
        }
        self.uses_instance.insert(key, edge);
        true
    }

    pub fn insert_contains(&mut self, edge: ContainsEdge) -> bool {
        let key = (edge.from.clone(), edge.to.clone(), edge.kind);
        if self.contains.contains_key(&key) {
            return false;
        }
        self.contains.insert(key, edge);
        true
    }

    pub fn insert_import_edge(&mut self, edge: ImportsEdge) -> bool {
        let key = (edge.from.clone(), edge.to.clone());
        if self.import_edges.contains_key(&key) {
            return false;
        }
        self.import_edges.insert(key, edge);
        true
    }

    pub fn insert_implements(&mut self, edge: ImplementsEdge) -> bool {
        let key = (edge.from.clone(), edge.to.clone());
        if self.implements.contains_key(&key) {
            return false;
        }
        self.implements.insert(key, edge);
        true
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn module(&self, id: &str) -> Option<&ModuleEntity> {
        self.modules.get(id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleEntity> {
        self.modules.values()
    }

    pub fn function(&self, id: &str) -> Option<&FunctionEntity> {
        self.functions.get(id)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionEntity> {
        self.functions.values()
    }

    pub fn nested_function(&self, id: &str) -> Option<&NestedFunctionEntity> {
        self.nested_functions.get(id)
    }

    pub fn nested_functions(&self) -> impl Iterator<Item = &NestedFunctionEntity> {
        self.nested_functions.values()
    }

    /// Nested functions whose immediate parent is `parent_id`.
    pub fn nested_children<'a, 'b>(&'a self, parent_id: &'b str) -> impl Iterator<Item = &'a NestedFunctionEntity> + 'b
    where
        'a: 'b,
    {
        self.nested_functions
            .values()
            .filter(move |n| n.parent_id == parent_id)
    }

    /// Every nested function under a top-level function, at any depth.
    pub fn nested_under<'a, 'b>(&'a self, function_id: &'b str) -> impl Iterator<Item = &'a NestedFunctionEntity> + 'b
    where
        'a: 'b,
    {
        self.nested_functions
            .values()
            .filter(move |n| n.function_id == function_id)
    }

    pub fn type_def(&self, id: &str) -> Option<&TypeEntity> {
        self.types.get(id)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeEntity> {
        self.types.values()
    }

    pub fn constructors(&self) -> impl Iterator<Item = &ConstructorEntity> {
        self.constructors.values()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldEntity> {
        self.fields.values()
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassEntity> {
        self.classes.values()
    }

    pub fn instance(&self, id: &str) -> Option<&InstanceEntity> {
        self.instances.get(id)
    }

    pub fn instances(&self) -> impl Iterator<Item = &InstanceEntity> {
        self.instances.values()
    }

    pub fn trait_def(&self, id: &str) -> Option<&TraitEntity> {
        self.traits.get(id)
    }

    pub fn traits(&self) -> impl Iterator<Item = &TraitEntity> {
        self.traits.values()
    }

    pub fn trait_methods(&self) -> impl Iterator<Item = &TraitMethodSignatureEntity> {
        self.trait_methods.values()
    }

    pub fn impl_block(&self, id: &str) -> Option<&ImplBlockEntity> {
        self.impl_blocks.get(id)
    }

    pub fn impl_blocks(&self) -> impl Iterator<Item = &ImplBlockEntity> {
        self.impl_blocks.values()
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportEntity> {
        self.imports.values()
    }

    pub fn constants(&self) -> impl Iterator<Item = &ConstantEntity> {
        self.constants.values()
    }

    pub fn call_sites(&self) -> &[CallSite] {
        &self.call_sites
    }

    pub fn unresolved_calls(&self) -> &[CallSite] {
        &self.unresolved_calls
    }

    pub fn call_edges(&self) -> impl Iterator<Item = &CallsEdge> {
        self.calls.values()
    }

    pub fn type_dependency_edges(&self) -> impl Iterator<Item = &UsesTypeEdge> {
        self.uses_type.values()
    }

    pub fn uses_instance_edges(&self) -> impl Iterator<Item = &UsesInstanceEdge> {
        self.uses_instance.values()
    }

    pub fn contains_edges(&self) -> impl Iterator<Item = &ContainsEdge> {
        self.contains.values()
    }

    pub fn has_call(&self, from: &str, to: &str) -> bool {
        self.calls.contains_key(&(from.to_string(), to.to_string()))
    }

    /// Functions called by `id` (forward call relation).
    pub fn callees_of(&self, id: &str) -> impl Iterator<Item = &str> {
        self.callees
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Functions and nested functions calling `id` (inverse call relation).
    pub fn callers_of(&self, id: &str) -> impl Iterator<Item = &str> {
        self.callers
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Types referenced by the fields of type `id`.
    pub fn type_dependencies_of(&self, id: &str) -> impl Iterator<Item = &str> {
        self.type_deps
            .get(id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Types with the given name, in id order.
    pub fn types_named<'a, 'b>(&'a self, type_name: &'b str) -> impl Iterator<Item = &'a TypeEntity> + 'b
    where
        'a: 'b,
    {
        self.types.values().filter(move |t| t.type_name == type_name)
    }

    /// Functions owned by an instance.
    pub fn instance_methods<'a, 'b>(&'a self, instance_id: &'b str) -> impl Iterator<Item = &'a FunctionEntity> + 'b
    where
        'a: 'b,
    {
        self.functions
            .values()
            .filter(move |f| f.instance_id.as_deref() == Some(instance_id))
    }

    /// Functions owned by an impl block.
    pub fn impl_methods<'a, 'b>(&'a self, impl_id: &'b str) -> impl Iterator<Item = &'a FunctionEntity> + 'b
    where
        'a: 'b,
    {
        self.functions
            .values()
            .filter(move |f| f.impl_block_id.as_deref() == Some(impl_id))
    }

    // =========================================================================
    // Counts
    // =========================================================================

    /// Number of stored records per entity kind.
    pub fn entity_counts(&self) -> BTreeMap<EntityKind, usize> {
        let mut counts = BTreeMap::new();
        counts.insert(EntityKind::Module, self.modules.len());
        counts.insert(EntityKind::Function, self.functions.len());
        counts.insert(EntityKind::WhereFunction, self.nested_functions.len());
        counts.insert(EntityKind::Type, self.types.len());
        counts.insert(EntityKind::Constructor, self.constructors.len());
        counts.insert(EntityKind::Field, self.fields.len());
        counts.insert(EntityKind::Class, self.classes.len());
        counts.insert(EntityKind::Instance, self.instances.len());
        counts.insert(EntityKind::Trait, self.traits.len());
        counts.insert(EntityKind::TraitMethodSignature, self.trait_methods.len());
        counts.insert(EntityKind::ImplBlock, self.impl_blocks.len());
        counts.insert(EntityKind::Import, self.imports.len());
        counts.insert(EntityKind::Constant, self.constants.len());
        counts
    }

    pub fn node_count(&self) -> usize {
        self.entity_counts().values().sum()
    }

    pub fn edge_count(&self) -> usize {
        self.contains.len()
            + self.import_edges.len()
            + self.calls.len()
            + self.uses_instance.len()
            + self.uses_type.len()
            + self.implements.len()
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Ids of every record of `kind`.
    pub fn ids(&self, kind: EntityKind) -> Vec<&str> {
        fn keys<T>(map: &BTreeMap<String, T>) -> Vec<&str> {
            map.keys().map(String::as_str).collect()
        }
        match kind.record_kind() {
            EntityKind::Module => keys(&self.modules),
            EntityKind::Function => keys(&self.functions),
            EntityKind::WhereFunction => keys(&self.nested_functions),
            EntityKind::Type => keys(&self.types),
            EntityKind::Constructor => keys(&self.constructors),
            EntityKind::Field => keys(&self.fields),
            EntityKind::Class => keys(&self.classes),
            EntityKind::Instance => keys(&self.instances),
            EntityKind::Trait => keys(&self.traits),
            EntityKind::TraitMethodSignature => keys(&self.trait_methods),
            EntityKind::ImplBlock => keys(&self.impl_blocks),
            EntityKind::Import => keys(&self.imports),
            EntityKind::Constant => keys(&self.constants),
            EntityKind::CallingFunction | EntityKind::CalledFunction => keys(&self.functions),
        }
    }

    /// JSON record of one entity.
    pub fn record(&self, kind: EntityKind, id: &str) -> Option<Value> {
        fn to_record<T: Serialize>(entity: Option<&T>) -> Option<Value> {
            entity.and_then(|e| serde_json::to_value(e).ok())
        }
        match kind.record_kind() {
            EntityKind::Module => to_record(self.modules.get(id)),
            EntityKind::Function | EntityKind::CallingFunction | EntityKind::CalledFunction => {
                to_record(self.functions.get(id))
            }
            EntityKind::WhereFunction => to_record(self.nested_functions.get(id)),
            EntityKind::Type => to_record(self.types.get(id)),
            EntityKind::Constructor => to_record(self.constructors.get(id)),
            EntityKind::Field => to_record(self.fields.get(id)),
            EntityKind::Class => to_record(self.classes.get(id)),
            EntityKind::Instance => to_record(self.instances.get(id)),
            EntityKind::Trait => to_record(self.traits.get(id)),
            EntityKind::TraitMethodSignature => to_record(self.trait_methods.get(id)),
            EntityKind::ImplBlock => to_record(self.impl_blocks.get(id)),
            EntityKind::Import => to_record(self.imports.get(id)),
            EntityKind::Constant => to_record(self.constants.get(id)),
        }
    }

    /// Every entity as a [`GraphNode`].
    pub fn nodes(&self) -> impl Iterator<Item = GraphNode> + '_ {
        let modules = self.modules.values().cloned().map(GraphNode::Module);
        let functions = self.functions.values().cloned().map(GraphNode::Function);
        let nested = self
            .nested_functions
            .values()
            .cloned()
            .map(GraphNode::NestedFunction);
        let types = self.types.values().cloned().map(GraphNode::Type);
        let constructors = self.constructors.values().cloned().map(GraphNode::Constructor);
        let fields = self.fields.values().cloned().map(GraphNode::Field);
        let classes = self.classes.values().cloned().map(GraphNode::Class);
        let instances = self.instances.values().cloned().map(GraphNode::Instance);
        let traits = self.traits.values().cloned().map(GraphNode::Trait);
        let trait_methods = self.trait_methods.values().cloned().map(GraphNode::TraitMethod);
        let impl_blocks = self.impl_blocks.values().cloned().map(GraphNode::ImplBlock);
        let imports = self.imports.values().cloned().map(GraphNode::Import);
        let constants = self.constants.values().cloned().map(GraphNode::Constant);

        modules
            .chain(functions)
            .chain(nested)
            .chain(types)
            .chain(constructors)
            .chain(fields)
            .chain(classes)
            .chain(instances)
            .chain(traits)
            .chain(trait_methods)
            .chain(impl_blocks)
            .chain(imports)
            .chain(constants)
    }

    /// Every edge as a [`GraphEdge`].
    pub fn edges(&self) -> impl Iterator<Item = GraphEdge> + '_ {
        let contains = self.contains.values().cloned().map(GraphEdge::Contains);
        let imports = self.import_edges.values().cloned().map(GraphEdge::Imports);
        let calls = self.calls.values().cloned().map(GraphEdge::Calls);
        let uses_instance = self
            .uses_instance
            .values()
            .cloned()
            .map(GraphEdge::UsesInstance);
        let uses_type = self.uses_type.values().cloned().map(GraphEdge::UsesType);
        let implements = self.implements.values().cloned().map(GraphEdge::Implements);

        contains
            .chain(imports)
            .chain(calls)
            .chain(uses_instance)
            .chain(uses_type)
            .chain(implements)
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Remove a function together with its nested functions, their call sites
    /// and every edge touching any of them.
    pub fn remove_function(&mut self, id: &str) -> Result<FunctionEntity, KnowledgeError> {
        let function = self
            .functions
            .remove(id)
            .ok_or_else(|| KnowledgeError::EntityNotFound(format!("function {}", id)))?;

        let mut removed: BTreeSet<String> = self
            .nested_functions
            .values()
            .filter(|n| n.function_id == id)
            .map(|n| n.id.clone())
            .collect();
        for nested_id in &removed {
            self.nested_functions.remove(nested_id);
        }
        removed.insert(id.to_string());

        self.call_sites.retain(|c| !removed.contains(&c.caller_id));
        self.unresolved_calls.retain(|c| !removed.contains(&c.caller_id));

        let touches = |from: &str, to: &str| removed.contains(from) || removed.contains(to);
        self.calls.retain(|(from, to), _| !touches(from.as_str(), to.as_str()));
        self.uses_instance.retain(|(from, to), _| !touches(from.as_str(), to.as_str()));
        self.contains.retain(|(from, to, _), _| !touches(from.as_str(), to.as_str()));

        for node in &removed {
            self.callees.remove(node);
            self.callers.remove(node);
        }
        for set in self.callees.values_mut().chain(self.callers.values_mut()) {
            set.retain(|other| !removed.contains(other));
        }

        Ok(function)
    }

    /// Remove an impl block. Its methods stay in the graph with their
    /// `impl_block_id` cleared.
    pub fn remove_impl_block(&mut self, id: &str) -> Result<ImplBlockEntity, KnowledgeError> {
        let block = self
            .impl_blocks
            .remove(id)
            .ok_or_else(|| KnowledgeError::EntityNotFound(format!("impl block {}", id)))?;

        for function in self.functions.values_mut() {
            if function.impl_block_id.as_deref() == Some(id) {
                function.impl_block_id = None;
            }
        }
        self.contains
            .retain(|(from, to, _), _| from != id && to != id);
        self.implements.retain(|(from, _), _| from != id);

        Ok(block)
    }
}
