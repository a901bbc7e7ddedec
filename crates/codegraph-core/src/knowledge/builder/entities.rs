//! Per-module entity building.
//!
//! Each module's facts are self-contained, so this phase runs on the worker
//! pool with no shared state. Nothing here resolves a reference that crosses
//! modules.

use serde_json::Value;
use tracing::{debug, warn};

use super::report::Diagnostic;
use crate::config::LITERAL_MODULE;
use crate::knowledge::error::KnowledgeError;
use crate::knowledge::facts::{
    decode, field_parts, split_nested_key, CallSiteFact, ClassFact, ConstantFact,
    FunctionFact, ImplBlockFact, ImportFact, InstanceFact, ModuleFacts, TraitFact,
    TraitMethodFact, TypeFact,
};
use crate::knowledge::identity::{normalize_instance_signature, CanonicalKey};
use crate::knowledge::ontology::*;

/// Entities decoded from one module, before merging.
#[derive(Debug, Default)]
pub(crate) struct ModuleBuild {
    pub module: Option<ModuleEntity>,
    pub functions: Vec<FunctionEntity>,
    pub nested_functions: Vec<NestedFunctionEntity>,
    pub call_sites: Vec<CallSite>,
    pub types: Vec<TypeEntity>,
    pub constructors: Vec<ConstructorEntity>,
    pub fields: Vec<FieldEntity>,
    pub classes: Vec<ClassEntity>,
    pub instances: Vec<InstanceEntity>,
    pub imports: Vec<ImportEntity>,
    pub traits: Vec<TraitEntity>,
    pub trait_methods: Vec<TraitMethodSignatureEntity>,
    pub impl_blocks: Vec<ImplBlockEntity>,
    pub constants: Vec<ConstantEntity>,

    pub diagnostics: Vec<Diagnostic>,
    pub skipped_facts: usize,
    pub incomplete_calls: usize,
    pub literal_calls: usize,
}

impl ModuleBuild {
    fn skip(&mut self, err: KnowledgeError) {
        warn!(error = %err, "skipping fact");
        self.skipped_facts += 1;
        self.diagnostics.push(Diagnostic::from_error(&err));
    }

    fn missing(&mut self, module: &str, entity: &str, message: &str) {
        self.skip(KnowledgeError::ParseFact {
            module: module.to_string(),
            entity: entity.to_string(),
            message: message.to_string(),
        });
    }
}

/// Build every entity of one module.
pub(crate) fn build_module(facts: &ModuleFacts, skip_literal_calls: bool) -> ModuleBuild {
    let mut out = ModuleBuild::default();
    let module = facts.module_name.trim();

    if module.is_empty() {
        out.missing("<unnamed>", "module", "module fact set has no module_name");
        return out;
    }

    out.module = Some(ModuleEntity {
        id: module.to_string(),
        name: module.to_string(),
        path: facts.path.clone(),
        package_name: facts.package_name.clone(),
    });

    let mut ctx = ModuleContext {
        module,
        skip_literal_calls,
        out: &mut out,
    };

    for value in &facts.functions {
        ctx.function(value);
    }
    for value in &facts.types {
        ctx.type_def(value);
    }
    for value in &facts.classes {
        ctx.class(value);
    }
    for value in &facts.instances {
        ctx.instance(value);
    }
    for value in &facts.imports {
        ctx.import(value);
    }
    for value in &facts.traits {
        ctx.trait_def(value);
    }
    for value in &facts.impl_blocks {
        ctx.impl_block(value);
    }
    for value in &facts.constants {
        ctx.constant(value);
    }

    attach_instance_methods(&mut out);

    debug!(
        module,
        functions = out.functions.len(),
        nested = out.nested_functions.len(),
        types = out.types.len(),
        skipped = out.skipped_facts,
        "module entities built"
    );
    out
}

struct ModuleContext<'a> {
    module: &'a str,
    skip_literal_calls: bool,
    out: &'a mut ModuleBuild,
}

impl ModuleContext<'_> {
    fn decode<T: serde::de::DeserializeOwned>(&mut self, entity: &str, value: &Value) -> Option<T> {
        match decode(self.module, entity, value) {
            Ok(fact) => Some(fact),
            Err(err) => {
                self.out.skip(err);
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Functions
    // -------------------------------------------------------------------------

    fn function(&mut self, value: &Value) {
        let Some(fact) = self.decode::<FunctionFact>("function", value) else {
            return;
        };
        let Some(name) = fact.name().map(str::to_string) else {
            self.out.missing(self.module, "function", "function fact has no name");
            return;
        };
        let module_name = fact
            .module_name
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.module.to_string());

        let id = CanonicalKey::new(
            &module_name,
            &name,
            fact.signature(),
            fact.src_loc.as_deref(),
            fact.line_number_start,
        )
        .into_string();

        let mut entity = FunctionEntity::new(&id, &module_name, &name);
        entity.signature = fact.signature().map(str::to_string);
        entity.src_loc = fact.src_loc.clone();
        entity.raw_string = fact.raw_string.clone();
        entity.type_enum = fact.type_enum().to_string();
        entity.line_number_start = fact.line_number_start;
        entity.line_number_end = fact.line_number_end.max(fact.line_number_start);
        entity.instances_used = fact.instance_signatures();
        entity.function_input = fact.function_input.clone();
        entity.function_output = fact.function_output.clone();
        entity.fully_qualified_path = fact.fully_qualified_path.clone();
        entity.is_method = fact.is_method.unwrap_or(false);
        entity.visibility = fact.visibility.clone();
        entity.doc_comments = fact.doc_comments.clone();
        entity.crate_name = fact.crate_name.clone();
        entity.module_path = fact.module_path.clone();

        self.call_sites(&id, &fact.functions_called);
        self.nested(&id, &id, &module_name, 1, &fact);
        self.out.functions.push(entity);
    }

    fn nested(&mut self, parent_id: &str, function_id: &str, module_name: &str, depth: u32, parent: &FunctionFact) {
        for (key, value) in &parent.where_functions {
            let Some(fact) = self.decode::<FunctionFact>("where_function", value) else {
                continue;
            };
            let (key_name, key_loc) = split_nested_key(key);
            let name = fact
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| key_name.to_string());
            if name.is_empty() {
                self.out.missing(self.module, "where_function", "nested function has no name");
                continue;
            }

            let src_loc = fact
                .src_loc
                .clone()
                .filter(|loc| !loc.is_empty())
                .or_else(|| key_loc.map(str::to_string));
            // Same-name siblings differ only by location; the map key is unique
            let id = match key_loc.or(src_loc.as_deref()) {
                Some(loc) => format!("{}.{}@{}", parent_id, name, loc),
                None => format!("{}.{}", parent_id, name),
            };
            let entity = NestedFunctionEntity {
                id: id.clone(),
                name,
                module_name: module_name.to_string(),
                parent_id: parent_id.to_string(),
                function_id: function_id.to_string(),
                depth,
                signature: fact.signature().map(str::to_string),
                src_loc,
                raw_string: fact.raw_string.clone(),
                type_enum: fact.type_enum().to_string(),
                fully_qualified_path: fact.fully_qualified_path.clone(),
                visibility: fact.visibility.clone(),
            };

            self.call_sites(&id, &fact.functions_called);
            self.nested(&id, function_id, module_name, depth + 1, &fact);
            self.out.nested_functions.push(entity);
        }
    }

    fn call_sites(&mut self, caller_id: &str, values: &[Value]) {
        for value in values {
            let Some(fact) = self.decode::<CallSiteFact>("call_site", value) else {
                continue;
            };

            let module = if fact.is_literal() {
                Some(LITERAL_MODULE.to_string())
            } else {
                fact.module_name.clone().filter(|m| !m.is_empty())
            };
            let (Some(module), Some(name)) = (module, fact.callee_name()) else {
                self.out.incomplete_calls += 1;
                continue;
            };
            if module == LITERAL_MODULE && self.skip_literal_calls {
                self.out.literal_calls += 1;
                continue;
            }

            let mut site = CallSite::new(caller_id, module, name);
            site.package_name = fact.package_name.clone();
            site.kind = fact.kind().to_string();
            site.src_loc = fact.src_loc.clone();
            site.line = fact.line_number;
            site.column = fact.column_number;
            site.fully_qualified_path = fact.fully_qualified_path.clone();
            site.is_method = fact.is_method.unwrap_or(false);
            site.call_type = fact.call_type.clone();
            site.origin_crate = fact.origin_crate.clone();
            site.origin_module = fact.origin_module.clone();
            self.out.call_sites.push(site);
        }
    }

    // -------------------------------------------------------------------------
    // Types
    // -------------------------------------------------------------------------

    fn type_def(&mut self, value: &Value) {
        let Some(fact) = self.decode::<TypeFact>("type", value) else {
            return;
        };
        if fact.type_name.is_empty() {
            self.out.missing(self.module, "type", "type fact has no type_name");
            return;
        }
        let module_name = fact
            .module_name
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.module.to_string());

        let kind = match fact.type_kind.as_deref() {
            Some(_) if fact.data_constructors_list.len() > 1 => TypeKind::SumType,
            Some(kind) => TypeKind::resolve(kind),
            None => TypeKind::Data,
        };

        let type_id = format!("{}:{}", module_name, fact.type_name);
        if kind.has_constructors() {
            for constructor in &fact.data_constructors_list {
                let name = constructor
                    .name()
                    .unwrap_or_else(|| fact.type_name.clone());
                let constructor_id = format!("{}.{}", type_id, name);

                for (field_name, field_value) in &constructor.fields {
                    let (raw_code, structure) = field_parts(field_value);
                    let expr = self.type_expr(structure);
                    self.out.fields.push(FieldEntity {
                        id: format!("{}.{}", constructor_id, field_name),
                        name: field_name.clone(),
                        constructor_id: constructor_id.clone(),
                        type_id: type_id.clone(),
                        module_name: module_name.clone(),
                        raw_code,
                        rendered: expr.to_string(),
                        structure: expr,
                    });
                }

                self.out.constructors.push(ConstructorEntity {
                    id: constructor_id,
                    name,
                    type_id: type_id.clone(),
                    module_name: module_name.clone(),
                });
            }
        }

        self.out.types.push(TypeEntity {
            id: type_id,
            type_name: fact.type_name,
            module_name,
            kind,
            raw_code: fact.raw_code,
            src_loc: fact.src_loc,
            line_number_start: fact.line_number_start,
            line_number_end: fact.line_number_end,
        });
    }

    /// Unrecognized expressions are kept as `Unknown` and reported.
    fn type_expr(&mut self, structure: &Value) -> TypeExpr {
        match TypeExpr::try_from_fact(structure) {
            Ok(expr) => expr,
            Err(err) => {
                debug!(module = self.module, error = %err, "unrecognized type expression");
                let err = match err {
                    KnowledgeError::UnknownVariant(_) => err,
                    other => KnowledgeError::UnknownVariant(other.to_string()),
                };
                self.out.diagnostics.push(Diagnostic::from_error(&err));
                TypeExpr::from_fact(structure)
            }
        }
    }

    fn class(&mut self, value: &Value) {
        let Some(fact) = self.decode::<ClassFact>("class", value) else {
            return;
        };
        if fact.class_name.is_empty() {
            self.out.missing(self.module, "class", "class fact has no class_name");
            return;
        }
        self.out.classes.push(ClassEntity {
            id: format!("{}:{}", self.module, fact.class_name),
            class_name: fact.class_name,
            module_name: self.module.to_string(),
            class_definition: fact.class_definition,
            src_location: fact.src_location,
            line_number_start: fact.line_number_start,
            line_number_end: fact.line_number_end,
        });
    }

    fn instance(&mut self, value: &Value) {
        let Some(fact) = self.decode::<InstanceFact>("instance", value) else {
            return;
        };
        if fact.instance_definition.is_empty() {
            self.out.missing(self.module, "instance", "instance fact has no instanceDefinition");
            return;
        }
        let signature = fact
            .instance_type
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fact.instance_definition.clone());

        self.out.instances.push(InstanceEntity {
            id: format!("{}:{}", self.module, fact.instance_definition),
            module_name: self.module.to_string(),
            normalized_signature: normalize_instance_signature(&signature),
            instance_signature: signature,
            instance_definition: fact.instance_definition,
            src_loc: fact.src_loc,
            line_number_start: fact.line_number_start,
            line_number_end: fact.line_number_end.max(fact.line_number_start),
        });
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    fn import(&mut self, value: &Value) {
        let Some(fact) = self.decode::<ImportFact>("import", value) else {
            return;
        };
        if fact.module_name.is_empty() {
            self.out.missing(self.module, "import", "import fact has no module_name");
            return;
        }
        self.out.imports.push(ImportEntity {
            id: format!("{}->{}@{}", self.module, fact.module_name, fact.line_number_start),
            module_name: self.module.to_string(),
            target_module: fact.module_name,
            package_name: fact.package_name,
            src_loc: fact.src_loc,
            is_boot_source: fact.is_boot_source.unwrap_or(false),
            is_safe: fact.is_safe.unwrap_or(false),
            is_implicit: fact.is_implicit.unwrap_or(false),
            as_module_name: fact.as_module_name,
            qualified_style: fact.qualified_style,
            is_hiding: fact.is_hiding.unwrap_or(false),
            hiding_specs: fact.hiding_specs,
            line_number_start: fact.line_number_start,
            line_number_end: fact.line_number_end,
            path: fact.path,
            visibility: fact.visibility,
        });
    }

    fn constant(&mut self, value: &Value) {
        let Some(fact) = self.decode::<ConstantFact>("constant", value) else {
            return;
        };
        if fact.name.is_empty() {
            self.out.missing(self.module, "constant", "constant fact has no name");
            return;
        }
        let id = fact
            .fully_qualified_path
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("{}::{}", self.module, fact.name));
        self.out.constants.push(ConstantEntity {
            id,
            name: fact.name,
            module_name: self.module.to_string(),
            fully_qualified_path: fact.fully_qualified_path,
            src_code: fact.src_code,
            const_type: fact.const_type,
            is_static: fact.is_static.unwrap_or(false),
            src_location: fact.src_location,
            line_number_start: fact.line_number_start,
            line_number_end: fact.line_number_end,
        });
    }

    // -------------------------------------------------------------------------
    // Contracts
    // -------------------------------------------------------------------------

    fn trait_def(&mut self, value: &Value) {
        let Some(fact) = self.decode::<TraitFact>("trait", value) else {
            return;
        };
        if fact.name.is_empty() {
            self.out.missing(self.module, "trait", "trait fact has no name");
            return;
        }
        let trait_id = fact
            .fully_qualified_path
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("{}::{}", self.module, fact.name));

        for method_value in &fact.methods {
            let Some(method) = self.decode::<TraitMethodFact>("trait_method", method_value) else {
                continue;
            };
            if method.name.is_empty() {
                self.out.missing(self.module, "trait_method", "trait method has no name");
                continue;
            }
            let id = method
                .fully_qualified_path
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| format!("{}::{}", trait_id, method.name));
            self.out.trait_methods.push(TraitMethodSignatureEntity {
                id,
                name: method.name,
                trait_id: trait_id.clone(),
                module_name: self.module.to_string(),
                fully_qualified_path: method.fully_qualified_path,
                src_code: method.src_code,
                line_number_start: method.line_number_start,
                line_number_end: method.line_number_end,
                is_async: method.is_async.unwrap_or(false),
                is_unsafe: method.is_unsafe.unwrap_or(false),
            });
        }

        self.out.traits.push(TraitEntity {
            id: trait_id,
            name: fact.name,
            module_name: self.module.to_string(),
            fully_qualified_path: fact.fully_qualified_path,
            src_location: fact.src_location,
            line_number_start: fact.line_number_start,
            line_number_end: fact.line_number_end,
        });
    }

    fn impl_block(&mut self, value: &Value) {
        let Some(fact) = self.decode::<ImplBlockFact>("impl_block", value) else {
            return;
        };
        if fact.struct_name.is_empty() {
            self.out.missing(self.module, "impl_block", "impl block has no struct_name");
            return;
        }
        let module_path = fact
            .module_path
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| self.module.to_string());
        let trait_name = fact.trait_name.clone().filter(|t| !t.is_empty());
        let id = match &trait_name {
            Some(t) => format!(
                "{}::impl::{}::{}@{}",
                module_path, fact.struct_name, t, fact.line_number_start
            ),
            None => format!(
                "{}::impl::{}@{}",
                module_path, fact.struct_name, fact.line_number_start
            ),
        };

        self.out.impl_blocks.push(ImplBlockEntity {
            id,
            module_name: self.module.to_string(),
            struct_name: fact.struct_name,
            struct_fqp: fact.struct_fqp,
            trait_name,
            trait_fqp: fact.trait_fqp.filter(|t| !t.is_empty()),
            trait_id: None,
            src_location: fact.src_location,
            line_number_start: fact.line_number_start,
            line_number_end: fact.line_number_end.max(fact.line_number_start),
            crate_name: fact.crate_name,
            module_path: fact.module_path,
            method_names: fact.methods,
        });
    }
}

/// Link each function to the instance whose line range encloses its start.
/// The narrowest enclosing instance wins.
fn attach_instance_methods(out: &mut ModuleBuild) {
    if out.instances.is_empty() {
        return;
    }
    for function in &mut out.functions {
        if function.line_number_start == 0 {
            continue;
        }
        let owner = out
            .instances
            .iter()
            .filter(|inst| inst.line_number_start > 0 && inst.encloses(function.line_number_start))
            .min_by_key(|inst| inst.line_number_end - inst.line_number_start);
        if let Some(owner) = owner {
            function.instance_id = Some(owner.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn module(value: Value) -> ModuleFacts {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_functions_and_nested_functions() {
        let facts = module(json!({
            "module_name": "M",
            "functions": [{
                "function_name": "f",
                "function_signature": "Int -> Int",
                "functions_called": [{"module_name": "M", "name": "g"}],
                "where_functions": {
                    "go**src/M.hs:5:3": {
                        "function_name": "go",
                        "functions_called": [{"module_name": "M", "name": "h"}],
                        "where_functions": {"inner": {"name": "inner"}}
                    }
                }
            }]
        }));
        let out = build_module(&facts, true);
        assert_eq!(out.functions.len(), 1);
        assert_eq!(out.functions[0].id, "M:f:Int -> Int");
        assert_eq!(out.nested_functions.len(), 2);

        let go = out.nested_functions.iter().find(|n| n.name == "go").unwrap();
        assert_eq!(go.id, "M:f:Int -> Int.go@src/M.hs:5:3");
        assert_eq!(go.src_loc.as_deref(), Some("src/M.hs:5:3"));
        assert_eq!(go.depth, 1);

        let inner = out.nested_functions.iter().find(|n| n.name == "inner").unwrap();
        assert_eq!(inner.parent_id, go.id);
        assert_eq!(inner.id, "M:f:Int -> Int.go@src/M.hs:5:3.inner");
        assert_eq!(inner.function_id, "M:f:Int -> Int");
        assert_eq!(inner.depth, 2);

        let callers: Vec<&str> = out.call_sites.iter().map(|c| c.caller_id.as_str()).collect();
        assert_eq!(callers, vec!["M:f:Int -> Int", "M:f:Int -> Int.go@src/M.hs:5:3"]);
    }

    #[test]
    fn test_malformed_facts_are_skipped() {
        let facts = module(json!({
            "module_name": "M",
            "functions": [{"function_name": "ok"}, {"line_number_start": 3}, 42],
            "types": [{"raw_code": "data X"}]
        }));
        let out = build_module(&facts, true);
        assert_eq!(out.functions.len(), 1);
        assert_eq!(out.skipped_facts, 3);
        assert!(out.diagnostics.iter().all(|d| d.kind == "parse_fact"));
    }

    #[test]
    fn test_literal_and_incomplete_calls() {
        let facts = module(json!({
            "module_name": "M",
            "functions": [{
                "name": "f",
                "functions_called": [
                    {"name": "fromInteger", "_type": "OverLit"},
                    {"name": "nowhere"},
                    {"module_name": "M", "name": "g"}
                ]
            }]
        }));
        let skipped = build_module(&facts, true);
        assert_eq!(skipped.literal_calls, 1);
        assert_eq!(skipped.incomplete_calls, 1);
        assert_eq!(skipped.call_sites.len(), 1);

        let kept = build_module(&facts, false);
        assert_eq!(kept.call_sites.len(), 2);
        assert_eq!(kept.call_sites[0].callee_module, LITERAL_MODULE);
    }

    #[test]
    fn test_type_constructors_and_fields() {
        let facts = module(json!({
            "module_name": "M",
            "types": [{
                "type_name": "Shape",
                "typeKind": "data",
                "data_constructors_list": [
                    {"dataConNames": "Circle", "fields": {"radius": {"raw_code": "Double", "structure": {"tag": "AtomicType", "contents": {"module_name": "GHC.Types", "type_name": "Double"}}}}},
                    {"dataConNames": "Square", "fields": {}}
                ]
            }, {
                "type_name": "Name",
                "typeKind": "NewType",
                "data_constructors_list": [{"fields": {}}]
            }]
        }));
        let out = build_module(&facts, true);
        assert_eq!(out.types[0].kind, TypeKind::SumType);
        assert_eq!(out.types[1].kind, TypeKind::NewType);
        assert_eq!(out.constructors.len(), 2);
        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.fields[0].id, "M:Shape.Circle.radius");
        assert_eq!(out.fields[0].raw_code, "Double");
    }

    #[test]
    fn test_instance_methods_by_line_range() {
        let facts = module(json!({
            "module_name": "M",
            "instances": [{"instanceDefinition": "instance Show T", "instanceType": "GHC.Show.Show M.T", "line_number_start": 10, "line_number_end": 20}],
            "functions": [
                {"name": "show", "line_number_start": 11, "line_number_end": 12},
                {"name": "other", "line_number_start": 30, "line_number_end": 31}
            ]
        }));
        let out = build_module(&facts, true);
        assert_eq!(out.instances[0].normalized_signature, "Show T");
        let show = out.functions.iter().find(|f| f.name == "show").unwrap();
        assert_eq!(show.instance_id.as_deref(), Some("M:instance Show T"));
        let other = out.functions.iter().find(|f| f.name == "other").unwrap();
        assert!(other.instance_id.is_none());
    }

    #[test]
    fn test_contract_identities() {
        let facts = module(json!({
            "module_name": "shapes",
            "traits": [{"name": "Area", "methods": [{"name": "area"}]}],
            "impl_blocks": [
                {"struct_name": "Circle", "trait_name": "Area", "module_path": "crate::shapes", "line_number_start": 4, "methods": ["area"]},
                {"struct_name": "Circle", "line_number_start": 12}
            ],
            "constants": [{"name": "PI", "fully_qualified_path": "crate::shapes::PI"}]
        }));
        let out = build_module(&facts, true);
        assert_eq!(out.traits[0].id, "shapes::Area");
        assert_eq!(out.trait_methods[0].id, "shapes::Area::area");
        assert_eq!(out.impl_blocks[0].id, "crate::shapes::impl::Circle::Area@4");
        assert_eq!(out.impl_blocks[1].id, "shapes::impl::Circle@12");
        assert_eq!(out.constants[0].id, "crate::shapes::PI");
    }
}
