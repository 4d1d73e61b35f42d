//! Host function registry and instantiation.
//!
//! The [`Linker`] collects host functions keyed by `(module, name)` and
//! resolves a module's function imports against them when instantiating.

use std::collections::HashMap;
use std::sync::Arc;

use crate::instance::{eval_const_expr, funcref_from_bits, InstanceData, Memory, Table};
use crate::listener::FunctionDefinition;
use crate::parse::{ElemItem, ExportKind, ImportKind, ParsedModule};
use crate::{Engine, HostFunc, Instance, Module, Store};

/// A named import registry.
pub struct Linker<T> {
    funcs: HashMap<(String, String), Arc<HostFunc<T>>>,
}

impl<T> Linker<T> {
    /// Empty linker for modules compiled by `engine`.
    pub fn new(_engine: &Engine) -> Self {
        Linker {
            funcs: HashMap::new(),
        }
    }

    /// Register a host function under its own module and name.
    ///
    /// Fails if that name is already taken.
    pub fn define(&mut self, func: HostFunc<T>) -> Result<&mut Self, anyhow::Error> {
        let def = func.definition();
        let key = (def.module_name().to_string(), def.name().to_string());
        anyhow::ensure!(
            !self.funcs.contains_key(&key),
            "{}.{} is already defined",
            key.0,
            key.1
        );
        tracing::trace!(module = %key.0, name = %key.1, "defining host function");
        self.funcs.insert(key, Arc::new(func));
        Ok(self)
    }

    /// Check whether a name is already registered.
    pub fn contains(&self, module: &str, name: &str) -> bool {
        self.funcs
            .contains_key(&(module.to_string(), name.to_string()))
    }

    /// Resolve a module's imports and instantiate it.
    ///
    /// Every import must be a function defined in this linker with exactly
    /// the imported type. After linking, memory, globals and tables are
    /// allocated, active segments are copied in and the start function runs.
    pub fn instantiate(
        &self,
        store: &mut Store<T>,
        module: &Module,
    ) -> Result<Instance<T>, anyhow::Error> {
        let parsed = &module.inner;
        let host_funcs = self.resolve_imports(parsed)?;
        let defs = function_definitions(parsed, &host_funcs);

        let memory = match parsed.memories.first() {
            Some(def) => Some(Memory::new(def.min, def.max)?),
            None => None,
        };

        let mut globals = Vec::with_capacity(parsed.globals.len());
        for global in &parsed.globals {
            let value = eval_const_expr(&global.init, &globals)?;
            globals.push(value);
        }

        let mut tables = Vec::with_capacity(parsed.tables.len());
        for def in &parsed.tables {
            let init = match &def.init {
                Some(expr) => funcref_from_bits(eval_const_expr(expr, &globals)?),
                None => None,
            };
            tables.push(Table::new(def.min, init));
        }

        let mut data = InstanceData {
            module: Arc::clone(parsed),
            memory,
            globals,
            tables,
            host_funcs,
            defs,
        };
        init_segments(parsed, &mut data)?;

        tracing::debug!(
            module = parsed.name.as_deref().unwrap_or(""),
            imports = parsed.num_func_imports,
            functions = parsed.func_types.len(),
            "instantiated module"
        );

        let mut instance = Instance { data };
        if let Some(start) = parsed.start {
            instance.invoke(store, start, &[])?;
        }
        Ok(instance)
    }

    fn resolve_imports(&self, module: &ParsedModule) -> Result<Vec<Arc<HostFunc<T>>>, anyhow::Error> {
        let mut resolved = Vec::with_capacity(module.num_func_imports as usize);
        for import in &module.imports {
            let ImportKind::Func(type_idx) = import.kind else {
                anyhow::bail!(
                    "import {}.{} is not a function; only function imports are supported",
                    import.module,
                    import.name
                );
            };
            let Some(func) = self
                .funcs
                .get(&(import.module.clone(), import.name.clone()))
            else {
                anyhow::bail!("import {}.{} was not found", import.module, import.name);
            };
            let expected = module
                .types
                .get(type_idx as usize)
                .ok_or_else(|| anyhow::anyhow!("type index {type_idx} out of bounds"))?;
            anyhow::ensure!(
                func.ty() == expected,
                "import {}.{} has type {:?}, but the host function has type {:?}",
                import.module,
                import.name,
                expected,
                func.ty()
            );
            resolved.push(Arc::clone(func));
        }
        Ok(resolved)
    }
}

/// Listener descriptions for every function, imports first.
///
/// Guest functions are named after the `name` section, else their first
/// export, else their index.
fn function_definitions<T>(
    module: &ParsedModule,
    host_funcs: &[Arc<HostFunc<T>>],
) -> Vec<Arc<FunctionDefinition>> {
    let mut export_names: HashMap<u32, &str> = HashMap::new();
    for (name, &(kind, idx)) in &module.exports {
        if kind == ExportKind::Func {
            export_names
                .entry(idx)
                .and_modify(|existing| {
                    if name.as_str() < *existing {
                        *existing = name.as_str();
                    }
                })
                .or_insert(name.as_str());
        }
    }

    let module_name = module.name.as_deref().unwrap_or("");
    let mut defs: Vec<Arc<FunctionDefinition>> =
        host_funcs.iter().map(|func| Arc::clone(&func.def)).collect();
    for (func_idx, &type_idx) in module
        .func_types
        .iter()
        .enumerate()
        .skip(module.num_func_imports as usize)
    {
        let func_idx = func_idx as u32;
        let name = module
            .func_names
            .get(&func_idx)
            .cloned()
            .or_else(|| export_names.get(&func_idx).map(|name| name.to_string()))
            .unwrap_or_else(|| format!("${func_idx}"));
        let ty = module.types[type_idx as usize].clone();
        defs.push(Arc::new(FunctionDefinition::guest(module_name, name, ty)));
    }
    defs
}

/// Copy active element and data segments into their table and memory.
fn init_segments<T>(module: &ParsedModule, data: &mut InstanceData<T>) -> Result<(), anyhow::Error> {
    for segment in &module.elements {
        let Some(offset) = &segment.offset else {
            continue;
        };
        let offset = eval_const_expr(offset, &data.globals)? as u32;
        let mut items = Vec::with_capacity(segment.items.len());
        for item in &segment.items {
            items.push(match item {
                ElemItem::Func(idx) => Some(*idx),
                ElemItem::Expr(expr) => funcref_from_bits(eval_const_expr(expr, &data.globals)?),
            });
        }
        let table = data
            .tables
            .get_mut(segment.table_idx as usize)
            .ok_or_else(|| anyhow::anyhow!("unknown table {}", segment.table_idx))?;
        table.init(offset, &items)?;
    }

    for segment in &module.data {
        let Some(offset) = &segment.offset else {
            continue;
        };
        let offset = eval_const_expr(offset, &data.globals)? as u32 as usize;
        let memory = data
            .memory
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("data segment without memory"))?;
        let dest = offset
            .checked_add(segment.data.len())
            .and_then(|end| memory.bytes_mut().get_mut(offset..end))
            .ok_or_else(|| anyhow::anyhow!("out of bounds memory access"))?;
        dest.copy_from_slice(&segment.data);
    }
    Ok(())
}
