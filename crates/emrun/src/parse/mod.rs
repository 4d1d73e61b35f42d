pub(crate) mod body;

use std::collections::HashMap;

use body::ParsedBody;
use wasmparser::{
    ConstExpr, DataKind, ElementItems, ElementKind, ExternalKind, FuncType, FunctionBody,
    KnownCustom, Name, Operator, Parser, Payload, TypeRef, ValType,
};

use crate::Engine;

/// A decoded constant expression instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ConstOp {
    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),
    GlobalGet(u32),
    RefFunc(u32),
    RefNull,
    I32Add,
    I32Sub,
    I32Mul,
    I64Add,
    I64Sub,
    I64Mul,
}

/// What an import provides.
#[derive(Debug, Clone)]
pub(crate) enum ImportKind {
    /// Function import with its type index.
    Func(u32),
    Table,
    Memory,
    Global,
    Other,
}

#[derive(Debug, Clone)]
pub(crate) struct Import {
    pub(crate) module: String,
    pub(crate) name: String,
    pub(crate) kind: ImportKind,
}

#[derive(Debug, Clone)]
pub(crate) struct TableDef {
    pub(crate) min: u64,
    pub(crate) init: Option<Vec<ConstOp>>,
}

#[derive(Debug, Clone)]
pub(crate) struct MemoryDef {
    pub(crate) min: u64,
    pub(crate) max: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct GlobalDef {
    pub(crate) ty: ValType,
    pub(crate) init: Vec<ConstOp>,
}

#[derive(Debug, Clone)]
pub(crate) enum ElemItem {
    Func(u32),
    Expr(Vec<ConstOp>),
}

#[derive(Debug, Clone)]
pub(crate) struct ElemSegment {
    pub(crate) table_idx: u32,
    /// `None` for passive and declared segments.
    pub(crate) offset: Option<Vec<ConstOp>>,
    pub(crate) items: Vec<ElemItem>,
}

#[derive(Debug, Clone)]
pub(crate) struct DataSegment {
    /// `None` for passive segments.
    pub(crate) offset: Option<Vec<ConstOp>>,
    pub(crate) data: Vec<u8>,
}

/// A locally defined function.
#[derive(Debug, Clone)]
pub(crate) struct ParsedFunction {
    /// Params followed by body-declared locals.
    pub(crate) locals: Box<[ValType]>,
    pub(crate) body: ParsedBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

/// Everything decoded from a module binary.
#[derive(Debug, Default)]
pub(crate) struct ParsedModule {
    pub(crate) name: Option<String>,
    pub(crate) types: Vec<FuncType>,
    pub(crate) imports: Vec<Import>,
    /// Type index of every function, imports first.
    pub(crate) func_types: Vec<u32>,
    pub(crate) num_func_imports: u32,
    pub(crate) funcs: Vec<ParsedFunction>,
    pub(crate) tables: Vec<TableDef>,
    pub(crate) memories: Vec<MemoryDef>,
    pub(crate) globals: Vec<GlobalDef>,
    pub(crate) elements: Vec<ElemSegment>,
    pub(crate) data: Vec<DataSegment>,
    pub(crate) exports: HashMap<String, (ExportKind, u32)>,
    pub(crate) start: Option<u32>,
    pub(crate) func_names: HashMap<u32, String>,
}

pub(crate) fn parse(engine: &Engine, bytes: &[u8]) -> Result<ParsedModule, anyhow::Error> {
    let mut validator = engine.new_validator();
    validator.validate_all(bytes)?;

    let mut builder = ModuleBuilder::default();
    let parser = Parser::new(0);
    for payload in parser.parse_all(bytes) {
        builder.process_payload(payload?)?;
    }

    Ok(builder.module)
}

#[derive(Default)]
struct ModuleBuilder {
    module: ParsedModule,
    /// Index of the next code section entry among defined functions.
    next_body: usize,
}

impl ModuleBuilder {
    fn process_payload(&mut self, payload: Payload) -> Result<(), anyhow::Error> {
        let module = &mut self.module;
        match payload {
            Payload::TypeSection(reader) => {
                for ty in reader.into_iter_err_on_gc_types() {
                    module.types.push(ty?);
                }
            }
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import?;
                    let kind = match import.ty {
                        TypeRef::Func(type_idx) => {
                            module.func_types.push(type_idx);
                            module.num_func_imports += 1;
                            ImportKind::Func(type_idx)
                        }
                        TypeRef::Table(_) => ImportKind::Table,
                        TypeRef::Memory(_) => ImportKind::Memory,
                        TypeRef::Global(_) => ImportKind::Global,
                        _ => ImportKind::Other,
                    };
                    module.imports.push(Import {
                        module: import.module.to_string(),
                        name: import.name.to_string(),
                        kind,
                    });
                }
            }
            Payload::FunctionSection(reader) => {
                for type_idx in reader {
                    module.func_types.push(type_idx?);
                }
            }
            Payload::TableSection(reader) => {
                for table in reader {
                    let table = table?;
                    let init = match table.init {
                        wasmparser::TableInit::RefNull => None,
                        wasmparser::TableInit::Expr(expr) => Some(decode_const_expr(&expr)?),
                    };
                    module.tables.push(TableDef {
                        min: table.ty.initial as u64,
                        init,
                    });
                }
            }
            Payload::MemorySection(reader) => {
                for memory in reader {
                    let memory = memory?;
                    module.memories.push(MemoryDef {
                        min: memory.initial,
                        max: memory.maximum,
                    });
                }
            }
            Payload::GlobalSection(reader) => {
                for global in reader {
                    let global = global?;
                    module.globals.push(GlobalDef {
                        ty: global.ty.content_type,
                        init: decode_const_expr(&global.init_expr)?,
                    });
                }
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export?;
                    let kind = match export.kind {
                        ExternalKind::Func => ExportKind::Func,
                        ExternalKind::Table => ExportKind::Table,
                        ExternalKind::Memory => ExportKind::Memory,
                        ExternalKind::Global => ExportKind::Global,
                        _ => continue,
                    };
                    module
                        .exports
                        .insert(export.name.to_string(), (kind, export.index));
                }
            }
            Payload::StartSection { func, .. } => module.start = Some(func),
            Payload::ElementSection(reader) => {
                for elem in reader {
                    let elem = elem?;
                    let (table_idx, offset) = match elem.kind {
                        ElementKind::Active {
                            table_index,
                            offset_expr,
                        } => (
                            table_index.unwrap_or(0),
                            Some(decode_const_expr(&offset_expr)?),
                        ),
                        ElementKind::Passive | ElementKind::Declared => (0, None),
                    };
                    let mut items = Vec::new();
                    match elem.items {
                        ElementItems::Functions(reader) => {
                            for idx in reader {
                                items.push(ElemItem::Func(idx?));
                            }
                        }
                        ElementItems::Expressions(_, reader) => {
                            for expr in reader {
                                items.push(ElemItem::Expr(decode_const_expr(&expr?)?));
                            }
                        }
                    }
                    module.elements.push(ElemSegment {
                        table_idx,
                        offset,
                        items,
                    });
                }
            }
            Payload::DataSection(reader) => {
                for data in reader {
                    let data = data?;
                    let offset = match data.kind {
                        DataKind::Active { offset_expr, .. } => {
                            Some(decode_const_expr(&offset_expr)?)
                        }
                        DataKind::Passive => None,
                    };
                    module.data.push(DataSegment {
                        offset,
                        data: data.data.to_vec(),
                    });
                }
            }
            Payload::CodeSectionEntry(body) => self.parse_body(body)?,
            Payload::CustomSection(reader) => {
                if let KnownCustom::Name(names) = reader.as_known() {
                    // Debug names are best effort; a malformed name section
                    // must not make an otherwise valid module unloadable.
                    for name in names.into_iter().flatten() {
                        match name {
                            Name::Module { name, .. } => module.name = Some(name.to_string()),
                            Name::Function(map) => {
                                for naming in map.into_iter().flatten() {
                                    module
                                        .func_names
                                        .insert(naming.index, naming.name.to_string());
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_body(&mut self, body: FunctionBody) -> Result<(), anyhow::Error> {
        let module = &mut self.module;
        let func_idx = module.num_func_imports as usize + self.next_body;
        self.next_body += 1;

        let type_idx = *module
            .func_types
            .get(func_idx)
            .ok_or_else(|| anyhow::anyhow!("code entry {func_idx} has no declared type"))?;
        let func_type = module
            .types
            .get(type_idx as usize)
            .ok_or_else(|| anyhow::anyhow!("type index {type_idx} out of bounds"))?;

        // locals = params ++ body-declared locals
        let mut locals: Vec<ValType> = func_type.params().to_vec();
        for local in body.get_locals_reader()? {
            let (count, val_type) = local?;
            locals.extend(std::iter::repeat(val_type).take(count as usize));
        }

        let parsed = ParsedBody::parse(&body, func_type, &module.types)?;
        module.funcs.push(ParsedFunction {
            locals: locals.into(),
            body: parsed,
        });
        Ok(())
    }
}

/// Decode a constant expression (offsets, global initialisers, element items).
fn decode_const_expr(expr: &ConstExpr) -> Result<Vec<ConstOp>, anyhow::Error> {
    let mut ops = Vec::new();
    for op in expr.get_operators_reader() {
        let op = match op? {
            Operator::I32Const { value } => ConstOp::I32Const(value),
            Operator::I64Const { value } => ConstOp::I64Const(value),
            Operator::F32Const { value } => ConstOp::F32Const(value.bits()),
            Operator::F64Const { value } => ConstOp::F64Const(value.bits()),
            Operator::GlobalGet { global_index } => ConstOp::GlobalGet(global_index),
            Operator::RefFunc { function_index } => ConstOp::RefFunc(function_index),
            Operator::RefNull { .. } => ConstOp::RefNull,
            Operator::I32Add => ConstOp::I32Add,
            Operator::I32Sub => ConstOp::I32Sub,
            Operator::I32Mul => ConstOp::I32Mul,
            Operator::I64Add => ConstOp::I64Add,
            Operator::I64Sub => ConstOp::I64Sub,
            Operator::I64Mul => ConstOp::I64Mul,
            Operator::End => break,
            other => anyhow::bail!("unsupported constant expression operator: {other:?}"),
        };
        ops.push(op);
    }
    Ok(ops)
}
