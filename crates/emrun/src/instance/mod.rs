use std::sync::Arc;

use wasmparser::FuncType;

use crate::listener::FunctionDefinition;
use crate::parse::{ConstOp, ExportKind, ParsedModule};
use crate::value::{vals_from_bits, Val, WasmArgs, WasmResults, NULL_REF};
use crate::{interpreter, Caller, HostFunc, Module, Store};

/// Size of a wasm page in bytes.
pub const PAGE_SIZE: usize = 65_536;

/// Page limit of a 32-bit linear memory.
const MAX_PAGES: u64 = 65_536;

/// A live module instance.
pub struct Instance<T> {
    pub(crate) data: InstanceData<T>,
}

/// Mutable state owned by one instance.
pub(crate) struct InstanceData<T> {
    pub(crate) module: Arc<ParsedModule>,
    pub(crate) memory: Option<Memory>,
    pub(crate) globals: Vec<u64>,
    pub(crate) tables: Vec<Table>,
    /// Resolved function imports, by function index.
    pub(crate) host_funcs: Vec<Arc<HostFunc<T>>>,
    /// Listener-facing description of every function, by function index.
    pub(crate) defs: Vec<Arc<FunctionDefinition>>,
}

impl<T> InstanceData<T> {
    pub(crate) fn func_type(&self, func_idx: u32) -> Option<&FuncType> {
        let type_idx = *self.module.func_types.get(func_idx as usize)?;
        self.module.types.get(type_idx as usize)
    }
}

/// Linear memory.
#[derive(Debug)]
pub(crate) struct Memory {
    bytes: Vec<u8>,
    max_pages: u64,
}

impl Memory {
    pub(crate) fn new(min: u64, max: Option<u64>) -> Result<Self, anyhow::Error> {
        let max_pages = max.unwrap_or(MAX_PAGES).min(MAX_PAGES);
        anyhow::ensure!(min <= max_pages, "memory minimum of {min} pages exceeds limit");
        Ok(Self {
            bytes: vec![0; min as usize * PAGE_SIZE],
            max_pages,
        })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub(crate) fn pages(&self) -> u32 {
        (self.bytes.len() / PAGE_SIZE) as u32
    }

    /// Grow by `delta` pages, returning the previous size in pages, or
    /// `None` if the limit would be exceeded or the host is out of memory.
    pub(crate) fn grow(&mut self, delta: u32) -> Option<u32> {
        let old = self.pages();
        let new = old as u64 + delta as u64;
        if new > self.max_pages {
            return None;
        }
        let new_len = usize::try_from(new).ok()?.checked_mul(PAGE_SIZE)?;
        self.bytes.try_reserve_exact(new_len - self.bytes.len()).ok()?;
        self.bytes.resize(new_len, 0);
        Some(old)
    }
}

/// A function table. Slots hold function indices of the owning instance.
#[derive(Debug)]
pub(crate) struct Table {
    elements: Vec<Option<u32>>,
}

impl Table {
    pub(crate) fn new(size: u64, init: Option<u32>) -> Self {
        Self {
            elements: vec![init; size as usize],
        }
    }

    /// Function at `index`; `None` for both out of bounds and empty slots.
    pub(crate) fn get(&self, index: u32) -> Option<u32> {
        self.elements.get(index as usize).copied().flatten()
    }

    /// Raw slot lookup: outer `None` means out of bounds.
    pub(crate) fn slot(&self, index: u32) -> Option<Option<u32>> {
        self.elements.get(index as usize).copied()
    }

    pub(crate) fn init(&mut self, offset: u32, items: &[Option<u32>]) -> Result<(), anyhow::Error> {
        let start = offset as usize;
        let end = start
            .checked_add(items.len())
            .filter(|&end| end <= self.elements.len())
            .ok_or_else(|| anyhow::anyhow!("out of bounds table access"))?;
        self.elements[start..end].copy_from_slice(items);
        Ok(())
    }
}

impl<T> Instance<T> {
    /// Call an exported function by name (typed API).
    pub fn call<A: WasmArgs, R: WasmResults>(
        &mut self,
        store: &mut Store<T>,
        name: &str,
        args: A,
    ) -> Result<R, anyhow::Error> {
        let vals = self.call_dynamic(store, name, &args.to_vals())?;
        R::from_vals(&vals)
    }

    /// Call an exported function by name (dynamic API).
    pub fn call_dynamic(
        &mut self,
        store: &mut Store<T>,
        name: &str,
        args: &[Val],
    ) -> Result<Vec<Val>, anyhow::Error> {
        let func_idx = self.resolve_export_func_idx(name)?;
        let ty = self
            .data
            .func_type(func_idx)
            .ok_or_else(|| anyhow::anyhow!("export {name} has no type"))?
            .clone();
        anyhow::ensure!(
            args.len() == ty.params().len(),
            "{name} expects {} arguments, got {}",
            ty.params().len(),
            args.len()
        );
        for (i, (arg, param)) in args.iter().zip(ty.params()).enumerate() {
            anyhow::ensure!(
                arg.ty() == *param,
                "argument {i} of {name}: expected {param:?}, got {:?}",
                arg.ty()
            );
        }

        let raw: Vec<u64> = args.iter().map(|arg| arg.to_bits()).collect();
        let results = self.invoke(store, func_idx, &raw)?;
        Ok(vals_from_bits(&results, ty.results()))
    }

    /// Call an exported function by name with raw call slots, one `u64` per
    /// value. Arguments are not type checked beyond their count.
    pub fn call_raw(
        &mut self,
        store: &mut Store<T>,
        name: &str,
        args: &[u64],
    ) -> Result<Vec<u64>, anyhow::Error> {
        let func_idx = self.resolve_export_func_idx(name)?;
        let expected = self
            .data
            .func_type(func_idx)
            .map_or(0, |ty| ty.params().len());
        anyhow::ensure!(
            args.len() == expected,
            "{name} expects {expected} arguments, got {}",
            args.len()
        );
        self.invoke(store, func_idx, args)
    }

    /// Get an exported global's value by name.
    pub fn get_global(&self, name: &str) -> Option<Val> {
        let &(kind, idx) = self.data.module.exports.get(name)?;
        if kind != ExportKind::Global {
            return None;
        }
        let global = self.data.module.globals.get(idx as usize)?;
        let bits = *self.data.globals.get(idx as usize)?;
        Some(Val::from_bits(bits, &global.ty))
    }

    /// Linear memory, if the module defines one.
    pub fn memory(&self) -> Option<&[u8]> {
        self.data.memory.as_ref().map(Memory::bytes)
    }

    /// Mutable linear memory, if the module defines one.
    pub fn memory_mut(&mut self) -> Option<&mut [u8]> {
        self.data.memory.as_mut().map(Memory::bytes_mut)
    }

    /// The module this instance was created from.
    pub fn module(&self) -> Module {
        Module {
            inner: Arc::clone(&self.data.module),
        }
    }

    pub(crate) fn invoke(
        &mut self,
        store: &mut Store<T>,
        func_idx: u32,
        args: &[u64],
    ) -> Result<Vec<u64>, anyhow::Error> {
        let mut caller = Caller::new(store, &mut self.data);
        Ok(interpreter::call_func(&mut caller, func_idx, args)?)
    }

    fn resolve_export_func_idx(&self, name: &str) -> Result<u32, anyhow::Error> {
        match self.data.module.exports.get(name) {
            Some(&(ExportKind::Func, idx)) => Ok(idx),
            Some(_) => anyhow::bail!("export {name} is not a function"),
            None => anyhow::bail!("export {name} not found"),
        }
    }
}

/// Evaluate a constant expression against the globals initialised so far.
pub(crate) fn eval_const_expr(ops: &[ConstOp], globals: &[u64]) -> Result<u64, anyhow::Error> {
    let mut stack: Vec<u64> = Vec::with_capacity(2);

    macro_rules! const_binop {
        ($ty:ty, $method:ident) => {{
            let b = stack.pop().unwrap_or_default() as $ty;
            let a = stack.pop().unwrap_or_default() as $ty;
            stack.push(a.$method(b) as u64);
        }};
    }

    for op in ops {
        match *op {
            ConstOp::I32Const(v) => stack.push(v as u32 as u64),
            ConstOp::I64Const(v) => stack.push(v as u64),
            ConstOp::F32Const(bits) => stack.push(bits as u64),
            ConstOp::F64Const(bits) => stack.push(bits),
            ConstOp::GlobalGet(idx) => {
                let value = globals
                    .get(idx as usize)
                    .ok_or_else(|| anyhow::anyhow!("global {idx} is not initialised yet"))?;
                stack.push(*value);
            }
            ConstOp::RefFunc(idx) => stack.push(idx as u64),
            ConstOp::RefNull => stack.push(NULL_REF),
            ConstOp::I32Add => const_binop!(u32, wrapping_add),
            ConstOp::I32Sub => const_binop!(u32, wrapping_sub),
            ConstOp::I32Mul => const_binop!(u32, wrapping_mul),
            ConstOp::I64Add => const_binop!(u64, wrapping_add),
            ConstOp::I64Sub => const_binop!(u64, wrapping_sub),
            ConstOp::I64Mul => const_binop!(u64, wrapping_mul),
        }
    }
    stack
        .pop()
        .ok_or_else(|| anyhow::anyhow!("empty constant expression"))
}

/// Decode a funcref produced by a constant expression.
pub(crate) fn funcref_from_bits(bits: u64) -> Option<u32> {
    (bits != NULL_REF).then_some(bits as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_expr_reads_earlier_globals() {
        let ops = [ConstOp::GlobalGet(0), ConstOp::I32Const(-2), ConstOp::I32Add];
        assert_eq!(eval_const_expr(&ops, &[10]).unwrap(), 8);
        assert!(eval_const_expr(&[ConstOp::GlobalGet(1)], &[10]).is_err());
    }

    #[test]
    fn memory_grow_respects_maximum() {
        let mut memory = Memory::new(1, Some(2)).unwrap();
        assert_eq!(memory.grow(1), Some(1));
        assert_eq!(memory.grow(1), None);
        assert_eq!(memory.pages(), 2);
        assert_eq!(memory.bytes().len(), 2 * PAGE_SIZE);
    }

    #[test]
    fn memory_grow_reports_failed_allocation() {
        // 2^48 bytes is past any user address space.
        let mut memory = Memory {
            bytes: vec![0; PAGE_SIZE],
            max_pages: u64::MAX,
        };
        assert_eq!(memory.grow(u32::MAX), None);
        assert_eq!(memory.pages(), 1);
    }

    #[test]
    fn table_distinguishes_empty_from_out_of_bounds() {
        let mut table = Table::new(3, None);
        table.init(1, &[Some(7)]).unwrap();
        assert_eq!(table.slot(0), Some(None));
        assert_eq!(table.slot(1), Some(Some(7)));
        assert_eq!(table.slot(3), None);
        assert!(table.init(2, &[Some(1), Some(2)]).is_err());
    }
}
