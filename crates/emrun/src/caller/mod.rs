use wasmparser::FuncType;

use crate::instance::InstanceData;
use crate::store::InterruptHandle;
use crate::value::vals_from_bits;
use crate::{interpreter, Func, Store, Trap, Val};

/// Context handed to host functions: the store plus the instance that made
/// the call.
///
/// Everything reachable from here belongs to the calling instance and is
/// borrowed for the duration of one host call.
pub struct Caller<'a, T> {
    pub(crate) store: &'a mut Store<T>,
    pub(crate) instance: &'a mut InstanceData<T>,
    /// Number of active calls below this point.
    pub(crate) depth: u32,
}

impl<'a, T> Caller<'a, T> {
    pub(crate) fn new(store: &'a mut Store<T>, instance: &'a mut InstanceData<T>) -> Self {
        Self {
            store,
            instance,
            depth: 0,
        }
    }

    /// Data of the store the call runs in.
    pub fn data(&self) -> &T {
        self.store.data()
    }

    /// Mutable data of the store the call runs in.
    pub fn data_mut(&mut self) -> &mut T {
        self.store.data_mut()
    }

    /// Linear memory of the calling instance.
    pub fn memory(&self) -> Option<&[u8]> {
        self.instance.memory.as_ref().map(|memory| memory.bytes())
    }

    /// Mutable linear memory of the calling instance.
    pub fn memory_mut(&mut self) -> Option<&mut [u8]> {
        self.instance.memory.as_mut().map(|memory| memory.bytes_mut())
    }

    /// Function stored at `index` of table `table`.
    ///
    /// `None` if the table does not exist, the index is out of bounds or the
    /// slot is empty. The lookup reads the live table, so two calls may
    /// disagree if the guest rewrote the slot in between.
    pub fn table_func(&self, table: u32, index: u32) -> Option<Func> {
        let table = self.instance.tables.get(table as usize)?;
        table.get(index).map(Func)
    }

    /// Type of a function of the calling instance.
    pub fn func_type(&self, func: Func) -> Option<&FuncType> {
        self.instance.func_type(func.0)
    }

    /// Call a function of the calling instance.
    ///
    /// The call nests inside the current one: it shares the depth limit,
    /// fuel and interrupt flag of the store, and listeners see it as a child
    /// of the host function making it. A trap raised by the callee is
    /// returned as is.
    pub fn call(&mut self, func: Func, args: &[Val]) -> Result<Vec<Val>, Trap> {
        let ty = self
            .func_type(func)
            .ok_or(Trap::UndefinedElement {
                table: 0,
                index: func.0,
            })?
            .clone();
        let params_match = args.len() == ty.params().len()
            && args.iter().zip(ty.params()).all(|(arg, param)| arg.ty() == *param);
        if !params_match {
            return Err(Trap::IndirectCallTypeMismatch);
        }

        let raw: Vec<u64> = args.iter().map(|arg| arg.to_bits()).collect();
        let results = interpreter::call_func(self, func.0, &raw)?;
        Ok(vals_from_bits(&results, ty.results()))
    }

    /// Handle that cancels the store's current and future calls.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.store.interrupt_handle()
    }
}
