use std::sync::Arc;

use wasmparser::FuncType;

use crate::listener::FunctionDefinition;
use crate::{Caller, Trap};

/// A function of the calling instance, by function index.
///
/// Handles are only meaningful for the instance that produced them and only
/// for as long as the producing call lasts; they are not stored anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Func(pub(crate) u32);

impl Func {
    /// Index in the instance's function index space (imports first).
    pub fn index(self) -> u32 {
        self.0
    }
}

type HostFn<T> =
    dyn Fn(&mut Caller<'_, T>, &[u64]) -> Result<Vec<u64>, Trap> + Send + Sync + 'static;

/// A function implemented by the embedder.
///
/// The closure receives one `u64` slot per parameter, encoded the way
/// [`Val::to_bits`](crate::Val::to_bits) does, and returns one slot per
/// result.
pub struct HostFunc<T> {
    pub(crate) def: Arc<FunctionDefinition>,
    pub(crate) func: Box<HostFn<T>>,
}

impl<T> HostFunc<T> {
    /// Host function without parameter names.
    pub fn new<F>(module: &str, name: &str, ty: FuncType, func: F) -> Self
    where
        F: Fn(&mut Caller<'_, T>, &[u64]) -> Result<Vec<u64>, Trap> + Send + Sync + 'static,
    {
        Self::with_param_names(module, name, ty, Vec::new(), func)
    }

    /// Like [`new`](Self::new), with parameter names shown to listeners.
    pub fn with_param_names<F>(
        module: &str,
        name: &str,
        ty: FuncType,
        param_names: Vec<String>,
        func: F,
    ) -> Self
    where
        F: Fn(&mut Caller<'_, T>, &[u64]) -> Result<Vec<u64>, Trap> + Send + Sync + 'static,
    {
        Self {
            def: Arc::new(FunctionDefinition::host(module, name, ty, param_names)),
            func: Box::new(func),
        }
    }

    /// Name and signature shown to listeners.
    pub fn definition(&self) -> &FunctionDefinition {
        &self.def
    }

    /// Signature of the function.
    pub fn ty(&self) -> &FuncType {
        self.def.ty()
    }
}

/// A host function returned a different number of results than its type
/// declares.
#[derive(Debug, thiserror::Error)]
#[error("host function {name} returned {actual} results, expected {expected}")]
pub struct ResultCountMismatch {
    pub name: String,
    pub expected: usize,
    pub actual: usize,
}
