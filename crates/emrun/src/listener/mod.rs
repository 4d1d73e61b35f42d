//! Call notifications.
//!
//! A [`FunctionListener`] installed on a [`Store`](crate::Store) sees every
//! function call the interpreter makes, guest or host, in strict call order.
//! Nesting is implied by the bracket: every `before` is matched by exactly
//! one `after` or `abort`, and calls made in between are children of it.

mod logging;

pub use logging::{LogBuffer, LogScope, LoggingListener};

use wasmparser::FuncType;

use crate::{Trap, Val};

/// Static description of a callable function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    module_name: String,
    name: String,
    param_names: Vec<String>,
    ty: FuncType,
    is_host: bool,
}

impl FunctionDefinition {
    pub(crate) fn guest(module_name: &str, name: String, ty: FuncType) -> Self {
        Self {
            module_name: module_name.to_string(),
            name,
            param_names: Vec::new(),
            ty,
            is_host: false,
        }
    }

    pub(crate) fn host(module_name: &str, name: &str, ty: FuncType, param_names: Vec<String>) -> Self {
        Self {
            module_name: module_name.to_string(),
            name: name.to_string(),
            param_names,
            ty,
            is_host: true,
        }
    }

    /// Module the function belongs to. Empty for a guest module without a
    /// debug name.
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Function name, without the module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter names, if the definer supplied them. Empty otherwise.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Signature of the function.
    pub fn ty(&self) -> &FuncType {
        &self.ty
    }

    /// Whether the function is implemented by the embedder.
    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// `module.name`, e.g. `env.invoke_i` or `.v_i32`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module_name, self.name)
    }
}

/// Receives call entry and exit events.
pub trait FunctionListener: Send + Sync {
    /// Called before the function body runs.
    fn before(&self, def: &FunctionDefinition, params: &[Val]);

    /// Called after the function returned normally.
    fn after(&self, def: &FunctionDefinition, results: &[Val]);

    /// Called instead of [`after`](Self::after) when the call trapped.
    fn abort(&self, def: &FunctionDefinition, trap: &Trap) {
        let _ = (def, trap);
    }
}
