use std::sync::Arc;

use crate::parse::{parse, ExportKind, ImportKind, ParsedModule};
use crate::Engine;

/// A parsed and validated WASM module (immutable).
///
/// Cloning is cheap; clones share the decoded code.
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) inner: Arc<ParsedModule>,
}

impl Module {
    /// Parse a WAT string into a module.
    pub fn new(engine: &Engine, wat: &str) -> Result<Self, anyhow::Error> {
        let bytes = wat::parse_str(wat)?;
        Self::from_bytes(engine, &bytes)
    }

    /// Create a module from raw WASM bytes.
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, anyhow::Error> {
        let parsed = parse(engine, bytes)?;
        Ok(Module {
            inner: Arc::new(parsed),
        })
    }

    /// Module name from the `name` custom section.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// `(module, name)` of every function import, in index order.
    pub fn func_imports(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner
            .imports
            .iter()
            .filter(|import| matches!(import.kind, ImportKind::Func(_)))
            .map(|import| (import.module.as_str(), import.name.as_str()))
    }

    /// Names of the exported functions.
    pub fn func_exports(&self) -> impl Iterator<Item = &str> {
        self.inner
            .exports
            .iter()
            .filter(|(_, (kind, _))| *kind == ExportKind::Func)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_section_is_read() {
        let engine = Engine::default();
        let module = Module::new(
            &engine,
            r#"(module $demo
                (import "env" "f" (func $f))
                (func $g (export "g")))"#,
        )
        .unwrap();
        assert_eq!(module.name(), Some("demo"));
        assert_eq!(module.func_imports().collect::<Vec<_>>(), vec![("env", "f")]);
        assert_eq!(module.func_exports().collect::<Vec<_>>(), vec!["g"]);
        assert_eq!(module.inner.func_names.get(&1).map(String::as_str), Some("g"));
    }

    #[test]
    fn invalid_module_is_rejected() {
        let engine = Engine::default();
        let err = Module::new(&engine, "(module (func (result i32)))").unwrap_err();
        assert!(err.to_string().contains("type mismatch"), "{err}");
    }
}
