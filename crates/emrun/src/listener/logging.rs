use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{FunctionDefinition, FunctionListener};
use crate::{Trap, Val};

/// Which calls a [`LoggingListener`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogScope {
    #[default]
    All,
    /// Only host functions. Guest calls neither print nor indent.
    Host,
}

impl LogScope {
    fn includes(self, def: &FunctionDefinition) -> bool {
        match self {
            LogScope::All => true,
            LogScope::Host => def.is_host(),
        }
    }
}

/// Writes calls as an indented tree, one tab per nesting level:
///
/// ```text
/// --> .call_v_i32(0)
/// 	==> env.invoke_i(index=0)
/// 		--> .v_i32()
/// 		<-- 42
/// 	<== 42
/// <-- 42
/// ```
///
/// Guest functions use `-->`/`<--`, host functions `==>`/`<==`. Host
/// parameters are printed as `name=value` when the host function named them.
pub struct LoggingListener<W> {
    scope: LogScope,
    state: Mutex<State<W>>,
}

struct State<W> {
    writer: W,
    depth: usize,
}

impl<W: Write + Send> LoggingListener<W> {
    /// Log calls within `scope` to `writer`.
    pub fn new(writer: W, scope: LogScope) -> Self {
        Self {
            scope,
            state: Mutex::new(State { writer, depth: 0 }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<W>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> FunctionListener for LoggingListener<W> {
    fn before(&self, def: &FunctionDefinition, params: &[Val]) {
        if !self.scope.includes(def) {
            return;
        }
        let arrow = if def.is_host() { "==>" } else { "-->" };
        let params = params
            .iter()
            .enumerate()
            .map(|(i, val)| match def.param_names().get(i) {
                Some(name) => format!("{name}={val}"),
                None => val.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",");

        let mut state = self.state();
        let line = format!(
            "{}{arrow} {}({params})\n",
            indent(state.depth),
            def.qualified_name()
        );
        // Tracing output is best effort.
        let _ = state.writer.write_all(line.as_bytes());
        state.depth += 1;
    }

    fn after(&self, def: &FunctionDefinition, results: &[Val]) {
        if !self.scope.includes(def) {
            return;
        }
        let arrow = if def.is_host() { "<==" } else { "<--" };
        let results = results
            .iter()
            .map(Val::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let mut state = self.state();
        state.depth = state.depth.saturating_sub(1);
        let line = if results.is_empty() {
            format!("{}{arrow}\n", indent(state.depth))
        } else {
            format!("{}{arrow} {results}\n", indent(state.depth))
        };
        let _ = state.writer.write_all(line.as_bytes());
    }

    fn abort(&self, def: &FunctionDefinition, trap: &Trap) {
        if !self.scope.includes(def) {
            return;
        }
        let arrow = if def.is_host() { "<==" } else { "<--" };
        let mut state = self.state();
        state.depth = state.depth.saturating_sub(1);
        let line = format!("{}{arrow} error: {trap}\n", indent(state.depth));
        let _ = state.writer.write_all(line.as_bytes());
    }
}

fn indent(depth: usize) -> String {
    "\t".repeat(depth)
}

/// Cloneable in-memory sink, handy for capturing a [`LoggingListener`]
/// that is owned by a store.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Discard everything written so far.
    pub fn clear(&self) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use wasmparser::{FuncType, ValType};

    use super::*;

    fn ty(params: &[ValType], results: &[ValType]) -> FuncType {
        FuncType::new(params.iter().copied(), results.iter().copied())
    }

    fn host_def() -> FunctionDefinition {
        FunctionDefinition::host(
            "env",
            "invoke_ii",
            ty(&[ValType::I32, ValType::I32], &[ValType::I32]),
            vec!["index".into(), "a1".into()],
        )
    }

    fn guest_def(name: &str, ty: FuncType) -> FunctionDefinition {
        FunctionDefinition::guest("", name.to_string(), ty)
    }

    #[test]
    fn nested_calls_are_indented() {
        let log = LogBuffer::new();
        let listener = LoggingListener::new(log.clone(), LogScope::All);
        let outer = guest_def("call", ty(&[ValType::I32, ValType::I32], &[ValType::I32]));
        let inner = guest_def("i32_i32", ty(&[ValType::I32], &[ValType::I32]));

        listener.before(&outer, &[Val::I32(2), Val::I32(42)]);
        listener.before(&host_def(), &[Val::I32(2), Val::I32(42)]);
        listener.before(&inner, &[Val::I32(42)]);
        listener.after(&inner, &[Val::I32(42)]);
        listener.after(&host_def(), &[Val::I32(42)]);
        listener.after(&outer, &[Val::I32(42)]);

        assert_eq!(
            log.contents(),
            "--> .call(2,42)\n\
             \t==> env.invoke_ii(index=2,a1=42)\n\
             \t\t--> .i32_i32(42)\n\
             \t\t<-- 42\n\
             \t<== 42\n\
             <-- 42\n"
        );
    }

    #[test]
    fn host_scope_skips_guest_frames() {
        let log = LogBuffer::new();
        let listener = LoggingListener::new(log.clone(), LogScope::Host);
        let guest = guest_def("grow", ty(&[], &[]));

        listener.before(&guest, &[]);
        listener.before(&host_def(), &[Val::I32(0), Val::I32(1)]);
        listener.abort(&host_def(), &Trap::Unreachable);
        listener.abort(&guest, &Trap::Unreachable);

        assert_eq!(
            log.contents(),
            "==> env.invoke_ii(index=0,a1=1)\n<== error: unreachable executed\n"
        );
    }

    #[test]
    fn no_results_prints_bare_arrow() {
        let log = LogBuffer::new();
        let listener = LoggingListener::new(log.clone(), LogScope::All);
        let def = guest_def("v_v", ty(&[], &[]));
        listener.before(&def, &[]);
        listener.after(&def, &[]);
        assert_eq!(log.contents(), "--> .v_v()\n<--\n");
    }
}
