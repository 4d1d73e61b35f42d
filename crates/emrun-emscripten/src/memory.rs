use emrun::{FuncType, HostFunc, ValType};

use crate::{FUNCTION_NOTIFY_MEMORY_GROWTH, MODULE_NAME};

const NO_RESULTS: [ValType; 0] = [];

/// `env.emscripten_notify_memory_growth(memory_index: i32)`.
///
/// Emscripten calls this after `memory.grow`. The engine reads memory through
/// the instance on every access, so there is no cached view to refresh.
pub(crate) fn notify_memory_growth<T: 'static>() -> HostFunc<T> {
    HostFunc::with_param_names(
        MODULE_NAME,
        FUNCTION_NOTIFY_MEMORY_GROWTH,
        FuncType::new([ValType::I32], NO_RESULTS),
        vec!["memory_index".to_string()],
        |_caller, args| {
            tracing::trace!(memory_index = ?args.first(), "memory grew");
            Ok(Vec::new())
        },
    )
}
