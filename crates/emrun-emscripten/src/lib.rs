//! Emscripten `env` host functions for `emrun`.
//!
//! Emscripten lowers calls through function pointers that may unwind into
//! imports named `invoke_<sig>`, which receive the table index followed by
//! the arguments. This crate provides those trampolines plus the
//! `emscripten_notify_memory_growth` hook.
//!
//! ```ignore
//! let mut linker = Linker::new(&engine);
//! emrun_emscripten::instantiate(&mut linker)?;
//! let instance = linker.instantiate(&mut store, &module)?;
//! ```

mod catalog;
mod codec;
mod executor;
mod fault;
mod memory;
mod trampoline;

use anyhow::bail;
use emrun::Linker;

pub use catalog::{catalog, CatalogError, Signature, INVOKE_NAMES, INVOKE_PREFIX, MAX_PARAMS};
pub use codec::ValueKind;
pub use fault::Fault;

/// Host module the Emscripten ABI imports from.
pub const MODULE_NAME: &str = "env";

/// Hook Emscripten calls after growing linear memory.
pub const FUNCTION_NOTIFY_MEMORY_GROWTH: &str = "emscripten_notify_memory_growth";

/// Define the `env` trampolines and the memory growth hook in `linker`.
///
/// Fails without defining anything if one of the names is already taken,
/// so calling it twice on the same linker is an error.
pub fn instantiate<T: 'static>(linker: &mut Linker<T>) -> anyhow::Result<()> {
    let signatures = catalog()?;
    let names = signatures
        .iter()
        .map(Signature::name)
        .chain([FUNCTION_NOTIFY_MEMORY_GROWTH]);
    for name in names {
        if linker.contains(MODULE_NAME, name) {
            bail!("{MODULE_NAME}.{name} is already defined");
        }
    }

    linker.define(memory::notify_memory_growth())?;
    let count = signatures.len();
    for sig in signatures {
        linker.define(trampoline::trampoline(sig))?;
    }
    tracing::debug!(module = MODULE_NAME, trampolines = count, "defined emscripten host functions");
    Ok(())
}
