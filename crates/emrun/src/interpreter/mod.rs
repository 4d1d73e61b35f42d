//! Function dispatch.
//!
//! Every call the engine makes goes through [`call_func`]: exports called by
//! the embedder, `call` and `call_indirect` from guest code, and calls made
//! by host functions through their [`Caller`]. Depth, cancellation, fuel and
//! listener events are therefore handled in one place.

mod exec;
mod numeric;

use std::sync::Arc;

use crate::func::ResultCountMismatch;
use crate::value::vals_from_bits;
use crate::{Caller, Trap};

/// Native stack that must remain before a call runs on the current segment.
const STACK_RED_ZONE: usize = 256 * 1024;

/// Size of each extra native stack segment.
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

pub(crate) fn call_func<T>(
    caller: &mut Caller<'_, T>,
    func_idx: u32,
    args: &[u64],
) -> Result<Vec<u64>, Trap> {
    caller.store.check_interrupt()?;
    if caller.depth >= caller.store.max_call_depth {
        return Err(Trap::CallStackExhausted);
    }
    caller.store.consume_fuel(1)?;

    let listener = caller.store.listener.clone();
    let def = match &listener {
        Some(_) => caller.instance.defs.get(func_idx as usize).cloned(),
        None => None,
    };
    if let (Some(listener), Some(def)) = (&listener, &def) {
        listener.before(def, &vals_from_bits(args, def.ty().params()));
    }

    caller.depth += 1;
    // Each wasm call nests a native frame. Switch to a fresh segment near the
    // end of the current stack so only the depth limit bounds nesting.
    let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
        dispatch(caller, func_idx, args)
    });
    caller.depth -= 1;

    if let (Some(listener), Some(def)) = (&listener, &def) {
        match &result {
            Ok(results) => listener.after(def, &vals_from_bits(results, def.ty().results())),
            Err(trap) => listener.abort(def, trap),
        }
    }
    result
}

fn dispatch<T>(caller: &mut Caller<'_, T>, func_idx: u32, args: &[u64]) -> Result<Vec<u64>, Trap> {
    let module = Arc::clone(&caller.instance.module);

    if func_idx < module.num_func_imports {
        let host = Arc::clone(&caller.instance.host_funcs[func_idx as usize]);
        let results = (host.func)(caller, args)?;
        let expected = host.ty().results().len();
        if results.len() != expected {
            return Err(Trap::host(ResultCountMismatch {
                name: host.definition().qualified_name(),
                expected,
                actual: results.len(),
            }));
        }
        return Ok(results);
    }

    let func = &module.funcs[(func_idx - module.num_func_imports) as usize];
    exec::execute(caller, &module, func, args)
}
