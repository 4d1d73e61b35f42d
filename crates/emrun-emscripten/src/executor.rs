use emrun::{Caller, Val};

use crate::catalog::Signature;
use crate::fault::Fault;

/// Table the trampolines resolve indices against.
pub(crate) const FUNCTION_TABLE: u32 = 0;

/// Call the function at `index` of the caller's function table.
///
/// The slot is read when the call is made. The callee runs exactly once and
/// its trap, if any, is returned untouched inside [`Fault::Callee`].
pub(crate) fn invoke<T>(
    caller: &mut Caller<'_, T>,
    index: u32,
    args: &[Val],
    sig: &Signature,
) -> Result<Vec<Val>, Fault> {
    let func = caller
        .table_func(FUNCTION_TABLE, index)
        .ok_or(Fault::InvalidTableIndex { index })?;
    let expected = sig.callee_type();
    match caller.func_type(func) {
        Some(actual) if *actual == expected => {}
        Some(actual) => {
            return Err(Fault::SignatureMismatch {
                index,
                expected,
                actual: actual.clone(),
            })
        }
        None => return Err(Fault::InvalidTableIndex { index }),
    }
    caller.call(func, args).map_err(Fault::Callee)
}
