use emrun::{Caller, HostFunc, Trap};

use crate::catalog::Signature;
use crate::fault::Fault;
use crate::{codec, executor, MODULE_NAME};

/// Build the host function for one `invoke_*` signature.
pub(crate) fn trampoline<T: 'static>(sig: Signature) -> HostFunc<T> {
    let name = sig.name().to_string();
    HostFunc::with_param_names(
        MODULE_NAME,
        &name,
        sig.import_type(),
        sig.param_names(),
        move |caller, slots| {
            dispatch(caller, slots, &sig).map_err(|fault| {
                if !matches!(fault, Fault::Callee(_)) {
                    tracing::warn!(trampoline = sig.name(), %fault, "dynamic call failed");
                }
                Trap::from(fault)
            })
        },
    )
}

fn dispatch<T>(caller: &mut Caller<'_, T>, slots: &[u64], sig: &Signature) -> Result<Vec<u64>, Fault> {
    let (index, args) = codec::decode(slots, sig)?;
    tracing::trace!(trampoline = sig.name(), index, "dynamic call");
    let results = executor::invoke(caller, index, &args, sig)?;
    codec::encode(&results, sig)
}
