use emrun::{FuncType, Trap};

/// Failure of a trampoline call.
///
/// Everything except [`Fault::Callee`] is raised by the trampoline itself
/// and reaches the embedder as [`Trap::Host`]. A callee trap is handed back
/// unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    /// Table index names no function: out of bounds or an empty slot.
    #[error("invalid table index {index}")]
    InvalidTableIndex { index: u32 },
    #[error("function at table index {index} has type {actual:?}, expected {expected:?}")]
    SignatureMismatch {
        index: u32,
        expected: FuncType,
        actual: FuncType,
    },
    #[error(transparent)]
    Callee(Trap),
    /// Slot count disagrees with the trampoline signature.
    #[error("expected {expected} slots, got {actual}")]
    SlotCount { expected: usize, actual: usize },
}

impl Fault {
    /// Find the fault behind an error returned by a guest call.
    pub fn from_error(err: &anyhow::Error) -> Option<&Fault> {
        if let Some(fault) = err.downcast_ref::<Fault>() {
            return Some(fault);
        }
        err.downcast_ref::<Trap>()?
            .host_error()?
            .downcast_ref::<Fault>()
    }
}

impl From<Fault> for Trap {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Callee(trap) => trap,
            fault => Trap::host(fault),
        }
    }
}
