//! Execution failures.
//!
//! A [`Trap`] aborts the current call chain and unwinds to whoever made the
//! outermost call. Host functions return traps too, so a failure raised deep
//! inside a nested host → guest → host chain reaches the embedder with its
//! original kind intact.

/// Boxed error carried by [`Trap::Host`].
pub type HostError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Trap reasons that can occur during execution.
#[derive(Debug, thiserror::Error)]
pub enum Trap {
    #[error("unreachable executed")]
    Unreachable,
    #[error("call stack exhausted")]
    CallStackExhausted,
    #[error("out of fuel")]
    OutOfFuel,
    #[error("execution interrupted")]
    Interrupted,
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    /// Table index outside the table bounds.
    #[error("undefined element {index} in table {table}")]
    UndefinedElement { table: u32, index: u32 },
    /// Table slot exists but holds no function.
    #[error("uninitialized element {index} in table {table}")]
    UninitializedElement { table: u32, index: u32 },
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    /// Failure raised by a host function.
    #[error("host function failed: {0}")]
    Host(#[source] HostError),
}

impl Trap {
    /// Wrap an arbitrary error raised by a host function.
    pub fn host<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Trap::Host(Box::new(err))
    }

    /// The host error, if this trap was raised by a host function.
    pub fn host_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Trap::Host(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
