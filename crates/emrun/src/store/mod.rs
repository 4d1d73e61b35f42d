use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::listener::FunctionListener;
use crate::{Engine, Trap};

/// Runtime state shared by every call made through it.
pub struct Store<T> {
    data: T,
    pub(crate) listener: Option<Arc<dyn FunctionListener>>,
    fuel: Option<u64>,
    interrupt: InterruptHandle,
    pub(crate) max_call_depth: u32,
}

impl<T> Store<T> {
    /// Store holding `data`, without fuel or listener.
    pub fn new(engine: &Engine, data: T) -> Self {
        Self {
            data,
            listener: None,
            fuel: None,
            interrupt: InterruptHandle::default(),
            max_call_depth: engine.max_call_depth(),
        }
    }

    /// Embedder data.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Mutable embedder data.
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Install a listener notified of every call.
    pub fn set_listener(&mut self, listener: Arc<dyn FunctionListener>) {
        self.listener = Some(listener);
    }

    /// Stop reporting calls.
    pub fn clear_listener(&mut self) {
        self.listener = None;
    }

    /// Limit execution to `fuel` more instructions. Exhaustion traps with
    /// [`Trap::OutOfFuel`].
    pub fn set_fuel(&mut self, fuel: u64) {
        self.fuel = Some(fuel);
    }

    /// Remaining fuel, or `None` when metering is off.
    pub fn fuel(&self) -> Option<u64> {
        self.fuel
    }

    /// Handle that cancels execution in this store from any thread.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    #[inline]
    pub(crate) fn consume_fuel(&mut self, amount: u64) -> Result<(), Trap> {
        if let Some(fuel) = &mut self.fuel {
            *fuel = fuel.checked_sub(amount).ok_or(Trap::OutOfFuel)?;
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn check_interrupt(&self) -> Result<(), Trap> {
        if self.interrupt.is_interrupted() {
            return Err(Trap::Interrupted);
        }
        Ok(())
    }
}

/// Cancellation flag for a [`Store`].
///
/// Once set, the next function entry or loop back-edge traps with
/// [`Trap::Interrupted`]. The flag stays set until [`reset`](Self::reset).
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    /// Make running and future calls trap with `Trap::Interrupted`.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Allow calls to run again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    /// Whether an interrupt is pending.
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuel_runs_out() {
        let mut store = Store::new(&Engine::default(), ());
        store.set_fuel(2);
        assert!(store.consume_fuel(2).is_ok());
        assert!(matches!(store.consume_fuel(1), Err(Trap::OutOfFuel)));
    }

    #[test]
    fn unmetered_store_never_runs_out() {
        let mut store = Store::new(&Engine::default(), ());
        assert!(store.consume_fuel(u64::MAX).is_ok());
        assert_eq!(store.fuel(), None);
    }

    #[test]
    fn interrupt_is_shared_with_clones() {
        let store = Store::new(&Engine::default(), ());
        let handle = store.interrupt_handle();
        handle.clone().interrupt();
        assert!(matches!(store.check_interrupt(), Err(Trap::Interrupted)));
        handle.reset();
        assert!(store.check_interrupt().is_ok());
    }
}
