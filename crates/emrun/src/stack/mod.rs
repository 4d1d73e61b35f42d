/// Operand stack of one function activation.
///
/// Every value occupies one `u64` slot, the same representation used for
/// call arguments and results, so values move between frames without
/// conversion. 32-bit values are stored zero-extended.
///
/// Validation guarantees operand stack balance, so a pop on an empty stack
/// cannot happen for a loaded module. The accessors still return zero
/// rather than panic.
#[derive(Debug, Default)]
pub(crate) struct Stack {
    slots: Vec<u64>,
}

impl Stack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn push(&mut self, bits: u64) {
        self.slots.push(bits);
    }

    pub(crate) fn pop(&mut self) -> u64 {
        self.slots.pop().unwrap_or_default()
    }

    /// Remove and return the top `n` slots in push order.
    pub(crate) fn pop_n(&mut self, n: usize) -> Vec<u64> {
        let at = self.slots.len().saturating_sub(n);
        self.slots.split_off(at)
    }

    pub(crate) fn extend(&mut self, values: impl IntoIterator<Item = u64>) {
        self.slots.extend(values);
    }

    /// Keep the top `arity` slots and drop everything between them and
    /// `height`. Used when a branch leaves a block.
    pub(crate) fn unwind(&mut self, height: usize, arity: usize) {
        let from = self.slots.len().saturating_sub(arity);
        if from > height {
            self.slots.drain(height..from);
        }
    }

    pub(crate) fn push_i32(&mut self, v: i32) {
        self.push(v as u32 as u64);
    }

    pub(crate) fn push_u32(&mut self, v: u32) {
        self.push(v as u64);
    }

    pub(crate) fn push_i64(&mut self, v: i64) {
        self.push(v as u64);
    }

    pub(crate) fn push_u64(&mut self, v: u64) {
        self.push(v);
    }

    pub(crate) fn push_f32(&mut self, v: f32) {
        self.push(v.to_bits() as u64);
    }

    pub(crate) fn push_f64(&mut self, v: f64) {
        self.push(v.to_bits());
    }

    pub(crate) fn push_bool(&mut self, v: bool) {
        self.push(v as u64);
    }

    pub(crate) fn pop_i32(&mut self) -> i32 {
        self.pop() as u32 as i32
    }

    pub(crate) fn pop_u32(&mut self) -> u32 {
        self.pop() as u32
    }

    pub(crate) fn pop_i64(&mut self) -> i64 {
        self.pop() as i64
    }

    pub(crate) fn pop_u64(&mut self) -> u64 {
        self.pop()
    }

    pub(crate) fn pop_f32(&mut self) -> f32 {
        f32::from_bits(self.pop() as u32)
    }

    pub(crate) fn pop_f64(&mut self) -> f64 {
        f64::from_bits(self.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_slots_are_zero_extended() {
        let mut stack = Stack::new();
        stack.push_i32(-1);
        assert_eq!(stack.pop_u64(), 0xFFFF_FFFF);
    }

    #[test]
    fn unwind_keeps_branch_values() {
        let mut stack = Stack::new();
        stack.extend([1, 2, 3, 4, 5]);
        stack.unwind(1, 2);
        assert_eq!(stack.pop_n(3), vec![1, 4, 5]);
        assert_eq!(stack.len(), 0);
    }
}
