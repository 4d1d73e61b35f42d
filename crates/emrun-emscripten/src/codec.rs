//! Conversion between raw call slots and typed values.

use emrun::{Val, ValType};

use crate::catalog::Signature;
use crate::fault::Fault;

/// Value kinds a trampoline signature can name, with their name codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    I32,
    I64,
    F32,
    F64,
}

impl ValueKind {
    /// Character naming this kind in a trampoline name.
    pub fn code(self) -> char {
        match self {
            ValueKind::I32 => 'i',
            ValueKind::I64 => 'j',
            ValueKind::F32 => 'f',
            ValueKind::F64 => 'd',
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'i' => Some(ValueKind::I32),
            'j' => Some(ValueKind::I64),
            'f' => Some(ValueKind::F32),
            'd' => Some(ValueKind::F64),
            _ => None,
        }
    }

    /// Wasm value type carried by slots of this kind.
    pub fn val_type(self) -> ValType {
        match self {
            ValueKind::I32 => ValType::I32,
            ValueKind::I64 => ValType::I64,
            ValueKind::F32 => ValType::F32,
            ValueKind::F64 => ValType::F64,
        }
    }
}

/// Split the slots of a trampoline call into the table index and the
/// arguments to forward.
///
/// Every slot carrying an `i32`, the index included, contributes only its
/// low 32 bits, as wasm defines the value. The index is then read unsigned,
/// so a negative index names a slot past any real table. Other kinds are
/// decoded bit-for-bit.
pub(crate) fn decode(slots: &[u64], sig: &Signature) -> Result<(u32, Vec<Val>), Fault> {
    let expected = 1 + sig.param_count();
    let Some((&index, args)) = slots.split_first().filter(|_| slots.len() == expected) else {
        return Err(Fault::SlotCount {
            expected,
            actual: slots.len(),
        });
    };
    let index = index as u32;
    let args = args
        .iter()
        .zip(sig.params())
        .map(|(&bits, kind)| Val::from_bits(bits, &kind.val_type()))
        .collect();
    Ok((index, args))
}

/// Encode the callee's results as trampoline result slots.
pub(crate) fn encode(results: &[Val], sig: &Signature) -> Result<Vec<u64>, Fault> {
    let expected = usize::from(sig.has_return());
    if results.len() != expected {
        return Err(Fault::SlotCount {
            expected,
            actual: results.len(),
        });
    }
    Ok(results.iter().map(|val| val.to_bits()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in [ValueKind::I32, ValueKind::I64, ValueKind::F32, ValueKind::F64] {
            assert_eq!(ValueKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ValueKind::from_code('v'), None);
    }

    #[test]
    fn decode_splits_index_and_arguments() {
        let sig = Signature::parse("invoke_vii").unwrap();
        let (index, args) = decode(&[14, 1, u32::MAX as u64], &sig).unwrap();
        assert_eq!(index, 14);
        assert_eq!(args, vec![Val::I32(1), Val::I32(-1)]);
    }

    #[test]
    fn decode_keeps_float_bits() {
        let sig = Signature::parse("invoke_vdf").unwrap();
        let (_, args) = decode(&[0, 1.5f64.to_bits(), (-0.0f32).to_bits() as u64], &sig).unwrap();
        assert_eq!(args[0], Val::F64(1.5));
        match args[1] {
            Val::F32(v) => assert!(v == 0.0 && v.is_sign_negative()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_checks_slot_count() {
        let sig = Signature::parse("invoke_ii").unwrap();
        assert!(matches!(
            decode(&[0], &sig),
            Err(Fault::SlotCount {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            decode(&[], &sig),
            Err(Fault::SlotCount {
                expected: 2,
                actual: 0
            })
        ));
    }

    #[test]
    fn index_and_i32_arguments_use_low_bits() {
        let sig = Signature::parse("invoke_vi").unwrap();
        let (index, args) = decode(&[(1 << 32) | 5, (7 << 32) | 9], &sig).unwrap();
        assert_eq!(index, 5);
        assert_eq!(args, vec![Val::I32(9)]);

        let (index, _) = decode(&[u64::MAX, 0], &sig).unwrap();
        assert_eq!(index, u32::MAX);
    }

    #[test]
    fn encode_matches_return_arity() {
        let with = Signature::parse("invoke_i").unwrap();
        let without = Signature::parse("invoke_v").unwrap();
        assert_eq!(encode(&[Val::I32(-1)], &with).unwrap(), vec![u32::MAX as u64]);
        assert!(encode(&[], &without).unwrap().is_empty());
        assert!(matches!(
            encode(&[], &with),
            Err(Fault::SlotCount {
                expected: 1,
                actual: 0
            })
        ));
    }
}
