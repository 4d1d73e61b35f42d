use wasmparser::ValType;

/// Dynamic WASM value for untyped function calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Val {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// Function reference: `Some(func_idx)` or `None` for `ref.null func`.
    FuncRef(Option<u32>),
}

/// Raw bits of a null function reference.
pub(crate) const NULL_REF: u64 = u64::MAX;

impl Val {
    /// Default value for locals of type `ty`.
    pub fn zero_for(ty: &ValType) -> Val {
        match ty {
            ValType::I32 => Val::I32(0),
            ValType::I64 => Val::I64(0),
            ValType::F32 => Val::F32(0.0),
            ValType::F64 => Val::F64(0.0),
            ValType::V128 | ValType::Ref(_) => Val::FuncRef(None),
        }
    }

    /// Pack into a raw call slot.
    ///
    /// 32-bit values are zero-extended, so a slot holding an `i32` never has
    /// its upper half set.
    pub fn to_bits(self) -> u64 {
        match self {
            Val::I32(v) => v as u32 as u64,
            Val::I64(v) => v as u64,
            Val::F32(v) => v.to_bits() as u64,
            Val::F64(v) => v.to_bits(),
            Val::FuncRef(Some(idx)) => idx as u64,
            Val::FuncRef(None) => NULL_REF,
        }
    }

    /// Interpret a raw call slot according to `ty`.
    pub fn from_bits(bits: u64, ty: &ValType) -> Val {
        match ty {
            ValType::I32 => Val::I32(bits as u32 as i32),
            ValType::I64 => Val::I64(bits as i64),
            ValType::F32 => Val::F32(f32::from_bits(bits as u32)),
            ValType::F64 => Val::F64(f64::from_bits(bits)),
            ValType::V128 | ValType::Ref(_) => {
                if bits == NULL_REF {
                    Val::FuncRef(None)
                } else {
                    Val::FuncRef(Some(bits as u32))
                }
            }
        }
    }

    /// The value type this value inhabits.
    pub fn ty(&self) -> ValType {
        match self {
            Val::I32(_) => ValType::I32,
            Val::I64(_) => ValType::I64,
            Val::F32(_) => ValType::F32,
            Val::F64(_) => ValType::F64,
            Val::FuncRef(_) => ValType::FUNCREF,
        }
    }
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Val::I32(v) => write!(f, "{v}"),
            Val::I64(v) => write!(f, "{v}"),
            Val::F32(v) => write!(f, "{v}"),
            Val::F64(v) => write!(f, "{v}"),
            Val::FuncRef(Some(idx)) => write!(f, "funcref({idx})"),
            Val::FuncRef(None) => f.write_str("null"),
        }
    }
}

/// Decode a slice of raw slots against their types.
pub(crate) fn vals_from_bits(raw: &[u64], types: &[ValType]) -> Vec<Val> {
    raw.iter()
        .zip(types)
        .map(|(&bits, ty)| Val::from_bits(bits, ty))
        .collect()
}

/// Convert a single Rust value to/from a `Val`.
pub trait WasmVal: Sized {
    fn to_val(&self) -> Val;
    fn from_val(val: &Val) -> Result<Self, anyhow::Error>;
}

macro_rules! impl_wasm_val {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl WasmVal for $ty {
                fn to_val(&self) -> Val {
                    Val::$variant(*self)
                }
                fn from_val(val: &Val) -> Result<Self, anyhow::Error> {
                    match val {
                        Val::$variant(v) => Ok(*v),
                        _ => anyhow::bail!(
                            concat!("expected ", stringify!($ty), ", got {:?}"),
                            val
                        ),
                    }
                }
            }
        )*
    };
}

impl_wasm_val!(i32 => I32, i64 => I64, f32 => F32, f64 => F64);

/// Convert Rust types into WASM call arguments.
pub trait WasmArgs {
    fn to_vals(&self) -> Vec<Val>;
}

/// Convert WASM results back into Rust types.
pub trait WasmResults: Sized {
    fn from_vals(vals: &[Val]) -> Result<Self, anyhow::Error>;
}

impl WasmArgs for () {
    fn to_vals(&self) -> Vec<Val> {
        vec![]
    }
}

impl WasmResults for () {
    fn from_vals(vals: &[Val]) -> Result<Self, anyhow::Error> {
        anyhow::ensure!(vals.is_empty(), "expected no results, got {}", vals.len());
        Ok(())
    }
}

macro_rules! impl_wasm_tuples {
    ($(($($T:ident),+)),* $(,)?) => {
        $(
            impl<$($T: WasmVal),+> WasmArgs for ($($T,)+) {
                #[allow(non_snake_case)]
                fn to_vals(&self) -> Vec<Val> {
                    let ($($T,)+) = self;
                    vec![$($T.to_val()),+]
                }
            }

            impl<$($T: WasmVal),+> WasmResults for ($($T,)+) {
                #[allow(non_snake_case)]
                fn from_vals(vals: &[Val]) -> Result<Self, anyhow::Error> {
                    impl_wasm_tuples!(@destructure vals, $($T),+)
                }
            }
        )*
    };

    (@destructure $vals:ident, $($T:ident),+) => {{
        let expected = impl_wasm_tuples!(@count $($T),+);
        anyhow::ensure!(
            $vals.len() == expected,
            "expected {} results, got {}",
            expected,
            $vals.len()
        );
        let mut _i = 0;
        Ok(($({
            let v = $T::from_val(&$vals[_i])?;
            _i += 1;
            v
        },)+))
    }};

    (@count $($T:ident),+) => {
        <[()]>::len(&[$(impl_wasm_tuples!(@unit $T)),+])
    };

    (@unit $T:ident) => { () };
}

impl_wasm_tuples!(
    (A),
    (A, B),
    (A, B, C),
    (A, B, C, D),
    (A, B, C, D, E),
    (A, B, C, D, E, F),
    (A, B, C, D, E, F, G),
    (A, B, C, D, E, F, G, H),
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_i32_is_zero_extended() {
        assert_eq!(Val::I32(-1).to_bits(), 0xFFFF_FFFF);
        assert_eq!(Val::from_bits(0xFFFF_FFFF, &ValType::I32), Val::I32(-1));
    }

    #[test]
    fn null_funcref_uses_sentinel() {
        assert_eq!(Val::from_bits(Val::FuncRef(None).to_bits(), &ValType::FUNCREF), Val::FuncRef(None));
        assert_eq!(Val::from_bits(7, &ValType::FUNCREF), Val::FuncRef(Some(7)));
    }

    #[test]
    fn tuple_results_check_arity() {
        let vals = [Val::I32(1), Val::I32(2)];
        assert_eq!(<(i32, i32)>::from_vals(&vals).unwrap(), (1, 2));
        assert!(<(i32,)>::from_vals(&vals).is_err());
        assert!(<(i64, i32)>::from_vals(&vals).is_err());
    }
}
