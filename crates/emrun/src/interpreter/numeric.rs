use crate::parse::body::NumOp;
use crate::stack::Stack;
use crate::Trap;

macro_rules! unop {
    ($s:ident, $pop:ident, $push:ident, |$a:ident| $e:expr) => {{
        let $a = $s.$pop();
        $s.$push($e);
    }};
}

macro_rules! binop {
    ($s:ident, $pop:ident, $push:ident, |$a:ident, $b:ident| $e:expr) => {{
        let $b = $s.$pop();
        let $a = $s.$pop();
        $s.$push($e);
    }};
}

/// Execute a stack-only numeric instruction.
pub(super) fn eval(op: NumOp, s: &mut Stack) -> Result<(), Trap> {
    use NumOp::*;
    match op {
        I32Eqz => unop!(s, pop_i32, push_bool, |a| a == 0),
        I32Eq => binop!(s, pop_i32, push_bool, |a, b| a == b),
        I32Ne => binop!(s, pop_i32, push_bool, |a, b| a != b),
        I32LtS => binop!(s, pop_i32, push_bool, |a, b| a < b),
        I32LtU => binop!(s, pop_u32, push_bool, |a, b| a < b),
        I32GtS => binop!(s, pop_i32, push_bool, |a, b| a > b),
        I32GtU => binop!(s, pop_u32, push_bool, |a, b| a > b),
        I32LeS => binop!(s, pop_i32, push_bool, |a, b| a <= b),
        I32LeU => binop!(s, pop_u32, push_bool, |a, b| a <= b),
        I32GeS => binop!(s, pop_i32, push_bool, |a, b| a >= b),
        I32GeU => binop!(s, pop_u32, push_bool, |a, b| a >= b),

        I64Eqz => unop!(s, pop_i64, push_bool, |a| a == 0),
        I64Eq => binop!(s, pop_i64, push_bool, |a, b| a == b),
        I64Ne => binop!(s, pop_i64, push_bool, |a, b| a != b),
        I64LtS => binop!(s, pop_i64, push_bool, |a, b| a < b),
        I64LtU => binop!(s, pop_u64, push_bool, |a, b| a < b),
        I64GtS => binop!(s, pop_i64, push_bool, |a, b| a > b),
        I64GtU => binop!(s, pop_u64, push_bool, |a, b| a > b),
        I64LeS => binop!(s, pop_i64, push_bool, |a, b| a <= b),
        I64LeU => binop!(s, pop_u64, push_bool, |a, b| a <= b),
        I64GeS => binop!(s, pop_i64, push_bool, |a, b| a >= b),
        I64GeU => binop!(s, pop_u64, push_bool, |a, b| a >= b),

        F32Eq => binop!(s, pop_f32, push_bool, |a, b| a == b),
        F32Ne => binop!(s, pop_f32, push_bool, |a, b| a != b),
        F32Lt => binop!(s, pop_f32, push_bool, |a, b| a < b),
        F32Gt => binop!(s, pop_f32, push_bool, |a, b| a > b),
        F32Le => binop!(s, pop_f32, push_bool, |a, b| a <= b),
        F32Ge => binop!(s, pop_f32, push_bool, |a, b| a >= b),
        F64Eq => binop!(s, pop_f64, push_bool, |a, b| a == b),
        F64Ne => binop!(s, pop_f64, push_bool, |a, b| a != b),
        F64Lt => binop!(s, pop_f64, push_bool, |a, b| a < b),
        F64Gt => binop!(s, pop_f64, push_bool, |a, b| a > b),
        F64Le => binop!(s, pop_f64, push_bool, |a, b| a <= b),
        F64Ge => binop!(s, pop_f64, push_bool, |a, b| a >= b),

        I32Clz => unop!(s, pop_u32, push_u32, |a| a.leading_zeros()),
        I32Ctz => unop!(s, pop_u32, push_u32, |a| a.trailing_zeros()),
        I32Popcnt => unop!(s, pop_u32, push_u32, |a| a.count_ones()),
        I32Add => binop!(s, pop_i32, push_i32, |a, b| a.wrapping_add(b)),
        I32Sub => binop!(s, pop_i32, push_i32, |a, b| a.wrapping_sub(b)),
        I32Mul => binop!(s, pop_i32, push_i32, |a, b| a.wrapping_mul(b)),
        I32DivS => binop!(s, pop_i32, push_i32, |a, b| {
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            a.checked_div(b).ok_or(Trap::IntegerOverflow)?
        }),
        I32DivU => binop!(s, pop_u32, push_u32, |a, b| {
            a.checked_div(b).ok_or(Trap::IntegerDivideByZero)?
        }),
        I32RemS => binop!(s, pop_i32, push_i32, |a, b| {
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            a.wrapping_rem(b)
        }),
        I32RemU => binop!(s, pop_u32, push_u32, |a, b| {
            a.checked_rem(b).ok_or(Trap::IntegerDivideByZero)?
        }),
        I32And => binop!(s, pop_u32, push_u32, |a, b| a & b),
        I32Or => binop!(s, pop_u32, push_u32, |a, b| a | b),
        I32Xor => binop!(s, pop_u32, push_u32, |a, b| a ^ b),
        I32Shl => binop!(s, pop_u32, push_u32, |a, b| a.wrapping_shl(b)),
        I32ShrS => binop!(s, pop_i32, push_i32, |a, b| a.wrapping_shr(b as u32)),
        I32ShrU => binop!(s, pop_u32, push_u32, |a, b| a.wrapping_shr(b)),
        I32Rotl => binop!(s, pop_u32, push_u32, |a, b| a.rotate_left(b & 31)),
        I32Rotr => binop!(s, pop_u32, push_u32, |a, b| a.rotate_right(b & 31)),

        I64Clz => unop!(s, pop_u64, push_u64, |a| a.leading_zeros() as u64),
        I64Ctz => unop!(s, pop_u64, push_u64, |a| a.trailing_zeros() as u64),
        I64Popcnt => unop!(s, pop_u64, push_u64, |a| a.count_ones() as u64),
        I64Add => binop!(s, pop_i64, push_i64, |a, b| a.wrapping_add(b)),
        I64Sub => binop!(s, pop_i64, push_i64, |a, b| a.wrapping_sub(b)),
        I64Mul => binop!(s, pop_i64, push_i64, |a, b| a.wrapping_mul(b)),
        I64DivS => binop!(s, pop_i64, push_i64, |a, b| {
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            a.checked_div(b).ok_or(Trap::IntegerOverflow)?
        }),
        I64DivU => binop!(s, pop_u64, push_u64, |a, b| {
            a.checked_div(b).ok_or(Trap::IntegerDivideByZero)?
        }),
        I64RemS => binop!(s, pop_i64, push_i64, |a, b| {
            if b == 0 {
                return Err(Trap::IntegerDivideByZero);
            }
            a.wrapping_rem(b)
        }),
        I64RemU => binop!(s, pop_u64, push_u64, |a, b| {
            a.checked_rem(b).ok_or(Trap::IntegerDivideByZero)?
        }),
        I64And => binop!(s, pop_u64, push_u64, |a, b| a & b),
        I64Or => binop!(s, pop_u64, push_u64, |a, b| a | b),
        I64Xor => binop!(s, pop_u64, push_u64, |a, b| a ^ b),
        I64Shl => binop!(s, pop_u64, push_u64, |a, b| a.wrapping_shl(b as u32)),
        I64ShrS => binop!(s, pop_i64, push_i64, |a, b| a.wrapping_shr(b as u32)),
        I64ShrU => binop!(s, pop_u64, push_u64, |a, b| a.wrapping_shr(b as u32)),
        I64Rotl => binop!(s, pop_u64, push_u64, |a, b| a.rotate_left((b & 63) as u32)),
        I64Rotr => binop!(s, pop_u64, push_u64, |a, b| a.rotate_right((b & 63) as u32)),

        F32Abs => unop!(s, pop_f32, push_f32, |a| a.abs()),
        F32Neg => unop!(s, pop_f32, push_f32, |a| -a),
        F32Ceil => unop!(s, pop_f32, push_f32, |a| a.ceil()),
        F32Floor => unop!(s, pop_f32, push_f32, |a| a.floor()),
        F32Trunc => unop!(s, pop_f32, push_f32, |a| a.trunc()),
        F32Nearest => unop!(s, pop_f32, push_f32, |a| a.round_ties_even()),
        F32Sqrt => unop!(s, pop_f32, push_f32, |a| a.sqrt()),
        F32Add => binop!(s, pop_f32, push_f32, |a, b| a + b),
        F32Sub => binop!(s, pop_f32, push_f32, |a, b| a - b),
        F32Mul => binop!(s, pop_f32, push_f32, |a, b| a * b),
        F32Div => binop!(s, pop_f32, push_f32, |a, b| a / b),
        F32Min => binop!(s, pop_f32, push_f32, |a, b| f32_min(a, b)),
        F32Max => binop!(s, pop_f32, push_f32, |a, b| f32_max(a, b)),
        F32Copysign => binop!(s, pop_f32, push_f32, |a, b| a.copysign(b)),

        F64Abs => unop!(s, pop_f64, push_f64, |a| a.abs()),
        F64Neg => unop!(s, pop_f64, push_f64, |a| -a),
        F64Ceil => unop!(s, pop_f64, push_f64, |a| a.ceil()),
        F64Floor => unop!(s, pop_f64, push_f64, |a| a.floor()),
        F64Trunc => unop!(s, pop_f64, push_f64, |a| a.trunc()),
        F64Nearest => unop!(s, pop_f64, push_f64, |a| a.round_ties_even()),
        F64Sqrt => unop!(s, pop_f64, push_f64, |a| a.sqrt()),
        F64Add => binop!(s, pop_f64, push_f64, |a, b| a + b),
        F64Sub => binop!(s, pop_f64, push_f64, |a, b| a - b),
        F64Mul => binop!(s, pop_f64, push_f64, |a, b| a * b),
        F64Div => binop!(s, pop_f64, push_f64, |a, b| a / b),
        F64Min => binop!(s, pop_f64, push_f64, |a, b| f64_min(a, b)),
        F64Max => binop!(s, pop_f64, push_f64, |a, b| f64_max(a, b)),
        F64Copysign => binop!(s, pop_f64, push_f64, |a, b| a.copysign(b)),

        I32WrapI64 => unop!(s, pop_i64, push_i32, |a| a as i32),
        I64ExtendI32S => unop!(s, pop_i32, push_i64, |a| a as i64),
        I64ExtendI32U => unop!(s, pop_u32, push_u64, |a| a as u64),

        I32TruncF32S => unop!(s, pop_f32, push_i32, |a| trunc(a as f64, I32_S)? as i32),
        I32TruncF32U => unop!(s, pop_f32, push_u32, |a| trunc(a as f64, I32_U)? as u32),
        I32TruncF64S => unop!(s, pop_f64, push_i32, |a| trunc(a, I32_S)? as i32),
        I32TruncF64U => unop!(s, pop_f64, push_u32, |a| trunc(a, I32_U)? as u32),
        I64TruncF32S => unop!(s, pop_f32, push_i64, |a| trunc(a as f64, I64_S)? as i64),
        I64TruncF32U => unop!(s, pop_f32, push_u64, |a| trunc(a as f64, I64_U)? as u64),
        I64TruncF64S => unop!(s, pop_f64, push_i64, |a| trunc(a, I64_S)? as i64),
        I64TruncF64U => unop!(s, pop_f64, push_u64, |a| trunc(a, I64_U)? as u64),

        // `as` from float to int saturates and maps NaN to zero.
        I32TruncSatF32S => unop!(s, pop_f32, push_i32, |a| a as i32),
        I32TruncSatF32U => unop!(s, pop_f32, push_u32, |a| a as u32),
        I32TruncSatF64S => unop!(s, pop_f64, push_i32, |a| a as i32),
        I32TruncSatF64U => unop!(s, pop_f64, push_u32, |a| a as u32),
        I64TruncSatF32S => unop!(s, pop_f32, push_i64, |a| a as i64),
        I64TruncSatF32U => unop!(s, pop_f32, push_u64, |a| a as u64),
        I64TruncSatF64S => unop!(s, pop_f64, push_i64, |a| a as i64),
        I64TruncSatF64U => unop!(s, pop_f64, push_u64, |a| a as u64),

        F32ConvertI32S => unop!(s, pop_i32, push_f32, |a| a as f32),
        F32ConvertI32U => unop!(s, pop_u32, push_f32, |a| a as f32),
        F32ConvertI64S => unop!(s, pop_i64, push_f32, |a| a as f32),
        F32ConvertI64U => unop!(s, pop_u64, push_f32, |a| a as f32),
        F32DemoteF64 => unop!(s, pop_f64, push_f32, |a| a as f32),
        F64ConvertI32S => unop!(s, pop_i32, push_f64, |a| a as f64),
        F64ConvertI32U => unop!(s, pop_u32, push_f64, |a| a as f64),
        F64ConvertI64S => unop!(s, pop_i64, push_f64, |a| a as f64),
        F64ConvertI64U => unop!(s, pop_u64, push_f64, |a| a as f64),
        F64PromoteF32 => unop!(s, pop_f32, push_f64, |a| a as f64),

        // Slots already hold raw bits.
        I32ReinterpretF32 | I64ReinterpretF64 | F32ReinterpretI32 | F64ReinterpretI64 => {}

        I32Extend8S => unop!(s, pop_i32, push_i32, |a| a as i8 as i32),
        I32Extend16S => unop!(s, pop_i32, push_i32, |a| a as i16 as i32),
        I64Extend8S => unop!(s, pop_i64, push_i64, |a| a as i8 as i64),
        I64Extend16S => unop!(s, pop_i64, push_i64, |a| a as i16 as i64),
        I64Extend32S => unop!(s, pop_i64, push_i64, |a| a as i32 as i64),
    }
    Ok(())
}

/// Exclusive bounds of the float values that truncate into a target type.
type Range = (f64, f64);

const I32_S: Range = (-2_147_483_649.0, 2_147_483_648.0);
const I32_U: Range = (-1.0, 4_294_967_296.0);
const I64_S: Range = (-9_223_372_036_854_777_856.0, 9_223_372_036_854_775_808.0);
const I64_U: Range = (-1.0, 18_446_744_073_709_551_616.0);

/// Trapping float-to-int truncation. `f32` inputs are widened first, which
/// is exact.
fn trunc(value: f64, (lo, hi): Range) -> Result<f64, Trap> {
    if value.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    if value <= lo || value >= hi {
        return Err(Trap::IntegerOverflow);
    }
    Ok(value.trunc())
}

macro_rules! float_min_max {
    ($min:ident, $max:ident, $ty:ty) => {
        /// `min` propagating NaN and ordering `-0` below `+0`.
        fn $min(a: $ty, b: $ty) -> $ty {
            if a.is_nan() || b.is_nan() {
                <$ty>::NAN
            } else if a == b {
                if a.is_sign_negative() { a } else { b }
            } else {
                a.min(b)
            }
        }

        fn $max(a: $ty, b: $ty) -> $ty {
            if a.is_nan() || b.is_nan() {
                <$ty>::NAN
            } else if a == b {
                if a.is_sign_positive() { a } else { b }
            } else {
                a.max(b)
            }
        }
    };
}

float_min_max!(f32_min, f32_max, f32);
float_min_max!(f64_min, f64_max, f64);
