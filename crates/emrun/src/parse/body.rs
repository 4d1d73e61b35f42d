use wasmparser::{BlockType, FuncType, FunctionBody, Operator};

#[cfg(test)]
mod tests;

/// A parsed function body, pre-decoded from raw wasm bytes.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParsedBody {
    /// One entry per instruction.
    pub(crate) ops: Vec<Op>,

    /// Block metadata, indexed by block index. Index 0 is the function.
    pub(crate) blocks: Vec<Block>,

    /// Out-of-line `br_table` data: (targets, default), indexed by `Op::BrTable`.
    pub(crate) br_tables: Vec<(Box<[u32]>, u32)>,
}

/// A decoded instruction. Control instructions refer to [`Block`] entries
/// by index so branch targets are resolved once at parse time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Op {
    Unreachable,
    Nop,
    Block(u32),
    Loop(u32),
    If(u32),
    Else(u32),
    End(u32),
    Br(u32),
    BrIf(u32),
    BrTable(u32),
    Return,
    Call(u32),
    CallIndirect { type_idx: u32, table_idx: u32 },
    Drop,
    Select,

    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),

    Load(Load, u64),
    Store(Store, u64),
    MemorySize,
    MemoryGrow,

    I32Const(i32),
    I64Const(i64),
    F32Const(u32),
    F64Const(u64),

    Num(NumOp),
}

/// Memory load flavour: width, signedness and result type.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Load {
    I32,
    I64,
    F32,
    F64,
    I32_8S,
    I32_8U,
    I32_16S,
    I32_16U,
    I64_8S,
    I64_8U,
    I64_16S,
    I64_16U,
    I64_32S,
    I64_32U,
}

/// Memory store flavour: number of low bytes written.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Store {
    I32,
    I64,
    F32,
    F64,
    I32_8,
    I32_16,
    I64_8,
    I64_16,
    I64_32,
}

/// Stack-only numeric instructions (no immediates).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NumOp {
    I32Eqz, I32Eq, I32Ne, I32LtS, I32LtU, I32GtS, I32GtU, I32LeS, I32LeU, I32GeS, I32GeU,
    I64Eqz, I64Eq, I64Ne, I64LtS, I64LtU, I64GtS, I64GtU, I64LeS, I64LeU, I64GeS, I64GeU,
    F32Eq, F32Ne, F32Lt, F32Gt, F32Le, F32Ge,
    F64Eq, F64Ne, F64Lt, F64Gt, F64Le, F64Ge,

    I32Clz, I32Ctz, I32Popcnt, I32Add, I32Sub, I32Mul, I32DivS, I32DivU, I32RemS, I32RemU,
    I32And, I32Or, I32Xor, I32Shl, I32ShrS, I32ShrU, I32Rotl, I32Rotr,
    I64Clz, I64Ctz, I64Popcnt, I64Add, I64Sub, I64Mul, I64DivS, I64DivU, I64RemS, I64RemU,
    I64And, I64Or, I64Xor, I64Shl, I64ShrS, I64ShrU, I64Rotl, I64Rotr,

    F32Abs, F32Neg, F32Ceil, F32Floor, F32Trunc, F32Nearest, F32Sqrt,
    F32Add, F32Sub, F32Mul, F32Div, F32Min, F32Max, F32Copysign,
    F64Abs, F64Neg, F64Ceil, F64Floor, F64Trunc, F64Nearest, F64Sqrt,
    F64Add, F64Sub, F64Mul, F64Div, F64Min, F64Max, F64Copysign,

    I32WrapI64, I64ExtendI32S, I64ExtendI32U,
    I32TruncF32S, I32TruncF32U, I32TruncF64S, I32TruncF64U,
    I64TruncF32S, I64TruncF32U, I64TruncF64S, I64TruncF64U,
    I32TruncSatF32S, I32TruncSatF32U, I32TruncSatF64S, I32TruncSatF64U,
    I64TruncSatF32S, I64TruncSatF32U, I64TruncSatF64S, I64TruncSatF64U,
    F32ConvertI32S, F32ConvertI32U, F32ConvertI64S, F32ConvertI64U, F32DemoteF64,
    F64ConvertI32S, F64ConvertI32U, F64ConvertI64S, F64ConvertI64U, F64PromoteF32,
    I32ReinterpretF32, I64ReinterpretF64, F32ReinterpretI32, F64ReinterpretI64,
    I32Extend8S, I32Extend16S, I64Extend8S, I64Extend16S, I64Extend32S,
}

/// Metadata for a block/loop/if/function, resolved at parse time.
#[derive(Debug, Clone)]
pub(crate) struct Block {
    pub(crate) kind: BlockKind,
    /// PC of the block opener (block/loop/if instruction).
    pub(crate) start_pc: u32,
    /// PC of the `end` instruction (patched when `end` is parsed).
    pub(crate) end_pc: u32,
    /// PC of the `else` instruction (only for `If`).
    pub(crate) else_pc: Option<u32>,
    /// Values consumed from the operand stack on entry.
    pub(crate) params: u32,
    /// Values left on the operand stack on exit.
    pub(crate) results: u32,
}

impl Block {
    /// Number of values a branch to this block carries.
    pub(crate) fn branch_arity(&self) -> u32 {
        match self.kind {
            BlockKind::Loop => self.params,
            _ => self.results,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BlockKind {
    /// Implicit function-level block.
    Function,
    Block,
    Loop,
    If,
}

impl ParsedBody {
    /// Parse raw wasm function body bytes into a pre-decoded body.
    ///
    /// `types` is the module's type section, used to resolve the arity of
    /// blocks with a function-type signature.
    pub(crate) fn parse(
        reader: &FunctionBody,
        func_type: &FuncType,
        types: &[FuncType],
    ) -> Result<Self, anyhow::Error> {
        let mut body = Self::default();

        // Implicit function-level block (index 0).
        let func_block_idx = body.open_block(
            BlockKind::Function,
            func_type.params().len() as u32,
            func_type.results().len() as u32,
        );

        // Track open block indices so `end` can find the right one.
        let mut block_stack: Vec<u32> = vec![func_block_idx];

        for op in reader.get_operators_reader()? {
            body.parse_op(op?, &mut block_stack, types)?;
        }
        anyhow::ensure!(block_stack.is_empty(), "function body ended with open blocks");
        Ok(body)
    }

    /// Allocate a new block entry, returning its index.
    fn open_block(&mut self, kind: BlockKind, params: u32, results: u32) -> u32 {
        let idx = self.blocks.len() as u32;
        self.blocks.push(Block {
            kind,
            start_pc: self.ops.len() as u32,
            end_pc: 0,
            else_pc: None,
            params,
            results,
        });
        idx
    }

    fn open_typed_block(
        &mut self,
        kind: BlockKind,
        blockty: BlockType,
        types: &[FuncType],
    ) -> Result<u32, anyhow::Error> {
        let (params, results) = match blockty {
            BlockType::Empty => (0, 0),
            BlockType::Type(_) => (0, 1),
            BlockType::FuncType(idx) => {
                let ty = types
                    .get(idx as usize)
                    .ok_or_else(|| anyhow::anyhow!("block type index {idx} out of bounds"))?;
                (ty.params().len() as u32, ty.results().len() as u32)
            }
        };
        Ok(self.open_block(kind, params, results))
    }

    fn parse_op(
        &mut self,
        op: Operator,
        block_stack: &mut Vec<u32>,
        types: &[FuncType],
    ) -> Result<(), anyhow::Error> {
        let decoded = match op {
            Operator::Unreachable => Op::Unreachable,
            Operator::Nop => Op::Nop,
            Operator::Return => Op::Return,
            Operator::Drop => Op::Drop,
            Operator::Select | Operator::TypedSelect { .. } => Op::Select,

            // Block control flow
            Operator::Block { blockty } => {
                let idx = self.open_typed_block(BlockKind::Block, blockty, types)?;
                block_stack.push(idx);
                Op::Block(idx)
            }
            Operator::Loop { blockty } => {
                let idx = self.open_typed_block(BlockKind::Loop, blockty, types)?;
                block_stack.push(idx);
                Op::Loop(idx)
            }
            Operator::If { blockty } => {
                let idx = self.open_typed_block(BlockKind::If, blockty, types)?;
                block_stack.push(idx);
                Op::If(idx)
            }
            Operator::Else => {
                let &idx = block_stack
                    .last()
                    .ok_or_else(|| anyhow::anyhow!("else without open block"))?;
                self.blocks[idx as usize].else_pc = Some(self.ops.len() as u32);
                Op::Else(idx)
            }
            Operator::End => {
                let idx = block_stack
                    .pop()
                    .ok_or_else(|| anyhow::anyhow!("end without open block"))?;
                self.blocks[idx as usize].end_pc = self.ops.len() as u32;
                Op::End(idx)
            }
            Operator::Br { relative_depth } => Op::Br(relative_depth),
            Operator::BrIf { relative_depth } => Op::BrIf(relative_depth),
            Operator::BrTable { targets } => {
                let default = targets.default();
                let targets = targets.targets().collect::<Result<Box<[u32]>, _>>()?;
                let idx = self.br_tables.len() as u32;
                self.br_tables.push((targets, default));
                Op::BrTable(idx)
            }

            // Calls
            Operator::Call { function_index } => Op::Call(function_index),
            Operator::CallIndirect {
                type_index,
                table_index,
                ..
            } => Op::CallIndirect {
                type_idx: type_index,
                table_idx: table_index,
            },

            // Locals / globals
            Operator::LocalGet { local_index } => Op::LocalGet(local_index),
            Operator::LocalSet { local_index } => Op::LocalSet(local_index),
            Operator::LocalTee { local_index } => Op::LocalTee(local_index),
            Operator::GlobalGet { global_index } => Op::GlobalGet(global_index),
            Operator::GlobalSet { global_index } => Op::GlobalSet(global_index),

            // Memory
            Operator::I32Load { memarg } => Op::Load(Load::I32, memarg.offset),
            Operator::I64Load { memarg } => Op::Load(Load::I64, memarg.offset),
            Operator::F32Load { memarg } => Op::Load(Load::F32, memarg.offset),
            Operator::F64Load { memarg } => Op::Load(Load::F64, memarg.offset),
            Operator::I32Load8S { memarg } => Op::Load(Load::I32_8S, memarg.offset),
            Operator::I32Load8U { memarg } => Op::Load(Load::I32_8U, memarg.offset),
            Operator::I32Load16S { memarg } => Op::Load(Load::I32_16S, memarg.offset),
            Operator::I32Load16U { memarg } => Op::Load(Load::I32_16U, memarg.offset),
            Operator::I64Load8S { memarg } => Op::Load(Load::I64_8S, memarg.offset),
            Operator::I64Load8U { memarg } => Op::Load(Load::I64_8U, memarg.offset),
            Operator::I64Load16S { memarg } => Op::Load(Load::I64_16S, memarg.offset),
            Operator::I64Load16U { memarg } => Op::Load(Load::I64_16U, memarg.offset),
            Operator::I64Load32S { memarg } => Op::Load(Load::I64_32S, memarg.offset),
            Operator::I64Load32U { memarg } => Op::Load(Load::I64_32U, memarg.offset),
            Operator::I32Store { memarg } => Op::Store(Store::I32, memarg.offset),
            Operator::I64Store { memarg } => Op::Store(Store::I64, memarg.offset),
            Operator::F32Store { memarg } => Op::Store(Store::F32, memarg.offset),
            Operator::F64Store { memarg } => Op::Store(Store::F64, memarg.offset),
            Operator::I32Store8 { memarg } => Op::Store(Store::I32_8, memarg.offset),
            Operator::I32Store16 { memarg } => Op::Store(Store::I32_16, memarg.offset),
            Operator::I64Store8 { memarg } => Op::Store(Store::I64_8, memarg.offset),
            Operator::I64Store16 { memarg } => Op::Store(Store::I64_16, memarg.offset),
            Operator::I64Store32 { memarg } => Op::Store(Store::I64_32, memarg.offset),
            Operator::MemorySize { .. } => Op::MemorySize,
            Operator::MemoryGrow { .. } => Op::MemoryGrow,

            // Constants
            Operator::I32Const { value } => Op::I32Const(value),
            Operator::I64Const { value } => Op::I64Const(value),
            Operator::F32Const { value } => Op::F32Const(value.bits()),
            Operator::F64Const { value } => Op::F64Const(value.bits()),

            other => Op::Num(num_op(&other)?),
        };
        self.ops.push(decoded);
        Ok(())
    }
}

/// Map a stack-only numeric operator, rejecting anything the interpreter
/// does not execute.
fn num_op(op: &Operator) -> Result<NumOp, anyhow::Error> {
    use NumOp::*;
    Ok(match op {
        Operator::I32Eqz => I32Eqz,
        Operator::I32Eq => I32Eq,
        Operator::I32Ne => I32Ne,
        Operator::I32LtS => I32LtS,
        Operator::I32LtU => I32LtU,
        Operator::I32GtS => I32GtS,
        Operator::I32GtU => I32GtU,
        Operator::I32LeS => I32LeS,
        Operator::I32LeU => I32LeU,
        Operator::I32GeS => I32GeS,
        Operator::I32GeU => I32GeU,
        Operator::I64Eqz => I64Eqz,
        Operator::I64Eq => I64Eq,
        Operator::I64Ne => I64Ne,
        Operator::I64LtS => I64LtS,
        Operator::I64LtU => I64LtU,
        Operator::I64GtS => I64GtS,
        Operator::I64GtU => I64GtU,
        Operator::I64LeS => I64LeS,
        Operator::I64LeU => I64LeU,
        Operator::I64GeS => I64GeS,
        Operator::I64GeU => I64GeU,
        Operator::F32Eq => F32Eq,
        Operator::F32Ne => F32Ne,
        Operator::F32Lt => F32Lt,
        Operator::F32Gt => F32Gt,
        Operator::F32Le => F32Le,
        Operator::F32Ge => F32Ge,
        Operator::F64Eq => F64Eq,
        Operator::F64Ne => F64Ne,
        Operator::F64Lt => F64Lt,
        Operator::F64Gt => F64Gt,
        Operator::F64Le => F64Le,
        Operator::F64Ge => F64Ge,

        Operator::I32Clz => I32Clz,
        Operator::I32Ctz => I32Ctz,
        Operator::I32Popcnt => I32Popcnt,
        Operator::I32Add => I32Add,
        Operator::I32Sub => I32Sub,
        Operator::I32Mul => I32Mul,
        Operator::I32DivS => I32DivS,
        Operator::I32DivU => I32DivU,
        Operator::I32RemS => I32RemS,
        Operator::I32RemU => I32RemU,
        Operator::I32And => I32And,
        Operator::I32Or => I32Or,
        Operator::I32Xor => I32Xor,
        Operator::I32Shl => I32Shl,
        Operator::I32ShrS => I32ShrS,
        Operator::I32ShrU => I32ShrU,
        Operator::I32Rotl => I32Rotl,
        Operator::I32Rotr => I32Rotr,
        Operator::I64Clz => I64Clz,
        Operator::I64Ctz => I64Ctz,
        Operator::I64Popcnt => I64Popcnt,
        Operator::I64Add => I64Add,
        Operator::I64Sub => I64Sub,
        Operator::I64Mul => I64Mul,
        Operator::I64DivS => I64DivS,
        Operator::I64DivU => I64DivU,
        Operator::I64RemS => I64RemS,
        Operator::I64RemU => I64RemU,
        Operator::I64And => I64And,
        Operator::I64Or => I64Or,
        Operator::I64Xor => I64Xor,
        Operator::I64Shl => I64Shl,
        Operator::I64ShrS => I64ShrS,
        Operator::I64ShrU => I64ShrU,
        Operator::I64Rotl => I64Rotl,
        Operator::I64Rotr => I64Rotr,

        Operator::F32Abs => F32Abs,
        Operator::F32Neg => F32Neg,
        Operator::F32Ceil => F32Ceil,
        Operator::F32Floor => F32Floor,
        Operator::F32Trunc => F32Trunc,
        Operator::F32Nearest => F32Nearest,
        Operator::F32Sqrt => F32Sqrt,
        Operator::F32Add => F32Add,
        Operator::F32Sub => F32Sub,
        Operator::F32Mul => F32Mul,
        Operator::F32Div => F32Div,
        Operator::F32Min => F32Min,
        Operator::F32Max => F32Max,
        Operator::F32Copysign => F32Copysign,
        Operator::F64Abs => F64Abs,
        Operator::F64Neg => F64Neg,
        Operator::F64Ceil => F64Ceil,
        Operator::F64Floor => F64Floor,
        Operator::F64Trunc => F64Trunc,
        Operator::F64Nearest => F64Nearest,
        Operator::F64Sqrt => F64Sqrt,
        Operator::F64Add => F64Add,
        Operator::F64Sub => F64Sub,
        Operator::F64Mul => F64Mul,
        Operator::F64Div => F64Div,
        Operator::F64Min => F64Min,
        Operator::F64Max => F64Max,
        Operator::F64Copysign => F64Copysign,

        Operator::I32WrapI64 => I32WrapI64,
        Operator::I64ExtendI32S => I64ExtendI32S,
        Operator::I64ExtendI32U => I64ExtendI32U,
        Operator::I32TruncF32S => I32TruncF32S,
        Operator::I32TruncF32U => I32TruncF32U,
        Operator::I32TruncF64S => I32TruncF64S,
        Operator::I32TruncF64U => I32TruncF64U,
        Operator::I64TruncF32S => I64TruncF32S,
        Operator::I64TruncF32U => I64TruncF32U,
        Operator::I64TruncF64S => I64TruncF64S,
        Operator::I64TruncF64U => I64TruncF64U,
        Operator::I32TruncSatF32S => I32TruncSatF32S,
        Operator::I32TruncSatF32U => I32TruncSatF32U,
        Operator::I32TruncSatF64S => I32TruncSatF64S,
        Operator::I32TruncSatF64U => I32TruncSatF64U,
        Operator::I64TruncSatF32S => I64TruncSatF32S,
        Operator::I64TruncSatF32U => I64TruncSatF32U,
        Operator::I64TruncSatF64S => I64TruncSatF64S,
        Operator::I64TruncSatF64U => I64TruncSatF64U,
        Operator::F32ConvertI32S => F32ConvertI32S,
        Operator::F32ConvertI32U => F32ConvertI32U,
        Operator::F32ConvertI64S => F32ConvertI64S,
        Operator::F32ConvertI64U => F32ConvertI64U,
        Operator::F32DemoteF64 => F32DemoteF64,
        Operator::F64ConvertI32S => F64ConvertI32S,
        Operator::F64ConvertI32U => F64ConvertI32U,
        Operator::F64ConvertI64S => F64ConvertI64S,
        Operator::F64ConvertI64U => F64ConvertI64U,
        Operator::F64PromoteF32 => F64PromoteF32,
        Operator::I32ReinterpretF32 => I32ReinterpretF32,
        Operator::I64ReinterpretF64 => I64ReinterpretF64,
        Operator::F32ReinterpretI32 => F32ReinterpretI32,
        Operator::F64ReinterpretI64 => F64ReinterpretI64,
        Operator::I32Extend8S => I32Extend8S,
        Operator::I32Extend16S => I32Extend16S,
        Operator::I64Extend8S => I64Extend8S,
        Operator::I64Extend16S => I64Extend16S,
        Operator::I64Extend32S => I64Extend32S,

        other => anyhow::bail!("unsupported operator: {other:?}"),
    })
}
