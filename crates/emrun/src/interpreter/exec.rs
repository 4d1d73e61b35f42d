use crate::parse::body::{BlockKind, Load, Op, ParsedBody, Store};
use crate::parse::{ParsedFunction, ParsedModule};
use crate::stack::Stack;
use crate::value::Val;
use crate::{Caller, Trap};

use super::{call_func, numeric};

/// An entered block: which one, and the stack height below its params.
#[derive(Debug, Clone, Copy)]
struct Label {
    block: u32,
    height: usize,
}

/// Where execution continues after a branch.
enum Flow {
    Jump(usize),
    Return,
}

/// Run one guest function body to completion.
pub(super) fn execute<T>(
    caller: &mut Caller<'_, T>,
    module: &ParsedModule,
    func: &ParsedFunction,
    args: &[u64],
) -> Result<Vec<u64>, Trap> {
    let mut locals: Vec<u64> = Vec::with_capacity(func.locals.len());
    locals.extend_from_slice(args);
    for ty in func.locals.iter().skip(args.len()) {
        locals.push(Val::zero_for(ty).to_bits());
    }

    let body = &func.body;
    let result_count = body.blocks[0].results as usize;
    let mut stack = Stack::new();
    let mut labels = vec![Label {
        block: 0,
        height: 0,
    }];
    let mut pc = 0usize;

    loop {
        caller.store.consume_fuel(1)?;
        let op = body.ops[pc];
        pc += 1;

        match op {
            Op::Unreachable => return Err(Trap::Unreachable),
            Op::Nop => {}

            Op::Block(idx) | Op::Loop(idx) => {
                let block = &body.blocks[idx as usize];
                labels.push(Label {
                    block: idx,
                    height: stack.len() - block.params as usize,
                });
            }

            Op::If(idx) => {
                let condition = stack.pop_i32();
                let block = &body.blocks[idx as usize];
                labels.push(Label {
                    block: idx,
                    height: stack.len() - block.params as usize,
                });
                if condition == 0 {
                    match block.else_pc {
                        Some(else_pc) => pc = else_pc as usize + 1,
                        None => {
                            labels.pop();
                            pc = block.end_pc as usize + 1;
                        }
                    }
                }
            }

            // End of the `then` arm: skip the `else` arm, landing on `end`.
            Op::Else(idx) => pc = body.blocks[idx as usize].end_pc as usize,

            Op::End(idx) => {
                if idx == 0 {
                    break;
                }
                labels.pop();
            }

            Op::Br(depth) => match branch(caller, body, &mut labels, &mut stack, depth)? {
                Flow::Jump(target) => pc = target,
                Flow::Return => break,
            },

            Op::BrIf(depth) => {
                if stack.pop_i32() != 0 {
                    match branch(caller, body, &mut labels, &mut stack, depth)? {
                        Flow::Jump(target) => pc = target,
                        Flow::Return => break,
                    }
                }
            }

            Op::BrTable(idx) => {
                let (targets, default) = &body.br_tables[idx as usize];
                let selector = stack.pop_u32() as usize;
                let depth = targets.get(selector).copied().unwrap_or(*default);
                match branch(caller, body, &mut labels, &mut stack, depth)? {
                    Flow::Jump(target) => pc = target,
                    Flow::Return => break,
                }
            }

            Op::Return => break,

            Op::Call(func_idx) => {
                let param_count = module
                    .types
                    .get(module.func_types[func_idx as usize] as usize)
                    .map_or(0, |ty| ty.params().len());
                let args = stack.pop_n(param_count);
                let results = call_func(caller, func_idx, &args)?;
                stack.extend(results);
            }

            Op::CallIndirect {
                type_idx,
                table_idx,
            } => {
                let index = stack.pop_u32();
                let func_idx = caller.instance.tables[table_idx as usize]
                    .slot(index)
                    .ok_or(Trap::UndefinedElement {
                        table: table_idx,
                        index,
                    })?
                    .ok_or(Trap::UninitializedElement {
                        table: table_idx,
                        index,
                    })?;
                let expected = &module.types[type_idx as usize];
                if caller.instance.func_type(func_idx) != Some(expected) {
                    return Err(Trap::IndirectCallTypeMismatch);
                }
                let args = stack.pop_n(expected.params().len());
                let results = call_func(caller, func_idx, &args)?;
                stack.extend(results);
            }

            Op::Drop => {
                stack.pop();
            }

            Op::Select => {
                let condition = stack.pop_i32();
                let b = stack.pop_u64();
                let a = stack.pop_u64();
                stack.push_u64(if condition != 0 { a } else { b });
            }

            Op::LocalGet(idx) => stack.push_u64(locals[idx as usize]),
            Op::LocalSet(idx) => locals[idx as usize] = stack.pop_u64(),
            Op::LocalTee(idx) => {
                let value = stack.pop_u64();
                locals[idx as usize] = value;
                stack.push_u64(value);
            }
            Op::GlobalGet(idx) => stack.push_u64(caller.instance.globals[idx as usize]),
            Op::GlobalSet(idx) => caller.instance.globals[idx as usize] = stack.pop_u64(),

            Op::Load(kind, offset) => {
                let addr = stack.pop_u32() as u64 + offset;
                let memory = memory(caller)?;
                load(memory, kind, addr, &mut stack)?;
            }

            Op::Store(kind, offset) => {
                let value = stack.pop_u64();
                let addr = stack.pop_u32() as u64 + offset;
                let memory = memory_mut(caller)?;
                store(memory, kind, addr, value)?;
            }

            Op::MemorySize => {
                let pages = caller.instance.memory.as_ref().map_or(0, |m| m.pages());
                stack.push_u32(pages);
            }

            Op::MemoryGrow => {
                let delta = stack.pop_u32();
                let old = caller
                    .instance
                    .memory
                    .as_mut()
                    .and_then(|memory| memory.grow(delta));
                stack.push_i32(old.map_or(-1, |pages| pages as i32));
            }

            Op::I32Const(v) => stack.push_i32(v),
            Op::I64Const(v) => stack.push_i64(v),
            Op::F32Const(bits) => stack.push_u32(bits),
            Op::F64Const(bits) => stack.push_u64(bits),

            Op::Num(op) => numeric::eval(op, &mut stack)?,
        }
    }

    Ok(stack.pop_n(result_count))
}

/// Take the branch to the label `depth` levels out.
fn branch<T>(
    caller: &Caller<'_, T>,
    body: &ParsedBody,
    labels: &mut Vec<Label>,
    stack: &mut Stack,
    depth: u32,
) -> Result<Flow, Trap> {
    let target = labels.len() - 1 - depth as usize;
    let label = labels[target];
    let block = &body.blocks[label.block as usize];
    stack.unwind(label.height, block.branch_arity() as usize);

    match block.kind {
        BlockKind::Function => Ok(Flow::Return),
        BlockKind::Loop => {
            // Back-edges are where long-running code spends its time.
            caller.store.check_interrupt()?;
            labels.truncate(target + 1);
            Ok(Flow::Jump(block.start_pc as usize + 1))
        }
        BlockKind::Block | BlockKind::If => {
            labels.truncate(target);
            Ok(Flow::Jump(block.end_pc as usize + 1))
        }
    }
}

fn memory<'m, T>(caller: &'m Caller<'_, T>) -> Result<&'m [u8], Trap> {
    caller
        .instance
        .memory
        .as_ref()
        .map(|memory| memory.bytes())
        .ok_or(Trap::MemoryOutOfBounds)
}

fn memory_mut<'m, T>(caller: &'m mut Caller<'_, T>) -> Result<&'m mut [u8], Trap> {
    caller
        .instance
        .memory
        .as_mut()
        .map(|memory| memory.bytes_mut())
        .ok_or(Trap::MemoryOutOfBounds)
}

fn read<const N: usize>(memory: &[u8], addr: u64) -> Result<[u8; N], Trap> {
    let start = usize::try_from(addr).map_err(|_| Trap::MemoryOutOfBounds)?;
    let end = start.checked_add(N).ok_or(Trap::MemoryOutOfBounds)?;
    let bytes = memory.get(start..end).ok_or(Trap::MemoryOutOfBounds)?;
    <[u8; N]>::try_from(bytes).map_err(|_| Trap::MemoryOutOfBounds)
}

fn write(memory: &mut [u8], addr: u64, bytes: &[u8]) -> Result<(), Trap> {
    let start = usize::try_from(addr).map_err(|_| Trap::MemoryOutOfBounds)?;
    let end = start
        .checked_add(bytes.len())
        .ok_or(Trap::MemoryOutOfBounds)?;
    memory
        .get_mut(start..end)
        .ok_or(Trap::MemoryOutOfBounds)?
        .copy_from_slice(bytes);
    Ok(())
}

fn load(memory: &[u8], kind: Load, addr: u64, stack: &mut Stack) -> Result<(), Trap> {
    match kind {
        Load::I32 => stack.push_u32(u32::from_le_bytes(read(memory, addr)?)),
        Load::I64 => stack.push_u64(u64::from_le_bytes(read(memory, addr)?)),
        Load::F32 => stack.push_u32(u32::from_le_bytes(read(memory, addr)?)),
        Load::F64 => stack.push_u64(u64::from_le_bytes(read(memory, addr)?)),
        Load::I32_8S => stack.push_i32(i8::from_le_bytes(read(memory, addr)?) as i32),
        Load::I32_8U => stack.push_u32(u8::from_le_bytes(read(memory, addr)?) as u32),
        Load::I32_16S => stack.push_i32(i16::from_le_bytes(read(memory, addr)?) as i32),
        Load::I32_16U => stack.push_u32(u16::from_le_bytes(read(memory, addr)?) as u32),
        Load::I64_8S => stack.push_i64(i8::from_le_bytes(read(memory, addr)?) as i64),
        Load::I64_8U => stack.push_u64(u8::from_le_bytes(read(memory, addr)?) as u64),
        Load::I64_16S => stack.push_i64(i16::from_le_bytes(read(memory, addr)?) as i64),
        Load::I64_16U => stack.push_u64(u16::from_le_bytes(read(memory, addr)?) as u64),
        Load::I64_32S => stack.push_i64(i32::from_le_bytes(read(memory, addr)?) as i64),
        Load::I64_32U => stack.push_u64(u32::from_le_bytes(read(memory, addr)?) as u64),
    }
    Ok(())
}

fn store(memory: &mut [u8], kind: Store, addr: u64, value: u64) -> Result<(), Trap> {
    match kind {
        Store::I32 | Store::F32 | Store::I64_32 => write(memory, addr, &(value as u32).to_le_bytes()),
        Store::I64 | Store::F64 => write(memory, addr, &value.to_le_bytes()),
        Store::I32_8 | Store::I64_8 => write(memory, addr, &(value as u8).to_le_bytes()),
        Store::I32_16 | Store::I64_16 => write(memory, addr, &(value as u16).to_le_bytes()),
    }
}
