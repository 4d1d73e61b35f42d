use super::*;
use wasmparser::{Parser, Payload};

/// Parse the first function body of a one-function module.
fn parse_first(wat: &str) -> Result<ParsedBody, anyhow::Error> {
    let bytes = wat::parse_str(wat)?;
    let mut types = Vec::new();
    let mut func_types = Vec::new();
    for payload in Parser::new(0).parse_all(&bytes) {
        match payload? {
            Payload::TypeSection(reader) => {
                for ty in reader.into_iter_err_on_gc_types() {
                    types.push(ty?);
                }
            }
            Payload::FunctionSection(reader) => {
                for idx in reader {
                    func_types.push(idx?);
                }
            }
            Payload::CodeSectionEntry(body) => {
                let ty = &types[func_types[0] as usize];
                return ParsedBody::parse(&body, ty, &types);
            }
            _ => {}
        }
    }
    anyhow::bail!("module has no function body")
}

#[test]
fn function_block_spans_whole_body() {
    let body = parse_first("(module (func (result i32) i32.const 42))").unwrap();
    assert_eq!(body.ops, vec![Op::I32Const(42), Op::End(0)]);
    let func = &body.blocks[0];
    assert_eq!(func.kind, BlockKind::Function);
    assert_eq!(func.end_pc, 1);
    assert_eq!(func.branch_arity(), 1);
}

#[test]
fn if_else_targets_are_patched() {
    let body = parse_first(
        r#"
        (module
            (func (param i32) (result i32)
                local.get 0
                if (result i32)
                    i32.const 1
                else
                    i32.const 2
                end))
    "#,
    )
    .unwrap();
    assert_eq!(
        body.ops,
        vec![
            Op::LocalGet(0),
            Op::If(1),
            Op::I32Const(1),
            Op::Else(1),
            Op::I32Const(2),
            Op::End(1),
            Op::End(0),
        ]
    );
    let block = &body.blocks[1];
    assert_eq!(block.kind, BlockKind::If);
    assert_eq!(block.start_pc, 1);
    assert_eq!(block.else_pc, Some(3));
    assert_eq!(block.end_pc, 5);
    assert_eq!(block.results, 1);
}

#[test]
fn loop_branches_carry_params() {
    let body = parse_first(
        r#"
        (module
            (type $t (func (param i32) (result i32)))
            (func (type $t)
                local.get 0
                loop (type $t)
                    br 0
                end))
    "#,
    )
    .unwrap();
    let block = &body.blocks[1];
    assert_eq!(block.kind, BlockKind::Loop);
    assert_eq!(block.params, 1);
    assert_eq!(block.results, 1);
    assert_eq!(block.branch_arity(), 1);
}

#[test]
fn br_table_spills_targets() {
    let body = parse_first(
        r#"
        (module
            (func (param i32)
                block
                    block
                        local.get 0
                        br_table 0 1 0
                    end
                end))
    "#,
    )
    .unwrap();
    assert!(body.ops.contains(&Op::BrTable(0)));
    let (targets, default) = &body.br_tables[0];
    assert_eq!(&targets[..], &[0, 1]);
    assert_eq!(*default, 0);
}

#[test]
fn memory_access_keeps_offset() {
    let body = parse_first(
        r#"
        (module
            (memory 1)
            (func (result i32)
                i32.const 0
                i32.load16_u offset=6))
    "#,
    )
    .unwrap();
    assert_eq!(body.ops[1], Op::Load(Load::I32_16U, 6));
}

#[test]
fn call_indirect_records_type_and_table() {
    let body = parse_first(
        r#"
        (module
            (type $v (func))
            (table 1 funcref)
            (func
                i32.const 0
                call_indirect (type $v)))
    "#,
    )
    .unwrap();
    assert_eq!(
        body.ops[1],
        Op::CallIndirect {
            type_idx: 0,
            table_idx: 0
        }
    );
}

#[test]
fn unsupported_operator_is_rejected() {
    let err = parse_first(
        r#"
        (module
            (memory 1)
            (func
                i32.const 0
                i32.const 0
                i32.const 0
                memory.fill))
    "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("unsupported operator"), "{err}");
}
