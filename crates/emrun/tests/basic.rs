use emrun::{Config, Engine, Linker, Module, Store, Trap, Val};

fn instantiate(wat: &str) -> Result<(Store<()>, emrun::Instance<()>), anyhow::Error> {
    let engine = Engine::default();
    let module = Module::new(&engine, wat)?;
    let linker = Linker::new(&engine);
    let mut store = Store::new(&engine, ());
    let instance = linker.instantiate(&mut store, &module)?;
    Ok((store, instance))
}

fn trap_of(err: &anyhow::Error) -> &Trap {
    err.downcast_ref::<Trap>()
        .unwrap_or_else(|| panic!("expected a trap, got {err:?}"))
}

#[test]
fn return_const_i32() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (func (export "answer") (result i32)
                i32.const 42
            )
        )
    "#,
    )?;
    let result: (i32,) = instance.call(&mut store, "answer", ())?;
    assert_eq!(result, (42,));
    Ok(())
}

#[test]
fn multi_value_results_with_multiple_arguments() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (func (export "sum_and_diff") (param i32 i32) (result i32 i32)
                local.get 0
                local.get 1
                i32.add
                local.get 0
                local.get 1
                i32.sub
            )
        )
    "#,
    )?;
    let result: (i32, i32) = instance.call(&mut store, "sum_and_diff", (7, 3))?;
    assert_eq!(result, (10, 4));
    Ok(())
}

#[test]
fn loop_with_branch_computes_factorial() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (func (export "fac") (param i64) (result i64)
                (local $acc i64)
                i64.const 1
                local.set $acc
                block $done
                    loop $next
                        local.get 0
                        i64.eqz
                        br_if $done
                        local.get $acc
                        local.get 0
                        i64.mul
                        local.set $acc
                        local.get 0
                        i64.const 1
                        i64.sub
                        local.set 0
                        br $next
                    end
                end
                local.get $acc
            )
        )
    "#,
    )?;
    let result: (i64,) = instance.call(&mut store, "fac", (20i64,))?;
    assert_eq!(result, (2_432_902_008_176_640_000,));
    Ok(())
}

#[test]
fn br_table_selects_target_and_default() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (func (export "classify") (param i32) (result i32)
                block $other
                    block $one
                        block $zero
                            local.get 0
                            br_table $zero $one $other
                        end
                        i32.const 100
                        return
                    end
                    i32.const 101
                    return
                end
                i32.const 199
            )
        )
    "#,
    )?;
    for (input, expected) in [(0, 100), (1, 101), (2, 199), (-1, 199)] {
        let (result,): (i32,) = instance.call(&mut store, "classify", (input,))?;
        assert_eq!(result, expected, "input {input}");
    }
    Ok(())
}

#[test]
fn if_else_with_block_result() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (func (export "abs") (param i32) (result i32)
                local.get 0
                i32.const 0
                i32.lt_s
                if (result i32)
                    i32.const 0
                    local.get 0
                    i32.sub
                else
                    local.get 0
                end
            )
        )
    "#,
    )?;
    let (neg,): (i32,) = instance.call(&mut store, "abs", (-5,))?;
    let (pos,): (i32,) = instance.call(&mut store, "abs", (5,))?;
    assert_eq!((neg, pos), (5, 5));
    Ok(())
}

#[test]
fn memory_data_segments_and_grow() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (memory (export "memory") 1 3)
            (data (i32.const 8) "\2a\00\00\00")
            (func (export "load") (param i32) (result i32)
                local.get 0
                i32.load
            )
            (func (export "store8") (param i32 i32)
                local.get 0
                local.get 1
                i32.store8
            )
            (func (export "grow") (param i32) (result i32)
                local.get 0
                memory.grow
            )
            (func (export "size") (result i32)
                memory.size
            )
        )
    "#,
    )?;
    let (value,): (i32,) = instance.call(&mut store, "load", (8,))?;
    assert_eq!(value, 42);

    instance.call::<_, ()>(&mut store, "store8", (9, 1))?;
    let (value,): (i32,) = instance.call(&mut store, "load", (8,))?;
    assert_eq!(value, 42 + 256);
    assert_eq!(instance.memory().map(|m| m[9]), Some(1));

    let (old,): (i32,) = instance.call(&mut store, "grow", (2,))?;
    assert_eq!(old, 1);
    let (failed,): (i32,) = instance.call(&mut store, "grow", (1,))?;
    assert_eq!(failed, -1);
    let (size,): (i32,) = instance.call(&mut store, "size", ())?;
    assert_eq!(size, 3);
    Ok(())
}

#[test]
fn out_of_bounds_load_traps() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (memory 1)
            (func (export "load") (param i32) (result i32)
                local.get 0
                i32.load offset=4
            )
        )
    "#,
    )?;
    let err = instance
        .call::<_, (i32,)>(&mut store, "load", (65_532,))
        .unwrap_err();
    assert!(matches!(trap_of(&err), Trap::MemoryOutOfBounds));
    Ok(())
}

#[test]
fn globals_are_initialised_and_exported() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (global $counter (export "counter") (mut i32) (i32.const 40))
            (func (export "bump") (result i32)
                global.get $counter
                i32.const 2
                i32.add
                global.set $counter
                global.get $counter
            )
        )
    "#,
    )?;
    assert_eq!(instance.get_global("counter"), Some(Val::I32(40)));
    let (value,): (i32,) = instance.call(&mut store, "bump", ())?;
    assert_eq!(value, 42);
    assert_eq!(instance.get_global("counter"), Some(Val::I32(42)));
    assert_eq!(instance.get_global("bump"), None);
    Ok(())
}

#[test]
fn call_indirect_dispatches_through_table() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (type $binop (func (param i32 i32) (result i32)))
            (table 4 funcref)
            (elem (i32.const 0) $add $sub)
            (elem (i32.const 3) $nullary)
            (func $add (type $binop) local.get 0 local.get 1 i32.add)
            (func $sub (type $binop) local.get 0 local.get 1 i32.sub)
            (func $nullary (result i32) i32.const 0)
            (func (export "apply") (param i32 i32 i32) (result i32)
                local.get 1
                local.get 2
                local.get 0
                call_indirect (type $binop)
            )
        )
    "#,
    )?;
    let (sum,): (i32,) = instance.call(&mut store, "apply", (0, 5, 3))?;
    let (diff,): (i32,) = instance.call(&mut store, "apply", (1, 5, 3))?;
    assert_eq!((sum, diff), (8, 2));

    let err = instance
        .call::<_, (i32,)>(&mut store, "apply", (2, 0, 0))
        .unwrap_err();
    assert!(matches!(
        trap_of(&err),
        Trap::UninitializedElement { table: 0, index: 2 }
    ));

    let err = instance
        .call::<_, (i32,)>(&mut store, "apply", (3, 0, 0))
        .unwrap_err();
    assert!(matches!(trap_of(&err), Trap::IndirectCallTypeMismatch));

    let err = instance
        .call::<_, (i32,)>(&mut store, "apply", (4, 0, 0))
        .unwrap_err();
    assert!(matches!(
        trap_of(&err),
        Trap::UndefinedElement { table: 0, index: 4 }
    ));
    Ok(())
}

#[test]
fn integer_traps_are_distinguishable() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (func (export "div") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.div_s
            )
            (func (export "trunc") (param f64) (result i32)
                local.get 0
                i32.trunc_f64_s
            )
            (func (export "boom")
                unreachable
            )
        )
    "#,
    )?;
    let err = instance
        .call::<_, (i32,)>(&mut store, "div", (1, 0))
        .unwrap_err();
    assert!(matches!(trap_of(&err), Trap::IntegerDivideByZero));

    let err = instance
        .call::<_, (i32,)>(&mut store, "div", (i32::MIN, -1))
        .unwrap_err();
    assert!(matches!(trap_of(&err), Trap::IntegerOverflow));

    let err = instance
        .call::<_, (i32,)>(&mut store, "trunc", (f64::NAN,))
        .unwrap_err();
    assert!(matches!(trap_of(&err), Trap::InvalidConversion));

    let err = instance.call::<_, ()>(&mut store, "boom", ()).unwrap_err();
    assert!(matches!(trap_of(&err), Trap::Unreachable));
    Ok(())
}

#[test]
fn deep_recursion_exhausts_call_stack() -> Result<(), anyhow::Error> {
    let mut config = Config::new();
    config.max_call_depth(64);
    let engine = Engine::new(&config);
    let module = Module::new(
        &engine,
        r#"
        (module
            (func $down (export "down") (param i32) (result i32)
                local.get 0
                i32.eqz
                if (result i32)
                    i32.const 0
                else
                    local.get 0
                    i32.const 1
                    i32.sub
                    call $down
                    i32.const 1
                    i32.add
                end
            )
        )
    "#,
    )?;
    let linker = Linker::new(&engine);
    let mut store = Store::new(&engine, ());
    let mut instance = linker.instantiate(&mut store, &module)?;

    let (depth,): (i32,) = instance.call(&mut store, "down", (63,))?;
    assert_eq!(depth, 63);

    let err = instance
        .call::<_, (i32,)>(&mut store, "down", (64,))
        .unwrap_err();
    assert!(matches!(trap_of(&err), Trap::CallStackExhausted));
    Ok(())
}

#[test]
fn default_depth_limit_traps_instead_of_overflowing() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (func $down (export "down") (param i32) (result i32)
                local.get 0
                i32.eqz
                if (result i32)
                    i32.const 0
                else
                    local.get 0
                    i32.const 1
                    i32.sub
                    call $down
                    i32.const 1
                    i32.add
                end
            )
        )
    "#,
    )?;
    let limit = emrun::DEFAULT_MAX_CALL_DEPTH as i32;
    let (depth,): (i32,) = instance.call(&mut store, "down", (limit - 1,))?;
    assert_eq!(depth, limit - 1);

    for n in [limit, 100_000] {
        let err = instance
            .call::<_, (i32,)>(&mut store, "down", (n,))
            .unwrap_err();
        assert!(matches!(trap_of(&err), Trap::CallStackExhausted), "{n}");
    }
    Ok(())
}

#[test]
fn start_function_runs_on_instantiation() -> Result<(), anyhow::Error> {
    let (_store, instance) = instantiate(
        r#"
        (module
            (global $ready (export "ready") (mut i32) (i32.const 0))
            (func $init
                i32.const 1
                global.set $ready
            )
            (start $init)
        )
    "#,
    )?;
    assert_eq!(instance.get_global("ready"), Some(Val::I32(1)));
    Ok(())
}

#[test]
fn dynamic_and_raw_calls_check_arguments() -> Result<(), anyhow::Error> {
    let (mut store, mut instance) = instantiate(
        r#"
        (module
            (func (export "neg") (param i64) (result i64)
                i64.const 0
                local.get 0
                i64.sub
            )
        )
    "#,
    )?;
    let results = instance.call_dynamic(&mut store, "neg", &[Val::I64(5)])?;
    assert_eq!(results, vec![Val::I64(-5)]);

    assert!(instance
        .call_dynamic(&mut store, "neg", &[Val::I32(5)])
        .is_err());
    assert!(instance.call_raw(&mut store, "neg", &[]).is_err());

    let raw = instance.call_raw(&mut store, "neg", &[1])?;
    assert_eq!(raw, vec![u64::MAX]);

    let err = instance.call_raw(&mut store, "missing", &[]).unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
    Ok(())
}
