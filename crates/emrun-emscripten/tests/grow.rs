use std::sync::Arc;

use emrun::listener::{LogBuffer, LogScope, LoggingListener};
use emrun::{Engine, Linker, Module, Store, PAGE_SIZE};

const GROW_WAT: &str = r#"
(module
    (import "env" "emscripten_notify_memory_growth" (func $notify (param i32)))
    (memory (export "memory") 1 4)
    (func $main
        i32.const 1
        memory.grow
        i32.const -1
        i32.ne
        if
            i32.const 0
            call $notify
        end
    )
    (func (export "notify") (param i32)
        local.get 0
        call $notify
    )
    (start $main)
)
"#;

#[test]
fn growth_hook_is_observed() -> Result<(), anyhow::Error> {
    let engine = Engine::default();
    let module = Module::new(&engine, GROW_WAT)?;
    let mut linker = Linker::new(&engine);
    emrun_emscripten::instantiate(&mut linker)?;

    let log = LogBuffer::new();
    let mut store = Store::new(&engine, ());
    store.set_listener(Arc::new(LoggingListener::new(log.clone(), LogScope::Host)));
    let instance = linker.instantiate(&mut store, &module)?;

    assert_eq!(instance.memory().map(<[u8]>::len), Some(2 * PAGE_SIZE));
    assert!(
        log.contents()
            .contains("==> env.emscripten_notify_memory_growth(memory_index=0)"),
        "{}",
        log.contents()
    );
    Ok(())
}

#[test]
fn growth_hook_accepts_any_index() -> Result<(), anyhow::Error> {
    let engine = Engine::default();
    let module = Module::new(&engine, GROW_WAT)?;
    let mut linker = Linker::new(&engine);
    emrun_emscripten::instantiate(&mut linker)?;
    let mut store = Store::new(&engine, ());
    let mut instance = linker.instantiate(&mut store, &module)?;

    let log = LogBuffer::new();
    store.set_listener(Arc::new(LoggingListener::new(log.clone(), LogScope::Host)));
    for index in [0, 7, -1] {
        instance.call::<_, ()>(&mut store, "notify", (index,))?;
    }
    pretty_assertions::assert_eq!(
        log.contents(),
        "==> env.emscripten_notify_memory_growth(memory_index=0)\n<==\n\
         ==> env.emscripten_notify_memory_growth(memory_index=7)\n<==\n\
         ==> env.emscripten_notify_memory_growth(memory_index=-1)\n<==\n"
    );
    Ok(())
}
