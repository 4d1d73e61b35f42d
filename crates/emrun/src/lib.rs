//! A small WebAssembly interpreter built for embedding host shims.
//!
//! Modules are validated and pre-decoded once, then instantiated against a
//! [`Linker`] of host functions. Host functions receive a [`Caller`] that
//! exposes the calling instance's memory and tables and can call back into
//! it, so guest → host → guest chains nest on one native stack.

mod caller;
mod engine;
mod func;
mod instance;
mod interpreter;
mod linker;
pub mod listener;
mod module;
mod parse;
mod stack;
mod store;
mod trap;
mod value;

pub use caller::Caller;
pub use engine::{Config, Engine, DEFAULT_MAX_CALL_DEPTH};
pub use func::{Func, HostFunc, ResultCountMismatch};
pub use instance::{Instance, PAGE_SIZE};
pub use linker::Linker;
pub use module::Module;
pub use store::{InterruptHandle, Store};
pub use trap::{HostError, Trap};
pub use value::{Val, WasmArgs, WasmResults, WasmVal};

pub use wasmparser::{FuncType, ValType};
