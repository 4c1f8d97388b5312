//! End-to-end tests: assemble, emit, and execute via wasmi.
//!
//! Tests validate:
//! - The emitted module validates and exports wrappers plus the runtime
//! - Scalar kernels return their result directly
//! - Array results come back as descriptors over sandbox memory
//! - Array arguments are read through descriptors, without copying data
//! - Global slots are shared by every unit in one module
//! - The allocator reuses freed blocks

use numwasm_codegen::{emit_wasm, Assembler, ExportSet};
use numwasm_compiler::globals::{getter, setter};
use numwasm_compiler::{compile_unit, resolve_signature, CompiledFunctionUnit, SignatureTable, TargetConfig};
use numwasm_types::kernel::{BinOp, Expr, KernelDecl, Stmt};
use numwasm_types::{decode, Annotation, GlobalBinding, SandboxMemory, ScalarType, ScalarValue};
use wasmi::{Engine, Linker, Module, Store};
use wasmparser::{ExternalKind, Parser, Payload};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// Owned copy of sandbox memory, for decoding.
struct Snapshot(Vec<u8>);

impl SandboxMemory for Snapshot {
    fn bytes(&self) -> &[u8] {
        &self.0
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

fn u32_array() -> Annotation {
    Annotation::ndarray(1, Annotation::name("uint32"))
}

fn square() -> KernelDecl {
    KernelDecl::new("example_module", "square")
        .param("input_value", Annotation::f64())
        .returns(Annotation::f64())
        .body(vec![Stmt::ret(
            Expr::var("input_value").mul(Expr::var("input_value")),
        )])
}

fn new_array() -> KernelDecl {
    KernelDecl::new("example_module", "new_array_function")
        .returns(u32_array())
        .body(vec![
            Stmt::let_("array", Expr::zeros(ScalarType::U32, vec![Expr::i32(123)])),
            Stmt::store(Expr::var("array"), vec![Expr::i32(0)], Expr::u32(1)),
            Stmt::store(Expr::var("array"), vec![Expr::i32(1)], Expr::u32(2)),
            Stmt::store(Expr::var("array"), vec![Expr::i32(3)], Expr::u32(3)),
            Stmt::store(Expr::var("array"), vec![Expr::i32(4)], Expr::u32(4)),
            Stmt::ret(Expr::var("array")),
        ])
}

fn modify_array() -> KernelDecl {
    KernelDecl::new("example_module", "modify_array_function")
        .param("input_array", u32_array())
        .returns(u32_array())
        .body(vec![
            Stmt::in_place(Expr::var("input_array"), BinOp::Add, Expr::u32(10)),
            Stmt::ret(Expr::var("input_array")),
        ])
}

fn bump() -> KernelDecl {
    KernelDecl::new("example_module", "bump").body(vec![setter(
        "counter",
        ScalarType::I64,
        getter("counter", ScalarType::I64).add(Expr::i64(1)),
    )])
}

fn read() -> KernelDecl {
    KernelDecl::new("example_module", "read")
        .returns(Annotation::i64())
        .body(vec![Stmt::ret(getter("counter", ScalarType::I64))])
}

fn compile_all(decls: &[KernelDecl], config: &TargetConfig) -> Vec<CompiledFunctionUnit> {
    let table: SignatureTable = decls
        .iter()
        .map(|d| (d.qualified_name(), resolve_signature(d).unwrap()))
        .collect();
    decls
        .iter()
        .map(|d| compile_unit(d, &table, config).unwrap())
        .collect()
}

/// Compile, assemble and emit `decls` with `bindings` (panics on error).
fn build(decls: &[KernelDecl], bindings: &[GlobalBinding]) -> Vec<u8> {
    let config = TargetConfig::wasm32();
    let units = compile_all(decls, &config);
    let mut exports = ExportSet::with_runtime(&config);
    exports.extend(units.iter().map(|u| u.export_symbol().to_string()));
    let assembled = Assembler::new("example", &config)
        .exports(exports)
        .globals(bindings)
        .assemble(&units)
        .unwrap_or_else(|e| panic!("assembly failed: {e}"));
    emit_wasm(&assembled.module, &config).unwrap_or_else(|e| panic!("emission failed: {e}"))
}

/// Instantiate a WASM module via wasmi and return the store + instance.
fn instantiate(wasm: &[u8]) -> (Store<()>, wasmi::Instance) {
    let engine = Engine::default();
    let module = Module::new(&engine, wasm).expect("failed to parse wasm module");
    let mut store = Store::new(&engine, ());
    let linker = Linker::<()>::new(&engine);
    let instance = linker
        .instantiate(&mut store, &module)
        .expect("failed to instantiate")
        .start(&mut store)
        .expect("failed to start instance");
    (store, instance)
}

fn snapshot(store: &Store<()>, instance: &wasmi::Instance) -> Snapshot {
    let memory = instance.get_memory(store, "memory").expect("memory export");
    Snapshot(memory.data(store).to_vec())
}

fn exported_functions(wasm: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    for payload in Parser::new(0).parse_all(wasm) {
        if let Payload::ExportSection(reader) = payload.unwrap() {
            for export in reader {
                let export = export.unwrap();
                if export.kind == ExternalKind::Func {
                    names.push(export.name.to_string());
                }
            }
        }
    }
    names
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn exports_are_wrappers_and_runtime() {
    let wasm = build(&[square(), new_array()], &[]);
    let exports = exported_functions(&wasm);
    assert_eq!(
        exports,
        vec![
            "malloc",
            "free",
            "NRT_MemInfo_alloc_safe_aligned",
            "example_module.square",
            "example_module.new_array_function",
        ]
    );
}

#[test]
fn square_of_three_is_nine() {
    let wasm = build(&[square()], &[]);
    let (mut store, instance) = instantiate(&wasm);
    let f = instance
        .get_typed_func::<f64, f64>(&store, "example_module.square")
        .expect("square export missing");
    assert_eq!(f.call(&mut store, 3.0).unwrap(), 9.0);
}

#[test]
fn array_result_is_a_descriptor() {
    let wasm = build(&[new_array()], &[]);
    let (mut store, instance) = instantiate(&wasm);
    let f = instance
        .get_typed_func::<(), i32>(&store, "example_module.new_array_function")
        .unwrap();
    let ptr = f.call(&mut store, ()).unwrap() as u32;

    let mem = snapshot(&store, &instance);
    assert_eq!(mem.read_u32(ptr + 8).unwrap(), 123, "nitems");
    assert_eq!(mem.read_u32(ptr + 12).unwrap(), 4, "itemsize");
    assert_eq!(mem.read_u32(ptr + 24).unwrap(), 4, "stride");

    let view = decode(&mem, ptr, ScalarType::U32, 1).unwrap();
    assert_eq!(view.shape(), &[123]);
    for (i, value) in view.iter().enumerate() {
        let expected = match i {
            0 => 1,
            1 => 2,
            3 => 3,
            4 => 4,
            _ => 0,
        };
        assert_eq!(value, ScalarValue::U32(expected), "index {i}");
    }
}

#[test]
fn array_argument_is_modified_in_place() {
    let wasm = build(&[modify_array()], &[]);
    let (mut store, instance) = instantiate(&wasm);
    let malloc = instance
        .get_typed_func::<i32, i32>(&store, "malloc")
        .unwrap();
    let meminfo_alloc = instance
        .get_typed_func::<(i32, i32), i32>(&store, "NRT_MemInfo_alloc_safe_aligned")
        .unwrap();
    let memory = instance.get_memory(&store, "memory").unwrap();

    // Three u32 elements [5, 6, 7].
    let meminfo = meminfo_alloc.call(&mut store, (12, 4)).unwrap() as u32;
    let data = snapshot(&store, &instance).read_u32(meminfo + 12).unwrap();
    let mut bytes = Vec::new();
    for v in [5u32, 6, 7] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    memory.write(&mut store, data as usize, &bytes).unwrap();

    let desc = malloc.call(&mut store, 28).unwrap() as u32;
    let mut words = Vec::new();
    for w in [meminfo, 0, 3, 4, data, 3, 4] {
        words.extend_from_slice(&w.to_le_bytes());
    }
    memory.write(&mut store, desc as usize, &words).unwrap();

    let f = instance
        .get_typed_func::<i32, i32>(&store, "example_module.modify_array_function")
        .unwrap();
    let result = f.call(&mut store, desc as i32).unwrap() as u32;

    let mem = snapshot(&store, &instance);
    let view = decode(&mem, result, ScalarType::U32, 1).unwrap();
    assert_eq!(view.data_ptr(), data, "result aliases the argument's data");
    assert_eq!(
        view.to_vec(),
        vec![ScalarValue::U32(15), ScalarValue::U32(16), ScalarValue::U32(17)]
    );
}

#[test]
fn global_slot_is_shared_between_functions() {
    let binding = GlobalBinding::new("counter", ScalarValue::I64(0), ScalarType::I64);
    let wasm = build(&[bump(), read()], &[binding]);
    let (mut store, instance) = instantiate(&wasm);
    let bump = instance
        .get_typed_func::<(), ()>(&store, "example_module.bump")
        .unwrap();
    let read = instance
        .get_typed_func::<(), i64>(&store, "example_module.read")
        .unwrap();
    assert_eq!(read.call(&mut store, ()).unwrap(), 0);
    bump.call(&mut store, ()).unwrap();
    assert_eq!(read.call(&mut store, ()).unwrap(), 1);
}

#[test]
fn global_slot_starts_at_its_initial_value() {
    let binding = GlobalBinding::new("counter", ScalarValue::I64(41), ScalarType::I64);
    let wasm = build(&[bump(), read()], &[binding]);
    let (mut store, instance) = instantiate(&wasm);
    let bump = instance
        .get_typed_func::<(), ()>(&store, "example_module.bump")
        .unwrap();
    let read = instance
        .get_typed_func::<(), i64>(&store, "example_module.read")
        .unwrap();
    bump.call(&mut store, ()).unwrap();
    assert_eq!(read.call(&mut store, ()).unwrap(), 42);
}

#[test]
fn freed_blocks_are_reused() {
    let wasm = build(&[square()], &[]);
    let (mut store, instance) = instantiate(&wasm);
    let malloc = instance
        .get_typed_func::<i32, i32>(&store, "malloc")
        .unwrap();
    let free = instance.get_typed_func::<i32, ()>(&store, "free").unwrap();

    let a = malloc.call(&mut store, 40).unwrap();
    let b = malloc.call(&mut store, 40).unwrap();
    assert_ne!(a, b);
    assert_eq!(a % 8, 0);
    free.call(&mut store, a).unwrap();
    assert_eq!(malloc.call(&mut store, 16).unwrap(), a);
    free.call(&mut store, 0).unwrap();
}

#[test]
fn allocator_grows_memory() {
    let wasm = build(&[square()], &[]);
    let (mut store, instance) = instantiate(&wasm);
    let malloc = instance
        .get_typed_func::<i32, i32>(&store, "malloc")
        .unwrap();
    let memory = instance.get_memory(&store, "memory").unwrap();
    let before = memory.data(&store).len();
    let ptr = malloc.call(&mut store, 2 * 1024 * 1024).unwrap() as usize;
    assert!(memory.data(&store).len() > before);
    assert!(ptr + 2 * 1024 * 1024 <= memory.data(&store).len());
}

#[test]
fn emitted_bytes_are_deterministic() {
    let a = build(&[square(), new_array(), modify_array()], &[]);
    let b = build(&[square(), new_array(), modify_array()], &[]);
    assert_eq!(a, b);
}
