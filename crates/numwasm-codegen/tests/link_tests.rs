//! Integration tests for module assembly.
//!
//! Tests validate:
//! - Symbol overrides replace the default entry name
//! - Visibility culling against the export set
//! - Global slots are materialized once, from their bindings
//! - Collisions and unresolved references abort the build
//! - Assembled text is deterministic

use numwasm_codegen::{Assembler, ExportSet, LinkError};
use numwasm_compiler::globals::{getter, setter};
use numwasm_compiler::{compile_unit, resolve_signature, CompiledFunctionUnit, SignatureTable, TargetConfig};
use numwasm_ir::{Const, Linkage, Visibility};
use numwasm_types::kernel::{Expr, KernelDecl, Stmt};
use numwasm_types::{Annotation, GlobalBinding, ScalarType, ScalarValue};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

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
            Stmt::ret(Expr::var("array")),
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

fn exports_for(units: &[CompiledFunctionUnit], config: &TargetConfig) -> ExportSet {
    let mut exports = ExportSet::with_runtime(config);
    exports.extend(units.iter().map(|u| u.export_symbol().to_string()));
    exports
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn override_is_the_only_visible_name() {
    let config = TargetConfig::wasm32();
    let units = compile_all(
        &[square(), new_array().symbol("specially_named_new_array_function")],
        &config,
    );
    let assembled = Assembler::new("example", &config)
        .exports(exports_for(&units, &config))
        .assemble(&units)
        .unwrap();

    let module = &assembled.module;
    assert!(module.function("example_module.new_array_function").is_none());
    let renamed = module.function("specially_named_new_array_function").unwrap();
    assert_eq!(renamed.visibility, Visibility::Default);
    assert_eq!(
        module.function("example_module.square").unwrap().visibility,
        Visibility::Default
    );

    let exported = assembled.exported_functions();
    assert!(exported.contains(&"specially_named_new_array_function".to_string()));
    assert!(!exported.iter().any(|s| s == "example_module.new_array_function"));
    assert!(!assembled.text.contains("@\"example_module.new_array_function\""));
}

#[test]
fn symbols_outside_the_export_set_are_hidden() {
    let config = TargetConfig::wasm32();
    let units = compile_all(&[square(), bump()], &config);
    let exports: ExportSet = ["example_module.square"].into_iter().collect();
    let assembled = Assembler::new("example", &config)
        .exports(exports)
        .globals(&[GlobalBinding::new("counter", ScalarValue::I64(0), ScalarType::I64)])
        .assemble(&units)
        .unwrap();

    for f in assembled.module.functions() {
        let expected = if f.name == "example_module.square" || f.linkage.is_restrictive() {
            Visibility::Default
        } else {
            Visibility::Hidden
        };
        assert_eq!(f.visibility, expected, "{}", f.name);
    }
    let inner = assembled
        .module
        .function("__nw_impl.example_module.square")
        .unwrap();
    assert_eq!(inner.visibility, Visibility::Hidden);

    // The slot carries internal linkage, so it stays default-visible.
    let slot = assembled.module.global("__nw_global.counter").unwrap();
    assert_eq!(slot.linkage, Linkage::Internal);
    assert_eq!(slot.visibility, Visibility::Default);
}

#[test]
fn global_slot_is_materialized_once_with_its_initial_value() {
    let config = TargetConfig::wasm32();
    let units = compile_all(&[bump(), read()], &config);
    let binding = GlobalBinding::new("counter", ScalarValue::I64(41), ScalarType::I64);
    let assembled = Assembler::new("example", &config)
        .exports(exports_for(&units, &config))
        .globals([&binding])
        .assemble(&units)
        .unwrap();

    let slots: Vec<_> = assembled
        .module
        .globals()
        .filter(|g| g.name.starts_with("__nw_global."))
        .collect();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].init, Some(Const::I64(41)));
}

#[test]
fn unbound_global_is_unresolved() {
    let config = TargetConfig::wasm32();
    let units = compile_all(&[read()], &config);
    let err = Assembler::new("example", &config)
        .assemble(&units)
        .unwrap_err();
    assert_eq!(err, LinkError::Unresolved("__nw_global.counter".into()));
}

#[test]
fn missing_callee_is_unresolved() {
    let config = TargetConfig::wasm32();
    let caller = KernelDecl::new("example_module", "twice")
        .param("x", Annotation::f64())
        .returns(Annotation::f64())
        .body(vec![Stmt::ret(Expr::call(
            "example_module.square",
            vec![Expr::var("x")],
        ))]);
    let mut units = compile_all(&[square(), caller], &config);
    units.remove(0);
    let err = Assembler::new("example", &config)
        .assemble(&units)
        .unwrap_err();
    assert_eq!(
        err,
        LinkError::Unresolved("__nw_impl.example_module.square".into())
    );
}

#[test]
fn the_same_unit_twice_collides() {
    let config = TargetConfig::wasm32();
    let mut units = compile_all(&[square()], &config);
    units.push(units[0].clone());
    let err = Assembler::new("example", &config)
        .assemble(&units)
        .unwrap_err();
    assert!(matches!(err, LinkError::DuplicateSymbol(_)));
}

#[test]
fn override_colliding_with_a_symbol_is_rejected() {
    let config = TargetConfig::wasm32();
    let units = compile_all(&[square(), new_array().symbol("malloc")], &config);
    let err = Assembler::new("example", &config)
        .assemble(&units)
        .unwrap_err();
    assert_eq!(err, LinkError::DuplicateSymbol("malloc".into()));
}

#[test]
fn units_must_share_the_build_layout() {
    let units = compile_all(&[square()], &TargetConfig::host());
    let config = TargetConfig::wasm32();
    let err = Assembler::new("example", &config)
        .assemble(&units)
        .unwrap_err();
    assert!(matches!(
        err,
        LinkError::LayoutMismatch {
            expected: 32,
            found: 64,
            ..
        }
    ));
}

#[test]
fn assembled_text_is_deterministic() {
    let config = TargetConfig::wasm32();
    let build = || {
        let units = compile_all(&[square(), new_array()], &config);
        Assembler::new("example", &config)
            .exports(exports_for(&units, &config))
            .assemble(&units)
            .unwrap()
            .text
    };
    let text = build();
    assert_eq!(text, build());
    assert!(text.starts_with("; module example"));
}
