//! Target-build compilation of individual kernels.

use numwasm_compiler::{compile_unit, CompileError, SignatureTable, TargetConfig};
use numwasm_ir::{Const, Inst, IrType, Linkage};
use numwasm_types::kernel::{BinOp, Expr, KernelDecl, Stmt};
use numwasm_types::{Annotation, ScalarType};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn u32_array() -> Annotation {
    Annotation::ndarray(1, Annotation::name("uint32"))
}

fn square() -> KernelDecl {
    KernelDecl::new("example_module", "square")
        .param("input_value", Annotation::name("float64"))
        .returns(Annotation::name("float64"))
        .body(vec![Stmt::ret(
            Expr::var("input_value").mul(Expr::var("input_value")),
        )])
}

fn new_array() -> KernelDecl {
    KernelDecl::new("example_module", "new_array_function")
        .returns(u32_array())
        .body(vec![
            Stmt::let_(
                "array",
                Expr::zeros(ScalarType::U32, vec![Expr::i32(123)]),
            ),
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

fn table_for(decls: &[&KernelDecl]) -> SignatureTable {
    decls
        .iter()
        .map(|d| {
            (
                d.qualified_name(),
                numwasm_compiler::resolve_signature(d).unwrap(),
            )
        })
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn scalar_kernel_gets_wrapper_and_inner() {
    let decl = square();
    let unit = compile_unit(&decl, &table_for(&[&decl]), &TargetConfig::wasm32()).unwrap();
    assert_eq!(unit.symbol, "example_module.square");
    assert_eq!(unit.export_symbol(), "example_module.square");

    let inner = unit
        .module
        .function("__nw_impl.example_module.square")
        .unwrap();
    assert!(inner.attrs.noinline);
    assert_eq!(inner.linkage, Linkage::External);
    assert_eq!(inner.ty.params, vec![IrType::F64]);

    let wrapper = unit.module.function("example_module.square").unwrap();
    assert_eq!(wrapper.ty.params, vec![IrType::F64]);
    assert_eq!(wrapper.ty.results, vec![IrType::F64]);
    let body = &wrapper.body.as_ref().unwrap().insts;
    assert!(body.contains(&Inst::call_noinline("__nw_impl.example_module.square")));
}

#[test]
fn array_return_allocates_descriptor_plus_reserved_word() {
    let decl = new_array();
    let unit = compile_unit(&decl, &table_for(&[&decl]), &TargetConfig::wasm32()).unwrap();

    let inner = unit
        .module
        .function("__nw_impl.example_module.new_array_function")
        .unwrap();
    assert_eq!(inner.ty.results, vec![IrType::I32; 7]);

    let wrapper = unit
        .module
        .function("example_module.new_array_function")
        .unwrap();
    assert_eq!(wrapper.ty.results, vec![IrType::I32]);
    let body = &wrapper.body.as_ref().unwrap().insts;
    let malloc_at = body
        .iter()
        .position(|i| *i == Inst::call("malloc"))
        .expect("wrapper allocates the result block");
    // 4 * (5 + 2) + 4
    assert_eq!(body[malloc_at - 1], Inst::Const(Const::I32(32)));

    // Runtime symbols are declared, never defined, by units.
    for symbol in ["malloc", "NRT_MemInfo_alloc_safe_aligned"] {
        assert!(!unit.module.function(symbol).unwrap().is_definition());
    }
}

#[test]
fn array_parameter_is_loaded_field_by_field() {
    let decl = modify_array();
    let unit = compile_unit(&decl, &table_for(&[&decl]), &TargetConfig::wasm32()).unwrap();
    let wrapper = unit
        .module
        .function("example_module.modify_array_function")
        .unwrap();
    assert_eq!(wrapper.ty.params, vec![IrType::I32]);
    let loads: Vec<u32> = wrapper
        .body
        .as_ref()
        .unwrap()
        .insts
        .iter()
        .filter_map(|i| match i {
            Inst::Load { mem, .. } => Some(mem.offset),
            _ => None,
        })
        .collect();
    assert_eq!(loads, vec![0, 4, 8, 12, 16, 20, 24]);
}

#[test]
fn int_to_float_cast_converts_by_signedness() {
    let decl = KernelDecl::new("example_module", "widen")
        .param("n", Annotation::name("int64"))
        .param("m", Annotation::name("uint32"))
        .returns(Annotation::name("float64"))
        .body(vec![Stmt::ret(
            Expr::var("n")
                .cast(ScalarType::F64)
                .add(Expr::var("m").cast(ScalarType::F64)),
        )]);
    let unit = compile_unit(&decl, &table_for(&[&decl]), &TargetConfig::wasm32()).unwrap();
    let inner = unit
        .module
        .function("__nw_impl.example_module.widen")
        .unwrap();
    let body = &inner.body.as_ref().unwrap().insts;
    assert!(body.contains(&Inst::Convert {
        from: IrType::I64,
        to: IrType::F64,
        signed: true,
    }));
    assert!(body.contains(&Inst::Convert {
        from: IrType::I32,
        to: IrType::F64,
        signed: false,
    }));
}

#[test]
fn host_target_uses_wide_words_and_promoted_alignment() {
    let decl = modify_array();
    let unit = compile_unit(&decl, &table_for(&[&decl]), &TargetConfig::host()).unwrap();
    let wrapper = unit
        .module
        .function("example_module.modify_array_function")
        .unwrap();
    assert_eq!(wrapper.ty.params, vec![IrType::I64]);
    let aligns: Vec<u32> = wrapper
        .body
        .as_ref()
        .unwrap()
        .insts
        .iter()
        .filter_map(|i| match i {
            Inst::Load { mem, .. } => Some(mem.align),
            _ => None,
        })
        .collect();
    assert!(aligns.iter().all(|&a| a == 3));
}

#[test]
fn sandbox_target_keeps_natural_alignment() {
    let decl = modify_array();
    let unit = compile_unit(&decl, &table_for(&[&decl]), &TargetConfig::wasm32()).unwrap();
    let text = unit.module.to_string();
    assert!(text.contains("i32.load offset=4 align=2"));
    assert!(!text.contains("align=3"));
}

#[test]
fn override_is_recorded_not_applied() {
    let decl = new_array().symbol("specially_named_new_array_function");
    let unit = compile_unit(&decl, &table_for(&[&decl]), &TargetConfig::wasm32()).unwrap();
    assert_eq!(unit.export_symbol(), "specially_named_new_array_function");
    assert!(unit
        .module
        .function("example_module.new_array_function")
        .is_some());
    assert!(unit
        .module
        .function("specially_named_new_array_function")
        .is_none());
}

#[test]
fn calls_declare_the_callee_inner_function() {
    let new = new_array();
    let modify = modify_array();
    let both = KernelDecl::new("example_module", "new_and_modify_array_function")
        .returns(u32_array())
        .body(vec![
            Stmt::let_(
                "array",
                Expr::call("example_module.new_array_function", vec![]),
            ),
            Stmt::ret(Expr::call(
                "example_module.modify_array_function",
                vec![Expr::var("array")],
            )),
        ]);
    let table = table_for(&[&new, &modify, &both]);
    let unit = compile_unit(&both, &table, &TargetConfig::wasm32()).unwrap();
    let callee = unit
        .module
        .function("__nw_impl.example_module.modify_array_function")
        .unwrap();
    assert!(!callee.is_definition());
    assert_eq!(callee.ty.params.len(), 7);
}

#[test]
fn global_access_declares_one_slot() {
    let decl = KernelDecl::new("example_module", "bump").body(vec![
        numwasm_compiler::globals::setter(
            "counter",
            ScalarType::I64,
            numwasm_compiler::globals::getter("counter", ScalarType::I64).add(Expr::i64(1)),
        ),
    ]);
    let unit = compile_unit(&decl, &table_for(&[&decl]), &TargetConfig::wasm32()).unwrap();
    let slots: Vec<_> = unit.module.globals().collect();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].name, "__nw_global.counter");
    assert!(!slots[0].is_definition());
}

#[test]
fn unresolved_annotation_names_parameter() {
    let decl = KernelDecl::new("example_module", "broken")
        .param("values", Annotation::bare_ndarray())
        .body(vec![Stmt::Pass]);
    let err = compile_unit(&decl, &SignatureTable::new(), &TargetConfig::wasm32()).unwrap_err();
    let CompileError::TypeMapping(mapping) = err else {
        panic!("expected a type mapping error, got {err:?}");
    };
    assert_eq!(mapping.parameter.as_deref(), Some("values"));
}

#[test]
fn compilation_is_deterministic() {
    let decl = new_array();
    let table = table_for(&[&decl]);
    let a = compile_unit(&decl, &table, &TargetConfig::wasm32()).unwrap();
    let b = compile_unit(&decl, &table, &TargetConfig::wasm32()).unwrap();
    assert_eq!(a.module.to_string(), b.module.to_string());
}

#[test]
fn constant_arithmetic_folds() {
    let decl = KernelDecl::new("example_module", "scaled")
        .returns(Annotation::name("float64"))
        .body(vec![Stmt::ret(
            Expr::f64(1.5).mul(Expr::f64(4.0)),
        )]);
    let unit = compile_unit(&decl, &table_for(&[&decl]), &TargetConfig::wasm32()).unwrap();
    let inner = unit
        .module
        .function("__nw_impl.example_module.scaled")
        .unwrap();
    assert!(inner
        .body
        .as_ref()
        .unwrap()
        .insts
        .contains(&Inst::Const(Const::F64(6.0))));
}
