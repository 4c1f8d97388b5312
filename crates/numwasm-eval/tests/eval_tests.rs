//! Integration tests for the numwasm tree-walking evaluator.
//!
//! Tests validate:
//! - scalar kernels (`square`)
//! - array creation, indexing and shape queries
//! - in-place updates through aliased array arguments
//! - kernel-to-kernel calls and recursion
//! - global slots shared between kernels, starting at their initial value
//! - runtime traps (division by zero), gas metering, argument checking

use numwasm_eval::{EvalError, Evaluator, GlobalSlots, HostArray, KernelTable, Value};
use numwasm_types::kernel::{BinOp, Expr, KernelDecl, Stmt};
use numwasm_types::{Annotation, GlobalBinding, ScalarType, ScalarValue};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn table(decls: Vec<KernelDecl>) -> KernelTable {
    let mut table = KernelTable::new();
    for decl in decls {
        table.declare(decl).expect("declaration should check");
    }
    table
}

fn call(table: &KernelTable, globals: &mut GlobalSlots, name: &str, args: Vec<Value>) -> Value {
    Evaluator::new(table, globals)
        .call(name, args)
        .unwrap_or_else(|e| panic!("call to {name} failed: {e}"))
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
    let mut body = vec![Stmt::let_(
        "out",
        Expr::zeros(ScalarType::U32, vec![Expr::i64(123)]),
    )];
    for (i, v) in [(0, 1), (1, 2), (3, 3), (4, 4)] {
        body.push(Stmt::store(Expr::var("out"), vec![Expr::i64(i)], Expr::u32(v)));
    }
    body.push(Stmt::ret(Expr::var("out")));
    KernelDecl::new("example_module", "new_array_function")
        .returns(u32_array())
        .body(body)
}

fn modify_array() -> KernelDecl {
    KernelDecl::new("example_module", "modify_array")
        .param("values", u32_array())
        .body(vec![Stmt::in_place(
            Expr::var("values"),
            BinOp::Add,
            Expr::u32(10),
        )])
}

fn u32_values(value: &Value) -> Vec<u32> {
    let array = value.as_array().expect("array value").borrow();
    array
        .values()
        .iter()
        .map(|v| match v {
            ScalarValue::U32(x) => *x,
            other => panic!("unexpected element {other}"),
        })
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Scalars
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn square_of_three_is_nine() {
    let t = table(vec![square()]);
    let mut g = GlobalSlots::new();
    let out = call(&t, &mut g, "example_module.square", vec![ScalarValue::F64(3.0).into()]);
    assert_eq!(out, Value::Scalar(ScalarValue::F64(9.0)));
}

#[test]
fn loops_accumulate() {
    // sum of 0..n as i64
    let decl = KernelDecl::new("m", "triangle")
        .param("n", Annotation::i64())
        .returns(Annotation::i64())
        .body(vec![
            Stmt::let_("acc", Expr::i64(0)),
            Stmt::for_range(
                "i",
                Expr::i64(0),
                Expr::var("n"),
                vec![Stmt::assign("acc", Expr::var("acc").add(Expr::var("i")))],
            ),
            Stmt::ret(Expr::var("acc")),
        ]);
    let t = table(vec![decl]);
    let mut g = GlobalSlots::new();
    let out = call(&t, &mut g, "m.triangle", vec![ScalarValue::I64(10).into()]);
    assert_eq!(out, Value::Scalar(ScalarValue::I64(45)));
}

#[test]
fn recursion_through_the_table() {
    let decl = KernelDecl::new("m", "fact")
        .param("n", Annotation::i64())
        .returns(Annotation::i64())
        .body(vec![Stmt::if_(
            Expr::var("n").lt(Expr::i64(2)),
            vec![Stmt::ret(Expr::i64(1))],
            vec![Stmt::ret(Expr::var("n").mul(Expr::call(
                "m.fact",
                vec![Expr::var("n").sub(Expr::i64(1))],
            )))],
        )]);
    let t = table(vec![decl]);
    let mut g = GlobalSlots::new();
    let out = call(&t, &mut g, "m.fact", vec![ScalarValue::I64(10).into()]);
    assert_eq!(out, Value::Scalar(ScalarValue::I64(3_628_800)));
}

#[test]
fn casts_saturate() {
    let decl = KernelDecl::new("m", "to_i32")
        .param("x", Annotation::f64())
        .returns(Annotation::name("int32"))
        .body(vec![Stmt::ret(Expr::var("x").cast(ScalarType::I32))]);
    let t = table(vec![decl]);
    let mut g = GlobalSlots::new();
    let out = call(&t, &mut g, "m.to_i32", vec![ScalarValue::F64(1e12).into()]);
    assert_eq!(out, Value::Scalar(ScalarValue::I32(i32::MAX)));
    let out = call(&t, &mut g, "m.to_i32", vec![ScalarValue::F64(-2.7).into()]);
    assert_eq!(out, Value::Scalar(ScalarValue::I32(-2)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Arrays
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn new_array_has_expected_contents() {
    let t = table(vec![new_array()]);
    let mut g = GlobalSlots::new();
    let out = call(&t, &mut g, "example_module.new_array_function", vec![]);
    assert_eq!(out.as_array().unwrap().borrow().shape(), &[123]);
    let values = u32_values(&out);
    for (i, v) in values.iter().enumerate() {
        let expected = match i {
            0 => 1,
            1 => 2,
            3 => 3,
            4 => 4,
            _ => 0,
        };
        assert_eq!(*v, expected, "element {i}");
    }
}

#[test]
fn in_place_update_is_visible_to_the_caller() {
    let t = table(vec![modify_array()]);
    let mut g = GlobalSlots::new();
    let input = Value::array(
        HostArray::vector(
            ScalarType::U32,
            vec![ScalarValue::U32(5), ScalarValue::U32(6), ScalarValue::U32(7)],
        )
        .unwrap(),
    );
    let out = call(&t, &mut g, "example_module.modify_array", vec![input.clone()]);
    assert!(out.is_void());
    assert_eq!(u32_values(&input), vec![15, 16, 17]);
}

#[test]
fn shape_and_size_of_a_matrix() {
    let decl = KernelDecl::new("m", "cells")
        .param("grid", Annotation::ndarray(2, Annotation::f64()))
        .returns(Annotation::i64())
        .body(vec![Stmt::ret(
            Expr::var("grid")
                .shape(0)
                .mul(Expr::var("grid").shape(1))
                .add(Expr::var("grid").size()),
        )]);
    let t = table(vec![decl]);
    let mut g = GlobalSlots::new();
    let grid = Value::array(HostArray::zeros(ScalarType::F64, vec![3, 4]));
    let out = call(&t, &mut g, "m.cells", vec![grid]);
    assert_eq!(out, Value::Scalar(ScalarValue::I64(24)));
}

#[test]
fn out_of_bounds_store_is_an_error() {
    let decl = KernelDecl::new("m", "poke")
        .param("values", u32_array())
        .body(vec![Stmt::store(
            Expr::var("values"),
            vec![Expr::i64(3)],
            Expr::u32(1),
        )]);
    let t = table(vec![decl]);
    let mut g = GlobalSlots::new();
    let values = Value::array(HostArray::zeros(ScalarType::U32, vec![3]));
    let err = Evaluator::new(&t, &mut g)
        .call("m.poke", vec![values])
        .unwrap_err();
    assert!(matches!(err, EvalError::IndexOutOfBounds(_)));
}

// ══════════════════════════════════════════════════════════════════════════════
// Globals
// ══════════════════════════════════════════════════════════════════════════════

fn counter_kernels() -> Vec<KernelDecl> {
    let get = Expr::GlobalGet {
        name: "counter".into(),
        ty: ScalarType::I64,
    };
    vec![
        KernelDecl::new("m", "increment").body(vec![Stmt::GlobalSet {
            name: "counter".into(),
            ty: ScalarType::I64,
            value: get.clone().add(Expr::i64(1)),
        }]),
        KernelDecl::new("m", "read")
            .returns(Annotation::i64())
            .body(vec![Stmt::ret(get)]),
    ]
}

#[test]
fn global_slot_is_shared_between_kernels() {
    let t = table(counter_kernels());
    let mut g = GlobalSlots::new();
    g.bind(GlobalBinding::new("counter", ScalarValue::I64(0), ScalarType::I64));
    call(&t, &mut g, "m.increment", vec![]);
    let out = call(&t, &mut g, "m.read", vec![]);
    assert_eq!(out, Value::Scalar(ScalarValue::I64(1)));
}

#[test]
fn global_slot_starts_at_initial_value() {
    let t = table(counter_kernels());
    let mut g = GlobalSlots::new();
    g.bind(GlobalBinding::new("counter", ScalarValue::I64(41), ScalarType::I64));
    assert_eq!(
        call(&t, &mut g, "m.read", vec![]),
        Value::Scalar(ScalarValue::I64(41))
    );
    call(&t, &mut g, "m.increment", vec![]);
    assert_eq!(g.peek("counter"), Some(ScalarValue::I64(42)));
}

#[test]
fn unbound_global_is_an_error() {
    let t = table(counter_kernels());
    let mut g = GlobalSlots::new();
    let err = Evaluator::new(&t, &mut g).call("m.read", vec![]).unwrap_err();
    assert_eq!(err, EvalError::UnboundGlobal("counter".into()));
}

// ══════════════════════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn integer_division_by_zero_traps() {
    let decl = KernelDecl::new("m", "ratio")
        .param("a", Annotation::i64())
        .param("b", Annotation::i64())
        .returns(Annotation::i64())
        .body(vec![Stmt::ret(Expr::var("a").div(Expr::var("b")))]);
    let t = table(vec![decl]);
    let mut g = GlobalSlots::new();
    let err = Evaluator::new(&t, &mut g)
        .call(
            "m.ratio",
            vec![ScalarValue::I64(1).into(), ScalarValue::I64(0).into()],
        )
        .unwrap_err();
    assert!(matches!(err, EvalError::ArithmeticTrap(_)));
}

#[test]
fn infinite_loop_runs_out_of_gas() {
    let decl = KernelDecl::new("m", "spin").body(vec![Stmt::while_(
        Expr::bool(true),
        vec![Stmt::Pass],
    )]);
    let t = table(vec![decl]);
    let mut g = GlobalSlots::new();
    let err = Evaluator::new(&t, &mut g)
        .with_gas_limit(1_000)
        .call("m.spin", vec![])
        .unwrap_err();
    assert_eq!(err, EvalError::GasExhausted);
}

#[test]
fn arguments_are_checked() {
    let t = table(vec![square()]);
    let mut g = GlobalSlots::new();
    let mut eval = Evaluator::new(&t, &mut g);
    assert!(matches!(
        eval.call("example_module.square", vec![]),
        Err(EvalError::Arity { expected: 1, found: 0, .. })
    ));
    assert!(matches!(
        eval.call("example_module.square", vec![ScalarValue::I64(3).into()]),
        Err(EvalError::TypeMismatch(_))
    ));
    assert_eq!(
        eval.call("example_module.missing", vec![]),
        Err(EvalError::UnknownFunction("example_module.missing".into()))
    );
}
