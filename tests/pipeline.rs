use hastyc::{
    CompileOutput, compile,
    diagnostics::DiagnosticKind,
    frontend::ast::{BinaryOperatorKind, Package, UnaryOperatorKind, build::AstBuilder},
    middle::primitive::IntKind,
    session::CompileOptions,
};
use indoc::indoc;
use pretty_assertions::assert_eq;
use tracing_subscriber::EnvFilter;

fn run(package: &Package, options: CompileOptions) -> CompileOutput {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    compile(package, options).expect("compilation never fails internally")
}

fn kinds(output: &CompileOutput) -> Vec<DiagnosticKind> {
    output.diagnostics.iter().map(|d| d.kind).collect()
}

/// The MIR of the body named `name`, without colors
fn listing(output: &CompileOutput, name: &str) -> String {
    let program = output.mir.as_ref().expect("MIR is emitted by default");
    let body = program
        .bodies
        .values()
        .find(|body| body.name == name)
        .unwrap_or_else(|| panic!("no body named `{name}`"));

    strip_ansi_escapes::strip_str(body.display(&output.definitions).to_string())
}

fn lowered_names(output: &CompileOutput) -> Vec<String> {
    output
        .mir
        .iter()
        .flat_map(|program| program.bodies.values())
        .map(|body| body.name.clone())
        .collect()
}

#[test]
fn parameter_arithmetic() {
    let b = AstBuilder::new();
    let function = b
        .function("increment")
        .ordered_param("a", b.ty("i32"))
        .body(vec![b.bare(b.binary(b.var("a"), BinaryOperatorKind::Add, b.int(1)))]);
    let output = run(&b.package(Some("app"), vec![function]), CompileOptions::default());

    assert_eq!(kinds(&output), vec![]);
    assert_eq!(
        listing(&output, "app::increment"),
        indoc! {"
            fn app::increment(%0: i32) -> i32 {
            bb0:
                %1 = %0 + 1_i32
                return %1
            }"}
    );
}

#[test]
fn deferred_literal_takes_the_width_of_its_partner() {
    let b = AstBuilder::new();
    let function = b.function("f").body(vec![
        b.let_("x", b.int(5)),
        b.let_typed("y", b.ty("i64"), Some(b.int(10))),
        b.bare(b.binary(b.var("x"), BinaryOperatorKind::Add, b.var("y"))),
    ]);
    let output = run(&b.package(Some("app"), vec![function]), CompileOptions::default());

    assert_eq!(kinds(&output), vec![]);
    assert_eq!(
        listing(&output, "app::f"),
        indoc! {"
            fn app::f() -> i64 {
            bb0:
                %0 = 5_i64
                %1 = 10_i64
                %2 = %0 + %1
                return %2
            }"}
    );
}

#[test]
fn shadowing_through_a_typed_let() {
    let b = AstBuilder::new();
    let function = b.function("f").returns(b.ty("i64")).body(vec![
        b.let_("x", b.int(1)),
        b.let_typed("x", b.ty("i64"), Some(b.var("x"))),
        b.bare(b.var("x")),
    ]);
    let output = run(&b.package(Some("app"), vec![function]), CompileOptions::default());

    assert_eq!(kinds(&output), vec![]);
    assert_eq!(
        listing(&output, "app::f"),
        indoc! {"
            fn app::f() -> i64 {
            bb0:
                %0 = 1_i64
                %1 = %0
                return %1
            }"}
    );
}

#[test]
fn default_integer_width_is_configurable() {
    let b = AstBuilder::new();
    let function = b.function("f").body(vec![b.let_("a", b.int(7))]);
    let package = b.package(Some("app"), vec![function]);

    let narrow = run(&package, CompileOptions::default());
    let wide = run(
        &package,
        CompileOptions {
            default_integer: IntKind::I64,
            ..CompileOptions::default()
        },
    );

    assert!(listing(&narrow, "app::f").contains("%0 = 7_i32"));
    assert_eq!(
        listing(&wide, "app::f"),
        indoc! {"
            fn app::f() -> () {
            bb0:
                %0 = 7_i64
                return ()
            }"}
    );
}

#[test]
fn guard_lowers_like_a_negated_if() {
    let b = AstBuilder::new();
    let adult = |b: &AstBuilder| {
        b.binary(
            b.var("age"),
            BinaryOperatorKind::GreaterThanOrEqualTo,
            b.int(18),
        )
    };

    let guarded = b
        .function("guarded")
        .ordered_param("age", b.ty("i32"))
        .body(vec![b.semi(b.guard(adult(&b)))]);
    let explicit = b
        .function("explicit")
        .ordered_param("age", b.ty("i32"))
        .body(vec![b.semi(b.if_(
            b.unary(UnaryOperatorKind::LogicalNot, adult(&b)),
            b.block(vec![b.bare(b.return_(None))]),
            None,
        ))]);
    let output = run(
        &b.package(Some("app"), vec![guarded, explicit]),
        CompileOptions::default(),
    );

    assert_eq!(kinds(&output), vec![]);
    assert_eq!(
        listing(&output, "app::guarded").replace("guarded", "checked"),
        listing(&output, "app::explicit").replace("explicit", "checked")
    );
}

#[test]
fn broken_bodies_do_not_stop_the_rest() {
    let b = AstBuilder::new();
    let broken = b
        .function("broken")
        .body(vec![b.let_("v", b.var("missing"))]);
    let fine = b.function("fine").returns(b.ty("i32")).body(vec![b.bare(b.int(1))]);
    let output = run(&b.package(Some("app"), vec![broken, fine]), CompileOptions::default());

    assert!(output.has_errors());
    assert_eq!(kinds(&output), vec![DiagnosticKind::UnresolvedName]);
    assert_eq!(lowered_names(&output), vec!["app::fine".to_string()]);
}

#[test]
fn unused_imports_are_counted_not_reported() {
    let b = AstBuilder::new();
    let outer = b.module(
        "a",
        vec![b.public(b.module(
            "b",
            vec![b.public(b.function("thing").body(vec![]))],
        ))],
    );
    let import = b.import("a::b");
    let output = run(&b.package(Some("app"), vec![outer, import]), CompileOptions::default());

    assert_eq!(kinds(&output), vec![]);
    assert_eq!(output.unused_imports, 1);
}

#[test]
fn missing_item_behind_an_import_is_a_path_error() {
    let b = AstBuilder::new();
    let outer = b.module("a", vec![b.public(b.module("b", vec![]))]);
    let import = b.import("a::b");
    let function = b
        .function("f")
        .body(vec![b.semi(b.call(b.var("b::thing"), vec![]))]);
    let output = run(
        &b.package(Some("app"), vec![outer, import, function]),
        CompileOptions::default(),
    );

    assert_eq!(kinds(&output), vec![DiagnosticKind::PathError]);
    assert_eq!(output.unused_imports, 0);
}

#[test]
fn self_referential_constant_is_a_cycle() {
    let b = AstBuilder::new();
    let constant = b.constant(
        "X",
        None,
        b.binary(b.var("X"), BinaryOperatorKind::Add, b.int(1)),
    );
    let output = run(&b.package(Some("app"), vec![constant]), CompileOptions::default());

    assert_eq!(kinds(&output), vec![DiagnosticKind::CyclicDependency]);
    assert!(lowered_names(&output).is_empty());
}

#[test]
fn output_does_not_depend_on_the_number_of_jobs() {
    let b = AstBuilder::new();
    let mut items = (0..8)
        .map(|index| {
            b.function(&format!("f{index}"))
                .ordered_param("a", b.ty("i64"))
                .body(vec![b.bare(b.binary(b.var("a"), BinaryOperatorKind::Multiply, b.int(index)))])
        })
        .collect::<Vec<_>>();
    items.push(b.function("bad").body(vec![b.let_typed("x", b.ty("bool"), Some(b.int(1)))]));
    let package = b.package(Some("app"), items);

    let serial = run(&package, CompileOptions::default());
    let parallel = run(
        &package,
        CompileOptions {
            jobs: 4,
            ..CompileOptions::default()
        },
    );

    assert_eq!(serial.diagnostics, parallel.diagnostics);
    assert_eq!(serial.mir_listing(), parallel.mir_listing());
    assert_eq!(kinds(&serial), vec![DiagnosticKind::TypeMismatch]);
}

#[test]
fn stray_items_in_impl_blocks_are_skipped() {
    let b = AstBuilder::new();
    let structure = b.structure("Point", &[], vec![("x", b.ty("i32"))]);
    let methods = b.impl_block(
        &[],
        b.ty("Point"),
        vec![
            b.constant("ORIGIN", Some(b.ty("i32")), b.int(0)),
            b.function("x")
                .self_param()
                .returns(b.ty("i32"))
                .body(vec![b.bare(b.field(b.var("self"), "x"))]),
        ],
    );
    let output = run(
        &b.package(Some("app"), vec![structure, methods]),
        CompileOptions::default(),
    );

    assert_eq!(kinds(&output), vec![DiagnosticKind::InvalidItem]);
    assert_eq!(lowered_names(&output), vec!["app::x".to_string()]);
}
