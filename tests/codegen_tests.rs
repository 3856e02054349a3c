mod common;

use common::{Machine, init_logging};
use cruxc::{
    backend::{CodegenOptions, targets::Target},
    error::CompileError,
    frontend::{
        Position,
        ast::{BinaryOperatorKind, Declaration, DeclarationList, Expression, Statement},
        symbol::SymbolTable,
    },
    middle::{lir::InstructionKind, ty::Type},
    samples::Sample,
};
use pretty_assertions::assert_eq;
use strum::IntoEnumIterator;

fn compile_with(sample: Sample, options: &CodegenOptions) -> String {
    init_logging();

    let program = sample.build();
    cruxc::compile(
        &program.ast,
        &program.diagnostics,
        Target::x86_64LinuxGnu,
        options,
    )
    .unwrap()
}

fn compile(sample: Sample) -> String {
    compile_with(sample, &CodegenOptions::default())
}

fn run(sample: Sample) -> Machine {
    let mut machine = Machine::load(&compile(sample));
    machine.run_main();
    machine
}

fn output(machine: &Machine) -> Vec<&str> {
    machine.output().iter().map(String::as_str).collect()
}

#[test]
fn add_lowers_to_one_add_and_one_return() {
    let program = Sample::Add.build();
    let lir = cruxc::lower(&program.ast, &program.diagnostics).unwrap();
    let f = lir.function("f").unwrap();

    let count = |pred: fn(&InstructionKind) -> bool| {
        f.instructions.iter().filter(|i| pred(&i.kind)).count()
    };

    assert_eq!(f.arguments.len(), 2);
    assert_eq!(
        count(|k| matches!(k, InstructionKind::BinaryOperation { .. })),
        1
    );
    assert_eq!(count(|k| matches!(k, InstructionKind::Return { .. })), 1);
}

#[test]
fn add_returns_five_for_two_and_three() {
    let mut machine = Machine::load(&compile(Sample::Add));

    assert_eq!(machine.call("f", &[2, 3]), 5);
    assert_eq!(machine.call("f", &[-7, 3]), -4);
}

#[test]
fn add_sample_prints_result() {
    let machine = run(Sample::Add);

    assert_eq!(output(&machine), vec!["5", "\n"]);
}

#[test]
fn else_branch_leaves_y_two() {
    let machine = run(Sample::Branch);

    assert_eq!(machine.global("y", 0), 2);
    assert_eq!(output(&machine), vec!["2"]);
}

#[test]
fn loop_back_edge_is_taken_five_times() {
    let listing = compile(Sample::Sum);

    // the back-edge is the only unconditional jump in the function
    let back_edges = listing
        .lines()
        .filter_map(|line| line.trim().strip_prefix("jmp "))
        .collect::<Vec<_>>();
    assert_eq!(back_edges.len(), 1);
    let condition = back_edges[0];

    let mut machine = Machine::load(&listing);
    machine.run_main();

    assert_eq!(machine.jumps_to(condition), 5);
    // once on entry plus once per back-edge
    assert_eq!(machine.visits(condition), 6);
    assert_eq!(output(&machine), vec!["15"]);
}

#[test]
fn short_circuit_skips_side_effects() {
    let machine = run(Sample::ShortCircuit);

    assert_eq!(output(&machine), vec!["false", "false", "true", "true"]);
    assert_eq!(machine.calls_to("touch"), 1);
}

#[test]
fn array_elements_are_stored_and_loaded() {
    let machine = run(Sample::Arrays);

    assert_eq!(output(&machine), vec!["7", "9"]);
    assert_eq!(
        (0..4).map(|i| machine.global("a", i)).collect::<Vec<_>>(),
        vec![0, 7, 4, 9]
    );
}

#[test]
fn arguments_past_six_travel_on_the_stack() {
    let listing = compile(Sample::ManyArgs);
    let mut machine = Machine::load(&listing);

    assert_eq!(machine.call("weigh", &[1, 2, 3, 4, 5, 6, 7, 8]), 891);

    machine.run_main();
    assert_eq!(output(&machine), vec!["891"]);
}

#[test]
fn break_leaves_the_loop() {
    let machine = run(Sample::Break);

    assert_eq!(output(&machine), vec!["0", "1", "2", "3"]);
}

#[test]
fn builtin_input_is_read() {
    let mut machine = Machine::load(&compile(Sample::Double)).with_input([21]);
    machine.run_main();

    assert_eq!(output(&machine), vec!["42"]);
}

#[test]
fn every_sample_main_exits_with_zero() {
    for sample in Sample::iter().filter(|s| *s != Sample::Undeclared) {
        let mut machine = Machine::load(&compile(sample));

        assert_eq!(machine.run_main(), 0, "{sample}");
    }
}

#[test]
fn debug_info_does_not_change_behavior() {
    let listing = compile_with(
        Sample::Sum,
        &CodegenOptions {
            emit_debug_info: true,
        },
    );
    assert!(listing.lines().any(|line| line.trim().starts_with('#')));

    let mut machine = Machine::load(&listing);
    machine.run_main();

    assert_eq!(output(&machine), vec!["15"]);
}

#[test]
fn listing_is_deterministic() {
    for sample in Sample::iter().filter(|s| *s != Sample::Undeclared) {
        assert_eq!(compile(sample), compile(sample), "{sample}");
    }
}

#[test]
fn undeclared_name_aborts_before_codegen() {
    let program = Sample::Undeclared.build();

    let result = cruxc::compile(
        &program.ast,
        &program.diagnostics,
        Target::x86_64LinuxGnu,
        &CodegenOptions::default(),
    );

    let Err(CompileError::Semantic(errors)) = &result else {
        panic!("expected semantic errors, got {result:?}");
    };
    assert_eq!(
        errors[0].to_string(),
        "ResolveSymbolError(line 2)[Could not find z.]"
    );
}

// func compare(a: int, b: int): void {
//     printBool(a == b); printBool(a != b); printBool(a < b);
//     printBool(a <= b); printBool(a > b); printBool(a >= b);
//     printBool(!(a < b));
// }
#[test]
fn comparisons_and_not() {
    init_logging();

    let mut table = SymbolTable::new();
    let at = Position::new(1);

    let compare = table.add(
        at,
        "compare",
        Type::function([Type::Int, Type::Int], Type::Void),
    );
    table.enter();
    let a = table.add(at, "a", Type::Int);
    let b = table.add(at, "b", Type::Int);
    let print_bool = table.resolve(at, "printBool");

    let predicate =
        |operator| Expression::binary(operator, Expression::var(&a), Expression::var(&b));
    let mut body = [
        BinaryOperatorKind::Equals,
        BinaryOperatorKind::NotEquals,
        BinaryOperatorKind::LessThan,
        BinaryOperatorKind::LessThanOrEqualTo,
        BinaryOperatorKind::GreaterThan,
        BinaryOperatorKind::GreaterThanOrEqualTo,
    ]
    .into_iter()
    .map(|operator| Statement::call(&print_bool, vec![predicate(operator)]))
    .collect::<Vec<_>>();
    body.push(Statement::call(
        &print_bool,
        vec![Expression::not(predicate(BinaryOperatorKind::LessThan))],
    ));
    table.exit();

    let ast = DeclarationList::new(vec![Declaration::function(
        &compare,
        vec![a.clone(), b.clone()],
        body,
    )]);
    let listing = cruxc::compile(
        &ast,
        table.diagnostics(),
        Target::x86_64LinuxGnu,
        &CodegenOptions::default(),
    )
    .unwrap();

    let mut machine = Machine::load(&listing);
    machine.call("compare", &[1, 2]);
    machine.call("compare", &[3, 3]);

    assert_eq!(
        output(&machine),
        vec![
            "false", "true", "true", "true", "false", "false", "false", //
            "true", "false", "false", "true", "false", "true", "true",
        ]
    );
}

// int rcx;
// func rax(offset: int): int { rcx = offset; return rcx + 1; }
// func main(): void { printInt(rax(4)); }
#[test]
fn register_named_symbols_run() {
    init_logging();

    let mut table = SymbolTable::new();
    let at = Position::new(1);

    let rcx = table.add(at, "rcx", Type::Int);
    let rax = table.add(at, "rax", Type::function([Type::Int], Type::Int));
    table.enter();
    let offset = table.add(at, "offset", Type::Int);
    let rax_body = vec![
        Statement::assign(Expression::var(&rcx), Expression::var(&offset)),
        Statement::ret(Some(Expression::binary(
            BinaryOperatorKind::Add,
            Expression::var(&rcx),
            Expression::int(1),
        ))),
    ];
    table.exit();

    let main = table.add(at, "main", Type::function([], Type::Void));
    table.enter();
    let print_int = table.resolve(at, "printInt");
    let main_body = vec![Statement::call(
        &print_int,
        vec![Expression::call(&rax, vec![Expression::int(4)])],
    )];
    table.exit();

    let ast = DeclarationList::new(vec![
        Declaration::variable(&rcx),
        Declaration::function(&rax, vec![offset], rax_body),
        Declaration::function(&main, vec![], main_body),
    ]);
    let listing = cruxc::compile(
        &ast,
        table.diagnostics(),
        Target::x86_64LinuxGnu,
        &CodegenOptions::default(),
    )
    .unwrap();

    assert!(listing.contains("lea rax, [rip + _rcx]"));
    assert!(listing.contains("call _rax"));

    let mut machine = Machine::load(&listing);
    assert_eq!(machine.run_main(), 0);
    assert_eq!(output(&machine), vec!["5"]);
    assert_eq!(machine.global("rcx", 0), 4);
    assert_eq!(machine.calls_to("rax"), 1);
}
