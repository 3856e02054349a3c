//! Small Crux programs built directly as typed ASTs, the way the front end
//! would hand them over. They drive the command line tool and the end to end
//! tests.

use std::rc::Rc;

use crate::{
    frontend::{
        Diagnostics, Position,
        ast::{Assignment, BinaryOperatorKind, Declaration, DeclarationList, Expression, Statement},
        symbol::{Symbol, SymbolTable},
    },
    middle::ty::Type,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum Sample {
    Add,
    Branch,
    Sum,
    ShortCircuit,
    Arrays,
    ManyArgs,
    Break,
    Double,
    Undeclared,
}

/// A typed AST together with whatever the front end reported while building it
#[derive(Debug)]
pub struct SampleProgram {
    pub ast: DeclarationList,
    pub diagnostics: Diagnostics,
}

impl Sample {
    pub fn description(self) -> &'static str {
        match self {
            Sample::Add => "func f(a, b) returning a + b, printed for f(2, 3)",
            Sample::Branch => "if (x > 0) y = 1 else y = 2, with x = -1",
            Sample::Sum => "for loop summing 1..5 into an accumulator",
            Sample::ShortCircuit => "&& and || skipping a call with a side effect",
            Sample::Arrays => "global array writes, reads and a[a[1]] = 7",
            Sample::ManyArgs => "call passing eight arguments, two on the stack",
            Sample::Break => "loop left early with break",
            Sample::Double => "reads an int and prints twice its value",
            Sample::Undeclared => "uses an undeclared variable, rejected before lowering",
        }
    }

    pub fn build(self) -> SampleProgram {
        let mut table = SymbolTable::new();

        let declarations = match self {
            Sample::Add => add(&mut table),
            Sample::Branch => branch(&mut table),
            Sample::Sum => sum(&mut table),
            Sample::ShortCircuit => short_circuit(&mut table),
            Sample::Arrays => arrays(&mut table),
            Sample::ManyArgs => many_args(&mut table),
            Sample::Break => early_break(&mut table),
            Sample::Double => double(&mut table),
            Sample::Undeclared => undeclared(&mut table),
        };

        SampleProgram {
            ast: DeclarationList::new(declarations),
            diagnostics: table.into_diagnostics(),
        }
    }
}

const fn line(n: u32) -> Position {
    Position::new(n)
}

fn main_symbol(table: &mut SymbolTable, at: u32) -> Rc<Symbol> {
    table.add(line(at), "main", Type::function([], Type::Void))
}

fn int(value: i64) -> Expression {
    Expression::int(value)
}

fn var(symbol: &Rc<Symbol>) -> Expression {
    Expression::var(symbol)
}

fn binary(operator: BinaryOperatorKind, lhs: Expression, rhs: Expression) -> Expression {
    Expression::binary(operator, lhs, rhs)
}

/// `for (i = from; i < to; i = i + 1)`, or `<=` when `inclusive`
fn counting_loop(
    i: &Rc<Symbol>,
    from: i64,
    to: i64,
    inclusive: bool,
    body: Vec<Statement>,
) -> Statement {
    let comparison = if inclusive {
        BinaryOperatorKind::LessThanOrEqualTo
    } else {
        BinaryOperatorKind::LessThan
    };

    Statement::for_loop(
        Assignment::new(var(i), int(from)),
        binary(comparison, var(i), int(to)),
        Assignment::new(var(i), binary(BinaryOperatorKind::Add, var(i), int(1))),
        body,
    )
}

// func f(a: int, b: int): int { return a + b; }
// func main(): void { printInt(f(2, 3)); println(); }
fn add(table: &mut SymbolTable) -> Vec<Declaration> {
    let f = table.add(line(1), "f", Type::function([Type::Int, Type::Int], Type::Int));
    table.enter();
    let a = table.add(line(1), "a", Type::Int);
    let b = table.add(line(1), "b", Type::Int);
    let f_body = vec![
        Statement::ret(Some(binary(BinaryOperatorKind::Add, var(&a), var(&b)))).at(line(2)),
    ];
    table.exit();

    let main = main_symbol(table, 5);
    table.enter();
    let print_int = table.resolve(line(6), "printInt");
    let println = table.resolve(line(7), "println");
    let main_body = vec![
        Statement::call(&print_int, vec![Expression::call(&f, vec![int(2), int(3)])]).at(line(6)),
        Statement::call(&println, vec![]).at(line(7)),
    ];
    table.exit();

    vec![
        Declaration::function(&f, vec![a, b], f_body),
        Declaration::function(&main, vec![], main_body),
    ]
}

// int y;
// func main(): void {
//     int x;
//     x = -1;
//     if (x > 0) { y = 1; } else { y = 2; }
//     printInt(y);
// }
fn branch(table: &mut SymbolTable) -> Vec<Declaration> {
    let y = table.add(line(1), "y", Type::Int);

    let main = main_symbol(table, 2);
    table.enter();
    let x = table.add(line(3), "x", Type::Int);
    let print_int = table.resolve(line(6), "printInt");
    let body = vec![
        Statement::declare(&x).at(line(3)),
        Statement::assign(var(&x), int(-1)).at(line(4)),
        Statement::if_else(
            binary(BinaryOperatorKind::GreaterThan, var(&x), int(0)),
            vec![Statement::assign(var(&y), int(1))],
            Some(vec![Statement::assign(var(&y), int(2))]),
        )
        .at(line(5)),
        Statement::call(&print_int, vec![var(&y)]).at(line(6)),
    ];
    table.exit();

    vec![
        Declaration::variable(&y),
        Declaration::function(&main, vec![], body),
    ]
}

// func main(): void {
//     int i;
//     int sum;
//     sum = 0;
//     for (i = 1; i <= 5; i = i + 1) { sum = sum + i; }
//     printInt(sum);
// }
fn sum(table: &mut SymbolTable) -> Vec<Declaration> {
    let main = main_symbol(table, 1);
    table.enter();
    let i = table.add(line(2), "i", Type::Int);
    let total = table.add(line(3), "sum", Type::Int);
    let print_int = table.resolve(line(6), "printInt");
    let body = vec![
        Statement::declare(&i).at(line(2)),
        Statement::declare(&total).at(line(3)),
        Statement::assign(var(&total), int(0)).at(line(4)),
        counting_loop(
            &i,
            1,
            5,
            true,
            vec![Statement::assign(
                var(&total),
                binary(BinaryOperatorKind::Add, var(&total), var(&i)),
            )],
        )
        .at(line(5)),
        Statement::call(&print_int, vec![var(&total)]).at(line(6)),
    ];
    table.exit();

    vec![Declaration::function(&main, vec![], body)]
}

// bool touched;
// func touch(): bool { touched = true; return true; }
// func main(): void {
//     bool r;
//     touched = false;
//     r = false && touch(); printBool(touched);
//     r = true || touch();  printBool(touched);
//     r = true && touch();  printBool(touched);
//     printBool(r);
// }
fn short_circuit(table: &mut SymbolTable) -> Vec<Declaration> {
    let touched = table.add(line(1), "touched", Type::Bool);

    let touch = table.add(line(2), "touch", Type::function([], Type::Bool));
    table.enter();
    let touch_body = vec![
        Statement::assign(var(&touched), Expression::bool(true)),
        Statement::ret(Some(Expression::bool(true))),
    ];
    table.exit();

    let main = main_symbol(table, 3);
    table.enter();
    let r = table.add(line(4), "r", Type::Bool);
    let print_bool = table.resolve(line(6), "printBool");

    let attempt = |operator, lhs, at| {
        [
            Statement::assign(
                var(&r),
                binary(operator, Expression::bool(lhs), Expression::call(&touch, vec![])),
            )
            .at(line(at)),
            Statement::call(&print_bool, vec![var(&touched)]).at(line(at)),
        ]
    };

    let mut body = vec![
        Statement::declare(&r).at(line(4)),
        Statement::assign(var(&touched), Expression::bool(false)).at(line(5)),
    ];
    body.extend(attempt(BinaryOperatorKind::LogicalAnd, false, 6));
    body.extend(attempt(BinaryOperatorKind::LogicalOr, true, 7));
    body.extend(attempt(BinaryOperatorKind::LogicalAnd, true, 8));
    body.push(Statement::call(&print_bool, vec![var(&r)]).at(line(9)));
    table.exit();

    vec![
        Declaration::variable(&touched),
        Declaration::function(&touch, vec![], touch_body),
        Declaration::function(&main, vec![], body),
    ]
}

// int a[4];
// func main(): void {
//     int i;
//     for (i = 0; i < 4; i = i + 1) { a[i] = i * i; }
//     a[a[1]] = 7;
//     printInt(a[1]);
//     printInt(a[3]);
// }
fn arrays(table: &mut SymbolTable) -> Vec<Declaration> {
    let a = table.add(line(1), "a", Type::array(Type::Int, 4));

    let main = main_symbol(table, 2);
    table.enter();
    let i = table.add(line(3), "i", Type::Int);
    let print_int = table.resolve(line(6), "printInt");
    let body = vec![
        Statement::declare(&i).at(line(3)),
        counting_loop(
            &i,
            0,
            4,
            false,
            vec![Statement::assign(
                Expression::index(&a, var(&i)),
                binary(BinaryOperatorKind::Multiply, var(&i), var(&i)),
            )],
        )
        .at(line(4)),
        Statement::assign(Expression::index(&a, Expression::index(&a, int(1))), int(7)).at(line(5)),
        Statement::call(&print_int, vec![Expression::index(&a, int(1))]).at(line(6)),
        Statement::call(&print_int, vec![Expression::index(&a, int(3))]).at(line(7)),
    ];
    table.exit();

    vec![
        Declaration::array(&a),
        Declaration::function(&main, vec![], body),
    ]
}

// func weigh(a, b, c, d, e, f, g, h: int): int {
//     return a + b + c + d + e + f + g * 10 + h * 100;
// }
// func main(): void { printInt(weigh(1, 2, 3, 4, 5, 6, 7, 8)); }
fn many_args(table: &mut SymbolTable) -> Vec<Declaration> {
    let weigh = table.add(
        line(1),
        "weigh",
        Type::function(std::iter::repeat_n(Type::Int, 8), Type::Int),
    );
    table.enter();
    let parameters = ["a", "b", "c", "d", "e", "f", "g", "h"]
        .into_iter()
        .map(|name| table.add(line(1), name, Type::Int))
        .collect::<Vec<_>>();

    let weighted = parameters.iter().enumerate().map(|(n, p)| match n {
        6 => binary(BinaryOperatorKind::Multiply, var(p), int(10)),
        7 => binary(BinaryOperatorKind::Multiply, var(p), int(100)),
        _ => var(p),
    });
    let total = weighted.reduce(|lhs, rhs| binary(BinaryOperatorKind::Add, lhs, rhs));
    let weigh_body = vec![Statement::ret(total).at(line(2))];
    table.exit();

    let main = main_symbol(table, 4);
    table.enter();
    let print_int = table.resolve(line(4), "printInt");
    let arguments = (1..=8).map(int).collect();
    let main_body = vec![
        Statement::call(&print_int, vec![Expression::call(&weigh, arguments)]).at(line(4)),
    ];
    table.exit();

    vec![
        Declaration::function(&weigh, parameters, weigh_body),
        Declaration::function(&main, vec![], main_body),
    ]
}

// func main(): void {
//     int i;
//     for (i = 0; i < 100; i = i + 1) {
//         if (!(i < 3)) { break; }
//         printInt(i / 1);
//     }
//     printInt(i);
// }
fn early_break(table: &mut SymbolTable) -> Vec<Declaration> {
    let main = main_symbol(table, 1);
    table.enter();
    let i = table.add(line(2), "i", Type::Int);
    let print_int = table.resolve(line(5), "printInt");
    let body = vec![
        Statement::declare(&i).at(line(2)),
        counting_loop(
            &i,
            0,
            100,
            false,
            vec![
                Statement::if_else(
                    Expression::not(binary(BinaryOperatorKind::LessThan, var(&i), int(3))),
                    vec![Statement::brk().at(line(4))],
                    None,
                )
                .at(line(4)),
                Statement::call(
                    &print_int,
                    vec![binary(BinaryOperatorKind::Divide, var(&i), int(1))],
                )
                .at(line(5)),
            ],
        )
        .at(line(3)),
        Statement::call(&print_int, vec![var(&i)]).at(line(7)),
    ];
    table.exit();

    vec![Declaration::function(&main, vec![], body)]
}

// func main(): void {
//     int n;
//     n = readInt();
//     printInt(n * 2);
// }
fn double(table: &mut SymbolTable) -> Vec<Declaration> {
    let main = main_symbol(table, 1);
    table.enter();
    let n = table.add(line(2), "n", Type::Int);
    let read_int = table.resolve(line(3), "readInt");
    let print_int = table.resolve(line(4), "printInt");
    let body = vec![
        Statement::declare(&n).at(line(2)),
        Statement::assign(var(&n), Expression::call(&read_int, vec![])).at(line(3)),
        Statement::call(
            &print_int,
            vec![binary(BinaryOperatorKind::Multiply, var(&n), int(2))],
        )
        .at(line(4)),
    ];
    table.exit();

    vec![Declaration::function(&main, vec![], body)]
}

// func main(): void {
//     printInt(z);
// }
fn undeclared(table: &mut SymbolTable) -> Vec<Declaration> {
    let main = main_symbol(table, 1);
    table.enter();
    let print_int = table.resolve(line(2), "printInt");
    let z = table.resolve(line(2), "z");
    let body = vec![Statement::call(&print_int, vec![var(&z)]).at(line(2))];
    table.exit();

    vec![Declaration::function(&main, vec![], body)]
}
