use core::fmt::Write;

use colored::Colorize;
use itertools::Itertools;

use crate::{index::Index, middle::lir};

/// Renders the whole program as colored text, one instruction per line in
/// arena order, with each instruction's outgoing edges.
pub fn pretty_print_program(program: &lir::Program) -> String {
    let mut output = String::new();

    for global in &program.globals {
        let _ = writeln!(
            output,
            "{} {}[{}]",
            "global".magenta(),
            global.symbol_name.value().blue(),
            global.element_count.to_string().purple()
        );
    }

    if !program.globals.is_empty() {
        output.push('\n');
    }

    output.push_str(
        &program
            .functions
            .iter()
            .map(pretty_print_function)
            .join("\n"),
    );

    output
}

pub fn pretty_print_function(function: &lir::FunctionDefinition) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{} {}{}{}{} {} {}",
        "fn".magenta(),
        function.symbol_name.value().blue(),
        "(".white(),
        function.arguments.iter().map(|arg| arg.to_string()).join(", "),
        ")".white(),
        function.return_type().to_string().white(),
        "{".white()
    );

    for (id, instruction) in function.instructions.enumerate() {
        let marker = if id == function.entry { ">" } else { " " };

        let edges = match (
            instruction.next(lir::Edge::Next),
            instruction.next(lir::Edge::True),
        ) {
            (None, None) => String::new(),
            (Some(next), None) => format!("  -> {next}"),
            (Some(next), Some(taken)) => format!("  -> {taken} | {next}"),
            (None, Some(taken)) => format!("  -> {taken} | ?"),
        };

        let _ = writeln!(
            output,
            "{marker} {}: {}{}",
            id.to_string().bright_red(),
            instruction.kind,
            edges.white()
        );
    }

    output.push_str(&"}".white().to_string());
    output.push('\n');

    output
}

impl core::fmt::Display for lir::InstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            lir::InstructionKind::Nop => write!(f, "{}", "nop".cyan()),
            lir::InstructionKind::Copy {
                destination,
                source,
            } => write!(f, "{destination} {} {source}", "=".white()),
            lir::InstructionKind::BinaryOperation {
                operator,
                destination,
                lhs,
                rhs,
            } => write!(
                f,
                "{destination} {} {} {lhs}, {rhs}",
                "=".white(),
                operator.to_string().cyan()
            ),
            lir::InstructionKind::Compare {
                predicate,
                destination,
                lhs,
                rhs,
            } => write!(
                f,
                "{destination} {} {} {} {lhs}, {rhs}",
                "=".white(),
                "cmp".cyan(),
                predicate.to_string().cyan()
            ),
            lir::InstructionKind::UnaryNot {
                destination,
                operand,
            } => write!(f, "{destination} {} {} {operand}", "=".white(), "not".cyan()),
            lir::InstructionKind::AddressAt {
                destination,
                base,
                offset: Some(offset),
            } => write!(
                f,
                "{destination} {} {} {}[{offset}]",
                "=".white(),
                "addressat".cyan(),
                base.value().blue()
            ),
            lir::InstructionKind::AddressAt {
                destination,
                base,
                offset: None,
            } => write!(
                f,
                "{destination} {} {} {}",
                "=".white(),
                "addressat".cyan(),
                base.value().blue()
            ),
            lir::InstructionKind::Load {
                destination,
                source,
            } => write!(f, "{destination} {} {} {source}", "=".white(), "load".cyan()),
            lir::InstructionKind::Store {
                source,
                destination,
            } => write!(
                f,
                "{} {destination} {} {source}",
                "store".cyan(),
                "<-".white()
            ),
            lir::InstructionKind::Call {
                destination,
                callee,
                arguments,
            } => {
                if let Some(dest) = destination {
                    write!(f, "{dest} {} ", "=".white())?;
                }

                write!(
                    f,
                    "{} {}({})",
                    "call".cyan(),
                    callee.value().blue(),
                    arguments.iter().map(|arg| arg.to_string()).join(", ")
                )
            }
            lir::InstructionKind::Jump { predicate } => {
                write!(f, "{} {predicate}", "jump".cyan())
            }
            lir::InstructionKind::Return { value: Some(value) } => {
                write!(f, "{} {value}", "ret".cyan())
            }
            lir::InstructionKind::Return { value: None } => write!(f, "{}", "ret".cyan()),
        }
    }
}

impl core::fmt::Display for lir::InstructionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, ".i{}", self.index())
    }
}

impl core::fmt::Display for lir::LocalVarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("%{}", self.index()).yellow())
    }
}

impl core::fmt::Display for lir::AddressVarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", format!("&{}", self.index()).green())
    }
}

impl core::fmt::Display for lir::Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            lir::Constant::Int(value) => write!(f, "{value}"),
            lir::Constant::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl core::fmt::Display for lir::Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            lir::Value::Constant(constant) => write!(f, "{}", constant.to_string().purple()),
            lir::Value::Local(id) => write!(f, "{id}"),
            lir::Value::Address(id) => write!(f, "{id}"),
        }
    }
}

impl core::fmt::Display for lir::Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            lir::Variable::Local(id) => write!(f, "{id}"),
            lir::Variable::Address(id) => write!(f, "{id}"),
        }
    }
}
