use std::{borrow::Cow, path::Path, process::Command};

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use log::{debug, trace};

use crate::{
    backend::{
        CodegenOptions,
        assemblers::x86_64::{Assembler, X86FullRegister},
        layout::{self, StackFrame},
        targets::CodeGenerator,
    },
    error::{InternalError, internal_error},
    frontend::symbol::builtin_functions,
    middle::lir::{self, ArithmeticOperator, Edge, InstructionId, InstructionKind, Predicate},
};

const ARG_REGS: &[X86FullRegister] = &[
    X86FullRegister::Rdi,
    X86FullRegister::Rsi,
    X86FullRegister::Rdx,
    X86FullRegister::Rcx,
    X86FullRegister::R8,
    X86FullRegister::R9,
];

/// Offset from `rbp` of the first argument passed on the stack, past the
/// saved `rbp` and the return address
const STACK_ARGS_OFFSET: u64 = 16;

/// The name a Crux global or function is known by in the listing. User
/// symbols get a `_` prefix so they can never be read as a register or an
/// operator keyword. `main` and the runtime functions keep their names so
/// they link against the C runtime.
pub fn assembly_name(name: &str) -> Cow<'_, str> {
    if name == "main" || builtin_functions().iter().any(|(builtin, _)| *builtin == name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("_{name}"))
    }
}

pub struct CodeGeneratorX86_64LinuxGnu;

impl CodeGenerator for CodeGeneratorX86_64LinuxGnu {
    fn translate_to_asm(
        &self,
        program: &lir::Program,
        options: &CodegenOptions,
    ) -> Result<String, InternalError> {
        let globals = program
            .globals
            .iter()
            .map(|global| {
                format!(
                    "    .comm {}, {}, {}",
                    assembly_name(global.symbol_name.value()),
                    global.size_in_bytes(),
                    global.element_width
                )
            })
            .join("\n");

        let function_bodies = program
            .functions
            .iter()
            .map(|f| codegen_function(f, options))
            .collect::<Result<Vec<_>, _>>()?
            .join("\n");

        let mut output = String::from("    .intel_syntax noprefix\n");

        if !globals.is_empty() {
            output.push_str(&globals);
            output.push('\n');
        }

        output.push_str("    .text\n");
        output.push_str(&function_bodies);
        output.push_str("    .section .note.GNU-stack,\"\",@progbits\n");

        Ok(output)
    }

    fn create_assembler_command(&self, input_file: &Path, output_file: &Path) -> Command {
        let mut cmd = Command::new("as");

        cmd.arg("--64").arg("-o").arg(output_file).arg(input_file);

        cmd
    }
}

fn codegen_function(
    function: &lir::FunctionDefinition,
    options: &CodegenOptions,
) -> Result<String, InternalError> {
    debug!("generating code for `{}`", function.symbol_name);

    let frame = StackFrame::new(function);
    let labels = layout::assign_labels(function);

    let mut assembler = Assembler::new(&frame);

    assembler.global_label(&assembly_name(function.symbol_name.value()));
    assembler.function_prologue(frame.size());

    /* Move the function arguments into their stack slots */

    for (i, arg) in function.arguments.iter().enumerate() {
        if options.emit_debug_info {
            assembler.comment(format!(
                "store arg {i} into {}",
                strip_ansi_escapes::strip_str(arg.to_string())
            ));
        }

        match ARG_REGS.get(i) {
            Some(&register) => assembler.store_variable(*arg, register)?,
            None => {
                let offset = STACK_ARGS_OFFSET + 8 * (i - ARG_REGS.len()) as u64;
                assembler.emit(format!("mov rax, [rbp + {offset}]"));
                assembler.store_variable(*arg, X86FullRegister::Rax)?;
            }
        }
    }

    /* Instructions, one fall-through chain at a time */

    let mut work_list = vec![function.entry];
    let mut visited = HashSet::new();

    while let Some(head) = work_list.pop() {
        // already emitted as part of an earlier chain and reached through its
        // label
        if visited.contains(&head) {
            continue;
        }

        let mut current = Some(head);

        while let Some(id) = current {
            if !visited.insert(id) {
                let label = label_of(&labels, id)?;
                assembler.emit(format!("jmp {label}"));
                break;
            }

            if let Some(label) = labels.get(&id) {
                assembler.label(label);
            }

            let instruction = function.instruction(id);
            trace!("emitting {id}: {}", instruction.kind);

            if options.emit_debug_info {
                assembler.comment(strip_ansi_escapes::strip_str(instruction.kind.to_string()));
            }

            emit_instruction(&mut assembler, &labels, instruction)?;

            if let InstructionKind::Jump { .. } = instruction.kind {
                let taken = instruction
                    .next(Edge::True)
                    .ok_or_else(|| internal_error!("jump {id} has no taken edge"))?;
                work_list.push(taken);
            }

            current = instruction.next(Edge::Next);

            if instruction.is_return() || current.is_none() {
                assembler.function_epilogue();
                break;
            }
        }
    }

    Ok(assembler.into_output())
}

fn label_of(
    labels: &HashMap<InstructionId, String>,
    id: InstructionId,
) -> Result<&str, InternalError> {
    labels
        .get(&id)
        .map(String::as_str)
        .ok_or_else(|| internal_error!("{id} is reached more than once but has no label"))
}

fn emit_instruction(
    assembler: &mut Assembler<'_>,
    labels: &HashMap<InstructionId, String>,
    instruction: &lir::Instruction,
) -> Result<(), InternalError> {
    match &instruction.kind {
        InstructionKind::Nop => {}
        InstructionKind::Copy {
            destination,
            source,
        } => {
            assembler.load_value(X86FullRegister::Rax, *source)?;
            assembler.store_variable(*destination, X86FullRegister::Rax)?;
        }
        InstructionKind::BinaryOperation {
            operator,
            destination,
            lhs,
            rhs,
        } => {
            assembler.load_variable(X86FullRegister::Rax, *lhs)?;
            assembler.load_variable(X86FullRegister::Rcx, *rhs)?;

            match operator {
                ArithmeticOperator::Add => assembler.emit("add rax, rcx"),
                ArithmeticOperator::Sub => assembler.emit("sub rax, rcx"),
                ArithmeticOperator::Mul => assembler.emit("imul rax, rcx"),
                ArithmeticOperator::Div => {
                    assembler.emit("cqo");
                    assembler.emit("idiv rcx");
                }
            }

            assembler.store_variable(*destination, X86FullRegister::Rax)?;
        }
        InstructionKind::Compare {
            predicate,
            destination,
            lhs,
            rhs,
        } => {
            let condition = match predicate {
                Predicate::Eq => "e",
                Predicate::Ne => "ne",
                Predicate::Lt => "l",
                Predicate::Le => "le",
                Predicate::Gt => "g",
                Predicate::Ge => "ge",
            };

            assembler.load_variable(X86FullRegister::Rax, *lhs)?;
            assembler.load_variable(X86FullRegister::Rcx, *rhs)?;
            assembler.emit("cmp rax, rcx");
            assembler.emit("mov rax, 0");
            assembler.emit("mov rdx, 1");
            assembler.emit(format!("cmov{condition} rax, rdx"));
            assembler.store_variable(*destination, X86FullRegister::Rax)?;
        }
        InstructionKind::UnaryNot {
            destination,
            operand,
        } => {
            assembler.load_variable(X86FullRegister::Rax, *operand)?;
            assembler.emit("xor rcx, rcx");
            assembler.emit("test rax, rax");
            assembler.emit(format!("sete {}", X86FullRegister::Rcx.as_8_bit()));
            assembler.store_variable(*destination, X86FullRegister::Rcx)?;
        }
        InstructionKind::AddressAt {
            destination,
            base,
            offset,
        } => {
            assembler.emit(format!("lea rax, [rip + {}]", assembly_name(base.value())));

            if let Some(offset) = offset {
                assembler.load_variable(X86FullRegister::Rcx, *offset)?;
                assembler.emit("lea rax, [rax + rcx*8]");
            }

            assembler.store_variable(*destination, X86FullRegister::Rax)?;
        }
        InstructionKind::Load {
            destination,
            source,
        } => {
            assembler.load_variable(X86FullRegister::Rax, *source)?;
            assembler.emit("mov rax, [rax]");
            assembler.store_variable(*destination, X86FullRegister::Rax)?;
        }
        InstructionKind::Store {
            source,
            destination,
        } => {
            assembler.load_variable(X86FullRegister::Rax, *source)?;
            assembler.load_variable(X86FullRegister::Rcx, *destination)?;
            assembler.emit("mov [rcx], rax");
        }
        InstructionKind::Call {
            destination,
            callee,
            arguments,
        } => {
            let stack_arguments = arguments.get(ARG_REGS.len()..).unwrap_or_default();
            // keep rsp 16-byte aligned at the call
            let padding = stack_arguments.len() % 2;

            if padding != 0 {
                assembler.emit("sub rsp, 8");
            }

            for arg in stack_arguments.iter().rev() {
                assembler.load_variable(X86FullRegister::Rax, *arg)?;
                assembler.emit("push rax");
            }

            for (arg, register) in arguments.iter().zip(ARG_REGS) {
                assembler.load_variable(*register, *arg)?;
            }

            assembler.emit(format!("call {}", assembly_name(callee.value())));

            if !stack_arguments.is_empty() {
                let popped = 8 * (stack_arguments.len() + padding);
                assembler.emit(format!("add rsp, {popped}"));
            }

            if let Some(destination) = destination {
                assembler.store_variable(*destination, X86FullRegister::Rax)?;
            }
        }
        InstructionKind::Jump { predicate } => {
            let taken = instruction
                .next(Edge::True)
                .ok_or_else(|| internal_error!("jump on {predicate} has no taken edge"))?;

            assembler.load_variable(X86FullRegister::Rax, *predicate)?;
            assembler.emit("cmp rax, 0");
            assembler.emit(format!("jne {}", label_of(labels, taken)?));
        }
        InstructionKind::Return { value } => {
            if let Some(value) = value {
                assembler.load_variable(X86FullRegister::Rax, *value)?;
            }
        }
    }

    Ok(())
}
