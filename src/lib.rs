//! Middle and back end of a compiler for Crux, a small imperative language
//! with `int` and `bool` scalars, global arrays and functions. A typed AST
//! coming out of the front end is lowered to LIR, a control-flow graph of
//! simple instructions, which is then translated to x86-64 assembly.

use log::debug;

use crate::{
    backend::{
        CodegenOptions,
        targets::{CodeGenerator, Target},
    },
    error::CompileError,
    frontend::{Diagnostics, ast},
    middle::lir,
};

pub mod backend;
pub mod error;
pub mod frontend;
pub mod index;
pub mod middle;
pub mod samples;

/// Lowers a checked program to LIR. Nothing is lowered if the front end
/// reported any error.
pub fn lower(
    ast: &ast::DeclarationList,
    diagnostics: &Diagnostics,
) -> Result<lir::Program, CompileError> {
    if diagnostics.has_encountered_error() {
        debug!(
            "refusing to lower, {} semantic errors",
            diagnostics.errors().len()
        );
        return Err(CompileError::Semantic(diagnostics.errors().to_vec()));
    }

    Ok(lir::ast_lowering::lower_program(ast)?)
}

/// Runs the whole pipeline and returns the assembly listing for `target`
pub fn compile(
    ast: &ast::DeclarationList,
    diagnostics: &Diagnostics,
    target: Target,
    options: &CodegenOptions,
) -> Result<String, CompileError> {
    let program = lower(ast, diagnostics)?;
    let listing = target
        .get_code_generator()
        .translate_to_asm(&program, options)?;

    Ok(listing)
}
