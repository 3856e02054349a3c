//! The backend turns LIR into assembly text. Every temporary gets its own
//! stack slot and each instruction becomes a short sequence of machine
//! instructions moving operands through scratch registers. Control flow is
//! laid out as fall-through chains with labels only where they are needed.

pub mod assemblers;
pub mod layout;
pub mod targets;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Echo every LIR instruction as a comment above its assembly
    pub emit_debug_info: bool,
}
