//! The middle of the compiler: semantic types and the lowering of the typed
//! AST to LIR, a flat control-flow graph of simple instructions.

pub mod lir;
pub mod ty;
