//! The data contract between the front end (parser, name resolution and type
//! checking) and the rest of the compiler. The front end hands over a fully
//! typed [`ast::DeclarationList`] together with the [`Diagnostics`] it collected
//! along the way.

use thiserror::Error;

pub mod ast;
pub mod intern;
pub mod symbol;

/// Location of a node in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
}

impl Position {
    pub const fn new(line: u32) -> Self {
        Self { line }
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(line {})", self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("ResolveSymbolError{position}[Could not find {name}.]")]
    Undeclared { position: Position, name: String },
    #[error("DeclareSymbolError{position}[{name} already exists.]")]
    Redeclared { position: Position, name: String },
    #[error("TypeError{position}[{message}]")]
    Type { position: Position, message: String },
}

impl SemanticError {
    pub fn position(&self) -> Position {
        match self {
            Self::Undeclared { position, .. }
            | Self::Redeclared { position, .. }
            | Self::Type { position, .. } => *position,
        }
    }
}

/// Errors collected by the front end. Checking keeps going after an error so
/// that as many as possible are reported, but a non-empty list stops the
/// pipeline before lowering.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    errors: Vec<SemanticError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: SemanticError) {
        log::debug!("semantic error: {error}");
        self.errors.push(error);
    }

    pub fn has_encountered_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<SemanticError> {
        self.errors
    }
}
