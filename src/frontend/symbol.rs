//! Scoped symbol table used by the front end to resolve names. Every
//! identifier in the typed AST points at the [`Symbol`] it was resolved to.

use std::rc::Rc;

use hashbrown::HashMap;

use crate::{
    frontend::{Diagnostics, Position, SemanticError, intern::InternedSymbol},
    index::simple_index,
    middle::ty::Type,
};

simple_index! {
    /// Uniquely identifies a declared symbol within one compilation
    pub struct SymbolId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SymbolKind {
    Var,
    Array,
    Func,
}

/// Whether a variable lives in process-wide storage or in a function's frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Global,
    Local,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: InternedSymbol,
    pub ty: Type,
    pub kind: SymbolKind,
    pub storage: Storage,
}

impl Symbol {
    pub fn is_global(&self) -> bool {
        self.storage == Storage::Global
    }
}

/// Functions provided by the runtime library. They are visible in every
/// program without being declared.
pub fn builtin_functions() -> [(&'static str, Type); 6] {
    [
        ("readInt", Type::function([], Type::Int)),
        ("readChar", Type::function([], Type::Int)),
        ("printBool", Type::function([Type::Bool], Type::Void)),
        ("printInt", Type::function([Type::Int], Type::Void)),
        ("printChar", Type::function([Type::Int], Type::Void)),
        ("println", Type::function([], Type::Void)),
    ]
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<HashMap<InternedSymbol, Rc<Symbol>>>,
    next_id: u32,
    diagnostics: Diagnostics,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Creates a table with the global scope open and the built-in functions
    /// declared in it
    pub fn new() -> Self {
        let mut table = Self {
            scopes: vec![HashMap::new()],
            next_id: 0,
            diagnostics: Diagnostics::new(),
        };

        for (name, ty) in builtin_functions() {
            table.add(Position::default(), name, ty);
        }

        table
    }

    pub fn enter(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit(&mut self) {
        // the global scope is never closed
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Declares `name` in the innermost scope. A redeclaration is reported but
    /// still produces a fresh symbol so that checking can carry on.
    pub fn add(&mut self, position: Position, name: &str, ty: Type) -> Rc<Symbol> {
        let name = InternedSymbol::new(name);

        let kind = match ty {
            Type::Function { .. } => SymbolKind::Func,
            Type::Array { .. } => SymbolKind::Array,
            _ => SymbolKind::Var,
        };

        let storage = if self.scopes.len() == 1 {
            Storage::Global
        } else {
            Storage::Local
        };

        let symbol = Rc::new(Symbol {
            id: SymbolId(self.next_id),
            name,
            ty,
            kind,
            storage,
        });
        self.next_id += 1;

        let Some(scope) = self.scopes.last_mut() else {
            return symbol;
        };

        if scope.contains_key(&name) {
            self.diagnostics.report(SemanticError::Redeclared {
                position,
                name: name.value().to_owned(),
            });
        } else {
            scope.insert(name, symbol.clone());
        }

        symbol
    }

    /// Resolves `name` against the innermost scope that declares it
    pub fn lookup(&mut self, position: Position, name: &str) -> Option<Rc<Symbol>> {
        let name = InternedSymbol::new(name);

        let found = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name))
            .cloned();

        if found.is_none() {
            self.diagnostics.report(SemanticError::Undeclared {
                position,
                name: name.value().to_owned(),
            });
        }

        found
    }

    /// Like [`SymbolTable::lookup`], but an unresolved name still yields a
    /// symbol so that checking can carry on. The stand-in is an `int`
    /// variable which is not entered into any scope.
    pub fn resolve(&mut self, position: Position, name: &str) -> Rc<Symbol> {
        if let Some(symbol) = self.lookup(position, name) {
            return symbol;
        }

        let symbol = Rc::new(Symbol {
            id: SymbolId(self.next_id),
            name: InternedSymbol::new(name),
            ty: Type::Int,
            kind: SymbolKind::Var,
            storage: Storage::Global,
        });
        self.next_id += 1;

        symbol
    }

    pub fn has_encountered_error(&self) -> bool {
        self.diagnostics.has_encountered_error()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }
}
