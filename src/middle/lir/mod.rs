//! LIR (Low-level Intermediate Representation). Control structures are
//! flattened into a graph of instructions linked by successor edges, and
//! expression trees are broken down into operations on fresh temporaries.
//!
//! Instructions live in a per-function arena and refer to each other by
//! [`InstructionId`]. Loops make the graph cyclic, so any traversal must track
//! visited nodes by id.

use crate::{
    frontend::intern::InternedSymbol,
    index::{IndexVec, simple_index},
    middle::ty::{self, Type},
};

pub mod ast_lowering;
pub mod pretty_print;

#[derive(Debug, Default)]
pub struct Program {
    pub globals: Vec<GlobalDecl>,
    pub functions: Vec<FunctionDefinition>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&FunctionDefinition> {
        self.functions
            .iter()
            .find(|f| f.symbol_name.value() == name)
    }
}

/// A named block of process-wide storage (a global scalar or array)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDecl {
    pub symbol_name: InternedSymbol,
    /// 1 for scalars, the extent for arrays
    pub element_count: u64,
    /// Width of one element in bytes
    pub element_width: u64,
}

impl GlobalDecl {
    pub fn new(symbol_name: InternedSymbol, ty: &Type) -> Self {
        Self {
            symbol_name,
            element_count: ty.element_count(),
            element_width: ty::SCALAR_WIDTH,
        }
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.element_count * self.element_width
    }
}

simple_index! {
    /// Identifies an instruction within its function's arena
    pub struct InstructionId;
}

simple_index! {
    /// Identifies a scalar temporary of a function
    pub struct LocalVarId;
}

simple_index! {
    /// Identifies a temporary which holds the address of some storage
    pub struct AddressVarId;
}

/// A temporary holding an `int` or `bool`. Its type is fixed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub id: LocalVarId,
    pub ty: Type,
}

/// A temporary holding the address of (an element of) a global
#[derive(Debug, Clone, PartialEq)]
pub struct AddressVar {
    pub id: AddressVarId,
    pub base: InternedSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Int(i64),
    Bool(bool),
}

impl Constant {
    /// The machine representation of the constant (booleans are 0 or 1)
    pub fn as_i64(self) -> i64 {
        match self {
            Constant::Int(v) => v,
            Constant::Bool(v) => v as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Constant(Constant),
    Local(LocalVarId),
    Address(AddressVarId),
}

/// Any temporary which needs a storage slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    Local(LocalVarId),
    Address(AddressVarId),
}

impl From<LocalVarId> for Variable {
    fn from(value: LocalVarId) -> Self {
        Self::Local(value)
    }
}

impl From<AddressVarId> for Variable {
    fn from(value: AddressVarId) -> Self {
        Self::Address(value)
    }
}

impl Value {
    pub fn as_variable(self) -> Option<Variable> {
        match self {
            Value::Constant(_) => None,
            Value::Local(id) => Some(Variable::Local(id)),
            Value::Address(id) => Some(Variable::Address(id)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ArithmeticOperator {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Predicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Index of an outgoing edge. Every instruction falls through along
/// [`Edge::Next`]; only [`InstructionKind::Jump`] uses [`Edge::True`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Fall-through, or the branch taken when a jump predicate is zero
    Next = 0,
    /// The branch taken when a jump predicate is non-zero
    True = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    /// Does nothing. Used as a merge point and as a label anchor.
    Nop,
    Copy {
        destination: LocalVarId,
        source: Value,
    },
    BinaryOperation {
        operator: ArithmeticOperator,
        destination: LocalVarId,
        lhs: LocalVarId,
        rhs: LocalVarId,
    },
    /// Writes 1 to `destination` if the predicate holds and 0 otherwise
    Compare {
        predicate: Predicate,
        destination: LocalVarId,
        lhs: LocalVarId,
        rhs: LocalVarId,
    },
    UnaryNot {
        destination: LocalVarId,
        operand: LocalVarId,
    },
    /// Address of the global `base`, or of `base[offset]` when an offset is
    /// given
    AddressAt {
        destination: AddressVarId,
        base: InternedSymbol,
        offset: Option<LocalVarId>,
    },
    Load {
        destination: LocalVarId,
        source: AddressVarId,
    },
    Store {
        source: LocalVarId,
        destination: AddressVarId,
    },
    Call {
        destination: Option<LocalVarId>,
        callee: InternedSymbol,
        arguments: Vec<LocalVarId>,
    },
    /// Two way branch on `predicate`
    Jump {
        predicate: LocalVarId,
    },
    Return {
        value: Option<LocalVarId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub kind: InstructionKind,
    next: [Option<InstructionId>; 2],
}

impl Instruction {
    pub fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            next: [None, None],
        }
    }

    pub fn next(&self, edge: Edge) -> Option<InstructionId> {
        self.next[edge as usize]
    }

    /// All outgoing edges, fall-through first
    pub fn successors(&self) -> impl Iterator<Item = InstructionId> + use<> {
        self.next.into_iter().flatten()
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, InstructionKind::Return { .. })
    }

    /// The temporary written by this instruction, if any
    pub fn defines(&self) -> Option<Variable> {
        match &self.kind {
            InstructionKind::Copy { destination, .. }
            | InstructionKind::BinaryOperation { destination, .. }
            | InstructionKind::Compare { destination, .. }
            | InstructionKind::UnaryNot { destination, .. }
            | InstructionKind::Load { destination, .. } => Some(Variable::Local(*destination)),
            InstructionKind::Call { destination, .. } => destination.map(Variable::Local),
            InstructionKind::AddressAt { destination, .. } => {
                Some(Variable::Address(*destination))
            }
            InstructionKind::Nop
            | InstructionKind::Store { .. }
            | InstructionKind::Jump { .. }
            | InstructionKind::Return { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDefinition {
    pub symbol_name: InternedSymbol,
    pub ty: Type,
    /// Temporaries holding the incoming arguments, in declaration order
    pub arguments: Vec<LocalVarId>,
    pub locals: IndexVec<LocalVarId, LocalVar>,
    pub addresses: IndexVec<AddressVarId, AddressVar>,
    pub instructions: IndexVec<InstructionId, Instruction>,
    /// Always a `Nop` created together with the function
    pub entry: InstructionId,
}

impl FunctionDefinition {
    pub fn new(symbol_name: InternedSymbol, ty: Type) -> Self {
        let mut instructions = IndexVec::new();
        let entry = instructions.push(Instruction::new(InstructionKind::Nop));

        Self {
            symbol_name,
            ty,
            arguments: Vec::new(),
            locals: IndexVec::new(),
            addresses: IndexVec::new(),
            instructions,
            entry,
        }
    }

    pub fn return_type(&self) -> &Type {
        self.ty.return_type().unwrap_or(&Type::Void)
    }

    pub fn create_local(&mut self, ty: Type) -> LocalVarId {
        let id = self.locals.next_index();
        self.locals.push(LocalVar { id, ty })
    }

    pub fn create_address(&mut self, base: InternedSymbol) -> AddressVarId {
        let id = self.addresses.next_index();
        self.addresses.push(AddressVar { id, base })
    }

    pub fn push_instruction(&mut self, kind: InstructionKind) -> InstructionId {
        self.instructions.push(Instruction::new(kind))
    }

    pub fn set_next(&mut self, from: InstructionId, edge: Edge, to: InstructionId) {
        self.instructions[from].next[edge as usize] = Some(to);
    }

    pub fn instruction(&self, id: InstructionId) -> &Instruction {
        &self.instructions[id]
    }

    pub fn num_locals(&self) -> usize {
        self.locals.len()
    }

    pub fn num_addresses(&self) -> usize {
        self.addresses.len()
    }

    /// Number of temporaries which need a stack slot
    pub fn num_temporaries(&self) -> usize {
        self.num_locals() + self.num_addresses()
    }
}
