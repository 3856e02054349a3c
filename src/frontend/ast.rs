//! The typed abstract syntax tree handed over by the front end. By the time a
//! tree gets here every identifier has been resolved to a [`Symbol`] and every
//! expression carries its semantic [`Type`].
//!
//! The constructor helpers only fill in the types that follow directly from
//! the node shape (an addition is an `int`, a call has its callee's return
//! type, ...). They do not check anything.

use std::rc::Rc;

use crate::{
    frontend::{Position, symbol::Symbol},
    middle::ty::Type,
};

#[derive(Debug)]
pub struct DeclarationList {
    pub position: Position,
    pub declarations: Vec<Declaration>,
}

impl DeclarationList {
    pub fn new(declarations: Vec<Declaration>) -> Self {
        Self {
            position: Position::default(),
            declarations,
        }
    }
}

#[derive(Debug)]
pub enum Declaration {
    Variable(VariableDeclaration),
    Array(ArrayDeclaration),
    Function(FunctionDefinition),
}

#[derive(Debug)]
pub struct VariableDeclaration {
    pub position: Position,
    pub symbol: Rc<Symbol>,
}

#[derive(Debug)]
pub struct ArrayDeclaration {
    pub position: Position,
    pub symbol: Rc<Symbol>,
}

#[derive(Debug)]
pub struct FunctionDefinition {
    pub position: Position,
    pub symbol: Rc<Symbol>,
    pub parameters: Vec<Rc<Symbol>>,
    pub body: StatementList,
}

impl Declaration {
    pub fn variable(symbol: &Rc<Symbol>) -> Self {
        Self::Variable(VariableDeclaration {
            position: Position::default(),
            symbol: symbol.clone(),
        })
    }

    pub fn array(symbol: &Rc<Symbol>) -> Self {
        Self::Array(ArrayDeclaration {
            position: Position::default(),
            symbol: symbol.clone(),
        })
    }

    pub fn function(
        symbol: &Rc<Symbol>,
        parameters: Vec<Rc<Symbol>>,
        body: Vec<Statement>,
    ) -> Self {
        Self::Function(FunctionDefinition {
            position: Position::default(),
            symbol: symbol.clone(),
            parameters,
            body: StatementList::new(body),
        })
    }
}

#[derive(Debug)]
pub struct StatementList {
    pub position: Position,
    pub statements: Vec<Statement>,
}

impl StatementList {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            position: Position::default(),
            statements,
        }
    }
}

#[derive(Debug)]
pub struct Statement {
    pub position: Position,
    pub kind: StatementKind,
}

#[derive(Debug)]
pub enum StatementKind {
    VariableDeclaration(VariableDeclaration),
    ArrayDeclaration(ArrayDeclaration),
    Assignment(Assignment),
    Call(Call),
    IfElse {
        condition: Expression,
        then_block: StatementList,
        else_block: Option<StatementList>,
    },
    For {
        init: Assignment,
        condition: Expression,
        increment: Assignment,
        body: StatementList,
    },
    Return(Option<Expression>),
    Break,
}

#[derive(Debug)]
pub struct Assignment {
    /// Either a `VarAccess` or an `ArrayAccess`
    pub location: Expression,
    pub value: Expression,
}

#[derive(Debug)]
pub struct Call {
    pub callee: Rc<Symbol>,
    pub arguments: Vec<Expression>,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            position: Position::default(),
            kind,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn declare(symbol: &Rc<Symbol>) -> Self {
        let declaration = VariableDeclaration {
            position: Position::default(),
            symbol: symbol.clone(),
        };

        Self::new(StatementKind::VariableDeclaration(declaration))
    }

    pub fn assign(location: Expression, value: Expression) -> Self {
        Self::new(StatementKind::Assignment(Assignment { location, value }))
    }

    pub fn call(callee: &Rc<Symbol>, arguments: Vec<Expression>) -> Self {
        Self::new(StatementKind::Call(Call {
            callee: callee.clone(),
            arguments,
        }))
    }

    pub fn if_else(
        condition: Expression,
        then_block: Vec<Statement>,
        else_block: Option<Vec<Statement>>,
    ) -> Self {
        Self::new(StatementKind::IfElse {
            condition,
            then_block: StatementList::new(then_block),
            else_block: else_block.map(StatementList::new),
        })
    }

    /// `for (init; condition; increment) { body }`. `init` and `increment`
    /// must be assignment statements.
    pub fn for_loop(
        init: Assignment,
        condition: Expression,
        increment: Assignment,
        body: Vec<Statement>,
    ) -> Self {
        Self::new(StatementKind::For {
            init,
            condition,
            increment,
            body: StatementList::new(body),
        })
    }

    pub fn ret(value: Option<Expression>) -> Self {
        Self::new(StatementKind::Return(value))
    }

    pub fn brk() -> Self {
        Self::new(StatementKind::Break)
    }
}

impl Assignment {
    pub fn new(location: Expression, value: Expression) -> Self {
        Self { location, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BinaryOperatorKind {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanOrEqualTo,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanOrEqualTo,
    #[strum(serialize = "&&")]
    LogicalAnd,
    #[strum(serialize = "||")]
    LogicalOr,
}

impl BinaryOperatorKind {
    /// The type an operation of this kind evaluates to
    pub fn result_type(self) -> Type {
        match self {
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide => Type::Int,
            Self::Equals
            | Self::NotEquals
            | Self::LessThan
            | Self::LessThanOrEqualTo
            | Self::GreaterThan
            | Self::GreaterThanOrEqualTo
            | Self::LogicalAnd
            | Self::LogicalOr => Type::Bool,
        }
    }
}

#[derive(Debug)]
pub struct Expression {
    pub position: Position,
    pub ty: Type,
    pub kind: ExpressionKind,
}

#[derive(Debug)]
pub enum ExpressionKind {
    LiteralInt(i64),
    LiteralBool(bool),
    VarAccess(Rc<Symbol>),
    ArrayAccess {
        base: Rc<Symbol>,
        index: Box<Expression>,
    },
    Binary {
        operator: BinaryOperatorKind,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Not(Box<Expression>),
    Call(Call),
}

impl Expression {
    pub fn new(kind: ExpressionKind, ty: Type) -> Self {
        Self {
            position: Position::default(),
            ty,
            kind,
        }
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExpressionKind::LiteralInt(value), Type::Int)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExpressionKind::LiteralBool(value), Type::Bool)
    }

    pub fn var(symbol: &Rc<Symbol>) -> Self {
        Self::new(ExpressionKind::VarAccess(symbol.clone()), symbol.ty.clone())
    }

    pub fn index(base: &Rc<Symbol>, index: Expression) -> Self {
        let ty = match &base.ty {
            Type::Array { base, .. } => (**base).clone(),
            other => other.clone(),
        };

        Self::new(
            ExpressionKind::ArrayAccess {
                base: base.clone(),
                index: Box::new(index),
            },
            ty,
        )
    }

    pub fn binary(operator: BinaryOperatorKind, lhs: Expression, rhs: Expression) -> Self {
        Self::new(
            ExpressionKind::Binary {
                operator,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            operator.result_type(),
        )
    }

    pub fn not(operand: Expression) -> Self {
        Self::new(ExpressionKind::Not(Box::new(operand)), Type::Bool)
    }

    pub fn call(callee: &Rc<Symbol>, arguments: Vec<Expression>) -> Self {
        let ty = callee.ty.return_type().cloned().unwrap_or(Type::Void);

        Self::new(
            ExpressionKind::Call(Call {
                callee: callee.clone(),
                arguments,
            }),
            ty,
        )
    }
}
