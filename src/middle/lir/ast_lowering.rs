//! Lowers the typed AST into LIR.
//!
//! Every AST node becomes a [`Fragment`]: an entry instruction, an optional
//! exit instruction and, for expressions, the value holding the result.
//! Fragments are glued together with [`BodyLoweringContext::splice`], which
//! links the exit of the first to the entry of the second. Branches and loops
//! are built by setting the edges of `Jump` instructions explicitly once both
//! of their targets exist.

use hashbrown::HashMap;
use log::{debug, trace};

use crate::{
    error::{InternalError, internal_error},
    frontend::{
        ast::{self, BinaryOperatorKind, ExpressionKind, StatementKind},
        symbol::{Symbol, SymbolId},
    },
    middle::{
        lir::{
            self, ArithmeticOperator, Constant, Edge, InstructionId, InstructionKind, LocalVarId,
            Predicate, Value,
        },
        ty::Type,
    },
};

/// Whether an expression is being evaluated for its value or for the location
/// it names. Only the direct target of an assignment is lowered in `Address`
/// context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Value,
    Address,
}

/// A piece of lowered code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub entry: InstructionId,
    /// `None` when control never falls out of the bottom of the fragment
    /// (after a `return` or `break`)
    pub exit: Option<InstructionId>,
    pub value: Option<Value>,
}

impl Fragment {
    fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Lowers every declaration of the program, in order
pub fn lower_program(ast: &ast::DeclarationList) -> Result<lir::Program, InternalError> {
    let mut program = lir::Program::default();

    for declaration in &ast.declarations {
        match declaration {
            ast::Declaration::Variable(ast::VariableDeclaration { symbol, .. })
            | ast::Declaration::Array(ast::ArrayDeclaration { symbol, .. }) => {
                debug!("declaring global `{}`: {}", symbol.name, symbol.ty);
                program
                    .globals
                    .push(lir::GlobalDecl::new(symbol.name, &symbol.ty));
            }
            ast::Declaration::Function(definition) => {
                program.functions.push(lower_function(definition)?);
            }
        }
    }

    Ok(program)
}

pub fn lower_function(
    definition: &ast::FunctionDefinition,
) -> Result<lir::FunctionDefinition, InternalError> {
    let name = definition.symbol.name;
    debug!("lowering function `{name}`");

    let mut cx = BodyLoweringContext::new(&definition.symbol);

    for parameter in &definition.parameters {
        let id = cx.function.create_local(parameter.ty.clone());
        cx.local_map.insert(parameter.id, id);
        cx.function.arguments.push(id);
    }

    let entry = cx.function.entry;
    let head = Fragment {
        entry,
        exit: Some(entry),
        value: None,
    };

    let body = cx.lower_statement_list(&definition.body)?;
    let body = cx.splice(head, body);

    // falling off the end of the body returns. main implicitly returns 0 so
    // that the exit status is always defined.
    if body.exit.is_some() {
        let implicit_return = if name.value() == "main" {
            let zero = cx.function.create_local(Type::Int);
            let copy = cx.single(InstructionKind::Copy {
                destination: zero,
                source: Value::Constant(Constant::Int(0)),
            });
            let ret = cx.single(InstructionKind::Return { value: Some(zero) });

            cx.splice(copy, ret)
        } else {
            cx.single(InstructionKind::Return { value: None })
        };

        cx.splice(body, implicit_return);
    }

    debug!(
        "lowered `{name}`: {} instructions, {} locals, {} addresses",
        cx.function.instructions.len(),
        cx.function.num_locals(),
        cx.function.num_addresses()
    );

    Ok(cx.function)
}

struct BodyLoweringContext {
    function: lir::FunctionDefinition,
    /// Temporaries backing the function's parameters and local variables
    local_map: HashMap<SymbolId, LocalVarId>,
    /// Exit points of the enclosing loops, innermost last
    loop_exits: Vec<InstructionId>,
}

impl BodyLoweringContext {
    fn new(symbol: &Symbol) -> Self {
        Self {
            function: lir::FunctionDefinition::new(symbol.name, symbol.ty.clone()),
            local_map: HashMap::new(),
            loop_exits: Vec::new(),
        }
    }

    /* Fragment construction */

    fn single(&mut self, kind: InstructionKind) -> Fragment {
        let id = self.function.push_instruction(kind);

        Fragment {
            entry: id,
            exit: Some(id),
            value: None,
        }
    }

    fn nop(&mut self) -> Fragment {
        self.single(InstructionKind::Nop)
    }

    /// Runs `second` after `first`. The result takes its value from `second`.
    fn splice(&mut self, first: Fragment, second: Fragment) -> Fragment {
        match first.exit {
            Some(exit) => {
                trace!("splice {exit} -> {}", second.entry);
                self.function.set_next(exit, Edge::Next, second.entry);

                Fragment {
                    entry: first.entry,
                    exit: second.exit,
                    value: second.value,
                }
            }
            // nothing after a return or break is reachable
            None => Fragment {
                entry: first.entry,
                exit: None,
                value: second.value,
            },
        }
    }

    fn append(&mut self, fragment: Fragment, kind: InstructionKind) -> Fragment {
        let next = self.single(kind);
        self.splice(fragment, next)
    }

    fn link(&mut self, from: Option<InstructionId>, to: InstructionId) {
        if let Some(from) = from {
            self.function.set_next(from, Edge::Next, to);
        }
    }

    fn expect_local(&self, fragment: &Fragment) -> Result<LocalVarId, InternalError> {
        match fragment.value {
            Some(Value::Local(id)) => Ok(id),
            other => Err(internal_error!(
                "expected a scalar temporary from fragment at {}, found {other:?}",
                fragment.entry
            )),
        }
    }

    fn local_of(&self, symbol: &Symbol) -> Result<LocalVarId, InternalError> {
        self.local_map.get(&symbol.id).copied().ok_or_else(|| {
            internal_error!(
                "local `{}` used in `{}` before it was declared",
                symbol.name,
                self.function.symbol_name
            )
        })
    }

    /* Statements */

    fn lower_statement_list(
        &mut self,
        list: &ast::StatementList,
    ) -> Result<Fragment, InternalError> {
        let mut fragment = self.nop();

        for statement in &list.statements {
            let next = self.lower_statement(statement)?;
            fragment = self.splice(fragment, next);
        }

        Ok(fragment)
    }

    fn lower_statement(&mut self, statement: &ast::Statement) -> Result<Fragment, InternalError> {
        match &statement.kind {
            StatementKind::VariableDeclaration(declaration) => {
                let symbol = &declaration.symbol;
                let id = self.function.create_local(symbol.ty.clone());
                self.local_map.insert(symbol.id, id);

                Ok(self.nop())
            }
            StatementKind::ArrayDeclaration(declaration) => Err(internal_error!(
                "array `{}` declared inside function `{}`; arrays must be global",
                declaration.symbol.name,
                self.function.symbol_name
            )),
            StatementKind::Assignment(assignment) => self.lower_assignment(assignment),
            StatementKind::Call(call) => self.lower_call(call),
            StatementKind::IfElse {
                condition,
                then_block,
                else_block,
            } => self.lower_if_else(condition, then_block, else_block.as_ref()),
            StatementKind::For {
                init,
                condition,
                increment,
                body,
            } => self.lower_for(init, condition, increment, body),
            StatementKind::Return(value) => {
                let fragment = match value {
                    Some(value) => {
                        let value = self.lower_expression(value, Context::Value)?;
                        let local = self.expect_local(&value)?;

                        self.append(value, InstructionKind::Return { value: Some(local) })
                    }
                    None => self.single(InstructionKind::Return { value: None }),
                };

                Ok(Fragment {
                    exit: None,
                    ..fragment
                })
            }
            StatementKind::Break => {
                let Some(&loop_exit) = self.loop_exits.last() else {
                    return Err(internal_error!(
                        "break outside of a loop in `{}`",
                        self.function.symbol_name
                    ));
                };

                let fragment = self.nop();
                self.link(fragment.exit, loop_exit);

                Ok(Fragment {
                    exit: None,
                    ..fragment
                })
            }
        }
    }

    fn lower_assignment(&mut self, assignment: &ast::Assignment) -> Result<Fragment, InternalError> {
        let location = self.lower_expression(&assignment.location, Context::Address)?;
        let value = self.lower_expression(&assignment.value, Context::Value)?;
        let source = self.expect_local(&value)?;

        let write = match location.value {
            Some(Value::Local(destination)) => InstructionKind::Copy {
                destination,
                source: Value::Local(source),
            },
            Some(Value::Address(destination)) => InstructionKind::Store {
                source,
                destination,
            },
            other => {
                return Err(internal_error!(
                    "assignment target lowered to {other:?} instead of a location"
                ));
            }
        };

        let fragment = self.splice(location, value);
        let fragment = self.append(fragment, write);

        Ok(Fragment {
            value: None,
            ..fragment
        })
    }

    fn lower_if_else(
        &mut self,
        condition: &ast::Expression,
        then_block: &ast::StatementList,
        else_block: Option<&ast::StatementList>,
    ) -> Result<Fragment, InternalError> {
        let condition = self.lower_expression(condition, Context::Value)?;
        let predicate = self.expect_local(&condition)?;
        let head = self.append(condition, InstructionKind::Jump { predicate });

        let then_fragment = self.lower_statement_list(then_block)?;
        let else_fragment = match else_block {
            Some(block) => self.lower_statement_list(block)?,
            None => self.nop(),
        };

        let merge = self.nop();
        self.link(then_fragment.exit, merge.entry);
        self.link(else_fragment.exit, merge.entry);

        if let Some(jump) = head.exit {
            self.function
                .set_next(jump, Edge::True, then_fragment.entry);
            self.function
                .set_next(jump, Edge::Next, else_fragment.entry);
        }

        Ok(Fragment {
            entry: head.entry,
            exit: merge.exit,
            value: None,
        })
    }

    fn lower_for(
        &mut self,
        init: &ast::Assignment,
        condition: &ast::Expression,
        increment: &ast::Assignment,
        body: &ast::StatementList,
    ) -> Result<Fragment, InternalError> {
        let init = self.lower_assignment(init)?;

        let condition = self.lower_expression(condition, Context::Value)?;
        let condition_entry = condition.entry;
        let predicate = self.expect_local(&condition)?;

        let head = self.splice(init, condition);
        let head = self.append(head, InstructionKind::Jump { predicate });

        let loop_exit = self.nop();

        self.loop_exits.push(loop_exit.entry);
        let body = self.lower_statement_list(body);
        self.loop_exits.pop();
        let body = body?;

        let increment = self.lower_assignment(increment)?;
        let body = self.splice(body, increment);

        // back-edge to the condition check
        self.link(body.exit, condition_entry);

        if let Some(jump) = head.exit {
            self.function.set_next(jump, Edge::True, body.entry);
            self.function.set_next(jump, Edge::Next, loop_exit.entry);
        }

        Ok(Fragment {
            entry: head.entry,
            exit: loop_exit.exit,
            value: None,
        })
    }

    fn lower_call(&mut self, call: &ast::Call) -> Result<Fragment, InternalError> {
        let mut fragment = self.nop();
        let mut arguments = Vec::with_capacity(call.arguments.len());

        for argument in &call.arguments {
            let argument = self.lower_expression(argument, Context::Value)?;
            arguments.push(self.expect_local(&argument)?);
            fragment = self.splice(fragment, argument);
        }

        let return_type = call.callee.ty.return_type().cloned().unwrap_or(Type::Void);
        let is_void = return_type.is_void();
        let destination = self.function.create_local(return_type);

        let fragment = self.append(
            fragment,
            InstructionKind::Call {
                destination: (!is_void).then_some(destination),
                callee: call.callee.name,
                arguments,
            },
        );

        Ok(fragment.with_value(Value::Local(destination)))
    }

    /* Expressions */

    fn lower_expression(
        &mut self,
        expression: &ast::Expression,
        context: Context,
    ) -> Result<Fragment, InternalError> {
        match &expression.kind {
            ExpressionKind::LiteralInt(value) => {
                Ok(self.lower_constant(Constant::Int(*value), Type::Int))
            }
            ExpressionKind::LiteralBool(value) => {
                Ok(self.lower_constant(Constant::Bool(*value), Type::Bool))
            }
            ExpressionKind::VarAccess(symbol) => {
                if !symbol.is_global() {
                    let local = self.local_of(symbol)?;
                    return Ok(self.nop().with_value(Value::Local(local)));
                }

                let address = self.function.create_address(symbol.name);
                let fragment = self.single(InstructionKind::AddressAt {
                    destination: address,
                    base: symbol.name,
                    offset: None,
                });

                Ok(self.load_unless_address(fragment, address, &symbol.ty, context))
            }
            ExpressionKind::ArrayAccess { base, index } => {
                if !base.is_global() {
                    return Err(internal_error!(
                        "array `{}` is not global storage",
                        base.name
                    ));
                }

                // the index is always needed as a value, even when the element
                // itself is being assigned to
                let index = self.lower_expression(index, Context::Value)?;
                let offset = self.expect_local(&index)?;

                let address = self.function.create_address(base.name);
                let fragment = self.append(
                    index,
                    InstructionKind::AddressAt {
                        destination: address,
                        base: base.name,
                        offset: Some(offset),
                    },
                );

                Ok(self.load_unless_address(fragment, address, &expression.ty, context))
            }
            ExpressionKind::Binary { operator, lhs, rhs } => match operator {
                BinaryOperatorKind::LogicalAnd => self.lower_short_circuit(lhs, rhs, false),
                BinaryOperatorKind::LogicalOr => self.lower_short_circuit(lhs, rhs, true),
                _ => self.lower_binary(*operator, lhs, rhs),
            },
            ExpressionKind::Not(operand) => {
                let operand = self.lower_expression(operand, Context::Value)?;
                let source = self.expect_local(&operand)?;
                let destination = self.function.create_local(Type::Bool);

                let fragment = self.append(
                    operand,
                    InstructionKind::UnaryNot {
                        destination,
                        operand: source,
                    },
                );

                Ok(fragment.with_value(Value::Local(destination)))
            }
            ExpressionKind::Call(call) => self.lower_call(call),
        }
    }

    fn lower_constant(&mut self, constant: Constant, ty: Type) -> Fragment {
        let destination = self.function.create_local(ty);

        self.single(InstructionKind::Copy {
            destination,
            source: Value::Constant(constant),
        })
        .with_value(Value::Local(destination))
    }

    /// Finishes a location computed into `address`: in address context the
    /// address itself is the result, otherwise the value stored there is
    /// loaded into a fresh temporary.
    fn load_unless_address(
        &mut self,
        fragment: Fragment,
        address: lir::AddressVarId,
        ty: &Type,
        context: Context,
    ) -> Fragment {
        match context {
            Context::Address => fragment.with_value(Value::Address(address)),
            Context::Value => {
                let destination = self.function.create_local(ty.clone());
                let fragment = self.append(
                    fragment,
                    InstructionKind::Load {
                        destination,
                        source: address,
                    },
                );

                fragment.with_value(Value::Local(destination))
            }
        }
    }

    fn lower_binary(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: &ast::Expression,
        rhs: &ast::Expression,
    ) -> Result<Fragment, InternalError> {
        let lhs = self.lower_expression(lhs, Context::Value)?;
        let rhs = self.lower_expression(rhs, Context::Value)?;
        let lhs_local = self.expect_local(&lhs)?;
        let rhs_local = self.expect_local(&rhs)?;

        let destination = self.function.create_local(operator.result_type());

        let arithmetic = |operator| InstructionKind::BinaryOperation {
            operator,
            destination,
            lhs: lhs_local,
            rhs: rhs_local,
        };
        let compare = |predicate| InstructionKind::Compare {
            predicate,
            destination,
            lhs: lhs_local,
            rhs: rhs_local,
        };

        let kind = match operator {
            BinaryOperatorKind::Add => arithmetic(ArithmeticOperator::Add),
            BinaryOperatorKind::Subtract => arithmetic(ArithmeticOperator::Sub),
            BinaryOperatorKind::Multiply => arithmetic(ArithmeticOperator::Mul),
            BinaryOperatorKind::Divide => arithmetic(ArithmeticOperator::Div),
            BinaryOperatorKind::Equals => compare(Predicate::Eq),
            BinaryOperatorKind::NotEquals => compare(Predicate::Ne),
            BinaryOperatorKind::LessThan => compare(Predicate::Lt),
            BinaryOperatorKind::LessThanOrEqualTo => compare(Predicate::Le),
            BinaryOperatorKind::GreaterThan => compare(Predicate::Gt),
            BinaryOperatorKind::GreaterThanOrEqualTo => compare(Predicate::Ge),
            BinaryOperatorKind::LogicalAnd | BinaryOperatorKind::LogicalOr => {
                return Err(internal_error!(
                    "logical `{operator}` must be lowered with short-circuiting"
                ));
            }
        };

        let fragment = self.splice(lhs, rhs);
        let fragment = self.append(fragment, kind);

        Ok(fragment.with_value(Value::Local(destination)))
    }

    /// Builds the diamond for `&&` and `||`. `decided_by` is the value of the
    /// left operand which alone decides the result: `false` for `&&`, `true`
    /// for `||`. The right operand is only evaluated on the other branch.
    fn lower_short_circuit(
        &mut self,
        lhs: &ast::Expression,
        rhs: &ast::Expression,
        decided_by: bool,
    ) -> Result<Fragment, InternalError> {
        let lhs = self.lower_expression(lhs, Context::Value)?;
        let predicate = self.expect_local(&lhs)?;
        let head = self.append(lhs, InstructionKind::Jump { predicate });

        let destination = self.function.create_local(Type::Bool);
        let merge = self.nop();

        let short = self.single(InstructionKind::Copy {
            destination,
            source: Value::Constant(Constant::Bool(decided_by)),
        });
        self.link(short.exit, merge.entry);

        let rhs = self.lower_expression(rhs, Context::Value)?;
        let rhs_local = self.expect_local(&rhs)?;
        let long = self.append(
            rhs,
            InstructionKind::Copy {
                destination,
                source: Value::Local(rhs_local),
            },
        );
        self.link(long.exit, merge.entry);

        if let Some(jump) = head.exit {
            let (taken, fallthrough) = if decided_by {
                (short.entry, long.entry)
            } else {
                (long.entry, short.entry)
            };

            self.function.set_next(jump, Edge::True, taken);
            self.function.set_next(jump, Edge::Next, fallthrough);
        }

        Ok(Fragment {
            entry: head.entry,
            exit: merge.exit,
            value: Some(Value::Local(destination)),
        })
    }
}
