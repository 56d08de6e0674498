//! Lowering of checked HIR bodies to MIR.
//!
//! By the time a body gets here every path is resolved, every node is typed
//! and all sugar is gone. Anything missing is a bug in an earlier stage and
//! aborts the compilation with a [`LoweringError`].

use std::{collections::BTreeMap, sync::Arc};

use hashbrown::HashMap;
use thiserror::Error;

use crate::{
    frontend::ast::{BinaryOperatorKind, LiteralKind},
    index::IndexVec,
    middle::{
        def::{DefId, DefKind},
        hir::{self, Block, Expr, ExprKind, ItemLocalId, Pattern, PatternKind, StatementKind},
        mir::{
            self, BasicBlock, BlockId, BodyKind, Callee, Immediate, Instruction, Operand,
            Register, RegisterId, Terminator,
        },
        primitive::{PrimitiveKind, UIntKind},
        resolve::Res,
        ty::{Type, TypeKind},
        type_check::{ExprResolution, TypeContext, TypeckResults},
    },
};

#[derive(Debug, Error)]
pub enum LoweringError {
    #[error("no type was recorded for node {node} in `{owner}`")]
    MissingType { owner: String, node: ItemLocalId },
    #[error("node {node} in `{owner}` was never resolved to a member")]
    MissingResolution { owner: String, node: ItemLocalId },
    #[error("local `{local}` in `{owner}` is used before it is bound")]
    UnboundLocal { owner: String, local: String },
    #[error("unexpected {description} in `{owner}`")]
    UnexpectedNode {
        owner: String,
        description: &'static str,
    },
}

/// Lowers every untainted body in `results` to MIR
#[tracing::instrument(level = "debug", skip_all, fields(bodies = results.len()))]
pub fn lower_program(
    cx: &TypeContext<'_>,
    results: &BTreeMap<DefId, Arc<TypeckResults>>,
) -> Result<mir::Program, LoweringError> {
    let mut program = mir::Program::default();

    for (def, results) in results {
        if results.tainted {
            tracing::debug!(owner = %cx.defs.qualified_name(*def), "skipping tainted body");
            continue;
        }

        let Some(body) = cx.hir.bodies.get(def) else {
            continue;
        };

        program
            .bodies
            .insert(*def, BodyLowering::new(cx, body, results).lower()?);
    }

    Ok(program)
}

#[derive(Debug, Clone, Copy)]
struct LoopScope {
    continue_to: BlockId,
    break_to: BlockId,
}

struct BodyLowering<'a> {
    cx: TypeContext<'a>,
    body: &'a hir::Body,
    results: &'a TypeckResults,

    registers: IndexVec<RegisterId, Register>,
    blocks: IndexVec<BlockId, BasicBlock>,
    current: BlockId,
    locals: HashMap<DefId, RegisterId>,
    loops: Vec<LoopScope>,
}

impl<'a> BodyLowering<'a> {
    fn new(cx: &TypeContext<'a>, body: &'a hir::Body, results: &'a TypeckResults) -> Self {
        let mut lowering = Self {
            cx: *cx,
            body,
            results,
            registers: IndexVec::new(),
            blocks: IndexVec::new(),
            current: BlockId::ENTRY,
            locals: HashMap::new(),
            loops: Vec::new(),
        };

        lowering.current = lowering.create_block();
        lowering
    }

    fn owner_name(&self) -> String {
        self.cx.defs.qualified_name(self.body.owner)
    }

    fn lower(mut self) -> Result<mir::Body, LoweringError> {
        let body = self.body;

        let mut params = Vec::with_capacity(body.params.len());
        for local in &body.params {
            let ty = self.local_type(*local)?;
            let register = self.create_register(ty, Some(*local));
            self.locals.insert(*local, register);
            params.push(register);
        }

        if let Some(value) = self.lower_expr(&body.value)? {
            self.terminate(Terminator::Return { value });
        }

        let kind = match self.cx.defs.kind(body.owner) {
            DefKind::Const => BodyKind::ConstInitializer,
            _ => BodyKind::Function,
        };

        tracing::trace!(
            owner = %self.owner_name(),
            blocks = self.blocks.len(),
            registers = self.registers.len(),
            "lowered body"
        );

        Ok(mir::Body {
            def: body.owner,
            kind,
            name: self.owner_name(),
            params,
            return_type: self.results.return_type.clone(),
            registers: self.registers,
            blocks: self.blocks,
        })
    }

    /* Building blocks */

    fn create_block(&mut self) -> BlockId {
        self.blocks.push(BasicBlock {
            instructions: Vec::new(),
            terminator: Terminator::Unreachable,
        })
    }

    fn create_register(&mut self, ty: Type, local: Option<DefId>) -> RegisterId {
        self.registers.push(Register { ty, local })
    }

    fn push_instruction(&mut self, instruction: Instruction) {
        self.blocks[self.current].instructions.push(instruction);
    }

    fn terminate(&mut self, terminator: Terminator) {
        self.blocks[self.current].terminator = terminator;
    }

    fn node_type(&self, node: ItemLocalId) -> Result<Type, LoweringError> {
        self.results
            .node_type(node)
            .cloned()
            .ok_or_else(|| LoweringError::MissingType {
                owner: self.owner_name(),
                node,
            })
    }

    fn local_type(&self, local: DefId) -> Result<Type, LoweringError> {
        self.results
            .local_types
            .get(&local)
            .cloned()
            .ok_or_else(|| self.unbound(local))
    }

    fn resolution(&self, node: ItemLocalId) -> Result<ExprResolution, LoweringError> {
        self.results
            .resolution(node)
            .ok_or_else(|| LoweringError::MissingResolution {
                owner: self.owner_name(),
                node,
            })
    }

    fn unbound(&self, local: DefId) -> LoweringError {
        LoweringError::UnboundLocal {
            owner: self.owner_name(),
            local: self.cx.defs.name(local).to_string(),
        }
    }

    fn unexpected(&self, description: &'static str) -> LoweringError {
        LoweringError::UnexpectedNode {
            owner: self.owner_name(),
            description,
        }
    }

    /// A register holding the value of `node` unless its type carries no
    /// information
    fn result_register(&mut self, node: ItemLocalId) -> Result<Option<RegisterId>, LoweringError> {
        let ty = self.node_type(node)?;

        Ok((!ty.is_unit() && !ty.is_never()).then(|| self.create_register(ty, None)))
    }

    fn immediate(&self, literal: &LiteralKind, node: ItemLocalId) -> Result<Immediate, LoweringError> {
        Ok(match literal {
            LiteralKind::Boolean(value) => Immediate::Bool(*value),
            LiteralKind::Char(value) => Immediate::Char(*value),
            LiteralKind::String(value) => Immediate::Str(*value),
            LiteralKind::Unit => Immediate::Unit,
            LiteralKind::Integer(value, _) => match &*self.node_type(node)? {
                TypeKind::Integer(kind) => Immediate::Int(*value, PrimitiveKind::Int(*kind)),
                TypeKind::UnsignedInteger(kind) => {
                    Immediate::Int(*value, PrimitiveKind::UInt(*kind))
                }
                _ => return Err(self.unexpected("integer literal of a non-integer type")),
            },
            LiteralKind::Float(value, _) => match &*self.node_type(node)? {
                TypeKind::Float(kind) => Immediate::Float(*value, *kind),
                _ => return Err(self.unexpected("float literal of a non-float type")),
            },
        })
    }

    fn variant_index(&self, variant: DefId) -> usize {
        self.cx.variant_index(variant)
    }

    fn construct_variant(
        &mut self,
        node: ItemLocalId,
        variant: DefId,
        fields: Vec<Operand>,
    ) -> Result<Operand, LoweringError> {
        let ty = self.node_type(node)?;
        let adt = self
            .cx
            .defs
            .parent(variant)
            .ok_or_else(|| self.unexpected("variant outside of an enum"))?;
        let index = self.variant_index(variant);

        let destination = self.create_register(ty, None);
        self.push_instruction(Instruction::Construct {
            destination,
            adt,
            variant: Some(index),
            fields,
        });

        Ok(Operand::Register(destination))
    }

    fn call(
        &mut self,
        node: ItemLocalId,
        callee: Callee,
        arguments: Vec<Operand>,
    ) -> Result<Option<Operand>, LoweringError> {
        let ty = self.node_type(node)?;
        let diverges = ty.is_never();

        let destination = self.create_register(ty, None);
        self.push_instruction(Instruction::Call {
            destination,
            callee,
            arguments,
        });

        if diverges {
            self.terminate(Terminator::Unreachable);
            return Ok(None);
        }

        Ok(Some(Operand::Register(destination)))
    }

    /// Lowers each expression in order, stopping when one diverges
    fn lower_operands<'e>(
        &mut self,
        expressions: impl IntoIterator<Item = &'e Expr>,
    ) -> Result<Option<Vec<Operand>>, LoweringError> {
        let mut operands = Vec::new();

        for expr in expressions {
            let Some(operand) = self.lower_expr(expr)? else {
                return Ok(None);
            };
            operands.push(operand);
        }

        Ok(Some(operands))
    }

    /// Copies an operand into a register if it is not in one already
    fn into_register(&mut self, operand: Operand, node: ItemLocalId) -> Result<RegisterId, LoweringError> {
        match operand {
            Operand::Register(register) => Ok(register),
            Operand::Immediate(_) => {
                let ty = self.node_type(node)?;
                let register = self.create_register(ty, None);
                self.push_instruction(Instruction::Move {
                    destination: register,
                    source: operand,
                });
                Ok(register)
            }
        }
    }

    /* Expressions */

    /// Lowers `expr` into the current block. Returns `None` when control never
    /// reaches the end of the expression.
    fn lower_expr(&mut self, expr: &Expr) -> Result<Option<Operand>, LoweringError> {
        match &expr.kind {
            ExprKind::Literal(literal) => {
                Ok(Some(Operand::Immediate(self.immediate(literal, expr.id)?)))
            }
            ExprKind::Path(res) => self.lower_path(expr, *res).map(Some),
            ExprKind::VariantShorthand { arguments, .. } => {
                let ExprResolution::Variant(variant) = self.resolution(expr.id)? else {
                    return Err(self.unexpected("shorthand resolved to something other than a variant"));
                };
                let Some(fields) = self.lower_operands(arguments)? else {
                    return Ok(None);
                };

                self.construct_variant(expr.id, variant, fields).map(Some)
            }
            ExprKind::Block(block) => self.lower_block(block),
            ExprKind::Call { target, arguments } => self.lower_call(expr, target, arguments),
            ExprKind::MethodCall {
                receiver,
                arguments,
                ..
            } => {
                let ExprResolution::Method(method) = self.resolution(expr.id)? else {
                    return Err(self.unexpected("method call without a method"));
                };
                let Some(operands) = self.lower_operands(
                    std::iter::once(&**receiver).chain(arguments.iter().map(|a| &a.value)),
                )?
                else {
                    return Ok(None);
                };

                self.call(expr.id, Callee::Def(method), operands)
            }
            ExprKind::Field { target, .. } => {
                let Some(source) = self.lower_expr(target)? else {
                    return Ok(None);
                };

                match self.resolution(expr.id)? {
                    ExprResolution::Field(index) => {
                        let ty = self.node_type(expr.id)?;
                        let destination = self.create_register(ty, None);
                        self.push_instruction(Instruction::GetField {
                            destination,
                            source,
                            index,
                        });
                        Ok(Some(Operand::Register(destination)))
                    }
                    ExprResolution::Getter(getter) => {
                        self.call(expr.id, Callee::Def(getter), vec![source])
                    }
                    _ => Err(self.unexpected("field access resolved to something other than a field")),
                }
            }
            ExprKind::StructLiteral { fields, .. } => self.lower_struct_literal(expr, fields),
            ExprKind::Binary { operator, lhs, rhs } => match operator {
                BinaryOperatorKind::LogicalAnd | BinaryOperatorKind::LogicalOr => {
                    self.lower_short_circuit(*operator, lhs, rhs)
                }
                _ => {
                    let Some(operands) = self.lower_operands([&**lhs, &**rhs])? else {
                        return Ok(None);
                    };

                    if let Some(ExprResolution::Overload(function)) =
                        self.results.resolution(expr.id)
                    {
                        return self.call(expr.id, Callee::Def(function), operands);
                    }

                    let ty = self.node_type(expr.id)?;
                    let destination = self.create_register(ty, None);
                    self.push_instruction(Instruction::BinaryOperation {
                        operator: *operator,
                        destination,
                        lhs: operands[0],
                        rhs: operands[1],
                    });
                    Ok(Some(Operand::Register(destination)))
                }
            },
            ExprKind::Unary { operator, operand } => {
                let Some(operand) = self.lower_expr(operand)? else {
                    return Ok(None);
                };

                if let Some(ExprResolution::Overload(function)) = self.results.resolution(expr.id) {
                    return self.call(expr.id, Callee::Def(function), vec![operand]);
                }

                let ty = self.node_type(expr.id)?;
                let destination = self.create_register(ty, None);
                self.push_instruction(Instruction::UnaryOperation {
                    operator: *operator,
                    destination,
                    operand,
                });
                Ok(Some(Operand::Register(destination)))
            }
            ExprKind::If {
                condition,
                positive,
                negative,
            } => self.lower_if(expr, condition, positive, negative.as_deref()),
            ExprKind::Loop(block) => {
                let header = self.create_block();
                let exit = self.create_block();

                self.terminate(Terminator::Jump { destination: header });
                self.current = header;

                self.loops.push(LoopScope {
                    continue_to: header,
                    break_to: exit,
                });
                if self.lower_block(block)?.is_some() {
                    self.terminate(Terminator::Jump { destination: header });
                }
                self.loops.pop();

                self.current = exit;

                if self.node_type(expr.id)?.is_never() {
                    return Ok(None);
                }

                Ok(Some(Operand::UNIT))
            }
            ExprKind::Match { scrutinee, arms } => self.lower_match(expr, scrutinee, arms),
            ExprKind::Assign { lhs, rhs } => self.lower_assignment(expr, lhs, rhs),
            ExprKind::Break | ExprKind::Continue => {
                let scope = *self
                    .loops
                    .last()
                    .ok_or_else(|| self.unexpected("`break` or `continue` outside of a loop"))?;

                let destination = match expr.kind {
                    ExprKind::Break => scope.break_to,
                    _ => scope.continue_to,
                };

                self.terminate(Terminator::Jump { destination });
                Ok(None)
            }
            ExprKind::Return(value) => {
                let value = match value {
                    Some(value) => match self.lower_expr(value)? {
                        Some(value) => value,
                        None => return Ok(None),
                    },
                    None => Operand::UNIT,
                };

                self.terminate(Terminator::Return { value });
                Ok(None)
            }
            ExprKind::While { .. }
            | ExprKind::For { .. }
            | ExprKind::Guard { .. }
            | ExprKind::OperatorAssign { .. } => Err(self.unexpected("unsimplified sugar")),
        }
    }

    fn lower_path(&mut self, expr: &Expr, res: Res) -> Result<Operand, LoweringError> {
        match res {
            Res::Local(local) => self
                .locals
                .get(&local)
                .map(|register| Operand::Register(*register))
                .ok_or_else(|| self.unbound(local)),
            Res::Def(DefKind::Function | DefKind::Method, function) => {
                Ok(Operand::Immediate(Immediate::Function(function)))
            }
            Res::Def(DefKind::Const, def) => {
                let ty = self.node_type(expr.id)?;
                let destination = self.create_register(ty, None);
                self.push_instruction(Instruction::LoadConst { destination, def });
                Ok(Operand::Register(destination))
            }
            Res::Def(DefKind::Variant, variant) => self.variant_value(expr, variant),
            Res::TypeRelative { .. } => match self.resolution(expr.id)? {
                ExprResolution::Associated(function) => {
                    Ok(Operand::Immediate(Immediate::Function(function)))
                }
                ExprResolution::Variant(variant) => self.variant_value(expr, variant),
                _ => Err(self.unexpected("associated path resolved to a member")),
            },
            _ => Err(self.unexpected("path that does not name a value")),
        }
    }

    /// A variant named as a value: built in place when it has no fields,
    /// its constructor otherwise
    fn variant_value(&mut self, expr: &Expr, variant: DefId) -> Result<Operand, LoweringError> {
        if matches!(*self.node_type(expr.id)?, TypeKind::Function { .. }) {
            return Ok(Operand::Immediate(Immediate::Function(variant)));
        }

        self.construct_variant(expr.id, variant, Vec::new())
    }

    fn lower_call(
        &mut self,
        expr: &Expr,
        target: &Expr,
        arguments: &[hir::Argument],
    ) -> Result<Option<Operand>, LoweringError> {
        enum Target {
            Function(DefId),
            Variant(DefId),
            Value,
        }

        let kind = match &target.kind {
            ExprKind::Path(Res::Def(DefKind::Function | DefKind::Method, function)) => {
                Target::Function(*function)
            }
            ExprKind::Path(Res::Def(DefKind::Variant, variant)) => Target::Variant(*variant),
            ExprKind::Path(Res::TypeRelative { .. }) => match self.resolution(target.id)? {
                ExprResolution::Associated(function) => Target::Function(function),
                ExprResolution::Variant(variant) => Target::Variant(variant),
                _ => Target::Value,
            },
            _ => Target::Value,
        };

        let callee = match kind {
            Target::Function(function) => Callee::Def(function),
            Target::Variant(variant) => {
                let Some(fields) = self.lower_operands(arguments.iter().map(|a| &a.value))?
                else {
                    return Ok(None);
                };
                return self.construct_variant(expr.id, variant, fields).map(Some);
            }
            Target::Value => match self.lower_expr(target)? {
                Some(operand) => Callee::Operand(operand),
                None => return Ok(None),
            },
        };

        let Some(operands) = self.lower_operands(arguments.iter().map(|a| &a.value))? else {
            return Ok(None);
        };

        self.call(expr.id, callee, operands)
    }

    fn lower_struct_literal(
        &mut self,
        expr: &Expr,
        fields: &[hir::FieldInit],
    ) -> Result<Option<Operand>, LoweringError> {
        let ty = self.node_type(expr.id)?;
        let TypeKind::Adt(adt, _) = &*ty else {
            return Err(self.unexpected("struct literal of a non-struct type"));
        };
        let adt = *adt;
        let definition = self.cx.adt_def(adt);

        // Initializers run in source order, fields are stored in declaration
        // order
        let mut values = vec![Operand::UNIT; definition.fields().len()];
        for field in fields {
            let index = definition
                .field_index(field.name.symbol)
                .ok_or_else(|| self.unexpected("initializer of an unknown field"))?;

            let Some(value) = self.lower_expr(&field.value)? else {
                return Ok(None);
            };
            values[index] = value;
        }

        let destination = self.create_register(ty, None);
        self.push_instruction(Instruction::Construct {
            destination,
            adt,
            variant: None,
            fields: values,
        });

        Ok(Some(Operand::Register(destination)))
    }

    fn lower_short_circuit(
        &mut self,
        operator: BinaryOperatorKind,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Option<Operand>, LoweringError> {
        let Some(lhs) = self.lower_expr(lhs)? else {
            return Ok(None);
        };

        let result = self.create_register(Type::bool(), None);
        self.push_instruction(Instruction::Move {
            destination: result,
            source: lhs,
        });

        let evaluate_rhs = self.create_block();
        let join = self.create_block();

        let (positive, negative) = match operator {
            BinaryOperatorKind::LogicalAnd => (evaluate_rhs, join),
            _ => (join, evaluate_rhs),
        };
        self.terminate(Terminator::Branch {
            condition: lhs,
            positive,
            negative,
        });

        self.current = evaluate_rhs;
        if let Some(rhs) = self.lower_expr(rhs)? {
            self.push_instruction(Instruction::Move {
                destination: result,
                source: rhs,
            });
            self.terminate(Terminator::Jump { destination: join });
        }

        self.current = join;
        Ok(Some(Operand::Register(result)))
    }

    fn lower_if(
        &mut self,
        expr: &Expr,
        condition: &Expr,
        positive: &Block,
        negative: Option<&Expr>,
    ) -> Result<Option<Operand>, LoweringError> {
        let Some(condition) = self.lower_expr(condition)? else {
            return Ok(None);
        };

        let result = self.result_register(expr.id)?;
        let positive_block = self.create_block();
        let join = self.create_block();
        let negative_block = match negative {
            Some(_) => self.create_block(),
            None => join,
        };

        self.terminate(Terminator::Branch {
            condition,
            positive: positive_block,
            negative: negative_block,
        });

        self.current = positive_block;
        let value = self.lower_block(positive)?;
        self.finish_branch(value, result, join);

        if let Some(negative) = negative {
            self.current = negative_block;
            let value = self.lower_expr(negative)?;
            self.finish_branch(value, result, join);
        }

        self.current = join;

        if self.node_type(expr.id)?.is_never() {
            return Ok(None);
        }

        Ok(Some(result.map_or(Operand::UNIT, Operand::Register)))
    }

    /// Stores a branch's value and jumps to where the branches meet
    fn finish_branch(&mut self, value: Option<Operand>, result: Option<RegisterId>, join: BlockId) {
        let Some(value) = value else {
            return;
        };

        if let Some(result) = result {
            self.push_instruction(Instruction::Move {
                destination: result,
                source: value,
            });
        }

        self.terminate(Terminator::Jump { destination: join });
    }

    fn lower_match(
        &mut self,
        expr: &Expr,
        scrutinee: &Expr,
        arms: &[hir::Arm],
    ) -> Result<Option<Operand>, LoweringError> {
        let Some(scrutinee) = self.lower_expr(scrutinee)? else {
            return Ok(None);
        };

        let result = self.result_register(expr.id)?;
        let join = self.create_block();

        for arm in arms {
            let next_arm = self.create_block();

            self.lower_pattern(&arm.pattern, scrutinee, next_arm)?;
            let value = self.lower_expr(&arm.body)?;
            self.finish_branch(value, result, join);

            self.current = next_arm;
        }

        // No arm matched
        self.terminate(Terminator::Unreachable);
        self.current = join;

        if self.node_type(expr.id)?.is_never() {
            return Ok(None);
        }

        Ok(Some(result.map_or(Operand::UNIT, Operand::Register)))
    }

    fn lower_assignment(
        &mut self,
        expr: &Expr,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Option<Operand>, LoweringError> {
        match &lhs.kind {
            ExprKind::Path(Res::Local(local)) => {
                let Some(value) = self.lower_expr(rhs)? else {
                    return Ok(None);
                };
                let destination = *self.locals.get(local).ok_or_else(|| self.unbound(*local))?;

                self.push_instruction(Instruction::Move {
                    destination,
                    source: value,
                });
            }
            ExprKind::Field { target, .. } => {
                let Some(operands) = self.lower_operands([&**target, rhs])? else {
                    return Ok(None);
                };
                let (object, value) = (operands[0], operands[1]);

                if let Some(ExprResolution::Setter(setter)) = self.results.resolution(expr.id) {
                    return self
                        .call(expr.id, Callee::Def(setter), vec![object, value])
                        .map(|_| Some(Operand::UNIT));
                }

                let ExprResolution::Field(index) = self.resolution(lhs.id)? else {
                    return Err(self.unexpected("assignment to something other than a field"));
                };
                let object = self.into_register(object, target.id)?;

                self.push_instruction(Instruction::SetField {
                    object,
                    index,
                    value,
                });
            }
            _ => return Err(self.unexpected("invalid assignment target")),
        }

        Ok(Some(Operand::UNIT))
    }

    /* Blocks and patterns */

    fn lower_block(&mut self, block: &Block) -> Result<Option<Operand>, LoweringError> {
        for statement in &block.statements {
            match &statement.kind {
                StatementKind::Let {
                    pattern,
                    initializer: Some(initializer),
                    ..
                } => {
                    let Some(value) = self.lower_expr(initializer)? else {
                        return Ok(None);
                    };

                    // A refutable `let` that fails has nowhere to go
                    let mismatch = self.create_block();
                    self.lower_pattern(pattern, value, mismatch)?;
                }
                StatementKind::Let {
                    pattern,
                    initializer: None,
                    ..
                } => self.declare_bindings(pattern)?,
                StatementKind::Expr(expr) => {
                    if self.lower_expr(expr)?.is_none() {
                        return Ok(None);
                    }
                }
            }
        }

        match &block.tail {
            Some(tail) => self.lower_expr(tail),
            None if self.node_type(block.id)?.is_never() => {
                self.terminate(Terminator::Unreachable);
                Ok(None)
            }
            None => Ok(Some(Operand::UNIT)),
        }
    }

    /// Allocates registers for the bindings of a `let` without initializer
    fn declare_bindings(&mut self, pattern: &Pattern) -> Result<(), LoweringError> {
        match &pattern.kind {
            PatternKind::Binding { local, .. } => {
                let ty = self.local_type(*local)?;
                let register = self.create_register(ty, Some(*local));
                self.locals.insert(*local, register);
            }
            PatternKind::Variant { fields, .. } => {
                for field in fields {
                    self.declare_bindings(field)?;
                }
            }
            PatternKind::Wildcard | PatternKind::Literal(_) => {}
        }

        Ok(())
    }

    /// Tests `value` against `pattern`, continuing in the current block when
    /// it matches and jumping to `otherwise` when it does not. Bindings are
    /// moved into fresh registers along the way.
    fn lower_pattern(
        &mut self,
        pattern: &Pattern,
        value: Operand,
        otherwise: BlockId,
    ) -> Result<(), LoweringError> {
        match &pattern.kind {
            PatternKind::Wildcard => {}
            PatternKind::Binding { local, .. } => {
                let ty = self.local_type(*local)?;
                let register = self.create_register(ty, Some(*local));

                self.push_instruction(Instruction::Move {
                    destination: register,
                    source: value,
                });
                self.locals.insert(*local, register);
            }
            PatternKind::Literal(literal) => {
                let expected = Operand::Immediate(self.immediate(literal, pattern.id)?);
                self.branch_unless_equal(value, expected, otherwise);
            }
            PatternKind::Variant { fields, .. } => {
                let ExprResolution::Variant(variant) = self.resolution(pattern.id)? else {
                    return Err(self.unexpected("variant pattern without a variant"));
                };
                let index = self.variant_index(variant);

                let discriminant = self.create_register(
                    Type::primitive(PrimitiveKind::UInt(UIntKind::U32)),
                    None,
                );
                self.push_instruction(Instruction::Discriminant {
                    destination: discriminant,
                    source: value,
                });
                self.branch_unless_equal(
                    Operand::Register(discriminant),
                    Operand::Immediate(Immediate::Int(
                        index as u64,
                        PrimitiveKind::UInt(UIntKind::U32),
                    )),
                    otherwise,
                );

                for (field_index, field) in fields.iter().enumerate() {
                    let ty = self.node_type(field.id)?;
                    let destination = self.create_register(ty, None);

                    self.push_instruction(Instruction::GetVariantField {
                        destination,
                        source: value,
                        variant: index,
                        index: field_index,
                    });
                    self.lower_pattern(field, Operand::Register(destination), otherwise)?;
                }
            }
        }

        Ok(())
    }

    fn branch_unless_equal(&mut self, lhs: Operand, rhs: Operand, otherwise: BlockId) {
        let condition = self.create_register(Type::bool(), None);
        self.push_instruction(Instruction::BinaryOperation {
            operator: BinaryOperatorKind::Equals,
            destination: condition,
            lhs,
            rhs,
        });

        let matched = self.create_block();
        self.terminate(Terminator::Branch {
            condition: Operand::Register(condition),
            positive: matched,
            negative: otherwise,
        });
        self.current = matched;
    }
}
