//! In-place traversal of HIR bodies in DFS order

use super::{Arm, Block, Expr, ExprKind, Pattern, PatternKind, Statement, StatementKind};

pub trait MutVisitor: Sized {
    fn visit_expr(&mut self, expr: &mut Expr) {
        walk_expr(self, expr)
    }

    fn visit_block(&mut self, block: &mut Block) {
        walk_block(self, block)
    }

    fn visit_statement(&mut self, statement: &mut Statement) {
        walk_statement(self, statement)
    }

    fn visit_arm(&mut self, arm: &mut Arm) {
        self.visit_pattern(&mut arm.pattern);
        self.visit_expr(&mut arm.body);
    }

    fn visit_pattern(&mut self, pattern: &mut Pattern) {
        walk_pattern(self, pattern)
    }
}

pub fn walk_block(visitor: &mut impl MutVisitor, block: &mut Block) {
    for statement in &mut block.statements {
        visitor.visit_statement(statement);
    }

    if let Some(tail) = &mut block.tail {
        visitor.visit_expr(tail);
    }
}

pub fn walk_statement(visitor: &mut impl MutVisitor, statement: &mut Statement) {
    match &mut statement.kind {
        StatementKind::Let {
            pattern,
            initializer,
            ..
        } => {
            if let Some(initializer) = initializer {
                visitor.visit_expr(initializer);
            }

            visitor.visit_pattern(pattern);
        }
        StatementKind::Expr(expr) => visitor.visit_expr(expr),
    }
}

pub fn walk_pattern(visitor: &mut impl MutVisitor, pattern: &mut Pattern) {
    if let PatternKind::Variant { fields, .. } = &mut pattern.kind {
        for field in fields {
            visitor.visit_pattern(field);
        }
    }
}

pub fn walk_expr(visitor: &mut impl MutVisitor, expr: &mut Expr) {
    match &mut expr.kind {
        ExprKind::Literal(_)
        | ExprKind::Path(_)
        | ExprKind::Break
        | ExprKind::Continue
        | ExprKind::Return(None) => {}
        ExprKind::VariantShorthand { arguments, .. } => {
            for argument in arguments {
                visitor.visit_expr(argument);
            }
        }
        ExprKind::Block(block) | ExprKind::Loop(block) => visitor.visit_block(block),
        ExprKind::Call { target, arguments } => {
            visitor.visit_expr(target);

            for argument in arguments {
                visitor.visit_expr(&mut argument.value);
            }
        }
        ExprKind::MethodCall {
            receiver,
            arguments,
            ..
        } => {
            visitor.visit_expr(receiver);

            for argument in arguments {
                visitor.visit_expr(&mut argument.value);
            }
        }
        ExprKind::Field { target, .. } => visitor.visit_expr(target),
        ExprKind::StructLiteral { fields, .. } => {
            for field in fields {
                visitor.visit_expr(&mut field.value);
            }
        }
        ExprKind::Binary { lhs, rhs, .. }
        | ExprKind::Assign { lhs, rhs }
        | ExprKind::OperatorAssign { lhs, rhs, .. } => {
            visitor.visit_expr(lhs);
            visitor.visit_expr(rhs);
        }
        ExprKind::Unary { operand, .. } => visitor.visit_expr(operand),
        ExprKind::If {
            condition,
            positive,
            negative,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_block(positive);

            if let Some(negative) = negative {
                visitor.visit_expr(negative);
            }
        }
        ExprKind::Match { scrutinee, arms } => {
            visitor.visit_expr(scrutinee);

            for arm in arms {
                visitor.visit_arm(arm);
            }
        }
        ExprKind::Return(Some(value)) => visitor.visit_expr(value),
        ExprKind::While { condition, block } => {
            visitor.visit_expr(condition);
            visitor.visit_block(block);
        }
        ExprKind::For {
            pattern,
            iterable,
            block,
        } => {
            visitor.visit_expr(iterable);
            visitor.visit_pattern(pattern);
            visitor.visit_block(block);
        }
        ExprKind::Guard {
            condition,
            otherwise,
        } => {
            visitor.visit_expr(condition);

            if let Some(otherwise) = otherwise {
                visitor.visit_block(otherwise);
            }
        }
    }
}
