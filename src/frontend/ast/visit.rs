//! Trait definition for an AST visitor which walks the tree in DFS order

use super::{
    Block, CallArgument, EnumVariant, Expression, ExpressionKind, FunctionDefinition,
    FunctionParameter, GenericParameter, Identifier, ImplBlock, ImportTree, Item, ItemKind,
    Literal, Local, MatchArm, Package, Path, Pattern, PatternKind, Statement, StatementKind,
    StructField, Type, TypeKind, VariantPath,
};

pub trait Visitor<'ast>: Sized {
    fn visit_item(&mut self, item: &'ast Item) {
        walk_item(self, item)
    }

    fn visit_import_tree(&mut self, _tree: &'ast ImportTree) {}

    fn visit_function_definition(&mut self, function: &'ast FunctionDefinition) {
        walk_function_definition(self, function)
    }

    fn visit_generic_parameter(&mut self, _parameter: &'ast GenericParameter) {}

    fn visit_function_parameter(&mut self, parameter: &'ast FunctionParameter) {
        walk_function_parameter(self, parameter)
    }

    fn visit_struct_field(&mut self, field: &'ast StructField) {
        self.visit_type(&field.ty)
    }

    fn visit_enum_variant(&mut self, variant: &'ast EnumVariant) {
        for ty in &variant.fields {
            self.visit_type(ty);
        }
    }

    fn visit_impl_block(&mut self, block: &'ast ImplBlock) {
        walk_impl_block(self, block)
    }

    fn visit_identifier(&mut self, _identifier: &'ast Identifier) {}

    fn visit_type(&mut self, ty: &'ast Type) {
        walk_type(self, ty)
    }

    fn visit_path(&mut self, _path: &'ast Path) {}

    fn visit_block(&mut self, block: &'ast Block) {
        walk_block(self, block)
    }

    fn visit_statement(&mut self, statement: &'ast Statement) {
        walk_statement(self, statement)
    }

    fn visit_local(&mut self, local: &'ast Local) {
        walk_local(self, local)
    }

    fn visit_pattern(&mut self, pattern: &'ast Pattern) {
        walk_pattern(self, pattern)
    }

    fn visit_expression(&mut self, expression: &'ast Expression) {
        walk_expression(self, expression)
    }

    fn visit_match_arm(&mut self, arm: &'ast MatchArm) {
        walk_match_arm(self, arm)
    }

    fn visit_call_argument(&mut self, argument: &'ast CallArgument) {
        self.visit_expression(&argument.value)
    }

    fn visit_literal(&mut self, _literal: &'ast Literal) {}
}

pub fn walk_package<'a>(visitor: &mut impl Visitor<'a>, package: &'a Package) {
    for item in &package.items {
        visitor.visit_item(item);
    }
}

pub fn walk_item<'a>(visitor: &mut impl Visitor<'a>, item: &'a Item) {
    match &item.kind {
        ItemKind::Module(module) => {
            visitor.visit_identifier(&module.name);

            for item in &module.items {
                visitor.visit_item(item);
            }
        }
        ItemKind::Import(tree) => visitor.visit_import_tree(tree),
        ItemKind::Function(function) => visitor.visit_function_definition(function),
        ItemKind::Struct(definition) => {
            visitor.visit_identifier(&definition.name);

            for parameter in &definition.generics {
                visitor.visit_generic_parameter(parameter);
            }

            for field in &definition.fields {
                visitor.visit_struct_field(field);
            }
        }
        ItemKind::Enum(definition) => {
            visitor.visit_identifier(&definition.name);

            for parameter in &definition.generics {
                visitor.visit_generic_parameter(parameter);
            }

            for variant in &definition.variants {
                visitor.visit_enum_variant(variant);
            }
        }
        ItemKind::Trait(definition) => {
            visitor.visit_identifier(&definition.name);

            for item in &definition.items {
                visitor.visit_item(item);
            }
        }
        ItemKind::Impl(block) => visitor.visit_impl_block(block),
        ItemKind::Const(definition) => {
            visitor.visit_identifier(&definition.name);

            if let Some(ty) = &definition.ty {
                visitor.visit_type(ty);
            }

            visitor.visit_expression(&definition.value);
        }
    }
}

pub fn walk_function_definition<'a>(
    visitor: &mut impl Visitor<'a>,
    function: &'a FunctionDefinition,
) {
    visitor.visit_identifier(&function.name);

    for parameter in &function.generics {
        visitor.visit_generic_parameter(parameter);
    }

    for parameter in &function.parameters {
        visitor.visit_function_parameter(parameter);
    }

    if let Some(ty) = &function.return_type {
        visitor.visit_type(ty);
    }

    if let Some(body) = &function.body {
        visitor.visit_block(body);
    }
}

pub fn walk_function_parameter<'a>(
    visitor: &mut impl Visitor<'a>,
    parameter: &'a FunctionParameter,
) {
    if let Some(ty) = &parameter.ty {
        visitor.visit_type(ty);
    }
}

pub fn walk_impl_block<'a>(visitor: &mut impl Visitor<'a>, block: &'a ImplBlock) {
    for parameter in &block.generics {
        visitor.visit_generic_parameter(parameter);
    }

    if let Some(trait_ref) = &block.trait_ref {
        visitor.visit_path(trait_ref);
    }

    visitor.visit_type(&block.self_ty);

    for item in &block.items {
        visitor.visit_item(item);
    }
}

pub fn walk_type<'a>(visitor: &mut impl Visitor<'a>, ty: &'a Type) {
    match &ty.kind {
        TypeKind::Path { path, arguments } => {
            visitor.visit_path(path);

            for argument in arguments {
                visitor.visit_type(argument);
            }
        }
        TypeKind::Function {
            parameters,
            return_type,
        } => {
            for parameter in parameters {
                visitor.visit_type(parameter);
            }

            visitor.visit_type(return_type);
        }
        TypeKind::Unit | TypeKind::Never | TypeKind::Infer => {}
    }
}

pub fn walk_block<'a>(visitor: &mut impl Visitor<'a>, block: &'a Block) {
    for statement in &block.statements {
        visitor.visit_statement(statement);
    }
}

pub fn walk_statement<'a>(visitor: &mut impl Visitor<'a>, statement: &'a Statement) {
    match &statement.kind {
        StatementKind::Local(local) => visitor.visit_local(local),
        StatementKind::BareExpr(expression) | StatementKind::SemiExpr(expression) => {
            visitor.visit_expression(expression)
        }
        StatementKind::Empty => {}
    }
}

pub fn walk_local<'a>(visitor: &mut impl Visitor<'a>, local: &'a Local) {
    if let Some(ty) = &local.ty {
        visitor.visit_type(ty);
    }

    if let Some(initializer) = &local.initializer {
        visitor.visit_expression(initializer);
    }

    visitor.visit_pattern(&local.pattern);
}

pub fn walk_pattern<'a>(visitor: &mut impl Visitor<'a>, pattern: &'a Pattern) {
    match &pattern.kind {
        PatternKind::Wildcard => {}
        PatternKind::Binding { name, .. } => visitor.visit_identifier(name),
        PatternKind::Literal(literal) => visitor.visit_literal(literal),
        PatternKind::Variant { path, fields } => {
            match path {
                VariantPath::Path(path) => visitor.visit_path(path),
                VariantPath::Shorthand(name) => visitor.visit_identifier(name),
            }

            for field in fields {
                visitor.visit_pattern(field);
            }
        }
    }
}

pub fn walk_match_arm<'a>(visitor: &mut impl Visitor<'a>, arm: &'a MatchArm) {
    visitor.visit_pattern(&arm.pattern);
    visitor.visit_expression(&arm.body);
}

pub fn walk_expression<'a>(visitor: &mut impl Visitor<'a>, expression: &'a Expression) {
    match &expression.kind {
        ExpressionKind::Literal(literal) => visitor.visit_literal(literal),
        ExpressionKind::Path(path) => visitor.visit_path(path),
        ExpressionKind::VariantShorthand { name, arguments } => {
            visitor.visit_identifier(name);

            for argument in arguments {
                visitor.visit_expression(argument);
            }
        }
        ExpressionKind::Block(block) | ExpressionKind::Loop(block) => visitor.visit_block(block),
        ExpressionKind::Call { target, arguments } => {
            visitor.visit_expression(target);

            for argument in arguments {
                visitor.visit_call_argument(argument);
            }
        }
        ExpressionKind::MethodCall {
            receiver,
            method,
            arguments,
        } => {
            visitor.visit_expression(receiver);
            visitor.visit_identifier(method);

            for argument in arguments {
                visitor.visit_call_argument(argument);
            }
        }
        ExpressionKind::Field { target, field } => {
            visitor.visit_expression(target);
            visitor.visit_identifier(field);
        }
        ExpressionKind::StructLiteral { path, fields } => {
            visitor.visit_path(path);

            for field in fields {
                visitor.visit_expression(&field.value);
            }
        }
        ExpressionKind::Binary { lhs, rhs, .. }
        | ExpressionKind::Assignment { lhs, rhs }
        | ExpressionKind::OperatorAssignment { lhs, rhs, .. } => {
            visitor.visit_expression(lhs);
            visitor.visit_expression(rhs);
        }
        ExpressionKind::Unary { operand, .. } => visitor.visit_expression(operand),
        ExpressionKind::If {
            condition,
            positive,
            negative,
        } => {
            visitor.visit_expression(condition);
            visitor.visit_block(positive);

            if let Some(negative) = negative {
                visitor.visit_expression(negative);
            }
        }
        ExpressionKind::While { condition, block } => {
            visitor.visit_expression(condition);
            visitor.visit_block(block);
        }
        ExpressionKind::For {
            pattern,
            iterable,
            block,
        } => {
            visitor.visit_expression(iterable);
            visitor.visit_pattern(pattern);
            visitor.visit_block(block);
        }
        ExpressionKind::Guard {
            condition,
            otherwise,
        } => {
            visitor.visit_expression(condition);

            if let Some(otherwise) = otherwise {
                visitor.visit_block(otherwise);
            }
        }
        ExpressionKind::Match { scrutinee, arms } => {
            visitor.visit_expression(scrutinee);

            for arm in arms {
                visitor.visit_match_arm(arm);
            }
        }
        ExpressionKind::Return(Some(value)) => visitor.visit_expression(value),
        ExpressionKind::Break | ExpressionKind::Continue | ExpressionKind::Return(None) => {}
    }
}
