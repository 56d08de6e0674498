//! Programmatic construction of syntax trees.
//!
//! Every node receives a fresh [`NodeId`] and a synthetic one-unit [`Span`]
//! derived from it, so spans increase in construction order. Paths are
//! written as strings and split on `::`.

use std::cell::Cell;

use super::{
    Block, CallArgument, ConstDefinition, EnumDefinition, EnumVariant, Expression,
    ExpressionKind, FieldInitializer, FunctionDefinition, FunctionFlavor, FunctionParameter,
    FunctionParameterKind, GenericParameter, Identifier, ImplBlock, ImportTree, ImportTreeKind,
    Item, ItemKind, Literal, LiteralKind, Local, MatchArm, ModuleDefinition, NodeId,
    OverloadableOperator, Package, Path, Pattern, PatternKind, Statement, StatementKind,
    StructDefinition, StructField, TraitDefinition, Type, TypeKind, VariantPath, Visibility,
};
use crate::{
    frontend::{
        ast::{AssignmentOperatorKind, BinaryOperatorKind, UnaryOperatorKind},
        intern::InternedSymbol,
        span::Span,
    },
    middle::primitive::PrimitiveKind,
};

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: Cell<u32>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues numbering after an existing tree so ids never collide
    pub fn starting_at(first_id: u32) -> Self {
        Self {
            next_id: Cell::new(first_id),
        }
    }

    /// The id the next node will receive
    pub fn peek_id(&self) -> u32 {
        self.next_id.get()
    }

    fn fresh(&self) -> (NodeId, Span) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        (NodeId(id), Span::new(id as usize, id as usize + 1))
    }

    pub fn package(self, name: Option<&str>, items: Vec<Item>) -> Package {
        let node_count = self.next_id.get();

        Package {
            name: name.map(InternedSymbol::new),
            span: Span::new(0, node_count as usize),
            items,
            node_count,
        }
    }

    pub fn ident(&self, name: &str) -> Identifier {
        let (id, span) = self.fresh();

        Identifier {
            id,
            span,
            symbol: InternedSymbol::new(name),
        }
    }

    pub fn path(&self, path: &str) -> Path {
        let segments = path
            .split("::")
            .filter(|s| !s.is_empty())
            .map(|s| self.ident(s))
            .collect();
        let (id, span) = self.fresh();

        Path { id, span, segments }
    }

    /* Types */

    fn type_of_kind(&self, kind: TypeKind) -> Type {
        let (id, span) = self.fresh();

        Type { id, span, kind }
    }

    pub fn ty(&self, path: &str) -> Type {
        self.generic_ty(path, Vec::new())
    }

    pub fn generic_ty(&self, path: &str, arguments: Vec<Type>) -> Type {
        let path = self.path(path);

        self.type_of_kind(TypeKind::Path { path, arguments })
    }

    pub fn unit_ty(&self) -> Type {
        self.type_of_kind(TypeKind::Unit)
    }

    pub fn never_ty(&self) -> Type {
        self.type_of_kind(TypeKind::Never)
    }

    pub fn infer_ty(&self) -> Type {
        self.type_of_kind(TypeKind::Infer)
    }

    pub fn fn_ty(&self, parameters: Vec<Type>, return_type: Type) -> Type {
        self.type_of_kind(TypeKind::Function {
            parameters,
            return_type: Box::new(return_type),
        })
    }

    /* Items */

    fn item(&self, kind: ItemKind) -> Item {
        let (id, span) = self.fresh();

        Item {
            id,
            span,
            visibility: Visibility::Inherited,
            kind,
        }
    }

    pub fn public(&self, mut item: Item) -> Item {
        item.visibility = Visibility::Public;
        item
    }

    fn generics(&self, names: &[&str]) -> Vec<GenericParameter> {
        names
            .iter()
            .map(|name| {
                let name = self.ident(name);
                let (id, span) = self.fresh();

                GenericParameter { id, span, name }
            })
            .collect()
    }

    pub fn function(&self, name: &str) -> FunctionBuilder<'_> {
        let name = self.ident(name);
        let (id, span) = self.fresh();

        FunctionBuilder {
            builder: self,
            visibility: Visibility::Inherited,
            function: FunctionDefinition {
                id,
                span,
                name,
                generics: Vec::new(),
                parameters: Vec::new(),
                return_type: None,
                body: None,
                flavor: FunctionFlavor::Plain,
            },
        }
    }

    pub fn module(&self, name: &str, items: Vec<Item>) -> Item {
        let name = self.ident(name);

        self.item(ItemKind::Module(Box::new(ModuleDefinition { name, items })))
    }

    pub fn import_tree(&self, path: &str) -> ImportTree {
        self.import_tree_of_kind(path, ImportTreeKind::Simple { rename: None })
    }

    pub fn import_tree_as(&self, path: &str, rename: &str) -> ImportTree {
        let rename = Some(self.ident(rename));

        self.import_tree_of_kind(path, ImportTreeKind::Simple { rename })
    }

    pub fn import_tree_glob(&self, path: &str) -> ImportTree {
        self.import_tree_of_kind(path, ImportTreeKind::Glob)
    }

    pub fn import_tree_nested(&self, prefix: &str, trees: Vec<ImportTree>) -> ImportTree {
        self.import_tree_of_kind(prefix, ImportTreeKind::Nested(trees))
    }

    fn import_tree_of_kind(&self, path: &str, kind: ImportTreeKind) -> ImportTree {
        let prefix = self.path(path);
        let (id, span) = self.fresh();

        ImportTree {
            id,
            span,
            prefix,
            kind,
        }
    }

    pub fn import_item(&self, tree: ImportTree) -> Item {
        self.item(ItemKind::Import(Box::new(tree)))
    }

    /// `import a::b`
    pub fn import(&self, path: &str) -> Item {
        self.import_item(self.import_tree(path))
    }

    /// `import a::b as c`
    pub fn import_as(&self, path: &str, rename: &str) -> Item {
        self.import_item(self.import_tree_as(path, rename))
    }

    /// `import a::*`
    pub fn import_glob(&self, path: &str) -> Item {
        self.import_item(self.import_tree_glob(path))
    }

    pub fn structure(&self, name: &str, generics: &[&str], fields: Vec<(&str, Type)>) -> Item {
        let name = self.ident(name);
        let generics = self.generics(generics);
        let fields = fields
            .into_iter()
            .map(|(field_name, ty)| {
                let name = self.ident(field_name);
                let (id, span) = self.fresh();

                StructField {
                    id,
                    span,
                    visibility: Visibility::Public,
                    name,
                    ty,
                }
            })
            .collect();

        self.item(ItemKind::Struct(Box::new(StructDefinition {
            name,
            generics,
            fields,
        })))
    }

    pub fn enumeration(
        &self,
        name: &str,
        generics: &[&str],
        variants: Vec<(&str, Vec<Type>)>,
    ) -> Item {
        let name = self.ident(name);
        let generics = self.generics(generics);
        let variants = variants
            .into_iter()
            .map(|(variant_name, fields)| {
                let name = self.ident(variant_name);
                let (id, span) = self.fresh();

                EnumVariant {
                    id,
                    span,
                    name,
                    fields,
                }
            })
            .collect();

        self.item(ItemKind::Enum(Box::new(EnumDefinition {
            name,
            generics,
            variants,
        })))
    }

    pub fn trait_definition(&self, name: &str, items: Vec<Item>) -> Item {
        let name = self.ident(name);

        self.item(ItemKind::Trait(Box::new(TraitDefinition { name, items })))
    }

    pub fn impl_block(&self, generics: &[&str], self_ty: Type, items: Vec<Item>) -> Item {
        let generics = self.generics(generics);

        self.item(ItemKind::Impl(Box::new(ImplBlock {
            generics,
            trait_ref: None,
            self_ty,
            items,
        })))
    }

    pub fn trait_impl(
        &self,
        generics: &[&str],
        trait_path: &str,
        self_ty: Type,
        items: Vec<Item>,
    ) -> Item {
        let generics = self.generics(generics);
        let trait_ref = Some(self.path(trait_path));

        self.item(ItemKind::Impl(Box::new(ImplBlock {
            generics,
            trait_ref,
            self_ty,
            items,
        })))
    }

    pub fn constant(&self, name: &str, ty: Option<Type>, value: Expression) -> Item {
        let name = self.ident(name);

        self.item(ItemKind::Const(Box::new(ConstDefinition { name, ty, value })))
    }

    /* Statements */

    fn statement(&self, kind: StatementKind) -> Statement {
        let (id, span) = self.fresh();

        Statement { id, span, kind }
    }

    pub fn let_pattern(
        &self,
        pattern: Pattern,
        ty: Option<Type>,
        initializer: Option<Expression>,
    ) -> Statement {
        let (id, span) = self.fresh();
        let local = Local {
            id,
            span,
            pattern,
            ty,
            initializer: initializer.map(Box::new),
        };

        self.statement(StatementKind::Local(Box::new(local)))
    }

    /// `let name = initializer;`
    pub fn let_(&self, name: &str, initializer: Expression) -> Statement {
        let pattern = self.pat_bind(name);

        self.let_pattern(pattern, None, Some(initializer))
    }

    /// `let mut name = initializer;`
    pub fn let_mut(&self, name: &str, initializer: Expression) -> Statement {
        let pattern = self.pat_bind_mut(name);

        self.let_pattern(pattern, None, Some(initializer))
    }

    /// `let name: ty [= initializer];`
    pub fn let_typed(&self, name: &str, ty: Type, initializer: Option<Expression>) -> Statement {
        let pattern = self.pat_bind(name);

        self.let_pattern(pattern, Some(ty), initializer)
    }

    /// Expression statement terminated with a semicolon
    pub fn semi(&self, expression: Expression) -> Statement {
        self.statement(StatementKind::SemiExpr(Box::new(expression)))
    }

    /// Expression statement without a semicolon
    pub fn bare(&self, expression: Expression) -> Statement {
        self.statement(StatementKind::BareExpr(Box::new(expression)))
    }

    pub fn empty(&self) -> Statement {
        self.statement(StatementKind::Empty)
    }

    pub fn block(&self, statements: Vec<Statement>) -> Block {
        let (id, span) = self.fresh();

        Block {
            id,
            span,
            statements,
        }
    }

    /* Expressions */

    fn expression(&self, kind: ExpressionKind) -> Expression {
        let (id, span) = self.fresh();

        Expression { id, span, kind }
    }

    fn literal(&self, kind: LiteralKind) -> Literal {
        let (id, span) = self.fresh();

        Literal { id, span, kind }
    }

    fn literal_expression(&self, kind: LiteralKind) -> Expression {
        let literal = self.literal(kind);

        self.expression(ExpressionKind::Literal(Box::new(literal)))
    }

    pub fn int(&self, value: u64) -> Expression {
        self.literal_expression(LiteralKind::Integer(value, None))
    }

    pub fn int_suffixed(&self, value: u64, suffix: PrimitiveKind) -> Expression {
        self.literal_expression(LiteralKind::Integer(value, Some(suffix)))
    }

    pub fn float(&self, value: f64) -> Expression {
        self.literal_expression(LiteralKind::Float(value, None))
    }

    pub fn boolean(&self, value: bool) -> Expression {
        self.literal_expression(LiteralKind::Boolean(value))
    }

    pub fn character(&self, value: char) -> Expression {
        self.literal_expression(LiteralKind::Char(value))
    }

    pub fn string(&self, value: &str) -> Expression {
        self.literal_expression(LiteralKind::String(InternedSymbol::new(value)))
    }

    pub fn unit(&self) -> Expression {
        self.literal_expression(LiteralKind::Unit)
    }

    /// A path expression such as `x` or `Color::Red`
    pub fn var(&self, path: &str) -> Expression {
        let path = self.path(path);

        self.expression(ExpressionKind::Path(Box::new(path)))
    }

    pub fn block_expr(&self, statements: Vec<Statement>) -> Expression {
        let block = self.block(statements);

        self.expression(ExpressionKind::Block(Box::new(block)))
    }

    pub fn binary(&self, lhs: Expression, operator: BinaryOperatorKind, rhs: Expression) -> Expression {
        self.expression(ExpressionKind::Binary {
            lhs: Box::new(lhs),
            operator,
            rhs: Box::new(rhs),
        })
    }

    pub fn unary(&self, operator: UnaryOperatorKind, operand: Expression) -> Expression {
        self.expression(ExpressionKind::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    fn arguments(&self, arguments: Vec<(Option<&str>, Expression)>) -> Vec<CallArgument> {
        arguments
            .into_iter()
            .map(|(label, value)| {
                let label = label.map(|l| self.ident(l));
                let (id, span) = self.fresh();

                CallArgument {
                    id,
                    span,
                    label,
                    value,
                }
            })
            .collect()
    }

    /// A call whose arguments are all passed without labels
    pub fn call(&self, target: Expression, arguments: Vec<Expression>) -> Expression {
        self.call_labeled(target, arguments.into_iter().map(|a| (None, a)).collect())
    }

    pub fn call_labeled(
        &self,
        target: Expression,
        arguments: Vec<(Option<&str>, Expression)>,
    ) -> Expression {
        let arguments = self.arguments(arguments);

        self.expression(ExpressionKind::Call {
            target: Box::new(target),
            arguments,
        })
    }

    pub fn method_call(
        &self,
        receiver: Expression,
        method: &str,
        arguments: Vec<Expression>,
    ) -> Expression {
        let method = self.ident(method);
        let arguments = self.arguments(arguments.into_iter().map(|a| (None, a)).collect());

        self.expression(ExpressionKind::MethodCall {
            receiver: Box::new(receiver),
            method,
            arguments,
        })
    }

    pub fn field(&self, target: Expression, field: &str) -> Expression {
        let field = self.ident(field);

        self.expression(ExpressionKind::Field {
            target: Box::new(target),
            field,
        })
    }

    pub fn struct_literal(&self, path: &str, fields: Vec<(&str, Expression)>) -> Expression {
        let path = self.path(path);
        let fields = fields
            .into_iter()
            .map(|(name, value)| {
                let name = self.ident(name);
                let (id, span) = self.fresh();

                FieldInitializer {
                    id,
                    span,
                    name,
                    value,
                }
            })
            .collect();

        self.expression(ExpressionKind::StructLiteral {
            path: Box::new(path),
            fields,
        })
    }

    pub fn assign(&self, lhs: Expression, rhs: Expression) -> Expression {
        self.expression(ExpressionKind::Assignment {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// `lhs op= rhs`
    pub fn op_assign(
        &self,
        lhs: Expression,
        operator: AssignmentOperatorKind,
        rhs: Expression,
    ) -> Expression {
        self.expression(ExpressionKind::OperatorAssignment {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn if_(&self, condition: Expression, positive: Block, negative: Option<Expression>) -> Expression {
        self.expression(ExpressionKind::If {
            condition: Box::new(condition),
            positive: Box::new(positive),
            negative: negative.map(Box::new),
        })
    }

    pub fn loop_(&self, block: Block) -> Expression {
        self.expression(ExpressionKind::Loop(Box::new(block)))
    }

    pub fn while_(&self, condition: Expression, block: Block) -> Expression {
        self.expression(ExpressionKind::While {
            condition: Box::new(condition),
            block: Box::new(block),
        })
    }

    pub fn for_(&self, pattern: Pattern, iterable: Expression, block: Block) -> Expression {
        self.expression(ExpressionKind::For {
            pattern: Box::new(pattern),
            iterable: Box::new(iterable),
            block: Box::new(block),
        })
    }

    /// `guard condition`
    pub fn guard(&self, condition: Expression) -> Expression {
        self.expression(ExpressionKind::Guard {
            condition: Box::new(condition),
            otherwise: None,
        })
    }

    /// `guard condition else { otherwise }`
    pub fn guard_else(&self, condition: Expression, otherwise: Block) -> Expression {
        self.expression(ExpressionKind::Guard {
            condition: Box::new(condition),
            otherwise: Some(Box::new(otherwise)),
        })
    }

    pub fn match_(&self, scrutinee: Expression, arms: Vec<MatchArm>) -> Expression {
        self.expression(ExpressionKind::Match {
            scrutinee: Box::new(scrutinee),
            arms,
        })
    }

    pub fn arm(&self, pattern: Pattern, body: Expression) -> MatchArm {
        let (id, span) = self.fresh();

        MatchArm {
            id,
            span,
            pattern,
            body,
        }
    }

    pub fn break_(&self) -> Expression {
        self.expression(ExpressionKind::Break)
    }

    pub fn continue_(&self) -> Expression {
        self.expression(ExpressionKind::Continue)
    }

    pub fn return_(&self, value: Option<Expression>) -> Expression {
        self.expression(ExpressionKind::Return(value.map(Box::new)))
    }

    /// `:Variant(arguments)`
    pub fn variant(&self, name: &str, arguments: Vec<Expression>) -> Expression {
        let name = self.ident(name);

        self.expression(ExpressionKind::VariantShorthand { name, arguments })
    }

    /* Patterns */

    fn pattern(&self, kind: PatternKind) -> Pattern {
        let (id, span) = self.fresh();

        Pattern { id, span, kind }
    }

    pub fn pat_wild(&self) -> Pattern {
        self.pattern(PatternKind::Wildcard)
    }

    pub fn pat_bind(&self, name: &str) -> Pattern {
        let name = self.ident(name);

        self.pattern(PatternKind::Binding {
            name,
            is_mutable: false,
        })
    }

    pub fn pat_bind_mut(&self, name: &str) -> Pattern {
        let name = self.ident(name);

        self.pattern(PatternKind::Binding {
            name,
            is_mutable: true,
        })
    }

    pub fn pat_int(&self, value: u64) -> Pattern {
        let literal = self.literal(LiteralKind::Integer(value, None));

        self.pattern(PatternKind::Literal(Box::new(literal)))
    }

    pub fn pat_bool(&self, value: bool) -> Pattern {
        let literal = self.literal(LiteralKind::Boolean(value));

        self.pattern(PatternKind::Literal(Box::new(literal)))
    }

    /// `Enum::Variant(fields)`
    pub fn pat_variant(&self, path: &str, fields: Vec<Pattern>) -> Pattern {
        let path = VariantPath::Path(self.path(path));

        self.pattern(PatternKind::Variant { path, fields })
    }

    /// `:Variant(fields)`
    pub fn pat_shorthand(&self, name: &str, fields: Vec<Pattern>) -> Pattern {
        let path = VariantPath::Shorthand(self.ident(name));

        self.pattern(PatternKind::Variant { path, fields })
    }
}

/// Incrementally assembles a function item
#[derive(Debug)]
pub struct FunctionBuilder<'b> {
    builder: &'b AstBuilder,
    visibility: Visibility,
    function: FunctionDefinition,
}

impl FunctionBuilder<'_> {
    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }

    pub fn generic(mut self, name: &str) -> Self {
        self.function
            .generics
            .extend(self.builder.generics(&[name]));
        self
    }

    fn parameter(mut self, kind: FunctionParameterKind, ty: Option<Type>) -> Self {
        let (id, span) = self.builder.fresh();

        self.function.parameters.push(FunctionParameter { id, span, kind, ty });
        self
    }

    /// `self`
    pub fn self_param(self) -> Self {
        self.parameter(FunctionParameterKind::SelfValue, None)
    }

    /// `name: ty`, passed with a label
    pub fn param(self, name: &str, ty: Type) -> Self {
        let name = self.builder.ident(name);

        self.parameter(FunctionParameterKind::Named(name), Some(ty))
    }

    /// `_ name: ty`, passed positionally
    pub fn ordered_param(self, name: &str, ty: Type) -> Self {
        let name = self.builder.ident(name);

        self.parameter(FunctionParameterKind::Ordered(name), Some(ty))
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.function.return_type = Some(ty);
        self
    }

    pub fn getter(mut self) -> Self {
        self.function.flavor = FunctionFlavor::Getter;
        self
    }

    pub fn setter(mut self) -> Self {
        self.function.flavor = FunctionFlavor::Setter;
        self
    }

    pub fn override_operator(mut self, operator: OverloadableOperator) -> Self {
        self.function.flavor = FunctionFlavor::Override(operator);
        self
    }

    pub fn body(mut self, statements: Vec<Statement>) -> Item {
        self.function.body = Some(self.builder.block(statements));
        self.build()
    }

    /// Finishes the function without a body (a trait signature)
    pub fn build(self) -> Item {
        let mut item = self
            .builder
            .item(ItemKind::Function(Box::new(self.function)));
        item.visibility = self.visibility;
        item
    }
}
