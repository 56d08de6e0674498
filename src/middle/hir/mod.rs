//! A high level intermediate representation of the source code. Every path is
//! replaced by what it resolved to and item bodies are split from their
//! declarations so they can be checked independently. Sugared control flow
//! is still present until the simplifier runs.

use std::collections::BTreeMap;

use crate::{
    frontend::{
        ast::{
            AssignmentOperatorKind, BinaryOperatorKind, LiteralKind, OverloadableOperator,
            UnaryOperatorKind,
        },
        intern::InternedSymbol,
        span::Span,
    },
    index::{Index, simple_index},
    middle::{def::DefId, prelude::LangItems, resolve::Res},
};

pub mod visit;

simple_index! {
    /// Identifies a node within the body that contains it
    pub struct ItemLocalId;
}

#[derive(Debug)]
pub struct Package {
    pub items: BTreeMap<DefId, Item>,
    /// Function, method and constant bodies keyed by their owner
    pub bodies: BTreeMap<DefId, Body>,
    pub lang_items: LangItems,
}

impl Package {
    pub fn item(&self, def: DefId) -> Option<&Item> {
        self.items.get(&def)
    }

    pub fn function(&self, def: DefId) -> Option<&FnDecl> {
        match &self.items.get(&def)?.kind {
            ItemKind::Function(decl) => Some(decl),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub def: DefId,
    pub span: Span,
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// Free functions as well as functions inside impls and traits
    Function(FnDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    Trait(TraitDecl),
    Impl(ImplDecl),
    Const(ConstDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub generics: Vec<DefId>,
    pub params: Vec<Param>,
    pub return_type: Option<Ty>,
    pub flavor: FnFlavor,
    /// The impl or trait this function is declared in
    pub container: Option<DefId>,
    pub has_body: bool,
}

impl FnDecl {
    pub fn has_receiver(&self) -> bool {
        self.params
            .first()
            .is_some_and(|param| param.kind == ParamKind::SelfValue)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnFlavor {
    Plain,
    Getter,
    Setter,
    Override(OverloadableOperator),
    /// A getter or setter after simplification, renamed to an ordinary
    /// method and invoked implicitly through `property`
    Accessor {
        kind: AccessorKind,
        property: InternedSymbol,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Get,
    Set,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// The local binding introduced for the parameter
    pub local: DefId,
    pub kind: ParamKind,
    pub ty: Option<Ty>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    SelfValue,
    /// Passed with its name as a label
    Named(InternedSymbol),
    /// Passed positionally
    Ordered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub generics: Vec<DefId>,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub def: DefId,
    pub name: InternedSymbol,
    pub ty: Ty,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub generics: Vec<DefId>,
    pub variants: Vec<VariantDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantDecl {
    pub def: DefId,
    pub name: InternedSymbol,
    pub fields: Vec<Ty>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDecl {
    pub methods: Vec<DefId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImplDecl {
    pub generics: Vec<DefId>,
    pub trait_ref: Option<Res>,
    pub self_ty: Ty,
    pub methods: Vec<DefId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub ty: Option<Ty>,
}

/// A type as written in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Ty {
    pub span: Span,
    pub kind: TyKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TyKind {
    Path(Res, Vec<Ty>),
    Unit,
    Never,
    Function(Vec<Ty>, Box<Ty>),
    /// `_`
    Infer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub owner: DefId,
    /// Parameter locals in declaration order
    pub params: Vec<DefId>,
    pub value: Expr,
    /// The id the next node added to this body receives
    pub next_id: ItemLocalId,
}

impl Body {
    pub fn new(owner: DefId, params: Vec<DefId>, value: Expr, next_id: ItemLocalId) -> Self {
        Self {
            owner,
            params,
            value,
            next_id,
        }
    }

    pub fn fresh_id(&mut self) -> ItemLocalId {
        let id = self.next_id;
        self.next_id.increment_by(1);
        id
    }

    /// One past the largest node id in the body
    pub fn node_count(&self) -> usize {
        self.next_id.index()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident {
    pub symbol: InternedSymbol,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ItemLocalId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(LiteralKind),
    Path(Res),
    /// `:Variant(args)`, resolved against the expected type
    VariantShorthand {
        name: Ident,
        arguments: Vec<Expr>,
    },
    Block(Block),
    Call {
        target: Box<Expr>,
        arguments: Vec<Argument>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: Ident,
        arguments: Vec<Argument>,
    },
    Field {
        target: Box<Expr>,
        field: Ident,
    },
    StructLiteral {
        res: Res,
        fields: Vec<FieldInit>,
    },
    Binary {
        operator: BinaryOperatorKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        operator: UnaryOperatorKind,
        operand: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        positive: Block,
        negative: Option<Box<Expr>>,
    },
    Loop(Block),
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<Arm>,
    },
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Break,
    Continue,
    Return(Option<Box<Expr>>),

    /* Removed by the simplifier */
    While {
        condition: Box<Expr>,
        block: Block,
    },
    For {
        pattern: Pattern,
        iterable: Box<Expr>,
        block: Block,
    },
    Guard {
        condition: Box<Expr>,
        otherwise: Option<Block>,
    },
    OperatorAssign {
        operator: AssignmentOperatorKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl ExprKind {
    /// Whether this is syntax the simplifier rewrites away
    pub fn is_sugar(&self) -> bool {
        matches!(
            self,
            ExprKind::While { .. }
                | ExprKind::For { .. }
                | ExprKind::Guard { .. }
                | ExprKind::OperatorAssign { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub label: Option<Ident>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arm {
    pub pattern: Pattern,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: ItemLocalId,
    pub span: Span,
    pub statements: Vec<Statement>,
    /// The trailing expression without a semicolon which gives the block its
    /// value
    pub tail: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub span: Span,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Let {
        pattern: Pattern,
        ty: Option<Ty>,
        initializer: Option<Expr>,
    },
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub id: ItemLocalId,
    pub span: Span,
    pub kind: PatternKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    Wildcard,
    Binding {
        local: DefId,
        name: InternedSymbol,
        is_mutable: bool,
    },
    Literal(LiteralKind),
    Variant {
        path: VariantRef,
        fields: Vec<Pattern>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariantRef {
    Res(Res),
    Shorthand(Ident),
}
