//! The syntax tree handed to the pipeline by the parser. Nodes are immutable
//! once built and carry no resolution or type information.

use super::{intern::InternedSymbol, span::Span};
use crate::middle::primitive::{FloatKind, PrimitiveKind};

pub mod build;
pub mod visit;

/// A whole compilation unit
#[derive(Debug)]
pub struct Package {
    /// `None` for a detached script, which has no `pkg` root to address
    pub name: Option<InternedSymbol>,
    pub span: Span,
    pub items: Vec<Item>,
    /// One past the largest node id used anywhere in the tree
    pub node_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Inherited,
}

#[derive(Debug)]
pub struct Item {
    pub id: NodeId,
    pub span: Span,
    pub visibility: Visibility,
    pub kind: ItemKind,
}

#[derive(Debug)]
pub enum ItemKind {
    Module(Box<ModuleDefinition>),
    Import(Box<ImportTree>),
    Function(Box<FunctionDefinition>),
    Struct(Box<StructDefinition>),
    Enum(Box<EnumDefinition>),
    Trait(Box<TraitDefinition>),
    Impl(Box<ImplBlock>),
    Const(Box<ConstDefinition>),
}

impl Item {
    pub fn is_function(&self) -> bool {
        matches!(self.kind, ItemKind::Function(_))
    }
}

/// The function items of an impl or trait body. Other items there are
/// reported when the module tree is built and ignored by later passes.
pub fn associated_functions(items: &[Item]) -> impl Iterator<Item = &Item> {
    items.iter().filter(|item| item.is_function())
}

impl ItemKind {
    /// The name this item declares in its enclosing namespace
    pub fn name(&self) -> Option<&Identifier> {
        match self {
            ItemKind::Module(module) => Some(&module.name),
            ItemKind::Function(function) => Some(&function.name),
            ItemKind::Struct(definition) => Some(&definition.name),
            ItemKind::Enum(definition) => Some(&definition.name),
            ItemKind::Trait(definition) => Some(&definition.name),
            ItemKind::Const(definition) => Some(&definition.name),
            ItemKind::Import(_) | ItemKind::Impl(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct ModuleDefinition {
    pub name: Identifier,
    pub items: Vec<Item>,
}

/// `import a::b`, `import a::b as c`, `import a::*`, `import a::{b, c::{self, d}}`
#[derive(Debug)]
pub struct ImportTree {
    pub id: NodeId,
    pub span: Span,
    pub prefix: Path,
    pub kind: ImportTreeKind,
}

#[derive(Debug)]
pub enum ImportTreeKind {
    Simple { rename: Option<Identifier> },
    Glob,
    Nested(Vec<ImportTree>),
}

#[derive(Debug)]
pub struct FunctionDefinition {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub generics: Vec<GenericParameter>,
    pub parameters: Vec<FunctionParameter>,
    /// Inferred from the body when absent
    pub return_type: Option<Type>,
    /// Absent for trait method signatures
    pub body: Option<Block>,
    pub flavor: FunctionFlavor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionFlavor {
    Plain,
    Getter,
    Setter,
    Override(OverloadableOperator),
}

#[derive(Debug)]
pub struct GenericParameter {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
}

#[derive(Debug)]
pub struct FunctionParameter {
    pub id: NodeId,
    pub span: Span,
    pub kind: FunctionParameterKind,
    /// Always present except for `self`
    pub ty: Option<Type>,
}

#[derive(Debug)]
pub enum FunctionParameterKind {
    /// `self`
    SelfValue,
    /// `a: T`, passed as `f(a: x)`
    Named(Identifier),
    /// `_ a: T`, passed as `f(x)`
    Ordered(Identifier),
}

#[derive(Debug)]
pub struct StructDefinition {
    pub name: Identifier,
    pub generics: Vec<GenericParameter>,
    pub fields: Vec<StructField>,
}

#[derive(Debug)]
pub struct StructField {
    pub id: NodeId,
    pub span: Span,
    pub visibility: Visibility,
    pub name: Identifier,
    pub ty: Type,
}

#[derive(Debug)]
pub struct EnumDefinition {
    pub name: Identifier,
    pub generics: Vec<GenericParameter>,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug)]
pub struct EnumVariant {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub fields: Vec<Type>,
}

#[derive(Debug)]
pub struct TraitDefinition {
    pub name: Identifier,
    /// Function items only
    pub items: Vec<Item>,
}

#[derive(Debug)]
pub struct ImplBlock {
    pub generics: Vec<GenericParameter>,
    pub trait_ref: Option<Path>,
    pub self_ty: Type,
    /// Function items only
    pub items: Vec<Item>,
}

#[derive(Debug)]
pub struct ConstDefinition {
    pub name: Identifier,
    pub ty: Option<Type>,
    pub value: Expression,
}

#[derive(Debug)]
pub struct Type {
    pub id: NodeId,
    pub span: Span,
    pub kind: TypeKind,
}

#[derive(Debug)]
pub enum TypeKind {
    Path { path: Path, arguments: Vec<Type> },
    Unit,
    Never,
    Function {
        parameters: Vec<Type>,
        return_type: Box<Type>,
    },
    /// `_`
    Infer,
}

#[derive(Debug)]
pub struct Path {
    pub id: NodeId,
    pub span: Span,
    pub segments: Vec<Identifier>,
}

impl Path {
    pub fn last(&self) -> &Identifier {
        self.segments
            .last()
            .expect("Path should always have at least one segment")
    }
}

#[derive(Debug)]
pub struct Identifier {
    pub id: NodeId,
    pub span: Span,
    pub symbol: InternedSymbol,
}

#[derive(Debug)]
pub struct Block {
    pub id: NodeId,
    pub span: Span,
    pub statements: Vec<Statement>,
}

#[derive(Debug)]
pub struct Statement {
    pub id: NodeId,
    pub span: Span,
    pub kind: StatementKind,
}

#[derive(Debug)]
pub enum StatementKind {
    // Local (let) binding or declaration
    Local(Box<Local>),
    // Expression without a trailing semicolon
    BareExpr(Box<Expression>),
    // Expression terminated with a semicolon
    SemiExpr(Box<Expression>),
    /// Empty statement (just a semicolon)
    Empty,
}

#[derive(Debug)]
pub struct Local {
    pub id: NodeId,
    pub span: Span,
    pub pattern: Pattern,
    pub ty: Option<Type>,
    pub initializer: Option<Box<Expression>>,
}

#[derive(Debug)]
pub struct Pattern {
    pub id: NodeId,
    pub span: Span,
    pub kind: PatternKind,
}

#[derive(Debug)]
pub enum PatternKind {
    Wildcard,
    Binding {
        name: Identifier,
        is_mutable: bool,
    },
    Literal(Box<Literal>),
    Variant {
        path: VariantPath,
        fields: Vec<Pattern>,
    },
}

#[derive(Debug)]
pub enum VariantPath {
    /// `Option::Some`
    Path(Path),
    /// `:Some`, resolved against the type of the matched value
    Shorthand(Identifier),
}

#[derive(Debug)]
pub struct Expression {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExpressionKind,
}

#[derive(Debug)]
pub enum ExpressionKind {
    Literal(Box<Literal>),
    Path(Box<Path>),
    /// `:Variant` or `:Variant(args)`
    VariantShorthand {
        name: Identifier,
        arguments: Vec<Expression>,
    },
    Block(Box<Block>),
    Call {
        target: Box<Expression>,
        arguments: Vec<CallArgument>,
    },
    MethodCall {
        receiver: Box<Expression>,
        method: Identifier,
        arguments: Vec<CallArgument>,
    },
    Field {
        target: Box<Expression>,
        field: Identifier,
    },
    StructLiteral {
        path: Box<Path>,
        fields: Vec<FieldInitializer>,
    },
    Binary {
        lhs: Box<Expression>,
        operator: BinaryOperatorKind,
        rhs: Box<Expression>,
    },
    Unary {
        operator: UnaryOperatorKind,
        operand: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        positive: Box<Block>,
        /// must be a block expression or an if expression
        negative: Option<Box<Expression>>,
    },
    Loop(Box<Block>),
    While {
        condition: Box<Expression>,
        block: Box<Block>,
    },
    For {
        pattern: Box<Pattern>,
        iterable: Box<Expression>,
        block: Box<Block>,
    },
    /// `guard cond;` or `guard cond else { .. }`
    Guard {
        condition: Box<Expression>,
        otherwise: Option<Box<Block>>,
    },
    Match {
        scrutinee: Box<Expression>,
        arms: Vec<MatchArm>,
    },
    Assignment {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    OperatorAssignment {
        operator: AssignmentOperatorKind,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Break,
    Continue,
    // Least priority
    Return(Option<Box<Expression>>),
}

#[derive(Debug)]
pub struct CallArgument {
    pub id: NodeId,
    pub span: Span,
    pub label: Option<Identifier>,
    pub value: Expression,
}

#[derive(Debug)]
pub struct FieldInitializer {
    pub id: NodeId,
    pub span: Span,
    pub name: Identifier,
    pub value: Expression,
}

#[derive(Debug)]
pub struct MatchArm {
    pub id: NodeId,
    pub span: Span,
    pub pattern: Pattern,
    pub body: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperatorKind {
    Add,                  // +
    Subtract,             // -
    Multiply,             // *
    Divide,               // /
    Modulus,              // %
    Equals,               // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=
    LogicalAnd,           // &&
    LogicalOr,            // ||
    BitwiseAnd,           // &
    BitwiseOr,            // |
    BitwiseXor,           // ^
    ShiftLeft,            // <<
    ShiftRight,           // >>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperatorClass {
    Arithmetic,
    Bitwise,
    Comparison,
    Equality,
    Logical,
}

impl BinaryOperatorKind {
    pub fn class(self) -> BinaryOperatorClass {
        match self {
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulus => {
                BinaryOperatorClass::Arithmetic
            }
            Self::BitwiseAnd
            | Self::BitwiseOr
            | Self::BitwiseXor
            | Self::ShiftLeft
            | Self::ShiftRight => BinaryOperatorClass::Bitwise,
            Self::LessThan
            | Self::LessThanOrEqualTo
            | Self::GreaterThan
            | Self::GreaterThanOrEqualTo => BinaryOperatorClass::Comparison,
            Self::Equals | Self::NotEquals => BinaryOperatorClass::Equality,
            Self::LogicalAnd | Self::LogicalOr => BinaryOperatorClass::Logical,
        }
    }

    /// Whether the result is always `bool` regardless of operand type
    pub fn produces_bool(self) -> bool {
        matches!(
            self.class(),
            BinaryOperatorClass::Comparison
                | BinaryOperatorClass::Equality
                | BinaryOperatorClass::Logical
        )
    }
}

impl core::fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulus => "%",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqualTo => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqualTo => ">=",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::BitwiseAnd => "&",
            Self::BitwiseOr => "|",
            Self::BitwiseXor => "^",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
        };

        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperatorKind {
    LogicalNot, // !
    BitwiseNot, // ~
    Negate,     // -
}

impl core::fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LogicalNot => write!(f, "!"),
            Self::BitwiseNot => write!(f, "~"),
            Self::Negate => write!(f, "-"),
        }
    }
}

/// Operators a type may provide its own implementation of with
/// `override(op) fn ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverloadableOperator {
    Binary(BinaryOperatorKind),
    Unary(UnaryOperatorKind),
}

impl core::fmt::Display for OverloadableOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary(kind) => write!(f, "{kind}"),
            Self::Unary(kind) => write!(f, "{kind}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentOperatorKind {
    Add,        // +=
    Subtract,   // -=
    Multiply,   // *=
    Divide,     // /=
    Modulus,    // %=
    LogicalAnd, // &&=
    LogicalOr,  // ||=
    BitwiseAnd, // &=
    BitwiseOr,  // |=
    BitwiseXor, // ^=
    ShiftLeft,  // <<=
    ShiftRight, // >>=
}

impl AssignmentOperatorKind {
    /// The binary operator `a op= b` applies before assigning
    pub fn binary_operator(self) -> BinaryOperatorKind {
        match self {
            Self::Add => BinaryOperatorKind::Add,
            Self::Subtract => BinaryOperatorKind::Subtract,
            Self::Multiply => BinaryOperatorKind::Multiply,
            Self::Divide => BinaryOperatorKind::Divide,
            Self::Modulus => BinaryOperatorKind::Modulus,
            Self::LogicalAnd => BinaryOperatorKind::LogicalAnd,
            Self::LogicalOr => BinaryOperatorKind::LogicalOr,
            Self::BitwiseAnd => BinaryOperatorKind::BitwiseAnd,
            Self::BitwiseOr => BinaryOperatorKind::BitwiseOr,
            Self::BitwiseXor => BinaryOperatorKind::BitwiseXor,
            Self::ShiftLeft => BinaryOperatorKind::ShiftLeft,
            Self::ShiftRight => BinaryOperatorKind::ShiftRight,
        }
    }
}

#[derive(Debug)]
pub struct Literal {
    pub id: NodeId,
    pub span: Span,
    pub kind: LiteralKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiteralKind {
    Boolean(bool),            // true
    Char(char),               // 'A'
    Integer(u64, Option<PrimitiveKind>), // 1 or 1u32
    Float(f64, Option<FloatKind>),       // 1.0 or 1.0f32
    String(InternedSymbol),   // "hello, world"
    Unit,                     // ()
}
