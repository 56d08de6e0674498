//! MIR (Mid-level Intermediate Representation). Control flow is reduced to
//! basic blocks ending in explicit terminators, expression trees are
//! flattened into instructions over virtual registers, and every name refers
//! to a resolved definition. Each checked function body and each constant
//! initializer becomes one [`Body`].

use std::collections::BTreeMap;

use crate::{
    frontend::{
        ast::{BinaryOperatorKind, UnaryOperatorKind},
        intern::InternedSymbol,
    },
    index::{Index, IndexVec, simple_index},
    middle::{
        def::DefId,
        primitive::{FloatKind, PrimitiveKind},
        ty::Type,
    },
};

pub mod hir_lowering;
pub mod pretty_print;

#[derive(Debug, Default)]
pub struct Program {
    pub bodies: BTreeMap<DefId, Body>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Function,
    ConstInitializer,
}

#[derive(Debug)]
pub struct Body {
    pub def: DefId,
    pub kind: BodyKind,
    /// Fully qualified name of the owner, e.g. `app::geometry::area`
    pub name: String,
    pub params: Vec<RegisterId>,
    pub return_type: Type,
    pub registers: IndexVec<RegisterId, Register>,
    pub blocks: IndexVec<BlockId, BasicBlock>,
}

impl Body {
    /// Blocks control can actually reach from the entry block, in order
    pub fn reachable_blocks(&self) -> Vec<BlockId> {
        let mut seen = vec![false; self.blocks.len()];
        let mut stack = vec![BlockId::ENTRY];

        while let Some(block) = stack.pop() {
            if std::mem::replace(&mut seen[block.index()], true) {
                continue;
            }

            stack.extend(self.blocks[block].terminator.successors());
        }

        self.blocks
            .indices()
            .filter(|block| seen[block.index()])
            .collect()
    }
}

simple_index! {
    /// Identifies a basic block within its body
    pub struct BlockId;
}

impl BlockId {
    pub const ENTRY: Self = Self(0);
}

simple_index! {
    /// Identifies a virtual register which holds a value of a fixed type
    pub struct RegisterId;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    pub ty: Type,
    /// The local binding this register stores, if any
    pub local: Option<DefId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
    pub terminator: Terminator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Move {
        destination: RegisterId,
        source: Operand,
    },
    UnaryOperation {
        operator: UnaryOperatorKind,
        destination: RegisterId,
        operand: Operand,
    },
    BinaryOperation {
        operator: BinaryOperatorKind,
        destination: RegisterId,
        lhs: Operand,
        rhs: Operand,
    },
    /// Calls of functions and methods, including operator overrides and
    /// accessors. Method receivers are the first argument.
    Call {
        destination: RegisterId,
        callee: Callee,
        arguments: Vec<Operand>,
    },
    /// Builds a struct (`variant` is `None`) or an enum variant from its
    /// fields in declaration order
    Construct {
        destination: RegisterId,
        adt: DefId,
        variant: Option<usize>,
        fields: Vec<Operand>,
    },
    GetField {
        destination: RegisterId,
        source: Operand,
        index: usize,
    },
    SetField {
        object: RegisterId,
        index: usize,
        value: Operand,
    },
    /// Index of the variant an enum value holds
    Discriminant {
        destination: RegisterId,
        source: Operand,
    },
    GetVariantField {
        destination: RegisterId,
        source: Operand,
        variant: usize,
        index: usize,
    },
    /// Evaluates a constant's initializer body
    LoadConst {
        destination: RegisterId,
        def: DefId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Callee {
    Def(DefId),
    /// A function value computed at runtime
    Operand(Operand),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Terminator {
    Branch {
        condition: Operand,
        positive: BlockId,
        negative: BlockId,
    },
    Jump {
        destination: BlockId,
    },
    Return {
        value: Operand,
    },
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Branch {
                positive, negative, ..
            } => vec![*positive, *negative],
            Terminator::Jump { destination } => vec![*destination],
            Terminator::Return { .. } | Terminator::Unreachable => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    /// An integer of the given integer primitive
    Int(u64, PrimitiveKind),
    Float(f64, FloatKind),
    Bool(bool),
    Char(char),
    Str(InternedSymbol),
    Unit,
    Function(DefId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Immediate(Immediate),
    Register(RegisterId),
}

impl Operand {
    pub const UNIT: Self = Operand::Immediate(Immediate::Unit);
}
