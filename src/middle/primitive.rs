use strum::{Display, EnumIter, EnumString};

use crate::frontend::{
    ast::{BinaryOperatorClass, BinaryOperatorKind, UnaryOperatorKind},
    intern::InternedSymbol,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display)]
#[strum(serialize_all = "lowercase")]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display)]
#[strum(serialize_all = "lowercase")]
pub enum UIntKind {
    U8,
    U16,
    U32,
    U64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FloatKind {
    F32,
    F64,
}

/// Built in types which can be named directly in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Int(IntKind),
    UInt(UIntKind),
    Float(FloatKind),
    Bool,
    Char,
    Str,
}

impl PrimitiveKind {
    /// Maps a type name to the primitive it denotes, if any
    pub fn from_symbol(symbol: InternedSymbol) -> Option<Self> {
        let name = symbol.value();

        if let Ok(int_kind) = name.parse() {
            return Some(Self::Int(int_kind));
        }

        if let Ok(uint_kind) = name.parse() {
            return Some(Self::UInt(uint_kind));
        }

        if let Ok(float_kind) = name.parse() {
            return Some(Self::Float(float_kind));
        }

        match name {
            "bool" => Some(Self::Bool),
            "char" => Some(Self::Char),
            "str" => Some(Self::Str),
            _ => None,
        }
    }
}

impl core::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveKind::Int(int_kind) => write!(f, "{int_kind}"),
            PrimitiveKind::UInt(uint_kind) => write!(f, "{uint_kind}"),
            PrimitiveKind::Float(float_kind) => write!(f, "{float_kind}"),
            PrimitiveKind::Bool => write!(f, "bool"),
            PrimitiveKind::Char => write!(f, "char"),
            PrimitiveKind::Str => write!(f, "str"),
        }
    }
}

/// The families of operand types built in operators understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandClass {
    SignedInteger,
    UnsignedInteger,
    Float,
    Bool,
    Char,
    Str,
}

impl OperandClass {
    pub fn supports_binary_op(self, kind: BinaryOperatorKind) -> bool {
        match self {
            // All ops besides logical
            OperandClass::SignedInteger | OperandClass::UnsignedInteger => {
                kind.class() != BinaryOperatorClass::Logical
            }
            // No bitwise or logical ops
            OperandClass::Float => matches!(
                kind.class(),
                BinaryOperatorClass::Arithmetic
                    | BinaryOperatorClass::Comparison
                    | BinaryOperatorClass::Equality
            ),
            // Only comparisons
            OperandClass::Char => matches!(
                kind.class(),
                BinaryOperatorClass::Comparison | BinaryOperatorClass::Equality
            ),
            // Only simple comparison and logical ops
            OperandClass::Bool => matches!(
                kind.class(),
                BinaryOperatorClass::Logical | BinaryOperatorClass::Equality
            ),
            OperandClass::Str => kind.class() == BinaryOperatorClass::Equality,
        }
    }

    pub fn supports_unary_op(self, kind: UnaryOperatorKind) -> bool {
        match self {
            OperandClass::SignedInteger => matches!(
                kind,
                UnaryOperatorKind::BitwiseNot | UnaryOperatorKind::Negate
            ),
            OperandClass::UnsignedInteger => kind == UnaryOperatorKind::BitwiseNot,
            OperandClass::Float => kind == UnaryOperatorKind::Negate,
            OperandClass::Bool => kind == UnaryOperatorKind::LogicalNot,
            OperandClass::Char | OperandClass::Str => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn primitive_names_round_trip_through_display() {
        for name in ["i8", "i32", "u64", "f32", "bool", "char", "str"] {
            let primitive = PrimitiveKind::from_symbol(InternedSymbol::new(name)).unwrap();
            assert_eq!(primitive.to_string(), name);
        }

        assert_eq!(PrimitiveKind::from_symbol(InternedSymbol::new("Point")), None);
    }

    #[test]
    fn operand_classes_restrict_operators() {
        assert!(OperandClass::SignedInteger.supports_binary_op(BinaryOperatorKind::ShiftLeft));
        assert!(!OperandClass::SignedInteger.supports_binary_op(BinaryOperatorKind::LogicalAnd));
        assert!(!OperandClass::Float.supports_binary_op(BinaryOperatorKind::BitwiseXor));
        assert!(OperandClass::Bool.supports_binary_op(BinaryOperatorKind::LogicalOr));
        assert!(!OperandClass::Bool.supports_binary_op(BinaryOperatorKind::LessThan));
        assert!(OperandClass::Char.supports_binary_op(BinaryOperatorKind::LessThan));
        assert!(!OperandClass::UnsignedInteger.supports_unary_op(UnaryOperatorKind::Negate));
    }
}
