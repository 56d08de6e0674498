use std::{hash::Hash, sync::Arc};

use colored::Colorize;
use hashbrown::HashSet;
use itertools::Itertools;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::{
    index::{Index, simple_index},
    middle::{
        def::{DefId, Definitions},
        primitive::{FloatKind, IntKind, OperandClass, PrimitiveKind, UIntKind},
    },
};

static TYPE_INTERNER: Lazy<RwLock<HashSet<Arc<TypeKind>>>> = Lazy::new(Default::default);

/// Thin pointer to an interned type kind. Equal types share one allocation,
/// so comparison and hashing only look at the pointer.
#[derive(Clone)]
pub struct Type(Arc<TypeKind>);

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        if let Some(existing) = TYPE_INTERNER.read().get(&kind) {
            return Self(existing.clone());
        }

        let mut interner = TYPE_INTERNER.write();

        // Another thread may have interned it between the two locks
        if let Some(existing) = interner.get(&kind) {
            return Self(existing.clone());
        }

        let interned = Arc::new(kind);
        interner.insert(interned.clone());
        Self(interned)
    }

    pub fn unit() -> Self {
        Self::new(TypeKind::Unit)
    }

    pub fn never() -> Self {
        Self::new(TypeKind::Never)
    }

    pub fn bool() -> Self {
        Self::new(TypeKind::Bool)
    }

    pub fn error() -> Self {
        Self::new(TypeKind::Error)
    }

    pub fn primitive(primitive: PrimitiveKind) -> Self {
        Self::new(match primitive {
            PrimitiveKind::Int(int_kind) => TypeKind::Integer(int_kind),
            PrimitiveKind::UInt(uint_kind) => TypeKind::UnsignedInteger(uint_kind),
            PrimitiveKind::Float(float_kind) => TypeKind::Float(float_kind),
            PrimitiveKind::Bool => TypeKind::Bool,
            PrimitiveKind::Char => TypeKind::Char,
            PrimitiveKind::Str => TypeKind::Str,
        })
    }

    pub fn display<'a>(&'a self, defs: &'a Definitions) -> DisplayType<'a> {
        DisplayType { ty: self, defs }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.0), state)
    }
}

impl core::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Type").field(&self.0).finish()
    }
}

impl core::ops::Deref for Type {
    type Target = TypeKind;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// !
    Never,
    /// ()
    Unit,
    Bool,
    Char,
    Str,
    /// i32, i64, etc.
    Integer(IntKind),
    /// u8, u32, etc.
    UnsignedInteger(UIntKind),
    /// f32, f64
    Float(FloatKind),
    /// A struct or enum applied to its generic arguments
    Adt(DefId, Vec<Type>),
    /// A generic parameter seen from inside the item declaring it
    Param(DefId),
    /// The type of a function value
    Function { parameters: Vec<Type>, return_type: Type },
    /// An unresolved type variable whose type must be inferred
    Infer(TypeVariable),
    /// The type which is created as a result of some illegal operation which we
    /// can't compute the type of. If you find this in your type, there is no
    /// use emitting another error since one has already been created.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeVariable {
    /// May become any type
    General(GeneralVariableId),
    /// A deferred integer
    Int(IntVariableId),
    /// A deferred float
    Float(FloatVariableId),
}

simple_index! {
    pub struct GeneralVariableId;
}

simple_index! {
    /// An integral type variable to be inferred
    pub struct IntVariableId;
}

simple_index! {
    /// A floating point type variable to be inferred
    pub struct FloatVariableId;
}

impl TypeKind {
    pub fn is_integer_like(&self) -> bool {
        matches!(
            self,
            TypeKind::Integer(_)
                | TypeKind::UnsignedInteger(_)
                | TypeKind::Infer(TypeVariable::Int(_))
        )
    }

    pub fn is_float_like(&self) -> bool {
        matches!(
            self,
            TypeKind::Float(_) | TypeKind::Infer(TypeVariable::Float(_))
        )
    }

    pub fn is_never(&self) -> bool {
        matches!(self, TypeKind::Never)
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, TypeKind::Unit)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TypeKind::Error)
    }

    /// Whether the error sentinel appears anywhere inside this type
    pub fn references_error(&self) -> bool {
        match self {
            TypeKind::Error => true,
            TypeKind::Adt(_, arguments) => arguments.iter().any(|ty| ty.references_error()),
            TypeKind::Function {
                parameters,
                return_type,
            } => {
                parameters.iter().any(|ty| ty.references_error())
                    || return_type.references_error()
            }
            _ => false,
        }
    }

    /// The built in operator family values of this type belong to
    pub fn operand_class(&self) -> Option<OperandClass> {
        match self {
            TypeKind::Integer(_) | TypeKind::Infer(TypeVariable::Int(_)) => {
                Some(OperandClass::SignedInteger)
            }
            TypeKind::UnsignedInteger(_) => Some(OperandClass::UnsignedInteger),
            TypeKind::Float(_) | TypeKind::Infer(TypeVariable::Float(_)) => {
                Some(OperandClass::Float)
            }
            TypeKind::Bool => Some(OperandClass::Bool),
            TypeKind::Char => Some(OperandClass::Char),
            TypeKind::Str => Some(OperandClass::Str),
            _ => None,
        }
    }

    /// Collects the list of free type variables in this type, traversing
    /// recursive inner types if necessary
    pub fn free_type_variables(&self) -> HashSet<TypeVariable> {
        match self {
            TypeKind::Infer(variable) => HashSet::from([*variable]),
            TypeKind::Adt(_, arguments) => arguments
                .iter()
                .flat_map(|ty| ty.free_type_variables())
                .collect(),
            TypeKind::Function {
                parameters,
                return_type,
            } => {
                let mut res = HashSet::new();

                for parameter in parameters {
                    res.extend(parameter.free_type_variables());
                }

                res.extend(return_type.free_type_variables());
                res
            }
            _ => HashSet::new(),
        }
    }
}

/// Renders a type with the names of the definitions it mentions
pub struct DisplayType<'a> {
    ty: &'a Type,
    defs: &'a Definitions,
}

impl DisplayType<'_> {
    fn nested<'b>(&'b self, ty: &'b Type) -> DisplayType<'b> {
        DisplayType { ty, defs: self.defs }
    }
}

impl core::fmt::Display for DisplayType<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &**self.ty {
            TypeKind::Never => write!(f, "!"),
            TypeKind::Unit => write!(f, "()"),
            TypeKind::Bool => write!(f, "bool"),
            TypeKind::Char => write!(f, "char"),
            TypeKind::Str => write!(f, "str"),
            TypeKind::Integer(int_kind) => write!(f, "{int_kind}"),
            TypeKind::UnsignedInteger(uint_kind) => write!(f, "{uint_kind}"),
            TypeKind::Float(float_kind) => write!(f, "{float_kind}"),
            TypeKind::Adt(def, arguments) => {
                write!(f, "{}", self.defs.name(*def))?;

                if !arguments.is_empty() {
                    write!(
                        f,
                        "<{}>",
                        arguments.iter().map(|ty| self.nested(ty)).join(", ")
                    )?;
                }

                Ok(())
            }
            TypeKind::Param(def) => write!(f, "{}", self.defs.name(*def)),
            TypeKind::Function {
                parameters,
                return_type,
            } => write!(
                f,
                "fn({}) -> {}",
                parameters.iter().map(|ty| self.nested(ty)).join(", "),
                self.nested(return_type)
            ),
            TypeKind::Infer(TypeVariable::General(id)) => write!(f, "{{unknown@{}}}", id.index()),
            TypeKind::Infer(TypeVariable::Int(id)) => write!(f, "{{integer@{}}}", id.index()),
            TypeKind::Infer(TypeVariable::Float(id)) => write!(f, "{{float@{}}}", id.index()),
            TypeKind::Error => write!(f, "{{unknown}}"),
        }
    }
}

impl DisplayType<'_> {
    pub fn colored(&self) -> colored::ColoredString {
        self.to_string().yellow()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        frontend::{intern::InternedSymbol, span::Span},
        middle::def::{DefKind, DefVisibility, Definition},
    };

    #[test]
    fn interned_types_compare_by_identity() {
        let a = Type::new(TypeKind::Integer(IntKind::I64));
        let b = Type::primitive(PrimitiveKind::Int(IntKind::I64));

        assert_eq!(a, b);
        assert_ne!(a, Type::primitive(PrimitiveKind::Int(IntKind::I32)));
    }

    #[test]
    fn display_uses_definition_names() {
        let mut defs = Definitions::default();
        let option = defs.create(
            None,
            Definition {
                kind: DefKind::Enum,
                name: InternedSymbol::new("Option"),
                parent: None,
                span: Span::DUMMY,
                visibility: DefVisibility::Public,
            },
        );

        let ty = Type::new(TypeKind::Function {
            parameters: vec![Type::new(TypeKind::Adt(
                option,
                vec![Type::primitive(PrimitiveKind::Bool)],
            ))],
            return_type: Type::unit(),
        });

        assert_eq!(ty.display(&defs).to_string(), "fn(Option<bool>) -> ()");
    }

    #[test]
    fn error_is_found_inside_arguments() {
        let ty = Type::new(TypeKind::Adt(DefId::new(0), vec![Type::error()]));

        assert!(ty.references_error());
        assert!(!Type::unit().references_error());
    }
}
