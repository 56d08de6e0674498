//! Type inference for a single body.
//!
//! Types are inferred by unification against a substitution map. Integer
//! and float literals start out as deferred variables which only unify with
//! integer (or float) types, and fall back to the session's default widths
//! once the body has been fully walked. Member lookups whose receiver type is
//! not known yet are recorded as obligations and retried at the end of the
//! body until no more progress can be made.

use hashbrown::{HashMap, HashSet};

use crate::{
    diagnostics::{Diagnostic, diagnostic},
    frontend::{
        ast::{BinaryOperatorClass, BinaryOperatorKind, LiteralKind, OverloadableOperator,
            UnaryOperatorKind},
        intern::InternedSymbol,
        span::Span,
    },
    index::Index,
    middle::{
        def::{DefId, DefKind},
        hir::{
            self, Block, Expr, ExprKind, Ident, ItemKind, ItemLocalId, ParamKind, Pattern,
            PatternKind, StatementKind, VariantRef,
        },
        resolve::Res,
        ty::{FloatVariableId, GeneralVariableId, IntVariableId, Type, TypeKind, TypeVariable},
    },
};

use super::TypeContext;

/// The outcome of checking one body
#[derive(Debug, Clone)]
pub struct TypeckResults {
    pub owner: DefId,
    pub node_types: HashMap<ItemLocalId, Type>,
    pub local_types: HashMap<DefId, Type>,
    /// Member lookups resolved while checking, keyed by the node they belong to
    pub resolutions: HashMap<ItemLocalId, ExprResolution>,
    pub return_type: Type,
    /// Set when the body contains errors, in which case it is not lowered any
    /// further
    pub tainted: bool,
}

impl TypeckResults {
    pub fn node_type(&self, id: ItemLocalId) -> Option<&Type> {
        self.node_types.get(&id)
    }

    pub fn resolution(&self, id: ItemLocalId) -> Option<ExprResolution> {
        self.resolutions.get(&id).copied()
    }
}

/// What a node turned out to refer to once types were known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprResolution {
    /// A method call, with the receiver passed as the first argument
    Method(DefId),
    /// `Type::name` naming an associated function
    Associated(DefId),
    /// A variant named through `:Variant` or `Enum::Variant`
    Variant(DefId),
    /// Index of the accessed struct field
    Field(usize),
    /// Field access served by a getter
    Getter(DefId),
    /// Field assignment served by a setter, recorded on the assignment
    Setter(DefId),
    /// An operator implemented by an `override(op)` method
    Overload(DefId),
}

#[derive(Debug, Default)]
struct SubstitutionMap {
    general_map: HashMap<GeneralVariableId, Type>,
    int_map: HashMap<IntVariableId, Type>,
    float_map: HashMap<FloatVariableId, Type>,
}

impl SubstitutionMap {
    fn get(&self, variable: TypeVariable) -> Option<&Type> {
        match variable {
            TypeVariable::General(id) => self.general_map.get(&id),
            TypeVariable::Int(id) => self.int_map.get(&id),
            TypeVariable::Float(id) => self.float_map.get(&id),
        }
    }

    fn insert(&mut self, variable: TypeVariable, ty: Type) {
        match variable {
            TypeVariable::General(id) => {
                self.general_map.insert(id, ty);
            }
            TypeVariable::Int(id) => {
                self.int_map.insert(id, ty);
            }
            TypeVariable::Float(id) => {
                self.float_map.insert(id, ty);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct CheckedArg {
    label: Option<Ident>,
    ty: Type,
    span: Span,
}

/// A signature with fresh variables substituted for its generics
#[derive(Debug)]
struct InstantiatedSig {
    receiver: Option<Type>,
    params: Vec<(Option<InternedSymbol>, Type)>,
    ret: Type,
}

impl InstantiatedSig {
    fn fn_type(&self) -> Type {
        Type::new(TypeKind::Function {
            parameters: self
                .receiver
                .iter()
                .cloned()
                .chain(self.params.iter().map(|(_, ty)| ty.clone()))
                .collect(),
            return_type: self.ret.clone(),
        })
    }
}

/// A lookup postponed until the type it depends on is known
#[derive(Debug)]
enum Obligation {
    Method {
        expr: ItemLocalId,
        span: Span,
        receiver: Type,
        method: Ident,
        arguments: Vec<CheckedArg>,
        result: Type,
    },
    Field {
        expr: ItemLocalId,
        span: Span,
        target: Type,
        field: Ident,
        result: Type,
    },
    Binary {
        expr: ItemLocalId,
        span: Span,
        operator: BinaryOperatorKind,
        lhs: Type,
        rhs: Type,
        result: Type,
    },
    Unary {
        expr: ItemLocalId,
        span: Span,
        operator: UnaryOperatorKind,
        operand: Type,
        result: Type,
    },
    Shorthand {
        expr: ItemLocalId,
        span: Span,
        name: Ident,
        arguments: Vec<(Type, Span)>,
        result: Type,
    },
}

pub struct BodyTypeChecker<'a> {
    cx: TypeContext<'a>,
    body: &'a hir::Body,
    substitutions: SubstitutionMap,
    next_general: GeneralVariableId,
    next_int: IntVariableId,
    next_float: FloatVariableId,
    node_types: HashMap<ItemLocalId, Type>,
    node_spans: HashMap<ItemLocalId, Span>,
    local_types: HashMap<DefId, Type>,
    resolutions: HashMap<ItemLocalId, ExprResolution>,
    return_type: Type,
    /// One entry per enclosing loop, set once a `break` targets it
    loops: Vec<bool>,
    obligations: Vec<Obligation>,
    reported: bool,
}

impl<'a> BodyTypeChecker<'a> {
    pub fn new(cx: &TypeContext<'a>, body: &'a hir::Body) -> Self {
        Self {
            cx: *cx,
            body,
            substitutions: SubstitutionMap::default(),
            next_general: GeneralVariableId::new(0),
            next_int: IntVariableId::new(0),
            next_float: FloatVariableId::new(0),
            node_types: HashMap::new(),
            node_spans: HashMap::new(),
            local_types: HashMap::new(),
            resolutions: HashMap::new(),
            return_type: Type::error(),
            loops: Vec::new(),
            obligations: Vec::new(),
            reported: false,
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(owner = %self.cx.defs.qualified_name(self.body.owner)))]
    pub fn check(mut self) -> TypeckResults {
        let body = self.body;
        self.bind_parameters();

        let expected = self.return_type.clone();
        let value_type = self.check_expr(&body.value, Some(&expected));
        self.demand(body.value.span, &expected, &value_type);

        // A body that never finishes has no values to infer a return type from
        if matches!(
            *self.shallow_resolve(&expected),
            TypeKind::Infer(TypeVariable::General(_))
        ) && self.shallow_resolve(&value_type).is_never()
        {
            self.unify(&expected, &Type::never());
        }

        self.solve_obligations();
        self.apply_defaults();
        self.into_results()
    }

    fn bind_parameters(&mut self) {
        let cx = self.cx;
        let owner = self.body.owner;

        match cx.hir.item(owner).map(|item| &item.kind) {
            Some(ItemKind::Function(function)) => {
                let sig = self.cx.fn_signature(owner);
                let mut ordered = sig.params.iter().map(|param| param.ty.clone());

                for param in &function.params {
                    let ty = match param.kind {
                        ParamKind::SelfValue => sig.receiver.clone(),
                        ParamKind::Named(_) | ParamKind::Ordered => ordered.next(),
                    };

                    self.local_types
                        .insert(param.local, ty.unwrap_or_else(Type::error));
                }

                self.return_type = match &sig.declared_return {
                    Some(declared) => declared.clone(),
                    None => self.fresh_var(),
                };
            }
            Some(ItemKind::Const(hir::ConstDecl { ty: Some(_) })) => {
                self.return_type = self.cx.const_type(owner, self.cx.defs.span(owner));
            }
            _ => self.return_type = self.fresh_var(),
        }
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.reported = true;
        self.cx.session.report(diagnostic);
    }

    fn display(&self, ty: &Type) -> String {
        self.resolve(ty).display(self.cx.defs).to_string()
    }

    /* Type variables */

    fn fresh_var(&mut self) -> Type {
        let id = self.next_general;
        self.next_general.increment_by(1);
        Type::new(TypeKind::Infer(TypeVariable::General(id)))
    }

    fn fresh_int_var(&mut self) -> Type {
        let id = self.next_int;
        self.next_int.increment_by(1);
        Type::new(TypeKind::Infer(TypeVariable::Int(id)))
    }

    fn fresh_float_var(&mut self) -> Type {
        let id = self.next_float;
        self.next_float.increment_by(1);
        Type::new(TypeKind::Infer(TypeVariable::Float(id)))
    }

    /// Follows substitutions until the outermost type constructor is known
    fn shallow_resolve(&self, ty: &Type) -> Type {
        let mut ty = ty.clone();

        while let TypeKind::Infer(variable) = &*ty
            && let Some(substituted) = self.substitutions.get(*variable)
        {
            ty = substituted.clone();
        }

        ty
    }

    /// Recursively applies substitutions to the provided type to generate a
    /// new type with less or ideally no type variables
    fn resolve(&self, ty: &Type) -> Type {
        match &**ty {
            TypeKind::Infer(variable) => match self.substitutions.get(*variable) {
                Some(substituted) => self.resolve(substituted),
                None => ty.clone(),
            },
            TypeKind::Adt(def, arguments) => Type::new(TypeKind::Adt(
                *def,
                arguments.iter().map(|ty| self.resolve(ty)).collect(),
            )),
            TypeKind::Function {
                parameters,
                return_type,
            } => Type::new(TypeKind::Function {
                parameters: parameters.iter().map(|ty| self.resolve(ty)).collect(),
                return_type: self.resolve(return_type),
            }),
            _ => ty.clone(),
        }
    }

    fn occurs_in(&self, variable: TypeVariable, ty: &Type) -> bool {
        self.resolve(ty).free_type_variables().contains(&variable)
    }

    /// Whether `variable` may stand for `ty`
    fn accepts(variable: TypeVariable, ty: &TypeKind) -> bool {
        match variable {
            TypeVariable::General(_) => true,
            TypeVariable::Int(_) => ty.is_integer_like(),
            TypeVariable::Float(_) => ty.is_float_like(),
        }
    }

    fn bind(&mut self, variable: TypeVariable, ty: &Type) -> bool {
        if self.occurs_in(variable, ty) {
            return false;
        }

        self.substitutions.insert(variable, ty.clone());
        true
    }

    /// Attempts to equate the provided types using our type system's
    /// inference rules
    fn unify(&mut self, t1: &Type, t2: &Type) -> bool {
        let t1 = self.shallow_resolve(t1);
        let t2 = self.shallow_resolve(t2);

        if t1 == t2 {
            return true;
        }

        match (&*t1, &*t2) {
            // Errors have already been reported
            (TypeKind::Error, _) | (_, TypeKind::Error) => true,
            (TypeKind::Infer(variable), other) if Self::accepts(*variable, other) => {
                self.bind(*variable, &t2)
            }
            (other, TypeKind::Infer(variable)) if Self::accepts(*variable, other) => {
                self.bind(*variable, &t1)
            }
            (TypeKind::Adt(d1, a1), TypeKind::Adt(d2, a2)) if d1 == d2 && a1.len() == a2.len() => {
                a1.iter().zip(a2).all(|(a, b)| self.unify(a, b))
            }
            (
                TypeKind::Function {
                    parameters: p1,
                    return_type: r1,
                },
                TypeKind::Function {
                    parameters: p2,
                    return_type: r2,
                },
            ) if p1.len() == p2.len() => {
                p1.iter().zip(p2).all(|(a, b)| self.unify(a, b)) && self.unify(r1, r2)
            }
            _ => false,
        }
    }

    /// Requires `actual` to be usable where `expected` is, reporting a
    /// mismatch otherwise. Diverging values fit anywhere.
    /// Reports a mismatch unless `actual` fits `expected`. Returns whether it
    /// did.
    fn demand(&mut self, span: Span, expected: &Type, actual: &Type) -> bool {
        if self.shallow_resolve(actual).is_never() {
            return true;
        }

        if self.unify(expected, actual) {
            return true;
        }

        let message = format!(
            "expected `{}`, found `{}`",
            self.display(expected),
            self.display(actual)
        );
        self.report(diagnostic!(TypeMismatch, span, "{message}"));
        false
    }

    /// The common type of two branches
    fn join(&mut self, span: Span, first: Type, second: Type) -> Type {
        if self.shallow_resolve(&first).is_never() {
            return second;
        }

        if !self.shallow_resolve(&second).is_never() {
            self.demand(span, &first, &second);
        }

        first
    }

    fn instantiate(&mut self, generics: &[DefId]) -> HashMap<DefId, Type> {
        generics
            .iter()
            .map(|param| (*param, self.fresh_var()))
            .collect()
    }

    fn instantiate_fn(&mut self, def: DefId, span: Span) -> InstantiatedSig {
        let sig = self.cx.fn_signature(def);
        let arguments = self.instantiate(&sig.generics);
        let ret = self.cx.return_type(def, span);

        InstantiatedSig {
            receiver: sig
                .receiver
                .as_ref()
                .map(|ty| substitute(ty, &arguments)),
            params: sig
                .params
                .iter()
                .map(|param| (param.label, substitute(&param.ty, &arguments)))
                .collect(),
            ret: substitute(&ret, &arguments),
        }
    }

    /// The ADT applied to fresh variables, along with the substitution for
    /// its field types
    fn instantiate_adt(&mut self, adt: DefId) -> (Type, HashMap<DefId, Type>) {
        let generics = self.cx.generics_of(adt);
        let arguments = self.instantiate(generics);

        let ty = Type::new(TypeKind::Adt(
            adt,
            generics.iter().map(|param| arguments[param].clone()).collect(),
        ));

        (ty, arguments)
    }

    fn record(&mut self, id: ItemLocalId, span: Span, ty: Type) -> Type {
        self.node_types.insert(id, ty.clone());
        self.node_spans.insert(id, span);
        ty
    }

    /* Expressions */

    fn check_expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        let ty = self.check_expr_kind(expr, expected);
        self.record(expr.id, expr.span, ty)
    }

    fn check_expr_has_type(&mut self, expr: &Expr, expected: &Type) -> Type {
        let ty = self.check_expr(expr, Some(expected));
        self.demand(expr.span, expected, &ty);
        ty
    }

    fn literal_type(&mut self, literal: &LiteralKind) -> Type {
        match literal {
            LiteralKind::Boolean(_) => Type::bool(),
            LiteralKind::Char(_) => Type::new(TypeKind::Char),
            LiteralKind::String(_) => Type::new(TypeKind::Str),
            LiteralKind::Unit => Type::unit(),
            LiteralKind::Integer(_, Some(suffix)) => Type::primitive(*suffix),
            LiteralKind::Integer(_, None) => self.fresh_int_var(),
            LiteralKind::Float(_, Some(suffix)) => Type::new(TypeKind::Float(*suffix)),
            LiteralKind::Float(_, None) => self.fresh_float_var(),
        }
    }

    fn check_expr_kind(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        match &expr.kind {
            ExprKind::Literal(literal) => self.literal_type(literal),
            ExprKind::Path(res) => self.check_path(expr, *res),
            ExprKind::VariantShorthand { name, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| (self.check_expr(argument, None), argument.span))
                    .collect::<Vec<_>>();
                let result = match expected {
                    Some(expected) => expected.clone(),
                    None => self.fresh_var(),
                };

                match self.resolve_shorthand(expr.id, expr.span, *name, &arguments, &result) {
                    Some(ty) => ty,
                    None => {
                        self.obligations.push(Obligation::Shorthand {
                            expr: expr.id,
                            span: expr.span,
                            name: *name,
                            arguments,
                            result: result.clone(),
                        });
                        result
                    }
                }
            }
            ExprKind::Block(block) => self.check_block(block, expected),
            ExprKind::Call { target, arguments } => self.check_call(expr, target, arguments),
            ExprKind::MethodCall {
                receiver,
                method,
                arguments,
            } => {
                let receiver = self.check_expr(receiver, None);
                let arguments = self.check_unhinted_arguments(arguments);

                match self.resolve_method(expr.id, expr.span, &receiver, *method, &arguments) {
                    Some(ty) => ty,
                    None => {
                        let result = self.fresh_var();
                        self.obligations.push(Obligation::Method {
                            expr: expr.id,
                            span: expr.span,
                            receiver,
                            method: *method,
                            arguments,
                            result: result.clone(),
                        });
                        result
                    }
                }
            }
            ExprKind::Field { target, field } => {
                let target = self.check_expr(target, None);

                match self.resolve_field(expr.id, expr.span, &target, *field) {
                    Some(ty) => ty,
                    None => {
                        let result = self.fresh_var();
                        self.obligations.push(Obligation::Field {
                            expr: expr.id,
                            span: expr.span,
                            target,
                            field: *field,
                            result: result.clone(),
                        });
                        result
                    }
                }
            }
            ExprKind::StructLiteral { res, fields } => self.check_struct_literal(expr, *res, fields),
            ExprKind::Binary { operator, lhs, rhs } => {
                if operator.class() == BinaryOperatorClass::Logical {
                    self.check_expr_has_type(lhs, &Type::bool());
                    self.check_expr_has_type(rhs, &Type::bool());
                    return Type::bool();
                }

                let lhs = self.check_expr(lhs, None);
                let rhs = self.check_expr(rhs, Some(&lhs));

                match self.resolve_binary(expr.id, expr.span, *operator, &lhs, &rhs) {
                    Some(ty) => ty,
                    None => {
                        let result = self.fresh_var();
                        self.obligations.push(Obligation::Binary {
                            expr: expr.id,
                            span: expr.span,
                            operator: *operator,
                            lhs,
                            rhs,
                            result: result.clone(),
                        });
                        result
                    }
                }
            }
            ExprKind::Unary { operator, operand } => {
                let operand = self.check_expr(operand, None);

                match self.resolve_unary(expr.id, expr.span, *operator, &operand) {
                    Some(ty) => ty,
                    None => {
                        let result = self.fresh_var();
                        self.obligations.push(Obligation::Unary {
                            expr: expr.id,
                            span: expr.span,
                            operator: *operator,
                            operand,
                            result: result.clone(),
                        });
                        result
                    }
                }
            }
            ExprKind::If {
                condition,
                positive,
                negative,
            } => {
                self.check_expr_has_type(condition, &Type::bool());

                match negative {
                    None => {
                        let unit = Type::unit();
                        let positive_type = self.check_block(positive, Some(&unit));
                        self.demand(positive.span, &unit, &positive_type);
                        unit
                    }
                    Some(negative) => {
                        let positive_type = self.check_block(positive, expected);
                        let negative_type =
                            self.check_expr(negative, expected.or(Some(&positive_type)));
                        self.join(negative.span, positive_type, negative_type)
                    }
                }
            }
            ExprKind::Loop(block) => {
                let unit = Type::unit();

                self.loops.push(false);
                let block_type = self.check_block(block, Some(&unit));
                self.demand(block.span, &unit, &block_type);

                if self.loops.pop() == Some(true) {
                    unit
                } else {
                    Type::never()
                }
            }
            ExprKind::Match { scrutinee, arms } => {
                let scrutinee = self.check_expr(scrutinee, None);
                let mut result: Option<Type> = None;

                for arm in arms {
                    self.check_pattern(&arm.pattern, &scrutinee);
                    let arm_type = self.check_expr(&arm.body, expected.or(result.as_ref()));

                    result = Some(match result {
                        Some(previous) => self.join(arm.body.span, previous, arm_type),
                        None => arm_type,
                    });
                }

                result.unwrap_or_else(Type::never)
            }
            ExprKind::Assign { lhs, rhs } => {
                self.check_assignment(expr, lhs, rhs);
                Type::unit()
            }
            ExprKind::Break | ExprKind::Continue => {
                match self.loops.last_mut() {
                    Some(broken) => *broken |= matches!(expr.kind, ExprKind::Break),
                    None => {
                        let keyword = match expr.kind {
                            ExprKind::Break => "break",
                            _ => "continue",
                        };
                        self.report(diagnostic!(
                            BreakOutsideLoop,
                            expr.span,
                            "`{keyword}` outside of a loop"
                        ));
                    }
                }

                Type::never()
            }
            ExprKind::Return(value) => {
                let expected = self.return_type.clone();

                match value {
                    Some(value) => {
                        self.check_expr_has_type(value, &expected);
                    }
                    // There is no default value to return, so a bare `return`
                    // (including the one a `guard` expands to) needs a unit
                    // returning body
                    None => {
                        if !self.unify(&expected, &Type::unit()) {
                            let found = self.display(&expected);
                            self.report(diagnostic!(
                                TypeMismatch,
                                expr.span,
                                "`return` without a value in a body returning `{found}`"
                            ));
                        }
                    }
                }

                Type::never()
            }
            ExprKind::While { .. }
            | ExprKind::For { .. }
            | ExprKind::Guard { .. }
            | ExprKind::OperatorAssign { .. } => {
                unreachable!("sugar is removed before type checking")
            }
        }
    }

    fn check_path(&mut self, expr: &Expr, res: Res) -> Type {
        match res {
            Res::Local(local) => self
                .local_types
                .get(&local)
                .cloned()
                .unwrap_or_else(Type::error),
            Res::Def(DefKind::Function | DefKind::Method, def) => {
                self.instantiate_fn(def, expr.span).fn_type()
            }
            Res::Def(DefKind::Const, def) => self.cx.const_type(def, expr.span),
            Res::Def(DefKind::Variant, def) => self.variant_constructor(def),
            Res::TypeRelative { base, name } => self.check_type_relative(expr, base, name),
            Res::Err => Type::error(),
            Res::Def(kind, def) => {
                let name = self.cx.defs.name(def);
                self.report(diagnostic!(
                    TypeMismatch,
                    expr.span,
                    "expected a value, found {kind} `{name}`"
                ));
                Type::error()
            }
            Res::Primitive(primitive) => {
                self.report(diagnostic!(
                    TypeMismatch,
                    expr.span,
                    "expected a value, found builtin type `{primitive}`"
                ));
                Type::error()
            }
            Res::SelfTy(_) => {
                self.report(diagnostic!(
                    TypeMismatch,
                    expr.span,
                    "expected a value, found `Self`"
                ));
                Type::error()
            }
        }
    }

    /// The type of naming a variant as a value: the enum itself for variants
    /// without fields, a constructor function otherwise
    fn variant_constructor(&mut self, variant: DefId) -> Type {
        let adt = self.cx.adt_def(
            self.cx
                .defs
                .parent(variant)
                .expect("variants always belong to an enum"),
        );
        let (enum_type, arguments) = self.instantiate_adt(adt.def);

        let fields = adt
            .variants()
            .iter()
            .find(|v| v.def == variant)
            .map(|v| v.fields.as_slice())
            .unwrap_or_default();

        if fields.is_empty() {
            return enum_type;
        }

        Type::new(TypeKind::Function {
            parameters: fields.iter().map(|ty| substitute(ty, &arguments)).collect(),
            return_type: enum_type,
        })
    }

    /// The ADT a `Type::name` path is relative to
    fn type_relative_base(&self, base: DefId) -> Option<DefId> {
        match self.cx.defs.kind(base) {
            DefKind::Struct | DefKind::Enum => Some(base),
            DefKind::Impl => match self.cx.impl_map().self_types.get(&base).map(|ty| &**ty) {
                Some(TypeKind::Adt(adt, _)) => Some(*adt),
                _ => None,
            },
            _ => None,
        }
    }

    fn check_type_relative(&mut self, expr: &Expr, base: DefId, name: InternedSymbol) -> Type {
        if let Some(adt) = self.type_relative_base(base) {
            let definition = self.cx.adt_def(adt);

            if let Some(variant) = definition.variant_named(name) {
                let variant = variant.def;
                self.resolutions
                    .insert(expr.id, ExprResolution::Variant(variant));
                return self.variant_constructor(variant);
            }

            if let Some(function) = self.cx.members(adt).methods.get(&name).copied() {
                self.resolutions
                    .insert(expr.id, ExprResolution::Associated(function));
                return self.instantiate_fn(function, expr.span).fn_type();
            }
        }

        let base_name = self.cx.defs.name(base);
        self.report(diagnostic!(
            UnknownMember,
            expr.span,
            "no associated item named `{name}` found for `{base_name}`"
        ));
        Type::error()
    }

    fn check_unhinted_arguments(&mut self, arguments: &[hir::Argument]) -> Vec<CheckedArg> {
        arguments
            .iter()
            .map(|argument| CheckedArg {
                label: argument.label,
                ty: self.check_expr(&argument.value, None),
                span: argument.span,
            })
            .collect()
    }

    /// Labels the parameters of a directly named function expect, `None` if
    /// the callee is not known by name
    fn callee_labels(&self, target: &Expr) -> Option<Vec<Option<InternedSymbol>>> {
        let def = match &target.kind {
            ExprKind::Path(Res::Def(DefKind::Function | DefKind::Method, def)) => *def,
            ExprKind::Path(Res::TypeRelative { .. }) => match self.resolutions.get(&target.id) {
                Some(ExprResolution::Associated(def)) => *def,
                _ => return None,
            },
            _ => return None,
        };

        let sig = self.cx.fn_signature(def);

        Some(
            sig.receiver
                .iter()
                .map(|_| None)
                .chain(sig.params.iter().map(|param| param.label))
                .collect(),
        )
    }

    fn check_call(&mut self, expr: &Expr, target: &Expr, arguments: &[hir::Argument]) -> Type {
        let target_type = self.check_expr(target, None);
        let target_type = self.shallow_resolve(&target_type);

        match &*target_type {
            TypeKind::Function {
                parameters,
                return_type,
            } => {
                let labels = self.callee_labels(target).unwrap_or_default();

                let checked = arguments
                    .iter()
                    .enumerate()
                    .map(|(index, argument)| CheckedArg {
                        label: argument.label,
                        ty: self.check_expr(&argument.value, parameters.get(index)),
                        span: argument.span,
                    })
                    .collect::<Vec<_>>();

                let params = parameters
                    .iter()
                    .enumerate()
                    .map(|(index, ty)| (labels.get(index).copied().flatten(), ty.clone()))
                    .collect::<Vec<_>>();

                self.check_arguments(expr.span, &params, &checked);
                return_type.clone()
            }
            TypeKind::Infer(TypeVariable::General(_)) => {
                let checked = self.check_unhinted_arguments(arguments);
                let return_type = self.fresh_var();
                let function = Type::new(TypeKind::Function {
                    parameters: checked.iter().map(|argument| argument.ty.clone()).collect(),
                    return_type: return_type.clone(),
                });

                self.unify(&target_type, &function);
                return_type
            }
            TypeKind::Error => {
                self.check_unhinted_arguments(arguments);
                Type::error()
            }
            _ => {
                self.check_unhinted_arguments(arguments);
                let found = self.display(&target_type);
                self.report(diagnostic!(
                    TypeMismatch,
                    target.span,
                    "expected a function, found `{found}`"
                ));
                Type::error()
            }
        }
    }

    fn check_arguments(
        &mut self,
        span: Span,
        params: &[(Option<InternedSymbol>, Type)],
        arguments: &[CheckedArg],
    ) {
        if params.len() != arguments.len() {
            self.report(diagnostic!(
                ArgumentMismatch,
                span,
                "expected {} argument(s), found {}",
                params.len(),
                arguments.len()
            ));
        }

        for ((label, ty), argument) in params.iter().zip(arguments) {
            match (label, argument.label) {
                (Some(expected), Some(found)) if *expected == found.symbol => {}
                (None, None) => {}
                (Some(expected), _) => self.report(diagnostic!(
                    ArgumentMismatch,
                    argument.span,
                    "expected an argument labeled `{expected}`"
                )),
                (None, Some(found)) => self.report(diagnostic!(
                    ArgumentMismatch,
                    found.span,
                    "unexpected label `{}`, this parameter is passed positionally",
                    found.symbol
                )),
            }

            self.demand(argument.span, ty, &argument.ty);
        }
    }

    /// Resolves a method call once the receiver type is known. Returns
    /// `None` while it is still an inference variable.
    fn resolve_method(
        &mut self,
        expr: ItemLocalId,
        span: Span,
        receiver: &Type,
        method: Ident,
        arguments: &[CheckedArg],
    ) -> Option<Type> {
        let receiver = self.shallow_resolve(receiver);

        let adt = match &*receiver {
            TypeKind::Infer(TypeVariable::General(_)) => return None,
            TypeKind::Error => return Some(Type::error()),
            TypeKind::Adt(adt, _) => self
                .cx
                .members(*adt)
                .methods
                .get(&method.symbol)
                .copied(),
            _ => None,
        };

        let Some(function) = adt else {
            let found = self.display(&receiver);
            self.report(diagnostic!(
                UnknownMember,
                method.span,
                "no method named `{}` found for `{found}`",
                method.symbol
            ));
            return Some(Type::error());
        };

        let sig = self.instantiate_fn(function, span);

        let Some(expected_receiver) = &sig.receiver else {
            self.report(diagnostic!(
                UnknownMember,
                method.span,
                "`{}` is an associated function, not a method",
                method.symbol
            ));
            return Some(Type::error());
        };

        self.demand(span, expected_receiver, &receiver);
        self.check_arguments(span, &sig.params, arguments);
        self.resolutions
            .insert(expr, ExprResolution::Method(function));

        Some(sig.ret)
    }

    fn resolve_field(
        &mut self,
        expr: ItemLocalId,
        span: Span,
        target: &Type,
        field: Ident,
    ) -> Option<Type> {
        let target = self.shallow_resolve(target);

        match &*target {
            TypeKind::Infer(TypeVariable::General(_)) => return None,
            TypeKind::Error => return Some(Type::error()),
            TypeKind::Adt(adt, arguments) => {
                let definition = self.cx.adt_def(*adt);

                if let Some(index) = definition.field_index(field.symbol) {
                    let substitution = definition
                        .generics
                        .iter()
                        .copied()
                        .zip(arguments.iter().cloned())
                        .collect::<HashMap<_, _>>();

                    self.resolutions.insert(expr, ExprResolution::Field(index));
                    return Some(substitute(&definition.fields()[index].ty, &substitution));
                }

                if let Some(getter) = self.cx.members(*adt).getters.get(&field.symbol).copied() {
                    let sig = self.instantiate_fn(getter, span);

                    if let Some(receiver) = &sig.receiver {
                        self.demand(span, receiver, &target);
                    }

                    self.resolutions.insert(expr, ExprResolution::Getter(getter));
                    return Some(sig.ret);
                }
            }
            _ => {}
        }

        let found = self.display(&target);
        self.report(diagnostic!(
            UnknownMember,
            field.span,
            "no field `{}` on type `{found}`",
            field.symbol
        ));
        Some(Type::error())
    }

    fn check_struct_literal(&mut self, expr: &Expr, res: Res, fields: &[hir::FieldInit]) -> Type {
        let target = match res {
            Res::Def(DefKind::Struct, def) => Some((def, None)),
            Res::SelfTy(owner) if self.cx.defs.kind(owner) == DefKind::Impl => {
                match self.cx.impl_map().self_types.get(&owner) {
                    Some(self_type) => match &**self_type {
                        TypeKind::Adt(def, _) => Some((*def, Some(self_type.clone()))),
                        _ => None,
                    },
                    None => None,
                }
            }
            Res::Err => None,
            _ => {
                self.report(diagnostic!(
                    TypeMismatch,
                    expr.span,
                    "expected a struct name in this struct literal"
                ));
                None
            }
        };

        let definition = target
            .as_ref()
            .map(|(def, _)| self.cx.adt_def(*def))
            .filter(|definition| definition.is_struct());

        let (Some((adt, self_type)), Some(definition)) = (target, definition) else {
            for field in fields {
                self.check_expr(&field.value, None);
            }
            return Type::error();
        };

        let (ty, arguments) = self.instantiate_adt(adt);

        if let Some(self_type) = self_type {
            self.unify(&ty, &self_type);
        }

        let mut initialized = HashSet::new();

        for field in fields {
            match definition.field_index(field.name.symbol) {
                Some(index) => {
                    if !initialized.insert(index) {
                        self.report(diagnostic!(
                            DuplicateDefinition,
                            field.name.span,
                            "field `{}` specified more than once",
                            field.name.symbol
                        ));
                    }

                    let field_type = substitute(&definition.fields()[index].ty, &arguments);
                    self.check_expr_has_type(&field.value, &field_type);
                }
                None => {
                    self.report(diagnostic!(
                        UnknownMember,
                        field.name.span,
                        "struct `{}` has no field named `{}`",
                        self.cx.defs.name(adt),
                        field.name.symbol
                    ));
                    self.check_expr(&field.value, None);
                }
            }
        }

        let missing = definition
            .fields()
            .iter()
            .enumerate()
            .filter(|(index, _)| !initialized.contains(index))
            .map(|(_, field)| format!("`{}`", field.name))
            .collect::<Vec<_>>();

        if !missing.is_empty() {
            self.report(diagnostic!(
                MissingField,
                expr.span,
                "missing field(s) {} in initializer of `{}`",
                missing.join(", "),
                self.cx.defs.name(adt)
            ));
        }

        ty
    }

    fn apply_override(
        &mut self,
        expr: ItemLocalId,
        span: Span,
        adt: DefId,
        operator: OverloadableOperator,
        operand: &Type,
        rhs: Option<&Type>,
    ) -> Type {
        let Some(function) = self.cx.operator_override(adt, operator) else {
            let found = self.display(operand);
            self.report(diagnostic!(
                NoMatchingOperator,
                span,
                "no implementation of `{operator}` for `{found}`"
            ));
            return Type::error();
        };

        let sig = self.instantiate_fn(function, span);

        if let Some(receiver) = &sig.receiver {
            self.demand(span, receiver, operand);
        }

        if sig.params.len() != usize::from(rhs.is_some()) {
            self.report(diagnostic!(
                ArgumentMismatch,
                span,
                "the override of `{operator}` takes {} operand(s)",
                sig.params.len()
            ));
            return Type::error();
        }

        if let (Some(rhs), Some((_, param))) = (rhs, sig.params.first()) {
            self.demand(span, param, rhs);
        }

        self.resolutions
            .insert(expr, ExprResolution::Overload(function));
        sig.ret
    }

    fn resolve_binary(
        &mut self,
        expr: ItemLocalId,
        span: Span,
        operator: BinaryOperatorKind,
        lhs: &Type,
        rhs: &Type,
    ) -> Option<Type> {
        let lhs = self.shallow_resolve(lhs);
        let rhs = self.shallow_resolve(rhs);

        if lhs.is_error() || rhs.is_error() {
            return Some(Type::error());
        }

        if let TypeKind::Adt(adt, _) = &*lhs {
            let adt = *adt;
            return Some(self.apply_override(
                expr,
                span,
                adt,
                OverloadableOperator::Binary(operator),
                &lhs,
                Some(&rhs),
            ));
        }

        if matches!(&*lhs, TypeKind::Infer(TypeVariable::General(_))) {
            // Only a builtin right hand side tells us what the left is
            if matches!(
                &*rhs,
                TypeKind::Infer(TypeVariable::General(_)) | TypeKind::Adt(..)
            ) {
                return None;
            }

            self.unify(&lhs, &rhs);
        }

        if !self.demand(span, &lhs, &rhs) {
            return Some(Type::error());
        }

        let lhs = self.shallow_resolve(&lhs);
        let supported = lhs
            .operand_class()
            .is_some_and(|class| class.supports_binary_op(operator));

        if !supported {
            let found = self.display(&lhs);
            self.report(diagnostic!(
                NoMatchingOperator,
                span,
                "no implementation of `{operator}` for `{found}`"
            ));
            return Some(Type::error());
        }

        Some(if operator.produces_bool() {
            Type::bool()
        } else {
            lhs
        })
    }

    fn resolve_unary(
        &mut self,
        expr: ItemLocalId,
        span: Span,
        operator: UnaryOperatorKind,
        operand: &Type,
    ) -> Option<Type> {
        let operand = self.shallow_resolve(operand);

        match &*operand {
            TypeKind::Infer(TypeVariable::General(_)) => None,
            TypeKind::Error => Some(Type::error()),
            TypeKind::Adt(adt, _) => {
                let adt = *adt;
                Some(self.apply_override(
                    expr,
                    span,
                    adt,
                    OverloadableOperator::Unary(operator),
                    &operand,
                    None,
                ))
            }
            kind if kind
                .operand_class()
                .is_some_and(|class| class.supports_unary_op(operator)) =>
            {
                Some(operand.clone())
            }
            _ => {
                let found = self.display(&operand);
                self.report(diagnostic!(
                    NoMatchingOperator,
                    span,
                    "cannot apply unary operator `{operator}` to `{found}`"
                ));
                Some(Type::error())
            }
        }
    }

    /// Resolves `:Variant(args)` against the type the context expects
    fn resolve_shorthand(
        &mut self,
        expr: ItemLocalId,
        span: Span,
        name: Ident,
        arguments: &[(Type, Span)],
        expected: &Type,
    ) -> Option<Type> {
        let ty = self.shallow_resolve(expected);

        match &*ty {
            TypeKind::Infer(TypeVariable::General(_)) => None,
            TypeKind::Error => Some(Type::error()),
            TypeKind::Adt(adt, type_arguments) if self.cx.defs.kind(*adt) == DefKind::Enum => {
                let definition = self.cx.adt_def(*adt);

                let Some(variant) = definition.variant_named(name.symbol) else {
                    self.report(diagnostic!(
                        UnknownMember,
                        name.span,
                        "no variant named `{}` in enum `{}`",
                        name.symbol,
                        self.cx.defs.name(*adt)
                    ));
                    return Some(Type::error());
                };

                let substitution = definition
                    .generics
                    .iter()
                    .copied()
                    .zip(type_arguments.iter().cloned())
                    .collect::<HashMap<_, _>>();
                let fields = variant
                    .fields
                    .iter()
                    .map(|field| substitute(field, &substitution))
                    .collect::<Vec<_>>();

                if fields.len() != arguments.len() {
                    self.report(diagnostic!(
                        ArgumentMismatch,
                        span,
                        "variant `{}` has {} field(s) but {} were supplied",
                        name.symbol,
                        fields.len(),
                        arguments.len()
                    ));
                }

                for (field, (argument, argument_span)) in fields.iter().zip(arguments) {
                    self.demand(*argument_span, field, argument);
                }

                self.resolutions
                    .insert(expr, ExprResolution::Variant(variant.def));
                Some(ty.clone())
            }
            _ => {
                let found = self.display(&ty);
                self.report(diagnostic!(
                    TypeMismatch,
                    span,
                    "expected `{found}`, found enum variant `:{}`",
                    name.symbol
                ));
                Some(Type::error())
            }
        }
    }

    fn check_assignment(&mut self, expr: &Expr, lhs: &Expr, rhs: &Expr) {
        match &lhs.kind {
            ExprKind::Path(Res::Local(_) | Res::Err) => {
                let target = self.check_expr(lhs, None);
                self.check_expr_has_type(rhs, &target);
            }
            ExprKind::Field { target, field } => {
                let target_type = self.check_expr(target, None);
                let target_type = self.shallow_resolve(&target_type);

                let field_type = self.assignable_field(expr, lhs, &target_type, *field, target.span);
                self.record(lhs.id, lhs.span, field_type.clone());
                self.check_expr_has_type(rhs, &field_type);
            }
            _ => {
                self.check_expr(lhs, None);
                self.report(diagnostic!(
                    TypeMismatch,
                    lhs.span,
                    "invalid left-hand side of assignment"
                ));
                self.check_expr(rhs, None);
            }
        }
    }

    /// The type a field or setter accepts when assigned through
    fn assignable_field(
        &mut self,
        assignment: &Expr,
        lhs: &Expr,
        target: &Type,
        field: Ident,
        target_span: Span,
    ) -> Type {
        let adt = match &**target {
            TypeKind::Error => return Type::error(),
            TypeKind::Infer(TypeVariable::General(_)) => {
                self.report(diagnostic!(
                    CannotInfer,
                    target_span,
                    "the type of this value must be known before assigning to `{}`",
                    field.symbol
                ));
                return Type::error();
            }
            TypeKind::Adt(adt, arguments) => Some((*adt, arguments)),
            _ => None,
        };

        if let Some((adt, arguments)) = adt {
            let definition = self.cx.adt_def(adt);

            if let Some(index) = definition.field_index(field.symbol) {
                let substitution = definition
                    .generics
                    .iter()
                    .copied()
                    .zip(arguments.iter().cloned())
                    .collect::<HashMap<_, _>>();

                self.resolutions.insert(lhs.id, ExprResolution::Field(index));
                return substitute(&definition.fields()[index].ty, &substitution);
            }

            if let Some(setter) = self.cx.members(adt).setters.get(&field.symbol).copied() {
                let sig = self.instantiate_fn(setter, assignment.span);

                if let Some(receiver) = &sig.receiver {
                    self.demand(assignment.span, receiver, target);
                }

                self.resolutions
                    .insert(assignment.id, ExprResolution::Setter(setter));

                return sig
                    .params
                    .first()
                    .map(|(_, ty)| ty.clone())
                    .unwrap_or_else(Type::error);
            }
        }

        let found = self.display(target);
        self.report(diagnostic!(
            UnknownMember,
            field.span,
            "no field or setter `{}` on type `{found}`",
            field.symbol
        ));
        Type::error()
    }

    /* Blocks and patterns */

    fn check_block(&mut self, block: &Block, expected: Option<&Type>) -> Type {
        let mut diverges = false;

        for statement in &block.statements {
            let ty = match &statement.kind {
                StatementKind::Let {
                    pattern,
                    ty,
                    initializer,
                } => {
                    let declared = ty.as_ref().map(|ty| {
                        let cx = self.cx;
                        cx.lower_ty(ty, Some(&mut || self.fresh_var()))
                    });

                    let (binding_type, initializer_type) = match (declared, initializer) {
                        (Some(declared), Some(initializer)) => {
                            let ty = self.check_expr_has_type(initializer, &declared);
                            (declared, Some(ty))
                        }
                        (Some(declared), None) => (declared, None),
                        (None, Some(initializer)) => {
                            let ty = self.check_expr(initializer, None);
                            (ty.clone(), Some(ty))
                        }
                        (None, None) => (self.fresh_var(), None),
                    };

                    self.check_pattern(pattern, &binding_type);
                    initializer_type
                }
                StatementKind::Expr(expr) => Some(self.check_expr(expr, None)),
            };

            if let Some(ty) = ty {
                diverges |= self.shallow_resolve(&ty).is_never();
            }
        }

        let ty = match &block.tail {
            Some(tail) => self.check_expr(tail, expected),
            None if diverges => Type::never(),
            None => Type::unit(),
        };

        self.record(block.id, block.span, ty)
    }

    fn check_pattern(&mut self, pattern: &Pattern, expected: &Type) {
        match &pattern.kind {
            PatternKind::Wildcard => {}
            PatternKind::Binding { local, .. } => {
                self.local_types.insert(*local, expected.clone());
            }
            PatternKind::Literal(literal) => {
                let ty = self.literal_type(literal);
                self.demand(pattern.span, expected, &ty);
            }
            PatternKind::Variant { path, fields } => {
                self.check_variant_pattern(pattern, path, fields, expected)
            }
        }

        self.record(pattern.id, pattern.span, expected.clone());
    }

    fn check_variant_pattern(
        &mut self,
        pattern: &Pattern,
        path: &VariantRef,
        fields: &[Pattern],
        expected: &Type,
    ) {
        let variant = match path {
            VariantRef::Res(Res::Def(DefKind::Variant, variant)) => Some(*variant),
            VariantRef::Res(Res::Err) => None,
            VariantRef::Res(_) => {
                self.report(diagnostic!(
                    TypeMismatch,
                    pattern.span,
                    "expected an enum variant in this pattern"
                ));
                None
            }
            VariantRef::Shorthand(name) => {
                let ty = self.shallow_resolve(expected);

                match &*ty {
                    TypeKind::Adt(adt, _) if self.cx.defs.kind(*adt) == DefKind::Enum => {
                        let variant = self
                            .cx
                            .adt_def(*adt)
                            .variant_named(name.symbol)
                            .map(|variant| variant.def);

                        if variant.is_none() {
                            self.report(diagnostic!(
                                UnknownMember,
                                name.span,
                                "no variant named `{}` in enum `{}`",
                                name.symbol,
                                self.cx.defs.name(*adt)
                            ));
                        }

                        variant
                    }
                    TypeKind::Error => None,
                    // Bind the fields to fresh variables now and pick the
                    // variant once the matched type is known
                    TypeKind::Infer(TypeVariable::General(_)) => {
                        let arguments = fields
                            .iter()
                            .map(|field| {
                                let ty = self.fresh_var();
                                self.check_pattern(field, &ty);
                                (ty, field.span)
                            })
                            .collect::<Vec<_>>();

                        self.obligations.push(Obligation::Shorthand {
                            expr: pattern.id,
                            span: pattern.span,
                            name: *name,
                            arguments,
                            result: expected.clone(),
                        });
                        return;
                    }
                    _ => {
                        let found = self.display(&ty);
                        self.report(diagnostic!(
                            TypeMismatch,
                            pattern.span,
                            "expected `{found}`, found enum variant `:{}`",
                            name.symbol
                        ));
                        None
                    }
                }
            }
        };

        let Some(variant) = variant else {
            for field in fields {
                self.check_pattern(field, &Type::error());
            }
            return;
        };

        let adt = self.cx.adt_def(
            self.cx
                .defs
                .parent(variant)
                .expect("variants always belong to an enum"),
        );
        let (enum_type, arguments) = self.instantiate_adt(adt.def);
        self.demand(pattern.span, expected, &enum_type);

        let field_types = adt
            .variants()
            .iter()
            .find(|v| v.def == variant)
            .map(|v| {
                v.fields
                    .iter()
                    .map(|ty| substitute(ty, &arguments))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if field_types.len() != fields.len() {
            self.report(diagnostic!(
                ArgumentMismatch,
                pattern.span,
                "this pattern has {} field(s), but the variant `{}` has {}",
                fields.len(),
                self.cx.defs.name(variant),
                field_types.len()
            ));
        }

        for (index, field) in fields.iter().enumerate() {
            let ty = field_types.get(index).cloned().unwrap_or_else(Type::error);
            self.check_pattern(field, &ty);
        }

        self.resolutions
            .insert(pattern.id, ExprResolution::Variant(variant));
    }

    /* Finishing */

    /// Retries postponed lookups until none of them makes progress
    fn solve_obligations(&mut self) {
        loop {
            let pending = std::mem::take(&mut self.obligations);
            let before = pending.len();

            for obligation in pending {
                if !self.discharge(&obligation) {
                    self.obligations.push(obligation);
                }
            }

            if self.obligations.is_empty() || self.obligations.len() == before {
                break;
            }
        }

        for obligation in std::mem::take(&mut self.obligations) {
            let (span, result) = match &obligation {
                Obligation::Shorthand {
                    span, name, result, ..
                } => {
                    self.report(diagnostic!(
                        CyclicDependency,
                        *span,
                        "cannot determine which enum `:{}` belongs to",
                        name.symbol
                    ));
                    (*span, result)
                }
                Obligation::Method { span, result, .. }
                | Obligation::Field { span, result, .. }
                | Obligation::Binary { span, result, .. }
                | Obligation::Unary { span, result, .. } => {
                    self.report(diagnostic!(
                        CannotInfer,
                        *span,
                        "type annotations needed to resolve this expression"
                    ));
                    (*span, result)
                }
            };

            tracing::trace!(%span, "giving up on obligation");

            if let TypeKind::Infer(variable) = &*self.shallow_resolve(result) {
                self.substitutions.insert(*variable, Type::error());
            }
        }
    }

    fn discharge(&mut self, obligation: &Obligation) -> bool {
        let (span, result, resolved) = match obligation {
            Obligation::Method {
                expr,
                span,
                receiver,
                method,
                arguments,
                result,
            } => (
                *span,
                result,
                self.resolve_method(*expr, *span, receiver, *method, arguments),
            ),
            Obligation::Field {
                expr,
                span,
                target,
                field,
                result,
            } => (
                *span,
                result,
                self.resolve_field(*expr, *span, target, *field),
            ),
            Obligation::Binary {
                expr,
                span,
                operator,
                lhs,
                rhs,
                result,
            } => (
                *span,
                result,
                self.resolve_binary(*expr, *span, *operator, lhs, rhs),
            ),
            Obligation::Unary {
                expr,
                span,
                operator,
                operand,
                result,
            } => (
                *span,
                result,
                self.resolve_unary(*expr, *span, *operator, operand),
            ),
            Obligation::Shorthand {
                expr,
                span,
                name,
                arguments,
                result,
            } => (
                *span,
                result,
                self.resolve_shorthand(*expr, *span, *name, arguments, result),
            ),
        };

        match resolved {
            Some(ty) => {
                self.demand(span, result, &ty);
                true
            }
            None => false,
        }
    }

    fn all_types(&self) -> Vec<Type> {
        self.node_types
            .values()
            .chain(self.local_types.values())
            .chain(std::iter::once(&self.return_type))
            .cloned()
            .collect()
    }

    /// Gives deferred literals their default types and reports the first
    /// node whose type could not be inferred at all
    fn apply_defaults(&mut self) {
        let options = &self.cx.session.options;
        let default_integer = Type::new(TypeKind::Integer(options.default_integer));
        let default_float = Type::new(TypeKind::Float(options.default_float));

        for ty in self.all_types() {
            for variable in self.resolve(&ty).free_type_variables() {
                match variable {
                    TypeVariable::Int(_) => {
                        tracing::trace!(?variable, "defaulting integer");
                        self.substitutions.insert(variable, default_integer.clone());
                    }
                    TypeVariable::Float(_) => {
                        self.substitutions.insert(variable, default_float.clone());
                    }
                    TypeVariable::General(_) => {}
                }
            }
        }

        let mut ids = self.node_types.keys().copied().collect::<Vec<_>>();
        ids.sort();

        let unresolved = ids.into_iter().find(|id| {
            !self
                .resolve(&self.node_types[id])
                .free_type_variables()
                .is_empty()
        });

        if let Some(id) = unresolved {
            self.report(diagnostic!(
                CannotInfer,
                self.node_spans[&id],
                "type annotations needed"
            ));
        }

        for ty in self.all_types() {
            for variable in self.resolve(&ty).free_type_variables() {
                self.substitutions.insert(variable, Type::error());
            }
        }
    }

    fn into_results(self) -> TypeckResults {
        let node_types = self
            .node_types
            .iter()
            .map(|(id, ty)| (*id, self.resolve(ty)))
            .collect::<HashMap<_, _>>();
        let local_types = self
            .local_types
            .iter()
            .map(|(local, ty)| (*local, self.resolve(ty)))
            .collect::<HashMap<_, _>>();
        let return_type = self.resolve(&self.return_type);

        let tainted = self.reported
            || return_type.references_error()
            || node_types.values().any(|ty| ty.references_error())
            || local_types.values().any(|ty| ty.references_error());

        tracing::debug!(
            owner = %self.cx.defs.qualified_name(self.body.owner),
            nodes = node_types.len(),
            tainted,
            "checked body"
        );

        TypeckResults {
            owner: self.body.owner,
            node_types,
            local_types,
            resolutions: self.resolutions,
            return_type,
            tainted,
        }
    }
}

/// Replaces generic parameters with the types they are instantiated with
fn substitute(ty: &Type, arguments: &HashMap<DefId, Type>) -> Type {
    match &**ty {
        TypeKind::Param(param) => arguments.get(param).cloned().unwrap_or_else(|| ty.clone()),
        TypeKind::Adt(def, type_arguments) => Type::new(TypeKind::Adt(
            *def,
            type_arguments
                .iter()
                .map(|ty| substitute(ty, arguments))
                .collect(),
        )),
        TypeKind::Function {
            parameters,
            return_type,
        } => Type::new(TypeKind::Function {
            parameters: parameters.iter().map(|ty| substitute(ty, arguments)).collect(),
            return_type: substitute(return_type, arguments),
        }),
        _ => ty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        diagnostics::DiagnosticKind,
        frontend::ast::{Package, build::AstBuilder},
        middle::{
            primitive::{FloatKind, IntKind, PrimitiveKind},
            testing::Lowered,
            type_check::{TypeContext, check_package},
        },
    };

    struct Checked {
        lowered: Lowered,
    }

    impl Checked {
        fn new(package: &Package) -> Self {
            Self {
                lowered: Lowered::simplified(package),
            }
        }

        fn cx(&self) -> TypeContext<'_> {
            TypeContext {
                session: &self.lowered.session,
                defs: &self.lowered.defs,
                hir: &self.lowered.hir,
                queries: &self.lowered.queries,
            }
        }

        fn results(&self, path: &str) -> Arc<TypeckResults> {
            self.cx()
                .typeck_body(self.lowered.def(path))
                .expect("no cycle through the checked body")
        }

        fn local_type(&self, owner: &str, local: &str) -> String {
            let results = self.results(owner);
            let (_, ty) = results
                .local_types
                .iter()
                .find(|(def, _)| self.lowered.defs.name(**def).value() == local)
                .unwrap_or_else(|| panic!("no local named `{local}`"));

            ty.display(&self.lowered.defs).to_string()
        }

        /// Checks every body that was not demanded yet, then drains the
        /// diagnostics
        fn diagnostic_kinds(self) -> Vec<DiagnosticKind> {
            check_package(&self.cx()).expect("a single job needs no pool");
            self.lowered.diagnostic_kinds()
        }
    }

    #[test]
    fn unconstrained_integers_default_to_i32() {
        let b = AstBuilder::new();
        let function = b.function("f").body(vec![
            b.let_("x", b.int(1)),
            b.let_("y", b.float(1.5)),
        ]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert_eq!(checked.local_type("f", "x"), "i32");
        assert_eq!(checked.local_type("f", "y"), "f64");
        assert!(!checked.results("f").tainted);
    }

    #[test]
    fn deferred_integer_takes_the_width_it_meets() {
        let b = AstBuilder::new();
        let function = b.function("f").body(vec![
            b.let_("a", b.int(1)),
            b.let_typed(
                "b",
                b.ty("i64"),
                Some(b.binary(b.var("a"), BinaryOperatorKind::Add, b.int(2))),
            ),
        ]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert_eq!(checked.local_type("f", "a"), "i64");
        assert_eq!(checked.diagnostic_kinds(), vec![]);
    }

    #[test]
    fn suffixed_literals_are_concrete() {
        let b = AstBuilder::new();
        let function = b.function("f").body(vec![b.let_(
            "a",
            b.int_suffixed(3, PrimitiveKind::UInt(crate::middle::primitive::UIntKind::U8)),
        )]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert_eq!(checked.local_type("f", "a"), "u8");
    }

    #[test]
    fn mismatch_taints_the_body() {
        let b = AstBuilder::new();
        let function = b
            .function("f")
            .body(vec![b.let_typed("x", b.ty("bool"), Some(b.int(1)))]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert!(checked.results("f").tainted);
        assert_eq!(checked.diagnostic_kinds(), vec![DiagnosticKind::TypeMismatch]);
    }

    #[test]
    fn return_type_is_inferred_from_the_body() {
        let b = AstBuilder::new();
        let five = b.function("five").body(vec![b.bare(b.int(5))]);
        let caller = b
            .function("caller")
            .body(vec![b.let_("v", b.call(b.var("five"), vec![]))]);
        let checked = Checked::new(&b.package(Some("app"), vec![five, caller]));

        assert_eq!(checked.local_type("caller", "v"), "i32");
        assert_eq!(
            checked.results("five").return_type,
            Type::new(TypeKind::Integer(IntKind::I32))
        );
    }

    #[test]
    fn recursion_through_an_inferred_return_type_is_a_cycle() {
        let b = AstBuilder::new();
        let function = b
            .function("spin")
            .body(vec![b.bare(b.call(b.var("spin"), vec![]))]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert!(checked.results("spin").tainted);
        assert_eq!(
            checked.diagnostic_kinds(),
            vec![DiagnosticKind::CyclicDependency]
        );
    }

    #[test]
    fn operator_override_is_preferred_for_adts() {
        let b = AstBuilder::new();
        let vector = b.structure("V", &[], vec![("x", b.ty("i32"))]);
        let methods = b.impl_block(
            &[],
            b.ty("V"),
            vec![b
                .function("add")
                .override_operator(OverloadableOperator::Binary(BinaryOperatorKind::Add))
                .self_param()
                .ordered_param("other", b.ty("V"))
                .returns(b.ty("V"))
                .body(vec![b.bare(b.var("other"))])],
        );
        let function = b.function("f").param("a", b.ty("V")).body(vec![b.let_(
            "sum",
            b.binary(b.var("a"), BinaryOperatorKind::Add, b.var("a")),
        )]);
        let checked = Checked::new(&b.package(Some("app"), vec![vector, methods, function]));

        let results = checked.results("f");
        let add = checked.lowered.def("add");

        assert!(
            results
                .resolutions
                .values()
                .any(|resolution| *resolution == ExprResolution::Overload(add))
        );
        assert_eq!(checked.local_type("f", "sum"), "V");
        assert_eq!(checked.diagnostic_kinds(), vec![]);
    }

    #[test]
    fn missing_operator_is_reported() {
        let b = AstBuilder::new();
        let function = b.function("f").body(vec![b.let_(
            "x",
            b.binary(b.boolean(true), BinaryOperatorKind::Add, b.boolean(false)),
        )]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert_eq!(
            checked.diagnostic_kinds(),
            vec![DiagnosticKind::NoMatchingOperator]
        );
    }

    #[test]
    fn mismatched_operands_report_once() {
        let b = AstBuilder::new();
        let function = b.function("f").body(vec![b.let_(
            "x",
            b.binary(b.boolean(true), BinaryOperatorKind::Add, b.int(1)),
        )]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert!(checked.results("f").tainted);
        assert_eq!(checked.local_type("f", "x"), "{unknown}");
        assert_eq!(checked.diagnostic_kinds(), vec![DiagnosticKind::TypeMismatch]);
    }

    #[test]
    fn bare_guard_needs_a_unit_return() {
        let b = AstBuilder::new();
        let function = b
            .function("f")
            .ordered_param("a", b.ty("i32"))
            .returns(b.ty("i32"))
            .body(vec![
                b.semi(b.guard(b.binary(b.var("a"), BinaryOperatorKind::GreaterThan, b.int(0)))),
                b.bare(b.var("a")),
            ]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert!(checked.results("f").tainted);
        assert_eq!(checked.diagnostic_kinds(), vec![DiagnosticKind::TypeMismatch]);
    }

    #[test]
    fn member_access_waits_for_the_receiver_type() {
        let b = AstBuilder::new();
        let point = b.structure("Point", &[], vec![("x", b.ty("i64"))]);
        let function = b.function("f").body(vec![
            b.let_pattern(b.pat_bind_mut("p"), None, None),
            b.let_("x", b.field(b.var("p"), "x")),
            b.semi(b.assign(
                b.var("p"),
                b.struct_literal("Point", vec![("x", b.int(3))]),
            )),
        ]);
        let checked = Checked::new(&b.package(Some("app"), vec![point, function]));

        assert_eq!(checked.local_type("f", "x"), "i64");
        assert_eq!(checked.diagnostic_kinds(), vec![]);
    }

    #[test]
    fn shorthand_variant_uses_the_expected_type() {
        let b = AstBuilder::new();
        let function = b.function("f").body(vec![b.let_typed(
            "o",
            b.generic_ty("Option", vec![b.ty("i64")]),
            Some(b.variant("Some", vec![b.int(1)])),
        )]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        let some = checked.lowered.hir.lang_items.some;
        assert!(
            checked
                .results("f")
                .resolutions
                .values()
                .any(|resolution| *resolution == ExprResolution::Variant(some))
        );
        assert_eq!(checked.diagnostic_kinds(), vec![]);
    }

    #[test]
    fn shorthand_without_context_is_a_cycle() {
        let b = AstBuilder::new();
        let function = b
            .function("f")
            .body(vec![b.let_("o", b.variant("None", vec![]))]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert_eq!(
            checked.diagnostic_kinds(),
            vec![DiagnosticKind::CyclicDependency]
        );
    }

    #[test]
    fn shorthand_pattern_waits_for_the_scrutinee_type() {
        let b = AstBuilder::new();
        let choice = b.enumeration(
            "Choice",
            &[],
            vec![("A", vec![]), ("B", vec![b.ty("i64")])],
        );
        let function = b.function("f").body(vec![
            b.let_pattern(b.pat_bind_mut("e"), None, None),
            b.semi(b.match_(
                b.var("e"),
                vec![
                    b.arm(b.pat_shorthand("B", vec![b.pat_bind("n")]), b.unit()),
                    b.arm(b.pat_wild(), b.unit()),
                ],
            )),
            b.semi(b.assign(b.var("e"), b.var("Choice::A"))),
        ]);
        let checked = Checked::new(&b.package(Some("app"), vec![choice, function]));

        let variant_b = checked.lowered.def("Choice::B");
        assert!(
            checked
                .results("f")
                .resolutions
                .values()
                .any(|resolution| *resolution == ExprResolution::Variant(variant_b))
        );
        assert_eq!(checked.local_type("f", "n"), "i64");
        assert_eq!(checked.diagnostic_kinds(), vec![]);
    }

    #[test]
    fn break_outside_loop_is_reported() {
        let b = AstBuilder::new();
        let function = b.function("f").body(vec![b.semi(b.break_())]);
        let checked = Checked::new(&b.package(Some("app"), vec![function]));

        assert_eq!(
            checked.diagnostic_kinds(),
            vec![DiagnosticKind::BreakOutsideLoop]
        );
    }

    #[test]
    fn field_access_falls_back_to_getters() {
        let b = AstBuilder::new();
        let point = b.structure("Point", &[], vec![("raw", b.ty("i32"))]);
        let methods = b.impl_block(
            &[],
            b.ty("Point"),
            vec![b
                .function("doubled")
                .getter()
                .self_param()
                .returns(b.ty("i32"))
                .body(vec![b.bare(b.binary(
                    b.field(b.var("self"), "raw"),
                    BinaryOperatorKind::Multiply,
                    b.int(2),
                ))])],
        );
        let function = b
            .function("f")
            .param("p", b.ty("Point"))
            .body(vec![b.let_("d", b.field(b.var("p"), "doubled"))]);
        let checked = Checked::new(&b.package(Some("app"), vec![point, methods, function]));

        let getter = checked.lowered.def("get_doubled");
        assert!(
            checked
                .results("f")
                .resolutions
                .values()
                .any(|resolution| *resolution == ExprResolution::Getter(getter))
        );
        assert_eq!(checked.local_type("f", "d"), "i32");
    }

    #[test]
    fn struct_literal_reports_missing_fields() {
        let b = AstBuilder::new();
        let point = b.structure("Point", &[], vec![("x", b.ty("i32")), ("y", b.ty("i32"))]);
        let function = b.function("f").body(vec![b.let_(
            "p",
            b.struct_literal("Point", vec![("x", b.int(1))]),
        )]);
        let checked = Checked::new(&b.package(Some("app"), vec![point, function]));

        assert!(checked.results("f").tainted);
        assert_eq!(checked.diagnostic_kinds(), vec![DiagnosticKind::MissingField]);
    }

    #[test]
    fn struct_literal_rejects_repeated_fields() {
        let b = AstBuilder::new();
        let point = b.structure("Point", &[], vec![("x", b.ty("i32"))]);
        let function = b.function("f").body(vec![b.let_(
            "p",
            b.struct_literal("Point", vec![("x", b.int(1)), ("x", b.int(2))]),
        )]);
        let checked = Checked::new(&b.package(Some("app"), vec![point, function]));

        assert_eq!(checked.local_type("f", "p"), "Point");
        assert_eq!(
            checked.diagnostic_kinds(),
            vec![DiagnosticKind::DuplicateDefinition]
        );
    }

    #[test]
    fn labels_must_match_parameters() {
        let b = AstBuilder::new();
        let callee = b
            .function("area")
            .param("width", b.ty("i32"))
            .ordered_param("height", b.ty("i32"))
            .returns(b.ty("i32"))
            .body(vec![b.bare(b.binary(
                b.var("width"),
                BinaryOperatorKind::Multiply,
                b.var("height"),
            ))]);
        let good = b.function("good").body(vec![b.semi(b.call_labeled(
            b.var("area"),
            vec![(Some("width"), b.int(2)), (None, b.int(3))],
        ))]);
        let bad = b.function("bad").body(vec![b.semi(b.call_labeled(
            b.var("area"),
            vec![(None, b.int(2)), (None, b.int(3))],
        ))]);
        let checked = Checked::new(&b.package(Some("app"), vec![callee, good, bad]));

        assert!(!checked.results("good").tainted);
        assert!(checked.results("bad").tainted);
        assert_eq!(
            checked.diagnostic_kinds(),
            vec![DiagnosticKind::ArgumentMismatch]
        );
    }

    #[test]
    fn float_default_follows_the_session() {
        let b = AstBuilder::new();
        let function = b.function("f").body(vec![b.let_("y", b.float(0.5))]);
        let package = b.package(Some("app"), vec![function]);
        let mut checked = Checked::new(&package);
        checked.lowered.session.options.default_float = FloatKind::F32;

        assert_eq!(checked.local_type("f", "y"), "f32");
    }
}
