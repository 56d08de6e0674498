//! Type checking of a simplified HIR package.
//!
//! Facts about items (signatures, field lists, impls, members) are queries
//! computed on first use and shared between every body. Bodies are then
//! inferred independently of each other by [`infer::BodyTypeChecker`], so
//! they can be checked on as many threads as the session allows.

use std::{collections::BTreeMap, sync::Arc};

use hashbrown::HashMap;
use rayon::prelude::*;

use crate::{
    diagnostics::diagnostic,
    frontend::{ast::OverloadableOperator, intern::InternedSymbol, span::Span},
    middle::{
        def::{DefId, DefKind, Definitions},
        hir::{self, AccessorKind, FnFlavor, ItemKind, ParamKind, TyKind},
        query::{
            AdtDefinition, ConstType, FnSignature, ImplBlocks, OperatorOverride,
            Query, QueryEngine, QueryKey, TypeMembers, TypeckBody,
            VariantIndex,
        },
        resolve::Res,
        ty::{Type, TypeKind},
    },
    session::Session,
};

mod infer;

pub use infer::{ExprResolution, TypeckResults};

/// Everything a query needs to compute type facts about the package
#[derive(Clone, Copy)]
pub struct TypeContext<'a> {
    pub session: &'a Session,
    pub defs: &'a Definitions,
    pub hir: &'a hir::Package,
    pub queries: &'a QueryEngine,
}

/// The types a function is declared with
#[derive(Debug, Clone, PartialEq)]
pub struct FnSig {
    pub def: DefId,
    /// Generic parameters of the enclosing impl followed by the function's own
    pub generics: Vec<DefId>,
    pub receiver: Option<Type>,
    pub params: Vec<ParamSig>,
    /// `None` when the return type is inferred from the body
    pub declared_return: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSig {
    /// The label callers must write, `None` for ordered parameters
    pub label: Option<InternedSymbol>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdtDef {
    pub def: DefId,
    pub generics: Vec<DefId>,
    pub kind: AdtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdtKind {
    Struct { fields: Vec<FieldDef> },
    Enum { variants: Vec<VariantDef> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub def: DefId,
    pub name: InternedSymbol,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantDef {
    pub def: DefId,
    pub name: InternedSymbol,
    pub fields: Vec<Type>,
}

impl AdtDef {
    pub fn fields(&self) -> &[FieldDef] {
        match &self.kind {
            AdtKind::Struct { fields } => fields,
            AdtKind::Enum { .. } => &[],
        }
    }

    pub fn field_index(&self, name: InternedSymbol) -> Option<usize> {
        self.fields().iter().position(|field| field.name == name)
    }

    pub fn variants(&self) -> &[VariantDef] {
        match &self.kind {
            AdtKind::Struct { .. } => &[],
            AdtKind::Enum { variants } => variants,
        }
    }

    pub fn variant_named(&self, name: InternedSymbol) -> Option<&VariantDef> {
        self.variants().iter().find(|variant| variant.name == name)
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, AdtKind::Struct { .. })
    }

    /// The type of this ADT applied to its own generic parameters
    pub fn self_type(&self) -> Type {
        Type::new(TypeKind::Adt(
            self.def,
            self.generics
                .iter()
                .map(|param| Type::new(TypeKind::Param(*param)))
                .collect(),
        ))
    }
}

/// Impl blocks grouped by the ADT they provide methods for
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImplMap {
    pub by_type: HashMap<DefId, Vec<DefId>>,
    /// The lowered self type of every impl block
    pub self_types: HashMap<DefId, Type>,
}

/// What can be named on a value of some ADT
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Members {
    pub methods: HashMap<InternedSymbol, DefId>,
    pub getters: HashMap<InternedSymbol, DefId>,
    pub setters: HashMap<InternedSymbol, DefId>,
    pub operators: HashMap<OverloadableOperator, DefId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorKey {
    pub adt: DefId,
    pub operator: OverloadableOperator,
}

impl<'a> TypeContext<'a> {
    /// Runs `query`, reporting a dependency cycle at `span` the first time
    /// one is found through the same key
    pub fn query<Q: Query<Self>>(&self, query: Q, span: Span) -> Option<Q::Output> {
        match self.queries.get(self, query) {
            Ok(output) => Some(output),
            Err(cycle) => {
                if self.queries.first_cycle_report(cycle.key) {
                    self.session.report(diagnostic!(
                        CyclicDependency,
                        span,
                        "cycle detected while computing {}",
                        self.describe_key(cycle.key)
                    ));
                }

                None
            }
        }
    }

    fn describe_key(&self, key: QueryKey) -> String {
        match key {
            QueryKey::TypeckBody(def) => format!("the type of `{}`", self.defs.qualified_name(def)),
            QueryKey::ConstType(def) => format!("the type of `{}`", self.defs.qualified_name(def)),
            QueryKey::FnSignature(def) => {
                format!("the signature of `{}`", self.defs.qualified_name(def))
            }
            other => format!("{other:?}"),
        }
    }

    pub fn fn_signature(&self, def: DefId) -> Arc<FnSig> {
        self.query(FnSignature(def), self.defs.span(def))
            .expect("signatures never depend on other signatures")
    }

    pub fn adt_def(&self, def: DefId) -> Arc<AdtDef> {
        self.query(AdtDefinition(def), self.defs.span(def))
            .expect("field types never depend on other items' types")
    }

    pub fn impl_map(&self) -> Arc<ImplMap> {
        self.query(ImplBlocks(()), Span::DUMMY)
            .expect("impl self types never depend on the impl map")
    }

    pub fn members(&self, adt: DefId) -> Arc<Members> {
        self.query(TypeMembers(adt), self.defs.span(adt))
            .expect("members never depend on bodies")
    }

    pub fn operator_override(&self, adt: DefId, operator: OverloadableOperator) -> Option<DefId> {
        self.query(OperatorOverride(OperatorKey { adt, operator }), self.defs.span(adt))
            .flatten()
    }

    pub fn variant_index(&self, variant: DefId) -> usize {
        self.query(VariantIndex(variant), self.defs.span(variant))
            .expect("variant positions never depend on bodies")
    }

    /// The return type of a function, inferring it from the body when it is
    /// not written down
    pub fn return_type(&self, def: DefId, span: Span) -> Type {
        let sig = self.fn_signature(def);

        if let Some(declared) = &sig.declared_return {
            return declared.clone();
        }

        if !self.hir.bodies.contains_key(&def) {
            return Type::unit();
        }

        self.query(TypeckBody(def), span)
            .map(|results| results.return_type.clone())
            .unwrap_or_else(Type::error)
    }

    pub fn const_type(&self, def: DefId, span: Span) -> Type {
        self.query(ConstType(def), span)
            .unwrap_or_else(Type::error)
    }

    pub fn typeck_body(&self, def: DefId) -> Option<Arc<TypeckResults>> {
        self.query(TypeckBody(def), self.defs.span(def))
    }

    /// Lowers a written type. `infer` supplies fresh variables for `_` and
    /// omitted generic arguments; without it those are errors.
    pub fn lower_ty<'f>(
        &self,
        ty: &hir::Ty,
        mut infer: Option<&mut (dyn FnMut() -> Type + 'f)>,
    ) -> Type {
        match &ty.kind {
            TyKind::Unit => Type::unit(),
            TyKind::Never => Type::never(),
            TyKind::Infer => match infer {
                Some(fresh) => fresh(),
                None => {
                    self.session.report(diagnostic!(
                        CannotInfer,
                        ty.span,
                        "the placeholder `_` is not allowed in item signatures"
                    ));
                    Type::error()
                }
            },
            TyKind::Function(parameters, return_type) => Type::new(TypeKind::Function {
                parameters: parameters
                    .iter()
                    .map(|parameter| self.lower_ty(parameter, infer.as_deref_mut()))
                    .collect(),
                return_type: self.lower_ty(return_type, infer.as_deref_mut()),
            }),
            TyKind::Path(res, arguments) => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.lower_ty(argument, infer.as_deref_mut()))
                    .collect::<Vec<_>>();

                self.lower_ty_path(ty.span, *res, arguments, infer)
            }
        }
    }

    fn lower_ty_path<'f>(
        &self,
        span: Span,
        res: Res,
        arguments: Vec<Type>,
        infer: Option<&mut (dyn FnMut() -> Type + 'f)>,
    ) -> Type {
        let takes_no_arguments = |ty: Type| {
            if arguments.is_empty() {
                ty
            } else {
                self.session.report(diagnostic!(
                    TypeMismatch,
                    span,
                    "type `{}` takes no generic arguments",
                    ty.display(self.defs)
                ));
                Type::error()
            }
        };

        match res {
            Res::Primitive(primitive) => takes_no_arguments(Type::primitive(primitive)),
            Res::Def(DefKind::GenericParam, def) => takes_no_arguments(Type::new(TypeKind::Param(def))),
            Res::Def(DefKind::Struct | DefKind::Enum, def) => {
                let expected = self.generics_of(def).len();

                if arguments.len() == expected {
                    return Type::new(TypeKind::Adt(def, arguments));
                }

                match infer {
                    Some(fresh) if arguments.is_empty() => {
                        Type::new(TypeKind::Adt(def, (0..expected).map(|_| fresh()).collect()))
                    }
                    _ => {
                        self.session.report(diagnostic!(
                            TypeMismatch,
                            span,
                            "`{}` expects {expected} generic argument(s) but {} were given",
                            self.defs.name(def),
                            arguments.len()
                        ));
                        Type::error()
                    }
                }
            }
            Res::SelfTy(owner) => match self.defs.kind(owner) {
                DefKind::Impl => takes_no_arguments(
                    self.impl_map()
                        .self_types
                        .get(&owner)
                        .cloned()
                        .unwrap_or_else(Type::error),
                ),
                _ => takes_no_arguments(Type::new(TypeKind::Param(owner))),
            },
            Res::TypeRelative { base, name } => {
                self.session.report(diagnostic!(
                    UnknownMember,
                    span,
                    "`{}` has no associated type `{name}`",
                    self.defs.name(base)
                ));
                Type::error()
            }
            Res::Err => Type::error(),
            Res::Def(kind, def) => {
                self.session.report(diagnostic!(
                    TypeMismatch,
                    span,
                    "expected a type, found {kind} `{}`",
                    self.defs.name(def)
                ));
                Type::error()
            }
            Res::Local(def) => {
                self.session.report(diagnostic!(
                    TypeMismatch,
                    span,
                    "expected a type, found local binding `{}`",
                    self.defs.name(def)
                ));
                Type::error()
            }
        }
    }

    /// Generic parameters declared directly on an item
    pub fn generics_of(&self, def: DefId) -> &'a [DefId] {
        match self.hir.item(def).map(|item| &item.kind) {
            Some(ItemKind::Function(function)) => function.generics.as_slice(),
            Some(ItemKind::Struct(definition)) => definition.generics.as_slice(),
            Some(ItemKind::Enum(definition)) => definition.generics.as_slice(),
            Some(ItemKind::Impl(block)) => block.generics.as_slice(),
            _ => &[],
        }
    }
}

impl Query<TypeContext<'_>> for FnSignature {
    fn execute(self, cx: &TypeContext<'_>) -> Arc<FnSig> {
        let def = self.0;
        let function = cx
            .hir
            .function(def)
            .expect("signatures are only requested for functions");

        let mut generics = Vec::new();
        let mut self_type = None;

        if let Some(container) = function.container {
            match cx.defs.kind(container) {
                DefKind::Impl => {
                    generics.extend_from_slice(cx.generics_of(container));
                    self_type = cx.impl_map().self_types.get(&container).cloned();
                }
                _ => self_type = Some(Type::new(TypeKind::Param(container))),
            }
        }
        generics.extend_from_slice(&function.generics);

        let mut receiver = None;
        let mut params = Vec::new();

        for param in &function.params {
            match param.kind {
                ParamKind::SelfValue => {
                    receiver = Some(self_type.clone().unwrap_or_else(Type::error));
                }
                ParamKind::Named(label) => params.push(ParamSig {
                    label: Some(label),
                    ty: param_type(cx, param),
                }),
                ParamKind::Ordered => params.push(ParamSig {
                    label: None,
                    ty: param_type(cx, param),
                }),
            }
        }

        Arc::new(FnSig {
            def,
            generics,
            receiver,
            params,
            declared_return: function
                .return_type
                .as_ref()
                .map(|ty| cx.lower_ty(ty, None)),
        })
    }
}

fn param_type(cx: &TypeContext<'_>, param: &hir::Param) -> Type {
    param
        .ty
        .as_ref()
        .map(|ty| cx.lower_ty(ty, None))
        .unwrap_or_else(Type::error)
}

impl Query<TypeContext<'_>> for ConstType {
    fn execute(self, cx: &TypeContext<'_>) -> Type {
        let def = self.0;

        match cx.hir.item(def).map(|item| &item.kind) {
            Some(ItemKind::Const(hir::ConstDecl { ty: Some(ty) })) => cx.lower_ty(ty, None),
            _ => cx
                .typeck_body(def)
                .map(|results| results.return_type.clone())
                .unwrap_or_else(Type::error),
        }
    }
}

impl Query<TypeContext<'_>> for AdtDefinition {
    fn execute(self, cx: &TypeContext<'_>) -> Arc<AdtDef> {
        let def = self.0;

        let (generics, kind) = match cx.hir.item(def).map(|item| &item.kind) {
            Some(ItemKind::Struct(definition)) => (
                definition.generics.clone(),
                AdtKind::Struct {
                    fields: definition
                        .fields
                        .iter()
                        .map(|field| FieldDef {
                            def: field.def,
                            name: field.name,
                            ty: cx.lower_ty(&field.ty, None),
                        })
                        .collect(),
                },
            ),
            Some(ItemKind::Enum(definition)) => (
                definition.generics.clone(),
                AdtKind::Enum {
                    variants: definition
                        .variants
                        .iter()
                        .map(|variant| VariantDef {
                            def: variant.def,
                            name: variant.name,
                            fields: variant
                                .fields
                                .iter()
                                .map(|ty| cx.lower_ty(ty, None))
                                .collect(),
                        })
                        .collect(),
                },
            ),
            _ => unreachable!("adt_def is only requested for structs and enums"),
        };

        Arc::new(AdtDef {
            def,
            generics,
            kind,
        })
    }
}

impl Query<TypeContext<'_>> for ImplBlocks {
    fn execute(self, cx: &TypeContext<'_>) -> Arc<ImplMap> {
        let mut map = ImplMap::default();

        for item in cx.hir.items.values() {
            let ItemKind::Impl(block) = &item.kind else {
                continue;
            };

            // `Self` is not bound inside the self type, so this never needs
            // the map being built
            let self_type = cx.lower_ty(&block.self_ty, None);

            match &*self_type {
                TypeKind::Adt(adt, _) => {
                    map.by_type.entry(*adt).or_default().push(item.def);
                }
                TypeKind::Error => {}
                _ => cx.session.report(diagnostic!(
                    TypeMismatch,
                    block.self_ty.span,
                    "impl blocks can only add methods to structs and enums, not `{}`",
                    self_type.display(cx.defs)
                )),
            }

            map.self_types.insert(item.def, self_type);
        }

        Arc::new(map)
    }
}

impl Query<TypeContext<'_>> for TypeMembers {
    fn execute(self, cx: &TypeContext<'_>) -> Arc<Members> {
        let mut members = Members::default();
        let impl_map = cx.impl_map();

        let methods = impl_map
            .by_type
            .get(&self.0)
            .into_iter()
            .flatten()
            .filter_map(|imp| match &cx.hir.item(*imp)?.kind {
                ItemKind::Impl(block) => Some(block.methods.iter().copied()),
                _ => None,
            })
            .flatten();

        for method in methods {
            let Some(function) = cx.hir.function(method) else {
                continue;
            };

            let previous = match function.flavor {
                FnFlavor::Override(operator) => members.operators.insert(operator, method),
                FnFlavor::Accessor { kind, property } => {
                    let accessors = match kind {
                        AccessorKind::Get => &mut members.getters,
                        AccessorKind::Set => &mut members.setters,
                    };
                    accessors.insert(property, method);
                    members.methods.insert(cx.defs.name(method), method)
                }
                FnFlavor::Plain | FnFlavor::Getter | FnFlavor::Setter => {
                    members.methods.insert(cx.defs.name(method), method)
                }
            };

            if let Some(previous) = previous {
                cx.session.report(
                    diagnostic!(
                        DuplicateDefinition,
                        cx.defs.span(method),
                        "`{}` is defined multiple times for `{}`",
                        cx.defs.name(method),
                        cx.defs.name(self.0)
                    )
                    .with_secondary(cx.defs.span(previous), "previous definition here"),
                );
            }
        }

        Arc::new(members)
    }
}

impl Query<TypeContext<'_>> for OperatorOverride {
    fn execute(self, cx: &TypeContext<'_>) -> Option<DefId> {
        cx.members(self.0.adt).operators.get(&self.0.operator).copied()
    }
}

impl Query<TypeContext<'_>> for VariantIndex {
    fn execute(self, cx: &TypeContext<'_>) -> usize {
        let variant = self.0;
        let adt = cx.adt_def(
            cx.defs
                .parent(variant)
                .expect("variants always belong to an enum"),
        );

        adt.variants()
            .iter()
            .position(|v| v.def == variant)
            .expect("variant is declared by its parent enum")
    }
}

impl Query<TypeContext<'_>> for TypeckBody {
    fn execute(self, cx: &TypeContext<'_>) -> Arc<TypeckResults> {
        let body = cx
            .hir
            .bodies
            .get(&self.0)
            .expect("only items with bodies are type checked");

        Arc::new(infer::BodyTypeChecker::new(cx, body).check())
    }
}

/// Checks every item signature and then every body, returning the results
/// of each body keyed by its owner
#[tracing::instrument(level = "debug", skip_all, fields(jobs = cx.session.options.jobs))]
pub fn check_package(
    cx: &TypeContext<'_>,
) -> Result<BTreeMap<DefId, Arc<TypeckResults>>, rayon::ThreadPoolBuildError> {
    // Item level facts first so their diagnostics don't depend on which body
    // happens to ask for them
    for item in cx.hir.items.values() {
        match &item.kind {
            ItemKind::Function(_) => {
                cx.fn_signature(item.def);
            }
            ItemKind::Struct(_) | ItemKind::Enum(_) => {
                cx.adt_def(item.def);
                cx.members(item.def);
            }
            ItemKind::Impl(_) => {
                cx.impl_map();
            }
            ItemKind::Trait(_) | ItemKind::Const(_) => {}
        }
    }

    let owners = cx.hir.bodies.keys().copied().collect::<Vec<_>>();
    let jobs = cx.session.options.jobs.max(1);

    let results: BTreeMap<DefId, Arc<TypeckResults>> = if jobs == 1 {
        owners
            .iter()
            .filter_map(|owner| Some((*owner, cx.typeck_body(*owner)?)))
            .collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

        pool.install(|| {
            owners
                .par_iter()
                .filter_map(|owner| Some((*owner, cx.typeck_body(*owner)?)))
                .collect()
        })
    };

    tracing::debug!(bodies = owners.len(), "type checked package");

    Ok(results)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        diagnostics::DiagnosticKind,
        frontend::ast::{Package, build::AstBuilder},
        middle::testing::Lowered,
    };

    fn context(lowered: &Lowered) -> TypeContext<'_> {
        TypeContext {
            session: &lowered.session,
            defs: &lowered.defs,
            hir: &lowered.hir,
            queries: &lowered.queries,
        }
    }

    fn wrapper() -> Package {
        let b = AstBuilder::new();
        let structure = b.structure("Wrapper", &["T"], vec![("value", b.ty("T"))]);
        let methods = b.impl_block(
            &["T"],
            b.generic_ty("Wrapper", vec![b.ty("T")]),
            vec![b
                .function("get")
                .self_param()
                .returns(b.ty("T"))
                .body(vec![b.bare(b.field(b.var("self"), "value"))])],
        );

        b.package(Some("app"), vec![structure, methods])
    }

    #[test]
    fn impl_generics_flow_into_method_signatures() {
        let lowered = Lowered::simplified(&wrapper());
        let cx = context(&lowered);

        let sig = cx.fn_signature(lowered.def("get"));
        let receiver = sig.receiver.as_ref().expect("`get` takes self");

        assert_eq!(sig.generics.len(), 1);
        assert_eq!(receiver.display(cx.defs).to_string(), "Wrapper<T>");
        assert_eq!(
            sig.declared_return
                .as_ref()
                .map(|ty| ty.display(cx.defs).to_string()),
            Some("T".to_string())
        );
        assert!(sig.params.is_empty());
        assert_eq!(lowered.diagnostic_kinds(), vec![]);
    }

    #[test]
    fn wrong_generic_arity_is_a_mismatch() {
        let b = AstBuilder::new();
        let structure = b.structure("Pair", &["A", "B"], vec![("first", b.ty("A"))]);
        let function = b
            .function("f")
            .param("p", b.generic_ty("Pair", vec![b.ty("i32")]))
            .body(vec![]);
        let lowered = Lowered::simplified(&b.package(Some("app"), vec![structure, function]));
        let cx = context(&lowered);

        let sig = cx.fn_signature(lowered.def("f"));

        assert!(sig.params[0].ty.is_error());
        assert_eq!(lowered.diagnostic_kinds(), vec![DiagnosticKind::TypeMismatch]);
    }

    #[test]
    fn bodies_are_checked_once() {
        let b = AstBuilder::new();
        let five = b.function("five").body(vec![b.bare(b.int(5))]);
        let first = b
            .function("first")
            .body(vec![b.bare(b.call(b.var("five"), vec![]))]);
        let second = b
            .function("second")
            .body(vec![b.bare(b.call(b.var("five"), vec![]))]);
        let lowered = Lowered::simplified(&b.package(Some("app"), vec![five, first, second]));
        let cx = context(&lowered);

        let results = check_package(&cx).expect("a single job needs no pool");
        let five = lowered.def("five");

        assert_eq!(results.len(), 3);
        assert_eq!(lowered.queries.execution_count(TypeckBody(five)), 1);
        assert!(cx.typeck_body(five).is_some());
        assert_eq!(lowered.queries.execution_count(TypeckBody(five)), 1);
    }

    #[test]
    fn members_from_separate_impls_must_not_collide() {
        let b = AstBuilder::new();
        let structure = b.structure("V", &[], vec![("x", b.ty("i32"))]);
        let first = b.impl_block(
            &[],
            b.ty("V"),
            vec![b.function("len").self_param().returns(b.ty("i32")).body(vec![b.bare(b.int(1))])],
        );
        let second = b.impl_block(
            &[],
            b.ty("V"),
            vec![b.function("len").self_param().returns(b.ty("i32")).body(vec![b.bare(b.int(2))])],
        );
        let lowered = Lowered::simplified(&b.package(Some("app"), vec![structure, first, second]));
        let cx = context(&lowered);

        check_package(&cx).expect("a single job needs no pool");

        assert_eq!(
            lowered.diagnostic_kinds(),
            vec![DiagnosticKind::DuplicateDefinition]
        );
    }

    #[test]
    fn impls_on_primitives_are_rejected() {
        let b = AstBuilder::new();
        let block = b.impl_block(
            &[],
            b.ty("i32"),
            vec![b.function("twice").self_param().body(vec![])],
        );
        let lowered = Lowered::simplified(&b.package(Some("app"), vec![block]));
        let cx = context(&lowered);

        assert!(cx.impl_map().by_type.is_empty());
        assert_eq!(lowered.diagnostic_kinds(), vec![DiagnosticKind::TypeMismatch]);
    }
}
