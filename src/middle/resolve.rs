use hashbrown::{HashMap, HashSet};

use crate::{
    diagnostics::diagnostic,
    frontend::{
        ast::{
            self, Block, Expression, ExpressionKind, FunctionDefinition, FunctionParameterKind,
            ImplBlock, Item, ItemKind, MatchArm, NodeId, Package, Path, Pattern, PatternKind,
            Type, VariantPath,
            visit::{self, Visitor},
        },
        intern::{InternedSymbol, kw},
        span::Span,
    },
    middle::{
        def::{DefId, DefKind, DefVisibility, Definition, Definitions},
        module_tree::{ModuleId, ModuleTree, PathCx, PathResolution},
        primitive::PrimitiveKind,
        query::QueryEngine,
    },
    session::Session,
};

/// What a path in the syntax tree refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Res {
    Def(DefKind, DefId),
    Local(DefId),
    Primitive(PrimitiveKind),
    /// `Self` inside the impl or trait with this def
    SelfTy(DefId),
    /// `Base::name` where `Base` is a type rather than a namespace. `base` is
    /// a struct, enum, trait, generic parameter or (for `Self::name`) an impl.
    TypeRelative { base: DefId, name: InternedSymbol },
    /// An error has already been reported
    Err,
}

/// Resolutions for every path in the package, keyed by the path's node
#[derive(Debug, Default)]
pub struct Resolutions {
    paths: HashMap<NodeId, Res>,
}

impl Resolutions {
    pub fn get(&self, path: NodeId) -> Option<Res> {
        self.paths.get(&path).copied()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RibKind {
    /// Item-level names of a module. Lookups reaching this rib are handed to
    /// the module tree.
    Module(ModuleId),
    /// Generic parameters and `Self` of an item
    Item,
    /// Function parameters
    Function,
    Block,
    MatchArm,
}

#[derive(Debug)]
pub struct Rib {
    pub kind: RibKind,
    bindings: HashMap<InternedSymbol, Res>,
}

/// Where an unqualified name was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RibLookup {
    Found(Res),
    /// No rib binds the name; continue in this module's namespace
    Module(ModuleId),
}

/// The lexical scopes enclosing the current position, innermost last
#[derive(Debug, Default)]
pub struct RibStack {
    ribs: Vec<Rib>,
}

impl RibStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: RibKind) {
        self.ribs.push(Rib {
            kind,
            bindings: HashMap::new(),
        });
    }

    pub fn pop(&mut self) -> Option<Rib> {
        self.ribs.pop()
    }

    pub fn depth(&self) -> usize {
        self.ribs.len()
    }

    /// Binds `name` in the innermost rib, returning what it previously meant
    /// in that same rib
    pub fn bind(&mut self, name: InternedSymbol, res: Res) -> Option<Res> {
        self.ribs
            .last_mut()
            .expect("bindings are only added while a rib is active")
            .bindings
            .insert(name, res)
    }

    /// Searches from the innermost rib outwards; the first binding wins
    pub fn lookup(&self, name: InternedSymbol) -> Option<RibLookup> {
        for rib in self.ribs.iter().rev() {
            if let RibKind::Module(module) = rib.kind {
                return Some(RibLookup::Module(module));
            }

            if let Some(res) = rib.bindings.get(&name) {
                return Some(RibLookup::Found(*res));
            }
        }

        None
    }

    pub fn current_module(&self) -> Option<ModuleId> {
        self.ribs.iter().rev().find_map(|rib| match rib.kind {
            RibKind::Module(module) => Some(module),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Namespace {
    Type,
    Value,
}

/// Resolves every path in the package to a definition, creating local
/// definitions for parameters and pattern bindings along the way
#[tracing::instrument(level = "debug", skip_all)]
pub fn resolve_package(
    session: &Session,
    tree: &ModuleTree,
    defs: &mut Definitions,
    queries: &QueryEngine,
    package: &Package,
    prelude: &[Item],
) -> Resolutions {
    let mut resolver = Resolver {
        session,
        tree,
        defs,
        queries,
        ribs: RibStack::new(),
        resolutions: Resolutions::default(),
        owner: None,
        in_associated: false,
        pattern_bindings: None,
    };

    resolver.ribs.push(RibKind::Module(tree.root));
    visit::walk_package(&mut resolver, package);
    resolver.ribs.pop();

    resolver.ribs.push(RibKind::Module(tree.prelude));
    for item in prelude {
        resolver.visit_item(item);
    }
    resolver.ribs.pop();

    tracing::debug!(paths = resolver.resolutions.len(), "resolved names");

    resolver.resolutions
}

struct Resolver<'a> {
    session: &'a Session,
    tree: &'a ModuleTree,
    defs: &'a mut Definitions,
    queries: &'a QueryEngine,
    ribs: RibStack,
    resolutions: Resolutions,
    /// The item whose body is being resolved
    owner: Option<DefId>,
    /// Inside an impl or trait, where `self` parameters are allowed
    in_associated: bool,
    /// Names bound so far by the pattern (or parameter list) being visited
    pattern_bindings: Option<HashSet<InternedSymbol>>,
}

impl Resolver<'_> {
    fn path_cx(&self) -> PathCx<'_> {
        PathCx {
            session: self.session,
            tree: self.tree,
            defs: self.defs,
            queries: self.queries,
        }
    }

    fn module(&self) -> ModuleId {
        self.ribs
            .current_module()
            .expect("resolution always happens inside a module rib")
    }

    fn def_of(&self, node: NodeId) -> DefId {
        self.defs
            .def_for_node(node)
            .expect("the module tree creates a definition for every item")
    }

    fn res_of_def(&self, def: DefId) -> Res {
        Res::Def(self.defs.kind(def), def)
    }

    fn record(&mut self, path: &Path, res: Res) {
        self.resolutions.paths.insert(path.id, res);
    }

    fn with_rib(&mut self, kind: RibKind, f: impl FnOnce(&mut Self)) {
        self.ribs.push(kind);
        f(self);
        self.ribs.pop();
    }

    fn bind_generics(&mut self, generics: &[crate::frontend::ast::GenericParameter]) {
        for parameter in generics {
            let def = self.def_of(parameter.id);
            self.ribs.bind(parameter.name.symbol, Res::Def(DefKind::GenericParam, def));
        }
    }

    /// Creates a local definition for a binding and adds it to the innermost
    /// rib
    fn bind_local(&mut self, node: NodeId, name: InternedSymbol, span: Span) {
        if let Some(seen) = &mut self.pattern_bindings
            && !seen.insert(name)
        {
            self.session.report(diagnostic!(
                DuplicateDefinition,
                span,
                "identifier `{name}` is bound more than once in the same pattern"
            ));
        }

        let def = self.defs.create(
            Some(node),
            Definition {
                kind: DefKind::Local,
                name,
                parent: self.owner,
                span,
                visibility: DefVisibility::Module,
            },
        );

        self.ribs.bind(name, Res::Local(def));
    }

    fn resolve_path(&mut self, path: &Path, namespace: Namespace) -> Res {
        let res = self.compute_path_resolution(path, namespace);
        self.record(path, res);
        res
    }

    fn compute_path_resolution(&mut self, path: &Path, namespace: Namespace) -> Res {
        let Some(first) = path.segments.first() else {
            return Res::Err;
        };

        let is_keyword = [*kw::SELF_VALUE, *kw::SUPER, *kw::PACKAGE].contains(&first.symbol);

        if let [only] = path.segments.as_slice() {
            return self.resolve_single(only.symbol, only.span, namespace);
        }

        if !is_keyword
            && let Some(RibLookup::Found(res)) = self.ribs.lookup(first.symbol)
        {
            return match (res, path.segments.as_slice()) {
                (Res::SelfTy(base), [_, name]) => Res::TypeRelative {
                    base,
                    name: name.symbol,
                },
                (Res::Def(DefKind::GenericParam, base), [_, name]) => Res::TypeRelative {
                    base,
                    name: name.symbol,
                },
                (Res::Err, _) => Res::Err,
                _ => {
                    self.session.report(diagnostic!(
                        PathError,
                        first.span,
                        "`{}` is not a module and can't be used as a path prefix",
                        first.symbol
                    ));
                    Res::Err
                }
            };
        }

        let segments = path
            .segments
            .iter()
            .map(|s| (s.symbol, s.span))
            .collect::<Vec<_>>();

        match self.path_cx().resolve_path(self.module(), &segments) {
            PathResolution::Def(def) => self.res_of_def(def),
            PathResolution::TypeRelative { base, name } => Res::TypeRelative { base, name },
            PathResolution::Failed => Res::Err,
        }
    }

    fn resolve_single(&mut self, name: InternedSymbol, span: Span, namespace: Namespace) -> Res {
        let module = match self.ribs.lookup(name) {
            Some(RibLookup::Found(res)) => return res,
            Some(RibLookup::Module(module)) => module,
            None => self.module(),
        };

        let cx = self.path_cx();

        match cx.lookup_in_scope(module, name) {
            Ok(Some(def)) => self.res_of_def(def),
            Ok(None) => {
                if namespace == Namespace::Type
                    && let Some(primitive) = PrimitiveKind::from_symbol(name)
                {
                    return Res::Primitive(primitive);
                }

                self.session.report(diagnostic!(
                    UnresolvedName,
                    span,
                    "cannot find `{name}` in this scope"
                ));
                Res::Err
            }
            Err(error) => {
                cx.report_lookup_error(error, name, span);
                Res::Err
            }
        }
    }

    fn resolve_function(&mut self, item: &Item, function: &FunctionDefinition) {
        let def = self.def_of(item.id);
        let previous_owner = self.owner.replace(def);

        self.with_rib(RibKind::Item, |this| {
            this.bind_generics(&function.generics);

            this.with_rib(RibKind::Function, |this| {
                this.pattern_bindings = Some(HashSet::new());

                for parameter in &function.parameters {
                    if let Some(ty) = &parameter.ty {
                        this.visit_type(ty);
                    }

                    match &parameter.kind {
                        FunctionParameterKind::SelfValue => {
                            if !this.in_associated {
                                this.session.report(diagnostic!(
                                    UnresolvedName,
                                    parameter.span,
                                    "`self` parameters are only allowed in impl and trait functions"
                                ));
                            }

                            this.bind_local(parameter.id, *kw::SELF_VALUE, parameter.span);
                        }
                        FunctionParameterKind::Named(name)
                        | FunctionParameterKind::Ordered(name) => {
                            this.bind_local(parameter.id, name.symbol, name.span);
                        }
                    }
                }

                this.pattern_bindings = None;

                if let Some(ty) = &function.return_type {
                    this.visit_type(ty);
                }

                if let Some(body) = &function.body {
                    this.visit_block(body);
                }
            });
        });

        self.owner = previous_owner;
    }

    fn resolve_impl(&mut self, item: &Item, block: &ImplBlock) {
        let def = self.def_of(item.id);

        self.with_rib(RibKind::Item, |this| {
            this.bind_generics(&block.generics);

            if let Some(trait_ref) = &block.trait_ref {
                let res = this.resolve_path(trait_ref, Namespace::Type);

                if let Res::Def(kind, _) = res
                    && kind != DefKind::Trait
                {
                    this.session.report(diagnostic!(
                        PathError,
                        trait_ref.span,
                        "expected a trait but found a {kind}"
                    ));
                    this.record(trait_ref, Res::Err);
                }
            }

            this.visit_type(&block.self_ty);
            this.ribs.bind(*kw::SELF_TYPE, Res::SelfTy(def));

            let was_associated = std::mem::replace(&mut this.in_associated, true);
            for item in ast::associated_functions(&block.items) {
                this.visit_item(item);
            }
            this.in_associated = was_associated;
        });
    }

    fn resolve_pattern(&mut self, pattern: &Pattern) {
        let outermost = self.pattern_bindings.is_none();
        if outermost {
            self.pattern_bindings = Some(HashSet::new());
        }

        self.visit_pattern(pattern);

        if outermost {
            self.pattern_bindings = None;
        }
    }
}

impl<'ast> Visitor<'ast> for Resolver<'_> {
    fn visit_item(&mut self, item: &'ast Item) {
        match &item.kind {
            ItemKind::Module(module) => {
                let def = self.def_of(item.id);
                let module_id = self
                    .tree
                    .module_of_def(def)
                    .expect("module definitions always have a module tree node");

                self.with_rib(RibKind::Module(module_id), |this| {
                    for item in &module.items {
                        this.visit_item(item);
                    }
                });
            }
            ItemKind::Import(_) => {}
            ItemKind::Function(function) => self.resolve_function(item, function),
            ItemKind::Struct(definition) => {
                self.with_rib(RibKind::Item, |this| {
                    this.bind_generics(&definition.generics);

                    for field in &definition.fields {
                        this.visit_type(&field.ty);
                    }
                });
            }
            ItemKind::Enum(definition) => {
                self.with_rib(RibKind::Item, |this| {
                    this.bind_generics(&definition.generics);

                    for variant in &definition.variants {
                        this.visit_enum_variant(variant);
                    }
                });
            }
            ItemKind::Trait(definition) => {
                let def = self.def_of(item.id);

                self.with_rib(RibKind::Item, |this| {
                    this.ribs.bind(*kw::SELF_TYPE, Res::SelfTy(def));

                    let was_associated = std::mem::replace(&mut this.in_associated, true);
                    for item in ast::associated_functions(&definition.items) {
                        this.visit_item(item);
                    }
                    this.in_associated = was_associated;
                });
            }
            ItemKind::Impl(block) => self.resolve_impl(item, block),
            ItemKind::Const(definition) => {
                let def = self.def_of(item.id);
                let previous_owner = self.owner.replace(def);

                if let Some(ty) = &definition.ty {
                    self.visit_type(ty);
                }

                self.with_rib(RibKind::Function, |this| {
                    this.visit_expression(&definition.value)
                });

                self.owner = previous_owner;
            }
        }
    }

    fn visit_type(&mut self, ty: &'ast Type) {
        if let crate::frontend::ast::TypeKind::Path { path, .. } = &ty.kind {
            self.resolve_path(path, Namespace::Type);
        }

        visit::walk_type(self, ty);
    }

    fn visit_block(&mut self, block: &'ast Block) {
        self.with_rib(RibKind::Block, |this| visit::walk_block(this, block));
    }

    fn visit_local(&mut self, local: &'ast crate::frontend::ast::Local) {
        if let Some(ty) = &local.ty {
            self.visit_type(ty);
        }

        // The initializer can't see the names its own pattern introduces
        if let Some(initializer) = &local.initializer {
            self.visit_expression(initializer);
        }

        self.resolve_pattern(&local.pattern);
    }

    fn visit_pattern(&mut self, pattern: &'ast Pattern) {
        match &pattern.kind {
            PatternKind::Binding { name, .. } => {
                self.bind_local(pattern.id, name.symbol, name.span);
            }
            PatternKind::Variant { path, fields } => {
                if let VariantPath::Path(path) = path {
                    self.resolve_path(path, Namespace::Value);
                }

                for field in fields {
                    self.visit_pattern(field);
                }
            }
            PatternKind::Wildcard | PatternKind::Literal(_) => {}
        }
    }

    fn visit_match_arm(&mut self, arm: &'ast MatchArm) {
        self.with_rib(RibKind::MatchArm, |this| {
            this.resolve_pattern(&arm.pattern);
            this.visit_expression(&arm.body);
        });
    }

    fn visit_expression(&mut self, expression: &'ast Expression) {
        match &expression.kind {
            ExpressionKind::Path(path) => {
                self.resolve_path(path, Namespace::Value);
            }
            ExpressionKind::StructLiteral { path, fields } => {
                self.resolve_path(path, Namespace::Type);

                for field in fields {
                    self.visit_expression(&field.value);
                }
            }
            ExpressionKind::For {
                pattern,
                iterable,
                block,
            } => {
                self.visit_expression(iterable);

                self.with_rib(RibKind::Block, |this| {
                    this.resolve_pattern(pattern);
                    this.visit_block(block);
                });
            }
            _ => visit::walk_expression(self, expression),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        diagnostics::DiagnosticKind,
        frontend::ast::build::AstBuilder,
        index::Index,
        middle::module_tree::build_module_tree,
    };

    fn resolve(
        items: impl FnOnce(&AstBuilder) -> Vec<Item>,
    ) -> (Package, Definitions, Resolutions, Vec<DiagnosticKind>) {
        let b = AstBuilder::new();
        let items = items(&b);
        let package = b.package(Some("app"), items);

        let session = Session::default();
        let queries = QueryEngine::new();
        let (tree, mut defs) = build_module_tree(&session, &package, &[]);
        let resolutions = resolve_package(&session, &tree, &mut defs, &queries, &package, &[]);

        let kinds = session
            .into_diagnostics()
            .into_iter()
            .map(|d| d.kind)
            .collect();

        (package, defs, resolutions, kinds)
    }

    /// Every path expression in a function body, in source order
    fn body_paths(package: &Package, function: &str) -> Vec<NodeId> {
        struct Collector(Vec<NodeId>);

        impl<'ast> Visitor<'ast> for Collector {
            fn visit_expression(&mut self, expression: &'ast Expression) {
                if let ExpressionKind::Path(path) = &expression.kind {
                    self.0.push(path.id);
                }
                visit::walk_expression(self, expression);
            }
        }

        let item = package
            .items
            .iter()
            .find(|item| item.kind.name().is_some_and(|n| n.symbol.value() == function))
            .unwrap();

        let mut collector = Collector(Vec::new());
        collector.visit_item(item);
        collector.0
    }

    fn local_name(defs: &Definitions, resolutions: &Resolutions, path: NodeId) -> (String, Span) {
        match resolutions.get(path) {
            Some(Res::Local(def)) => (defs.name(def).to_string(), defs.span(def)),
            other => panic!("expected a local, found {other:?}"),
        }
    }

    #[test]
    fn rib_stack_shadowing_reverts_on_pop() {
        let mut ribs = RibStack::new();
        let x = InternedSymbol::new("x");
        let outer = Res::Local(DefId::new(1));
        let inner = Res::Local(DefId::new(2));

        ribs.push(RibKind::Module(ModuleId::new(0)));
        ribs.push(RibKind::Function);
        ribs.bind(x, outer);

        ribs.push(RibKind::Block);
        ribs.bind(x, inner);
        assert_eq!(ribs.lookup(x), Some(RibLookup::Found(inner)));

        ribs.pop();
        assert_eq!(ribs.lookup(x), Some(RibLookup::Found(outer)));

        ribs.pop();
        assert_eq!(ribs.lookup(x), Some(RibLookup::Module(ModuleId::new(0))));
        assert_eq!(ribs.depth(), 1);
    }

    #[test]
    fn inner_blocks_shadow_outer_bindings() {
        use crate::frontend::ast::BinaryOperatorKind::Add;

        let (package, defs, resolutions, kinds) = resolve(|b| {
            vec![b.function("main").body(vec![
                b.let_("x", b.int(1)),
                b.semi(b.block_expr(vec![
                    b.let_("x", b.var("x")),
                    b.semi(b.binary(b.var("x"), Add, b.int(1))),
                ])),
                b.semi(b.var("x")),
            ])]
        });

        let paths = body_paths(&package, "main");
        let [init, inner_use, outer_use] = paths.as_slice() else {
            panic!("expected three paths, got {paths:?}");
        };

        let (_, outer_span) = local_name(&defs, &resolutions, *init);
        let (_, inner_span) = local_name(&defs, &resolutions, *inner_use);

        // The initializer of the inner `let` still refers to the outer `x`
        assert!(outer_span < inner_span);
        assert_eq!(local_name(&defs, &resolutions, *outer_use).1, outer_span);
        assert!(kinds.is_empty());
    }

    #[test]
    fn items_are_visible_before_their_declaration() {
        let (package, _, resolutions, kinds) = resolve(|b| {
            vec![
                b.function("main").body(vec![b.semi(b.call(b.var("later"), vec![]))]),
                b.function("later").body(vec![]),
            ]
        });

        let paths = body_paths(&package, "main");

        assert!(matches!(
            resolutions.get(paths[0]),
            Some(Res::Def(DefKind::Function, _))
        ));
        assert!(kinds.is_empty());
    }

    #[test]
    fn locals_are_not_visible_before_their_let() {
        let (_, _, _, kinds) = resolve(|b| {
            vec![b.function("main").body(vec![
                b.semi(b.var("y")),
                b.let_("y", b.int(2)),
            ])]
        });

        assert_eq!(kinds, vec![DiagnosticKind::UnresolvedName]);
    }

    #[test]
    fn duplicate_parameters_and_pattern_bindings_are_reported() {
        let (_, _, _, kinds) = resolve(|b| {
            vec![
                b.function("params")
                    .ordered_param("a", b.ty("i32"))
                    .param("a", b.ty("i32"))
                    .body(vec![]),
                b.function("patterns").body(vec![b.let_pattern(
                    b.pat_shorthand("Pair", vec![b.pat_bind("v"), b.pat_bind("v")]),
                    None,
                    None,
                )]),
            ]
        });

        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::DuplicateDefinition,
                DiagnosticKind::DuplicateDefinition
            ]
        );
    }

    #[test]
    fn user_items_shadow_primitive_names() {
        let (package, _, resolutions, kinds) = resolve(|b| {
            vec![
                b.structure("i64", &[], vec![]),
                b.function("main")
                    .ordered_param("a", b.ty("i64"))
                    .ordered_param("b", b.ty("i32"))
                    .body(vec![]),
            ]
        });

        let ItemKind::Function(function) = &package.items[1].kind else {
            unreachable!()
        };
        let type_res = |index: usize| {
            let Some(Type {
                kind: crate::frontend::ast::TypeKind::Path { path, .. },
                ..
            }) = &function.parameters[index].ty
            else {
                unreachable!()
            };
            resolutions.get(path.id)
        };

        assert!(matches!(type_res(0), Some(Res::Def(DefKind::Struct, _))));
        assert_eq!(
            type_res(1),
            Some(Res::Primitive(PrimitiveKind::Int(crate::middle::primitive::IntKind::I32)))
        );
        assert!(kinds.is_empty());
    }

    #[test]
    fn self_is_only_bound_inside_impls() {
        let (_, _, _, kinds) = resolve(|b| {
            vec![
                b.structure("Point", &[], vec![("x", b.ty("i32"))]),
                b.impl_block(
                    &[],
                    b.ty("Point"),
                    vec![
                        b.function("x")
                            .self_param()
                            .returns(b.ty("Self"))
                            .body(vec![b.bare(b.var("self"))]),
                        b.function("origin")
                            .body(vec![b.semi(b.call(b.var("Self::new"), vec![]))]),
                    ],
                ),
                b.function("free").self_param().body(vec![]),
            ]
        });

        assert_eq!(kinds, vec![DiagnosticKind::UnresolvedName]);
    }
}
