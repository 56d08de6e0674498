//! The namespace graph of a package.
//!
//! Every `module` item becomes a node in an arena addressed by [`ModuleId`];
//! a node knows its parent by index and its children only by name through its
//! bindings. Import declarations are flattened into [`ImportDirective`]s and
//! recorded as bindings without being looked at: an import is resolved (and
//! its errors reported) the first time a lookup walks through it, via the
//! `resolve_import` query.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use crate::{
    diagnostics::diagnostic,
    frontend::{
        ast::{self, ImportTree, ImportTreeKind, Item, ItemKind, NodeId},
        intern::{InternedSymbol, kw},
        span::Span,
    },
    index::{Index, IndexVec, simple_index},
    middle::{
        def::{DefId, DefKind, DefVisibility, Definition, Definitions},
        query::{Query, QueryEngine, QueryKey, ResolveImport},
    },
    session::Session,
};

simple_index! {
    /// Identifies a node in the module tree
    pub struct ModuleId;
}

simple_index! {
    /// Identifies one flattened import directive
    pub struct ImportId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Def(DefId),
    Import(ImportId),
}

#[derive(Debug, Clone, Copy)]
pub struct NameBinding {
    pub kind: BindingKind,
    pub visibility: DefVisibility,
    pub span: Span,
}

#[derive(Debug)]
pub struct ModuleData {
    pub def: DefId,
    pub name: InternedSymbol,
    pub parent: Option<ModuleId>,
    /// Items and single imports declared directly in this module. Types and
    /// values share one namespace.
    pub bindings: BTreeMap<InternedSymbol, NameBinding>,
    pub globs: Vec<ImportId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Single { binding: InternedSymbol },
    Glob,
}

#[derive(Debug)]
pub struct ImportDirective {
    pub module: ModuleId,
    pub node: NodeId,
    pub path: Vec<(InternedSymbol, Span)>,
    pub kind: ImportKind,
    pub visibility: DefVisibility,
    pub span: Span,
}

#[derive(Debug)]
pub struct ModuleTree {
    pub modules: IndexVec<ModuleId, ModuleData>,
    pub imports: IndexVec<ImportId, ImportDirective>,
    pub root: ModuleId,
    /// Built in items consulted after every other scope
    pub prelude: ModuleId,
    /// Detached scripts have no package and therefore no `pkg` root
    pub has_package: bool,
    def_to_module: HashMap<DefId, ModuleId>,
    variants: HashMap<DefId, BTreeMap<InternedSymbol, DefId>>,
}

impl ModuleTree {
    pub fn module_of_def(&self, def: DefId) -> Option<ModuleId> {
        self.def_to_module.get(&def).copied()
    }

    pub fn variant(&self, enum_def: DefId, name: InternedSymbol) -> Option<DefId> {
        self.variants.get(&enum_def)?.get(&name).copied()
    }

    /// Whether `module` is `ancestor` or nested somewhere inside it
    pub fn is_descendant(&self, module: ModuleId, ancestor: ModuleId) -> bool {
        let mut current = Some(module);

        while let Some(m) = current {
            if m == ancestor {
                return true;
            }
            current = self.modules[m].parent;
        }

        false
    }
}

/// Builds the module tree for `package`, with `prelude` items placed in a
/// detached module of their own
#[tracing::instrument(level = "debug", skip_all, fields(items = package.items.len()))]
pub fn build_module_tree(
    session: &Session,
    package: &ast::Package,
    prelude: &[Item],
) -> (ModuleTree, Definitions) {
    let mut builder = ModuleTreeBuilder {
        session,
        defs: Definitions::default(),
        modules: IndexVec::new(),
        imports: IndexVec::new(),
        def_to_module: HashMap::new(),
        variants: HashMap::new(),
    };

    let root_name = package
        .name
        .unwrap_or_else(|| InternedSymbol::new("<script>"));
    let root = builder.create_module(None, root_name, package.span, None);
    builder.collect_items(root, &package.items);

    let prelude_module =
        builder.create_module(None, InternedSymbol::new("<prelude>"), Span::DUMMY, None);
    builder.collect_items(prelude_module, prelude);

    tracing::debug!(
        modules = builder.modules.len(),
        imports = builder.imports.len(),
        "built module tree"
    );

    let tree = ModuleTree {
        modules: builder.modules,
        imports: builder.imports,
        root,
        prelude: prelude_module,
        has_package: package.name.is_some(),
        def_to_module: builder.def_to_module,
        variants: builder.variants,
    };

    (tree, builder.defs)
}

struct ModuleTreeBuilder<'a> {
    session: &'a Session,
    defs: Definitions,
    modules: IndexVec<ModuleId, ModuleData>,
    imports: IndexVec<ImportId, ImportDirective>,
    def_to_module: HashMap<DefId, ModuleId>,
    variants: HashMap<DefId, BTreeMap<InternedSymbol, DefId>>,
}

impl ModuleTreeBuilder<'_> {
    fn create_module(
        &mut self,
        node: Option<NodeId>,
        name: InternedSymbol,
        span: Span,
        parent: Option<ModuleId>,
    ) -> ModuleId {
        let def = self.defs.create(
            node,
            Definition {
                kind: DefKind::Module,
                name,
                parent: parent.map(|p| self.modules[p].def),
                span,
                visibility: DefVisibility::Public,
            },
        );

        let id = self.modules.push(ModuleData {
            def,
            name,
            parent,
            bindings: BTreeMap::new(),
            globs: Vec::new(),
        });
        self.def_to_module.insert(def, id);
        id
    }

    fn create_def(
        &mut self,
        node: NodeId,
        kind: DefKind,
        name: InternedSymbol,
        parent: DefId,
        span: Span,
        visibility: DefVisibility,
    ) -> DefId {
        self.defs.create(
            Some(node),
            Definition {
                kind,
                name,
                parent: Some(parent),
                span,
                visibility,
            },
        )
    }

    /// Adds `name` to the module's namespace. The first binding of a name
    /// wins; later ones are reported and dropped.
    fn bind(&mut self, module: ModuleId, name: InternedSymbol, binding: NameBinding) {
        let bindings = &mut self.modules[module].bindings;

        if let Some(existing) = bindings.get(&name) {
            self.session.report(
                diagnostic!(
                    DuplicateDefinition,
                    binding.span,
                    "the name `{name}` is defined multiple times"
                )
                .with_secondary(existing.span, format!("previous definition of `{name}` here")),
            );
            return;
        }

        bindings.insert(name, binding);
    }

    fn collect_items(&mut self, module: ModuleId, items: &[Item]) {
        let module_def = self.modules[module].def;

        for item in items {
            let visibility = match item.visibility {
                ast::Visibility::Public => DefVisibility::Public,
                ast::Visibility::Inherited => DefVisibility::Module,
            };

            match &item.kind {
                ItemKind::Module(definition) => {
                    let child = self.create_module(
                        Some(item.id),
                        definition.name.symbol,
                        item.span,
                        Some(module),
                    );
                    let def = self.modules[child].def;
                    self.bind_def(module, &definition.name, def, visibility);
                    self.collect_items(child, &definition.items);
                }
                ItemKind::Import(tree) => {
                    self.collect_import_tree(module, tree, &[], visibility);
                }
                ItemKind::Function(function) => {
                    let def = self.create_def(
                        item.id,
                        DefKind::Function,
                        function.name.symbol,
                        module_def,
                        item.span,
                        visibility,
                    );
                    self.create_generics(def, &function.generics);
                    self.bind_def(module, &function.name, def, visibility);
                }
                ItemKind::Struct(definition) => {
                    let def = self.create_def(
                        item.id,
                        DefKind::Struct,
                        definition.name.symbol,
                        module_def,
                        item.span,
                        visibility,
                    );
                    self.create_generics(def, &definition.generics);

                    let mut seen = HashMap::new();
                    for field in &definition.fields {
                        if let Some(previous) = seen.insert(field.name.symbol, field.span) {
                            self.session.report(
                                diagnostic!(
                                    DuplicateDefinition,
                                    field.span,
                                    "field `{}` is already declared",
                                    field.name.symbol
                                )
                                .with_secondary(previous, "first declared here"),
                            );
                        }

                        let field_visibility = match field.visibility {
                            ast::Visibility::Public => DefVisibility::Public,
                            ast::Visibility::Inherited => DefVisibility::Module,
                        };
                        self.create_def(
                            field.id,
                            DefKind::Field,
                            field.name.symbol,
                            def,
                            field.span,
                            field_visibility,
                        );
                    }

                    self.bind_def(module, &definition.name, def, visibility);
                }
                ItemKind::Enum(definition) => {
                    let def = self.create_def(
                        item.id,
                        DefKind::Enum,
                        definition.name.symbol,
                        module_def,
                        item.span,
                        visibility,
                    );
                    self.create_generics(def, &definition.generics);

                    let mut variants = BTreeMap::new();
                    for variant in &definition.variants {
                        let variant_def = self.create_def(
                            variant.id,
                            DefKind::Variant,
                            variant.name.symbol,
                            def,
                            variant.span,
                            DefVisibility::Public,
                        );

                        if variants.contains_key(&variant.name.symbol) {
                            self.session.report(diagnostic!(
                                DuplicateDefinition,
                                variant.span,
                                "variant `{}` is already declared",
                                variant.name.symbol
                            ));
                            continue;
                        }

                        variants.insert(variant.name.symbol, variant_def);
                    }
                    self.variants.insert(def, variants);

                    self.bind_def(module, &definition.name, def, visibility);
                }
                ItemKind::Trait(definition) => {
                    let def = self.create_def(
                        item.id,
                        DefKind::Trait,
                        definition.name.symbol,
                        module_def,
                        item.span,
                        visibility,
                    );
                    self.collect_associated_functions(def, &definition.items);
                    self.bind_def(module, &definition.name, def, visibility);
                }
                ItemKind::Impl(block) => {
                    let def = self.create_def(
                        item.id,
                        DefKind::Impl,
                        InternedSymbol::new("<impl>"),
                        module_def,
                        item.span,
                        DefVisibility::Module,
                    );
                    self.create_generics(def, &block.generics);
                    self.collect_associated_functions(def, &block.items);
                }
                ItemKind::Const(definition) => {
                    let def = self.create_def(
                        item.id,
                        DefKind::Const,
                        definition.name.symbol,
                        module_def,
                        item.span,
                        visibility,
                    );
                    self.bind_def(module, &definition.name, def, visibility);
                }
            }
        }
    }

    fn bind_def(
        &mut self,
        module: ModuleId,
        name: &ast::Identifier,
        def: DefId,
        visibility: DefVisibility,
    ) {
        self.bind(
            module,
            name.symbol,
            NameBinding {
                kind: BindingKind::Def(def),
                visibility,
                span: name.span,
            },
        );
    }

    fn create_generics(&mut self, owner: DefId, generics: &[ast::GenericParameter]) {
        for parameter in generics {
            self.create_def(
                parameter.id,
                DefKind::GenericParam,
                parameter.name.symbol,
                owner,
                parameter.span,
                DefVisibility::Module,
            );
        }
    }

    fn collect_associated_functions(&mut self, owner: DefId, items: &[Item]) {
        for item in items {
            let ItemKind::Function(function) = &item.kind else {
                self.session.report(diagnostic!(
                    InvalidItem,
                    item.span,
                    "only functions may appear inside impl and trait blocks"
                ));
                continue;
            };

            let visibility = match item.visibility {
                ast::Visibility::Public => DefVisibility::Public,
                ast::Visibility::Inherited => DefVisibility::Module,
            };

            let def = self.create_def(
                item.id,
                DefKind::Method,
                function.name.symbol,
                owner,
                item.span,
                visibility,
            );
            self.create_generics(def, &function.generics);
        }
    }

    /// Flattens one (possibly nested) import tree into directives
    fn collect_import_tree(
        &mut self,
        module: ModuleId,
        tree: &ImportTree,
        prefix: &[(InternedSymbol, Span)],
        visibility: DefVisibility,
    ) {
        let mut path = prefix.to_vec();
        path.extend(tree.prefix.segments.iter().map(|s| (s.symbol, s.span)));

        match &tree.kind {
            ImportTreeKind::Nested(children) => {
                for child in children {
                    self.collect_import_tree(module, child, &path, visibility);
                }
            }
            ImportTreeKind::Glob => {
                let id = self.imports.push(ImportDirective {
                    module,
                    node: tree.id,
                    path,
                    kind: ImportKind::Glob,
                    visibility,
                    span: tree.span,
                });
                self.modules[module].globs.push(id);
            }
            ImportTreeKind::Simple { rename } => {
                // `a::{self}` imports `a` itself
                if path.last().is_some_and(|(s, _)| *s == *kw::SELF_VALUE) && path.len() > 1 {
                    path.pop();
                }

                let Some(&(last, last_span)) = path.last() else {
                    self.session.report(diagnostic!(
                        PathError,
                        tree.span,
                        "import path must name at least one item"
                    ));
                    return;
                };

                let (binding, span) = match rename {
                    Some(rename) => (rename.symbol, rename.span),
                    None => (last, last_span),
                };

                if [*kw::SUPER, *kw::PACKAGE, *kw::SELF_VALUE].contains(&binding) {
                    self.session.report(diagnostic!(
                        PathError,
                        tree.span,
                        "`{binding}` cannot be imported without a name; add `as <name>`"
                    ));
                    return;
                }

                let id = self.imports.push(ImportDirective {
                    module,
                    node: tree.id,
                    path,
                    kind: ImportKind::Single { binding },
                    visibility,
                    span: tree.span,
                });

                self.bind(
                    module,
                    binding,
                    NameBinding {
                        kind: BindingKind::Import(id),
                        visibility,
                        span,
                    },
                );
            }
        }
    }
}

/// Everything path resolution needs to read
#[derive(Debug, Clone, Copy)]
pub struct PathCx<'a> {
    pub session: &'a Session,
    pub tree: &'a ModuleTree,
    pub defs: &'a Definitions,
    pub queries: &'a QueryEngine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    /// Already reported by whoever produced it
    Failed,
    Private(DefId),
    Ambiguous(DefId, DefId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathResolution {
    Def(DefId),
    /// `Type::name` where `Type` is not a namespace of its own; resolved
    /// against the type's members during type checking
    TypeRelative { base: DefId, name: InternedSymbol },
    /// An error has been reported
    Failed,
}

impl<'a> PathCx<'a> {
    fn import_target(&self, import: ImportId) -> Result<Option<DefId>, QueryKey> {
        self.queries
            .get(self, ResolveImport(import))
            .map_err(|cycle| cycle.key)
    }

    fn binding_visible(&self, binding: &NameBinding, owner: ModuleId, from: ModuleId) -> bool {
        binding.visibility == DefVisibility::Public || self.tree.is_descendant(from, owner)
    }

    /// Resolves a single import binding, reporting a cycle at most once
    fn follow_import(&self, import: ImportId) -> Result<DefId, LookupError> {
        match self.import_target(import) {
            Ok(Some(def)) => Ok(def),
            Ok(None) => Err(LookupError::Failed),
            Err(key) => {
                if self.queries.first_cycle_report(key) {
                    let directive = &self.tree.imports[import];
                    self.session.report(diagnostic!(
                        CyclicImport,
                        directive.span,
                        "import of `{}` depends on itself",
                        directive.path.iter().map(|(s, _)| s.value()).join("::")
                    ));
                }
                Err(LookupError::Failed)
            }
        }
    }

    /// Looks `name` up among the bindings of `module` as seen from `from`
    pub fn lookup_in_module(
        &self,
        module: ModuleId,
        name: InternedSymbol,
        from: ModuleId,
    ) -> Result<Option<DefId>, LookupError> {
        let data = &self.tree.modules[module];

        if let Some(binding) = data.bindings.get(&name) {
            let def = match binding.kind {
                BindingKind::Def(def) => def,
                BindingKind::Import(import) => self.follow_import(import)?,
            };

            if !self.binding_visible(binding, module, from) {
                return Err(LookupError::Private(def));
            }

            return Ok(Some(def));
        }

        let mut candidates = Vec::new();

        for glob in &data.globs {
            if self.tree.imports[*glob].visibility != DefVisibility::Public
                && !self.tree.is_descendant(from, module)
            {
                continue;
            }

            // A glob can't provide the names needed to resolve its own path,
            // so a cycle here just means it contributes nothing
            let Ok(Some(target)) = self.import_target(*glob) else {
                continue;
            };

            if let Some(def) = self.glob_candidate(target, name)
                && !candidates.contains(&def)
            {
                candidates.push(def);
            }
        }

        match candidates.as_slice() {
            [] => Ok(None),
            [def] => Ok(Some(*def)),
            [first, second, ..] => Err(LookupError::Ambiguous(*first, *second)),
        }
    }

    /// The public, explicitly bound item `name` of a glob import target
    fn glob_candidate(&self, target: DefId, name: InternedSymbol) -> Option<DefId> {
        if self.defs.kind(target) == DefKind::Enum {
            return self.tree.variant(target, name);
        }

        let module = self.tree.module_of_def(target)?;
        let binding = self.tree.modules[module].bindings.get(&name)?;

        if binding.visibility != DefVisibility::Public {
            return None;
        }

        match binding.kind {
            BindingKind::Def(def) => Some(def),
            BindingKind::Import(import) => self.follow_import(import).ok(),
        }
    }

    /// Lexical lookup of an unqualified name: the module itself, then the
    /// package root, then the prelude
    pub fn lookup_in_scope(
        &self,
        module: ModuleId,
        name: InternedSymbol,
    ) -> Result<Option<DefId>, LookupError> {
        if let Some(def) = self.lookup_in_module(module, name, module)? {
            return Ok(Some(def));
        }

        if module != self.tree.root
            && let Some(def) = self.lookup_in_module(self.tree.root, name, module)?
        {
            return Ok(Some(def));
        }

        self.lookup_in_module(self.tree.prelude, name, module)
    }

    pub fn report_lookup_error(&self, error: LookupError, name: InternedSymbol, span: Span) {
        match error {
            LookupError::Failed => {}
            LookupError::Private(def) => self.session.report(
                diagnostic!(PrivateItem, span, "{} `{name}` is private", self.defs.kind(def))
                    .with_secondary(self.defs.span(def), "defined here"),
            ),
            LookupError::Ambiguous(first, second) => self.session.report(
                diagnostic!(AmbiguousName, span, "`{name}` is ambiguous")
                    .with_secondary(
                        self.defs.span(first),
                        format!("could refer to `{}`", self.defs.qualified_name(first)),
                    )
                    .with_secondary(
                        self.defs.span(second),
                        format!("could also refer to `{}`", self.defs.qualified_name(second)),
                    ),
            ),
        }
    }

    /// Resolves a (possibly qualified) path starting from `from`. Errors are
    /// reported here; callers only see [`PathResolution::Failed`].
    pub fn resolve_path(
        &self,
        from: ModuleId,
        segments: &[(InternedSymbol, Span)],
    ) -> PathResolution {
        let Some(&(first, first_span)) = segments.first() else {
            return PathResolution::Failed;
        };

        let mut rest = &segments[1..];

        let mut current = if first == *kw::PACKAGE {
            if !self.tree.has_package {
                self.session.report(diagnostic!(
                    PathError,
                    first_span,
                    "`pkg` used outside of a package"
                ));
                return PathResolution::Failed;
            }
            self.tree.modules[self.tree.root].def
        } else if first == *kw::SUPER {
            let mut module = from;
            let mut remaining = segments;

            while let Some(&(segment, span)) = remaining.first()
                && segment == *kw::SUPER
            {
                let Some(parent) = self.tree.modules[module].parent else {
                    self.session.report(diagnostic!(
                        PathError,
                        span,
                        "`super` goes beyond the root of the package"
                    ));
                    return PathResolution::Failed;
                };

                module = parent;
                remaining = &remaining[1..];
            }

            rest = remaining;
            self.tree.modules[module].def
        } else if first == *kw::SELF_VALUE {
            self.tree.modules[from].def
        } else {
            match self.lookup_in_scope(from, first) {
                Ok(Some(def)) => def,
                Ok(None) => {
                    self.session.report(diagnostic!(
                        UnresolvedName,
                        first_span,
                        "cannot find `{first}` in this scope"
                    ));
                    return PathResolution::Failed;
                }
                Err(error) => {
                    self.report_lookup_error(error, first, first_span);
                    return PathResolution::Failed;
                }
            }
        };

        for (index, &(segment, span)) in rest.iter().enumerate() {
            if [*kw::SUPER, *kw::PACKAGE, *kw::SELF_VALUE].contains(&segment) {
                self.session.report(diagnostic!(
                    PathError,
                    span,
                    "`{segment}` may only appear at the start of a path"
                ));
                return PathResolution::Failed;
            }

            let is_last = index == rest.len() - 1;

            current = match self.defs.kind(current) {
                DefKind::Module => {
                    let Some(module) = self.tree.module_of_def(current) else {
                        unreachable!("every module definition has a module tree node")
                    };

                    match self.lookup_in_module(module, segment, from) {
                        Ok(Some(def)) => def,
                        Ok(None) => {
                            self.session.report(diagnostic!(
                                PathError,
                                span,
                                "cannot find `{segment}` in module `{}`",
                                self.defs.qualified_name(current)
                            ));
                            return PathResolution::Failed;
                        }
                        Err(error) => {
                            self.report_lookup_error(error, segment, span);
                            return PathResolution::Failed;
                        }
                    }
                }
                DefKind::Enum => match self.tree.variant(current, segment) {
                    Some(variant) => variant,
                    None if is_last => {
                        return PathResolution::TypeRelative {
                            base: current,
                            name: segment,
                        };
                    }
                    None => {
                        self.session.report(diagnostic!(
                            UnknownMember,
                            span,
                            "no variant `{segment}` in enum `{}`",
                            self.defs.name(current)
                        ));
                        return PathResolution::Failed;
                    }
                },
                DefKind::Struct | DefKind::Trait if is_last => {
                    return PathResolution::TypeRelative {
                        base: current,
                        name: segment,
                    };
                }
                kind => {
                    self.session.report(diagnostic!(
                        PathError,
                        span,
                        "expected a module but `{}` is a {kind}",
                        self.defs.name(current)
                    ));
                    return PathResolution::Failed;
                }
            };
        }

        PathResolution::Def(current)
    }
}

impl Query<PathCx<'_>> for ResolveImport {
    fn execute(self, cx: &PathCx<'_>) -> Option<DefId> {
        let directive = &cx.tree.imports[self.0];

        tracing::trace!(import = self.0.index(), "resolving import");

        match cx.resolve_path(directive.module, &directive.path) {
            PathResolution::Def(def) => {
                if directive.kind == ImportKind::Glob
                    && !matches!(cx.defs.kind(def), DefKind::Module | DefKind::Enum)
                {
                    cx.session.report(diagnostic!(
                        PathError,
                        directive.span,
                        "cannot glob-import from {} `{}`",
                        cx.defs.kind(def),
                        cx.defs.name(def)
                    ));
                    return None;
                }

                Some(def)
            }
            PathResolution::TypeRelative { base, name } => {
                cx.session.report(diagnostic!(
                    PathError,
                    directive.span,
                    "cannot import `{name}` from `{}`; only modules and enums can be imported from",
                    cx.defs.name(base)
                ));
                None
            }
            PathResolution::Failed => None,
        }
    }
}

/// Imports nobody looked through. They are never validated.
pub fn unused_imports(tree: &ModuleTree, queries: &QueryEngine) -> Vec<ImportId> {
    let used = tree
        .imports
        .indices()
        .filter(|id| queries.execution_count(ResolveImport(*id)) > 0)
        .collect::<HashSet<_>>();

    tree.imports
        .indices()
        .filter(|id| !used.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{diagnostics::DiagnosticKind, frontend::ast::build::AstBuilder};

    struct Fixture {
        session: Session,
        tree: ModuleTree,
        defs: Definitions,
        queries: QueryEngine,
    }

    impl Fixture {
        fn new(name: Option<&str>, items: impl FnOnce(&AstBuilder) -> Vec<Item>) -> Self {
            let b = AstBuilder::new();
            let items = items(&b);
            let package = b.package(name, items);
            let session = Session::default();
            let (tree, defs) = build_module_tree(&session, &package, &[]);

            Self {
                session,
                tree,
                defs,
                queries: QueryEngine::new(),
            }
        }

        fn cx(&self) -> PathCx<'_> {
            PathCx {
                session: &self.session,
                tree: &self.tree,
                defs: &self.defs,
                queries: &self.queries,
            }
        }

        fn module(&self, name: &str) -> ModuleId {
            self.tree
                .modules
                .iter_enumerated()
                .find(|(_, m)| m.name.value() == name)
                .map(|(id, _)| id)
                .unwrap()
        }

        fn resolve(&self, from: ModuleId, path: &str) -> Option<String> {
            let segments = path
                .split("::")
                .map(|s| (InternedSymbol::new(s), Span::DUMMY))
                .collect::<Vec<_>>();

            match self.cx().resolve_path(from, &segments) {
                PathResolution::Def(def) => Some(self.defs.qualified_name(def)),
                PathResolution::TypeRelative { base, name } => {
                    Some(format!("<{}>::{name}", self.defs.qualified_name(base)))
                }
                PathResolution::Failed => None,
            }
        }

        fn diagnostic_kinds(self) -> Vec<DiagnosticKind> {
            self.session
                .into_diagnostics()
                .into_iter()
                .map(|d| d.kind)
                .collect()
        }
    }

    fn function(b: &AstBuilder, name: &str) -> Item {
        b.function(name).public().body(vec![])
    }

    #[test]
    fn only_functions_are_collected_from_impl_blocks() {
        let fixture = Fixture::new(Some("app"), |b| {
            vec![
                b.structure("Point", &[], vec![]),
                b.impl_block(
                    &[],
                    b.ty("Point"),
                    vec![
                        b.function("origin").body(vec![]),
                        b.structure("Nested", &[], vec![]),
                    ],
                ),
            ]
        });

        let names = fixture
            .defs
            .iter()
            .map(|(def, _)| fixture.defs.qualified_name(def))
            .collect::<Vec<_>>();

        assert!(names.contains(&"app::origin".to_string()));
        assert!(!names.iter().any(|name| name.ends_with("Nested")));
        assert_eq!(fixture.diagnostic_kinds(), vec![DiagnosticKind::InvalidItem]);
    }

    #[test]
    fn paths_walk_modules_relative_and_absolute() {
        let fixture = Fixture::new(Some("app"), |b| {
            vec![
                b.module(
                    "a",
                    vec![b.public(b.module("inner", vec![function(b, "deep")]))],
                ),
                b.module("b", vec![function(b, "shallow")]),
            ]
        });
        let inner = fixture.module("inner");

        assert_eq!(fixture.resolve(inner, "super::super::b::shallow").as_deref(), Some("app::b::shallow"));
        assert_eq!(fixture.resolve(inner, "pkg::a::inner::deep").as_deref(), Some("app::a::inner::deep"));
        assert_eq!(fixture.resolve(inner, "self::deep").as_deref(), Some("app::a::inner::deep"));
        assert_eq!(fixture.resolve(inner, "a::inner::deep").as_deref(), Some("app::a::inner::deep"));
        assert!(fixture.diagnostic_kinds().is_empty());
    }

    #[test]
    fn super_beyond_root_is_a_path_error() {
        let fixture = Fixture::new(Some("app"), |b| vec![b.module("a", vec![])]);
        let a = fixture.module("a");

        assert_eq!(fixture.resolve(a, "super::super::x"), None);
        assert_eq!(fixture.diagnostic_kinds(), vec![DiagnosticKind::PathError]);
    }

    #[test]
    fn pkg_in_a_script_is_a_path_error() {
        let fixture = Fixture::new(None, |b| vec![function(b, "main")]);

        assert_eq!(fixture.resolve(fixture.tree.root, "pkg::main"), None);
        assert_eq!(fixture.diagnostic_kinds(), vec![DiagnosticKind::PathError]);
    }

    #[test]
    fn duplicate_items_keep_the_first_definition() {
        let fixture = Fixture::new(Some("app"), |b| {
            vec![
                function(b, "twice"),
                b.structure("twice", &[], vec![]),
                function(b, "other"),
            ]
        });

        let twice = fixture.cx().lookup_in_scope(fixture.tree.root, InternedSymbol::new("twice"));
        let def = twice.unwrap().unwrap();

        assert_eq!(fixture.defs.kind(def), DefKind::Function);
        assert!(fixture.resolve(fixture.tree.root, "other").is_some());
        assert_eq!(
            fixture.diagnostic_kinds(),
            vec![DiagnosticKind::DuplicateDefinition]
        );
    }

    #[test]
    fn imports_are_validated_only_when_used() {
        let fixture = Fixture::new(Some("app"), |b| {
            vec![
                b.module("a", vec![]),
                b.import("a::b"),
                b.import("a::unused"),
            ]
        });
        let root = fixture.tree.root;

        assert_eq!(fixture.session.error_count(), 0);

        assert_eq!(fixture.resolve(root, "b::something"), None);
        assert_eq!(fixture.resolve(root, "b::something_else"), None);

        assert_eq!(
            unused_imports(&fixture.tree, &fixture.queries),
            vec![ImportId::new(1)]
        );
        assert_eq!(fixture.diagnostic_kinds(), vec![DiagnosticKind::PathError]);
    }

    #[test]
    fn nested_import_trees_bind_each_leaf() {
        let fixture = Fixture::new(Some("app"), |b| {
            vec![
                b.public(b.module(
                    "shapes",
                    vec![
                        function(b, "circle"),
                        b.public(b.module("solid", vec![function(b, "cube")])),
                    ],
                )),
                b.module(
                    "user",
                    vec![b.import_item(b.import_tree_nested(
                        "pkg::shapes",
                        vec![
                            b.import_tree_as("circle", "round"),
                            b.import_tree_nested(
                                "solid",
                                vec![b.import_tree("self"), b.import_tree("cube")],
                            ),
                        ],
                    ))],
                ),
            ]
        });
        let user = fixture.module("user");

        assert_eq!(fixture.resolve(user, "round").as_deref(), Some("app::shapes::circle"));
        assert_eq!(fixture.resolve(user, "solid::cube").as_deref(), Some("app::shapes::solid::cube"));
        assert_eq!(fixture.resolve(user, "cube").as_deref(), Some("app::shapes::solid::cube"));
        assert!(fixture.diagnostic_kinds().is_empty());
    }

    #[test]
    fn import_cycles_are_reported_once() {
        let fixture = Fixture::new(Some("app"), |b| {
            vec![b.import_as("self::x", "y"), b.import_as("self::y", "x")]
        });
        let root = fixture.tree.root;

        assert_eq!(fixture.resolve(root, "x"), None);
        assert_eq!(fixture.resolve(root, "y"), None);
        assert_eq!(fixture.diagnostic_kinds(), vec![DiagnosticKind::CyclicImport]);
    }

    #[test]
    fn conflicting_globs_are_ambiguous() {
        let fixture = Fixture::new(Some("app"), |b| {
            vec![
                b.module("left", vec![function(b, "shared"), function(b, "only_left")]),
                b.module("right", vec![function(b, "shared")]),
                b.module(
                    "user",
                    vec![b.import_glob("pkg::left"), b.import_glob("pkg::right")],
                ),
            ]
        });
        let user = fixture.module("user");

        assert_eq!(fixture.resolve(user, "only_left").as_deref(), Some("app::left::only_left"));
        assert_eq!(fixture.resolve(user, "shared"), None);
        assert_eq!(fixture.diagnostic_kinds(), vec![DiagnosticKind::AmbiguousName]);
    }

    #[test]
    fn private_items_are_hidden_from_other_modules() {
        let fixture = Fixture::new(Some("app"), |b| {
            vec![
                b.module(
                    "vault",
                    vec![b.function("secret").body(vec![]), b.module("nested", vec![])],
                ),
                b.module("outsider", vec![]),
            ]
        });

        assert_eq!(fixture.resolve(fixture.module("outsider"), "pkg::vault::secret"), None);
        assert_eq!(
            fixture.resolve(fixture.module("nested"), "super::secret").as_deref(),
            Some("app::vault::secret")
        );
        assert_eq!(fixture.diagnostic_kinds(), vec![DiagnosticKind::PrivateItem]);
    }

    #[test]
    fn enum_paths_reach_variants_and_associated_items() {
        let fixture = Fixture::new(Some("app"), |b| {
            vec![b.enumeration("Color", &[], vec![("Red", vec![]), ("Green", vec![])])]
        });
        let root = fixture.tree.root;

        assert_eq!(fixture.resolve(root, "Color::Red").as_deref(), Some("app::Color::Red"));
        assert_eq!(fixture.resolve(root, "Color::parse").as_deref(), Some("<app::Color>::parse"));
        assert!(fixture.diagnostic_kinds().is_empty());
    }
}
