//! Runs the front half of the pipeline for unit tests of the later stages

use crate::{
    diagnostics::DiagnosticKind,
    frontend::ast::Package,
    middle::{
        ast_lowering::lower_package,
        def::{DefId, Definitions},
        hir,
        module_tree::{ModuleTree, build_module_tree},
        prelude::{LangItems, prelude_items},
        query::QueryEngine,
        resolve::resolve_package,
        simplify::simplify_package,
    },
    session::Session,
};

pub struct Lowered {
    pub session: Session,
    pub tree: ModuleTree,
    pub defs: Definitions,
    pub queries: QueryEngine,
    pub hir: hir::Package,
}

impl Lowered {
    /// Builds, resolves and lowers `package` without simplifying it
    pub fn new(package: &Package) -> Self {
        let session = Session::default();
        let queries = QueryEngine::new();
        let prelude = prelude_items(package.node_count);

        let (tree, mut defs) = build_module_tree(&session, package, &prelude);
        let resolutions = resolve_package(&session, &tree, &mut defs, &queries, package, &prelude);
        let lang_items = LangItems::collect(&tree, &defs).expect("the prelude declares Option");
        let hir = lower_package(&defs, &resolutions, lang_items, package, &prelude);

        Self {
            session,
            tree,
            defs,
            queries,
            hir,
        }
    }

    pub fn simplified(package: &Package) -> Self {
        let mut lowered = Self::new(package);
        simplify_package(&lowered.session, &mut lowered.defs, &mut lowered.hir);
        lowered
    }

    /// The definition of the item at `path` below the package root
    pub fn def(&self, path: &str) -> DefId {
        let root = self.defs.name(self.tree.modules[self.tree.root].def);
        let qualified = format!("{root}::{path}");

        self.defs
            .iter()
            .find(|(def, _)| self.defs.qualified_name(*def) == qualified)
            .map(|(def, _)| def)
            .unwrap_or_else(|| panic!("no definition named `{qualified}`"))
    }

    pub fn body(&self, path: &str) -> &hir::Body {
        &self.hir.bodies[&self.def(path)]
    }

    pub fn diagnostic_kinds(self) -> Vec<DiagnosticKind> {
        self.session
            .into_diagnostics()
            .into_iter()
            .map(|d| d.kind)
            .collect()
    }
}
