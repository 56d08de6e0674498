//! `hastyc` compiles the syntax tree of a Hasty package into MIR.
//!
//! The pipeline builds the module tree, resolves every path, lowers the
//! syntax tree to HIR, removes sugar, type checks every body on demand
//! through the query engine and finally lowers the checked bodies to MIR.
//! Recoverable errors are collected as [`Diagnostic`]s and never stop
//! unrelated items from compiling.

use thiserror::Error;

use crate::{
    diagnostics::Diagnostic,
    frontend::ast::Package,
    middle::{
        ast_lowering::lower_package,
        def::Definitions,
        mir::{
            self,
            hir_lowering::{LoweringError, lower_program},
            pretty_print::render_program,
        },
        module_tree::{build_module_tree, unused_imports},
        prelude::{LangItems, prelude_items},
        query::QueryEngine,
        resolve::resolve_package,
        simplify::simplify_package,
        type_check::{TypeContext, check_package},
    },
    session::{CompileOptions, Session},
};

pub mod diagnostics;
pub mod frontend;
pub mod index;
pub mod middle;
pub mod session;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("internal compiler error while lowering to MIR: {0}")]
    Lowering(#[from] LoweringError),
    #[error("failed to start the type checking thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("the prelude does not declare an `Option` enum")]
    MissingLangItems,
}

#[derive(Debug)]
pub struct CompileOutput {
    pub definitions: Definitions,
    /// `None` when MIR emission is turned off
    pub mir: Option<mir::Program>,
    pub diagnostics: Vec<Diagnostic>,
    /// Imports no path ever went through
    pub unused_imports: usize,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// The MIR of every lowered body, colored for a terminal
    pub fn mir_listing(&self) -> Option<String> {
        self.mir
            .as_ref()
            .map(|program| render_program(program, &self.definitions))
    }
}

/// Compiles `package` from its syntax tree down to MIR
#[tracing::instrument(level = "debug", skip_all, fields(package = ?package.name.map(|name| name.value())))]
pub fn compile(package: &Package, options: CompileOptions) -> Result<CompileOutput, CompileError> {
    let session = Session::new(options);
    let queries = QueryEngine::new();
    let prelude = prelude_items(package.node_count);

    let (tree, mut defs) = build_module_tree(&session, package, &prelude);
    let resolutions = resolve_package(&session, &tree, &mut defs, &queries, package, &prelude);
    let lang_items = LangItems::collect(&tree, &defs).ok_or(CompileError::MissingLangItems)?;

    let mut hir = lower_package(&defs, &resolutions, lang_items, package, &prelude);
    simplify_package(&session, &mut defs, &mut hir);

    let mir = {
        let cx = TypeContext {
            session: &session,
            defs: &defs,
            hir: &hir,
            queries: &queries,
        };

        let results = check_package(&cx)?;

        if session.options.emit_mir {
            Some(lower_program(&cx, &results)?)
        } else {
            None
        }
    };

    let unused_imports = unused_imports(&tree, &queries).len();
    let diagnostics = session.into_diagnostics();

    tracing::debug!(
        diagnostics = diagnostics.len(),
        bodies = mir.as_ref().map_or(0, |program| program.bodies.len()),
        "compiled package"
    );

    Ok(CompileOutput {
        definitions: defs,
        mir,
        diagnostics,
        unused_imports,
    })
}
