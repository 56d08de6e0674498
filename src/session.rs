//! The compilation-unit context threaded through every stage

use clap::Args;
use parking_lot::Mutex;

use crate::{
    diagnostics::Diagnostic,
    middle::primitive::{FloatKind, IntKind},
};

/// Knobs a driver may expose on its command line with `#[command(flatten)]`
#[derive(Debug, Clone, Args)]
pub struct CompileOptions {
    /// Number of worker threads used to type check item bodies
    #[arg(long, short = 'j', default_value_t = 1)]
    pub jobs: usize,
    /// Width given to integer literals nothing else constrains
    #[arg(long, default_value_t = IntKind::I32)]
    pub default_integer: IntKind,
    /// Width given to float literals nothing else constrains
    #[arg(long, default_value_t = FloatKind::F64)]
    pub default_float: FloatKind,
    /// Lower checked bodies to MIR
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub emit_mir: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            default_integer: IntKind::I32,
            default_float: FloatKind::F64,
            emit_mir: true,
        }
    }
}

/// Shared state for one compilation. Dropped when the compilation finishes,
/// taking every cache hanging off it along.
#[derive(Debug, Default)]
pub struct Session {
    pub options: CompileOptions,
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl Session {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        tracing::debug!(kind = %diagnostic.kind, span = %diagnostic.primary, "{}", diagnostic.message);

        self.diagnostics.lock().push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.lock().len()
    }

    /// Every reported diagnostic ordered by source position. Workers report
    /// concurrently, so arrival order is not meaningful.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics.into_inner();
        diagnostics.sort_by(|a, b| {
            (a.primary, a.kind, &a.message).cmp(&(b.primary, b.kind, &b.message))
        });
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{diagnostics::DiagnosticKind, frontend::span::Span};

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        options: CompileOptions,
    }

    #[test]
    fn options_parse_from_a_command_line() {
        let cli = Cli::parse_from(["hastyc", "-j", "4", "--default-integer", "i64"]);

        assert_eq!(cli.options.jobs, 4);
        assert_eq!(cli.options.default_integer, IntKind::I64);
        assert_eq!(cli.options.default_float, FloatKind::F64);
        assert!(cli.options.emit_mir);
    }

    #[test]
    fn diagnostics_come_back_sorted_by_span() {
        let session = Session::default();

        session.report(Diagnostic::new(DiagnosticKind::TypeMismatch, Span::new(9, 10), "b"));
        session.report(Diagnostic::new(DiagnosticKind::UnresolvedName, Span::new(2, 3), "a"));

        let kinds = session
            .into_diagnostics()
            .into_iter()
            .map(|d| d.kind)
            .collect::<Vec<_>>();

        assert_eq!(
            kinds,
            vec![DiagnosticKind::UnresolvedName, DiagnosticKind::TypeMismatch]
        );
    }
}
