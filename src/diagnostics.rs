//! Recoverable errors reported while compiling a package. Diagnostics are
//! collected for the whole compilation unit and returned together once every
//! stage has run.

use colored::Colorize;
use strum::{Display, EnumIter};

use crate::frontend::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum DiagnosticKind {
    /// Malformed `super`/`pkg` traversal or a path through a missing module
    PathError,
    UnresolvedName,
    AmbiguousName,
    DuplicateDefinition,
    CyclicImport,
    CyclicDependency,
    InvalidSetterSignature,
    TypeMismatch,
    NoMatchingOperator,
    /// An item was named from a module it is not visible in
    PrivateItem,
    /// Wrong number of arguments or labels that don't match the parameters
    ArgumentMismatch,
    /// Field, method or variant lookup on a type that does not declare it
    UnknownMember,
    MissingField,
    BreakOutsideLoop,
    CannotInfer,
    /// An item kind that is not allowed where it was written, such as a
    /// struct inside an impl block
    InvalidItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub primary: Span,
    pub secondary: Vec<(Span, String)>,
    /// Where in the compiler the diagnostic was raised
    pub origin: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            primary: span,
            secondary: Vec::new(),
            origin: None,
        }
    }

    pub fn with_secondary(mut self, span: Span, label: impl Into<String>) -> Self {
        self.secondary.push((span, label.into()));
        self
    }

    pub fn with_origin(mut self, origin: String) -> Self {
        self.origin = Some(origin);
        self
    }
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(origin) = &self.origin {
            writeln!(f, "{}: {}", "backtrace".blue(), origin)?;
        }

        write!(
            f,
            "{}[{}]: {} {}",
            "error".red(),
            self.kind,
            self.message,
            format!("(at {})", self.primary).white()
        )?;

        for (span, label) in &self.secondary {
            write!(f, "\n  {} {} {}", "-->".blue(), span, label)?;
        }

        Ok(())
    }
}

macro_rules! function {
    () => {{
        fn f() {}
        fn type_name_of<T>(_: T) -> &'static str {
            std::any::type_name::<T>()
        }
        type_name_of(f)
            .rsplit("::")
            .find(|&part| part != "f" && part != "{{closure}}")
            .unwrap_or("?")
    }};
}

pub(crate) use function;

/// Builds a [`Diagnostic`], recording the reporting location in the compiler
/// when the `error-backtrace` feature is enabled
macro_rules! diagnostic {
    ($kind:ident, $span:expr, $($message:tt)+) => {{
        let diagnostic = $crate::diagnostics::Diagnostic::new(
            $crate::diagnostics::DiagnosticKind::$kind,
            $span,
            format!($($message)+),
        );

        #[cfg(feature = "error-backtrace")]
        let diagnostic = diagnostic.with_origin(format!(
            "{}::{} (at {}:{}:{})",
            module_path!(),
            $crate::diagnostics::function!(),
            file!(),
            line!(),
            column!()
        ));

        diagnostic
    }};
}

pub(crate) use diagnostic;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn display_names_the_kind_and_location() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::UnresolvedName,
            Span::new(4, 7),
            "cannot find `foo` in this scope",
        )
        .with_secondary(Span::new(1, 2), "while checking `main`");

        let rendered = strip_ansi_escapes::strip_str(diagnostic.to_string());

        assert_eq!(
            rendered,
            "error[UnresolvedName]: cannot find `foo` in this scope (at 4..7)\n  --> 1..2 while checking `main`"
        );
    }

    #[test]
    fn macro_fills_kind_and_message() {
        let diagnostic = diagnostic!(PathError, Span::new(0, 1), "`super` beyond the root of `{}`", "pkg");

        assert_eq!(diagnostic.kind, DiagnosticKind::PathError);
        assert_eq!(diagnostic.message, "`super` beyond the root of `pkg`");
    }
}
