//! Rewrites sugared HIR into the smaller set of node kinds the type checker
//! and MIR lowering understand. Every rewrite is local and leaves already
//! simplified input untouched, so running the pass twice changes nothing.

use crate::{
    diagnostics::diagnostic,
    frontend::{ast::UnaryOperatorKind, intern::InternedSymbol, span::Span},
    index::Index,
    middle::{
        def::{DefId, DefKind, DefVisibility, Definition, Definitions},
        hir::{
            self, AccessorKind, Arm, Block, Expr, ExprKind, FnFlavor, ItemKind, ItemLocalId,
            ParamKind, Pattern, PatternKind, Statement, StatementKind, VariantRef,
            visit::{self, MutVisitor},
        },
        prelude::LangItems,
        resolve::Res,
    },
    session::Session,
};

#[tracing::instrument(level = "debug", skip_all)]
pub fn simplify_package(session: &Session, defs: &mut Definitions, package: &mut hir::Package) {
    for item in package.items.values_mut() {
        if let ItemKind::Function(function) = &mut item.kind {
            simplify_accessor(session, defs, item.def, item.span, function);
        }
    }

    let lang_items = package.lang_items;

    for body in package.bodies.values_mut() {
        let mut simplifier = BodySimplifier {
            defs: &mut *defs,
            lang_items,
            owner: body.owner,
            next_id: &mut body.next_id,
        };

        simplifier.visit_expr(&mut body.value);
    }
}

/// Turns getters and setters into ordinary methods named `get_<property>`
/// and `set_<property>`
fn simplify_accessor(
    session: &Session,
    defs: &mut Definitions,
    def: DefId,
    span: Span,
    function: &mut hir::FnDecl,
) {
    let kind = match function.flavor {
        FnFlavor::Getter => AccessorKind::Get,
        FnFlavor::Setter => AccessorKind::Set,
        _ => return,
    };

    let property = defs.name(def);

    if kind == AccessorKind::Set
        && !matches!(
            function.params.as_slice(),
            [self_param, value] if self_param.kind == ParamKind::SelfValue
                && value.kind == ParamKind::Ordered
        )
    {
        session.report(diagnostic!(
            InvalidSetterSignature,
            span,
            "setter `{property}` must take `self` and exactly one ordered parameter"
        ));
        function.flavor = FnFlavor::Plain;
        return;
    }

    let prefix = match kind {
        AccessorKind::Get => "get",
        AccessorKind::Set => "set",
    };

    defs.rename(def, InternedSymbol::new(&format!("{prefix}_{property}")));
    function.flavor = FnFlavor::Accessor { kind, property };
}

struct BodySimplifier<'a> {
    defs: &'a mut Definitions,
    lang_items: LangItems,
    owner: DefId,
    next_id: &'a mut ItemLocalId,
}

impl MutVisitor for BodySimplifier<'_> {
    fn visit_expr(&mut self, expr: &mut Expr) {
        // Children first so a rewrite never has to look inside sugar again
        visit::walk_expr(self, expr);

        if !expr.kind.is_sugar() {
            return;
        }

        let span = expr.span;
        let kind = std::mem::replace(&mut expr.kind, ExprKind::Break);

        expr.kind = match kind {
            ExprKind::While { condition, block } => self.desugar_while(span, *condition, block),
            ExprKind::Guard {
                condition,
                otherwise,
            } => self.desugar_guard(span, *condition, otherwise),
            ExprKind::OperatorAssign { operator, lhs, rhs } => {
                let lhs_copy = self.renumbered(&lhs);

                ExprKind::Assign {
                    lhs,
                    rhs: Box::new(self.expr(
                        span,
                        ExprKind::Binary {
                            operator: operator.binary_operator(),
                            lhs: Box::new(lhs_copy),
                            rhs,
                        },
                    )),
                }
            }
            ExprKind::For {
                pattern,
                iterable,
                block,
            } => self.desugar_for(span, pattern, *iterable, block),
            _ => unreachable!("only sugar reaches the rewrite"),
        };
    }
}

impl BodySimplifier<'_> {
    fn fresh_id(&mut self) -> ItemLocalId {
        let id = *self.next_id;
        self.next_id.increment_by(1);
        id
    }

    fn expr(&mut self, span: Span, kind: ExprKind) -> Expr {
        Expr {
            id: self.fresh_id(),
            span,
            kind,
        }
    }

    fn block(&mut self, span: Span, statements: Vec<Statement>, tail: Option<Expr>) -> Block {
        Block {
            id: self.fresh_id(),
            span,
            statements,
            tail: tail.map(Box::new),
        }
    }

    fn not(&mut self, condition: Expr) -> Expr {
        let span = condition.span;

        self.expr(
            span,
            ExprKind::Unary {
                operator: UnaryOperatorKind::LogicalNot,
                operand: Box::new(condition),
            },
        )
    }

    /// `if !condition { positive }`
    fn unless(&mut self, condition: Expr, positive: Block) -> ExprKind {
        ExprKind::If {
            condition: Box::new(self.not(condition)),
            positive,
            negative: None,
        }
    }

    /// A copy of `expr` with fresh ids throughout
    fn renumbered(&mut self, expr: &Expr) -> Expr {
        let mut copy = expr.clone();
        Renumber {
            next_id: &mut *self.next_id,
        }
        .visit_expr(&mut copy);
        copy
    }

    /// `while c { body }` to `loop { if !c { break }; body }`
    fn desugar_while(&mut self, span: Span, condition: Expr, block: Block) -> ExprKind {
        let break_expr = self.expr(span, ExprKind::Break);
        let exit = self.block(span, Vec::new(), Some(break_expr));
        let exit_kind = self.unless(condition, exit);
        let exit_check = self.expr(span, exit_kind);

        let block_span = block.span;
        let body = self.expr(block_span, ExprKind::Block(block));

        ExprKind::Loop(self.block(
            span,
            vec![
                Statement {
                    span,
                    kind: StatementKind::Expr(exit_check),
                },
                Statement {
                    span: block_span,
                    kind: StatementKind::Expr(body),
                },
            ],
            None,
        ))
    }

    /// `guard c;` to `if !c { return }`, `guard c else { .. }` to
    /// `if !c { .. }`. The bare form returns unit, so it only checks in
    /// bodies returning `()`.
    fn desugar_guard(&mut self, span: Span, condition: Expr, otherwise: Option<Block>) -> ExprKind {
        let positive = match otherwise {
            Some(block) => block,
            None => {
                let return_expr = self.expr(span, ExprKind::Return(None));
                self.block(span, Vec::new(), Some(return_expr))
            }
        };

        self.unless(condition, positive)
    }

    /// `for p in e { body }` to
    /// `{ let <iter> = e; loop { match <iter>.next() { Some(p) => body, None => break } } }`
    fn desugar_for(&mut self, span: Span, pattern: Pattern, iterable: Expr, block: Block) -> ExprKind {
        let name = InternedSymbol::new("<iter>");
        let iterator = self.defs.create(
            None,
            Definition {
                kind: DefKind::Local,
                name,
                parent: Some(self.owner),
                span: iterable.span,
                visibility: DefVisibility::Module,
            },
        );

        let iterator_pattern = Pattern {
            id: self.fresh_id(),
            span: iterable.span,
            kind: PatternKind::Binding {
                local: iterator,
                name,
                is_mutable: true,
            },
        };
        let declaration = Statement {
            span: iterable.span,
            kind: StatementKind::Let {
                pattern: iterator_pattern,
                ty: None,
                initializer: Some(iterable),
            },
        };

        let receiver = self.expr(span, ExprKind::Path(Res::Local(iterator)));
        let next_call = self.expr(
            span,
            ExprKind::MethodCall {
                receiver: Box::new(receiver),
                method: hir::Ident {
                    symbol: InternedSymbol::new("next"),
                    span,
                },
                arguments: Vec::new(),
            },
        );

        let some_pattern = Pattern {
            id: self.fresh_id(),
            span: pattern.span,
            kind: PatternKind::Variant {
                path: VariantRef::Res(Res::Def(DefKind::Variant, self.lang_items.some)),
                fields: vec![pattern],
            },
        };
        let body = self.expr(block.span, ExprKind::Block(block));

        let none_pattern = Pattern {
            id: self.fresh_id(),
            span,
            kind: PatternKind::Variant {
                path: VariantRef::Res(Res::Def(DefKind::Variant, self.lang_items.none)),
                fields: Vec::new(),
            },
        };
        let break_expr = self.expr(span, ExprKind::Break);

        let dispatch = self.expr(
            span,
            ExprKind::Match {
                scrutinee: Box::new(next_call),
                arms: vec![
                    Arm {
                        pattern: some_pattern,
                        body,
                        span,
                    },
                    Arm {
                        pattern: none_pattern,
                        body: break_expr,
                        span,
                    },
                ],
            },
        );

        let loop_block = self.block(span, Vec::new(), Some(dispatch));
        let loop_expr = self.expr(span, ExprKind::Loop(loop_block));

        ExprKind::Block(self.block(span, vec![declaration], Some(loop_expr)))
    }
}

/// Gives every node of a subtree a fresh id
struct Renumber<'a> {
    next_id: &'a mut ItemLocalId,
}

impl Renumber<'_> {
    fn fresh_id(&mut self) -> ItemLocalId {
        let id = *self.next_id;
        self.next_id.increment_by(1);
        id
    }
}

impl MutVisitor for Renumber<'_> {
    fn visit_expr(&mut self, expr: &mut Expr) {
        expr.id = self.fresh_id();
        visit::walk_expr(self, expr);
    }

    fn visit_block(&mut self, block: &mut Block) {
        block.id = self.fresh_id();
        visit::walk_block(self, block);
    }

    fn visit_pattern(&mut self, pattern: &mut Pattern) {
        pattern.id = self.fresh_id();
        visit::walk_pattern(self, pattern);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        diagnostics::DiagnosticKind,
        frontend::ast::{AssignmentOperatorKind, BinaryOperatorKind, build::AstBuilder},
        middle::testing::Lowered,
    };

    fn tail(body: &hir::Body) -> &Expr {
        let ExprKind::Block(block) = &body.value.kind else {
            panic!("function bodies are blocks");
        };

        block.tail.as_deref().expect("body has a tail expression")
    }

    fn contains_sugar(expr: &Expr) -> bool {
        struct Finder(bool);

        impl MutVisitor for Finder {
            fn visit_expr(&mut self, expr: &mut Expr) {
                self.0 |= expr.kind.is_sugar();
                visit::walk_expr(self, expr);
            }
        }

        let mut finder = Finder(false);
        finder.visit_expr(&mut expr.clone());
        finder.0
    }

    #[test]
    fn while_becomes_loop_with_exit_check() {
        let b = AstBuilder::new();
        let function = b.function("count").body(vec![
            b.let_mut("i", b.int(0)),
            b.bare(b.while_(
                b.binary(b.var("i"), BinaryOperatorKind::LessThan, b.int(10)),
                b.block(vec![b.semi(b.op_assign(
                    b.var("i"),
                    AssignmentOperatorKind::Add,
                    b.int(1),
                ))]),
            )),
        ]);
        let package = b.package(Some("app"), vec![function]);

        let lowered = Lowered::simplified(&package);
        let body = lowered.body("count");

        let ExprKind::Loop(block) = &tail(body).kind else {
            panic!("expected a loop, found {:?}", tail(body).kind);
        };
        let StatementKind::Expr(Expr {
            kind: ExprKind::If {
                condition, positive, ..
            },
            ..
        }) = &block.statements[0].kind
        else {
            panic!("expected the exit check first");
        };

        assert!(matches!(
            condition.kind,
            ExprKind::Unary {
                operator: UnaryOperatorKind::LogicalNot,
                ..
            }
        ));
        assert!(matches!(
            positive.tail.as_deref().map(|e| &e.kind),
            Some(ExprKind::Break)
        ));
        assert!(!contains_sugar(&body.value));
    }

    #[test]
    fn guard_without_else_returns() {
        let b = AstBuilder::new();
        let function = b
            .function("check")
            .param("age", b.ty("i32"))
            .body(vec![b.bare(b.guard(b.binary(
                b.var("age"),
                BinaryOperatorKind::GreaterThanOrEqualTo,
                b.int(18),
            )))]);
        let package = b.package(Some("app"), vec![function]);

        let lowered = Lowered::simplified(&package);

        let ExprKind::If {
            condition,
            positive,
            negative: None,
        } = &tail(lowered.body("check")).kind
        else {
            panic!("guard should become an if without else");
        };

        let ExprKind::Unary { operand, .. } = &condition.kind else {
            panic!("guard condition should be negated");
        };
        assert!(matches!(
            operand.kind,
            ExprKind::Binary {
                operator: BinaryOperatorKind::GreaterThanOrEqualTo,
                ..
            }
        ));
        assert!(matches!(
            positive.tail.as_deref().map(|e| &e.kind),
            Some(ExprKind::Return(None))
        ));
    }

    #[test]
    fn compound_assignment_duplicates_the_target() {
        let b = AstBuilder::new();
        let function = b.function("bump").body(vec![
            b.let_mut("total", b.int(1)),
            b.semi(b.op_assign(b.var("total"), AssignmentOperatorKind::Multiply, b.int(3))),
        ]);
        let package = b.package(Some("app"), vec![function]);

        let lowered = Lowered::simplified(&package);
        let body = lowered.body("bump");
        let ExprKind::Block(block) = &body.value.kind else {
            unreachable!();
        };
        let StatementKind::Expr(Expr {
            kind: ExprKind::Assign { lhs, rhs },
            ..
        }) = &block.statements[1].kind
        else {
            panic!("expected a plain assignment");
        };
        let ExprKind::Binary {
            operator,
            lhs: copy,
            ..
        } = &rhs.kind
        else {
            panic!("expected the operator on the right hand side");
        };

        assert_eq!(*operator, BinaryOperatorKind::Multiply);
        assert_eq!(copy.kind, lhs.kind);
        assert_ne!(copy.id, lhs.id);
    }

    #[test]
    fn for_loop_drives_the_iterator_protocol() {
        let b = AstBuilder::new();
        let function = b
            .function("sum")
            .param("items", b.ty("i32"))
            .body(vec![b.bare(b.for_(
                b.pat_bind("x"),
                b.var("items"),
                b.block(vec![]),
            ))]);
        let package = b.package(Some("app"), vec![function]);

        let lowered = Lowered::simplified(&package);
        let lang_items = lowered.hir.lang_items;

        let ExprKind::Block(block) = &tail(lowered.body("sum")).kind else {
            panic!("for should become a block");
        };
        let StatementKind::Let {
            pattern:
                Pattern {
                    kind: PatternKind::Binding { local, .. },
                    ..
                },
            ..
        } = &block.statements[0].kind
        else {
            panic!("expected the iterator binding");
        };
        assert_eq!(lowered.defs.name(*local).value(), "<iter>");

        let Some(ExprKind::Loop(inner)) = block.tail.as_deref().map(|e| &e.kind) else {
            panic!("expected a loop");
        };
        let Some(ExprKind::Match { scrutinee, arms }) = inner.tail.as_deref().map(|e| &e.kind)
        else {
            panic!("expected a match on next()");
        };

        assert!(matches!(
            &scrutinee.kind,
            ExprKind::MethodCall { method, .. } if method.symbol.value() == "next"
        ));
        assert!(matches!(
            &arms[0].pattern.kind,
            PatternKind::Variant { path: VariantRef::Res(Res::Def(_, some)), .. }
                if *some == lang_items.some
        ));
        assert!(matches!(arms[1].body.kind, ExprKind::Break));
    }

    #[test]
    fn accessors_become_named_methods() {
        let b = AstBuilder::new();
        let point = b.structure("Point", &[], vec![("raw", b.ty("i32"))]);
        let methods = b.impl_block(
            &[],
            b.ty("Point"),
            vec![
                b.function("x")
                    .getter()
                    .self_param()
                    .returns(b.ty("i32"))
                    .body(vec![b.bare(b.field(b.var("self"), "raw"))]),
                b.function("x")
                    .setter()
                    .self_param()
                    .ordered_param("value", b.ty("i32"))
                    .body(vec![]),
            ],
        );
        let package = b.package(Some("app"), vec![point, methods]);

        let lowered = Lowered::simplified(&package);

        let getter = lowered.def("get_x");
        let setter = lowered.def("set_x");

        assert!(matches!(
            lowered.hir.function(getter).map(|f| f.flavor),
            Some(FnFlavor::Accessor {
                kind: AccessorKind::Get,
                ..
            })
        ));
        assert!(matches!(
            lowered.hir.function(setter).map(|f| f.flavor),
            Some(FnFlavor::Accessor {
                kind: AccessorKind::Set,
                ..
            })
        ));
        assert_eq!(lowered.diagnostic_kinds(), vec![]);
    }

    #[test]
    fn setter_with_named_parameter_is_rejected() {
        let b = AstBuilder::new();
        let point = b.structure("Point", &[], vec![]);
        let methods = b.impl_block(
            &[],
            b.ty("Point"),
            vec![
                b.function("x")
                    .setter()
                    .self_param()
                    .param("value", b.ty("i32"))
                    .body(vec![]),
            ],
        );
        let package = b.package(Some("app"), vec![point, methods]);

        let lowered = Lowered::simplified(&package);
        let setter = lowered.def("x");

        assert_eq!(
            lowered.hir.function(setter).map(|f| f.flavor),
            Some(FnFlavor::Plain)
        );
        assert_eq!(
            lowered.diagnostic_kinds(),
            vec![DiagnosticKind::InvalidSetterSignature]
        );
    }

    #[test]
    fn simplifying_twice_changes_nothing() {
        let b = AstBuilder::new();
        let function = b.function("run").param("n", b.ty("i32")).body(vec![
            b.let_mut("i", b.int(0)),
            b.semi(b.while_(
                b.binary(b.var("i"), BinaryOperatorKind::LessThan, b.var("n")),
                b.block(vec![
                    b.semi(b.guard(b.boolean(true))),
                    b.semi(b.op_assign(b.var("i"), AssignmentOperatorKind::Add, b.int(1))),
                ]),
            )),
        ]);
        let package = b.package(Some("app"), vec![function]);

        let mut lowered = Lowered::simplified(&package);
        let once = lowered.hir.bodies.clone();
        let defs_before = lowered.defs.len();

        simplify_package(&lowered.session, &mut lowered.defs, &mut lowered.hir);

        assert_eq!(lowered.hir.bodies, once);
        assert_eq!(lowered.defs.len(), defs_before);
    }
}
