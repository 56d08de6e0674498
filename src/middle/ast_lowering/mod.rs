//! This module contains all the code related to lowering an AST into HIR
//!
//! Lowering runs after name resolution: every path is replaced by its
//! resolution and every item body is given its own node numbering.

use std::collections::BTreeMap;

use crate::{
    frontend::ast,
    index::Index,
    middle::{
        def::{DefId, Definitions},
        hir,
        prelude::LangItems,
        resolve::{Res, Resolutions},
    },
};

/// Lowers the package and the prelude into a single HIR package
#[tracing::instrument(level = "debug", skip_all)]
pub fn lower_package(
    defs: &Definitions,
    resolutions: &Resolutions,
    lang_items: LangItems,
    package: &ast::Package,
    prelude: &[ast::Item],
) -> hir::Package {
    let mut lowering = PackageLowering {
        defs,
        resolutions,
        items: BTreeMap::new(),
        bodies: BTreeMap::new(),
    };

    lowering.lower_items(&package.items, None);
    lowering.lower_items(prelude, None);

    tracing::debug!(
        items = lowering.items.len(),
        bodies = lowering.bodies.len(),
        "lowered package to HIR"
    );

    hir::Package {
        items: lowering.items,
        bodies: lowering.bodies,
        lang_items,
    }
}

struct PackageLowering<'a> {
    defs: &'a Definitions,
    resolutions: &'a Resolutions,
    items: BTreeMap<DefId, hir::Item>,
    bodies: BTreeMap<DefId, hir::Body>,
}

impl PackageLowering<'_> {
    fn def_of(&self, node: ast::NodeId) -> DefId {
        self.defs
            .def_for_node(node)
            .expect("every item has a definition before lowering")
    }

    fn res_of(&self, path: &ast::Path) -> Res {
        self.resolutions
            .get(path.id)
            .expect("every path is resolved before lowering")
    }

    fn lower_items(&mut self, items: &[ast::Item], container: Option<DefId>) {
        for item in items {
            self.lower_item(item, container);
        }
    }

    fn lower_item(&mut self, item: &ast::Item, container: Option<DefId>) {
        let kind = match &item.kind {
            ast::ItemKind::Module(module) => {
                self.lower_items(&module.items, None);
                return;
            }
            ast::ItemKind::Import(_) => return,
            ast::ItemKind::Function(function) => {
                let def = self.def_of(item.id);
                hir::ItemKind::Function(self.lower_function(def, function, container))
            }
            ast::ItemKind::Struct(definition) => hir::ItemKind::Struct(hir::StructDecl {
                generics: self.lower_generics(&definition.generics),
                fields: definition
                    .fields
                    .iter()
                    .map(|field| hir::FieldDecl {
                        def: self.def_of(field.id),
                        name: field.name.symbol,
                        ty: self.lower_type(&field.ty),
                        span: field.span,
                    })
                    .collect(),
            }),
            ast::ItemKind::Enum(definition) => hir::ItemKind::Enum(hir::EnumDecl {
                generics: self.lower_generics(&definition.generics),
                variants: definition
                    .variants
                    .iter()
                    .map(|variant| hir::VariantDecl {
                        def: self.def_of(variant.id),
                        name: variant.name.symbol,
                        fields: variant.fields.iter().map(|ty| self.lower_type(ty)).collect(),
                        span: variant.span,
                    })
                    .collect(),
            }),
            ast::ItemKind::Trait(definition) => {
                let def = self.def_of(item.id);
                for method in ast::associated_functions(&definition.items) {
                    self.lower_item(method, Some(def));
                }

                hir::ItemKind::Trait(hir::TraitDecl {
                    methods: ast::associated_functions(&definition.items)
                        .map(|i| self.def_of(i.id))
                        .collect(),
                })
            }
            ast::ItemKind::Impl(block) => {
                let def = self.def_of(item.id);
                for method in ast::associated_functions(&block.items) {
                    self.lower_item(method, Some(def));
                }

                hir::ItemKind::Impl(hir::ImplDecl {
                    generics: self.lower_generics(&block.generics),
                    trait_ref: block.trait_ref.as_ref().map(|path| self.res_of(path)),
                    self_ty: self.lower_type(&block.self_ty),
                    methods: ast::associated_functions(&block.items)
                        .map(|i| self.def_of(i.id))
                        .collect(),
                })
            }
            ast::ItemKind::Const(definition) => {
                let def = self.def_of(item.id);

                let mut body_lowering = BodyLowering::new(self);
                let value = body_lowering.lower_expression(&definition.value);
                let next_id = body_lowering.next_id;
                self.bodies
                    .insert(def, hir::Body::new(def, Vec::new(), value, next_id));

                hir::ItemKind::Const(hir::ConstDecl {
                    ty: definition.ty.as_ref().map(|ty| self.lower_type(ty)),
                })
            }
        };

        let def = self.def_of(item.id);
        self.items.insert(
            def,
            hir::Item {
                def,
                span: item.span,
                kind,
            },
        );
    }

    fn lower_generics(&self, generics: &[ast::GenericParameter]) -> Vec<DefId> {
        generics.iter().map(|p| self.def_of(p.id)).collect()
    }

    fn lower_function(
        &mut self,
        def: DefId,
        function: &ast::FunctionDefinition,
        container: Option<DefId>,
    ) -> hir::FnDecl {
        let params = function
            .parameters
            .iter()
            .map(|parameter| hir::Param {
                local: self.def_of(parameter.id),
                kind: match &parameter.kind {
                    ast::FunctionParameterKind::SelfValue => hir::ParamKind::SelfValue,
                    ast::FunctionParameterKind::Named(name) => hir::ParamKind::Named(name.symbol),
                    ast::FunctionParameterKind::Ordered(_) => hir::ParamKind::Ordered,
                },
                ty: parameter.ty.as_ref().map(|ty| self.lower_type(ty)),
                span: parameter.span,
            })
            .collect::<Vec<_>>();

        if let Some(block) = &function.body {
            let mut body_lowering = BodyLowering::new(self);
            let block = body_lowering.lower_block(block);
            let value = body_lowering.expression_of_block(block);
            let next_id = body_lowering.next_id;

            self.bodies.insert(
                def,
                hir::Body::new(def, params.iter().map(|p| p.local).collect(), value, next_id),
            );
        }

        hir::FnDecl {
            generics: self.lower_generics(&function.generics),
            params,
            return_type: function.return_type.as_ref().map(|ty| self.lower_type(ty)),
            flavor: match function.flavor {
                ast::FunctionFlavor::Plain => hir::FnFlavor::Plain,
                ast::FunctionFlavor::Getter => hir::FnFlavor::Getter,
                ast::FunctionFlavor::Setter => hir::FnFlavor::Setter,
                ast::FunctionFlavor::Override(operator) => hir::FnFlavor::Override(operator),
            },
            container,
            has_body: function.body.is_some(),
        }
    }

    fn lower_type(&self, ty: &ast::Type) -> hir::Ty {
        let kind = match &ty.kind {
            ast::TypeKind::Path { path, arguments } => hir::TyKind::Path(
                self.res_of(path),
                arguments.iter().map(|ty| self.lower_type(ty)).collect(),
            ),
            ast::TypeKind::Unit => hir::TyKind::Unit,
            ast::TypeKind::Never => hir::TyKind::Never,
            ast::TypeKind::Function {
                parameters,
                return_type,
            } => hir::TyKind::Function(
                parameters.iter().map(|ty| self.lower_type(ty)).collect(),
                Box::new(self.lower_type(return_type)),
            ),
            ast::TypeKind::Infer => hir::TyKind::Infer,
        };

        hir::Ty {
            span: ty.span,
            kind,
        }
    }
}

/// Numbers the nodes of one body as they are lowered
struct BodyLowering<'l, 'a> {
    package: &'l PackageLowering<'a>,
    next_id: hir::ItemLocalId,
}

impl<'l, 'a> BodyLowering<'l, 'a> {
    fn new(package: &'l PackageLowering<'a>) -> Self {
        Self {
            package,
            next_id: hir::ItemLocalId::new(0),
        }
    }

    fn next_id(&mut self) -> hir::ItemLocalId {
        let id = self.next_id;
        self.next_id.increment_by(1);
        id
    }

    fn lower_ident(&self, ident: &ast::Identifier) -> hir::Ident {
        hir::Ident {
            symbol: ident.symbol,
            span: ident.span,
        }
    }

    fn expression_of_block(&mut self, block: hir::Block) -> hir::Expr {
        hir::Expr {
            id: self.next_id(),
            span: block.span,
            kind: hir::ExprKind::Block(block),
        }
    }

    fn lower_block(&mut self, block: &ast::Block) -> hir::Block {
        let id = self.next_id();
        let mut statements = Vec::new();
        let mut tail = None;

        let last_index = block.statements.len().saturating_sub(1);

        for (index, statement) in block.statements.iter().enumerate() {
            let kind = match &statement.kind {
                ast::StatementKind::Local(local) => hir::StatementKind::Let {
                    ty: local.ty.as_ref().map(|ty| self.package.lower_type(ty)),
                    initializer: local
                        .initializer
                        .as_ref()
                        .map(|init| self.lower_expression(init)),
                    pattern: self.lower_pattern(&local.pattern),
                },
                ast::StatementKind::BareExpr(expression) if index == last_index => {
                    tail = Some(Box::new(self.lower_expression(expression)));
                    continue;
                }
                ast::StatementKind::BareExpr(expression)
                | ast::StatementKind::SemiExpr(expression) => {
                    hir::StatementKind::Expr(self.lower_expression(expression))
                }
                ast::StatementKind::Empty => continue,
            };

            statements.push(hir::Statement {
                span: statement.span,
                kind,
            });
        }

        hir::Block {
            id,
            span: block.span,
            statements,
            tail,
        }
    }

    fn lower_boxed(&mut self, expression: &ast::Expression) -> Box<hir::Expr> {
        Box::new(self.lower_expression(expression))
    }

    fn lower_arguments(&mut self, arguments: &[ast::CallArgument]) -> Vec<hir::Argument> {
        arguments
            .iter()
            .map(|argument| hir::Argument {
                label: argument.label.as_ref().map(|l| self.lower_ident(l)),
                value: self.lower_expression(&argument.value),
                span: argument.span,
            })
            .collect()
    }

    fn lower_expression(&mut self, expression: &ast::Expression) -> hir::Expr {
        let kind = match &expression.kind {
            ast::ExpressionKind::Literal(literal) => hir::ExprKind::Literal(literal.kind),
            ast::ExpressionKind::Path(path) => hir::ExprKind::Path(self.package.res_of(path)),
            ast::ExpressionKind::VariantShorthand { name, arguments } => {
                hir::ExprKind::VariantShorthand {
                    name: self.lower_ident(name),
                    arguments: arguments.iter().map(|a| self.lower_expression(a)).collect(),
                }
            }
            ast::ExpressionKind::Block(block) => hir::ExprKind::Block(self.lower_block(block)),
            ast::ExpressionKind::Call { target, arguments } => hir::ExprKind::Call {
                target: self.lower_boxed(target),
                arguments: self.lower_arguments(arguments),
            },
            ast::ExpressionKind::MethodCall {
                receiver,
                method,
                arguments,
            } => hir::ExprKind::MethodCall {
                receiver: self.lower_boxed(receiver),
                method: self.lower_ident(method),
                arguments: self.lower_arguments(arguments),
            },
            ast::ExpressionKind::Field { target, field } => hir::ExprKind::Field {
                target: self.lower_boxed(target),
                field: self.lower_ident(field),
            },
            ast::ExpressionKind::StructLiteral { path, fields } => hir::ExprKind::StructLiteral {
                res: self.package.res_of(path),
                fields: fields
                    .iter()
                    .map(|field| hir::FieldInit {
                        name: self.lower_ident(&field.name),
                        value: self.lower_expression(&field.value),
                        span: field.span,
                    })
                    .collect(),
            },
            ast::ExpressionKind::Binary { lhs, operator, rhs } => hir::ExprKind::Binary {
                operator: *operator,
                lhs: self.lower_boxed(lhs),
                rhs: self.lower_boxed(rhs),
            },
            ast::ExpressionKind::Unary { operator, operand } => hir::ExprKind::Unary {
                operator: *operator,
                operand: self.lower_boxed(operand),
            },
            ast::ExpressionKind::If {
                condition,
                positive,
                negative,
            } => hir::ExprKind::If {
                condition: self.lower_boxed(condition),
                positive: self.lower_block(positive),
                negative: negative.as_ref().map(|n| self.lower_boxed(n)),
            },
            ast::ExpressionKind::Loop(block) => hir::ExprKind::Loop(self.lower_block(block)),
            ast::ExpressionKind::While { condition, block } => hir::ExprKind::While {
                condition: self.lower_boxed(condition),
                block: self.lower_block(block),
            },
            ast::ExpressionKind::For {
                pattern,
                iterable,
                block,
            } => hir::ExprKind::For {
                iterable: self.lower_boxed(iterable),
                pattern: self.lower_pattern(pattern),
                block: self.lower_block(block),
            },
            ast::ExpressionKind::Guard {
                condition,
                otherwise,
            } => hir::ExprKind::Guard {
                condition: self.lower_boxed(condition),
                otherwise: otherwise.as_ref().map(|b| self.lower_block(b)),
            },
            ast::ExpressionKind::Match { scrutinee, arms } => hir::ExprKind::Match {
                scrutinee: self.lower_boxed(scrutinee),
                arms: arms
                    .iter()
                    .map(|arm| hir::Arm {
                        pattern: self.lower_pattern(&arm.pattern),
                        body: self.lower_expression(&arm.body),
                        span: arm.span,
                    })
                    .collect(),
            },
            ast::ExpressionKind::Assignment { lhs, rhs } => hir::ExprKind::Assign {
                lhs: self.lower_boxed(lhs),
                rhs: self.lower_boxed(rhs),
            },
            ast::ExpressionKind::OperatorAssignment { operator, lhs, rhs } => {
                hir::ExprKind::OperatorAssign {
                    operator: *operator,
                    lhs: self.lower_boxed(lhs),
                    rhs: self.lower_boxed(rhs),
                }
            }
            ast::ExpressionKind::Break => hir::ExprKind::Break,
            ast::ExpressionKind::Continue => hir::ExprKind::Continue,
            ast::ExpressionKind::Return(value) => {
                hir::ExprKind::Return(value.as_ref().map(|v| self.lower_boxed(v)))
            }
        };

        hir::Expr {
            id: self.next_id(),
            span: expression.span,
            kind,
        }
    }

    fn lower_pattern(&mut self, pattern: &ast::Pattern) -> hir::Pattern {
        let kind = match &pattern.kind {
            ast::PatternKind::Wildcard => hir::PatternKind::Wildcard,
            ast::PatternKind::Binding { name, is_mutable } => hir::PatternKind::Binding {
                local: self.package.def_of(pattern.id),
                name: name.symbol,
                is_mutable: *is_mutable,
            },
            ast::PatternKind::Literal(literal) => hir::PatternKind::Literal(literal.kind),
            ast::PatternKind::Variant { path, fields } => hir::PatternKind::Variant {
                path: match path {
                    ast::VariantPath::Path(path) => hir::VariantRef::Res(self.package.res_of(path)),
                    ast::VariantPath::Shorthand(name) => {
                        hir::VariantRef::Shorthand(self.lower_ident(name))
                    }
                },
                fields: fields.iter().map(|f| self.lower_pattern(f)).collect(),
            },
        };

        hir::Pattern {
            id: self.next_id(),
            span: pattern.span,
            kind,
        }
    }
}
