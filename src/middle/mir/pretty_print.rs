use colored::Colorize;
use itertools::Itertools;

use crate::{
    index::Index,
    middle::{
        def::{DefId, Definitions},
        mir::{self, BodyKind, Callee, Immediate, Instruction, Operand, RegisterId, Terminator},
    },
};

/// Renders a body with the names of the definitions it mentions. Only blocks
/// reachable from the entry are shown.
pub struct DisplayBody<'a> {
    body: &'a mir::Body,
    defs: &'a Definitions,
}

impl mir::Body {
    pub fn display<'a>(&'a self, defs: &'a Definitions) -> DisplayBody<'a> {
        DisplayBody { body: self, defs }
    }
}

/// Every body of the program, separated by blank lines
pub fn render_program(program: &mir::Program, defs: &Definitions) -> String {
    program
        .bodies
        .values()
        .map(|body| body.display(defs).to_string())
        .join("\n\n")
}

fn register(id: RegisterId) -> String {
    format!("%{}", id.index()).yellow().to_string()
}

fn block(id: mir::BlockId) -> String {
    format!("bb{}", id.index()).blue().to_string()
}

impl DisplayBody<'_> {
    fn name(&self, def: DefId) -> String {
        self.defs.qualified_name(def)
    }

    fn operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Register(id) => register(*id),
            Operand::Immediate(immediate) => {
                let text = match immediate {
                    Immediate::Int(value, kind) => format!("{value}_{kind}"),
                    Immediate::Float(value, kind) => format!("{value:?}_{kind}"),
                    Immediate::Bool(value) => value.to_string(),
                    Immediate::Char(value) => format!("{value:?}"),
                    Immediate::Str(value) => format!("{:?}", value.value()),
                    Immediate::Unit => "()".to_string(),
                    Immediate::Function(def) => return self.name(*def).green().to_string(),
                };

                text.purple().to_string()
            }
        }
    }

    fn operands(&self, operands: &[Operand]) -> String {
        operands.iter().map(|op| self.operand(op)).join(", ")
    }

    fn instruction(&self, instruction: &Instruction) -> String {
        let assign = |destination: &RegisterId, rest: String| {
            format!("{} {} {rest}", register(*destination), "=".white())
        };

        match instruction {
            Instruction::Move {
                destination,
                source,
            } => assign(destination, self.operand(source)),
            Instruction::UnaryOperation {
                operator,
                destination,
                operand,
            } => assign(destination, format!("{operator}{}", self.operand(operand))),
            Instruction::BinaryOperation {
                operator,
                destination,
                lhs,
                rhs,
            } => assign(
                destination,
                format!("{} {operator} {}", self.operand(lhs), self.operand(rhs)),
            ),
            Instruction::Call {
                destination,
                callee,
                arguments,
            } => {
                let callee = match callee {
                    Callee::Def(def) => self.name(*def).green().to_string(),
                    Callee::Operand(operand) => self.operand(operand),
                };

                assign(
                    destination,
                    format!("{} {callee}({})", "call".cyan(), self.operands(arguments)),
                )
            }
            Instruction::Construct {
                destination,
                adt,
                variant,
                fields,
            } => {
                let name = match variant {
                    Some(index) => format!("{}#{index}", self.name(*adt)),
                    None => self.name(*adt),
                };

                assign(
                    destination,
                    format!(
                        "{} {} {{ {} }}",
                        "construct".cyan(),
                        name.green(),
                        self.operands(fields)
                    ),
                )
            }
            Instruction::GetField {
                destination,
                source,
                index,
            } => assign(
                destination,
                format!("{} {}.{index}", "field".cyan(), self.operand(source)),
            ),
            Instruction::SetField {
                object,
                index,
                value,
            } => format!(
                "{} {}.{index} {} {}",
                "set".cyan(),
                register(*object),
                "<-".white(),
                self.operand(value)
            ),
            Instruction::Discriminant {
                destination,
                source,
            } => assign(
                destination,
                format!("{} {}", "discriminant".cyan(), self.operand(source)),
            ),
            Instruction::GetVariantField {
                destination,
                source,
                variant,
                index,
            } => assign(
                destination,
                format!(
                    "{} {}#{variant}.{index}",
                    "variant_field".cyan(),
                    self.operand(source)
                ),
            ),
            Instruction::LoadConst { destination, def } => assign(
                destination,
                format!("{} {}", "const".cyan(), self.name(*def).green()),
            ),
        }
    }

    fn terminator(&self, terminator: &Terminator) -> String {
        match terminator {
            Terminator::Branch {
                condition,
                positive,
                negative,
            } => format!(
                "{} {}, {}, {}",
                "br".cyan(),
                self.operand(condition),
                block(*positive),
                block(*negative)
            ),
            Terminator::Jump { destination } => format!("{} {}", "jmp".cyan(), block(*destination)),
            Terminator::Return { value } => format!("{} {}", "return".cyan(), self.operand(value)),
            Terminator::Unreachable => "unreachable".cyan().to_string(),
        }
    }
}

impl core::fmt::Display for DisplayBody<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self.body;

        let keyword = match body.kind {
            BodyKind::Function => "fn",
            BodyKind::ConstInitializer => "const",
        };

        let params = body
            .params
            .iter()
            .map(|param| {
                format!(
                    "{}: {}",
                    register(*param),
                    body.registers[*param].ty.display(self.defs)
                )
            })
            .join(", ");

        writeln!(
            f,
            "{} {}({params}) -> {} {{",
            keyword.magenta(),
            body.name.blue(),
            body.return_type.display(self.defs)
        )?;

        for id in body.reachable_blocks() {
            let basic_block = &body.blocks[id];
            writeln!(f, "{}{}", block(id), ":".white())?;

            for instruction in &basic_block.instructions {
                writeln!(f, "    {}", self.instruction(instruction))?;
            }

            writeln!(f, "    {}", self.terminator(&basic_block.terminator))?;
        }

        write!(f, "{}", "}".white())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use crate::{
        frontend::ast::{BinaryOperatorKind, build::AstBuilder},
        middle::{
            mir::hir_lowering::lower_program,
            testing::Lowered,
            type_check::{TypeContext, check_package},
        },
    };

    fn render(package: crate::frontend::ast::Package, path: &str) -> String {
        let lowered = Lowered::simplified(&package);
        let cx = TypeContext {
            session: &lowered.session,
            defs: &lowered.defs,
            hir: &lowered.hir,
            queries: &lowered.queries,
        };

        let results = check_package(&cx).expect("a single job needs no pool");
        let program = lower_program(&cx, &results).expect("checked bodies lower");
        let body = &program.bodies[&lowered.def(path)];

        strip_ansi_escapes::strip_str(body.display(&lowered.defs).to_string())
    }

    #[test]
    fn arithmetic_is_a_single_instruction() {
        let b = AstBuilder::new();
        let function = b
            .function("increment")
            .ordered_param("a", b.ty("i32"))
            .body(vec![b.bare(b.binary(b.var("a"), BinaryOperatorKind::Add, b.int(1)))]);

        assert_eq!(
            render(b.package(Some("app"), vec![function]), "increment"),
            indoc! {"
                fn app::increment(%0: i32) -> i32 {
                bb0:
                    %1 = %0 + 1_i32
                    return %1
                }"}
        );
    }

    #[test]
    fn if_else_joins_through_a_register() {
        let b = AstBuilder::new();
        let function = b
            .function("pick")
            .ordered_param("flag", b.ty("bool"))
            .body(vec![b.bare(b.if_(
                b.var("flag"),
                b.block(vec![b.bare(b.int(1))]),
                Some(b.block_expr(vec![b.bare(b.int(2))])),
            ))]);

        assert_eq!(
            render(b.package(Some("app"), vec![function]), "pick"),
            indoc! {"
                fn app::pick(%0: bool) -> i32 {
                bb0:
                    br %0, bb1, bb3
                bb1:
                    %1 = 1_i32
                    jmp bb2
                bb2:
                    return %1
                bb3:
                    %1 = 2_i32
                    jmp bb2
                }"}
        );
    }

    #[test]
    fn match_tests_each_arm_in_turn() {
        let b = AstBuilder::new();
        let function = b
            .function("unwrap_or_zero")
            .ordered_param("value", b.generic_ty("Option", vec![b.ty("i64")]))
            .returns(b.ty("i64"))
            .body(vec![b.bare(b.match_(
                b.var("value"),
                vec![
                    b.arm(b.pat_shorthand("Some", vec![b.pat_bind("inner")]), b.var("inner")),
                    b.arm(b.pat_wild(), b.int(0)),
                ],
            ))]);

        assert_eq!(
            render(b.package(Some("app"), vec![function]), "unwrap_or_zero"),
            indoc! {"
                fn app::unwrap_or_zero(%0: Option<i64>) -> i64 {
                bb0:
                    %2 = discriminant %0
                    %3 = %2 == 0_u32
                    br %3, bb3, bb2
                bb1:
                    return %1
                bb2:
                    %1 = 0_i64
                    jmp bb1
                bb3:
                    %4 = variant_field %0#0.0
                    %5 = %4
                    %1 = %5
                    jmp bb1
                }"}
        );
    }
}
