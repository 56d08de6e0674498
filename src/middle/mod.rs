//! Everything between the syntax tree and MIR. Definitions are collected
//! into a module tree, paths are resolved and the AST is lowered to HIR,
//! which is simplified, type checked through the query engine and finally
//! flattened to MIR.

pub mod ast_lowering;
pub mod def;
pub mod hir;
pub mod mir;
pub mod module_tree;
pub mod prelude;
pub mod primitive;
pub mod query;
pub mod resolve;
pub mod simplify;
pub mod ty;
pub mod type_check;

#[cfg(test)]
mod testing;
