//! Inputs to the pipeline. Lexing and parsing live outside this crate, so the
//! frontend only defines the syntax tree it hands over and the primitives
//! (spans and interned symbols) shared by every later stage.

pub mod ast;
pub mod intern;
pub mod span;
