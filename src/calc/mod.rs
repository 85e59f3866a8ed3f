//! Expression parsing and decomposition into tasks.

pub mod decompose;
pub mod parser;

pub use decompose::{Decomposer, OperationTimes};
pub use parser::{parse, Ast, BinaryOp, ParseError};
