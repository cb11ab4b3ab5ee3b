//! jq query language front end: lexer, parser, AST and formatter.

pub mod ast;
pub mod display;
pub mod lexer;
pub mod parser;

pub use ast::{Index, ObjectEntry, ObjectKey, Operator, Query, Term, UnaryOp};
pub use parser::{parse, ParseError};
