//! Formula text -> AST, plus the standalone A1 reference grammar.
//!
//! This crate owns everything that only needs formula *text* and a
//! [`sheetcalc_common::WorkbookIndex`] to resolve sheet names — it knows
//! nothing about cell values, the dependency graph, or evaluation.

pub mod ast;
pub mod parser;
pub mod reference_syntax;
pub mod tokenizer;

pub use ast::{AstNode, AstRange, BinaryOperator, ParseOutput, UnaryOperator};
pub use parser::parse_formula;
pub use reference_syntax::{
    format_reference_from_range, parse_cell_reference, parse_reference_to_cell_range, ParseContext,
    ParsedReference,
};
pub use tokenizer::{tokenize, Token, TokenKind, Tokenizer, TokenizerError};
