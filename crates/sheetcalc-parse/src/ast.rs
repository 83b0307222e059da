//! The formula AST. A tagged sum type per spec §3 — evaluation dispatches
//! on the variant tag rather than any runtime type test.

use std::fmt;

use rustc_hash::FxHashSet;

use sheetcalc_common::{CellAddress, CellAddressKey, CalcValue};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
    /// Postfix `%`, divides the operand by 100.
    Percent,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOperator::Plus => "+",
            UnaryOperator::Minus => "-",
            UnaryOperator::Percent => "%",
        })
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Concat => "&",
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
        })
    }
}

/// A resolved, inclusive cell range. `start` and `end` always share a
/// `sheet_id`; the bounds may be unnormalised (`start` below/right of
/// `end`) as produced by the parser and are normalised wherever they're
/// consumed (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct AstRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl AstRange {
    /// Normalised `(top_row, left_col, bottom_row, right_col)`, all
    /// inclusive.
    pub fn bounds(&self) -> (u32, u32, u32, u32) {
        let top = self.start.row.min(self.end.row);
        let bottom = self.start.row.max(self.end.row);
        let left = self.start.column.min(self.end.column);
        let right = self.start.column.max(self.end.column);
        (top, left, bottom, right)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Literal(CalcValue),
    Reference(CellAddress),
    Range(AstRange),
    UnaryOp {
        op: UnaryOperator,
        operand: Box<AstNode>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<AstNode>,
        right: Box<AstNode>,
    },
    FunctionCall {
        /// Always upper-case (spec §4.C: "Function names are uppercased
        /// before lookup").
        name: String,
        args: Vec<AstNode>,
    },
}

impl AstNode {
    /// Post-order walk collecting every dependency this node (and its
    /// children) reaches: a `Reference` contributes its own address, a
    /// `Range` contributes every address in its inclusive rectangle, and
    /// function/operator children propagate their sets upward (spec
    /// §4.C).
    pub fn collect_dependencies(&self, out: &mut FxHashSet<CellAddressKey>, addrs: &mut Vec<CellAddress>) {
        match self {
            AstNode::Literal(_) => {}
            AstNode::Reference(addr) => {
                if out.insert(addr.key()) {
                    addrs.push(addr.clone());
                }
            }
            AstNode::Range(range) => {
                let (top, left, bottom, right) = range.bounds();
                for row in top..=bottom {
                    for col in left..=right {
                        let addr = CellAddress::new(
                            range.start.sheet_id,
                            range.start.sheet_name.clone(),
                            row,
                            col,
                        );
                        if out.insert(addr.key()) {
                            addrs.push(addr);
                        }
                    }
                }
            }
            AstNode::UnaryOp { operand, .. } => operand.collect_dependencies(out, addrs),
            AstNode::BinaryOp { left, right, .. } => {
                left.collect_dependencies(out, addrs);
                right.collect_dependencies(out, addrs);
            }
            AstNode::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_dependencies(out, addrs);
                }
            }
        }
    }
}

/// The result of parsing one formula's text: its AST plus the fully
/// expanded dependency set (a range contributes every address it
/// covers, matching what the evaluator needs ready before a dependent
/// cell can compute). The dependency builder (sheetcalc-eval) attaches
/// the cell's own address to produce a `ParsedFormula`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub ast: AstNode,
    pub dependencies: FxHashSet<CellAddressKey>,
    pub dependency_addresses: Vec<CellAddress>,
}

impl ParseOutput {
    pub fn new(ast: AstNode) -> Self {
        let mut dependencies = FxHashSet::default();
        let mut dependency_addresses = Vec::new();
        ast.collect_dependencies(&mut dependencies, &mut dependency_addresses);
        ParseOutput {
            ast,
            dependencies,
            dependency_addresses,
        }
    }
}
