//! Recursive-descent parser: formula text -> [`AstNode`], with reference
//! leaves resolved eagerly against the workbook index (spec §4.C).
//!
//! Precedence, lowest to highest: comparison `= <> < <= > >=`; concat
//! `&`; additive `+ -`; multiplicative `* /`; exponent `^`
//! (right-associative); unary `+ - %` (postfix for `%`); primary. Unary
//! binds *tighter* than exponent, matching Excel's `-2^2 == 4`.

use sheetcalc_common::{CalcError, CalcValue, CellAddress};

use crate::ast::{AstNode, AstRange, BinaryOperator, ParseOutput, UnaryOperator};
use crate::reference_syntax::{parse_reference_at, ParseContext};
use crate::tokenizer::{tokenize, Token, TokenKind};

struct Parser<'a, 'b> {
    tokens: Vec<Token>,
    pos: usize,
    ctx: &'a ParseContext<'b>,
}

impl<'a, 'b> Parser<'a, 'b> {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<TokenKind> {
        let kind = self.tokens.get(self.pos).map(|t| t.kind.clone());
        if kind.is_some() {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<(), CalcError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(CalcError::value(format!(
                "expected {expected}, found {}",
                self.peek().map(|k| k.to_string()).unwrap_or_else(|| "end of formula".into())
            )))
        }
    }

    fn parse_comparison(&mut self) -> Result<AstNode, CalcError> {
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Eq) => BinaryOperator::Eq,
                Some(TokenKind::Ne) => BinaryOperator::Ne,
                Some(TokenKind::Lt) => BinaryOperator::Lt,
                Some(TokenKind::Le) => BinaryOperator::Le,
                Some(TokenKind::Gt) => BinaryOperator::Gt,
                Some(TokenKind::Ge) => BinaryOperator::Ge,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_concat()?;
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_concat(&mut self) -> Result<AstNode, CalcError> {
        let mut left = self.parse_additive()?;
        while matches!(self.peek(), Some(TokenKind::Ampersand)) {
            self.pos += 1;
            let right = self.parse_additive()?;
            left = AstNode::BinaryOp {
                op: BinaryOperator::Concat,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<AstNode, CalcError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinaryOperator::Add,
                Some(TokenKind::Minus) => BinaryOperator::Subtract,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<AstNode, CalcError> {
        let mut left = self.parse_exponent()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinaryOperator::Multiply,
                Some(TokenKind::Slash) => BinaryOperator::Divide,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_exponent()?;
            left = AstNode::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Right-associative; operands are unary expressions so a leading
    /// unary sign binds before the exponent applies.
    fn parse_exponent(&mut self) -> Result<AstNode, CalcError> {
        let base = self.parse_unary()?;
        if matches!(self.peek(), Some(TokenKind::Caret)) {
            self.pos += 1;
            let exponent = self.parse_exponent()?;
            Ok(AstNode::BinaryOp {
                op: BinaryOperator::Power,
                left: Box::new(base),
                right: Box::new(exponent),
            })
        } else {
            Ok(base)
        }
    }

    fn parse_unary(&mut self) -> Result<AstNode, CalcError> {
        let op = match self.peek() {
            Some(TokenKind::Plus) => Some(UnaryOperator::Plus),
            Some(TokenKind::Minus) => Some(UnaryOperator::Minus),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(AstNode::UnaryOp {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<AstNode, CalcError> {
        let mut node = self.parse_primary()?;
        while matches!(self.peek(), Some(TokenKind::Percent)) {
            self.pos += 1;
            node = AstNode::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(node),
            };
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<AstNode, CalcError> {
        match self.peek().cloned() {
            Some(TokenKind::Number(n)) => {
                self.pos += 1;
                Ok(AstNode::Literal(CalcValue::Number(n)))
            }
            Some(TokenKind::String(s)) => {
                self.pos += 1;
                Ok(AstNode::Literal(CalcValue::Text(s)))
            }
            Some(TokenKind::LParen) => {
                self.pos += 1;
                let inner = self.parse_comparison()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            Some(TokenKind::QuotedSheetName(_)) => self.parse_reference_or_range(),
            Some(TokenKind::Ident(name)) => {
                if name.eq_ignore_ascii_case("TRUE") {
                    self.pos += 1;
                    Ok(AstNode::Literal(CalcValue::Boolean(true)))
                } else if name.eq_ignore_ascii_case("FALSE") {
                    self.pos += 1;
                    Ok(AstNode::Literal(CalcValue::Boolean(false)))
                } else if matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::LParen)) {
                    self.parse_function_call(name)
                } else {
                    self.parse_reference_or_range()
                }
            }
            other => Err(CalcError::value(format!(
                "unexpected token {}",
                other.map(|k| k.to_string()).unwrap_or_else(|| "end of formula".into())
            ))),
        }
    }

    fn parse_function_call(&mut self, name: String) -> Result<AstNode, CalcError> {
        self.pos += 1; // ident
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(TokenKind::RParen)) {
            loop {
                args.push(self.parse_comparison()?);
                if matches!(self.peek(), Some(TokenKind::Comma)) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(AstNode::FunctionCall {
            name: name.to_uppercase(),
            args,
        })
    }

    fn parse_reference_or_range(&mut self) -> Result<AstNode, CalcError> {
        let parsed = parse_reference_at(&self.tokens, &mut self.pos, self.ctx)?;
        match parsed.end {
            Some(end) => Ok(AstNode::Range(AstRange {
                start: CellAddress::new(parsed.sheet_id, parsed.sheet_name.clone(), parsed.start.0, parsed.start.1),
                end: CellAddress::new(parsed.sheet_id, parsed.sheet_name, end.0, end.1),
            })),
            None => Ok(AstNode::Reference(CellAddress::new(
                parsed.sheet_id,
                parsed.sheet_name,
                parsed.start.0,
                parsed.start.1,
            ))),
        }
    }
}

/// Parse formula text (with or without a leading `=`) into an AST plus
/// its expanded dependency set. References are resolved against
/// `ctx.workbook_index` as they're parsed; an unresolvable sheet name
/// fails the whole parse with `#NAME?`.
pub fn parse_formula(text: &str, ctx: &ParseContext) -> Result<ParseOutput, CalcError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CalcError::value("formula text is empty"));
    }
    let body = trimmed.strip_prefix('=').unwrap_or(trimmed);
    if body.trim().is_empty() {
        return Err(CalcError::value("formula text is empty"));
    }
    let tokens = tokenize(body).map_err(|e| CalcError::value(e.message))?;
    let mut parser = Parser { tokens, pos: 0, ctx };
    let ast = parser.parse_comparison()?;
    if parser.pos != parser.tokens.len() {
        return Err(CalcError::value("trailing tokens after formula expression"));
    }
    Ok(ParseOutput::new(ast))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetcalc_common::{SheetSnapshot, WorkbookIndex};

    fn index() -> WorkbookIndex {
        WorkbookIndex::build(&[
            SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![],
            },
            SheetSnapshot {
                id: 2,
                name: "Sheet 2".into(),
                index: 1,
                cells: vec![],
            },
        ])
    }

    fn ctx(idx: &WorkbookIndex) -> ParseContext<'_> {
        ParseContext {
            default_sheet_id: 1,
            default_sheet_name: "Sheet1",
            workbook_index: idx,
        }
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let idx = index();
        let out = parse_formula("=1+2*3", &ctx(&idx)).unwrap();
        match out.ast {
            AstNode::BinaryOp { op: BinaryOperator::Add, right, .. } => {
                assert!(matches!(*right, AstNode::BinaryOp { op: BinaryOperator::Multiply, .. }));
            }
            other => panic!("unexpected ast {other:?}"),
        }
    }

    #[test]
    fn unary_minus_binds_tighter_than_exponent() {
        // Excel quirk: -2^2 == 4, i.e. (-2)^2, not -(2^2).
        let idx = index();
        let out = parse_formula("=-2^2", &ctx(&idx)).unwrap();
        match out.ast {
            AstNode::BinaryOp { op: BinaryOperator::Power, left, .. } => {
                assert!(matches!(*left, AstNode::UnaryOp { op: UnaryOperator::Minus, .. }));
            }
            other => panic!("unexpected ast {other:?}"),
        }
    }

    #[test]
    fn exponent_is_right_associative() {
        let idx = index();
        let out = parse_formula("=2^3^2", &ctx(&idx)).unwrap();
        match out.ast {
            AstNode::BinaryOp { op: BinaryOperator::Power, right, .. } => {
                assert!(matches!(*right, AstNode::BinaryOp { op: BinaryOperator::Power, .. }));
            }
            other => panic!("unexpected ast {other:?}"),
        }
    }

    #[test]
    fn dependencies_expand_ranges() {
        let idx = index();
        let out = parse_formula("=SUM(A1:B2)", &ctx(&idx)).unwrap();
        assert_eq!(out.dependencies.len(), 4);
    }

    #[test]
    fn function_names_are_uppercased() {
        let idx = index();
        let out = parse_formula("=sum(1,2)", &ctx(&idx)).unwrap();
        assert!(matches!(out.ast, AstNode::FunctionCall { ref name, .. } if name == "SUM"));
    }

    #[test]
    fn unresolved_sheet_name_is_name_error() {
        let idx = index();
        let err = parse_formula("=Missing!A1", &ctx(&idx)).unwrap_err();
        assert_eq!(err.kind, sheetcalc_common::CalcErrorKind::Name);
    }

    #[test]
    fn cross_sheet_reference_resolves_with_quotes() {
        let idx = index();
        let out = parse_formula("='Sheet 2'!A1 + 1", &ctx(&idx)).unwrap();
        match out.ast {
            AstNode::BinaryOp { left, .. } => {
                assert!(matches!(*left, AstNode::Reference(ref a) if a.sheet_id == 2));
            }
            other => panic!("unexpected ast {other:?}"),
        }
    }

    #[test]
    fn empty_formula_text_is_value_error() {
        let idx = index();
        let err = parse_formula("=   ", &ctx(&idx)).unwrap_err();
        assert_eq!(err.kind, sheetcalc_common::CalcErrorKind::Value);
    }
}
