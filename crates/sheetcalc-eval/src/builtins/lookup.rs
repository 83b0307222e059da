//! Lookup & reference built-ins (spec §4.F "Lookup"): `HLOOKUP`,
//! `VLOOKUP`, `LOOKUP`, `MATCH`, `INDEX`, `CHOOSE`, `OFFSET`, `INDIRECT`.
//!
//! `CHOOSE`, `OFFSET` and `INDIRECT` are lazy — they need the raw AST
//! node (to skip unselected branches, or to do coordinate/text math on a
//! reference without evaluating the cells it covers) rather than an
//! already-computed value (spec §4.E).

use sheetcalc_common::{CalcError, CalcValue};
use sheetcalc_parse::AstNode;

use crate::engine::offset_bounds;
use crate::function::{node_reference_bounds, EagerFunction, FunctionDefinition, LazyContext, LazyFunction};
use crate::helpers::Helpers;

/// Ordering for approximate lookup/match: numbers compare numerically,
/// text compares case-insensitively, booleans as 0/1. `None` when the
/// two values aren't comparable (different types), matching the
/// contract that approximate lookup requires a homogeneous vector.
fn cmp_for_lookup(a: &CalcValue, b: &CalcValue) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (CalcValue::Number(x), CalcValue::Number(y)) => x.partial_cmp(y),
        (CalcValue::Text(x), CalcValue::Text(y)) => Some(x.to_uppercase().cmp(&y.to_uppercase())),
        (CalcValue::Boolean(x), CalcValue::Boolean(y)) => Some((*x as u8).cmp(&(*y as u8))),
        _ => None,
    }
}

/// Largest value `<= needle`, scanning left to right (spec: "never
/// wraps"; sortedness is a contract, not enforced — §9 Open Question c).
fn largest_le(haystack: &[CalcValue], needle: &CalcValue) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in haystack.iter().enumerate() {
        if let Some(ord) = cmp_for_lookup(v, needle) {
            if ord != std::cmp::Ordering::Greater {
                best = Some(i);
            }
        }
    }
    best
}

/// Smallest value `>= needle` (used by `MATCH` type `-1`).
fn smallest_ge(haystack: &[CalcValue], needle: &CalcValue) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, v) in haystack.iter().enumerate() {
        if let Some(ord) = cmp_for_lookup(v, needle) {
            if ord != std::cmp::Ordering::Less && best.is_none() {
                best = Some(i);
            }
        }
    }
    best
}

fn exact_index(haystack: &[CalcValue], needle: &CalcValue, helpers: &Helpers) -> Option<usize> {
    haystack.iter().position(|v| helpers.compare_primitive_equality(v, needle))
}

fn as_rows(value: &CalcValue) -> Vec<Vec<CalcValue>> {
    match value {
        CalcValue::Array(rows) => rows.clone(),
        other => vec![vec![other.clone()]],
    }
}

struct HlookupFn;
impl EagerFunction for HlookupFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        hv_lookup(args, helpers, true)
    }
}

struct VlookupFn;
impl EagerFunction for VlookupFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        hv_lookup(args, helpers, false)
    }
}

/// Shared `HLOOKUP`/`VLOOKUP` body: `horizontal` selects whether the
/// lookup vector is the table's first row (HLOOKUP) or first column
/// (VLOOKUP), with `row_index`/`col_index` selecting the aligned result
/// from the other axis.
fn hv_lookup(args: &[CalcValue], helpers: &Helpers, horizontal: bool) -> CalcValue {
    let lookup_value = match helpers.coerce_scalar(&args[0], "lookup value") {
        Ok(v) => v,
        Err(e) => return CalcValue::Error(e),
    };
    if lookup_value.is_error() {
        return lookup_value;
    }
    let rows = as_rows(&args[1]);
    let index = match helpers.require_integer(&args[2], "index") {
        Ok(n) => n,
        Err(e) => return CalcValue::Error(e),
    };
    let range_lookup = match args.get(3) {
        Some(v) => match helpers.coerce_logical(v, "range_lookup") {
            Ok(b) => b,
            Err(e) => return CalcValue::Error(e),
        },
        None => true,
    };

    let (vector, axis_len): (Vec<CalcValue>, usize) = if horizontal {
        (rows.first().cloned().unwrap_or_default(), rows.len())
    } else {
        (rows.iter().map(|r| r.first().cloned().unwrap_or(CalcValue::Blank)).collect(), rows.first().map_or(0, |r| r.len()))
    };

    if index < 1 || index as usize > axis_len {
        return CalcValue::Error(CalcError::reference(format!("index {index} is out of range")));
    }
    let index = (index - 1) as usize;

    let found = if range_lookup {
        largest_le(&vector, &lookup_value)
    } else {
        exact_index(&vector, &lookup_value, helpers)
    };
    let Some(pos) = found else {
        return CalcValue::Error(CalcError::not_available("no match"));
    };

    if horizontal {
        rows.get(index).and_then(|r| r.get(pos)).cloned().unwrap_or(CalcValue::Blank)
    } else {
        rows.get(pos).and_then(|r| r.get(index)).cloned().unwrap_or(CalcValue::Blank)
    }
}

struct LookupFn;
impl EagerFunction for LookupFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let lookup_value = match helpers.coerce_scalar(&args[0], "lookup value") {
            Ok(v) => v,
            Err(e) => return CalcValue::Error(e),
        };
        if lookup_value.is_error() {
            return lookup_value;
        }
        let lookup_vector = helpers.flatten_result(&args[1]);
        let result_vector = match args.get(2) {
            Some(v) => helpers.flatten_result(v),
            None => lookup_vector.clone(),
        };
        if lookup_vector.len() != result_vector.len() {
            return CalcValue::Error(CalcError::value("LOOKUP vectors must be the same length"));
        }
        let found = exact_index(&lookup_vector, &lookup_value, helpers).or_else(|| largest_le(&lookup_vector, &lookup_value));
        match found {
            Some(i) => result_vector[i].clone(),
            None => CalcValue::Error(CalcError::not_available("no match")),
        }
    }
}

struct MatchFn;
impl EagerFunction for MatchFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let lookup_value = match helpers.coerce_scalar(&args[0], "lookup value") {
            Ok(v) => v,
            Err(e) => return CalcValue::Error(e),
        };
        if lookup_value.is_error() {
            return lookup_value;
        }
        let vector = helpers.flatten_result(&args[1]);
        let match_type = match args.get(2) {
            Some(v) => match helpers.require_integer(v, "match_type") {
                Ok(n) => n,
                Err(e) => return CalcValue::Error(e),
            },
            None => 1,
        };
        let found = match match_type {
            0 => exact_index(&vector, &lookup_value, helpers),
            1 => largest_le(&vector, &lookup_value),
            -1 => smallest_ge(&vector, &lookup_value),
            _ => return CalcValue::Error(CalcError::value("match_type must be -1, 0 or 1")),
        };
        match found {
            Some(i) => CalcValue::Number((i + 1) as f64),
            None => CalcValue::Error(CalcError::not_available("no match")),
        }
    }
}

struct IndexFn;
impl EagerFunction for IndexFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let rows = as_rows(&args[0]);
        let row = match args.get(1) {
            Some(v) => match helpers.require_integer(v, "row") {
                Ok(n) => n,
                Err(e) => return CalcValue::Error(e),
            },
            None => 0,
        };
        let col = match args.get(2) {
            Some(v) => match helpers.require_integer(v, "column") {
                Ok(n) => n,
                Err(e) => return CalcValue::Error(e),
            },
            None => 0,
        };
        if row < 0 || col < 0 {
            return CalcValue::Error(CalcError::reference("INDEX row/column must be >= 0"));
        }
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());

        if row == 0 && col == 0 {
            return if height == 1 && width == 1 {
                rows[0][0].clone()
            } else {
                CalcValue::Array(rows)
            };
        }
        if row == 0 {
            let col = col as usize;
            if col == 0 || col > width {
                return CalcValue::Error(CalcError::reference("INDEX column out of range"));
            }
            let column: Vec<Vec<CalcValue>> = rows.iter().map(|r| vec![r[col - 1].clone()]).collect();
            return if column.len() == 1 {
                column[0][0].clone()
            } else {
                CalcValue::Array(column)
            };
        }
        if col == 0 {
            let row = row as usize;
            if row == 0 || row > height {
                return CalcValue::Error(CalcError::reference("INDEX row out of range"));
            }
            let line = rows[row - 1].clone();
            return if line.len() == 1 {
                line[0].clone()
            } else {
                CalcValue::Array(vec![line])
            };
        }
        let (row, col) = (row as usize, col as usize);
        if row > height || col > width {
            return CalcValue::Error(CalcError::reference("INDEX index out of range"));
        }
        rows[row - 1][col - 1].clone()
    }
}

struct ChooseFn;
impl LazyFunction for ChooseFn {
    fn evaluate_lazy(&self, args: &[AstNode], ctx: &dyn LazyContext) -> CalcValue {
        let index_value = ctx.evaluate(&args[0]);
        if index_value.is_error() {
            return index_value;
        }
        let index = match ctx.helpers().require_integer(&index_value, "index") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        let choices = &args[1..];
        if index < 1 || index as usize > choices.len() {
            return CalcValue::Error(CalcError::value(format!("CHOOSE index {index} out of range")));
        }
        ctx.evaluate(&choices[(index - 1) as usize])
    }
}

struct OffsetFn;
impl LazyFunction for OffsetFn {
    fn evaluate_lazy(&self, args: &[AstNode], ctx: &dyn LazyContext) -> CalcValue {
        let base = match node_reference_bounds(&args[0]) {
            Ok(b) => b,
            Err(e) => return CalcValue::Error(e),
        };

        let rows = ctx.evaluate(&args[1]);
        if rows.is_error() {
            return rows;
        }
        let rows = match ctx.helpers().require_integer(&rows, "rows") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };

        let cols = ctx.evaluate(&args[2]);
        if cols.is_error() {
            return cols;
        }
        let cols = match ctx.helpers().require_integer(&cols, "cols") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };

        let height = match args.get(3) {
            Some(node) => {
                let v = ctx.evaluate(node);
                if v.is_error() {
                    return v;
                }
                match ctx.helpers().require_integer(&v, "height") {
                    Ok(n) if n > 0 => Some(n as u32),
                    Ok(_) => return CalcValue::Error(CalcError::reference("OFFSET height must be positive")),
                    Err(e) => return CalcValue::Error(e),
                }
            }
            None => None,
        };
        let width = match args.get(4) {
            Some(node) => {
                let v = ctx.evaluate(node);
                if v.is_error() {
                    return v;
                }
                match ctx.helpers().require_integer(&v, "width") {
                    Ok(n) if n > 0 => Some(n as u32),
                    Ok(_) => return CalcValue::Error(CalcError::reference("OFFSET width must be positive")),
                    Err(e) => return CalcValue::Error(e),
                }
            }
            None => None,
        };

        let bounds = match offset_bounds(base, rows, cols, height, width) {
            Ok(b) => b,
            Err(e) => return CalcValue::Error(e),
        };

        let sheet_name = sheet_name_of(&args[0]).unwrap_or_else(|| ctx.origin().sheet_name.clone());
        ctx.evaluate_range(bounds.sheet_id, &sheet_name, bounds.top, bounds.left, bounds.bottom, bounds.right)
    }
}

fn sheet_name_of(node: &AstNode) -> Option<String> {
    match node {
        AstNode::Reference(addr) => Some(addr.sheet_name.clone()),
        AstNode::Range(range) => Some(range.start.sheet_name.clone()),
        _ => None,
    }
}

struct IndirectFn;
impl LazyFunction for IndirectFn {
    fn evaluate_lazy(&self, args: &[AstNode], ctx: &dyn LazyContext) -> CalcValue {
        let text_value = ctx.evaluate(&args[0]);
        if text_value.is_error() {
            return text_value;
        }
        let text = match ctx.helpers().coerce_text(&text_value, "INDIRECT reference text") {
            Ok(t) => t,
            Err(e) => return CalcValue::Error(e),
        };

        let a1 = match args.get(1) {
            Some(node) => {
                let v = ctx.evaluate(node);
                if v.is_error() {
                    return v;
                }
                match ctx.helpers().coerce_logical(&v, "a1") {
                    Ok(b) => b,
                    Err(e) => return CalcValue::Error(e),
                }
            }
            None => true,
        };
        if !a1 {
            return CalcValue::Error(CalcError::value("INDIRECT only supports A1-style references"));
        }

        let (range, explicit_sheet) = match ctx.parse_reference_range(&text) {
            Ok(r) => r,
            Err(e) => return CalcValue::Error(e),
        };
        let sheet_name = explicit_sheet.unwrap_or_else(|| ctx.origin().sheet_name.clone());
        let sheet_id = if let Some(name) = &explicit_sheet {
            match ctx.sheet_id_by_name(name) {
                Some(id) => id,
                None => return CalcValue::Error(CalcError::reference(format!("unknown sheet '{name}'"))),
            }
        } else {
            ctx.origin().sheet_id
        };

        let ((top, left), (bottom, right)) = range.to_inclusive();
        ctx.evaluate_range(sheet_id, &sheet_name, top, left, bottom, right)
    }
}

pub fn register_builtins(register: &dyn Fn(FunctionDefinition)) {
    register(FunctionDefinition::eager("HLOOKUP", 3, Some(4), HlookupFn));
    register(FunctionDefinition::eager("VLOOKUP", 3, Some(4), VlookupFn));
    register(FunctionDefinition::eager("LOOKUP", 2, Some(3), LookupFn));
    register(FunctionDefinition::eager("MATCH", 2, Some(3), MatchFn));
    register(FunctionDefinition::eager("INDEX", 1, Some(3), IndexFn));
    register(FunctionDefinition::lazy("CHOOSE", 2, None, ChooseFn));
    register(FunctionDefinition::lazy("OFFSET", 3, Some(5), OffsetFn));
    register(FunctionDefinition::lazy("INDIRECT", 1, Some(2), IndirectFn));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> CalcValue {
        CalcValue::Number(v)
    }
    fn t(s: &str) -> CalcValue {
        CalcValue::Text(s.into())
    }

    fn table() -> CalcValue {
        CalcValue::Array(vec![vec![n(10.0), n(20.0), n(40.0), n(60.0)], vec![n(1.0), n(2.0), n(3.0), n(4.0)]])
    }

    #[test]
    fn hlookup_approximate_picks_largest_le() {
        let r = HlookupFn.evaluate(&[n(45.0), table(), n(2.0)], &Helpers);
        assert_eq!(r, n(3.0));
    }

    #[test]
    fn hlookup_exact_miss_is_na() {
        let r = HlookupFn.evaluate(&[t("x"), table(), n(2.0), CalcValue::Boolean(false)], &Helpers);
        assert_eq!(r.error().map(|e| e.kind), Some(sheetcalc_common::CalcErrorKind::Na));
    }

    #[test]
    fn vlookup_mirrors_hlookup_axes() {
        let vtable = CalcValue::Array(vec![vec![n(1.0), t("a")], vec![n(2.0), t("b")], vec![n(3.0), t("c")]]);
        let r = VlookupFn.evaluate(&[n(2.0), vtable, n(2.0), CalcValue::Boolean(false)], &Helpers);
        assert_eq!(r, t("b"));
    }

    #[test]
    fn match_exact_and_approximate() {
        let vector = CalcValue::Array(vec![vec![n(1.0), n(3.0), n(5.0)]]);
        assert_eq!(MatchFn.evaluate(&[n(3.0), vector.clone(), n(0.0)], &Helpers), n(2.0));
        assert_eq!(MatchFn.evaluate(&[n(4.0), vector, n(1.0)], &Helpers), n(2.0));
    }

    #[test]
    fn index_zero_row_returns_full_column() {
        let r = IndexFn.evaluate(&[table(), n(0.0), n(2.0)], &Helpers);
        assert_eq!(r, CalcValue::Array(vec![vec![n(20.0)], vec![n(2.0)]]));
    }

    #[test]
    fn lookup_vector_mismatch_is_value_error() {
        let lookup = CalcValue::Array(vec![vec![n(1.0), n(2.0)]]);
        let result = CalcValue::Array(vec![vec![t("a")]]);
        let r = LookupFn.evaluate(&[n(1.0), lookup, result], &Helpers);
        assert!(r.is_error());
    }
}
