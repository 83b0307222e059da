//! Logical built-ins (spec §4.F "Logical"): `AND`, `OR`, `NOT` (eager),
//! `IF`, `IFS`, `IFERROR`, `SWITCH` (lazy — each needs to skip branches
//! it doesn't take rather than evaluate every argument up front, spec
//! §4.E).

use sheetcalc_common::{CalcError, CalcValue};
use sheetcalc_parse::AstNode;

use crate::function::{EagerFunction, FunctionDefinition, LazyContext, LazyFunction};
use crate::helpers::Helpers;

struct AndFn;
impl EagerFunction for AndFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        let mut result = true;
        for v in &flat {
            match helpers.coerce_logical(v, "AND") {
                Ok(b) => result &= b,
                Err(e) => return CalcValue::Error(e),
            }
        }
        CalcValue::Boolean(result)
    }
}

struct OrFn;
impl EagerFunction for OrFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        let mut result = false;
        for v in &flat {
            match helpers.coerce_logical(v, "OR") {
                Ok(b) => result |= b,
                Err(e) => return CalcValue::Error(e),
            }
        }
        CalcValue::Boolean(result)
    }
}

struct NotFn;
impl EagerFunction for NotFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        match helpers.coerce_logical(&args[0], "NOT") {
            Ok(b) => CalcValue::Boolean(!b),
            Err(e) => CalcValue::Error(e),
        }
    }
}

struct IfFn;
impl LazyFunction for IfFn {
    fn evaluate_lazy(&self, args: &[AstNode], ctx: &dyn LazyContext) -> CalcValue {
        let cond = ctx.evaluate(&args[0]);
        if cond.is_error() {
            return cond;
        }
        let cond = match ctx.helpers().coerce_logical(&cond, "IF condition") {
            Ok(b) => b,
            Err(e) => return CalcValue::Error(e),
        };
        if cond {
            args.get(1).map_or(CalcValue::Boolean(true), |n| ctx.evaluate(n))
        } else {
            args.get(2).map_or(CalcValue::Boolean(false), |n| ctx.evaluate(n))
        }
    }
}

/// `IFS(cond1, value1, cond2, value2, ...)`: the first true condition's
/// paired value wins; no condition matching is `#N/A`.
struct IfsFn;
impl LazyFunction for IfsFn {
    fn evaluate_lazy(&self, args: &[AstNode], ctx: &dyn LazyContext) -> CalcValue {
        let mut pairs = args.chunks_exact(2);
        for pair in &mut pairs {
            let cond = ctx.evaluate(&pair[0]);
            if cond.is_error() {
                return cond;
            }
            let cond = match ctx.helpers().coerce_logical(&cond, "IFS condition") {
                Ok(b) => b,
                Err(e) => return CalcValue::Error(e),
            };
            if cond {
                return ctx.evaluate(&pair[1]);
            }
        }
        if !pairs.remainder().is_empty() {
            return CalcValue::Error(CalcError::value("IFS requires condition/value pairs"));
        }
        CalcValue::Error(CalcError::not_available("no IFS condition matched"))
    }
}

/// `IFERROR(value, value_if_error)`: evaluates `value` once; any error
/// result (not just `#N/A`) falls through to the second argument.
struct IferrorFn;
impl LazyFunction for IferrorFn {
    fn evaluate_lazy(&self, args: &[AstNode], ctx: &dyn LazyContext) -> CalcValue {
        let value = ctx.evaluate(&args[0]);
        if value.is_error() {
            ctx.evaluate(&args[1])
        } else {
            value
        }
    }
}

/// `IFNA(value, value_if_na)`: like `IFERROR` but only catches `#N/A`.
struct IfnaFn;
impl LazyFunction for IfnaFn {
    fn evaluate_lazy(&self, args: &[AstNode], ctx: &dyn LazyContext) -> CalcValue {
        let value = ctx.evaluate(&args[0]);
        match value.error() {
            Some(e) if e.kind == sheetcalc_common::CalcErrorKind::Na => ctx.evaluate(&args[1]),
            _ => value,
        }
    }
}

/// `SWITCH(expr, case1, result1, ..., [default])`: evaluates `expr`
/// once, compares it against each case in turn, and only evaluates the
/// matching (or default) result branch.
struct SwitchFn;
impl LazyFunction for SwitchFn {
    fn evaluate_lazy(&self, args: &[AstNode], ctx: &dyn LazyContext) -> CalcValue {
        let expr = ctx.evaluate(&args[0]);
        if expr.is_error() {
            return expr;
        }
        let rest = &args[1..];
        let pair_count = rest.len() / 2;
        for i in 0..pair_count {
            let case = ctx.evaluate(&rest[i * 2]);
            if case.is_error() {
                return case;
            }
            if ctx.helpers().compare_primitive_equality(&expr, &case) {
                return ctx.evaluate(&rest[i * 2 + 1]);
            }
        }
        if rest.len() % 2 == 1 {
            ctx.evaluate(&rest[rest.len() - 1])
        } else {
            CalcValue::Error(CalcError::not_available("no SWITCH case matched"))
        }
    }
}

pub fn register_builtins(register: &dyn Fn(FunctionDefinition)) {
    register(FunctionDefinition::eager("AND", 1, None, AndFn));
    register(FunctionDefinition::eager("OR", 1, None, OrFn));
    register(FunctionDefinition::eager("NOT", 1, Some(1), NotFn));
    register(FunctionDefinition::lazy("IF", 2, Some(3), IfFn));
    register(FunctionDefinition::lazy("IFS", 2, None, IfsFn));
    register(FunctionDefinition::lazy("IFERROR", 2, Some(2), IferrorFn));
    register(FunctionDefinition::lazy("IFNA", 2, Some(2), IfnaFn));
    register(FunctionDefinition::lazy("SWITCH", 3, None, SwitchFn));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_short_circuits_to_false_on_any_false() {
        let args = vec![CalcValue::Boolean(true), CalcValue::Boolean(false)];
        assert_eq!(AndFn.evaluate(&args, &Helpers), CalcValue::Boolean(false));
    }

    #[test]
    fn or_is_true_if_any_argument_true() {
        let args = vec![CalcValue::Boolean(false), CalcValue::Number(0.0), CalcValue::Number(1.0)];
        assert_eq!(OrFn.evaluate(&args, &Helpers), CalcValue::Boolean(true));
    }

    #[test]
    fn not_inverts_coerced_logical() {
        assert_eq!(NotFn.evaluate(&[CalcValue::Number(0.0)], &Helpers), CalcValue::Boolean(true));
    }
}
