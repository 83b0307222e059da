//! Aggregation built-ins (spec §4.F "Aggregation"): `SUM`, `AVERAGE`,
//! `MIN`, `MAX`, `COUNT`, `PRODUCT`, `COUNTA`, plus the two
//! option-dispatching wrappers `AGGREGATE` and `SUBTOTAL`.

use sheetcalc_common::{CalcError, CalcValue};

use crate::function::{EagerFunction, FunctionDefinition};
use crate::helpers::Helpers;

/// Flatten every argument and return the first error encountered, if
/// any, so callers can short-circuit before doing real work.
fn first_error(flat: &[CalcValue]) -> Option<CalcError> {
    flat.iter().find_map(|v| v.error().cloned())
}

fn numeric_only(flat: &[CalcValue]) -> Vec<f64> {
    flat.iter()
        .filter_map(|v| match v {
            CalcValue::Number(n) => Some(*n),
            _ => None,
        })
        .collect()
}

struct SumFn;
impl EagerFunction for SumFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        if let Some(e) = first_error(&flat) {
            return CalcValue::Error(e);
        }
        CalcValue::Number(numeric_only(&flat).into_iter().sum())
    }
}

struct AverageFn;
impl EagerFunction for AverageFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        if let Some(e) = first_error(&flat) {
            return CalcValue::Error(e);
        }
        let nums = numeric_only(&flat);
        if nums.is_empty() {
            return CalcValue::Error(CalcError::value("AVERAGE requires at least one number"));
        }
        CalcValue::Number(nums.iter().sum::<f64>() / nums.len() as f64)
    }
}

struct MinFn;
impl EagerFunction for MinFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        if let Some(e) = first_error(&flat) {
            return CalcValue::Error(e);
        }
        let nums = numeric_only(&flat);
        match nums.into_iter().fold(None, |acc: Option<f64>, n| {
            Some(acc.map_or(n, |m| m.min(n)))
        }) {
            Some(n) => CalcValue::Number(n),
            None => CalcValue::Error(CalcError::value("MIN requires at least one number")),
        }
    }
}

struct MaxFn;
impl EagerFunction for MaxFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        if let Some(e) = first_error(&flat) {
            return CalcValue::Error(e);
        }
        let nums = numeric_only(&flat);
        match nums.into_iter().fold(None, |acc: Option<f64>, n| {
            Some(acc.map_or(n, |m| m.max(n)))
        }) {
            Some(n) => CalcValue::Number(n),
            None => CalcValue::Error(CalcError::value("MAX requires at least one number")),
        }
    }
}

struct ProductFn;
impl EagerFunction for ProductFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        if let Some(e) = first_error(&flat) {
            return CalcValue::Error(e);
        }
        let nums = numeric_only(&flat);
        if nums.is_empty() {
            return CalcValue::Error(CalcError::value("PRODUCT requires at least one number"));
        }
        CalcValue::Number(nums.into_iter().product())
    }
}

struct CountFn;
impl EagerFunction for CountFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        if let Some(e) = first_error(&flat) {
            return CalcValue::Error(e);
        }
        CalcValue::Number(numeric_only(&flat).len() as f64)
    }
}

struct CountaFn;
impl EagerFunction for CountaFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        if let Some(e) = first_error(&flat) {
            return CalcValue::Error(e);
        }
        CalcValue::Number(flat.iter().filter(|v| !v.is_blank()).count() as f64)
    }
}

/// Sample variance: `#DIV/0!` with fewer than two numbers.
fn variance(nums: &[f64], population: bool) -> Result<f64, CalcError> {
    let n = nums.len();
    let min_n = if population { 1 } else { 2 };
    if n < min_n {
        return Err(CalcError::div_zero("not enough numbers to compute variance"));
    }
    let mean = nums.iter().sum::<f64>() / n as f64;
    let sum_sq: f64 = nums.iter().map(|x| (x - mean).powi(2)).sum();
    let denom = if population { n as f64 } else { (n - 1) as f64 };
    Ok(sum_sq / denom)
}

/// One of the eleven function numbers `AGGREGATE`/`SUBTOTAL` dispatch on
/// (spec §4.F: "1–11 mapped to {AVERAGE,COUNT,COUNTA,MAX,MIN,PRODUCT,
/// STDEV,STDEVP,SUM,VAR,VARP}").
fn apply_subtotal_function(fn_number: i64, nums: &[f64], non_blank_count: usize, sum_errors: Option<CalcError>) -> Result<CalcValue, CalcError> {
    if let Some(e) = sum_errors {
        return Err(e);
    }
    match fn_number {
        1 => {
            if nums.is_empty() {
                Err(CalcError::value("AVERAGE requires at least one number"))
            } else {
                Ok(CalcValue::Number(nums.iter().sum::<f64>() / nums.len() as f64))
            }
        }
        2 => Ok(CalcValue::Number(nums.len() as f64)),
        3 => Ok(CalcValue::Number(non_blank_count as f64)),
        4 => nums
            .iter()
            .cloned()
            .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |m| m.max(n))))
            .map(CalcValue::Number)
            .ok_or_else(|| CalcError::value("MAX requires at least one number")),
        5 => nums
            .iter()
            .cloned()
            .fold(None, |acc: Option<f64>, n| Some(acc.map_or(n, |m| m.min(n))))
            .map(CalcValue::Number)
            .ok_or_else(|| CalcError::value("MIN requires at least one number")),
        6 => {
            if nums.is_empty() {
                Err(CalcError::value("PRODUCT requires at least one number"))
            } else {
                Ok(CalcValue::Number(nums.iter().product()))
            }
        }
        7 => variance(nums, false).map(|v| CalcValue::Number(v.sqrt())),
        8 => variance(nums, true).map(|v| CalcValue::Number(v.sqrt())),
        9 => Ok(CalcValue::Number(nums.iter().sum())),
        10 => variance(nums, false).map(CalcValue::Number),
        11 => variance(nums, true).map(CalcValue::Number),
        _ => Err(CalcError::value(format!("unsupported function number {fn_number}"))),
    }
}

struct SubtotalFn;
impl EagerFunction for SubtotalFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let fn_number = match helpers.require_integer(&args[0], "SUBTOTAL function number") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        let flat = helpers.flatten_arguments(&args[1..]);
        if let Some(e) = first_error(&flat) {
            return CalcValue::Error(e);
        }
        let nums = numeric_only(&flat);
        let non_blank = flat.iter().filter(|v| !v.is_blank()).count();
        match apply_subtotal_function(fn_number, &nums, non_blank, None) {
            Ok(v) => v,
            Err(e) => CalcValue::Error(e),
        }
    }
}

struct AggregateFn;
impl EagerFunction for AggregateFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let fn_number = match helpers.require_integer(&args[0], "AGGREGATE function number") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        let option = match helpers.require_integer(&args[1], "AGGREGATE options") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        if option != 0 && option != 6 {
            return CalcValue::Error(CalcError::value(format!("AGGREGATE option {option} is not supported")));
        }
        let flat = helpers.flatten_arguments(&args[2..]);
        let ignore_errors = option == 6;
        let sum_errors = if ignore_errors { None } else { first_error(&flat) };
        let usable: Vec<&CalcValue> = if ignore_errors {
            flat.iter().filter(|v| !v.is_error()).collect()
        } else {
            flat.iter().collect()
        };
        let nums: Vec<f64> = usable
            .iter()
            .filter_map(|v| match v {
                CalcValue::Number(n) => Some(*n),
                _ => None,
            })
            .collect();
        let non_blank = usable.iter().filter(|v| !v.is_blank()).count();
        match apply_subtotal_function(fn_number, &nums, non_blank, sum_errors) {
            Ok(v) => v,
            Err(e) => CalcValue::Error(e),
        }
    }
}

pub fn register_builtins(register: &dyn Fn(FunctionDefinition)) {
    register(FunctionDefinition::eager("SUM", 0, None, SumFn));
    register(FunctionDefinition::eager("AVERAGE", 1, None, AverageFn));
    register(FunctionDefinition::eager("MIN", 1, None, MinFn));
    register(FunctionDefinition::eager("MAX", 1, None, MaxFn));
    register(FunctionDefinition::eager("PRODUCT", 1, None, ProductFn));
    register(FunctionDefinition::eager("COUNT", 0, None, CountFn));
    register(FunctionDefinition::eager("COUNTA", 0, None, CountaFn));
    register(FunctionDefinition::eager("SUBTOTAL", 2, None, SubtotalFn));
    register(FunctionDefinition::eager("AGGREGATE", 3, None, AggregateFn));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> CalcValue {
        CalcValue::Number(v)
    }

    #[test]
    fn sum_of_empty_is_zero() {
        let r = SumFn.evaluate(&[], &Helpers);
        assert_eq!(r, CalcValue::Number(0.0));
    }

    #[test]
    fn average_of_empty_is_value_error() {
        let r = AverageFn.evaluate(&[], &Helpers);
        assert!(r.is_error());
    }

    #[test]
    fn sum_ignores_text_in_flattened_array() {
        let arr = CalcValue::Array(vec![vec![n(1.0), CalcValue::Text("x".into())], vec![n(2.0), CalcValue::Blank]]);
        let r = SumFn.evaluate(&[arr], &Helpers);
        assert_eq!(r, CalcValue::Number(3.0));
    }

    #[test]
    fn aggregate_option_six_ignores_errors() {
        let values = vec![
            n(1.0),
            CalcValue::Error(CalcError::div_zero("x")),
            n(2.0),
        ];
        let args = vec![n(9.0), n(6.0), CalcValue::Array(vec![values])];
        let r = AggregateFn.evaluate(&args, &Helpers);
        assert_eq!(r, CalcValue::Number(3.0));
    }

    #[test]
    fn aggregate_unsupported_option_is_value_error() {
        let args = vec![n(9.0), n(3.0), n(1.0)];
        let r = AggregateFn.evaluate(&args, &Helpers);
        assert!(r.is_error());
    }

    #[test]
    fn subtotal_maps_function_number_to_average() {
        let args = vec![n(1.0), n(2.0), n(4.0)];
        let r = SubtotalFn.evaluate(&args, &Helpers);
        assert_eq!(r, CalcValue::Number(3.0));
    }
}
