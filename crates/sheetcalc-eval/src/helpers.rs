//! Coercion, flattening and comparison helpers shared by every built-in
//! (spec §4.E). Every built-in receives a `Helpers` handle rather than
//! reaching for free functions, so a future hot-reloadable registry
//! could swap the implementation without touching call sites.

use sheetcalc_common::{CalcError, CalcValue};

#[derive(Debug, Clone, Copy, Default)]
pub struct Helpers;

fn flatten_into(value: &CalcValue, out: &mut Vec<CalcValue>) {
    match value {
        CalcValue::Array(rows) => {
            for row in rows {
                for cell in row {
                    flatten_into(cell, out);
                }
            }
        }
        other => out.push(other.clone()),
    }
}

impl Helpers {
    /// Flatten every argument (scalar or 2-D array) into one 1-D list of
    /// scalars. Blanks are kept — callers that only want numbers filter
    /// them out themselves (spec: "dropping null-blank cells ... only
    /// when the caller re-filters").
    pub fn flatten_arguments(&self, args: &[CalcValue]) -> Vec<CalcValue> {
        let mut out = Vec::new();
        for arg in args {
            flatten_into(arg, &mut out);
        }
        out
    }

    /// Flatten a single argument to a 1-D list, preserving blanks.
    pub fn flatten_result(&self, arg: &CalcValue) -> Vec<CalcValue> {
        let mut out = Vec::new();
        flatten_into(arg, &mut out);
        out
    }

    /// Coerce a scalar to a number. Booleans become `0`/`1`; numeric
    /// text is parsed with a `.` decimal point; blank and empty string
    /// fail `#VALUE!`.
    pub fn require_number(&self, arg: &CalcValue, label: &str) -> Result<f64, CalcError> {
        match arg {
            CalcValue::Error(e) => Err(e.clone()),
            CalcValue::Number(n) => Ok(*n),
            CalcValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            CalcValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(CalcError::value(format!("{label} requires a number")));
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| CalcError::value(format!("'{s}' is not a number ({label})")))
            }
            CalcValue::Blank => Err(CalcError::value(format!("{label} requires a number"))),
            CalcValue::Array(_) => Err(CalcError::value(format!("{label} does not accept an array"))),
        }
    }

    /// Like [`require_number`](Self::require_number) but rejects
    /// non-integral values outright (no truncation).
    pub fn require_integer(&self, arg: &CalcValue, label: &str) -> Result<i64, CalcError> {
        let n = self.require_number(arg, label)?;
        if n.fract() != 0.0 {
            return Err(CalcError::value(format!("{label} requires an integer")));
        }
        Ok(n as i64)
    }

    /// Unwrap a 1x1 array to its single cell; reject larger arrays.
    pub fn coerce_scalar<'a>(&self, arg: &'a CalcValue, label: &str) -> Result<CalcValue, CalcError> {
        match arg {
            CalcValue::Array(rows) => {
                if rows.len() == 1 && rows[0].len() == 1 {
                    Ok(rows[0][0].clone())
                } else {
                    Err(CalcError::value(format!("{label} requires a single value")))
                }
            }
            other => Ok(other.clone()),
        }
    }

    /// Stringify a scalar: numbers with their shortest round-trip
    /// representation, booleans as `TRUE`/`FALSE`, blank as `""`.
    pub fn coerce_text(&self, arg: &CalcValue, label: &str) -> Result<String, CalcError> {
        match arg {
            CalcValue::Error(e) => Err(e.clone()),
            CalcValue::Text(s) => Ok(s.clone()),
            CalcValue::Number(n) => Ok(format_number(*n)),
            CalcValue::Boolean(b) => Ok(if *b { "TRUE".to_string() } else { "FALSE".to_string() }),
            CalcValue::Blank => Ok(String::new()),
            CalcValue::Array(_) => Err(CalcError::value(format!("{label} does not accept an array"))),
        }
    }

    /// Coerce to a boolean: numbers are `0 == false`, anything else
    /// non-zero is `true`; text must spell `TRUE`/`FALSE`
    /// case-insensitively.
    pub fn coerce_logical(&self, value: &CalcValue, label: &str) -> Result<bool, CalcError> {
        match value {
            CalcValue::Error(e) => Err(e.clone()),
            CalcValue::Boolean(b) => Ok(*b),
            CalcValue::Number(n) => Ok(*n != 0.0),
            CalcValue::Text(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(CalcError::value(format!("'{s}' is not a logical value ({label})")))
                }
            }
            CalcValue::Blank => Ok(false),
            CalcValue::Array(_) => Err(CalcError::value(format!("{label} does not accept an array"))),
        }
    }

    /// Strict equality on matching types; text comparison is
    /// case-insensitive; numbers compare with exact `==`. Values of
    /// different types are never equal.
    pub fn compare_primitive_equality(&self, a: &CalcValue, b: &CalcValue) -> bool {
        match (a, b) {
            (CalcValue::Number(x), CalcValue::Number(y)) => x == y,
            (CalcValue::Text(x), CalcValue::Text(y)) => x.eq_ignore_ascii_case(y),
            (CalcValue::Boolean(x), CalcValue::Boolean(y)) => x == y,
            (CalcValue::Blank, CalcValue::Blank) => true,
            (CalcValue::Error(x), CalcValue::Error(y)) => x.kind == y.kind,
            _ => false,
        }
    }
}

/// Shortest round-trip decimal formatting for a number, matching how a
/// spreadsheet cell displays a formula result (no trailing `.0` for
/// integral values).
pub fn format_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let mut s = format!("{n}");
        if !s.contains(['e', 'E']) && !s.contains('.') {
            s.push_str(".0");
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_number_coerces_booleans_and_text() {
        let h = Helpers;
        assert_eq!(h.require_number(&CalcValue::Boolean(true), "x").unwrap(), 1.0);
        assert_eq!(h.require_number(&CalcValue::Text("3.5".into()), "x").unwrap(), 3.5);
        assert!(h.require_number(&CalcValue::Blank, "x").is_err());
    }

    #[test]
    fn require_integer_rejects_fractional() {
        let h = Helpers;
        assert!(h.require_integer(&CalcValue::Number(2.5), "x").is_err());
        assert_eq!(h.require_integer(&CalcValue::Number(2.0), "x").unwrap(), 2);
    }

    #[test]
    fn flatten_arguments_descends_nested_arrays() {
        let h = Helpers;
        let arr = CalcValue::Array(vec![
            vec![CalcValue::Number(1.0), CalcValue::Number(2.0)],
            vec![CalcValue::Blank, CalcValue::Number(4.0)],
        ]);
        let flat = h.flatten_arguments(&[arr, CalcValue::Number(5.0)]);
        assert_eq!(flat.len(), 5);
    }

    #[test]
    fn compare_primitive_equality_is_case_insensitive_for_text() {
        let h = Helpers;
        assert!(h.compare_primitive_equality(&CalcValue::Text("Hi".into()), &CalcValue::Text("hi".into())));
        assert!(!h.compare_primitive_equality(&CalcValue::Number(1.0), &CalcValue::Text("1".into())));
    }
}
