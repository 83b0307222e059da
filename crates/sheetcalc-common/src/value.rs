//! [`CalcValue`]: the scalar/array result type every formula evaluates to.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::CalcError;

/// A formula evaluation result: a scalar (number, text, boolean, blank,
/// or error) or a rectangular 2-D array of the same. Matches the spec's
/// `FormulaEvaluationResult`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CalcValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// An empty/unset cell. Distinct from an empty string.
    Blank,
    /// Rectangular, outer index = row.
    Array(Vec<Vec<CalcValue>>),
    Error(CalcError),
}

/// Alias matching the spec's glossary name for this type.
pub type FormulaEvaluationResult = CalcValue;

impl CalcValue {
    pub fn is_error(&self) -> bool {
        matches!(self, CalcValue::Error(_))
    }

    /// The error carried by this value, if any.
    pub fn error(&self) -> Option<&CalcError> {
        match self {
            CalcValue::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, CalcValue::Blank)
    }

    /// Excel's truthiness coercion: numbers are truthy iff non-zero, text
    /// is never truthy on its own (callers should go through
    /// `coerce_logical` first), blanks are falsy.
    pub fn is_truthy_number(&self) -> Option<bool> {
        match self {
            CalcValue::Number(n) => Some(*n != 0.0),
            CalcValue::Boolean(b) => Some(*b),
            CalcValue::Blank => Some(false),
            _ => None,
        }
    }

    /// 1x1 arrays behave as their sole scalar in most contexts.
    pub fn unwrap_1x1(self) -> CalcValue {
        match &self {
            CalcValue::Array(rows) if rows.len() == 1 && rows[0].len() == 1 => {
                if let CalcValue::Array(mut rows) = self {
                    rows.remove(0).remove(0)
                } else {
                    unreachable!()
                }
            }
            _ => self,
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            CalcValue::Array(rows) => {
                let cols = rows.first().map(|r| r.len()).unwrap_or(0);
                (rows.len(), cols)
            }
            _ => (1, 1),
        }
    }
}

impl fmt::Display for CalcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcValue::Number(n) => write!(f, "{n}"),
            CalcValue::Text(s) => write!(f, "{s}"),
            CalcValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CalcValue::Blank => write!(f, ""),
            CalcValue::Array(_) => write!(f, "#ARRAY"),
            CalcValue::Error(e) => write!(f, "{e}"),
        }
    }
}

impl From<f64> for CalcValue {
    fn from(value: f64) -> Self {
        CalcValue::Number(value)
    }
}

impl From<bool> for CalcValue {
    fn from(value: bool) -> Self {
        CalcValue::Boolean(value)
    }
}

impl From<String> for CalcValue {
    fn from(value: String) -> Self {
        CalcValue::Text(value)
    }
}

impl From<CalcError> for CalcValue {
    fn from(err: CalcError) -> Self {
        CalcValue::Error(err)
    }
}
