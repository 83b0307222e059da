//! Spreadsheet error *values* — `#REF!`, `#VALUE!`, etc. These propagate
//! through evaluation as plain [`CalcValue::Error`] data, never as Rust
//! exceptions; see [`crate::value::CalcValue`].

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The error taxonomy a formula result can carry (spec §7).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalcErrorKind {
    /// Address/range invalid or out of bounds.
    Ref,
    /// Unknown function name, or unresolved bare name in a reference.
    Name,
    /// Type coercion failure, empty formula text, unsupported options.
    Value,
    /// Arithmetic or modulo division by zero.
    Div,
    /// Lookup miss, exact or approximate.
    Na,
    /// Dependency cycle member.
    Cycle,
}

impl fmt::Display for CalcErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CalcErrorKind::Ref => "#REF!",
            CalcErrorKind::Name => "#NAME?",
            CalcErrorKind::Value => "#VALUE!",
            CalcErrorKind::Div => "#DIV/0!",
            CalcErrorKind::Na => "#N/A",
            CalcErrorKind::Cycle => "#CYCLE!",
        })
    }
}

/// A formula error value: a kind plus an optional human-readable message
/// for tooltips. The rendering layer decides how (or whether) to show
/// `message`; the engine only ever compares/propagates on `kind`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CalcError {
    pub kind: CalcErrorKind,
    pub message: Option<String>,
}

impl CalcError {
    pub fn new(kind: CalcErrorKind) -> Self {
        CalcError { kind, message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn value(message: impl Into<String>) -> Self {
        CalcError::new(CalcErrorKind::Value).with_message(message)
    }

    pub fn reference(message: impl Into<String>) -> Self {
        CalcError::new(CalcErrorKind::Ref).with_message(message)
    }

    pub fn name(message: impl Into<String>) -> Self {
        CalcError::new(CalcErrorKind::Name).with_message(message)
    }

    pub fn div_zero(message: impl Into<String>) -> Self {
        CalcError::new(CalcErrorKind::Div).with_message(message)
    }

    pub fn not_available(message: impl Into<String>) -> Self {
        CalcError::new(CalcErrorKind::Na).with_message(message)
    }

    pub fn cycle() -> Self {
        CalcError::new(CalcErrorKind::Cycle)
    }
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CalcError {}

impl From<CalcErrorKind> for CalcError {
    fn from(kind: CalcErrorKind) -> Self {
        CalcError::new(kind)
    }
}
