//! Embeddable spreadsheet formula engine core.
//!
//! This crate wires the three layers below into the single pipeline a
//! host application calls for one evaluation pass: a [`WorkbookSnapshot`]
//! goes in, a `CellAddressKey -> CalcValue` result map (plus a
//! dependency trace) comes out.
//!
//! ```text
//! WorkbookSnapshot -> sheetcalc-parse (tokenize/parse formulas)
//!                   -> sheetcalc-eval (build dependency graph, evaluate)
//!                   -> EvaluationOutcome { results, depends_on }
//! ```
//!
//! Downstream users needing the individual layers (to pre-parse a
//! formula for validation, say, or to inspect the raw dependency graph)
//! can reach them through the [`parse`] and [`eval`] module re-exports
//! rather than depending on `sheetcalc-parse`/`sheetcalc-eval` directly.

pub mod common {
    pub use sheetcalc_common::*;
}

pub mod parse {
    pub use sheetcalc_parse::*;
}

pub mod eval {
    pub use sheetcalc_eval::*;
}

pub use sheetcalc_common::{
    CalcError, CalcErrorKind, CalcValue, Cell, CellAddress, CellAddressKey, CellContent,
    CellSnapshot, SheetDescriptor, SheetId, SheetSnapshot, WorkbookIndex, WorkbookSnapshot,
};
pub use sheetcalc_eval::{
    evaluate_workbook, register_function, ClockProvider, EngineOptions, EvaluationOutcome,
    FunctionBody, FunctionDefinition, FunctionMeta, SystemClock, UnknownFunctionPolicy,
};

/// Run one evaluation pass end to end: parse every formula cell, build
/// the dependency graph, and evaluate it (spec §6 "External Interfaces").
///
/// This is a thin convenience wrapper — [`sheetcalc_eval::evaluate_workbook`]
/// already performs the whole parse/build/evaluate pipeline, so this
/// exists only so callers embedding just this top-level crate don't need
/// to know which inner crate owns the entry point.
pub fn evaluate(snapshot: &WorkbookSnapshot, options: &EngineOptions) -> EvaluationOutcome {
    evaluate_workbook(snapshot, options)
}

#[cfg(test)]
mod doc_examples;

#[cfg(test)]
mod tests {
    use super::*;
    use sheetcalc_common::{CellContent, SheetSnapshot};

    #[test]
    fn end_to_end_pipeline_resolves_a_formula() {
        let snapshot = WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![
                    CellSnapshot { row: 0, column: 0, content: CellContent::Formula("=SUM(B1:B2)".into()) },
                    CellSnapshot { row: 0, column: 1, content: CellContent::Value(CalcValue::Number(4.0)) },
                    CellSnapshot { row: 1, column: 1, content: CellContent::Value(CalcValue::Number(6.0)) },
                ],
            }],
        };
        let outcome = evaluate(&snapshot, &EngineOptions::default());
        let a1 = CellAddress::new(1, "Sheet1", 0, 0).key();
        assert_eq!(outcome.results[&a1], CalcValue::Number(10.0));
        assert!(outcome.depends_on.contains_key(&a1));
    }
}
