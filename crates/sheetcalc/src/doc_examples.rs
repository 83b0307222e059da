//! Small end-to-end examples exercising the public API as a host
//! embedding this crate would, kept out of the main module tree so they
//! don't show up as part of the crate's public surface.

use crate::{evaluate, CalcValue, CellAddress, CellContent, CellSnapshot, EngineOptions, SheetSnapshot, WorkbookSnapshot};

/// Evaluate a single formula in an otherwise empty one-cell workbook and
/// return its result, for doc-comment snippets that only care about one
/// value.
fn eval_scalar(formula: &str) -> CalcValue {
    let snapshot = WorkbookSnapshot {
        sheets: vec![SheetSnapshot {
            id: 1,
            name: "Sheet1".into(),
            index: 0,
            cells: vec![CellSnapshot { row: 0, column: 0, content: CellContent::Formula(formula.into()) }],
        }],
    };
    let outcome = evaluate(&snapshot, &EngineOptions::default());
    outcome.results[&CellAddress::new(1, "Sheet1", 0, 0).key()].clone()
}

#[test]
fn eval_scalar_runs_a_single_formula() {
    assert_eq!(eval_scalar("=SUM(1,2,3)"), CalcValue::Number(6.0));
}

#[test]
fn eval_scalar_propagates_builtin_errors() {
    assert!(eval_scalar("=1/0").is_error());
}
