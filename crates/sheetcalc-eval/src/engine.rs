//! The evaluation engine (spec §4.G/§4.H): computes a
//! `CellAddressKey -> CalcValue` result map from a dependency tree and
//! parsed-formula map via depth-first post-order traversal, detecting
//! cycles pointwise and memoising every cell's result for one pass.

use std::cell::RefCell;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};

use sheetcalc_common::{
    CalcError, CalcValue, CellAddress, CellAddressKey, CellContent, FormulaWorkbookGrid,
    WorkbookIndex, WorkbookSnapshot,
};
use sheetcalc_parse::{parse_reference_to_cell_range, AstNode, BinaryOperator, ParseContext, UnaryOperator};

use crate::function::{FunctionBody, LazyContext, ReferenceBounds};
use crate::graph::{build_dependency_graph, DependencyTree, ParsedFormula};
use crate::helpers::Helpers;
use crate::registry::get_function;

/// A deterministic clock hook (spec §1 Non-goals: "volatile-function
/// time sources beyond a deterministic clock hook"). Injected rather
/// than read ambiently, so a pass is reproducible.
pub trait ClockProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the wall clock. The default for native embedding; tests
/// typically inject a fixed-time provider instead.
pub struct SystemClock;

impl ClockProvider for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What happens when a formula calls a name the registry doesn't know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownFunctionPolicy {
    /// `#NAME?`, matching spec §7.
    NameError,
}

impl Default for UnknownFunctionPolicy {
    fn default() -> Self {
        UnknownFunctionPolicy::NameError
    }
}

/// Configuration passed by value into [`evaluate_workbook`] — no
/// environment variables, no config files, no CLI (spec §6).
pub struct EngineOptions {
    /// Guards against pathological snapshots; a build or evaluation
    /// pass that would touch more cells than this aborts with an
    /// internal [`CalcError`] rather than hanging.
    pub max_cells: usize,
    pub clock: Arc<dyn ClockProvider>,
    pub unknown_function_policy: UnknownFunctionPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            max_cells: 1_000_000,
            clock: Arc::new(SystemClock),
            unknown_function_policy: UnknownFunctionPolicy::default(),
        }
    }
}

/// The engine's output: one evaluation pass's result map plus the
/// dependency trace spec §6 allows observers to ask for.
pub struct EvaluationOutcome {
    pub results: FxHashMap<CellAddressKey, CalcValue>,
    pub depends_on: FxHashMap<CellAddressKey, Vec<CellAddressKey>>,
}

/// Parse every formula cell, build the dependency graph, and evaluate
/// every node to a final value (spec §4.G). This is the whole pipeline
/// the top-level `sheetcalc` crate wires up for one pass.
pub fn evaluate_workbook(snapshot: &WorkbookSnapshot, options: &EngineOptions) -> EvaluationOutcome {
    let index = WorkbookIndex::build(&snapshot.sheets);
    let grid = FormulaWorkbookGrid::build(&snapshot.sheets);

    #[cfg(feature = "tracing")]
    tracing::debug!(sheets = snapshot.sheets.len(), "building dependency graph");

    let build = build_dependency_graph(&grid, &index);

    if build.tree.len() > options.max_cells {
        #[cfg(feature = "tracing")]
        tracing::warn!(cells = build.tree.len(), max_cells = options.max_cells, "workbook exceeds max_cells, aborting pass");
        let abort = CalcError::value(format!(
            "workbook touches {} cells, exceeding the max_cells limit of {}",
            build.tree.len(),
            options.max_cells
        ));
        let results = build.tree.keys().map(|k| (k.clone(), CalcValue::Error(abort.clone()))).collect();
        let depends_on = build
            .tree
            .iter()
            .map(|(k, node)| (k.clone(), node.dependencies.iter().cloned().collect()))
            .collect();
        return EvaluationOutcome { results, depends_on };
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(cells = build.tree.len(), "evaluating workbook");

    let evaluator = Evaluator::new(&grid, &index, &build.tree, &build.parsed, &build.cell_errors, options);

    let keys: Vec<CellAddressKey> = build.tree.keys().cloned().collect();
    for key in &keys {
        evaluator.get_or_compute(key);
    }

    let depends_on = build
        .tree
        .iter()
        .map(|(k, node)| (k.clone(), node.dependencies.iter().cloned().collect()))
        .collect();

    EvaluationOutcome {
        results: evaluator.into_cache(),
        depends_on,
    }
}

struct Evaluator<'a> {
    grid: &'a FormulaWorkbookGrid,
    index: &'a WorkbookIndex,
    tree: &'a DependencyTree,
    parsed: &'a FxHashMap<CellAddressKey, ParsedFormula>,
    cell_errors: &'a FxHashMap<CellAddressKey, CalcError>,
    options: &'a EngineOptions,
    helpers: Helpers,
    cache: RefCell<FxHashMap<CellAddressKey, CalcValue>>,
    visiting_stack: RefCell<Vec<CellAddressKey>>,
    visiting_set: RefCell<FxHashSet<CellAddressKey>>,
}

impl<'a> Evaluator<'a> {
    fn new(
        grid: &'a FormulaWorkbookGrid,
        index: &'a WorkbookIndex,
        tree: &'a DependencyTree,
        parsed: &'a FxHashMap<CellAddressKey, ParsedFormula>,
        cell_errors: &'a FxHashMap<CellAddressKey, CalcError>,
        options: &'a EngineOptions,
    ) -> Self {
        Evaluator {
            grid,
            index,
            tree,
            parsed,
            cell_errors,
            options,
            helpers: Helpers,
            cache: RefCell::new(FxHashMap::default()),
            visiting_stack: RefCell::new(Vec::new()),
            visiting_set: RefCell::new(FxHashSet::default()),
        }
    }

    fn into_cache(self) -> FxHashMap<CellAddressKey, CalcValue> {
        self.cache.into_inner()
    }

    /// Depth-first post-order evaluation with pointwise cycle detection
    /// (spec §4.G): encountering a key already on the active stack marks
    /// every node from that cycle's entry point downward with
    /// `#CYCLE!`, not just the immediate pair.
    fn get_or_compute(&self, key: &CellAddressKey) -> CalcValue {
        if let Some(v) = self.cache.borrow().get(key) {
            return v.clone();
        }
        if self.visiting_set.borrow().contains(key) {
            #[cfg(feature = "tracing")]
            tracing::warn!(cell = %key, "dependency cycle detected");
            let stack = self.visiting_stack.borrow().clone();
            let start = stack.iter().position(|k| k == key).unwrap_or(0);
            let mut cache = self.cache.borrow_mut();
            for k in &stack[start..] {
                cache.insert(k.clone(), CalcValue::Error(CalcError::cycle()));
            }
            return CalcValue::Error(CalcError::cycle());
        }

        self.visiting_stack.borrow_mut().push(key.clone());
        self.visiting_set.borrow_mut().insert(key.clone());

        let computed = self.compute_node(key);

        self.visiting_stack.borrow_mut().pop();
        self.visiting_set.borrow_mut().remove(key);

        let mut cache = self.cache.borrow_mut();
        let final_value = cache.get(key).cloned().unwrap_or(computed);
        cache.insert(key.clone(), final_value.clone());
        final_value
    }

    fn compute_node(&self, key: &CellAddressKey) -> CalcValue {
        if let Some(err) = self.cell_errors.get(key) {
            return CalcValue::Error(err.clone());
        }
        if let Some(formula) = self.parsed.get(key) {
            return self.evaluate_ast(&formula.ast, &formula.address);
        }
        let Some(node) = self.tree.get(key) else {
            return CalcValue::Blank;
        };
        let Some(address) = &node.address else {
            return CalcValue::Blank;
        };
        match self.grid.get(address.sheet_id, address.row, address.column) {
            Some(cell) => match &cell.content {
                CellContent::Value(v) => v.clone(),
                CellContent::Formula(_) => unreachable!("formula cells are always present in `parsed` or `cell_errors`"),
            },
            None => CalcValue::Blank,
        }
    }

    fn evaluate_ast(&self, node: &AstNode, origin: &CellAddress) -> CalcValue {
        match node {
            AstNode::Literal(v) => v.clone(),
            AstNode::Reference(addr) => self.get_or_compute(&addr.key()),
            AstNode::Range(range) => self.evaluate_range_node(range, origin),
            AstNode::UnaryOp { op, operand } => self.evaluate_unary(*op, operand, origin),
            AstNode::BinaryOp { op, left, right } => self.evaluate_binary(*op, left, right, origin),
            AstNode::FunctionCall { name, args } => self.evaluate_function_call(name, args, origin),
        }
    }

    fn evaluate_range_node(&self, range: &sheetcalc_parse::AstRange, _origin: &CellAddress) -> CalcValue {
        let (top, left, bottom, right) = range.bounds();
        self.evaluate_range(range.start.sheet_id, &range.start.sheet_name, top, left, bottom, right)
    }

    fn evaluate_range(
        &self,
        sheet_id: sheetcalc_common::SheetId,
        sheet_name: &str,
        top: u32,
        left: u32,
        bottom: u32,
        right: u32,
    ) -> CalcValue {
        if top == bottom && left == right {
            let key = CellAddress::new(sheet_id, sheet_name, top, left).key();
            return self.get_or_compute(&key);
        }
        let mut rows = Vec::with_capacity((bottom - top + 1) as usize);
        for row in top..=bottom {
            let mut cols = Vec::with_capacity((right - left + 1) as usize);
            for col in left..=right {
                let key = CellAddress::new(sheet_id, sheet_name, row, col).key();
                cols.push(self.get_or_compute(&key));
            }
            rows.push(cols);
        }
        CalcValue::Array(rows)
    }

    fn evaluate_unary(&self, op: UnaryOperator, operand: &AstNode, origin: &CellAddress) -> CalcValue {
        let value = self.evaluate_ast(operand, origin);
        if value.is_error() {
            return value;
        }
        let n = match self.helpers.require_number(&value, "unary operator") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        match op {
            UnaryOperator::Plus => CalcValue::Number(n),
            UnaryOperator::Minus => CalcValue::Number(-n),
            UnaryOperator::Percent => CalcValue::Number(n / 100.0),
        }
    }

    fn evaluate_binary(&self, op: BinaryOperator, left: &AstNode, right: &AstNode, origin: &CellAddress) -> CalcValue {
        let lv = self.evaluate_ast(left, origin);
        if lv.is_error() {
            return lv;
        }
        let rv = self.evaluate_ast(right, origin);
        if rv.is_error() {
            return rv;
        }

        match op {
            BinaryOperator::Concat => {
                let a = match self.helpers.coerce_text(&lv, "&") {
                    Ok(a) => a,
                    Err(e) => return CalcValue::Error(e),
                };
                let b = match self.helpers.coerce_text(&rv, "&") {
                    Ok(b) => b,
                    Err(e) => return CalcValue::Error(e),
                };
                CalcValue::Text(a + &b)
            }
            BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Le
            | BinaryOperator::Gt
            | BinaryOperator::Ge => self.evaluate_comparison(op, &lv, &rv),
            _ => self.evaluate_arithmetic(op, &lv, &rv),
        }
    }

    fn evaluate_arithmetic(&self, op: BinaryOperator, lv: &CalcValue, rv: &CalcValue) -> CalcValue {
        let a = match self.helpers.require_number(lv, "arithmetic operator") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        let b = match self.helpers.require_number(rv, "arithmetic operator") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        match op {
            BinaryOperator::Add => CalcValue::Number(a + b),
            BinaryOperator::Subtract => CalcValue::Number(a - b),
            BinaryOperator::Multiply => CalcValue::Number(a * b),
            BinaryOperator::Divide => {
                if b == 0.0 {
                    CalcValue::Error(CalcError::div_zero("division by zero"))
                } else {
                    CalcValue::Number(a / b)
                }
            }
            BinaryOperator::Power => {
                if a == 0.0 && b < 0.0 {
                    CalcValue::Error(CalcError::div_zero("0 raised to a negative power"))
                } else {
                    CalcValue::Number(a.powf(b))
                }
            }
            _ => unreachable!("concat/comparison handled by caller"),
        }
    }

    fn evaluate_comparison(&self, op: BinaryOperator, lv: &CalcValue, rv: &CalcValue) -> CalcValue {
        use std::cmp::Ordering;

        let ordering = match (lv, rv) {
            (CalcValue::Number(a), CalcValue::Number(b)) => a.partial_cmp(b),
            (CalcValue::Boolean(a), CalcValue::Boolean(b)) => Some((*a as u8).cmp(&(*b as u8))),
            (CalcValue::Blank, CalcValue::Blank) => Some(Ordering::Equal),
            (CalcValue::Blank, CalcValue::Number(b)) => 0f64.partial_cmp(b),
            (CalcValue::Number(a), CalcValue::Blank) => a.partial_cmp(&0.0),
            _ => {
                let a = match self.helpers.coerce_text(lv, "comparison") {
                    Ok(a) => a,
                    Err(e) => return CalcValue::Error(e),
                };
                let b = match self.helpers.coerce_text(rv, "comparison") {
                    Ok(b) => b,
                    Err(e) => return CalcValue::Error(e),
                };
                Some(a.to_uppercase().cmp(&b.to_uppercase()))
            }
        };
        let Some(ordering) = ordering else {
            return CalcValue::Boolean(false);
        };
        let result = match op {
            BinaryOperator::Eq => ordering == Ordering::Equal,
            BinaryOperator::Ne => ordering != Ordering::Equal,
            BinaryOperator::Lt => ordering == Ordering::Less,
            BinaryOperator::Le => ordering != Ordering::Greater,
            BinaryOperator::Gt => ordering == Ordering::Greater,
            BinaryOperator::Ge => ordering != Ordering::Less,
            _ => unreachable!(),
        };
        CalcValue::Boolean(result)
    }

    fn evaluate_function_call(&self, name: &str, args: &[AstNode], origin: &CellAddress) -> CalcValue {
        let Some(def) = get_function(name) else {
            let _ = self.options.unknown_function_policy;
            return CalcValue::Error(CalcError::name(format!("unknown function {name}")));
        };
        if !def.arity_ok(args.len()) {
            return CalcValue::Error(CalcError::value(format!("{name} called with {} arguments", args.len())));
        }
        match &def.body {
            FunctionBody::Eager(f) => {
                let values: Vec<CalcValue> = args.iter().map(|a| self.evaluate_ast(a, origin)).collect();
                f.evaluate(&values, &self.helpers)
            }
            FunctionBody::Lazy(f) => {
                let ctx = EvalLazyContext {
                    evaluator: self,
                    origin: origin.clone(),
                };
                f.evaluate_lazy(args, &ctx)
            }
        }
    }
}

struct EvalLazyContext<'a, 'b> {
    evaluator: &'a Evaluator<'b>,
    origin: CellAddress,
}

impl<'a, 'b> LazyContext for EvalLazyContext<'a, 'b> {
    fn evaluate(&self, node: &AstNode) -> CalcValue {
        self.evaluator.evaluate_ast(node, &self.origin)
    }

    fn helpers(&self) -> &Helpers {
        &self.evaluator.helpers
    }

    fn origin(&self) -> &CellAddress {
        &self.origin
    }

    fn parse_reference(&self, text: &str) -> Result<CellAddress, CalcError> {
        let ctx = ParseContext {
            default_sheet_id: self.origin.sheet_id,
            default_sheet_name: &self.origin.sheet_name,
            workbook_index: self.evaluator.index,
        };
        sheetcalc_parse::parse_cell_reference(text, &ctx)
    }

    fn parse_reference_range(&self, text: &str) -> Result<(sheetcalc_common::CellRange, Option<String>), CalcError> {
        let ctx = ParseContext {
            default_sheet_id: self.origin.sheet_id,
            default_sheet_name: &self.origin.sheet_name,
            workbook_index: self.evaluator.index,
        };
        parse_reference_to_cell_range(text, &ctx)
    }

    fn evaluate_range(&self, sheet_id: sheetcalc_common::SheetId, sheet_name: &str, top: u32, left: u32, bottom: u32, right: u32) -> CalcValue {
        self.evaluator.evaluate_range(sheet_id, sheet_name, top, left, bottom, right)
    }

    fn sheet_id_by_name(&self, name: &str) -> Option<sheetcalc_common::SheetId> {
        self.evaluator.index.sheet_id_by_name(name)
    }
}

/// Derive the reference bounds `OFFSET` needs, then validate the
/// resulting rectangle is fully non-negative before constructing the
/// synthetic range (spec §4.F: "fails `#REF!` on negative indices").
pub fn offset_bounds(base: ReferenceBounds, rows: i64, cols: i64, height: Option<u32>, width: Option<u32>) -> Result<ReferenceBounds, CalcError> {
    let new_top = base.top as i64 + rows;
    let new_left = base.left as i64 + cols;
    if new_top < 0 || new_left < 0 {
        return Err(CalcError::reference("OFFSET resolves outside the grid"));
    }
    let height = height.unwrap_or_else(|| base.height());
    let width = width.unwrap_or_else(|| base.width());
    if height == 0 || width == 0 {
        return Err(CalcError::reference("OFFSET height/width must be positive"));
    }
    Ok(ReferenceBounds {
        sheet_id: base.sheet_id,
        top: new_top as u32,
        left: new_left as u32,
        bottom: new_top as u32 + height - 1,
        right: new_left as u32 + width - 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetcalc_common::{Cell, CellSnapshot, SheetSnapshot};

    fn cell_formula(row: u32, column: u32, text: &str) -> CellSnapshot {
        CellSnapshot {
            row,
            column,
            content: sheetcalc_common::CellContent::Formula(text.to_string()),
        }
    }

    fn cell_value(row: u32, column: u32, v: CalcValue) -> CellSnapshot {
        CellSnapshot {
            row,
            column,
            content: sheetcalc_common::CellContent::Value(v),
        }
    }

    #[test]
    fn arithmetic_and_references_resolve() {
        let snapshot = WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![cell_formula(0, 0, "=B1+1"), cell_value(0, 1, CalcValue::Number(2.0))],
            }],
        };
        let outcome = evaluate_workbook(&snapshot, &EngineOptions::default());
        let a1 = CellAddress::new(1, "Sheet1", 0, 0).key();
        assert_eq!(outcome.results[&a1], CalcValue::Number(3.0));
    }

    #[test]
    fn cycle_is_flagged_pointwise_and_other_cells_are_unaffected() {
        let snapshot = WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![
                    cell_formula(0, 0, "=B1+1"),
                    cell_formula(0, 1, "=A1+1"),
                    cell_value(0, 2, CalcValue::Number(5.0)),
                ],
            }],
        };
        let outcome = evaluate_workbook(&snapshot, &EngineOptions::default());
        let a1 = CellAddress::new(1, "Sheet1", 0, 0).key();
        let b1 = CellAddress::new(1, "Sheet1", 0, 1).key();
        let c1 = CellAddress::new(1, "Sheet1", 0, 2).key();
        assert!(outcome.results[&a1].is_error());
        assert!(outcome.results[&b1].is_error());
        assert_eq!(outcome.results[&c1], CalcValue::Number(5.0));
    }

    #[test]
    fn division_by_zero_is_div_error() {
        let snapshot = WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![cell_formula(0, 0, "=1/0")],
            }],
        };
        let outcome = evaluate_workbook(&snapshot, &EngineOptions::default());
        let a1 = CellAddress::new(1, "Sheet1", 0, 0).key();
        assert_eq!(outcome.results[&a1].error().map(|e| e.kind), Some(sheetcalc_common::CalcErrorKind::Div));
    }

    #[test]
    fn function_names_are_case_insensitive() {
        let snapshot = WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![cell_formula(0, 0, "=sum(1,2)"), cell_formula(0, 1, "=SUM(1,2)")],
            }],
        };
        let outcome = evaluate_workbook(&snapshot, &EngineOptions::default());
        let a1 = CellAddress::new(1, "Sheet1", 0, 0).key();
        let b1 = CellAddress::new(1, "Sheet1", 0, 1).key();
        assert_eq!(outcome.results[&a1], CalcValue::Number(3.0));
        assert_eq!(outcome.results[&b1], CalcValue::Number(3.0));
    }

    #[test]
    fn repeated_evaluation_is_pointwise_equal() {
        let snapshot = WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![cell_formula(0, 0, "=1+2*3")],
            }],
        };
        let first = evaluate_workbook(&snapshot, &EngineOptions::default());
        let second = evaluate_workbook(&snapshot, &EngineOptions::default());
        assert_eq!(first.results, second.results);
    }

    #[test]
    fn indirect_resolves_a_quoted_sheet_name() {
        let snapshot = WorkbookSnapshot {
            sheets: vec![
                SheetSnapshot {
                    id: 1,
                    name: "Sheet1".into(),
                    index: 0,
                    cells: vec![cell_formula(0, 0, "=INDIRECT(\"'Sheet 1'!B2\")")],
                },
                SheetSnapshot {
                    id: 2,
                    name: "Sheet 1".into(),
                    index: 1,
                    cells: vec![cell_value(1, 1, CalcValue::Number(42.0))],
                },
            ],
        };
        let outcome = evaluate_workbook(&snapshot, &EngineOptions::default());
        let a1 = CellAddress::new(1, "Sheet1", 0, 0).key();
        assert_eq!(outcome.results[&a1], CalcValue::Number(42.0));
    }

    #[test]
    fn max_cells_guard_aborts_an_oversized_pass() {
        let snapshot = WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![
                    cell_formula(0, 0, "=B1+1"),
                    cell_value(0, 1, CalcValue::Number(2.0)),
                ],
            }],
        };
        let options = EngineOptions {
            max_cells: 1,
            ..EngineOptions::default()
        };
        let outcome = evaluate_workbook(&snapshot, &options);
        let a1 = CellAddress::new(1, "Sheet1", 0, 0).key();
        let b1 = CellAddress::new(1, "Sheet1", 0, 1).key();
        assert!(outcome.results[&a1].is_error());
        assert!(outcome.results[&b1].is_error());
    }
}
