//! The `Function` definition: eager functions receive computed argument
//! values, lazy functions receive unevaluated AST nodes plus a callback
//! that can evaluate them (needed by `OFFSET`, `INDIRECT`, `CHOOSE`,
//! `IF`/`IFS` for short-circuiting, spec §4.E).

use sheetcalc_common::{CalcError, CalcValue, CellAddress, SheetId};
use sheetcalc_parse::AstNode;

use crate::helpers::Helpers;

/// Resolved reference bounds for a `Reference`/`Range` AST node, obtained
/// *without* evaluating the cells it covers. `OFFSET` needs this to do
/// coordinate math on the reference itself.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceBounds {
    pub sheet_id: SheetId,
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl ReferenceBounds {
    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }
}

/// Read bounds off a `Reference` or `Range` node without evaluating it.
/// Any other node shape is not a reference and fails `#REF!`.
pub fn node_reference_bounds(node: &AstNode) -> Result<ReferenceBounds, CalcError> {
    match node {
        AstNode::Reference(addr) => Ok(ReferenceBounds {
            sheet_id: addr.sheet_id,
            top: addr.row,
            left: addr.column,
            bottom: addr.row,
            right: addr.column,
        }),
        AstNode::Range(range) => {
            let (top, left, bottom, right) = range.bounds();
            Ok(ReferenceBounds {
                sheet_id: range.start.sheet_id,
                top,
                left,
                bottom,
                right,
            })
        }
        _ => Err(CalcError::reference("argument is not a cell reference")),
    }
}

/// What a lazy function is given in place of precomputed values: the
/// unevaluated argument nodes plus everything it needs to evaluate them
/// itself, selectively.
pub trait LazyContext {
    /// Evaluate one AST node exactly as the engine would (memoised,
    /// cycle-checked).
    fn evaluate(&self, node: &AstNode) -> CalcValue;

    fn helpers(&self) -> &Helpers;

    /// The cell whose formula is currently being evaluated.
    fn origin(&self) -> &CellAddress;

    /// Resolve free-standing reference text (`INDIRECT`'s argument)
    /// against the origin's home sheet.
    fn parse_reference(&self, text: &str) -> Result<CellAddress, CalcError>;

    /// Resolve free-standing range text, returning the half-open range
    /// and an explicit sheet name if one was given in the text.
    fn parse_reference_range(
        &self,
        text: &str,
    ) -> Result<(sheetcalc_common::CellRange, Option<String>), CalcError>;

    /// Evaluate a synthetic range built at evaluation time (by `OFFSET`
    /// or `INDIRECT`), returning a scalar for a 1x1 range or a 2-D array
    /// otherwise.
    fn evaluate_range(&self, sheet_id: SheetId, sheet_name: &str, top: u32, left: u32, bottom: u32, right: u32) -> CalcValue;

    /// Resolve a display sheet name to its id directly, case-insensitive
    /// (spec §3.B). `INDIRECT` uses this rather than round-tripping the
    /// name through a formatted reference string, which would need
    /// re-quoting for names that aren't bare identifiers.
    fn sheet_id_by_name(&self, name: &str) -> Option<SheetId>;
}

/// An eager function: every argument has already been reduced to a
/// value (a reference's own result, a range's 2-D array) before this is
/// called.
pub trait EagerFunction: Send + Sync + 'static {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue;
}

/// A lazy function: receives raw argument nodes so it can choose which
/// to evaluate, inspect reference shape without reading cell values, or
/// build synthetic references.
pub trait LazyFunction: Send + Sync + 'static {
    fn evaluate_lazy(&self, args: &[AstNode], ctx: &dyn LazyContext) -> CalcValue;
}

/// Metadata surfaced to the (out-of-scope) UI suggestion layer. Opaque
/// to evaluation — kept only so `registerFunction` callers have
/// somewhere to put it (spec §6).
#[derive(Debug, Clone, Default)]
pub struct FunctionMeta {
    pub category: Option<String>,
    pub description_en: Option<String>,
    pub description_ja: Option<String>,
    pub examples: Vec<String>,
    pub samples: Vec<String>,
}

pub enum FunctionBody {
    Eager(Box<dyn EagerFunction>),
    Lazy(Box<dyn LazyFunction>),
}

/// A registry entry: name, arity contract, and one of the two
/// evaluation shapes from spec §4.E.
pub struct FunctionDefinition {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub body: FunctionBody,
    pub meta: FunctionMeta,
}

impl FunctionDefinition {
    pub fn eager(name: &'static str, min_args: usize, max_args: Option<usize>, f: impl EagerFunction) -> Self {
        FunctionDefinition {
            name,
            min_args,
            max_args,
            body: FunctionBody::Eager(Box::new(f)),
            meta: FunctionMeta::default(),
        }
    }

    pub fn lazy(name: &'static str, min_args: usize, max_args: Option<usize>, f: impl LazyFunction) -> Self {
        FunctionDefinition {
            name,
            min_args,
            max_args,
            body: FunctionBody::Lazy(Box::new(f)),
            meta: FunctionMeta::default(),
        }
    }

    pub fn arity_ok(&self, n: usize) -> bool {
        n >= self.min_args && self.max_args.map_or(true, |max| n <= max)
    }
}
