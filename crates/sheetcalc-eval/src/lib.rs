//! Function registry, dependency graph builder and evaluation engine for
//! the sheetcalc formula engine (spec §4.D, §4.E, §4.F, §4.G, §4.H).
//!
//! This crate knows about cell *values*: it parses formula cells into a
//! dependency graph (via `sheetcalc-parse`), catalogues built-in
//! functions, and evaluates a workbook snapshot to a result map.

pub mod builtins;
pub mod engine;
pub mod function;
pub mod graph;
pub mod helpers;
pub mod registry;

pub use engine::{evaluate_workbook, ClockProvider, EngineOptions, EvaluationOutcome, SystemClock, UnknownFunctionPolicy};
pub use function::{EagerFunction, FunctionBody, FunctionDefinition, FunctionMeta, LazyContext, LazyFunction, ReferenceBounds};
pub use graph::{build_dependency_graph, DependencyNode, DependencyTree, GraphBuildResult, ParsedFormula};
pub use helpers::Helpers;
pub use registry::{get_function, register_function};
