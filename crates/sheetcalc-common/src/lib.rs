//! Shared types for the sheetcalc formula engine: cell/sheet addressing,
//! the workbook snapshot model, and the scalar/array result and error
//! values every other sheetcalc crate builds on.

pub mod address;
pub mod error;
pub mod value;
pub mod workbook;

pub use address::{
    column_to_letters, create_cell_address_key, letters_to_column, CellAddress, CellAddressKey,
    CellRange, SheetId, MAX_COLUMN, MAX_ROW,
};
pub use error::{CalcError, CalcErrorKind};
pub use value::{CalcValue, FormulaEvaluationResult};
pub use workbook::{
    ingest_snapshot, Cell, CellContent, CellSnapshot, FormulaWorkbookGrid, SheetDescriptor,
    SheetSnapshot, WorkbookIndex, WorkbookSnapshot,
};
