//! The workbook snapshot model: the external collaborator's input shape
//! (§6), the two-way sheet index, and the sparse per-sheet grid built
//! from it.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::address::SheetId;
use crate::value::CalcValue;

/// A cell is either a literal value or formula text (never both).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Value(CalcValue),
    /// Non-empty, non-whitespace-only formula text, including the
    /// leading `=`. Whitespace-only formula text is a modelling error
    /// the dependency builder surfaces as `#VALUE!` per cell rather than
    /// rejecting at ingestion.
    Formula(String),
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub content: CellContent,
}

impl Cell {
    pub fn value(value: CalcValue) -> Self {
        Cell {
            content: CellContent::Value(value),
        }
    }

    pub fn formula(text: impl Into<String>) -> Self {
        Cell {
            content: CellContent::Formula(text.into()),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.content, CellContent::Formula(_))
    }

    pub fn formula_text(&self) -> Option<&str> {
        match &self.content {
            CellContent::Formula(text) => Some(text),
            _ => None,
        }
    }
}

/// One input cell as supplied by the external collaborator (§6). `style`
/// is accepted and immediately discarded — styling is explicitly out of
/// scope for the formula engine (spec §1).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CellSnapshot {
    pub row: u32,
    pub column: u32,
    pub content: CellContent,
}

/// One sheet as supplied by the external collaborator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSnapshot {
    pub id: SheetId,
    pub name: String,
    pub index: usize,
    pub cells: Vec<CellSnapshot>,
}

/// The immutable workbook snapshot handed to the engine for one
/// evaluation pass.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkbookSnapshot {
    pub sheets: Vec<SheetSnapshot>,
}

/// A sheet's identity as known to the [`WorkbookIndex`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDescriptor {
    pub id: SheetId,
    pub name: String,
    pub index: usize,
}

/// Two-way sheet-id <-> sheet-name lookup. Name matching is
/// case-insensitive; the original casing is preserved for display and
/// round-trip formatting.
#[derive(Debug, Clone, Default)]
pub struct WorkbookIndex {
    by_id: FxHashMap<SheetId, SheetDescriptor>,
    id_by_upper_name: FxHashMap<String, SheetId>,
}

impl WorkbookIndex {
    pub fn build(sheets: &[SheetSnapshot]) -> Self {
        let mut by_id = FxHashMap::default();
        let mut id_by_upper_name = FxHashMap::default();
        for sheet in sheets {
            id_by_upper_name.insert(sheet.name.to_uppercase(), sheet.id);
            by_id.insert(
                sheet.id,
                SheetDescriptor {
                    id: sheet.id,
                    name: sheet.name.clone(),
                    index: sheet.index,
                },
            );
        }
        WorkbookIndex {
            by_id,
            id_by_upper_name,
        }
    }

    pub fn sheet_by_id(&self, id: SheetId) -> Option<&SheetDescriptor> {
        self.by_id.get(&id)
    }

    /// Case-insensitive lookup by display name.
    pub fn sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
        self.id_by_upper_name.get(&name.to_uppercase()).copied()
    }

    pub fn sheet_name(&self, id: SheetId) -> Option<&str> {
        self.by_id.get(&id).map(|d| d.name.as_str())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &SheetDescriptor> {
        self.by_id.values()
    }
}

/// Sparse per-sheet row-major storage. For each sheet, rows are an
/// ordered map `rowIndex -> (columnIndex -> Cell)`; `BTreeMap` gives the
/// ordered-sequence iteration the spec's data model calls for without a
/// separate index structure.
#[derive(Debug, Clone, Default)]
pub struct FormulaWorkbookGrid {
    sheets: FxHashMap<SheetId, BTreeMap<u32, BTreeMap<u32, Cell>>>,
}

impl FormulaWorkbookGrid {
    pub fn build(sheets: &[SheetSnapshot]) -> Self {
        let mut grid = FormulaWorkbookGrid::default();
        for sheet in sheets {
            for cell in &sheet.cells {
                grid.insert(sheet.id, cell.row, cell.column, Cell { content: cell.content.clone() });
            }
        }
        grid
    }

    pub fn insert(&mut self, sheet_id: SheetId, row: u32, column: u32, cell: Cell) {
        self.sheets
            .entry(sheet_id)
            .or_default()
            .entry(row)
            .or_default()
            .insert(column, cell);
    }

    pub fn get(&self, sheet_id: SheetId, row: u32, column: u32) -> Option<&Cell> {
        self.sheets.get(&sheet_id)?.get(&row)?.get(&column)
    }

    /// Rows present on a sheet, in ascending row order.
    pub fn rows(&self, sheet_id: SheetId) -> impl Iterator<Item = (u32, &BTreeMap<u32, Cell>)> {
        self.sheets
            .get(&sheet_id)
            .into_iter()
            .flat_map(|rows| rows.iter().map(|(r, cols)| (*r, cols)))
    }

    /// Every `(sheet_id, row, column, cell)` in the snapshot, in no
    /// particular cross-sheet order (the dependency builder does not
    /// require one — see spec §4.D).
    pub fn iter_cells(&self) -> impl Iterator<Item = (SheetId, u32, u32, &Cell)> {
        self.sheets.iter().flat_map(|(sheet_id, rows)| {
            rows.iter().flat_map(move |(row, cols)| {
                cols.iter().map(move |(col, cell)| (*sheet_id, *row, *col, cell))
            })
        })
    }
}

/// Build both halves of the workbook model from one snapshot.
pub fn ingest_snapshot(snapshot: &WorkbookSnapshot) -> (WorkbookIndex, FormulaWorkbookGrid) {
    (
        WorkbookIndex::build(&snapshot.sheets),
        FormulaWorkbookGrid::build(&snapshot.sheets),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> WorkbookSnapshot {
        WorkbookSnapshot {
            sheets: vec![
                SheetSnapshot {
                    id: 1,
                    name: "Sheet 1".into(),
                    index: 0,
                    cells: vec![CellSnapshot {
                        row: 0,
                        column: 0,
                        content: CellContent::Value(CalcValue::Number(5.0)),
                    }],
                },
                SheetSnapshot {
                    id: 2,
                    name: "Data".into(),
                    index: 1,
                    cells: vec![],
                },
            ],
        }
    }

    #[test]
    fn index_is_case_insensitive() {
        let (index, _) = ingest_snapshot(&snapshot());
        assert_eq!(index.sheet_id_by_name("sheet 1"), Some(1));
        assert_eq!(index.sheet_id_by_name("SHEET 1"), Some(1));
        assert_eq!(index.sheet_name(1), Some("Sheet 1"));
    }

    #[test]
    fn grid_round_trips_inserted_cell() {
        let (_, grid) = ingest_snapshot(&snapshot());
        let cell = grid.get(1, 0, 0).unwrap();
        assert_eq!(cell.content, CellContent::Value(CalcValue::Number(5.0)));
        assert!(grid.get(1, 5, 5).is_none());
        assert!(grid.get(2, 0, 0).is_none());
    }
}
