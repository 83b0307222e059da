//! The dependency builder (spec §4.D): walks every cell of a workbook
//! snapshot, parses formula cells, and assembles the forward/reverse
//! dependency graph the evaluation engine traverses.

use rustc_hash::{FxHashMap, FxHashSet};

use sheetcalc_common::{
    CalcError, CalcErrorKind, CellAddress, CellAddressKey, FormulaWorkbookGrid, WorkbookIndex,
};
use sheetcalc_parse::{parse_formula, AstNode, ParseContext};

/// One formula cell's parsed form, with its own address attached (spec
/// §3's `ParsedFormula`). [`sheetcalc_parse::ParseOutput`] carries
/// everything but the address — the builder knows the address because
/// it is iterating the grid.
#[derive(Debug, Clone)]
pub struct ParsedFormula {
    pub address: CellAddress,
    pub formula_text: String,
    pub ast: AstNode,
    pub dependencies: FxHashSet<CellAddressKey>,
    pub dependency_addresses: Vec<CellAddress>,
}

/// One node of the dependency tree: its own address plus forward
/// (depends-on) and reverse (depended-by) edges, both keyed by
/// [`CellAddressKey`].
#[derive(Debug, Clone, Default)]
pub struct DependencyNode {
    pub address: Option<CellAddress>,
    pub dependencies: FxHashSet<CellAddressKey>,
    pub dependents: FxHashSet<CellAddressKey>,
}

pub type DependencyTree = FxHashMap<CellAddressKey, DependencyNode>;

/// The result of one dependency-build pass: the graph itself, every
/// successfully parsed formula, and the per-cell errors of formulas
/// that failed to parse (the cell still has a node in `tree`, but no
/// entry in `parsed`).
pub struct GraphBuildResult {
    pub tree: DependencyTree,
    pub parsed: FxHashMap<CellAddressKey, ParsedFormula>,
    pub cell_errors: FxHashMap<CellAddressKey, CalcError>,
}

fn ensure_node<'a>(tree: &'a mut DependencyTree, key: CellAddressKey, address: Option<&CellAddress>) -> &'a mut DependencyNode {
    let node = tree.entry(key).or_default();
    if node.address.is_none() {
        node.address = address.cloned();
    }
    node
}

/// Walk every `(sheetId, row, column, cell)` in the snapshot grid,
/// parsing formula cells and recording forward/reverse edges. A formula
/// with empty/whitespace-only text fails hard with `#VALUE!` for that
/// cell (spec §4.D); any other parse failure (unknown sheet name, bad
/// reference shape) marks the cell's node with its error but does not
/// abort the rest of the build.
pub fn build_dependency_graph(grid: &FormulaWorkbookGrid, index: &WorkbookIndex) -> GraphBuildResult {
    let mut tree = DependencyTree::default();
    let mut parsed = FxHashMap::default();
    let mut cell_errors = FxHashMap::default();

    for descriptor in index.descriptors() {
        for (row, cols) in grid.rows(descriptor.id) {
            for (col, cell) in cols {
                let address = CellAddress::new(descriptor.id, descriptor.name.clone(), row, *col);
                let key = address.key();
                ensure_node(&mut tree, key.clone(), Some(&address));

                let Some(text) = cell.formula_text() else {
                    continue;
                };

                #[cfg(feature = "tracing")]
                tracing::trace!(cell = %address, "parsing formula cell");

                if text.trim().strip_prefix('=').unwrap_or(text.trim()).trim().is_empty() {
                    cell_errors.insert(key.clone(), CalcError::value("formula text is empty"));
                    continue;
                }

                let ctx = ParseContext {
                    default_sheet_id: descriptor.id,
                    default_sheet_name: &descriptor.name,
                    workbook_index: index,
                };

                match parse_formula(text, &ctx) {
                    Ok(output) => {
                        for dep_addr in &output.dependency_addresses {
                            ensure_node(&mut tree, dep_addr.key(), Some(dep_addr))
                                .dependents
                                .insert(key.clone());
                        }
                        tree.get_mut(&key).unwrap().dependencies = output.dependencies.clone();
                        parsed.insert(
                            key.clone(),
                            ParsedFormula {
                                address,
                                formula_text: text.to_string(),
                                ast: output.ast,
                                dependencies: output.dependencies,
                                dependency_addresses: output.dependency_addresses,
                            },
                        );
                    }
                    Err(e) => {
                        cell_errors.insert(key.clone(), e);
                    }
                }
            }
        }
    }

    GraphBuildResult {
        tree,
        parsed,
        cell_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetcalc_common::{Cell, CellContent, CellSnapshot, SheetSnapshot, WorkbookSnapshot};

    fn snapshot() -> WorkbookSnapshot {
        WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![
                    CellSnapshot {
                        row: 0,
                        column: 0,
                        content: CellContent::Formula("=B1+1".into()),
                    },
                    CellSnapshot {
                        row: 0,
                        column: 1,
                        content: CellContent::Value(sheetcalc_common::CalcValue::Number(2.0)),
                    },
                ],
            }],
        }
    }

    #[test]
    fn dependency_edges_are_bidirectional() {
        let snap = snapshot();
        let index = WorkbookIndex::build(&snap.sheets);
        let grid = FormulaWorkbookGrid::build(&snap.sheets);
        let result = build_dependency_graph(&grid, &index);

        let a1 = CellAddress::new(1, "Sheet1", 0, 0).key();
        let b1 = CellAddress::new(1, "Sheet1", 0, 1).key();
        assert!(result.tree[&a1].dependencies.contains(&b1));
        assert!(result.tree[&b1].dependents.contains(&a1));
    }

    #[test]
    fn empty_formula_text_is_a_per_cell_value_error() {
        let snap = WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![CellSnapshot {
                    row: 0,
                    column: 0,
                    content: CellContent::Formula("=   ".into()),
                }],
            }],
        };
        let index = WorkbookIndex::build(&snap.sheets);
        let grid = FormulaWorkbookGrid::build(&snap.sheets);
        let result = build_dependency_graph(&grid, &index);
        let key = CellAddress::new(1, "Sheet1", 0, 0).key();
        assert_eq!(result.cell_errors[&key].kind, CalcErrorKind::Value);
    }

    #[test]
    fn unparseable_formula_does_not_abort_the_build() {
        let snap = WorkbookSnapshot {
            sheets: vec![SheetSnapshot {
                id: 1,
                name: "Sheet1".into(),
                index: 0,
                cells: vec![
                    CellSnapshot {
                        row: 0,
                        column: 0,
                        content: CellContent::Formula("=Missing!A1".into()),
                    },
                    CellSnapshot {
                        row: 1,
                        column: 0,
                        content: CellContent::Formula("=1+1".into()),
                    },
                ],
            }],
        };
        let index = WorkbookIndex::build(&snap.sheets);
        let grid = FormulaWorkbookGrid::build(&snap.sheets);
        let result = build_dependency_graph(&grid, &index);
        let bad = CellAddress::new(1, "Sheet1", 0, 0).key();
        let good = CellAddress::new(1, "Sheet1", 1, 0).key();
        assert!(result.cell_errors.contains_key(&bad));
        assert!(result.parsed.contains_key(&good));
    }

    proptest::proptest! {
        /// Dependency closure: every cell a formula references ends up in
        /// its `dependencies` set, and the formula ends up in that
        /// reference's `dependents` set, for an arbitrary grid of chained
        /// `=<col><row>+1` formulas.
        #[test]
        fn dependency_edges_are_always_bidirectional(chain_len in 1usize..12) {
            let mut cells = Vec::new();
            for i in 0..chain_len {
                let text = if i == 0 {
                    "1".to_string()
                } else {
                    format!("=A{i}+1")
                };
                cells.push(sheetcalc_common::CellSnapshot {
                    row: i as u32,
                    column: 0,
                    content: if i == 0 {
                        sheetcalc_common::CellContent::Value(sheetcalc_common::CalcValue::Number(1.0))
                    } else {
                        sheetcalc_common::CellContent::Formula(text)
                    },
                });
            }
            let snap = sheetcalc_common::WorkbookSnapshot {
                sheets: vec![sheetcalc_common::SheetSnapshot {
                    id: 1,
                    name: "Sheet1".into(),
                    index: 0,
                    cells,
                }],
            };
            let index = WorkbookIndex::build(&snap.sheets);
            let grid = FormulaWorkbookGrid::build(&snap.sheets);
            let result = build_dependency_graph(&grid, &index);

            for i in 1..chain_len {
                let me = CellAddress::new(1, "Sheet1", i as u32, 0).key();
                let dep = CellAddress::new(1, "Sheet1", (i - 1) as u32, 0).key();
                prop_assert!(result.tree[&me].dependencies.contains(&dep));
                prop_assert!(result.tree[&dep].dependents.contains(&me));
            }
        }
    }
}
