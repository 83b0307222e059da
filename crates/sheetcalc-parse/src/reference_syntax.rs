//! The standalone A1 reference grammar (spec §4.A, §6): parsing a
//! `[Sheet!]Col Row[:Col Row]` string into resolved addresses, and
//! formatting addresses back to text. Shared by the formula parser's
//! primary-reference production and by functions that resolve reference
//! text at evaluation time (`OFFSET`, `INDIRECT`).

use sheetcalc_common::{
    column_to_letters, letters_to_column, CalcError, CellAddress, CellRange, SheetId,
    WorkbookIndex,
};

use crate::tokenizer::{tokenize, Token, TokenKind};

/// Context a reference is resolved against: the formula's home sheet
/// (used when no sheet prefix is given) and the workbook's name index.
pub struct ParseContext<'a> {
    pub default_sheet_id: SheetId,
    pub default_sheet_name: &'a str,
    pub workbook_index: &'a WorkbookIndex,
}

/// A reference or range, resolved to 0-indexed row/column pairs but not
/// yet wrapped in the caller's preferred shape ([`CellAddress`] vs
/// [`CellRange`]).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReference {
    pub sheet_id: SheetId,
    pub sheet_name: String,
    pub start: (u32, u32),
    pub end: Option<(u32, u32)>,
}

fn split_column_row(ident: &str) -> Option<(&str, &str)> {
    let split_at = ident.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = ident.split_at(split_at);
    if letters.is_empty() || digits.is_empty() {
        return None;
    }
    if !letters.bytes().all(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((letters, digits))
}

/// Decode `A1`-style text (no sheet prefix) into 0-indexed `(row, col)`.
pub fn decode_address(ident: &str) -> Result<(u32, u32), CalcError> {
    let (letters, digits) = split_column_row(ident)
        .ok_or_else(|| CalcError::reference(format!("'{ident}' is not a cell reference")))?;
    let col = letters_to_column(letters)
        .ok_or_else(|| CalcError::reference(format!("invalid column '{letters}'")))?;
    let row_1based: u32 = digits
        .parse()
        .map_err(|_| CalcError::reference(format!("invalid row '{digits}'")))?;
    if row_1based == 0 {
        return Err(CalcError::reference("row must be >= 1"));
    }
    Ok((row_1based - 1, col))
}

/// Parse a reference/range starting at `tokens[*pos]`, advancing `*pos`
/// past everything consumed. Used both by the formula parser (which
/// already has a token stream) and by [`parse_cell_reference`]/
/// [`parse_reference_to_cell_range`] below (which tokenize fresh text).
pub(crate) fn parse_reference_at(
    tokens: &[Token],
    pos: &mut usize,
    ctx: &ParseContext,
) -> Result<ParsedReference, CalcError> {
    let (sheet_id, sheet_name) = match tokens.get(*pos) {
        Some(Token {
            kind: TokenKind::QuotedSheetName(name),
            ..
        }) if matches!(tokens.get(*pos + 1).map(|t| &t.kind), Some(TokenKind::Bang)) => {
            let id = ctx
                .workbook_index
                .sheet_id_by_name(name)
                .ok_or_else(|| CalcError::name(format!("unknown sheet '{name}'")))?;
            *pos += 2;
            (id, ctx.workbook_index.sheet_name(id).unwrap_or(name).to_string())
        }
        Some(Token {
            kind: TokenKind::Ident(name),
            ..
        }) if matches!(tokens.get(*pos + 1).map(|t| &t.kind), Some(TokenKind::Bang)) => {
            let id = ctx
                .workbook_index
                .sheet_id_by_name(name)
                .ok_or_else(|| CalcError::name(format!("unknown sheet '{name}'")))?;
            *pos += 2;
            (id, ctx.workbook_index.sheet_name(id).unwrap_or(name).to_string())
        }
        _ => (ctx.default_sheet_id, ctx.default_sheet_name.to_string()),
    };

    let start = match tokens.get(*pos) {
        Some(Token {
            kind: TokenKind::Ident(text),
            ..
        }) => {
            let addr = decode_address(text)?;
            *pos += 1;
            addr
        }
        _ => return Err(CalcError::reference("expected a cell reference")),
    };

    let end = if matches!(tokens.get(*pos).map(|t| &t.kind), Some(TokenKind::Colon)) {
        *pos += 1;
        match tokens.get(*pos) {
            Some(Token {
                kind: TokenKind::Ident(text),
                ..
            }) => {
                let addr = decode_address(text)?;
                *pos += 1;
                Some(addr)
            }
            _ => return Err(CalcError::reference("expected a cell reference after ':'")),
        }
    } else {
        None
    };

    Ok(ParsedReference {
        sheet_id,
        sheet_name,
        start,
        end,
    })
}

/// Parse `[Sheet!]Col Row` into a resolved [`CellAddress`]. Fails with
/// `#REF!` for a malformed address, `#NAME?` for an unresolvable sheet
/// name.
pub fn parse_cell_reference(text: &str, ctx: &ParseContext) -> Result<CellAddress, CalcError> {
    let tokens = tokenize(text).map_err(|e| CalcError::reference(e.message))?;
    let mut pos = 0;
    let parsed = parse_reference_at(&tokens, &mut pos, ctx)?;
    if pos != tokens.len() || parsed.end.is_some() {
        return Err(CalcError::reference(format!("'{text}' is not a single cell reference")));
    }
    Ok(CellAddress::new(
        parsed.sheet_id,
        parsed.sheet_name,
        parsed.start.0,
        parsed.start.1,
    ))
}

/// Parse `[Sheet!]Col Row[:Col Row]` into a half-open [`CellRange`] plus
/// the explicit sheet name if one was given in the text (`None` when the
/// reference relied on the default/home sheet).
pub fn parse_reference_to_cell_range(
    text: &str,
    ctx: &ParseContext,
) -> Result<(CellRange, Option<String>), CalcError> {
    let tokens = tokenize(text).map_err(|e| CalcError::reference(e.message))?;
    let mut pos = 0;
    let parsed = parse_reference_at(&tokens, &mut pos, ctx)?;
    if pos != tokens.len() {
        return Err(CalcError::reference(format!("'{text}' is not a valid reference")));
    }
    let explicit_sheet = has_sheet_prefix(&tokens).then(|| parsed.sheet_name.clone());
    let range = match parsed.end {
        Some(end) => CellRange::from_inclusive(parsed.start.0, parsed.start.1, end.0, end.1),
        None => CellRange::single(parsed.start.0, parsed.start.1),
    };
    Ok((range, explicit_sheet))
}

fn has_sheet_prefix(tokens: &[Token]) -> bool {
    matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::Ident(_)) | Some(TokenKind::QuotedSheetName(_)))
        && matches!(tokens.get(1).map(|t| &t.kind), Some(TokenKind::Bang))
}

fn is_bare_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Format a range back to `A1`/`A1:B3` text, quoting `sheet_name` with
/// `'...'` (escaping `'` as `''`) unless it matches the bare-identifier
/// shape.
pub fn format_reference_from_range(range: &CellRange, sheet_name: Option<&str>) -> String {
    let ((top_row, left_col), (bottom_row, right_col)) = range.to_inclusive();
    let start = format!("{}{}", column_to_letters(left_col), top_row + 1);
    let body = if range.is_single_cell() {
        start
    } else {
        format!("{start}:{}{}", column_to_letters(right_col), bottom_row + 1)
    };
    match sheet_name {
        None => body,
        Some(name) if is_bare_name(name) => format!("{name}!{body}"),
        Some(name) => format!("'{}'!{body}", name.replace('\'', "''")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetcalc_common::{SheetSnapshot, WorkbookIndex};

    fn ctx_with_sheets(sheets: &[(u32, &str)]) -> WorkbookIndex {
        let snaps: Vec<SheetSnapshot> = sheets
            .iter()
            .enumerate()
            .map(|(i, (id, name))| SheetSnapshot {
                id: *id,
                name: name.to_string(),
                index: i,
                cells: vec![],
            })
            .collect();
        WorkbookIndex::build(&snaps)
    }

    #[test]
    fn parses_bare_reference_on_default_sheet() {
        let index = ctx_with_sheets(&[(1, "Sheet1")]);
        let ctx = ParseContext {
            default_sheet_id: 1,
            default_sheet_name: "Sheet1",
            workbook_index: &index,
        };
        let addr = parse_cell_reference("B3", &ctx).unwrap();
        assert_eq!((addr.sheet_id, addr.row, addr.column), (1, 2, 1));
    }

    #[test]
    fn parses_quoted_sheet_prefix() {
        let index = ctx_with_sheets(&[(1, "Sheet1"), (2, "Sheet 1")]);
        let ctx = ParseContext {
            default_sheet_id: 1,
            default_sheet_name: "Sheet1",
            workbook_index: &index,
        };
        let addr = parse_cell_reference("'Sheet 1'!B2", &ctx).unwrap();
        assert_eq!(addr.sheet_id, 2);
        assert_eq!((addr.row, addr.column), (1, 1));
    }

    #[test]
    fn unknown_sheet_is_name_error() {
        let index = ctx_with_sheets(&[(1, "Sheet1")]);
        let ctx = ParseContext {
            default_sheet_id: 1,
            default_sheet_name: "Sheet1",
            workbook_index: &index,
        };
        let err = parse_cell_reference("Missing!A1", &ctx).unwrap_err();
        assert_eq!(err.kind, sheetcalc_common::CalcErrorKind::Name);
    }

    #[test]
    fn zero_row_is_ref_error() {
        let index = ctx_with_sheets(&[(1, "Sheet1")]);
        let ctx = ParseContext {
            default_sheet_id: 1,
            default_sheet_name: "Sheet1",
            workbook_index: &index,
        };
        let err = parse_cell_reference("A0", &ctx).unwrap_err();
        assert_eq!(err.kind, sheetcalc_common::CalcErrorKind::Ref);
    }

    #[test]
    fn format_round_trips_single_cell() {
        let range = CellRange::single(2, 1);
        assert_eq!(format_reference_from_range(&range, None), "B3");
        assert_eq!(format_reference_from_range(&range, Some("Sheet1")), "Sheet1!B3");
        assert_eq!(format_reference_from_range(&range, Some("Sheet 1")), "'Sheet 1'!B3");
    }

    #[test]
    fn format_round_trips_range() {
        let range = CellRange::from_inclusive(0, 0, 2, 1);
        assert_eq!(format_reference_from_range(&range, None), "A1:B3");
    }

    #[test]
    fn quoted_sheet_name_escapes_apostrophe() {
        let range = CellRange::single(0, 0);
        assert_eq!(
            format_reference_from_range(&range, Some("It's Mine")),
            "'It''s Mine'!A1"
        );
    }

    proptest::proptest! {
        /// Address round-trip: every `(row, col)` in bounds formats and
        /// re-parses back to the same point.
        #[test]
        fn address_round_trips_through_format_and_parse(
            row in 0u32..=sheetcalc_common::MAX_ROW,
            col in 0u32..=sheetcalc_common::MAX_COLUMN,
        ) {
            let index = ctx_with_sheets(&[(1, "Sheet1")]);
            let ctx = ParseContext {
                default_sheet_id: 1,
                default_sheet_name: "Sheet1",
                workbook_index: &index,
            };
            let range = CellRange::single(row, col);
            let text = format_reference_from_range(&range, Some("Sheet1"));
            let parsed = parse_cell_reference(&text, &ctx).unwrap();
            prop_assert_eq!((parsed.row, parsed.column), (row, col));
        }
    }
}
