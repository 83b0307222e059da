//! Text built-ins (spec §4.F "Text"): `UPPER`, `LOWER`, `LEN`, `TRIM`,
//! `CONCAT`(ENATE), `LEFT`, `RIGHT`, `MID`, `FIND`, `SEARCH`,
//! `SUBSTITUTE`, `REPT`. All eager.
//!
//! `LEN`/`LEFT`/`RIGHT`/`MID`/`FIND`/`SEARCH` index by UTF-16 code unit,
//! matching what a browser's `String.prototype.length`/`indexOf` report
//! (spec §9 Open Question a) rather than by Unicode scalar value.

use sheetcalc_common::{CalcError, CalcValue};

use crate::function::{EagerFunction, FunctionDefinition};
use crate::helpers::Helpers;

/// UTF-16 code units, matching the host environment's string indexing.
fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

fn utf16_slice(s: &str, start: usize, len: Option<usize>) -> String {
    let units: Vec<u16> = s.encode_utf16().collect();
    let end = match len {
        Some(l) => (start + l).min(units.len()),
        None => units.len(),
    };
    if start >= units.len() || start >= end {
        return String::new();
    }
    String::from_utf16_lossy(&units[start..end])
}

struct UpperFn;
impl EagerFunction for UpperFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        match helpers.coerce_text(&args[0], "UPPER") {
            Ok(s) => CalcValue::Text(s.to_uppercase()),
            Err(e) => CalcValue::Error(e),
        }
    }
}

struct LowerFn;
impl EagerFunction for LowerFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        match helpers.coerce_text(&args[0], "LOWER") {
            Ok(s) => CalcValue::Text(s.to_lowercase()),
            Err(e) => CalcValue::Error(e),
        }
    }
}

struct LenFn;
impl EagerFunction for LenFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        match helpers.coerce_text(&args[0], "LEN") {
            Ok(s) => CalcValue::Number(utf16_len(&s) as f64),
            Err(e) => CalcValue::Error(e),
        }
    }
}

struct TrimFn;
impl EagerFunction for TrimFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        match helpers.coerce_text(&args[0], "TRIM") {
            Ok(s) => {
                let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
                CalcValue::Text(collapsed)
            }
            Err(e) => CalcValue::Error(e),
        }
    }
}

struct ConcatFn;
impl EagerFunction for ConcatFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let flat = helpers.flatten_arguments(args);
        let mut out = String::new();
        for v in &flat {
            match helpers.coerce_text(v, "CONCAT") {
                Ok(s) => out.push_str(&s),
                Err(e) => return CalcValue::Error(e),
            }
        }
        CalcValue::Text(out)
    }
}

struct LeftFn;
impl EagerFunction for LeftFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let text = match helpers.coerce_text(&args[0], "LEFT") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let count = match args.get(1) {
            Some(v) => match helpers.require_integer(v, "num_chars") {
                Ok(n) => n,
                Err(e) => return CalcValue::Error(e),
            },
            None => 1,
        };
        if count < 0 {
            return CalcValue::Error(CalcError::value("LEFT num_chars must be >= 0"));
        }
        CalcValue::Text(utf16_slice(&text, 0, Some(count as usize)))
    }
}

struct RightFn;
impl EagerFunction for RightFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let text = match helpers.coerce_text(&args[0], "RIGHT") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let count = match args.get(1) {
            Some(v) => match helpers.require_integer(v, "num_chars") {
                Ok(n) => n,
                Err(e) => return CalcValue::Error(e),
            },
            None => 1,
        };
        if count < 0 {
            return CalcValue::Error(CalcError::value("RIGHT num_chars must be >= 0"));
        }
        let len = utf16_len(&text);
        let start = len.saturating_sub(count as usize);
        CalcValue::Text(utf16_slice(&text, start, None))
    }
}

struct MidFn;
impl EagerFunction for MidFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let text = match helpers.coerce_text(&args[0], "MID") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let start = match helpers.require_integer(&args[1], "start_num") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        let count = match helpers.require_integer(&args[2], "num_chars") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        if start < 1 || count < 0 {
            return CalcValue::Error(CalcError::value("MID requires start_num >= 1 and num_chars >= 0"));
        }
        CalcValue::Text(utf16_slice(&text, (start - 1) as usize, Some(count as usize)))
    }
}

/// Shared body for `FIND`/`SEARCH`: the former is case-sensitive and
/// literal, the latter case-insensitive with `?`/`*` wildcards.
fn find_common(needle: &str, haystack: &str, start: usize, case_insensitive: bool, wildcards: bool) -> Option<usize> {
    let units: Vec<u16> = haystack.encode_utf16().collect();
    if start > units.len() {
        return None;
    }
    let hay_tail = String::from_utf16_lossy(&units[start..]);

    if wildcards && (needle.contains('*') || needle.contains('?')) {
        let pattern = wildcard_to_regex(needle, case_insensitive);
        return regex::Regex::new(&pattern).ok().and_then(|re| re.find(&hay_tail)).map(|m| {
            start + hay_tail[..m.start()].encode_utf16().count()
        });
    }

    let (n, h) = if case_insensitive {
        (needle.to_lowercase(), hay_tail.to_lowercase())
    } else {
        (needle.to_string(), hay_tail.clone())
    };
    h.find(&n).map(|byte_idx| start + h[..byte_idx].encode_utf16().count())
}

fn wildcard_to_regex(pattern: &str, case_insensitive: bool) -> String {
    let mut out = String::new();
    if case_insensitive {
        out.push_str("(?i)");
    }
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                if !literal.is_empty() {
                    out.push_str(&regex::escape(&literal));
                    literal.clear();
                }
                out.push_str(if ch == '*' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        out.push_str(&regex::escape(&literal));
    }
    out
}

struct FindFn;
impl EagerFunction for FindFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let needle = match helpers.coerce_text(&args[0], "find_text") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let haystack = match helpers.coerce_text(&args[1], "within_text") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let start_num = match args.get(2) {
            Some(v) => match helpers.require_integer(v, "start_num") {
                Ok(n) => n,
                Err(e) => return CalcValue::Error(e),
            },
            None => 1,
        };
        if start_num < 1 {
            return CalcValue::Error(CalcError::value("FIND start_num must be >= 1"));
        }
        match find_common(&needle, &haystack, (start_num - 1) as usize, false, false) {
            Some(idx) => CalcValue::Number((idx + 1) as f64),
            None => CalcValue::Error(CalcError::not_available("text not found")),
        }
    }
}

struct SearchFn;
impl EagerFunction for SearchFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let needle = match helpers.coerce_text(&args[0], "find_text") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let haystack = match helpers.coerce_text(&args[1], "within_text") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let start_num = match args.get(2) {
            Some(v) => match helpers.require_integer(v, "start_num") {
                Ok(n) => n,
                Err(e) => return CalcValue::Error(e),
            },
            None => 1,
        };
        if start_num < 1 {
            return CalcValue::Error(CalcError::value("SEARCH start_num must be >= 1"));
        }
        match find_common(&needle, &haystack, (start_num - 1) as usize, true, true) {
            Some(idx) => CalcValue::Number((idx + 1) as f64),
            None => CalcValue::Error(CalcError::not_available("text not found")),
        }
    }
}

struct SubstituteFn;
impl EagerFunction for SubstituteFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let text = match helpers.coerce_text(&args[0], "text") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let old_text = match helpers.coerce_text(&args[1], "old_text") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let new_text = match helpers.coerce_text(&args[2], "new_text") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        if old_text.is_empty() {
            return CalcValue::Text(text);
        }
        match args.get(3) {
            None => CalcValue::Text(text.replace(&old_text, &new_text)),
            Some(v) => {
                let instance = match helpers.require_integer(v, "instance_num") {
                    Ok(n) if n >= 1 => n as usize,
                    Ok(_) => return CalcValue::Error(CalcError::value("instance_num must be >= 1")),
                    Err(e) => return CalcValue::Error(e),
                };
                let mut count = 0usize;
                let mut result = String::with_capacity(text.len());
                let mut rest = text.as_str();
                let mut replaced = false;
                while let Some(pos) = rest.find(&old_text) {
                    count += 1;
                    result.push_str(&rest[..pos]);
                    if count == instance && !replaced {
                        result.push_str(&new_text);
                        replaced = true;
                    } else {
                        result.push_str(&old_text);
                    }
                    rest = &rest[pos + old_text.len()..];
                }
                result.push_str(rest);
                CalcValue::Text(result)
            }
        }
    }
}

struct ReptFn;
impl EagerFunction for ReptFn {
    fn evaluate(&self, args: &[CalcValue], helpers: &Helpers) -> CalcValue {
        let text = match helpers.coerce_text(&args[0], "text") {
            Ok(s) => s,
            Err(e) => return CalcValue::Error(e),
        };
        let count = match helpers.require_integer(&args[1], "number_times") {
            Ok(n) => n,
            Err(e) => return CalcValue::Error(e),
        };
        if count < 0 {
            return CalcValue::Error(CalcError::value("REPT number_times must be >= 0"));
        }
        CalcValue::Text(text.repeat(count as usize))
    }
}

pub fn register_builtins(register: &dyn Fn(FunctionDefinition)) {
    register(FunctionDefinition::eager("UPPER", 1, Some(1), UpperFn));
    register(FunctionDefinition::eager("LOWER", 1, Some(1), LowerFn));
    register(FunctionDefinition::eager("LEN", 1, Some(1), LenFn));
    register(FunctionDefinition::eager("TRIM", 1, Some(1), TrimFn));
    register(FunctionDefinition::eager("CONCAT", 1, None, ConcatFn));
    register(FunctionDefinition::eager("CONCATENATE", 1, None, ConcatFn));
    register(FunctionDefinition::eager("LEFT", 1, Some(2), LeftFn));
    register(FunctionDefinition::eager("RIGHT", 1, Some(2), RightFn));
    register(FunctionDefinition::eager("MID", 3, Some(3), MidFn));
    register(FunctionDefinition::eager("FIND", 2, Some(3), FindFn));
    register(FunctionDefinition::eager("SEARCH", 2, Some(3), SearchFn));
    register(FunctionDefinition::eager("SUBSTITUTE", 3, Some(4), SubstituteFn));
    register(FunctionDefinition::eager("REPT", 2, Some(2), ReptFn));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> CalcValue {
        CalcValue::Text(s.into())
    }
    fn n(v: f64) -> CalcValue {
        CalcValue::Number(v)
    }

    #[test]
    fn len_counts_utf16_code_units_not_bytes() {
        let r = LenFn.evaluate(&[t("héllo")], &Helpers);
        assert_eq!(r, n(5.0));
    }

    #[test]
    fn left_and_right_default_to_one_character() {
        assert_eq!(LeftFn.evaluate(&[t("abc")], &Helpers), t("a"));
        assert_eq!(RightFn.evaluate(&[t("abc")], &Helpers), t("c"));
    }

    #[test]
    fn mid_extracts_substring() {
        let r = MidFn.evaluate(&[t("spreadsheet"), n(4.0), n(5.0)], &Helpers);
        assert_eq!(r, t("adshe"));
    }

    #[test]
    fn find_is_case_sensitive_search_is_not() {
        assert!(FindFn.evaluate(&[t("World"), t("hello world")], &Helpers).is_error());
        assert_eq!(SearchFn.evaluate(&[t("World"), t("hello world")], &Helpers), n(7.0));
    }

    #[test]
    fn substitute_replaces_all_by_default_and_one_instance_when_given() {
        let r = SubstituteFn.evaluate(&[t("a-a-a"), t("a"), t("b")], &Helpers);
        assert_eq!(r, t("b-b-b"));
        let r = SubstituteFn.evaluate(&[t("a-a-a"), t("a"), t("b"), n(2.0)], &Helpers);
        assert_eq!(r, t("a-b-a"));
    }

    #[test]
    fn rept_repeats_text() {
        assert_eq!(ReptFn.evaluate(&[t("ab"), n(3.0)], &Helpers), t("ababab"));
    }
}
