//! `String.prototype` methods
//!
//! Positions and lengths count UTF-16 code units, so every index-based method
//! works on the encoded form and decodes the result lossily.

use std::cmp::Ordering;

use super::super::control::EvalResult;
use super::super::realm::ErrorKind;
use super::super::values::Val;
use super::super::Interpreter;
use super::{arg, relative_index};
use crate::script::number::to_uint32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMethod {
    CharAt,
    CharCodeAt,
    CodePointAt,
    IndexOf,
    LastIndexOf,
    Includes,
    StartsWith,
    EndsWith,
    Slice,
    Substring,
    Substr,
    ToUpperCase,
    ToLowerCase,
    Trim,
    TrimStart,
    TrimEnd,
    PadStart,
    PadEnd,
    Repeat,
    Split,
    Replace,
    ReplaceAll,
    Concat,
    At,
    ToString,
    LocaleCompare,
    // Statics
    FromCharCode,
}

pub const PROTOTYPE: &[(&str, StringMethod)] = &[
    ("charAt", StringMethod::CharAt),
    ("charCodeAt", StringMethod::CharCodeAt),
    ("codePointAt", StringMethod::CodePointAt),
    ("indexOf", StringMethod::IndexOf),
    ("lastIndexOf", StringMethod::LastIndexOf),
    ("includes", StringMethod::Includes),
    ("startsWith", StringMethod::StartsWith),
    ("endsWith", StringMethod::EndsWith),
    ("slice", StringMethod::Slice),
    ("substring", StringMethod::Substring),
    ("substr", StringMethod::Substr),
    ("toUpperCase", StringMethod::ToUpperCase),
    ("toLowerCase", StringMethod::ToLowerCase),
    ("trim", StringMethod::Trim),
    ("trimStart", StringMethod::TrimStart),
    ("trimEnd", StringMethod::TrimEnd),
    ("padStart", StringMethod::PadStart),
    ("padEnd", StringMethod::PadEnd),
    ("repeat", StringMethod::Repeat),
    ("split", StringMethod::Split),
    ("replace", StringMethod::Replace),
    ("replaceAll", StringMethod::ReplaceAll),
    ("concat", StringMethod::Concat),
    ("at", StringMethod::At),
    ("toString", StringMethod::ToString),
    ("valueOf", StringMethod::ToString),
    ("localeCompare", StringMethod::LocaleCompare),
];

pub const STATICS: &[(&str, StringMethod)] = &[("fromCharCode", StringMethod::FromCharCode)];

impl StringMethod {
    fn name(self) -> &'static str {
        PROTOTYPE
            .iter()
            .chain(STATICS)
            .find(|(_, method)| *method == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }
}

impl<'c> Interpreter<'c> {
    pub(crate) fn string_method(&mut self, method: StringMethod, this: Val, args: Vec<Val>) -> EvalResult {
        if method == StringMethod::FromCharCode {
            let mut units = Vec::with_capacity(args.len());
            for value in &args {
                units.push(to_uint32(self.to_number(value)?) as u16);
            }
            return Ok(Val::string(String::from_utf16_lossy(&units)));
        }

        let text = match &this {
            Val::Undefined | Val::Null => {
                return self.throw(
                    ErrorKind::TypeError,
                    format!(
                        "String.prototype.{} called on null or undefined",
                        method.name()
                    ),
                )
            }
            Val::Str(s) => s.clone(),
            other => self.to_str(other)?,
        };
        let units: Vec<u16> = text.encode_utf16().collect();
        let len = units.len();

        Ok(match method {
            StringMethod::CharAt => {
                let index = self.to_integer(&arg(&args, 0))?;
                match unit_index(index, len) {
                    Some(index) => Val::string(String::from_utf16_lossy(&units[index..=index])),
                    None => Val::string(""),
                }
            }
            StringMethod::CharCodeAt => {
                let index = self.to_integer(&arg(&args, 0))?;
                match unit_index(index, len) {
                    Some(index) => Val::Num(units[index] as f64),
                    None => Val::Num(f64::NAN),
                }
            }
            StringMethod::CodePointAt => {
                let index = self.to_integer(&arg(&args, 0))?;
                match unit_index(index, len) {
                    Some(index) => {
                        let point = char::decode_utf16(units[index..].iter().copied())
                            .next()
                            .and_then(|decoded| decoded.ok())
                            .map_or(units[index] as u32, |c| c as u32);
                        Val::Num(point as f64)
                    }
                    None => Val::Undefined,
                }
            }
            StringMethod::IndexOf => {
                let needle = self.arg_units(&args, 0)?;
                let from = self.to_integer(&arg(&args, 1))?.clamp(0.0, len as f64) as usize;
                position(find_units(&units, &needle, from))
            }
            StringMethod::LastIndexOf => {
                let needle = self.arg_units(&args, 0)?;
                let from = match self.to_number(&arg(&args, 1))? {
                    n if n.is_nan() => len,
                    n => n.trunc().clamp(0.0, len as f64) as usize,
                };
                position(rfind_units(&units, &needle, from))
            }
            StringMethod::Includes => {
                let needle = self.arg_units(&args, 0)?;
                let from = self.to_integer(&arg(&args, 1))?.clamp(0.0, len as f64) as usize;
                Val::Bool(find_units(&units, &needle, from).is_some())
            }
            StringMethod::StartsWith => {
                let needle = self.arg_units(&args, 0)?;
                let start = self.to_integer(&arg(&args, 1))?.clamp(0.0, len as f64) as usize;
                Val::Bool(units[start..].starts_with(&needle))
            }
            StringMethod::EndsWith => {
                let needle = self.arg_units(&args, 0)?;
                let end = match arg(&args, 1) {
                    Val::Undefined => len,
                    value => self.to_integer(&value)?.clamp(0.0, len as f64) as usize,
                };
                Val::Bool(units[..end].ends_with(&needle))
            }
            StringMethod::Slice => {
                let start = relative_index(self.to_integer(&arg(&args, 0))?, len);
                let end = match arg(&args, 1) {
                    Val::Undefined => len,
                    value => relative_index(self.to_integer(&value)?, len),
                };
                decode(&units[start..end.max(start)])
            }
            StringMethod::Substring => {
                let start = self.to_integer(&arg(&args, 0))?.clamp(0.0, len as f64) as usize;
                let end = match arg(&args, 1) {
                    Val::Undefined => len,
                    value => self.to_integer(&value)?.clamp(0.0, len as f64) as usize,
                };
                decode(&units[start.min(end)..start.max(end)])
            }
            StringMethod::Substr => {
                let start = relative_index(self.to_integer(&arg(&args, 0))?, len);
                let count = match arg(&args, 1) {
                    Val::Undefined => len - start,
                    value => self
                        .to_integer(&value)?
                        .clamp(0.0, (len - start) as f64) as usize,
                };
                decode(&units[start..start + count])
            }
            StringMethod::ToUpperCase => Val::string(text.to_uppercase()),
            StringMethod::ToLowerCase => Val::string(text.to_lowercase()),
            StringMethod::Trim => Val::string(text.trim_matches(is_js_whitespace)),
            StringMethod::TrimStart => Val::string(text.trim_start_matches(is_js_whitespace)),
            StringMethod::TrimEnd => Val::string(text.trim_end_matches(is_js_whitespace)),
            StringMethod::PadStart | StringMethod::PadEnd => {
                let target = self.to_integer(&arg(&args, 0))?;
                let fill: Vec<u16> = match arg(&args, 1) {
                    Val::Undefined => vec![b' ' as u16],
                    value => self.to_str(&value)?.encode_utf16().collect(),
                };
                if target <= len as f64 || fill.is_empty() {
                    return Ok(Val::Str(text));
                }
                let padding: Vec<u16> = fill
                    .iter()
                    .copied()
                    .cycle()
                    .take(target as usize - len)
                    .collect();
                let joined = if method == StringMethod::PadStart {
                    [padding, units].concat()
                } else {
                    [units, padding].concat()
                };
                decode(&joined)
            }
            StringMethod::Repeat => {
                let count = self.to_integer(&arg(&args, 0))?;
                if count < 0.0 || count.is_infinite() {
                    let shown = crate::script::number::number_to_string(count);
                    return self.throw(
                        ErrorKind::RangeError,
                        format!("Invalid count value: {}", shown),
                    );
                }
                if text.len() as f64 * count > (1u64 << 29) as f64 {
                    return self.throw(ErrorKind::RangeError, "Invalid string length");
                }
                Val::string(text.repeat(count as usize))
            }
            StringMethod::Split => {
                let limit = match arg(&args, 1) {
                    Val::Undefined => u32::MAX as usize,
                    value => to_uint32(self.to_number(&value)?) as usize,
                };
                let pieces: Vec<Vec<u16>> = match arg(&args, 0) {
                    Val::Undefined => vec![units],
                    separator => {
                        let separator: Vec<u16> = self.to_str(&separator)?.encode_utf16().collect();
                        split_units(&units, &separator)
                    }
                };
                let pieces = pieces
                    .into_iter()
                    .take(limit)
                    .map(|piece| decode(&piece))
                    .collect();
                self.alloc_array(pieces)
            }
            StringMethod::Replace | StringMethod::ReplaceAll => {
                let needle = self.arg_units(&args, 0)?;
                let replacement = arg(&args, 1);
                let mut matches = Vec::new();
                let mut from = 0;
                while let Some(found) = find_units(&units, &needle, from) {
                    matches.push(found);
                    if method == StringMethod::Replace {
                        break;
                    }
                    from = found + needle.len().max(1);
                    if from > len {
                        break;
                    }
                }

                let mut result: Vec<u16> = Vec::with_capacity(len);
                let mut last = 0;
                for found in matches {
                    result.extend_from_slice(&units[last..found]);
                    let matched = String::from_utf16_lossy(&needle);
                    let inserted = if self.is_callable(&replacement) {
                        let value = self.call(
                            &replacement,
                            Val::Undefined,
                            vec![
                                Val::string(&matched),
                                Val::Num(found as f64),
                                Val::Str(text.clone()),
                            ],
                        )?;
                        self.to_string_lossy(&value)?
                    } else {
                        let template = self.to_str(&replacement)?;
                        expand_replacement(&template, &matched, &units[..found], &units[found + needle.len()..])
                    };
                    result.extend(inserted.encode_utf16());
                    last = found + needle.len();
                }
                result.extend_from_slice(&units[last..]);
                decode(&result)
            }
            StringMethod::Concat => {
                let mut joined = text.to_string();
                for value in &args {
                    joined.push_str(&self.to_str(value)?);
                }
                Val::string(joined)
            }
            StringMethod::At => {
                let n = self.to_integer(&arg(&args, 0))?;
                let index = if n < 0.0 { len as f64 + n } else { n };
                match unit_index(index, len) {
                    Some(index) => decode(&units[index..=index]),
                    None => Val::Undefined,
                }
            }
            StringMethod::ToString => Val::Str(text),
            StringMethod::LocaleCompare => {
                let other = self.to_str(&arg(&args, 0))?;
                Val::Num(match locale_compare(&text, &other) {
                    Ordering::Less => -1.0,
                    Ordering::Equal => 0.0,
                    Ordering::Greater => 1.0,
                })
            }
            StringMethod::FromCharCode => Val::Undefined,
        })
    }

    fn arg_units(&mut self, args: &[Val], index: usize) -> EvalResult<Vec<u16>> {
        Ok(self.to_str(&arg(args, index))?.encode_utf16().collect())
    }
}

/* ===================== UTF-16 Helpers ===================== */

fn decode(units: &[u16]) -> Val {
    Val::string(String::from_utf16_lossy(units))
}

fn position(found: Option<usize>) -> Val {
    Val::Num(found.map_or(-1.0, |index| index as f64))
}

fn unit_index(index: f64, len: usize) -> Option<usize> {
    if index >= 0.0 && index < len as f64 {
        Some(index as usize)
    } else {
        None
    }
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    if needle.is_empty() {
        return Some(from);
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| offset + from)
}

fn rfind_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    let last_start = from.min(haystack.len() - needle.len());
    (0..=last_start)
        .rev()
        .find(|&start| haystack[start..start + needle.len()] == *needle)
}

fn split_units(units: &[u16], separator: &[u16]) -> Vec<Vec<u16>> {
    if separator.is_empty() {
        return units.iter().map(|unit| vec![*unit]).collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    while let Some(found) = find_units(units, separator, start) {
        pieces.push(units[start..found].to_vec());
        start = found + separator.len();
    }
    pieces.push(units[start..].to_vec());
    pieces
}

/// `$$`, `$&`, `` $` `` and `$'` in a replacement string
fn expand_replacement(template: &str, matched: &str, before: &[u16], after: &[u16]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => out.push('$'),
            Some('&') => out.push_str(matched),
            Some('`') => out.push_str(&String::from_utf16_lossy(before)),
            Some('\'') => out.push_str(&String::from_utf16_lossy(after)),
            _ => {
                out.push('$');
                continue;
            }
        }
        chars.next();
    }
    out
}

/// WhiteSpace and LineTerminator as `trim` sees them
fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Case-insensitive first, lowercase before uppercase on ties
fn locale_compare(a: &str, b: &str) -> Ordering {
    let folded = a.to_lowercase().cmp(&b.to_lowercase());
    if folded != Ordering::Equal {
        return folded;
    }
    for (x, y) in a.chars().zip(b.chars()) {
        if x != y {
            return if x.is_lowercase() {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
    }
    a.len().cmp(&b.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn test_find_units() {
        assert_eq!(find_units(&units("hello"), &units("l"), 0), Some(2));
        assert_eq!(find_units(&units("hello"), &units("l"), 3), Some(3));
        assert_eq!(find_units(&units("hello"), &units(""), 5), Some(5));
        assert_eq!(find_units(&units("hello"), &units("z"), 0), None);
        assert_eq!(rfind_units(&units("hello"), &units("l"), 5), Some(3));
        assert_eq!(rfind_units(&units("hello"), &units("l"), 2), Some(2));
    }

    #[test]
    fn test_split_units() {
        let pieces = split_units(&units("a,b,,c"), &units(","));
        assert_eq!(pieces.len(), 4);
        assert_eq!(pieces[2], Vec::<u16>::new());
        assert_eq!(split_units(&units("ab"), &[]).len(), 2);
    }

    #[test]
    fn test_expand_replacement() {
        assert_eq!(
            expand_replacement("[$&]", "x", &units("a"), &units("b")),
            "[x]"
        );
        assert_eq!(expand_replacement("$$", "x", &[], &[]), "$");
        assert_eq!(expand_replacement("$`|$'", "x", &units("a"), &units("b")), "a|b");
        assert_eq!(expand_replacement("$1", "x", &[], &[]), "$1");
    }

    #[test]
    fn test_locale_compare() {
        assert_eq!(locale_compare("a", "B"), Ordering::Less);
        assert_eq!(locale_compare("b", "a"), Ordering::Greater);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }
}
