//! Reader for `key=value` settings files in the classic `.properties` layout.
//!
//! Supported syntax:
//! - `#` and `!` start a comment line; blank lines are skipped
//! - the key ends at the first unescaped `=`, `:` or whitespace
//! - a trailing odd run of backslashes joins the next line (leading whitespace
//!   of the continuation is dropped)
//! - escapes `\t`, `\n`, `\r`, `\f`, `\uXXXX`; any other `\x` yields `x`

use std::collections::HashMap;

use crate::core::errors::{PdError, Result};

/// Parse properties text into ordered `(key, value)` pairs.
///
/// Duplicate keys are kept in source order; [`parse_map`] applies the
/// last-one-wins rule.
pub fn parse(input: &str) -> Result<Vec<(String, String)>> {
    let mut entries = Vec::new();
    let mut lines = input.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let trimmed = line.trim_start_matches(is_blank);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = String::new();
        let mut current = trimmed;
        loop {
            if has_continuation(current) {
                logical.push_str(&current[..current.len() - 1]);
                match lines.next() {
                    Some((_, next)) => current = next.trim_start_matches(is_blank),
                    None => break,
                }
            } else {
                logical.push_str(current);
                break;
            }
        }

        let (raw_key, raw_value) = split_entry(&logical);
        let line_no = index + 1;
        entries.push((unescape(raw_key, line_no)?, unescape(raw_value, line_no)?));
    }

    Ok(entries)
}

/// Parse properties text into a map; later duplicates replace earlier ones.
pub fn parse_map(input: &str) -> Result<HashMap<String, String>> {
    Ok(parse(input)?.into_iter().collect())
}

const fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn has_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
    trailing % 2 == 1
}

fn split_entry(logical: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = logical.len();
    for (i, c) in logical.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &logical[..key_end];
    let mut rest = logical[key_end..].trim_start_matches(is_blank);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(is_blank);
    }
    (key, rest)
}

fn unescape(raw: &str, line_no: usize) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                    .ok_or_else(|| PdError::ConfigParse {
                        context: "properties",
                        details: format!("line {line_no}: malformed \\u escape `\\u{hex}`"),
                    })?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}
