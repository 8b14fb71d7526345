//! JSON field extraction by string scanning
//!
//! Responses from the validation backend, the Tasking Manager and the release
//! feed are read with these helpers rather than a full JSON model. Absence is
//! always reported as `None` (or an empty sequence); nothing here fails.
//!
//! Bracket matching and object splitting track string literals with a
//! three-state scanner, so brackets and braces inside quoted values never
//! affect nesting depth.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InString,
    Escape,
}

/// Byte-level scanner that knows whether it is inside a string literal
#[derive(Debug)]
struct Scanner {
    state: ScanState,
}

impl Scanner {
    fn new() -> Self {
        Self {
            state: ScanState::Outside,
        }
    }

    /// Advance over one byte. Returns `true` when the byte is structural,
    /// i.e. it sits outside every string literal.
    fn step(&mut self, byte: u8) -> bool {
        match self.state {
            ScanState::Outside => {
                if byte == b'"' {
                    self.state = ScanState::InString;
                    false
                } else {
                    true
                }
            }
            ScanState::InString => {
                match byte {
                    b'\\' => self.state = ScanState::Escape,
                    b'"' => self.state = ScanState::Outside,
                    _ => {}
                }
                false
            }
            ScanState::Escape => {
                self.state = ScanState::InString;
                false
            }
        }
    }
}

/// Find the string value of `name`.
///
/// Quoted values are unescaped (`\"` becomes `"`, `\\` becomes `\`). Bare
/// tokens such as numbers or booleans are returned as written. `null`,
/// nested arrays/objects and a missing field all yield `None`.
pub fn find_string_field(json: &str, name: &str) -> Option<String> {
    let start = find_value_start(json, name)?;
    read_scalar(&json[start..])
}

/// Find the integer value of `name`.
///
/// Accepts a bare number or a quoted numeric string.
pub fn find_int_field(json: &str, name: &str) -> Option<i64> {
    find_string_field(json, name)?.trim().parse().ok()
}

/// Find the index of the bracket closing the one at `open_index`.
///
/// Returns `None` when `open_index` does not hold `open` or when the input
/// ends before depth returns to zero.
pub fn find_matching_bracket(
    json: &str,
    open_index: usize,
    open: char,
    close: char,
) -> Option<usize> {
    let open = u8::try_from(open).ok()?;
    let close = u8::try_from(close).ok()?;
    let bytes = json.as_bytes();

    if bytes.get(open_index) != Some(&open) {
        return None;
    }

    let mut scanner = Scanner::new();
    let mut depth = 0usize;

    for (offset, &byte) in bytes[open_index..].iter().enumerate() {
        if !scanner.step(byte) {
            continue;
        }
        if byte == open {
            depth += 1;
        } else if byte == close {
            depth -= 1;
            if depth == 0 {
                return Some(open_index + offset);
            }
        }
    }

    None
}

/// Split an array body into its top-level object substrings, in order.
///
/// Only `{` and `}` move the depth counter. An unterminated trailing object
/// is dropped, so malformed input yields the complete objects seen so far.
pub fn split_top_level_objects(array_body: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut scanner = Scanner::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (index, &byte) in array_body.as_bytes().iter().enumerate() {
        if !scanner.step(byte) {
            continue;
        }
        match byte {
            b'{' => {
                if depth == 0 {
                    start = index;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    objects.push(&array_body[start..=index]);
                }
            }
            _ => {}
        }
    }

    objects
}

/// Carve out the `[...]` value of `name`, brackets included
pub fn find_array<'a>(json: &'a str, name: &str) -> Option<&'a str> {
    find_nested(json, name, '[', ']')
}

/// Carve out the `{...}` value of `name`, braces included
pub fn find_object<'a>(json: &'a str, name: &str) -> Option<&'a str> {
    find_nested(json, name, '{', '}')
}

fn find_nested<'a>(json: &'a str, name: &str, open: char, close: char) -> Option<&'a str> {
    let start = find_value_start(json, name)?;
    if !json[start..].starts_with(open) {
        return None;
    }
    let end = find_matching_bracket(json, start, open, close)?;
    Some(&json[start..=end])
}

/// Locate the first byte of the value belonging to key `name`.
///
/// An occurrence of `"name"` only counts as a key when the next
/// non-whitespace character is `:`.
fn find_value_start(json: &str, name: &str) -> Option<usize> {
    let needle = format!("\"{}\"", name);
    let mut from = 0usize;

    while let Some(found) = json[from..].find(&needle) {
        let after_key = from + found + needle.len();
        let rest = &json[after_key..];
        let trimmed = rest.trim_start();

        if let Some(value) = trimmed.strip_prefix(':') {
            let value_offset = value.len() - value.trim_start().len();
            let colon_index = after_key + (rest.len() - trimmed.len());
            let start = colon_index + 1 + value_offset;
            return (start < json.len()).then_some(start);
        }

        from = after_key;
    }

    None
}

fn read_scalar(value: &str) -> Option<String> {
    if let Some(quoted) = value.strip_prefix('"') {
        return read_quoted(quoted);
    }
    if value.starts_with('{') || value.starts_with('[') {
        return None;
    }

    let end = value
        .find(|c: char| matches!(c, ',' | '}' | ']') || c.is_whitespace())
        .unwrap_or(value.len());
    let token = &value[..end];

    match token {
        "" | "null" => None,
        _ => Some(token.to_string()),
    }
}

/// Read a string literal body (opening quote already consumed), unescaping
/// as it goes. Returns `None` if the literal is never closed.
fn read_quoted(body: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(out),
            '\\' => match chars.next()? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                '/' => out.push('/'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{0008}'),
                'f' => out.push('\u{000C}'),
                'u' => {
                    let hex: String = chars.clone().take(4).collect();
                    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        Some(decoded) if hex.len() == 4 => {
                            out.push(decoded);
                            for _ in 0..4 {
                                chars.next();
                            }
                        }
                        _ => out.push_str("\\u"),
                    }
                }
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            _ => out.push(c),
        }
    }

    None
}
