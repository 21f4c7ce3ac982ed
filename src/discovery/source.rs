//! Source-text helpers shared by the discovery strategies.

use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::ops::Range;
use std::path::Path;

/// Bytes scanned after a marker when looking for the declaration it tags.
pub const LOOKAHEAD_BYTES: usize = 400;

/// Directory names never descended into.
pub const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "bin",
    "obj",
    "target",
    "vendor",
    "dist",
    "build",
    "__pycache__",
    ".venv",
    "venv",
];

/// One file handed to a strategy.
pub struct SourceFile<'a> {
    pub path: &'a Path,
    /// Path relative to the search root it was found under.
    pub relative_path: &'a Path,
    pub content: &'a str,
}

impl SourceFile<'_> {
    /// Relative path without extension, using `sep` between components.
    pub fn module_path(&self, sep: &str) -> String {
        let without_ext = self.relative_path.with_extension("");
        without_ext
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .filter(|c| *c != "." && !c.is_empty())
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// Largest char boundary `<= index`.
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Declarations tagged by `marker`, in source order.
///
/// A declaration is tagged when it is the first `declaration` match starting
/// within [`LOOKAHEAD_BYTES`] after a marker match. With `ignore_marker` every
/// declaration in the file is returned.
pub fn marked_declarations<'t>(
    content: &'t str,
    marker: &Regex,
    declaration: &Regex,
    ignore_marker: bool,
) -> Vec<Captures<'t>> {
    if ignore_marker {
        return declaration.captures_iter(content).collect();
    }

    let mut seen = BTreeSet::new();
    let mut found = Vec::new();
    for m in marker.find_iter(content) {
        let end = floor_char_boundary(content, m.end() + LOOKAHEAD_BYTES);
        let Some(caps) = declaration.captures_at(&content[..end], m.end()) else {
            continue;
        };
        let start = caps.get(0).map_or(0, |g| g.start());
        if seen.insert(start) {
            found.push(caps);
        }
    }
    found.sort_by_key(|c| c.get(0).map_or(0, |g| g.start()));
    found
}

/// Inner range of the first `{ ... }` block opening at or after `from`.
///
/// String literals and comments are skipped while matching braces.
pub fn brace_block(content: &str, from: usize) -> Option<Range<usize>> {
    let bytes = content.as_bytes();
    let open = from + content.get(from..)?.find('{')?;
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'`' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + 1..i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

// Each skip_* returns the index of the last byte consumed.

fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote != b'`' => i += 1,
            b if b == quote => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len().saturating_sub(1)
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i.saturating_sub(1).max(start)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 1;
        }
        i += 1;
    }
    bytes.len().saturating_sub(1)
}

/// Remove `//` and `/* */` comments, keeping string literals and newlines.
pub fn strip_c_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied_to = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'`' => i = skip_string(bytes, i),
            b'/' if matches!(bytes.get(i + 1), Some(b'/') | Some(b'*')) => {
                out.push_str(&text[copied_to..i]);
                let end = if bytes[i + 1] == b'/' {
                    skip_line(bytes, i)
                } else {
                    skip_block_comment(bytes, i)
                };
                // keep line structure for line-oriented parsers
                out.extend(text[i..=end].chars().filter(|c| *c == '\n'));
                i = end;
                copied_to = end + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if copied_to < text.len() {
        out.push_str(&text[copied_to..]);
    }
    out
}

/// A statement at nesting depth zero inside a block body.
#[derive(Debug, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    /// The statement ended with a nested `{ ... }` block (method, ctor, ...).
    pub ends_with_block: bool,
}

/// Split a block body into its depth-zero statements.
///
/// Statements end at any of `separators` or after a nested block closes.
/// Nested block contents are dropped.
pub fn top_level_segments(body: &str, separators: &[char]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = body.chars().peekable();
    let mut in_string: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(q) = in_string {
            if depth == 0 {
                current.push(c);
            }
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    if depth == 0 {
                        current.push(escaped);
                    }
                }
            } else if c == q {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '`' | '\'' => {
                in_string = Some(c);
                if depth == 0 {
                    current.push(c);
                }
            }
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    push_segment(&mut segments, &mut current, true);
                }
            }
            c if depth == 0 && separators.contains(&c) => {
                push_segment(&mut segments, &mut current, false);
            }
            c if depth == 0 => current.push(c),
            _ => {}
        }
    }
    push_segment(&mut segments, &mut current, false);
    segments
}

fn push_segment(segments: &mut Vec<Segment>, current: &mut String, ends_with_block: bool) {
    let text = current.trim();
    if !text.is_empty() {
        segments.push(Segment {
            text: text.to_string(),
            ends_with_block,
        });
    }
    current.clear();
}

/// Split on `sep` outside of `<>`, `()`, `[]` and `{}`.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' | ')' | ']' | '}' => depth -= 1,
            c if c == sep && depth <= 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

/// Contents of the parenthesised list opening at `open` (which must be `(`).
pub fn paren_list(content: &str, open: usize) -> Option<&str> {
    let bytes = content.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return content.get(open + 1..i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Index of the first non-whitespace byte at or after `from`.
pub fn skip_whitespace(content: &str, from: usize) -> usize {
    content
        .get(from..)
        .and_then(|rest| rest.find(|c: char| !c.is_whitespace()))
        .map_or(content.len(), |offset| from + offset)
}
