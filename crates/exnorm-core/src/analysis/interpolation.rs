//! `#{...}` segments inside string literals.

use super::naming::{identifier_tokens, is_ident_char, replace_token};

/// Result of scanning a string literal for interpolation segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpolation<'a> {
    /// Every `#{` was closed; contents in source order
    Segments(Vec<&'a str>),
    /// An opened segment never closed; nothing about its reads can be trusted
    Unbalanced,
}

/// Split out the contents of every `#{...}` in `text`. `\#{` is an escaped
/// literal and does not open a segment.
pub fn scan(text: &str) -> Interpolation<'_> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == b'#' && bytes[i + 1] == b'{' {
            let start = i + 2;
            let Some(end) = segment_end(bytes, start) else {
                return Interpolation::Unbalanced;
            };
            segments.push(&text[start..end]);
            i = end + 1;
            continue;
        }
        i += 1;
    }
    Interpolation::Segments(segments)
}

/// Index of the `}` closing a segment whose contents start at `start`.
/// Braces inside quoted strings and charlists do not count.
fn segment_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut j = start;
    while j < bytes.len() {
        let byte = bytes[j];
        match quote {
            Some(_) if byte == b'\\' => j += 1,
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None => match byte {
                b'"' | b'\'' => quote = Some(byte),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(j);
                    }
                }
                _ => {}
            },
        }
        j += 1;
    }
    None
}

/// A segment consisting of exactly one identifier (surrounding whitespace
/// allowed).
pub fn bare_identifier(segment: &str) -> Option<&str> {
    let trimmed = segment.trim();
    let valid = !trimmed.is_empty()
        && !trimmed.starts_with(|c: char| c.is_ascii_digit())
        && trimmed.chars().all(is_ident_char);
    valid.then_some(trimmed)
}

/// Names a segment may read. A bare identifier reads exactly itself; any
/// other expression is over-approximated by all of its identifier tokens.
pub fn segment_reads(segment: &str) -> Vec<&str> {
    match bare_identifier(segment) {
        Some(name) => vec![name],
        None => identifier_tokens(segment).collect(),
    }
}

/// Rename whole-token occurrences of `from` inside interpolation segments,
/// leaving the literal text untouched. Unbalanced strings are returned as-is.
pub fn rename_in_segments(text: &str, from: &str, to: &str) -> String {
    if !matches!(scan(text), Interpolation::Segments(_)) {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    let mut literal_start = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == b'#' && bytes[i + 1] == b'{' {
            let start = i + 2;
            let Some(end) = segment_end(bytes, start) else {
                return text.to_string();
            };
            out.push_str(&text[literal_start..start]);
            out.push_str(&replace_token(&text[start..end], from, to));
            out.push('}');
            literal_start = end + 1;
            i = end + 1;
            continue;
        }
        i += 1;
    }
    out.push_str(&text[literal_start..]);
    out
}
