//! In-place replacement of a declared `key: value` line
//!
//! Works on raw text rather than a YAML round-trip so that comments, key
//! order, and formatting of every other line survive byte-for-byte.

use crate::types::DeclaredKey;
use std::borrow::Cow;

/// Replace the value of the first declaration of `key` with `new_value`.
///
/// Returns `Cow::Borrowed(file_text)` when the key is not declared, which is
/// how callers detect a failed patch. On a hit only the trailing value
/// changes; indentation, the key token, separator whitespace, an enclosing
/// quote style, a trailing comment, and the line ending are kept.
///
/// # Example
///
/// ```
/// use shiptrack_core::scrape::replace_declared_version;
/// use shiptrack_core::types::DeclaredKey;
///
/// let text = "deploy:\n  tag: 1.0.0\n";
/// let out = replace_declared_version(text, &DeclaredKey::nested("deploy", "tag"), "1.1.0");
/// assert_eq!(out, "deploy:\n  tag: 1.1.0\n");
/// ```
pub fn replace_declared_version<'a>(
    file_text: &'a str,
    key: &DeclaredKey,
    new_value: &str,
) -> Cow<'a, str> {
    let span = match key {
        DeclaredKey::Flat { key } => find_flat(file_text, key),
        DeclaredKey::Nested { parent, child } => find_nested(file_text, parent, child),
    };

    let Some(span) = span else {
        return Cow::Borrowed(file_text);
    };

    let mut out = String::with_capacity(file_text.len() + new_value.len());
    out.push_str(&file_text[..span.start]);
    if span.needs_separator {
        out.push(' ');
    }
    match span.quote {
        Some(q) => {
            out.push(q);
            out.push_str(new_value);
            out.push(q);
        }
        None => out.push_str(new_value),
    }
    if span.needs_trailing_space {
        out.push(' ');
    }
    out.push_str(&file_text[span.end..]);
    Cow::Owned(out)
}

/// Byte range of a declared value within the whole text
#[derive(Debug, PartialEq, Eq)]
struct ValueSpan {
    start: usize,
    end: usize,
    quote: Option<char>,
    /// `key:` directly followed by end of line
    needs_separator: bool,
    /// Empty value directly followed by a comment
    needs_trailing_space: bool,
}

/// Lines with their starting byte offset, line endings stripped
fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        let content = raw.strip_suffix('\n').unwrap_or(raw);
        let content = content.strip_suffix('\r').unwrap_or(content);
        (start, content)
    })
}

#[inline]
fn indent_of(content: &str) -> usize {
    content.len() - content.trim_start_matches([' ', '\t']).len()
}

#[inline]
fn is_blank_or_comment(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Offset just past `key:` if this line declares `key`
fn colon_end(content: &str, key: &str) -> Option<usize> {
    let indent = indent_of(content);
    let after = content[indent..].strip_prefix(key)?.strip_prefix(':')?;
    if after.is_empty() || after.starts_with([' ', '\t']) {
        Some(indent + key.len() + 1)
    } else {
        None
    }
}

/// Locate the value that follows `key:` on one line
fn value_span(line_start: usize, content: &str, colon: usize) -> ValueSpan {
    let rest = &content[colon..];
    let value_offset = colon + (rest.len() - rest.trim_start_matches([' ', '\t']).len());
    let value = &content[value_offset..];

    if value.is_empty() {
        return ValueSpan {
            start: line_start + value_offset,
            end: line_start + value_offset,
            quote: None,
            needs_separator: value_offset == colon,
            needs_trailing_space: false,
        };
    }

    if value.starts_with('#') {
        return ValueSpan {
            start: line_start + value_offset,
            end: line_start + value_offset,
            quote: None,
            needs_separator: false,
            needs_trailing_space: true,
        };
    }

    let first = value.chars().next();
    if let Some(q @ ('"' | '\'')) = first {
        if let Some(close) = value[1..].find(q) {
            return ValueSpan {
                start: line_start + value_offset,
                end: line_start + value_offset + close + 2,
                quote: Some(q),
                needs_separator: false,
                needs_trailing_space: false,
            };
        }
    }

    let comment = value
        .find(" #")
        .or_else(|| value.find("\t#"))
        .unwrap_or(value.len());
    let bare = value[..comment].trim_end();
    ValueSpan {
        start: line_start + value_offset,
        end: line_start + value_offset + bare.len(),
        quote: None,
        needs_separator: false,
        needs_trailing_space: false,
    }
}

fn find_flat(text: &str, key: &str) -> Option<ValueSpan> {
    lines_with_offsets(text)
        .filter(|(_, content)| !is_blank_or_comment(content))
        .find_map(|(start, content)| {
            colon_end(content, key).map(|colon| value_span(start, content, colon))
        })
}

fn find_nested(text: &str, parent: &str, child: &str) -> Option<ValueSpan> {
    let mut parent_indent: Option<usize> = None;
    // Fixed by the first line inside the parent block
    let mut child_indent: Option<usize> = None;

    for (start, content) in lines_with_offsets(text) {
        if is_blank_or_comment(content) {
            continue;
        }
        let indent = indent_of(content);

        if let Some(p) = parent_indent {
            if indent > p {
                let level = *child_indent.get_or_insert(indent);
                if indent == level {
                    if let Some(colon) = colon_end(content, child) {
                        return Some(value_span(start, content, colon));
                    }
                }
                continue;
            }
            // Left the parent block
            parent_indent = None;
            child_indent = None;
        }

        if let Some(colon) = colon_end(content, parent) {
            if is_blank_or_comment(&content[colon..]) {
                parent_indent = Some(indent);
            }
        }
    }

    None
}
