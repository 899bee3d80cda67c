//! Structural checks that CommonMark itself treats as valid but which almost
//! always indicate a mistake in hand-written documentation.

use std::ops::Range;

use crate::parser::error::ParseError;
use crate::source::LineIndex;

/// Check that the fenced code block at `span` ends with a real closing fence,
/// not at the end of its container or of the file.
pub(crate) fn check_fence(
    source: &str,
    span: Range<usize>,
    file_id: usize,
    index: &LineIndex,
) -> Option<ParseError> {
    let text = &source[span.clone()];
    let mut lines = text.lines();
    let first = lines.next()?;
    let open_at = first.find(['`', '~'])?;
    let fence_char = first[open_at..].chars().next()?;
    let fence_len = first[open_at..]
        .chars()
        .take_while(|&c| c == fence_char)
        .count();

    let closed = lines
        .rev()
        .map(strip_container_prefix)
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| {
            let l = l.trim();
            l.len() >= fence_len && l.chars().all(|c| c == fence_char)
        });
    if closed {
        return None;
    }

    let start = span.start + open_at;
    let location = index.location(source, start);
    Some(
        ParseError::error(
            format!("unterminated code fence opened on line {}", location.line),
            start..start + fence_len,
            file_id,
            location,
        )
        .with_note(format!(
            "close it with a line of at least {} `{}` characters",
            fence_len, fence_char
        )),
    )
}

fn strip_container_prefix(line: &str) -> &str {
    line.trim_start_matches(|c: char| c == '>' || c == ' ' || c == '\t')
}

/// One open list level while scanning.
struct ListLevel {
    marker_indent: usize,
    content_col: usize,
}

/// Find list items whose indentation falls between the enclosing item's
/// marker and its content column, where it is unclear whether they nest.
pub(crate) fn check_list_nesting(
    source: &str,
    body_offset: usize,
    file_id: usize,
    index: &LineIndex,
) -> Vec<ParseError> {
    let mut errors = Vec::new();
    let mut stack: Vec<ListLevel> = Vec::new();
    let mut fence: Option<(char, usize)> = None;
    let mut prev_blank = false;
    let mut offset = body_offset;

    for line in source[body_offset..].split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let text = line.trim_end_matches(['\n', '\r']);
        let (indent, indent_bytes) = measure_indent(text);
        let rest = &text[indent_bytes..];

        if let Some((c, n)) = fence {
            let t = rest.trim_end();
            if t.len() >= n && t.chars().all(|ch| ch == c) {
                fence = None;
            }
            continue;
        }
        if rest.is_empty() {
            prev_blank = true;
            continue;
        }

        let code_indent = stack.last().map_or(0, |top| top.content_col) + 4;
        if indent >= code_indent || rest.starts_with('>') {
            prev_blank = false;
            continue;
        }
        if let Some(open) = fence_open(rest) {
            fence = Some(open);
            prev_blank = false;
            continue;
        }
        if is_thematic_break(rest) {
            stack.clear();
            prev_blank = false;
            continue;
        }

        match list_marker_width(rest) {
            Some(width) => {
                while stack.last().is_some_and(|top| indent < top.marker_indent) {
                    stack.pop();
                }
                if let Some(top) = stack.last() {
                    if indent == top.marker_indent {
                        stack.pop();
                    } else if indent < top.content_col {
                        let start = line_start + indent_bytes;
                        let location = index.location(source, start);
                        errors.push(
                            ParseError::error(
                                format!(
                                    "mismatched list nesting: item at column {} is neither a sibling nor a child of the item above",
                                    indent + 1
                                ),
                                start..start + width.min(rest.len()),
                                file_id,
                                location,
                            )
                            .with_note(format!(
                                "indent it to column {} to make it a sibling, or to column {} to nest it",
                                top.marker_indent + 1,
                                top.content_col + 1
                            )),
                        );
                        stack.pop();
                    }
                }
                stack.push(ListLevel {
                    marker_indent: indent,
                    content_col: indent + width,
                });
            }
            None => {
                if prev_blank {
                    while stack.last().is_some_and(|top| indent < top.content_col) {
                        stack.pop();
                    }
                }
            }
        }
        prev_blank = false;
    }

    errors
}

/// Visual indentation (tabs advance to the next multiple of 4) and the
/// number of bytes it occupies.
fn measure_indent(line: &str) -> (usize, usize) {
    let mut width = 0;
    let mut bytes = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4 - width % 4,
            _ => break,
        }
        bytes += 1;
    }
    (width, bytes)
}

fn fence_open(rest: &str) -> Option<(char, usize)> {
    let c = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let n = rest.chars().take_while(|&ch| ch == c).count();
    if n < 3 || (c == '`' && rest[n..].contains('`')) {
        return None;
    }
    Some((c, n))
}

fn is_thematic_break(rest: &str) -> bool {
    let mut chars = rest.chars().filter(|c| !c.is_whitespace());
    let Some(first) = chars.next() else {
        return false;
    };
    matches!(first, '-' | '*' | '_')
        && rest.chars().filter(|c| !c.is_whitespace()).count() >= 3
        && chars.all(|c| c == first)
}

/// Width from the marker to the item content: `- ` is 2, `10. ` is 4.
fn list_marker_width(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let marker_len = match bytes.first()? {
        b'-' | b'*' | b'+' => 1,
        b'0'..=b'9' => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            if digits > 9 || !matches!(bytes.get(digits), Some(b'.') | Some(b')')) {
                return None;
            }
            digits + 1
        }
        _ => return None,
    };

    let after = &rest[marker_len..];
    if after.is_empty() {
        return Some(marker_len + 1);
    }
    let spaces = after.chars().take_while(|&c| c == ' ').count();
    match spaces {
        0 => None,
        // Content more than four spaces out is indented code; it starts one past the marker.
        5.. => Some(marker_len + 1),
        n => Some(marker_len + n),
    }
}
