//! Anchor location over raw manifest lines.
//!
//! Sections are bounded by literal begin/end sentinels that must appear
//! exactly once. Nested child lists and record bodies are ranged by
//! delimiter-depth counting that skips `/* */` comments and quoted strings,
//! so a nested group never closes its parent early.
use crate::error::PatchError;

#[derive(Debug, Clone, Copy)]
pub struct SectionBounds {
    /// Line index of the begin sentinel.
    pub begin: usize,
    /// Line index of the end sentinel.
    pub end: usize,
}

/// Locate a section's begin/end sentinel lines.
///
/// Zero or multiple matches are errors; the locator never substitutes a
/// nearby line.
pub fn section_bounds(
    lines: &[String],
    section: &str,
    begin_marker: &str,
    end_marker: &str,
) -> Result<SectionBounds, PatchError> {
    let begin = sentinel_line(lines, section, begin_marker)?;
    let end = sentinel_line(lines, section, end_marker)?;
    if end <= begin {
        return Err(PatchError::missing(
            section,
            "end sentinel after begin sentinel",
        ));
    }
    Ok(SectionBounds { begin, end })
}

/// Locate a sentinel that must appear exactly once in the document.
pub fn sentinel_line(lines: &[String], section: &str, marker: &str) -> Result<usize, PatchError> {
    let mut matches = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(marker))
        .map(|(idx, _)| idx);
    let first = matches
        .next()
        .ok_or_else(|| PatchError::missing(section, &format!("sentinel {marker:?}")))?;
    let extra = matches.count();
    if extra > 0 {
        return Err(PatchError::ambiguous(
            section,
            &format!("sentinel {marker:?}"),
            extra + 1,
        ));
    }
    Ok(first)
}

/// Find the line of the unique occurrence of `needle` within `[from, to)`.
pub fn line_in_range(
    lines: &[String],
    section: &str,
    from: usize,
    to: usize,
    needle: &str,
) -> Result<usize, PatchError> {
    let mut matches = lines[from..to]
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(needle))
        .map(|(offset, _)| from + offset);
    let first = matches
        .next()
        .ok_or_else(|| PatchError::missing(section, &format!("{needle:?}")))?;
    let extra = matches.count();
    if extra > 0 {
        return Err(PatchError::ambiguous(
            section,
            &format!("{needle:?}"),
            extra + 1,
        ));
    }
    Ok(first)
}

/// Line index of the `)` closing the list opened on `open_line`.
pub fn list_close(lines: &[String], section: &str, open_line: usize) -> Result<usize, PatchError> {
    balanced_close(lines, open_line, '(', ')')
        .ok_or_else(|| PatchError::missing(section, "list close delimiter"))
}

/// Line index of the `}` closing the record opened on `header_line`.
pub fn record_close(
    lines: &[String],
    section: &str,
    header_line: usize,
) -> Result<usize, PatchError> {
    balanced_close(lines, header_line, '{', '}')
        .ok_or_else(|| PatchError::missing(section, "record close delimiter"))
}

/// Depth-balanced scan for the line carrying the delimiter that closes the
/// first `open` found at or after `start`.
///
/// Comment and string contents are skipped; strings do not span lines.
fn balanced_close(lines: &[String], start: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_comment = false;
    for (offset, line) in lines.iter().skip(start).enumerate() {
        let mut in_string = false;
        let mut chars = line.chars().peekable();
        while let Some(ch) = chars.next() {
            if in_comment {
                if ch == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    in_comment = false;
                }
                continue;
            }
            if in_string {
                match ch {
                    '\\' => {
                        chars.next();
                    }
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            if ch == '/' && chars.peek() == Some(&'*') {
                chars.next();
                in_comment = true;
            } else if ch == '"' {
                in_string = true;
            } else if ch == open {
                depth += 1;
            } else if ch == close && depth > 0 {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{line_in_range, list_close, record_close, section_bounds};

    fn doc(text: &str) -> Vec<String> {
        text.lines().map(|line| line.to_string()).collect()
    }

    #[test]
    fn section_bounds_finds_unique_sentinels() {
        let lines = doc("header\n/* Begin X section */\nbody\n/* End X section */\n");
        let bounds =
            section_bounds(&lines, "X", "/* Begin X section */", "/* End X section */")
                .expect("bounds");
        assert_eq!(bounds.begin, 1);
        assert_eq!(bounds.end, 3);
    }

    #[test]
    fn missing_sentinel_is_an_error() {
        let lines = doc("no markers here\n");
        let err = section_bounds(&lines, "X", "/* Begin X section */", "/* End X section */")
            .expect_err("should fail");
        assert!(err.to_string().contains("Begin X section"));
    }

    #[test]
    fn duplicated_sentinel_is_an_error() {
        let lines = doc("/* Begin X section */\n/* Begin X section */\n/* End X section */\n");
        section_bounds(&lines, "X", "/* Begin X section */", "/* End X section */")
            .expect_err("should fail");
    }

    #[test]
    fn list_close_skips_nested_lists() {
        let lines = doc(
            "children = (\n\tAAA /* a */,\n\tinner = (\n\t\tBBB /* b */,\n\t),\n);\ntrailing\n",
        );
        let close = list_close(&lines, "groups", 0).expect("close");
        assert_eq!(close, 5);
    }

    #[test]
    fn list_close_ignores_delimiters_in_comments_and_strings() {
        let lines = doc(
            "files = (\n\tAAA /* weird (name) */,\n\tBBB /* \"b\" */,\n\tCCC, // not a pbx comment\n);\n",
        );
        let close = list_close(&lines, "phase", 0).expect("close");
        assert_eq!(close, 4);
    }

    #[test]
    fn record_close_balances_nested_braces() {
        let lines = doc("AAA = {\n\tinner = {\n\t\tk = v;\n\t};\n};\n");
        let close = record_close(&lines, "groups", 0).expect("close");
        assert_eq!(close, 4);
    }

    #[test]
    fn line_in_range_rejects_multiple_matches() {
        let lines = doc("a\nfiles = (\nfiles = (\nb\n");
        line_in_range(&lines, "phase", 0, lines.len(), "files = (").expect_err("ambiguous");
    }
}
