//! Logical-line splitting
//!
//! Turns raw Makefile bytes into a sequence of logical lines: a physical
//! line ending in `\` continues onto the next physical line. Continuation
//! lines are joined with a single space, except inside a recipe line, where
//! the backslash-newline pair is preserved verbatim.
//!
//! Comments (`#` to end of physical line, itself subject to backslash
//! continuation) are stripped here so the statement parser never has to
//! think about them, pre-digesting the input in the lexer rather than
//! threading comment-skipping through every downstream consumer.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub text: Vec<u8>,
    /// 1-based line number of the first physical line this logical line
    /// started on, used to build a `Loc` for every statement.
    pub line: u32,
    /// True if this logical line begins with a tab: a recipe line, whose
    /// continuations are preserved verbatim rather than space-joined.
    pub is_recipe: bool,
}

/// Split `src` into logical lines. `src` need not end in a newline.
pub fn split_logical_lines(src: &[u8]) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut i = 0usize;
    let mut lineno: u32 = 1;

    while i < src.len() {
        let start_line = lineno;
        let is_recipe = src[i] == b'\t';
        let mut text = Vec::new();
        loop {
            let (content, consumed_newline, next_i, lines_consumed) = take_physical_line(src, i);
            i = next_i;
            lineno += lines_consumed;

            let (content, continues) = if !is_recipe {
                strip_comment(content)
            } else {
                (content, ends_with_continuation(content))
            };

            if continues {
                let joined = strip_trailing_backslash(content);
                if is_recipe {
                    text.extend_from_slice(joined);
                    text.push(b'\n');
                } else {
                    if !text.is_empty() {
                        text.push(b' ');
                    }
                    text.extend_from_slice(trim_ascii(joined));
                }
                if !consumed_newline {
                    break;
                }
                continue;
            } else {
                if is_recipe {
                    text.extend_from_slice(content);
                } else if !text.is_empty() {
                    text.push(b' ');
                    text.extend_from_slice(trim_ascii(content));
                } else {
                    text.extend_from_slice(content);
                }
                break;
            }
        }
        lines.push(LogicalLine { text, line: start_line, is_recipe });
    }

    lines
}

/// Return (content up to but excluding the newline, whether a newline was
/// consumed, new offset, number of physical lines advanced).
fn take_physical_line(src: &[u8], start: usize) -> (&[u8], bool, usize, u32) {
    let mut j = start;
    while j < src.len() && src[j] != b'\n' {
        j += 1;
    }
    if j < src.len() {
        (&src[start..j], true, j + 1, 1)
    } else {
        (&src[start..j], false, j, 0)
    }
}

fn ends_with_continuation(line: &[u8]) -> bool {
    let mut backslashes = 0usize;
    for &b in line.iter().rev() {
        if b == b'\\' {
            backslashes += 1;
        } else {
            break;
        }
    }
    backslashes % 2 == 1
}

fn strip_trailing_backslash(line: &[u8]) -> &[u8] {
    &line[..line.len() - 1]
}

fn trim_ascii(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(b.len());
    let end = b.iter().rposition(|c| !c.is_ascii_whitespace()).map(|i| i + 1).unwrap_or(start);
    &b[start..end]
}

/// Strip an unescaped `#` comment from a non-recipe physical line, and
/// report whether the (possibly truncated) line still ends in a line
/// continuation.
fn strip_comment(line: &[u8]) -> (&[u8], bool) {
    let mut i = 0usize;
    while i < line.len() {
        if line[i] == b'\\' && i + 1 < line.len() && line[i + 1] == b'#' {
            i += 2;
            continue;
        }
        if line[i] == b'#' {
            let truncated = &line[..i];
            return (trim_ascii(truncated), ends_with_continuation(truncated));
        }
        i += 1;
    }
    (line, ends_with_continuation(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[LogicalLine]) -> Vec<String> {
        lines.iter().map(|l| String::from_utf8_lossy(&l.text).into_owned()).collect()
    }

    #[test]
    fn splits_simple_lines() {
        let lines = split_logical_lines(b"A := 1\nB := 2\n");
        assert_eq!(texts(&lines), vec!["A := 1", "B := 2"]);
    }

    #[test]
    fn joins_backslash_continuations_with_single_space() {
        let lines = split_logical_lines(b"FOO = bar \\\n    baz\n");
        assert_eq!(texts(&lines), vec!["FOO = bar baz"]);
        assert_eq!(lines[0].line, 1);
    }

    #[test]
    fn recipe_continuation_preserves_newline() {
        let lines = split_logical_lines(b"all:\n\techo a \\\n\techo b\n");
        assert_eq!(texts(&lines)[0], "all:");
        assert_eq!(lines[1].is_recipe, true);
        assert_eq!(String::from_utf8_lossy(&lines[1].text), "\techo a \n\techo b");
    }

    #[test]
    fn strips_unescaped_comment() {
        let lines = split_logical_lines(b"A := 1 # a comment\n");
        assert_eq!(texts(&lines), vec!["A := 1"]);
    }

    #[test]
    fn escaped_hash_is_kept() {
        let lines = split_logical_lines(b"A := 1\\#not-a-comment\n");
        assert_eq!(texts(&lines), vec!["A := 1\\#not-a-comment"]);
    }

    #[test]
    fn tracks_starting_line_number_across_continuations() {
        let lines = split_logical_lines(b"A := 1\nB = x \\\ny \\\nz\nC := 2\n");
        assert_eq!(lines[1].line, 2);
        assert_eq!(lines[2].line, 5);
    }
}
