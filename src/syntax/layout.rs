//! Indentation analysis following the Python tokenizer's layout rules
//!
//! The scanner splits the source into logical lines (brackets, backslash
//! continuations and string literals may span several physical lines) and
//! keeps the tokenizer's indentation stack. Indentation is measured twice,
//! once with 8-column tabs and once counting a tab as a single column; the
//! two measurements must order lines the same way or the indentation mixes
//! tabs and spaces ambiguously.

use std::fmt;

const TAB_SIZE: usize = 8;

/// Kind of layout fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutFaultKind {
    /// A line is indented deeper than its block without opening a new one
    UnexpectedIndent,
    /// A header ending in `:` is not followed by an indented block
    ExpectedIndentedBlock,
    /// A dedent lands on a column no enclosing block uses
    UnmatchedDedent,
    /// Tabs and spaces disagree about the block structure
    InconsistentTabs,
}

impl fmt::Display for LayoutFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutFaultKind::UnexpectedIndent => write!(f, "unexpected indent"),
            LayoutFaultKind::ExpectedIndentedBlock => write!(f, "expected an indented block"),
            LayoutFaultKind::UnmatchedDedent => {
                write!(f, "unindent does not match any outer indentation level")
            }
            LayoutFaultKind::InconsistentTabs => {
                write!(f, "inconsistent use of tabs and spaces in indentation")
            }
        }
    }
}

/// An indentation fault found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutFault {
    /// What went wrong
    pub kind: LayoutFaultKind,
    /// Line of the fault (1-based)
    pub line: usize,
    /// First line of the logical line preceding the fault (1-based)
    pub anchor_line: usize,
    /// Whether the preceding logical line ended with `:`
    pub open_block: bool,
}

impl fmt::Display for LayoutFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.kind, self.line)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenString {
    quote: char,
    triple: bool,
}

/// Lexical state carried across physical lines
#[derive(Debug, Default)]
struct LineState {
    depth: usize,
    string: Option<OpenString>,
    backslash: bool,
    last_significant: Option<char>,
}

impl LineState {
    fn inside_logical_line(&self) -> bool {
        self.depth > 0 || self.string.is_some() || self.backslash
    }

    /// Consume one physical line (without its newline)
    fn consume(&mut self, line: &[char]) {
        self.backslash = false;
        let mut i = 0;

        while i < line.len() {
            let c = line[i];

            if let Some(open) = self.string {
                if c == '\\' {
                    if i + 1 == line.len() {
                        // Escaped newline keeps a short string open
                        return;
                    }
                    i += 2;
                    continue;
                }
                if c == open.quote {
                    if !open.triple {
                        self.string = None;
                        self.last_significant = Some(c);
                        i += 1;
                        continue;
                    }
                    if line.get(i + 1) == Some(&c) && line.get(i + 2) == Some(&c) {
                        self.string = None;
                        self.last_significant = Some(c);
                        i += 3;
                        continue;
                    }
                }
                i += 1;
                continue;
            }

            match c {
                '#' => break,
                '\'' | '"' => {
                    let triple = line.get(i + 1) == Some(&c) && line.get(i + 2) == Some(&c);
                    self.string = Some(OpenString { quote: c, triple });
                    i += if triple { 3 } else { 1 };
                    continue;
                }
                '(' | '[' | '{' => self.depth += 1,
                ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
                '\\' if i + 1 == line.len() => {
                    self.backslash = true;
                    i += 1;
                    continue;
                }
                _ => {}
            }

            if !c.is_whitespace() {
                self.last_significant = Some(c);
            }
            i += 1;
        }

        // A short string cannot cross a newline; drop it and let the parser report it
        if matches!(self.string, Some(OpenString { triple: false, .. })) {
            self.string = None;
        }
    }
}

/// Measure the indentation of a line: (tab-8 column, tab-1 column, rest)
fn measure(line: &[char]) -> (usize, usize, &[char]) {
    let mut col = 0;
    let mut alt_col = 0;

    for (i, c) in line.iter().enumerate() {
        match c {
            ' ' => {
                col += 1;
                alt_col += 1;
            }
            '\t' => {
                col = (col / TAB_SIZE + 1) * TAB_SIZE;
                alt_col += 1;
            }
            '\x0c' => {
                col = 0;
                alt_col = 0;
            }
            _ => return (col, alt_col, &line[i..]),
        }
    }

    (col, alt_col, &[])
}

/// Scan source code for the first indentation fault
pub fn scan(source: &str) -> Option<LayoutFault> {
    let mut indents: Vec<usize> = vec![0];
    let mut alt_indents: Vec<usize> = vec![0];
    let mut state = LineState::default();

    let mut expects_block = false;
    let mut logical_start = 0usize;
    let mut previous_start: Option<usize> = None;
    let mut line_count = 0usize;

    for (idx, raw) in source.split('\n').enumerate() {
        let line_no = idx + 1;
        line_count = line_no;
        let text = raw.strip_suffix('\r').unwrap_or(raw);
        let chars: Vec<char> = text.chars().collect();

        if !state.inside_logical_line() {
            let (col, alt_col, rest) = measure(&chars);

            // Blank and comment-only lines do not take part in indentation
            if rest.is_empty() || rest[0] == '#' {
                continue;
            }

            let anchor_line = previous_start.unwrap_or(line_no);
            let fault = |kind| {
                Some(LayoutFault {
                    kind,
                    line: line_no,
                    anchor_line,
                    open_block: expects_block,
                })
            };

            let top = *indents.last().unwrap_or(&0);
            let alt_top = *alt_indents.last().unwrap_or(&0);

            if col == top {
                if alt_col != alt_top {
                    return fault(LayoutFaultKind::InconsistentTabs);
                }
                if expects_block {
                    return fault(LayoutFaultKind::ExpectedIndentedBlock);
                }
            } else if col > top {
                if alt_col <= alt_top {
                    return fault(LayoutFaultKind::InconsistentTabs);
                }
                if !expects_block {
                    return fault(LayoutFaultKind::UnexpectedIndent);
                }
                indents.push(col);
                alt_indents.push(alt_col);
            } else {
                while indents.len() > 1 && col < *indents.last().unwrap_or(&0) {
                    indents.pop();
                    alt_indents.pop();
                }
                if col != *indents.last().unwrap_or(&0) {
                    return fault(LayoutFaultKind::UnmatchedDedent);
                }
                if alt_col != *alt_indents.last().unwrap_or(&0) {
                    return fault(LayoutFaultKind::InconsistentTabs);
                }
                if expects_block {
                    return fault(LayoutFaultKind::ExpectedIndentedBlock);
                }
            }

            logical_start = line_no;
            state.last_significant = None;
        }

        state.consume(&chars);

        if !state.inside_logical_line() {
            expects_block = state.last_significant == Some(':');
            previous_start = Some(logical_start);
        }
    }

    // A header on the last logical line never got its block
    if expects_block && !state.inside_logical_line() {
        return Some(LayoutFault {
            kind: LayoutFaultKind::ExpectedIndentedBlock,
            line: line_count + 1,
            anchor_line: logical_start,
            open_block: true,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(source: &str) -> Option<LayoutFaultKind> {
        scan(source).map(|f| f.kind)
    }

    #[test]
    fn test_well_formed_blocks() {
        assert_eq!(kind("if True:\n    x = 1\n"), None);
        assert_eq!(
            kind("class A:\n    def f(self):\n        pass\n    x = 1\ny = 2\n"),
            None
        );
        assert_eq!(kind("if x: pass\ny = 1"), None);
        assert_eq!(kind("f = lambda: 0"), None);
    }

    #[test]
    fn test_empty_and_blank_sources() {
        assert_eq!(kind(""), None);
        assert_eq!(kind("   \n\n\t\n"), None);
        assert_eq!(kind("# only a comment\n    # indented comment\n"), None);
    }

    #[test]
    fn test_unexpected_indent() {
        let fault = scan("x = 1\n    y = 2").unwrap();
        assert_eq!(fault.kind, LayoutFaultKind::UnexpectedIndent);
        assert_eq!(fault.line, 2);
        assert_eq!(fault.anchor_line, 1);
        assert!(!fault.open_block);

        let fault = scan("  x = 1").unwrap();
        assert_eq!(fault.kind, LayoutFaultKind::UnexpectedIndent);
        assert_eq!(fault.line, 1);
    }

    #[test]
    fn test_expected_indented_block() {
        let fault = scan("def f():\nreturn 1").unwrap();
        assert_eq!(fault.kind, LayoutFaultKind::ExpectedIndentedBlock);
        assert_eq!(fault.line, 2);
        assert_eq!(fault.anchor_line, 1);
        assert!(fault.open_block);

        let fault = scan("for i in range(3):").unwrap();
        assert_eq!(fault.kind, LayoutFaultKind::ExpectedIndentedBlock);
        assert_eq!(fault.line, 2);
        assert_eq!(fault.anchor_line, 1);

        assert_eq!(
            kind("if a:\n    if b:\n    x = 1"),
            Some(LayoutFaultKind::ExpectedIndentedBlock)
        );
    }

    #[test]
    fn test_unmatched_dedent() {
        let fault = scan("if True:\n    x = 1\n  y = 2").unwrap();
        assert_eq!(fault.kind, LayoutFaultKind::UnmatchedDedent);
        assert_eq!(fault.line, 3);
    }

    #[test]
    fn test_inconsistent_tabs() {
        // A tab and eight spaces agree at tab size 8 but not at tab size 1
        assert_eq!(
            kind("if True:\n\tx = 1\n        y = 2"),
            Some(LayoutFaultKind::InconsistentTabs)
        );
        assert_eq!(kind("if True:\n\tx = 1\n\ty = 2"), None);
    }

    #[test]
    fn test_brackets_span_lines() {
        assert_eq!(kind("x = [\n1,\n        2]\ny = 3"), None);
        assert_eq!(kind("d = {1:\n 2}"), None);
        assert_eq!(kind("f(a,\n      b)\n"), None);
    }

    #[test]
    fn test_strings_and_continuations() {
        assert_eq!(kind("s = \"\"\"\n  indented\n\"\"\"\nx = 1"), None);
        assert_eq!(kind("s = '''a:\n'''\nx = 1"), None);
        assert_eq!(kind("x = 1 + \\\n        2"), None);
        assert_eq!(kind("s = 'a:' # trailing:\nx = 1"), None);
        assert_eq!(kind("s = 'don\\'t'\nx = 1"), None);
    }

    #[test]
    fn test_comment_lines_do_not_close_blocks() {
        assert_eq!(kind("if x:\n# note\n    y = 1"), None);
    }

    #[test]
    fn test_unclosed_bracket_is_not_a_layout_fault() {
        assert_eq!(kind("def f(:\n  x"), None);
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(kind("if True:\r\n    x = 1\r\n"), None);
        assert_eq!(
            kind("if True:\r\nx = 1\r\n"),
            Some(LayoutFaultKind::ExpectedIndentedBlock)
        );
    }

    #[test]
    fn test_fault_display() {
        let fault = scan("x = 1\n    y = 2").unwrap();
        assert_eq!(fault.to_string(), "unexpected indent (line 2)");
    }
}
