//! Syntax model provider
//!
//! Parses a snippet once and classifies the result as a successful parse,
//! an indentation failure or any other syntax failure. The tree comes from
//! tree-sitter; indentation faults come from the layout scanner, which
//! follows the interpreter's tokenizer more closely than the grammar's
//! error recovery does.

pub mod layout;
mod validate;

pub use layout::{LayoutFault, LayoutFaultKind};

use std::cell::RefCell;
use std::fmt;
use thiserror::Error;
use tree_sitter::{Node, Parser, Tree, TreeCursor};

/// Internal parser failure (never a fault in the snippet itself)
#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("failed to load Python grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("parser produced no tree")]
    NoTree,
}

thread_local! {
    static PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

fn parse_tree(source: &str) -> Result<Tree, SyntaxError> {
    PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            let mut parser = Parser::new();
            parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
            *slot = Some(parser);
        }

        let parser = slot.as_mut().ok_or(SyntaxError::NoTree)?;
        parser.parse(source, None).ok_or(SyntaxError::NoTree)
    })
}

/// A syntax fault other than an indentation fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxFault {
    /// Line (1-based)
    pub line: usize,
    /// Column (1-based)
    pub column: usize,
    /// Short description
    pub message: String,
}

impl fmt::Display for SyntaxFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.line, self.column)
    }
}

/// Parsed snippet together with its source text
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    tree: Tree,
    source: String,
}

impl SyntaxTree {
    /// Root node of the tree
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text of a node
    pub fn text(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Source the tree was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// All nodes in preorder
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            cursor: self.tree.walk(),
            done: false,
        }
    }

    /// Earliest syntax fault in the tree, if any
    fn first_fault(&self) -> Option<SyntaxFault> {
        self.nodes()
            .filter_map(|node| self.fault_at(node))
            .min_by_key(|(node, _)| node.start_byte())
            .map(|(node, message)| {
                let pos = node.start_position();
                SyntaxFault {
                    line: pos.row + 1,
                    column: pos.column + 1,
                    message,
                }
            })
    }

    fn fault_at<'t>(&'t self, node: Node<'t>) -> Option<(Node<'t>, String)> {
        if node.is_missing() {
            return Some((node, format!("expected '{}'", node.kind())));
        }
        if node.is_error() {
            return Some((node, "invalid syntax".to_string()));
        }

        // Forms the grammar accepts but the interpreter's parser rejects
        validate::check(self, node).map(|violation| (violation.node, violation.message))
    }
}

/// Preorder node iterator over a [`SyntaxTree`]
pub struct Nodes<'t> {
    cursor: TreeCursor<'t>,
    done: bool,
}

impl<'t> Iterator for Nodes<'t> {
    type Item = Node<'t>;

    fn next(&mut self) -> Option<Node<'t>> {
        if self.done {
            return None;
        }

        let node = self.cursor.node();
        if self.cursor.goto_first_child() || self.cursor.goto_next_sibling() {
            return Some(node);
        }

        loop {
            if !self.cursor.goto_parent() {
                self.done = true;
                return Some(node);
            }
            if self.cursor.goto_next_sibling() {
                return Some(node);
            }
        }
    }
}

/// Three-way result of parsing a snippet
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// Parsed without faults
    Success(SyntaxTree),
    /// Leading whitespace does not form a valid block structure
    IndentationFailure(LayoutFault),
    /// Any other syntax fault
    OtherSyntaxFailure(SyntaxFault),
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success(_))
    }

    pub fn is_indentation_failure(&self) -> bool {
        matches!(self, ParseOutcome::IndentationFailure(_))
    }

    pub fn is_other_syntax_failure(&self) -> bool {
        matches!(self, ParseOutcome::OtherSyntaxFailure(_))
    }

    /// Tree of a successful parse
    pub fn tree(&self) -> Option<&SyntaxTree> {
        match self {
            ParseOutcome::Success(tree) => Some(tree),
            _ => None,
        }
    }

    /// One-line description for logs
    pub fn summary(&self) -> String {
        match self {
            ParseOutcome::Success(_) => "ok".to_string(),
            ParseOutcome::IndentationFailure(fault) => fault.to_string(),
            ParseOutcome::OtherSyntaxFailure(fault) => fault.to_string(),
        }
    }
}

/// Parse a snippet and classify the result
pub fn parse(code: &str) -> Result<ParseOutcome, SyntaxError> {
    if let Some(fault) = layout::scan(code) {
        // A syntax fault before the faulting line is reported first
        if let Some(earlier) = fault_before(code, &fault)? {
            return Ok(ParseOutcome::OtherSyntaxFailure(earlier));
        }
        return Ok(ParseOutcome::IndentationFailure(fault));
    }

    let tree = SyntaxTree {
        tree: parse_tree(code)?,
        source: code.to_string(),
    };

    match tree.first_fault() {
        Some(fault) => Ok(ParseOutcome::OtherSyntaxFailure(fault)),
        None => Ok(ParseOutcome::Success(tree)),
    }
}

/// Syntax fault in the lines preceding a layout fault
fn fault_before(code: &str, fault: &LayoutFault) -> Result<Option<SyntaxFault>, SyntaxError> {
    let lines: Vec<&str> = code.split('\n').collect();

    let mut prefix = String::new();
    for line in lines.iter().take(fault.line.saturating_sub(1)) {
        prefix.push_str(line);
        prefix.push('\n');
    }

    // Give a dangling header a body so only genuine faults remain
    if fault.open_block {
        let header = lines
            .get(fault.anchor_line.saturating_sub(1))
            .copied()
            .unwrap_or("");
        let indent: String = header
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect();
        prefix.push_str(&indent);
        prefix.push_str("    pass\n");
    }

    let tree = SyntaxTree {
        tree: parse_tree(&prefix)?,
        source: prefix,
    };
    Ok(tree.first_fault())
}
