//! Static detectors over the parse outcome
//!
//! All four work from the single parse done when the snippet is created.
//! The two syntax checks key off the outcome tag; the structural checks
//! walk the tree and report nothing when there is no tree.

use super::{Detector, DetectorKind, DetectorRegistry, Snippet};
use crate::syntax::{ParseOutcome, SyntaxTree};
use tree_sitter::Node;

/// Name of the dynamic-evaluation builtin
const EVAL: &str = "eval";

pub fn register(registry: &mut DetectorRegistry) {
    registry.register(Detector::new(
        "check_syntax",
        DetectorKind::Static,
        "The code has a syntax error other than an indentation error",
        has_general_syntax_fault,
    ));
    registry.register(Detector::new(
        "check_indentation",
        DetectorKind::Static,
        "The code has an indentation error",
        has_indentation_fault,
    ));
    registry.register(Detector::new(
        "check_eval_usage",
        DetectorKind::Static,
        "The code calls eval()",
        uses_eval,
    ));
    registry.register(Detector::new(
        "check_mutable_default",
        DetectorKind::Static,
        "A function uses a list, dict or set literal as a default argument",
        uses_mutable_default,
    ));
}

pub fn has_general_syntax_fault(snippet: &Snippet<'_>) -> bool {
    snippet
        .parse_outcome()
        .is_some_and(ParseOutcome::is_other_syntax_failure)
}

pub fn has_indentation_fault(snippet: &Snippet<'_>) -> bool {
    snippet
        .parse_outcome()
        .is_some_and(ParseOutcome::is_indentation_failure)
}

/// A call whose callee is the bare name `eval`
///
/// Purely syntactic: shadowed or rebound names still count, attribute
/// calls such as `obj.eval()` do not.
pub fn uses_eval(snippet: &Snippet<'_>) -> bool {
    let Some(tree) = snippet.tree() else {
        return false;
    };
    tree.nodes().any(|node| is_eval_call(tree, node))
}

fn is_eval_call(tree: &SyntaxTree, node: Node<'_>) -> bool {
    if node.kind() != "call" {
        return false;
    }
    node.child_by_field_name("function")
        .is_some_and(|callee| callee.kind() == "identifier" && tree.text(callee) == EVAL)
}

/// A function definition (async included) with a mutable literal default
pub fn uses_mutable_default(snippet: &Snippet<'_>) -> bool {
    let Some(tree) = snippet.tree() else {
        return false;
    };
    tree.nodes()
        .filter(|node| node.kind() == "function_definition")
        .any(has_mutable_default)
}

fn has_mutable_default(def: Node<'_>) -> bool {
    let Some(params) = def.child_by_field_name("parameters") else {
        return false;
    };

    let mut cursor = params.walk();
    let found = params.named_children(&mut cursor).any(|param| {
        matches!(param.kind(), "default_parameter" | "typed_default_parameter")
            && param
                .child_by_field_name("value")
                .is_some_and(is_mutable_literal)
    });
    found
}

fn is_mutable_literal(node: Node<'_>) -> bool {
    match node.kind() {
        "list" | "dictionary" | "set" => true,
        "parenthesized_expression" => node.named_child(0).is_some_and(is_mutable_literal),
        _ => false,
    }
}
