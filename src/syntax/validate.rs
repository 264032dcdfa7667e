//! Python 3 checks over an error-free tree
//!
//! The grammar is permissive: it accepts Python 2 forms and leaves several
//! parser-level restrictions to the interpreter. These checks reject what
//! the interpreter's parser rejects before the code ever runs.

use super::SyntaxTree;
use tree_sitter::Node;

const LEADING_ZEROS: &str =
    "leading zeros in decimal integer literals are not permitted; use an 0o prefix for octal integers";

/// A rule violation anchored at the offending node
pub(super) struct Violation<'t> {
    pub node: Node<'t>,
    pub message: String,
}

impl<'t> Violation<'t> {
    fn new(node: Node<'t>, message: impl Into<String>) -> Self {
        Self {
            node,
            message: message.into(),
        }
    }
}

/// Check a single node; child nodes are visited by the caller
pub(super) fn check<'t>(tree: &SyntaxTree, node: Node<'t>) -> Option<Violation<'t>> {
    match node.kind() {
        "parameters" | "lambda_parameters" => check_parameters(node),
        "argument_list" => check_arguments(node),
        "assignment" => check_assignment(node),
        "augmented_assignment" => check_augmented_target(node),
        "for_statement" | "for_in_clause" => node
            .child_by_field_name("left")
            .and_then(|target| check_target(target, Target::Assign)),
        "delete_statement" => named_children(node)
            .into_iter()
            .find_map(|target| check_target(target, Target::Delete)),
        "integer" => number_fault(tree.text(node), false).map(|m| Violation::new(node, m)),
        "float" => number_fault(tree.text(node), true).map(|m| Violation::new(node, m)),
        "string" => check_string_prefix(tree, node),
        "print_statement" => check_statement_call(tree, node, "print"),
        "exec_statement" => check_statement_call(tree, node, "exec"),
        "except_clause" => check_except_clause(node),
        "raise_statement" => check_raise(node),
        "expression_statement" => named_children(node)
            .into_iter()
            .find(|child| child.kind() == "named_expression")
            .map(|child| Violation::new(child, "invalid syntax")),
        _ => None,
    }
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

enum Param {
    Plain,
    Default,
    VarPositional,
    BareStar,
    Slash,
    VarKeyword,
    Parenthesized,
}

fn classify_parameter(node: Node<'_>) -> Param {
    match node.kind() {
        "default_parameter" | "typed_default_parameter" => Param::Default,
        "list_splat_pattern" => Param::VarPositional,
        "keyword_separator" => Param::BareStar,
        "positional_separator" => Param::Slash,
        "dictionary_splat_pattern" => Param::VarKeyword,
        "tuple_pattern" => Param::Parenthesized,
        "typed_parameter" => match node.named_child(0).map(|n| n.kind()) {
            Some("list_splat_pattern") => Param::VarPositional,
            Some("dictionary_splat_pattern") => Param::VarKeyword,
            _ => Param::Plain,
        },
        _ => Param::Plain,
    }
}

fn check_parameters(node: Node<'_>) -> Option<Violation<'_>> {
    let mut seen_default = false;
    let mut keyword_only = false;
    let mut bare_star: Option<Node<'_>> = None;
    let mut var_keyword = false;

    for param in named_children(node) {
        if var_keyword {
            return Some(Violation::new(param, "arguments cannot follow var-keyword argument"));
        }

        match classify_parameter(param) {
            Param::Plain => {
                if seen_default && !keyword_only {
                    return Some(Violation::new(
                        param,
                        "parameter without a default follows parameter with a default",
                    ));
                }
                bare_star = None;
            }
            Param::Default => {
                seen_default = true;
                bare_star = None;
            }
            Param::VarPositional => keyword_only = true,
            Param::BareStar => {
                keyword_only = true;
                bare_star = Some(param);
            }
            Param::Slash => {
                if keyword_only {
                    return Some(Violation::new(param, "/ must be ahead of *"));
                }
            }
            Param::VarKeyword => {
                if let Some(star) = bare_star {
                    return Some(Violation::new(star, "named arguments must follow bare *"));
                }
                var_keyword = true;
            }
            Param::Parenthesized => {
                return Some(Violation::new(param, "Function parameters cannot be parenthesized"));
            }
        }
    }

    bare_star.map(|star| Violation::new(star, "named arguments must follow bare *"))
}

fn check_arguments(node: Node<'_>) -> Option<Violation<'_>> {
    let mut keyword = false;
    let mut keyword_unpacking = false;

    for arg in named_children(node) {
        match arg.kind() {
            "keyword_argument" => keyword = true,
            "dictionary_splat" => keyword_unpacking = true,
            "list_splat" => {
                if keyword_unpacking {
                    return Some(Violation::new(
                        arg,
                        "iterable argument unpacking follows keyword argument unpacking",
                    ));
                }
            }
            _ => {
                if keyword_unpacking {
                    return Some(Violation::new(
                        arg,
                        "positional argument follows keyword argument unpacking",
                    ));
                }
                if keyword {
                    return Some(Violation::new(arg, "positional argument follows keyword argument"));
                }
            }
        }
    }

    None
}

#[derive(Clone, Copy)]
enum Target {
    Assign,
    Delete,
}

/// Whether an expression may be bound or deleted
fn check_target(node: Node<'_>, target: Target) -> Option<Violation<'_>> {
    match node.kind() {
        "identifier" | "keyword_identifier" | "attribute" | "subscript" => None,
        "pattern_list" | "tuple_pattern" | "list_pattern" | "tuple" | "list"
        | "expression_list" | "parenthesized_expression" => named_children(node)
            .into_iter()
            .find_map(|child| check_target(child, target)),
        "list_splat_pattern" | "list_splat" => match target {
            Target::Assign => named_children(node)
                .into_iter()
                .find_map(|child| check_target(child, target)),
            Target::Delete => Some(Violation::new(node, "cannot delete starred")),
        },
        kind => {
            let verb = match target {
                Target::Assign => "assign to",
                Target::Delete => "delete",
            };
            Some(Violation::new(
                node,
                format!("cannot {} {}", verb, describe(kind)),
            ))
        }
    }
}

fn describe(kind: &str) -> &'static str {
    match kind {
        "call" => "function call",
        "integer" | "float" | "string" | "concatenated_string" | "true" | "false" | "none"
        | "ellipsis" => "literal",
        "comparison_operator" => "comparison",
        "lambda" => "lambda",
        "await" => "await expression",
        "conditional_expression" => "conditional expression",
        "named_expression" => "named expression",
        "dictionary" => "dict literal",
        "set" => "set display",
        "list_comprehension" => "list comprehension",
        "dictionary_comprehension" => "dict comprehension",
        "set_comprehension" => "set comprehension",
        "generator_expression" => "generator expression",
        "yield" => "yield expression",
        _ => "expression",
    }
}

fn check_assignment(node: Node<'_>) -> Option<Violation<'_>> {
    let left = node.child_by_field_name("left")?;

    if node.child_by_field_name("type").is_some() {
        let shape = match left.kind() {
            "pattern_list" | "tuple_pattern" | "expression_list" | "tuple" => Some("tuple"),
            "list_pattern" | "list" => Some("list"),
            _ => None,
        };
        if let Some(shape) = shape {
            return Some(Violation::new(
                left,
                format!("only single target (not {}) can be annotated", shape),
            ));
        }
    }

    check_target(left, Target::Assign)
}

fn check_augmented_target(node: Node<'_>) -> Option<Violation<'_>> {
    let left = node.child_by_field_name("left")?;
    let shape = match left.kind() {
        "pattern_list" | "tuple_pattern" | "expression_list" | "tuple" => "tuple",
        "list_pattern" | "list" => "list",
        "list_splat_pattern" | "list_splat" => "starred",
        _ => return check_target(left, Target::Assign),
    };
    Some(Violation::new(
        left,
        format!("'{}' is an illegal expression for augmented assignment", shape),
    ))
}

/// Validate a numeric literal token
fn number_fault(text: &str, float: bool) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let (radix, body) = if float {
        (10, lower.as_str())
    } else if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, lower.as_str())
    };
    let prefixed = radix != 10;
    let invalid = || {
        let kind = match radix {
            16 => "hexadecimal",
            8 => "octal",
            2 => "binary",
            _ => "decimal",
        };
        Some(format!("invalid {} literal", kind))
    };

    let (body, imaginary) = match body.strip_suffix('j') {
        Some(rest) if !prefixed => (rest, true),
        _ => (body, false),
    };
    if body.is_empty() || body.ends_with('l') {
        return invalid();
    }

    // Underscores only between digits (or right after a base prefix)
    let chars: Vec<char> = body.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if *c != '_' {
            continue;
        }
        let before = if i == 0 {
            prefixed
        } else {
            chars[i - 1].is_digit(radix)
        };
        let after = chars.get(i + 1).is_some_and(|n| n.is_digit(radix));
        if !(before && after) {
            return invalid();
        }
    }

    if prefixed
        && !(chars.iter().all(|c| *c == '_' || c.is_digit(radix))
            && chars.iter().any(|c| c.is_digit(radix)))
    {
        return invalid();
    }

    if !float
        && !prefixed
        && !imaginary
        && body.starts_with('0')
        && body.chars().any(|c| matches!(c, '1'..='9'))
    {
        return Some(LEADING_ZEROS.to_string());
    }

    None
}

fn check_string_prefix<'t>(tree: &SyntaxTree, node: Node<'t>) -> Option<Violation<'t>> {
    let prefix: String = tree
        .text(node)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase();

    match prefix.as_str() {
        "" | "r" | "u" | "f" | "b" | "t" | "fr" | "rf" | "br" | "rb" | "tr" | "rt" => None,
        _ => Some(Violation::new(node, "invalid string prefix")),
    }
}

fn check_statement_call<'t>(
    tree: &SyntaxTree,
    node: Node<'t>,
    keyword: &str,
) -> Option<Violation<'t>> {
    let rest = tree.text(node).strip_prefix(keyword).unwrap_or("");
    if rest.trim_start().starts_with('(') {
        return None;
    }
    Some(Violation::new(
        node,
        format!("Missing parentheses in call to '{}'", keyword),
    ))
}

/// `except A, e:` is a Python 2 form
fn check_except_clause(node: Node<'_>) -> Option<Violation<'_>> {
    let mut cursor = node.walk();
    let comma = node
        .children(&mut cursor)
        .find(|child| matches!(child.kind(), "," | "expression_list"));
    comma.map(|child| Violation::new(child, "multiple exception types must be parenthesized"))
}

/// `raise E, "message"` is a Python 2 form
fn check_raise(node: Node<'_>) -> Option<Violation<'_>> {
    named_children(node)
        .into_iter()
        .find(|child| child.kind() == "expression_list")
        .map(|child| Violation::new(child, "invalid syntax"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_literals() {
        for valid in ["0", "00", "0_0", "10", "1_000", "0x_ff", "0XFF", "0o17", "0b1_0", "07j", "1j"] {
            assert_eq!(number_fault(valid, false), None, "literal {}", valid);
        }
        for valid in ["1.5", "0777.5", "1e5", "1_0.5e-3", ".5", "1.", "2.5j"] {
            assert_eq!(number_fault(valid, true), None, "literal {}", valid);
        }

        assert_eq!(number_fault("0777", false).as_deref(), Some(LEADING_ZEROS));
        assert_eq!(number_fault("00_7", false).as_deref(), Some(LEADING_ZEROS));
        for invalid in ["1_", "1__0", "10L", "0x", "0x_", "0xffl", "0o8"] {
            assert!(number_fault(invalid, false).is_some(), "literal {}", invalid);
        }
        for invalid in ["1_.5", "1._5", "1.5_", "1e_5", "1.5L"] {
            assert!(number_fault(invalid, true).is_some(), "literal {}", invalid);
        }
        assert_eq!(
            number_fault("0x", false).as_deref(),
            Some("invalid hexadecimal literal")
        );
    }

    #[test]
    fn test_describe_targets() {
        assert_eq!(describe("call"), "function call");
        assert_eq!(describe("integer"), "literal");
        assert_eq!(describe("binary_operator"), "expression");
    }
}
