//! Diagnosis type produced for each matching rule

use crate::rule::Rule;
use serde::{Deserialize, Serialize};

/// Identifier reported when a rule carries no id
pub const MISSING_ID: &str = "N/A";

/// One reported problem instance, built from the rule that matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Rule id, or `N/A` when the rule has none
    pub error_id: String,
    /// Human-readable rule name
    pub name: String,
    /// Short message shown to the user
    pub message: String,
    /// Longer explanation of the problem
    pub explanation: String,
}

impl Diagnosis {
    /// Create a diagnosis from explicit fields
    pub fn new(error_id: &str, name: &str, message: &str, explanation: &str) -> Self {
        Self {
            error_id: error_id.to_string(),
            name: name.to_string(),
            message: message.to_string(),
            explanation: explanation.to_string(),
        }
    }

    /// Build the diagnosis for a matched rule
    pub fn from_rule(rule: &Rule) -> Self {
        Self::new(rule.error_id(), &rule.name, &rule.message, &rule.explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rule_copies_fields() {
        let rule = Rule::new(
            Some("E003"),
            "NameError",
            "check_name_error",
            "Undefined name",
            "A name was used before it was assigned.",
        );
        let diag = Diagnosis::from_rule(&rule);

        assert_eq!(diag.error_id, "E003");
        assert_eq!(diag.name, "NameError");
        assert_eq!(diag.message, "Undefined name");
        assert_eq!(diag.explanation, "A name was used before it was assigned.");
    }

    #[test]
    fn test_from_rule_without_id() {
        let rule = Rule::new(None, "Syntax", "check_syntax", "msg", "why");
        let diag = Diagnosis::from_rule(&rule);
        assert_eq!(diag.error_id, MISSING_ID);
    }

    #[test]
    fn test_serialize_field_names() {
        let diag = Diagnosis::new("E001", "Syntax", "msg", "why");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["error_id"], "E001");
        assert_eq!(json["explanation"], "why");
    }
}
