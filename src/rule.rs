//! Rule definition and the ordered rule catalog

use crate::config::ConfigError;
use crate::diagnostic::MISSING_ID;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Built-in catalog shipped with the crate
const BUILTIN_CATALOG: &str = include_str!("../rules/default.json");

/// A catalog rule: a named condition paired with user-facing text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule identifier (e.g., "E001"); not required to be unique
    #[serde(default, alias = "error_id", alias = "errorId")]
    pub id: Option<String>,

    /// Human-readable name
    #[serde(alias = "nombre")]
    pub name: String,

    /// Detector this rule resolves to (e.g., "check_syntax")
    #[serde(
        alias = "conditionName",
        alias = "condition_name",
        alias = "condicion"
    )]
    pub condition: String,

    /// Short message
    #[serde(alias = "mensaje")]
    pub message: String,

    /// Longer explanation
    #[serde(alias = "explicacion")]
    pub explanation: String,
}

impl Rule {
    /// Create a rule from its fields
    pub fn new(
        id: Option<&str>,
        name: &str,
        condition: &str,
        message: &str,
        explanation: &str,
    ) -> Self {
        Self {
            id: id.map(String::from),
            name: name.to_string(),
            condition: condition.to_string(),
            message: message.to_string(),
            explanation: explanation.to_string(),
        }
    }

    /// Id as reported in diagnoses
    pub fn error_id(&self) -> &str {
        self.id.as_deref().unwrap_or(MISSING_ID)
    }
}

/// Rule file format with an explicit `rules` list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    /// File format version
    #[serde(default)]
    pub version: Option<String>,

    /// Rules defined in this file
    pub rules: Vec<Rule>,
}

/// Accepted catalog documents: a bare list or a `RuleFile`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    List(Vec<Rule>),
    File(RuleFile),
}

impl CatalogDocument {
    fn into_rules(self) -> Vec<Rule> {
        match self {
            CatalogDocument::List(rules) => rules,
            CatalogDocument::File(file) => file.rules,
        }
    }
}

/// Ordered, read-only collection of rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
}

impl RuleCatalog {
    /// Create a catalog from rules, keeping their order
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Catalog with no rules
    pub fn empty() -> Self {
        Self::default()
    }

    /// The catalog embedded in the crate
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_CATALOG).unwrap_or_else(|e| {
            log::error!("built-in rule catalog is malformed: {}", e);
            Self::empty()
        })
    }

    /// Parse a JSON catalog
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let doc: CatalogDocument = serde_json::from_str(content)?;
        Ok(Self::new(doc.into_rules()))
    }

    /// Parse a YAML catalog
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let doc: CatalogDocument = serde_yaml::from_str(content)?;
        Ok(Self::new(doc.into_rules()))
    }

    /// Load a catalog file; YAML for `.yaml`/`.yml`, JSON otherwise
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    /// Load a catalog file, falling back to an empty catalog on failure
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) => {
                log::debug!(
                    "loaded {} rules from {}",
                    catalog.len(),
                    path.display()
                );
                catalog
            }
            Err(e) => {
                log::warn!(
                    "failed to load rule catalog {}: {}; continuing with no rules",
                    path.display(),
                    e
                );
                Self::empty()
            }
        }
    }

    /// Rules in catalog order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Iterate over rules in catalog order
    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the catalog has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule with the given id
    pub fn find(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id.as_deref() == Some(id))
    }
}

impl<'a> IntoIterator for &'a RuleCatalog {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rule_error_id_sentinel() {
        let rule = Rule::new(None, "Syntax", "check_syntax", "m", "e");
        assert_eq!(rule.error_id(), "N/A");

        let rule = Rule::new(Some("E001"), "Syntax", "check_syntax", "m", "e");
        assert_eq!(rule.error_id(), "E001");
    }

    #[test]
    fn test_parse_bare_list_keeps_order() {
        let json = r#"[
            {"id": "B", "name": "second", "condition": "c2", "message": "m", "explanation": "e"},
            {"id": "A", "name": "first", "condition": "c1", "message": "m", "explanation": "e"}
        ]"#;

        let catalog = RuleCatalog::from_json_str(json).unwrap();
        let ids: Vec<_> = catalog.iter().map(|r| r.error_id()).collect();
        assert_eq!(ids, vec!["B", "A"]);
    }

    #[test]
    fn test_parse_aliased_field_names() {
        let json = r#"[{
            "error_id": "E003",
            "nombre": "NameError",
            "condicion": "check_name_error",
            "mensaje": "Variable no definida",
            "explicacion": "Se usa un nombre antes de asignarlo."
        }]"#;

        let catalog = RuleCatalog::from_json_str(json).unwrap();
        let rule = &catalog.rules()[0];
        assert_eq!(rule.id.as_deref(), Some("E003"));
        assert_eq!(rule.name, "NameError");
        assert_eq!(rule.condition, "check_name_error");
        assert_eq!(rule.message, "Variable no definida");
    }

    #[test]
    fn test_parse_condition_name_alias_and_extra_fields() {
        let json = r#"[{
            "name": "Eval",
            "conditionName": "check_eval_usage",
            "message": "m",
            "explanation": "e",
            "severity": "high"
        }]"#;

        let catalog = RuleCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.rules()[0].condition, "check_eval_usage");
        assert_eq!(catalog.rules()[0].id, None);
    }

    #[test]
    fn test_missing_required_field_is_error() {
        let json = r#"[{"id": "E1", "name": "x", "message": "m", "explanation": "e"}]"#;
        assert!(RuleCatalog::from_json_str(json).is_err());
    }

    #[test]
    fn test_parse_rule_file_yaml() {
        let yaml = r#"
version: "1.0"
rules:
  - id: E002
    name: Indentation
    condition: check_indentation
    message: Bad indentation
    explanation: Blocks must be indented consistently.
"#;

        let catalog = RuleCatalog::from_yaml_str(yaml).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.rules()[0].condition, "check_indentation");
    }

    #[test]
    fn test_duplicate_ids_are_kept() {
        let json = r#"[
            {"id": "E1", "name": "a", "condition": "c", "message": "m", "explanation": "e"},
            {"id": "E1", "name": "a", "condition": "c", "message": "m", "explanation": "e"}
        ]"#;
        assert_eq!(RuleCatalog::from_json_str(json).unwrap().len(), 2);
    }

    #[test]
    fn test_load_by_extension() {
        let temp = TempDir::new().unwrap();
        let yaml_path = temp.path().join("rules.yml");
        std::fs::write(
            &yaml_path,
            "- name: n\n  condition: check_syntax\n  message: m\n  explanation: e\n",
        )
        .unwrap();
        assert_eq!(RuleCatalog::load(&yaml_path).unwrap().len(), 1);

        let json_path = temp.path().join("base_conocimiento.json");
        std::fs::write(
            &json_path,
            r#"[{"name": "n", "condition": "check_syntax", "message": "m", "explanation": "e"}]"#,
        )
        .unwrap();
        assert_eq!(RuleCatalog::load(&json_path).unwrap().len(), 1);
    }

    #[test]
    fn test_load_or_empty_fails_open() {
        let temp = TempDir::new().unwrap();

        let missing = temp.path().join("missing.json");
        assert!(matches!(
            RuleCatalog::load(&missing),
            Err(ConfigError::Io(_))
        ));
        assert!(RuleCatalog::load_or_empty(&missing).is_empty());

        let malformed = temp.path().join("broken.json");
        std::fs::write(&malformed, "{ not json").unwrap();
        assert!(matches!(
            RuleCatalog::load(&malformed),
            Err(ConfigError::Json(_))
        ));
        assert!(RuleCatalog::load_or_empty(&malformed).is_empty());
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = RuleCatalog::builtin();
        assert_eq!(catalog.len(), 10);
        assert_eq!(catalog.rules()[0].condition, "check_syntax");
        assert_eq!(catalog.find("E002").unwrap().condition, "check_indentation");
        assert!(catalog.find("E999").is_none());
    }
}
