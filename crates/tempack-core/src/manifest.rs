//! Template manifest parsing
//!
//! A manifest is a small YAML mapping shipped inside the template archive
//! under a name ending in the manifest suffix (`.tm` by default):
//!
//! ```yaml
//! version: "2.1"
//! description: Landing page starter
//! ```
//!
//! Only `version` is required. Values are kept as [`ManifestValue`] while
//! parsing and coerced when copied into the template; unknown keys are ignored.

use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::ManifestError;

/// Key holding the template version
pub const VERSION_KEY: &str = "version";

/// A single manifest value
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestValue {
    Null,
    Bool(bool),
    Number(serde_yaml::Number),
    String(String),
    /// Sequences and mappings; tolerated for keys the loader does not read
    Structured(Value),
}

impl ManifestValue {
    fn from_yaml(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Tagged(tagged) => Self::from_yaml(tagged.value),
            other => Self::Structured(other),
        }
    }

    /// Name of the value's type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Structured(Value::Sequence(_)) => "sequence",
            Self::Structured(_) => "mapping",
        }
    }

    /// Coerce a string or number to a string; other types yield `None`
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for ManifestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
            Self::Structured(_) => write!(f, "<{}>", self.type_name()),
        }
    }
}

/// Parsed manifest content, keyed by field name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestData {
    entries: BTreeMap<String, ManifestValue>,
}

impl ManifestData {
    /// Parse manifest text
    ///
    /// An empty document parses to an empty mapping. Scalar keys are
    /// stringified; keys that are themselves collections are skipped.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let document: Value = serde_yaml::from_str(content)?;
        let mapping = match document {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            Value::Sequence(_) => return Err(ManifestError::NotAMapping { found: "sequence" }),
            other => {
                let found = ManifestValue::from_yaml(other).type_name();
                return Err(ManifestError::NotAMapping { found });
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in mapping {
            let key = match key {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    tracing::debug!(key = ?other, "Skipping non-scalar manifest key");
                    continue;
                }
            };
            entries.insert(key, ManifestValue::from_yaml(value));
        }

        Ok(Self { entries })
    }

    /// Read and parse a manifest file
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        let data = Self::parse(&content)?;
        for (key, value) in data.iter() {
            tracing::debug!(manifest = %path.display(), %key, %value, "Manifest field");
        }
        Ok(data)
    }

    pub fn get(&self, key: &str) -> Option<&ManifestValue> {
        self.entries.get(key)
    }

    /// Fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ManifestValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The template version, coerced to a string
    pub fn version(&self) -> Result<String, ManifestError> {
        let value = self
            .get(VERSION_KEY)
            .ok_or_else(|| ManifestError::MissingField {
                field: VERSION_KEY.to_string(),
            })?;
        value.as_text().ok_or_else(|| ManifestError::InvalidField {
            field: VERSION_KEY.to_string(),
            found: value.type_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_quoted_version() {
        let data = ManifestData::parse("version: \"2.1\"\n").unwrap();
        assert_eq!(data.version().unwrap(), "2.1");
    }

    #[test]
    fn test_parse_numeric_version() {
        let data = ManifestData::parse("version: 2.1\n").unwrap();
        assert_eq!(data.get("version"), Some(&ManifestValue::Number(serde_yaml::Number::from(2.1))));
        assert_eq!(data.version().unwrap(), "2.1");

        let data = ManifestData::parse("version: 3\n").unwrap();
        assert_eq!(data.version().unwrap(), "3");
    }

    #[test]
    fn test_heterogeneous_values() {
        let data = ManifestData::parse(
            r#"
version: 1.0.0
name: landing
published: true
downloads: 42
license: ~
tags: [web, starter]
"#,
        )
        .unwrap();

        assert_eq!(data.len(), 6);
        assert_eq!(data.get("version"), Some(&ManifestValue::String("1.0.0".to_string())));
        assert_eq!(data.get("published"), Some(&ManifestValue::Bool(true)));
        assert_eq!(data.get("downloads").map(|v| v.type_name()), Some("number"));
        assert_eq!(data.get("license"), Some(&ManifestValue::Null));
        assert_eq!(data.get("tags").map(|v| v.type_name()), Some("sequence"));
        assert_eq!(data.version().unwrap(), "1.0.0");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let data = ManifestData::parse("version: '1'\nfuture:\n  nested: value\n").unwrap();
        assert_eq!(data.version().unwrap(), "1");
    }

    #[test]
    fn test_scalar_keys_stringified() {
        let data = ManifestData::parse("1: one\ntrue: yes\nversion: '0.1'\n").unwrap();
        assert!(data.get("1").is_some());
        assert!(data.get("true").is_some());
    }

    #[test]
    fn test_empty_document() {
        let data = ManifestData::parse("").unwrap();
        assert!(data.is_empty());
        assert!(matches!(
            data.version(),
            Err(ManifestError::MissingField { ref field }) if field == "version"
        ));
    }

    #[test]
    fn test_invalid_version_type() {
        let data = ManifestData::parse("version: true\n").unwrap();
        let err = data.version().unwrap_err();
        assert!(matches!(err, ManifestError::InvalidField { found: "boolean", .. }));

        let data = ManifestData::parse("version: [1, 2]\n").unwrap();
        let err = data.version().unwrap_err();
        assert!(matches!(err, ManifestError::InvalidField { found: "sequence", .. }));
    }

    #[test]
    fn test_not_a_mapping() {
        let err = ManifestData::parse("- a\n- b\n").unwrap_err();
        assert!(matches!(err, ManifestError::NotAMapping { found: "sequence" }));

        let err = ManifestData::parse("just text").unwrap_err();
        assert!(matches!(err, ManifestError::NotAMapping { found: "string" }));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = ManifestData::parse("version: [unclosed\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = ManifestData::load(&temp.path().join("absent.tm")).unwrap_err();
        assert!(matches!(err, ManifestError::Read(_)));
    }

    #[test]
    fn test_load_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("template.tm");
        std::fs::write(&path, "version: \"4.0\"\n").unwrap();

        let data = ManifestData::load(&path).unwrap();
        assert_eq!(data.version().unwrap(), "4.0");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(ManifestValue::Null.to_string(), "null");
        assert_eq!(ManifestValue::Bool(false).to_string(), "false");
        assert_eq!(ManifestValue::String("x".to_string()).to_string(), "x");
        assert_eq!(
            ManifestValue::Structured(Value::Sequence(vec![])).to_string(),
            "<sequence>"
        );
    }
}
