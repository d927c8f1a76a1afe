//! Closed set of recognized document types.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const EMBEDDED_TYPES: &str = include_str!("types.json");

/// A document type name as it appears as a key of a service's `documents`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocType(String);

impl DocType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocType {
    fn from(s: &str) -> Self {
        DocType(s.to_string())
    }
}

/// Registry of recognized types, loaded once at startup.
#[derive(Debug, Clone)]
pub struct DocTypes {
    names: BTreeSet<String>,
}

impl DocTypes {
    /// The type list bundled with the binary.
    pub fn embedded() -> Self {
        Self::from_json(EMBEDDED_TYPES).expect("bundled types.json is a non-empty JSON object")
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a JSON object whose keys are the type names.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let object = value
            .as_object()
            .ok_or_else(|| ConfigError::InvalidTypes("expected a JSON object".to_string()))?;
        if object.is_empty() {
            return Err(ConfigError::InvalidTypes("no types defined".to_string()));
        }
        Ok(Self::from_names(object.keys().cloned()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Exact, case-sensitive lookup.
    pub fn resolve(&self, name: &str) -> Option<DocType> {
        self.names.get(name).map(|n| DocType(n.clone()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_list_parses() {
        let types = DocTypes::from_json(EMBEDDED_TYPES).unwrap();
        assert!(types.contains("Terms of Service"));
        assert!(types.contains("Privacy Policy"));
        assert_eq!(types.len(), DocTypes::embedded().len());
    }

    #[test]
    fn resolve_is_case_sensitive() {
        let types = DocTypes::from_names(["tos", "privacy"]);
        assert_eq!(types.resolve("tos"), Some(DocType::from("tos")));
        assert_eq!(types.resolve("TOS"), None);
        assert_eq!(types.resolve("banana"), None);
    }

    #[test]
    fn from_json_rejects_non_object() {
        assert!(matches!(
            DocTypes::from_json(r#"["tos"]"#),
            Err(ConfigError::InvalidTypes(_))
        ));
        assert!(matches!(
            DocTypes::from_json("{}"),
            Err(ConfigError::InvalidTypes(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("types.json");
        std::fs::write(&path, r#"{"tos": {"name": "Terms"}, "privacy": {}}"#).unwrap();
        let types = DocTypes::load(&path).unwrap();
        assert_eq!(types.len(), 2);
        assert!(types.contains("privacy"));
    }
}
