use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::doc_types::DocType;

/// Where and how to fetch one document of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub fetch: String,
    pub select: String,
}

/// All documents known for one service; the unit of persistence.
///
/// Serialized as `<name>.json`. Unknown top-level fields of an existing file
/// are kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_from: Option<String>,
    #[serde(default)]
    pub documents: IndexMap<DocType, DocumentEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, imported_from: Option<String>) -> Self {
        Self {
            name: name.into(),
            imported_from,
            documents: IndexMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// File name identifying the record for a service name.
    ///
    /// Only meaningful for names accepted by [`ServiceRecord::is_valid_name`].
    pub fn file_name_for(name: &str) -> String {
        format!("{}.json", name)
    }

    /// Whether `name` stays a single, visible file inside the services
    /// directory once `.json` is appended.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && !name.chars().any(char::is_control)
    }

    pub fn has_type(&self, doc_type: &DocType) -> bool {
        self.documents.contains_key(doc_type)
    }

    /// Bindings for every document, as seeded into the dedup index.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, UrlBinding)> + '_ {
        self.documents.iter().map(move |(doc_type, entry)| {
            (
                entry.fetch.as_str(),
                UrlBinding {
                    service: self.name.clone(),
                    doc_type: doc_type.to_string(),
                    select: entry.select.clone(),
                },
            )
        })
    }
}

/// A document already bound to a fetch URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlBinding {
    pub service: String,
    pub doc_type: String,
    pub select: String,
}
