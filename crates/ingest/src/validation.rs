//! Schema checks for documents and whole service records.
//!
//! The import cycle only sees the [`SchemaValidator`] trait; [`ServiceSchema`]
//! is the built-in implementation mirroring the service file schema.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docimport_core::{DocTypes, DocumentEntry, ServiceRecord};

// ── Result types ────────────────────────────────────────────────────

/// Overall validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

/// A blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    /// JSON-path-like location, e.g. `"documents.tos.fetch"`.
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// `path: message` strings, as carried by `ImportError::Validation`.
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect()
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

// ── Validator seam ──────────────────────────────────────────────────

#[async_trait]
pub trait SchemaValidator: Send + Sync {
    /// Check a single document entry on its own.
    async fn validate_document(&self, entry: &DocumentEntry) -> ValidationResult;

    /// Check a complete service record before it is written.
    async fn validate_service(&self, record: &ServiceRecord) -> ValidationResult;
}

/// Built-in schema: names are non-empty, fetch targets are http(s) URLs,
/// selectors are non-empty and every document key is a recognized type.
pub struct ServiceSchema {
    types: Arc<DocTypes>,
}

impl ServiceSchema {
    pub fn new(types: Arc<DocTypes>) -> Self {
        Self { types }
    }

    fn check_entry(result: &mut ValidationResult, path: &str, entry: &DocumentEntry) {
        match url::Url::parse(&entry.fetch) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => result.error(
                format!("{path}.fetch"),
                format!("unsupported scheme '{}'", url.scheme()),
            ),
            Err(e) => result.error(format!("{path}.fetch"), format!("not a valid URL: {e}")),
        }
        if entry.select.trim().is_empty() {
            result.error(format!("{path}.select"), "must not be empty");
        }
    }
}

#[async_trait]
impl SchemaValidator for ServiceSchema {
    async fn validate_document(&self, entry: &DocumentEntry) -> ValidationResult {
        let mut result = ValidationResult::new();
        Self::check_entry(&mut result, "document", entry);
        result
    }

    async fn validate_service(&self, record: &ServiceRecord) -> ValidationResult {
        let mut result = ValidationResult::new();
        if record.name.trim().is_empty() {
            result.error("name", "must not be empty");
        }
        if record.documents.is_empty() {
            result.error("documents", "must contain at least one document");
        }
        for (doc_type, entry) in &record.documents {
            let path = format!("documents.{doc_type}");
            if !self.types.contains(doc_type.as_str()) {
                result.error(&path, format!("unknown document type '{doc_type}'"));
            }
            Self::check_entry(&mut result, &path, entry);
        }
        result
    }
}
