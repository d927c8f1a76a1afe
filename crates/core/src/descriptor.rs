use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::doc_types::{DocType, DocTypes};
use crate::error::ImportError;
use crate::record::{DocumentEntry, ServiceRecord, UrlBinding};
use crate::selector::{xpath_to_css, DEFAULT_SELECTOR};

/// How a source names the service a document belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceRef {
    /// Raw site identifier such as `google.com`; the display name is derived.
    Site(String),
    /// Service name used verbatim.
    Named(String),
}

impl ServiceRef {
    pub fn display_name(&self) -> String {
        match self {
            ServiceRef::Site(site) => service_name_from_site(site),
            ServiceRef::Named(name) => name.clone(),
        }
    }
}

/// A document as produced by a source adapter, before any checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDescriptor {
    pub service: ServiceRef,
    pub doc_type: String,
    pub url: String,
    pub xpath: Option<String>,
    pub provenance: Option<String>,
}

impl RawDescriptor {
    /// `<service> <type>` prefix of progress log lines.
    pub fn label(&self) -> DescriptorLabel {
        DescriptorLabel {
            service: self.service.display_name(),
            doc_type: self.doc_type.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DescriptorLabel {
    pub service: String,
    pub doc_type: String,
}

impl fmt::Display for DescriptorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.service, self.doc_type)
    }
}

/// Canonical document descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub service: String,
    pub doc_type: DocType,
    pub url: String,
    pub selector: String,
    pub provenance: Option<String>,
}

impl Descriptor {
    pub fn file_name(&self) -> String {
        ServiceRecord::file_name_for(&self.service)
    }

    pub fn entry(&self) -> DocumentEntry {
        DocumentEntry {
            fetch: self.url.clone(),
            select: self.selector.clone(),
        }
    }

    pub fn binding(&self) -> UrlBinding {
        UrlBinding {
            service: self.service.clone(),
            doc_type: self.doc_type.to_string(),
            select: self.selector.clone(),
        }
    }
}

/// Turns raw source records into canonical descriptors.
#[derive(Debug, Clone)]
pub struct Normalizer {
    types: Arc<DocTypes>,
}

impl Normalizer {
    pub fn new(types: Arc<DocTypes>) -> Self {
        Self { types }
    }

    /// Resolve the type, derive the service name and translate the selector.
    pub fn normalize(&self, raw: &RawDescriptor) -> Result<Descriptor, ImportError> {
        let doc_type = self
            .types
            .resolve(&raw.doc_type)
            .ok_or_else(|| ImportError::UnsupportedType(raw.doc_type.clone()))?;

        let service = raw.service.display_name();
        if !ServiceRecord::is_valid_name(&service) {
            return Err(ImportError::InvalidServiceName(service));
        }

        let selector = match raw.xpath.as_deref() {
            Some(xpath) if !xpath.trim().is_empty() => xpath_to_css(xpath)?,
            _ => DEFAULT_SELECTOR.to_string(),
        };

        Ok(Descriptor {
            service,
            doc_type,
            url: raw.url.clone(),
            selector,
            provenance: raw.provenance.clone(),
        })
    }
}

/// `google.co.uk` → `Google`, `YouTube.com` → `Youtube`.
///
/// Only the first character is upper-cased and the rest lower-cased, so
/// multi-word names lose their inner capitals.
pub fn service_name_from_site(site: &str) -> String {
    let first_segment = site.split('.').next().unwrap_or_default();
    let mut chars = first_segment.chars();
    match chars.next() {
        Some(first) => {
            let mut name: String = first.to_uppercase().collect();
            name.push_str(&chars.as_str().to_lowercase());
            name
        }
        None => String::new(),
    }
}
