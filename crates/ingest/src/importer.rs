//! The merge-validate-save cycle run for every descriptor.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use docimport_core::{ImportError, Normalizer, RawDescriptor};

use crate::files::ServiceFiles;
use crate::store::{Reservation, ServiceStore};
use crate::validation::SchemaValidator;

/// Terminal state of one descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    /// Its fetch URL is already bound to a document.
    Skipped,
    /// Bad type, duplicate type, untranslatable selector or invalid document.
    Rejected(ImportError),
    /// Merged into the in-memory record; the save result follows.
    Merged(SaveOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// Record-level validation or the write failed. The merge stays in
    /// memory; the file keeps its previous content until a later save.
    Failed(ImportError),
    /// Nothing to write (no record or no documents).
    Empty,
}

/// Runs descriptors through normalize → reserve → validate → merge → save.
pub struct Importer {
    store: Arc<ServiceStore>,
    normalizer: Normalizer,
    validator: Arc<dyn SchemaValidator>,
    files: Arc<ServiceFiles>,
}

impl Importer {
    pub fn new(
        store: Arc<ServiceStore>,
        normalizer: Normalizer,
        validator: Arc<dyn SchemaValidator>,
        files: Arc<ServiceFiles>,
    ) -> Self {
        Self {
            store,
            normalizer,
            validator,
            files,
        }
    }

    pub fn store(&self) -> &Arc<ServiceStore> {
        &self.store
    }

    /// Import one descriptor. Never fails: every problem is an outcome.
    pub async fn import(&self, raw: RawDescriptor) -> ImportOutcome {
        let label = raw.label();
        info!("{} start", label);

        // Everything up to the reservation is synchronous, so no other task
        // can claim the same URL or type slot in between.
        let descriptor = match self.normalizer.normalize(&raw) {
            Ok(d) => d,
            Err(_) if self.store.is_claimed(&raw.url) => {
                info!("{} skip", label);
                return ImportOutcome::Skipped;
            }
            Err(e) => {
                warn!(error = %e, "{} fail", label);
                return ImportOutcome::Rejected(e);
            }
        };

        match self.store.reserve(&descriptor) {
            Reservation::Granted => {}
            Reservation::AlreadyClaimed => {
                info!("{} skip", label);
                return ImportOutcome::Skipped;
            }
            Reservation::DuplicateType => {
                let e = ImportError::DuplicateType {
                    service: descriptor.service.clone(),
                    doc_type: descriptor.doc_type.to_string(),
                };
                warn!(error = %e, "{} fail", label);
                return ImportOutcome::Rejected(e);
            }
        }

        let report = self.validator.validate_document(&descriptor.entry()).await;
        if !report.valid {
            self.store.release(&descriptor);
            let e = ImportError::Validation(report.messages());
            warn!(error = %e, "{} fail", label);
            return ImportOutcome::Rejected(e);
        }

        self.store.commit(&descriptor);
        let saved = self.save(&descriptor.file_name()).await;
        match &saved {
            SaveOutcome::Failed(e) => warn!(error = %e, "{} fail", label),
            _ => info!("{} done", label),
        }
        ImportOutcome::Merged(saved)
    }

    /// Validate and write the full current record for `file_name`.
    ///
    /// Saves of one file are serialised and snapshot the record only once
    /// they hold the lock, so the last save to finish carries every merge.
    pub async fn save(&self, file_name: &str) -> SaveOutcome {
        let lock = self.store.save_lock(file_name);
        let _guard = lock.lock().await;

        let path = self.files.path_for(file_name);
        info!("Saving {}", path.display());

        let record = match self.store.snapshot(file_name) {
            Some(record) if !record.documents.is_empty() => record,
            _ => return SaveOutcome::Empty,
        };

        let report = self.validator.validate_service(&record).await;
        if !report.valid {
            let e = ImportError::Persist {
                file: file_name.to_string(),
                reason: report.messages().join("; "),
            };
            warn!(error = %e, "Could not save {}", path.display());
            return SaveOutcome::Failed(e);
        }

        match self.files.write(file_name, &record).await {
            Ok(path) => {
                info!("Saved {}", path.display());
                SaveOutcome::Saved(path)
            }
            Err(err) => {
                let e = ImportError::Persist {
                    file: file_name.to_string(),
                    reason: err.to_string(),
                };
                warn!(error = %e, "Could not save {}", path.display());
                SaveOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docimport_core::{DocTypes, DocumentEntry, ServiceRecord, ServiceRef};
    use tempfile::TempDir;

    use crate::validation::{ServiceSchema, ValidationResult};

    fn setup(dir: &TempDir) -> Importer {
        let types = Arc::new(DocTypes::from_names(["tos", "privacy"]));
        Importer::new(
            Arc::new(ServiceStore::new()),
            Normalizer::new(Arc::clone(&types)),
            Arc::new(ServiceSchema::new(types)),
            Arc::new(ServiceFiles::new(dir.path())),
        )
    }

    fn raw(doc_type: &str, url: &str) -> RawDescriptor {
        RawDescriptor {
            service: ServiceRef::Site("example.com".into()),
            doc_type: doc_type.into(),
            url: url.into(),
            xpath: None,
            provenance: None,
        }
    }

    #[tokio::test]
    async fn merge_then_skip_same_url() {
        let dir = TempDir::new().unwrap();
        let importer = setup(&dir);

        let first = importer.import(raw("tos", "https://example.com/tos")).await;
        assert!(matches!(first, ImportOutcome::Merged(SaveOutcome::Saved(_))));

        let second = importer.import(raw("privacy", "https://example.com/tos")).await;
        assert_eq!(second, ImportOutcome::Skipped);

        let record = importer.store().snapshot("Example.json").unwrap();
        assert_eq!(record.documents.len(), 1);
    }

    #[tokio::test]
    async fn unknown_type_with_claimed_url_is_skipped() {
        let dir = TempDir::new().unwrap();
        let importer = setup(&dir);
        importer.import(raw("tos", "https://example.com/tos")).await;
        let outcome = importer.import(raw("banana", "https://example.com/tos")).await;
        assert_eq!(outcome, ImportOutcome::Skipped);
    }

    #[tokio::test]
    async fn invalid_document_releases_reservation() {
        let dir = TempDir::new().unwrap();
        let importer = setup(&dir);

        let bad = importer.import(raw("tos", "mailto:legal@example.com")).await;
        assert!(matches!(bad, ImportOutcome::Rejected(ImportError::Validation(_))));
        assert!(!importer.store().is_claimed("mailto:legal@example.com"));
        assert!(importer.store().snapshot("Example.json").is_none());

        // the type slot is free again
        let good = importer.import(raw("tos", "https://example.com/tos")).await;
        assert!(matches!(good, ImportOutcome::Merged(SaveOutcome::Saved(_))));
    }

    struct RejectServices;

    #[async_trait]
    impl SchemaValidator for RejectServices {
        async fn validate_document(&self, _entry: &DocumentEntry) -> ValidationResult {
            ValidationResult::new()
        }

        async fn validate_service(&self, _record: &ServiceRecord) -> ValidationResult {
            let mut result = ValidationResult::new();
            result.error("name", "rejected for test");
            result
        }
    }

    #[tokio::test]
    async fn failed_save_keeps_merge_in_memory() {
        let dir = TempDir::new().unwrap();
        let types = Arc::new(DocTypes::from_names(["tos"]));
        let importer = Importer::new(
            Arc::new(ServiceStore::new()),
            Normalizer::new(types),
            Arc::new(RejectServices),
            Arc::new(ServiceFiles::new(dir.path())),
        );

        let outcome = importer.import(raw("tos", "https://example.com/tos")).await;
        let (file, reason) = match outcome {
            ImportOutcome::Merged(SaveOutcome::Failed(ImportError::Persist { file, reason })) => {
                (file, reason)
            }
            other => panic!("expected a failed save, got {other:?}"),
        };
        assert_eq!(file, "Example.json");
        assert!(reason.contains("rejected for test"));
        assert!(!dir.path().join("Example.json").exists());
        assert!(importer.store().snapshot("Example.json").is_some());
        assert!(importer.store().is_claimed("https://example.com/tos"));
    }

    #[tokio::test]
    async fn save_without_record_is_empty() {
        let dir = TempDir::new().unwrap();
        let importer = setup(&dir);
        assert_eq!(importer.save("Nobody.json").await, SaveOutcome::Empty);
    }
}
