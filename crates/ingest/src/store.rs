//! In-memory service map and URL dedup index shared by every import task.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::debug;

use docimport_core::{Descriptor, DocType, ServiceRecord, UrlBinding};

/// Result of [`DedupIndex::check_and_claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Proceed,
    Skip,
}

/// Fetch URL → documents already bound to it.
#[derive(Debug, Default)]
pub struct DedupIndex {
    claims: HashMap<String, Vec<UrlBinding>>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every document URL found in existing records.
    pub fn seed<'a>(&mut self, records: impl IntoIterator<Item = &'a ServiceRecord>) {
        for record in records {
            for (url, binding) in record.bindings() {
                self.claims.entry(url.to_string()).or_default().push(binding);
            }
        }
    }

    pub fn is_claimed(&self, url: &str) -> bool {
        self.claims.get(url).is_some_and(|b| !b.is_empty())
    }

    /// Claim `url` for `binding` unless someone already holds it.
    pub fn check_and_claim(&mut self, url: &str, binding: UrlBinding) -> Claim {
        if self.is_claimed(url) {
            return Claim::Skip;
        }
        self.claims.insert(url.to_string(), vec![binding]);
        Claim::Proceed
    }

    /// Drop a claim made by a descriptor that was rejected afterwards.
    pub fn release(&mut self, url: &str) {
        self.claims.remove(url);
    }

    pub fn bindings(&self, url: &str) -> Option<&[UrlBinding]> {
        self.claims.get(url).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Outcome of [`ServiceStore::reserve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// URL and type slot are now held by the caller.
    Granted,
    /// The URL is bound to another document.
    AlreadyClaimed,
    /// The service already has (or is about to have) a document of this type.
    DuplicateType,
}

#[derive(Debug, Default)]
struct StoreState {
    /// Keyed by file name (`<Service>.json`).
    services: HashMap<String, ServiceRecord>,
    index: DedupIndex,
    /// `(file name, type)` slots held by in-flight descriptors.
    pending_types: HashSet<(String, DocType)>,
}

/// Service records plus dedup index behind one lock.
///
/// Every check-and-update happens inside a single critical section, so two
/// tasks racing on the same URL or the same service type cannot both win.
#[derive(Debug, Default)]
pub struct ServiceStore {
    state: Mutex<StoreState>,
    save_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ServiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load existing records into the map and their URLs into the index.
    pub fn seed(&self, records: impl IntoIterator<Item = (String, ServiceRecord)>) {
        let mut state = self.state.lock().expect("store lock poisoned");
        for (file_name, record) in records {
            state.index.seed(std::iter::once(&record));
            state.services.insert(file_name, record);
        }
        debug!(
            services = state.services.len(),
            urls = state.index.len(),
            "seeded service store"
        );
    }

    pub fn is_claimed(&self, url: &str) -> bool {
        self.state
            .lock()
            .expect("store lock poisoned")
            .index
            .is_claimed(url)
    }

    /// Atomically claim the descriptor's URL and its `(service, type)` slot.
    pub fn reserve(&self, descriptor: &Descriptor) -> Reservation {
        let mut state = self.state.lock().expect("store lock poisoned");
        if state.index.is_claimed(&descriptor.url) {
            return Reservation::AlreadyClaimed;
        }

        let file_name = descriptor.file_name();
        let slot = (file_name, descriptor.doc_type.clone());
        let taken = state
            .services
            .get(&slot.0)
            .is_some_and(|r| r.has_type(&descriptor.doc_type))
            || state.pending_types.contains(&slot);
        if taken {
            return Reservation::DuplicateType;
        }

        state.index.check_and_claim(&descriptor.url, descriptor.binding());
        state.pending_types.insert(slot);
        Reservation::Granted
    }

    /// Give back a reservation whose descriptor was rejected.
    pub fn release(&self, descriptor: &Descriptor) {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.index.release(&descriptor.url);
        state
            .pending_types
            .remove(&(descriptor.file_name(), descriptor.doc_type.clone()));
    }

    /// Write a reserved descriptor into its service record.
    ///
    /// Creates the record on first use; `importedFrom` is only set then.
    pub fn commit(&self, descriptor: &Descriptor) {
        let mut state = self.state.lock().expect("store lock poisoned");
        let file_name = descriptor.file_name();
        state
            .pending_types
            .remove(&(file_name.clone(), descriptor.doc_type.clone()));
        state
            .services
            .entry(file_name)
            .or_insert_with(|| {
                ServiceRecord::new(descriptor.service.clone(), descriptor.provenance.clone())
            })
            .documents
            .insert(descriptor.doc_type.clone(), descriptor.entry());
    }

    /// Clone of the current record for `file_name`.
    pub fn snapshot(&self, file_name: &str) -> Option<ServiceRecord> {
        self.state
            .lock()
            .expect("store lock poisoned")
            .services
            .get(file_name)
            .cloned()
    }

    /// Per-file async lock serialising saves of the same record.
    pub fn save_lock(&self, file_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.save_locks.lock().expect("save lock map poisoned");
        Arc::clone(locks.entry(file_name.to_string()).or_default())
    }

    pub fn bindings(&self, url: &str) -> Vec<UrlBinding> {
        self.state
            .lock()
            .expect("store lock poisoned")
            .index
            .bindings(url)
            .map(<[UrlBinding]>::to_vec)
            .unwrap_or_default()
    }

    pub fn service_count(&self) -> usize {
        self.state.lock().expect("store lock poisoned").services.len()
    }

    pub fn claimed_url_count(&self) -> usize {
        self.state.lock().expect("store lock poisoned").index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docimport_core::DocumentEntry;

    fn descriptor(service: &str, doc_type: &str, url: &str) -> Descriptor {
        Descriptor {
            service: service.to_string(),
            doc_type: DocType::from(doc_type),
            url: url.to_string(),
            selector: "body".to_string(),
            provenance: None,
        }
    }

    fn record(name: &str, docs: &[(&str, &str)]) -> ServiceRecord {
        let mut record = ServiceRecord::new(name, None);
        for (doc_type, url) in docs {
            record.documents.insert(
                DocType::from(*doc_type),
                DocumentEntry {
                    fetch: url.to_string(),
                    select: "body".to_string(),
                },
            );
        }
        record
    }

    #[test]
    fn check_and_claim_skips_second_claim() {
        let mut index = DedupIndex::new();
        let d = descriptor("Example", "tos", "https://example.com/tos");
        assert_eq!(index.check_and_claim(&d.url, d.binding()), Claim::Proceed);
        assert_eq!(index.check_and_claim(&d.url, d.binding()), Claim::Skip);
        assert_eq!(index.bindings(&d.url).unwrap().len(), 1);
        index.release(&d.url);
        assert!(!index.is_claimed(&d.url));
    }

    #[test]
    fn seed_collects_all_bindings_per_url() {
        let a = record("Alpha", &[("tos", "https://shared.test/terms")]);
        let b = record("Beta", &[("tos", "https://shared.test/terms")]);
        let mut index = DedupIndex::new();
        index.seed([&a, &b]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.bindings("https://shared.test/terms").unwrap().len(), 2);
    }

    #[test]
    fn reserve_rejects_claimed_url() {
        let store = ServiceStore::new();
        store.seed([(
            "Example.json".to_string(),
            record("Example", &[("tos", "https://example.com/tos")]),
        )]);
        let d = descriptor("Other", "privacy", "https://example.com/tos");
        assert_eq!(store.reserve(&d), Reservation::AlreadyClaimed);
    }

    #[test]
    fn reserve_rejects_existing_and_pending_types() {
        let store = ServiceStore::new();
        store.seed([(
            "Example.json".to_string(),
            record("Example", &[("tos", "https://example.com/tos")]),
        )]);
        let dup = descriptor("Example", "tos", "https://example.com/terms-v2");
        assert_eq!(store.reserve(&dup), Reservation::DuplicateType);

        let first = descriptor("Example", "privacy", "https://example.com/privacy");
        let second = descriptor("Example", "privacy", "https://example.com/privacy-v2");
        assert_eq!(store.reserve(&first), Reservation::Granted);
        assert_eq!(store.reserve(&second), Reservation::DuplicateType);
    }

    #[test]
    fn release_frees_url_and_slot() {
        let store = ServiceStore::new();
        let d = descriptor("Example", "tos", "https://example.com/tos");
        assert_eq!(store.reserve(&d), Reservation::Granted);
        store.release(&d);
        assert!(!store.is_claimed(&d.url));
        assert_eq!(store.reserve(&d), Reservation::Granted);
    }

    #[test]
    fn commit_creates_record_with_provenance() {
        let store = ServiceStore::new();
        let mut d = descriptor("Example", "tos", "https://example.com/tos");
        d.provenance = Some("https://github.com/tosdr/tosback2/blob/abc/rules/example.com.xml".into());
        assert_eq!(store.reserve(&d), Reservation::Granted);
        store.commit(&d);

        let snapshot = store.snapshot("Example.json").unwrap();
        assert_eq!(snapshot.name, "Example");
        assert_eq!(snapshot.imported_from, d.provenance);
        assert_eq!(snapshot.documents[&DocType::from("tos")].fetch, d.url);
        assert_eq!(store.bindings(&d.url)[0].service, "Example");

        // slot now held by the committed document, not the pending set
        let again = descriptor("Example", "tos", "https://example.com/tos-2");
        assert_eq!(store.reserve(&again), Reservation::DuplicateType);
    }

    #[test]
    fn commit_keeps_imported_from_of_existing_record() {
        let store = ServiceStore::new();
        let mut existing = record("Example", &[]);
        existing.imported_from = Some("first".into());
        store.seed([("Example.json".to_string(), existing)]);

        let mut d = descriptor("Example", "tos", "https://example.com/tos");
        d.provenance = Some("second".into());
        store.reserve(&d);
        store.commit(&d);
        assert_eq!(
            store.snapshot("Example.json").unwrap().imported_from.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn save_lock_is_shared_per_file() {
        let store = ServiceStore::new();
        let a = store.save_lock("Example.json");
        let b = store.save_lock("Example.json");
        let c = store.save_lock("Other.json");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
