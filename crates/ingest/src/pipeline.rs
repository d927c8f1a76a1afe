//! Startup pre-load plus one import phase per source.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::info;

use docimport_core::{DocTypes, Normalizer, RawDescriptor};

use crate::files::{ServiceFiles, StoreError};
use crate::importer::Importer;
use crate::queue::TaskQueue;
use crate::report::ImportReport;
use crate::source::{DescriptorSource, SourceError};
use crate::store::ServiceStore;
use crate::validation::SchemaValidator;

pub struct Pipeline {
    importer: Arc<Importer>,
    queue: TaskQueue,
}

impl Pipeline {
    /// Load existing records from `files` into a fresh store, so that
    /// already-imported URLs are skipped before any source runs.
    pub async fn bootstrap(
        files: ServiceFiles,
        types: Arc<DocTypes>,
        validator: Arc<dyn SchemaValidator>,
        concurrency: usize,
    ) -> Result<Self, StoreError> {
        let records = files.load_all().await?;
        let store = Arc::new(ServiceStore::new());
        store.seed(records);
        info!(
            services = store.service_count(),
            urls = store.claimed_url_count(),
            path = %files.dir().display(),
            "pre-loaded existing services"
        );

        let importer = Importer::new(store, Normalizer::new(types), validator, Arc::new(files));
        Ok(Self::new(importer, concurrency))
    }

    pub fn new(importer: Importer, concurrency: usize) -> Self {
        Self {
            importer: Arc::new(importer),
            queue: TaskQueue::new(concurrency),
        }
    }

    pub fn store(&self) -> &Arc<ServiceStore> {
        self.importer.store()
    }

    /// Fetch everything from `source`, import it and wait for the queue to
    /// drain. Only a source that cannot be read at all is an error.
    pub async fn run_phase(&self, source: &dyn DescriptorSource) -> Result<ImportReport, SourceError> {
        let started = Instant::now();
        let report = Arc::new(Mutex::new(ImportReport::new(source.name())));
        info!(source = source.name(), "starting import phase");
        self.queue.reset_peak();

        let batch = source.fetch().await?;
        {
            let mut report = report.lock().expect("report lock poisoned");
            report.unreadable_files = batch.unreadable;
            report.incomplete_entries = batch.incomplete;
        }

        for raw in batch.descriptors {
            self.submit(raw, &report);
        }
        self.queue.wait_idle().await;

        let mut report = report.lock().expect("report lock poisoned").clone();
        report.peak_concurrency = self.queue.stats().peak_running;
        report.elapsed = started.elapsed();
        info!("{}", report);
        Ok(report)
    }

    fn submit(&self, raw: RawDescriptor, report: &Arc<Mutex<ImportReport>>) {
        info!("{} queued", raw.label());
        report.lock().expect("report lock poisoned").queued += 1;

        let importer = Arc::clone(&self.importer);
        let report = Arc::clone(report);
        self.queue.enqueue(async move {
            let outcome = importer.import(raw).await;
            report.lock().expect("report lock poisoned").record(&outcome);
        });
    }
}
