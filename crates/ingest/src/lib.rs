//! Bounded-concurrency import of document descriptors into per-service
//! record files.

pub mod files;
pub mod importer;
pub mod pipeline;
pub mod queue;
pub mod report;
pub mod source;
pub mod store;
pub mod validation;

pub use files::{ServiceFiles, StoreError};
pub use importer::{ImportOutcome, Importer, SaveOutcome};
pub use pipeline::Pipeline;
pub use queue::{QueueStats, TaskQueue};
pub use report::ImportReport;
pub use source::{DatabaseSource, DescriptorSource, RuleCorpus, SourceBatch, SourceError};
pub use store::{Claim, DedupIndex, Reservation, ServiceStore};
pub use validation::{SchemaValidator, ServiceSchema, ValidationError, ValidationResult};
