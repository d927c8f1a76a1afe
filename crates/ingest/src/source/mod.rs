//! Source adapters producing raw descriptors.

mod corpus;
mod postgres;

pub use self::corpus::{LoadResult, LoadStatus, RuleCorpus, SiteDescriptors, SiteRule};
pub use self::postgres::{DatabaseSource, DocumentRow};

use async_trait::async_trait;

use docimport_core::RawDescriptor;

/// Errors that stop a source from producing anything at all.
///
/// Problems with single records never surface here.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    Parse(#[from] quick_xml::de::DeError),

    #[error("git error: {0}")]
    Git(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Everything a source yielded in one pass.
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub descriptors: Vec<RawDescriptor>,
    /// Input units (files) that were skipped because they could not be read.
    pub unreadable: u64,
    /// Entries inside readable units that were dropped for missing data.
    pub incomplete: u64,
}

#[async_trait]
pub trait DescriptorSource: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<SourceBatch, SourceError>;
}
