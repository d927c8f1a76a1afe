//! Live service database (documents joined with their services).

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use docimport_core::{RawDescriptor, ServiceRef};

use super::{DescriptorSource, SourceBatch, SourceError};

const DOCUMENTS_QUERY: &str = "SELECT d.name, d.xpath, d.url, s.name AS service \
     FROM documents d INNER JOIN services s ON d.service_id = s.id";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub service: String,
    pub name: String,
    pub xpath: Option<String>,
    pub url: String,
}

impl From<DocumentRow> for RawDescriptor {
    /// Database service names are already display names and carry no
    /// provenance.
    fn from(row: DocumentRow) -> Self {
        RawDescriptor {
            service: ServiceRef::Named(row.service),
            doc_type: row.name,
            url: row.url,
            xpath: row.xpath,
            provenance: None,
        }
    }
}

pub struct DatabaseSource {
    url: String,
}

impl DatabaseSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl DescriptorSource for DatabaseSource {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn fetch(&self) -> Result<SourceBatch, SourceError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&self.url)
            .await?;
        let rows = sqlx::query_as::<_, DocumentRow>(DOCUMENTS_QUERY)
            .fetch_all(&pool)
            .await;
        pool.close().await;
        let rows = rows?;

        info!(rows = rows.len(), "fetched document rows");
        Ok(SourceBatch {
            descriptors: rows.into_iter().map(RawDescriptor::from).collect(),
            unreadable: 0,
            incomplete: 0,
        })
    }
}
