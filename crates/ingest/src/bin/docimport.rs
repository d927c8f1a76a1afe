//! docimport: one-shot import of document descriptors into service files.
//!
//! Phases, in order:
//! 1. pre-load existing `<Service>.json` files (dedup index + service map)
//! 2. rule corpus (git checkout of per-site XML rules), unless disabled
//! 3. service database, when enabled
//!
//! Per-descriptor problems are logged and counted; only an unreadable
//! source or output directory makes the process fail.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use tracing::info;

use docimport_core::config::{load_dotenv, Config};
use docimport_ingest::{DatabaseSource, Pipeline, RuleCorpus, ServiceFiles, ServiceSchema};

// ── CLI ─────────────────────────────────────────────────────────────

/// Import service documents from the rule corpus and/or the service database.
#[derive(Parser, Debug)]
#[command(name = "docimport", version, about)]
struct Cli {
    /// Import from the rule-file corpus.
    #[arg(long, env = "IMPORT_CORPUS", default_value_t = true, action = ArgAction::Set)]
    corpus: bool,

    /// Import from the service database.
    #[arg(long, env = "IMPORT_DATABASE", default_value_t = false, action = ArgAction::Set)]
    database: bool,

    /// Override the services output directory.
    #[arg(long)]
    services_dir: Option<PathBuf>,

    /// Override the number of descriptors processed concurrently.
    #[arg(long)]
    concurrency: Option<usize>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(dir) = cli.services_dir {
        config.output.services_dir = dir;
    }
    if let Some(n) = cli.concurrency {
        config.import.concurrency = n.max(1);
    }
    config.log_summary();

    let types = Arc::new(config.load_doc_types()?);
    info!(count = types.len(), "loaded document types");

    let pipeline = Pipeline::bootstrap(
        ServiceFiles::new(&config.output.services_dir),
        Arc::clone(&types),
        Arc::new(ServiceSchema::new(types)),
        config.import.concurrency,
    )
    .await?;

    if cli.corpus {
        pipeline.run_phase(&RuleCorpus::new(&config.corpus)).await?;
    }
    if cli.database {
        pipeline
            .run_phase(&DatabaseSource::new(config.postgres.url.clone()))
            .await?;
    }

    info!("docimport finished");
    Ok(())
}
