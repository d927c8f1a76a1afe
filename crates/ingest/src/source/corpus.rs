//! Rule-file corpus kept in a git checkout (one XML file per site).
//!
//! ```xml
//! <sitename name="example.com">
//!   <docname name="Terms of Service">
//!     <url name="https://example.com/tos" xpath="//div[@id='terms']">
//!       <norecurse name="arbitrary"/>
//!     </url>
//!   </docname>
//! </sitename>
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use docimport_core::config::CorpusConfig;
use docimport_core::{RawDescriptor, ServiceRef};

use super::{DescriptorSource, SourceBatch, SourceError};

/// Parsed `<sitename>` element.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteRule {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "docname", default)]
    pub documents: Vec<DocRule>,
}

/// Parsed `<docname>` element. Missing pieces are tolerated here and
/// dropped per entry in [`SiteRule::into_descriptors`].
#[derive(Debug, Clone, Deserialize)]
pub struct DocRule {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(default)]
    pub url: Option<UrlRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlRule {
    #[serde(rename = "@name", default)]
    pub href: String,
    #[serde(rename = "@xpath", default)]
    pub xpath: Option<String>,
}

/// Descriptors of one rule file plus the number of entries that had to be
/// dropped.
#[derive(Debug, Default)]
pub struct SiteDescriptors {
    pub descriptors: Vec<RawDescriptor>,
    pub incomplete: u64,
}

impl SiteRule {
    /// A `<docname>` without a name or without a `<url name=..>` only
    /// drops itself; its siblings are kept.
    pub fn into_descriptors(self, provenance: &str) -> SiteDescriptors {
        let site = self.name;
        let mut out = SiteDescriptors::default();
        for doc in self.documents {
            match doc.url {
                Some(url) if !doc.name.is_empty() && !url.href.is_empty() => {
                    out.descriptors.push(RawDescriptor {
                        service: ServiceRef::Site(site.clone()),
                        doc_type: doc.name,
                        url: url.href,
                        xpath: url.xpath,
                        provenance: Some(provenance.to_string()),
                    });
                }
                _ => {
                    warn!("Could not process {} {}: missing name or url", site, doc.name);
                    out.incomplete += 1;
                }
            }
        }
        out
    }
}

/// Outcome of loading a single rule file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub enum LoadStatus {
    Loaded {
        site: String,
        descriptors: Vec<RawDescriptor>,
        /// `<docname>` entries dropped for missing data.
        incomplete: u64,
    },
    /// Dotfile, directory or non-XML file.
    Skipped { reason: String },
    Failed { error: String },
}

pub struct RuleCorpus {
    repo: PathBuf,
    web_root: String,
    rules_folder: String,
    /// Pinned revision; looked up with git when absent.
    revision: Option<String>,
}

impl RuleCorpus {
    pub fn new(config: &CorpusConfig) -> Self {
        Self {
            repo: config.repo.clone(),
            web_root: config.web_root.clone(),
            rules_folder: config.rules_folder.clone(),
            revision: None,
        }
    }

    /// Use a fixed revision instead of asking git.
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.repo.join(&self.rules_folder)
    }

    /// Commit hash of the checkout's `HEAD`.
    pub async fn revision(&self) -> Result<String, SourceError> {
        if let Some(rev) = &self.revision {
            return Ok(rev.clone());
        }
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(["rev-parse", "HEAD"])
            .output()
            .await?;
        if !output.status.success() {
            return Err(SourceError::Git(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let rev = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if rev.is_empty() {
            return Err(SourceError::Git("empty revision".to_string()));
        }
        Ok(rev)
    }

    /// Browsable link to `file_name` at `revision`.
    pub fn provenance(&self, revision: &str, file_name: &str) -> String {
        [
            self.web_root.trim_end_matches('/'),
            "blob",
            revision,
            self.rules_folder.as_str(),
            file_name,
        ]
        .join("/")
    }

    pub fn parse_rule(contents: &str) -> Result<SiteRule, SourceError> {
        Ok(quick_xml::de::from_str(contents)?)
    }

    /// Parse every rule file in the rules folder.
    ///
    /// Per-file problems are reported in the results and do not abort the
    /// scan; an unreadable folder or git failure does.
    pub async fn load_all(&self) -> Result<Vec<LoadResult>, SourceError> {
        let revision = self.revision().await?;
        let dir = self.rules_dir();
        info!(path = %dir.display(), revision = %revision, "scanning rule corpus");

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();

        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let status = self.load_path(&path, &revision).await;
            results.push(LoadResult { path, status });
        }
        Ok(results)
    }

    async fn load_path(&self, path: &Path, revision: &str) -> LoadStatus {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return LoadStatus::Skipped {
                reason: "non UTF-8 file name".to_string(),
            };
        };
        if file_name.starts_with('.') {
            return LoadStatus::Skipped {
                reason: "dotfile".to_string(),
            };
        }
        if path.is_dir() {
            return LoadStatus::Skipped {
                reason: "directory".to_string(),
            };
        }
        if path.extension().and_then(|e| e.to_str()) != Some("xml") {
            return LoadStatus::Skipped {
                reason: "not an XML file".to_string(),
            };
        }

        let parsed = match fs::read_to_string(path).await {
            Ok(contents) => Self::parse_rule(&contents),
            Err(e) => Err(e.into()),
        };
        match parsed {
            Ok(rule) => {
                let site = rule.name.clone();
                let SiteDescriptors { descriptors, incomplete } =
                    rule.into_descriptors(&self.provenance(revision, file_name));
                debug!(
                    site = %site,
                    documents = descriptors.len(),
                    incomplete,
                    "parsed rule file"
                );
                LoadStatus::Loaded {
                    site,
                    descriptors,
                    incomplete,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error parsing xml");
                LoadStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl DescriptorSource for RuleCorpus {
    fn name(&self) -> &str {
        "tosback2"
    }

    async fn fetch(&self) -> Result<SourceBatch, SourceError> {
        let mut batch = SourceBatch::default();
        for result in self.load_all().await? {
            match result.status {
                LoadStatus::Loaded {
                    descriptors,
                    incomplete,
                    ..
                } => {
                    batch.descriptors.extend(descriptors);
                    batch.incomplete += incomplete;
                }
                LoadStatus::Failed { .. } => batch.unreadable += 1,
                LoadStatus::Skipped { .. } => {}
            }
        }
        Ok(batch)
    }
}
