use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::doc_types::DocTypes;
use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub output: OutputConfig,
    pub corpus: CorpusConfig,
    pub postgres: PostgresConfig,
    pub import: ImportConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `DOCIMPORT_PROFILE`. When set (e.g. `STAGING`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("DOCIMPORT_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            output: OutputConfig::from_env_profiled(p),
            corpus: CorpusConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            import: ImportConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Load the recognized document types: the configured file when set,
    /// otherwise the embedded list.
    pub fn load_doc_types(&self) -> Result<DocTypes, ConfigError> {
        match &self.output.types_file {
            Some(path) => DocTypes::load(path),
            None => Ok(DocTypes::embedded()),
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  output:      services_dir={}", self.output.services_dir.display());
        tracing::info!(
            "  types:       {}",
            self.output
                .types_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(embedded)".to_string())
        );
        tracing::info!("  corpus:      rules_dir={}", self.corpus.rules_dir().display());
        tracing::info!("  postgres:    url={}", self.postgres.redacted_url());
        tracing::info!("  import:      concurrency={}", self.import.concurrency);
    }
}

// ── Output ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one `<Service>.json` file per service.
    pub services_dir: PathBuf,
    /// JSON object whose keys are the recognized document types.
    pub types_file: Option<PathBuf>,
}

impl OutputConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            services_dir: PathBuf::from(profiled_env_or(p, "SERVICES_DIR", "./services/")),
            types_file: profiled_env_opt(p, "TYPES_FILE").map(PathBuf::from),
        }
    }
}

// ── Rule corpus (git checkout) ────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Local checkout of the rule repository.
    pub repo: PathBuf,
    /// Browsable root of the same repository, used to build provenance links.
    pub web_root: String,
    /// Folder inside the repository holding the rule files.
    pub rules_folder: String,
}

impl CorpusConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            repo: PathBuf::from(profiled_env_or(p, "TOSBACK_REPO", "../../tosdr/tosback2")),
            web_root: profiled_env_or(p, "TOSBACK_WEB_ROOT", "https://github.com/tosdr/tosback2"),
            rules_folder: profiled_env_or(p, "TOSBACK_RULES_FOLDER", "rules"),
        }
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.repo.join(&self.rules_folder)
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "POSTGRES_URL", "postgres://localhost/phoenix_development"),
        }
    }

    /// Connection string with any password replaced, safe for logs.
    pub fn redacted_url(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(mut parsed) => {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("***"));
                }
                parsed.to_string()
            }
            Err(_) => "(unparseable)".to_string(),
        }
    }
}

// ── Import ────────────────────────────────────────────────────

pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Maximum number of descriptors in flight at once.
    pub concurrency: usize,
}

impl ImportConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            concurrency: profiled_env_usize(p, "IMPORT_CONCURRENCY", DEFAULT_CONCURRENCY).max(1),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}
