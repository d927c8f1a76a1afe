use thiserror::Error;

/// Why a single descriptor was not imported.
///
/// None of these abort a run: the import cycle turns each one into a
/// rejected or save-failed outcome and carries on with the next descriptor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("{service} already has a '{doc_type}' document")]
    DuplicateType { service: String, doc_type: String },

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Invalid service name '{0}': not usable as a file name")]
    InvalidServiceName(String),

    #[error("Cannot translate xpath '{xpath}': {reason}")]
    Selector { xpath: String, reason: String },

    #[error("Could not save {file}: {reason}")]
    Persist { file: String, reason: String },
}

impl ImportError {
    /// Short stable label used when aggregating outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::UnsupportedType(_) => "unsupported_type",
            ImportError::DuplicateType { .. } => "duplicate_type",
            ImportError::Validation(_) => "validation",
            ImportError::InvalidServiceName(_) => "invalid_service_name",
            ImportError::Selector { .. } => "selector",
            ImportError::Persist { .. } => "persist",
        }
    }
}

/// Startup errors: configuration files that cannot be read or parsed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid type list: {0}")]
    InvalidTypes(String),
}
