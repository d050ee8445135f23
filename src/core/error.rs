use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Index '{name}' already defined with kind {existing}, cannot redefine as {requested}")]
    Conflict {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("Catalog '{0}' already exists")]
    CatalogExists(String),

    #[error("Catalog '{0}' not found")]
    CatalogNotFound(String),

    #[error("Object '{0}' not found")]
    ObjectNotFound(String),

    #[error("Handler '{0}' not found")]
    HandlerNotFound(String),

    #[error("No migration step starts at version {frontier} (target {target})")]
    ChainGap { frontier: u32, target: u32 },

    #[error("Multiple migration steps start at version {0}")]
    ChainAmbiguity(u32),

    #[error("Extraction of '{field}' failed: {reason}")]
    Extraction { field: String, reason: String },

    #[error("Step '{title}' ({source_version} -> {destination}) failed: {cause}")]
    StepFailed {
        title: String,
        source_version: u32,
        destination: u32,
        cause: String,
    },

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Execution error: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl<T> From<std::sync::PoisonError<T>> for CatalogError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
