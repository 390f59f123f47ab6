use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// The main error type for cortexpack operations.
#[derive(Debug, Error)]
pub enum CortexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read package {path}: {message}")]
    PackageRead { path: PathBuf, message: String },

    #[error("Failed to write package {path}: {source}")]
    PackageWrite {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to decode array at '{entry}': {message}")]
    NpyRead { entry: String, message: String },

    #[error("Failed to encode array at '{entry}': {source}")]
    NpyWrite {
        entry: String,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },

    #[error("Invalid JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported input type: {0}")]
    UnsupportedType(String),

    #[error("{kind} not found in package: {what}")]
    MissingResource { kind: &'static str, what: String },

    #[error("Must provide filename for new datasets")]
    UnboundFile,

    #[error("No metadata found for '{entry}' (missing {missing})")]
    IncompleteMetadata {
        entry: String,
        missing: &'static str,
    },

    #[error("Cannot pack {resource} for subject '{subject}': {source}")]
    PackingResource {
        subject: String,
        resource: String,
        #[source]
        source: Box<CortexError>,
    },

    #[error("No such view: '{0}'")]
    NoSuchView(String),

    #[error("View mixes incompatible data: {0}")]
    MixedView(String),

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("View '{view}' references missing data entry '{id}'")]
    DanglingReference { view: String, id: String },

    #[error("Shape mismatch for subject '{subject}': expected {expected}, got {got:?}")]
    ShapeMismatch {
        subject: String,
        expected: String,
        got: Vec<usize>,
    },

    #[error("Invalid manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

impl CortexError {
    /// Returns true for errors caused by an absent subject resource.
    pub fn is_missing_resource(&self) -> bool {
        matches!(self, CortexError::MissingResource { .. })
    }

    pub(crate) fn missing(kind: &'static str, what: impl Into<String>) -> Self {
        CortexError::MissingResource {
            kind,
            what: what.into(),
        }
    }
}
