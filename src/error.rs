//! Error types for the consent validation engine.
//!
//! Failures are categorized by their source. A malformed PDF is never
//! surfaced through this type during validation (it degrades to an empty
//! document), so anything returned here is fatal for the current run.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::collaborators::{BlobError, StoreError};

/// Result type alias for validation operations.
pub type ConsentResult<T> = Result<T, ConsentError>;

/// Error type for all consent validation operations.
#[derive(Debug)]
pub enum ConsentError {
    /// Error occurred while reading or writing local files
    Io { path: PathBuf, source: io::Error },

    /// Error occurred while decoding or interpreting a PDF
    PdfProcessing {
        message: String,
        page: Option<usize>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The blob store could not list or fetch uploaded files
    BlobStore { bucket: String, source: BlobError },

    /// The consent store rejected a read or a batch update
    Store { source: StoreError },

    /// Invalid parameters passed by a caller
    InvalidInput { parameter: String, reason: String },

    /// Invalid configuration value
    Config { parameter: String, reason: String },
}

impl fmt::Display for ConsentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "IO error for path '{}': {}", path.display(), source)
            }
            Self::PdfProcessing { message, page, .. } => {
                if let Some(p) = page {
                    write!(f, "PDF processing error on page {}: {}", p, message)
                } else {
                    write!(f, "PDF processing error: {}", message)
                }
            }
            Self::BlobStore { bucket, source } => {
                write!(f, "blob store error for bucket '{}': {}", bucket, source)
            }
            Self::Store { source } => write!(f, "consent store error: {}", source),
            Self::InvalidInput { parameter, reason } => {
                write!(f, "Invalid input for '{}': {}", parameter, reason)
            }
            Self::Config { parameter, reason } => {
                write!(f, "{} is misconfigured: {}", parameter, reason)
            }
        }
    }
}

impl std::error::Error for ConsentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::PdfProcessing { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            Self::BlobStore { source, .. } => Some(source),
            Self::Store { source } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for ConsentError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<lopdf::Error> for ConsentError {
    fn from(err: lopdf::Error) -> Self {
        Self::PdfProcessing {
            message: err.to_string(),
            page: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<StoreError> for ConsentError {
    fn from(err: StoreError) -> Self {
        Self::Store { source: err }
    }
}
