//! Error types for PII detection and redaction.
//!
//! Only a wholly unparsable input is a hard failure for the caller. Per-page
//! extraction problems and per-entry redaction problems are reported through
//! these variants but collected into reports instead of aborting the batch.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for redaction operations.
pub type RedactorResult<T> = Result<T, RedactorError>;

/// Boxed source error carried by backend-facing variants.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error type for all detection and redaction operations.
#[derive(Debug, Error)]
pub enum RedactorError {
    /// Error occurred while reading or writing files
    #[error("IO error for path '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The input could not be parsed as a PDF at all
    #[error("Malformed document: {reason}")]
    MalformedDocument {
        reason: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Text could not be extracted from a single page
    #[error("Text extraction failed on page {page}: {reason}")]
    PageExtraction { page: usize, reason: String },

    /// A redaction entry points outside the document or its page
    #[error("Redaction target on page {page} is out of range: {reason}")]
    OutOfRangeTarget { page: usize, reason: String },

    /// Error occurred while rewriting or serializing the document
    #[error("PDF processing error{}: {message}", page_suffix(.page))]
    PdfProcessing {
        message: String,
        page: Option<usize>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// A user-supplied pattern failed to compile
    #[error("Pattern error for '{pattern}': {reason}")]
    PatternError { pattern: String, reason: String },

    /// Invalid configuration or parameters
    #[error("Invalid input for '{parameter}': {reason}")]
    InvalidInput { parameter: String, reason: String },
}

fn page_suffix(page: &Option<usize>) -> String {
    page.map(|p| format!(" on page {}", p)).unwrap_or_default()
}

impl RedactorError {
    /// Wraps a lopdf failure that occurred while mutating or saving.
    pub(crate) fn processing(
        message: impl Into<String>,
        page: Option<usize>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::PdfProcessing {
            message: message.into(),
            page,
            source: Some(Box::new(source)),
        }
    }

    /// Returns true for failures that only affect a single page or entry.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Self::PageExtraction { .. } | Self::OutOfRangeTarget { .. }
        )
    }
}

impl From<regex::Error> for RedactorError {
    fn from(err: regex::Error) -> Self {
        Self::PatternError {
            pattern: "<unknown>".to_string(),
            reason: err.to_string(),
        }
    }
}
