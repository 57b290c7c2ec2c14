//! Detection and permanent redaction of personally identifiable information
//! in PDF documents.
//!
//! The pipeline has three parts:
//!
//! - [`domain`]: the pattern registry, a fixed catalog of PII categories
//!   gated by [`Tier`]
//! - [`scan`]: the scanner, which extracts each page's text together with an
//!   ordered offset-to-glyph map and reports [`Match`]es with page geometry
//! - [`redaction`]: strategies that remove the matched glyphs from the
//!   document's content streams and paint opaque fills over them
//!
//! Redaction works on the text layer itself, not on a visual overlay: after
//! redacting, extracting text from the output no longer yields the removed
//! strings.
//!
//! # Quick Start
//!
//! ```no_run
//! use pii_redactor::{RedactionRequest, RedactionService, Tier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("statement.pdf")?;
//! let service = RedactionService::with_secure_strategy();
//!
//! let report = service.scan(&bytes, Tier::Free)?;
//! let request = RedactionRequest::from_selection(&report.matches, Vec::new());
//! let result = service.redact(&bytes, &request)?;
//!
//! std::fs::write("statement-redacted.pdf", &result.output)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Pattern Matching
//!
//! ```
//! use pii_redactor::domain::{category, PiiKind};
//!
//! let text = "Card on file: 4111 1111 1111 1111";
//! let spans = category(PiiKind::CreditCard).find_in(text);
//! assert_eq!(&text[spans[0].clone()], "4111 1111 1111 1111");
//! ```

// Public API
pub mod domain;
pub mod error;
pub mod pdf;
pub mod redaction;
pub mod scan;

// Re-exports for convenient access
pub use domain::{list_categories, PatternMatcher, PiiCategory, PiiKind, Tier};
pub use error::{RedactorError, RedactorResult};
pub use pdf::{Document, PageText, Rect};
pub use redaction::{
    ManualTarget, RedactionEntry, RedactionRequest, RedactionResult, RedactionService,
    RedactionStrategy, SecureRedactionStrategy, SkippedEntry,
};
pub use scan::{Match, PageFailure, ScanReport, Scanner};

/// Extracts document text with pdf-extract's own plain-text output, which
/// reassembles lines without this crate's glyph map or content walker.
/// Useful for verifying redacted output.
pub fn extract_text_from_pdf(bytes: &[u8]) -> RedactorResult<String> {
    let failed = |message: String| RedactorError::PdfProcessing {
        message,
        page: None,
        source: None,
    };
    pdf::layout::guarded(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(failed)?
        .map_err(|e| failed(format!("text extraction failed: {}", e)))
}
