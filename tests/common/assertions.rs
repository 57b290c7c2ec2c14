//! Custom assertions for PDF redaction testing.
//!
//! Redaction is checked against two extractors: the crate's positioned page
//! text, and pdf-extract's plain-text output, which assembles words and lines
//! on its own.

#![allow(dead_code)]

use pii_redactor::Document;

/// Text as assembled by `Document::extract_text`.
pub fn own_text(bytes: &[u8]) -> String {
    Document::from_bytes(bytes)
        .unwrap_or_else(|e| panic!("output should parse: {}", e))
        .extract_text()
}

/// Text as seen by pdf-extract.
pub fn independent_text(bytes: &[u8]) -> String {
    pii_redactor::extract_text_from_pdf(bytes)
        .unwrap_or_else(|e| panic!("pdf-extract failed on output: {}", e))
}

/// Asserts that `needle` cannot be extracted from the document.
///
/// # Panics
/// Panics if either extractor still finds the string.
pub fn assert_redacted(bytes: &[u8], needle: &str) {
    let own = own_text(bytes);
    assert!(
        !own.contains(needle),
        "'{}' should be redacted but was extracted: {:?}",
        needle,
        own
    );
    let independent = independent_text(bytes);
    assert!(
        !independent.contains(needle),
        "'{}' should be redacted but pdf-extract found it: {:?}",
        needle,
        independent
    );
}

/// Asserts that `needle` is still present in the document text.
pub fn assert_preserved(bytes: &[u8], needle: &str) {
    let own = own_text(bytes);
    assert!(
        own.contains(needle),
        "'{}' should be preserved but was not found in {:?}",
        needle,
        own
    );
}

/// Asserts that the bytes are a loadable PDF.
pub fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.starts_with(b"%PDF-"), "output should start with a PDF header");
    assert!(
        lopdf::Document::load_mem(bytes).is_ok(),
        "output should load as a PDF"
    );
}
