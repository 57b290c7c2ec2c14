//! Redaction strategy trait and supporting types.
//!
//! A request is an ordered list of page rectangles. Entries are independent:
//! overlapping entries are all honored, and a bad entry is skipped without
//! affecting the others.

use crate::error::{RedactorError, RedactorResult};
use crate::pdf::{Document, Rect};
use crate::scan::Match;
use serde::{Deserialize, Serialize};

/// A user-specified area to redact that did not come from pattern matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualTarget {
    pub page_index: usize,
    pub rectangle: Rect,
    /// Text expected under the rectangle, if known
    #[serde(default)]
    pub text: Option<String>,
}

/// One rectangle to redact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedactionEntry {
    pub page_index: usize,
    pub rect: Rect,
    #[serde(default)]
    pub text: Option<String>,
}

/// The finalized unit of work handed to a strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedactionRequest {
    entries: Vec<RedactionEntry>,
}

impl RedactionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges selected matches (one entry per bounding box) with manual
    /// targets, in that order.
    pub fn from_selection<'a>(
        matches: impl IntoIterator<Item = &'a Match>,
        manual: impl IntoIterator<Item = ManualTarget>,
    ) -> Self {
        let mut request = Self::new();
        for m in matches.into_iter().filter(|m| m.selected) {
            for rect in &m.bounding_boxes {
                request.push(RedactionEntry {
                    page_index: m.page_index,
                    rect: *rect,
                    text: Some(m.text.clone()),
                });
            }
        }
        for target in manual {
            request.push(target.into());
        }
        request
    }

    pub fn push(&mut self, entry: RedactionEntry) {
        self.entries.push(entry);
    }

    pub fn add_manual(&mut self, target: ManualTarget) {
        self.push(target.into());
    }

    pub fn entries(&self) -> &[RedactionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<ManualTarget> for RedactionEntry {
    fn from(target: ManualTarget) -> Self {
        Self {
            page_index: target.page_index,
            rect: target.rectangle,
            text: target.text,
        }
    }
}

/// A request entry that could not be applied.
#[derive(Debug)]
pub struct SkippedEntry {
    /// Position of the entry in the request
    pub index: usize,
    pub page_index: usize,
    pub error: RedactorError,
}

/// Sanitized output plus statistics about a redaction operation.
#[derive(Debug, Default)]
pub struct RedactionResult {
    /// The sanitized document
    pub output: Vec<u8>,

    /// Number of entries applied
    pub instances_redacted: usize,

    /// Pages processed
    pub pages_processed: usize,

    /// Pages with redactions
    pub pages_modified: usize,

    /// Glyphs removed from text-showing operators
    pub glyphs_removed: usize,

    /// Image placements removed
    pub images_removed: usize,

    /// Annotations removed
    pub annotations_removed: usize,

    /// Entries that were reported and skipped
    pub skipped: Vec<SkippedEntry>,

    /// Whether text was physically removed (vs visually obscured)
    pub secure: bool,
}

impl RedactionResult {
    /// Creates a result that hands the input back untouched.
    pub fn unchanged(output: Vec<u8>, secure: bool) -> Self {
        Self {
            output,
            secure,
            ..Default::default()
        }
    }

    /// Returns true if any redactions were applied.
    pub fn has_redactions(&self) -> bool {
        self.instances_redacted > 0
    }
}

/// Strategy for redacting sensitive information from PDFs.
///
/// Implementations take ownership of the document and produce new bytes;
/// the original is never mutated in place.
pub trait RedactionStrategy: Send + Sync {
    /// Applies every entry of `request` to `document`.
    ///
    /// # Errors
    /// Only failures that prevent producing any output are returned; bad
    /// entries are reported in [`RedactionResult::skipped`].
    fn redact(&self, document: Document, request: &RedactionRequest) -> RedactorResult<RedactionResult>;

    /// Returns a human-readable name for this strategy.
    fn name(&self) -> &str;

    /// Returns whether this strategy provides secure (physical) deletion.
    fn is_secure(&self) -> bool;
}
