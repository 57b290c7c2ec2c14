//! Secure redaction strategy.
//!
//! This strategy removes text from the page content streams themselves, so
//! redacted text cannot be recovered by extraction, and paints an opaque
//! fill over every target.

use super::rewrite::{self, PageOutcome};
use super::strategy::{RedactionRequest, RedactionResult, RedactionStrategy, SkippedEntry};
use crate::error::{RedactorError, RedactorResult};
use crate::pdf::content;
use crate::pdf::metadata::scrub_metadata;
use crate::pdf::text::TextBuilder;
use crate::pdf::{Document, Rect};
use lopdf::{Document as LoDocument, ObjectId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Secure redaction strategy that physically removes text.
///
/// This strategy:
/// 1. Validates every entry, skipping those outside the document
/// 2. Rewrites each affected page once, dropping overlapped glyphs, images
///    and annotations
/// 3. Draws an opaque fill over each target not already filled
/// 4. Purges image streams that no page paints any more
/// 5. Scrubs document metadata and re-serializes without unreferenced objects
#[derive(Debug, Clone)]
pub struct SecureRedactionStrategy {
    /// Remove document info, XMP metadata and thumbnails
    scrub_metadata: bool,
    /// Fill color as RGB components in 0.0..=1.0
    fill_color: [f32; 3],
}

impl Default for SecureRedactionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureRedactionStrategy {
    /// Creates a strategy with black fills and metadata scrubbing enabled.
    pub fn new() -> Self {
        Self {
            scrub_metadata: true,
            fill_color: [0.0, 0.0, 0.0],
        }
    }

    pub fn with_metadata_scrub(mut self, enabled: bool) -> Self {
        self.scrub_metadata = enabled;
        self
    }

    /// Sets the fill color. Components are clamped to 0.0..=1.0.
    pub fn with_fill_color(mut self, r: f32, g: f32, b: f32) -> Self {
        self.fill_color = [r, g, b].map(|c| if c.is_finite() { c.clamp(0.0, 1.0) } else { 0.0 });
        self
    }

    pub fn scrubs_metadata(&self) -> bool {
        self.scrub_metadata
    }

    /// Validates entries and groups the usable ones by page, preserving
    /// request order within each page.
    fn plan(
        &self,
        document: &Document,
        request: &RedactionRequest,
    ) -> (BTreeMap<usize, Vec<(usize, Rect)>>, Vec<SkippedEntry>) {
        let mut per_page: BTreeMap<usize, Vec<(usize, Rect)>> = BTreeMap::new();
        let mut skipped = Vec::new();

        for (index, entry) in request.entries().iter().enumerate() {
            match document.validate_target(entry.page_index, &entry.rect) {
                Ok(()) => per_page
                    .entry(entry.page_index)
                    .or_default()
                    .push((index, entry.rect)),
                Err(error) => {
                    warn!(entry = index, page = entry.page_index, error = %error, "skipping redaction entry");
                    skipped.push(SkippedEntry {
                        index,
                        page_index: entry.page_index,
                        error,
                    });
                }
            }
        }
        (per_page, skipped)
    }

    fn warn_on_surviving_hints(
        doc: &LoDocument,
        pages: &[ObjectId],
        request: &RedactionRequest,
        applied: &[usize],
    ) {
        let mut texts: BTreeMap<usize, String> = BTreeMap::new();
        for &index in applied {
            let entry = &request.entries()[index];
            let Some(hint) = entry.text.as_deref().filter(|t| !t.trim().is_empty()) else {
                continue;
            };
            let page_text = texts.entry(entry.page_index).or_insert_with(|| {
                let mut builder = TextBuilder::default();
                match content::run_page(doc, entry.page_index, pages[entry.page_index], &mut builder) {
                    Ok(()) => builder.finish(entry.page_index).text().to_string(),
                    Err(_) => String::new(),
                }
            });
            if page_text.contains(hint) {
                warn!(
                    entry = index,
                    page = entry.page_index,
                    "text hint still present on page after redaction"
                );
            }
        }
    }
}

impl RedactionStrategy for SecureRedactionStrategy {
    fn redact(&self, document: Document, request: &RedactionRequest) -> RedactorResult<RedactionResult> {
        if request.is_empty() {
            debug!("empty redaction request; returning input unchanged");
            return Ok(RedactionResult::unchanged(document.into_bytes(), true));
        }

        let page_count = document.page_count();
        let (per_page, mut skipped) = self.plan(&document, request);
        let (mut doc, source, pages) = document.into_parts();

        let mut result = RedactionResult {
            pages_processed: page_count,
            secure: true,
            ..Default::default()
        };
        let mut applied = Vec::new();
        let mut detached = BTreeSet::new();

        for (page_index, entries) in &per_page {
            let targets: Vec<Rect> = entries.iter().map(|(_, rect)| *rect).collect();
            match rewrite::redact_page(&mut doc, *page_index, pages[*page_index], &targets, self.fill_color) {
                Ok(PageOutcome {
                    glyphs_removed,
                    images_removed,
                    annotations_removed,
                    modified,
                    detached_images,
                    ..
                }) => {
                    result.instances_redacted += entries.len();
                    result.glyphs_removed += glyphs_removed;
                    result.images_removed += images_removed;
                    result.annotations_removed += annotations_removed;
                    if modified {
                        result.pages_modified += 1;
                    }
                    applied.extend(entries.iter().map(|(index, _)| *index));
                    detached.extend(detached_images);
                }
                Err(error) => {
                    warn!(page = page_index, error = %error, "page could not be redacted");
                    let reason = error.to_string();
                    skipped.extend(entries.iter().map(|(index, _)| SkippedEntry {
                        index: *index,
                        page_index: *page_index,
                        error: RedactorError::PdfProcessing {
                            message: reason.clone(),
                            page: Some(*page_index),
                            source: None,
                        },
                    }));
                }
            }
        }
        skipped.sort_by_key(|entry| entry.index);
        result.skipped = skipped;

        if applied.is_empty() {
            info!(skipped = result.skipped.len(), "no redaction entries applied");
            result.output = source;
            return Ok(result);
        }

        Self::warn_on_surviving_hints(&doc, &pages, request, &applied);
        rewrite::purge_unpainted_images(&mut doc, &detached);

        if self.scrub_metadata {
            scrub_metadata(&mut doc);
        }
        doc.prune_objects();
        doc.compress();

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| RedactorError::processing("failed to serialize redacted PDF", None, e))?;
        result.output = output;

        info!(
            entries = result.instances_redacted,
            pages_modified = result.pages_modified,
            glyphs = result.glyphs_removed,
            skipped = result.skipped.len(),
            "redaction complete"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "SecureRedaction"
    }

    fn is_secure(&self) -> bool {
        true
    }
}
