//! Scanning documents for PII and locating user-supplied text.

use crate::domain::{list_categories, PiiCategory, PiiKind, Tier};
use crate::error::{RedactorError, RedactorResult};
use crate::pdf::{Document, PageText, Rect};
use crate::redaction::ManualTarget;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, info, warn};

fn selected_by_default() -> bool {
    true
}

/// A detected occurrence of a PII category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub category: PiiKind,
    /// Human-readable category label
    pub label: String,
    pub page_index: usize,
    /// The exact matched substring of the page text
    pub text: String,
    /// Byte offsets into the page text
    pub char_range: Range<usize>,
    /// One rectangle per contiguous run of glyphs on a line
    pub bounding_boxes: Vec<Rect>,
    #[serde(default = "selected_by_default")]
    pub selected: bool,
}

/// A page whose text could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub page_index: usize,
    pub reason: String,
}

/// Outcome of scanning a whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Matches ordered by page, position, then registry order
    pub matches: Vec<Match>,
    pub skipped_pages: Vec<PageFailure>,
    /// Raw candidates discarded by a category validator
    pub rejected_candidates: usize,
    pub pages_scanned: usize,
}

impl ScanReport {
    pub fn selected(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(|m| m.selected)
    }

    pub fn matches_of(&self, kind: PiiKind) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(move |m| m.category == kind)
    }
}

/// Applies a set of registry categories to every page of a document.
#[derive(Debug, Clone)]
pub struct Scanner {
    categories: Vec<&'static PiiCategory>,
}

impl Scanner {
    pub fn new(categories: Vec<&'static PiiCategory>) -> Self {
        Self { categories }
    }

    /// Scanner for every category available at `tier`.
    pub fn for_tier(tier: Tier) -> Self {
        Self::new(list_categories(tier))
    }

    pub fn categories(&self) -> &[&'static PiiCategory] {
        &self.categories
    }

    /// Scans every page. Pages whose text cannot be extracted are skipped
    /// and listed in the report.
    pub fn scan(&self, document: &Document) -> ScanReport {
        let mut report = ScanReport::default();

        for index in 0..document.page_count() {
            match document.page_text(index) {
                Ok(page) => {
                    let (matches, rejected) = self.scan_page(&page);
                    debug!(page = index, matches = matches.len(), rejected, "page scanned");
                    report.matches.extend(matches);
                    report.rejected_candidates += rejected;
                    report.pages_scanned += 1;
                }
                Err(err) => {
                    warn!(page = index, error = %err, "skipping page");
                    report.skipped_pages.push(PageFailure {
                        page_index: index,
                        reason: err.to_string(),
                    });
                }
            }
        }

        report.matches.sort_by_key(|m| {
            (
                m.page_index,
                m.char_range.start,
                m.category,
                m.char_range.end,
            )
        });
        info!(
            matches = report.matches.len(),
            pages = report.pages_scanned,
            skipped = report.skipped_pages.len(),
            "scan complete"
        );
        report
    }

    /// Matches on a single page plus the number of validator rejections.
    pub fn scan_page(&self, page: &PageText) -> (Vec<Match>, usize) {
        let mut matches = Vec::new();
        let mut rejected = 0;

        for cat in &self.categories {
            let (spans, cat_rejected) = cat.find_with_rejections(page.text());
            rejected += cat_rejected;
            matches.extend(spans.into_iter().map(|range| Match {
                category: cat.kind(),
                label: cat.display_label().to_string(),
                page_index: page.index(),
                text: page.text()[range.clone()].to_string(),
                bounding_boxes: page.boxes_for(range.clone()),
                char_range: range,
                selected: true,
            }));
        }
        (matches, rejected)
    }

    /// Finds every occurrence of `needle` and returns one manual target per
    /// rectangle.
    pub fn locate_text(document: &Document, needle: &str) -> RedactorResult<Vec<ManualTarget>> {
        if needle.trim().is_empty() {
            return Err(RedactorError::InvalidInput {
                parameter: "text".to_string(),
                reason: "search text must not be empty".to_string(),
            });
        }
        Ok(Self::locate_with(document, |text| {
            text.match_indices(needle)
                .map(|(start, found)| start..start + found.len())
                .collect()
        }))
    }

    /// Finds every match of a user-supplied regular expression.
    pub fn locate_pattern(document: &Document, pattern: &str) -> RedactorResult<Vec<ManualTarget>> {
        let regex = Regex::new(pattern).map_err(|e| RedactorError::PatternError {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::locate_with(document, |text| {
            regex
                .find_iter(text)
                .filter(|m| !m.as_str().is_empty())
                .map(|m| m.range())
                .collect()
        }))
    }

    fn locate_with<F>(document: &Document, find: F) -> Vec<ManualTarget>
    where
        F: Fn(&str) -> Vec<Range<usize>>,
    {
        let mut targets = Vec::new();
        for index in 0..document.page_count() {
            let page = match document.page_text(index) {
                Ok(page) => page,
                Err(err) => {
                    warn!(page = index, error = %err, "skipping page while locating text");
                    continue;
                }
            };
            for range in find(page.text()) {
                let text = page.text()[range.clone()].to_string();
                targets.extend(page.boxes_for(range).into_iter().map(|rectangle| ManualTarget {
                    page_index: index,
                    rectangle,
                    text: Some(text.clone()),
                }));
            }
        }
        targets
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::for_tier(Tier::Free)
    }
}
