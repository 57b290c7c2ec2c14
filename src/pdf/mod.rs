//! Document model shared by the scanner and the redactor.

pub(crate) mod content;
pub mod geometry;
pub(crate) mod layout;
pub(crate) mod metadata;
pub mod text;

pub use geometry::Rect;
pub use text::{GlyphMap, GlyphSpan, PageText};

use crate::error::{RedactorError, RedactorResult};
use lopdf::{Document as LoDocument, Object, ObjectId};
use std::fs;
use std::path::Path;
use text::TextBuilder;
use tracing::debug;

/// Page size used when no `/MediaBox` can be found (US Letter).
const DEFAULT_MEDIA_BOX: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// How far into the input the `%PDF-` marker may appear.
const HEADER_SEARCH_LEN: usize = 1024;

/// A parsed PDF together with the bytes it was loaded from.
///
/// The document is owned by whichever component currently holds it: the
/// scanner borrows it, the redactor consumes it. Parsed objects and decoded
/// buffers are released when the value is dropped, on every exit path.
pub struct Document {
    inner: LoDocument,
    source: Vec<u8>,
    pages: Vec<ObjectId>,
}

impl Document {
    /// Parses a document from raw bytes.
    ///
    /// # Errors
    /// Returns `MalformedDocument` if the bytes are not a PDF lopdf can load.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> RedactorResult<Self> {
        let source = bytes.into();
        let search = &source[..source.len().min(HEADER_SEARCH_LEN)];
        if !search.windows(5).any(|w| w == b"%PDF-") {
            return Err(RedactorError::MalformedDocument {
                reason: "missing %PDF- header".to_string(),
                source: None,
            });
        }

        let mut inner = LoDocument::load_mem(&source).map_err(|e| RedactorError::MalformedDocument {
            reason: format!("failed to parse PDF: {}", e),
            source: Some(Box::new(e)),
        })?;
        if inner.trailer.get(b"Encrypt").is_ok() {
            return Err(RedactorError::MalformedDocument {
                reason: "encrypted documents are not supported".to_string(),
                source: None,
            });
        }

        let expanded = content::expand_quote_operators(&mut inner);
        let pages: Vec<ObjectId> = inner.get_pages().into_values().collect();
        debug!(pages = pages.len(), bytes = source.len(), expanded, "document loaded");
        Ok(Self {
            inner,
            source,
            pages,
        })
    }

    /// Reads and parses a document from disk.
    pub fn open(path: &Path) -> RedactorResult<Self> {
        let bytes = fs::read(path).map_err(|source| RedactorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(bytes)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The bytes the document was loaded from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.source
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.source
    }

    /// Extracts the text and glyph map of one page.
    ///
    /// # Errors
    /// `OutOfRangeTarget` for a bad index, `PageExtraction` when the page's
    /// content cannot be read.
    pub fn page_text(&self, index: usize) -> RedactorResult<PageText> {
        let page_id = self.page_id(index).ok_or_else(|| self.out_of_range(index))?;
        let mut builder = TextBuilder::default();
        content::run_page(&self.inner, index, page_id, &mut builder)?;
        Ok(builder.finish(index))
    }

    /// Text of every readable page, separated by blank lines.
    pub fn extract_text(&self) -> String {
        (0..self.page_count())
            .filter_map(|index| self.page_text(index).ok())
            .map(|page| page.text().to_string())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The page's `/MediaBox`, inherited from ancestors when absent.
    pub fn page_bounds(&self, index: usize) -> RedactorResult<Rect> {
        let page_id = self.page_id(index).ok_or_else(|| self.out_of_range(index))?;
        Ok(media_box(&self.inner, page_id))
    }

    /// Checks that a rectangle is a usable redaction target on a page.
    pub fn validate_target(&self, page_index: usize, rect: &Rect) -> RedactorResult<()> {
        let bounds = self.page_bounds(page_index)?;
        if !rect.is_finite() || rect.is_empty() {
            return Err(RedactorError::OutOfRangeTarget {
                page: page_index,
                reason: format!("rectangle {:?} encloses no area", rect),
            });
        }
        if !bounds.intersects(rect) {
            return Err(RedactorError::OutOfRangeTarget {
                page: page_index,
                reason: format!("rectangle {:?} lies outside the page {:?}", rect, bounds),
            });
        }
        Ok(())
    }

    pub(crate) fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.pages.get(index).copied()
    }

    pub(crate) fn into_parts(self) -> (LoDocument, Vec<u8>, Vec<ObjectId>) {
        (self.inner, self.source, self.pages)
    }

    fn out_of_range(&self, index: usize) -> RedactorError {
        RedactorError::OutOfRangeTarget {
            page: index,
            reason: format!("document has {} page(s)", self.page_count()),
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("pages", &self.pages.len())
            .field("bytes", &self.source.len())
            .finish()
    }
}

pub(crate) fn media_box(doc: &LoDocument, page_id: ObjectId) -> Rect {
    let mut node = doc.get_dictionary(page_id).ok();
    let mut hops = 0;
    while let Some(dict) = node {
        if let Some(values) = dict
            .get(b"MediaBox")
            .ok()
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
        {
            let values: Vec<f32> = values.iter().filter_map(|v| number(resolve(doc, v))).collect();
            if let [x0, y0, x1, y1] = values[..] {
                return Rect::new(x0, y0, x1, y1);
            }
        }
        hops += 1;
        if hops > 64 {
            break;
        }
        node = dict
            .get(b"Parent")
            .ok()
            .and_then(|parent| parent.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    DEFAULT_MEDIA_BOX
}

/// Follows a reference to the object it points at. Dangling references
/// resolve to themselves.
pub(crate) fn resolve<'a>(doc: &'a LoDocument, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..32 {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => current = target,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Decoded bytes of a stream object, or `None` if it is not a readable stream.
pub(crate) fn stream_bytes(doc: &LoDocument, obj: &Object) -> Option<Vec<u8>> {
    let stream = resolve(doc, obj).as_stream().ok()?;
    if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}
