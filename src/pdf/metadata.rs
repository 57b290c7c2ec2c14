//! Removal of document-level channels that can retain redacted content.
//!
//! Covers the document information dictionary, XMP metadata streams,
//! application private data and embedded page thumbnails. Embedded files,
//! scripts and form values outside redacted areas are left alone.

use lopdf::{Document as LoDocument, Object};
use tracing::debug;

const CATALOG_KEYS: [&[u8]; 2] = [b"Metadata", b"PieceInfo"];
const PAGE_KEYS: [&[u8]; 3] = [b"Thumb", b"PieceInfo", b"Metadata"];

/// Strips metadata channels in place and returns how many entries were removed.
pub(crate) fn scrub_metadata(doc: &mut LoDocument) -> usize {
    let mut removed = 0;

    if doc.trailer.remove(b"Info").is_some() {
        removed += 1;
    }

    let root_id = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|obj| obj.as_reference().ok());
    if let Some(catalog) = root_id
        .and_then(|id| doc.get_object_mut(id).ok())
        .and_then(|obj| obj.as_dict_mut().ok())
    {
        for key in CATALOG_KEYS {
            if catalog.remove(key).is_some() {
                removed += 1;
            }
        }
    }

    let page_ids: Vec<_> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            for key in PAGE_KEYS {
                if page.remove(key).is_some() {
                    removed += 1;
                }
            }
        }
    }

    debug!(removed, "metadata entries scrubbed");
    removed
}
