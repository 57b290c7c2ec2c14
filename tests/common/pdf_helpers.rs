//! PDF inspection helpers.

#![allow(dead_code)]

use lopdf::content::Content;
use lopdf::{Document, Object};

fn page_operations(bytes: &[u8], page_index: usize) -> Vec<lopdf::content::Operation> {
    let doc = Document::load_mem(bytes).expect("PDF should load");
    let page_id = doc
        .get_pages()
        .into_values()
        .nth(page_index)
        .expect("page should exist");
    let content = doc.get_page_content(page_id).expect("page content should be readable");
    Content::decode(&content).expect("page content should parse").operations
}

/// Counts the rectangles painted inside `/Redaction` marked content.
pub fn count_redaction_fills(bytes: &[u8], page_index: usize) -> usize {
    let mut depth: Vec<bool> = Vec::new();
    let mut count = 0;
    for op in page_operations(bytes, page_index) {
        match op.operator.as_str() {
            "BMC" | "BDC" => depth.push(matches!(
                op.operands.first(),
                Some(Object::Name(name)) if name.as_slice() == b"Redaction"
            )),
            "EMC" => {
                depth.pop();
            }
            "re" if depth.iter().any(|inside| *inside) => count += 1,
            _ => {}
        }
    }
    count
}

/// Counts image and form placements on a page.
pub fn count_xobject_placements(bytes: &[u8], page_index: usize) -> usize {
    page_operations(bytes, page_index)
        .iter()
        .filter(|op| op.operator == "Do")
        .count()
}

/// Number of annotations on a page.
pub fn annotation_count(bytes: &[u8], page_index: usize) -> usize {
    let doc = Document::load_mem(bytes).expect("PDF should load");
    let page_id = doc
        .get_pages()
        .into_values()
        .nth(page_index)
        .expect("page should exist");
    let page = doc.get_dictionary(page_id).expect("page dictionary");
    match page.get(b"Annots") {
        Ok(Object::Array(annots)) => annots.len(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .and_then(Object::as_array)
            .map(|a| a.len())
            .unwrap_or(0),
        _ => 0,
    }
}

/// Whether the trailer still carries a document info dictionary.
pub fn has_info_dictionary(bytes: &[u8]) -> bool {
    let doc = Document::load_mem(bytes).expect("PDF should load");
    doc.trailer.get(b"Info").is_ok()
}

/// Whether the catalog still carries an XMP metadata stream.
pub fn has_xmp_metadata(bytes: &[u8]) -> bool {
    let doc = Document::load_mem(bytes).expect("PDF should load");
    doc.catalog()
        .map(|catalog| catalog.has(b"Metadata"))
        .unwrap_or(false)
}

/// Number of image XObject streams in the file, referenced or not.
pub fn image_object_count(bytes: &[u8]) -> usize {
    let doc = Document::load_mem(bytes).expect("PDF should load");
    doc.objects
        .values()
        .filter(|obj| match obj {
            Object::Stream(stream) => matches!(
                stream.dict.get(b"Subtype"),
                Ok(Object::Name(name)) if name.as_slice() == b"Image"
            ),
            _ => false,
        })
        .count()
}

/// Decoded length of every image stream in the file.
pub fn image_stream_lengths(bytes: &[u8]) -> Vec<usize> {
    let doc = Document::load_mem(bytes).expect("PDF should load");
    doc.objects
        .values()
        .filter_map(|obj| obj.as_stream().ok())
        .filter(|stream| matches!(
            stream.dict.get(b"Subtype"),
            Ok(Object::Name(name)) if name.as_slice() == b"Image"
        ))
        .map(|stream| stream.decompressed_content().unwrap_or_else(|_| stream.content.clone()).len())
        .collect()
}
