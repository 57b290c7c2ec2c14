//! Content-stream rewriting for a single page.
//!
//! The page is read once with the same glyph geometry the scanner uses.
//! Every glyph whose box overlaps a target is dropped from its operator and
//! replaced by a `TJ` adjustment of the same advance, so the surviving text
//! does not move. Fills are appended after the original content, which is
//! wrapped in `q … Q` so its graphics state cannot leak into them.
//!
//! Images painted inside a target lose their `Do`. Once every page has been
//! rewritten, [`purge_unpainted_images`] removes image streams that no page
//! paints any more.

use crate::error::{RedactorError, RedactorResult};
use crate::pdf::content::{
    self, form_operations, page_operations, page_resources, painted_images, set_form_operations,
    set_page_operations, ContentSink, ContentUnit, ImagePlacement, Piece, TextShow,
};
use crate::pdf::{number, resolve, Rect};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, StringFormat};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Marked-content tag wrapping the fills this module draws.
const FILL_TAG: &[u8] = b"Redaction";

/// What happened to one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PageOutcome {
    pub glyphs_removed: usize,
    pub images_removed: usize,
    pub annotations_removed: usize,
    pub fills_added: usize,
    pub modified: bool,
    /// Image streams whose placements were dropped
    pub detached_images: BTreeSet<ObjectId>,
}

struct TextEdit {
    pieces: Vec<Piece>,
    removed: Vec<bool>,
}

/// Collects the glyphs and image placements that overlap a target.
struct Plan<'t> {
    targets: &'t [Rect],
    text_edits: BTreeMap<(ContentUnit, usize), TextEdit>,
    images: Vec<ImagePlacement>,
}

impl Plan<'_> {
    fn hits(&self, bounds: &Rect) -> bool {
        self.targets.iter().any(|target| target.intersects(bounds))
    }

    fn glyphs_removed(&self) -> usize {
        self.text_edits
            .values()
            .map(|edit| edit.removed.iter().filter(|r| **r).count())
            .sum()
    }
}

impl ContentSink for Plan<'_> {
    fn text(&mut self, show: &TextShow) {
        let removed: Vec<bool> = show
            .pieces
            .iter()
            .map(|piece| match piece {
                Piece::Glyph(glyph) => self.hits(&glyph.bounds),
                Piece::Adjust(_) => false,
            })
            .collect();
        let key = (show.unit, show.op_index);

        // a form painted more than once: a glyph is removed if any placement hits
        if let Some(edit) = self.text_edits.get_mut(&key) {
            if edit.removed.len() == removed.len() {
                for (current, hit) in edit.removed.iter_mut().zip(removed) {
                    *current |= hit;
                }
            }
            return;
        }
        if removed.contains(&true) {
            self.text_edits.insert(
                key,
                TextEdit {
                    pieces: show.pieces.clone(),
                    removed,
                },
            );
        }
    }

    fn image(&mut self, placement: &ImagePlacement) {
        if self.hits(&placement.bounds) {
            self.images.push(placement.clone());
        }
    }
}

fn processing(page_index: usize, message: String) -> RedactorError {
    RedactorError::PdfProcessing {
        message,
        page: Some(page_index),
        source: None,
    }
}

/// Applies all targets of one page. Only one call per page may run at a time.
pub(crate) fn redact_page(
    doc: &mut LoDocument,
    page_index: usize,
    page_id: ObjectId,
    targets: &[Rect],
    fill_color: [f32; 3],
) -> RedactorResult<PageOutcome> {
    let mut plan = Plan {
        targets,
        text_edits: BTreeMap::new(),
        images: Vec::new(),
    };
    content::run_page(doc, page_index, page_id, &mut plan)?;
    let operations = page_operations(doc, page_id).map_err(|reason| processing(page_index, reason))?;

    let mut outcome = PageOutcome {
        glyphs_removed: plan.glyphs_removed(),
        images_removed: plan.images.len(),
        detached_images: plan.images.iter().filter_map(|image| image.object).collect(),
        ..Default::default()
    };

    let mut existing = existing_fills(&operations);
    let mut fills = Vec::new();
    for target in targets {
        if existing.iter().any(|fill| fill.contains(target)) {
            continue;
        }
        fills.push(*target);
        existing.push(*target);
    }
    outcome.fills_added = fills.len();

    // group edits per stream
    let mut units: BTreeSet<ContentUnit> = plan.text_edits.keys().map(|(unit, _)| *unit).collect();
    units.extend(plan.images.iter().map(|image| image.unit));

    let mut page_ops = None;
    for unit in units {
        let edits: BTreeMap<usize, &TextEdit> = plan
            .text_edits
            .iter()
            .filter(|((u, _), _)| *u == unit)
            .map(|((_, index), edit)| (*index, edit))
            .collect();
        let drops: HashSet<usize> = plan
            .images
            .iter()
            .filter(|image| image.unit == unit)
            .map(|image| image.op_index)
            .collect();

        match unit {
            ContentUnit::Page => page_ops = Some(rewrite_operations(&operations, &edits, &drops)),
            ContentUnit::Form(form_id) => rewrite_form(doc, page_index, form_id, &edits, &drops)?,
        }
    }

    if page_ops.is_some() || !fills.is_empty() {
        let body = page_ops.unwrap_or(operations);
        if !plan.images.is_empty() {
            let names: Vec<&[u8]> = plan
                .images
                .iter()
                .filter(|image| image.unit == ContentUnit::Page)
                .map(|image| image.name.as_slice())
                .collect();
            detach_images(doc, page_id, &names, &body);
        }
        write_page_content(doc, page_index, page_id, body, &fills, fill_color)?;
        outcome.modified = true;
    } else if outcome.glyphs_removed > 0 || outcome.images_removed > 0 {
        // only form streams changed
        outcome.modified = true;
    }

    outcome.annotations_removed = remove_annotations(doc, page_id, targets);
    if outcome.annotations_removed > 0 {
        outcome.modified = true;
    }

    debug!(
        page = page_index,
        glyphs = outcome.glyphs_removed,
        images = outcome.images_removed,
        annotations = outcome.annotations_removed,
        fills = outcome.fills_added,
        "page redacted"
    );
    Ok(outcome)
}

fn rewrite_operations(
    operations: &[Operation],
    edits: &BTreeMap<usize, &TextEdit>,
    drops: &HashSet<usize>,
) -> Vec<Operation> {
    let mut out = Vec::with_capacity(operations.len());
    for (index, op) in operations.iter().enumerate() {
        if drops.contains(&index) {
            continue;
        }
        match edits.get(&index) {
            Some(edit) => out.push(rewrite_text_operation(edit)),
            None => out.push(op.clone()),
        }
    }
    out
}

fn flush(items: &mut Vec<Object>, buffer: &mut Vec<u8>) {
    if !buffer.is_empty() {
        items.push(Object::String(std::mem::take(buffer), StringFormat::Hexadecimal));
    }
}

/// Rebuilds a text-showing operation as `TJ`, with removed glyphs turned
/// into positioning adjustments.
fn rewrite_text_operation(edit: &TextEdit) -> Operation {
    let mut items = Vec::new();
    let mut buffer = Vec::new();
    for (piece, removed) in edit.pieces.iter().zip(&edit.removed) {
        match piece {
            Piece::Glyph(glyph) if !removed => buffer.extend_from_slice(&glyph.code),
            Piece::Glyph(glyph) => {
                flush(&mut items, &mut buffer);
                items.push(Object::Real(glyph.removal_adjust.into()));
            }
            Piece::Adjust(adjust) => {
                flush(&mut items, &mut buffer);
                items.push(Object::Real((*adjust).into()));
            }
        }
    }
    flush(&mut items, &mut buffer);
    Operation::new("TJ", vec![Object::Array(items)])
}

fn rewrite_form(
    doc: &mut LoDocument,
    page_index: usize,
    form_id: ObjectId,
    edits: &BTreeMap<usize, &TextEdit>,
    drops: &HashSet<usize>,
) -> RedactorResult<()> {
    let operations = form_operations(doc, form_id).map_err(|reason| processing(page_index, reason))?;
    set_form_operations(doc, form_id, rewrite_operations(&operations, edits, drops))
        .map_err(|reason| processing(page_index, reason))
}

/// Rectangles already painted inside `/Redaction` marked content.
fn existing_fills(operations: &[Operation]) -> Vec<Rect> {
    let mut sections: Vec<bool> = Vec::new();
    let mut fills = Vec::new();
    for op in operations {
        match op.operator.as_str() {
            "BMC" | "BDC" => sections.push(matches!(
                op.operands.first(),
                Some(Object::Name(name)) if name.as_slice() == FILL_TAG
            )),
            "EMC" => {
                sections.pop();
            }
            "re" if sections.iter().any(|inside| *inside) => {
                let values: Vec<f32> = op.operands.iter().filter_map(number).collect();
                if let [x, y, w, h] = values[..] {
                    fills.push(Rect::new(x, y, x + w, y + h));
                }
            }
            _ => {}
        }
    }
    fills
}

fn write_page_content(
    doc: &mut LoDocument,
    page_index: usize,
    page_id: ObjectId,
    body: Vec<Operation>,
    fills: &[Rect],
    fill_color: [f32; 3],
) -> RedactorResult<()> {
    let mut operations = Vec::with_capacity(body.len() + fills.len() + 8);
    operations.push(Operation::new("q", vec![]));
    operations.extend(body);
    operations.push(Operation::new("Q", vec![]));

    if !fills.is_empty() {
        let [r, g, b] = fill_color;
        operations.push(Operation::new("BMC", vec![Object::Name(FILL_TAG.to_vec())]));
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new(
            "rg",
            vec![Object::Real(r.into()), Object::Real(g.into()), Object::Real(b.into())],
        ));
        for fill in fills {
            operations.push(Operation::new(
                "re",
                vec![
                    Object::Real(fill.x0.into()),
                    Object::Real(fill.y0.into()),
                    Object::Real(fill.width().into()),
                    Object::Real(fill.height().into()),
                ],
            ));
        }
        operations.push(Operation::new("f", vec![]));
        operations.push(Operation::new("Q", vec![]));
        operations.push(Operation::new("EMC", vec![]));
    }

    set_page_operations(doc, page_id, operations).map_err(|reason| processing(page_index, reason))
}

/// Removes image names no longer painted by `body` from a page-local copy
/// of the page resources.
fn detach_images(doc: &mut LoDocument, page_id: ObjectId, names: &[&[u8]], body: &[Operation]) {
    let still_painted = |name: &[u8]| {
        body.iter().any(|op| {
            op.operator == "Do"
                && matches!(op.operands.first(), Some(Object::Name(n)) if n.as_slice() == name)
        })
    };
    let Some(mut resources) = page_resources(doc, page_id).cloned() else {
        return;
    };
    let Some(mut xobjects) = resources
        .get(b"XObject")
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
    else {
        return;
    };
    for name in names {
        if !still_painted(name) {
            xobjects.remove(name);
        }
    }
    resources.set("XObject", Object::Dictionary(xobjects));
    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
        page.set("Resources", Object::Dictionary(resources));
    }
}

fn drop_references(object: &mut Object, ids: &BTreeSet<ObjectId>) {
    match object {
        Object::Dictionary(dict) => drop_dictionary_references(dict, ids),
        Object::Stream(stream) => drop_dictionary_references(&mut stream.dict, ids),
        Object::Array(items) => {
            for item in items {
                drop_references(item, ids);
            }
        }
        _ => {}
    }
}

fn drop_dictionary_references(dict: &mut Dictionary, ids: &BTreeSet<ObjectId>) {
    let keys: Vec<Vec<u8>> = dict
        .iter()
        .filter(|(_, value)| matches!(value, Object::Reference(id) if ids.contains(id)))
        .map(|(key, _)| key.clone())
        .collect();
    for key in keys {
        dict.remove(&key);
    }
    for (_, value) in dict.iter_mut() {
        drop_references(value, ids);
    }
}

/// Removes images that lost placements and that no page paints any more.
///
/// Every dictionary entry referring to such an image is dropped, wherever it
/// lives: page, inherited page-tree or form resources, or a shared
/// `/XObject` dictionary. The image stream itself is emptied so its pixels
/// cannot survive through a reference the walk did not see. Returns the
/// number of images purged.
pub(crate) fn purge_unpainted_images(doc: &mut LoDocument, detached: &BTreeSet<ObjectId>) -> usize {
    if detached.is_empty() {
        return 0;
    }
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let painted: BTreeSet<ObjectId> = page_ids
        .into_iter()
        .flat_map(|page_id| painted_images(doc, page_id))
        .filter_map(|image| image.object)
        .collect();
    let unpainted: BTreeSet<ObjectId> = detached.difference(&painted).copied().collect();
    if unpainted.is_empty() {
        return 0;
    }

    for object in doc.objects.values_mut() {
        drop_references(object, &unpainted);
    }
    for id in &unpainted {
        if let Ok(stream) = doc.get_object_mut(*id).and_then(Object::as_stream_mut) {
            stream.dict.remove(b"Filter");
            stream.dict.remove(b"DecodeParms");
            stream.set_content(Vec::new());
        }
    }
    debug!(images = unpainted.len(), "unpainted images purged");
    unpainted.len()
}

fn annotation_rect(doc: &LoDocument, annot: &Object) -> Option<Rect> {
    let values: Vec<f32> = resolve(doc, annot)
        .as_dict()
        .ok()?
        .get(b"Rect")
        .ok()
        .map(|obj| resolve(doc, obj))?
        .as_array()
        .ok()?
        .iter()
        .filter_map(|v| number(resolve(doc, v)))
        .collect();
    match values[..] {
        [x0, y0, x1, y1] => Some(Rect::new(x0, y0, x1, y1)),
        _ => None,
    }
}

fn annotation_parent(doc: &LoDocument, annot: &Object) -> Option<ObjectId> {
    resolve(doc, annot)
        .as_dict()
        .ok()?
        .get(b"Parent")
        .ok()?
        .as_reference()
        .ok()
}

/// Drops annotations overlapping a target, their popups, and their entries
/// in the interactive form field list.
fn remove_annotations(doc: &mut LoDocument, page_id: ObjectId, targets: &[Rect]) -> usize {
    let annots: Vec<Object> = match doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_array().ok())
    {
        Some(annots) => annots.clone(),
        None => return 0,
    };

    let mut removed_ids = Vec::new();
    let mut kept = Vec::new();
    let mut removed = 0;
    for annot in annots {
        let hit = annotation_rect(doc, &annot)
            .is_some_and(|rect| targets.iter().any(|target| target.intersects(&rect)));
        if hit {
            removed += 1;
            if let Object::Reference(id) = annot {
                removed_ids.push(id);
            }
        } else {
            kept.push(annot);
        }
    }
    if removed == 0 {
        return 0;
    }
    kept.retain(|annot| {
        let orphaned = annotation_parent(doc, annot).is_some_and(|parent| removed_ids.contains(&parent));
        if orphaned {
            removed += 1;
        }
        !orphaned
    });

    if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
        page.set("Annots", Object::Array(kept));
    }
    remove_form_fields(doc, &removed_ids);
    removed
}

fn remove_form_fields(doc: &mut LoDocument, removed_ids: &[ObjectId]) {
    let Some(root_id) = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|obj| obj.as_reference().ok())
    else {
        return;
    };
    let acro_form_id = doc
        .get_dictionary(root_id)
        .ok()
        .and_then(|catalog| catalog.get(b"AcroForm").ok())
        .and_then(|obj| obj.as_reference().ok());

    let acro_form = match acro_form_id {
        Some(id) => doc.get_object_mut(id).and_then(Object::as_dict_mut).ok(),
        None => doc
            .get_object_mut(root_id)
            .and_then(Object::as_dict_mut)
            .ok()
            .and_then(|catalog| catalog.get_mut(b"AcroForm").ok())
            .and_then(|obj| obj.as_dict_mut().ok()),
    };
    if let Some(Object::Array(fields)) = acro_form.and_then(|form| form.get_mut(b"Fields").ok()) {
        fields.retain(|field| !matches!(field, Object::Reference(id) if removed_ids.contains(id)));
    }
}
