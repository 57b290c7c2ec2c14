//! Content-stream walking.
//!
//! A page is read twice. The walker here follows page content, and the form
//! XObjects it paints, recording which operator and stream every glyph code
//! came from and where images are painted. [`super::layout`] asks pdf-extract
//! where each glyph lands. The two sequences are then zipped glyph by glyph,
//! so extraction and redaction see identical geometry. A page whose two
//! readings disagree is reported as unreadable.

use super::geometry::{Matrix, Rect};
use super::layout::{self, LaidGlyph, ASCENT, DESCENT};
use super::{number, resolve, stream_bytes};
use crate::error::{RedactorError, RedactorResult};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document as LoDocument, Object, ObjectId, Stream};
use tracing::debug;

/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 12;

/// The stream an operation index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum ContentUnit {
    Page,
    Form(ObjectId),
}

/// A glyph painted by a text-showing operator.
#[derive(Debug, Clone)]
pub(crate) struct ShownGlyph {
    pub code: Vec<u8>,
    pub text: String,
    pub bounds: Rect,
    pub origin: (f32, f32),
    pub end: (f32, f32),
    /// Font size in page units
    pub height: f32,
    /// `TJ` adjustment that moves the pen as far as this glyph does
    pub removal_adjust: f32,
}

impl ShownGlyph {
    /// Places a laid-out glyph on the page. `base` maps the space of the
    /// stream it was shown in to default user space.
    fn place(code: Vec<u8>, laid: LaidGlyph, base: &Matrix) -> Self {
        let full = laid.trm.then(base);
        let size = laid.font_size;
        let advance = laid.width * size;
        let removal_adjust = if size.abs() > f32::EPSILON {
            -(laid.width * 1000.0 + laid.spacing * 1000.0 / size)
        } else {
            0.0
        };
        Self {
            code,
            text: laid.text,
            bounds: full.transform_rect(0.0, DESCENT * size, advance, ASCENT * size),
            origin: full.apply(0.0, 0.0),
            end: full.apply(advance + laid.spacing, 0.0),
            height: full.vertical_scale() * size.abs(),
            removal_adjust,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Piece {
    Glyph(ShownGlyph),
    Adjust(f32),
}

/// All glyphs painted by one `Tj` or `TJ` operation.
#[derive(Debug, Clone)]
pub(crate) struct TextShow {
    pub unit: ContentUnit,
    pub op_index: usize,
    pub pieces: Vec<Piece>,
}

impl TextShow {
    pub fn glyphs(&self) -> impl Iterator<Item = &ShownGlyph> {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Glyph(glyph) => Some(glyph),
            Piece::Adjust(_) => None,
        })
    }
}

/// An image XObject painted by `Do`.
#[derive(Debug, Clone)]
pub(crate) struct ImagePlacement {
    pub unit: ContentUnit,
    pub op_index: usize,
    pub name: Vec<u8>,
    /// The image stream, when the resource entry is a reference
    pub object: Option<ObjectId>,
    pub bounds: Rect,
}

/// Receives page events in content order.
pub(crate) trait ContentSink {
    fn text(&mut self, show: &TextShow);

    fn image(&mut self, _placement: &ImagePlacement) {}
}

/// Concatenated, decoded bytes of a page's `/Contents`.
pub(crate) fn page_content_bytes(doc: &LoDocument, page_id: ObjectId) -> Result<Vec<u8>, String> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| format!("page object unavailable: {}", e))?;
    let contents = match page.get(b"Contents") {
        Ok(obj) => obj,
        Err(_) => return Ok(Vec::new()),
    };
    let streams: Vec<&Object> = match contents {
        Object::Array(items) => items.iter().collect(),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.iter().collect(),
            Ok(_) => vec![contents],
            Err(e) => return Err(format!("content stream {:?} missing: {}", id, e)),
        },
        other => vec![other],
    };

    let mut data = Vec::new();
    for stream in streams {
        if let Object::Reference(id) = stream {
            if doc.get_object(*id).is_err() {
                return Err(format!("content stream {:?} missing", id));
            }
        }
        let bytes = stream_bytes(doc, stream)
            .ok_or_else(|| "content stream is not a readable stream".to_string())?;
        data.extend_from_slice(&bytes);
        data.push(b'\n');
    }
    Ok(data)
}

/// Decoded operations of a page, in content order.
pub(crate) fn page_operations(doc: &LoDocument, page_id: ObjectId) -> Result<Vec<Operation>, String> {
    let data = page_content_bytes(doc, page_id)?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Content::decode(&data)
        .map(|content| content.operations)
        .map_err(|e| format!("content stream could not be parsed: {}", e))
}

/// Decoded operations of a form XObject.
pub(crate) fn form_operations(doc: &LoDocument, form_id: ObjectId) -> Result<Vec<Operation>, String> {
    let data = stream_bytes(doc, &Object::Reference(form_id))
        .ok_or_else(|| format!("form XObject {:?} is unreadable", form_id))?;
    Content::decode(&data)
        .map(|content| content.operations)
        .map_err(|e| format!("form XObject {:?} unparsable: {}", form_id, e))
}

/// Replaces a page's `/Contents` with a single uncompressed stream.
pub(crate) fn set_page_operations(
    doc: &mut LoDocument,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), String> {
    let encoded = Content { operations }
        .encode()
        .map_err(|e| format!("failed to encode page content: {}", e))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| format!("page object vanished: {}", e))?;
    page.set("Contents", Object::Reference(content_id));
    Ok(())
}

/// Replaces the content of a form XObject in place, uncompressed.
pub(crate) fn set_form_operations(
    doc: &mut LoDocument,
    form_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), String> {
    let encoded = Content { operations }
        .encode()
        .map_err(|e| format!("failed to encode form XObject: {}", e))?;
    let stream = doc
        .get_object_mut(form_id)
        .and_then(Object::as_stream_mut)
        .map_err(|e| format!("form XObject {:?} vanished: {}", form_id, e))?;
    stream.dict.remove(b"Filter");
    stream.dict.remove(b"DecodeParms");
    stream.set_content(encoded);
    Ok(())
}

/// Effective `/Resources` of a page, following the `/Parent` chain.
pub(crate) fn page_resources(doc: &LoDocument, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok();
    let mut hops = 0;
    while let Some(dict) = node {
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve(doc, resources).as_dict().ok();
        }
        hops += 1;
        if hops > 64 {
            return None;
        }
        node = dict
            .get(b"Parent")
            .ok()
            .and_then(|parent| parent.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    None
}

fn subtype<'a>(doc: &'a LoDocument, dict: &'a Dictionary) -> &'a [u8] {
    dict.get(b"Subtype")
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_name().ok())
        .unwrap_or_default()
}

fn is_quote(op: &Operation) -> bool {
    op.operator == "'" || op.operator == "\""
}

/// `'` and `"` as the `Tw`, `Tc`, `T*` and `Tj` operations they abbreviate.
fn expand_quotes(operations: Vec<Operation>) -> Vec<Operation> {
    let mut out = Vec::with_capacity(operations.len());
    for op in operations {
        match (op.operator.as_str(), op.operands.as_slice()) {
            ("'", [text]) => {
                out.push(Operation::new("T*", vec![]));
                out.push(Operation::new("Tj", vec![text.clone()]));
            }
            ("\"", [word, char_spacing, text]) => {
                out.push(Operation::new("Tw", vec![word.clone()]));
                out.push(Operation::new("Tc", vec![char_spacing.clone()]));
                out.push(Operation::new("T*", vec![]));
                out.push(Operation::new("Tj", vec![text.clone()]));
            }
            _ => out.push(op),
        }
    }
    out
}

/// Rewrites `'` and `"` in every page and form stream as the operations they
/// abbreviate, and returns how many streams changed. pdf-extract does not
/// show text for either operator.
pub(crate) fn expand_quote_operators(doc: &mut LoDocument) -> usize {
    let mut changed = 0;

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        let Ok(operations) = page_operations(doc, page_id) else {
            continue;
        };
        if operations.iter().any(is_quote)
            && set_page_operations(doc, page_id, expand_quotes(operations)).is_ok()
        {
            changed += 1;
        }
    }

    let form_ids: Vec<ObjectId> = doc
        .objects
        .iter()
        .filter_map(|(id, obj)| match obj {
            Object::Stream(stream) if subtype(doc, &stream.dict) == b"Form" => Some(*id),
            _ => None,
        })
        .collect();
    for form_id in form_ids {
        let Ok(operations) = form_operations(doc, form_id) else {
            continue;
        };
        if operations.iter().any(is_quote)
            && set_form_operations(doc, form_id, expand_quotes(operations)).is_ok()
        {
            changed += 1;
        }
    }
    changed
}

#[derive(Debug, Clone)]
enum CodePiece {
    Code(Vec<u8>),
    Adjust(f32),
}

#[derive(Debug, Clone)]
enum Event {
    Show {
        unit: ContentUnit,
        op_index: usize,
        /// Maps the showing stream's space to default user space
        base: Matrix,
        pieces: Vec<CodePiece>,
    },
    Image(ImagePlacement),
}

/// What a page paints, before glyphs are laid out.
#[derive(Debug, Default)]
pub(crate) struct PageWalk {
    events: Vec<Event>,
    codes: usize,
}

impl PageWalk {
    pub fn images(&self) -> impl Iterator<Item = &ImagePlacement> {
        self.events.iter().filter_map(|event| match event {
            Event::Image(placement) => Some(placement),
            Event::Show { .. } => None,
        })
    }
}

#[derive(Clone, Copy)]
struct WalkState {
    ctm: Matrix,
    /// Bytes per character code of the current font
    code_width: Option<usize>,
}

struct Walker<'a> {
    doc: &'a LoDocument,
    /// Skip text operators and tolerate unusable XObjects
    images_only: bool,
    visiting: Vec<ObjectId>,
    walk: PageWalk,
}

fn walk_with(doc: &LoDocument, page_id: ObjectId, images_only: bool) -> Result<PageWalk, String> {
    let operations = page_operations(doc, page_id)?;
    let mut walker = Walker {
        doc,
        images_only,
        visiting: Vec::new(),
        walk: PageWalk::default(),
    };
    walker.walk(
        ContentUnit::Page,
        &operations,
        page_resources(doc, page_id),
        Matrix::IDENTITY,
        0,
    )?;
    Ok(walker.walk)
}

/// Walks a page's content and the forms it paints.
pub(crate) fn walk_page(doc: &LoDocument, page_id: ObjectId) -> Result<PageWalk, String> {
    walk_with(doc, page_id, false)
}

/// Images a page paints, directly or through forms. Text is not read, so a
/// page with unsupported fonts still reports its images. A page whose
/// content cannot be read reports none.
pub(crate) fn painted_images(doc: &LoDocument, page_id: ObjectId) -> Vec<ImagePlacement> {
    match walk_with(doc, page_id, true) {
        Ok(walk) => walk.images().cloned().collect(),
        Err(reason) => {
            debug!(page = ?page_id, reason = %reason, "page content unreadable while listing images");
            Vec::new()
        }
    }
}

fn lossy(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn resource_entry<'a>(
    doc: &'a LoDocument,
    resources: Option<&'a Dictionary>,
    category: &[u8],
    name: &[u8],
) -> Option<&'a Object> {
    resources
        .and_then(|res| res.get(category).ok())
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .and_then(|entries| entries.get(name).ok())
}

impl<'a> Walker<'a> {
    fn walk(
        &mut self,
        unit: ContentUnit,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        base: Matrix,
        depth: usize,
    ) -> Result<(), String> {
        let mut stack: Vec<WalkState> = Vec::new();
        let mut state = WalkState {
            ctm: Matrix::IDENTITY,
            code_width: None,
        };

        for (op_index, op) in operations.iter().enumerate() {
            match op.operator.as_str() {
                "Tf" | "Tj" | "TJ" | "'" | "\"" if self.images_only => {}
                "q" => stack.push(state),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    let values: Vec<f32> = op.operands.iter().filter_map(number).collect();
                    if let Some(m) = Matrix::from_slice(&values) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "Tf" => match op.operands.first() {
                    Some(Object::Name(name)) => state.code_width = Some(self.code_width(resources, name)?),
                    _ => return Err("malformed Tf operands".to_string()),
                },
                "Tj" => {
                    let Some(Object::String(bytes, _)) = op.operands.first() else {
                        return Err("malformed Tj operand".to_string());
                    };
                    let width = state.code_width.ok_or("text shown before a font is selected")?;
                    let pieces = self.codes(bytes, width);
                    self.show(unit, op_index, base, pieces);
                }
                "TJ" => {
                    let Some(Object::Array(items)) = op.operands.first() else {
                        continue;
                    };
                    let width = state.code_width.ok_or("text shown before a font is selected")?;
                    let mut pieces = Vec::new();
                    for item in items {
                        match item {
                            Object::String(bytes, _) => pieces.extend(self.codes(bytes, width)),
                            other => {
                                if let Some(adjust) = number(other) {
                                    pieces.push(CodePiece::Adjust(adjust));
                                }
                            }
                        }
                    }
                    self.show(unit, op_index, base, pieces);
                }
                "'" | "\"" => return Err("unexpanded quote text operator".to_string()),
                "Do" => {
                    let outcome = match op.operands.first() {
                        Some(Object::Name(name)) => {
                            self.do_xobject(unit, op_index, name, resources, &state, base, depth)
                        }
                        _ => Err("malformed Do operand".to_string()),
                    };
                    if let Err(reason) = outcome {
                        if !self.images_only {
                            return Err(reason);
                        }
                        debug!(reason = %reason, "XObject skipped while listing images");
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn codes(&mut self, bytes: &[u8], width: usize) -> Vec<CodePiece> {
        let pieces: Vec<CodePiece> = bytes
            .chunks_exact(width)
            .map(|code| CodePiece::Code(code.to_vec()))
            .collect();
        self.walk.codes += pieces.len();
        pieces
    }

    fn show(&mut self, unit: ContentUnit, op_index: usize, base: Matrix, pieces: Vec<CodePiece>) {
        self.walk.events.push(Event::Show {
            unit,
            op_index,
            base,
            pieces,
        });
    }

    /// Bytes per character code for a font resource. Composite fonts are
    /// only read through the two-byte identity encoding.
    fn code_width(&self, resources: Option<&'a Dictionary>, name: &[u8]) -> Result<usize, String> {
        let doc = self.doc;
        let font = resource_entry(doc, resources, b"Font", name)
            .map(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_dict().ok())
            .ok_or_else(|| format!("font /{} not found in resources", lossy(name)))?;
        if subtype(doc, font) != b"Type0" {
            return Ok(1);
        }
        match font.get(b"Encoding").ok().map(|obj| resolve(doc, obj)) {
            Some(Object::Name(encoding)) if encoding.as_slice() == b"Identity-H" => Ok(2),
            _ => Err(format!("font /{} uses an unsupported composite font encoding", lossy(name))),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn do_xobject(
        &mut self,
        unit: ContentUnit,
        op_index: usize,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        state: &WalkState,
        base: Matrix,
        depth: usize,
    ) -> Result<(), String> {
        let doc = self.doc;
        let entry = resource_entry(doc, resources, b"XObject", name)
            .ok_or_else(|| format!("XObject /{} not found in resources", lossy(name)))?;
        let stream = resolve(doc, entry)
            .as_stream()
            .map_err(|_| format!("XObject /{} is not a stream", lossy(name)))?;

        match subtype(doc, &stream.dict) {
            b"Image" => {
                self.walk.events.push(Event::Image(ImagePlacement {
                    unit,
                    op_index,
                    name: name.to_vec(),
                    object: entry.as_reference().ok(),
                    bounds: state.ctm.then(&base).transform_rect(0.0, 0.0, 1.0, 1.0),
                }));
            }
            b"Form" => {
                let Object::Reference(form_id) = entry else {
                    return Err(format!("form XObject /{} is not an indirect object", lossy(name)));
                };
                if depth >= MAX_FORM_DEPTH || self.visiting.contains(form_id) {
                    return Err(format!("form XObject {:?} nested too deeply or cyclic", form_id));
                }
                let operations = form_operations(doc, *form_id)?;
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .map(|obj| resolve(doc, obj))
                    .and_then(|obj| obj.as_array().ok())
                    .and_then(|values| {
                        let values: Vec<f32> = values.iter().filter_map(number).collect();
                        Matrix::from_slice(&values)
                    })
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|obj| resolve(doc, obj).as_dict().ok())
                    .or(resources);

                self.visiting.push(*form_id);
                let outcome = self.walk(
                    ContentUnit::Form(*form_id),
                    &operations,
                    form_resources,
                    matrix.then(&state.ctm).then(&base),
                    depth + 1,
                );
                self.visiting.pop();
                outcome?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Reads one page and reports its glyphs and images to `sink`.
///
/// `page_index` is the 0-based position of `page_id` in the page tree.
///
/// # Errors
/// `PageExtraction` when the content cannot be read, uses a font encoding
/// that cannot be mapped back to character codes, or lays out differently
/// from how it walks.
pub(crate) fn run_page(
    doc: &LoDocument,
    page_index: usize,
    page_id: ObjectId,
    sink: &mut dyn ContentSink,
) -> RedactorResult<()> {
    let fail = |reason: String| RedactorError::PageExtraction {
        page: page_index,
        reason,
    };
    let walk = walk_page(doc, page_id).map_err(fail)?;
    let laid = if walk.codes == 0 {
        Vec::new()
    } else {
        layout::lay_out_page(doc, page_index as u32 + 1).map_err(fail)?
    };
    if laid.len() != walk.codes {
        return Err(fail(format!(
            "glyph count mismatch: {} codes shown, {} glyphs laid out",
            walk.codes,
            laid.len()
        )));
    }

    let mut laid = laid.into_iter();
    for event in walk.events {
        match event {
            Event::Show {
                unit,
                op_index,
                base,
                pieces,
            } => {
                let mut placed = Vec::with_capacity(pieces.len());
                for piece in pieces {
                    match piece {
                        CodePiece::Adjust(adjust) => placed.push(Piece::Adjust(adjust)),
                        CodePiece::Code(code) => {
                            if let Some(glyph) = laid.next() {
                                placed.push(Piece::Glyph(ShownGlyph::place(code, glyph, &base)));
                            }
                        }
                    }
                }
                sink.text(&TextShow {
                    unit,
                    op_index,
                    pieces: placed,
                });
            }
            Event::Image(placement) => sink.image(&placement),
        }
    }
    Ok(())
}
