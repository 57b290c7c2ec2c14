//! Glyph layout through `pdf-extract`.
//!
//! pdf-extract resolves fonts, encodings, ToUnicode maps and widths, and
//! reports each glyph it shows together with its text rendering matrix. This
//! module collects those reports for one page; [`super::content`] pairs them
//! with the operators that produced them.

use super::geometry::Matrix;
use lopdf::Document as LoDocument;
use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Share of the em square above the baseline. pdf-extract does not expose
/// font bounding boxes, so every glyph box uses Helvetica's.
pub(crate) const ASCENT: f32 = 0.8;
/// Share of the em square below the baseline.
pub(crate) const DESCENT: f32 = -0.2;

/// One glyph as laid out by pdf-extract.
#[derive(Debug, Clone)]
pub(crate) struct LaidGlyph {
    pub text: String,
    /// Text rendering matrix without the font size, relative to the stream
    /// the glyph was shown in.
    pub trm: Matrix,
    /// Advance width in thousandths of the font size, divided by 1000
    pub width: f32,
    /// Character and word spacing added after the glyph, in text space
    pub spacing: f32,
    pub font_size: f32,
}

#[derive(Default)]
struct GlyphCollector {
    glyphs: Vec<LaidGlyph>,
}

impl OutputDev for GlyphCollector {
    fn begin_page(
        &mut self,
        _page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        spacing: f64,
        font_size: f64,
        char: &str,
    ) -> Result<(), OutputError> {
        self.glyphs.push(LaidGlyph {
            text: char.to_string(),
            trm: Matrix::new(
                trm.m11 as f32,
                trm.m12 as f32,
                trm.m21 as f32,
                trm.m22 as f32,
                trm.m31 as f32,
                trm.m32 as f32,
            ),
            width: width as f32,
            spacing: spacing as f32,
            font_size: font_size as f32,
        });
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown cause".to_string()
    }
}

/// Runs `f`, turning a panic inside pdf-extract into an error message.
pub(crate) fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| format!("text layout aborted: {}", panic_message(payload.as_ref())))
}

/// Every glyph pdf-extract shows on a page, in painting order.
///
/// `page_number` is 1-based, as in the document's page tree.
pub(crate) fn lay_out_page(doc: &LoDocument, page_number: u32) -> Result<Vec<LaidGlyph>, String> {
    let mut collector = GlyphCollector::default();
    guarded(|| pdf_extract::output_doc_page(doc, &mut collector, page_number))?
        .map_err(|e| format!("text layout failed: {}", e))?;
    Ok(collector.glyphs)
}
