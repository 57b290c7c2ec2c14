//! Page text with an ordered offset-to-glyph map.

use super::content::{ContentSink, ShownGlyph, TextShow};
use super::geometry::Rect;
use std::ops::Range;

/// Byte range of page text painted by one glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphSpan {
    pub range: Range<usize>,
    pub bounds: Rect,
    /// Line number within the page, starting at 0
    pub line: usize,
}

/// Glyph spans in text order. Offsets not covered by a span (inserted line
/// breaks and word gaps) have no geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphMap {
    spans: Vec<GlyphSpan>,
}

impl GlyphMap {
    pub fn spans(&self) -> &[GlyphSpan] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Rectangles covering the glyphs of `range`, one per contiguous run on
    /// the same line.
    pub fn boxes_for(&self, range: Range<usize>) -> Vec<Rect> {
        let mut boxes: Vec<Rect> = Vec::new();
        let mut current_line = None;
        let start = self.spans.partition_point(|span| span.range.end <= range.start);

        for span in &self.spans[start..] {
            if span.range.start >= range.end {
                break;
            }
            if span.range.is_empty() || span.bounds.is_empty() {
                continue;
            }
            match (current_line, boxes.last_mut()) {
                (Some(line), Some(last)) if line == span.line => *last = last.union(&span.bounds),
                _ => {
                    boxes.push(span.bounds);
                    current_line = Some(span.line);
                }
            }
        }
        boxes
    }
}

/// Extracted text of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    index: usize,
    text: String,
    glyphs: GlyphMap,
}

impl PageText {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn glyphs(&self) -> &GlyphMap {
        &self.glyphs
    }

    /// Convenience for [`GlyphMap::boxes_for`].
    pub fn boxes_for(&self, range: Range<usize>) -> Vec<Rect> {
        self.glyphs.boxes_for(range)
    }
}

struct PenPosition {
    end: (f32, f32),
    height: f32,
}

/// Sink that lays shown glyphs out as page text.
#[derive(Default)]
pub(crate) struct TextBuilder {
    text: String,
    spans: Vec<GlyphSpan>,
    line: usize,
    last: Option<PenPosition>,
}

impl TextBuilder {
    fn push(&mut self, glyph: &ShownGlyph) {
        if let Some(last) = &self.last {
            let height = last.height.max(glyph.height).max(0.1);
            let dx = glyph.origin.0 - last.end.0;
            let dy = (glyph.origin.1 - last.end.1).abs();
            if dy > 0.5 * height || dx < -0.5 * height {
                self.text.push('\n');
                self.line += 1;
            } else if dx > 0.25 * height
                && !self.text.ends_with(char::is_whitespace)
                && !glyph.text.starts_with(char::is_whitespace)
            {
                self.text.push(' ');
            }
        }

        let start = self.text.len();
        self.text.push_str(&glyph.text);
        self.spans.push(GlyphSpan {
            range: start..self.text.len(),
            bounds: glyph.bounds,
            line: self.line,
        });
        self.last = Some(PenPosition {
            end: glyph.end,
            height: glyph.height,
        });
    }

    pub fn finish(self, index: usize) -> PageText {
        PageText {
            index,
            text: self.text,
            glyphs: GlyphMap { spans: self.spans },
        }
    }
}

impl ContentSink for TextBuilder {
    fn text(&mut self, show: &TextShow) {
        for glyph in show.glyphs() {
            self.push(glyph);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(range: Range<usize>, x0: f32, line: usize) -> GlyphSpan {
        let y0 = 700.0 - line as f32 * 14.0;
        GlyphSpan {
            range,
            bounds: Rect::new(x0, y0, x0 + 6.0, y0 + 10.0),
            line,
        }
    }

    #[test]
    fn test_boxes_split_per_line() {
        let map = GlyphMap {
            spans: vec![
                span(0..1, 0.0, 0),
                span(1..2, 6.0, 0),
                span(3..4, 0.0, 1),
                span(4..5, 6.0, 1),
            ],
        };
        let boxes = map.boxes_for(1..5);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0], Rect::new(6.0, 700.0, 12.0, 710.0));
        assert_eq!(boxes[1], Rect::new(0.0, 686.0, 12.0, 696.0));
    }

    #[test]
    fn test_boxes_for_uncovered_range_is_empty() {
        let map = GlyphMap {
            spans: vec![span(0..1, 0.0, 0), span(2..3, 0.0, 1)],
        };
        assert!(map.boxes_for(1..2).is_empty());
    }
}
