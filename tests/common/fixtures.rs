//! Test fixtures and PDF builders.
//!
//! Most fixtures are assembled directly with lopdf so glyph positions are
//! exact: every line is 12pt text placed with `Td`, in Helvetica or in a
//! two-byte composite font. `write_printpdf` produces a document the way a
//! real generator would.

#![allow(dead_code)]

use anyhow::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const FONT_SIZE: f32 = 12.0;

/// Advance width of every glyph in the composite font, in thousandths.
pub const CID_WIDTH: i64 = 600;

const TO_UNICODE: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfrange
<0020> <007E> <0020>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end
";

#[derive(Debug, Clone, Default)]
struct PageLayout {
    lines: Vec<(f32, f32, String)>,
    form_lines: Vec<(f32, f32, String)>,
    cid_lines: Vec<(f32, f32, String)>,
    annotations: Vec<[f32; 4]>,
    images: Vec<[f32; 4]>,
    inherited_images: Vec<[f32; 4]>,
    form_images: Vec<[f32; 4]>,
    broken_contents: bool,
}

impl PageLayout {
    fn has_local_resources(&self) -> bool {
        !self.images.is_empty() || !self.form_lines.is_empty() || !self.form_images.is_empty()
    }
}

/// Objects shared by every page of a fixture.
struct Shared {
    pages_id: ObjectId,
    helvetica: ObjectId,
    composite: ObjectId,
    image: ObjectId,
}

/// Builder for creating test PDFs with text at known positions.
///
/// # Example
///
/// ```no_run
/// let bytes = TestPdfBuilder::new()
///     .line(72.0, 700.0, "SSN: 123-45-6789")
///     .page()
///     .line(72.0, 700.0, "Second page")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestPdfBuilder {
    pages: Vec<PageLayout>,
    info: Option<(String, String)>,
}

impl TestPdfBuilder {
    /// Creates a builder with a single empty Letter page.
    pub fn new() -> Self {
        Self {
            pages: vec![PageLayout::default()],
            info: None,
        }
    }

    /// Starts a new page; following calls apply to it.
    pub fn page(mut self) -> Self {
        self.pages.push(PageLayout::default());
        self
    }

    /// Adds a line of Helvetica text with its baseline origin at `(x, y)`.
    pub fn line(mut self, x: f32, y: f32, text: &str) -> Self {
        self.current().lines.push((x, y, text.to_string()));
        self
    }

    /// Adds a Helvetica line drawn by a form XObject placed at `(x, y)`.
    pub fn form_line(mut self, x: f32, y: f32, text: &str) -> Self {
        self.current().form_lines.push((x, y, text.to_string()));
        self
    }

    /// Adds a line in a Type0 font with `Identity-H` encoding, two bytes per
    /// character and a ToUnicode map covering printable ASCII.
    pub fn cid_line(mut self, x: f32, y: f32, text: &str) -> Self {
        self.current().cid_lines.push((x, y, text.to_string()));
        self
    }

    /// Adds a text annotation covering the rectangle.
    pub fn annotation(mut self, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        self.current().annotations.push([x0, y0, x1, y1]);
        self
    }

    /// Places a 1x1 gray image scaled to the rectangle.
    pub fn image(mut self, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        self.current().images.push([x0, y0, x1, y1]);
        self
    }

    /// Places the image through a name defined in the page tree's shared
    /// `/Resources`, which the page inherits.
    pub fn inherited_image(mut self, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        self.current().inherited_images.push([x0, y0, x1, y1]);
        self
    }

    /// Places the image from inside a form XObject, whose own `/Resources`
    /// name it.
    pub fn form_image(mut self, x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        self.current().form_images.push([x0, y0, x1, y1]);
        self
    }

    /// Points the current page's `/Contents` at an object that does not exist.
    pub fn broken_contents(mut self) -> Self {
        self.current().broken_contents = true;
        self
    }

    /// Adds a document info dictionary and an XMP metadata stream.
    pub fn with_info(mut self, title: &str, author: &str) -> Self {
        self.info = Some((title.to_string(), author.to_string()));
        self
    }

    fn current(&mut self) -> &mut PageLayout {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let helvetica = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let composite = add_composite_font(&mut doc);
        let image = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0x80],
        ));

        let shared = Shared {
            pages_id,
            helvetica,
            composite,
            image,
        };

        let mut kids: Vec<Object> = Vec::new();
        for layout in &self.pages {
            let page_id = add_page(&mut doc, &shared, layout);
            kids.push(page_id.into());
        }

        let mut resources = dictionary! { "Font" => fonts(&shared) };
        if self.pages.iter().any(|layout| !layout.inherited_images.is_empty()) {
            resources.set("XObject", dictionary! { "Im2" => image });
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some((title, author)) = &self.info {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title.as_str()),
                "Author" => Object::string_literal(author.as_str()),
                "Producer" => Object::string_literal("fixture builder"),
            });
            doc.trailer.set("Info", info_id);

            let xmp = format!(
                "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"><dc:creator>{}</dc:creator></x:xmpmeta>",
                author
            );
            let metadata_id = doc.add_object(Stream::new(
                dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
                xmp.into_bytes(),
            ));
            catalog.set("Metadata", metadata_id);
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture PDF should serialize");
        bytes
    }

    /// Builds the PDF and writes it to the specified path.
    pub fn write(self, path: &Path) -> Result<PathBuf> {
        fs::write(path, self.build())?;
        Ok(path.to_path_buf())
    }
}

impl Default for TestPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn fonts(shared: &Shared) -> Dictionary {
    dictionary! { "F1" => shared.helvetica, "F2" => shared.composite }
}

fn add_composite_font(doc: &mut Document) -> ObjectId {
    let to_unicode = doc.add_object(Stream::new(dictionary! {}, TO_UNICODE.as_bytes().to_vec()));
    let descendant = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => "FixtureSans",
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => "FixtureSans",
            "Flags" => 4,
            "FontBBox" => vec![0.into(), (-200).into(), 1000.into(), 800.into()],
            "ItalicAngle" => 0,
            "Ascent" => 800,
            "Descent" => -200,
            "CapHeight" => 700,
            "StemV" => 80,
        },
        "DW" => CID_WIDTH,
    });
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "FixtureSans",
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![descendant.into()],
        "ToUnicode" => to_unicode,
    })
}

fn show_text(operations: &mut Vec<Operation>, font: &str, x: f32, y: f32, text: Object) {
    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new("Tf", vec![font.into(), FONT_SIZE.into()]));
    operations.push(Operation::new("Td", vec![x.into(), y.into()]));
    operations.push(Operation::new("Tj", vec![text]));
    operations.push(Operation::new("ET", vec![]));
}

fn place(operations: &mut Vec<Operation>, matrix: [f32; 6], name: &str) {
    operations.push(Operation::new("q", vec![]));
    operations.push(Operation::new("cm", matrix.iter().map(|v| (*v).into()).collect()));
    operations.push(Operation::new("Do", vec![name.into()]));
    operations.push(Operation::new("Q", vec![]));
}

fn encode(operations: Vec<Operation>) -> Vec<u8> {
    Content { operations }
        .encode()
        .expect("fixture content should encode")
}

fn add_form(doc: &mut Document, resources: Dictionary, operations: Vec<Operation>) -> ObjectId {
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![(-10).into(), (-10).into(), 600.into(), 400.into()],
            "Resources" => resources,
        },
        encode(operations),
    ))
}

fn add_page(doc: &mut Document, shared: &Shared, layout: &PageLayout) -> ObjectId {
    let mut operations = Vec::new();
    let mut xobjects = Dictionary::new();

    for (x, y, text) in &layout.lines {
        show_text(&mut operations, "F1", *x, *y, Object::string_literal(text.as_str()));
    }
    for (x, y, text) in &layout.cid_lines {
        let codes: Vec<u8> = text.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect();
        show_text(
            &mut operations,
            "F2",
            *x,
            *y,
            Object::String(codes, StringFormat::Hexadecimal),
        );
    }
    for (i, (x, y, text)) in layout.form_lines.iter().enumerate() {
        let mut form_ops = Vec::new();
        show_text(&mut form_ops, "F1", 0.0, 0.0, Object::string_literal(text.as_str()));
        let form = add_form(doc, dictionary! { "Font" => fonts(shared) }, form_ops);
        let name = format!("FmText{}", i);
        xobjects.set(name.as_str(), form);
        place(&mut operations, [1.0, 0.0, 0.0, 1.0, *x, *y], &name);
    }
    for [x0, y0, x1, y1] in &layout.images {
        place(&mut operations, [x1 - x0, 0.0, 0.0, y1 - y0, *x0, *y0], "Im1");
    }
    if !layout.images.is_empty() {
        xobjects.set("Im1", shared.image);
    }
    for [x0, y0, x1, y1] in &layout.inherited_images {
        place(&mut operations, [x1 - x0, 0.0, 0.0, y1 - y0, *x0, *y0], "Im2");
    }
    for (i, [x0, y0, x1, y1]) in layout.form_images.iter().enumerate() {
        let mut form_ops = Vec::new();
        place(&mut form_ops, [x1 - x0, 0.0, 0.0, y1 - y0, 0.0, 0.0], "Im3");
        let form = add_form(doc, dictionary! { "XObject" => dictionary! { "Im3" => shared.image } }, form_ops);
        let name = format!("FmImage{}", i);
        xobjects.set(name.as_str(), form);
        place(&mut operations, [1.0, 0.0, 0.0, 1.0, *x0, *y0], &name);
    }

    let contents = if layout.broken_contents {
        Object::Reference((9999, 0))
    } else {
        doc.add_object(Stream::new(dictionary! {}, encode(operations))).into()
    };

    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => shared.pages_id,
        "Contents" => contents,
    };
    if layout.has_local_resources() {
        page.set(
            "Resources",
            dictionary! {
                "Font" => fonts(shared),
                "XObject" => xobjects,
            },
        );
    }
    if !layout.annotations.is_empty() {
        let annots: Vec<Object> = layout
            .annotations
            .iter()
            .map(|[x0, y0, x1, y1]| {
                doc.add_object(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Text",
                    "Rect" => vec![(*x0).into(), (*y0).into(), (*x1).into(), (*y1).into()],
                    "Contents" => Object::string_literal("reviewer note"),
                })
                .into()
            })
            .collect();
        page.set("Annots", annots);
    }
    doc.add_object(page)
}

/// A one-page statement with an SSN line and a line that must survive.
pub fn statement_pdf() -> Vec<u8> {
    TestPdfBuilder::new()
        .line(72.0, 700.0, "SSN: 123-45-6789")
        .line(72.0, 650.0, "Keep this line")
        .build()
}

/// A phone number wrapped across two lines.
pub fn wrapped_phone_pdf() -> Vec<u8> {
    TestPdfBuilder::new()
        .line(72.0, 700.0, "Call (555)")
        .line(72.0, 686.0, "234-5678 today")
        .build()
}

/// Writes a PDF generated with printpdf, one `use_text` call per line.
pub fn write_printpdf(path: &Path, lines: &[&str]) -> Result<PathBuf> {
    use printpdf::{BuiltinFont, Mm, PdfDocument};

    let (doc, page1, layer1) = PdfDocument::new("Test Document", Mm(210.0), Mm(297.0), "Layer 1");
    let layer = doc.get_page(page1).get_layer(layer1);
    let font = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    for (i, line) in lines.iter().enumerate() {
        layer.use_text(*line, 12.0, Mm(20.0), Mm(270.0 - 10.0 * i as f32), &font);
    }
    doc.save(&mut BufWriter::new(fs::File::create(path)?))?;
    Ok(path.to_path_buf())
}
