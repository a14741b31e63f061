//! Two-phase PDF assembly
//!
//! Phase one lays every page out in memory as a [`PageDraft`]. Phase two
//! knows the final page count, so it stamps footers, resolves contents
//! links and page numbers, and serializes the whole document with lopdf.

use image::imageops::FilterType;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};

use super::layout::{encode_win_ansi, paragraphs, text_width, with_ellipsis, wrap_text, Font};
use crate::application::ports::outbound::{AssemblyError, DocumentInput, DocumentRendererPort};
use crate::domain::entities::{
    Illustration, PageInfo, PageKind, RenderedDocument, Section, TocEntry, COVER_INDEX,
};

// US Letter, in points
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const CONTENT_TOP: f32 = PAGE_HEIGHT - MARGIN;
/// Lowest baseline for page content; footers sit below it
const CONTENT_BOTTOM: f32 = 72.0;
const FOOTER_Y: f32 = 36.0;
const CLOSING_Y: f32 = 50.0;

const TITLE_SIZE: f32 = 28.0;
const HEADING_SIZE: f32 = 20.0;
const TOC_SIZE: f32 = 14.0;
const NOTICE_SIZE: f32 = 11.0;
const APPENDIX_SIZE: f32 = 11.0;
const FOOTER_SIZE: f32 = 9.0;
const LEADING: f32 = 1.4;

const COVER_BOX: f32 = 360.0;
const SECTION_BOX: f32 = 260.0;
/// Longer titles are cut with an ellipsis so the cover keeps its full box
const MAX_TITLE_LINES: usize = 4;
/// Body sizes tried in order before the text is cut
const BODY_SIZES: [f32; 3] = [12.0, 10.0, 9.0];
/// Embedded rasters keep at most this many pixels per point of their box
const PIXELS_PER_POINT: f32 = 2.0;

const HEADING_COLOR: [f32; 3] = [0.27, 0.22, 0.45];
const TEXT_COLOR: [f32; 3] = [0.1, 0.1, 0.1];

pub const CONTENTS_HEADING: &str = "Contents";
pub const APPENDIX_HEADING: &str = "The Complete Story";
pub const ILLUSTRATION_UNAVAILABLE: &str = "[Illustration unavailable]";
pub const CLOSING_ATTRIBUTION: &str = "Made with Storybook Engine. The End.";

/// Lays out and serializes storybooks as PDF
#[derive(Debug, Clone, Default)]
pub struct PdfAssembler;

impl PdfAssembler {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentRendererPort for PdfAssembler {
    fn render(&self, input: DocumentInput) -> Result<RenderedDocument, AssemblyError> {
        let illustration = |index: usize| {
            input
                .illustrations
                .iter()
                .find(|i| i.owner_section_index == index)
        };

        let mut drafts = Vec::with_capacity(input.sections.len() + 3);
        drafts.push(title_page(&input.title, illustration(COVER_INDEX)));
        drafts.push(contents_page(&input.sections));
        for section in &input.sections {
            drafts.push(section_page(section, illustration(section.index)));
        }
        drafts.extend(appendix_pages(&input.narrative));

        debug!(pages = drafts.len(), "Layout complete");
        finalize(&input.title, drafts)
    }
}

// =============================================================================
// Page drafts
// =============================================================================

struct RasterImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

struct PlacedImage {
    name: String,
    image: RasterImage,
}

/// A contents row whose page number is only known after layout
struct ContentsLink {
    label: String,
    target: PageKind,
    y: f32,
    size: f32,
}

struct PageDraft {
    kind: PageKind,
    ops: Vec<Operation>,
    images: Vec<PlacedImage>,
    links: Vec<ContentsLink>,
}

impl PageDraft {
    fn new(kind: PageKind) -> Self {
        Self {
            kind,
            ops: Vec::new(),
            images: Vec::new(),
            links: Vec::new(),
        }
    }

    fn color(&mut self, [r, g, b]: [f32; 3]) {
        self.ops
            .push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
    }

    fn text(&mut self, font: Font, size: f32, x: f32, y: f32, text: &str) {
        self.ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.resource_name().into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    fn centered(&mut self, font: Font, size: f32, y: f32, text: &str) {
        let x = (PAGE_WIDTH - text_width(text, font, size)) / 2.0;
        self.text(font, size, x.max(MARGIN / 2.0), y, text);
    }

    fn right_aligned(&mut self, font: Font, size: f32, y: f32, text: &str) {
        let x = PAGE_WIDTH - MARGIN - text_width(text, font, size);
        self.text(font, size, x, y, text);
    }

    fn image(&mut self, image: RasterImage, x: f32, y: f32, width: f32, height: f32) {
        let name = format!("Im{}", self.images.len() + 1);
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0f32.into(),
                    0f32.into(),
                    height.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![name.as_str().into()]),
            Operation::new("Q", vec![]),
        ]);
        self.images.push(PlacedImage { name, image });
    }

    /// Scale `image` into a square box whose top edge is `top`, centered
    /// horizontally. Returns the bottom edge of the placed image.
    fn boxed_image(&mut self, image: RasterImage, box_size: f32, top: f32) -> f32 {
        let scale = box_size / image.width.max(image.height).max(1) as f32;
        let width = image.width as f32 * scale;
        let height = image.height as f32 * scale;
        let x = (PAGE_WIDTH - width) / 2.0;
        self.image(image, x, top - height, width, height);
        top - height
    }
}

fn rasterize(illustration: Option<&Illustration>, box_size: f32) -> Result<RasterImage, String> {
    let illustration = illustration.ok_or_else(|| "no illustration supplied".to_string())?;
    let decoded = image::load_from_memory(&illustration.bytes)
        .map_err(|e| format!("{} ({})", e, illustration.mime))?;

    let max_pixels = (box_size * PIXELS_PER_POINT) as u32;
    let decoded = if decoded.width() > max_pixels || decoded.height() > max_pixels {
        decoded.resize(max_pixels, max_pixels, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = decoded.to_rgb8();
    Ok(RasterImage {
        width: rgb.width(),
        height: rgb.height(),
        rgb: rgb.into_raw(),
    })
}

fn title_page(title: &str, cover: Option<&Illustration>) -> PageDraft {
    let mut page = PageDraft::new(PageKind::Title);
    page.color(HEADING_COLOR);

    let mut y = CONTENT_TOP - 40.0;
    for line in title_lines(title) {
        page.centered(Font::Bold, TITLE_SIZE, y, &line);
        y -= TITLE_SIZE * LEADING;
    }

    let box_top = y - 16.0;
    let box_size = COVER_BOX.min(box_top - CONTENT_BOTTOM);

    match rasterize(cover, box_size) {
        Ok(image) => {
            page.boxed_image(image, box_size, box_top);
        }
        Err(reason) => warn!("Cover illustration could not be embedded: {}", reason),
    }
    page
}

fn title_lines(title: &str) -> Vec<String> {
    let mut lines = wrap_text(title, Font::Bold, TITLE_SIZE, CONTENT_WIDTH);
    if lines.len() > MAX_TITLE_LINES {
        warn!(lines = lines.len(), "Title too long for the title page, cutting it");
        lines.truncate(MAX_TITLE_LINES);
        if let Some(last) = lines.last_mut() {
            *last = with_ellipsis(last, Font::Bold, TITLE_SIZE, CONTENT_WIDTH);
        }
    }
    lines
}

fn contents_page(sections: &[Section]) -> PageDraft {
    let mut page = PageDraft::new(PageKind::TableOfContents);
    page.color(HEADING_COLOR);
    page.centered(Font::Bold, HEADING_SIZE + 4.0, CONTENT_TOP - 20.0, CONTENTS_HEADING);
    page.color(TEXT_COLOR);

    let mut entries = vec![("Title Page".to_string(), PageKind::Title)];
    entries.extend(
        sections
            .iter()
            .map(|s| (format!("Section {}", s.index), PageKind::Section(s.index))),
    );
    entries.push(("Full Story".to_string(), PageKind::Appendix));

    // Every entry stays on this one page; long lists get tighter rows
    let top = CONTENT_TOP - 70.0;
    let spacing = ((top - CONTENT_BOTTOM) / entries.len() as f32).min(TOC_SIZE * 2.0);
    let size = TOC_SIZE.min(spacing * 0.7);

    for (row, (label, target)) in entries.into_iter().enumerate() {
        let y = top - row as f32 * spacing;
        page.text(Font::Regular, size, MARGIN, y, &label);
        page.links.push(ContentsLink {
            label,
            target,
            y,
            size,
        });
    }
    page
}

enum BodyLine {
    Text(String),
    Gap,
}

fn body_lines(text: &str, size: f32) -> Vec<BodyLine> {
    let mut lines = Vec::new();
    for (i, paragraph) in paragraphs(text).iter().enumerate() {
        if i > 0 {
            lines.push(BodyLine::Gap);
        }
        lines.extend(
            wrap_text(paragraph, Font::Regular, size, CONTENT_WIDTH)
                .into_iter()
                .map(BodyLine::Text),
        );
    }
    lines
}

/// Distance from the first baseline to the last
fn lines_height(lines: &[BodyLine], leading: f32) -> f32 {
    let mut height = 0.0;
    let mut first = true;
    for line in lines {
        match line {
            BodyLine::Text(_) if first => first = false,
            BodyLine::Text(_) => height += leading,
            BodyLine::Gap => height += leading * 0.5,
        }
    }
    height
}

/// Pick the largest body size that fits, cutting the text at the smallest
fn fit_body(text: &str, available: f32) -> (f32, Vec<BodyLine>) {
    for size in BODY_SIZES {
        let lines = body_lines(text, size);
        if lines_height(&lines, size * LEADING) <= available {
            return (size, lines);
        }
    }

    let size = BODY_SIZES[BODY_SIZES.len() - 1];
    let leading = size * LEADING;
    let mut lines = body_lines(text, size);
    while lines.len() > 1 && lines_height(&lines, leading) > available {
        lines.pop();
    }
    while matches!(lines.last(), Some(BodyLine::Gap)) {
        lines.pop();
    }
    if let Some(BodyLine::Text(last)) = lines.last_mut() {
        *last = with_ellipsis(last, Font::Regular, size, CONTENT_WIDTH);
    }
    (size, lines)
}

fn section_page(section: &Section, illustration: Option<&Illustration>) -> PageDraft {
    let mut page = PageDraft::new(PageKind::Section(section.index));
    page.color(HEADING_COLOR);
    let heading_y = CONTENT_TOP - HEADING_SIZE;
    page.centered(
        Font::Bold,
        HEADING_SIZE,
        heading_y,
        &format!("Section {}", section.index),
    );
    page.color(TEXT_COLOR);

    let image_top = heading_y - 20.0;
    let body_top = match rasterize(illustration, SECTION_BOX) {
        Ok(image) => page.boxed_image(image, SECTION_BOX, image_top) - 28.0,
        Err(reason) => {
            warn!(
                section = section.index,
                "Illustration could not be embedded: {}", reason
            );
            page.centered(
                Font::Oblique,
                NOTICE_SIZE,
                image_top - NOTICE_SIZE,
                ILLUSTRATION_UNAVAILABLE,
            );
            image_top - NOTICE_SIZE - 32.0
        }
    };

    let (size, lines) = fit_body(&section.text, body_top - CONTENT_BOTTOM);
    if size < BODY_SIZES[0] {
        debug!(section = section.index, size, "Section body shrunk to fit");
    }

    let leading = size * LEADING;
    let mut y = body_top;
    for line in lines {
        match line {
            BodyLine::Text(text) => {
                page.text(Font::Regular, size, MARGIN, y, &text);
                y -= leading;
            }
            BodyLine::Gap => y -= leading * 0.5,
        }
    }
    page
}

fn appendix_pages(narrative: &str) -> Vec<PageDraft> {
    let leading = APPENDIX_SIZE * LEADING;
    let mut finished = Vec::new();

    let mut page = PageDraft::new(PageKind::Appendix);
    page.color(HEADING_COLOR);
    let heading_y = CONTENT_TOP - HEADING_SIZE;
    page.centered(Font::Bold, HEADING_SIZE, heading_y, APPENDIX_HEADING);
    page.color(TEXT_COLOR);
    let mut y = heading_y - 36.0;

    for (i, paragraph) in paragraphs(narrative).iter().enumerate() {
        if i > 0 {
            y -= leading * 0.5;
        }
        for line in wrap_text(paragraph, Font::Regular, APPENDIX_SIZE, CONTENT_WIDTH) {
            if y < CONTENT_BOTTOM {
                let next = PageDraft::new(PageKind::Appendix);
                finished.push(std::mem::replace(&mut page, next));
                page.color(TEXT_COLOR);
                y = CONTENT_TOP - APPENDIX_SIZE;
            }
            page.text(Font::Regular, APPENDIX_SIZE, MARGIN, y, &line);
            y -= leading;
        }
    }

    finished.push(page);
    finished
}

// =============================================================================
// Finalization
// =============================================================================

fn finalize(title: &str, mut drafts: Vec<PageDraft>) -> Result<RenderedDocument, AssemblyError> {
    let total = drafts.len();
    let kinds: Vec<PageKind> = drafts.iter().map(|d| d.kind).collect();
    let first_index = |kind: PageKind| kinds.iter().position(|k| *k == kind);

    let mut contents = Vec::new();
    for (index, draft) in drafts.iter_mut().enumerate() {
        let number = index + 1;

        let mut resolved = Vec::with_capacity(draft.links.len());
        for link in &draft.links {
            let target = first_index(link.target).ok_or_else(|| {
                AssemblyError::Content(format!("contents entry '{}' has no page", link.label))
            })?;
            resolved.push((link.y, link.size, target + 1));
            contents.push(TocEntry {
                label: link.label.clone(),
                target: link.target,
                page_number: target + 1,
            });
        }
        for (y, size, page_number) in resolved {
            draft.right_aligned(Font::Regular, size, y, &page_number.to_string());
        }

        draft.color(TEXT_COLOR);
        draft.centered(
            Font::Regular,
            FOOTER_SIZE,
            FOOTER_Y,
            &format!("Page {} of {}", number, total),
        );
        if number == total {
            draft.centered(Font::Oblique, FOOTER_SIZE, CLOSING_Y, CLOSING_ATTRIBUTION);
        }
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for font in Font::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource_name(), font_id);
    }

    let page_ids: Vec<ObjectId> = (0..total).map(|_| doc.new_object_id()).collect();

    for (index, draft) in drafts.into_iter().enumerate() {
        let mut xobjects = Dictionary::new();
        for placed in draft.images {
            let image_id = doc.add_object(image_stream(placed.image));
            xobjects.set(placed.name, image_id);
        }

        let mut annots = Vec::with_capacity(draft.links.len());
        for link in &draft.links {
            let target = first_index(link.target).ok_or_else(|| {
                AssemblyError::Content(format!("contents entry '{}' has no page", link.label))
            })?;
            let annot_id = doc.add_object(dictionary! {
                "Type" => "Annot",
                "Subtype" => "Link",
                "Rect" => vec![
                    MARGIN.into(),
                    (link.y - link.size * 0.3).into(),
                    (PAGE_WIDTH - MARGIN).into(),
                    (link.y + link.size).into(),
                ],
                "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
                "Dest" => vec![
                    Object::Reference(page_ids[target]),
                    "XYZ".into(),
                    Object::Null,
                    Object::Null,
                    Object::Null,
                ],
            });
            annots.push(Object::Reference(annot_id));
        }

        let content = Content {
            operations: draft.ops,
        }
        .encode()
        .map_err(|e| AssemblyError::Content(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => fonts.clone(),
                "XObject" => xobjects,
            },
        };
        if !annots.is_empty() {
            page.set("Annots", annots);
        }
        doc.objects.insert(page_ids[index], Object::Dictionary(page));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
            "Count" => total as i64,
            "MediaBox" => vec![0f32.into(), 0f32.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(encode_win_ansi(title), StringFormat::Literal),
        "Producer" => Object::string_literal("storybook-engine"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| AssemblyError::Write(std::io::Error::other(e.to_string())))?;

    let pages = kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| PageInfo { number: i + 1, kind })
        .collect();

    Ok(RenderedDocument {
        bytes,
        pages,
        contents,
    })
}

fn image_stream(image: RasterImage) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        image.rgb,
    )
}
