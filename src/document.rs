//! The structured document produced by every backend.
//!
//! A [`StructuredDocument`] is a flat list of [`DocItem`]s in reading order
//! plus per-page geometry. Keeping the list flat (rather than a tree) makes
//! reading order the only ordering there is: the image extractor and the
//! Markdown exporter both walk `items` front to back, so element *i* is
//! element *i* in both traversals.
//!
//! Tables and pictures expose their raster through
//! [`StructuredDocument::element_image`]: an image the backend attached
//! directly (DOCX media, PDF image objects) wins; otherwise the element's
//! bounding box is cropped out of the page raster.

use crate::format::InputFormat;
use image::DynamicImage;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Axis-aligned box in page points, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Convert PDF user-space bounds (origin bottom-left, y up) on a page
    /// `page_height` points tall.
    pub fn from_bottom_left(left: f32, bottom: f32, right: f32, top: f32, page_height: f32) -> Self {
        Self::new(left, page_height - top, right, page_height - bottom)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Where an element came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Provenance {
    /// 1-indexed page (slide, sheet) number.
    pub page_no: u32,
    /// Location on the page, when the backend knows it.
    pub bbox: Option<BoundingBox>,
}

impl Provenance {
    pub fn page(page_no: u32) -> Self {
        Self {
            page_no,
            bbox: None,
        }
    }

    pub fn region(page_no: u32, bbox: BoundingBox) -> Self {
        Self {
            page_no,
            bbox: Some(bbox),
        }
    }
}

/// A page rendered at `scale` × its size in points.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub scale: f32,
    pub image: DynamicImage,
}

/// Geometry (and optional raster) of one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    pub page_no: u32,
    /// Width in points (0 for formats without physical pages).
    pub width: f32,
    /// Height in points (0 for formats without physical pages).
    pub height: f32,
    #[serde(skip)]
    pub image: Option<PageImage>,
}

impl PageInfo {
    pub fn new(page_no: u32, width: f32, height: f32) -> Self {
        Self {
            page_no,
            width,
            height,
            image: None,
        }
    }

    /// A page without physical dimensions (slide, sheet, flowing text).
    pub fn logical(page_no: u32) -> Self {
        Self::new(page_no, 0.0, 0.0)
    }

    pub fn with_image(mut self, scale: f32, image: DynamicImage) -> Self {
        self.image = Some(PageImage { scale, image });
        self
    }
}

/// The two element kinds that produce image files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Table,
    Picture,
}

impl ImageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Table => "table",
            ImageKind::Picture => "picture",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table: cell text grid plus an optional raster.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableItem {
    /// Row-major cell text; the first row is treated as the header.
    pub cells: Vec<Vec<String>>,
    pub caption: Option<String>,
    pub prov: Option<Provenance>,
    /// Raster attached directly by the backend.
    #[serde(skip)]
    pub image: Option<DynamicImage>,
}

/// A picture: optional caption and raster.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PictureItem {
    pub caption: Option<String>,
    pub prov: Option<Provenance>,
    /// Raster attached directly by the backend.
    #[serde(skip)]
    pub image: Option<DynamicImage>,
}

/// One content element.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocItem {
    Title {
        text: String,
        prov: Option<Provenance>,
    },
    SectionHeader {
        text: String,
        /// 1 = top-level section.
        level: u8,
        prov: Option<Provenance>,
    },
    Paragraph {
        text: String,
        prov: Option<Provenance>,
    },
    ListItem {
        text: String,
        ordered: bool,
        /// Nesting depth, 0 = outermost.
        level: u8,
        prov: Option<Provenance>,
    },
    Code {
        text: String,
        language: Option<String>,
        prov: Option<Provenance>,
    },
    Formula {
        text: String,
        prov: Option<Provenance>,
    },
    Table(TableItem),
    Picture(PictureItem),
    PageHeader {
        text: String,
        prov: Option<Provenance>,
    },
    PageFooter {
        text: String,
        prov: Option<Provenance>,
    },
}

impl DocItem {
    pub fn paragraph(text: impl Into<String>, page_no: u32) -> Self {
        DocItem::Paragraph {
            text: text.into(),
            prov: Some(Provenance::page(page_no)),
        }
    }

    /// `Some` for the element kinds that are written out as image files.
    pub fn image_kind(&self) -> Option<ImageKind> {
        match self {
            DocItem::Table(_) => Some(ImageKind::Table),
            DocItem::Picture(_) => Some(ImageKind::Picture),
            _ => None,
        }
    }

    pub fn prov(&self) -> Option<&Provenance> {
        match self {
            DocItem::Title { prov, .. }
            | DocItem::SectionHeader { prov, .. }
            | DocItem::Paragraph { prov, .. }
            | DocItem::ListItem { prov, .. }
            | DocItem::Code { prov, .. }
            | DocItem::Formula { prov, .. }
            | DocItem::PageHeader { prov, .. }
            | DocItem::PageFooter { prov, .. } => prov.as_ref(),
            DocItem::Table(t) => t.prov.as_ref(),
            DocItem::Picture(p) => p.prov.as_ref(),
        }
    }

    pub fn page_no(&self) -> Option<u32> {
        self.prov().map(|p| p.page_no)
    }

    /// Page headers and footers; not part of the body text.
    pub fn is_furniture(&self) -> bool {
        matches!(self, DocItem::PageHeader { .. } | DocItem::PageFooter { .. })
    }
}

/// The full result of parsing one input file.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredDocument {
    /// Source stem, used as the document name.
    pub name: String,
    pub format: InputFormat,
    pub pages: BTreeMap<u32, PageInfo>,
    /// Elements in reading order.
    pub items: Vec<DocItem>,
}

impl StructuredDocument {
    pub fn new(name: impl Into<String>, format: InputFormat) -> Self {
        Self {
            name: name.into(),
            format,
            pages: BTreeMap::new(),
            items: Vec::new(),
        }
    }

    pub fn add_page(&mut self, page: PageInfo) {
        self.pages.insert(page.page_no, page);
    }

    pub fn push(&mut self, item: DocItem) {
        self.items.push(item);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Elements in reading order with their index in `items`.
    pub fn iterate_items(&self) -> impl Iterator<Item = (usize, &DocItem)> {
        self.items.iter().enumerate()
    }

    /// Number of elements of the given image kind.
    pub fn count(&self, kind: ImageKind) -> usize {
        self.items
            .iter()
            .filter(|item| item.image_kind() == Some(kind))
            .count()
    }

    /// Whether [`Self::element_image`] has a source to work from.
    pub fn has_element_image(&self, item: &DocItem) -> bool {
        let (attached, prov) = match item {
            DocItem::Table(t) => (t.image.is_some(), t.prov.as_ref()),
            DocItem::Picture(p) => (p.image.is_some(), p.prov.as_ref()),
            _ => return false,
        };
        attached
            || prov.is_some_and(|p| {
                p.bbox.is_some()
                    && self
                        .pages
                        .get(&p.page_no)
                        .is_some_and(|page| page.image.is_some())
            })
    }

    /// The raster for a table or picture, or `None` if there is none.
    pub fn element_image(&self, item: &DocItem) -> Option<DynamicImage> {
        let (attached, prov) = match item {
            DocItem::Table(t) => (t.image.as_ref(), t.prov.as_ref()),
            DocItem::Picture(p) => (p.image.as_ref(), p.prov.as_ref()),
            _ => return None,
        };

        if let Some(image) = attached {
            return Some(image.clone());
        }

        let prov = prov?;
        let bbox = prov.bbox?;
        let raster = self.pages.get(&prov.page_no)?.image.as_ref()?;
        crop_region(&raster.image, bbox, raster.scale)
    }
}

/// Cut `bbox` (in points) out of an image rendered at `scale`.
///
/// The box is clamped to the image; an empty intersection yields `None`.
pub fn crop_region(image: &DynamicImage, bbox: BoundingBox, scale: f32) -> Option<DynamicImage> {
    let (w, h) = (image.width() as f32, image.height() as f32);

    let left = (bbox.left * scale).floor().clamp(0.0, w) as u32;
    let top = (bbox.top * scale).floor().clamp(0.0, h) as u32;
    let right = (bbox.right * scale).ceil().clamp(0.0, w) as u32;
    let bottom = (bbox.bottom * scale).ceil().clamp(0.0, h) as u32;

    if right <= left || bottom <= top {
        return None;
    }

    Some(image.crop_imm(left, top, right - left, bottom - top))
}
