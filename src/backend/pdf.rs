//! PDF backend on top of pdfium.
//!
//! Per page: the text layer becomes paragraphs and embedded image objects
//! become pictures. A page holding pictures is rendered at `images_scale`
//! and each picture is cropped out of that raster by its bounds, so soft
//! masks and transforms look as they do on the page. The raster is dropped
//! once the page is done; text-only pages are never rendered.
//!
//! pdfium has no layout analysis, so reading order is "page text, then page
//! images". A page with no text layer at all (a scan) and no image objects
//! is kept as one full-page picture holding the page raster.
//!
//! All calls are blocking; the pipeline runs `convert` in `spawn_blocking`.

use crate::backend::{BackendCapabilities, ConversionResult, DocumentBackend};
use crate::config::PipelineOptions;
use crate::document::{
    crop_region, BoundingBox, DocItem, PageImage, PageInfo, PictureItem, Provenance,
    StructuredDocument,
};
use crate::error::{Doc2MdError, PageError};
use crate::format::InputFormat;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Longest rendered edge in pixels, whatever the scale.
pub const MAX_RENDER_EDGE: u32 = 8000;

static RE_BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

/// Bind to pdfium: `PDFIUM_LIB_PATH`, then `./`, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, Doc2MdError> {
    let bindings = match std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        Some(configured) => {
            let configured = PathBuf::from(configured);
            let library = if configured.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&configured)
            } else {
                configured
            };
            debug!("Binding pdfium from {}", library.display());
            Pdfium::bind_to_library(&library)
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Doc2MdError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Backend for `.pdf` files.
#[derive(Debug)]
pub struct PdfiumBackend {
    max_render_edge: u32,
}

impl Default for PdfiumBackend {
    fn default() -> Self {
        Self {
            max_render_edge: MAX_RENDER_EDGE,
        }
    }
}

impl PdfiumBackend {
    /// Check that pdfium can be bound, then return the backend.
    pub fn probe() -> Result<Self, Doc2MdError> {
        bind_pdfium()?;
        info!("pdfium library bound");
        Ok(Self::default())
    }

    pub fn with_max_render_edge(mut self, px: u32) -> Self {
        self.max_render_edge = px.max(100);
        self
    }
}

impl DocumentBackend for PdfiumBackend {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn formats(&self) -> &[InputFormat] {
        &[InputFormat::Pdf]
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            page_images: true,
            keyed_image_export: true,
            ..Default::default()
        }
    }

    fn convert(
        &self,
        path: &Path,
        options: &PipelineOptions,
    ) -> Result<ConversionResult, Doc2MdError> {
        let pdfium = bind_pdfium()?;
        let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
            let detail = format!("{e:?}");
            Doc2MdError::CorruptDocument {
                path: path.to_path_buf(),
                detail: if detail.to_lowercase().contains("password") {
                    "document is password protected".to_string()
                } else {
                    detail
                },
            }
        })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut doc = StructuredDocument::new(stem, InputFormat::Pdf);
        let mut errors = Vec::new();

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(options.images_scale)
            .set_maximum_width(self.max_render_edge as i32)
            .set_maximum_height(self.max_render_edge as i32);

        for (index, page) in pages.iter().enumerate() {
            let page_no = index as u32 + 1;
            if let Err(e) =
                self.convert_page(&document, &page, page_no, options, &render_config, &mut doc)
            {
                warn!("{}", e);
                errors.push(e);
            }
        }

        Ok(ConversionResult::from_document(doc, errors, self.name()))
    }
}

impl PdfiumBackend {
    fn convert_page(
        &self,
        document: &PdfDocument<'_>,
        page: &PdfPage<'_>,
        page_no: u32,
        options: &PipelineOptions,
        render_config: &PdfRenderConfig,
        doc: &mut StructuredDocument,
    ) -> Result<(), PageError> {
        let width = page.width().value;
        let height = page.height().value;

        let text = page
            .text()
            .map(|t| t.all())
            .map_err(|e| PageError::TextFailed {
                page: page_no as usize,
                detail: format!("{e:?}"),
            })?;
        let paragraphs = paragraphs(&text);
        let has_text = !paragraphs.is_empty();

        let objects = page.objects();
        let image_objects = objects
            .iter()
            .filter(|o| o.as_image_object().is_some())
            .count();

        // Only lives while this page is processed; pictures keep their crops.
        let raster = if wants_raster(options, image_objects, has_text) {
            Some(self.render_page(page, page_no, width, options, render_config)?)
        } else {
            None
        };

        doc.add_page(PageInfo::new(page_no, width, height));

        let prov = Some(Provenance::page(page_no));
        for paragraph in paragraphs {
            doc.push(DocItem::Paragraph {
                text: paragraph,
                prov,
            });
        }

        for object in objects.iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };
            let bbox = object.bounds().ok().map(|q| {
                BoundingBox::from_bottom_left(
                    q.left().value,
                    q.bottom().value,
                    q.right().value,
                    q.top().value,
                    height,
                )
            });
            let image = if options.generate_picture_images {
                bbox.zip(raster.as_ref())
                    .and_then(|(bbox, raster)| crop_region(&raster.image, bbox, raster.scale))
                    .or_else(|| match image_object.get_processed_image(document) {
                        Ok(image) => Some(image),
                        Err(e) => {
                            debug!("Page {}: image object not decodable: {:?}", page_no, e);
                            None
                        }
                    })
            } else {
                None
            };
            doc.push(DocItem::Picture(PictureItem {
                prov: Some(match bbox {
                    Some(bbox) => Provenance::region(page_no, bbox),
                    None => Provenance::page(page_no),
                }),
                image,
                ..Default::default()
            }));
        }

        if is_scan(options, image_objects, has_text) {
            warn!(
                "Page {} has no text layer; OCR is not available, keeping the page as an image",
                page_no
            );
            doc.push(DocItem::Picture(PictureItem {
                prov: Some(Provenance::region(
                    page_no,
                    BoundingBox::new(0.0, 0.0, width, height),
                )),
                image: raster.map(|r| r.image),
                ..Default::default()
            }));
        }

        Ok(())
    }

    fn render_page(
        &self,
        page: &PdfPage<'_>,
        page_no: u32,
        width: f32,
        options: &PipelineOptions,
        render_config: &PdfRenderConfig,
    ) -> Result<PageImage, PageError> {
        let bitmap = page
            .render_with_config(render_config)
            .map_err(|e| PageError::RenderFailed {
                page: page_no as usize,
                detail: format!("{e:?}"),
            })?;
        let image = bitmap.as_image();
        // The edge cap can lower the effective scale.
        let scale = if width > 0.0 {
            image.width() as f32 / width
        } else {
            options.images_scale
        };
        debug!(
            "Rendered page {} → {}x{} px (scale {:.2})",
            page_no,
            image.width(),
            image.height(),
            scale
        );
        Ok(PageImage { scale, image })
    }
}

/// A text-less page without image objects is kept whole as a picture.
fn is_scan(options: &PipelineOptions, image_objects: usize, has_text: bool) -> bool {
    !has_text && image_objects == 0 && options.ocr.enabled
}

/// Whether a page has anything to crop out of its raster.
fn wants_raster(options: &PipelineOptions, image_objects: usize, has_text: bool) -> bool {
    options.generate_picture_images && (image_objects > 0 || is_scan(options, image_objects, has_text))
}

/// Split a page's text layer into paragraphs.
///
/// Paragraphs are separated by blank lines; lines inside a paragraph are
/// joined with a space, and a trailing hyphen joins the word halves.
fn paragraphs(text: &str) -> Vec<String> {
    let normalised = text.replace("\r\n", "\n").replace('\r', "\n");
    RE_BLANK_LINE
        .split(&normalised)
        .filter_map(|block| {
            let mut paragraph = String::new();
            for line in block.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if paragraph.ends_with('-') {
                    paragraph.pop();
                } else if !paragraph.is_empty() {
                    paragraph.push(' ');
                }
                paragraph.push_str(line);
            }
            (!paragraph.is_empty()).then_some(paragraph)
        })
        .collect()
}
