//! PPTX backend: PresentationML via `zip` + `quick-xml`.
//!
//! Each slide is one page. Slides are taken in presentation order
//! (`p:sldIdLst`), falling back to `slideN.xml` numbering when the
//! presentation part has no list. A slide whose XML cannot be parsed is
//! recorded as a [`PageError`] and the remaining slides still convert.

use crate::backend::{ooxml, BackendCapabilities, ConversionResult, DocumentBackend};
use crate::config::PipelineOptions;
use crate::document::{DocItem, PageInfo, PictureItem, Provenance, StructuredDocument, TableItem};
use crate::error::{Doc2MdError, PageError};
use crate::format::InputFormat;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const EMU_PER_POINT: f32 = 12_700.0;

static RE_SLIDE_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());

/// Backend for `.pptx` files.
#[derive(Debug, Default)]
pub struct PptxBackend;

impl PptxBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentBackend for PptxBackend {
    fn name(&self) -> &'static str {
        "pptx"
    }

    fn formats(&self) -> &[InputFormat] {
        &[InputFormat::Pptx]
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            table_structure: true,
            keyed_image_export: true,
            ..Default::default()
        }
    }

    fn convert(
        &self,
        path: &Path,
        options: &PipelineOptions,
    ) -> Result<ConversionResult, Doc2MdError> {
        let mut archive = ooxml::open_package(path)?;
        let presentation = ooxml::read_part(&mut archive, PRESENTATION_PART).ok_or_else(|| {
            Doc2MdError::CorruptDocument {
                path: path.to_path_buf(),
                detail: format!("missing part '{PRESENTATION_PART}'"),
            }
        })?;

        let (width, height) = slide_size(&presentation).unwrap_or((0.0, 0.0));
        let slides = slide_parts(&mut archive, &presentation);
        info!("PPTX: {} slides", slides.len());

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut doc = StructuredDocument::new(stem, InputFormat::Pptx);
        let mut errors = Vec::new();

        for (idx, part) in slides.iter().enumerate() {
            let page_no = idx as u32 + 1;
            let parsed = ooxml::read_part(&mut archive, part)
                .ok_or_else(|| format!("missing part '{part}'"))
                .and_then(|xml| parse_slide(&xml, page_no));

            let blocks = match parsed {
                Ok(blocks) => blocks,
                Err(detail) => {
                    warn!("Slide {} skipped: {}", page_no, detail);
                    errors.push(PageError::LoadFailed {
                        page: page_no as usize,
                        detail,
                    });
                    continue;
                }
            };

            doc.add_page(PageInfo::new(page_no, width, height));
            let rels = ooxml::relationships(&mut archive, part);
            for block in blocks {
                match block {
                    SlideBlock::Item(item) => doc.push(item),
                    SlideBlock::Image(rel_id) => {
                        let image = if options.generate_picture_images {
                            rels.get(&rel_id)
                                .and_then(|rel| ooxml::load_image(&mut archive, &rel.target))
                        } else {
                            None
                        };
                        doc.push(DocItem::Picture(PictureItem {
                            prov: Some(Provenance::page(page_no)),
                            image,
                            ..Default::default()
                        }));
                    }
                }
            }
        }

        Ok(ConversionResult::from_document(doc, errors, self.name()))
    }
}

/// `p:sldSz` in points.
fn slide_size(presentation: &str) -> Option<(f32, f32)> {
    let mut reader = Reader::from_str(presentation);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"p:sldSz" => {
                let cx: f32 = ooxml::attr(&e, &reader, b"cx")?.parse().ok()?;
                let cy: f32 = ooxml::attr(&e, &reader, b"cy")?.parse().ok()?;
                return Some((cx / EMU_PER_POINT, cy / EMU_PER_POINT));
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

/// Slide part names in presentation order.
fn slide_parts<R: Read + Seek>(archive: &mut ZipArchive<R>, presentation: &str) -> Vec<String> {
    let rels = ooxml::relationships(archive, PRESENTATION_PART);

    let mut ordered = Vec::new();
    let mut reader = Reader::from_str(presentation);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"p:sldId" => {
                if let Some(rel) = ooxml::attr(&e, &reader, b"r:id").and_then(|id| rels.get(&id)) {
                    ordered.push(rel.target.clone());
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    if !ordered.is_empty() {
        return ordered;
    }

    debug!("No slide list in presentation part; ordering slides by file name");
    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = RE_SLIDE_PART.captures(name)?[1].parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    numbered.sort_unstable();
    numbered.into_iter().map(|(_, name)| name).collect()
}

#[derive(Debug)]
enum SlideBlock {
    Item(DocItem),
    Image(String),
}

#[derive(Default)]
struct SlideParser {
    page_no: u32,
    blocks: Vec<SlideBlock>,
    placeholder: Option<String>,
    para: Option<String>,
    list: Option<bool>,
    level: u8,
    in_text: bool,
    in_picture: bool,
    table_depth: u32,
    rows: Vec<Vec<String>>,
    cell: Option<String>,
}

fn parse_slide(xml: &str, page_no: u32) -> Result<Vec<SlideBlock>, String> {
    let mut parser = SlideParser {
        page_no,
        ..Default::default()
    };
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                parser.start(&e);
                parser.attributes(&e, &reader);
            }
            Ok(Event::Empty(e)) => parser.attributes(&e, &reader),
            Ok(Event::Text(e)) if parser.in_text => {
                if let (Ok(text), Some(para)) = (e.unescape(), parser.para.as_mut()) {
                    para.push_str(&text);
                }
            }
            Ok(Event::End(e)) => parser.end(e.name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML error: {e}")),
            _ => {}
        }
        buf.clear();
    }

    Ok(parser.blocks)
}

impl SlideParser {
    fn prov(&self) -> Option<Provenance> {
        Some(Provenance::page(self.page_no))
    }

    fn start(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"p:sp" => self.placeholder = None,
            b"p:pic" => self.in_picture = true,
            b"a:p" => {
                self.para = Some(String::new());
                self.list = None;
                self.level = 0;
            }
            b"a:t" => self.in_text = true,
            b"a:tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.rows.clear();
                }
            }
            b"a:tr" if self.table_depth == 1 => self.rows.push(Vec::new()),
            b"a:tc" if self.table_depth == 1 => self.cell = Some(String::new()),
            _ => {}
        }
    }

    fn attributes(&mut self, e: &BytesStart<'_>, reader: &Reader<&[u8]>) {
        match e.name().as_ref() {
            b"p:ph" => {
                self.placeholder =
                    Some(ooxml::attr(e, reader, b"type").unwrap_or_else(|| "body".into()));
            }
            b"a:pPr" => {
                self.level = ooxml::attr(e, reader, b"lvl")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
            }
            b"a:buChar" => self.list = Some(false),
            b"a:buAutoNum" => self.list = Some(true),
            b"a:buNone" => self.list = None,
            b"a:br" => {
                if let Some(para) = self.para.as_mut() {
                    para.push(' ');
                }
            }
            b"a:blip" if self.in_picture => {
                if let Some(id) = ooxml::attr(e, reader, b"r:embed") {
                    self.blocks.push(SlideBlock::Image(id));
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"a:t" => self.in_text = false,
            b"p:pic" => self.in_picture = false,
            b"p:sp" => self.placeholder = None,
            b"a:p" => {
                if let Some(text) = self.para.take() {
                    self.finish_paragraph(text.trim());
                }
            }
            b"a:tc" if self.table_depth == 1 => {
                if let (Some(cell), Some(row)) = (self.cell.take(), self.rows.last_mut()) {
                    row.push(cell);
                }
            }
            b"a:tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                if self.table_depth == 0 {
                    let cells = std::mem::take(&mut self.rows);
                    self.blocks.push(SlideBlock::Item(DocItem::Table(TableItem {
                        cells,
                        prov: self.prov(),
                        ..Default::default()
                    })));
                }
            }
            _ => {}
        }
    }

    fn finish_paragraph(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.table_depth > 0 {
            if let Some(cell) = self.cell.as_mut() {
                if !cell.is_empty() {
                    cell.push(' ');
                }
                cell.push_str(text);
            }
            return;
        }

        let text = text.to_string();
        let prov = self.prov();
        let item = match (self.placeholder.as_deref(), self.list) {
            (Some("ctrTitle"), _) => DocItem::Title { text, prov },
            (Some("title"), _) => DocItem::SectionHeader {
                text,
                level: 1,
                prov,
            },
            (Some("ftr" | "sldNum" | "dt"), _) => DocItem::PageFooter { text, prov },
            (Some("hdr"), _) => DocItem::PageHeader { text, prov },
            (_, Some(ordered)) => DocItem::ListItem {
                text,
                ordered,
                level: self.level,
                prov,
            },
            // Body placeholders are bulleted by the slide master.
            (Some("body"), None) => DocItem::ListItem {
                text,
                ordered: false,
                level: self.level,
                prov,
            },
            _ => DocItem::Paragraph { text, prov },
        };
        self.blocks.push(SlideBlock::Item(item));
    }
}
