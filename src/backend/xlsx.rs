//! XLSX backend: cell values via `calamine`, embedded pictures via the
//! package's drawing parts.
//!
//! Each worksheet is one page holding a section header, the used cell range
//! as a table, and any pictures anchored on the sheet.

use crate::backend::{ooxml, BackendCapabilities, ConversionResult, DocumentBackend};
use crate::config::PipelineOptions;
use crate::document::{DocItem, PageInfo, PictureItem, Provenance, StructuredDocument, TableItem};
use crate::error::{Doc2MdError, PageError};
use crate::format::InputFormat;
use calamine::{open_workbook, Data, DataType, Range, Reader as _, Xlsx};
use image::DynamicImage;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

const WORKBOOK_PART: &str = "xl/workbook.xml";

/// Backend for `.xlsx` files.
#[derive(Debug, Default)]
pub struct XlsxBackend;

impl XlsxBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentBackend for XlsxBackend {
    fn name(&self) -> &'static str {
        "xlsx"
    }

    fn formats(&self) -> &[InputFormat] {
        &[InputFormat::Xlsx]
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
        let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e| Doc2MdError::CorruptDocument {
            path: path.to_path_buf(),
            detail: format!("{e}"),
        })?;

        let sheet_names = workbook.sheet_names();
        info!("XLSX: {} sheets", sheet_names.len());

        let mut pictures = sheet_pictures(path, options.generate_picture_images);

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut doc = StructuredDocument::new(stem, InputFormat::Xlsx);
        let mut errors = Vec::new();

        for (idx, name) in sheet_names.iter().enumerate() {
            let page_no = idx as u32 + 1;
            let range = match workbook.worksheet_range(name) {
                Ok(range) => range,
                Err(e) => {
                    warn!("Sheet '{}' skipped: {}", name, e);
                    errors.push(PageError::LoadFailed {
                        page: page_no as usize,
                        detail: format!("sheet '{name}': {e}"),
                    });
                    continue;
                }
            };

            let prov = Some(Provenance::page(page_no));
            doc.add_page(PageInfo::logical(page_no));
            doc.push(DocItem::SectionHeader {
                text: format!("sheet: {name}"),
                level: 1,
                prov,
            });

            let cells = used_cells(&range);
            debug!("Sheet '{}': {} non-empty rows", name, cells.len());
            if !cells.is_empty() {
                doc.push(DocItem::Table(TableItem {
                    cells,
                    prov,
                    ..Default::default()
                }));
            }

            for image in pictures.remove(name).unwrap_or_default() {
                doc.push(DocItem::Picture(PictureItem {
                    prov,
                    image,
                    ..Default::default()
                }));
            }
        }

        Ok(ConversionResult::from_document(doc, errors, self.name()))
    }
}

/// Cell text with empty rows removed and empty edge columns trimmed.
fn used_cells(range: &Range<Data>) -> Vec<Vec<String>> {
    let rows: Vec<Vec<String>> = range
        .rows()
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .map(|row| row.iter().map(|c| c.to_string().trim().to_string()).collect())
        .collect();

    let used = |col: usize| rows.iter().any(|r| r.get(col).is_some_and(|c| !c.is_empty()));
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let Some(first) = (0..width).find(|&c| used(c)) else {
        return Vec::new();
    };
    let last = (0..width).rev().find(|&c| used(c)).unwrap_or(first);

    rows.iter()
        .map(|r| (first..=last).map(|c| r.get(c).cloned().unwrap_or_default()).collect())
        .collect()
}

/// Sheet name → pictures in drawing order.
///
/// Every anchored picture yields an entry; it is `None` when images are not
/// loaded or the media cannot be decoded (EMF, WMF).
fn sheet_pictures(path: &Path, load_images: bool) -> HashMap<String, Vec<Option<DynamicImage>>> {
    let mut out = HashMap::new();
    let Ok(mut archive) = ooxml::open_package(path) else {
        return out;
    };
    let Some(workbook) = ooxml::read_part(&mut archive, WORKBOOK_PART) else {
        return out;
    };
    let workbook_rels = ooxml::relationships(&mut archive, WORKBOOK_PART);

    for (name, rel_id) in sheet_entries(&workbook) {
        let Some(sheet) = workbook_rels.get(&rel_id) else {
            continue;
        };
        let Some(sheet_xml) = ooxml::read_part(&mut archive, &sheet.target) else {
            continue;
        };
        let sheet_rels = ooxml::relationships(&mut archive, &sheet.target);
        let mut images = Vec::new();

        for drawing in drawing_ids(&sheet_xml)
            .iter()
            .filter_map(|id| sheet_rels.get(id))
            .filter(|r| r.rel_type.ends_with("/drawing"))
        {
            let Some(xml) = ooxml::read_part(&mut archive, &drawing.target) else {
                continue;
            };
            let drawing_rels = ooxml::relationships(&mut archive, &drawing.target);
            for embed in blip_embeds(&xml) {
                let image = if load_images {
                    let image = drawing_rels
                        .get(&embed)
                        .and_then(|rel| ooxml::load_image(&mut archive, &rel.target));
                    if image.is_none() {
                        debug!("Sheet '{}': picture '{}' not decodable", name, embed);
                    }
                    image
                } else {
                    None
                };
                images.push(image);
            }
        }

        if !images.is_empty() {
            out.insert(name, images);
        }
    }

    out
}

/// `r:id` of every `<drawing>` in a worksheet part, in document order.
fn drawing_ids(sheet: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(sheet);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"drawing" => {
                ids.extend(ooxml::attr(&e, &reader, b"r:id"));
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    ids
}

/// `(name, r:id)` of every `<sheet>` in the workbook part.
fn sheet_entries(workbook: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut reader = Reader::from_str(workbook);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"sheet" => {
                if let (Some(name), Some(id)) = (
                    ooxml::attr(&e, &reader, b"name"),
                    ooxml::attr(&e, &reader, b"r:id"),
                ) {
                    entries.push((name, id));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    entries
}

fn blip_embeds(drawing: &str) -> Vec<String> {
    let mut embeds = Vec::new();
    let mut reader = Reader::from_str(drawing);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"a:blip" => {
                embeds.extend(ooxml::attr(&e, &reader, b"r:embed"));
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    embeds
}
