//! DOCX backend: WordprocessingML via `zip` + `quick-xml`.
//!
//! The body of `word/document.xml` is walked once in document order.
//! Paragraph styles are resolved through `word/styles.xml` so localised
//! style ids still map to Title / Heading N / Caption / Code; list kind
//! (bullet vs numbered) comes from `word/numbering.xml`.
//!
//! DOCX has no physical pages: everything lives on logical page 1.

use crate::backend::{ooxml, BackendCapabilities, ConversionResult, DocumentBackend};
use crate::config::PipelineOptions;
use crate::document::{DocItem, PageInfo, PictureItem, Provenance, StructuredDocument, TableItem};
use crate::error::Doc2MdError;
use crate::format::InputFormat;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

const MAIN_PART: &str = "word/document.xml";
const PAGE: u32 = 1;

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^heading\s*([1-9])$").unwrap());
static RE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(code|source\s*code|html\s*preformatted|plain\s*text)$").unwrap());

/// Backend for `.docx` files.
#[derive(Debug, Default)]
pub struct DocxBackend;

impl DocxBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentBackend for DocxBackend {
    fn name(&self) -> &'static str {
        "docx"
    }

    fn formats(&self) -> &[InputFormat] {
        &[InputFormat::Docx]
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            table_structure: true,
            code_enrichment: true,
            formula_enrichment: true,
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
        let xml = ooxml::read_part(&mut archive, MAIN_PART).ok_or_else(|| {
            Doc2MdError::CorruptDocument {
                path: path.to_path_buf(),
                detail: format!("missing part '{MAIN_PART}'"),
            }
        })?;

        let styles = ooxml::read_part(&mut archive, "word/styles.xml")
            .map(|x| parse_styles(&x))
            .unwrap_or_default();
        let numbering = ooxml::read_part(&mut archive, "word/numbering.xml")
            .map(|x| Numbering::parse(&x))
            .unwrap_or_default();
        let rels = ooxml::relationships(&mut archive, MAIN_PART);

        let blocks =
            parse_body(&xml, &styles, &numbering, options).map_err(|detail| {
                Doc2MdError::CorruptDocument {
                    path: path.to_path_buf(),
                    detail,
                }
            })?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut doc = StructuredDocument::new(stem, InputFormat::Docx);
        doc.add_page(PageInfo::logical(PAGE));

        for block in blocks {
            match block {
                Block::Item(item) => doc.push(item),
                Block::Image(rel_id) => {
                    let image = if options.generate_picture_images {
                        match rels.get(&rel_id) {
                            Some(rel) => ooxml::load_image(&mut archive, &rel.target),
                            None => {
                                debug!("Picture references unknown relationship '{}'", rel_id);
                                None
                            }
                        }
                    } else {
                        None
                    };
                    doc.push(DocItem::Picture(PictureItem {
                        prov: Some(Provenance::page(PAGE)),
                        image,
                        ..Default::default()
                    }));
                }
                Block::Caption(text) => attach_caption(&mut doc, text),
            }
        }

        info!("DOCX parsed: {} elements", doc.items.len());
        Ok(ConversionResult::from_document(doc, Vec::new(), self.name()))
    }
}

/// Captions bind to the table or picture right before them.
fn attach_caption(doc: &mut StructuredDocument, text: String) {
    let slot = match doc.items.last_mut() {
        Some(DocItem::Picture(p)) => &mut p.caption,
        Some(DocItem::Table(t)) => &mut t.caption,
        _ => {
            doc.push(DocItem::paragraph(text, PAGE));
            return;
        }
    };
    if slot.is_none() {
        *slot = Some(text);
    } else {
        doc.push(DocItem::paragraph(text, PAGE));
    }
}

#[derive(Debug)]
enum Block {
    Item(DocItem),
    /// Picture by relationship id, resolved against the package later.
    Image(String),
    Caption(String),
}

/// Style id → display name (`Heading1` → `heading 1`).
fn parse_styles(xml: &str) -> HashMap<String, String> {
    let mut styles = HashMap::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:style" => {
                current = ooxml::attr(&e, &reader, b"w:styleId");
            }
            Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"w:name" => {
                if let (Some(id), Some(name)) = (&current, ooxml::attr(&e, &reader, b"w:val")) {
                    styles.insert(id.clone(), name);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:style" => current = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    styles
}

/// Resolved list formats from `word/numbering.xml`.
#[derive(Debug, Default)]
struct Numbering {
    /// abstractNumId → (ilvl → numFmt)
    formats: HashMap<String, HashMap<u8, String>>,
    /// numId → abstractNumId
    nums: HashMap<String, String>,
}

impl Numbering {
    fn parse(xml: &str) -> Self {
        let mut numbering = Self::default();
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut abstract_id: Option<String> = None;
        let mut level: Option<u8> = None;
        let mut num_id: Option<String> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.name().as_ref() {
                    b"w:abstractNum" => {
                        abstract_id = ooxml::attr(&e, &reader, b"w:abstractNumId")
                    }
                    b"w:lvl" => {
                        level = ooxml::attr(&e, &reader, b"w:ilvl").and_then(|v| v.parse().ok())
                    }
                    b"w:num" => num_id = ooxml::attr(&e, &reader, b"w:numId"),
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"w:numFmt" => {
                        if let (Some(a), Some(l), Some(fmt)) =
                            (&abstract_id, level, ooxml::attr(&e, &reader, b"w:val"))
                        {
                            numbering.formats.entry(a.clone()).or_default().insert(l, fmt);
                        }
                    }
                    b"w:abstractNumId" => {
                        if let (Some(n), Some(a)) = (&num_id, ooxml::attr(&e, &reader, b"w:val")) {
                            numbering.nums.insert(n.clone(), a);
                        }
                    }
                    _ => {}
                },
                Ok(Event::End(e)) => match e.name().as_ref() {
                    b"w:abstractNum" => abstract_id = None,
                    b"w:lvl" => level = None,
                    b"w:num" => num_id = None,
                    _ => {}
                },
                Ok(Event::Eof) | Err(_) => break,
                _ => {}
            }
            buf.clear();
        }

        numbering
    }

    /// Unknown lists are treated as bullets.
    fn is_ordered(&self, num_id: &str, level: u8) -> bool {
        self.nums
            .get(num_id)
            .and_then(|a| self.formats.get(a))
            .and_then(|levels| levels.get(&level))
            .is_some_and(|fmt| fmt != "bullet" && fmt != "none")
    }
}

#[derive(Debug, Default)]
struct Paragraph {
    text: String,
    style: Option<String>,
    num_id: Option<String>,
    level: u8,
    formulas: Vec<String>,
    images: Vec<String>,
}

struct BodyParser<'a> {
    styles: &'a HashMap<String, String>,
    numbering: &'a Numbering,
    options: &'a PipelineOptions,
    blocks: Vec<Block>,
    paragraphs: Vec<Paragraph>,
    run_depth: u32,
    in_text: bool,
    in_math_text: bool,
    math_depth: u32,
    math: String,
    table_depth: u32,
    rows: Vec<Vec<String>>,
    cell: Option<String>,
    table_images: Vec<String>,
    /// Nesting of `mc:Fallback`; its content repeats the `mc:Choice` branch.
    fallback_depth: u32,
}

fn parse_body(
    xml: &str,
    styles: &HashMap<String, String>,
    numbering: &Numbering,
    options: &PipelineOptions,
) -> Result<Vec<Block>, String> {
    let mut parser = BodyParser {
        styles,
        numbering,
        options,
        blocks: Vec::new(),
        paragraphs: Vec::new(),
        run_depth: 0,
        in_text: false,
        in_math_text: false,
        math_depth: 0,
        math: String::new(),
        table_depth: 0,
        rows: Vec::new(),
        cell: None,
        table_images: Vec::new(),
        fallback_depth: 0,
    };

    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"mc:Fallback" => {
                parser.fallback_depth += 1;
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"mc:Fallback" => {
                parser.fallback_depth = parser.fallback_depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Ok(_) if parser.fallback_depth > 0 => {}
            Ok(Event::Start(e)) => {
                parser.start(&e);
                parser.attributes(&e, &reader);
            }
            Ok(Event::Empty(e)) => parser.attributes(&e, &reader),
            Ok(Event::Text(e)) => {
                if let Ok(text) = e.unescape() {
                    parser.text(&text);
                }
            }
            Ok(Event::End(e)) => parser.end(e.name().as_ref()),
            Err(e) => {
                return Err(format!(
                    "XML error at byte {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(parser.blocks)
}

impl BodyParser<'_> {
    fn start(&mut self, e: &BytesStart<'_>) {
        match e.name().as_ref() {
            b"w:p" => self.paragraphs.push(Paragraph::default()),
            b"w:r" => self.run_depth += 1,
            b"w:t" => self.in_text = true,
            b"m:oMath" => {
                self.math_depth += 1;
                if self.math_depth == 1 {
                    self.math.clear();
                }
            }
            b"m:t" => self.in_math_text = true,
            b"w:tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.rows.clear();
                    self.table_images.clear();
                }
            }
            b"w:tr" if self.table_depth == 1 => self.rows.push(Vec::new()),
            b"w:tc" if self.table_depth == 1 => self.cell = Some(String::new()),
            _ => {}
        }
    }

    /// Elements that carry their payload in attributes (Start or Empty).
    fn attributes(&mut self, e: &BytesStart<'_>, reader: &Reader<&[u8]>) {
        let in_run = self.run_depth > 0;
        let Some(para) = self.paragraphs.last_mut() else {
            return;
        };
        match e.name().as_ref() {
            b"w:pStyle" => para.style = ooxml::attr(e, reader, b"w:val"),
            b"w:numId" => {
                para.num_id = ooxml::attr(e, reader, b"w:val").filter(|id| id != "0");
            }
            b"w:ilvl" => {
                para.level = ooxml::attr(e, reader, b"w:val")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0);
            }
            b"w:tab" if in_run => para.text.push('\t'),
            b"w:br" | b"w:cr" if in_run => para.text.push(' '),
            b"a:blip" => {
                if let Some(id) = ooxml::attr(e, reader, b"r:embed") {
                    para.images.push(id);
                }
            }
            b"v:imagedata" => {
                if let Some(id) = ooxml::attr(e, reader, b"r:id") {
                    para.images.push(id);
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_math_text {
            self.math.push_str(text);
        } else if self.in_text && self.math_depth == 0 {
            if let Some(para) = self.paragraphs.last_mut() {
                para.text.push_str(text);
            }
        }
    }

    fn end(&mut self, name: &[u8]) {
        match name {
            b"w:r" => self.run_depth = self.run_depth.saturating_sub(1),
            b"w:t" => self.in_text = false,
            b"m:t" => self.in_math_text = false,
            b"m:oMath" => {
                self.math_depth = self.math_depth.saturating_sub(1);
                if self.math_depth == 0 {
                    self.finish_math();
                }
            }
            b"w:p" => {
                if let Some(para) = self.paragraphs.pop() {
                    self.finish_paragraph(para);
                }
            }
            b"w:tc" if self.table_depth == 1 => {
                if let (Some(cell), Some(row)) = (self.cell.take(), self.rows.last_mut()) {
                    row.push(cell.trim().to_string());
                }
            }
            b"w:tbl" => {
                self.table_depth = self.table_depth.saturating_sub(1);
                if self.table_depth == 0 {
                    self.finish_table();
                }
            }
            _ => {}
        }
    }

    fn finish_math(&mut self) {
        let formula = self.math.trim().to_string();
        if formula.is_empty() {
            return;
        }
        match self.paragraphs.last_mut() {
            Some(para) if self.options.do_formula_enrichment => para.formulas.push(formula),
            Some(para) => para.text.push_str(&formula),
            None => self.blocks.push(Block::Item(DocItem::Formula {
                text: formula,
                prov: Some(Provenance::page(PAGE)),
            })),
        }
    }

    fn finish_table(&mut self) {
        let cells: Vec<Vec<String>> = std::mem::take(&mut self.rows)
            .into_iter()
            .filter(|row| !row.is_empty())
            .collect();
        debug!("DOCX table: {} rows", cells.len());
        self.blocks.push(Block::Item(DocItem::Table(TableItem {
            cells,
            prov: Some(Provenance::page(PAGE)),
            ..Default::default()
        })));
        for id in std::mem::take(&mut self.table_images) {
            self.blocks.push(Block::Image(id));
        }
    }

    fn finish_paragraph(&mut self, para: Paragraph) {
        if self.table_depth > 0 {
            let mut text = para.text.trim().to_string();
            for formula in &para.formulas {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(formula);
            }
            if let Some(cell) = self.cell.as_mut() {
                if !cell.is_empty() && !text.is_empty() {
                    cell.push(' ');
                }
                cell.push_str(&text);
            }
            self.table_images.extend(para.images);
            return;
        }

        let style = para
            .style
            .as_ref()
            .map(|id| self.styles.get(id).unwrap_or(id).to_lowercase())
            .unwrap_or_default();
        let text = para.text.trim();
        let prov = Some(Provenance::page(PAGE));

        if !text.is_empty() {
            let block = if style == "title" {
                Block::Item(DocItem::Title {
                    text: text.to_string(),
                    prov,
                })
            } else if let Some(caps) = RE_HEADING.captures(&style) {
                Block::Item(DocItem::SectionHeader {
                    text: text.to_string(),
                    level: caps[1].parse().unwrap_or(1),
                    prov,
                })
            } else if style == "caption" {
                Block::Caption(text.to_string())
            } else if self.options.do_code_enrichment && RE_CODE.is_match(&style) {
                Block::Item(DocItem::Code {
                    text: para.text.trim_end().to_string(),
                    language: None,
                    prov,
                })
            } else if let Some(num_id) = &para.num_id {
                Block::Item(DocItem::ListItem {
                    text: text.to_string(),
                    ordered: self.numbering.is_ordered(num_id, para.level),
                    level: para.level,
                    prov,
                })
            } else {
                Block::Item(DocItem::Paragraph {
                    text: text.to_string(),
                    prov,
                })
            };
            self.push_merging_code(block);
        }

        for formula in para.formulas {
            self.blocks.push(Block::Item(DocItem::Formula {
                text: formula,
                prov: Some(Provenance::page(PAGE)),
            }));
        }
        for id in para.images {
            self.blocks.push(Block::Image(id));
        }
    }

    /// Consecutive code-styled paragraphs form one code block.
    fn push_merging_code(&mut self, block: Block) {
        if let (
            Block::Item(DocItem::Code { text: next, .. }),
            Some(Block::Item(DocItem::Code { text: prev, .. })),
        ) = (&block, self.blocks.last_mut())
        {
            prev.push('\n');
            prev.push_str(next);
            return;
        }
        self.blocks.push(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ooxml::testutil::{tiny_png, write_package};

    fn body(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
  xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
  xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"
  xmlns:m="http://schemas.openxmlformats.org/officeDocument/2006/math">
<w:body>{inner}</w:body></w:document>"#
        )
    }

    fn para(style: Option<&str>, text: &str) -> String {
        let ppr = style
            .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{s}"/></w:pPr>"#))
            .unwrap_or_default();
        format!(r#"<w:p>{ppr}<w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    const NUMBERING: &str = r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum>
<w:abstractNum w:abstractNumId="1"><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
<w:num w:numId="2"><w:abstractNumId w:val="1"/></w:num>
</w:numbering>"#;

    fn parse(inner: &str) -> Vec<Block> {
        parse_body(
            &body(inner),
            &HashMap::new(),
            &Numbering::parse(NUMBERING),
            &PipelineOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn headings_and_title() {
        let blocks = parse(&format!(
            "{}{}{}",
            para(Some("Title"), "Report"),
            para(Some("Heading2"), "Background"),
            para(None, "Body text.")
        ));
        assert!(matches!(&blocks[0], Block::Item(DocItem::Title { text, .. }) if text == "Report"));
        assert!(matches!(
            &blocks[1],
            Block::Item(DocItem::SectionHeader { level: 2, text, .. }) if text == "Background"
        ));
        assert!(matches!(&blocks[2], Block::Item(DocItem::Paragraph { .. })));
    }

    #[test]
    fn localised_style_ids_resolve_through_styles_part() {
        let styles = parse_styles(
            r#"<w:styles xmlns:w="x"><w:style w:type="paragraph" w:styleId="berschrift1"><w:name w:val="heading 1"/></w:style></w:styles>"#,
        );
        let blocks = parse_body(
            &body(&para(Some("berschrift1"), "Einleitung")),
            &styles,
            &Numbering::default(),
            &PipelineOptions::default(),
        )
        .unwrap();
        assert!(matches!(&blocks[0], Block::Item(DocItem::SectionHeader { level: 1, .. })));
    }

    #[test]
    fn list_kinds_follow_numbering() {
        let item = |num: &str, text: &str| {
            format!(
                r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="{num}"/></w:numPr></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"#
            )
        };
        let blocks = parse(&format!("{}{}", item("1", "first"), item("2", "dot")));
        assert!(matches!(&blocks[0], Block::Item(DocItem::ListItem { ordered: true, .. })));
        assert!(matches!(&blocks[1], Block::Item(DocItem::ListItem { ordered: false, .. })));
    }

    #[test]
    fn table_cells_and_inline_picture() {
        let table = r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>A</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>B</w:t></w:r></w:p></w:tc></w:tr>
<w:tr><w:tc><w:p><w:r><w:t>1</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>2</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#;
        let picture = r#"<w:p><w:r><w:drawing><a:graphic><a:graphicData><pic:pic xmlns:pic="p"><pic:blipFill><a:blip r:embed="rId7"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></w:drawing></w:r></w:p>"#;
        let blocks = parse(&format!("{table}{picture}{}", para(Some("Caption"), "Figure 1")));

        match &blocks[0] {
            Block::Item(DocItem::Table(t)) => {
                assert_eq!(t.cells, vec![vec!["A", "B"], vec!["1", "2"]]);
            }
            other => panic!("expected table, got {other:?}"),
        }
        assert!(matches!(&blocks[1], Block::Image(id) if id == "rId7"));
        assert!(matches!(&blocks[2], Block::Caption(c) if c == "Figure 1"));
    }

    #[test]
    fn formulas_follow_enrichment_flag() {
        let math = r#"<w:p><w:r><w:t xml:space="preserve">where </w:t></w:r><m:oMath><m:r><m:t>E=mc^2</m:t></m:r></m:oMath></w:p>"#;

        let blocks = parse(math);
        assert!(matches!(&blocks[0], Block::Item(DocItem::Paragraph { text, .. }) if text == "where"));
        assert!(matches!(&blocks[1], Block::Item(DocItem::Formula { text, .. }) if text == "E=mc^2"));

        let plain = PipelineOptions::builder().formula_enrichment(false).build().unwrap();
        let blocks = parse_body(&body(math), &HashMap::new(), &Numbering::default(), &plain).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(
            matches!(&blocks[0], Block::Item(DocItem::Paragraph { text, .. }) if text == "where E=mc^2")
        );
    }

    #[test]
    fn alternate_content_reads_only_the_choice_branch() {
        let text_box = r#"<w:p><w:r><mc:AlternateContent xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006">
<mc:Choice Requires="wps"><w:drawing><wps:txbx xmlns:wps="w"><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></wps:txbx><a:blip r:embed="rId1"/></w:drawing></mc:Choice>
<mc:Fallback><w:pict><v:shape xmlns:v="urn:schemas-microsoft-com:vml"><v:textbox><w:txbxContent><w:p><w:r><w:t>Boxed</w:t></w:r></w:p></w:txbxContent></v:textbox><v:imagedata r:id="rId1"/></v:shape></w:pict></mc:Fallback>
</mc:AlternateContent></w:r></w:p>"#;
        let blocks = parse(&format!("{text_box}{}", para(None, "After")));

        let boxed = blocks
            .iter()
            .filter(|b| matches!(b, Block::Item(DocItem::Paragraph { text, .. }) if text == "Boxed"))
            .count();
        let images: Vec<_> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Image(id) => Some(id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(boxed, 1);
        assert_eq!(images, ["rId1"]);
        assert!(matches!(blocks.last(), Some(Block::Item(DocItem::Paragraph { text, .. })) if text == "After"));
    }

    #[test]
    fn code_paragraphs_merge() {
        let blocks = parse(&format!(
            "{}{}",
            para(Some("Code"), "fn main() {"),
            para(Some("Code"), "}")
        ));
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], Block::Item(DocItem::Code { text, .. }) if text == "fn main() {\n}"));
    }

    #[test]
    fn converts_package_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.docx");
        let png = tiny_png();
        let doc_xml = body(&format!(
            r#"{}<w:p><w:r><w:drawing><a:blip r:embed="rId1"/></w:drawing></w:r></w:p><w:p><w:r><w:drawing><a:blip r:embed="rId2"/></w:drawing></w:r></w:p>"#,
            para(Some("Heading1"), "Memo")
        ));
        let rels = r#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image2.emf"/></Relationships>"#;
        write_package(
            &path,
            &[
                ("word/document.xml", doc_xml.as_bytes()),
                ("word/_rels/document.xml.rels", rels.as_bytes()),
                ("word/media/image1.png", &png),
                ("word/media/image2.emf", b"EMF?"),
            ],
        );

        let result = DocxBackend::new()
            .convert(&path, &PipelineOptions::default())
            .unwrap();
        assert!(result.status.is_success());
        let doc = result.document.unwrap();
        assert_eq!(doc.name, "memo");
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.items.len(), 3);
        assert!(doc.element_image(&doc.items[1]).is_some());
        assert!(doc.element_image(&doc.items[2]).is_none());
    }

    #[test]
    fn missing_main_part_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.docx");
        write_package(&path, &[("docProps/core.xml", b"<x/>")]);
        let err = DocxBackend::new()
            .convert(&path, &PipelineOptions::default())
            .unwrap_err();
        assert!(matches!(err, Doc2MdError::CorruptDocument { .. }));
    }
}
