//! Shared plumbing for Office Open XML packages (DOCX, PPTX, XLSX).
//!
//! An OOXML file is a ZIP archive of XML "parts". Parts reference each other
//! through `_rels/*.rels` relationship files whose targets are relative to
//! the referencing part.

use crate::error::Doc2MdError;
use crate::format::InputFormat;
use image::DynamicImage;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// One entry of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    /// Package-absolute part name, e.g. `word/media/image1.png`.
    pub target: String,
    pub rel_type: String,
}

/// Open an OOXML package from disk.
pub fn open_package(path: &Path) -> Result<ZipArchive<File>, Doc2MdError> {
    let file = File::open(path).map_err(|e| Doc2MdError::CorruptDocument {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    ZipArchive::new(file).map_err(|e| Doc2MdError::CorruptDocument {
        path: path.to_path_buf(),
        detail: format!("not a valid OOXML package: {e}"),
    })
}

/// Read a part as UTF-8 text; `None` if the part does not exist.
pub fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<String> {
    let mut part = archive.by_name(name).ok()?;
    let mut text = String::new();
    part.read_to_string(&mut text).ok()?;
    Some(text)
}

/// Read a part as raw bytes; `None` if the part does not exist.
pub fn read_part_bytes<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<Vec<u8>> {
    let mut part = archive.by_name(name).ok()?;
    let mut bytes = Vec::new();
    part.read_to_end(&mut bytes).ok()?;
    Some(bytes)
}

/// Decode an image part. Formats the `image` crate cannot read (EMF, WMF,
/// SVG) yield `None`.
pub fn load_image<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<DynamicImage> {
    let bytes = read_part_bytes(archive, name)?;
    match image::load_from_memory(&bytes) {
        Ok(img) => Some(img),
        Err(e) => {
            debug!("Cannot decode image part '{}': {}", name, e);
            None
        }
    }
}

/// `word/document.xml` → `word/_rels/document.xml.rels`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that references it.
pub fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match base_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Parse the relationships of `base_part`, keyed by id.
///
/// External targets (hyperlinks, linked images) are dropped.
pub fn relationships<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    base_part: &str,
) -> HashMap<String, Relationship> {
    read_part(archive, &rels_path_for(base_part))
        .map(|xml| parse_relationships(&xml, base_part))
        .unwrap_or_default()
}

/// Parse the XML of a `.rels` part.
pub fn parse_relationships(xml: &str, base_part: &str) -> HashMap<String, Relationship> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e) | Event::Start(e)) if e.name().as_ref() == b"Relationship" => {
                let id = attr(&e, &reader, b"Id");
                let target = attr(&e, &reader, b"Target");
                let external = attr(&e, &reader, b"TargetMode").as_deref() == Some("External");
                if let (Some(id), Some(target), false) = (id, target, external) {
                    let rel_type = attr(&e, &reader, b"Type").unwrap_or_default();
                    rels.insert(
                        id.clone(),
                        Relationship {
                            id,
                            target: resolve_target(base_part, &target),
                            rel_type,
                        },
                    );
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("Malformed relationships for '{}': {}", base_part, e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    rels
}

/// Unescaped value of attribute `key`.
pub fn attr(e: &BytesStart<'_>, reader: &Reader<&[u8]>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.decode_and_unescape_value(reader).ok())
        .map(|v| v.into_owned())
}

/// Identify an OOXML package by its main part.
pub fn sniff_package(path: &Path) -> Option<InputFormat> {
    let archive = ZipArchive::new(File::open(path).ok()?).ok()?;
    let has = |name: &str| archive.file_names().any(|n| n == name);

    if has("word/document.xml") {
        Some(InputFormat::Docx)
    } else if has("ppt/presentation.xml") {
        Some(InputFormat::Pptx)
    } else if has("xl/workbook.xml") {
        Some(InputFormat::Xlsx)
    } else {
        None
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    #[test]
    fn rels_path_layout() {
        assert_eq!(rels_path_for("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(
            rels_path_for("ppt/slides/slide3.xml"),
            "ppt/slides/_rels/slide3.xml.rels"
        );
    }

    #[test]
    fn resolves_relative_targets() {
        assert_eq!(resolve_target("word/document.xml", "media/image1.png"), "word/media/image1.png");
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../media/image2.jpeg"),
            "ppt/media/image2.jpeg"
        );
        assert_eq!(resolve_target("xl/workbook.xml", "/xl/media/a.png"), "xl/media/a.png");
    }

    #[test]
    fn parses_relationships_and_skips_external() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
  <Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;
        let rels = parse_relationships(xml, "word/document.xml");
        assert_eq!(rels.len(), 1);
        assert_eq!(rels["rId4"].target, "word/media/image1.png");
        assert!(rels["rId4"].rel_type.ends_with("/image"));
    }

    #[test]
    fn sniffs_package_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.bin");
        write_package(&path, &[("ppt/presentation.xml", b"<p:presentation/>")]);
        assert_eq!(sniff_package(&path), Some(InputFormat::Pptx));

        let other = dir.path().join("plain.zip");
        write_package(&other, &[("readme.txt", b"hi")]);
        assert_eq!(sniff_package(&other), None);
    }

    #[test]
    fn loads_png_part_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkg.zip");
        let png = tiny_png();
        write_package(
            &path,
            &[("word/media/image1.png", &png), ("word/media/image2.emf", b"\x01\x00\x00\x00junk")],
        );
        let mut archive = open_package(&path).unwrap();
        let img = load_image(&mut archive, "word/media/image1.png").unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
        assert!(load_image(&mut archive, "word/media/image2.emf").is_none());
        assert!(load_image(&mut archive, "word/media/missing.png").is_none());
    }
}
