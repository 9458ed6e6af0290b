//! Pipeline integration tests driven through in-process backends.
//!
//! Nothing here needs pdfium: the PDF format is served by fake backends
//! that return a prepared `StructuredDocument`, and the DOCX test builds a
//! package on the fly.

use edgequake_doc2md::backend::{BackendCapabilities, ConversionResult, DocxBackend};
use edgequake_doc2md::document::{BoundingBox, PageInfo, PictureItem, Provenance, TableItem};
use edgequake_doc2md::stats::{Phase, PhaseSample};
use edgequake_doc2md::{
    convert_file, resolve_request, ConversionProgressCallback, ConversionStatus, Doc2MdError,
    DocItem, DocumentBackend, DocumentConverter, ImageKind, InputFormat, PageError,
    PipelineOptions, ProcessOptions, StructuredDocument, DEFAULT_PLACEHOLDER,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Serves one prepared document for PDF input.
struct FakeBackend {
    document: Option<StructuredDocument>,
    errors: Vec<PageError>,
    keyed: bool,
}

impl FakeBackend {
    fn keyed(document: StructuredDocument) -> Self {
        Self {
            document: Some(document),
            errors: Vec::new(),
            keyed: true,
        }
    }

    fn placeholder_only(document: StructuredDocument) -> Self {
        Self {
            keyed: false,
            ..Self::keyed(document)
        }
    }
}

impl DocumentBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn formats(&self) -> &[InputFormat] {
        &[InputFormat::Pdf]
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            page_images: true,
            keyed_image_export: self.keyed,
            ..Default::default()
        }
    }

    fn convert(
        &self,
        _path: &Path,
        _options: &PipelineOptions,
    ) -> Result<ConversionResult, Doc2MdError> {
        match &self.document {
            Some(doc) => Ok(ConversionResult::from_document(
                doc.clone(),
                self.errors.clone(),
                self.name(),
            )),
            None => Ok(ConversionResult::failure(
                InputFormat::Pdf,
                self.name(),
                "could not open document",
            )),
        }
    }
}

fn options_with(backend: FakeBackend) -> ProcessOptions {
    let converter = DocumentConverter::with_backends(
        PipelineOptions::default(),
        vec![Arc::new(backend) as Arc<dyn DocumentBackend>],
    );
    ProcessOptions::builder()
        .converter(Arc::new(converter))
        .build()
        .unwrap()
}

fn input_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.7\n").unwrap();
    path
}

fn solid(w: u32, h: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 255, 255])))
}

/// Page 1 with a 200×200 raster at scale 2 (100×100 pt page).
fn base_document() -> StructuredDocument {
    let mut doc = StructuredDocument::new("report", InputFormat::Pdf);
    doc.add_page(PageInfo::new(1, 100.0, 100.0).with_image(2.0, solid(200, 200)));
    doc.push(DocItem::Title {
        text: "Quarterly Report".into(),
        prov: Some(Provenance::page(1)),
    });
    doc
}

fn cropped_picture() -> DocItem {
    DocItem::Picture(PictureItem {
        prov: Some(Provenance::region(1, BoundingBox::new(10.0, 10.0, 30.0, 20.0))),
        ..Default::default()
    })
}

fn cropped_table() -> DocItem {
    DocItem::Table(TableItem {
        cells: vec![vec!["a".into(), "b".into()]],
        prov: Some(Provenance::region(1, BoundingBox::new(0.0, 50.0, 100.0, 90.0))),
        ..Default::default()
    })
}

/// A picture whose box lies entirely off the page.
fn unrenderable_picture() -> DocItem {
    DocItem::Picture(PictureItem {
        prov: Some(Provenance::region(1, BoundingBox::new(500.0, 500.0, 600.0, 600.0))),
        ..Default::default()
    })
}

fn png_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Image links ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_renderable_element_gets_a_file_and_a_link() {
    let dir = tempfile::tempdir().unwrap();
    let file = input_file(dir.path(), "report.pdf");
    let out_dir = dir.path().join("knowledge");

    let mut doc = base_document();
    doc.push(cropped_picture());
    doc.push(DocItem::paragraph("Between.", 1));
    doc.push(cropped_table());
    doc.push(cropped_picture());

    let output = convert_file(&file, &out_dir, &options_with(FakeBackend::keyed(doc)))
        .await
        .unwrap();

    assert_eq!(output.status, ConversionStatus::Success);
    assert_eq!(output.images.len(), 3);
    assert_eq!(output.unresolved_placeholders, 0);
    assert!(!output.markdown.contains(DEFAULT_PLACEHOLDER));
    assert_eq!(
        png_names(&out_dir.join("images")),
        ["report-picture-1.png", "report-picture-2.png", "report-table-1.png"]
    );

    let md = std::fs::read_to_string(out_dir.join("report.md")).unwrap();
    assert_eq!(md, output.markdown);
    let first = md.find("![picture](images/report-picture-1.png)").unwrap();
    let table = md.find("![table](images/report-table-1.png)").unwrap();
    let second = md.find("![picture](images/report-picture-2.png)").unwrap();
    assert!(first < table && table < second);
    assert!(md.starts_with("# Quarterly Report\n"));

    // 20×10 pt box at scale 2.
    let saved = image::open(out_dir.join("images/report-picture-1.png")).unwrap();
    assert_eq!((saved.width(), saved.height()), (40, 20));
}

#[tokio::test]
async fn unrenderable_elements_leave_their_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let file = input_file(dir.path(), "report.pdf");

    let mut doc = base_document();
    doc.push(unrenderable_picture());
    doc.push(cropped_picture());
    doc.push(unrenderable_picture());

    let output = convert_file(&file, dir.path(), &options_with(FakeBackend::keyed(doc)))
        .await
        .unwrap();

    assert_eq!(output.images.len(), 1);
    assert_eq!(output.images[0].filename, "report-picture-1.png");
    assert_eq!(output.images[0].item_index, 2);
    assert_eq!(output.skipped_images.len(), 2);
    assert_eq!(output.unresolved_placeholders, 2);
    assert_eq!(
        output.markdown,
        format!(
            "# Quarterly Report\n\n{DEFAULT_PLACEHOLDER}\n\n![picture](images/report-picture-1.png)\n\n{DEFAULT_PLACEHOLDER}\n"
        )
    );
}

#[tokio::test]
async fn placeholder_only_backends_are_spliced_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let file = input_file(dir.path(), "report.pdf");

    let mut doc = base_document();
    doc.push(cropped_picture());
    doc.push(cropped_picture());
    doc.push(unrenderable_picture());

    let output = convert_file(
        &file,
        dir.path(),
        &options_with(FakeBackend::placeholder_only(doc)),
    )
    .await
    .unwrap();

    assert_eq!(output.images.len(), 2);
    assert_eq!(output.unresolved_placeholders, 1);
    assert_eq!(
        output.markdown,
        format!(
            "# Quarterly Report\n\n![picture](images/report-picture-1.png)\n\n![picture](images/report-picture-2.png)\n\n{DEFAULT_PLACEHOLDER}\n"
        )
    );
}

#[tokio::test]
async fn tables_without_rasters_become_gfm_tables() {
    let dir = tempfile::tempdir().unwrap();
    let file = input_file(dir.path(), "report.pdf");

    let mut doc = StructuredDocument::new("report", InputFormat::Pdf);
    doc.add_page(PageInfo::logical(1));
    doc.push(DocItem::Table(TableItem {
        cells: vec![
            vec!["Region".into(), "Revenue".into()],
            vec!["North".into(), "12".into()],
        ],
        prov: Some(Provenance::page(1)),
        ..Default::default()
    }));

    let output = convert_file(&file, dir.path(), &options_with(FakeBackend::keyed(doc)))
        .await
        .unwrap();

    assert!(output.images.is_empty());
    assert_eq!(output.unresolved_placeholders, 0);
    assert_eq!(
        output.markdown,
        "| Region | Revenue |\n| --- | --- |\n| North | 12 |\n"
    );
}

// ── Re-runs and failures ─────────────────────────────────────────────────────

#[tokio::test]
async fn rerun_overwrites_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = input_file(dir.path(), "report.pdf");
    let mut doc = base_document();
    doc.push(cropped_picture());
    let options = options_with(FakeBackend::keyed(doc));

    std::fs::write(dir.path().join("report.md"), "stale content").unwrap();
    let first = convert_file(&file, dir.path(), &options).await.unwrap();
    let second = convert_file(&file, dir.path(), &options).await.unwrap();

    assert_eq!(first.markdown, second.markdown);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("report.md")).unwrap(),
        second.markdown
    );
    assert_eq!(png_names(&dir.path().join("images")), ["report-picture-1.png"]);
    assert!(!dir.path().join("report.md.tmp").exists());
}

#[tokio::test]
async fn zero_pages_is_fatal_and_writes_no_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let file = input_file(dir.path(), "empty.pdf");
    let doc = StructuredDocument::new("empty", InputFormat::Pdf);

    let err = convert_file(&file, dir.path(), &options_with(FakeBackend::keyed(doc)))
        .await
        .unwrap_err();

    assert!(matches!(err, Doc2MdError::NoPagesExtracted { .. }), "got {err:?}");
    assert!(!dir.path().join("empty.md").exists());
}

#[tokio::test]
async fn missing_document_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let file = input_file(dir.path(), "broken.pdf");
    let backend = FakeBackend {
        document: None,
        errors: Vec::new(),
        keyed: true,
    };

    let err = convert_file(&file, dir.path(), &options_with(backend))
        .await
        .unwrap_err();

    match err {
        Doc2MdError::NoContent { status, first_error } => {
            assert_eq!(status, "FAILURE");
            assert_eq!(first_error, "could not open document");
        }
        other => panic!("expected NoContent, got {other:?}"),
    }
    assert!(!dir.path().join("broken.md").exists());
}

#[tokio::test]
async fn empty_input_is_skipped_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("blank.pdf");
    std::fs::write(&file, b"").unwrap();
    let backend = FakeBackend {
        document: None,
        errors: Vec::new(),
        keyed: true,
    };

    let err = convert_file(&file, dir.path(), &options_with(backend))
        .await
        .unwrap_err();

    match err {
        Doc2MdError::NoContent { status, first_error } => {
            assert_eq!(status, "SKIPPED");
            assert_eq!(first_error, "file is empty");
        }
        other => panic!("expected NoContent, got {other:?}"),
    }
    assert!(!dir.path().join("blank.md").exists());
}

#[derive(Default)]
struct RecordingCallback {
    phases: Mutex<Vec<Phase>>,
    degraded: AtomicUsize,
    saved: AtomicUsize,
}

impl ConversionProgressCallback for RecordingCallback {
    fn on_phase_complete(&self, sample: &PhaseSample) {
        self.phases.lock().unwrap().push(sample.phase);
    }

    fn on_degraded_result(&self, status: ConversionStatus, page_count: usize) {
        assert_eq!(status, ConversionStatus::PartialSuccess);
        assert_eq!(page_count, 1);
        self.degraded.fetch_add(1, Ordering::SeqCst);
    }

    fn on_image_saved(&self, _image: &edgequake_doc2md::ImageReference) {
        self.saved.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn partial_success_still_exports() {
    let dir = tempfile::tempdir().unwrap();
    let file = input_file(dir.path(), "report.pdf");
    let mut doc = base_document();
    doc.push(cropped_picture());
    let backend = FakeBackend {
        document: Some(doc),
        errors: vec![PageError::RenderFailed {
            page: 2,
            detail: "bad stream".into(),
        }],
        keyed: true,
    };

    let callback = Arc::new(RecordingCallback::default());
    let converter = DocumentConverter::with_backends(
        PipelineOptions::default(),
        vec![Arc::new(backend) as Arc<dyn DocumentBackend>],
    );
    let options = ProcessOptions::builder()
        .converter(Arc::new(converter))
        .collect_stats(true)
        .progress_callback(callback.clone())
        .build()
        .unwrap();

    let output = convert_file(&file, dir.path(), &options).await.unwrap();

    assert_eq!(output.status, ConversionStatus::PartialSuccess);
    assert_eq!(output.page_errors.len(), 1);
    assert!(dir.path().join("report.md").is_file());
    assert_eq!(callback.degraded.load(Ordering::SeqCst), 1);
    assert_eq!(callback.saved.load(Ordering::SeqCst), 1);
    assert_eq!(
        *callback.phases.lock().unwrap(),
        vec![Phase::Initialization, Phase::Conversion, Phase::Export]
    );
    assert_eq!(output.stats.phases.len(), 3);
    assert!(output.stats.total_secs >= output.stats.conversion_secs);
}

// ── Input handling ───────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_extension_is_still_attempted() {
    let dir = tempfile::tempdir().unwrap();
    let file = input_file(dir.path(), "scan.bin");
    let mut doc = base_document();
    doc.push(DocItem::paragraph("Sniffed as PDF.", 1));

    let request = resolve_request(&file, dir.path()).unwrap();
    assert!(!request.extension_supported);

    let output = edgequake_doc2md::process_document(&request, &options_with(FakeBackend::keyed(doc)))
        .await
        .unwrap();
    assert_eq!(output.format, InputFormat::Pdf);
    assert_eq!(output.markdown_path, dir.path().join("scan.md"));
    assert!(output.markdown.contains("Sniffed as PDF."));
}

#[tokio::test]
async fn missing_input_fails_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("knowledge");
    let err = convert_file(dir.path().join("nope.docx"), &out_dir, &ProcessOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Doc2MdError::FileNotFound { .. }));
    assert!(!out_dir.exists());
}

// ── A real DOCX package ──────────────────────────────────────────────────────

fn write_docx(path: &Path) {
    let mut png = std::io::Cursor::new(Vec::new());
    solid(8, 4)
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();

    let document = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"
  xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
  xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
<w:body>
<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Field Notes</w:t></w:r></w:p>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Observations</w:t></w:r></w:p>
<w:p><w:r><w:t>Two sites were visited.</w:t></w:r></w:p>
<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>North ridge</w:t></w:r></w:p>
<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>South valley</w:t></w:r></w:p>
<w:tbl>
<w:tr><w:tc><w:p><w:r><w:t>Site</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Count</w:t></w:r></w:p></w:tc></w:tr>
<w:tr><w:tc><w:p><w:r><w:t>North</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>14</w:t></w:r></w:p></w:tc></w:tr>
</w:tbl>
<w:p><w:r><w:drawing><a:graphic><a:graphicData><a:blip r:embed="rId1"/></a:graphicData></a:graphic></w:drawing></w:r></w:p>
</w:body></w:document>"#;
    let numbering = r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum>
<w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num>
</w:numbering>"#;
    let rels = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
</Relationships>"#;

    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in [
        ("word/document.xml", document.as_bytes()),
        ("word/numbering.xml", numbering.as_bytes()),
        ("word/_rels/document.xml.rels", rels.as_bytes()),
        ("word/media/image1.png", png.get_ref().as_slice()),
    ] {
        zip.start_file(name, opts).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

#[tokio::test]
async fn docx_converts_to_structured_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("field-notes.docx");
    write_docx(&file);

    let converter = DocumentConverter::with_backends(
        PipelineOptions::default(),
        vec![Arc::new(DocxBackend::new()) as Arc<dyn DocumentBackend>],
    );
    let options = ProcessOptions::builder()
        .converter(Arc::new(converter))
        .build()
        .unwrap();

    let output = convert_file(&file, dir.path().join("out"), &options).await.unwrap();

    assert_eq!(output.status, ConversionStatus::Success);
    assert_eq!(output.page_count, 1);
    assert_eq!(output.count(ImageKind::Picture), 1);
    assert_eq!(output.count(ImageKind::Table), 0);
    assert_eq!(
        output.markdown,
        "# Field Notes\n\n\
         ## Observations\n\n\
         Two sites were visited.\n\n\
         1. North ridge\n\
         2. South valley\n\n\
         | Site | Count |\n| --- | --- |\n| North | 14 |\n\n\
         ![picture](images/field-notes-picture-1.png)\n"
    );
    assert!(dir
        .path()
        .join("out/images/field-notes-picture-1.png")
        .is_file());
}
