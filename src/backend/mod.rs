//! Document backends and the [`DocumentConverter`] that dispatches to them.
//!
//! A backend turns one input file into a [`StructuredDocument`]. The
//! converter owns the [`PipelineOptions`] policy and one backend per format;
//! it never fails on recoverable problems. Per-page failures land in
//! [`ConversionResult::errors`], and a backend that cannot open the file
//! at all yields a [`ConversionStatus::Failure`] result with no document.
//! Only "we don't know this format" and "no backend could be loaded" are
//! fatal at this layer.

pub mod docx;
pub mod ooxml;
pub mod pdf;
pub mod pptx;
pub mod xlsx;

pub use docx::DocxBackend;
pub use pdf::PdfiumBackend;
pub use pptx::PptxBackend;
pub use xlsx::XlsxBackend;

use crate::config::PipelineOptions;
use crate::document::{DocItem, StructuredDocument};
use crate::error::{Doc2MdError, PageError};
use crate::format::{self, InputFormat};
use crate::output::ImageReference;
use crate::pipeline::export::{self, ExportOptions};
use image::DynamicImage;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one conversion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    /// Every page was processed.
    Success,
    /// Some pages failed, at least one succeeded.
    PartialSuccess,
    /// Nothing usable was produced.
    Failure,
    /// The file was not handed to a backend (empty input).
    Skipped,
}

impl ConversionStatus {
    /// Derive the status from per-page outcomes.
    pub fn from_page_outcomes(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => ConversionStatus::Success,
            (0, _) => ConversionStatus::Failure,
            _ => ConversionStatus::PartialSuccess,
        }
    }

    pub fn is_success(self) -> bool {
        self == ConversionStatus::Success
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConversionStatus::Success => "SUCCESS",
            ConversionStatus::PartialSuccess => "PARTIAL_SUCCESS",
            ConversionStatus::Failure => "FAILURE",
            ConversionStatus::Skipped => "SKIPPED",
        })
    }
}

/// What a backend can actually do with the pipeline policy.
///
/// Policy flags a backend cannot honour are ignored (and logged at debug).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackendCapabilities {
    pub ocr: bool,
    pub table_structure: bool,
    pub code_enrichment: bool,
    pub formula_enrichment: bool,
    pub picture_classification: bool,
    /// Produces page rasters that element images can be cropped from.
    pub page_images: bool,
    /// `export_markdown` fills image slots from the reference list. When
    /// false the export only emits placeholders and the pipeline splices
    /// links into them in order.
    pub keyed_image_export: bool,
}

impl BackendCapabilities {
    /// Names of the enabled policy flags this backend ignores.
    pub fn unsupported(&self, options: &PipelineOptions) -> Vec<&'static str> {
        let checks = [
            (options.ocr.enabled, self.ocr, "ocr"),
            (
                options.table_structure.enabled,
                self.table_structure,
                "table_structure",
            ),
            (options.do_code_enrichment, self.code_enrichment, "code_enrichment"),
            (
                options.do_formula_enrichment,
                self.formula_enrichment,
                "formula_enrichment",
            ),
            (
                options.do_picture_classification,
                self.picture_classification,
                "picture_classification",
            ),
            (options.needs_page_images(), self.page_images, "page_images"),
        ];
        checks
            .into_iter()
            .filter(|(wanted, supported, _)| *wanted && !*supported)
            .map(|(_, _, name)| name)
            .collect()
    }
}

/// The result of [`DocumentConverter::convert`].
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub status: ConversionStatus,
    pub document: Option<StructuredDocument>,
    /// Non-fatal per-page errors.
    pub errors: Vec<PageError>,
    /// Why the whole document failed, when it did.
    pub failure_reason: Option<String>,
    pub format: InputFormat,
    /// Name of the backend that produced this result.
    pub backend: String,
}

impl ConversionResult {
    /// A result for a document whose pages were processed with `errors`.
    pub fn from_document(
        document: StructuredDocument,
        errors: Vec<PageError>,
        backend: &str,
    ) -> Self {
        let status = ConversionStatus::from_page_outcomes(document.page_count(), errors.len());
        Self {
            status,
            format: document.format,
            document: Some(document),
            errors,
            failure_reason: None,
            backend: backend.to_string(),
        }
    }

    /// A failed result with no document.
    pub fn failure(format: InputFormat, backend: &str, reason: impl Into<String>) -> Self {
        Self {
            status: ConversionStatus::Failure,
            document: None,
            errors: Vec::new(),
            failure_reason: Some(reason.into()),
            format,
            backend: backend.to_string(),
        }
    }

    /// A result for a file that was never parsed.
    pub fn skipped(format: InputFormat, backend: &str, reason: impl Into<String>) -> Self {
        Self {
            status: ConversionStatus::Skipped,
            ..Self::failure(format, backend, reason)
        }
    }

    /// Pages present in the document (0 without a document).
    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, StructuredDocument::page_count)
    }

    /// The most useful single error message, if any.
    pub fn first_error(&self) -> Option<String> {
        self.failure_reason
            .clone()
            .or_else(|| self.errors.first().map(ToString::to_string))
    }
}

/// A document-understanding backend for one or more formats.
///
/// `convert` is blocking and is run inside `spawn_blocking` by the
/// pipeline. `render_element_image` and `export_markdown` have default
/// implementations on top of [`StructuredDocument`] that most backends keep.
pub trait DocumentBackend: Send + Sync {
    /// Short identifier used in logs and results.
    fn name(&self) -> &'static str;

    /// Formats this backend accepts.
    fn formats(&self) -> &[InputFormat];

    fn capabilities(&self) -> BackendCapabilities;

    /// Parse `path` into a structured document.
    ///
    /// Return `Err` only when the file cannot be opened or parsed at all;
    /// individual page failures go into [`ConversionResult::errors`].
    fn convert(
        &self,
        path: &Path,
        options: &PipelineOptions,
    ) -> Result<ConversionResult, Doc2MdError>;

    /// Raster for a table or picture element, `None` when unavailable.
    fn render_element_image(
        &self,
        doc: &StructuredDocument,
        item: &DocItem,
    ) -> Option<DynamicImage> {
        doc.element_image(item)
    }

    /// Render the document as Markdown.
    fn export_markdown(
        &self,
        doc: &StructuredDocument,
        options: &ExportOptions,
        refs: &[ImageReference],
    ) -> String {
        export::to_markdown(doc, options, refs)
    }
}

/// Binds the pipeline policy to the per-format backends.
pub struct DocumentConverter {
    options: PipelineOptions,
    backends: Vec<Arc<dyn DocumentBackend>>,
    unavailable: Vec<(InputFormat, String)>,
}

impl fmt::Debug for DocumentConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentConverter")
            .field("options", &self.options)
            .field(
                "backends",
                &self.backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .field("unavailable", &self.unavailable)
            .finish()
    }
}

impl DocumentConverter {
    /// Build the default backend set.
    ///
    /// The pdfium backend binds its native library here; when that fails
    /// PDF support is recorded as unavailable and the other formats still
    /// work.
    pub fn new(options: PipelineOptions) -> Self {
        let mut backends: Vec<Arc<dyn DocumentBackend>> = Vec::with_capacity(4);
        let mut unavailable = Vec::new();

        match PdfiumBackend::probe() {
            Ok(pdf) => backends.push(Arc::new(pdf)),
            Err(e) => {
                warn!("PDF backend unavailable: {}", e);
                unavailable.push((InputFormat::Pdf, e.to_string()));
            }
        }
        backends.push(Arc::new(DocxBackend::new()));
        backends.push(Arc::new(PptxBackend::new()));
        backends.push(Arc::new(XlsxBackend::new()));

        let mut converter = Self::with_backends(options, backends);
        converter.unavailable = unavailable;
        converter
    }

    /// Use an explicit backend list (first match per format wins).
    pub fn with_backends(
        options: PipelineOptions,
        backends: Vec<Arc<dyn DocumentBackend>>,
    ) -> Self {
        for backend in &backends {
            let ignored = backend.capabilities().unsupported(&options);
            if !ignored.is_empty() {
                debug!(
                    "Backend '{}' ignores policy flags: {}",
                    backend.name(),
                    ignored.join(", ")
                );
            }
        }
        Self {
            options,
            backends,
            unavailable: Vec::new(),
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// The backend registered for `format`.
    pub fn backend_for(&self, format: InputFormat) -> Result<Arc<dyn DocumentBackend>, Doc2MdError> {
        if let Some(backend) = self
            .backends
            .iter()
            .find(|b| b.formats().contains(&format))
        {
            return Ok(Arc::clone(backend));
        }

        let reason = self
            .unavailable
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, reason)| reason.clone())
            .unwrap_or_else(|| "no backend registered".to_string());
        Err(Doc2MdError::BackendUnavailable { format, reason })
    }

    /// Convert one file.
    ///
    /// Errors only when the format is unknown or has no backend; every
    /// other problem is reported through the returned status.
    pub fn convert(&self, path: &Path) -> Result<ConversionResult, Doc2MdError> {
        let format = format::detect(path).ok_or_else(|| Doc2MdError::UnsupportedFormat {
            path: path.to_path_buf(),
            detail: "unrecognised extension and content".into(),
        })?;
        let backend = self.backend_for(format)?;

        if std::fs::metadata(path).is_ok_and(|m| m.len() == 0) {
            warn!("Skipping {}: file is empty", path.display());
            return Ok(ConversionResult::skipped(format, backend.name(), "file is empty"));
        }

        info!("Converting {} as {} with '{}'", path.display(), format, backend.name());

        match backend.convert(path, &self.options) {
            Ok(result) => {
                debug!(
                    "Backend '{}' finished: status={}, pages={}, page errors={}",
                    backend.name(),
                    result.status,
                    result.page_count(),
                    result.errors.len()
                );
                Ok(result)
            }
            Err(e) => {
                warn!("Backend '{}' failed on {}: {}", backend.name(), path.display(), e);
                Ok(ConversionResult::failure(format, backend.name(), e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PageInfo;

    struct FailingBackend;

    impl DocumentBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn formats(&self) -> &[InputFormat] {
            &[InputFormat::Docx]
        }

        fn capabilities(&self) -> BackendCapabilities {
            BackendCapabilities::default()
        }

        fn convert(
            &self,
            path: &Path,
            _options: &PipelineOptions,
        ) -> Result<ConversionResult, Doc2MdError> {
            Err(Doc2MdError::CorruptDocument {
                path: path.to_path_buf(),
                detail: "truncated".into(),
            })
        }
    }

    #[test]
    fn status_from_outcomes() {
        assert_eq!(ConversionStatus::from_page_outcomes(3, 0), ConversionStatus::Success);
        assert_eq!(
            ConversionStatus::from_page_outcomes(2, 1),
            ConversionStatus::PartialSuccess
        );
        assert_eq!(ConversionStatus::from_page_outcomes(0, 4), ConversionStatus::Failure);
        assert_eq!(ConversionStatus::PartialSuccess.to_string(), "PARTIAL_SUCCESS");
    }

    #[test]
    fn result_from_document_counts_pages() {
        let mut doc = StructuredDocument::new("d", InputFormat::Pdf);
        doc.add_page(PageInfo::new(1, 612.0, 792.0));
        let errors = vec![PageError::LoadFailed {
            page: 2,
            detail: "x".into(),
        }];
        let r = ConversionResult::from_document(doc, errors, "pdfium");
        assert_eq!(r.status, ConversionStatus::PartialSuccess);
        assert_eq!(r.page_count(), 1);
        assert!(r.first_error().unwrap().contains("Page 2"));
    }

    #[test]
    fn capabilities_report_ignored_flags() {
        let caps = BackendCapabilities {
            table_structure: true,
            ..Default::default()
        };
        let ignored = caps.unsupported(&PipelineOptions::default());
        assert!(ignored.contains(&"ocr"));
        assert!(!ignored.contains(&"table_structure"));
    }

    #[test]
    fn backend_error_becomes_failure_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"not a zip").unwrap();

        let converter = DocumentConverter::with_backends(
            PipelineOptions::default(),
            vec![Arc::new(FailingBackend)],
        );
        let result = converter.convert(&path).unwrap();
        assert_eq!(result.status, ConversionStatus::Failure);
        assert!(result.document.is_none());
        assert!(result.first_error().unwrap().contains("truncated"));
    }

    #[test]
    fn empty_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.docx");
        std::fs::write(&path, b"").unwrap();

        let converter = DocumentConverter::with_backends(
            PipelineOptions::default(),
            vec![Arc::new(FailingBackend)],
        );
        let result = converter.convert(&path).unwrap();
        assert_eq!(result.status, ConversionStatus::Skipped);
        assert!(result.document.is_none());
        assert_eq!(result.first_error().as_deref(), Some("file is empty"));
        assert_eq!(result.status.to_string(), "SKIPPED");
    }

    #[test]
    fn missing_backend_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let converter = DocumentConverter::with_backends(PipelineOptions::default(), vec![]);
        let err = converter.convert(&path).unwrap_err();
        assert!(matches!(
            err,
            Doc2MdError::BackendUnavailable {
                format: InputFormat::Pdf,
                ..
            }
        ));
    }

    #[test]
    fn unknown_format_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "plain").unwrap();

        let converter = DocumentConverter::with_backends(PipelineOptions::default(), vec![]);
        assert!(matches!(
            converter.convert(&path),
            Err(Doc2MdError::UnsupportedFormat { .. })
        ));
    }
}
