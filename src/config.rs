//! Configuration types for document-to-Markdown conversion.
//!
//! Two structs cover two lifetimes:
//!
//! * [`PipelineOptions`] is the backend policy (OCR, tables, enrichment,
//!   image rendering). It is built once, handed to the
//!   [`crate::backend::DocumentConverter`] and never mutated afterwards.
//! * [`ProcessOptions`] drives one [`crate::convert::process_document`] run:
//!   placeholder token, image directory name, stats, progress callback.
//!
//! Both are built via builders whose `build()` validates the result.

use crate::backend::DocumentConverter;
use crate::error::Doc2MdError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Sentinel the exporter emits for image slots that have no file.
pub const DEFAULT_PLACEHOLDER: &str = "__IMAGE_PLACEHOLDER__";

/// Name of the image sub-directory under the output directory.
pub const DEFAULT_IMAGES_DIR: &str = "images";

// ── Pipeline policy ──────────────────────────────────────────────────────

/// OCR engine identifier passed through to backends that run OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngine {
    #[default]
    EasyOcr,
    Tesseract,
}

/// OCR settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOptions {
    pub enabled: bool,
    /// OCR every page regardless of its text layer. Default: false
    /// (only pages or regions without extractable text).
    pub force_full_page_ocr: bool,
    pub languages: Vec<String>,
    pub engine: OcrEngine,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            force_full_page_ocr: false,
            languages: vec!["en".to_string()],
            engine: OcrEngine::default(),
        }
    }
}

/// Speed/accuracy trade-off of the table-structure model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormerMode {
    #[default]
    Fast,
    Accurate,
}

/// Table-structure recognition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableStructureOptions {
    pub enabled: bool,
    /// Snap predicted cells onto the text cells of the page.
    pub do_cell_matching: bool,
    pub mode: TableFormerMode,
}

impl Default for TableStructureOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            do_cell_matching: true,
            mode: TableFormerMode::default(),
        }
    }
}

/// Feature policy handed to every backend.
///
/// `PipelineOptions::default()` is the policy the CLI always uses: OCR on
/// (English, partial-page), fast table structure with cell matching, code
/// and formula enrichment, picture classification, page rasters at 2×,
/// picture and table images on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub ocr: OcrOptions,
    pub table_structure: TableStructureOptions,
    pub do_code_enrichment: bool,
    pub do_formula_enrichment: bool,
    pub do_picture_classification: bool,
    /// Page raster scale relative to 72 DPI. Range: (0, 10]. Default: 2.0.
    pub images_scale: f32,
    pub generate_picture_images: bool,
    pub generate_table_images: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ocr: OcrOptions::default(),
            table_structure: TableStructureOptions::default(),
            do_code_enrichment: true,
            do_formula_enrichment: true,
            do_picture_classification: true,
            images_scale: 2.0,
            generate_picture_images: true,
            generate_table_images: true,
        }
    }
}

impl PipelineOptions {
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Whether any page raster is needed at all.
    pub fn needs_page_images(&self) -> bool {
        self.generate_picture_images || self.generate_table_images
    }
}

/// Builder for [`PipelineOptions`].
#[derive(Debug)]
pub struct PipelineOptionsBuilder {
    options: PipelineOptions,
}

impl PipelineOptionsBuilder {
    pub fn ocr(mut self, enabled: bool) -> Self {
        self.options.ocr.enabled = enabled;
        self
    }

    pub fn force_full_page_ocr(mut self, v: bool) -> Self {
        self.options.ocr.force_full_page_ocr = v;
        self
    }

    pub fn ocr_languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.ocr.languages = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn ocr_engine(mut self, engine: OcrEngine) -> Self {
        self.options.ocr.engine = engine;
        self
    }

    pub fn table_structure(mut self, enabled: bool) -> Self {
        self.options.table_structure.enabled = enabled;
        self
    }

    pub fn table_mode(mut self, mode: TableFormerMode) -> Self {
        self.options.table_structure.mode = mode;
        self
    }

    pub fn cell_matching(mut self, v: bool) -> Self {
        self.options.table_structure.do_cell_matching = v;
        self
    }

    pub fn code_enrichment(mut self, v: bool) -> Self {
        self.options.do_code_enrichment = v;
        self
    }

    pub fn formula_enrichment(mut self, v: bool) -> Self {
        self.options.do_formula_enrichment = v;
        self
    }

    pub fn picture_classification(mut self, v: bool) -> Self {
        self.options.do_picture_classification = v;
        self
    }

    pub fn images_scale(mut self, scale: f32) -> Self {
        self.options.images_scale = scale;
        self
    }

    pub fn generate_picture_images(mut self, v: bool) -> Self {
        self.options.generate_picture_images = v;
        self
    }

    pub fn generate_table_images(mut self, v: bool) -> Self {
        self.options.generate_table_images = v;
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<PipelineOptions, Doc2MdError> {
        let o = &self.options;
        if !(o.images_scale > 0.0 && o.images_scale <= 10.0) {
            return Err(Doc2MdError::InvalidConfig(format!(
                "images_scale must be in (0, 10], got {}",
                o.images_scale
            )));
        }
        if o.ocr.enabled && o.ocr.languages.is_empty() {
            return Err(Doc2MdError::InvalidConfig(
                "OCR is enabled but no OCR language is configured".into(),
            ));
        }
        Ok(self.options)
    }
}

// ── Per-run options ──────────────────────────────────────────────────────

/// Options for one [`crate::convert::process_document`] run.
///
/// # Example
/// ```rust
/// use edgequake_doc2md::ProcessOptions;
///
/// let options = ProcessOptions::builder()
///     .collect_stats(true)
///     .build()
///     .unwrap();
/// assert_eq!(options.placeholder, "__IMAGE_PLACEHOLDER__");
/// ```
#[derive(Clone)]
pub struct ProcessOptions {
    /// Backend policy. Ignored when `converter` is set.
    pub pipeline: PipelineOptions,

    /// Token the exporter emits for unfilled image slots.
    pub placeholder: String,

    /// Sub-directory of the output directory that receives PNG files.
    pub images_dir_name: String,

    /// Sample memory and timings at each phase boundary. Default: false.
    pub collect_stats: bool,

    /// Pre-built converter. When `None`, one is constructed from
    /// `pipeline` during the initialization phase.
    pub converter: Option<Arc<DocumentConverter>>,

    /// Receives phase and image events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            pipeline: PipelineOptions::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            images_dir_name: DEFAULT_IMAGES_DIR.to_string(),
            collect_stats: false,
            converter: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessOptions")
            .field("pipeline", &self.pipeline)
            .field("placeholder", &self.placeholder)
            .field("images_dir_name", &self.images_dir_name)
            .field("collect_stats", &self.collect_stats)
            .field("converter", &self.converter.as_ref().map(|_| "<DocumentConverter>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ProcessOptions {
    pub fn builder() -> ProcessOptionsBuilder {
        ProcessOptionsBuilder {
            options: Self::default(),
        }
    }
}

/// Builder for [`ProcessOptions`].
#[derive(Debug)]
pub struct ProcessOptionsBuilder {
    options: ProcessOptions,
}

impl ProcessOptionsBuilder {
    pub fn pipeline(mut self, pipeline: PipelineOptions) -> Self {
        self.options.pipeline = pipeline;
        self
    }

    pub fn placeholder(mut self, token: impl Into<String>) -> Self {
        self.options.placeholder = token.into();
        self
    }

    pub fn images_dir_name(mut self, name: impl Into<String>) -> Self {
        self.options.images_dir_name = name.into();
        self
    }

    pub fn collect_stats(mut self, v: bool) -> Self {
        self.options.collect_stats = v;
        self
    }

    pub fn converter(mut self, converter: Arc<DocumentConverter>) -> Self {
        self.options.converter = Some(converter);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.options.progress_callback = Some(cb);
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<ProcessOptions, Doc2MdError> {
        let o = &self.options;
        if o.placeholder.is_empty() {
            return Err(Doc2MdError::InvalidConfig(
                "placeholder token must not be empty".into(),
            ));
        }
        if o.images_dir_name.is_empty()
            || o.images_dir_name.contains(['/', '\\'])
            || o.images_dir_name == ".."
        {
            return Err(Doc2MdError::InvalidConfig(format!(
                "images directory must be a single path component, got '{}'",
                o.images_dir_name
            )));
        }
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_fixed_pipeline() {
        let o = PipelineOptions::default();
        assert!(o.ocr.enabled);
        assert!(!o.ocr.force_full_page_ocr);
        assert_eq!(o.ocr.languages, vec!["en"]);
        assert_eq!(o.ocr.engine, OcrEngine::EasyOcr);
        assert!(o.table_structure.enabled);
        assert!(o.table_structure.do_cell_matching);
        assert_eq!(o.table_structure.mode, TableFormerMode::Fast);
        assert!(o.do_code_enrichment && o.do_formula_enrichment);
        assert!(o.do_picture_classification);
        assert_eq!(o.images_scale, 2.0);
        assert!(o.generate_picture_images && o.generate_table_images);
    }

    #[test]
    fn builder_rejects_bad_scale() {
        for bad in [0.0, -1.0, 10.5, f32::NAN] {
            let err = PipelineOptions::builder().images_scale(bad).build();
            assert!(err.is_err(), "scale {bad} should be rejected");
        }
        assert!(PipelineOptions::builder().images_scale(10.0).build().is_ok());
    }

    #[test]
    fn builder_requires_ocr_language() {
        let empty: Vec<String> = Vec::new();
        assert!(PipelineOptions::builder()
            .ocr_languages(empty.clone())
            .build()
            .is_err());
        assert!(PipelineOptions::builder()
            .ocr(false)
            .ocr_languages(empty)
            .build()
            .is_ok());
    }

    #[test]
    fn pipeline_options_serialise() {
        let json = serde_json::to_string(&PipelineOptions::default()).unwrap();
        assert!(json.contains(r#""engine":"easyocr""#), "got: {json}");
        assert!(json.contains(r#""mode":"fast""#));
    }

    #[test]
    fn process_options_validation() {
        assert!(ProcessOptions::builder().placeholder("").build().is_err());
        assert!(ProcessOptions::builder().images_dir_name("a/b").build().is_err());
        let o = ProcessOptions::builder()
            .placeholder("<<IMG>>")
            .build()
            .unwrap();
        assert_eq!(o.placeholder, "<<IMG>>");
        assert_eq!(o.images_dir_name, "images");
        assert!(!o.collect_stats);
    }
}
