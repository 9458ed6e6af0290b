//! # edgequake-doc2md
//!
//! Convert PDF, DOCX, PPTX and XLSX documents to Markdown, with every table
//! and picture written out as a PNG file and linked from the text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Input    validate the path, name the outputs
//!  ├─ 2. Init     build the DocumentConverter (binds pdfium)
//!  ├─ 3. Convert  backend → StructuredDocument (spawn_blocking)
//!  ├─ 4. Extract  tables/pictures → images/{stem}-{kind}-{n}.png
//!  ├─ 5. Export   Markdown with image links (or GFM tables)
//!  ├─ 6. Polish   whitespace and Unicode cleanup
//!  └─ 7. Output   {output_dir}/{stem}.md, written atomically
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2md::{convert_file, ProcessOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ProcessOptions::builder().collect_stats(true).build()?;
//!     let output = convert_file("report.docx", "knowledge", &options).await?;
//!     println!("{} → {}", output.source.display(), output.markdown_path.display());
//!     println!("{}", output.stats.report());
//!     Ok(())
//! }
//! ```
//!
//! ## Backends
//!
//! | Format | Backend | Element images |
//! |--------|---------|----------------|
//! | PDF    | pdfium  | crops of the rendered page, embedded images |
//! | DOCX   | XML     | embedded media |
//! | PPTX   | XML     | embedded media |
//! | XLSX   | calamine + XML | drawings anchored on the sheet |
//!
//! The pdfium backend needs the pdfium shared library at runtime; set
//! `PDFIUM_LIB_PATH` or place it next to the binary. Without it PDF input
//! fails with [`Doc2MdError::BackendUnavailable`] while Office formats keep
//! working.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod format;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stats;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{
    BackendCapabilities, ConversionResult, ConversionStatus, DocumentBackend, DocumentConverter,
};
pub use config::{
    OcrEngine, OcrOptions, PipelineOptions, PipelineOptionsBuilder, ProcessOptions,
    ProcessOptionsBuilder, TableFormerMode, TableStructureOptions, DEFAULT_IMAGES_DIR,
    DEFAULT_PLACEHOLDER,
};
pub use convert::{convert_file, process_document, process_document_sync};
pub use document::{DocItem, ImageKind, StructuredDocument};
pub use error::{Doc2MdError, PageError};
pub use format::InputFormat;
pub use output::{ImageReference, ProcessOutput, SkippedImage};
pub use pipeline::export::{ExportOptions, ImageRefMode};
pub use pipeline::input::{resolve_request, ConversionRequest};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stats::{format_bytes, RunStats};
