//! Error types for the edgequake-doc2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Doc2MdError`] is **fatal**: the run cannot produce a Markdown file
//!   (missing input, no backend for the format, zero pages extracted, output
//!   not writable). Returned as `Err(Doc2MdError)` from
//!   [`crate::convert::process_document`].
//!
//! * [`PageError`] is **non-fatal**: a single page could not be processed by
//!   the backend but the others are fine. Stored inside
//!   [`crate::backend::ConversionResult`] so a partial document still yields
//!   usable output.
//!
//! Per-element image failures are not errors at all: the element is skipped
//! and recorded in [`crate::output::SkippedImage`].

use crate::format::InputFormat;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-doc2md library.
#[derive(Debug, Error)]
pub enum Doc2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The path exists but is a directory or special file.
    #[error("Not a file: '{path}'")]
    NotAFile { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Neither the extension nor the file contents identify a known format.
    #[error("Cannot determine document format of '{path}': {detail}")]
    UnsupportedFormat { path: PathBuf, detail: String },

    // ── Backend errors ────────────────────────────────────────────────────
    /// No backend is registered for the format, or its native library
    /// could not be loaded.
    #[error("No backend available for {format}: {reason}")]
    BackendUnavailable { format: InputFormat, reason: String },

    /// The container or PDF structure could not be parsed at all.
    #[error("Document '{path}' is corrupt: {detail}")]
    CorruptDocument { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library in the working\n\
directory, or install it on the system library path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Result errors ─────────────────────────────────────────────────────
    /// The backend returned no document at all.
    #[error("No content could be extracted from this document (status: {status}).\n{first_error}")]
    NoContent { status: String, first_error: String },

    /// The backend returned a document with zero pages.
    #[error("No pages could be extracted from this document (status: {status})")]
    NoPagesExtracted { status: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create a directory or write an output file.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// PNG encoding of an element image failed.
    #[error("Failed to encode image '{filename}': {detail}")]
    ImageEncodeFailed { filename: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page (or sheet, or slide).
///
/// The overall conversion continues unless no page at all survives.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The backend could not load or parse the page.
    #[error("Page {page}: failed to load: {detail}")]
    LoadFailed { page: usize, detail: String },

    /// The page loaded but its raster could not be produced.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The page loaded but its text layer could not be read.
    #[error("Page {page}: text extraction failed: {detail}")]
    TextFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::LoadFailed { page, .. }
            | PageError::RenderFailed { page, .. }
            | PageError::TextFailed { page, .. } => *page,
        }
    }
}
