//! Input resolution: turn a user-supplied path and output directory into a
//! [`ConversionRequest`].
//!
//! The source must exist, be a regular file and be readable; anything else
//! is a usage error reported before any backend is loaded. An extension
//! outside the supported set only produces a warning: the converter still
//! tries to identify the content. The output directory is not checked
//! here; it is created when the run starts.

use crate::document::ImageKind;
use crate::error::Doc2MdError;
use crate::format::{self, InputFormat};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A validated conversion job. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionRequest {
    /// Absolute path of the input document.
    pub source: PathBuf,
    /// Absolute output directory.
    pub output_dir: PathBuf,
    /// File stem of the source; names the Markdown file and images.
    pub stem: String,
    /// Format implied by the extension, if any.
    pub format_hint: Option<InputFormat>,
    pub extension_supported: bool,
}

impl ConversionRequest {
    /// `<output_dir>/<stem>.md`
    pub fn markdown_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.md", self.stem))
    }

    /// `<output_dir>/<name>`
    pub fn images_dir(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// `{stem}-{kind}-{ordinal}.png`
    pub fn image_filename(&self, kind: ImageKind, ordinal: usize) -> String {
        format!("{}-{}-{}.png", self.stem, kind, ordinal)
    }
}

/// Validate `file` and build a request writing into `output_dir`.
pub fn resolve_request(
    file: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
) -> Result<ConversionRequest, Doc2MdError> {
    let file = file.as_ref();
    let source = std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf());
    let output_dir = output_dir.as_ref();
    let output_dir = std::path::absolute(output_dir).unwrap_or_else(|_| output_dir.to_path_buf());

    let metadata = match std::fs::metadata(&source) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(Doc2MdError::PermissionDenied { path: source });
        }
        Err(_) => return Err(Doc2MdError::FileNotFound { path: source }),
    };
    if !metadata.is_file() {
        return Err(Doc2MdError::NotAFile { path: source });
    }

    if let Err(e) = std::fs::File::open(&source) {
        return Err(match e.kind() {
            ErrorKind::PermissionDenied => Doc2MdError::PermissionDenied { path: source },
            _ => Doc2MdError::FileNotFound { path: source },
        });
    }

    let extension_supported = format::is_supported_extension(&source);
    if !extension_supported {
        warn!(
            "Unsupported file extension '{}'. Supported extensions: {}. Attempting conversion anyway.",
            format::dotted_extension(&source),
            format::SUPPORTED_EXTENSIONS.join(", ")
        );
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());

    let format_hint = source
        .extension()
        .and_then(|e| e.to_str())
        .and_then(InputFormat::from_extension);

    debug!(
        "Resolved request: {} → {} (stem '{}')",
        source.display(),
        output_dir.display(),
        stem
    );

    Ok(ConversionRequest {
        source,
        output_dir,
        stem,
        format_hint,
        extension_supported,
    })
}
