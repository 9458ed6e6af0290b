//! Input format identification.
//!
//! The advertised set is deliberately small (`.pdf`, `.docx`, `.xlsx`,
//! `.pptx`). A file with any other extension is still attempted: its format
//! is sniffed from the leading bytes and, for ZIP containers, from the OOXML
//! part names inside.

use crate::backend::ooxml;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Extensions the CLI advertises as supported (lower-case, with dot).
pub const SUPPORTED_EXTENSIONS: [&str; 4] = [".docx", ".pdf", ".pptx", ".xlsx"];

/// Document formats understood by the built-in backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl InputFormat {
    /// Map a file extension (with or without the leading dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::Pptx),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    /// Canonical extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
            Self::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Pptx => "PPTX",
            Self::Xlsx => "XLSX",
        })
    }
}

/// Lower-cased extension of `path` including the dot, or `""`.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Whether the file's extension is in [`SUPPORTED_EXTENSIONS`].
pub fn is_supported_extension(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&dotted_extension(path).as_str())
}

/// Identify the format of `path`: extension first, then content sniffing.
pub fn detect(path: &Path) -> Option<InputFormat> {
    if let Some(format) = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(InputFormat::from_extension)
    {
        return Some(format);
    }
    let sniffed = sniff(path);
    debug!("Sniffed format of {}: {:?}", path.display(), sniffed);
    sniffed
}

/// Identify the format from file contents only.
pub fn sniff(path: &Path) -> Option<InputFormat> {
    let mut magic = [0u8; 4];
    std::fs::File::open(path)
        .and_then(|mut f| f.read_exact(&mut magic))
        .ok()?;

    match &magic {
        b"%PDF" => Some(InputFormat::Pdf),
        b"PK\x03\x04" => ooxml::sniff_package(path),
        _ => None,
    }
}
