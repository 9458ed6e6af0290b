//! Output types returned by [`crate::convert::process_document`].

use crate::backend::ConversionStatus;
use crate::document::ImageKind;
use crate::error::PageError;
use crate::format::InputFormat;
use crate::stats::RunStats;
use serde::Serialize;
use std::path::PathBuf;

/// One image written to the images directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReference {
    pub kind: ImageKind,
    /// File name inside the images directory, e.g. `report-table-1.png`.
    pub filename: String,
    /// Index of the source element in `StructuredDocument::items`.
    pub item_index: usize,
    /// 1-based position among images of the same kind.
    pub ordinal: usize,
    pub page_no: Option<u32>,
    pub width: u32,
    pub height: u32,
}

impl ImageReference {
    /// Markdown link relative to the Markdown file.
    pub fn markdown_link(&self, images_dir: &str) -> String {
        format!("![{}]({}/{})", self.kind, images_dir, self.filename)
    }
}

/// A table or picture for which no image file was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedImage {
    pub kind: ImageKind,
    pub item_index: usize,
    pub page_no: Option<u32>,
    pub reason: String,
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutput {
    pub source: PathBuf,
    pub format: InputFormat,
    pub backend: String,
    pub status: ConversionStatus,
    pub markdown_path: PathBuf,
    pub images_dir: PathBuf,
    /// Final Markdown text (also written to `markdown_path`).
    #[serde(skip)]
    pub markdown: String,
    pub page_count: usize,
    pub images: Vec<ImageReference>,
    pub skipped_images: Vec<SkippedImage>,
    /// Placeholder tokens left in the Markdown.
    pub unresolved_placeholders: usize,
    pub page_errors: Vec<PageError>,
    pub stats: RunStats,
}

impl ProcessOutput {
    pub fn count(&self, kind: ImageKind) -> usize {
        self.images.iter().filter(|r| r.kind == kind).count()
    }

    /// Size of the Markdown in bytes.
    pub fn output_size(&self) -> u64 {
        self.markdown.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_form() {
        let r = ImageReference {
            kind: ImageKind::Table,
            filename: "doc-table-2.png".into(),
            item_index: 7,
            ordinal: 2,
            page_no: Some(3),
            width: 10,
            height: 10,
        };
        assert_eq!(r.markdown_link("images"), "![table](images/doc-table-2.png)");
    }
}
