//! Image extraction: write one PNG per renderable table and picture.
//!
//! Elements are visited once, in reading order. Each element is rendered
//! and PNG-encoded in `spawn_blocking` (cropping large page rasters is
//! CPU-bound) and written with `tokio::fs` before the next one starts.
//! The per-kind counter only advances when a file is actually written, so
//! numbering stays contiguous even when some elements have no image.

use crate::backend::DocumentBackend;
use crate::config::PipelineOptions;
use crate::document::{ImageKind, StructuredDocument};
use crate::error::Doc2MdError;
use crate::output::{ImageReference, SkippedImage};
use crate::pipeline::encode;
use crate::pipeline::input::ConversionRequest;
use crate::progress::ProgressCallback;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What [`extract_images`] produced.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    /// Written images in reading order.
    pub references: Vec<ImageReference>,
    pub skipped: Vec<SkippedImage>,
}

struct EncodedImage {
    width: u32,
    height: u32,
    png: Vec<u8>,
}

/// Render every table and picture of `document` into `images_dir`.
///
/// Elements without an image are skipped with a warning. Failing to write
/// a file is fatal.
pub async fn extract_images(
    backend: Arc<dyn DocumentBackend>,
    document: Arc<StructuredDocument>,
    request: &ConversionRequest,
    images_dir: &Path,
    options: &PipelineOptions,
    progress: Option<&ProgressCallback>,
) -> Result<ExtractionOutcome, Doc2MdError> {
    let mut outcome = ExtractionOutcome::default();
    let mut table_counter = 0usize;
    let mut picture_counter = 0usize;

    for (item_index, item) in document.iterate_items() {
        let Some(kind) = item.image_kind() else {
            continue;
        };
        let page_no = item.page_no();
        let enabled = match kind {
            ImageKind::Table => options.generate_table_images,
            ImageKind::Picture => options.generate_picture_images,
        };
        let counter = match kind {
            ImageKind::Table => &mut table_counter,
            ImageKind::Picture => &mut picture_counter,
        };
        let ordinal = *counter + 1;
        let filename = request.image_filename(kind, ordinal);

        let rendered = if enabled {
            let backend = Arc::clone(&backend);
            let document = Arc::clone(&document);
            let name = filename.clone();
            // One element at a time keeps at most one encoded image in memory.
            tokio::task::spawn_blocking(move || {
                render_one(backend.as_ref(), &document, item_index, &name)
            })
            .await
            .map_err(|e| Doc2MdError::Internal(format!("Image rendering task panicked: {e}")))?
        } else {
            Err(format!("{kind} image generation is disabled"))
        };

        let image = match rendered {
            Ok(image) => image,
            Err(reason) => {
                warn!(
                    "Could not get image for {} at element {} (page {}): {}",
                    kind,
                    item_index,
                    page_no.map_or("?".to_string(), |p| p.to_string()),
                    reason
                );
                if let Some(cb) = progress {
                    cb.on_image_skipped(kind, item_index);
                }
                outcome.skipped.push(SkippedImage {
                    kind,
                    item_index,
                    page_no,
                    reason,
                });
                continue;
            }
        };

        let path = images_dir.join(&filename);
        tokio::fs::write(&path, &image.png)
            .await
            .map_err(|e| Doc2MdError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        *counter = ordinal;

        info!("Saved {} image: {}", kind, path.display());
        let reference = ImageReference {
            kind,
            filename,
            item_index,
            ordinal,
            page_no,
            width: image.width,
            height: image.height,
        };
        if let Some(cb) = progress {
            cb.on_image_saved(&reference);
        }
        outcome.references.push(reference);
    }

    debug!(
        "Extracted {} tables, {} pictures, skipped {}",
        table_counter,
        picture_counter,
        outcome.skipped.len()
    );
    Ok(outcome)
}

/// Render and encode one element; `Err` carries the skip reason.
fn render_one(
    backend: &dyn DocumentBackend,
    document: &StructuredDocument,
    item_index: usize,
    filename: &str,
) -> Result<EncodedImage, String> {
    let item = document
        .items
        .get(item_index)
        .ok_or_else(|| format!("element {item_index} does not exist"))?;
    let image = backend
        .render_element_image(document, item)
        .ok_or_else(|| "no image available".to_string())?;
    let png = encode::encode_png(&image).map_err(|e| {
        Doc2MdError::ImageEncodeFailed {
            filename: filename.to_string(),
            detail: e.to_string(),
        }
        .to_string()
    })?;
    Ok(EncodedImage {
        width: image.width(),
        height: image.height(),
        png,
    })
}
