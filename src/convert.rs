//! Conversion entry points.
//!
//! [`process_document`] runs one request end to end: build the converter,
//! convert the file, write element images, export and clean the Markdown,
//! then write `<output_dir>/<stem>.md`. Stages run strictly in sequence;
//! blocking backend work is moved to `spawn_blocking`.

use crate::backend::DocumentConverter;
use crate::config::ProcessOptions;
use crate::error::Doc2MdError;
use crate::output::ProcessOutput;
use crate::pipeline::export::{self, ExportOptions, ImageRefMode};
use crate::pipeline::input::{self, ConversionRequest};
use crate::pipeline::{extract, postprocess};
use crate::progress::ProgressCallback;
use crate::stats::{Phase, StatsRecorder};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Convert the document described by `request`.
///
/// # Returns
/// `Ok(ProcessOutput)` whenever a Markdown file was written, including
/// degraded conversions (check `output.status` and `output.page_errors`).
///
/// # Errors
/// - No backend for the format, or the format cannot be identified
/// - The backend produced no document, or a document with zero pages
/// - The output directory, an image or the Markdown file cannot be written
pub async fn process_document(
    request: &ConversionRequest,
    options: &ProcessOptions,
) -> Result<ProcessOutput, Doc2MdError> {
    let progress = options.progress_callback.as_ref();

    // ── Step 1: Start instrumentation ────────────────────────────────────
    let mut stats = StatsRecorder::start(options.collect_stats);
    if let Some(cb) = progress {
        cb.on_run_start(stats.initial_memory());
    }
    info!("Processing document: {}", request.source.display());

    // ── Step 2: Prepare output directories ───────────────────────────────
    let images_dir = request.images_dir(&options.images_dir_name);
    create_dir(&request.output_dir).await?;
    create_dir(&images_dir).await?;

    // ── Step 3: Build the converter ──────────────────────────────────────
    stats.begin();
    phase_started(progress, Phase::Initialization);
    let converter = match &options.converter {
        Some(converter) => Arc::clone(converter),
        None => {
            let pipeline = options.pipeline.clone();
            debug!("Pipeline options: {:?}", pipeline);
            let converter = tokio::task::spawn_blocking(move || DocumentConverter::new(pipeline))
                .await
                .map_err(|e| Doc2MdError::Internal(format!("Converter setup panicked: {e}")))?;
            Arc::new(converter)
        }
    };
    phase_finished(&mut stats, progress, Phase::Initialization);

    // ── Step 4: Convert ──────────────────────────────────────────────────
    phase_started(progress, Phase::Conversion);
    let result = {
        let converter = Arc::clone(&converter);
        let source = request.source.clone();
        tokio::task::spawn_blocking(move || converter.convert(&source))
            .await
            .map_err(|e| Doc2MdError::Internal(format!("Conversion task panicked: {e}")))??
    };
    phase_finished(&mut stats, progress, Phase::Conversion);

    // ── Step 5: Check the result ─────────────────────────────────────────
    let status = result.status;
    let first_error = result.first_error();
    let Some(document) = result.document else {
        return Err(Doc2MdError::NoContent {
            status: status.to_string(),
            first_error: first_error.unwrap_or_else(|| "Unknown error".to_string()),
        });
    };
    let page_count = document.page_count();
    if page_count == 0 {
        return Err(Doc2MdError::NoPagesExtracted {
            status: status.to_string(),
        });
    }
    if !status.is_success() {
        warn!(
            "Document conversion completed with status: {} ({} pages extracted, {} page errors). Continuing with partial results.",
            status,
            page_count,
            result.errors.len()
        );
        if let Some(cb) = progress {
            cb.on_degraded_result(status, page_count);
        }
    }
    info!("Document has {} pages", page_count);

    // ── Step 6: Write element images ─────────────────────────────────────
    phase_started(progress, Phase::Export);
    let backend = converter.backend_for(result.format)?;
    let document = Arc::new(document);
    let extraction = extract::extract_images(
        Arc::clone(&backend),
        Arc::clone(&document),
        request,
        &images_dir,
        converter.options(),
        progress,
    )
    .await?;

    // ── Step 7: Export Markdown ──────────────────────────────────────────
    let keyed = backend.capabilities().keyed_image_export;
    let export_options = ExportOptions {
        mode: if keyed {
            ImageRefMode::Referenced
        } else {
            ImageRefMode::Placeholder
        },
        placeholder: options.placeholder.clone(),
        images_dir: options.images_dir_name.clone(),
    };
    let mut markdown = backend.export_markdown(&document, &export_options, &extraction.references);
    if !keyed {
        let spliced = export::splice_placeholders(
            &markdown,
            &options.placeholder,
            &extraction.references,
            &options.images_dir_name,
        );
        debug!(
            "Spliced {} image links into placeholders ({} left)",
            spliced.replaced, spliced.leftover
        );
        markdown = spliced.markdown;
    }

    // ── Step 8: Post-process ─────────────────────────────────────────────
    let markdown = postprocess::clean_markdown(&markdown);

    // ── Step 9: Report unresolved placeholders ───────────────────────────
    let unresolved = export::count_placeholders(&markdown, &options.placeholder);
    if unresolved > 0 {
        warn!(
            "{} image placeholder(s) could not be resolved and remain in the output",
            unresolved
        );
    }

    // ── Step 10: Write Markdown ──────────────────────────────────────────
    let markdown_path = request.markdown_path();
    write_atomic(&markdown_path, &markdown).await?;
    info!("Saved markdown: {}", markdown_path.display());
    phase_finished(&mut stats, progress, Phase::Export);

    // ── Step 11: Finish ──────────────────────────────────────────────────
    let stats = stats.finish();
    info!(
        "Conversion complete: {} pages, {} images, {:.2}s total",
        page_count,
        extraction.references.len(),
        stats.total_secs
    );

    Ok(ProcessOutput {
        source: request.source.clone(),
        format: result.format,
        backend: result.backend,
        status,
        markdown_path,
        images_dir,
        markdown,
        page_count,
        images: extraction.references,
        skipped_images: extraction.skipped,
        unresolved_placeholders: unresolved,
        page_errors: result.errors,
        stats,
    })
}

/// Resolve `file` and convert it into `output_dir`.
pub async fn convert_file(
    file: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &ProcessOptions,
) -> Result<ProcessOutput, Doc2MdError> {
    let request = input::resolve_request(file, output_dir)?;
    process_document(&request, options).await
}

/// Synchronous wrapper around [`process_document`].
///
/// Creates a current-thread tokio runtime internally.
pub fn process_document_sync(
    request: &ConversionRequest,
    options: &ProcessOptions,
) -> Result<ProcessOutput, Doc2MdError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Doc2MdError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(process_document(request, options))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn phase_started(progress: Option<&ProgressCallback>, phase: Phase) {
    debug!("Starting {} phase", phase);
    if let Some(cb) = progress {
        cb.on_phase_start(phase);
    }
}

fn phase_finished(stats: &mut StatsRecorder, progress: Option<&ProgressCallback>, phase: Phase) {
    let sample = stats.record(phase);
    if let Some(cb) = progress {
        cb.on_phase_complete(&sample);
    }
}

async fn create_dir(path: &Path) -> Result<(), Doc2MdError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Doc2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Write to `<path>.tmp`, then rename over `path`.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), Doc2MdError> {
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| Doc2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Doc2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
