//! CLI binary for edgequake-doc2md.
//!
//! A thin shim over the library crate: maps flags to a
//! [`ConversionRequest`] and [`ProcessOptions`], drives a spinner through the
//! progress callback and prints the summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_doc2md::format::SUPPORTED_EXTENSIONS;
use edgequake_doc2md::stats::{format_bytes, Phase, PhaseSample};
use edgequake_doc2md::{
    process_document, resolve_request, ConversionProgressCallback, ConversionStatus,
    ImageKind, ImageReference, ProcessOptions, ProcessOutput, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

/// `1234567` → `1,234,567`
fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── CLI progress callback ────────────────────────────────────────────────────

/// Prints the per-phase and per-image lines, through the spinner when one
/// is active so the lines do not tear it.
struct CliProgressCallback {
    bar: Option<ProgressBar>,
    show_stats: bool,
}

impl CliProgressCallback {
    fn new(spinner: bool, show_stats: bool) -> Arc<Self> {
        let bar = spinner.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_prefix("Preparing");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Arc::new(Self { bar, show_stats })
    }

    fn say(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }

    fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, initial_memory: Option<u64>) {
        if let (true, Some(memory)) = (self.show_stats, initial_memory) {
            self.say(format!("[Stats] Initial memory: {}\n", format_bytes(memory)));
        }
    }

    fn on_phase_start(&self, phase: Phase) {
        let (prefix, message) = match phase {
            Phase::Initialization => ("Initializing", "Initializing document converter..."),
            Phase::Conversion => (
                "Converting",
                "Converting document (this may take a while for large files)...",
            ),
            Phase::Export => ("Exporting", "Exporting to Markdown and extracting images..."),
        };
        match &self.bar {
            Some(bar) => {
                bar.set_prefix(prefix);
                bar.set_message(message);
            }
            None => println!("{message}"),
        }
    }

    fn on_phase_complete(&self, sample: &PhaseSample) {
        if self.show_stats {
            self.say(format!("{}\n", sample.summary_line()));
        }
    }

    fn on_degraded_result(&self, status: ConversionStatus, page_count: usize) {
        self.say(format!(
            "\n{} Conversion finished with status: {}",
            yellow("⚠"),
            bold(&status.to_string())
        ));
        self.say(
            "\nPossible issues:\n  \
             - Some pages could not be parsed or rendered\n  \
             - File may be corrupted or use unsupported features"
                .to_string(),
        );
        self.say(format!(
            "\nNote: Partial conversion succeeded for {page_count} page(s).\n\
             Attempting to export available content..."
        ));
    }

    fn on_image_saved(&self, image: &ImageReference) {
        let label = match image.kind {
            ImageKind::Table => "Saved table image",
            ImageKind::Picture => "Saved picture",
        };
        self.say(format!(
            "  {} {}: {}  {}",
            green("✓"),
            label,
            image.filename,
            dim(&format!("{}x{}", image.width, image.height))
        ));
    }

    fn on_image_skipped(&self, kind: ImageKind, item_index: usize) {
        self.say(format!(
            "  {} Skipping {} at element {} - no image available",
            yellow("Warning:"),
            kind,
            item_index
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a PDF into ./knowledge/report.md (+ ./knowledge/images/)
  doc2md --file report.pdf

  # Office formats, custom output directory, performance statistics
  doc2md --file slides.pptx --output-dir notes --stats

  # Machine-readable summary
  doc2md --file budget.xlsx --json > result.json

SUPPORTED FORMATS:
  .pdf   pdfium: text, embedded images, page crops of tables and pictures
  .docx  headings, lists, tables, code, formulas, embedded pictures
  .pptx  one page per slide: titles, bullets, tables, pictures
  .xlsx  one page per sheet: cell table, anchored pictures

  Other extensions are attempted after a warning; the format is then
  identified from the file contents.

ENVIRONMENT VARIABLES:
  DOC2MD_FILE         Default for --file
  DOC2MD_OUTPUT_DIR   Default for --output-dir
  DOC2MD_STATS        Default for --stats
  PDFIUM_LIB_PATH     pdfium shared library (file or directory)
  RUST_LOG            Log filter, overrides --verbose/--quiet
"#;

/// Convert PDF and Office documents to Markdown with extracted images.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Convert PDF, DOCX, PPTX and XLSX documents to Markdown with extracted images",
    long_about = "Convert a document to Markdown. Every table and picture is written as a PNG \
under <output-dir>/images/ and linked from <output-dir>/<stem>.md.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the document to process.
    #[arg(long, env = "DOC2MD_FILE")]
    file: PathBuf,

    /// Directory to save output files.
    #[arg(long, env = "DOC2MD_OUTPUT_DIR", default_value = "knowledge")]
    output_dir: PathBuf,

    /// Display memory usage and performance statistics.
    #[arg(long, env = "DOC2MD_STATS")]
    stats: bool,

    /// Print the run summary as JSON instead of text.
    #[arg(long, env = "DOC2MD_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "DOC2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner and the callback lines carry the user-facing feedback, so
    // library INFO logs are hidden while the spinner runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || cli.json {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("\n{} Error processing document: {e:#}", red("✗"));
            ExitCode::from(1)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let chatty = !cli.quiet && !cli.json;

    let request = resolve_request(&cli.file, &cli.output_dir)?;
    if chatty && !request.extension_supported {
        println!(
            "{} File extension '{}' may not be supported.",
            yellow("Warning:"),
            edgequake_doc2md::format::dotted_extension(&request.source)
        );
        println!("Supported extensions: {}", SUPPORTED_EXTENSIONS.join(", "));
        println!("Attempting to process anyway...\n");
    }
    if chatty {
        println!("Processing: {}", request.source.display());
        println!("Output will be saved to: {}\n", request.markdown_path().display());
    }

    let callback = chatty.then(|| CliProgressCallback::new(show_progress, cli.stats));
    let mut builder = ProcessOptions::builder().collect_stats(cli.stats);
    if let Some(cb) = &callback {
        builder = builder.progress_callback(Arc::clone(cb) as ProgressCallback);
    }
    let options = builder.build().context("Invalid configuration")?;

    let result = process_document(&request, &options).await;
    if let Some(cb) = &callback {
        cb.finish();
    }
    let output = result?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }
    if !cli.quiet {
        print_summary(&output, cli.stats);
    }
    Ok(())
}

fn print_summary(output: &ProcessOutput, show_stats: bool) {
    println!(
        "\n  Replaced {} image placeholders with references",
        output.images.len()
    );
    if output.unresolved_placeholders > 0 {
        println!(
            "  {} {} placeholder(s) left unresolved",
            yellow("Warning:"),
            output.unresolved_placeholders
        );
    }

    let size = std::fs::metadata(&output.markdown_path)
        .map(|m| m.len())
        .unwrap_or_else(|_| output.output_size());

    println!(
        "\n{} Success! Document processed and saved to: {}",
        green("✓"),
        bold(&output.markdown_path.display().to_string())
    );
    println!("  Pages processed: {}", output.page_count);
    println!(
        "  Images extracted: {}  {}",
        output.images.len(),
        dim(&format!(
            "({} tables, {} pictures)",
            output.count(ImageKind::Table),
            output.count(ImageKind::Picture)
        ))
    );
    println!("  Output size: {} bytes", thousands(size));
    if !output.page_errors.is_empty() {
        println!("  Page errors: {}", output.page_errors.len());
    }

    if show_stats {
        println!("{}", output.stats.report());
    }
}
