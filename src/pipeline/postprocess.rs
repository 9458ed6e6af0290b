//! Post-processing: deterministic cleanup of exported Markdown.
//!
//! Backends emit text exactly as found in the source: Windows line endings
//! from PDF text layers, trailing spaces from Word runs, zero-width joiners
//! and soft hyphens, runs of empty paragraphs. These passes normalise that
//! without touching content. Fenced code blocks are left alone by the
//! passes that reason about lines, and placeholder tokens and image links
//! pass through untouched.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later pass sees `\n` only;
//! the final-newline pass runs last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to exported Markdown.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines to a single blank line (outside code)
/// 5. Ensure heading lines have a blank line before them (outside code)
/// 6. Ensure the file ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s{0,3}(```|~~~)").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut in_code = false;
    for line in input.lines() {
        if RE_FENCE.is_match(line) {
            in_code = !in_code;
        }
        let blank = line.is_empty();
        if blank && !in_code && out.last().is_some_and(|prev| prev.is_empty()) {
            continue;
        }
        out.push(line);
    }
    out.join("\n")
}

// ── Rule 5: Normalise heading spacing ────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6} ").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    let mut in_code = false;
    for (i, line) in input.lines().enumerate() {
        if RE_FENCE.is_match(line) {
            in_code = !in_code;
        }
        if !in_code && i > 0 && RE_HEADING.is_match(line) {
            let trimmed = result.trim_end_matches('\n');
            result.truncate(trimmed.len());
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule 6: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
