//! Markdown export.
//!
//! Walks the document items in reading order and renders one block per
//! element. Table and picture slots are filled according to
//! [`ImageRefMode`]:
//!
//! * `Referenced` – the link of the [`ImageReference`] recorded for that
//!   element index; elements without one keep the placeholder token.
//! * `Embedded` – the element image inlined as a base64 PNG data URI.
//! * `Placeholder` – the placeholder token, for [`splice_placeholders`]
//!   to fill in order afterwards.
//!
//! A table without a raster but with cell text is written as a GFM table.

use crate::config::{DEFAULT_IMAGES_DIR, DEFAULT_PLACEHOLDER};
use crate::document::{DocItem, StructuredDocument, TableItem};
use crate::output::ImageReference;
use crate::pipeline::encode;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

static RE_ORDERED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s{0,3}\d{1,9})([.)])(\s|$)").unwrap());
static RE_BLOCK_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s{0,3})(#{1,6}(?:\s|$)|[-+*](?:\s|$)|>|```|~~~|(?:[-*_=][ \t]*){3,}$)").unwrap()
});

/// How table and picture slots are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageRefMode {
    #[default]
    Placeholder,
    Embedded,
    Referenced,
}

/// Options for [`to_markdown`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportOptions {
    pub mode: ImageRefMode,
    pub placeholder: String,
    /// Directory prefix used in image links.
    pub images_dir: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            mode: ImageRefMode::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            images_dir: DEFAULT_IMAGES_DIR.to_string(),
        }
    }
}

impl ExportOptions {
    pub fn with_mode(mut self, mode: ImageRefMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Render `doc` as Markdown.
pub fn to_markdown(
    doc: &StructuredDocument,
    options: &ExportOptions,
    refs: &[ImageReference],
) -> String {
    let by_index: HashMap<usize, &ImageReference> =
        refs.iter().map(|r| (r.item_index, r)).collect();
    let mut blocks: Vec<String> = Vec::new();
    let mut list = ListNumbering::default();

    for (index, item) in doc.iterate_items() {
        if item.is_furniture() {
            continue;
        }

        if let DocItem::ListItem {
            text,
            ordered,
            level,
            ..
        } = item
        {
            let line = list.line(text, *ordered, *level);
            match blocks.last_mut() {
                Some(last) if list.active => {
                    last.push('\n');
                    last.push_str(&line);
                }
                _ => blocks.push(line),
            }
            list.active = true;
            continue;
        }
        list.reset();

        match item {
            DocItem::Title { text, .. } => blocks.push(format!("# {text}")),
            DocItem::SectionHeader { text, level, .. } => {
                let hashes = "#".repeat((*level as usize + 1).clamp(2, 6));
                blocks.push(format!("{hashes} {text}"));
            }
            DocItem::Paragraph { text, .. } => blocks.push(escape_block_start(text)),
            DocItem::Code { text, language, .. } => blocks.push(format!(
                "```{}\n{}\n```",
                language.as_deref().unwrap_or_default(),
                text
            )),
            DocItem::Formula { text, .. } => blocks.push(format!("$${text}$$")),
            DocItem::Table(table) => {
                if let Some(caption) = &table.caption {
                    blocks.push(caption.clone());
                }
                blocks.push(image_slot(doc, index, item, Some(table), options, &by_index));
            }
            DocItem::Picture(picture) => {
                if let Some(caption) = &picture.caption {
                    blocks.push(caption.clone());
                }
                blocks.push(image_slot(doc, index, item, None, options, &by_index));
            }
            DocItem::ListItem { .. } | DocItem::PageHeader { .. } | DocItem::PageFooter { .. } => {}
        }
    }

    blocks.join("\n\n")
}

fn image_slot(
    doc: &StructuredDocument,
    index: usize,
    item: &DocItem,
    table: Option<&TableItem>,
    options: &ExportOptions,
    by_index: &HashMap<usize, &ImageReference>,
) -> String {
    let kind = item.image_kind().map(|k| k.as_str()).unwrap_or("image");

    match options.mode {
        ImageRefMode::Referenced => {
            if let Some(reference) = by_index.get(&index) {
                return reference.markdown_link(&options.images_dir);
            }
        }
        ImageRefMode::Embedded => {
            if let Some(image) = doc.element_image(item) {
                match encode::png_data_uri(&image) {
                    Ok(uri) => return format!("![{kind}]({uri})"),
                    Err(e) => debug!("Cannot embed {} at item {}: {}", kind, index, e),
                }
            }
        }
        ImageRefMode::Placeholder => {}
    }

    if let Some(table) = table {
        let raster_pending = options.mode == ImageRefMode::Placeholder && doc.has_element_image(item);
        if !table.cells.is_empty() && !raster_pending {
            return gfm_table(&table.cells);
        }
    }

    options.placeholder.clone()
}

#[derive(Default)]
struct ListNumbering {
    active: bool,
    counters: Vec<usize>,
}

impl ListNumbering {
    fn line(&mut self, text: &str, ordered: bool, level: u8) -> String {
        let level = level as usize;
        self.counters.resize(level + 1, 0);
        let indent = "    ".repeat(level);
        if ordered {
            self.counters[level] += 1;
            format!("{indent}{}. {text}", self.counters[level])
        } else {
            self.counters[level] = 0;
            format!("{indent}- {text}")
        }
    }

    fn reset(&mut self) {
        self.active = false;
        self.counters.clear();
    }
}

/// Backslash-escape markers that would turn a text line into a heading,
/// list item, quote, fence or rule.
fn escape_block_start(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = RE_ORDERED_MARKER.replace(line, "${1}\\${2}${3}");
            RE_BLOCK_MARKER.replace(&line, "${1}\\${2}").into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cell grid as a GFM table; the first row is the header.
pub fn gfm_table(cells: &[Vec<String>]) -> String {
    let width = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let row = |r: &[String]| {
        let mut line = String::from("|");
        for col in 0..width {
            let cell = r.get(col).map(|c| escape_cell(c)).unwrap_or_default();
            line.push(' ');
            line.push_str(&cell);
            line.push_str(" |");
        }
        line
    };

    let mut lines = Vec::with_capacity(cells.len() + 1);
    lines.push(row(cells.first().map(Vec::as_slice).unwrap_or(&[])));
    lines.push(format!("|{}", " --- |".repeat(width)));
    lines.extend(cells.iter().skip(1).map(|r| row(r.as_slice())));
    lines.join("\n")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Result of [`splice_placeholders`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceOutcome {
    pub markdown: String,
    /// Number of tokens replaced.
    pub replaced: usize,
    /// Tokens still present afterwards.
    pub leftover: usize,
}

/// Replace placeholder tokens with image links, first occurrence first.
///
/// Exactly `min(refs.len(), token count)` tokens are replaced, in
/// document order, with the references in list order. Extra tokens stay
/// verbatim; extra references are dropped.
pub fn splice_placeholders(
    markdown: &str,
    token: &str,
    refs: &[ImageReference],
    images_dir: &str,
) -> SpliceOutcome {
    if token.is_empty() {
        return SpliceOutcome {
            markdown: markdown.to_string(),
            replaced: 0,
            leftover: 0,
        };
    }

    let mut out = String::with_capacity(markdown.len() + refs.len() * 48);
    let mut rest = markdown;
    let mut replaced = 0;

    for reference in refs {
        let Some(pos) = rest.find(token) else {
            break;
        };
        out.push_str(&rest[..pos]);
        out.push_str(&reference.markdown_link(images_dir));
        rest = &rest[pos + token.len()..];
        replaced += 1;
    }

    let leftover = rest.matches(token).count();
    out.push_str(rest);

    SpliceOutcome {
        markdown: out,
        replaced,
        leftover,
    }
}

/// Number of placeholder tokens in `markdown`.
pub fn count_placeholders(markdown: &str, token: &str) -> usize {
    if token.is_empty() {
        0
    } else {
        markdown.matches(token).count()
    }
}
