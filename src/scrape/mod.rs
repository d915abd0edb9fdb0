pub mod page;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::debug;

use crate::pr::types::{DiffLine, FileDiff, LineKind};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Invalid CSS selector {css:?}: {reason}")]
    Selector { css: String, reason: String },
}

const CONTAINERS: &str = "table[aria-label*=\"Diff for:\"], table[data-diff-anchor], \
    .file-diff, .js-file-diff-split, [data-diff-anchor]";
const FILE_NAME: &str =
    ".DiffFileHeader-module__file-name--mY1O5, .file-header, [data-path], .file-info a";
const ROWS: &str = "tr.diff-line-row, tr[data-hunk], tr.js-diff-row, tr[class*=\"diff\"]";
const HUNK_CELLS: &str = "td.diff-hunk-cell, td.hunk";
const ADDITION_CELLS: &str =
    "td[style*=\"diffBlob-addition\"], .addition, td.blob-code-addition";
const DELETION_CELLS: &str =
    "td[style*=\"diffBlob-deletion\"], .deletion, td.blob-code-deletion";

const LABEL_PREFIX: &str = "Diff for: ";

/// Resolves a file path for one diff container.
type PathRule = fn(&DomDiffScraper, ElementRef<'_>) -> Option<String>;

/// Classifies one diff row, or passes.
type KindRule = fn(&DomDiffScraper, ElementRef<'_>) -> Option<LineKind>;

/// Tried in order; the first non-empty path wins.
const PATH_RULES: &[PathRule] = &[
    DomDiffScraper::path_from_label,
    DomDiffScraper::path_from_attribute,
    DomDiffScraper::path_from_text,
];

/// Tried in order; the first match wins, rows matching none are context.
const KIND_RULES: &[KindRule] = &[
    DomDiffScraper::kind_from_cell_type,
    DomDiffScraper::kind_from_marker,
    DomDiffScraper::kind_from_classes,
];

/// Turns GitHub's rendered diff tables back into canonical diff lines.
///
/// GitHub has shipped several diff markups over the years, and the unified
/// and split layouts coexist. Each step (path, line kind, text, number) is a
/// list of independent rules, so one file rendered in an older layout does
/// not break the rest of the page.
pub struct DomDiffScraper {
    containers: Selector,
    file_name: Selector,
    rows: Selector,
    hunk_cells: Selector,
    cells: Selector,
    typed_cells: Selector,
    marker: Selector,
    text_inner: Selector,
    addition_cells: Selector,
    deletion_cells: Selector,
    context_cells: Selector,
    addition: Selector,
    deletion: Selector,
    title: Selector,
    descriptions: Vec<Selector>,
}

pub(crate) fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector {
        css: css.to_string(),
        reason: e.to_string(),
    })
}

impl DomDiffScraper {
    pub fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            containers: selector(CONTAINERS)?,
            file_name: selector(FILE_NAME)?,
            rows: selector(ROWS)?,
            hunk_cells: selector(HUNK_CELLS)?,
            cells: selector("td")?,
            typed_cells: selector("td[data-line-type]")?,
            marker: selector("span.diff-text-marker")?,
            text_inner: selector(".diff-text-inner")?,
            addition_cells: selector(ADDITION_CELLS)?,
            deletion_cells: selector(DELETION_CELLS)?,
            context_cells: selector("td.blob-code-context")?,
            addition: selector(".addition")?,
            deletion: selector(".deletion")?,
            title: selector(page::TITLE)?,
            descriptions: page::DESCRIPTIONS
                .iter()
                .map(|css| selector(css))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Scrape every diff container of a parsed page, in document order.
    pub fn scrape_document(&self, document: &Html) -> Vec<FileDiff> {
        self.scrape(document.select(&self.containers))
    }

    /// Scrape the given containers in order. Containers without a resolvable
    /// path, and files whose rows yield no lines, are left out.
    pub fn scrape<'a>(&self, containers: impl IntoIterator<Item = ElementRef<'a>>) -> Vec<FileDiff> {
        let mut files = Vec::new();
        for container in containers {
            let Some(path) = self.resolve_path(container) else {
                debug!("skipping diff container without a file path");
                continue;
            };

            let lines: Vec<DiffLine> = container
                .select(&self.rows)
                .filter_map(|row| self.scrape_row(row))
                .collect();
            debug!(file = %path, lines = lines.len(), "scraped diff container");

            if !lines.is_empty() {
                files.push(FileDiff { path, lines });
            }
        }
        files
    }

    fn resolve_path(&self, container: ElementRef<'_>) -> Option<String> {
        PATH_RULES
            .iter()
            .find_map(|rule| rule(self, container).filter(|path| !path.is_empty()))
    }

    fn path_from_label(&self, container: ElementRef<'_>) -> Option<String> {
        if container.value().name() != "table" {
            return None;
        }
        let label = container.value().attr("aria-label")?;
        let (_, path) = label.split_once(LABEL_PREFIX)?;
        Some(path.trim().to_string())
    }

    fn path_from_attribute(&self, container: ElementRef<'_>) -> Option<String> {
        let header = container.select(&self.file_name).next()?;
        header.value().attr("data-path").map(|p| p.trim().to_string())
    }

    fn path_from_text(&self, container: ElementRef<'_>) -> Option<String> {
        let header = container.select(&self.file_name).next()?;
        Some(element_text(header))
    }

    fn scrape_row(&self, row: ElementRef<'_>) -> Option<DiffLine> {
        if row.select(&self.hunk_cells).next().is_some() {
            return None;
        }

        let cells: Vec<ElementRef<'_>> = row.select(&self.cells).collect();
        match self.row_text(&cells) {
            Some(text) => {
                let kind = self.classify(row);
                let text = strip_kind_marker(kind, text);
                Some(DiffLine::new(kind, row_line_number(&cells), text))
            }
            None => self.legacy_row(row, &cells),
        }
    }

    fn classify(&self, row: ElementRef<'_>) -> LineKind {
        KIND_RULES
            .iter()
            .find_map(|rule| rule(self, row))
            .unwrap_or(LineKind::Context)
    }

    fn kind_from_cell_type(&self, row: ElementRef<'_>) -> Option<LineKind> {
        row.select(&self.typed_cells)
            .find_map(|cell| match cell.value().attr("data-line-type")? {
                "addition" => Some(LineKind::Addition),
                "deletion" => Some(LineKind::Deletion),
                "context" => Some(LineKind::Context),
                _ => None,
            })
    }

    fn kind_from_marker(&self, row: ElementRef<'_>) -> Option<LineKind> {
        row.select(&self.marker)
            .find_map(|marker| match element_text(marker).as_str() {
                "+" => Some(LineKind::Addition),
                "-" => Some(LineKind::Deletion),
                _ => None,
            })
    }

    fn kind_from_classes(&self, row: ElementRef<'_>) -> Option<LineKind> {
        if row.select(&self.deletion_cells).next().is_some() {
            Some(LineKind::Deletion)
        } else if row.select(&self.addition_cells).next().is_some() {
            Some(LineKind::Addition)
        } else if row.select(&self.context_cells).next().is_some() {
            Some(LineKind::Context)
        } else {
            None
        }
    }

    /// Text of the right-most cell that carries diff text.
    fn row_text(&self, cells: &[ElementRef<'_>]) -> Option<String> {
        for cell in cells.iter().rev() {
            let inner = cell.select(&self.text_inner).next();
            if inner.is_none() && !has_class(*cell, "diff-text-cell") {
                continue;
            }
            if let Some(inner) = inner {
                // Some layouts render the marker inside the text node.
                let text = strip_marker(&element_text(inner));
                return Some(text).filter(|t| !t.is_empty());
            }
            let text = element_text(*cell);
            if !text.is_empty() {
                return Some(text);
            }
        }
        None
    }

    /// Older split layout: `[old num][old text][new num][new text]`.
    fn legacy_row(&self, row: ElementRef<'_>, cells: &[ElementRef<'_>]) -> Option<DiffLine> {
        if cells.len() < 4 {
            return None;
        }
        let text = [cells[3], cells[1]]
            .into_iter()
            .map(element_text)
            .find(|t| !t.is_empty())?;

        let kind = if has_class(row, "addition") || row.select(&self.addition).next().is_some() {
            LineKind::Addition
        } else if has_class(row, "deletion") || row.select(&self.deletion).next().is_some() {
            LineKind::Deletion
        } else {
            LineKind::Context
        };
        let line_number = [cells[0], cells[2]]
            .into_iter()
            .find_map(|cell| numeric(&element_text(cell)));

        Some(DiffLine::new(kind, line_number, strip_kind_marker(kind, text)))
    }
}

/// Line number from the left-most one or two number cells.
fn row_line_number(cells: &[ElementRef<'_>]) -> Option<usize> {
    cells
        .iter()
        .take(2)
        .filter(|cell| has_class(**cell, "diff-line-number"))
        .find_map(|cell| numeric(&element_text(*cell)))
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn numeric(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn strip_marker(text: &str) -> String {
    match text.strip_prefix(['+', '-']) {
        Some(rest) => rest.trim().to_string(),
        None => text.to_string(),
    }
}

/// Changed lines may still carry their `+`/`-` glyph in the cell text.
fn strip_kind_marker(kind: LineKind, text: String) -> String {
    match kind {
        LineKind::Context => text,
        LineKind::Addition | LineKind::Deletion => strip_marker(&text),
    }
}
