use scraper::Html;

use super::{element_text, DomDiffScraper};

pub(super) const TITLE: &str = ".prc-PageHeader-Title-LKOsd, .js-issue-title";

/// Checked in order; the first element of each selector is considered.
pub(super) const DESCRIPTIONS: &[&str] = &[
    ".prc-PageHeader-Description-TQgfF",
    ".js-issue-body",
    ".comment-body",
    "[data-testid=\"pull-request-description\"]",
];

/// Descriptions this short are usually placeholders like "ok" or "wip".
const MIN_DESCRIPTION_CHARS: usize = 10;

/// Trimmed description text, if it is long enough to be worth including.
pub fn meaningful_description(text: &str) -> Option<String> {
    let text = text.trim();
    (text.chars().count() > MIN_DESCRIPTION_CHARS).then(|| text.to_string())
}

impl DomDiffScraper {
    /// PR title shown in the page header.
    pub fn title(&self, document: &Html) -> Option<String> {
        document
            .select(&self.title)
            .next()
            .map(element_text)
            .filter(|title| !title.is_empty())
    }

    /// PR description from the first description element with real content.
    pub fn description(&self, document: &Html) -> Option<String> {
        self.descriptions.iter().find_map(|selector| {
            let element = document.select(selector).next()?;
            meaningful_description(&element_text(element))
        })
    }
}
