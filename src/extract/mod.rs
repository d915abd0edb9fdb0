pub mod resume;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use scraper::Html;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clipboard::ClipboardError;
use crate::config::{ExtractionConfig, ExtractionMode};
use crate::format::format;
use crate::output::Output;
use crate::pr::diff::parse_patch;
use crate::pr::types::UNKNOWN_TITLE;
use crate::pr::{FileDiff, PageAddress, PageInfo, PageSource, PrError, PullRequestApi};
use crate::scrape::page::meaningful_description;
use crate::scrape::{DomDiffScraper, ScrapeError};
use crate::status::Status;
use resume::{ResumeRecord, ResumeStore};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Could not resolve owner/repo/number from {0}")]
    AddressUnresolvable(String),

    #[error("GitHub request failed: {0}")]
    TransportFailure(#[from] PrError),

    #[error("No diff data found. Ensure this PR has file changes.")]
    EmptyResult,

    #[error("No diff on this page. Open the files view: {files_url}")]
    NavigationRequired { files_url: String },

    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(#[from] ClipboardError),

    #[error("Extracted diff appears to be empty or too short ({chars} chars)")]
    ArtifactTooShort { chars: usize },

    #[error("Failed to write output: {0}")]
    OutputWrite(#[from] std::io::Error),
}

/// Where the extractor is in its fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Idle,
    FetchingApi,
    FallbackToDom,
    Success,
    NeedsNavigation,
    Failed,
}

/// Which source produced the extracted files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSource {
    Api,
    Dom,
}

impl std::fmt::Display for DiffSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffSource::Api => write!(f, "API"),
            DiffSource::Dom => write!(f, "page"),
        }
    }
}

/// Result of a single extraction attempt against one page.
#[derive(Debug)]
pub enum Outcome {
    Extracted {
        files: Vec<FileDiff>,
        source: DiffSource,
        /// The page HTML, when it was loaded during the attempt.
        html: Option<String>,
    },
    /// Nothing found, and the files-changed view has not been tried yet.
    NeedsNavigation { files_view: PageAddress },
}

/// A completed trigger.
#[derive(Debug)]
pub struct Delivered {
    pub status: Status,
    pub page: PageInfo,
    pub files: usize,
    pub source: DiffSource,
    pub chars: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub mode: ExtractionMode,
    pub follow_navigation: bool,
    pub min_output_chars: usize,
}

impl From<&ExtractionConfig> for ExtractOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            mode: config.mode,
            follow_navigation: config.follow_navigation,
            min_output_chars: config.min_output_chars,
        }
    }
}

/// Clears the in-flight flag when the trigger finishes, on every path.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Extracts a PR diff: Files API first, rendered page second, and one retry
/// on the files-changed view when neither found anything.
pub struct Extractor {
    api: Box<dyn PullRequestApi>,
    pages: Box<dyn PageSource>,
    scraper: DomDiffScraper,
    options: ExtractOptions,
    resume: ResumeStore,
    in_flight: AtomicBool,
    state: Mutex<ExtractionState>,
}

impl Extractor {
    pub fn new(
        api: Box<dyn PullRequestApi>,
        pages: Box<dyn PageSource>,
        options: ExtractOptions,
        resume: ResumeStore,
    ) -> Result<Self, ScrapeError> {
        Ok(Self {
            api,
            pages,
            scraper: DomDiffScraper::new()?,
            options,
            resume,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(ExtractionState::Idle),
        })
    }

    pub fn state(&self) -> ExtractionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: ExtractionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*state, to = ?next, "extraction state");
        *state = next;
    }

    /// Run one extraction and write the formatted diff to `output`.
    ///
    /// Returns `None` without doing anything when another trigger is still
    /// in flight; triggers are dropped, not queued.
    pub async fn trigger(
        &self,
        address: &PageAddress,
        output: &Output,
    ) -> Option<Result<Delivered, ExtractError>> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("extraction already in flight, dropping trigger");
            return None;
        };
        Some(self.run(address, output).await)
    }

    async fn run(&self, address: &PageAddress, output: &Output) -> Result<Delivered, ExtractError> {
        self.transition(ExtractionState::Idle);
        let mut address = address.clone();

        let outcome = match self.extract(&address).await? {
            Outcome::NeedsNavigation { files_view } => {
                if !self.options.follow_navigation {
                    return Err(ExtractError::NavigationRequired {
                        files_url: files_view.url,
                    });
                }
                self.navigate(&files_view);
                if !self.is_pending(&files_view) {
                    return Err(ExtractError::NavigationRequired {
                        files_url: files_view.url,
                    });
                }
                address = files_view;
                debug!(url = %address.url, "retrying on files view");
                let retried = self.extract(&address).await;
                self.clear_pending();
                retried?
            }
            extracted => extracted,
        };

        let (files, source, html) = match outcome {
            Outcome::Extracted { files, source, html } => (files, source, html),
            Outcome::NeedsNavigation { files_view } => {
                return Err(ExtractError::NavigationRequired {
                    files_url: files_view.url,
                })
            }
        };

        let page = self.page_info(&address, html.as_deref()).await;
        let text = format(&page, &files);
        let chars = text.trim().chars().count();
        if chars < self.options.min_output_chars {
            return Err(ExtractError::ArtifactTooShort { chars });
        }

        let status = output.write(&text).await?;
        info!(
            pr = %page.identifier,
            repo = ?page.owner_repo,
            files = files.len(),
            source = ?source,
            chars,
            "extracted diff"
        );
        Ok(Delivered {
            status,
            page,
            files: files.len(),
            source,
            chars,
        })
    }

    /// One pass through the fallback chain for `address`.
    pub async fn extract(&self, address: &PageAddress) -> Result<Outcome, ExtractError> {
        if self.options.mode == ExtractionMode::ApiFirst {
            self.transition(ExtractionState::FetchingApi);
            match self.fetch_from_api(address).await {
                Ok(files) if !files.is_empty() => {
                    self.transition(ExtractionState::Success);
                    return Ok(Outcome::Extracted {
                        files,
                        source: DiffSource::Api,
                        html: None,
                    });
                }
                Ok(_) => debug!("API returned no files with patch content"),
                Err(e) => warn!(error = %e, "API extraction failed, falling back to page"),
            }
        }

        self.transition(ExtractionState::FallbackToDom);
        let html = match self.pages.load(address).await {
            Ok(html) => Some(html),
            Err(e) => {
                warn!(error = %e, "failed to load page");
                None
            }
        };
        let files = html
            .as_deref()
            .map(|html| self.scrape_html(html))
            .unwrap_or_default();

        if !files.is_empty() {
            self.transition(ExtractionState::Success);
            return Ok(Outcome::Extracted {
                files,
                source: DiffSource::Dom,
                html,
            });
        }

        if !address.is_files_view() && self.pages.can_navigate() {
            if let Some(files_view) = address.files_view() {
                self.transition(ExtractionState::NeedsNavigation);
                return Ok(Outcome::NeedsNavigation { files_view });
            }
        }

        self.transition(ExtractionState::Failed);
        Err(ExtractError::EmptyResult)
    }

    async fn fetch_from_api(&self, address: &PageAddress) -> Result<Vec<FileDiff>, ExtractError> {
        let pr = address
            .pr
            .as_ref()
            .ok_or_else(|| ExtractError::AddressUnresolvable(address.url.clone()))?;
        let records = self.api.list_files(pr).await?;
        let files: Vec<FileDiff> = records
            .iter()
            .map(|record| parse_patch(&record.filename, record.patch.as_deref()))
            .filter(|file| !file.is_empty())
            .collect();
        debug!(records = records.len(), files = files.len(), "parsed API patches");
        Ok(files)
    }

    fn scrape_html(&self, html: &str) -> Vec<FileDiff> {
        let document = Html::parse_document(html);
        self.scraper.scrape_document(&document)
    }

    fn page_metadata(&self, html: &str) -> (Option<String>, Option<String>) {
        let document = Html::parse_document(html);
        (self.scraper.title(&document), self.scraper.description(&document))
    }

    /// Title and description come from the API summary when available,
    /// otherwise from the page; number and owner/repo from the address.
    async fn page_info(&self, address: &PageAddress, html: Option<&str>) -> PageInfo {
        let (mut title, mut description) = (None, None);

        if let (ExtractionMode::ApiFirst, Some(pr)) = (self.options.mode, &address.pr) {
            match self.api.fetch_summary(pr).await {
                Ok(summary) => {
                    title = Some(summary.title).filter(|t| !t.trim().is_empty());
                    description = summary.body.as_deref().and_then(meaningful_description);
                }
                Err(e) => debug!(error = %e, "PR summary unavailable, reading page header"),
            }
        }

        if title.is_none() || description.is_none() {
            let loaded = match (html, title.is_none()) {
                (Some(_), _) | (None, false) => None,
                (None, true) => self.pages.load(address).await.ok(),
            };
            if let Some(html) = html.or(loaded.as_deref()) {
                let (page_title, page_description) = self.page_metadata(html);
                title = title.or(page_title);
                description = description.or(page_description);
            }
        }

        PageInfo {
            title: title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            identifier: address.identifier(),
            owner_repo: address
                .pr
                .as_ref()
                .map(|pr| (pr.owner.clone(), pr.repo.clone())),
            description,
        }
    }

    /// Record that an extraction must resume on the files view, then move there.
    fn navigate(&self, files_view: &PageAddress) {
        info!(url = %files_view.url, "navigating to files view");
        if let Err(e) = self.resume.save(&ResumeRecord::pending_for(&files_view.url)) {
            warn!(error = %e, path = %self.resume.path().display(), "failed to save resume record");
        }
    }

    fn is_pending(&self, files_view: &PageAddress) -> bool {
        match self.resume.load() {
            Ok(record) => record.resumes(&files_view.url),
            Err(e) => {
                warn!(error = %e, "failed to read resume record");
                false
            }
        }
    }

    fn clear_pending(&self) {
        if let Err(e) = self.resume.clear() {
            warn!(error = %e, "failed to clear resume record");
        }
    }

    /// The files view to resume on when a previous run on the same PR
    /// stopped between navigating and extracting. The record is consumed.
    /// A record left by a different PR is kept.
    pub fn take_pending(&self, address: &PageAddress) -> Option<PageAddress> {
        let files_view = address.files_view()?;
        if !self.is_pending(&files_view) {
            return None;
        }
        self.clear_pending();
        Some(files_view)
    }
}
