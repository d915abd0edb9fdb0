pub mod client;
pub mod diff;
pub mod source;
pub mod types;

pub use client::{GitHubClient, PullRequestApi};
pub use source::{HttpPageSource, PageSource, SavedPageSource};
pub use types::{FileDiff, PageAddress, PageInfo, PrUrl};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("GitHub API responded with {status} for {url}")]
    ApiStatus { status: u16, url: String },

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to parse diff: {0}")]
    DiffParse(String),

    #[error("Failed to read saved page: {0}")]
    PageRead(#[from] std::io::Error),

    #[error("Address does not identify a pull request: {0}")]
    NoPrAddress(String),
}

/// Whether `url` points at any view of a GitHub pull request.
pub fn is_pr_page(url: &str) -> bool {
    parse_pr_url(url).is_ok()
}

/// Parse a GitHub PR URL into its component parts.
///
/// Accepts `https://github.com/{owner}/{repo}/pull/{number}` followed by any
/// view suffix (`/files`, `/commits`, `/files/abc123`, ...).
pub fn parse_pr_url(url: &str) -> Result<PrUrl, PrError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    if parsed.host_str() != Some("github.com") {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| PrError::InvalidUrl(url.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() < 4 || segments[2] != "pull" {
        return Err(PrError::InvalidUrl(url.to_string()));
    }

    let pr_number = segments[3]
        .parse::<u64>()
        .map_err(|_| PrError::InvalidUrl(url.to_string()))?;

    Ok(PrUrl {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        pr_number,
    })
}

impl PrUrl {
    pub fn files_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/pull/{}/files",
            self.owner, self.repo, self.pr_number
        )
    }
}

impl PageAddress {
    /// Build an address from whatever the user supplied. An address that is
    /// not a PR URL is kept; it just has no API identity.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let pr = parse_pr_url(&url).ok();
        Self { url, pr }
    }

    /// True when the address already shows the files-changed view.
    pub fn is_files_view(&self) -> bool {
        match reqwest::Url::parse(&self.url) {
            Ok(parsed) => parsed
                .path_segments()
                .map(|segments| segments.filter(|s| !s.is_empty()).nth(4) == Some("files"))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// The canonical files-changed view of the same PR, if this is a PR address.
    pub fn files_view(&self) -> Option<PageAddress> {
        self.pr.as_ref().map(|pr| PageAddress {
            url: pr.files_url(),
            pr: Some(pr.clone()),
        })
    }

    /// PR number as text, or the "unknown" sentinel.
    pub fn identifier(&self) -> String {
        self.pr
            .as_ref()
            .map(|pr| pr.pr_number.to_string())
            .unwrap_or_else(|| types::UNKNOWN_IDENTIFIER.to_string())
    }
}
