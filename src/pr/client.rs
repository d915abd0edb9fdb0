use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::types::{ChangedFile, PrSummary, PrUrl};
use super::PrError;
use crate::config::Config;

/// The two GitHub REST calls the extractor needs.
#[async_trait]
pub trait PullRequestApi: Send + Sync {
    /// `GET /repos/{owner}/{repo}/pulls/{number}/files`
    async fn list_files(&self, pr: &PrUrl) -> Result<Vec<ChangedFile>, PrError>;

    /// `GET /repos/{owner}/{repo}/pulls/{number}`
    async fn fetch_summary(&self, pr: &PrUrl) -> Result<PrSummary, PrError>;
}

/// reqwest-backed GitHub REST client. The token is optional; public
/// repositories are readable without one, at a lower rate limit.
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &Config) -> Result<Self, PrError> {
        let client = reqwest::Client::builder()
            .user_agent("pr-llm-diff")
            .timeout(Duration::from_secs(config.github.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: config.github.api_base.trim_end_matches('/').to_string(),
            token: config.github_token(),
        })
    }

    fn pull_url(&self, pr: &PrUrl) -> String {
        format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_base, pr.owner, pr.repo, pr.pr_number
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, PrError> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PrError::ApiStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PullRequestApi for GitHubClient {
    #[instrument(skip(self), fields(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number))]
    async fn list_files(&self, pr: &PrUrl) -> Result<Vec<ChangedFile>, PrError> {
        // Only the first page is read; large PRs are truncated at 100 files.
        let url = format!("{}/files?per_page=100", self.pull_url(pr));
        debug!("fetching changed files from GitHub API");
        let files: Vec<ChangedFile> = self.get_json(&url).await?;
        for file in &files {
            debug!(
                file = %file.filename,
                status = file.status.as_deref().unwrap_or("unknown"),
                has_patch = file.patch.is_some(),
                "changed file"
            );
        }
        Ok(files)
    }

    #[instrument(skip(self), fields(owner = %pr.owner, repo = %pr.repo, pr = pr.pr_number))]
    async fn fetch_summary(&self, pr: &PrUrl) -> Result<PrSummary, PrError> {
        debug!("fetching PR metadata from GitHub API");
        let summary: PrSummary = self.get_json(&self.pull_url(pr)).await?;
        debug!(number = summary.number, title = %summary.title, "received PR metadata");
        Ok(summary)
    }
}
