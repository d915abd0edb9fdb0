use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::types::PageAddress;
use super::PrError;
use crate::config::Config;

/// Where the rendered PR page comes from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Load the HTML currently shown at `address`.
    async fn load(&self, address: &PageAddress) -> Result<String, PrError>;

    /// Whether loading a different address shows a different page.
    fn can_navigate(&self) -> bool {
        true
    }
}

/// Fetches the page over HTTP.
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(config: &Config) -> Result<Self, PrError> {
        let client = reqwest::Client::builder()
            .user_agent("pr-llm-diff")
            .timeout(Duration::from_secs(config.github.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    #[instrument(skip(self), fields(url = %address.url))]
    async fn load(&self, address: &PageAddress) -> Result<String, PrError> {
        if address.pr.is_none() {
            return Err(PrError::NoPrAddress(address.url.clone()));
        }
        let response = self
            .client
            .get(&address.url)
            .header("Accept", "text/html")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PrError::ApiStatus {
                status: status.as_u16(),
                url: address.url.clone(),
            });
        }
        let html = response.text().await?;
        debug!(bytes = html.len(), "loaded page");
        Ok(html)
    }
}

/// A page saved to disk from the browser. Always shows the same content.
pub struct SavedPageSource {
    path: PathBuf,
}

impl SavedPageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageSource for SavedPageSource {
    async fn load(&self, _address: &PageAddress) -> Result<String, PrError> {
        debug!(path = %self.path.display(), "reading saved page");
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }

    fn can_navigate(&self) -> bool {
        false
    }
}
