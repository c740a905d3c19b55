use std::time::Duration;

use anyhow::{Context, Result};

use recipebox_core::models::{RemoteRecipe, RemoteTag};
use recipebox_core::service::RecipeSource;

use crate::config::Config;

/// Client for the remote recipe catalogue.
pub struct RemoteClient {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
    rt: tokio::runtime::Handle,
}

impl RemoteClient {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_settings(&config.api_base_url, config.page_size, config.request_timeout)
    }

    pub fn with_settings(base_url: &str, page_size: usize, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("recipebox-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
            rt: tokio::runtime::Handle::current(),
        })
    }

    pub fn recipes_url(&self) -> String {
        format!("{}/recipes", self.base_url)
    }

    pub fn tags_url(&self) -> String {
        format!("{}/tags", self.base_url)
    }

    pub async fn fetch_page_async(&self, offset: usize) -> Result<Vec<RemoteRecipe>> {
        let offset = offset.to_string();
        let limit = self.page_size.to_string();
        let resp = self
            .client
            .get(self.recipes_url())
            .query(&[("offset", offset.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .context("Failed to reach recipe API")?
            .error_for_status()
            .context("Recipe API returned an error")?;

        resp.json()
            .await
            .context("Failed to parse recipe page response")
    }

    pub async fn fetch_tags_async(&self) -> Result<Vec<RemoteTag>> {
        let resp = self
            .client
            .get(self.tags_url())
            .send()
            .await
            .context("Failed to reach recipe API")?
            .error_for_status()
            .context("Recipe API returned an error")?;

        resp.json().await.context("Failed to parse tag list response")
    }
}

// Must be called from a blocking context (spawn_blocking or block_in_place),
// never directly on a runtime worker.
impl RecipeSource for RemoteClient {
    fn fetch_page(&self, offset: usize) -> Result<Vec<RemoteRecipe>> {
        self.rt.block_on(self.fetch_page_async(offset))
    }

    fn fetch_tags(&self) -> Result<Vec<RemoteTag>> {
        self.rt.block_on(self.fetch_tags_async())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_urls_strip_trailing_slash() {
        let client =
            RemoteClient::with_settings("http://example.test/api/", 20, Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.recipes_url(), "http://example.test/api/recipes");
        assert_eq!(client.tags_url(), "http://example.test/api/tags");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let client =
            RemoteClient::with_settings("http://127.0.0.1:9", 20, Duration::from_secs(1)).unwrap();
        let err = client.fetch_page_async(0).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to reach recipe API"));
    }

    // --- Integration tests (hit a real recipe API) ---

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "needs RECIPEBOX_API_URL pointing at a live recipe API"]
    async fn test_fetch_first_page_live() {
        let base = std::env::var("RECIPEBOX_API_URL").unwrap();
        let client = RemoteClient::with_settings(&base, 20, Duration::from_secs(10)).unwrap();
        let page = client.fetch_page_async(0).await.unwrap();
        assert!(page.len() <= 20);
        for recipe in &page {
            assert!(!recipe.title.is_empty());
        }
    }
}
