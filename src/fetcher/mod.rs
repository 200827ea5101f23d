//! Page fetching behind a trait so the tracker can run against fixtures

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, HeaderMap, HeaderValue};
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{TrackerError, TrackerResult};

/// Source of raw page HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the HTML body of `url`.
    ///
    /// # Returns
    /// * `TrackerResult<String>` - The page body, or [`TrackerError::Fetch`]
    async fn fetch(&self, url: &str) -> TrackerResult<String>;
}

/// [`PageFetcher`] over HTTP with browser-like headers.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> TrackerResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if let Ok(lang) = HeaderValue::from_str(&config.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TrackerError::Fetch {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> TrackerResult<String> {
        let fetch_err = |reason: String| TrackerError::Fetch {
            url: url.to_string(),
            reason,
        };

        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }

        response.text().await.map_err(|e| fetch_err(e.to_string()))
    }
}
