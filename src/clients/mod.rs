/// External feed clients module
use crate::config::FeedConfig;
use crate::domain::FeedKey;
use crate::errors::{FeedError, FeedResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Source of raw feed documents, one per cache key.
///
/// Implementations must not retry; a failed fetch is reported as is.
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    async fn fetch(&self, key: FeedKey) -> FeedResult<Vec<u8>>;
}

/// HTTP client wrapper with common configuration
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("quake-cache/0.1")
            .build()
            .map_err(|e| FeedError::Internal(format!("building HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn get_client(&self) -> &Client {
        &self.client
    }
}

/// USGS GeoJSON summary feed client
pub struct FeedClient {
    http_client: HttpClient,
    base_url: String,
    extension: String,
}

impl FeedClient {
    pub fn new(config: &FeedConfig) -> FeedResult<Self> {
        Ok(Self {
            http_client: HttpClient::new(Duration::from_secs(config.timeout_seconds))?,
            base_url: config.base_url.clone(),
            extension: config.extension.clone(),
        })
    }

    /// Builds `<base><magnitude>_<past><ext>` for a key.
    pub fn resolve_url(&self, key: FeedKey) -> FeedResult<String> {
        resolve_url(&self.base_url, &self.extension, key)
    }

    /// GET the resource; anything but 200 is an error.
    pub async fn fetch_url(&self, url: &str) -> FeedResult<Vec<u8>> {
        let transport = |reason: String| FeedError::Transport {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .http_client
            .get_client()
            .get(url)
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        if resp.status() != StatusCode::OK {
            return Err(transport(format!("resource returned {}", resp.status())));
        }

        let bytes = resp.bytes().await.map_err(|e| transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, key: FeedKey) -> FeedResult<Vec<u8>> {
        let url = self.resolve_url(key)?;
        let start = Instant::now();
        let result = self.fetch_url(&url).await;
        match &result {
            Ok(data) => info!(
                url = %url,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "fetched {:.1} KB",
                data.len() as f64 / 1024.0
            ),
            Err(e) => error!(url = %url, "feed fetch error: {}", e),
        }
        result
    }
}

/// Resolve a feed URL from its parts; unspecified parts cannot be resolved.
pub fn resolve_url(base_url: &str, extension: &str, key: FeedKey) -> FeedResult<String> {
    let magnitude = key
        .magnitude
        .token()
        .ok_or(FeedError::UnresolvableParameters)?;
    let past = key.past.token().ok_or(FeedError::UnresolvableParameters)?;
    Ok(format!("{}{}_{}{}", base_url, magnitude, past, extension))
}
