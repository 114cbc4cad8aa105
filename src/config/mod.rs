/// Application configuration module
use std::env;

pub const DEFAULT_FEED_BASE_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub feed: FeedConfig,
    pub cache_ttl_seconds: u64,
}

/// Where and how feed documents are fetched
#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub base_url: String,
    pub extension: String,
    pub timeout_seconds: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            extension: ".geojson".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let port = match env::var("PORT") {
            Ok(s) => s
                .parse()
                .map_err(|e| anyhow::anyhow!("PORT must be a valid port number: {}", e))?,
            Err(_) => 3000,
        };

        let defaults = FeedConfig::default();
        let feed = FeedConfig {
            base_url: env::var("FEED_BASE_URL").unwrap_or(defaults.base_url),
            extension: env::var("FEED_EXTENSION").unwrap_or(defaults.extension),
            timeout_seconds: env_u64("FEED_TIMEOUT_SECONDS", defaults.timeout_seconds),
        };

        Ok(Self {
            port,
            feed,
            cache_ttl_seconds: env_u64("CACHE_TTL_SECONDS", 60),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
