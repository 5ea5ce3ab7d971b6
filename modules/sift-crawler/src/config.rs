use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

/// Crawler configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    // Ingestion sink
    pub backend_url: String,
    pub auth_secret: String,

    // Document origin
    pub site_url: String,
    pub webdriver_url: String,

    // Timeouts
    pub navigate_timeout: Duration,
    pub upload_timeout: Duration,
}

/// The subset of [`CrawlConfig`] a browser session needs. Commands that never
/// touch the sink load only this.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub webdriver_url: String,
    pub navigate_timeout: Duration,
}

impl LiveConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            webdriver_url: lookup("WEBDRIVER_URL")
                .unwrap_or_else(|| "http://localhost:4444".to_string()),
            navigate_timeout: secs(&lookup, "SIFT_NAVIGATE_TIMEOUT_SECS", 20)?,
        })
    }
}

impl CrawlConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns `None` for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{key} environment variable is required"))
        };
        let live = LiveConfig::from_lookup(&lookup)?;

        Ok(Self {
            backend_url: required("SIFT_BACKEND_URL")?
                .trim_end_matches('/')
                .to_string(),
            auth_secret: required("SIFT_AUTH_SECRET")?,
            site_url: lookup("SIFT_SITE_URL")
                .unwrap_or_else(|| "https://summer.hackclub.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            webdriver_url: live.webdriver_url,
            navigate_timeout: live.navigate_timeout,
            upload_timeout: secs(&lookup, "SIFT_UPLOAD_TIMEOUT_SECS", 30)?,
        })
    }

    pub fn live(&self) -> LiveConfig {
        LiveConfig {
            webdriver_url: self.webdriver_url.clone(),
            navigate_timeout: self.navigate_timeout,
        }
    }

    /// Log the loaded configuration with the shared secret masked.
    pub fn log_redacted(&self) {
        info!(
            backend_url = self.backend_url.as_str(),
            auth_secret = redact(&self.auth_secret).as_str(),
            site_url = self.site_url.as_str(),
            webdriver_url = self.webdriver_url.as_str(),
            navigate_timeout = ?self.navigate_timeout,
            upload_timeout = ?self.upload_timeout,
            "Crawl configuration loaded"
        );
    }
}

fn secs(lookup: impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Duration::from_secs)
            .with_context(|| format!("{key} must be a whole number of seconds, got `{raw}`")),
        None => Ok(Duration::from_secs(default)),
    }
}

fn redact(secret: &str) -> String {
    format!("<{} chars>", secret.chars().count())
}
