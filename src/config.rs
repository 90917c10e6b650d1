//! Client configuration.
//!
//! This module holds the settings the API client needs: the backend base
//! URL and the request/refresh timeouts. Values can come from code or
//! from the environment (`MARKETSPACE_API_URL`, `MARKETSPACE_TIMEOUT_SECS`,
//! `MARKETSPACE_REFRESH_TIMEOUT_SECS`), with `.env` files honored.

use std::time::Duration;

use anyhow::{Context, Result};

/// Default backend base URL (local development server).
const DEFAULT_API_URL: &str = "http://127.0.0.1:3333";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Token refresh timeout in seconds.
/// A hung refresh call would stall every queued request, so it gets a
/// tighter bound than ordinary requests.
const REFRESH_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the marketspace backend, without a trailing slash.
    pub api_url: String,
    /// Timeout applied to every outbound request.
    pub request_timeout: Duration,
    /// Timeout applied to the token refresh round-trip.
    pub refresh_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            refresh_timeout: Duration::from_secs(REFRESH_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine; only a malformed value is an error.
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(url) = std::env::var("MARKETSPACE_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(secs) = std::env::var("MARKETSPACE_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .context("MARKETSPACE_TIMEOUT_SECS must be an integer")?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(secs) = std::env::var("MARKETSPACE_REFRESH_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .context("MARKETSPACE_REFRESH_TIMEOUT_SECS must be an integer")?;
            config.refresh_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Build a full URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }
}
