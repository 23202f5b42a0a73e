//! Worker configuration, read from the environment (`.env` supported).

use anyhow::Context;

/// Vendor API base URL used when `APIMART_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://api.apimart.ai";

/// Model used when `PICTOR_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "seedream-4.0";

/// Poll interval used when `PICTOR_POLL_INTERVAL_MS` is unset.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

pub struct WorkerConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub poll_interval_ms: u64,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("APIMART_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key =
            std::env::var("APIMART_API_KEY").context("APIMART_API_KEY must be set")?;
        let model =
            std::env::var("PICTOR_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let poll_interval_ms = match std::env::var("PICTOR_POLL_INTERVAL_MS") {
            Ok(raw) => raw
                .parse()
                .context("PICTOR_POLL_INTERVAL_MS must be an integer (milliseconds)")?,
            Err(_) => DEFAULT_POLL_INTERVAL_MS,
        };

        Ok(Self {
            base_url,
            api_key,
            model,
            poll_interval_ms,
        })
    }
}
