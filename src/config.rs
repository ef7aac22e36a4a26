use serde::Deserialize;
use std::path::PathBuf;

/// Runtime configuration, loaded from the environment (and `.env` when present).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Clay webhook that receives new searches.
    pub clay_search_webhook_url: String,
    /// Clay webhook that receives selected companies for full enrichment.
    pub clay_enrich_webhook_url: String,
    /// Directory holding the JSON store files and their lock files.
    pub storage_dir: PathBuf,
    /// Shared secret expected in `X-Webhook-Token` on webhook routes.
    pub webhook_secret: Option<String>,
    pub lock_stale_ms: u64,
    pub lock_max_retries: u32,
    pub lock_retry_delay_ms: u64,
    pub outbound_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let clay_search_webhook_url = std::env::var("CLAY_SEARCH_WEBHOOK_URL")
            .map_err(|_| anyhow::anyhow!("CLAY_SEARCH_WEBHOOK_URL environment variable required"))
            .and_then(|url| validate_http_url("CLAY_SEARCH_WEBHOOK_URL", url))?;

        let clay_enrich_webhook_url = match std::env::var("CLAY_ENRICH_WEBHOOK_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
        {
            Some(url) => validate_http_url("CLAY_ENRICH_WEBHOOK_URL", url)?,
            None => clay_search_webhook_url.clone(),
        };

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            clay_search_webhook_url,
            clay_enrich_webhook_url,
            storage_dir: storage_dir_from_env(),
            webhook_secret: std::env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            lock_stale_ms: lock_stale_ms_from_env()?,
            lock_max_retries: parse_env_or("LOCK_MAX_RETRIES", 20)?,
            lock_retry_delay_ms: parse_env_or("LOCK_RETRY_DELAY_MS", 100)?,
            outbound_timeout_secs: parse_env_or("OUTBOUND_TIMEOUT_SECS", 30)?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Storage directory: {}", config.storage_dir.display());
        tracing::debug!(
            "Clay search webhook host: {}",
            host_of(&config.clay_search_webhook_url)
        );
        if config.webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET not set - webhook routes accept unauthenticated calls");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// `STORAGE_DIR`, defaulting to `<tmp>/company-intel`.
///
/// Standalone so maintenance tools can find the stores without Clay settings.
pub fn storage_dir_from_env() -> PathBuf {
    std::env::var("STORAGE_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("company-intel"))
}

pub fn lock_stale_ms_from_env() -> anyhow::Result<u64> {
    parse_env_or("LOCK_STALE_MS", 5_000)
}

fn validate_http_url(name: &str, raw: String) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(trimmed.to_string())
}

fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid non-negative number", name)),
        _ => Ok(default),
    }
}

/// Webhook URLs embed tokens in their path, so only the host is ever logged.
fn host_of(raw: &str) -> String {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "<invalid>".to_string())
}
