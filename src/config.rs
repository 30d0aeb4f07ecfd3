use std::env;

/// Process-wide configuration, distinct from the per-job `JobConfig` in
/// `models.rs` (which arrives per-request in a `StartJobRequest`).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Cap on simultaneously active tenant jobs before `start` rejects new
    /// ones at the process level; per-tenant exclusivity is separate and
    /// unconditional, this is an overall resource ceiling.
    pub max_concurrent_jobs: usize,
    /// Bound on the headless-browser page pool.
    pub max_search_pages: usize,
    /// Default MX-lookup timeout for the email validator.
    pub mx_lookup_timeout_ms: u64,
    /// Default SMTP probe timeout budget for the email validator.
    pub smtp_timeout_ms: u64,
    /// How often the cache's TTL map sweeps expired entries.
    pub cache_sweep_interval_secs: u64,
    /// Shared secret for the HMAC request-signing middleware.
    pub shared_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("PORT", "must be a valid u16"))?;

        let max_concurrent_jobs = env::var("MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "20".to_string())
            .parse::<usize>()
            .map_err(|_| {
                ConfigError::InvalidValue("MAX_CONCURRENT_JOBS", "must be a valid usize")
            })?;

        let max_search_pages = env::var("MAX_SEARCH_PAGES")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("MAX_SEARCH_PAGES", "must be a valid usize"))?;

        let mx_lookup_timeout_ms = env::var("MX_LOOKUP_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("MX_LOOKUP_TIMEOUT_MS", "must be a valid u64")
            })?;

        let smtp_timeout_ms = env::var("SMTP_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("SMTP_TIMEOUT_MS", "must be a valid u64"))?;

        let cache_sweep_interval_secs = env::var("CACHE_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("CACHE_SWEEP_INTERVAL_SECS", "must be a valid u64")
            })?;

        let shared_secret =
            env::var("AUTH_SHARED_SECRET").map_err(|_| ConfigError::Missing("AUTH_SHARED_SECRET"))?;

        Ok(Config {
            port,
            max_concurrent_jobs,
            max_search_pages,
            mx_lookup_timeout_ms,
            smtp_timeout_ms,
            cache_sweep_interval_secs,
            shared_secret,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, &'static str),
}
