//! Per-domain rate-limited HTTP client, shared by `SiteFetcher` and the
//! search adapter's HTTP fallback: a per-domain `governor` limiter map
//! behind a `RwLock`, with a fast-read/slow-write lookup idiom.

use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("non-success status: {0}")]
    BadStatus(u16),
}

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status_code: u16,
    pub body: String,
    pub final_url: String,
}

type DomainLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// HTTP fetcher with per-domain rate limiting, so fetching many leads'
/// homepages concurrently never bursts any single target domain.
#[derive(Clone)]
pub struct RateLimitedFetcher {
    client: Client,
    domain_limiters: Arc<RwLock<HashMap<String, Arc<DomainLimiter>>>>,
    rate_per_second: u32,
}

impl RateLimitedFetcher {
    pub fn new(rate_per_second: u32, timeout_secs: u64, user_agent: &str) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .gzip(true)
            .pool_max_idle_per_host(20)
            .build()
            .expect("failed to build HTTP client");

        RateLimitedFetcher {
            client,
            domain_limiters: Arc::new(RwLock::new(HashMap::new())),
            rate_per_second: rate_per_second.max(1),
        }
    }

    async fn get_limiter(&self, domain: &str) -> Arc<DomainLimiter> {
        {
            let limiters = self.domain_limiters.read().await;
            if let Some(limiter) = limiters.get(domain) {
                return limiter.clone();
            }
        }

        let mut limiters = self.domain_limiters.write().await;
        limiters
            .entry(domain.to_string())
            .or_insert_with(|| {
                let rate = NonZeroU32::new(self.rate_per_second).unwrap();
                Arc::new(RateLimiter::direct(Quota::per_second(rate)))
            })
            .clone()
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let domain = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
            .unwrap_or_default();

        let limiter = self.get_limiter(&domain).await;
        limiter.until_ready().await;

        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();

        if !(200..400).contains(&status_code) {
            return Err(FetchError::BadStatus(status_code));
        }

        let body = response.text().await?;

        Ok(FetchResult {
            status_code,
            body,
            final_url,
        })
    }

    /// Fetch via POST with a form body, used by the search HTTP fallback.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<FetchResult, FetchError> {
        let domain = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
            .unwrap_or_default();

        let limiter = self.get_limiter(&domain).await;
        limiter.until_ready().await;

        let response = self.client.post(url).form(form).send().await?;
        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();

        if !(200..400).contains(&status_code) {
            return Err(FetchError::BadStatus(status_code));
        }

        let body = response.text().await?;

        Ok(FetchResult {
            status_code,
            body,
            final_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_per_second_floor_is_one() {
        let fetcher = RateLimitedFetcher::new(0, 10, "test-agent");
        assert_eq!(fetcher.rate_per_second, 1);
    }
}
