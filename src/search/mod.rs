//! Search adapter: runs a query against a search engine via a pooled
//! headless-browser page, detects blocking, backs off adaptively, and
//! falls back to a plain HTTP form POST when asked to or when the browser
//! path fails.

pub mod http_fallback;
pub mod noise;
pub mod pool;

use crate::fetcher::http::RateLimitedFetcher;
use crate::models::{SearchResult, SearchSource};
use futures::future::BoxFuture;
use pool::PagePool;
use regex::Regex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

const SEARCH_URL_BASE: &str = "https://duckduckgo.com/";
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(25);
const DEFAULT_MAX_RESULTS: usize = 10;

const MIN_DELAY_MS: u64 = 1500;
const MAX_DELAY_MS: u64 = 60_000;
const MAX_BLOCK_RETRIES: u32 = 2;
const JITTER_CEILING_MS: u64 = 500;

/// Hosts belonging to the search engine itself, dropped from results —
/// distinct from `noise::is_noise`, which covers social/marketplace/CDN
/// hosts that are never the engine.
const ENGINE_HOSTS: &[&str] = &["duckduckgo.com", "html.duckduckgo.com"];

/// Phrases on the rendered results page that indicate the engine is
/// suspicious of this traffic, scanned lowercase-substring style.
const BLOCK_MARKERS: &[&str] = &[
    "captcha",
    "unusual traffic",
    "blocked",
    "access denied",
    "too many requests",
    "robot",
    "automated",
    "bot check",
];

/// CSS selectors tried in order when waiting for results to render; each
/// gets its own timeout before the cascade moves to the next.
const RESULT_SELECTORS: &[&str] = &[
    "a[data-testid=\"result-title-a\"]",
    "article[data-testid=\"result\"] a[href]",
    "h2 a[href]",
    "a.result__a",
    "#links a[href]",
    "[data-result] a[href]",
    "a[href^=\"http\"]",
];
const SELECTOR_TIMEOUT: Duration = Duration::from_secs(4);
const SCROLL_PIXELS: i64 = 500;
const SCROLL_RETRY_SLEEP: Duration = Duration::from_millis(800);

fn result_link_selector() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href="(https?://[^"]+)""#).unwrap())
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("browser pool error: {0}")]
    Pool(#[from] pool::PoolError),
}

/// Adaptive back-off: each consecutive block doubles `delay` (cap 60s) and
/// triggers a retry sleep of its own before the next attempt; each clean
/// result decays `delay` back down and paces the next search behind it.
pub struct SearchAdapter {
    pool: Option<Arc<PagePool>>,
    http_client: RateLimitedFetcher,
    consecutive_blocks: AtomicU32,
    delay_ms: AtomicU64,
}

impl SearchAdapter {
    pub fn new(pool: Option<Arc<PagePool>>, http_client: RateLimitedFetcher) -> Self {
        SearchAdapter {
            pool,
            http_client,
            consecutive_blocks: AtomicU32::new(0),
            delay_ms: AtomicU64::new(MIN_DELAY_MS),
        }
    }

    /// Current pacing delay, doubled by each consecutive block and decayed
    /// by each clean result.
    pub fn backoff_delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::SeqCst))
    }

    pub async fn search(&self, query: &str, use_puppeteer: bool) -> SearchResult {
        if use_puppeteer {
            if let Some(pool) = self.pool.clone() {
                match self.search_via_browser(&pool, query).await {
                    Ok(result) => return result,
                    Err(_) => {
                        // Browser path threw: per DESIGN.md Open Question 1,
                        // this is the one case that falls through to HTTP.
                        return self.search_via_http(query).await;
                    }
                }
            }
        }

        self.search_via_http(query).await
    }

    fn record_block(&self) {
        self.consecutive_blocks.fetch_add(1, Ordering::SeqCst);
        let doubled = self.delay_ms.load(Ordering::SeqCst).saturating_mul(2).min(MAX_DELAY_MS);
        self.delay_ms.store(doubled, Ordering::SeqCst);
    }

    fn record_clean_result(&self) {
        self.consecutive_blocks.store(0, Ordering::SeqCst);
        let current = self.delay_ms.load(Ordering::SeqCst) as f64;
        let decayed = (current * 0.9).max(MIN_DELAY_MS as f64) as u64;
        self.delay_ms.store(decayed, Ordering::SeqCst);
    }

    async fn search_via_browser(
        &self,
        pool: &Arc<PagePool>,
        query: &str,
    ) -> Result<SearchResult, SearchError> {
        self.search_via_browser_attempt(pool, query, 0).await
    }

    fn search_via_browser_attempt<'a>(
        &'a self,
        pool: &'a Arc<PagePool>,
        query: &'a str,
        retry: u32,
    ) -> BoxFuture<'a, Result<SearchResult, SearchError>> {
        Box::pin(async move {
            let pooled = pool.checkout().await?;
            let url = format!(
                "{SEARCH_URL_BASE}?q={}&kl=nl-nl&ia=web",
                urlencoding::encode(query)
            );

            let nav = pooled.page().goto(&url).await;
            if nav.is_err() {
                return Ok(SearchResult {
                    urls: Vec::new(),
                    blocked: false,
                    source: SearchSource::Browser,
                    error: Some("navigation failed".to_string()),
                });
            }
            let _ = tokio::time::timeout(NAVIGATION_TIMEOUT, pooled.page().wait_for_navigation()).await;

            let content = pooled.page().content().await.unwrap_or_default();
            if page_looks_blocked(&content) {
                drop(pooled);
                self.record_block();
                if retry < MAX_BLOCK_RETRIES {
                    let sleep_ms = 8_000 + (retry as u64) * 12_000;
                    tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                    return self.search_via_browser_attempt(pool, query, retry + 1).await;
                }
                return Ok(SearchResult {
                    urls: Vec::new(),
                    blocked: true,
                    source: SearchSource::Browser,
                    error: None,
                });
            }

            let raw_links = find_result_links(pooled.page(), &content).await;
            drop(pooled);

            let urls = normalize_results(raw_links, DEFAULT_MAX_RESULTS);

            self.record_clean_result();
            let pacing = self.backoff_delay() + Duration::from_millis(jitter_ms());
            tokio::time::sleep(pacing).await;

            Ok(SearchResult {
                urls,
                blocked: false,
                source: SearchSource::Browser,
                error: None,
            })
        })
    }

    async fn search_via_http(&self, query: &str) -> SearchResult {
        let result = http_fallback::search(&self.http_client, query).await;
        let urls = normalize_results(result.urls, DEFAULT_MAX_RESULTS);
        SearchResult {
            urls,
            blocked: result.blocked,
            source: SearchSource::Http,
            error: None,
        }
    }
}

/// Title + first 1000 chars of visible body text, lowercased, checked
/// against `BLOCK_MARKERS`.
fn page_looks_blocked(content: &str) -> bool {
    let document = scraper::Html::parse_document(content);
    let title = document
        .select(&scraper::Selector::parse("title").unwrap())
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();
    let mut body = crate::fetcher::extract::collect_text(&document);
    body.truncate(1000);

    let haystack = format!("{title} {body}").to_lowercase();
    BLOCK_MARKERS.iter().any(|m| haystack.contains(m))
}

/// Tries the selector cascade (4s timeout per selector); if nothing
/// matches, scrolls 500px, sleeps 800ms, and retries the cascade once;
/// falls back to every external `a[href]` on the page if still empty.
async fn find_result_links(page: &chromiumoxide::Page, content: &str) -> Vec<String> {
    if let Some(found) = try_selector_cascade(page).await {
        return found;
    }

    let _ = page
        .evaluate(format!("window.scrollBy(0, {SCROLL_PIXELS})"))
        .await;
    tokio::time::sleep(SCROLL_RETRY_SLEEP).await;

    if let Some(found) = try_selector_cascade(page).await {
        return found;
    }

    result_link_selector()
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

async fn try_selector_cascade(page: &chromiumoxide::Page) -> Option<Vec<String>> {
    for selector in RESULT_SELECTORS {
        let attempt = tokio::time::timeout(SELECTOR_TIMEOUT, page.find_elements(*selector)).await;
        let Ok(Ok(elements)) = attempt else {
            continue;
        };
        if elements.is_empty() {
            continue;
        }
        let mut hrefs = Vec::new();
        for el in elements {
            if let Ok(Some(href)) = el.attribute("href").await {
                hrefs.push(href);
            }
        }
        if !hrefs.is_empty() {
            return Some(hrefs);
        }
    }
    None
}

/// Shared result normalization for both the browser and HTTP fallback
/// paths: decode `uddg=` redirects, drop non-http(s) and the engine's own
/// hosts, drop noise domains, dedupe by domain, cap at `max_results`.
fn normalize_results(raw: Vec<String>, max_results: usize) -> Vec<String> {
    let mut seen_domains = std::collections::HashSet::new();
    let mut out = Vec::new();

    for link in raw {
        if out.len() >= max_results {
            break;
        }
        let decoded = http_fallback::decode_ddg_redirect(&link);
        if !(decoded.starts_with("http://") || decoded.starts_with("https://")) {
            continue;
        }
        let Some(host) = host_of(&decoded) else {
            continue;
        };
        if ENGINE_HOSTS.iter().any(|h| *h == host) {
            continue;
        }
        if noise::is_noise(&host) {
            continue;
        }
        if !seen_domains.insert(host) {
            continue;
        }
        out.push(decoded);
    }

    out
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Lightweight 0..500ms jitter without pulling in a dedicated RNG crate.
fn jitter_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % JITTER_CEILING_MS)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let adapter = SearchAdapter::new(None, RateLimitedFetcher::new(2, 10, "test"));
        assert_eq!(adapter.backoff_delay(), Duration::from_millis(MIN_DELAY_MS));
        adapter.record_block();
        assert_eq!(adapter.backoff_delay(), Duration::from_millis(MIN_DELAY_MS * 2));
        adapter.record_block();
        assert_eq!(adapter.backoff_delay(), Duration::from_millis(MIN_DELAY_MS * 4));
        for _ in 0..10 {
            adapter.record_block();
        }
        assert_eq!(adapter.backoff_delay(), Duration::from_millis(MAX_DELAY_MS));
    }

    #[test]
    fn test_backoff_decays_on_clean_result_but_not_below_floor() {
        let adapter = SearchAdapter::new(None, RateLimitedFetcher::new(2, 10, "test"));
        adapter.record_block();
        adapter.record_block();
        assert!(adapter.backoff_delay() > Duration::from_millis(MIN_DELAY_MS));
        for _ in 0..50 {
            adapter.record_clean_result();
        }
        assert_eq!(adapter.backoff_delay(), Duration::from_millis(MIN_DELAY_MS));
    }

    #[test]
    fn test_host_of_parses_valid_url() {
        assert_eq!(host_of("https://acme.nl/page"), Some("acme.nl".to_string()));
        assert_eq!(host_of("not a url"), None);
    }

    #[test]
    fn test_page_looks_blocked_detects_marker() {
        let html = "<html><head><title>Unusual traffic detected</title></head><body></body></html>";
        assert!(page_looks_blocked(html));
    }

    #[test]
    fn test_page_looks_blocked_false_on_clean_page() {
        let html = "<html><head><title>Search results</title></head><body>some company site</body></html>";
        assert!(!page_looks_blocked(html));
    }

    #[test]
    fn test_normalize_results_decodes_drops_engine_and_noise_dedupes_and_caps() {
        let raw = vec![
            "//duckduckgo.com/l/?uddg=https%3A%2F%2Facme.nl%2F&rut=1".to_string(),
            "https://duckduckgo.com/y.js?ad=1".to_string(),
            "https://facebook.com/acme".to_string(),
            "https://acme.nl/about".to_string(),
            "https://other.nl/".to_string(),
            "not a url".to_string(),
        ];
        let out = normalize_results(raw, 1);
        assert_eq!(out, vec!["https://acme.nl/".to_string()]);
    }

    #[test]
    fn test_normalize_results_respects_cap() {
        let raw = vec![
            "https://a.nl/".to_string(),
            "https://b.nl/".to_string(),
            "https://c.nl/".to_string(),
        ];
        let out = normalize_results(raw, 2);
        assert_eq!(out.len(), 2);
    }
}
