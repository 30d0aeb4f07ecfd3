//! HTML-form HTTP fallback search, used when `use_puppeteer=false` or the
//! browser path throws (DESIGN.md Open Question 1 — no silent fallthrough
//! on a merely empty-but-not-blocked browser result).
//!
//! Scrapes links out of raw markup with `regex` rather than a full DOM
//! selector, since the fallback target (DuckDuckGo's non-JS HTML endpoint)
//! is simple enough that a targeted regex is both faster and more robust
//! to markup drift than a CSS selector.

use crate::fetcher::http::{FetchError, RateLimitedFetcher};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

const FALLBACK_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const RATE_LIMIT_SLEEP: Duration = Duration::from_secs(30);

/// Block-page phrases seen on DuckDuckGo's HTML endpoint when it suspects
/// automated traffic.
const BLOCK_MARKERS: &[&str] = &[
    "unusual traffic",
    "are you a robot",
    "please try again later",
    "anomal",
];

fn result_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"class="result__a"[^>]*href="([^"]+)""#).unwrap())
}

pub struct HttpFallbackResult {
    pub urls: Vec<String>,
    pub blocked: bool,
}

pub async fn search(client: &RateLimitedFetcher, query: &str) -> HttpFallbackResult {
    let response = match client
        .post_form(FALLBACK_ENDPOINT, &[("q", query)])
        .await
    {
        Ok(r) => r,
        Err(FetchError::BadStatus(429)) => {
            tokio::time::sleep(RATE_LIMIT_SLEEP).await;
            return HttpFallbackResult {
                urls: Vec::new(),
                blocked: true,
            };
        }
        Err(_) => {
            return HttpFallbackResult {
                urls: Vec::new(),
                blocked: true,
            }
        }
    };

    let body_lower = response.body.to_lowercase();
    if BLOCK_MARKERS.iter().any(|m| body_lower.contains(m)) {
        return HttpFallbackResult {
            urls: Vec::new(),
            blocked: true,
        };
    }

    // Raw hrefs, un-decoded and unfiltered — the caller's normalize step
    // (shared with the browser path) handles uddg decoding, noise/engine-
    // host filtering, dedupe, and the result cap.
    let urls: Vec<String> = result_link_regex()
        .captures_iter(&response.body)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();

    HttpFallbackResult {
        urls,
        blocked: false,
    }
}

/// DuckDuckGo's HTML results wrap the real URL behind `//duckduckgo.com/l/?uddg=<encoded>`;
/// unwrap it when present, otherwise pass the href through as-is.
pub(crate) fn decode_ddg_redirect(href: &str) -> String {
    static UDDG_RE: OnceLock<Regex> = OnceLock::new();
    let re = UDDG_RE.get_or_init(|| Regex::new(r"[?&]uddg=([^&]+)").unwrap());
    if let Some(caps) = re.captures(href) {
        if let Some(encoded) = caps.get(1) {
            if let Ok(decoded) = urlencoding::decode(encoded.as_str()) {
                return decoded.into_owned();
            }
        }
    }
    href.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ddg_redirect_unwraps_uddg() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Facme.nl%2F&rut=abc";
        assert_eq!(decode_ddg_redirect(href), "https://acme.nl/");
    }

    #[test]
    fn test_decode_ddg_redirect_passthrough_without_uddg() {
        assert_eq!(decode_ddg_redirect("https://acme.nl/"), "https://acme.nl/");
    }

    #[test]
    fn test_result_link_regex_extracts_href() {
        let html = r#"<a class="result__a" href="https://acme.nl/">Acme</a>"#;
        let caps = result_link_regex().captures(html).unwrap();
        assert_eq!(&caps[1], "https://acme.nl/");
    }
}
