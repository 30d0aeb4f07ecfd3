//! Per-lead site fetching: homepage, contact-page discovery, optional
//! analyzer-driven second page, and contact-data extraction.

pub mod extract;
pub mod http;

use crate::analyzer::Analyzer;
use crate::cache::Cache;
use crate::models::{AnalyzeInput, Lead};
use http::RateLimitedFetcher;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum SiteFetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(#[from] self::http::FetchError),
}

const HOMEPAGE_TIMEOUT: Duration = Duration::from_secs(12);
const CONTACT_TIMEOUT: Duration = Duration::from_secs(8);
const CONTACT_POLITENESS_SLEEP: Duration = Duration::from_millis(500);
const MAX_CONTACT_PAGES: usize = 2;

/// Fetches a candidate site's homepage plus up to two contact/about pages,
/// extracts contact data, and hands the accumulated text to the analyzer
/// for scoring. Crawl depth is capped at these pages by design — no BFS
/// frontier.
pub struct SiteFetcher {
    client: RateLimitedFetcher,
}

impl SiteFetcher {
    pub fn new(client: RateLimitedFetcher) -> Self {
        SiteFetcher { client }
    }

    /// Returns `Ok(None)` when the URL is noise or already globally visited
    /// — not an error, just nothing to score.
    pub async fn fetch_and_score(
        &self,
        url: &str,
        cache: &Cache,
        analyzer: &Arc<dyn Analyzer>,
    ) -> Result<Option<Lead>, SiteFetchError> {
        let parsed = Url::parse(url).map_err(|_| SiteFetchError::InvalidUrl(url.to_string()))?;
        let domain = parsed
            .host_str()
            .map(|h| h.to_lowercase())
            .ok_or_else(|| SiteFetchError::InvalidUrl(url.to_string()))?;

        if crate::search::noise::is_noise(&domain) || cache.visited.contains(&domain).await {
            return Ok(None);
        }
        cache.visited.mark(&domain).await;

        let homepage = match tokio::time::timeout(HOMEPAGE_TIMEOUT, self.client.fetch(url)).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => return Err(SiteFetchError::Fetch(e)),
            Err(_) => {
                tracing::warn!(domain = %domain, timeout_secs = HOMEPAGE_TIMEOUT.as_secs(), "homepage fetch timed out");
                return Ok(None);
            }
        };
        let document = Html::parse_document(&homepage.body);
        let mut text = extract::collect_text(&document);

        let mut contact_bodies: Vec<String> = Vec::new();
        for link in find_contact_links(&document, &homepage.final_url) {
            if contact_bodies.len() >= MAX_CONTACT_PAGES {
                break;
            }
            match tokio::time::timeout(CONTACT_TIMEOUT, self.client.fetch(&link)).await {
                Ok(Ok(page)) => {
                    let doc = Html::parse_document(&page.body);
                    contact_bodies.push(extract::collect_text(&doc));
                }
                _ => continue,
            }
            tokio::time::sleep(CONTACT_POLITENESS_SLEEP).await;
        }
        for body in &contact_bodies {
            text.push(' ');
            text.push_str(body);
        }

        let emails = extract::extract_emails(&text, &domain);
        let phone = extract::extract_phone(&text);
        let company_name = extract::extract_company_name(&document, &domain);
        let description = extract::extract_description(&document);
        let address = extract::extract_address(&document, &text);

        let extra = analyzer
            .fetch_extra(&homepage.body, &homepage.final_url, &self.client)
            .await;
        let (extra_text, extra_data) = match &extra {
            Some(e) => (e.extra_text.clone(), e.extra_data.clone()),
            None => (String::new(), serde_json::json!({})),
        };

        let combined_text = if extra_text.is_empty() {
            text
        } else {
            format!("{text} {extra_text}")
        };

        let analysis = analyzer.analyze(&AnalyzeInput {
            text: &combined_text,
            url: &homepage.final_url,
            domain: &domain,
            extra_data: &extra_data,
            emails: &emails,
        });

        Ok(Some(Lead {
            company_name,
            website: homepage.final_url,
            domain,
            email: emails.first().cloned(),
            all_emails: emails,
            phone,
            address,
            description,
            score: analysis.score,
            analysis_data: serde_json::to_value(&analysis).unwrap_or(serde_json::json!({})),
            email_valid: None,
            email_validation_score: None,
            email_validation_reason: None,
            found_at: crate::time::now_ms(),
        }))
    }
}

/// Finds up to `MAX_CONTACT_PAGES` contact/about-style links that share the
/// homepage's domain, from anchors whose path ends in a contact/about
/// marker word (optionally trailed by `/` or `-`).
fn find_contact_links(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let Some(base_host) = base.host_str() else {
        return Vec::new();
    };
    let Ok(a_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let re = extract::contact_link_regex();

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for el in document.select(&a_sel) {
        if out.len() >= MAX_CONTACT_PAGES {
            break;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(absolute) = base.join(href) else {
            continue;
        };
        if absolute.host_str() != Some(base_host) {
            continue;
        }
        if !re.is_match(absolute.as_str()) {
            continue;
        }
        let key = absolute.to_string();
        if seen.insert(key.clone()) {
            out.push(key);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_fetcher_constructs() {
        let client = RateLimitedFetcher::new(2, 10, "leadgen-bot/1.0");
        let _fetcher = SiteFetcher::new(client);
    }

    #[test]
    fn test_find_contact_links_same_domain_only() {
        let html = r#"<html><body>
            <a href="/contact">Contact</a>
            <a href="https://other.nl/contact">Other</a>
            <a href="/about">About</a>
        </body></html>"#;
        let document = Html::parse_document(html);
        let links = find_contact_links(&document, "https://acme.nl");
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.starts_with("https://acme.nl")));
    }

    #[test]
    fn test_find_contact_links_capped_at_two() {
        let html = r#"<html><body>
            <a href="/contact">Contact</a>
            <a href="/about">About</a>
            <a href="/over-ons">Over ons</a>
        </body></html>"#;
        let document = Html::parse_document(html);
        let links = find_contact_links(&document, "https://acme.nl");
        assert_eq!(links.len(), 2);
    }
}
