//! Contact-data extraction from a fetched page: emails, phone numbers,
//! a company name, a short description, and a best-effort address.
//!
//! Static functions over a parsed `scraper::Html` document, with a
//! `collect_text`-style helper for reading element text, applied to contact
//! data instead
//! of SEO metadata.

use crate::models::{MAX_ALL_EMAILS, MAX_DESCRIPTION_LEN};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w.+-]+@[\w.-]+\.[a-zA-Z]{2,}").unwrap())
}

/// Anchors worth treating as a contact/about page: path ends in one of these
/// marker words, optionally trailed by `/` or `-`.
pub fn contact_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)/(contact|over-ons|about|kontakt|kontaktieren|uber-uns|over|info)[/-]?$")
            .unwrap()
    })
}

fn phone_regex_nl() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\+31|0031|0)[\s.-]?6[\s.-]?\d{8}|(?:\+31|0031|0)[\s.-]?\d{1,3}[\s.-]?\d{3,4}[\s.-]?\d{4}").unwrap())
}

fn phone_regex_be() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\+32|0032|0)[\s.-]?4\d{2}[\s.-]?\d{2}[\s.-]?\d{2}[\s.-]?\d{2}|(?:\+32|0032|0)[\s.-]?\d{1,2}[\s.-]?\d{3}[\s.-]?\d{2}[\s.-]?\d{2}").unwrap())
}

fn phone_regex_de() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\+49|0049|0)[\s.-]?\d{2,5}[\s.-]?\d{3,9}").unwrap())
}

fn phone_regex_generic() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+\d{1,3}[\s.-]?\d{4,14}").unwrap())
}

/// Hosts whose mail is routed through a third party, never a real company
/// contact for the domain being scored.
const SERVICE_INFRA_HOSTS: &[&str] = &[
    "sentry.io",
    "wixpress.com",
    "godaddy.com",
    "shopify.com",
    "squarespace.com",
    "cloudflare.com",
    "mailchimp.com",
    "example.com",
];

const GENERIC_LOCAL_PARTS: &[&str] = &["info", "contact", "sales", "office", "admin"];

fn is_asset_extension(candidate: &str) -> bool {
    const EXT: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp"];
    EXT.iter().any(|ext| candidate.ends_with(ext))
}

fn email_host(email: &str) -> Option<&str> {
    email.split_once('@').map(|(_, host)| host)
}

fn email_local_part(email: &str) -> Option<&str> {
    email.split_once('@').map(|(local, _)| local)
}

fn is_valid_email_candidate(candidate: &str) -> bool {
    if is_asset_extension(candidate) {
        return false;
    }
    if candidate.contains("..") || candidate.ends_with('.') {
        return false;
    }
    if candidate.contains("noreply") || candidate.contains("no-reply") || candidate.contains("donotreply") {
        return false;
    }
    let Some(host) = email_host(candidate) else {
        return false;
    };
    if SERVICE_INFRA_HOSTS.contains(&host) {
        return false;
    }
    match email_local_part(candidate) {
        Some(local) if local.len() > 40 => false,
        Some(_) => true,
        None => false,
    }
}

/// Extracts all plausible email addresses from page text, filters out
/// placeholders/service hosts, and ranks survivors: same-domain emails
/// first (generic local parts like `info@`/`contact@` ahead of others
/// within that group), non-domain emails appended last. Primary email is
/// the first entry after ranking. Capped at `MAX_ALL_EMAILS`.
pub fn extract_emails(text: &str, domain: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut same_domain_generic = Vec::new();
    let mut same_domain_other = Vec::new();
    let mut other_domain = Vec::new();

    for m in email_regex().find_iter(text) {
        let candidate = m.as_str().to_lowercase();
        if !is_valid_email_candidate(&candidate) {
            continue;
        }
        if !seen.insert(candidate.clone()) {
            continue;
        }
        let host = email_host(&candidate).unwrap_or_default();
        let local = email_local_part(&candidate).unwrap_or_default();
        if host == domain {
            if GENERIC_LOCAL_PARTS.contains(&local) {
                same_domain_generic.push(candidate);
            } else {
                same_domain_other.push(candidate);
            }
        } else {
            other_domain.push(candidate);
        }
    }

    same_domain_generic
        .into_iter()
        .chain(same_domain_other)
        .chain(other_domain)
        .take(MAX_ALL_EMAILS)
        .collect()
}

/// First plausible phone number found in the page text: NL/BE/DE-specific
/// patterns are tried before the generic international fallback.
pub fn extract_phone(text: &str) -> Option<String> {
    for re in [phone_regex_nl(), phone_regex_be(), phone_regex_de(), phone_regex_generic()] {
        if let Some(m) = re
            .find_iter(text)
            .find(|m| m.as_str().chars().filter(|c| c.is_ascii_digit()).count() >= 7)
        {
            return Some(m.as_str().trim().to_string());
        }
    }
    None
}

/// Best-effort company name: `og:site_name` meta tag, then `<title>` split
/// on `-|–|—` (first segment, only if the full title is under 80 chars),
/// then the first `<h1>` (if under 80 chars), then the domain itself.
pub fn extract_company_name(document: &Html, domain: &str) -> Option<String> {
    if let Ok(og_sel) = Selector::parse(r#"meta[property="og:site_name" i]"#) {
        if let Some(el) = document.select(&og_sel).next() {
            if let Some(content) = el.value().attr("content") {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }

    if let Ok(title_sel) = Selector::parse("title") {
        if let Some(el) = document.select(&title_sel).next() {
            let raw: String = el.text().collect();
            let trimmed = raw.trim();
            if !trimmed.is_empty() && trimmed.chars().count() < 80 {
                let name = trimmed
                    .split(['|', '-', '–', '—'])
                    .next()
                    .unwrap_or(trimmed)
                    .trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }

    if let Ok(h1_sel) = Selector::parse("h1") {
        if let Some(el) = document.select(&h1_sel).next() {
            let text: String = el.text().collect();
            let trimmed = text.trim();
            if !trimmed.is_empty() && trimmed.chars().count() <= 80 {
                return Some(trimmed.to_string());
            }
        }
    }

    Some(domain.to_string())
}

/// Short description from the meta description tag, falling back to
/// `og:description`. Truncated to `MAX_DESCRIPTION_LEN` chars.
///
/// First-match-wins with no confidence scoring — a known limitation rather
/// than ranked candidates.
pub fn extract_description(document: &Html) -> Option<String> {
    if let Ok(meta_sel) = Selector::parse(r#"meta[name="description" i]"#) {
        if let Some(el) = document.select(&meta_sel).next() {
            if let Some(content) = el.value().attr("content") {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    return Some(truncate(trimmed));
                }
            }
        }
    }

    if let Ok(og_sel) = Selector::parse(r#"meta[property="og:description" i]"#) {
        if let Some(el) = document.select(&og_sel).next() {
            if let Some(content) = el.value().attr("content") {
                let trimmed = content.trim();
                if !trimmed.is_empty() {
                    return Some(truncate(trimmed));
                }
            }
        }
    }

    None
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_DESCRIPTION_LEN {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(MAX_DESCRIPTION_LEN).collect();
        out.push('…');
        out
    }
}

/// Best-effort street address: the contents of the first element carrying
/// a postal-address-ish selector, or a loose "street number, postcode
/// city" pattern in page text. Kept only if its length is in `[10, 200]`.
pub fn extract_address(document: &Html, text: &str) -> Option<String> {
    let address_sel =
        Selector::parse(r#"[itemtype*="PostalAddress" i], address, .address, .contact-info, [class*="adres" i]"#)
            .ok()?;
    if let Some(el) = document.select(&address_sel).next() {
        let raw: String = el.text().collect();
        let trimmed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if (10..=200).contains(&trimmed.len()) {
            return Some(trimmed);
        }
    }

    static ADDRESS_RE: OnceLock<Regex> = OnceLock::new();
    let re = ADDRESS_RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9 .'-]+\s\d{1,5}[A-Za-z]?,?\s*\d{4}\s?[A-Z]{2}\s+[A-Za-z]+").unwrap()
    });
    re.find(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| (10..=200).contains(&s.len()))
}

const VACANCY_LINK_MARKERS: &[&str] = &[
    "career", "careers", "vacature", "vacatures", "jobs", "join-us", "werken-bij", "karriere",
];

/// Finds a link pointing to a careers/vacancies page, if the homepage links
/// to one.
pub fn find_careers_link(html: &str, base_url: &str) -> Option<String> {
    find_vacancy_links(html, base_url, 1).into_iter().next()
}

/// Finds up to `max` same-domain vacancy/careers links, for the recruitment
/// analyzer's `fetch_extra` second pass.
pub fn find_vacancy_links(html: &str, base_url: &str, max: usize) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(a_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let Some(base_host) = base.host_str() else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for el in document.select(&a_sel) {
        if out.len() >= max {
            break;
        }
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let lower = href.to_lowercase();
        if !VACANCY_LINK_MARKERS.iter().any(|m| lower.contains(m)) {
            continue;
        }
        let Ok(absolute) = base.join(href) else {
            continue;
        };
        if absolute.host_str() != Some(base_host) {
            continue;
        }
        let key = absolute.to_string();
        if seen.insert(key.clone()) {
            out.push(key);
        }
    }
    out
}

/// Collects normalized whitespace-joined visible text from the document,
/// skipping script/style contents.
pub fn collect_text(document: &Html) -> String {
    let body_sel = Selector::parse("body").unwrap();
    let skip_sel = Selector::parse("script, style, noscript").unwrap();
    let skip_texts: std::collections::HashSet<String> = document
        .select(&skip_sel)
        .map(|el| el.text().collect::<String>())
        .collect();

    document
        .select(&body_sel)
        .next()
        .map(|body| {
            body.text()
                .filter(|t| !skip_texts.contains(*t))
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_emails_ranks_same_domain_generic_first() {
        let text = "Reach jane.doe@acme.nl or info@acme.nl or sales@other.nl, \
                     not noreply@acme.nl, not foo@example.com.";
        let emails = extract_emails(text, "acme.nl");
        assert_eq!(
            emails,
            vec![
                "info@acme.nl".to_string(),
                "jane.doe@acme.nl".to_string(),
                "sales@other.nl".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_emails_rejects_double_dot_local_part() {
        let text = "weird a..b@acme.nl but fine jane@acme.nl";
        let emails = extract_emails(text, "acme.nl");
        assert_eq!(emails, vec!["jane@acme.nl".to_string()]);
    }

    #[test]
    fn test_extract_emails_rejects_service_host() {
        let text = "no-reply@sentry.io should never be a lead email";
        let emails = extract_emails(text, "acme.nl");
        assert!(emails.is_empty());
    }

    #[test]
    fn test_extract_emails_respects_cap() {
        let text = (0..10)
            .map(|i| format!("user{i}@acme.nl"))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(extract_emails(&text, "acme.nl").len(), MAX_ALL_EMAILS);
    }

    #[test]
    fn test_extract_phone_nl_mobile() {
        assert!(extract_phone("bel 06-12345678 voor info").is_some());
    }

    #[test]
    fn test_extract_phone_requires_enough_digits() {
        assert!(extract_phone("version 1.2 released").is_none());
    }

    #[test]
    fn test_extract_company_name_prefers_og_site_name() {
        let html = Html::parse_document(
            r#"<html><head><meta property="og:site_name" content="Acme BV">
               <title>Acme BV - Warehousing</title></head></html>"#,
        );
        assert_eq!(
            extract_company_name(&html, "acme.nl"),
            Some("Acme BV".to_string())
        );
    }

    #[test]
    fn test_extract_company_name_falls_back_to_domain() {
        let html = Html::parse_document("<html><head></head><body></body></html>");
        assert_eq!(
            extract_company_name(&html, "acme.nl"),
            Some("acme.nl".to_string())
        );
    }

    #[test]
    fn test_extract_description_prefers_meta() {
        let html = Html::parse_document(
            r#"<html><head><meta name="description" content="We do logistics."></head>
               <body><p>A much longer paragraph that should not be picked instead.</p></body></html>"#,
        );
        assert_eq!(extract_description(&html), Some("We do logistics.".to_string()));
    }

    #[test]
    fn test_extract_description_falls_back_to_og() {
        let html = Html::parse_document(
            r#"<html><head><meta property="og:description" content="We do logistics."></head></html>"#,
        );
        assert_eq!(extract_description(&html), Some("We do logistics.".to_string()));
    }

    #[test]
    fn test_find_careers_link_resolves_relative() {
        let html = r#"<html><body><a href="/careers">Careers</a></body></html>"#;
        let link = find_careers_link(html, "https://acme.nl");
        assert_eq!(link, Some("https://acme.nl/careers".to_string()));
    }

    #[test]
    fn test_find_careers_link_none_when_absent() {
        let html = r#"<html><body><a href="/about">About</a></body></html>"#;
        assert_eq!(find_careers_link(html, "https://acme.nl"), None);
    }

    #[test]
    fn test_contact_link_regex_matches_known_markers() {
        let re = contact_link_regex();
        assert!(re.is_match("https://acme.nl/contact"));
        assert!(re.is_match("https://acme.nl/over-ons"));
        assert!(!re.is_match("https://acme.nl/products"));
    }
}
