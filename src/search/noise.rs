//! Hosts that show up in search results but are never real candidate
//! companies: search engines themselves, social platforms, directories,
//! and other aggregators the analyzer would just waste a fetch on.

pub const NOISE_DOMAINS: &[&str] = &[
    "google.com",
    "bing.com",
    "duckduckgo.com",
    "yahoo.com",
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "wikipedia.org",
    "wikimedia.org",
    "reddit.com",
    "amazon.com",
    "amazon.nl",
    "amazon.de",
    "bol.com",
    "marktplaats.nl",
    "indeed.com",
    "indeed.nl",
    "glassdoor.com",
    "glassdoor.nl",
    "kvk.nl",
    "opencorporates.com",
    "crunchbase.com",
    "bloomberg.com",
    "yellowpages.com",
    "goudengids.nl",
    "telefoonboek.nl",
    "detelefoongids.nl",
    "trustpilot.com",
    "yelp.com",
    "tripadvisor.com",
    "booking.com",
    "apple.com",
    "microsoft.com",
    "play.google.com",
    "apps.apple.com",
    "medium.com",
    "github.com",
    "stackoverflow.com",
    "quora.com",
    "pdf.com",
    "scribd.com",
    "slideshare.net",
    "issuu.com",
    "vimeo.com",
    "dailymotion.com",
    "archive.org",
    "web.archive.org",
    "news.google.com",
    "nu.nl",
    "nos.nl",
    "rtlnieuws.nl",
    "telegraaf.nl",
    "volkskrant.nl",
    "fd.nl",
    "handelsblatt.com",
    "spiegel.de",
    "lesoir.be",
    "standaard.be",
    "hln.be",
];

pub fn is_noise(domain: &str) -> bool {
    let lower = domain.to_lowercase();
    NOISE_DOMAINS
        .iter()
        .any(|noise| lower == *noise || lower.ends_with(&format!(".{noise}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_noise_domain_detected() {
        assert!(is_noise("www.linkedin.com"));
        assert!(is_noise("LinkedIn.com"));
    }

    #[test]
    fn test_real_company_domain_not_noise() {
        assert!(!is_noise("acme-logistics.nl"));
    }
}
