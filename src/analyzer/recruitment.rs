//! Recruitment/staffing-service fit analyzer.
//!
//! Five weighted dimensions: whether a vacancies/careers page exists at
//! all (35), how many open vacancies it lists (25, tiered), growth-hiring
//! language (20, tiered per signal), a human HR contact (10), and
//! detectable applicant-tracking-system usage (10) — summing to 100.

use super::Analyzer;
use crate::models::{AnalysisResult, AnalyzeInput, DimensionBreakdown, ExtraCrawlResult, QuerySpec};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const SECTOR_KEYS: &[&str] = &["it_services", "professional_services", "healthcare"];

fn sector_queries(sector_key: &str) -> &'static [&'static str] {
    match sector_key {
        "it_services" => &["IT company vacancies", "software development jobs company"],
        "professional_services" => &["consulting firm careers", "professional services hiring"],
        "healthcare" => &["healthcare organization vacancies"],
        _ => &[],
    }
}

fn sector_label(sector_key: &str) -> &'static str {
    match sector_key {
        "it_services" => "IT Services",
        "professional_services" => "Professional Services",
        "healthcare" => "Healthcare",
        _ => "Other",
    }
}

const VACANCY_COUNT_MARKERS: &[&str] = &[
    "vacature",
    "functie",
    "job opening",
    "open position",
    "stellenangebot",
];

const GROWTH_SIGNALS: &[&str] = &[
    "expanding our team",
    "we are growing",
    "rapid growth",
    "scaling up",
    "multiple openings",
    "urgently hiring",
];

const ATS_DOMAIN_MARKERS: &[&str] = &[
    "teamtailor.com",
    "greenhouse.io",
    "lever.co",
    "workday.com",
    "recruitee.com",
    "personio",
    "breezy.hr",
    "smartrecruiters.com",
];

const MAX_MATCHED_SIGNALS: usize = 5;
const VACANCY_FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
const MAX_VACANCY_PAGE_BYTES: usize = 20 * 1024;
/// Cap on the summed occurrence count feeding `vacancy_count_tier`, so one
/// page stuffed with a repeated marker can't inflate past the top tier.
const MAX_VACANCY_OCCURRENCES: u32 = 50;

fn hr_email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(hr|jobs?|careers?|recruitment|vacatures?|werk|talent|people)\b").unwrap()
    })
}

/// `we (zijn op zoek|zoeken)` isn't a plain substring, so it gets its own
/// regex rather than an entry in `VACANCY_COUNT_MARKERS`.
fn we_seeking_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"we (zijn op zoek|zoeken)").unwrap())
}

/// Maps a raw vacancy-indicator occurrence count (summed across markers,
/// capped at `MAX_VACANCY_OCCURRENCES`) to the tiered sub-score (weight 25).
fn vacancy_count_tier(count: u32) -> u32 {
    if count >= 10 {
        25
    } else if count >= 5 {
        18
    } else if count >= 2 {
        10
    } else if count >= 1 {
        5
    } else {
        0
    }
}

/// Maps a growth-signal hit count to the tiered sub-score (weight 20).
fn growth_signal_tier(count: u32) -> u32 {
    match count {
        0 => 0,
        1 => 8,
        2 => 14,
        _ => 20,
    }
}

pub struct RecruitmentAnalyzer;

impl Default for RecruitmentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecruitmentAnalyzer {
    pub fn new() -> Self {
        RecruitmentAnalyzer
    }
}

#[async_trait]
impl Analyzer for RecruitmentAnalyzer {
    fn generate_queries(&self, sector_keys: &[String], country_keys: &[String]) -> Vec<QuerySpec> {
        let sectors: Vec<&str> = if sector_keys.is_empty() {
            SECTOR_KEYS.to_vec()
        } else {
            sector_keys.iter().map(String::as_str).collect()
        };
        let countries: Vec<&crate::models::CountryDef> = crate::models::COUNTRIES
            .iter()
            .filter(|c| country_keys.is_empty() || country_keys.iter().any(|k| k == c.key))
            .collect();

        let mut out = Vec::new();
        for sector in sectors {
            for template in sector_queries(sector) {
                for country in &countries {
                    out.push(QuerySpec {
                        query: format!("{template} {}", country.suffix),
                        sector_key: sector.to_string(),
                        sector_label: sector_label(sector).to_string(),
                        country_key: country.key.to_string(),
                        country_label: country.label.to_string(),
                    });
                }
            }
        }
        out
    }

    /// Finds up to two same-domain vacancy/careers links on the homepage,
    /// fetches each (10s timeout, raw HTML capped at 20KB before parsing),
    /// and concatenates their extracted text for `analyze` to count vacancy
    /// and growth signals against.
    async fn fetch_extra(
        &self,
        homepage_html: &str,
        base_url: &str,
        client: &crate::fetcher::http::RateLimitedFetcher,
    ) -> Option<ExtraCrawlResult> {
        let links = crate::fetcher::extract::find_vacancy_links(homepage_html, base_url, 2);
        if links.is_empty() {
            return None;
        }

        let mut extra_text = String::new();
        let mut ats_detected = false;
        let mut ats_marker: Option<&'static str> = None;
        for link in &links {
            let fetch = tokio::time::timeout(VACANCY_FETCH_TIMEOUT, client.fetch(link)).await;
            let Ok(Ok(result)) = fetch else {
                continue;
            };
            let capped_html = if result.body.len() > MAX_VACANCY_PAGE_BYTES {
                let boundary = (0..=MAX_VACANCY_PAGE_BYTES)
                    .rev()
                    .find(|&i| result.body.is_char_boundary(i))
                    .unwrap_or(0);
                &result.body[..boundary]
            } else {
                result.body.as_str()
            };
            let lower_html = capped_html.to_lowercase();
            if let Some(marker) = ATS_DOMAIN_MARKERS.iter().find(|marker| lower_html.contains(**marker)) {
                ats_detected = true;
                ats_marker.get_or_insert(*marker);
            }
            let document = scraper::Html::parse_document(capped_html);
            extra_text.push(' ');
            extra_text.push_str(&crate::fetcher::extract::collect_text(&document));
        }

        Some(ExtraCrawlResult {
            extra_text,
            extra_data: serde_json::json!({
                "careers_url": links[0],
                "ats_detected": ats_detected,
                "ats_marker": ats_marker,
            }),
        })
    }

    fn analyze(&self, input: &AnalyzeInput<'_>) -> AnalysisResult {
        let text_lower = input.text.to_lowercase();
        let mut breakdown = HashMap::new();

        let we_seeking_hits = we_seeking_regex().find_iter(&text_lower).count() as u32;
        let vacancy_occurrences: u32 = (VACANCY_COUNT_MARKERS
            .iter()
            .map(|kw| text_lower.matches(kw).count() as u32)
            .sum::<u32>()
            + we_seeking_hits)
            .min(MAX_VACANCY_OCCURRENCES);
        let mut vacancy_markers_present: Vec<String> = VACANCY_COUNT_MARKERS
            .iter()
            .filter(|kw| text_lower.contains(**kw))
            .map(|kw| (*kw).to_string())
            .collect();
        if we_seeking_hits > 0 {
            vacancy_markers_present.push("we (zijn op zoek|zoeken)".to_string());
        }
        // Presence is binary on whether fetchExtra located a vacancy page,
        // not on keyword hits in the text — that's vacancy_count's job.
        let has_vacancy_page = input
            .extra_data
            .get("careers_url")
            .is_some_and(|v| !v.is_null());

        let presence_score = if has_vacancy_page { 35 } else { 0 };
        breakdown.insert(
            "vacancy_presence".to_string(),
            DimensionBreakdown {
                score: presence_score,
                max: 35,
                hits: has_vacancy_page as u32,
                matched_signals: Vec::new(),
            },
        );

        let count_score = vacancy_count_tier(vacancy_occurrences);
        let count_signals: Vec<String> = vacancy_markers_present
            .iter()
            .take(MAX_MATCHED_SIGNALS)
            .cloned()
            .collect();
        breakdown.insert(
            "vacancy_count".to_string(),
            DimensionBreakdown {
                score: count_score,
                max: 25,
                hits: vacancy_occurrences,
                matched_signals: count_signals,
            },
        );

        let growth_hits: Vec<String> = GROWTH_SIGNALS
            .iter()
            .filter(|kw| text_lower.contains(**kw))
            .map(|kw| (*kw).to_string())
            .collect();
        let growth_score = growth_signal_tier(growth_hits.len() as u32);
        let growth_signals: Vec<String> = growth_hits.iter().take(MAX_MATCHED_SIGNALS).cloned().collect();
        breakdown.insert(
            "growth_signals".to_string(),
            DimensionBreakdown {
                score: growth_score,
                max: 20,
                hits: growth_hits.len() as u32,
                matched_signals: growth_signals,
            },
        );

        let hr_email = input.emails.iter().find(|e| {
            e.split_once('@')
                .map(|(local, _)| hr_email_regex().is_match(local))
                .unwrap_or(false)
        });
        let hr_score = if hr_email.is_some() { 10 } else { 0 };
        breakdown.insert(
            "hr_contact".to_string(),
            DimensionBreakdown {
                score: hr_score,
                max: 10,
                hits: hr_email.is_some() as u32,
                matched_signals: hr_email.cloned().into_iter().collect(),
            },
        );

        // Consumes the raw-HTML ATS scan `fetch_extra` already did, rather
        // than re-deriving it from the visible text `analyze` sees.
        let ats_detected = input
            .extra_data
            .get("ats_detected")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let ats_marker = input
            .extra_data
            .get("ats_marker")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let ats_score = if ats_detected { 10 } else { 0 };
        breakdown.insert(
            "ats_detected".to_string(),
            DimensionBreakdown {
                score: ats_score,
                max: 10,
                hits: ats_detected as u32,
                matched_signals: ats_marker.into_iter().collect(),
            },
        );

        let total = presence_score + count_score + growth_score + hr_score + ats_score;

        AnalysisResult {
            score: total.min(100),
            breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scenario_scores_87() {
        let analyzer = RecruitmentAnalyzer::new();
        let text = "We have a vacature open. vacature functie job opening \
                     open position stellenangebot. \
                     we are growing and scaling up.";
        let extra = serde_json::json!({
            "careers_url": "https://acme.nl/vacatures",
            "ats_detected": true,
            "ats_marker": "teamtailor.com",
        });
        let emails = vec!["jobs@acme.nl".to_string()];
        let input = AnalyzeInput {
            text,
            url: "https://acme.nl",
            domain: "acme.nl",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.breakdown["vacancy_presence"].score, 35);
        assert_eq!(result.breakdown["vacancy_count"].hits, 6);
        assert_eq!(result.breakdown["vacancy_count"].score, 18);
        assert_eq!(result.breakdown["growth_signals"].score, 14);
        assert_eq!(result.breakdown["hr_contact"].score, 10);
        assert_eq!(result.breakdown["ats_detected"].score, 10);
        assert_eq!(result.score, 87);
    }

    #[test]
    fn test_vacancy_count_sums_occurrences_not_distinct_markers() {
        let analyzer = RecruitmentAnalyzer::new();
        let extra = serde_json::json!({});
        let emails: Vec<String> = vec![];
        let text = "vacature vacature vacature vacature vacature \
                     vacature vacature vacature vacature vacature";
        let input = AnalyzeInput {
            text,
            url: "https://acme.nl",
            domain: "acme.nl",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.breakdown["vacancy_count"].hits, 10);
        assert_eq!(result.breakdown["vacancy_count"].score, 25);
    }

    #[test]
    fn test_we_seeking_phrase_counts_as_vacancy_occurrence() {
        let analyzer = RecruitmentAnalyzer::new();
        let extra = serde_json::json!({});
        let emails: Vec<String> = vec![];
        let text = "we zoeken een nieuwe collega en we zijn op zoek naar talent";
        let input = AnalyzeInput {
            text,
            url: "https://acme.nl",
            domain: "acme.nl",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.breakdown["vacancy_count"].hits, 2);
        assert!(result.breakdown["vacancy_count"]
            .matched_signals
            .iter()
            .any(|s| s.contains("zoek")));
    }

    #[test]
    fn test_hr_email_regex_matches_talent_and_people_local_parts() {
        let analyzer = RecruitmentAnalyzer::new();
        let extra = serde_json::json!({});
        let emails = vec!["talent@acme.nl".to_string()];
        let input = AnalyzeInput {
            text: "",
            url: "https://acme.nl",
            domain: "acme.nl",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.breakdown["hr_contact"].score, 10);

        let emails = vec!["people@acme.nl".to_string()];
        let input = AnalyzeInput {
            text: "",
            url: "https://acme.nl",
            domain: "acme.nl",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.breakdown["hr_contact"].score, 10);
    }

    #[test]
    fn test_ats_detected_reads_extra_data_not_visible_text() {
        let analyzer = RecruitmentAnalyzer::new();
        // "teamtailor.com" appears only in raw HTML/extra_data, never in the
        // visible text handed to `analyze` — the old text-scan would miss it.
        let extra = serde_json::json!({ "ats_detected": true, "ats_marker": "teamtailor.com" });
        let emails: Vec<String> = vec![];
        let input = AnalyzeInput {
            text: "no ats mention here",
            url: "https://acme.nl",
            domain: "acme.nl",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.breakdown["ats_detected"].score, 10);
        assert_eq!(result.breakdown["ats_detected"].matched_signals, vec!["teamtailor.com".to_string()]);
    }

    #[test]
    fn test_no_signals_scores_zero() {
        let analyzer = RecruitmentAnalyzer::new();
        let extra = serde_json::json!({});
        let emails: Vec<String> = vec![];
        let input = AnalyzeInput {
            text: "We sell artisanal coffee beans online.",
            url: "https://example.com",
            domain: "example.com",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_vacancy_count_tier_boundaries() {
        assert_eq!(vacancy_count_tier(0), 0);
        assert_eq!(vacancy_count_tier(1), 5);
        assert_eq!(vacancy_count_tier(2), 10);
        assert_eq!(vacancy_count_tier(5), 18);
        assert_eq!(vacancy_count_tier(10), 25);
        assert_eq!(vacancy_count_tier(50), 25);
    }

    #[test]
    fn test_growth_signal_tier_boundaries() {
        assert_eq!(growth_signal_tier(0), 0);
        assert_eq!(growth_signal_tier(1), 8);
        assert_eq!(growth_signal_tier(2), 14);
        assert_eq!(growth_signal_tier(3), 20);
        assert_eq!(growth_signal_tier(10), 20);
    }

    #[test]
    fn test_vacancy_presence_requires_fetch_extra_hit_not_just_keywords() {
        let analyzer = RecruitmentAnalyzer::new();
        let extra = serde_json::json!({});
        let emails: Vec<String> = vec![];
        let input = AnalyzeInput {
            text: "we have a job opening right now",
            url: "https://acme.nl",
            domain: "acme.nl",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.breakdown["vacancy_presence"].score, 0);
        assert!(result.breakdown["vacancy_count"].score > 0);
    }
}
