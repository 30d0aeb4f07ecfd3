//! ERP/logistics-software fit analyzer.
//!
//! Four weighted dimensions (logistics operations, systems integration,
//! B2B signals, digital maturity), each scored by counting keyword hits
//! against a tiered threshold, plus a small regional bonus for companies
//! already operating under a `.nl`/`.be`/`.de` domain whose B2B dimension
//! otherwise scored nothing.

use super::Analyzer;
use crate::models::{AnalysisResult, AnalyzeInput, DimensionBreakdown, ExtraCrawlResult, QuerySpec};
use async_trait::async_trait;
use std::collections::HashMap;

struct Dimension {
    name: &'static str,
    weight: u32,
    keywords: &'static [&'static str],
}

/// Tiered hit→score mapping shared by every dimension: full weight at
/// ≥3 hits, 70% at 2, 40% at 1, else 0.
fn tiered_score(hits: u32, weight: u32) -> u32 {
    match hits {
        0 => 0,
        1 => (weight * 40) / 100,
        2 => (weight * 70) / 100,
        _ => weight,
    }
}

const MAX_MATCHED_SIGNALS: usize = 5;

const DIMENSIONS: &[Dimension] = &[
    Dimension {
        name: "logistics_operations",
        weight: 30,
        keywords: &[
            "warehouse",
            "inventory",
            "logistics",
            "supply chain",
            "fulfillment",
            "distribution center",
            "stock management",
        ],
    },
    Dimension {
        name: "systems_integration",
        weight: 25,
        keywords: &[
            "erp",
            "api integration",
            "edi",
            "sap",
            "microsoft dynamics",
            "netsuite",
            "odoo",
        ],
    },
    Dimension {
        name: "b2b",
        weight: 25,
        keywords: &[
            "multiple locations",
            "branches",
            "nationwide",
            "employees",
            "b2b",
            "wholesale",
            "enterprise",
        ],
    },
    Dimension {
        name: "digital_maturity",
        weight: 20,
        keywords: &["online portal", "customer portal", "e-commerce", "webshop", "dashboard"],
    },
];

const SECTOR_KEYS: &[&str] = &["logistics", "wholesale_distribution", "manufacturing"];

fn sector_queries(sector_key: &str) -> &'static [&'static str] {
    match sector_key {
        "logistics" => &[
            "warehouse management software",
            "logistics company inventory system",
        ],
        "wholesale_distribution" => &["wholesale distributor b2b", "distribution company"],
        "manufacturing" => &["manufacturing company supply chain"],
        _ => &[],
    }
}

fn sector_label(sector_key: &str) -> &'static str {
    match sector_key {
        "logistics" => "Logistics",
        "wholesale_distribution" => "Wholesale & Distribution",
        "manufacturing" => "Manufacturing",
        _ => "Other",
    }
}

pub struct ErpAnalyzer;

impl Default for ErpAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ErpAnalyzer {
    pub fn new() -> Self {
        ErpAnalyzer
    }

    /// +2 if the domain ends in one of this product's target-country TLDs
    /// and the B2B dimension scored nothing — the bonus exists to reward
    /// plausibly-local companies whose B2B signals just didn't show up in
    /// the scraped text.
    fn regional_bonus(domain: &str, b2b_score: u32) -> (u32, Option<&'static str>) {
        if b2b_score > 0 {
            return (0, None);
        }
        for country in crate::models::COUNTRIES {
            let suffix = country.suffix.trim_start_matches("site:");
            if domain.ends_with(suffix) {
                return (2, Some("regional_b2b_bonus"));
            }
        }
        (0, None)
    }
}

#[async_trait]
impl Analyzer for ErpAnalyzer {
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

    async fn fetch_extra(
        &self,
        _homepage_html: &str,
        _base_url: &str,
        _client: &crate::fetcher::http::RateLimitedFetcher,
    ) -> Option<ExtraCrawlResult> {
        None
    }

    fn analyze(&self, input: &AnalyzeInput<'_>) -> AnalysisResult {
        let text_lower = input.text.to_lowercase();
        let mut breakdown = HashMap::new();
        let mut total = 0u32;
        let mut b2b_score = 0u32;

        for dim in DIMENSIONS {
            let mut hits = 0u32;
            let mut matched_signals = Vec::new();
            for kw in dim.keywords {
                if text_lower.contains(kw) {
                    hits += 1;
                    if matched_signals.len() < MAX_MATCHED_SIGNALS {
                        matched_signals.push((*kw).to_string());
                    }
                }
            }
            let score = tiered_score(hits, dim.weight);
            if dim.name == "b2b" {
                b2b_score = score;
            }
            total += score;
            breakdown.insert(
                dim.name.to_string(),
                DimensionBreakdown {
                    score,
                    max: dim.weight,
                    hits,
                    matched_signals,
                },
            );
        }

        let (bonus, bonus_label) = Self::regional_bonus(input.domain, b2b_score);
        if bonus > 0 {
            total += bonus;
            breakdown.insert(
                "regional_bonus".to_string(),
                DimensionBreakdown {
                    score: bonus,
                    max: bonus,
                    hits: 1,
                    matched_signals: bonus_label.into_iter().map(String::from).collect(),
                },
            );
        }

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
    fn test_warehouse_logistics_nl_scores_32() {
        let analyzer = ErpAnalyzer::new();
        let extra = serde_json::json!({});
        let emails: Vec<String> = vec![];
        let input = AnalyzeInput {
            text: "We handle warehouse inventory logistics for national clients.",
            url: "https://example.nl",
            domain: "example.nl",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.score, 32);
        assert_eq!(result.breakdown["logistics_operations"].score, 30);
        assert_eq!(result.breakdown["logistics_operations"].hits, 3);
        assert_eq!(result.breakdown["systems_integration"].score, 0);
        assert_eq!(result.breakdown["regional_bonus"].score, 2);
    }

    #[test]
    fn test_regional_bonus_suppressed_when_b2b_dimension_scores() {
        let analyzer = ErpAnalyzer::new();
        let extra = serde_json::json!({});
        let emails: Vec<String> = vec![];
        let input = AnalyzeInput {
            text: "Nationwide wholesale b2b enterprise distribution for branches across the country.",
            url: "https://example.nl",
            domain: "example.nl",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert!(result.breakdown["b2b"].score > 0);
        assert!(!result.breakdown.contains_key("regional_bonus"));
    }

    #[test]
    fn test_tiered_score_boundaries() {
        assert_eq!(tiered_score(0, 30), 0);
        assert_eq!(tiered_score(1, 30), 12);
        assert_eq!(tiered_score(2, 30), 21);
        assert_eq!(tiered_score(3, 30), 30);
        assert_eq!(tiered_score(10, 30), 30);
    }

    #[test]
    fn test_no_signals_scores_zero() {
        let analyzer = ErpAnalyzer::new();
        let extra = serde_json::json!({});
        let emails: Vec<String> = vec![];
        let input = AnalyzeInput {
            text: "We sell handmade candles and gift baskets.",
            url: "https://example.com",
            domain: "example.com",
            extra_data: &extra,
            emails: &emails,
        };
        let result = analyzer.analyze(&input);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_generate_queries_defaults_to_all_sectors_and_countries() {
        let analyzer = ErpAnalyzer::new();
        let queries = analyzer.generate_queries(&[], &[]);
        assert!(!queries.is_empty());
        assert!(queries.iter().any(|q| q.country_key == "NL"));
    }
}
