//! Analyzer contract and use-case registry.
//!
//! Polymorphism here is a trait object keyed by use-case string, not an
//! inheritance hierarchy — the same string-keyed registry pattern used for
//! extractor configs elsewhere in this crate.

pub mod erp;
pub mod recruitment;

use crate::fetcher::http::RateLimitedFetcher;
use crate::models::{AnalysisResult, AnalyzeInput, ExtraCrawlResult, QuerySpec};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("unknown use case: {0}")]
    UnknownUseCase(String),
}

/// A pluggable scoring strategy for one use case (e.g. "erp", "recruitment").
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Builds the query set to run for the given sector/country selection.
    fn generate_queries(&self, sector_keys: &[String], country_keys: &[String]) -> Vec<QuerySpec>;

    /// Optionally crawls one more page (e.g. a vacancies page) beyond the
    /// homepage fetch already performed by `SiteFetcher`, using `client` to
    /// do so. Returning `None` means the analyzer only needs homepage text.
    async fn fetch_extra(
        &self,
        homepage_html: &str,
        base_url: &str,
        client: &RateLimitedFetcher,
    ) -> Option<ExtraCrawlResult>;

    /// Scores a fetched site. Never panics; unreadable input just scores 0.
    fn analyze(&self, input: &AnalyzeInput<'_>) -> AnalysisResult;
}

/// Registry of analyzers keyed by use-case string, looked up once per job
/// start and then held for the job's lifetime.
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: HashMap<String, Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let mut analyzers: HashMap<String, Arc<dyn Analyzer>> = HashMap::new();
        analyzers.insert("erp".to_string(), Arc::new(erp::ErpAnalyzer::new()));
        analyzers.insert(
            "recruitment".to_string(),
            Arc::new(recruitment::RecruitmentAnalyzer::new()),
        );
        AnalyzerRegistry { analyzers }
    }

    pub fn get(&self, use_case: &str) -> Result<Arc<dyn Analyzer>, AnalyzerError> {
        self.analyzers
            .get(use_case)
            .cloned()
            .ok_or_else(|| AnalyzerError::UnknownUseCase(use_case.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_use_cases_resolve() {
        let registry = AnalyzerRegistry::new();
        assert!(registry.get("erp").is_ok());
        assert!(registry.get("recruitment").is_ok());
    }

    #[test]
    fn test_unknown_use_case_errors() {
        let registry = AnalyzerRegistry::new();
        let err = registry.get("nonexistent").unwrap_err();
        assert!(matches!(err, AnalyzerError::UnknownUseCase(_)));
    }
}
