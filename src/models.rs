use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// --- Query & sector/country provenance ---

/// A concrete search-engine query plus its sector/country provenance.
/// Produced by `Analyzer::generate_queries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    pub sector_key: String,
    pub sector_label: String,
    pub country_key: String,
    pub country_label: String,
}

/// One sector this analyzer's taxonomy knows about: a key/label pair plus
/// the base query templates to run against every selected country.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SectorDef {
    pub key: String,
    pub label: String,
    pub queries: Vec<String>,
}

/// Country key -> (label, search-engine suffix), e.g. NL -> ("Nederland", "site:.nl").
#[derive(Debug, Clone, Copy)]
pub struct CountryDef {
    pub key: &'static str,
    pub label: &'static str,
    pub suffix: &'static str,
}

pub const COUNTRIES: &[CountryDef] = &[
    CountryDef {
        key: "NL",
        label: "Nederland",
        suffix: "site:.nl",
    },
    CountryDef {
        key: "BE",
        label: "België",
        suffix: "site:.be",
    },
    CountryDef {
        key: "DE",
        label: "Deutschland",
        suffix: "site:.de",
    },
];

// --- Job configuration ---

/// Immutable per-job configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_target_leads")]
    pub target_leads: u32,
    #[serde(default)]
    pub sector_keys: Vec<String>,
    #[serde(default)]
    pub country_keys: Vec<String>,
    #[serde(default = "default_min_score")]
    pub min_score: u32,
    #[serde(default = "default_true")]
    pub email_validation: bool,
    #[serde(default)]
    pub deep_validation: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_true")]
    pub use_puppeteer: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            target_leads: default_target_leads(),
            sector_keys: Vec::new(),
            country_keys: Vec::new(),
            min_score: default_min_score(),
            email_validation: true,
            deep_validation: false,
            concurrency: default_concurrency(),
            use_puppeteer: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_target_leads() -> u32 {
    1000
}

fn default_min_score() -> u32 {
    50
}

fn default_concurrency() -> usize {
    5
}

/// Request payload to start a job for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartJobRequest {
    pub list_id: String,
    pub use_case: String,
    #[serde(default)]
    pub config: JobConfig,
}

// --- Lead ---

/// A scored company record, keyed by normalized domain per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub company_name: Option<String>,
    pub website: String,
    pub domain: String,
    pub email: Option<String>,
    pub all_emails: Vec<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub score: u32,
    pub analysis_data: serde_json::Value,
    pub email_valid: Option<bool>,
    pub email_validation_score: Option<u32>,
    pub email_validation_reason: Option<String>,
    pub found_at: i64,
}

pub const MAX_ALL_EMAILS: usize = 5;
pub const MAX_DESCRIPTION_LEN: usize = 300;

// --- Search result ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub urls: Vec<String>,
    pub blocked: bool,
    pub source: SearchSource,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Browser,
    Http,
}

// --- Job lifecycle ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatusKind {
    Running,
    Stopping,
    Done,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobCounters {
    pub leads_found: u32,
    pub duplicates_skipped: u32,
    pub errors_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub session_id: String,
    pub status: JobStatusKind,
    pub counters: JobCounters,
}

// --- Progress events (Broadcaster payloads) ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    JobStarted {
        session_id: String,
        queries: usize,
    },
    QueryStart {
        query: String,
        sector: String,
    },
    DomainsFound {
        count: usize,
    },
    Lead {
        lead: Box<Lead>,
    },
    Progress {
        counters: JobCounters,
    },
    SearchProgress {
        query: String,
        results_found: usize,
        blocked: bool,
        source: SearchSource,
        error: Option<String>,
    },
    Log {
        level: LogLevel,
        message: String,
    },
    JobError {
        error: String,
    },
    JobDone {
        final_status: JobStatusKind,
        counters: JobCounters,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Success,
}

// --- Progress snapshot (ProgressTracker derived state) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Idle,
    Running,
    Stopping,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: i64,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: ProgressStatus,
    pub started_at: Option<i64>,
    pub total_queries: u32,
    pub processed_queries: u32,
    pub total_domains: u32,
    pub processed_domains: u32,
    pub leads_found: u32,
    pub errors: u32,
    pub current_sector: Option<String>,
    pub current_country: Option<String>,
    pub current_domain: Option<String>,
    pub progress_pct: u32,
    pub leads_per_minute: f64,
    pub eta_seconds: Option<u64>,
    pub elapsed_seconds: f64,
    pub log: Vec<LogEntry>,
}

// --- Analyzer breakdown shape ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionBreakdown {
    pub score: u32,
    pub max: u32,
    pub hits: u32,
    pub matched_signals: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: u32,
    pub breakdown: HashMap<String, DimensionBreakdown>,
}

/// Input bundle passed to `Analyzer::analyze`.
#[derive(Debug, Clone)]
pub struct AnalyzeInput<'a> {
    pub text: &'a str,
    pub url: &'a str,
    pub domain: &'a str,
    pub extra_data: &'a serde_json::Value,
    pub emails: &'a [String],
}

/// Result of an analyzer's optional second-pass crawl.
#[derive(Debug, Clone, Default)]
pub struct ExtraCrawlResult {
    pub extra_text: String,
    pub extra_data: serde_json::Value,
}
