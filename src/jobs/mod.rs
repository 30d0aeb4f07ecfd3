//! Job lifecycle: per-tenant exclusivity, start/stop/status, and the
//! per-query/per-URL driver loop that actually runs a job.
//!
//! A map of tenant entries guarded by a lock, a background task per job,
//! and `tokio::select!` racing `join_set.join_next()` against
//! `cancel_token.cancelled()` to fan URLs out with bounded concurrency
//! while staying responsive to a stop request. Generalized from "one job,
//! global" to "one job per tenant key" and from crawling pages to running
//! search queries then scoring the URLs each one turns up.

use crate::analyzer::{Analyzer, AnalyzerError, AnalyzerRegistry};
use crate::cache::Cache;
use crate::concurrency::ConcurrencyLimiter;
use crate::config::Config;
use crate::fetcher::http::RateLimitedFetcher;
use crate::fetcher::SiteFetcher;
use crate::interfaces::{Broadcaster, InsertOutcome, LeadSink, SectorRegistry, SessionStore, SessionUpdate};
use crate::models::{
    JobConfig, JobCounters, JobStatus, JobStatusKind, LogLevel, ProgressEvent, StartJobRequest,
};
use crate::progress::ProgressTracker;
use crate::search::pool::PagePool;
use crate::search::SearchAdapter;
use crate::validator::EmailValidator;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// TLDs a search result must carry to be worth a fetch at all, independent
/// of which countries the job itself selected.
const VALID_TLDS: &[&str] = &[
    ".nl", ".be", ".de", ".com", ".eu", ".net", ".org", ".biz", ".info",
];

#[derive(Debug, thiserror::Error)]
pub enum JobManagerError {
    #[error("a job is already running for this tenant")]
    JobAlreadyRunning,
    #[error("no queries were generated for the given sectors/countries")]
    NoQueries,
    #[error("unknown use case: {0}")]
    UnknownUseCase(String),
    #[error("maximum number of concurrent jobs reached")]
    TooManyActiveJobs,
}

impl From<AnalyzerError> for JobManagerError {
    fn from(e: AnalyzerError) -> Self {
        match e {
            AnalyzerError::UnknownUseCase(u) => JobManagerError::UnknownUseCase(u),
        }
    }
}

#[derive(Default)]
struct AtomicCounters {
    leads_found: AtomicU32,
    duplicates_skipped: AtomicU32,
    errors_count: AtomicU32,
}

impl AtomicCounters {
    fn snapshot(&self) -> JobCounters {
        JobCounters {
            leads_found: self.leads_found.load(Ordering::SeqCst),
            duplicates_skipped: self.duplicates_skipped.load(Ordering::SeqCst),
            errors_count: self.errors_count.load(Ordering::SeqCst),
        }
    }
}

struct JobEntry {
    session_id: String,
    status: RwLock<JobStatusKind>,
    cancel_token: CancellationToken,
    counters: AtomicCounters,
    progress: Arc<ProgressTracker>,
}

/// Per-tenant job registry. Only one job may be active per tenant at a
/// time; a different tenant's job never contends with it.
pub struct JobManager {
    config: Arc<Config>,
    jobs: RwLock<HashMap<String, Arc<JobEntry>>>,
    analyzers: Arc<AnalyzerRegistry>,
    sectors: Arc<dyn SectorRegistry>,
    cache: Cache,
    search: Arc<SearchAdapter>,
    fetcher: Arc<SiteFetcher>,
    validator: Arc<EmailValidator>,
    broadcaster: Arc<dyn Broadcaster>,
    lead_sink: Arc<dyn LeadSink>,
    session_store: Arc<dyn SessionStore>,
}

#[allow(clippy::too_many_arguments)]
impl JobManager {
    pub fn new(
        config: Arc<Config>,
        sectors: Arc<dyn SectorRegistry>,
        search_pool: Option<Arc<PagePool>>,
        broadcaster: Arc<dyn Broadcaster>,
        lead_sink: Arc<dyn LeadSink>,
        session_store: Arc<dyn SessionStore>,
        validator: Arc<EmailValidator>,
    ) -> Self {
        let http_client = RateLimitedFetcher::new(2, 20, "leadgen-bot/1.0");
        let cache = Cache::new();
        cache
            .ttl
            .spawn_sweeper(std::time::Duration::from_secs(config.cache_sweep_interval_secs));

        JobManager {
            config,
            jobs: RwLock::new(HashMap::new()),
            analyzers: Arc::new(AnalyzerRegistry::new()),
            sectors,
            cache,
            search: Arc::new(SearchAdapter::new(search_pool, http_client.clone())),
            fetcher: Arc::new(SiteFetcher::new(http_client)),
            validator,
            broadcaster,
            lead_sink,
            session_store,
        }
    }

    /// Starts a job for `tenant`. Fails if one is already running for this
    /// tenant, or if the requested use case/sectors/countries produce no
    /// queries at all.
    pub async fn start(
        &self,
        tenant: &str,
        request: StartJobRequest,
    ) -> Result<String, JobManagerError> {
        {
            let jobs = self.jobs.read().await;
            if let Some(entry) = jobs.get(tenant) {
                if *entry.status.read().await == JobStatusKind::Running {
                    return Err(JobManagerError::JobAlreadyRunning);
                }
            }

            let mut running = 0usize;
            for entry in jobs.values() {
                if *entry.status.read().await == JobStatusKind::Running {
                    running += 1;
                }
            }
            if running >= self.config.max_concurrent_jobs {
                return Err(JobManagerError::TooManyActiveJobs);
            }
        }

        let analyzer = self.analyzers.get(&request.use_case)?;

        let sector_keys = self.validate_sector_keys(&request.config.sector_keys)?;
        let queries = analyzer.generate_queries(&sector_keys, &request.config.country_keys);
        if queries.is_empty() {
            return Err(JobManagerError::NoQueries);
        }

        let session_id = self
            .session_store
            .create(&tenant, &request.list_id, &request.config, &queries)
            .await;
        let cancel_token = CancellationToken::new();
        let progress = Arc::new(ProgressTracker::new());

        let entry = Arc::new(JobEntry {
            session_id: session_id.clone(),
            status: RwLock::new(JobStatusKind::Running),
            cancel_token: cancel_token.clone(),
            counters: AtomicCounters::default(),
            progress: progress.clone(),
        });

        self.jobs
            .write()
            .await
            .insert(tenant.to_string(), entry.clone());

        let tenant = tenant.to_string();
        let driver = JobDriver {
            tenant: tenant.clone(),
            list_id: request.list_id.clone(),
            session_id: session_id.clone(),
            config: request.config.clone(),
            analyzer,
            cache: self.cache.clone(),
            search: self.search.clone(),
            fetcher: self.fetcher.clone(),
            validator: self.validator.clone(),
            broadcaster: self.broadcaster.clone(),
            lead_sink: self.lead_sink.clone(),
            session_store: self.session_store.clone(),
            progress,
            entry: entry.clone(),
            cancel_token,
            processed: Mutex::new(HashSet::new()),
        };

        tokio::spawn(async move {
            driver.run(queries).await;
        });

        Ok(session_id)
    }

    /// Requests cancellation of the tenant's running job. A no-op (not an
    /// error) if nothing is running — stop is idempotent.
    pub async fn stop(&self, tenant: &str) {
        let jobs = self.jobs.read().await;
        if let Some(entry) = jobs.get(tenant) {
            *entry.status.write().await = JobStatusKind::Stopping;
            entry.progress.stopping().await;
            entry.cancel_token.cancel();
        }
    }

    pub async fn status(&self, tenant: &str) -> Option<JobStatus> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(tenant)?;
        Some(JobStatus {
            session_id: entry.session_id.clone(),
            status: *entry.status.read().await,
            counters: entry.counters.snapshot(),
        })
    }

    pub async fn progress(&self, tenant: &str) -> Option<crate::models::ProgressSnapshot> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(tenant)?;
        Some(entry.progress.snapshot().await)
    }

    /// Cancels every active job. Used on SIGTERM/SIGINT before the process
    /// exits.
    pub async fn cancel_all(&self) {
        let jobs = self.jobs.read().await;
        for entry in jobs.values() {
            entry.cancel_token.cancel();
        }
    }

    /// Filters `requested` down to keys the registry recognizes. An empty
    /// `requested` list passes through unchanged (analyzers treat that as
    /// "use all default sectors"); a non-empty list that is entirely
    /// unrecognized must NOT collapse to the same "use all" behavior, so it
    /// is surfaced to the caller as an explicit error instead.
    fn validate_sector_keys(&self, requested: &[String]) -> Result<Vec<String>, JobManagerError> {
        if requested.is_empty() {
            return Ok(Vec::new());
        }
        let known: Vec<String> = requested
            .iter()
            .filter(|key| self.sectors.get(key).is_some())
            .cloned()
            .collect();
        if known.is_empty() {
            return Err(JobManagerError::NoQueries);
        }
        Ok(known)
    }
}

/// Runs one job's queries serially, fanning the URLs each query turns up
/// out to bounded concurrency.
struct JobDriver {
    tenant: String,
    list_id: String,
    session_id: String,
    config: JobConfig,
    analyzer: Arc<dyn Analyzer>,
    cache: Cache,
    search: Arc<SearchAdapter>,
    fetcher: Arc<SiteFetcher>,
    validator: Arc<EmailValidator>,
    broadcaster: Arc<dyn Broadcaster>,
    lead_sink: Arc<dyn LeadSink>,
    session_store: Arc<dyn SessionStore>,
    progress: Arc<ProgressTracker>,
    entry: Arc<JobEntry>,
    cancel_token: CancellationToken,
    /// Per-job "processed" set: domains already accepted into this job's
    /// fetch pipeline, from any query. Lives only as long as the driver
    /// does — never promoted to the process-wide `Cache`.
    processed: Mutex<HashSet<String>>,
}

enum FetchOutcome {
    Lead(Box<crate::models::Lead>),
    BelowThreshold { domain: String, score: u32 },
    /// `SiteFetcher` itself skipped the URL (noise domain or already in the
    /// process-wide visited cache from a prior fetch).
    Skipped,
    Error,
}

impl JobDriver {
    async fn run(&self, queries: Vec<crate::models::QuerySpec>) {
        self.progress.start(queries.len() as u32).await;
        self.broadcaster
            .publish(
                &self.tenant,
                ProgressEvent::JobStarted {
                    session_id: self.session_id.clone(),
                    queries: queries.len(),
                },
            )
            .await;

        let limiter = ConcurrencyLimiter::new(self.config.concurrency.max(1));
        let mut events_since_flush: u32 = 0;

        'queries: for query in queries {
            if self.cancel_token.is_cancelled() {
                break;
            }
            if self.entry.counters.leads_found.load(Ordering::SeqCst) >= self.config.target_leads {
                break;
            }

            self.progress
                .set_current(
                    Some(query.sector_label.clone()),
                    Some(query.country_label.clone()),
                    None,
                )
                .await;
            self.broadcaster
                .publish(
                    &self.tenant,
                    ProgressEvent::QueryStart {
                        query: query.query.clone(),
                        sector: query.sector_label.clone(),
                    },
                )
                .await;

            let result = self.search.search(&query.query, self.config.use_puppeteer).await;
            self.broadcaster
                .publish(
                    &self.tenant,
                    ProgressEvent::SearchProgress {
                        query: query.query.clone(),
                        results_found: result.urls.len(),
                        blocked: result.blocked,
                        source: result.source,
                        error: result.error.clone(),
                    },
                )
                .await;

            let candidates = self.accept_candidates(&result.urls).await;
            self.progress.add_domains(candidates.len() as u32).await;
            self.broadcaster
                .publish(
                    &self.tenant,
                    ProgressEvent::DomainsFound {
                        count: candidates.len(),
                    },
                )
                .await;

            // All candidates are spawned at once; `ConcurrencyLimiter` bounds
            // how many actually run concurrently, so the queue
            // of not-yet-running tasks lives inside the limiter, not here.
            let mut join_set: JoinSet<FetchOutcome> = JoinSet::new();
            for url in candidates {
                let driver_fetcher = self.fetcher.clone();
                let cache = self.cache.clone();
                let analyzer = self.analyzer.clone();
                let validator = self.validator.clone();
                let min_score = self.config.min_score;
                let email_validation = self.config.email_validation;
                let deep_validation = self.config.deep_validation;
                let limiter = limiter.clone();
                join_set.spawn(async move {
                    limiter
                        .run(Self::fetch_one(
                            driver_fetcher,
                            cache,
                            analyzer,
                            validator,
                            url,
                            min_score,
                            email_validation,
                            deep_validation,
                        ))
                        .await
                });
            }

            loop {
                if join_set.is_empty() {
                    break;
                }

                tokio::select! {
                    biased;
                    _ = self.cancel_token.cancelled() => {
                        join_set.abort_all();
                        break 'queries;
                    }
                    Some(joined) = join_set.join_next() => {
                        self.progress.domain_done().await;
                        match joined {
                            Ok(FetchOutcome::Lead(lead)) => {
                                if self.handle_lead(*lead).await {
                                    events_since_flush += 1;
                                }
                            }
                            Ok(FetchOutcome::BelowThreshold { domain, score }) => {
                                tracing::debug!(domain = %domain, score, min_score = self.config.min_score, "lead below score threshold, dropped");
                            }
                            Ok(FetchOutcome::Skipped) => {}
                            Ok(FetchOutcome::Error) => {
                                self.entry.counters.errors_count.fetch_add(1, Ordering::SeqCst);
                                self.progress.error_occurred().await;
                            }
                            Err(_) => {
                                self.entry.counters.errors_count.fetch_add(1, Ordering::SeqCst);
                                self.progress.error_occurred().await;
                            }
                        }

                        if events_since_flush >= 10 {
                            events_since_flush = 0;
                            self.flush_progress().await;
                        }
                    }
                }
            }

            self.progress.query_done().await;
        }

        self.flush_progress().await;

        let final_status = if self.cancel_token.is_cancelled() {
            JobStatusKind::Stopped
        } else {
            JobStatusKind::Done
        };
        *self.entry.status.write().await = final_status;
        self.progress.done().await;
        self.session_store
            .update(
                &self.session_id,
                SessionUpdate {
                    leads_found: self.entry.counters.leads_found.load(Ordering::SeqCst),
                    duplicates_skipped: self.entry.counters.duplicates_skipped.load(Ordering::SeqCst),
                    errors_count: self.entry.counters.errors_count.load(Ordering::SeqCst),
                    status: final_status,
                },
            )
            .await;
        self.broadcaster
            .publish(
                &self.tenant,
                ProgressEvent::JobDone {
                    final_status,
                    counters: self.entry.counters.snapshot(),
                },
            )
            .await;
    }

    /// Filters search results against the valid-TLD allowlist and the noise
    /// list, then records each survivor in the per-job "processed" set
    /// *before* any fetch starts — so a domain turned up again by a later
    /// query in this same job is recognized as a duplicate rather than
    /// fetched twice.
    async fn accept_candidates(&self, urls: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        for url in urls {
            let domain = match url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) {
                Some(d) => crate::cache::normalize_domain(&d),
                None => continue,
            };

            if !has_valid_tld(&domain) {
                continue;
            }
            if crate::search::noise::is_noise(&domain) {
                continue;
            }

            let mut processed = self.processed.lock().await;
            if !processed.insert(domain) {
                drop(processed);
                self.entry.counters.duplicates_skipped.fetch_add(1, Ordering::SeqCst);
                continue;
            }
            drop(processed);

            out.push(url.clone());
        }
        out
    }

    async fn fetch_one(
        fetcher: Arc<SiteFetcher>,
        cache: Cache,
        analyzer: Arc<dyn Analyzer>,
        validator: Arc<EmailValidator>,
        url: String,
        min_score: u32,
        email_validation: bool,
        deep_validation: bool,
    ) -> FetchOutcome {
        let mut lead = match fetcher.fetch_and_score(&url, &cache, &analyzer).await {
            Ok(Some(lead)) => lead,
            Ok(None) => return FetchOutcome::Skipped,
            Err(_) => return FetchOutcome::Error,
        };

        if lead.score < min_score {
            return FetchOutcome::BelowThreshold {
                domain: lead.domain,
                score: lead.score,
            };
        }

        if email_validation {
            if let Some(email) = lead.email.clone() {
                let result = validator.validate(&email, deep_validation).await;
                lead.email_valid = Some(result.valid);
                lead.email_validation_score = Some(result.score);
                lead.email_validation_reason = Some(result.reason);
            } else {
                lead.email_valid = Some(false);
                lead.email_validation_score = Some(0);
                lead.email_validation_reason = Some("no_email_found".to_string());
            }
        }

        FetchOutcome::Lead(Box::new(lead))
    }

    /// Returns whether this outcome counts toward the progress flush
    /// cadence — only a lead or a duplicate does, not an invalid domain.
    async fn handle_lead(&self, lead: crate::models::Lead) -> bool {
        match self.lead_sink.insert_deduped(&self.tenant, &self.list_id, &lead).await {
            InsertOutcome::Inserted { .. } => {
                self.entry.counters.leads_found.fetch_add(1, Ordering::SeqCst);
                self.progress.lead_found().await;
                self.progress
                    .log(LogLevel::Success, format!("lead found: {}", lead.domain))
                    .await;
                self.broadcaster
                    .publish(&self.tenant, ProgressEvent::Lead { lead: Box::new(lead) })
                    .await;
                true
            }
            InsertOutcome::Duplicate => {
                self.entry.counters.duplicates_skipped.fetch_add(1, Ordering::SeqCst);
                self.progress
                    .log(LogLevel::Info, format!("duplicate lead skipped: {}", lead.domain))
                    .await;
                true
            }
            InsertOutcome::InvalidDomain => {
                self.entry.counters.errors_count.fetch_add(1, Ordering::SeqCst);
                self.progress.error_occurred().await;
                self.progress
                    .log(LogLevel::Warn, format!("invalid domain rejected: {}", lead.domain))
                    .await;
                false
            }
        }
    }

    async fn flush_progress(&self) {
        let counters = self.entry.counters.snapshot();
        self.session_store
            .update(
                &self.session_id,
                SessionUpdate {
                    leads_found: counters.leads_found,
                    duplicates_skipped: counters.duplicates_skipped,
                    errors_count: counters.errors_count,
                    status: JobStatusKind::Running,
                },
            )
            .await;
        self.broadcaster
            .publish(&self.tenant, ProgressEvent::Progress { counters })
            .await;
    }
}

/// A generic domain-quality gate, not a country filter — country
/// selection already scopes the search query itself via `site:.nl`-style
/// suffixes.
fn has_valid_tld(domain: &str) -> bool {
    VALID_TLDS.iter().any(|tld| domain.ends_with(tld))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{ChannelBroadcaster, InMemorySessionStore, LoggingLeadSink, StaticSectorRegistry};
    use std::time::Duration;

    fn test_manager() -> JobManager {
        let config = Arc::new(Config {
            port: 0,
            max_concurrent_jobs: 10,
            max_search_pages: 5,
            mx_lookup_timeout_ms: 100,
            smtp_timeout_ms: 100,
            cache_sweep_interval_secs: 300,
            shared_secret: "test-secret".to_string(),
        });
        let validator = Arc::new(
            EmailValidator::new(Duration::from_millis(100), Duration::from_millis(100))
                .unwrap(),
        );
        JobManager::new(
            config,
            Arc::new(StaticSectorRegistry::new()),
            None,
            Arc::new(ChannelBroadcaster::new()),
            Arc::new(LoggingLeadSink),
            Arc::new(InMemorySessionStore::new()),
            validator,
        )
    }

    #[tokio::test]
    async fn test_unknown_use_case_errors() {
        let manager = test_manager();
        let result = manager
            .start(
                "tenant-a",
                StartJobRequest {
                    list_id: "list-1".to_string(),
                    use_case: "nonexistent".to_string(),
                    config: JobConfig::default(),
                },
            )
            .await;
        assert!(matches!(result, Err(JobManagerError::UnknownUseCase(_))));
    }

    #[tokio::test]
    async fn test_start_then_already_running() {
        let manager = test_manager();
        let first = manager
            .start(
                "tenant-b",
                StartJobRequest {
                    list_id: "list-1".to_string(),
                    use_case: "erp".to_string(),
                    config: JobConfig::default(),
                },
            )
            .await;
        assert!(first.is_ok());

        let second = manager
            .start(
                "tenant-b",
                StartJobRequest {
                    list_id: "list-1".to_string(),
                    use_case: "erp".to_string(),
                    config: JobConfig::default(),
                },
            )
            .await;
        assert!(matches!(second, Err(JobManagerError::JobAlreadyRunning)));

        manager.stop("tenant-b").await;
    }

    #[tokio::test]
    async fn test_status_none_for_unknown_tenant() {
        let manager = test_manager();
        assert!(manager.status("nope").await.is_none());
    }
}
