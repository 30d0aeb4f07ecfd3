//! External interface seams: the job driver depends on these
//! traits, never on a concrete lead store, session store, or transport, so
//! the hosting application can plug in its own persistence and fan-out
//! without the crawling/scoring core knowing about it.

use crate::models::{JobConfig, JobStatusKind, Lead, ProgressEvent, QuerySpec, SectorDef};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Outcome of `LeadSink::insert_deduped`. Persistence enforces uniqueness
/// on `(tenant, normalized_domain)`; the driver never deduplicates against
/// prior jobs itself — it only sees this result.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted { id: String },
    Duplicate,
    InvalidDomain,
}

/// Receives scored leads as they're found and enforces the
/// `(tenant, normalized_domain)` uniqueness constraint at persist time.
/// Implementations decide what "persist" means — a database, a webhook,
/// a file, or (in tests) memory.
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn insert_deduped(&self, tenant: &str, list_id: &str, lead: &Lead) -> InsertOutcome;
}

/// Per-run counters pushed to the session record on each flush.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub leads_found: u32,
    pub duplicates_skipped: u32,
    pub errors_count: u32,
    pub status: JobStatusKind,
}

/// Owns the session record for one job execution: `create` mints the
/// session id the driver reports back to the caller, `update` pushes
/// counters and final status as the job progresses.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(
        &self,
        tenant: &str,
        list_id: &str,
        config: &JobConfig,
        queries: &[QuerySpec],
    ) -> String;
    async fn update(&self, session_id: &str, update: SessionUpdate);
}

/// Fans progress events out to whatever is watching a job (a websocket, an
/// SSE stream, a log sink).
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, tenant: &str, event: ProgressEvent);
}

/// Supplies the sector taxonomy an analyzer draws query templates from.
/// A file-backed implementation is the expected production shape; tests
/// use an in-memory one.
pub trait SectorRegistry: Send + Sync {
    fn sectors(&self) -> Vec<SectorDef>;
    fn get(&self, key: &str) -> Option<SectorDef>;
}

/// `LeadSink` that just logs and never enforces uniqueness — every insert
/// reports `Inserted`. Suitable as a minimal default until a real sink
/// (e.g. a database-backed one, which owns the actual unique constraint)
/// is wired in by the host application.
pub struct LoggingLeadSink;

#[async_trait]
impl LeadSink for LoggingLeadSink {
    async fn insert_deduped(&self, tenant: &str, _list_id: &str, lead: &Lead) -> InsertOutcome {
        tracing::info!(tenant, domain = %lead.domain, score = lead.score, "lead found");
        InsertOutcome::Inserted {
            id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Process-lifetime in-memory `LeadSink` that actually enforces the
/// `(tenant, normalized_domain)` uniqueness constraint, for hosts that
/// don't have a database handy (tests, demos).
#[derive(Default)]
pub struct InMemoryLeadSink {
    domains: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemoryLeadSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadSink for InMemoryLeadSink {
    async fn insert_deduped(&self, tenant: &str, _list_id: &str, lead: &Lead) -> InsertOutcome {
        if lead.domain.is_empty() {
            return InsertOutcome::InvalidDomain;
        }
        let mut domains = self.domains.write().await;
        let set = domains.entry(tenant.to_string()).or_default();
        if !set.insert(lead.domain.clone()) {
            return InsertOutcome::Duplicate;
        }
        InsertOutcome::Inserted {
            id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Process-lifetime in-memory session store: a session record per job
/// execution, created at `start` and updated as counters change.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionUpdate>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionUpdate> {
        self.sessions.read().await.get(session_id).cloned()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        tenant: &str,
        list_id: &str,
        _config: &JobConfig,
        queries: &[QuerySpec],
    ) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(tenant, list_id, queries = queries.len(), session_id = %session_id, "session created");
        self.sessions.write().await.insert(
            session_id.clone(),
            SessionUpdate {
                leads_found: 0,
                duplicates_skipped: 0,
                errors_count: 0,
                status: JobStatusKind::Running,
            },
        );
        session_id
    }

    async fn update(&self, session_id: &str, update: SessionUpdate) {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), update);
    }
}

/// `tokio::sync::broadcast`-backed fan-out, one channel per tenant.
#[derive(Default)]
pub struct ChannelBroadcaster {
    channels: RwLock<HashMap<String, broadcast::Sender<Arc<ProgressEvent>>>>,
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, tenant: &str) -> broadcast::Receiver<Arc<ProgressEvent>> {
        let mut channels = self.channels.write().await;
        channels
            .entry(tenant.to_string())
            .or_insert_with(|| broadcast::channel(256).0)
            .subscribe()
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn publish(&self, tenant: &str, event: ProgressEvent) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(tenant) {
            // No subscribers is not an error; the job keeps running either way.
            let _ = tx.send(Arc::new(event));
        }
    }
}

/// In-memory sector registry seeded with the default ERP/recruitment
/// taxonomies used when no sectors config file is supplied.
pub struct StaticSectorRegistry {
    sectors: Vec<SectorDef>,
}

impl StaticSectorRegistry {
    pub fn new() -> Self {
        StaticSectorRegistry {
            sectors: vec![
                SectorDef {
                    key: "logistics".to_string(),
                    label: "Logistics".to_string(),
                    queries: vec!["warehouse management software".to_string()],
                },
                SectorDef {
                    key: "wholesale_distribution".to_string(),
                    label: "Wholesale & Distribution".to_string(),
                    queries: vec!["wholesale distributor b2b".to_string()],
                },
                SectorDef {
                    key: "manufacturing".to_string(),
                    label: "Manufacturing".to_string(),
                    queries: vec!["manufacturing company supply chain".to_string()],
                },
                SectorDef {
                    key: "it_services".to_string(),
                    label: "IT Services".to_string(),
                    queries: vec!["IT company vacancies".to_string()],
                },
                SectorDef {
                    key: "professional_services".to_string(),
                    label: "Professional Services".to_string(),
                    queries: vec!["consulting firm careers".to_string()],
                },
                SectorDef {
                    key: "healthcare".to_string(),
                    label: "Healthcare".to_string(),
                    queries: vec!["healthcare organization vacancies".to_string()],
                },
            ],
        }
    }
}

impl Default for StaticSectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SectorRegistry for StaticSectorRegistry {
    fn sectors(&self) -> Vec<SectorDef> {
        self.sectors.clone()
    }

    fn get(&self, key: &str) -> Option<SectorDef> {
        self.sectors.iter().find(|s| s.key == key).cloned()
    }
}
