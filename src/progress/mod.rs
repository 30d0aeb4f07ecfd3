//! Progress tracking with derived metrics.
//!
//! Mutable counters live behind a single lock; `snapshot()` produces a
//! defensive copy (`ProgressSnapshot`) with the derived fields computed at
//! read time rather than kept continuously up to date, deriving summary
//! stats from raw counters on demand.

use crate::models::{LogEntry, LogLevel, ProgressSnapshot, ProgressStatus};
use crate::time::now_ms;
use std::collections::VecDeque;
use tokio::sync::RwLock;

const MAX_LOG_ENTRIES: usize = 500;
const RATE_WINDOW_SECS: i64 = 60;

struct State {
    status: ProgressStatus,
    started_at: Option<i64>,
    total_queries: u32,
    processed_queries: u32,
    total_domains: u32,
    processed_domains: u32,
    leads_found: u32,
    errors: u32,
    current_sector: Option<String>,
    current_country: Option<String>,
    current_domain: Option<String>,
    /// (timestamp_ms, count) of leads found, for the 60s sliding-window rate.
    lead_timestamps: VecDeque<i64>,
    log: VecDeque<LogEntry>,
}

impl State {
    fn new() -> Self {
        State {
            status: ProgressStatus::Idle,
            started_at: None,
            total_queries: 0,
            processed_queries: 0,
            total_domains: 0,
            processed_domains: 0,
            leads_found: 0,
            errors: 0,
            current_sector: None,
            current_country: None,
            current_domain: None,
            lead_timestamps: VecDeque::new(),
            log: VecDeque::new(),
        }
    }
}

/// Per-job progress tracker. One instance per running job; discarded with
/// the job driver when the job finishes.
pub struct ProgressTracker {
    state: RwLock<State>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        ProgressTracker {
            state: RwLock::new(State::new()),
        }
    }

    pub async fn start(&self, total_queries: u32) {
        let mut s = self.state.write().await;
        s.status = ProgressStatus::Running;
        s.started_at = Some(now_ms());
        s.total_queries = total_queries;
    }

    pub async fn set_current(
        &self,
        sector: Option<String>,
        country: Option<String>,
        domain: Option<String>,
    ) {
        let mut s = self.state.write().await;
        if sector.is_some() {
            s.current_sector = sector;
        }
        if country.is_some() {
            s.current_country = country;
        }
        s.current_domain = domain;
    }

    pub async fn query_done(&self) {
        let mut s = self.state.write().await;
        s.processed_queries += 1;
    }

    pub async fn add_domains(&self, count: u32) {
        let mut s = self.state.write().await;
        s.total_domains += count;
    }

    pub async fn domain_done(&self) {
        let mut s = self.state.write().await;
        s.processed_domains += 1;
    }

    pub async fn lead_found(&self) {
        let mut s = self.state.write().await;
        s.leads_found += 1;
        let ts = now_ms();
        s.lead_timestamps.push_back(ts);
        prune_window(&mut s.lead_timestamps, ts);
    }

    pub async fn error_occurred(&self) {
        let mut s = self.state.write().await;
        s.errors += 1;
    }

    pub async fn stopping(&self) {
        self.state.write().await.status = ProgressStatus::Stopping;
    }

    pub async fn done(&self) {
        self.state.write().await.status = ProgressStatus::Done;
    }

    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let mut s = self.state.write().await;
        if s.log.len() >= MAX_LOG_ENTRIES {
            s.log.pop_front();
        }
        s.log.push_back(LogEntry {
            ts: now_ms(),
            level,
            message: message.into(),
        });
    }

    /// Produces a defensive-copy snapshot with derived fields computed now.
    pub async fn snapshot(&self) -> ProgressSnapshot {
        let s = self.state.read().await;
        let now = now_ms();

        let progress_pct = if s.total_domains > 0 {
            ((s.processed_domains as u64 * 100) / s.total_domains as u64).min(100) as u32
        } else if s.total_queries > 0 {
            ((s.processed_queries as u64 * 100) / s.total_queries as u64).min(100) as u32
        } else {
            0
        };

        let elapsed_seconds = s
            .started_at
            .map(|started| ((now - started).max(0)) as f64 / 1000.0)
            .unwrap_or(0.0);

        let mut window = s.lead_timestamps.clone();
        prune_window(&mut window, now);
        let leads_per_minute = window.len() as f64;

        // rate = domains processed per second so far; eta extrapolates the
        // remaining domains at that rate. None if there's no progress yet.
        let rate = if elapsed_seconds > 0.0 {
            s.processed_domains as f64 / elapsed_seconds
        } else {
            0.0
        };
        let eta_seconds = if rate > 0.0 && s.total_domains > s.processed_domains {
            let remaining = (s.total_domains - s.processed_domains) as f64;
            Some((remaining / rate).round() as u64)
        } else {
            None
        };

        ProgressSnapshot {
            status: s.status,
            started_at: s.started_at,
            total_queries: s.total_queries,
            processed_queries: s.processed_queries,
            total_domains: s.total_domains,
            processed_domains: s.processed_domains,
            leads_found: s.leads_found,
            errors: s.errors,
            current_sector: s.current_sector.clone(),
            current_country: s.current_country.clone(),
            current_domain: s.current_domain.clone(),
            progress_pct,
            leads_per_minute,
            eta_seconds,
            elapsed_seconds,
            log: s.log.iter().cloned().collect(),
        }
    }
}

fn prune_window(timestamps: &mut VecDeque<i64>, now: i64) {
    let cutoff = now - RATE_WINDOW_SECS * 1000;
    while let Some(front) = timestamps.front() {
        if *front < cutoff {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_pct_bounds() {
        let tracker = ProgressTracker::new();
        tracker.start(10).await;
        tracker.add_domains(4).await;
        for _ in 0..4 {
            tracker.domain_done().await;
        }
        let snap = tracker.snapshot().await;
        assert!(snap.progress_pct <= 100);
        assert_eq!(snap.progress_pct, 100);
        assert!(snap.processed_domains <= snap.total_domains);
    }

    #[tokio::test]
    async fn test_progress_pct_zero_when_nothing_done() {
        let tracker = ProgressTracker::new();
        tracker.start(5).await;
        let snap = tracker.snapshot().await;
        assert_eq!(snap.progress_pct, 0);
    }

    #[tokio::test]
    async fn test_log_ring_drops_oldest() {
        let tracker = ProgressTracker::new();
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            tracker.log(LogLevel::Info, format!("msg {i}")).await;
        }
        let snap = tracker.snapshot().await;
        assert_eq!(snap.log.len(), MAX_LOG_ENTRIES);
        assert_eq!(snap.log.first().unwrap().message, "msg 10");
    }

    #[tokio::test]
    async fn test_leads_per_minute_counts_recent() {
        let tracker = ProgressTracker::new();
        tracker.start(1).await;
        tracker.lead_found().await;
        tracker.lead_found().await;
        let snap = tracker.snapshot().await;
        // A literal count of timestamps in the last 60s, not an extrapolated
        // rate — two leads found back-to-back is 2, not ~120.
        assert_eq!(snap.leads_per_minute, 2.0);
        assert_eq!(snap.leads_found, 2);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let tracker = ProgressTracker::new();
        assert_eq!(tracker.snapshot().await.status, ProgressStatus::Idle);
        tracker.start(1).await;
        assert_eq!(tracker.snapshot().await.status, ProgressStatus::Running);
        tracker.stopping().await;
        assert_eq!(tracker.snapshot().await.status, ProgressStatus::Stopping);
        tracker.done().await;
        assert_eq!(tracker.snapshot().await.status, ProgressStatus::Done);
    }

    #[tokio::test]
    async fn test_eta_is_none_with_no_progress() {
        let tracker = ProgressTracker::new();
        tracker.start(5).await;
        tracker.add_domains(10).await;
        let snap = tracker.snapshot().await;
        assert_eq!(snap.eta_seconds, None);
    }

    #[tokio::test]
    async fn test_eta_is_none_once_all_domains_processed() {
        let tracker = ProgressTracker::new();
        tracker.start(1).await;
        tracker.add_domains(2).await;
        tracker.domain_done().await;
        tracker.domain_done().await;
        let snap = tracker.snapshot().await;
        assert_eq!(snap.eta_seconds, None);
    }

    #[tokio::test]
    async fn test_processed_never_exceeds_total_invariant() {
        let tracker = ProgressTracker::new();
        tracker.start(3).await;
        tracker.add_domains(3).await;
        for _ in 0..3 {
            tracker.domain_done().await;
        }
        let snap = tracker.snapshot().await;
        assert!(snap.processed_domains <= snap.total_domains);
        assert!(snap.processed_queries <= snap.total_queries || snap.total_queries == 0);
    }
}
