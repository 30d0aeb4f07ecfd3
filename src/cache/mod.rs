//! Process-lifetime cache and dedup primitives.
//!
//! Three concerns, each independently lockable: a generic TTL map, the
//! global visited-domain set, and domain normalization. The per-job
//! "processed" set is *not* here — it lives inside the job driver
//! (`jobs::JobDriver`) and is never promoted to global state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Generic TTL-keyed map with lazy expiry on read and a periodic sweep.
#[derive(Clone)]
pub struct TtlMap {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl Default for TtlMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlMap {
    pub fn new() -> Self {
        TtlMap {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) {
        let expires_at = Instant::now() + ttl.unwrap_or(DEFAULT_TTL);
        self.entries.write().await.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at,
            },
        );
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        // Lazy expiry: a read that finds a stale entry removes it.
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if entry.expires_at > now {
                    return Some(entry.value.clone());
                }
            } else {
                return None;
            }
        }
        self.entries.write().await.remove(key);
        None
    }

    /// Evict all entries whose TTL has elapsed. Intended to be driven by a
    /// periodic `tokio::time::interval` task.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, v| v.expires_at > now);
        before - entries.len()
    }

    /// Spawn a background task that sweeps this map on the given interval.
    /// Returns a handle; dropping/aborting it stops the sweep.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let map = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let evicted = map.sweep().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "TTL cache sweep");
                }
            }
        })
    }
}

/// Global visited-domain set, shared across all jobs in the process.
#[derive(Clone, Default)]
pub struct VisitedDomains {
    seen: Arc<RwLock<std::collections::HashSet<String>>>,
}

impl VisitedDomains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `domain` visited; returns true if it was newly inserted.
    pub async fn mark(&self, domain: &str) -> bool {
        self.seen.write().await.insert(normalize_domain(domain))
    }

    pub async fn contains(&self, domain: &str) -> bool {
        self.seen.read().await.contains(&normalize_domain(domain))
    }

    /// Clears the visited set. Only the legacy `/start` path calls this
    /// (see DESIGN.md Open Question 2); the per-tenant `JobManager::start`
    /// path intentionally does not.
    pub async fn clear(&self) {
        self.seen.write().await.clear();
    }
}

/// Lower-case, `www.`-strip a domain. Idempotent:
/// `normalize_domain(normalize_domain(x)) == normalize_domain(x)`.
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    lower.strip_prefix("www.").unwrap_or(&lower).to_string()
}

#[derive(Clone, Default)]
pub struct Cache {
    pub ttl: TtlMap,
    pub visited: VisitedDomains,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize_domain("WWW.Example.com");
        let twice = normalize_domain(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "example.com");
    }

    #[test]
    fn test_normalize_no_www() {
        assert_eq!(normalize_domain("Example.COM"), "example.com");
    }

    #[tokio::test]
    async fn test_visited_mark_dedup() {
        let visited = VisitedDomains::new();
        assert!(visited.mark("example.com").await);
        assert!(!visited.mark("www.example.com").await);
        assert!(visited.contains("EXAMPLE.com").await);
    }

    #[tokio::test]
    async fn test_visited_clear() {
        let visited = VisitedDomains::new();
        visited.mark("example.com").await;
        visited.clear().await;
        assert!(!visited.contains("example.com").await);
    }

    #[tokio::test]
    async fn test_ttl_get_set() {
        let map = TtlMap::new();
        map.set("k", serde_json::json!("v"), None).await;
        assert_eq!(map.get("k").await, Some(serde_json::json!("v")));
        assert_eq!(map.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let map = TtlMap::new();
        map.set(
            "k",
            serde_json::json!("v"),
            Some(Duration::from_millis(1)),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(map.get("k").await, None);
    }

    #[tokio::test]
    async fn test_sweep_evicts_expired() {
        let map = TtlMap::new();
        map.set(
            "k",
            serde_json::json!("v"),
            Some(Duration::from_millis(1)),
        )
        .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let evicted = map.sweep().await;
        assert_eq!(evicted, 1);
    }
}
