//! Headless-browser singleton and bounded page pool.
//!
//! Modeled as a semaphore plus a FIFO free list, not as an inheritance
//! hierarchy of page "workers": a page is either on the free list or
//! checked out, capacity is enforced by a `Semaphore`, and checkout order
//! is FIFO because the semaphore already grants permits in request order.
//! Grounded on the browser-lifecycle/semaphore-gated-concurrency shape of
//! the citescrape crawl orchestrator.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetBlockedUrLsParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Resource types blocked on every pooled page: they cost page-load time
/// and the search adapter never looks at images, fonts, or media.
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.woff", "*.woff2", "*.ttf",
    "*.mp4", "*.webm", "*.avi", "*.css",
];

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("page creation failed: {0}")]
    NewPage(String),
    #[error("browser connection disconnected")]
    Disconnected,
}

struct Inner {
    browser: Mutex<Browser>,
    free: Mutex<VecDeque<Page>>,
    disconnected: Arc<AtomicBool>,
}

/// Bounded pool of browser pages. `capacity` pages are created lazily up
/// to the bound; `checkout`/`checkin` hand pages out FIFO via a semaphore.
/// The free-list state is shared through an `Arc` rather than borrowed, so
/// a checked-out page's release can be spawned onto its own `'static` task
/// instead of borrowing the pool across an await point.
pub struct PagePool {
    inner: Arc<Inner>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl PagePool {
    pub async fn launch(capacity: usize) -> Result<Self, PoolError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .build()
            .map_err(PoolError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PoolError::Launch(e.to_string()))?;

        let disconnected = Arc::new(AtomicBool::new(false));
        let disconnected_writer = disconnected.clone();
        // chromiumoxide requires the event handler stream be polled for the
        // browser connection to stay alive; run it in the background for
        // the lifetime of the process. The stream ends when the CDP
        // connection drops, which is the only disconnect signal we get.
        tokio::spawn(async move {
            while handler.next().await.is_some() {}
            disconnected_writer.store(true, Ordering::SeqCst);
        });

        Ok(PagePool {
            inner: Arc::new(Inner {
                browser: Mutex::new(browser),
                free: Mutex::new(VecDeque::new()),
                disconnected,
            }),
            permits: Arc::new(Semaphore::new(capacity.max(1))),
            capacity: capacity.max(1),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Checks out a page, blocking until the pool has room. Reuses a freed
    /// page if one exists, otherwise opens a fresh one with request
    /// interception configured. Rejects immediately once the browser's CDP
    /// connection has dropped rather than trying to spawn pages on a dead
    /// browser — callers fall back to HTTP search on this error.
    pub async fn checkout(&self) -> Result<PooledPage, PoolError> {
        if self.inner.disconnected.load(Ordering::SeqCst) {
            return Err(PoolError::Disconnected);
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("pool semaphore never closed");

        let existing = self.inner.free.lock().await.pop_front();
        let page = match existing {
            Some(page) => page,
            None => {
                let browser = self.inner.browser.lock().await;
                new_page(&browser).await?
            }
        };

        Ok(PooledPage {
            inner: self.inner.clone(),
            page: Some(page),
            _permit: permit,
        })
    }

    /// Closes every free page and the browser itself. Called on process
    /// shutdown so the Chrome process doesn't outlive the server. Pages
    /// still checked out at the time of the call return themselves (onto a
    /// now-drained pool) when their `PooledPage` guard drops.
    pub async fn drain(&self) {
        self.inner.free.lock().await.clear();
        let mut browser = self.inner.browser.lock().await;
        if let Err(e) = browser.close().await {
            tracing::warn!(error = %e, "error closing browser during pool drain");
        }
        let _ = browser.wait().await;
        self.inner.disconnected.store(true, Ordering::SeqCst);
    }
}

async fn new_page(browser: &Browser) -> Result<Page, PoolError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| PoolError::NewPage(e.to_string()))?;

    let _ = page
        .execute(
            SetBlockedUrLsParams::builder()
                .urls(BLOCKED_URL_PATTERNS.iter().map(|s| s.to_string()).collect::<Vec<_>>())
                .build(),
        )
        .await;

    Ok(page)
}

/// RAII checkout: returns the page to the pool's free list when dropped.
pub struct PooledPage {
    inner: Arc<Inner>,
    page: Option<Page>,
    _permit: OwnedSemaphorePermit,
}

impl PooledPage {
    pub fn page(&self) -> &Page {
        self.page.as_ref().expect("page taken")
    }
}

impl Drop for PooledPage {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let inner = self.inner.clone();
            // Fire-and-forget checkin; the permit (and thus capacity) is
            // already released when this guard drops regardless. `inner`
            // is an owned Arc, so the spawned task is genuinely 'static.
            // Reset to about:blank first so the next tenant's job never
            // sees the previous site's URL, DOM, or cookies.
            tokio::spawn(async move {
                let _ = page.goto("about:blank").await;
                inner.free.lock().await.push_back(page);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_floor_is_one() {
        // Constructing the semaphore portion without launching a browser,
        // to keep this test free of a Chrome dependency.
        let sem = Semaphore::new(0usize.max(1));
        assert_eq!(sem.available_permits(), 1);
    }

    #[test]
    fn test_blocked_patterns_cover_common_asset_types() {
        assert!(BLOCKED_URL_PATTERNS.contains(&"*.png"));
        assert!(BLOCKED_URL_PATTERNS.contains(&"*.woff2"));
    }
}
