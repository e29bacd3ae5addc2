//! Resource cache with request coalescing
//!
//! One canonical parsed node per resource locator, exactly one fetch in flight
//! per locator no matter how many consumers ask for it concurrently, and a
//! uniform asynchronous delivery contract: results are never handed over on
//! the caller's current stack, not even on a cache hit.
//!
//! Per-key states move monotonically Absent → Pending → {Ready, Failed}. A
//! Failed entry is not poisoned forever: the next `request` for it re-attempts
//! the fetch. The only other way out of a terminal state is an explicit
//! [`ResourceCache::reset`], which exists for test isolation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use kuchiki::NodeRef;
use tokio::sync::oneshot;

use crate::document::deep_clone;
use crate::error::InjectError;
use crate::fetcher::SvgFetcher;

type Delivery = Result<NodeRef, InjectError>;

/// Externally observable state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Absent,
    Pending,
    Ready,
    Failed,
}

enum CacheEntry {
    /// Fetch in flight; waiters are drained exactly once, in enqueue order,
    /// when the key resolves.
    Pending { waiters: Vec<oneshot::Sender<Delivery>> },
    /// Canonical parsed node. Owned exclusively by the cache; consumers only
    /// ever see deep clones.
    Ready(NodeRef),
    Failed(InjectError),
}

/// What a `request` call decided to do while the state borrow was held.
enum Claim {
    /// First consumer for this key: drive the fetch and resolve the entry.
    Fetch,
    /// A fetch is already in flight: wait for its broadcast.
    Wait(oneshot::Receiver<Delivery>),
    /// Terminal entry: deliver after an explicit yield.
    Hit(Delivery),
}

/// Coalescing cache of parsed SVG documents keyed by resource locator.
pub struct ResourceCache {
    fetcher: Rc<dyn SvgFetcher>,
    entries: RefCell<HashMap<String, CacheEntry>>,
}

impl ResourceCache {
    pub fn new(fetcher: Rc<dyn SvgFetcher>) -> Self {
        Self {
            fetcher,
            entries: RefCell::new(HashMap::new()),
        }
    }

    /// Request the parsed document for `locator`.
    ///
    /// The returned clone is independent of the canonical cached node and of
    /// every other consumer's clone. Concurrent requests for the same
    /// unresolved locator share a single underlying fetch; their results are
    /// delivered in the order the requests arrived.
    pub async fn request(&self, locator: &str) -> Delivery {
        let claim = {
            let mut entries = self.entries.borrow_mut();
            match entries.get_mut(locator) {
                Some(CacheEntry::Pending { waiters }) => {
                    log::debug!("SVG fetch already in flight, queueing waiter: {locator}");
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Claim::Wait(rx)
                }
                Some(CacheEntry::Ready(root)) => Claim::Hit(Ok(deep_clone(root))),
                Some(CacheEntry::Failed(_)) | None => {
                    // A Failed entry retries on demand instead of reporting
                    // the stale failure forever.
                    entries.insert(
                        locator.to_string(),
                        CacheEntry::Pending { waiters: Vec::new() },
                    );
                    Claim::Fetch
                }
            }
        };

        match claim {
            Claim::Hit(result) => {
                // Uniform contract: a cache hit resumes the consumer as a
                // deferred unit of work, never inline on its own call stack.
                tokio::task::yield_now().await;
                result
            }
            Claim::Wait(rx) => match rx.await {
                Ok(delivery) => delivery,
                // The pending entry was torn down under us (reset during an
                // in-flight fetch); report it as a load failure.
                Err(_) => Err(InjectError::LoadFailed(locator.to_string())),
            },
            Claim::Fetch => {
                log::debug!("Fetching SVG: {locator}");
                let result = self.fetcher.fetch(locator).await;
                self.resolve(locator, result)
            }
        }
    }

    /// Observable state for `locator`.
    pub fn state(&self, locator: &str) -> CacheState {
        match self.entries.borrow().get(locator) {
            None => CacheState::Absent,
            Some(CacheEntry::Pending { .. }) => CacheState::Pending,
            Some(CacheEntry::Ready(_)) => CacheState::Ready,
            Some(CacheEntry::Failed(_)) => CacheState::Failed,
        }
    }

    /// Drop every entry. Not part of normal operation; exists so tests can
    /// isolate themselves from earlier fetches.
    pub fn reset(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Store the fetch outcome, drain waiters FIFO, and produce the driving
    /// caller's own delivery. The driver registered before any waiter, so it
    /// resumes first and overall delivery order matches enqueue order.
    fn resolve(&self, locator: &str, result: Delivery) -> Delivery {
        let mut entries = self.entries.borrow_mut();
        let waiters = match entries.remove(locator) {
            Some(CacheEntry::Pending { waiters }) => waiters,
            // reset() cleared the entry mid-fetch; nobody is queued.
            _ => Vec::new(),
        };

        match result {
            Ok(root) => {
                log::debug!(
                    "SVG resolved, delivering to {} queued waiter(s): {locator}",
                    waiters.len()
                );
                for tx in waiters {
                    // A dropped receiver means the waiter went away; delivery
                    // to the others is unaffected.
                    let _ = tx.send(Ok(deep_clone(&root)));
                }
                let own = deep_clone(&root);
                entries.insert(locator.to_string(), CacheEntry::Ready(root));
                Ok(own)
            }
            Err(err) => {
                log::warn!("SVG fetch failed for {locator}: {err}");
                for tx in waiters {
                    let _ = tx.send(Err(err.clone()));
                }
                entries.insert(locator.to_string(), CacheEntry::Failed(err.clone()));
                Err(err)
            }
        }
    }
}
