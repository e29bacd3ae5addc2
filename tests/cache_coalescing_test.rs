//! Cache state machine and request-coalescing behavior.

mod common;

use std::cell::RefCell;

use common::{init_logs, MockFetcher, CLIP_SVG};
use futures::FutureExt;
use svg_inject::document::node_identity;
use svg_inject::{CacheState, InjectError, ResourceCache};

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch_and_get_distinct_clones() {
    init_logs();
    let fetcher = MockFetcher::serving(CLIP_SVG);
    let cache = ResourceCache::new(fetcher.clone());

    let (a, b, c) = futures::join!(
        cache.request("shared.svg"),
        cache.request("shared.svg"),
        cache.request("shared.svg"),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(fetcher.calls.get(), 1, "exactly one fetch per key");
    assert_ne!(node_identity(&a), node_identity(&b));
    assert_ne!(node_identity(&a), node_identity(&c));
    assert_ne!(node_identity(&b), node_identity(&c));
    assert_eq!(cache.state("shared.svg"), CacheState::Ready);
}

#[tokio::test]
async fn test_waiters_resolve_in_enqueue_order() {
    let fetcher = MockFetcher::serving(CLIP_SVG);
    let cache = ResourceCache::new(fetcher);
    let order = RefCell::new(Vec::new());

    futures::join!(
        async {
            cache.request("a.svg").await.unwrap();
            order.borrow_mut().push(1);
        },
        async {
            cache.request("a.svg").await.unwrap();
            order.borrow_mut().push(2);
        },
        async {
            cache.request("a.svg").await.unwrap();
            order.borrow_mut().push(3);
        },
    );

    assert_eq!(*order.borrow(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_state_progression_is_absent_pending_ready() {
    let fetcher = MockFetcher::serving(CLIP_SVG);
    let cache = ResourceCache::new(fetcher);

    assert_eq!(cache.state("a.svg"), CacheState::Absent);

    let (result, mid_flight) = futures::join!(cache.request("a.svg"), async {
        // The first branch registered its entry before suspending on the
        // fetch, so this observation happens while the fetch is in flight.
        let observed = cache.state("a.svg");
        tokio::task::yield_now().await;
        observed
    });

    assert!(result.is_ok());
    assert_eq!(mid_flight, CacheState::Pending);
    assert_eq!(cache.state("a.svg"), CacheState::Ready);
}

#[tokio::test]
async fn test_cache_hits_are_never_delivered_on_the_first_poll() {
    let fetcher = MockFetcher::serving(CLIP_SVG);
    let cache = ResourceCache::new(fetcher.clone());
    cache.request("a.svg").await.unwrap();

    // A hit is a deferred unit of work: the future must suspend at least once
    // even though the resource is already Ready.
    let deferred = cache.request("a.svg").now_or_never();
    assert!(deferred.is_none(), "hit resolved synchronously");

    let hit = cache.request("a.svg").await.unwrap();
    assert_eq!(fetcher.calls.get(), 1);
    assert!(hit.as_element().is_some());
}

#[tokio::test]
async fn test_failed_entries_retry_on_demand() {
    let fetcher = MockFetcher::failing(1, CLIP_SVG);
    let cache = ResourceCache::new(fetcher.clone());

    let err = cache.request("a.svg").await.unwrap_err();
    assert_eq!(err, InjectError::LoadFailed("a.svg".to_string()));
    assert_eq!(cache.state("a.svg"), CacheState::Failed);

    // A later request over a Failed key re-attempts the fetch.
    let recovered = cache.request("a.svg").await;
    assert!(recovered.is_ok());
    assert_eq!(fetcher.calls.get(), 2);
    assert_eq!(cache.state("a.svg"), CacheState::Ready);
}

#[tokio::test]
async fn test_concurrent_requests_all_see_the_same_failure() {
    let fetcher = MockFetcher::failing(1, CLIP_SVG);
    let cache = ResourceCache::new(fetcher.clone());

    let (a, b) = futures::join!(cache.request("a.svg"), cache.request("a.svg"));

    assert_eq!(fetcher.calls.get(), 1);
    assert_eq!(a.unwrap_err(), InjectError::LoadFailed("a.svg".to_string()));
    assert_eq!(b.unwrap_err(), InjectError::LoadFailed("a.svg".to_string()));
}

#[tokio::test]
async fn test_distinct_keys_fetch_independently() {
    let fetcher = MockFetcher::serving(CLIP_SVG);
    let cache = ResourceCache::new(fetcher.clone());

    let (a, b) = futures::join!(cache.request("a.svg"), cache.request("b.svg"));
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(fetcher.calls.get(), 2);
}

#[tokio::test]
async fn test_reset_returns_keys_to_absent() {
    let fetcher = MockFetcher::serving(CLIP_SVG);
    let cache = ResourceCache::new(fetcher.clone());

    cache.request("a.svg").await.unwrap();
    assert_eq!(cache.state("a.svg"), CacheState::Ready);

    cache.reset();
    assert_eq!(cache.state("a.svg"), CacheState::Absent);

    cache.request("a.svg").await.unwrap();
    assert_eq!(fetcher.calls.get(), 2, "reset discards the cached payload");
}
