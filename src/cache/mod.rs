/// In-memory feed cache with single-flight population per key
use crate::clients::FeedSource;
use crate::domain::{CacheStat, Collection, Event, FeedKey};
use crate::errors::{FeedError, FeedResult};
use crate::parser::parse_collection;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[cfg(test)]
pub(crate) mod fake;

type FetchOutcome = FeedResult<Arc<Collection>>;

/// Sender side of one running population. Only the populate task holds a
/// strong reference, so the channel closes if that task dies before sending.
type Flight = broadcast::Sender<FetchOutcome>;

/// Shared handle to the cache; clones refer to the same entries.
#[derive(Clone)]
pub struct FeedCache {
    shared: Arc<Shared>,
}

struct Shared {
    source: Arc<dyn FeedSource>,
    ttl: Duration,
    entries: Mutex<HashMap<FeedKey, CacheEntry>>,
    /// Event id -> newest cached copy of that event.
    index: RwLock<HashMap<String, Indexed>>,
    generation: AtomicU64,
}

#[derive(Default)]
struct CacheEntry {
    snapshot: Option<Snapshot>,
    in_flight: Option<Weak<Flight>>,
    fetch_count: u64,
    hit_count: u64,
}

struct Snapshot {
    collection: Arc<Collection>,
    /// Orders snapshots of different keys by when they were stored.
    generation: u64,
    fetched_at: Instant,
    fetched_wall: DateTime<Utc>,
}

struct Indexed {
    key: FeedKey,
    event: Arc<Event>,
}

impl FeedCache {
    pub fn new(source: Arc<dyn FeedSource>, ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                ttl,
                entries: Mutex::new(HashMap::new()),
                index: RwLock::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a collection for `key` no older than the TTL.
    ///
    /// Counts a hit when served from a fresh entry and a fetch when this call
    /// starts a population. Calls joining a running population count as
    /// neither.
    pub async fn get_list(&self, key: FeedKey) -> FeedResult<Arc<Collection>> {
        let mut rx = {
            let mut entries = self.shared.entries.lock().await;
            let entry = entries.entry(key).or_default();

            if let Some(snapshot) = &entry.snapshot {
                if snapshot.fetched_at.elapsed() < self.shared.ttl {
                    entry.hit_count += 1;
                    debug!(?key, hits = entry.hit_count, "cache hit");
                    return Ok(snapshot.collection.clone());
                }
            }

            // a dead weak handle means the last population never finished
            match entry.in_flight.as_ref().and_then(Weak::upgrade) {
                Some(tx) => {
                    debug!(?key, "joining in-flight fetch");
                    tx.subscribe()
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    let tx = Arc::new(tx);
                    entry.in_flight = Some(Arc::downgrade(&tx));
                    entry.fetch_count += 1;
                    debug!(?key, fetches = entry.fetch_count, "starting fetch");
                    tokio::spawn(populate(self.shared.clone(), key, tx));
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(FeedError::Internal(format!(
                "fetch for {:?} finished without a result",
                key
            ))),
        }
    }

    /// Looks up an event among everything cached so far. Never fetches.
    pub async fn get_by_id(&self, id: &str) -> FeedResult<Arc<Event>> {
        self.shared
            .index
            .read()
            .await
            .get(id)
            .map(|indexed| indexed.event.clone())
            .ok_or_else(|| FeedError::NotFound(id.to_string()))
    }

    /// Fetch and hit counters for `key`; zeros if the key was never requested.
    pub async fn get_stat(&self, key: FeedKey) -> CacheStat {
        let entries = self.shared.entries.lock().await;
        entries
            .get(&key)
            .map(|entry| CacheStat {
                fetch_count: entry.fetch_count,
                hit_count: entry.hit_count,
                fetched_at: entry.snapshot.as_ref().map(|s| s.fetched_wall),
            })
            .unwrap_or_default()
    }
}

/// Fetches and parses one key, stores the result and wakes every waiter.
async fn populate(shared: Arc<Shared>, key: FeedKey, tx: Arc<Flight>) {
    let outcome = match shared.source.fetch(key).await {
        Ok(data) => parse_collection(&data, true).map(Arc::new),
        Err(e) => Err(e),
    };

    let mut entries = shared.entries.lock().await;
    let entry = entries.entry(key).or_default();
    entry.in_flight = None;

    match &outcome {
        Ok(collection) => {
            entry.snapshot = Some(Snapshot {
                collection: collection.clone(),
                generation: shared.generation.fetch_add(1, Ordering::Relaxed),
                fetched_at: Instant::now(),
                fetched_wall: Utc::now(),
            });

            let mut index = shared.index.write().await;
            reindex(&mut index, &entries, key, collection);
            info!(
                ?key,
                events = collection.features.len(),
                indexed = index.len(),
                "cache entry refreshed"
            );
        }
        Err(e) => warn!(?key, "cache population failed: {}", e),
    }

    // receivers may have given up waiting
    let _ = tx.send(outcome);
}

/// Points every event id of `collection` at its copy from `key`. Ids that
/// `key` carried before but no longer does fall back to the newest other
/// snapshot still holding them, or leave the index.
fn reindex(
    index: &mut HashMap<String, Indexed>,
    entries: &HashMap<FeedKey, CacheEntry>,
    key: FeedKey,
    collection: &Collection,
) {
    let mut dropped = HashSet::new();
    index.retain(|id, indexed| {
        if indexed.key == key {
            dropped.insert(id.clone());
            return false;
        }
        true
    });

    for eq in &collection.features {
        dropped.remove(&eq.id);
        index.insert(
            eq.id.clone(),
            Indexed {
                key,
                event: eq.clone(),
            },
        );
    }

    if dropped.is_empty() {
        return;
    }

    let mut others: Vec<_> = entries
        .iter()
        .filter(|(other, _)| **other != key)
        .filter_map(|(other, entry)| entry.snapshot.as_ref().map(|s| (*other, s)))
        .collect();
    others.sort_by_key(|(_, snapshot)| snapshot.generation);

    for (other, snapshot) in others {
        for eq in &snapshot.collection.features {
            if dropped.contains(&eq.id) {
                index.insert(
                    eq.id.clone(),
                    Indexed {
                        key: other,
                        event: eq.clone(),
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::{feed_document, placed_document, FakeSource};
    use crate::domain::tests::MAGNITUDES;
    use super::*;
    use crate::domain::{Magnitude, Past};

    const TTL: Duration = Duration::from_secs(60);

    fn key() -> FeedKey {
        FeedKey::new(Magnitude::M45Plus, Past::Day)
    }

    fn sample_source() -> Arc<FakeSource> {
        Arc::new(FakeSource::new(feed_document(&[("a", 10.0, 20.0), ("b", 11.0, 21.0)])))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_then_hit() {
        let source = sample_source();
        let cache = FeedCache::new(source.clone(), TTL);

        let col1 = cache.get_list(key()).await.unwrap();
        let stat = cache.get_stat(key()).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (1, 0));
        assert!(stat.fetched_at.is_some());
        assert_eq!(col1.features.len(), 2);

        let col2 = cache.get_list(key()).await.unwrap();
        let stat = cache.get_stat(key()).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (1, 1));
        assert!(Arc::ptr_eq(&col1, &col2));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_under_concurrency() {
        let source = Arc::new(
            FakeSource::new(feed_document(&[("a", 10.0, 20.0)]))
                .with_delay(Duration::from_millis(100)),
        );
        let cache = FeedCache::new(source.clone(), TTL);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_list(key()).await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(source.calls(), 1);
        let stat = cache.get_stat(key()).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (1, 0));
        assert!(results.iter().all(|col| Arc::ptr_eq(col, &results[0])));

        cache.get_list(key()).await.unwrap();
        let stat = cache.get_stat(key()).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_is_refetched() {
        let source = sample_source();
        let cache = FeedCache::new(source.clone(), TTL);

        cache.get_list(key()).await.unwrap();
        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        cache.get_list(key()).await.unwrap();
        assert_eq!(source.calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get_list(key()).await.unwrap();
        assert_eq!(source.calls(), 2);
        let stat = cache.get_stat(key()).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (2, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let source = sample_source();
        let cache = FeedCache::new(source.clone(), TTL);
        let other = FeedKey::new(Magnitude::All, Past::Hour);

        cache.get_list(key()).await.unwrap();
        cache.get_list(other).await.unwrap();
        cache.get_list(other).await.unwrap();

        let stat = cache.get_stat(key()).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (1, 0));
        let stat = cache.get_stat(other).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (1, 1));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_not_cached() {
        let source = Arc::new(
            FakeSource::new(feed_document(&[("a", 10.0, 20.0)]))
                .with_delay(Duration::from_millis(50))
                .failing(1),
        );
        let cache = FeedCache::new(source.clone(), TTL);

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_list(key()).await })
            })
            .collect();
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, FeedError::Transport { .. }));
        }
        assert_eq!(source.calls(), 1);

        let col = cache.get_list(key()).await.unwrap();
        assert_eq!(col.features.len(), 1);
        assert_eq!(source.calls(), 2);
        let stat = cache.get_stat(key()).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (2, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = sample_source();
        let cache = FeedCache::new(source.clone(), TTL);
        cache.get_list(key()).await.unwrap();

        source.fail_next(1);
        tokio::time::advance(TTL).await;
        assert!(cache.get_list(key()).await.is_err());
        assert_eq!(cache.get_by_id("a").await.unwrap().id, "a");

        let stat = cache.get_stat(key()).await;
        assert!(stat.fetched_at.is_some());

        cache.get_list(key()).await.unwrap();
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_error_propagates() {
        let source = Arc::new(FakeSource::new(b"not json".to_vec()));
        let cache = FeedCache::new(source, TTL);
        let err = cache.get_list(key()).await.unwrap_err();
        assert!(matches!(err, FeedError::MalformedInput(_)));
        assert!(cache.get_by_id("a").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_wait_does_not_cancel_fetch() {
        let source = Arc::new(
            FakeSource::new(feed_document(&[("a", 10.0, 20.0)]))
                .with_delay(Duration::from_millis(100)),
        );
        let cache = FeedCache::new(source.clone(), TTL);

        let early = tokio::time::timeout(Duration::from_millis(10), cache.get_list(key())).await;
        assert!(early.is_err());

        let col = cache.get_list(key()).await.unwrap();
        assert_eq!(col.features.len(), 1);
        assert_eq!(source.calls(), 1);
        let stat = cache.get_stat(key()).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_by_id_is_cache_only() {
        let source = sample_source();
        let cache = FeedCache::new(source.clone(), TTL);

        let err = cache.get_by_id("a").await.unwrap_err();
        assert_eq!(err, FeedError::NotFound("a".to_string()));
        assert_eq!(source.calls(), 0);

        cache.get_list(key()).await.unwrap();
        let eq = cache.get_by_id("b").await.unwrap();
        assert_eq!(eq.id, "b");
        assert!(eq.details.is_some());
        assert!(cache.get_by_id("zzz").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stat_for_unknown_key() {
        let cache = FeedCache::new(sample_source(), TTL);
        let stat = cache.get_stat(key()).await;
        assert_eq!(stat, CacheStat::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_index_follows_latest_fetch() {
        let source = Arc::new(FakeSource::new(feed_document(&[])));
        for m in MAGNITUDES {
            let token = m.token().unwrap_or_default();
            source.set_body(FeedKey::new(m, Past::Day), placed_document(&[("x", token)]));
        }
        let cache = FeedCache::new(source.clone(), TTL);

        for m in MAGNITUDES {
            cache.get_list(FeedKey::new(m, Past::Day)).await.unwrap();
            let eq = cache.get_by_id("x").await.unwrap();
            assert_eq!(eq.place, m.token().unwrap_or_default());
        }

        tokio::time::advance(TTL).await;
        cache
            .get_list(FeedKey::new(Magnitude::Significant, Past::Day))
            .await
            .unwrap();
        assert_eq!(cache.get_by_id("x").await.unwrap().place, "significant");
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_dropped_by_refresh_falls_back_to_other_feed() {
        let day = FeedKey::new(Magnitude::M45Plus, Past::Day);
        let week = FeedKey::new(Magnitude::M45Plus, Past::Days7);
        let source = Arc::new(FakeSource::new(feed_document(&[])));
        source.set_body(week, placed_document(&[("x", "week copy")]));
        source.set_body(day, placed_document(&[("x", "day copy")]));
        let cache = FeedCache::new(source.clone(), TTL);

        cache.get_list(week).await.unwrap();
        cache.get_list(day).await.unwrap();
        assert_eq!(cache.get_by_id("x").await.unwrap().place, "day copy");

        source.set_body(day, placed_document(&[("y", "day copy")]));
        tokio::time::advance(TTL).await;
        cache.get_list(day).await.unwrap();
        assert_eq!(cache.get_by_id("x").await.unwrap().place, "week copy");
        assert_eq!(cache.get_by_id("y").await.unwrap().place, "day copy");

        source.set_body(week, placed_document(&[]));
        cache.get_list(week).await.unwrap();
        let err = cache.get_by_id("x").await.unwrap_err();
        assert_eq!(err, FeedError::NotFound("x".to_string()));
        assert!(cache.get_by_id("y").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_fetch_releases_waiters() {
        let source = Arc::new(
            FakeSource::new(feed_document(&[("a", 10.0, 20.0)]))
                .with_delay(Duration::from_millis(50))
                .panicking(1),
        );
        let cache = FeedCache::new(source.clone(), TTL);

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    tokio::time::timeout(Duration::from_secs(2), cache.get_list(key())).await
                })
            })
            .collect();
        for handle in handles {
            let outcome = handle.await.unwrap().expect("waiter hung on a dead fetch");
            assert!(matches!(outcome, Err(FeedError::Internal(_))));
        }
        assert_eq!(source.calls(), 1);

        let col = tokio::time::timeout(Duration::from_secs(2), cache.get_list(key()))
            .await
            .expect("key stayed blocked after a crashed fetch")
            .unwrap();
        assert_eq!(col.features.len(), 1);
        assert_eq!(source.calls(), 2);
        let stat = cache.get_stat(key()).await;
        assert_eq!((stat.fetch_count, stat.hit_count), (2, 0));
    }
}
