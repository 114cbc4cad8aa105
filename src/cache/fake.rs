/// In-process feed source for cache tests
use crate::clients::{resolve_url, FeedSource};
use crate::domain::FeedKey;
use crate::errors::{FeedError, FeedResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Serves a fixed document for every key unless one was set for that key,
/// counting calls.
pub(crate) struct FakeSource {
    body: Vec<u8>,
    bodies: Mutex<HashMap<FeedKey, Vec<u8>>>,
    delay: Duration,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    panics_left: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            bodies: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            panics_left: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn failing(self, times: usize) -> Self {
        self.fail_next(times);
        self
    }

    /// The first `times` fetches panic instead of returning.
    pub(crate) fn panicking(self, times: usize) -> Self {
        self.panics_left.store(times, Ordering::SeqCst);
        self
    }

    /// Serves `body` for `key` from now on.
    pub(crate) fn set_body(&self, key: FeedKey, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(key, body);
    }

    /// The next `times` fetches fail with a transport error.
    pub(crate) fn fail_next(&self, times: usize) {
        self.failures_left.store(times, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for FakeSource {
    async fn fetch(&self, key: FeedKey) -> FeedResult<Vec<u8>> {
        let url = resolve_url("fake://feed/", ".geojson", key)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if take_one(&self.panics_left) {
            panic!("feed source crashed while fetching {}", url);
        }
        if take_one(&self.failures_left) {
            return Err(FeedError::Transport {
                url,
                reason: "resource returned 503 Service Unavailable".to_string(),
            });
        }
        let bodies = self.bodies.lock().unwrap();
        Ok(bodies.get(&key).unwrap_or(&self.body).clone())
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Minimal feed document with one point feature per `(id, lat, lon)`,
/// all at 10 km depth, with details populated.
pub(crate) fn feed_document(events: &[(&str, f64, f64)]) -> Vec<u8> {
    let features = events
        .iter()
        .map(|(id, lat, lon)| feature(id, &format!("near {}", id), *lat, *lon))
        .collect();
    document(features)
}

/// Like [`feed_document`] but with a chosen place per `(id, place)`, all at
/// the same position.
pub(crate) fn placed_document(events: &[(&str, &str)]) -> Vec<u8> {
    let features = events
        .iter()
        .map(|(id, place)| feature(id, place, 10.0, 20.0))
        .collect();
    document(features)
}

fn feature(id: &str, place: &str, lat: f64, lon: f64) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": { "type": "Point", "coordinates": [lon, lat, 10.0] },
        "properties": {
            "mag": 4.5,
            "place": place,
            "time": 1577967410040i64,
            "updated": 1577968001040i64,
            "status": "reviewed",
            "ids": format!(",{},", id),
            "type": "earthquake"
        }
    })
}

fn document(features: Vec<Value>) -> Vec<u8> {
    let count = features.len();
    json!({
        "type": "FeatureCollection",
        "metadata": {
            "generated": 1577968050000i64,
            "url": "fake://feed",
            "title": "Fake feed",
            "api": "1.8.1",
            "count": count,
            "status": 200
        },
        "features": features
    })
    .to_string()
    .into_bytes()
}
