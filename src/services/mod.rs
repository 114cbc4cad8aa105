/// Earthquake query service
use crate::cache::FeedCache;
use crate::domain::{CacheStat, Collection, Event, FeedKey, Magnitude, Metadata, Past};
use crate::errors::FeedResult;
use crate::geo::{distance, GeoBounds, GeoPoint};
use std::sync::Arc;

/// Read-only queries over cached feed snapshots
pub struct QuakeService {
    cache: FeedCache,
}

impl QuakeService {
    pub fn new(cache: FeedCache) -> Self {
        Self { cache }
    }

    /// Get a single earthquake from whatever has been cached so far
    pub async fn get_earthquake(&self, id: &str) -> FeedResult<Arc<Event>> {
        self.cache.get_by_id(id).await
    }

    /// List earthquakes in feed order
    pub async fn list(
        &self,
        magnitude: Magnitude,
        past: Past,
        limit: i32,
        details: bool,
    ) -> FeedResult<Arc<Collection>> {
        let col = self.cache.get_list(FeedKey::new(magnitude, past)).await?;

        // the cached snapshot already has details, nothing to cut
        if details && (limit <= 0 || col.features.len() <= limit as usize) {
            return Ok(col);
        }

        let events = col.features.iter().cloned().collect();
        Ok(Arc::new(project(&col, events, limit, details)))
    }

    /// List earthquakes nearest to `focus` first
    pub async fn list_focus_position(
        &self,
        magnitude: Magnitude,
        past: Past,
        limit: i32,
        details: bool,
        focus: GeoPoint,
    ) -> FeedResult<Arc<Collection>> {
        let col = self.cache.get_list(FeedKey::new(magnitude, past)).await?;
        let events = sort_by_distance(col.features.iter().cloned(), &focus);
        Ok(Arc::new(project(&col, events, limit, details)))
    }

    /// List earthquakes inside `bounds`, nearest to the bounds midpoint first
    pub async fn list_focus_bounds(
        &self,
        magnitude: Magnitude,
        past: Past,
        limit: i32,
        details: bool,
        bounds: GeoBounds,
    ) -> FeedResult<Arc<Collection>> {
        let col = self.cache.get_list(FeedKey::new(magnitude, past)).await?;
        let focus = bounds.midpoint();
        let inside = col
            .features
            .iter()
            .filter(|eq| eq.position.is_some_and(|pos| bounds.contains(&pos)))
            .cloned();
        let events = sort_by_distance(inside, &focus);
        Ok(Arc::new(project(&col, events, limit, details)))
    }

    pub async fn cache_stat(&self, magnitude: Magnitude, past: Past) -> CacheStat {
        self.cache.get_stat(FeedKey::new(magnitude, past)).await
    }
}

/// Stable sort by distance to `focus`; events without a position go last.
fn sort_by_distance<I>(events: I, focus: &GeoPoint) -> Vec<Arc<Event>>
where
    I: Iterator<Item = Arc<Event>>,
{
    let mut keyed: Vec<(f64, Arc<Event>)> = events
        .map(|eq| {
            let dist = eq
                .position
                .map(|pos| distance(&pos, focus))
                .unwrap_or(f64::INFINITY);
            (dist, eq)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    keyed.into_iter().map(|(_, eq)| eq).collect()
}

/// Builds the response view: truncates to `limit` (<= 0 is unlimited), drops
/// details unless asked for, and recomputes bounds and count from what is
/// kept. Other metadata is copied from `from`.
fn project(from: &Collection, events: Vec<Arc<Event>>, limit: i32, details: bool) -> Collection {
    let take = if limit > 0 { limit as usize } else { usize::MAX };

    let mut bounds: Option<GeoBounds> = None;
    let features: Vec<Arc<Event>> = events
        .into_iter()
        .take(take)
        .map(|eq| {
            if let Some(pos) = &eq.position {
                match bounds.as_mut() {
                    Some(b) => b.extend(pos),
                    None => bounds = Some(GeoBounds::from_point(pos)),
                }
            }
            if details {
                eq
            } else {
                Arc::new(eq.without_details())
            }
        })
        .collect();

    let metadata = from.metadata.as_ref().map(|m| Metadata {
        count: features.len() as i32,
        ..m.clone()
    });

    Collection {
        metadata,
        bounds,
        features,
    }
}
