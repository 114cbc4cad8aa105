/// HTTP request handlers
use crate::domain::{CacheStat, Collection, Event, Health, Magnitude, Past};
use crate::errors::{ApiError, ApiResult};
use crate::geo::{to_fixed, Axis, GeoBounds, GeoPoint};
use crate::services::QuakeService;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub quake_service: Arc<QuakeService>,
}

/// Successful response wrapper
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

#[derive(Debug, Serialize)]
pub struct FeatureBody {
    pub feature: Arc<Event>,
}

#[derive(Debug, Serialize)]
pub struct CollectionBody {
    pub collection: Arc<Collection>,
}

#[derive(Debug, Serialize)]
pub struct StatBody {
    pub magnitude: Magnitude,
    pub past: Past,
    #[serde(flatten)]
    pub stat: CacheStat,
}

/// Feed selection shared by list and stats queries
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub magnitude: Option<String>,
    pub past: Option<String>,
}

impl FeedParams {
    fn resolve(&self) -> (Magnitude, Past) {
        resolve_feed(self.magnitude.as_deref(), self.past.as_deref())
    }
}

fn resolve_feed(magnitude: Option<&str>, past: Option<&str>) -> (Magnitude, Past) {
    (
        Magnitude::parse(magnitude.unwrap_or_default()),
        Past::parse(past.unwrap_or_default()),
    )
}

/// Query string of the list endpoint; degrees for lat/lon, centimeters for heights
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub magnitude: Option<String>,
    pub past: Option<String>,
    #[serde(default)]
    pub limit: i32,
    #[serde(default)]
    pub details: bool,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub height: Option<i32>,
    pub min_lat: Option<f64>,
    pub min_lon: Option<f64>,
    pub max_lat: Option<f64>,
    pub max_lon: Option<f64>,
    pub min_height: Option<i32>,
    pub max_height: Option<i32>,
}

/// Where a list request is focused
#[derive(Debug, PartialEq)]
pub enum Focus {
    None,
    Position(GeoPoint),
    Bounds(GeoBounds),
}

impl ListParams {
    /// A focus position wins over bounds; partial coordinates are rejected.
    pub fn focus(&self) -> ApiResult<Focus> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => {
                return Ok(Focus::Position(GeoPoint::from_degrees(
                    lat,
                    lon,
                    self.height.unwrap_or(0),
                )))
            }
            (None, None) => {}
            _ => {
                return Err(ApiError::InvalidInput(
                    "lat and lon must be given together".to_string(),
                ))
            }
        }

        match (self.min_lat, self.min_lon, self.max_lat, self.max_lon) {
            (Some(min_lat), Some(min_lon), Some(max_lat), Some(max_lon)) => {
                Ok(Focus::Bounds(GeoBounds {
                    min_latitude: to_fixed(min_lat, Axis::Latitude),
                    min_longitude: to_fixed(min_lon, Axis::Longitude),
                    min_height: self.min_height.unwrap_or(i32::MIN),
                    max_latitude: to_fixed(max_lat, Axis::Latitude),
                    max_longitude: to_fixed(max_lon, Axis::Longitude),
                    max_height: self.max_height.unwrap_or(i32::MAX),
                }))
            }
            (None, None, None, None) => Ok(Focus::None),
            _ => Err(ApiError::InvalidInput(
                "min_lat, min_lon, max_lat and max_lon must be given together".to_string(),
            )),
        }
    }
}

/// Health check handler
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        now: Utc::now(),
    })
}

/// Get one earthquake by id
pub async fn get_earthquake(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<SuccessResponse<FeatureBody>>> {
    let feature = state.quake_service.get_earthquake(&id).await?;
    Ok(Json(SuccessResponse::new(FeatureBody { feature })))
}

/// List earthquakes of one feed, optionally focused on a position or bounds
pub async fn list_earthquakes(
    Query(params): Query<ListParams>,
    State(state): State<AppState>,
) -> ApiResult<Json<SuccessResponse<CollectionBody>>> {
    let (magnitude, past) = resolve_feed(params.magnitude.as_deref(), params.past.as_deref());
    let (limit, details) = (params.limit, params.details);
    let service = &state.quake_service;

    let collection = match params.focus()? {
        Focus::Position(pos) => {
            service
                .list_focus_position(magnitude, past, limit, details, pos)
                .await?
        }
        Focus::Bounds(bounds) => {
            service
                .list_focus_bounds(magnitude, past, limit, details, bounds)
                .await?
        }
        Focus::None => service.list(magnitude, past, limit, details).await?,
    };

    Ok(Json(SuccessResponse::new(CollectionBody { collection })))
}

/// Cache counters for one feed
pub async fn get_cache_stats(
    Query(params): Query<FeedParams>,
    State(state): State<AppState>,
) -> Json<SuccessResponse<StatBody>> {
    let (magnitude, past) = params.resolve();
    let stat = state.quake_service.cache_stat(magnitude, past).await;
    Json(SuccessResponse::new(StatBody {
        magnitude,
        past,
        stat,
    }))
}
