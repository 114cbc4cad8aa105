/// Domain models for the application
use crate::geo::{GeoBounds, GeoPoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Magnitude class of a feed, selecting which summary document is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Magnitude {
    Unspecified,
    Significant,
    M45Plus,
    M25Plus,
    M10Plus,
    All,
}

impl Magnitude {
    /// Maps a feed token to a class; unknown tokens become `Unspecified`.
    pub fn parse(value: &str) -> Self {
        match value {
            "significant" => Magnitude::Significant,
            "4.5" => Magnitude::M45Plus,
            "2.5" => Magnitude::M25Plus,
            "1.0" => Magnitude::M10Plus,
            "all" => Magnitude::All,
            _ => Magnitude::Unspecified,
        }
    }

    /// Token used in feed URLs.
    pub fn token(self) -> Option<&'static str> {
        match self {
            Magnitude::Significant => Some("significant"),
            Magnitude::M45Plus => Some("4.5"),
            Magnitude::M25Plus => Some("2.5"),
            Magnitude::M10Plus => Some("1.0"),
            Magnitude::All => Some("all"),
            Magnitude::Unspecified => None,
        }
    }
}

/// Recency window of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Past {
    Unspecified,
    Hour,
    Day,
    Days7,
    Days30,
}

impl Past {
    pub fn parse(value: &str) -> Self {
        match value {
            "hour" => Past::Hour,
            "day" => Past::Day,
            "week" => Past::Days7,
            "month" => Past::Days30,
            _ => Past::Unspecified,
        }
    }

    pub fn token(self) -> Option<&'static str> {
        match self {
            Past::Hour => Some("hour"),
            Past::Day => Some("day"),
            Past::Days7 => Some("week"),
            Past::Days30 => Some("month"),
            Past::Unspecified => None,
        }
    }
}

/// Cache key: one feed document per (magnitude, past) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FeedKey {
    pub magnitude: Magnitude,
    pub past: Past,
}

impl FeedKey {
    pub fn new(magnitude: Magnitude, past: Past) -> Self {
        Self { magnitude, past }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    #[default]
    Unspecified,
    Green,
    Yellow,
    Orange,
    Red,
}

impl Alert {
    pub fn parse(value: &str) -> Self {
        match value {
            "red" => Alert::Red,
            "orange" => Alert::Orange,
            "yellow" => Alert::Yellow,
            "green" => Alert::Green,
            _ => Alert::Unspecified,
        }
    }
}

/// Review status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Unspecified,
    Automatic,
    Reviewed,
    Deleted,
}

impl Status {
    pub fn parse(value: &str) -> Self {
        match value {
            "automatic" => Status::Automatic,
            "reviewed" => Status::Reviewed,
            "deleted" => Status::Deleted,
            _ => Status::Unspecified,
        }
    }
}

/// Kind of seismic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    #[default]
    Unspecified,
    Earthquake,
    Quarry,
}

impl EventType {
    pub fn parse(value: &str) -> Self {
        match value {
            "earthquake" => EventType::Earthquake,
            "quarry" => EventType::Quarry,
            _ => EventType::Unspecified,
        }
    }
}

/// Diagnostic fields, present only when details were requested
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    pub id: String,
    pub url: String,
    pub detail_feed_url: String,
    pub felt: i32,
    pub reported_intensity: f32,
    pub estimated_intensity: f32,
    pub status: Status,
    pub tsunami: bool,
    pub network: String,
    pub code: String,
    pub ids: String,
    pub sources: String,
    pub product_types: String,
    pub nst: i32,
    pub dmin: f32,
    pub rms: f32,
    pub gap: f32,
    pub mag_type: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
}

/// One seismic occurrence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// `None` when the feed reported no point geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoPoint>,
    pub magnitude: f32,
    pub place: String,
    /// Epoch seconds.
    pub time: i64,
    /// Epoch seconds.
    pub updated_time: i64,
    /// Minutes.
    pub timezone_offset: i32,
    pub alert: Alert,
    pub significance: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<EventDetails>,
}

impl Event {
    /// Copy of this event with the details block removed.
    pub fn without_details(&self) -> Event {
        Event {
            id: self.id.clone(),
            position: self.position,
            magnitude: self.magnitude,
            place: self.place.clone(),
            time: self.time,
            updated_time: self.updated_time,
            timezone_offset: self.timezone_offset,
            alert: self.alert,
            significance: self.significance,
            details: None,
        }
    }
}

/// Feed metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Epoch seconds.
    pub generated_time: i64,
    pub url: String,
    pub title: String,
    pub api: String,
    pub count: i32,
    pub http_status: String,
}

/// Events of one feed snapshot (or a projection of one)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Collection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<GeoBounds>,
    /// Shared with the cache snapshot and id index; never mutated in place.
    pub features: Vec<Arc<Event>>,
}

/// Fetch and hit counters of one cache key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStat {
    pub fetch_count: u64,
    pub hit_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub now: DateTime<Utc>,
}
