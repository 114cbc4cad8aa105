/// Fixed-point geocoordinates and great-circle distance
use serde::{Deserialize, Serialize};

/// Scale between degrees and the fixed-point representation (seven decimals).
pub const FACTOR_E7: f64 = 1e7;

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

const LAT_MAX_E7: i32 = 90_0000000;
const LON_MAX_E7: i32 = 180_0000000;

/// Which axis a degree value belongs to; selects the clamping domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn max_degrees(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    fn max_e7(self) -> i32 {
        match self {
            Axis::Latitude => LAT_MAX_E7,
            Axis::Longitude => LON_MAX_E7,
        }
    }
}

/// A position in fixed-point form. Height is centimeters above sea level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: i32,
    pub longitude: i32,
    pub height: i32,
}

impl GeoPoint {
    pub fn new(latitude: i32, longitude: i32, height: i32) -> Self {
        Self {
            latitude,
            longitude,
            height,
        }
    }

    /// Builds a point from degrees, clamping each axis to its domain.
    pub fn from_degrees(lat: f64, lon: f64, height_cm: i32) -> Self {
        Self::new(
            to_fixed(lat, Axis::Latitude),
            to_fixed(lon, Axis::Longitude),
            height_cm,
        )
    }

    pub fn lat_degrees(&self) -> f64 {
        from_fixed(self.latitude, Axis::Latitude)
    }

    pub fn lon_degrees(&self) -> f64 {
        from_fixed(self.longitude, Axis::Longitude)
    }
}

/// Axis-aligned box in fixed-point space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_latitude: i32,
    pub min_longitude: i32,
    pub min_height: i32,
    pub max_latitude: i32,
    pub max_longitude: i32,
    pub max_height: i32,
}

impl GeoBounds {
    /// Degenerate box covering exactly one point.
    pub fn from_point(pos: &GeoPoint) -> Self {
        Self {
            min_latitude: pos.latitude,
            min_longitude: pos.longitude,
            min_height: pos.height,
            max_latitude: pos.latitude,
            max_longitude: pos.longitude,
            max_height: pos.height,
        }
    }

    /// Grows the box so that it also covers `pos`.
    pub fn extend(&mut self, pos: &GeoPoint) {
        self.min_latitude = self.min_latitude.min(pos.latitude);
        self.min_longitude = self.min_longitude.min(pos.longitude);
        self.min_height = self.min_height.min(pos.height);
        self.max_latitude = self.max_latitude.max(pos.latitude);
        self.max_longitude = self.max_longitude.max(pos.longitude);
        self.max_height = self.max_height.max(pos.height);
    }

    /// Inclusive containment on every axis.
    pub fn contains(&self, pos: &GeoPoint) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&pos.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&pos.longitude)
            && (self.min_height..=self.max_height).contains(&pos.height)
    }

    /// Per-axis midpoint; integer division truncates toward the min side.
    pub fn midpoint(&self) -> GeoPoint {
        GeoPoint {
            latitude: midpoint_axis(self.min_latitude, self.max_latitude),
            longitude: midpoint_axis(self.min_longitude, self.max_longitude),
            height: midpoint_axis(self.min_height, self.max_height),
        }
    }
}

fn midpoint_axis(min: i32, max: i32) -> i32 {
    // widen so that full-range bounds do not overflow
    (min as i64 + (max as i64 - min as i64) / 2) as i32
}

/// Rounds half away from zero on a truncating conversion.
pub fn round32(value: f64) -> i32 {
    if value < 0.0 {
        (value - 0.5) as i32
    } else {
        (value + 0.5) as i32
    }
}

/// Converts degrees to fixed-point, clamping to the axis domain.
pub fn to_fixed(degrees: f64, axis: Axis) -> i32 {
    let max = axis.max_degrees();
    round32(degrees.clamp(-max, max) * FACTOR_E7)
}

/// Converts fixed-point back to degrees, clamping to the axis domain.
pub fn from_fixed(value: i32, axis: Axis) -> f64 {
    let max = axis.max_e7();
    value.clamp(-max, max) as f64 / FACTOR_E7
}

/// Feed depth (km, positive downward) to height above sea level (cm).
pub fn depth_to_height_cm(depth_km: f64) -> i32 {
    round32(-depth_km * 100_000.0)
}

/// Great-circle distance in meters between two fixed-point positions.
pub fn distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    haversine_m(
        p1.lat_degrees(),
        p1.lon_degrees(),
        p2.lat_degrees(),
        p2.lon_degrees(),
    )
}

/// Calculate distance between two coordinates using Haversine formula
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let rlat1 = lat1.to_radians();
    let rlat2 = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + rlat1.cos() * rlat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}
