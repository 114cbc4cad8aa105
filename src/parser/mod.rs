/// GeoJSON summary feed parsing
use crate::domain::{Alert, Collection, Event, EventDetails, EventType, Metadata, Status};
use crate::errors::{FeedError, FeedResult};
use crate::geo::{depth_to_height_cm, to_fixed, Axis, GeoBounds, GeoPoint};
use crate::utils::Cursor;
use serde_json::Value;
use std::sync::Arc;

/// Parses a USGS GeoJSON summary document into a collection.
///
/// The feed's bbox is `[min-lon, min-lat, min-depth, max-lon, max-lat, max-depth]`.
/// Depth is turned into height above sea level, so the deepest value (the
/// feed's max-depth) becomes `min_height` and vice versa.
///
/// Detail fields are read only when `details` is set. The whole document is
/// parsed before anything is returned; there is no partial result on error.
pub fn parse_collection(data: &[u8], details: bool) -> FeedResult<Collection> {
    let root: Value =
        serde_json::from_slice(data).map_err(|e| FeedError::MalformedInput(e.to_string()))?;
    let c = Cursor::new(&root);

    let kind = c.string("type");
    if kind != "FeatureCollection" {
        return Err(FeedError::SchemaMismatch(format!(
            "expected FeatureCollection, found {:?}",
            kind
        )));
    }

    let mut col = Collection::default();

    let m = c.get("metadata");
    if m.is_object() {
        col.metadata = Some(Metadata {
            generated_time: m.int64("generated") / 1000,
            url: m.string("url"),
            title: m.string("title"),
            api: m.string("api"),
            count: m.int32("count"),
            http_status: m.string("status"),
        });
    }

    let b = c.get("bbox");
    if b.is_array() {
        col.bounds = Some(GeoBounds {
            min_latitude: to_fixed(b.float64("1"), Axis::Latitude),
            min_longitude: to_fixed(b.float64("0"), Axis::Longitude),
            min_height: depth_to_height_cm(b.float64("5")),
            max_latitude: to_fixed(b.float64("4"), Axis::Latitude),
            max_longitude: to_fixed(b.float64("3"), Axis::Longitude),
            max_height: depth_to_height_cm(b.float64("2")),
        });
    }

    c.for_each_array("features", |feature| {
        if feature.string("type") != "Feature" {
            return;
        }
        col.features.push(Arc::new(parse_event(feature, details)));
    });

    Ok(col)
}

fn parse_event(feature: Cursor<'_>, details: bool) -> Event {
    let id = feature.string("id");
    let mut eq = Event {
        id: id.clone(),
        ..Default::default()
    };

    if feature.string("geometry.type") == "Point" {
        let coord = feature.get("geometry.coordinates");
        if coord.is_array() {
            eq.position = Some(GeoPoint::new(
                to_fixed(coord.float64("1"), Axis::Latitude),
                to_fixed(coord.float64("0"), Axis::Longitude),
                depth_to_height_cm(coord.float64("2")),
            ));
        }
    }

    let prop = feature.get("properties");
    if !prop.is_object() {
        return eq;
    }

    eq.magnitude = prop.float32("mag");
    eq.place = prop.string("place");
    eq.time = prop.int64("time") / 1000;
    eq.updated_time = prop.int64("updated") / 1000;
    eq.timezone_offset = prop.int32("tz");
    eq.alert = Alert::parse(&prop.string("alert"));
    eq.significance = prop.int32("sig");

    if details {
        eq.details = Some(EventDetails {
            id,
            url: prop.string("url"),
            detail_feed_url: prop.string("detail"),
            felt: prop.int32("felt"),
            reported_intensity: prop.float32("cdi"),
            estimated_intensity: prop.float32("mmi"),
            status: Status::parse(&prop.string("status")),
            tsunami: prop.int32("tsunami") == 1,
            network: prop.string("net"),
            code: prop.string("code"),
            ids: prop.string("ids"),
            sources: prop.string("sources"),
            product_types: prop.string("types"),
            nst: prop.int32("nst"),
            dmin: prop.float32("dmin"),
            rms: prop.float32("rms"),
            gap: prop.float32("gap"),
            mag_type: prop.string("magType"),
            event_type: EventType::parse(&prop.string("type")),
        });
    }

    eq
}
