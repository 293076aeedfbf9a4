//! GeoJSON and filename helpers for batch job output.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, SecondsFormat};
use geo::Coord;
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde_json::json;

use crate::error::Result;
use crate::segments::MergedSegment;

/// Collection-level metadata written next to the features.
#[derive(Clone, Debug)]
pub struct CollectionInfo {
    pub project: String,
    pub created_at: DateTime<FixedOffset>,
}

impl CollectionInfo {
    pub fn new(project: impl Into<String>, created_at: DateTime<FixedOffset>) -> Self {
        Self {
            project: project.into(),
            created_at,
        }
    }

    pub fn created_at_iso(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Micros, false)
    }

    /// `properties` foreign member; `count_key` names the feature count.
    fn properties(&self, count_key: &str, count: usize) -> JsonObject {
        let mut properties = JsonObject::new();
        properties.insert("project".to_string(), json!(self.project));
        properties.insert("created_at".to_string(), json!(self.created_at_iso()));
        properties.insert(count_key.to_string(), json!(count));

        let mut foreign = JsonObject::new();
        foreign.insert("properties".to_string(), serde_json::Value::Object(properties));
        foreign
    }
}

/// One fetched route, ready to be written as a LineString feature.
#[derive(Clone, Debug)]
pub struct RouteRecord {
    pub start: String,
    pub end: String,
    pub travel_mode: String,
    pub departure_time: String,
    pub coordinates: Vec<Coord<f64>>,
    pub distance: Option<String>,
    pub duration: Option<String>,
    pub duration_in_traffic: Option<String>,
}

/// One place with its detail fields.
#[derive(Clone, Debug)]
pub struct PlaceRecord {
    pub place_id: String,
    pub location: Coord<f64>,
    pub properties: JsonObject,
}

fn line_string(coords: &[Coord<f64>]) -> Geometry {
    Geometry::new(Value::LineString(
        coords.iter().map(|c| vec![c.x, c.y]).collect(),
    ))
}

fn merged_segment_to_feature(segment: &MergedSegment) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("weight".to_string(), json!(segment.weight));
    properties.insert("segment_count".to_string(), json!(segment.segment_count));

    Feature {
        bbox: None,
        geometry: Some(line_string(&segment.coordinates)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn route_to_feature(route: &RouteRecord) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("start_location".to_string(), json!(route.start));
    properties.insert("end_location".to_string(), json!(route.end));
    properties.insert("travel_mode".to_string(), json!(route.travel_mode));
    properties.insert("departure_time".to_string(), json!(route.departure_time));
    properties.insert("query_time".to_string(), json!(route.departure_time));
    properties.insert("distance".to_string(), json!(route.distance));
    properties.insert("duration".to_string(), json!(route.duration));
    properties.insert(
        "duration_in_traffic".to_string(),
        json!(route.duration_in_traffic.as_deref().unwrap_or("N/A")),
    );

    Feature {
        bbox: None,
        geometry: Some(line_string(&route.coordinates)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn place_to_feature(place: &PlaceRecord) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![
            place.location.x,
            place.location.y,
        ]))),
        id: Some(Id::String(place.place_id.clone())),
        properties: Some(place.properties.clone()),
        foreign_members: None,
    }
}

/// Merged weighted segments as LineStrings with `weight` and
/// `segment_count` properties.
pub fn weighted_segments_collection(
    segments: &[MergedSegment],
    info: &CollectionInfo,
) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: segments.iter().map(merged_segment_to_feature).collect(),
        foreign_members: Some(info.properties("total_segments", segments.len())),
    }
}

/// One LineString per route.
pub fn routes_collection(routes: &[RouteRecord], info: &CollectionInfo) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: routes.iter().map(route_to_feature).collect(),
        foreign_members: Some(info.properties("total_routes", routes.len())),
    }
}

/// Places as Point features keyed by place id.
pub fn places_collection<'a>(places: impl IntoIterator<Item = &'a PlaceRecord>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: places.into_iter().map(place_to_feature).collect(),
        foreign_members: None,
    }
}

/// Write a FeatureCollection as pretty-printed UTF-8 JSON.
pub fn write_feature_collection(path: &Path, collection: FeatureCollection) -> Result<()> {
    log::info!(
        "Writing {} features to {}",
        collection.features.len(),
        path.display()
    );

    let geojson = GeoJson::from(collection);
    let json_string = serde_json::to_string_pretty(&geojson)?;
    std::fs::write(path, json_string)?;

    Ok(())
}

/// `"{prefix}_{YYYYmmdd_HHMMSS}.{extension}"` in the time's own offset.
pub fn timestamped_filename<Tz>(prefix: &str, extension: &str, time: &DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{prefix}_{}.{extension}", time.format("%Y%m%d_%H%M%S"))
}

/// `dir/name.ext` becomes `dir/name_interrupted.ext`.
pub fn interrupted_filename(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_interrupted.{}", ext.to_string_lossy()),
        None => format!("{stem}_interrupted"),
    };
    path.with_file_name(name)
}
