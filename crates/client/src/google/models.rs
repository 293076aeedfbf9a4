//! Response types for the Google Maps web services.
//!
//! Only the fields the batch jobs read are typed; everything else in a
//! geocoding result is kept in `extra` so it can be printed back out.

use geo::Coord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::PlaceId;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `(longitude, latitude)` coordinate.
    pub fn to_coord(self) -> Coord<f64> {
        Coord {
            x: self.lng,
            y: self.lat,
        }
    }

    pub fn from_coord(coord: Coord<f64>) -> Self {
        Self {
            lat: coord.y,
            lng: coord.x,
        }
    }

    /// `"lat,lng"` as the APIs expect in query strings.
    pub fn to_query(self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Geometry {
    pub location: LatLng,
}

// ============================================================================
// Geocoding
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub geometry: Geometry,
    pub formatted_address: Option<String>,
    pub place_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Directions
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub routes: Vec<DirectionsRoute>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DirectionsRoute {
    pub overview_polyline: EncodedPolyline,
    #[serde(default)]
    pub legs: Vec<Leg>,
    pub summary: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EncodedPolyline {
    pub points: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Leg {
    pub distance: Option<TextValue>,
    pub duration: Option<TextValue>,
    pub duration_in_traffic: Option<TextValue>,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
}

/// Human-readable text plus the raw value (meters or seconds).
#[derive(Clone, Debug, Deserialize)]
pub struct TextValue {
    pub text: String,
    pub value: f64,
}

// ============================================================================
// Places
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
pub struct PlacesNearbyResponse {
    #[serde(default)]
    pub results: Vec<PlaceSummary>,
    pub next_page_token: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlaceSummary {
    pub place_id: PlaceId,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlaceDetailsResponse {
    #[serde(default)]
    pub result: PlaceDetails,
}

/// Place detail fields as returned, keyed by field name.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct PlaceDetails(pub Map<String, Value>);

impl PlaceDetails {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn location(&self) -> Option<LatLng> {
        let location = self.0.get("geometry")?.get("location")?;
        Some(LatLng {
            lat: location.get("lat")?.as_f64()?,
            lng: location.get("lng")?.as_f64()?,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name")?.as_str()
    }
}

// ============================================================================
// Time zone
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimezoneResponse {
    pub time_zone_id: Option<String>,
    pub time_zone_name: Option<String>,
    pub raw_offset: Option<f64>,
    pub dst_offset: Option<f64>,
}
