//! Google Maps web service client.
//!
//! Every JSON endpoint answers HTTP 200 with a `status` field; anything other
//! than `OK` or `ZERO_RESULTS` is turned into [`ClientError::Api`]. Transient
//! failures are retried according to the client's [`RetryPolicy`].

pub mod models;

use std::future::Future;
use std::pin::Pin;

use geoscout_core::routes::{FetchError, RouteRequest, RouteSource};
use serde::de::DeserializeOwned;
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::{ClientError, Result};
use crate::identifiers::PlaceId;
use crate::retry::RetryPolicy;

pub use models::*;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

/// Directions travel mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Bicycling,
    Transit,
}

/// Street View image parameters. Angles are in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreetViewRequest {
    pub location: LatLng,
    pub heading: f64,
    pub pitch: f64,
    pub fov: f64,
    pub width: u32,
    pub height: u32,
}

impl StreetViewRequest {
    /// Unique file name for the image this request produces.
    pub fn file_name(&self) -> String {
        format!(
            "{:.6}_{:.6}_{}_{}_{}.jpg",
            self.location.lat, self.location.lng, self.heading, self.pitch, self.fov
        )
    }
}

#[derive(Clone, Debug)]
pub struct StreetViewImage {
    pub content_type: String,
    pub bytes: bytes::Bytes,
}

pub struct GoogleMapsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GoogleMapsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.url(path);
        let (http, url, key) = (&self.http, url.as_str(), self.api_key.as_str());
        self.retry
            .run(|| async move {
                let body: Value = http
                    .get(url)
                    .query(params)
                    .query(&[("key", key)])
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                check_status(&body)?;
                Ok(serde_json::from_value(body)?)
            })
            .await
    }

    /// Geocode a free-form address.
    pub async fn geocode(&self, address: &str) -> Result<Vec<GeocodeResult>> {
        log::debug!("Geocoding {address}");
        let response: GeocodeResponse = self
            .get_json("geocode/json", &[("address", address.to_string())])
            .await?;
        Ok(response.results)
    }

    /// Location of the best geocoding match, if any.
    pub async fn locate(&self, address: &str) -> Result<Option<LatLng>> {
        Ok(self
            .geocode(address)
            .await?
            .first()
            .map(|r| r.geometry.location))
    }

    /// Routes between two places; `departure_time` is Unix seconds.
    pub async fn directions(
        &self,
        origin: &str,
        destination: &str,
        mode: TravelMode,
        departure_time: Option<i64>,
    ) -> Result<Vec<DirectionsRoute>> {
        log::debug!("Requesting {mode} directions from {origin} to {destination}");
        let mut params = vec![
            ("origin", origin.to_string()),
            ("destination", destination.to_string()),
            ("mode", mode.to_string()),
        ];
        if let Some(t) = departure_time {
            params.push(("departure_time", t.to_string()));
        }

        let response: DirectionsResponse = self.get_json("directions/json", &params).await?;
        Ok(response.routes)
    }

    /// Nearby search ranked by distance. Pass the previous response's
    /// `next_page_token` to fetch the following page.
    pub async fn places_nearby(
        &self,
        location: LatLng,
        keyword: &str,
        page_token: Option<&str>,
    ) -> Result<PlacesNearbyResponse> {
        let mut params = vec![
            ("location", location.to_query()),
            ("keyword", keyword.to_string()),
            ("rankby", "distance".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pagetoken", token.to_string()));
        }

        self.get_json("place/nearbysearch/json", &params).await
    }

    /// Detail fields for one place.
    pub async fn place_details(&self, place_id: &PlaceId, fields: &[&str]) -> Result<PlaceDetails> {
        log::debug!("Requesting details for place_id: {place_id}");
        let response: PlaceDetailsResponse = self
            .get_json(
                "place/details/json",
                &[
                    ("place_id", place_id.to_string()),
                    ("fields", fields.join(",")),
                ],
            )
            .await?;
        Ok(response.result)
    }

    /// IANA time zone id at a location and Unix timestamp.
    pub async fn timezone(&self, location: LatLng, timestamp: i64) -> Result<String> {
        let response: TimezoneResponse = self
            .get_json(
                "timezone/json",
                &[
                    ("location", location.to_query()),
                    ("timestamp", timestamp.to_string()),
                ],
            )
            .await?;
        response
            .time_zone_id
            .ok_or_else(|| ClientError::UnexpectedResponse("no time zone for location".to_string()))
    }

    /// Fetch one Street View image.
    pub async fn streetview(&self, request: &StreetViewRequest) -> Result<StreetViewImage> {
        let url = self.url("streetview");
        let params = [
            ("size", format!("{}x{}", request.width, request.height)),
            ("location", request.location.to_query()),
            ("heading", request.heading.to_string()),
            ("fov", request.fov.to_string()),
            ("pitch", request.pitch.to_string()),
            ("return_error_code", "true".to_string()),
        ];

        let (http, url, key, params) = (&self.http, url.as_str(), self.api_key.as_str(), &params);
        self.retry
            .run(|| async move {
                let response = http
                    .get(url)
                    .query(params)
                    .query(&[("key", key)])
                    .send()
                    .await?
                    .error_for_status()?;

                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let bytes = response.bytes().await?;

                image_or_error(content_type, bytes)
            })
            .await
    }
}

/// Map a JSON body's `status` to an error unless it is `OK` or `ZERO_RESULTS`.
fn check_status(body: &Value) -> Result<()> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::UnexpectedResponse("response has no status".to_string()))?;

    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        other => Err(ClientError::Api {
            status: other.to_string(),
            message: body
                .get("error_message")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
    }
}

/// Street View answers with an image, or with a JSON error body.
fn image_or_error(content_type: String, bytes: bytes::Bytes) -> Result<StreetViewImage> {
    if content_type.starts_with("image/") {
        return Ok(StreetViewImage {
            content_type,
            bytes,
        });
    }

    let body: Value = serde_json::from_slice(&bytes).map_err(|_| {
        ClientError::UnexpectedResponse(format!("expected an image, got {content_type:?}"))
    })?;
    check_status(&body)?;
    match body.get("error_message").and_then(Value::as_str) {
        Some(message) => Err(ClientError::Api {
            status: "ERROR".to_string(),
            message: Some(message.to_string()),
        }),
        None => Err(ClientError::UnexpectedResponse(format!(
            "expected an image, got {content_type:?}"
        ))),
    }
}

/// [`RouteSource`] backed by the Directions API.
pub struct DirectionsSource<'a> {
    client: &'a GoogleMapsClient,
    mode: TravelMode,
    departure_time: Option<i64>,
}

impl<'a> DirectionsSource<'a> {
    pub fn new(client: &'a GoogleMapsClient, mode: TravelMode, departure_time: Option<i64>) -> Self {
        Self {
            client,
            mode,
            departure_time,
        }
    }
}

impl RouteSource for DirectionsSource<'_> {
    fn encoded_route<'a>(
        &'a self,
        request: &'a RouteRequest,
    ) -> Pin<Box<dyn Future<Output = std::result::Result<Option<String>, FetchError>> + Send + 'a>>
    {
        Box::pin(async move {
            let routes = self
                .client
                .directions(
                    &request.start,
                    &request.destination,
                    self.mode,
                    self.departure_time,
                )
                .await?;
            Ok(routes.into_iter().next().map(|r| r.overview_polyline.points))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_status() {
        assert!(check_status(&json!({"status": "OK"})).is_ok());
        assert!(check_status(&json!({"status": "ZERO_RESULTS"})).is_ok());

        let err = check_status(&json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Api { ref status, message: Some(_) } if status == "REQUEST_DENIED"
        ));
        assert!(!err.is_retryable());

        assert!(check_status(&json!({"status": "UNKNOWN_ERROR"}))
            .unwrap_err()
            .is_retryable());
        assert!(matches!(
            check_status(&json!({"results": []})),
            Err(ClientError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_travel_mode_parsing() {
        assert_eq!("driving".parse::<TravelMode>().unwrap(), TravelMode::Driving);
        assert_eq!("Transit".parse::<TravelMode>().unwrap(), TravelMode::Transit);
        assert_eq!(TravelMode::Bicycling.to_string(), "bicycling");
        assert!("flying".parse::<TravelMode>().is_err());
    }

    #[test]
    fn test_streetview_file_name() {
        let request = StreetViewRequest {
            location: LatLng::new(23.021248, 120.202918),
            heading: 30.0,
            pitch: 0.0,
            fov: 90.0,
            width: 640,
            height: 640,
        };
        assert_eq!(request.file_name(), "23.021248_120.202918_30_0_90.jpg");
    }

    #[test]
    fn test_image_or_error() {
        let image = image_or_error("image/jpeg".to_string(), bytes::Bytes::from_static(b"\xff\xd8"))
            .unwrap();
        assert_eq!(image.bytes.len(), 2);

        let denied = image_or_error(
            "application/json".to_string(),
            bytes::Bytes::from_static(br#"{"status": "REQUEST_DENIED", "error_message": "bad key"}"#),
        );
        assert!(matches!(denied, Err(ClientError::Api { .. })));

        let garbage = image_or_error("text/html".to_string(), bytes::Bytes::from_static(b"<html>"));
        assert!(matches!(garbage, Err(ClientError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_base_url_is_normalised() {
        let client = GoogleMapsClient::new("key").with_base_url("http://localhost:8080/maps/api/");
        assert_eq!(client.url("geocode/json"), "http://localhost:8080/maps/api/geocode/json");
    }

    #[tokio::test]
    async fn test_without_retry_fails_after_one_attempt() {
        let client = GoogleMapsClient::new("key")
            .with_base_url("http://127.0.0.1:9")
            .with_retry(RetryPolicy::none());

        let err = client.geocode("台南火車站").await.unwrap_err();
        assert!(matches!(err, ClientError::RetriesExhausted { attempts: 1, .. }));
    }
}
