//! Pluggable route fetching.
//!
//! Anything that can turn a start/destination pair into an encoded polyline
//! implements [`RouteSource`]; the weighted-routes driver never talks to a
//! directions service directly.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

/// Error type returned by route sources.
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// One row of route input: where from, where to, and how much it counts.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RouteRequest {
    pub start: String,
    pub destination: String,
    pub weight: f64,
}

impl RouteRequest {
    pub fn new(start: impl Into<String>, destination: impl Into<String>, weight: f64) -> Self {
        Self {
            start: start.into(),
            destination: destination.into(),
            weight,
        }
    }
}

/// Fetch the encoded geometry of a route
pub trait RouteSource: Send + Sync {
    /// `Ok(None)` means the service answered but found no route.
    fn encoded_route<'a>(
        &'a self,
        request: &'a RouteRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, FetchError>> + Send + 'a>>;
}
