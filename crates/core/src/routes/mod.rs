//! Weighted route aggregation.
//!
//! Routes are processed strictly one after another: fetch the encoded
//! geometry, decode it, fold its segments into the weight table. A route that
//! fails at any step is logged and skipped; the batch always runs to the end.

pub mod source;

pub use source::{FetchError, RouteRequest, RouteSource};

use crate::error::DecodeError;
use crate::polyline;
use crate::segments::{merge_segments, MergedSegment, SegmentWeights};

/// What happened to a route that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Decoded and folded into the weight table.
    Added { points: usize },
    /// The source answered but had no route.
    NoRoute,
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Failed to fetch route: {0}")]
    Fetch(#[source] FetchError),

    #[error("Failed to decode route geometry: {0}")]
    Decode(#[from] DecodeError),
}

/// Weight table plus the per-route outcomes, in input order.
#[derive(Debug, Default)]
pub struct WeightedRun {
    pub weights: SegmentWeights,
    pub outcomes: Vec<Result<RouteOutcome, RouteError>>,
}

impl WeightedRun {
    pub fn added(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Ok(RouteOutcome::Added { .. })))
            .count()
    }

    pub fn no_route(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Ok(RouteOutcome::NoRoute)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }

    /// Run the merge pass over the finished table.
    pub fn merge(&self) -> Vec<MergedSegment> {
        merge_segments(&self.weights)
    }
}

async fn process_route<S>(
    source: &S,
    request: &RouteRequest,
    weights: &mut SegmentWeights,
) -> Result<RouteOutcome, RouteError>
where
    S: RouteSource + ?Sized,
{
    let Some(encoded) = source
        .encoded_route(request)
        .await
        .map_err(RouteError::Fetch)?
    else {
        return Ok(RouteOutcome::NoRoute);
    };

    let coordinates = polyline::decode(&encoded)?;
    weights.add_route(&coordinates, request.weight);

    Ok(RouteOutcome::Added {
        points: coordinates.len(),
    })
}

/// Fetch, decode and accumulate every request in order.
pub async fn aggregate_routes<S>(source: &S, requests: &[RouteRequest]) -> WeightedRun
where
    S: RouteSource + ?Sized,
{
    let mut run = WeightedRun::default();

    for request in requests {
        let outcome = process_route(source, request, &mut run.weights).await;

        match &outcome {
            Ok(RouteOutcome::Added { points }) => log::info!(
                "Processed route: {} to {} ({} points)",
                request.start,
                request.destination,
                points
            ),
            Ok(RouteOutcome::NoRoute) => log::warn!(
                "No route found for {} to {}. Skipping...",
                request.start,
                request.destination
            ),
            Err(e) => log::error!(
                "Error processing route from {} to {}: {}",
                request.start,
                request.destination,
                e
            ),
        }

        run.outcomes.push(outcome);
    }

    log::info!(
        "Aggregated {} routes into {} segments ({} without route, {} failed)",
        run.added(),
        run.weights.len(),
        run.no_route(),
        run.failed()
    );

    run
}
