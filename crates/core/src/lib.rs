//! # geoscout-core
//!
//! Geometry and aggregation building blocks for the geoscout batch jobs.
//!
//! ## Features
//!
//! - **Polyline codec**: Google's encoded polyline format, decoded into
//!   `(longitude, latitude)` coordinates
//! - **Weighted segments**: fold many routes into per-segment weights and
//!   merge equal-weight chains into longer lines
//! - **Pluggable routing**: implement [`RouteSource`] to feed routes from any
//!   directions service
//! - **Output**: GeoJSON collections and timestamped filenames
//!
//! ## Example
//!
//! ```
//! use geoscout_core::prelude::*;
//! use geo::Coord;
//!
//! let a = Coord { x: 120.20, y: 23.00 };
//! let b = Coord { x: 120.21, y: 23.00 };
//! let c = Coord { x: 120.22, y: 23.01 };
//!
//! let mut weights = SegmentWeights::new();
//! weights.add_route(&[a, b, c], 1.0);
//! weights.add_route(&[a, b, c], 2.0);
//!
//! let merged = merge_segments(&weights);
//! assert_eq!(merged.len(), 1);
//! assert_eq!(merged[0].coordinates, vec![a, b, c]);
//! assert_eq!(merged[0].segment_count, 2);
//! ```

pub mod error;
pub mod output;
pub mod polyline;
pub mod routes;
pub mod segments;
pub mod spatial;
pub mod text;

pub mod prelude {
    pub use crate::error::{DecodeError, Error, Result};
    pub use crate::output::{CollectionInfo, PlaceRecord, RouteRecord};
    pub use crate::routes::{
        aggregate_routes, FetchError, RouteError, RouteOutcome, RouteRequest, RouteSource,
        WeightedRun,
    };
    pub use crate::segments::{
        merge_segments, segment_key, MergedSegment, SegmentKey, SegmentWeights,
    };
}

pub use prelude::*;
