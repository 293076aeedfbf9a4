use geo::Coord;
use geoscout_core::output::{weighted_segments_collection, CollectionInfo};
use geoscout_core::polyline;
use geoscout_core::prelude::*;

fn coord(x: f64, y: f64) -> Coord<f64> {
    Coord { x, y }
}

#[test]
fn test_two_routes_over_the_same_path_merge_into_one_line() {
    let a = coord(120.20, 23.00);
    let b = coord(120.21, 23.00);
    let c = coord(120.22, 23.01);

    let mut weights = SegmentWeights::new();
    weights.add_route(&[a, b, c], 1.0);
    weights.add_route(&[a, b, c], 2.0);

    assert_eq!(weights.len(), 2);
    assert_eq!(weights.weight(a, b), Some(3.0));
    assert_eq!(weights.weight(b, c), Some(3.0));

    let merged = merge_segments(&weights);
    assert_eq!(
        merged,
        vec![MergedSegment {
            coordinates: vec![a, b, c],
            weight: 3.0,
            segment_count: 2,
        }]
    );
}

#[test]
fn test_decoded_routes_feed_the_merge() {
    // Two overlapping decoded routes: the shared prefix gets double weight
    let long = polyline::encode(&[
        coord(120.20, 23.00),
        coord(120.21, 23.00),
        coord(120.22, 23.00),
        coord(120.23, 23.01),
    ]);
    let short = polyline::encode(&[coord(120.20, 23.00), coord(120.21, 23.00), coord(120.22, 23.00)]);

    let mut weights = SegmentWeights::new();
    weights.add_route(&polyline::decode(&long).unwrap(), 1.0);
    weights.add_route(&polyline::decode(&short).unwrap(), 1.0);

    let merged = merge_segments(&weights);
    let total: usize = merged.iter().map(|m| m.segment_count).sum();
    assert_eq!(total, weights.len());
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].weight, 2.0);
    assert_eq!(merged[0].segment_count, 2);
    assert_eq!(merged[1].weight, 1.0);
    assert_eq!(merged[1].segment_count, 1);
}

#[test]
fn test_merged_output_as_geojson() {
    let mut weights = SegmentWeights::new();
    weights.add_route(&[coord(0.0, 0.0), coord(1.0, 0.0), coord(1.0, 1.0)], 1.5);

    let merged = merge_segments(&weights);
    let created_at = chrono::DateTime::parse_from_rfc3339("2025-01-02T03:04:05+08:00").unwrap();
    let collection =
        weighted_segments_collection(&merged, &CollectionInfo::new("weighted_routes", created_at));

    assert_eq!(collection.features.len(), 1);
    let properties = collection.features[0].properties.as_ref().unwrap();
    assert_eq!(properties["weight"], 1.5);
    assert_eq!(properties["segment_count"], 2);
}
