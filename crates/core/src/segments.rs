//! Weighted route segments.
//!
//! Routes are folded into a table keyed by undirected elementary segments
//! (one edge between two consecutive route coordinates). Each route adds its
//! weight to every segment it traverses. Once all routes are in, the merge
//! pass coalesces chains of adjacent segments that ended up with the same
//! weight into longer lines.
//!
//! ## Merge semantics
//!
//! Adjacency requires exact coordinate equality, whereas weights only have to
//! agree within [`WEIGHT_TOLERANCE`]. The merge is greedy and depends on the
//! table's insertion order: when several candidates could extend a chain, the
//! first inserted wins. Output is therefore only invariant up to coverage
//! (every segment lands in exactly one chain) and weight agreement inside a
//! chain, not up to exact chain identity across different route orders.
//!
//! Each extension rescans the whole table from the top, so the pass is
//! quadratic in the number of distinct segments at best. That is fine for a
//! few hundred routes; larger inputs would want an endpoint index.

use std::collections::VecDeque;

use geo::Coord;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;

/// Two weights closer than this are considered equal when merging.
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// Exact-value key for one coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoordKey {
    x: OrderedFloat<f64>,
    y: OrderedFloat<f64>,
}

impl From<Coord<f64>> for CoordKey {
    fn from(coord: Coord<f64>) -> Self {
        Self {
            x: OrderedFloat(coord.x),
            y: OrderedFloat(coord.y),
        }
    }
}

/// Order-independent identifier of an elementary segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentKey(CoordKey, CoordKey);

impl SegmentKey {
    pub fn new(a: Coord<f64>, b: Coord<f64>) -> Self {
        let (a, b) = (CoordKey::from(a), CoordKey::from(b));
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Shorthand for [`SegmentKey::new`].
pub fn segment_key(a: Coord<f64>, b: Coord<f64>) -> SegmentKey {
    SegmentKey::new(a, b)
}

/// Accumulated weight of one segment, with its endpoints in the orientation
/// of the first route that traversed it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentEntry {
    pub start: Coord<f64>,
    pub end: Coord<f64>,
    pub weight: f64,
}

/// Segment weight table, built once from all routes and then merged.
#[derive(Clone, Debug, Default)]
pub struct SegmentWeights {
    entries: IndexMap<SegmentKey, SegmentEntry>,
}

impl SegmentWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `weight` to every segment between consecutive `coordinates`.
    ///
    /// Routes with fewer than two coordinates have no segments and are a
    /// no-op. Weights are summed as given; sign is not checked.
    pub fn add_route(&mut self, coordinates: &[Coord<f64>], weight: f64) {
        for pair in coordinates.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            self.entries
                .entry(SegmentKey::new(start, end))
                .or_insert(SegmentEntry {
                    start,
                    end,
                    weight: 0.0,
                })
                .weight += weight;
        }
    }

    /// Number of distinct segments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accumulated weight of the segment between `a` and `b`, in either
    /// direction.
    pub fn weight(&self, a: Coord<f64>, b: Coord<f64>) -> Option<f64> {
        self.entries.get(&SegmentKey::new(a, b)).map(|e| e.weight)
    }

    pub fn get(&self, key: &SegmentKey) -> Option<&SegmentEntry> {
        self.entries.get(key)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&SegmentKey, &SegmentEntry)> {
        self.entries.iter()
    }
}

/// A chain of equal-weight elementary segments.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedSegment {
    pub coordinates: Vec<Coord<f64>>,
    pub weight: f64,
    pub segment_count: usize,
}

/// Coalesce adjacent equal-weight segments into chains.
///
/// Every segment in `weights` ends up in exactly one returned chain.
pub fn merge_segments(weights: &SegmentWeights) -> Vec<MergedSegment> {
    let entries: Vec<&SegmentEntry> = weights.entries.values().collect();
    let mut processed = vec![false; entries.len()];
    let mut merged = Vec::new();

    for seed in 0..entries.len() {
        if processed[seed] {
            continue;
        }
        processed[seed] = true;

        let weight = entries[seed].weight;
        let mut chain = VecDeque::from([entries[seed].start, entries[seed].end]);

        while let Some(candidate) = find_extension(&entries, &processed, &chain, weight) {
            processed[candidate.index] = true;
            match candidate.side {
                Side::Tail => chain.push_back(entries[candidate.index].end),
                Side::Head => chain.push_front(entries[candidate.index].start),
            }
        }

        let coordinates: Vec<Coord<f64>> = chain.into();
        let segment_count = coordinates.len() - 1;
        merged.push(MergedSegment {
            coordinates,
            weight,
            segment_count,
        });
    }

    log::debug!(
        "Merged {} segments into {} chains",
        entries.len(),
        merged.len()
    );

    merged
}

enum Side {
    Head,
    Tail,
}

struct Extension {
    index: usize,
    side: Side,
}

/// First unprocessed entry with a matching weight that attaches to either
/// end of `chain`.
fn find_extension(
    entries: &[&SegmentEntry],
    processed: &[bool],
    chain: &VecDeque<Coord<f64>>,
    weight: f64,
) -> Option<Extension> {
    let (Some(&head), Some(&tail)) = (chain.front(), chain.back()) else {
        return None;
    };

    entries
        .iter()
        .enumerate()
        .filter(|(index, entry)| {
            !processed[*index] && (entry.weight - weight).abs() < WEIGHT_TOLERANCE
        })
        .find_map(|(index, entry)| {
            if entry.start == tail {
                Some(Extension {
                    index,
                    side: Side::Tail,
                })
            } else if entry.end == head {
                Some(Extension {
                    index,
                    side: Side::Head,
                })
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn coord(x: f64, y: f64) -> Coord<f64> {
        Coord { x, y }
    }

    fn total_segment_count(merged: &[MergedSegment]) -> usize {
        merged.iter().map(|m| m.segment_count).sum()
    }

    #[test]
    fn test_segment_key_symmetry() {
        let a = coord(120.2, 23.0);
        let b = coord(120.3, 22.9);
        assert_eq!(segment_key(a, b), segment_key(b, a));
        assert_ne!(segment_key(a, b), segment_key(a, coord(120.3, 23.0)));
    }

    #[test]
    fn test_weights_accumulate_across_routes() {
        let (a, b, c) = (coord(0.0, 0.0), coord(1.0, 0.0), coord(2.0, 0.0));
        let mut weights = SegmentWeights::new();
        weights.add_route(&[a, b, c], 1.0);
        weights.add_route(&[a, b, c], 2.0);

        assert_eq!(weights.len(), 2);
        assert_relative_eq!(weights.weight(a, b).unwrap(), 3.0);
        assert_relative_eq!(weights.weight(c, b).unwrap(), 3.0);
    }

    #[test]
    fn test_first_seen_orientation_is_kept() {
        let (a, b) = (coord(5.0, 5.0), coord(1.0, 1.0));
        let mut weights = SegmentWeights::new();
        weights.add_route(&[a, b], 1.0);
        weights.add_route(&[b, a], 1.0);

        let entry = weights.get(&segment_key(a, b)).unwrap();
        assert_eq!(entry.start, a);
        assert_eq!(entry.end, b);
        assert_relative_eq!(entry.weight, 2.0);
    }

    #[test]
    fn test_short_routes_add_nothing() {
        let mut weights = SegmentWeights::new();
        weights.add_route(&[coord(1.0, 1.0)], 5.0);
        weights.add_route(&[], 5.0);
        assert!(weights.is_empty());
        assert!(merge_segments(&weights).is_empty());
    }

    #[test]
    fn test_shared_route_merges_into_one_chain() {
        let (a, b, c) = (coord(0.0, 0.0), coord(1.0, 0.0), coord(2.0, 0.0));
        let mut weights = SegmentWeights::new();
        weights.add_route(&[a, b, c], 1.0);
        weights.add_route(&[a, b, c], 2.0);

        let merged = merge_segments(&weights);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].coordinates, vec![a, b, c]);
        assert_relative_eq!(merged[0].weight, 3.0);
        assert_eq!(merged[0].segment_count, 2);
    }

    #[test]
    fn test_extends_at_head() {
        let (a, b, c) = (coord(0.0, 0.0), coord(1.0, 0.0), coord(2.0, 0.0));
        let mut weights = SegmentWeights::new();
        weights.add_route(&[b, c], 1.0);
        weights.add_route(&[a, b], 1.0);

        let merged = merge_segments(&weights);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].coordinates, vec![a, b, c]);
    }

    #[test]
    fn test_weight_tolerance() {
        let (a, b, c) = (coord(0.0, 0.0), coord(1.0, 0.0), coord(2.0, 0.0));

        let mut close = SegmentWeights::new();
        close.add_route(&[a, b], 1.0);
        close.add_route(&[b, c], 1.0009);
        assert_eq!(merge_segments(&close).len(), 1);

        let mut apart = SegmentWeights::new();
        apart.add_route(&[a, b], 1.0);
        apart.add_route(&[b, c], 1.002);
        assert_eq!(merge_segments(&apart).len(), 2);
    }

    #[test]
    fn test_adjacency_requires_exact_coordinates() {
        let mut weights = SegmentWeights::new();
        weights.add_route(&[coord(0.0, 0.0), coord(1.0, 0.0)], 1.0);
        weights.add_route(&[coord(1.000001, 0.0), coord(2.0, 0.0)], 1.0);
        assert_eq!(merge_segments(&weights).len(), 2);
    }

    #[test]
    fn test_reversed_neighbour_does_not_attach() {
        // b->a is stored against the chain's direction, so neither its start
        // matches the tail nor its end matches the head
        let (a, b, c) = (coord(0.0, 0.0), coord(1.0, 0.0), coord(2.0, 0.0));
        let mut weights = SegmentWeights::new();
        weights.add_route(&[b, c], 1.0);
        weights.add_route(&[b, a], 1.0);
        assert_eq!(merge_segments(&weights).len(), 2);
    }

    #[test]
    fn test_iter_follows_insertion_order() {
        let (a, b, c) = (coord(9.0, 9.0), coord(1.0, 1.0), coord(5.0, 5.0));
        let mut weights = SegmentWeights::new();
        weights.add_route(&[a, b], 1.0);
        weights.add_route(&[c, a], 2.0);
        weights.add_route(&[b, a], 1.0);

        let entries: Vec<_> = weights.iter().map(|(_, e)| *e).collect();
        assert_eq!(
            entries,
            vec![
                SegmentEntry { start: a, end: b, weight: 2.0 },
                SegmentEntry { start: c, end: a, weight: 2.0 },
            ]
        );
    }

    #[test]
    fn test_first_inserted_candidate_wins() {
        // b->c and b->d both continue the a->b chain; the earlier one is taken
        let (a, b) = (coord(0.0, 0.0), coord(1.0, 0.0));
        let (c, d) = (coord(2.0, 0.0), coord(1.0, 1.0));

        let mut weights = SegmentWeights::new();
        weights.add_route(&[a, b, c], 1.0);
        weights.add_route(&[b, d], 1.0);
        let merged = merge_segments(&weights);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].coordinates, vec![a, b, c]);
        assert_eq!(merged[1].coordinates, vec![b, d]);

        let mut swapped = SegmentWeights::new();
        swapped.add_route(&[a, b, d], 1.0);
        swapped.add_route(&[b, c], 1.0);
        let merged = merge_segments(&swapped);
        assert_eq!(merged[0].coordinates, vec![a, b, d]);
        assert_eq!(merged[1].coordinates, vec![b, c]);
    }

    #[test]
    fn test_coverage_and_weight_conservation() {
        let mut weights = SegmentWeights::new();
        let trunk: Vec<_> = (0..6).map(|i| coord(i as f64, 0.0)).collect();
        let branch = vec![coord(2.0, 0.0), coord(2.0, 1.0), coord(2.0, 2.0)];
        let spur = vec![coord(4.0, 0.0), coord(4.0, -1.0)];

        weights.add_route(&trunk, 1.0);
        weights.add_route(&trunk[..3], 0.5);
        weights.add_route(&branch, 2.0);
        weights.add_route(&spur, 1.0);

        let merged = merge_segments(&weights);
        assert_eq!(total_segment_count(&merged), weights.len());

        for chain in &merged {
            assert_eq!(chain.segment_count, chain.coordinates.len() - 1);
            for pair in chain.coordinates.windows(2) {
                let w = weights.weight(pair[0], pair[1]).unwrap();
                assert!((w - chain.weight).abs() < WEIGHT_TOLERANCE);
            }
        }
    }
}
