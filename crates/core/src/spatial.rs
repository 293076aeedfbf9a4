//! Distance and sampling helpers for geographic coordinates.
//!
//! Uses the Haversine formula for distances on Earth's surface. All
//! coordinates are `(longitude, latitude)` in degrees.

use geo::{Coord, HaversineDistance, Point};

use crate::error::{Error, Result};

/// Kilometres spanned by one degree of latitude, as used for grid spacing.
const KM_PER_DEGREE: f64 = 111.0;

/// Haversine distance between two coordinates in meters
pub fn haversine_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Point::from(a).haversine_distance(&Point::from(b))
}

/// Total length of a path in meters
pub fn path_length_m(coords: &[Coord<f64>]) -> f64 {
    coords.windows(2).map(|w| haversine_m(w[0], w[1])).sum()
}

/// Search points on a regular lattice around `center`.
///
/// The center comes first. The lattice spacing is `density_km` in both
/// directions (longitude spacing is widened by `1 / cos(latitude)`), and only
/// points within `max_radius_km` of the center are kept.
pub fn generate_grid_points(
    center: Coord<f64>,
    max_radius_km: f64,
    density_km: f64,
) -> Result<Vec<Coord<f64>>> {
    if !(max_radius_km.is_finite() && max_radius_km >= 0.0) {
        return Err(Error::InvalidParameter(format!(
            "search radius must be a non-negative number of km, got {max_radius_km}"
        )));
    }
    if !(density_km.is_finite() && density_km > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "grid density must be a positive number of km, got {density_km}"
        )));
    }

    let lat_step = density_km / KM_PER_DEGREE;
    let lng_step = density_km / (KM_PER_DEGREE * center.y.to_radians().cos());
    let steps = (max_radius_km / density_km) as i64;
    let radius_m = max_radius_km * 1000.0;

    let mut points = vec![center];
    for i in -steps..=steps {
        for j in -steps..=steps {
            if i == 0 && j == 0 {
                continue;
            }
            let point = Coord {
                x: center.x + j as f64 * lng_step,
                y: center.y + i as f64 * lat_step,
            };
            if haversine_m(center, point) <= radius_m {
                points.push(point);
            }
        }
    }

    Ok(points)
}

/// Sample a path every `interval_m` meters of travelled distance.
///
/// The first coordinate is always included. Distance carries over between
/// segments, and each sample is linearly interpolated on the segment where
/// the running distance crosses the interval.
pub fn interpolate_points(coords: &[Coord<f64>], interval_m: f64) -> Result<Vec<Coord<f64>>> {
    if !(interval_m.is_finite() && interval_m > 0.0) {
        return Err(Error::InvalidParameter(format!(
            "sampling interval must be a positive number of meters, got {interval_m}"
        )));
    }

    let Some(&first) = coords.first() else {
        return Ok(Vec::new());
    };

    let mut samples = vec![first];
    let mut accumulated = 0.0;

    for w in coords.windows(2) {
        let (start, end) = (w[0], w[1]);
        let segment = haversine_m(start, end);
        accumulated += segment;

        while accumulated >= interval_m {
            let fraction = 1.0 - (accumulated - interval_m) / segment;
            samples.push(Coord {
                x: start.x + (end.x - start.x) * fraction,
                y: start.y + (end.y - start.y) * fraction,
            });
            accumulated -= interval_m;
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        // Taipei Main Station to Tainan Station is roughly 260 km
        let taipei = Coord { x: 121.5170, y: 25.0478 };
        let tainan = Coord { x: 120.2125, y: 22.9971 };

        let dist = haversine_m(taipei, tainan);
        assert!((dist - 260_000.0).abs() < 20_000.0);
    }

    #[test]
    fn test_grid_center_first_and_within_radius() {
        let center = Coord { x: 120.2125, y: 22.9971 };
        let points = generate_grid_points(center, 1.0, 0.3).unwrap();

        assert_eq!(points[0], center);
        assert!(points.len() > 1);
        for p in &points {
            assert!(haversine_m(center, *p) <= 1000.0);
        }
    }

    #[test]
    fn test_grid_excludes_corners() {
        // With radius == spacing, at most the four axis neighbours can fit
        // inside the circle
        let center = Coord { x: 0.0, y: 0.0 };
        let points = generate_grid_points(center, 1.0, 1.0).unwrap();
        assert!(points.len() <= 5);
        assert_eq!(points[0], center);
    }

    #[test]
    fn test_grid_rejects_bad_density() {
        let center = Coord { x: 0.0, y: 0.0 };
        assert!(generate_grid_points(center, 1.0, 0.0).is_err());
        assert!(generate_grid_points(center, 1.0, f64::NAN).is_err());
        assert!(generate_grid_points(center, -1.0, 0.3).is_err());
    }

    #[test]
    fn test_interpolation_spacing() {
        // ~1.11 km per 0.01 degree of latitude
        let path = vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.1 }];
        let total = path_length_m(&path);
        let samples = interpolate_points(&path, 1000.0).unwrap();

        assert_eq!(samples[0], path[0]);
        assert_eq!(samples.len(), 1 + (total / 1000.0) as usize);
        for w in samples.windows(2) {
            assert!((haversine_m(w[0], w[1]) - 1000.0).abs() < 1.0);
        }
    }

    #[test]
    fn test_interpolation_carries_remainder() {
        // Two 600 m legs: the first sample falls 400 m into the second leg
        let a = Coord { x: 0.0, y: 0.0 };
        let step = 600.0 / haversine_m(a, Coord { x: 0.0, y: 1.0 });
        let b = Coord { x: 0.0, y: step };
        let c = Coord { x: 0.0, y: 2.0 * step };

        let samples = interpolate_points(&[a, b, c], 1000.0).unwrap();
        assert_eq!(samples.len(), 2);
        assert!((haversine_m(a, samples[1]) - 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_interpolation_edge_cases() {
        assert!(interpolate_points(&[], 100.0).unwrap().is_empty());
        let single = [Coord { x: 1.0, y: 1.0 }];
        assert_eq!(interpolate_points(&single, 100.0).unwrap(), single.to_vec());
        assert!(interpolate_points(&single, 0.0).is_err());
    }
}
