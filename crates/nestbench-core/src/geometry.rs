//! Planar geometry for the spatial ("nazotte") search
//!
//! Coordinates are treated as a flat plane: latitude is the x axis and
//! longitude the y axis. The search regions involved are a few hundred metres
//! wide, so curvature is irrelevant.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A geographic coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn cmp_xy(&self, other: &Self) -> Ordering {
        self.latitude
            .total_cmp(&other.latitude)
            .then_with(|| self.longitude.total_cmp(&other.longitude))
    }
}

/// Axis-aligned bounds of a point set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl BoundingBox {
    /// Inclusive containment
    pub fn contains(&self, point: &Point) -> bool {
        (self.top_left.latitude..=self.bottom_right.latitude).contains(&point.latitude)
            && (self.top_left.longitude..=self.bottom_right.longitude).contains(&point.longitude)
    }
}

/// Z component of (a - o) x (b - o). Positive for a counter-clockwise turn.
fn cross(o: &Point, a: &Point, b: &Point) -> f64 {
    (a.latitude - o.latitude) * (b.longitude - o.longitude)
        - (a.longitude - o.longitude) * (b.latitude - o.latitude)
}

/// Monotone-chain convex hull.
///
/// Returns the hull vertices in counter-clockwise order starting from the
/// lowest point, without repeating the first vertex. Collinear points on an
/// edge are dropped. Inputs with fewer than three distinct points are returned
/// sorted and deduplicated.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(Point::cmp_xy);
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let mut hull: Vec<Point> = Vec::with_capacity(sorted.len() * 2);

    // lower
    for p in &sorted {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }

    // upper
    let lower_len = hull.len() + 1;
    for p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(*p);
    }

    hull.pop();
    hull
}

/// The four points offset by `epsilon` along each axis around `point`
pub fn neighbors(point: &Point, epsilon: f64) -> [Point; 4] {
    [
        Point::new(point.latitude - epsilon, point.longitude),
        Point::new(point.latitude + epsilon, point.longitude),
        Point::new(point.latitude, point.longitude - epsilon),
        Point::new(point.latitude, point.longitude + epsilon),
    ]
}

/// Close a hull into a ring by repeating its first vertex, as the spatial
/// search endpoint expects
pub fn to_polygon(hull: &[Point]) -> Vec<Point> {
    let mut ring = hull.to_vec();
    if let Some(first) = hull.first() {
        ring.push(*first);
    }
    ring
}

/// Bounds of `points`, or `None` if empty
pub fn bounding_box(points: &[Point]) -> Option<BoundingBox> {
    let first = points.first()?;
    let mut top_left = *first;
    let mut bottom_right = *first;
    for p in &points[1..] {
        top_left.latitude = top_left.latitude.min(p.latitude);
        top_left.longitude = top_left.longitude.min(p.longitude);
        bottom_right.latitude = bottom_right.latitude.max(p.latitude);
        bottom_right.longitude = bottom_right.longitude.max(p.longitude);
    }
    Some(BoundingBox {
        top_left,
        bottom_right,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Containment test for a counter-clockwise convex polygon. Points on an
    /// edge count as inside.
    fn contains(hull: &[Point], point: &Point) -> bool {
        let n = hull.len();
        (0..n).all(|i| cross(&hull[i], &hull[(i + 1) % n], point) >= -1e-12)
    }

    fn strictly_contains(hull: &[Point], point: &Point) -> bool {
        let n = hull.len();
        (0..n).all(|i| cross(&hull[i], &hull[(i + 1) % n], point) > 0.0)
    }

    #[test]
    fn test_square_with_interior_point() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
            Point::new(0.5, 0.5),
            Point::new(1.0, 0.0),
        ];
        let hull = convex_hull(&points);
        assert_eq!(
            hull,
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ]
        );
    }

    #[test]
    fn test_collinear_points_are_dropped() {
        let points: Vec<Point> = (0..5).map(|i| Point::new(i as f64, 0.0)).collect();
        let hull = convex_hull(&points);
        assert_eq!(hull, vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0)]);
    }

    #[test]
    fn test_small_inputs() {
        assert!(convex_hull(&[]).is_empty());
        let p = Point::new(1.0, 2.0);
        assert_eq!(convex_hull(&[p, p]), vec![p]);
    }

    #[test]
    fn test_neighbors_and_polygon_ring() {
        let around = neighbors(&Point::new(35.0, 139.0), 0.5);
        let hull = convex_hull(&around);
        assert_eq!(hull.len(), 4);

        let ring = to_polygon(&hull);
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
        assert!(strictly_contains(&hull, &Point::new(35.0, 139.0)));
    }

    #[test]
    fn test_bounding_box() {
        let bbox = bounding_box(&[
            Point::new(2.0, -1.0),
            Point::new(-3.0, 4.0),
            Point::new(0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(bbox.top_left, Point::new(-3.0, -1.0));
        assert_eq!(bbox.bottom_right, Point::new(2.0, 4.0));
        assert!(bbox.contains(&Point::new(2.0, 4.0)));
        assert!(!bbox.contains(&Point::new(2.1, 0.0)));
        assert!(bounding_box(&[]).is_none());
    }

    #[test]
    fn test_hull_of_listing_neighborhoods_contains_every_listing() {
        let listings = [
            Point::new(35.6812, 139.7671),
            Point::new(35.6586, 139.7454),
            Point::new(35.6895, 139.6917),
            Point::new(35.7100, 139.8107),
            Point::new(35.6284, 139.7387),
            Point::new(35.6938, 139.7034),
        ];

        for k in 3..=listings.len() {
            let chosen = &listings[..k];
            let footprint: Vec<Point> = chosen.iter().flat_map(|p| neighbors(p, 1e-6)).collect();
            let hull = convex_hull(&footprint);

            assert!(hull.len() >= 3);
            for listing in chosen {
                assert!(
                    strictly_contains(&hull, listing),
                    "listing {listing:?} outside hull of {k}"
                );
            }
        }
    }

    proptest! {
        #[test]
        fn prop_hull_contains_all_inputs(
            raw in prop::collection::vec((-1000i32..1000, -1000i32..1000), 3..40)
        ) {
            let points: Vec<Point> = raw
                .iter()
                .map(|&(x, y)| Point::new(x as f64, y as f64))
                .collect();
            let hull = convex_hull(&points);

            if hull.len() >= 3 {
                prop_assert_ne!(hull.first(), hull.last());
                for p in &points {
                    prop_assert!(contains(&hull, p));
                }
            }
        }

        #[test]
        fn prop_non_collinear_input_yields_polygon(
            x in -1000i32..1000,
            y in -1000i32..1000,
            w in 1i32..100,
            h in 1i32..100,
        ) {
            let points = vec![
                Point::new(x as f64, y as f64),
                Point::new((x + w) as f64, y as f64),
                Point::new(x as f64, (y + h) as f64),
            ];
            let hull = convex_hull(&points);
            prop_assert_eq!(hull.len(), 3);
        }
    }
}
