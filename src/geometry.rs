//! Coordinate conversion and spatial queries.
//!
//! Angles are degrees measured from the positive x-axis toward the positive
//! y-axis, which is clockwise on a y-down screen. Nothing in here fails:
//! degenerate input (empty polygons, zero-length segments, non-finite
//! coordinates) yields `None` or `false`.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

use crate::ids::SwimlaneId;
use crate::model::{Diagram, Swimlane};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Point) -> f64 {
        (self - other).length()
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Folds any finite angle into `[0, 360)`.
pub fn normalize_angle(degrees: f64) -> f64 {
    if !degrees.is_finite() {
        return 0.0;
    }
    let a = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.0
    if a >= 360.0 { 0.0 } else { a }
}

/// Shortest way around the circle between two angles, in `[0, 180]`.
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let d = normalize_angle(a - b);
    d.min(360.0 - d)
}

pub fn to_cartesian(center: Point, angle_degrees: f64, distance: f64) -> Point {
    let rad = angle_degrees.to_radians();
    Point::new(
        center.x + distance * rad.cos(),
        center.y + distance * rad.sin(),
    )
}

/// Inverse of [`to_cartesian`]. A point on the center has angle 0; a
/// non-finite point maps to `(0, 0)`.
pub fn to_polar(center: Point, point: Point) -> (f64, f64) {
    let v = point - center;
    if !v.is_finite() {
        return (0.0, 0.0);
    }
    let distance = v.length();
    if distance == 0.0 {
        return (0.0, 0.0);
    }
    (normalize_angle(v.y.atan2(v.x).to_degrees()), distance)
}

/// The swimlane whose ray angle is closest to `point`, if within
/// `max_angular_tolerance` degrees. Ties go to the lowest id.
pub fn nearest_swimlane(
    diagram: &Diagram,
    point: Point,
    max_angular_tolerance: f64,
) -> Option<SwimlaneId> {
    let v = point - diagram.center();
    if !v.is_finite() || v.length() == 0.0 || max_angular_tolerance.is_nan() {
        return None;
    }
    let (angle, _) = to_polar(diagram.center(), point);
    diagram
        .swimlanes()
        .map(|lane| (angular_difference(lane.angle, angle), lane.id))
        .filter(|(diff, _)| *diff <= max_angular_tolerance)
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, id)| id)
}

/// Distance along the swimlane's ray of the projection of `point`,
/// clamped to `[0, length]`.
pub fn snapped_distance(center: Point, swimlane: &Swimlane, point: Point) -> f64 {
    let dir = to_cartesian(Point::ORIGIN, swimlane.angle, 1.0);
    let t = (point - center).dot(dir);
    if !t.is_finite() {
        return 0.0;
    }
    t.clamp(0.0, swimlane.length.max(0.0))
}

/// Projects `point` onto the swimlane's ray, clamped to the ray's extent.
pub fn snap_to_swimlane(center: Point, swimlane: &Swimlane, point: Point) -> Point {
    to_cartesian(center, swimlane.angle, snapped_distance(center, swimlane, point))
}

/// Even-odd containment test. The polygon is closed implicitly; fewer than
/// three vertices contain nothing.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 || !point.is_finite() {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let ap = p - a;
    let ab_len2 = ab.dot(ab);
    if ab_len2 <= f64::EPSILON {
        return ap.length();
    }
    let t = (ap.dot(ab) / ab_len2).clamp(0.0, 1.0);
    let closest = a + ab * t;
    (p - closest).length()
}

pub fn hit_test_segment(point: Point, start: Point, end: Point, tolerance: f64) -> bool {
    let d = distance_to_segment(point, start, end);
    d.is_finite() && d <= tolerance
}

fn orientation(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

pub fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

/// Axis-aligned rectangle, as dragged out by a rubber-band selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }

    fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    pub fn intersects_segment(&self, a: Point, b: Point) -> bool {
        if self.contains(a) || self.contains(b) {
            return true;
        }
        let c = self.corners();
        (0..4).any(|i| segments_intersect(a, b, c[i], c[(i + 1) % 4]))
    }

    /// True when the outline crosses the rectangle, lies in it, or
    /// surrounds it.
    pub fn intersects_polygon(&self, polygon: &[Point]) -> bool {
        if polygon.is_empty() {
            return false;
        }
        if polygon.iter().any(|p| self.contains(*p)) {
            return true;
        }
        if polygon.len() >= 2 {
            let n = polygon.len();
            for i in 0..n {
                if self.intersects_segment(polygon[i], polygon[(i + 1) % n]) {
                    return true;
                }
            }
        }
        point_in_polygon(self.center(), polygon)
    }
}

/// Outline of an annular sector swept clockwise from `start_angle` to
/// `end_angle`: the outer arc first, then the inner arc back.
pub fn sector_points(
    center: Point,
    start_angle: f64,
    end_angle: f64,
    inner_radius: f64,
    outer_radius: f64,
    steps: usize,
) -> Vec<Point> {
    let steps = steps.max(1);
    let start = normalize_angle(start_angle);
    let mut end = normalize_angle(end_angle);
    if end < start {
        end += 360.0;
    }
    let angle_at = |i: usize| start + (end - start) * (i as f64) / (steps as f64);
    let mut points = Vec::with_capacity(2 * (steps + 1));
    for i in 0..=steps {
        points.push(to_cartesian(center, angle_at(i), outer_radius));
    }
    for i in (0..=steps).rev() {
        points.push(to_cartesian(center, angle_at(i), inner_radius));
    }
    points
}


#[cfg(test)]
mod proptest_tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    fn point_strategy() -> impl Strategy<Value = Point> {
        (-1000.0f64..1000.0, -1000.0f64..1000.0).prop_map(|(x, y)| Point::new(x, y))
    }

    /// Converting to Cartesian and back recovers the normalized angle and
    /// the distance.
    fn check_polar_roundtrip(center: Point, angle: f64, distance: f64) -> Result<(), TestCaseError> {
        let (a, d) = to_polar(center, to_cartesian(center, angle, distance));
        prop_assert!(approx_eq!(f64, d, distance, epsilon = 1e-6));
        let diff = angular_difference(a, normalize_angle(angle));
        prop_assert!(diff < 1e-6, "angle {} came back as {}", angle, a);
        Ok(())
    }

    /// Snapped points always lie on the ray within its length.
    fn check_snap_stays_on_ray(p: Point, angle: f64, length: f64) -> Result<(), TestCaseError> {
        let lane = Swimlane {
            id: SwimlaneId(1),
            label: String::new(),
            angle,
            length,
            color: crate::model::Rgba::default(),
        };
        let snapped = snap_to_swimlane(Point::ORIGIN, &lane, p);
        let (_, d) = to_polar(Point::ORIGIN, snapped);
        prop_assert!(d <= length + 1e-6);
        if d > 1e-6 {
            let (a, _) = to_polar(Point::ORIGIN, snapped);
            prop_assert!(angular_difference(a, angle) < 1e-6);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn polar_roundtrip(
            center in point_strategy(),
            angle in -720.0f64..720.0,
            distance in 0.01f64..5000.0,
        ) {
            check_polar_roundtrip(center, angle, distance)?;
        }

        #[test]
        fn snap_stays_on_ray(p in point_strategy(), angle in 0.0f64..360.0, length in 0.0f64..800.0) {
            check_snap_stays_on_ray(p, angle, length)?;
        }

        #[test]
        fn angular_difference_is_symmetric(a in -1000.0f64..1000.0, b in -1000.0f64..1000.0) {
            let ab = angular_difference(a, b);
            let ba = angular_difference(b, a);
            prop_assert!(approx_eq!(f64, ab, ba, epsilon = 1e-9));
            prop_assert!((0.0..=180.0).contains(&ab));
        }
    }
}
