//! Segment helpers for the nearest-edge search.
//!
//! All functions work on planar working coordinates.

use geo::EuclideanDistance;
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo_types::{Coord, Line};

use crate::crs::Measurer;

const EPSILON: f64 = 1e-12;

/// Consecutive-vertex segments of a ring. A single vertex yields one
/// zero-length segment so points can take part in the search.
pub fn ring_segments(ring: &[Coord<f64>]) -> Vec<Line<f64>> {
    match ring {
        [] => Vec::new(),
        [only] => vec![Line::new(*only, *only)],
        _ => ring
            .windows(2)
            .map(|pair| Line::new(pair[0], pair[1]))
            .collect(),
    }
}

/// Planar distance between two segments, zero when they touch
pub fn segment_distance(a: &Line<f64>, b: &Line<f64>) -> f64 {
    a.euclidean_distance(b)
}

/// The pair of segments, one from each ring, closest to each other.
/// Ties keep the first pair found.
pub fn closest_segments(a: &[Line<f64>], b: &[Line<f64>]) -> Option<(Line<f64>, Line<f64>)> {
    let mut best: Option<(f64, Line<f64>, Line<f64>)> = None;

    for seg_a in a {
        for seg_b in b {
            let d = segment_distance(seg_a, seg_b);
            if best.is_none_or(|(current, _, _)| d < current) {
                best = Some((d, *seg_a, *seg_b));
            }
        }
    }

    best.map(|(_, seg_a, seg_b)| (seg_a, seg_b))
}

/// Project `point` onto the line through `segment` using `y = mx + b`.
///
/// Vertical segments have no slope and project straight across. When the
/// foot of the perpendicular falls outside the segment, the segment end
/// nearest to `point` is used.
pub fn project_onto_segment(point: Coord<f64>, segment: &Line<f64>) -> Coord<f64> {
    let (start, end) = (segment.start, segment.end);
    let dx = end.x - start.x;
    let dy = end.y - start.y;

    if dx.abs() < EPSILON && dy.abs() < EPSILON {
        return start;
    }

    let projected = if dx.abs() < EPSILON {
        Coord {
            x: start.x,
            y: point.y,
        }
    } else {
        let m = dy / dx;
        let b = start.y - m * start.x;
        let x = (point.x + m * point.y - m * b) / (1.0 + m * m);
        Coord { x, y: m * x + b }
    };

    if within_extent(projected, segment) {
        projected
    } else if planar(point, start) <= planar(point, end) {
        start
    } else {
        end
    }
}

/// Strictly inside the segment's bounding box on each axis it spans; on an
/// axis it does not span the coordinate has to match.
fn within_extent(c: Coord<f64>, segment: &Line<f64>) -> bool {
    let inside = |value: f64, a: f64, b: f64| {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        if hi - lo < EPSILON {
            (value - lo).abs() < EPSILON
        } else {
            value > lo && value < hi
        }
    };
    inside(c.x, segment.start.x, segment.end.x) && inside(c.y, segment.start.y, segment.end.y)
}

fn planar(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Nearest points between two segments and their distance under `measurer`.
///
/// Each end of either segment is projected onto the other one and the
/// shortest of those (up to four) candidates wins. Crossing segments meet
/// at distance zero.
pub fn nearest_points(
    a: &Line<f64>,
    b: &Line<f64>,
    measurer: Measurer,
) -> (Coord<f64>, Coord<f64>, f64) {
    match line_intersection(*a, *b) {
        Some(LineIntersection::SinglePoint { intersection, .. }) => {
            return (intersection, intersection, 0.0);
        }
        Some(LineIntersection::Collinear { intersection }) => {
            return (intersection.start, intersection.start, 0.0);
        }
        None => {}
    }

    let candidates = [
        (a.start, project_onto_segment(a.start, b)),
        (a.end, project_onto_segment(a.end, b)),
        (project_onto_segment(b.start, a), b.start),
        (project_onto_segment(b.end, a), b.end),
    ];

    let mut best = (candidates[0].0, candidates[0].1, measurer.distance(candidates[0].0, candidates[0].1));
    for (from, to) in candidates.into_iter().skip(1) {
        let d = measurer.distance(from, to);
        if d < best.2 {
            best = (from, to, d);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(a: (f64, f64), b: (f64, f64)) -> Line<f64> {
        Line::new(Coord { x: a.0, y: a.1 }, Coord { x: b.0, y: b.1 })
    }

    #[test]
    fn test_parallel_vertical_segments() {
        let a = line((0.0, 0.0), (0.0, 10.0));
        let b = line((5.0, 3.0), (5.0, 7.0));

        let (from, to, d) = nearest_points(&a, &b, Measurer::Planar);
        assert_relative_eq!(d, 5.0);
        assert_eq!(from, Coord { x: 0.0, y: 3.0 });
        assert_eq!(to, Coord { x: 5.0, y: 3.0 });
    }

    #[test]
    fn test_projection_falls_back_to_nearest_end() {
        let segment = line((0.0, 0.0), (4.0, 0.0));
        assert_eq!(
            project_onto_segment(Coord { x: 2.0, y: 3.0 }, &segment),
            Coord { x: 2.0, y: 0.0 }
        );
        assert_eq!(
            project_onto_segment(Coord { x: 9.0, y: 1.0 }, &segment),
            Coord { x: 4.0, y: 0.0 }
        );
    }

    #[test]
    fn test_sloped_projection() {
        let segment = line((0.0, 0.0), (4.0, 4.0));
        let foot = project_onto_segment(Coord { x: 0.0, y: 2.0 }, &segment);
        assert_relative_eq!(foot.x, 1.0);
        assert_relative_eq!(foot.y, 1.0);
    }

    #[test]
    fn test_vertical_projection_outside_extent() {
        let segment = line((5.0, 3.0), (5.0, 7.0));
        assert_eq!(
            project_onto_segment(Coord { x: 0.0, y: 10.0 }, &segment),
            Coord { x: 5.0, y: 7.0 }
        );
    }

    #[test]
    fn test_crossing_segments_meet_at_zero() {
        let a = line((0.0, 0.0), (2.0, 2.0));
        let b = line((0.0, 2.0), (2.0, 0.0));
        let (from, to, d) = nearest_points(&a, &b, Measurer::Planar);
        assert_eq!(d, 0.0);
        assert_eq!(from, to);
        assert_relative_eq!(from.x, 1.0);
    }

    #[test]
    fn test_closest_segments_of_two_squares() {
        let a = ring_segments(&[
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 1.0, y: 0.0 },
            Coord { x: 1.0, y: 1.0 },
            Coord { x: 0.0, y: 1.0 },
            Coord { x: 0.0, y: 0.0 },
        ]);
        let b = ring_segments(&[
            Coord { x: 3.0, y: 0.0 },
            Coord { x: 4.0, y: 0.0 },
            Coord { x: 4.0, y: 1.0 },
            Coord { x: 3.0, y: 1.0 },
            Coord { x: 3.0, y: 0.0 },
        ]);
        assert_eq!(a.len(), 4);

        let (seg_a, seg_b) = closest_segments(&a, &b).unwrap();
        assert_relative_eq!(segment_distance(&seg_a, &seg_b), 2.0);
        let (_, _, d) = nearest_points(&seg_a, &seg_b, Measurer::Planar);
        assert_relative_eq!(d, 2.0);
    }

    #[test]
    fn test_single_vertex_ring() {
        let point = Coord { x: 1.0, y: 1.0 };
        assert_eq!(ring_segments(&[point]), vec![Line::new(point, point)]);
        assert!(ring_segments(&[]).is_empty());
    }
}
