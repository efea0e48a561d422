use geo::EuclideanDistance;
use geo_types::{Coord, Line, Point};

use super::{NodeIds, QueryContext, network_nodes, segment};
use crate::{
    crs::{MeasurementFrame, Measurer},
    error::Result,
    geometry::SimpleGeometry,
    progress::QueryBudget,
    types::DistanceRecord,
};

/// Outer-ring segments of a node in working coordinates
fn working_segments(frame: &MeasurementFrame, geometry: &SimpleGeometry) -> Result<Vec<Line<f64>>> {
    let ring = frame.to_working(&geometry.outer_ring())?;
    Ok(segment::ring_segments(&ring))
}

/// Nearest points of two segment sets and their distance, in working coordinates
fn nearest_pair(
    a: &[Line<f64>],
    b: &[Line<f64>],
    measurer: Measurer,
) -> Option<(Coord<f64>, Coord<f64>, f64)> {
    let (seg_a, seg_b) = segment::closest_segments(a, b)?;
    Some(segment::nearest_points(&seg_a, &seg_b, measurer))
}

/// Nearest edge-to-edge distance for every unordered pair of nodes, with
/// the two nearest points in layer coordinates for drawing the link.
pub fn run(ctx: &mut QueryContext, ids: &NodeIds, budget: QueryBudget) -> Result<Vec<DistanceRecord>> {
    let nodes = network_nodes(ctx, ids)?;
    let rings = nodes
        .iter()
        .map(|node| working_segments(ctx.frame, &node.geometry))
        .collect::<Result<Vec<_>>>()?;

    let measurer = ctx.frame.measurer;
    let step = budget.per_step(nodes.len());
    let mut records = Vec::new();

    for i in 0..nodes.len() {
        ctx.check_cancelled()?;

        for j in (i + 1)..nodes.len() {
            let Some((from, to, distance)) = nearest_pair(&rings[i], &rings[j], measurer) else {
                continue;
            };
            let ends = ctx.frame.to_layer(&[from, to])?;
            records.push(
                DistanceRecord::new(nodes[i].id, nodes[j].id, distance).with_points(ends[0], ends[1]),
            );
        }

        ctx.advance(step);
    }

    Ok(records)
}

/// Working-coordinate geometry for the library distance
enum Shape {
    Point(Point<f64>),
    Polygon(geo_types::Polygon<f64>),
}

fn shape_distance(a: &Shape, b: &Shape) -> f64 {
    match (a, b) {
        (Shape::Point(a), Shape::Point(b)) => a.euclidean_distance(b),
        (Shape::Point(a), Shape::Polygon(b)) => a.euclidean_distance(b),
        (Shape::Polygon(a), Shape::Point(b)) => a.euclidean_distance(b),
        (Shape::Polygon(a), Shape::Polygon(b)) => a.euclidean_distance(b),
    }
}

/// Edge distances without link coordinates.
///
/// On a planar frame this uses the library's geometry-to-geometry distance,
/// which is zero for nested polygons. On an ellipsoidal frame it measures the
/// same nearest points as [`run`] and drops them.
pub fn run_fast(ctx: &mut QueryContext, ids: &NodeIds, budget: QueryBudget) -> Result<Vec<DistanceRecord>> {
    if ctx.frame.measurer == Measurer::Ellipsoidal {
        return Ok(run(ctx, ids, budget)?
            .into_iter()
            .map(|record| DistanceRecord::new(record.from_id, record.to_id, record.distance))
            .collect());
    }

    let nodes = network_nodes(ctx, ids)?;
    let shapes = nodes
        .iter()
        .map(|node| match &node.geometry {
            SimpleGeometry::Point(point) => ctx
                .frame
                .to_working(&[point.0])
                .map(|coords| Shape::Point(Point::from(coords[0]))),
            SimpleGeometry::Polygon(polygon) => ctx.frame.polygon_to_working(polygon).map(Shape::Polygon),
        })
        .collect::<Result<Vec<_>>>()?;

    let step = budget.per_step(nodes.len());
    let mut records = Vec::new();

    for i in 0..nodes.len() {
        ctx.check_cancelled()?;

        for j in (i + 1)..nodes.len() {
            let distance = shape_distance(&shapes[i], &shapes[j]);
            records.push(DistanceRecord::new(nodes[i].id, nodes[j].id, distance));
        }

        ctx.advance(step);
    }

    Ok(records)
}
