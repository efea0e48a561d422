use geo_types::Coord;

use super::{NodeIds, QueryContext, describe, network_nodes};
use crate::{
    error::{ProcessError, Result},
    progress::QueryBudget,
    types::DistanceRecord,
};

/// Distance between the centroids of every unordered pair of nodes.
///
/// Pairs follow feature iteration order (`i < j`), so each link is emitted
/// exactly once. Link end points are reported in layer coordinates.
pub fn run(ctx: &mut QueryContext, ids: &NodeIds, budget: QueryBudget) -> Result<Vec<DistanceRecord>> {
    let nodes = network_nodes(ctx, ids)?;

    let mut centroids: Vec<(i64, Coord<f64>)> = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let centroid = node.geometry.centroid().ok_or_else(|| ProcessError::InvalidFeature {
            feature: describe(node.id, node.fid),
            reason: "geometry has no centroid".to_string(),
        })?;
        centroids.push((node.id, centroid));
    }

    let layer_points: Vec<Coord<f64>> = centroids.iter().map(|(_, c)| *c).collect();
    let working = ctx.frame.to_working(&layer_points)?;
    let measurer = ctx.frame.measurer;

    let step = budget.per_step(centroids.len());
    let mut records = Vec::new();

    for i in 0..centroids.len() {
        ctx.check_cancelled()?;
        let (from_id, from_point) = centroids[i];

        for j in (i + 1)..centroids.len() {
            let (to_id, to_point) = centroids[j];
            let distance = measurer.distance(working[i], working[j]);
            records.push(DistanceRecord::new(from_id, to_id, distance).with_points(from_point, to_point));
        }

        ctx.advance(step);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::*;
    use crate::crs::{Crs, MeasurementFrame};
    use crate::source::{GeometryKind, MemoryLayer};
    use approx::assert_relative_eq;
    use geo_types::{Geometry, point};

    fn three_points() -> MemoryLayer {
        layer_with(
            GeometryKind::Point,
            vec![
                (1, point!(x: 0.0, y: 0.0).into()),
                (2, point!(x: 3.0, y: 4.0).into()),
                (3, point!(x: 0.0, y: 8.0).into()),
            ],
        )
    }

    #[test]
    fn test_each_pair_once() {
        let layer = three_points();
        let mut harness = Harness::planar();
        let mut ctx = harness.context(&layer);

        let records = run(&mut ctx, &NodeIds::from_field(Some("id")), QueryBudget::split(10.0)).unwrap();
        let triples: Vec<(i64, i64, f64)> =
            records.iter().map(|r| (r.from_id, r.to_id, r.distance)).collect();
        assert_eq!(triples, vec![(1, 2, 5.0), (1, 3, 8.0), (2, 3, 5.0)]);
        assert_eq!(records[0].to_point, Some(Coord { x: 3.0, y: 4.0 }));
    }

    #[test]
    fn test_symmetric_regardless_of_order() {
        let forward = layer_with(
            GeometryKind::Polygon,
            vec![(1, square(0.0, 0.0, 2.0).into()), (2, square(10.0, 0.0, 2.0).into())],
        );
        let backward = layer_with(
            GeometryKind::Polygon,
            vec![(2, square(10.0, 0.0, 2.0).into()), (1, square(0.0, 0.0, 2.0).into())],
        );

        for layer in [forward, backward] {
            let mut harness = Harness::planar();
            let mut ctx = harness.context(&layer);
            let records = run(&mut ctx, &NodeIds::from_field(Some("id")), QueryBudget::split(10.0)).unwrap();
            assert_eq!(records.len(), 1);
            assert_relative_eq!(records[0].distance, 10.0);
        }
    }

    #[test]
    fn test_geographic_layer_is_measured_in_project_plane() {
        let mut layer = MemoryLayer::new("sites", GeometryKind::Point, Crs::wgs84());
        layer.push_feature(Some(point!(x: 9.0, y: 55.0).into()), Vec::<(String, _)>::new());
        layer.push_feature(Some(point!(x: 9.0, y: 55.1).into()), Vec::<(String, _)>::new());

        let utm = Crs::projected("EPSG:32632", "utm zone=32");
        let mut harness = Harness::planar();
        harness.frame = MeasurementFrame::resolve(&Crs::wgs84(), &utm).unwrap();
        let mut ctx = harness.context(&layer);

        let records = run(&mut ctx, &NodeIds::Autogenerated, QueryBudget::split(10.0)).unwrap();
        assert_eq!(records.len(), 1);
        // 0.1 degree of latitude, a little over 11 km
        assert!((records[0].distance - 11_130.0).abs() < 30.0, "got {}", records[0].distance);
        // End points stay in layer coordinates
        assert_eq!(records[0].from_point, Some(Coord { x: 9.0, y: 55.0 }));
    }

    #[test]
    fn test_single_feature_has_no_links() {
        let layer = layer_with(GeometryKind::Point, vec![(1, Geometry::Point(point!(x: 1.0, y: 1.0)))]);
        let mut harness = Harness::planar();
        let mut ctx = harness.context(&layer);
        assert!(run(&mut ctx, &NodeIds::Autogenerated, QueryBudget::split(10.0)).unwrap().is_empty());
    }
}
