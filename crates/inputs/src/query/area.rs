use conefor_common::InfoSection;
use tracing::{debug, warn};

use super::{IdRegistry, NodeIds, QueryContext};
use crate::{
    error::Result,
    geometry::{SimpleGeometry, validate_simple},
    progress::QueryBudget,
    source::geometry_of,
    types::NodeRecord,
};

/// Area of each polygon (outer ring minus holes) as its node weight.
///
/// Features that do not resolve to a single valid polygon are skipped.
/// Geographic layers in a geographic project are measured on the ellipsoid,
/// which is reported as a warning since the result is not in map units.
pub fn run(ctx: &mut QueryContext, ids: &NodeIds, budget: QueryBudget) -> Result<Vec<NodeRecord>> {
    if ctx.frame.geographic_pair() {
        let message = format!(
            "Layer '{}' and the project both use geographic coordinates; areas are computed on the ellipsoid",
            ctx.layer.name()
        );
        warn!("{}", message);
        ctx.progress.bus().info(message, InfoSection::Warning);
    }

    let features = ctx.features();
    let step = budget.per_step(features.len());
    let mut registry = IdRegistry::new(ctx.layer.name());
    let mut records = Vec::with_capacity(features.len());

    for (ordinal, feature) in features.into_iter().enumerate() {
        ctx.check_cancelled()?;

        let polygon = match validate_simple(geometry_of(feature)) {
            Ok(SimpleGeometry::Polygon(polygon)) => Some(polygon),
            Ok(SimpleGeometry::Point(_)) => None,
            Err(reason) => {
                debug!("Feature {} skipped for area: {}", feature.fid, reason);
                None
            }
        };

        if let (Some(polygon), Some(id)) = (polygon, ids.resolve(ctx.layer, feature, ordinal)?) {
            let working = ctx.frame.polygon_to_working(&polygon)?;
            let value = ctx.frame.measurer.area(&working);
            registry.register(id)?;
            records.push(NodeRecord { id, value });
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
    use conefor_common::Event;
    use approx::assert_relative_eq;
    use geo_types::{Geometry, MultiPolygon, polygon};

    #[test]
    fn test_planar_areas() {
        let with_hole = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 2.0, y: 2.0), (x: 4.0, y: 2.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0)]],
        );
        let layer = layer_with(
            GeometryKind::Polygon,
            vec![(1, with_hole.into()), (2, square(20.0, 0.0, 3.0).into())],
        );
        let mut harness = Harness::planar();
        let mut ctx = harness.context(&layer);

        let records = run(&mut ctx, &NodeIds::from_field(Some("id")), QueryBudget::split(10.0)).unwrap();
        assert_eq!(records.len(), 2);
        assert_relative_eq!(records[0].value, 96.0);
        assert_relative_eq!(records[1].value, 9.0);
    }

    #[test]
    fn test_invalid_polygons_are_skipped() {
        let multi = MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]);
        let mut layer = layer_with(
            GeometryKind::Polygon,
            vec![(1, Geometry::MultiPolygon(multi)), (2, square(0.0, 0.0, 2.0).into())],
        );
        layer.push_feature(None, [("id", crate::source::AttributeValue::Integer(3))]);
        let mut harness = Harness::planar();
        let mut ctx = harness.context(&layer);

        let records = run(&mut ctx, &NodeIds::from_field(Some("id")), QueryBudget::split(10.0)).unwrap();
        assert_eq!(records, vec![NodeRecord { id: 2, value: 4.0 }]);
    }

    #[test]
    fn test_geographic_pair_warns_but_measures() {
        // Roughly 1 km x 1 km near the equator
        let cell: Geometry<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 0.009, y: 0.0),
            (x: 0.009, y: 0.009),
            (x: 0.0, y: 0.009),
        ]
        .into();
        let mut layer = MemoryLayer::new("cells", GeometryKind::Polygon, Crs::wgs84());
        layer.push_feature(Some(cell), Vec::<(String, _)>::new());

        let mut harness = Harness::planar();
        harness.frame = MeasurementFrame::resolve(&Crs::wgs84(), &Crs::wgs84()).unwrap();
        let events = harness.bus.subscribe();
        let mut ctx = harness.context(&layer);

        let records = run(&mut ctx, &NodeIds::Autogenerated, QueryBudget::split(10.0)).unwrap();
        assert!((records[0].value - 1.0e6).abs() < 0.02e6, "got {}", records[0].value);

        assert!(events.try_iter().any(|event| matches!(
            event,
            Event::Info { section: InfoSection::Warning, .. }
        )));
    }
}
