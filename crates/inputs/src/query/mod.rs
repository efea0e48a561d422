//! The four queries that turn a layer into Conefor records.
//!
//! Every query walks the features of one layer, checks the cancellation token
//! once per outer iteration and spends its analysis budget on the shared
//! [`Progress`] as it goes.

pub mod area;
pub mod attribute;
pub mod centroid;
pub mod edge;
pub mod segment;

use std::collections::HashSet;

use conefor_common::CancellationToken;
use tracing::debug;

use crate::{
    crs::MeasurementFrame,
    error::{ProcessError, Result},
    geometry::{SimpleGeometry, validate_simple},
    progress::Progress,
    source::{Feature, geometry_of, get_features, get_numeric_attribute},
    traits::FeatureSource,
};

/// Everything a query needs besides its own parameters
pub struct QueryContext<'a> {
    pub layer: &'a dyn FeatureSource,
    pub frame: &'a MeasurementFrame,
    pub use_selected: bool,
    pub progress: &'a mut Progress,
    pub cancel: &'a CancellationToken,
}

impl<'a> QueryContext<'a> {
    pub fn features(&self) -> Vec<&'a Feature> {
        get_features(self.layer, self.use_selected, None)
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(ProcessError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn advance(&mut self, amount: f64) {
        self.progress.advance(amount);
    }
}

/// Where node ids come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeIds {
    /// Integer value of a field; features with a null id are skipped
    Field(String),
    /// 1-based position in iteration order
    Autogenerated,
}

impl NodeIds {
    pub fn from_field(field: Option<&str>) -> Self {
        match field {
            Some(field) => NodeIds::Field(field.to_string()),
            None => NodeIds::Autogenerated,
        }
    }

    /// Id of the `ordinal`-th feature returned by the iteration
    pub fn resolve(
        &self,
        layer: &dyn FeatureSource,
        feature: &Feature,
        ordinal: usize,
    ) -> Result<Option<i64>> {
        match self {
            NodeIds::Field(field) => get_numeric_attribute::<i64>(layer, feature, field),
            NodeIds::Autogenerated => Ok(Some(ordinal as i64 + 1)),
        }
    }
}

/// Ids seen so far in one query; a repeat is reported the moment it shows up
pub struct IdRegistry {
    layer: String,
    seen: HashSet<i64>,
}

impl IdRegistry {
    pub fn new(layer: &str) -> Self {
        Self {
            layer: layer.to_string(),
            seen: HashSet::new(),
        }
    }

    pub fn register(&mut self, id: i64) -> Result<()> {
        if self.seen.insert(id) {
            Ok(())
        } else {
            Err(ProcessError::DuplicateIdentifier {
                id,
                layer: self.layer.clone(),
            })
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// A validated feature taking part in the pairwise queries
#[derive(Debug, Clone)]
pub struct Node {
    pub id: i64,
    pub fid: u64,
    /// Geometry in layer coordinates
    pub geometry: SimpleGeometry,
}

/// Collect the nodes of a network.
///
/// Any feature that cannot be a node (no geometry, multi-part,
/// self-intersecting) fails the whole query.
pub fn network_nodes(ctx: &QueryContext, ids: &NodeIds) -> Result<Vec<Node>> {
    let mut registry = IdRegistry::new(ctx.layer.name());
    let mut nodes = Vec::new();

    for (ordinal, feature) in ctx.features().into_iter().enumerate() {
        ctx.check_cancelled()?;

        let Some(id) = ids.resolve(ctx.layer, feature, ordinal)? else {
            debug!("Feature {} has no id, skipping", feature.fid);
            continue;
        };

        let geometry = validate_simple(geometry_of(feature)).map_err(|reason| {
            ProcessError::InvalidFeature {
                feature: describe(id, feature.fid),
                reason,
            }
        })?;

        registry.register(id)?;
        nodes.push(Node {
            id,
            fid: feature.fid,
            geometry,
        });
    }

    Ok(nodes)
}

pub(crate) fn describe(id: i64, fid: u64) -> String {
    format!("id {} (feature {})", id, fid)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::source::GeometryKind;
    use geo_types::{Geometry, point, polygon};

    #[test]
    fn test_autogenerated_ids_follow_iteration_order() {
        let layer = layer_with(
            GeometryKind::Point,
            vec![
                (10, point!(x: 0.0, y: 0.0).into()),
                (20, point!(x: 1.0, y: 0.0).into()),
            ],
        );
        let mut harness = Harness::planar();
        let ctx = harness.context(&layer);

        let nodes = network_nodes(&ctx, &NodeIds::Autogenerated).unwrap();
        let ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let nodes = network_nodes(&ctx, &NodeIds::from_field(Some("id"))).unwrap();
        let ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn test_duplicate_ids_are_fatal() {
        let layer = layer_with(
            GeometryKind::Point,
            vec![
                (4, point!(x: 0.0, y: 0.0).into()),
                (4, point!(x: 1.0, y: 0.0).into()),
            ],
        );
        let mut harness = Harness::planar();
        let ctx = harness.context(&layer);

        assert!(matches!(
            network_nodes(&ctx, &NodeIds::from_field(Some("id"))),
            Err(ProcessError::DuplicateIdentifier { id: 4, .. })
        ));
    }

    #[test]
    fn test_self_intersecting_feature_is_fatal() {
        let bow_tie: Geometry<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0),
        ]
        .into();
        let layer = layer_with(
            GeometryKind::Polygon,
            vec![(1, square(5.0, 5.0, 1.0).into()), (3, bow_tie)],
        );
        let mut harness = Harness::planar();
        let ctx = harness.context(&layer);

        match network_nodes(&ctx, &NodeIds::from_field(Some("id"))) {
            Err(ProcessError::InvalidFeature { feature, .. }) => assert!(feature.starts_with("id 3")),
            other => panic!("expected InvalidFeature, got {:?}", other.map(|n| n.len())),
        }
    }

    #[test]
    fn test_cancelled_token_stops_collection() {
        let layer = layer_with(GeometryKind::Point, vec![(1, point!(x: 0.0, y: 0.0).into())]);
        let mut harness = Harness::planar();
        harness.cancel.cancel();
        let ctx = harness.context(&layer);

        assert!(matches!(
            network_nodes(&ctx, &NodeIds::Autogenerated),
            Err(ProcessError::Cancelled)
        ));
    }
}
