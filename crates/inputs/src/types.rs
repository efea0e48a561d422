use std::path::PathBuf;

use geo_types::Coord;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::traits::TextRecord;

/// Pairwise distance algorithm used to connect nodes
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionMethod {
    /// Distance between feature centroids
    #[default]
    CentroidDistance,
    /// Distance between the nearest points of the outer rings
    EdgeDistance,
}

/// A node and its weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: i64,
    pub value: f64,
}

/// A link between two nodes, emitted once per unordered pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceRecord {
    pub from_id: i64,
    pub to_id: i64,
    pub distance: f64,
    /// Link end points in the layer CRS; absent for the fast edge variant
    pub from_point: Option<Coord<f64>>,
    pub to_point: Option<Coord<f64>>,
}

impl DistanceRecord {
    pub fn new(from_id: i64, to_id: i64, distance: f64) -> Self {
        Self {
            from_id,
            to_id,
            distance,
            from_point: None,
            to_point: None,
        }
    }

    pub fn with_points(mut self, from: Coord<f64>, to: Coord<f64>) -> Self {
        self.from_point = Some(from);
        self.to_point = Some(to);
        self
    }
}

impl TextRecord for NodeRecord {
    fn key(&self) -> i64 {
        self.id
    }

    fn columns(&self) -> Vec<String> {
        vec![self.id.to_string(), format_number(self.value)]
    }
}

impl TextRecord for DistanceRecord {
    fn key(&self) -> i64 {
        self.from_id
    }

    fn columns(&self) -> Vec<String> {
        vec![
            self.from_id.to_string(),
            self.to_id.to_string(),
            format_number(self.distance),
        ]
    }
}

/// Render a value the way Conefor reads it: integral values keep one decimal
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Logical kind of a persisted artifact
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize,
    Display, EnumString, EnumIter, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputKind {
    NodeAttribute,
    NodeArea,
    ConnectionsCentroid,
    ConnectionsEdge,
    VectorCentroidLines,
    VectorEdgeLines,
}

/// A file created by a run, after collision resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFile {
    pub path: PathBuf,
    pub kind: OutputKind,
    /// Name of the layer the file was computed from
    pub layer: String,
}

impl OutputKind {
    /// Node files, as opposed to connection files and line layers
    pub fn is_node_file(self) -> bool {
        matches!(self, OutputKind::NodeAttribute | OutputKind::NodeArea)
    }

    pub fn is_connection_file(self) -> bool {
        matches!(self, OutputKind::ConnectionsCentroid | OutputKind::ConnectionsEdge)
    }
}
