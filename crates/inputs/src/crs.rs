//! Coordinate reference systems and the frame distances and areas are measured in.

use geo::{Area, EuclideanDistance, GeodesicArea, GeodesicDistance};
use geo_types::{Coord, LineString, Point, Polygon};
use geodesy::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProcessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CrsKind {
    /// Angular units (degrees, lon/lat order)
    Geographic,
    /// Linear units on a plane
    Projected,
}

/// Coordinate reference system of a layer or project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Crs {
    pub name: String,
    pub kind: CrsKind,
    /// Operator definition taking geographic lon/lat to this plane, e.g. `"utm zone=33"`
    #[serde(default)]
    pub operation: Option<String>,
}

impl Crs {
    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self {
            name: "EPSG:4326".to_string(),
            kind: CrsKind::Geographic,
            operation: None,
        }
    }

    /// Projected CRS reachable from geographic coordinates through `operation`
    pub fn projected(name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CrsKind::Projected,
            operation: Some(operation.into()),
        }
    }

    /// Projected CRS without a known operation (local or engineering plane)
    pub fn planar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CrsKind::Projected,
            operation: None,
        }
    }

    pub fn is_geographic(&self) -> bool {
        self.kind == CrsKind::Geographic
    }
}

/// Geographic <-> projected conversion backed by a geodesy operator
pub struct Transformer {
    ctx: Minimal,
    op: OpHandle,
}

impl Transformer {
    pub fn new(operation: &str) -> Result<Self> {
        let mut ctx = Minimal::default();
        let op = ctx
            .op(operation)
            .map_err(|e| ProcessError::Transform(format!("'{}': {}", operation, e)))?;
        Ok(Self { ctx, op })
    }

    /// Geographic degrees (lon, lat) to projected coordinates
    pub fn forward(&self, coords: &[Coord<f64>]) -> Result<Vec<Coord<f64>>> {
        let mut data: Vec<Coor2D> = coords.iter().map(|c| Coor2D::gis(c.x, c.y)).collect();
        self.ctx
            .apply(self.op, Fwd, &mut data)
            .map_err(|e| ProcessError::Transform(e.to_string()))?;
        Ok(data.iter().map(|c| Coord { x: c.0[0], y: c.0[1] }).collect())
    }

    /// Projected coordinates back to geographic degrees (lon, lat)
    pub fn inverse(&self, coords: &[Coord<f64>]) -> Result<Vec<Coord<f64>>> {
        let mut data: Vec<Coor2D> = coords.iter().map(|c| Coor2D::raw(c.x, c.y)).collect();
        self.ctx
            .apply(self.op, Inv, &mut data)
            .map_err(|e| ProcessError::Transform(e.to_string()))?;
        Ok(data
            .iter()
            .map(|c| Coord {
                x: c.0[0].to_degrees(),
                y: c.0[1].to_degrees(),
            })
            .collect())
    }
}

/// How distances and areas are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurer {
    /// Euclidean, in the units of the working coordinates
    Planar,
    /// Geodesic on the WGS84 ellipsoid, working coordinates in degrees
    Ellipsoidal,
}

impl Measurer {
    pub fn distance(&self, a: Coord<f64>, b: Coord<f64>) -> f64 {
        let (a, b) = (Point::from(a), Point::from(b));
        match self {
            Measurer::Planar => a.euclidean_distance(&b),
            Measurer::Ellipsoidal => a.geodesic_distance(&b),
        }
    }

    /// Area of the outer ring minus the holes
    pub fn area(&self, polygon: &Polygon<f64>) -> f64 {
        let ring_area = |ring: &LineString<f64>| {
            let ring = Polygon::new(ring.clone(), vec![]);
            match self {
                Measurer::Planar => ring.unsigned_area(),
                Measurer::Ellipsoidal => ring.geodesic_area_unsigned(),
            }
        };

        let holes: f64 = polygon.interiors().iter().map(ring_area).sum();
        (ring_area(polygon.exterior()) - holes).max(0.0)
    }
}

/// Working coordinates for one layer: which transform to apply before
/// measuring and how to measure afterwards.
pub struct MeasurementFrame {
    pub measurer: Measurer,
    transformer: Option<Transformer>,
    layer_crs: Crs,
    project_crs: Crs,
}

impl MeasurementFrame {
    pub fn resolve(layer_crs: &Crs, project_crs: &Crs) -> Result<Self> {
        let (measurer, transformer) = match (layer_crs.kind, project_crs) {
            (CrsKind::Projected, _) => (Measurer::Planar, None),
            (CrsKind::Geographic, Crs { kind: CrsKind::Projected, operation: Some(op), .. }) => {
                (Measurer::Planar, Some(Transformer::new(op)?))
            }
            (CrsKind::Geographic, project) => {
                if !project.is_geographic() {
                    warn!(
                        "Project CRS '{}' has no operation; measuring ellipsoidally instead",
                        project.name
                    );
                }
                (Measurer::Ellipsoidal, None)
            }
        };

        debug!(
            "Measurement frame for '{}' -> '{}': {:?}, transformed: {}",
            layer_crs.name,
            project_crs.name,
            measurer,
            transformer.is_some()
        );

        Ok(Self {
            measurer,
            transformer,
            layer_crs: layer_crs.clone(),
            project_crs: project_crs.clone(),
        })
    }

    /// Both the layer and the project use angular units
    pub fn geographic_pair(&self) -> bool {
        self.layer_crs.is_geographic() && self.project_crs.is_geographic()
    }

    pub fn is_transformed(&self) -> bool {
        self.transformer.is_some()
    }

    pub fn layer_crs(&self) -> &Crs {
        &self.layer_crs
    }

    /// Layer coordinates into working coordinates
    pub fn to_working(&self, coords: &[Coord<f64>]) -> Result<Vec<Coord<f64>>> {
        match &self.transformer {
            Some(transformer) => transformer.forward(coords),
            None => Ok(coords.to_vec()),
        }
    }

    /// Working coordinates back into the layer CRS
    pub fn to_layer(&self, coords: &[Coord<f64>]) -> Result<Vec<Coord<f64>>> {
        match &self.transformer {
            Some(transformer) => transformer.inverse(coords),
            None => Ok(coords.to_vec()),
        }
    }

    pub fn polygon_to_working(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>> {
        if self.transformer.is_none() {
            return Ok(polygon.clone());
        }
        let exterior = LineString::new(self.to_working(&polygon.exterior().0)?);
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| self.to_working(&ring.0).map(LineString::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }
}
