//! # Conefor Inputs
//!
//! Generates node and connection files for the Conefor connectivity tool from
//! point and polygon layers.
//!
//! ## Core Features
//!
//! - **Node weights**: from an attribute field or the polygon area
//! - **Connections**: centroid-to-centroid or nearest edge-to-edge distances
//! - **CRS aware**: geographic layers are projected or measured on the ellipsoid
//! - **Distance lines**: optional GeoJSON line layers drawing every link
//! - **Background runs**: progress and info events, cooperative cancellation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use conefor_inputs::{Crs, LayerProcessingParameters, Processor, io};
//!
//! let layer = io::load_layer("patches.geojson", Crs::planar("EPSG:3035"))?;
//! let params = LayerProcessingParameters::builder(Arc::new(layer))
//!     .id_field("patch_id")
//!     .attribute_field("quality")
//!     .attribute_file("nodes")
//!     .connection_file("distances")
//!     .build()?;
//!
//! let report = Processor::new("out").run(&[params]);
//! for file in &report.files {
//!     println!("{}: {}", file.kind, file.path.display());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod crs;
pub mod error;
pub mod geometry;
pub mod io;
pub mod processor;
pub mod progress;
pub mod query;
pub mod source;
pub mod traits;
pub mod typed_geojson;
pub mod types;

// Re-exports for convenience
pub use crs::{Crs, CrsKind, MeasurementFrame, Measurer};
pub use error::{ProcessError, Result};
pub use geometry::{SimpleGeometry, validate_simple};
pub use processor::{
    LayerProcessingParameters, OutputTargets, ParametersBuilder, Processor, RunReport,
};
pub use progress::{Progress, QueryBudget};
pub use source::{
    AttributeValue, Feature, FieldDef, FieldType, GeometryKind, MemoryLayer, fields_of,
    geometry_of, get_features, get_numeric_attribute, get_unique_numeric_fields,
};
pub use traits::{FeatureSource, TextRecord};
pub use types::{ConnectionMethod, DistanceRecord, NodeRecord, OutputFile, OutputKind};
