use crate::{
    crs::Crs,
    source::{Feature, FieldDef, GeometryKind},
};

/// A vector layer the engine can read features from.
///
/// Implemented by [`crate::source::MemoryLayer`]; host applications can
/// plug their own layer type in.
pub trait FeatureSource: Send + Sync {
    /// Layer name used in messages and errors
    fn name(&self) -> &str;

    /// Native coordinate reference system of the geometries
    fn crs(&self) -> &Crs;

    /// Declared text encoding; `"System"` when unspecified
    fn encoding(&self) -> &str;

    fn geometry_kind(&self) -> GeometryKind;

    /// Attribute schema
    fn fields(&self) -> &[FieldDef];

    /// All features in iteration order
    fn features(&self) -> &[Feature];

    /// Feature ids of the current selection (may be empty)
    fn selected(&self) -> &[u64];

    fn is_point_type(&self) -> bool {
        self.geometry_kind() == GeometryKind::Point
    }

    fn has_field(&self, name: &str) -> bool {
        self.fields().iter().any(|field| field.name == name)
    }
}

/// A row of a Conefor text file
pub trait TextRecord {
    /// Sort key; the node id in the first column
    fn key(&self) -> i64;

    /// Column values in file order
    fn columns(&self) -> Vec<String>;
}
