//! Companion line layers drawing each computed link.

use std::fs;
use std::path::{Path, PathBuf};

use conefor_common::paths;
use geojson::{FeatureCollection, Geometry, JsonValue, Value};
use serde_json::json;
use tracing::debug;

use crate::{
    crs::Crs,
    error::{ProcessError, Result},
    typed_geojson::{DistanceLineProperties, DistanceLines, TypedFeature},
    types::DistanceRecord,
};

pub const VECTOR_EXTENSION: &str = "geojson";

/// Build the line collection; every record needs both end points
pub fn build(records: &[DistanceRecord], crs: &Crs) -> Result<DistanceLines> {
    let mut lines = DistanceLines::new();
    lines.set_foreign_member(
        "crs",
        json!({ "type": "name", "properties": { "name": crs.name } }),
    );

    for record in records {
        let (Some(from), Some(to)) = (record.from_point, record.to_point) else {
            return Err(ProcessError::InvalidParameters(format!(
                "link {} -> {} has no coordinates to draw",
                record.from_id, record.to_id
            )));
        };
        let geometry = Geometry::new(Value::LineString(vec![
            vec![from.x, from.y],
            vec![to.x, to.y],
        ]));
        let properties =
            DistanceLineProperties::new(record.from_id, record.to_id, record.distance);
        lines.push(TypedFeature::new(Some(geometry), properties)?);
    }

    Ok(lines)
}

/// Write one line feature per record into `dir` and return the path used.
///
/// Collisions are resolved the same way as for text files.
pub fn write(records: &[DistanceRecord], crs: &Crs, dir: &Path, base_name: &str) -> Result<PathBuf> {
    let lines = build(records, crs)?;

    paths::ensure_dir(dir)?;
    let file_name = paths::with_default_extension(base_name, VECTOR_EXTENSION);
    let path = paths::unique_path(dir, &file_name);

    let collection: FeatureCollection = lines.into();
    let json = serde_json::to_string_pretty(&collection)?;
    fs::write(&path, json)?;

    debug!("Wrote {} distance lines to {}", records.len(), path.display());
    Ok(path)
}

/// Name stored in the `crs` member of a written line layer
pub fn crs_name(collection: &FeatureCollection) -> Option<&str> {
    collection
        .foreign_members
        .as_ref()?
        .get("crs")?
        .get("properties")?
        .get("name")
        .and_then(JsonValue::as_str)
}
