use std::fs;
use std::path::Path;

use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};
use tracing::info;

use crate::{
    crs::Crs,
    error::{ProcessError, Result},
    source::{AttributeValue, FieldType, GeometryKind, MemoryLayer},
};

/// Load a GeoJSON FeatureCollection as a layer named after the file stem.
///
/// Feature ids are ordinals in file order; selections refer to them.
pub fn load_layer<P: AsRef<Path>>(path: P, crs: Crs) -> Result<MemoryLayer> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layer".to_string());

    let layer = parse_layer(&name, &text, crs)?;
    info!("Loaded layer '{}' from {}", name, path.display());
    Ok(layer)
}

pub fn parse_layer(name: &str, text: &str, crs: Crs) -> Result<MemoryLayer> {
    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => {
            return Err(ProcessError::InvalidParameters(format!(
                "'{}' is a bare geometry, expected features",
                name
            )));
        }
    };

    let kind = infer_geometry_kind(name, &collection)?;
    let fields = infer_fields(&collection);

    let mut layer = MemoryLayer::new(name, kind, crs);
    for (field, field_type) in &fields {
        layer = layer.with_field(field.clone(), *field_type);
    }

    for feature in collection.features {
        let geometry = match feature.geometry {
            Some(geometry) => Some(geo_types::Geometry::<f64>::try_from(geometry)?),
            None => None,
        };
        let attributes: Vec<(String, AttributeValue)> = match &feature.properties {
            Some(properties) => fields
                .iter()
                .map(|(field, field_type)| {
                    let value = properties.get(field).unwrap_or(&JsonValue::Null);
                    (field.clone(), to_attribute(value, *field_type))
                })
                .collect(),
            None => Vec::new(),
        };
        layer.push_feature(geometry, attributes);
    }

    Ok(layer)
}

fn infer_geometry_kind(name: &str, collection: &FeatureCollection) -> Result<GeometryKind> {
    use geojson::Value;

    let first = collection
        .features
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .next();

    match first.map(|geometry| &geometry.value) {
        Some(Value::Point(_)) | Some(Value::MultiPoint(_)) => Ok(GeometryKind::Point),
        Some(Value::Polygon(_)) | Some(Value::MultiPolygon(_)) => Ok(GeometryKind::Polygon),
        // Nothing to measure either way
        None => Ok(GeometryKind::Polygon),
        Some(other) => Err(ProcessError::InvalidParameters(format!(
            "layer '{}' has {} geometries; only points and polygons are supported",
            name,
            value_name(other)
        ))),
    }
}

fn value_name(value: &geojson::Value) -> &'static str {
    use geojson::Value;

    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Field schema in first-seen order. Integers widen to reals, anything
/// mixed with text becomes text.
fn infer_fields(collection: &FeatureCollection) -> Vec<(String, FieldType)> {
    let mut fields: Vec<(String, Option<FieldType>)> = Vec::new();

    for properties in collection.features.iter().filter_map(|f| f.properties.as_ref()) {
        merge_properties(&mut fields, properties);
    }

    fields
        .into_iter()
        .map(|(name, field_type)| (name, field_type.unwrap_or(FieldType::Text)))
        .collect()
}

fn merge_properties(fields: &mut Vec<(String, Option<FieldType>)>, properties: &JsonObject) {
    for (key, value) in properties {
        let observed = match value {
            JsonValue::Null => None,
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(FieldType::Integer),
            JsonValue::Number(_) => Some(FieldType::Real),
            _ => Some(FieldType::Text),
        };

        let index = match fields.iter().position(|(name, _)| name == key) {
            Some(index) => index,
            None => {
                fields.push((key.clone(), None));
                fields.len() - 1
            }
        };
        let slot = &mut fields[index].1;

        *slot = match (*slot, observed) {
            (current, None) => current,
            (None, observed) => observed,
            (Some(FieldType::Text), _) | (_, Some(FieldType::Text)) => Some(FieldType::Text),
            (Some(FieldType::Integer), Some(FieldType::Integer)) => Some(FieldType::Integer),
            _ => Some(FieldType::Real),
        };
    }
}

fn to_attribute(value: &JsonValue, field_type: FieldType) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Number(n) => match (field_type, n.as_i64()) {
            (FieldType::Integer, Some(i)) => AttributeValue::Integer(i),
            (FieldType::Text, _) => AttributeValue::Text(n.to_string()),
            _ => n
                .as_f64()
                .map(AttributeValue::Real)
                .unwrap_or(AttributeValue::Null),
        },
        JsonValue::String(s) => AttributeValue::Text(s.clone()),
        other => AttributeValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::FeatureSource;

    const PATCHES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"patch": 1, "quality": 2, "label": "a"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type": "Feature", "properties": {"patch": 2, "quality": 0.5, "label": null},
             "geometry": {"type": "Polygon", "coordinates": [[[3,0],[4,0],[4,1],[3,1],[3,0]]]}},
            {"type": "Feature", "properties": {"patch": 3, "quality": null, "label": "c"},
             "geometry": null}
        ]
    }"#;

    #[test]
    fn test_schema_and_values_are_inferred() {
        let layer = parse_layer("patches", PATCHES, Crs::planar("local")).unwrap();

        assert_eq!(layer.geometry_kind(), GeometryKind::Polygon);
        let mut schema: Vec<(&str, FieldType)> = layer
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.field_type))
            .collect();
        schema.sort_by_key(|(name, _)| *name);
        assert_eq!(
            schema,
            vec![
                ("label", FieldType::Text),
                ("patch", FieldType::Integer),
                ("quality", FieldType::Real),
            ]
        );

        let features = layer.features();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0].attribute("quality"), Some(&AttributeValue::Real(2.0)));
        assert_eq!(features[1].attribute("label"), Some(&AttributeValue::Null));
        assert!(features[2].geometry.is_none());
        assert_eq!(features[2].fid, 2);
    }

    #[test]
    fn test_lines_are_rejected() {
        let lines = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {},
             "geometry": {"type": "LineString", "coordinates": [[0,0],[1,1]]}}]}"#;
        assert!(matches!(
            parse_layer("roads", lines, Crs::wgs84()),
            Err(ProcessError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_load_from_file_uses_stem_as_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.geojson");
        fs::write(&path, PATCHES).unwrap();

        let layer = load_layer(&path, Crs::planar("local")).unwrap();
        assert_eq!(layer.name(), "forest");
    }
}
